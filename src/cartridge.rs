//! Cartridge state and the mapper boards that decode the cartridge buses.
//!
//! The PPU's nametable address range ($2000-$3EFF) is routed through here as well because the
//! console's VRAM physically sits on the cartridge bus; boards are free to remap or replace it.

mod audio;
mod banks;
mod irq;
mod mappers;
mod nametables;
mod quirks;

use std::mem;

use bincode::{Decode, Encode};
use thiserror::Error;

use crate::cartridge::mappers::{
    Axrom, Bnrom, ChrType, Cnrom, Gxrom, GxromVariant, Mmc1, Mmc2, Mmc2Variant, Mmc3, Mmc5,
    Nina001, Nrom, SunsoftFme7, Uxrom, UxromVariant, Vrc4, Vrc6, Vrc6Variant, Vrc7, Vrc7Variant,
    VrcKind,
};
use crate::cartridge::quirks::CartridgeQuirk;

pub use audio::ExpansionAudioChip;
pub use irq::{CpuIrqLine, IrqLine};
pub use nametables::NametableMirroring;

use nametables::Nametables;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum TimingMode {
    Ntsc,
    Pal,
}

#[derive(Debug, Clone, Encode, Decode)]
struct Cartridge {
    prg_rom: Vec<u8>,
    prg_ram: Vec<u8>,
    has_ram_battery: bool,
    prg_ram_dirty_bit: bool,
    chr_rom: Vec<u8>,
    chr_ram: Vec<u8>,
    timing_mode: TimingMode,
}

impl Cartridge {
    fn get_prg_rom(&self, address: u32) -> u8 {
        self.prg_rom[(address as usize) % self.prg_rom.len()]
    }

    fn has_prg_ram(&self) -> bool {
        !self.prg_ram.is_empty()
    }

    fn get_prg_ram(&self, address: u32) -> u8 {
        if !self.prg_ram.is_empty() {
            self.prg_ram[(address as usize) % self.prg_ram.len()]
        } else {
            0xFF
        }
    }

    fn set_prg_ram(&mut self, address: u32, value: u8) {
        if !self.prg_ram.is_empty() {
            let prg_ram_len = self.prg_ram.len();
            self.prg_ram[(address as usize) % prg_ram_len] = value;
            if self.has_ram_battery {
                self.prg_ram_dirty_bit = true;
            }
        }
    }

    fn get_chr_rom(&self, address: u32) -> u8 {
        self.chr_rom[(address as usize) % self.chr_rom.len()]
    }

    fn get_chr_ram(&self, address: u32) -> u8 {
        self.chr_ram[(address as usize) % self.chr_ram.len()]
    }

    fn set_chr_ram(&mut self, address: u32, value: u8) {
        let chr_ram_len = self.chr_ram.len();
        self.chr_ram[(address as usize) % chr_ram_len] = value;
    }

    fn clone_without_rom(&self) -> Self {
        Self {
            prg_rom: vec![],
            prg_ram: self.prg_ram.clone(),
            has_ram_battery: self.has_ram_battery,
            prg_ram_dirty_bit: self.prg_ram_dirty_bit,
            chr_rom: vec![],
            chr_ram: self.chr_ram.clone(),
            timing_mode: self.timing_mode,
        }
    }

    fn move_unserialized_fields_from(&mut self, other: &mut Self) {
        self.prg_rom = mem::take(&mut other.prg_rom);
        self.chr_rom = mem::take(&mut other.chr_rom);
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct MapperImpl<MapperData> {
    cartridge: Cartridge,
    nametables: Nametables,
    irq_line: IrqLine,
    data: MapperData,
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, Encode, Decode)]
enum MapperVariant {
    Axrom(MapperImpl<Axrom>),
    Bnrom(MapperImpl<Bnrom>),
    Cnrom(MapperImpl<Cnrom>),
    Gxrom(MapperImpl<Gxrom>),
    Mmc1(MapperImpl<Mmc1>),
    // Used for both MMC2 and MMC4 because they're almost exactly the same
    Mmc2(MapperImpl<Mmc2>),
    Mmc3(MapperImpl<Mmc3>),
    Mmc5(MapperImpl<Mmc5>),
    Nina001(MapperImpl<Nina001>),
    Nrom(MapperImpl<Nrom>),
    SunsoftFme7(MapperImpl<SunsoftFme7>),
    Uxrom(MapperImpl<Uxrom>),
    Vrc4(MapperImpl<Vrc4>),
    Vrc6(MapperImpl<Vrc6>),
    Vrc7(MapperImpl<Vrc7>),
}

macro_rules! match_each_variant {
    ($variant:expr, $inner:ident => $match_arm:expr) => {
        match $variant {
            MapperVariant::Axrom($inner) => $match_arm,
            MapperVariant::Bnrom($inner) => $match_arm,
            MapperVariant::Cnrom($inner) => $match_arm,
            MapperVariant::Gxrom($inner) => $match_arm,
            MapperVariant::Mmc1($inner) => $match_arm,
            MapperVariant::Mmc2($inner) => $match_arm,
            MapperVariant::Mmc3($inner) => $match_arm,
            MapperVariant::Mmc5($inner) => $match_arm,
            MapperVariant::Nina001($inner) => $match_arm,
            MapperVariant::Nrom($inner) => $match_arm,
            MapperVariant::SunsoftFme7($inner) => $match_arm,
            MapperVariant::Uxrom($inner) => $match_arm,
            MapperVariant::Vrc4($inner) => $match_arm,
            MapperVariant::Vrc6($inner) => $match_arm,
            MapperVariant::Vrc7($inner) => $match_arm,
        }
    };
    ($variant:expr, $inner:ident => :variant($match_arm:expr)) => {
        match $variant {
            MapperVariant::Axrom($inner) => MapperVariant::Axrom($match_arm),
            MapperVariant::Bnrom($inner) => MapperVariant::Bnrom($match_arm),
            MapperVariant::Cnrom($inner) => MapperVariant::Cnrom($match_arm),
            MapperVariant::Gxrom($inner) => MapperVariant::Gxrom($match_arm),
            MapperVariant::Mmc1($inner) => MapperVariant::Mmc1($match_arm),
            MapperVariant::Mmc2($inner) => MapperVariant::Mmc2($match_arm),
            MapperVariant::Mmc3($inner) => MapperVariant::Mmc3($match_arm),
            MapperVariant::Mmc5($inner) => MapperVariant::Mmc5($match_arm),
            MapperVariant::Nina001($inner) => MapperVariant::Nina001($match_arm),
            MapperVariant::Nrom($inner) => MapperVariant::Nrom($match_arm),
            MapperVariant::SunsoftFme7($inner) => MapperVariant::SunsoftFme7($match_arm),
            MapperVariant::Uxrom($inner) => MapperVariant::Uxrom($match_arm),
            MapperVariant::Vrc4($inner) => MapperVariant::Vrc4($match_arm),
            MapperVariant::Vrc6($inner) => MapperVariant::Vrc6($match_arm),
            MapperVariant::Vrc7($inner) => MapperVariant::Vrc7($match_arm),
        }
    };
}

/// A mapper board plus the cartridge memory it decodes. The concrete board is selected by
/// [`new_mapper`] and fixed for the cartridge's lifetime.
#[derive(Debug, Clone, Encode, Decode)]
pub struct Mapper {
    variant: MapperVariant,
}

impl Mapper {
    pub fn name(&self) -> &'static str {
        match &self.variant {
            MapperVariant::Axrom(..) => "AxROM",
            MapperVariant::Bnrom(..) => "BNROM",
            MapperVariant::Cnrom(..) => "CNROM",
            MapperVariant::Gxrom(gxrom) => gxrom.data.name(),
            MapperVariant::Mmc1(..) => "MMC1",
            MapperVariant::Mmc2(mmc2) => mmc2.data.name(),
            MapperVariant::Mmc3(..) => "MMC3",
            MapperVariant::Mmc5(..) => "MMC5",
            MapperVariant::Nina001(..) => "NINA-001",
            MapperVariant::Nrom(..) => "NROM",
            MapperVariant::SunsoftFme7(..) => "Sunsoft FME-7",
            MapperVariant::Uxrom(uxrom) => uxrom.data.name(),
            MapperVariant::Vrc4(vrc4) => vrc4.data.name(),
            MapperVariant::Vrc6(..) => "VRC6",
            MapperVariant::Vrc7(..) => "VRC7",
        }
    }

    pub fn timing_mode(&self) -> TimingMode {
        match_each_variant!(&self.variant, mapper => mapper.cartridge.timing_mode)
    }

    pub fn read_cpu_address(&mut self, address: u16, cpu_irq_line: &mut CpuIrqLine) -> u8 {
        let value = match_each_variant!(&mut self.variant, mapper => mapper.read_cpu_address(address));
        self.sync_irq(cpu_irq_line);
        value
    }

    pub fn write_cpu_address(&mut self, address: u16, value: u8, cpu_irq_line: &mut CpuIrqLine) {
        match_each_variant!(&mut self.variant, mapper => mapper.write_cpu_address(address, value));
        self.sync_irq(cpu_irq_line);
    }

    pub fn read_ppu_address(&mut self, address: u16, cpu_irq_line: &mut CpuIrqLine) -> u8 {
        let value = match_each_variant!(&mut self.variant, mapper => mapper.read_ppu_address(address));
        self.sync_irq(cpu_irq_line);
        value
    }

    pub fn write_ppu_address(&mut self, address: u16, value: u8) {
        match_each_variant!(&mut self.variant, mapper => mapper.write_ppu_address(address, value));
    }

    /// Notifies the mapper of a PPU address bus transition. MMC3 watches these for A12 rising
    /// edges; all other mappers ignore them.
    pub fn process_ppu_address(&mut self, address: u16, cpu_irq_line: &mut CpuIrqLine) {
        if let MapperVariant::Mmc3(mmc3) = &mut self.variant {
            mmc3.process_ppu_address(address);
        }
        self.sync_irq(cpu_irq_line);
    }

    pub fn tick_cpu(&mut self, cpu_cycles: u32, cpu_irq_line: &mut CpuIrqLine) {
        match &mut self.variant {
            MapperVariant::Mmc1(mmc1) => mmc1.tick_cpu(cpu_cycles),
            MapperVariant::Mmc3(mmc3) => mmc3.tick_cpu(cpu_cycles),
            MapperVariant::Mmc5(mmc5) => mmc5.tick_cpu(cpu_cycles),
            MapperVariant::SunsoftFme7(fme7) => fme7.tick_cpu(cpu_cycles),
            MapperVariant::Vrc4(vrc4) => vrc4.tick_cpu(cpu_cycles),
            MapperVariant::Vrc6(vrc6) => vrc6.tick_cpu(cpu_cycles),
            MapperVariant::Vrc7(vrc7) => vrc7.tick_cpu(cpu_cycles),
            _ => {}
        }
        self.sync_irq(cpu_irq_line);
    }

    /// Notifies the mapper that the PPU finished rendering a scanline. Only MMC5 cares, and only
    /// while rendering is active.
    pub fn notify_scanline(&mut self, rendering_active: bool, cpu_irq_line: &mut CpuIrqLine) {
        if let MapperVariant::Mmc5(mmc5) = &mut self.variant {
            mmc5.notify_scanline(rendering_active);
        }
        self.sync_irq(cpu_irq_line);
    }

    pub fn process_ppu_ctrl_update(&mut self, value: u8) {
        if let MapperVariant::Mmc5(mmc5) = &mut self.variant {
            mmc5.process_ppu_ctrl_update(value);
        }
    }

    /// Must be called *before* the actual memory access; MMC5 depends on this for correctly
    /// mapping PPUDATA accesses to the correct CHR bank.
    pub fn about_to_access_ppu_data(&mut self) {
        if let MapperVariant::Mmc5(mmc5) = &mut self.variant {
            mmc5.about_to_access_ppu_data();
        }
    }

    fn interrupt_flag(&self) -> bool {
        match &self.variant {
            MapperVariant::Mmc3(mmc3) => mmc3.interrupt_flag(),
            MapperVariant::Mmc5(mmc5) => mmc5.interrupt_flag(),
            MapperVariant::SunsoftFme7(fme7) => fme7.interrupt_flag(),
            MapperVariant::Vrc4(vrc4) => vrc4.interrupt_flag(),
            MapperVariant::Vrc6(vrc6) => vrc6.interrupt_flag(),
            MapperVariant::Vrc7(vrc7) => vrc7.interrupt_flag(),
            _ => false,
        }
    }

    // Reconciles the board's IRQ output with the shared CPU IRQ line. IrqLine only touches the
    // pull counter on level changes, so a board asserting across many calls pulls exactly once.
    fn sync_irq(&mut self, cpu_irq_line: &mut CpuIrqLine) {
        let asserting = self.interrupt_flag();
        match_each_variant!(&mut self.variant, mapper => mapper.irq_line.set(asserting, cpu_irq_line));
    }

    /// Soft reset: mapper registers return to their power-on state, RAM contents survive, and any
    /// live IRQ assertion is released.
    pub fn reset(&mut self, cpu_irq_line: &mut CpuIrqLine) {
        match_each_variant!(&mut self.variant, mapper => mapper.reset());
        self.sync_irq(cpu_irq_line);
    }

    /// The expansion audio chip attached by this board, if a register write has created one.
    pub fn expansion_audio(&mut self) -> Option<&mut dyn ExpansionAudioChip> {
        match &mut self.variant {
            MapperVariant::SunsoftFme7(fme7) => {
                fme7.data.audio().chip_mut().map(|chip| chip as &mut dyn ExpansionAudioChip)
            }
            MapperVariant::Vrc6(vrc6) => {
                vrc6.data.audio().chip_mut().map(|chip| chip as &mut dyn ExpansionAudioChip)
            }
            MapperVariant::Vrc7(vrc7) => {
                vrc7.data.audio().chip_mut().map(|chip| chip as &mut dyn ExpansionAudioChip)
            }
            _ => None,
        }
    }

    pub fn get_prg_ram(&self) -> &[u8] {
        match_each_variant!(&self.variant, mapper => &mapper.cartridge.prg_ram)
    }

    pub fn get_and_clear_ram_dirty_bit(&mut self) -> bool {
        match_each_variant!(&mut self.variant, mapper => {
            let dirty_bit = mapper.cartridge.prg_ram_dirty_bit;
            mapper.cartridge.prg_ram_dirty_bit = false;
            dirty_bit
        })
    }

    /// Copy of this mapper with the ROM images stripped out, for writing save states without
    /// serializing megabytes of unchanging ROM.
    pub fn clone_without_rom(&self) -> Self {
        let variant = match_each_variant!(
            &self.variant,
            mapper => :variant(MapperImpl {
                cartridge: mapper.cartridge.clone_without_rom(),
                nametables: mapper.nametables.clone(),
                irq_line: mapper.irq_line.clone(),
                data: mapper.data.clone(),
            })
        );
        Self { variant }
    }

    /// Re-marries a deserialized save state to the ROM images of the currently loaded cartridge.
    pub fn move_unserialized_fields_from(&mut self, other: &mut Self) {
        let other_cartridge = match_each_variant!(&mut other.variant, mapper => &mut mapper.cartridge);
        match_each_variant!(&mut self.variant, mapper => mapper.cartridge.move_unserialized_fields_from(other_cartridge));
    }
}

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("unsupported mapper: {mapper_number}")]
    UnsupportedMapper { mapper_number: u16 },
    #[error("PRG ROM length {len} is not a non-zero multiple of 1024")]
    InvalidPrgRomLength { len: usize },
    #[error("CHR memory length {len} is not a non-zero multiple of 1024")]
    InvalidChrMemoryLength { len: usize },
}

/// Parsed cartridge header fields, supplied by the ROM loader.
#[derive(Debug, Clone)]
pub struct RomHeader {
    pub mapper_number: u16,
    pub sub_mapper_number: u8,
    pub prg_ram_len: u32,
    pub chr_ram_len: u32,
    pub nametable_mirroring: NametableMirroring,
    pub has_four_screen_vram: bool,
    pub has_battery: bool,
    pub timing_mode: TimingMode,
}

/// Builds the mapper board described by the header, taking ownership of the ROM images.
///
/// `sav_bytes` is previously persisted battery RAM; it is used only if its length matches the
/// header's PRG RAM size.
pub fn new_mapper(
    header: &RomHeader,
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
    sav_bytes: Option<Vec<u8>>,
) -> Result<Mapper, CartridgeError> {
    if prg_rom.is_empty() || prg_rom.len() % 1024 != 0 {
        return Err(CartridgeError::InvalidPrgRomLength { len: prg_rom.len() });
    }

    let chr_type = if chr_rom.is_empty() { ChrType::RAM } else { ChrType::ROM };
    let chr_ram_len = match chr_type {
        ChrType::ROM => 0,
        // Some headers don't specify a CHR RAM size; default to 8KB
        ChrType::RAM => {
            if header.chr_ram_len != 0 {
                header.chr_ram_len
            } else {
                8 * 1024
            }
        }
    };
    let chr_len = match chr_type {
        ChrType::ROM => chr_rom.len() as u32,
        ChrType::RAM => chr_ram_len,
    };
    if chr_len == 0 || chr_len % 1024 != 0 {
        return Err(CartridgeError::InvalidChrMemoryLength { len: chr_len as usize });
    }

    let quirk = quirks::lookup(&prg_rom);

    let mut nametable_mirroring = header.nametable_mirroring;
    let mut has_four_screen_vram = header.has_four_screen_vram;
    let mut prg_ram_len = header.prg_ram_len;
    match quirk {
        Some(CartridgeQuirk::ForceFourScreenVram) => {
            has_four_screen_vram = true;
        }
        Some(CartridgeQuirk::ForceMirroring(mirroring)) => {
            nametable_mirroring = mirroring;
        }
        Some(CartridgeQuirk::DisablePrgRam) => {
            prg_ram_len = 0;
        }
        None => {}
    }
    if has_four_screen_vram {
        nametable_mirroring = NametableMirroring::FourScreen;
    }

    let prg_ram = match sav_bytes {
        Some(sav_bytes) if sav_bytes.len() == prg_ram_len as usize => sav_bytes,
        _ => vec![0; prg_ram_len as usize],
    };

    let cartridge = Cartridge {
        prg_rom,
        prg_ram,
        has_ram_battery: header.has_battery,
        prg_ram_dirty_bit: false,
        chr_rom,
        chr_ram: vec![0; chr_ram_len as usize],
        timing_mode: header.timing_mode,
    };
    let prg_rom_len = cartridge.prg_rom.len() as u32;
    let chr_rom_len = cartridge.chr_rom.len() as u32;

    // MMC5 ExRAM and four-screen boards both live in the extra nametable RAM
    let has_extra_nametable_ram = has_four_screen_vram || header.mapper_number == 5;
    let nametables = Nametables::new(nametable_mirroring, has_extra_nametable_ram);
    let irq_line = IrqLine::new();

    let variant = match header.mapper_number {
        0 => MapperVariant::Nrom(MapperImpl {
            cartridge,
            nametables,
            irq_line,
            data: Nrom::new(chr_type, prg_rom_len, chr_len),
        }),
        1 => MapperVariant::Mmc1(MapperImpl {
            cartridge,
            nametables,
            irq_line,
            data: Mmc1::new(chr_type, prg_rom_len, chr_len),
        }),
        2 | 71 => {
            let variant = match (header.mapper_number, header.sub_mapper_number) {
                (2, _) => UxromVariant::Uxrom,
                (71, 1) => UxromVariant::FireHawk,
                (71, _) => UxromVariant::Codemasters,
                _ => unreachable!("outer match guarantees mapper number is 2 or 71"),
            };
            MapperVariant::Uxrom(MapperImpl {
                cartridge,
                nametables,
                irq_line,
                data: Uxrom::new(variant, chr_type, prg_rom_len, chr_len),
            })
        }
        3 => MapperVariant::Cnrom(MapperImpl {
            cartridge,
            nametables,
            irq_line,
            data: Cnrom::new(chr_type, prg_rom_len, chr_len),
        }),
        4 => MapperVariant::Mmc3(MapperImpl {
            cartridge,
            nametables,
            irq_line,
            data: Mmc3::new(chr_type, prg_rom_len, chr_len),
        }),
        5 => MapperVariant::Mmc5(MapperImpl {
            cartridge,
            nametables,
            irq_line,
            data: Mmc5::new(chr_type, chr_len),
        }),
        7 => MapperVariant::Axrom(MapperImpl {
            cartridge,
            nametables,
            irq_line,
            data: Axrom::new(chr_type, prg_rom_len, chr_len),
        }),
        9 => MapperVariant::Mmc2(MapperImpl {
            cartridge,
            nametables,
            irq_line,
            data: Mmc2::new(Mmc2Variant::Mmc2, chr_type, prg_rom_len, chr_len),
        }),
        10 => MapperVariant::Mmc2(MapperImpl {
            cartridge,
            nametables,
            irq_line,
            data: Mmc2::new(Mmc2Variant::Mmc4, chr_type, prg_rom_len, chr_len),
        }),
        11 | 66 => {
            let variant = if header.mapper_number == 11 {
                GxromVariant::ColorDreams
            } else {
                GxromVariant::Gxrom
            };
            MapperVariant::Gxrom(MapperImpl {
                cartridge,
                nametables,
                irq_line,
                data: Gxrom::new(variant, chr_type, prg_rom_len, chr_len),
            })
        }
        21 | 22 | 23 | 25 => {
            // Each mapper number wired the VRC chip's register select inputs to different CPU
            // address lines; boards within a number differ only in which of the listed lines
            // they use, so the masks OR all of them together
            let (kind, a0_mask, a1_mask, chr_bank_shift) = match header.mapper_number {
                21 => (VrcKind::Vrc4, 0x02 | 0x40, 0x04 | 0x80, 0),
                22 => (VrcKind::Vrc2, 0x02, 0x01, 1),
                23 => (VrcKind::Vrc4, 0x01 | 0x04, 0x02 | 0x08, 0),
                25 => (VrcKind::Vrc4, 0x02 | 0x08, 0x01 | 0x04, 0),
                _ => unreachable!("outer match guarantees mapper number is 21/22/23/25"),
            };
            MapperVariant::Vrc4(MapperImpl {
                cartridge,
                nametables,
                irq_line,
                data: Vrc4::new(
                    kind,
                    a0_mask,
                    a1_mask,
                    chr_bank_shift,
                    chr_type,
                    prg_rom_len,
                    chr_len,
                ),
            })
        }
        24 | 26 => {
            let variant =
                if header.mapper_number == 24 { Vrc6Variant::Vrc6a } else { Vrc6Variant::Vrc6b };
            MapperVariant::Vrc6(MapperImpl {
                cartridge,
                nametables,
                irq_line,
                data: Vrc6::new(variant, chr_type, prg_rom_len, chr_len),
            })
        }
        34 => {
            // Two unrelated boards share mapper 34; NINA-001 carries CHR ROM while BNROM has
            // only CHR RAM
            if chr_rom_len != 0 {
                MapperVariant::Nina001(MapperImpl {
                    cartridge,
                    nametables,
                    irq_line,
                    data: Nina001::new(prg_rom_len, chr_rom_len),
                })
            } else {
                MapperVariant::Bnrom(MapperImpl {
                    cartridge,
                    nametables,
                    irq_line,
                    data: Bnrom::new(prg_rom_len, chr_len),
                })
            }
        }
        69 => MapperVariant::SunsoftFme7(MapperImpl {
            cartridge,
            nametables,
            irq_line,
            data: SunsoftFme7::new(chr_type, prg_rom_len, chr_len),
        }),
        85 => {
            let variant = match header.sub_mapper_number {
                2 => Vrc7Variant::Vrc7a,
                _ => Vrc7Variant::Vrc7b,
            };
            MapperVariant::Vrc7(MapperImpl {
                cartridge,
                nametables,
                irq_line,
                data: Vrc7::new(variant, chr_type, prg_rom_len, chr_len),
            })
        }
        _ => {
            return Err(CartridgeError::UnsupportedMapper { mapper_number: header.mapper_number });
        }
    };

    let mapper = Mapper { variant };

    log::info!("Mapper number: {} ({})", header.mapper_number, mapper.name());
    log::info!("PRG ROM size: {prg_rom_len}");
    log::info!("PRG RAM size: {prg_ram_len}");
    log::info!("Cartridge has battery-backed PRG RAM: {}", header.has_battery);
    log::info!("CHR ROM size: {chr_rom_len}");
    log::info!("CHR RAM size: {chr_ram_len}");
    log::info!("CHR memory type: {chr_type:?}");
    log::info!(
        "Hardwired nametable mirroring: {nametable_mirroring:?} (not applicable to all mappers)"
    );
    log::info!("Has 4-screen nametable VRAM: {has_four_screen_vram}");
    log::info!("TV timing mode: {:?}", header.timing_mode);

    Ok(mapper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::mappers::fixtures;

    fn header(mapper_number: u16) -> RomHeader {
        RomHeader {
            mapper_number,
            sub_mapper_number: 0,
            prg_ram_len: 8192,
            chr_ram_len: 0,
            nametable_mirroring: NametableMirroring::Vertical,
            has_four_screen_vram: false,
            has_battery: false,
            timing_mode: TimingMode::Ntsc,
        }
    }

    #[test]
    fn factory_rejects_unknown_mapper_numbers() {
        let result = new_mapper(&header(191), fixtures::stamped_rom(32 * 1024), vec![], None);
        assert!(matches!(result, Err(CartridgeError::UnsupportedMapper { mapper_number: 191 })));
    }

    #[test]
    fn factory_rejects_empty_prg_rom() {
        let result = new_mapper(&header(0), vec![], vec![], None);
        assert!(matches!(result, Err(CartridgeError::InvalidPrgRomLength { len: 0 })));
    }

    #[test]
    fn mapper_34_selects_board_by_chr_rom_presence() {
        let with_chr_rom = new_mapper(
            &header(34),
            fixtures::stamped_rom(64 * 1024),
            fixtures::stamped_rom(32 * 1024),
            None,
        )
        .unwrap();
        assert_eq!(with_chr_rom.name(), "NINA-001");

        let without_chr_rom =
            new_mapper(&header(34), fixtures::stamped_rom(64 * 1024), vec![], None).unwrap();
        assert_eq!(without_chr_rom.name(), "BNROM");
    }

    #[test]
    fn irq_line_pulls_once_per_assertion_and_releases_once() {
        let mut mapper = new_mapper(
            &header(69),
            fixtures::stamped_rom(128 * 1024),
            fixtures::stamped_rom(128 * 1024),
            None,
        )
        .unwrap();
        let mut cpu_irq_line = CpuIrqLine::new();

        // FME-7 IRQ: zero the counter, then enable both the IRQ output and the counter so it
        // triggers on the next underflow
        mapper.write_cpu_address(0x8000, 0x0E, &mut cpu_irq_line);
        mapper.write_cpu_address(0xA000, 0x00, &mut cpu_irq_line);
        mapper.write_cpu_address(0x8000, 0x0F, &mut cpu_irq_line);
        mapper.write_cpu_address(0xA000, 0x00, &mut cpu_irq_line);
        mapper.write_cpu_address(0x8000, 0x0D, &mut cpu_irq_line);
        mapper.write_cpu_address(0xA000, 0x81, &mut cpu_irq_line);
        assert!(!cpu_irq_line.asserted());

        mapper.tick_cpu(1, &mut cpu_irq_line);
        assert!(cpu_irq_line.asserted());
        assert_eq!(cpu_irq_line.pull_count(), 1);

        // Staying asserted across further contract calls must not pull again
        mapper.tick_cpu(5, &mut cpu_irq_line);
        mapper.read_cpu_address(0x8000, &mut cpu_irq_line);
        assert_eq!(cpu_irq_line.pull_count(), 1);

        // Acknowledging through the IRQ control register releases exactly once
        mapper.write_cpu_address(0x8000, 0x0D, &mut cpu_irq_line);
        mapper.write_cpu_address(0xA000, 0x81, &mut cpu_irq_line);
        assert!(!cpu_irq_line.asserted());
        assert_eq!(cpu_irq_line.pull_count(), 0);

        mapper.write_cpu_address(0xA000, 0x81, &mut cpu_irq_line);
        assert_eq!(cpu_irq_line.pull_count(), 0);
    }

    #[test]
    fn reset_releases_live_irq_assertion() {
        let mut mapper = new_mapper(
            &header(69),
            fixtures::stamped_rom(128 * 1024),
            fixtures::stamped_rom(128 * 1024),
            None,
        )
        .unwrap();
        let mut cpu_irq_line = CpuIrqLine::new();

        mapper.write_cpu_address(0x8000, 0x0D, &mut cpu_irq_line);
        mapper.write_cpu_address(0xA000, 0x81, &mut cpu_irq_line);
        mapper.tick_cpu(1, &mut cpu_irq_line);
        assert!(cpu_irq_line.asserted());

        mapper.reset(&mut cpu_irq_line);
        assert!(!cpu_irq_line.asserted());
    }

    #[test]
    fn clone_without_rom_round_trips_through_move() {
        let mut cpu_irq_line = CpuIrqLine::new();
        let mut mapper = new_mapper(
            &header(0),
            fixtures::stamped_rom(32 * 1024),
            fixtures::stamped_rom(8 * 1024),
            None,
        )
        .unwrap();
        mapper.write_cpu_address(0x6000, 0x42, &mut cpu_irq_line);

        let mut stripped = mapper.clone_without_rom();
        assert!(stripped.get_prg_ram().contains(&0x42));

        stripped.move_unserialized_fields_from(&mut mapper);
        assert_eq!(stripped.read_cpu_address(0x6000, &mut cpu_irq_line), 0x42);
        assert_eq!(stripped.read_cpu_address(0x8400, &mut cpu_irq_line), 1);
    }

    #[test]
    fn quirk_free_roms_use_header_mirroring() {
        let mut mapper = new_mapper(
            &header(0),
            fixtures::stamped_rom(32 * 1024),
            fixtures::stamped_rom(8 * 1024),
            None,
        )
        .unwrap();
        let mut cpu_irq_line = CpuIrqLine::new();

        // Vertical mirroring: $2000 and $2800 alias the same physical nametable
        mapper.write_ppu_address(0x2005, 0x99);
        assert_eq!(mapper.read_ppu_address(0x2805, &mut cpu_irq_line), 0x99);
    }
}

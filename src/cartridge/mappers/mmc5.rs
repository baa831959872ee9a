//! Code for the MMC5 board (iNES mapper 5), used by Castlevania III among others.
//!
//! The MMC5 watches the PPU bus to figure out what the PPU is doing: three consecutive fetches
//! of the same nametable address only happen at the start of a scanline's attribute fetch
//! pattern, so that is used to detect that rendering is in progress, and counted scanlines
//! drive the IRQ comparison. The scanline counter itself advances on per-scanline
//! notifications from the PPU while rendering is active.

use bincode::{Decode, Encode};

use crate::cartridge::banks::{BankSizeKb, ChrBankMap};
use crate::cartridge::mappers::{cpu_open_bus, ChrType};
use crate::cartridge::nametables::NametableSlot;
use crate::cartridge::MapperImpl;
use crate::num::GetBit;

const EXTENDED_RAM_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum PrgMode {
    Mode0,
    Mode1,
    Mode2,
    Mode3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum ExtendedRamMode {
    Nametable,
    NametableExtendedAttributes,
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum ChrRegisterSet {
    Sprite,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum TileType {
    Background,
    Sprite,
}

/// One 8KB CPU window in $6000-$FFFF; bank number is in 8KB units, pre-resolved from the
/// current PRG mode.
#[derive(Debug, Clone, Copy, Encode, Decode)]
struct PrgWindow {
    rom: bool,
    bank: u8,
}

impl PrgWindow {
    fn rom(register: u8) -> Self {
        Self { rom: true, bank: register & 0x7F }
    }

    fn rom_or_ram(register: u8) -> Self {
        if register.bit(7) {
            Self { rom: true, bank: register & 0x7F }
        } else {
            Self { rom: false, bank: register & 0x0F }
        }
    }

    fn ram(register: u8) -> Self {
        Self { rom: false, bank: register & 0x0F }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
struct MultiplierUnit {
    operand_l: u8,
    operand_r: u8,
}

impl MultiplierUnit {
    fn new() -> Self {
        Self { operand_l: 0xFF, operand_r: 0xFF }
    }

    fn product(&self) -> u16 {
        u16::from(self.operand_l) * u16::from(self.operand_r)
    }
}

/// Scanline tracking state.
///
/// `in_frame` is driven by the nametable fetch heuristic and cleared when the PPU bus goes
/// idle or the NMI vector is fetched. The scanline number itself advances on rendered-line
/// notifications while in frame.
#[derive(Debug, Clone, Encode, Decode)]
struct ScanlineCounter {
    in_frame: bool,
    scanline: u8,
    compare_value: u8,
    irq_pending: bool,
    last_nametable_addr: u16,
    same_nametable_addr_count: u8,
    tile_byte_fetches: u8,
    ppu_idle_cpu_ticks: u8,
}

impl ScanlineCounter {
    fn new() -> Self {
        Self {
            in_frame: false,
            scanline: 0,
            compare_value: 0,
            irq_pending: false,
            last_nametable_addr: 0,
            same_nametable_addr_count: 0,
            tile_byte_fetches: 0,
            ppu_idle_cpu_ticks: 0,
        }
    }

    fn nametable_address_fetched(&mut self, address: u16) {
        if address == self.last_nametable_addr {
            self.same_nametable_addr_count += 1;
            // Three consecutive fetches of the same nametable address mark the start of a
            // rendered scanline
            if self.same_nametable_addr_count == 3 {
                self.same_nametable_addr_count = 0;
                self.tile_byte_fetches = 0;
                if !self.in_frame {
                    self.in_frame = true;
                    self.scanline = 0;
                }
            }
        } else {
            self.last_nametable_addr = address;
            self.same_nametable_addr_count = 1;
        }
    }

    fn pattern_byte_fetched(&mut self) {
        if !self.in_frame {
            return;
        }
        // 34 background tiles (2 pattern bytes each) then 8 sprites (2 bytes each)
        self.tile_byte_fetches = (self.tile_byte_fetches + 1) % (68 + 16);
    }

    fn current_tile_type(&self) -> TileType {
        if self.tile_byte_fetches < 68 { TileType::Background } else { TileType::Sprite }
    }

    fn scanline_rendered(&mut self, rendering_active: bool) {
        if !rendering_active {
            self.in_frame = false;
            return;
        }

        if self.in_frame {
            self.scanline = self.scanline.wrapping_add(1);
            if self.compare_value != 0 && self.scanline == self.compare_value {
                self.irq_pending = true;
            }
        }
    }

    fn ppu_bus_accessed(&mut self) {
        self.ppu_idle_cpu_ticks = 0;
    }

    fn tick_cpu(&mut self, cpu_cycles: u32) {
        if self.in_frame {
            self.ppu_idle_cpu_ticks = self.ppu_idle_cpu_ticks.saturating_add(cpu_cycles as u8);
            // The PPU fetches continuously while rendering; a few idle CPU cycles mean
            // rendering has stopped
            if self.ppu_idle_cpu_ticks >= 3 {
                self.in_frame = false;
                self.tile_byte_fetches = 0;
            }
        }
    }

    fn nmi_vector_fetched(&mut self) {
        self.in_frame = false;
        self.scanline = 0;
        self.irq_pending = false;
    }

    fn status(&mut self) -> u8 {
        let status = (u8::from(self.irq_pending) << 7) | (u8::from(self.in_frame) << 6);
        self.irq_pending = false;
        status
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Mmc5 {
    chr_type: ChrType,
    prg_mode: PrgMode,
    prg_bank_registers: [u8; 5],
    prg_windows: [PrgWindow; 5],
    ram_write_enable_1: bool,
    ram_write_enable_2: bool,
    chr_bank_size: BankSizeKb,
    sprite_chr_banks: [u8; 8],
    bg_chr_banks: [u8; 4],
    last_chr_register_set: ChrRegisterSet,
    next_access_from_ppu_data: bool,
    double_height_sprites: bool,
    extended_ram_mode: ExtendedRamMode,
    multiplier: MultiplierUnit,
    scanline_counter: ScanlineCounter,
    irq_enabled: bool,
    sprite_chr_map: ChrBankMap,
    bg_chr_map: ChrBankMap,
}

impl Mmc5 {
    pub(crate) fn new(chr_type: ChrType, chr_len: u32) -> Self {
        let mut mmc5 = Self {
            chr_type,
            prg_mode: PrgMode::Mode3,
            // $5117 powers on as $FF so the reset vector reads from the last PRG bank
            prg_bank_registers: [0x00, 0x00, 0x00, 0x00, 0xFF],
            prg_windows: [PrgWindow { rom: true, bank: 0 }; 5],
            ram_write_enable_1: false,
            ram_write_enable_2: false,
            chr_bank_size: BankSizeKb::Eight,
            sprite_chr_banks: [0; 8],
            bg_chr_banks: [0; 4],
            last_chr_register_set: ChrRegisterSet::Sprite,
            next_access_from_ppu_data: false,
            double_height_sprites: false,
            extended_ram_mode: ExtendedRamMode::ReadOnly,
            multiplier: MultiplierUnit::new(),
            scanline_counter: ScanlineCounter::new(),
            irq_enabled: false,
            sprite_chr_map: ChrBankMap::new(chr_len),
            bg_chr_map: ChrBankMap::new(chr_len),
        };
        mmc5.rebuild_prg_windows();
        mmc5.rebuild_sprite_chr_map();
        mmc5.rebuild_bg_chr_map();
        mmc5
    }

    fn rebuild_prg_windows(&mut self) {
        let r = self.prg_bank_registers;

        // $6000-$7FFF always maps PRG RAM
        self.prg_windows[0] = PrgWindow::ram(r[0]);

        match self.prg_mode {
            PrgMode::Mode0 => {
                // One 32KB ROM bank
                let base = (r[4] & 0x7F) & !0x03;
                for i in 0..4 {
                    self.prg_windows[1 + usize::from(i)] = PrgWindow::rom(base + i);
                }
            }
            PrgMode::Mode1 => {
                // Two 16KB banks; the upper one is always ROM
                for i in 0..2 {
                    let low = PrgWindow::rom_or_ram((r[2] & !0x01) + i);
                    let high = PrgWindow::rom((r[4] & !0x01) + i);
                    self.prg_windows[1 + usize::from(i)] = low;
                    self.prg_windows[3 + usize::from(i)] = high;
                }
            }
            PrgMode::Mode2 => {
                // 16KB + 8KB + 8KB; only the top window is forced to ROM
                for i in 0..2 {
                    self.prg_windows[1 + usize::from(i)] = PrgWindow::rom_or_ram((r[2] & !0x01) + i);
                }
                self.prg_windows[3] = PrgWindow::rom_or_ram(r[3]);
                self.prg_windows[4] = PrgWindow::rom(r[4]);
            }
            PrgMode::Mode3 => {
                // Four 8KB banks
                self.prg_windows[1] = PrgWindow::rom_or_ram(r[1]);
                self.prg_windows[2] = PrgWindow::rom_or_ram(r[2]);
                self.prg_windows[3] = PrgWindow::rom_or_ram(r[3]);
                self.prg_windows[4] = PrgWindow::rom(r[4]);
            }
        }
    }

    fn rebuild_sprite_chr_map(&mut self) {
        let size = self.chr_bank_size;
        let windows_per_bank = size.window_count();
        for window in 0..8_usize {
            // The highest register covering each window applies
            let register = self.sprite_chr_banks[window | (windows_per_bank - 1)];
            let offset = (u32::from(register) << size.shift())
                + (window % windows_per_bank) as u32 * 1024;
            self.sprite_chr_map.map_window((window as u16) << 10, offset);
        }
    }

    fn rebuild_bg_chr_map(&mut self) {
        // Background registers only span 4KB; the mapping repeats in both pattern table halves
        let size = match self.chr_bank_size {
            BankSizeKb::Eight => BankSizeKb::Four,
            other => other,
        };
        let windows_per_bank = size.window_count();
        for window in 0..8_usize {
            let half_window = window % 4;
            let register = self.bg_chr_banks[half_window | (windows_per_bank - 1)];
            let offset = (u32::from(register) << size.shift())
                + (half_window % windows_per_bank) as u32 * 1024;
            self.bg_chr_map.map_window((window as u16) << 10, offset);
        }
    }

    fn ram_writes_enabled(&self) -> bool {
        self.ram_write_enable_1 && self.ram_write_enable_2
    }

    fn extended_attributes_active(&self) -> bool {
        self.extended_ram_mode == ExtendedRamMode::NametableExtendedAttributes
    }

    fn active_pattern_map(&self) -> &ChrBankMap {
        if self.next_access_from_ppu_data {
            match self.last_chr_register_set {
                ChrRegisterSet::Sprite => &self.sprite_chr_map,
                ChrRegisterSet::Background => &self.bg_chr_map,
            }
        } else if self.double_height_sprites
            && self.scanline_counter.current_tile_type() == TileType::Background
        {
            &self.bg_chr_map
        } else {
            &self.sprite_chr_map
        }
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.irq_enabled && self.scanline_counter.irq_pending
    }
}

impl MapperImpl<Mmc5> {
    fn extended_ram(&self) -> &[u8] {
        &self.nametables.extra_ram()[..EXTENDED_RAM_LEN]
    }

    fn extended_ram_mut(&mut self) -> &mut [u8] {
        &mut self.nametables.extra_ram_mut()[..EXTENDED_RAM_LEN]
    }

    fn prg_map_result(&self, address: u16) -> (PrgWindow, u32) {
        debug_assert!(address >= 0x6000);
        let window = self.data.prg_windows[usize::from((address - 0x6000) >> 13)];
        let bank_address = (u32::from(window.bank) << 13) | u32::from(address & 0x1FFF);
        (window, bank_address)
    }

    pub(crate) fn read_cpu_address(&mut self, address: u16) -> u8 {
        match address {
            0x0000..=0x401F => panic!("invalid CPU map address: 0x{address:04X}"),
            0x4020..=0x50FF => cpu_open_bus(address),
            0x5204 => {
                let status = self.data.scanline_counter.status();
                status | (cpu_open_bus(address) & 0x3F)
            }
            0x5205 => (self.data.multiplier.product() & 0x00FF) as u8,
            0x5206 => (self.data.multiplier.product() >> 8) as u8,
            0x5100..=0x5BFF => cpu_open_bus(address),
            0x5C00..=0x5FFF => match self.data.extended_ram_mode {
                ExtendedRamMode::ReadWrite | ExtendedRamMode::ReadOnly => {
                    self.extended_ram()[usize::from(address & 0x03FF)]
                }
                ExtendedRamMode::Nametable | ExtendedRamMode::NametableExtendedAttributes => {
                    cpu_open_bus(address)
                }
            },
            0x6000..=0xFFFF => {
                if address == 0xFFFA || address == 0xFFFB {
                    self.data.scanline_counter.nmi_vector_fetched();
                }

                let (window, bank_address) = self.prg_map_result(address);
                if window.rom {
                    self.cartridge.get_prg_rom(bank_address)
                } else {
                    self.cartridge.get_prg_ram(bank_address)
                }
            }
        }
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x401F => panic!("invalid CPU map address: 0x{address:04X}"),
            0x4020..=0x50FF => {}
            0x5100 => {
                self.data.prg_mode = match value & 0x03 {
                    0x00 => PrgMode::Mode0,
                    0x01 => PrgMode::Mode1,
                    0x02 => PrgMode::Mode2,
                    0x03 => PrgMode::Mode3,
                    _ => unreachable!("value & 0x03 is always <= 0x03"),
                };
                self.data.rebuild_prg_windows();
            }
            0x5101 => {
                self.data.chr_bank_size = match value & 0x03 {
                    0x00 => BankSizeKb::Eight,
                    0x01 => BankSizeKb::Four,
                    0x02 => BankSizeKb::Two,
                    0x03 => BankSizeKb::One,
                    _ => unreachable!("value & 0x03 is always <= 0x03"),
                };
                self.data.rebuild_sprite_chr_map();
                self.data.rebuild_bg_chr_map();
            }
            0x5102 => self.data.ram_write_enable_1 = value & 0x03 == 0x02,
            0x5103 => self.data.ram_write_enable_2 = value & 0x03 == 0x01,
            0x5104 => {
                self.data.extended_ram_mode = match value & 0x03 {
                    0x00 => ExtendedRamMode::Nametable,
                    0x01 => ExtendedRamMode::NametableExtendedAttributes,
                    0x02 => ExtendedRamMode::ReadWrite,
                    0x03 => ExtendedRamMode::ReadOnly,
                    _ => unreachable!("value & 0x03 is always <= 0x03"),
                };
            }
            0x5105 => {
                let slot = |bits: u8| match bits & 0x03 {
                    0x00 => NametableSlot::Ciram0,
                    0x01 => NametableSlot::Ciram1,
                    0x02 => NametableSlot::ExtRam0,
                    0x03 => NametableSlot::Fill,
                    _ => unreachable!("bits & 0x03 is always <= 0x03"),
                };
                self.nametables.set_slots([
                    slot(value),
                    slot(value >> 2),
                    slot(value >> 4),
                    slot(value >> 6),
                ]);
            }
            0x5106 => self.nametables.set_fill_tile(value),
            0x5107 => self.nametables.set_fill_attributes(value),
            0x5113..=0x5117 => {
                self.data.prg_bank_registers[usize::from(address - 0x5113)] = value;
                self.data.rebuild_prg_windows();
            }
            0x5120..=0x5127 => {
                self.data.sprite_chr_banks[usize::from(address - 0x5120)] = value;
                self.data.last_chr_register_set = ChrRegisterSet::Sprite;
                self.data.rebuild_sprite_chr_map();
            }
            0x5128..=0x512B => {
                self.data.bg_chr_banks[usize::from(address - 0x5128)] = value;
                self.data.last_chr_register_set = ChrRegisterSet::Background;
                self.data.rebuild_bg_chr_map();
            }
            0x5200 => {
                if value.bit(7) {
                    log::warn!("MMC5 vertical split mode enabled; vertical split is not emulated");
                }
            }
            0x5203 => self.data.scanline_counter.compare_value = value,
            0x5204 => self.data.irq_enabled = value.bit(7),
            0x5205 => self.data.multiplier.operand_l = value,
            0x5206 => self.data.multiplier.operand_r = value,
            0x5000..=0x5BFF => {}
            0x5C00..=0x5FFF => {
                if self.data.extended_ram_mode != ExtendedRamMode::ReadOnly {
                    self.extended_ram_mut()[usize::from(address & 0x03FF)] = value;
                }
            }
            0x6000..=0xFFFF => {
                let writes_enabled = self.data.ram_writes_enabled();
                let (window, bank_address) = self.prg_map_result(address);
                if !window.rom && writes_enabled {
                    self.cartridge.set_prg_ram(bank_address, value);
                }
            }
        }
    }

    fn read_pattern_byte(&mut self, address: u16) -> u8 {
        // In extended attribute mode, background pattern fetches come from a 4KB bank chosen
        // by the extended attribute byte of the most recently fetched tile
        if self.data.extended_attributes_active()
            && !self.data.next_access_from_ppu_data
            && self.data.scanline_counter.current_tile_type() == TileType::Background
            && self.data.scanline_counter.in_frame
        {
            let attr_byte =
                self.extended_ram()[usize::from(self.data.scanline_counter.last_nametable_addr & 0x03FF)];
            let bank = u32::from(attr_byte & 0x3F);
            let chr_address = (bank << 12) | u32::from(address & 0x0FFF);
            return self
                .data
                .chr_type
                .to_map_result(chr_address)
                .read(&self.cartridge, &self.nametables);
        }

        let chr_address = self.data.active_pattern_map().resolve(address);
        self.data
            .chr_type
            .to_map_result(chr_address)
            .read(&self.cartridge, &self.nametables)
    }

    fn read_nametable_byte(&mut self, address: u16) -> u8 {
        let relative_offset = address & 0x03FF;

        if !self.data.next_access_from_ppu_data && address <= 0x2FFF {
            if relative_offset < 0x03C0 {
                self.data.scanline_counter.nametable_address_fetched(address);
            } else if self.data.extended_attributes_active() {
                // Attribute fetch: replaced by the extended attribute byte's palette bits
                let attr_byte = self.extended_ram()
                    [usize::from(self.data.scanline_counter.last_nametable_addr & 0x03FF)];
                let palette = attr_byte >> 6;
                return palette | (palette << 2) | (palette << 4) | (palette << 6);
            }
        }

        match self.nametables.slots()[usize::from((address & 0x0FFF) >> 10)] {
            NametableSlot::ExtRam0 | NametableSlot::ExtRam1
                if matches!(
                    self.data.extended_ram_mode,
                    ExtendedRamMode::ReadWrite | ExtendedRamMode::ReadOnly
                ) =>
            {
                // ExRAM is disconnected from the PPU when mapped as CPU scratch RAM
                0x00
            }
            _ => self.nametables.read(address),
        }
    }

    pub(crate) fn read_ppu_address(&mut self, address: u16) -> u8 {
        self.data.scanline_counter.ppu_bus_accessed();

        let value = match address {
            0x0000..=0x1FFF => {
                let value = self.read_pattern_byte(address);
                if !self.data.next_access_from_ppu_data {
                    self.data.scanline_counter.pattern_byte_fetched();
                }
                value
            }
            0x2000..=0x3EFF => self.read_nametable_byte(address),
            _ => panic!("invalid PPU map address: 0x{address:04X}"),
        };
        self.data.next_access_from_ppu_data = false;
        value
    }

    pub(crate) fn write_ppu_address(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => {
                let chr_address = self.data.sprite_chr_map.resolve(address);
                self.data
                    .chr_type
                    .to_map_result(chr_address)
                    .write(value, &mut self.cartridge, &mut self.nametables);
            }
            0x2000..=0x3EFF => {
                match self.nametables.slots()[usize::from((address & 0x0FFF) >> 10)] {
                    NametableSlot::ExtRam0 | NametableSlot::ExtRam1
                        if matches!(
                            self.data.extended_ram_mode,
                            ExtendedRamMode::ReadWrite | ExtendedRamMode::ReadOnly
                        ) => {}
                    _ => self.nametables.write(address, value),
                }
            }
            _ => panic!("invalid PPU map address: 0x{address:04X}"),
        }
        self.data.next_access_from_ppu_data = false;
    }

    pub(crate) fn about_to_access_ppu_data(&mut self) {
        self.data.next_access_from_ppu_data = true;
    }

    pub(crate) fn process_ppu_ctrl_update(&mut self, value: u8) {
        self.data.double_height_sprites = value.bit(5);
    }

    pub(crate) fn notify_scanline(&mut self, rendering_active: bool) {
        self.data.scanline_counter.scanline_rendered(rendering_active);
    }

    pub(crate) fn tick_cpu(&mut self, cpu_cycles: u32) {
        self.data.scanline_counter.tick_cpu(cpu_cycles);
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.data.interrupt_flag()
    }

    pub(crate) fn reset(&mut self) {
        self.data.prg_mode = PrgMode::Mode3;
        self.data.prg_bank_registers = [0x00, 0x00, 0x00, 0x00, 0xFF];
        self.data.irq_enabled = false;
        self.data.scanline_counter = ScanlineCounter::new();
        self.data.rebuild_prg_windows();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::irq::IrqLine;
    use crate::cartridge::mappers::fixtures;
    use crate::cartridge::nametables::{NametableMirroring, Nametables};

    fn new_mmc5() -> MapperImpl<Mmc5> {
        MapperImpl {
            cartridge: fixtures::cartridge(512 * 1024, 256 * 1024, 0),
            nametables: Nametables::new(NametableMirroring::Horizontal, true),
            irq_line: IrqLine::new(),
            data: Mmc5::new(ChrType::ROM, 256 * 1024),
        }
    }

    /// Runs the fetch pattern that marks the start of a rendered scanline.
    fn start_scanline(mapper: &mut MapperImpl<Mmc5>) {
        for _ in 0..3 {
            mapper.read_ppu_address(0x2000);
        }
    }

    #[test]
    fn reset_vector_reads_from_last_bank() {
        let mut mapper = new_mmc5();
        // 512KB image stamps wrap at 256, so the last 8KB bank starts at stamp (504 % 256)
        assert_eq!(mapper.read_cpu_address(0xE000), ((512 - 8) % 256) as u8);
    }

    #[test]
    fn prg_mode_0_maps_32kb() {
        let mut mapper = new_mmc5();
        mapper.write_cpu_address(0x5100, 0x00);
        mapper.write_cpu_address(0x5117, 0x80 | 0x0B); // bank 11 rounds down to 8
        for (i, window_base) in [0x8000_u16, 0xA000, 0xC000, 0xE000].into_iter().enumerate() {
            assert_eq!(mapper.read_cpu_address(window_base), (8 + i as u8) * 8);
        }
    }

    #[test]
    fn prg_ram_mapping_honors_write_protect() {
        let mut mapper = new_mmc5();
        mapper.write_cpu_address(0x6000, 0x42);
        assert_eq!(mapper.read_cpu_address(0x6000), 0x00, "writes disabled at power-on");

        mapper.write_cpu_address(0x5102, 0x02);
        mapper.write_cpu_address(0x5103, 0x01);
        mapper.write_cpu_address(0x6000, 0x42);
        assert_eq!(mapper.read_cpu_address(0x6000), 0x42);
    }

    #[test]
    fn in_frame_detection_needs_three_identical_fetches() {
        let mut mapper = new_mmc5();
        assert_eq!(mapper.read_cpu_address(0x5204) & 0x40, 0);

        mapper.read_ppu_address(0x2000);
        mapper.read_ppu_address(0x2001);
        mapper.read_ppu_address(0x2000);
        mapper.read_ppu_address(0x2000);
        assert_eq!(mapper.read_cpu_address(0x5204) & 0x40, 0, "fetches were not consecutive");

        start_scanline(&mut mapper);
        assert_ne!(mapper.read_cpu_address(0x5204) & 0x40, 0);
    }

    #[test]
    fn scanline_irq_fires_at_compare_value() {
        let mut mapper = new_mmc5();
        mapper.write_cpu_address(0x5203, 3);
        mapper.write_cpu_address(0x5204, 0x80);

        start_scanline(&mut mapper);
        for _ in 0..2 {
            mapper.notify_scanline(true);
            assert!(!mapper.interrupt_flag());
        }
        mapper.notify_scanline(true);
        assert!(mapper.interrupt_flag(), "IRQ should assert at the compare scanline");

        // Reading $5204 acknowledges
        mapper.read_cpu_address(0x5204);
        assert!(!mapper.interrupt_flag());
    }

    #[test]
    fn idle_ppu_bus_clears_in_frame() {
        let mut mapper = new_mmc5();
        start_scanline(&mut mapper);
        assert_ne!(mapper.read_cpu_address(0x5204) & 0x40, 0);

        // $5204 reads do not touch the PPU bus
        mapper.tick_cpu(4);
        assert_eq!(mapper.read_cpu_address(0x5204) & 0x40, 0);
    }

    #[test]
    fn multiplier_unit() {
        let mut mapper = new_mmc5();
        mapper.write_cpu_address(0x5205, 13);
        mapper.write_cpu_address(0x5206, 200);
        let product = u16::from(mapper.read_cpu_address(0x5205))
            | (u16::from(mapper.read_cpu_address(0x5206)) << 8);
        assert_eq!(product, 13 * 200);
    }

    #[test]
    fn fill_mode_via_nametable_control() {
        let mut mapper = new_mmc5();
        mapper.write_cpu_address(0x5105, 0xFF); // all quadrants -> fill
        mapper.write_cpu_address(0x5106, 0x3C);
        mapper.write_cpu_address(0x5107, 0x01);

        mapper.about_to_access_ppu_data();
        assert_eq!(mapper.read_ppu_address(0x2000), 0x3C);
        mapper.about_to_access_ppu_data();
        assert_eq!(mapper.read_ppu_address(0x23C0), 0b01_01_01_01);
    }

    #[test]
    fn exram_cpu_window_respects_mode() {
        let mut mapper = new_mmc5();
        mapper.write_cpu_address(0x5104, 0x02); // read/write
        mapper.write_cpu_address(0x5C05, 0x99);
        assert_eq!(mapper.read_cpu_address(0x5C05), 0x99);

        mapper.write_cpu_address(0x5104, 0x00); // nametable mode: CPU reads open bus
        assert_eq!(mapper.read_cpu_address(0x5C05), cpu_open_bus(0x5C05));
    }

    #[test]
    fn sprite_and_bg_chr_maps_are_separate() {
        let mut mapper = new_mmc5();
        mapper.write_cpu_address(0x5101, 0x01); // 4KB banks
        mapper.write_cpu_address(0x5123, 0x05); // sprite lower half
        mapper.write_cpu_address(0x5127, 0x06); // sprite upper half
        mapper.write_cpu_address(0x512B, 0x0A); // bg (both halves)

        // $2007 accesses use whichever register set was written last
        mapper.about_to_access_ppu_data();
        assert_eq!(mapper.read_ppu_address(0x0000), 10 * 4);

        mapper.write_cpu_address(0x5123, 0x05);
        mapper.about_to_access_ppu_data();
        assert_eq!(mapper.read_ppu_address(0x0000), 5 * 4);
        mapper.about_to_access_ppu_data();
        assert_eq!(mapper.read_ppu_address(0x1000), 6 * 4);
    }
}

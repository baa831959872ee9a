//! Shared types and address mapping helpers used across the individual mapper implementations.

mod konami;
mod mmc1;
mod mmc2;
mod mmc3;
mod mmc5;
mod nrom;
mod sunsoft;

use bincode::{Decode, Encode};

use crate::cartridge::nametables::Nametables;
use crate::cartridge::{Cartridge, MapperImpl};

pub(crate) use konami::{Vrc4, Vrc6, Vrc6Variant, Vrc7, Vrc7Variant, VrcKind};
pub(crate) use mmc1::Mmc1;
pub(crate) use mmc2::{Mmc2, Mmc2Variant};
pub(crate) use mmc3::Mmc3;
pub(crate) use mmc5::Mmc5;
pub(crate) use nrom::{Axrom, Bnrom, Cnrom, Gxrom, GxromVariant, Nina001, Nrom, Uxrom, UxromVariant};
pub(crate) use sunsoft::SunsoftFme7;

/// Reads from unmapped CPU addresses return the high byte of the address, which is the last
/// value the data bus saw during the address phase.
pub(crate) fn cpu_open_bus(address: u16) -> u8 {
    (address >> 8) as u8
}

/// Whether the board's pattern table memory is ROM or RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum ChrType {
    ROM,
    RAM,
}

impl ChrType {
    pub(crate) fn to_map_result(self, address: u32) -> PpuMapResult {
        match self {
            Self::ROM => PpuMapResult::ChrROM(address),
            Self::RAM => PpuMapResult::ChrRAM(address),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PpuMapResult {
    ChrROM(u32),
    ChrRAM(u32),
    Nametable(u16),
}

impl PpuMapResult {
    pub(crate) fn read(self, cartridge: &Cartridge, nametables: &Nametables) -> u8 {
        match self {
            Self::ChrROM(address) => cartridge.get_chr_rom(address),
            Self::ChrRAM(address) => cartridge.get_chr_ram(address),
            Self::Nametable(address) => nametables.read(address),
        }
    }

    pub(crate) fn write(self, value: u8, cartridge: &mut Cartridge, nametables: &mut Nametables) {
        match self {
            Self::ChrROM(_) => {}
            Self::ChrRAM(address) => cartridge.set_chr_ram(address, value),
            Self::Nametable(address) => nametables.write(address, value),
        }
    }
}

/// Implemented by mappers whose PPU mapping is a pure function of current state, with no
/// read side effects. Such mappers get their PPU read/write methods from the blanket impl
/// below; mappers with read-sensitive CHR latches (MMC2) or fetch counters (MMC5) define
/// their own.
pub(crate) trait HasBasicPpuMapping {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult;
}

impl<MapperData> MapperImpl<MapperData>
where
    MapperImpl<MapperData>: HasBasicPpuMapping,
{
    pub(crate) fn read_ppu_address(&self, address: u16) -> u8 {
        self.map_ppu_address(address).read(&self.cartridge, &self.nametables)
    }

    pub(crate) fn write_ppu_address(&mut self, address: u16, value: u8) {
        self.map_ppu_address(address).write(value, &mut self.cartridge, &mut self.nametables);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::cartridge::irq::IrqLine;
    use crate::cartridge::nametables::NametableMirroring;
    use crate::cartridge::TimingMode;

    /// Builds a ROM image where every byte holds the index of the 1KB page it lives in, so
    /// tests can tell which bank an address resolved to.
    pub(crate) fn stamped_rom(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i >> 10) as u8).collect()
    }

    pub(crate) fn cartridge(prg_rom_len: usize, chr_rom_len: usize, chr_ram_len: usize) -> Cartridge {
        Cartridge {
            prg_rom: stamped_rom(prg_rom_len),
            prg_ram: vec![0; 8192],
            has_ram_battery: false,
            prg_ram_dirty_bit: false,
            chr_rom: stamped_rom(chr_rom_len),
            chr_ram: vec![0; chr_ram_len],
            timing_mode: TimingMode::Ntsc,
        }
    }

    pub(crate) fn mapper_impl<MapperData>(
        cartridge: Cartridge,
        mirroring: NametableMirroring,
        data: MapperData,
    ) -> MapperImpl<MapperData> {
        MapperImpl {
            cartridge,
            nametables: Nametables::new(mirroring, false),
            irq_line: IrqLine::new(),
            data,
        }
    }
}

//! Code for the MMC2 and MMC4 boards (iNES mappers 9 + 10).
//!
//! Both switch CHR banks automatically when the PPU fetches specific pattern table tiles,
//! which Punch-Out!! and the Fire Emblem games use to switch graphics mid-scanline.

use bincode::{Decode, Encode};

use crate::cartridge::banks::{BankSizeKb, ChrBankMap, PrgBankMap};
use crate::cartridge::mappers::{ChrType, PpuMapResult};
use crate::cartridge::nametables::NametableMirroring;
use crate::cartridge::MapperImpl;
use crate::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum ChrBankLatch {
    FD,
    FE,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum Mmc2Variant {
    Mmc2,
    Mmc4,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Mmc2 {
    variant: Mmc2Variant,
    chr_type: ChrType,
    chr_0_fd_bank: u8,
    chr_0_fe_bank: u8,
    chr_1_fd_bank: u8,
    chr_1_fe_bank: u8,
    latch_0: ChrBankLatch,
    latch_1: ChrBankLatch,
    prg_bank: u8,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Mmc2 {
    pub(crate) fn name(&self) -> &'static str {
        match self.variant {
            Mmc2Variant::Mmc2 => "MMC2",
            Mmc2Variant::Mmc4 => "MMC4",
        }
    }

    pub(crate) fn new(
        variant: Mmc2Variant,
        chr_type: ChrType,
        prg_rom_len: u32,
        chr_len: u32,
    ) -> Self {
        let mut mmc2 = Self {
            variant,
            chr_type,
            chr_0_fd_bank: 0,
            chr_0_fe_bank: 0,
            chr_1_fd_bank: 0,
            chr_1_fe_bank: 0,
            latch_0: ChrBankLatch::FD,
            latch_1: ChrBankLatch::FD,
            prg_bank: 0,
            prg_map: PrgBankMap::new(prg_rom_len),
            chr_map: ChrBankMap::new(chr_len),
        };
        mmc2.rebuild_prg_map();
        mmc2.rebuild_chr_map();
        mmc2
    }

    fn rebuild_prg_map(&mut self) {
        match self.variant {
            Mmc2Variant::Mmc2 => {
                self.prg_map.set_bank(0x0000, BankSizeKb::Eight, u32::from(self.prg_bank & 0x0F));
                self.prg_map.set_bank_from_end(0x2000, BankSizeKb::Eight, 3);
                self.prg_map.set_bank_from_end(0x4000, BankSizeKb::Eight, 2);
                self.prg_map.set_bank_from_end(0x6000, BankSizeKb::Eight, 1);
            }
            Mmc2Variant::Mmc4 => {
                self.prg_map.set_bank(0x0000, BankSizeKb::Sixteen, u32::from(self.prg_bank & 0x0F));
                self.prg_map.set_bank_from_end(0x4000, BankSizeKb::Sixteen, 1);
            }
        }
    }

    fn rebuild_chr_map(&mut self) {
        let bank_0 = match self.latch_0 {
            ChrBankLatch::FD => self.chr_0_fd_bank,
            ChrBankLatch::FE => self.chr_0_fe_bank,
        };
        let bank_1 = match self.latch_1 {
            ChrBankLatch::FD => self.chr_1_fd_bank,
            ChrBankLatch::FE => self.chr_1_fe_bank,
        };
        self.chr_map.set_bank(0x0000, BankSizeKb::Four, u32::from(bank_0));
        self.chr_map.set_bank(0x1000, BankSizeKb::Four, u32::from(bank_1));
    }

    /// The CHR latches flip after the PPU reads specific tile addresses. MMC2 decodes the full
    /// tile address for latch 0; MMC4 only decodes the tile number.
    fn update_latches(&mut self, address: u16) {
        let new_latch = match (self.variant, address) {
            (Mmc2Variant::Mmc2, 0x0FD8) | (Mmc2Variant::Mmc4, 0x0FD8..=0x0FDF) => {
                Some((&mut self.latch_0, ChrBankLatch::FD))
            }
            (Mmc2Variant::Mmc2, 0x0FE8) | (Mmc2Variant::Mmc4, 0x0FE8..=0x0FEF) => {
                Some((&mut self.latch_0, ChrBankLatch::FE))
            }
            (_, 0x1FD8..=0x1FDF) => Some((&mut self.latch_1, ChrBankLatch::FD)),
            (_, 0x1FE8..=0x1FEF) => Some((&mut self.latch_1, ChrBankLatch::FE)),
            _ => None,
        };

        if let Some((latch, value)) = new_latch {
            if *latch != value {
                *latch = value;
                self.rebuild_chr_map();
            }
        }
    }

    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        match address {
            0x0000..=0x1FFF => self.chr_type.to_map_result(self.chr_map.resolve(address)),
            0x2000..=0x3EFF => PpuMapResult::Nametable(address),
            _ => panic!("invalid PPU map address: 0x{address:04X}"),
        }
    }
}

impl MapperImpl<Mmc2> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        super::nrom::basic_read_cpu_address(&self.cartridge, &self.data.prg_map, address)
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x401F => panic!("invalid CPU map address: 0x{address:04X}"),
            0x4020..=0x5FFF => {}
            0x6000..=0x7FFF => self.cartridge.set_prg_ram(u32::from(address & 0x1FFF), value),
            0x8000..=0x9FFF => {}
            0xA000..=0xAFFF => {
                self.data.prg_bank = value & 0x0F;
                self.data.rebuild_prg_map();
            }
            0xB000..=0xBFFF => {
                self.data.chr_0_fd_bank = value & 0x1F;
                self.data.rebuild_chr_map();
            }
            0xC000..=0xCFFF => {
                self.data.chr_0_fe_bank = value & 0x1F;
                self.data.rebuild_chr_map();
            }
            0xD000..=0xDFFF => {
                self.data.chr_1_fd_bank = value & 0x1F;
                self.data.rebuild_chr_map();
            }
            0xE000..=0xEFFF => {
                self.data.chr_1_fe_bank = value & 0x1F;
                self.data.rebuild_chr_map();
            }
            0xF000..=0xFFFF => {
                let mirroring = if value.bit(0) {
                    NametableMirroring::Horizontal
                } else {
                    NametableMirroring::Vertical
                };
                self.nametables.set_mirroring(mirroring);
            }
        }
    }

    pub(crate) fn read_ppu_address(&mut self, address: u16) -> u8 {
        let value = self.data.map_ppu_address(address).read(&self.cartridge, &self.nametables);
        // The latch flips after the fetch; the triggering tile itself comes from the old bank
        self.data.update_latches(address);
        value
    }

    pub(crate) fn write_ppu_address(&mut self, address: u16, value: u8) {
        self.data.map_ppu_address(address).write(value, &mut self.cartridge, &mut self.nametables);
    }

    pub(crate) fn reset(&mut self) {
        self.data.latch_0 = ChrBankLatch::FD;
        self.data.latch_1 = ChrBankLatch::FD;
        self.data.rebuild_chr_map();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::mappers::fixtures;

    fn new_mmc2(variant: Mmc2Variant) -> MapperImpl<Mmc2> {
        fixtures::mapper_impl(
            fixtures::cartridge(128 * 1024, 128 * 1024, 0),
            NametableMirroring::Vertical,
            Mmc2::new(variant, ChrType::ROM, 128 * 1024, 128 * 1024),
        )
    }

    #[test]
    fn tile_fetch_flips_chr_latch() {
        let mut mapper = new_mmc2(Mmc2Variant::Mmc2);
        mapper.write_cpu_address(0xB000, 2);
        mapper.write_cpu_address(0xC000, 7);

        // Latch starts at FD
        assert_eq!(mapper.read_ppu_address(0x0000), 2 * 4);

        // The $FE tile fetch returns old-bank data, then flips the latch
        assert_eq!(mapper.read_ppu_address(0x0FE8), 2 * 4 + 3);
        assert_eq!(mapper.read_ppu_address(0x0000), 7 * 4);

        // And back
        mapper.read_ppu_address(0x0FD8);
        assert_eq!(mapper.read_ppu_address(0x0000), 2 * 4);
    }

    #[test]
    fn mmc4_latch_decodes_address_range() {
        let mut mapper = new_mmc2(Mmc2Variant::Mmc4);
        mapper.write_cpu_address(0xD000, 1);
        mapper.write_cpu_address(0xE000, 5);

        mapper.read_ppu_address(0x1FEC);
        assert_eq!(mapper.read_ppu_address(0x1000), 5 * 4);

        // MMC2 only decodes $1FD8-$1FDF/$1FE8-$1FEF in the upper half; both variants share that
        mapper.read_ppu_address(0x1FDB);
        assert_eq!(mapper.read_ppu_address(0x1000), 4);
    }

    #[test]
    fn mmc2_fixed_prg_banks() {
        let mut mapper = new_mmc2(Mmc2Variant::Mmc2);
        mapper.write_cpu_address(0xA000, 3);

        assert_eq!(mapper.read_cpu_address(0x8000), 3 * 8);
        assert_eq!(mapper.read_cpu_address(0xA000), (128 - 24) as u8);
        assert_eq!(mapper.read_cpu_address(0xC000), (128 - 16) as u8);
        assert_eq!(mapper.read_cpu_address(0xE000), (128 - 8) as u8);
    }
}

//! Code for the MMC1 board (iNES mapper 1).
//!
//! Registers are written serially: five 1-bit writes to $8000-$FFFF load an internal shift
//! register, and the address of the fifth write selects which register is committed.

use bincode::{Decode, Encode};

use crate::cartridge::banks::{BankSizeKb, ChrBankMap, PrgBankMap};
use crate::cartridge::mappers::{ChrType, HasBasicPpuMapping, PpuMapResult};
use crate::cartridge::nametables::NametableMirroring;
use crate::cartridge::MapperImpl;
use crate::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum PrgBankingMode {
    Switch32Kb,
    Switch16KbFirstBankFixed,
    Switch16KbLastBankFixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum ChrBankingMode {
    Single8KbBank,
    Two4KbBanks,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Mmc1 {
    chr_type: ChrType,
    shift_register: u8,
    shift_register_len: u8,
    written_this_cycle: bool,
    written_last_cycle: bool,
    prg_banking_mode: PrgBankingMode,
    chr_banking_mode: ChrBankingMode,
    chr_bank_0: u8,
    chr_bank_1: u8,
    prg_bank: u8,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Mmc1 {
    pub(crate) fn new(chr_type: ChrType, prg_rom_len: u32, chr_len: u32) -> Self {
        let mut mmc1 = Self {
            chr_type,
            shift_register: 0,
            shift_register_len: 0,
            written_this_cycle: false,
            written_last_cycle: false,
            prg_banking_mode: PrgBankingMode::Switch16KbLastBankFixed,
            chr_banking_mode: ChrBankingMode::Single8KbBank,
            chr_bank_0: 0,
            chr_bank_1: 0,
            prg_bank: 0,
            prg_map: PrgBankMap::new(prg_rom_len),
            chr_map: ChrBankMap::new(chr_len),
        };
        mmc1.rebuild_bank_maps();
        mmc1
    }

    fn rebuild_bank_maps(&mut self) {
        match self.prg_banking_mode {
            PrgBankingMode::Switch32Kb => {
                self.prg_map.set_bank(
                    0x0000,
                    BankSizeKb::ThirtyTwo,
                    u32::from((self.prg_bank & 0x0E) >> 1),
                );
            }
            PrgBankingMode::Switch16KbFirstBankFixed => {
                self.prg_map.set_bank(0x0000, BankSizeKb::Sixteen, 0);
                self.prg_map.set_bank(0x4000, BankSizeKb::Sixteen, u32::from(self.prg_bank & 0x0F));
            }
            PrgBankingMode::Switch16KbLastBankFixed => {
                self.prg_map.set_bank(0x0000, BankSizeKb::Sixteen, u32::from(self.prg_bank & 0x0F));
                self.prg_map.set_bank_from_end(0x4000, BankSizeKb::Sixteen, 1);
            }
        }

        match self.chr_banking_mode {
            ChrBankingMode::Single8KbBank => {
                self.chr_map.set_bank(
                    0x0000,
                    BankSizeKb::Eight,
                    u32::from((self.chr_bank_0 & 0x1E) >> 1),
                );
            }
            ChrBankingMode::Two4KbBanks => {
                self.chr_map.set_bank(0x0000, BankSizeKb::Four, u32::from(self.chr_bank_0));
                self.chr_map.set_bank(0x1000, BankSizeKb::Four, u32::from(self.chr_bank_1));
            }
        }
    }

    fn reset(&mut self) {
        self.shift_register = 0;
        self.shift_register_len = 0;
        self.prg_banking_mode = PrgBankingMode::Switch16KbLastBankFixed;
        self.rebuild_bank_maps();
    }

    fn tick(&mut self) {
        self.written_last_cycle = self.written_this_cycle;
        self.written_this_cycle = false;
    }
}

impl MapperImpl<Mmc1> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        super::nrom::basic_read_cpu_address(&self.cartridge, &self.data.prg_map, address)
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x401F => panic!("invalid CPU map address: 0x{address:04X}"),
            0x4020..=0x5FFF => {}
            0x6000..=0x7FFF => self.cartridge.set_prg_ram(u32::from(address & 0x1FFF), value),
            0x8000..=0xFFFF => {
                // The shift register ignores writes on consecutive CPU cycles, which RMW
                // instructions depend on
                if self.data.written_last_cycle {
                    return;
                }
                self.data.written_this_cycle = true;

                if value.bit(7) {
                    self.data.reset();
                    return;
                }

                self.data.shift_register =
                    (self.data.shift_register >> 1) | (u8::from(value.bit(0)) << 4);
                self.data.shift_register_len += 1;
                if self.data.shift_register_len == 5 {
                    self.commit_register(address);
                }
            }
        }
    }

    fn commit_register(&mut self, address: u16) {
        let value = self.data.shift_register;
        self.data.shift_register = 0;
        self.data.shift_register_len = 0;

        match address {
            0x8000..=0x9FFF => {
                let mirroring = match value & 0x03 {
                    0x00 => NametableMirroring::SingleScreenBank0,
                    0x01 => NametableMirroring::SingleScreenBank1,
                    0x02 => NametableMirroring::Vertical,
                    0x03 => NametableMirroring::Horizontal,
                    _ => unreachable!("value & 0x03 is always <= 0x03"),
                };
                self.nametables.set_mirroring(mirroring);

                self.data.prg_banking_mode = match value & 0x0C {
                    0x00 | 0x04 => PrgBankingMode::Switch32Kb,
                    0x08 => PrgBankingMode::Switch16KbFirstBankFixed,
                    0x0C => PrgBankingMode::Switch16KbLastBankFixed,
                    _ => unreachable!("value & 0x0C is always 0x00/0x04/0x08/0x0C"),
                };
                self.data.chr_banking_mode = if value.bit(4) {
                    ChrBankingMode::Two4KbBanks
                } else {
                    ChrBankingMode::Single8KbBank
                };
            }
            0xA000..=0xBFFF => self.data.chr_bank_0 = value,
            0xC000..=0xDFFF => self.data.chr_bank_1 = value,
            0xE000..=0xFFFF => self.data.prg_bank = value & 0x0F,
            _ => unreachable!("commit_register is only called for $8000-$FFFF"),
        }

        self.data.rebuild_bank_maps();
    }

    pub(crate) fn tick_cpu(&mut self, cpu_cycles: u32) {
        for _ in 0..cpu_cycles {
            self.data.tick();
        }
    }

    pub(crate) fn reset(&mut self) {
        self.data.reset();
    }
}

impl HasBasicPpuMapping for MapperImpl<Mmc1> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        super::nrom::basic_map_ppu_address(&self.data.chr_map, self.data.chr_type, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::mappers::fixtures;

    fn new_mmc1(prg_rom_len: usize) -> MapperImpl<Mmc1> {
        fixtures::mapper_impl(
            fixtures::cartridge(prg_rom_len, 128 * 1024, 0),
            NametableMirroring::Horizontal,
            Mmc1::new(ChrType::ROM, prg_rom_len as u32, 128 * 1024),
        )
    }

    fn serial_write(mapper: &mut MapperImpl<Mmc1>, address: u16, value: u8) {
        for bit in 0..5 {
            mapper.write_cpu_address(address, (value >> bit) & 0x01);
            mapper.tick_cpu(2);
        }
    }

    #[test]
    fn boots_with_last_bank_fixed() {
        let mapper = new_mmc1(256 * 1024);
        assert_eq!(mapper.read_cpu_address(0xC000), ((256 - 16) * 1024 >> 10) as u8);
    }

    #[test]
    fn serial_prg_bank_select() {
        let mut mapper = new_mmc1(256 * 1024);
        serial_write(&mut mapper, 0xE000, 5);
        assert_eq!(mapper.read_cpu_address(0x8000), 5 * 16);
        assert_eq!(mapper.read_cpu_address(0xC000), ((256 - 16) * 1024 >> 10) as u8);
    }

    #[test]
    fn consecutive_cycle_writes_are_ignored() {
        let mut mapper = new_mmc1(256 * 1024);

        // An RMW instruction writes twice on back-to-back cycles; the second write must be
        // ignored or the serial stream gets an extra bit
        mapper.write_cpu_address(0xE000, 0x01);
        mapper.tick_cpu(1);
        mapper.write_cpu_address(0xE000, 0x00);
        mapper.tick_cpu(2);

        for bit in 1..5 {
            mapper.write_cpu_address(0xE000, (5 >> bit) & 0x01);
            mapper.tick_cpu(2);
        }
        assert_eq!(mapper.read_cpu_address(0x8000), 5 * 16);
    }

    #[test]
    fn reset_bit_restores_last_bank_fixed_mode() {
        let mut mapper = new_mmc1(256 * 1024);
        // 32KB banking mode
        serial_write(&mut mapper, 0x8000, 0x00);
        serial_write(&mut mapper, 0xE000, 2);
        assert_eq!(mapper.read_cpu_address(0x8000), 32);

        mapper.write_cpu_address(0x8000, 0x80);
        assert_eq!(
            mapper.read_cpu_address(0xC000),
            ((256 - 16) * 1024 >> 10) as u8,
            "reset should restore the fixed last bank"
        );
    }

    #[test]
    fn serial_chr_bank_select() {
        let mut mapper = new_mmc1(256 * 1024);
        // 4KB CHR banking
        serial_write(&mut mapper, 0x8000, 0x10 | 0x0C);
        serial_write(&mut mapper, 0xA000, 3);
        serial_write(&mut mapper, 0xC000, 9);

        assert_eq!(mapper.read_ppu_address(0x0000), 3 * 4);
        assert_eq!(mapper.read_ppu_address(0x1000), 9 * 4);
    }

    #[test]
    fn mirroring_commit_goes_through_control_register() {
        let mut mapper = new_mmc1(256 * 1024);
        serial_write(&mut mapper, 0x8000, 0x0C | 0x02);

        mapper.write_ppu_address(0x2000, 0x5A);
        assert_eq!(mapper.read_ppu_address(0x2800), 0x5A, "vertical mirroring pairs 0 and 2");
    }
}

//! Code for the MMC3 board (iNES mapper 4).
//!
//! The IRQ counter clocks on filtered rising edges of PPU address line A12, which goes high
//! whenever the PPU fetches from the right pattern table. With the standard background/sprite
//! table split this produces one clock per rendered scanline.

use bincode::{Decode, Encode};

use crate::cartridge::banks::{BankSizeKb, ChrBankMap, PrgBankMap};
use crate::cartridge::mappers::{cpu_open_bus, ChrType, PpuMapResult};
use crate::cartridge::nametables::NametableMirroring;
use crate::cartridge::MapperImpl;
use crate::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum PrgMode {
    // $8000 switchable, $C000 fixed to second-to-last
    Standard,
    // $8000 fixed to second-to-last, $C000 switchable
    Inverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum ChrMode {
    // 2KB banks at $0000-$0FFF, 1KB banks at $1000-$1FFF
    Standard,
    Inverted,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Mmc3 {
    chr_type: ChrType,
    prg_mode: PrgMode,
    chr_mode: ChrMode,
    chr_banks: [u8; 6],
    prg_banks: [u8; 2],
    bank_update_select: u8,
    ram_enabled: bool,
    ram_writes_disabled: bool,
    irq_counter: u8,
    irq_reload_value: u8,
    irq_reload_flag: bool,
    irq_enabled: bool,
    interrupt_flag: bool,
    last_a12_read: u16,
    a12_low_cycles: u32,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Mmc3 {
    pub(crate) fn new(chr_type: ChrType, prg_rom_len: u32, chr_len: u32) -> Self {
        let mut mmc3 = Self {
            chr_type,
            prg_mode: PrgMode::Standard,
            chr_mode: ChrMode::Standard,
            chr_banks: [0; 6],
            prg_banks: [0; 2],
            bank_update_select: 0,
            ram_enabled: false,
            ram_writes_disabled: false,
            irq_counter: 0,
            irq_reload_value: 0,
            irq_reload_flag: false,
            irq_enabled: false,
            interrupt_flag: false,
            last_a12_read: 0,
            a12_low_cycles: 0,
            prg_map: PrgBankMap::new(prg_rom_len),
            chr_map: ChrBankMap::new(chr_len),
        };
        mmc3.rebuild_bank_maps();
        mmc3
    }

    fn rebuild_bank_maps(&mut self) {
        let prg_0 = u32::from(self.prg_banks[0] & 0x3F);
        let prg_1 = u32::from(self.prg_banks[1] & 0x3F);
        match self.prg_mode {
            PrgMode::Standard => {
                self.prg_map.set_bank(0x0000, BankSizeKb::Eight, prg_0);
                self.prg_map.set_bank(0x2000, BankSizeKb::Eight, prg_1);
                self.prg_map.set_bank_from_end(0x4000, BankSizeKb::Eight, 2);
            }
            PrgMode::Inverted => {
                self.prg_map.set_bank_from_end(0x0000, BankSizeKb::Eight, 2);
                self.prg_map.set_bank(0x2000, BankSizeKb::Eight, prg_1);
                self.prg_map.set_bank(0x4000, BankSizeKb::Eight, prg_0);
            }
        }
        self.prg_map.set_bank_from_end(0x6000, BankSizeKb::Eight, 1);

        // 2KB bank registers are in 1KB units with the low bit ignored
        let (double_base, single_base) = match self.chr_mode {
            ChrMode::Standard => (0x0000, 0x1000),
            ChrMode::Inverted => (0x1000, 0x0000),
        };
        for (i, &bank) in self.chr_banks[..2].iter().enumerate() {
            self.chr_map.set_bank(
                double_base + (i as u16) * 0x0800,
                BankSizeKb::Two,
                u32::from(bank & 0xFE) >> 1,
            );
        }
        for (i, &bank) in self.chr_banks[2..].iter().enumerate() {
            self.chr_map.set_bank(single_base + (i as u16) * 0x0400, BankSizeKb::One, u32::from(bank));
        }
    }

    fn clock_irq(&mut self) {
        if self.irq_counter == 0 || self.irq_reload_flag {
            self.irq_counter = self.irq_reload_value;
            self.irq_reload_flag = false;
        } else {
            self.irq_counter -= 1;
        }

        if self.irq_counter == 0 && self.irq_enabled {
            self.interrupt_flag = true;
        }
    }

    fn process_ppu_address(&mut self, address: u16) {
        let a12 = address & (1 << 12);
        if a12 != 0 {
            // Rapid A12 toggles within a single fetch pattern must not clock the counter;
            // require A12 to have been low for most of a tile fetch first
            if self.last_a12_read == 0 && self.a12_low_cycles >= 10 {
                self.clock_irq();
            }
            self.a12_low_cycles = 0;
        }
        self.last_a12_read = a12;
    }
}

impl MapperImpl<Mmc3> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x401F => panic!("invalid CPU map address: 0x{address:04X}"),
            0x4020..=0x5FFF => cpu_open_bus(address),
            0x6000..=0x7FFF => {
                if self.data.ram_enabled && self.cartridge.has_prg_ram() {
                    self.cartridge.get_prg_ram(u32::from(address & 0x1FFF))
                } else {
                    cpu_open_bus(address)
                }
            }
            0x8000..=0xFFFF => self.cartridge.get_prg_rom(self.data.prg_map.resolve(address & 0x7FFF)),
        }
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x401F => panic!("invalid CPU map address: 0x{address:04X}"),
            0x4020..=0x5FFF => {}
            0x6000..=0x7FFF => {
                if self.data.ram_enabled && !self.data.ram_writes_disabled {
                    self.cartridge.set_prg_ram(u32::from(address & 0x1FFF), value);
                }
            }
            0x8000..=0x9FFF => {
                if !address.bit(0) {
                    self.data.chr_mode = if value.bit(7) { ChrMode::Inverted } else { ChrMode::Standard };
                    self.data.prg_mode = if value.bit(6) { PrgMode::Inverted } else { PrgMode::Standard };
                    self.data.bank_update_select = value & 0x07;
                } else {
                    match self.data.bank_update_select {
                        select @ 0..=5 => self.data.chr_banks[usize::from(select)] = value,
                        6 | 7 => {
                            self.data.prg_banks[usize::from(self.data.bank_update_select - 6)] = value;
                        }
                        _ => unreachable!("bank_update_select is masked to 3 bits"),
                    }
                }
                self.data.rebuild_bank_maps();
            }
            0xA000..=0xBFFF => {
                if !address.bit(0) {
                    // Four-screen boards wire the nametables directly; the mirroring register
                    // has no effect
                    if !self.nametables.has_extra_ram() {
                        let mirroring = if value.bit(0) {
                            NametableMirroring::Horizontal
                        } else {
                            NametableMirroring::Vertical
                        };
                        self.nametables.set_mirroring(mirroring);
                    }
                } else {
                    self.data.ram_enabled = value.bit(7);
                    self.data.ram_writes_disabled = value.bit(6);
                }
            }
            0xC000..=0xDFFF => {
                if !address.bit(0) {
                    self.data.irq_reload_value = value;
                } else {
                    self.data.irq_reload_flag = true;
                }
            }
            0xE000..=0xFFFF => {
                if !address.bit(0) {
                    self.data.irq_enabled = false;
                    self.data.interrupt_flag = false;
                } else {
                    self.data.irq_enabled = true;
                }
            }
        }
    }

    fn map_ppu_address(&mut self, address: u16) -> PpuMapResult {
        self.data.process_ppu_address(address);
        match address {
            0x0000..=0x1FFF => self.data.chr_type.to_map_result(self.data.chr_map.resolve(address)),
            0x2000..=0x3EFF => PpuMapResult::Nametable(address),
            _ => panic!("invalid PPU map address: 0x{address:04X}"),
        }
    }

    pub(crate) fn read_ppu_address(&mut self, address: u16) -> u8 {
        self.map_ppu_address(address).read(&self.cartridge, &self.nametables)
    }

    pub(crate) fn write_ppu_address(&mut self, address: u16, value: u8) {
        self.map_ppu_address(address).write(value, &mut self.cartridge, &mut self.nametables);
    }

    pub(crate) fn process_ppu_address(&mut self, address: u16) {
        self.data.process_ppu_address(address);
    }

    pub(crate) fn tick_cpu(&mut self, cpu_cycles: u32) {
        if self.data.last_a12_read == 0 {
            // The PPU runs 3 dots per CPU cycle
            self.data.a12_low_cycles += 3 * cpu_cycles;
        }
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.data.interrupt_flag
    }

    pub(crate) fn reset(&mut self) {
        self.data.irq_enabled = false;
        self.data.interrupt_flag = false;
        self.data.irq_reload_flag = false;
        self.data.prg_mode = PrgMode::Standard;
        self.data.chr_mode = ChrMode::Standard;
        self.data.rebuild_bank_maps();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::mappers::fixtures;

    fn new_mmc3() -> MapperImpl<Mmc3> {
        fixtures::mapper_impl(
            fixtures::cartridge(256 * 1024, 256 * 1024, 0),
            NametableMirroring::Vertical,
            Mmc3::new(ChrType::ROM, 256 * 1024, 256 * 1024),
        )
    }

    fn a12_rising_edge(mapper: &mut MapperImpl<Mmc3>) {
        mapper.process_ppu_address(0x0000);
        mapper.tick_cpu(4);
        mapper.process_ppu_address(0x1000);
    }

    #[test]
    fn prg_banking_modes() {
        let mut mapper = new_mmc3();

        mapper.write_cpu_address(0x8000, 6);
        mapper.write_cpu_address(0x8001, 4);
        assert_eq!(mapper.read_cpu_address(0x8000), 4 * 8);
        assert_eq!(mapper.read_cpu_address(0xC000), (256 - 16) as u8);
        assert_eq!(mapper.read_cpu_address(0xE000), (256 - 8) as u8);

        // Inverted PRG mode swaps $8000 and $C000
        mapper.write_cpu_address(0x8000, 0x40 | 6);
        assert_eq!(mapper.read_cpu_address(0x8000), (256 - 16) as u8);
        assert_eq!(mapper.read_cpu_address(0xC000), 4 * 8);
    }

    #[test]
    fn chr_banking_modes() {
        let mut mapper = new_mmc3();

        mapper.write_cpu_address(0x8000, 0);
        mapper.write_cpu_address(0x8001, 9); // low bit ignored -> 1KB bank 8
        mapper.write_cpu_address(0x8000, 2);
        mapper.write_cpu_address(0x8001, 40);

        assert_eq!(mapper.read_ppu_address(0x0000), 8);
        assert_eq!(mapper.read_ppu_address(0x0400), 9);
        assert_eq!(mapper.read_ppu_address(0x1000), 40);
    }

    #[test]
    fn irq_counter_fires_on_sixth_edge() {
        let mut mapper = new_mmc3();

        mapper.write_cpu_address(0xC000, 5);
        mapper.write_cpu_address(0xC001, 0x00);
        mapper.write_cpu_address(0xE001, 0x00);

        // Edge 1 reloads the counter with 5; edges 2-6 count it down to 0
        for edge in 1..=5 {
            a12_rising_edge(&mut mapper);
            assert!(!mapper.interrupt_flag(), "IRQ fired early on edge {edge}");
        }
        a12_rising_edge(&mut mapper);
        assert!(mapper.interrupt_flag(), "IRQ should fire on the 6th qualifying edge");

        // Acknowledge via $E000
        mapper.write_cpu_address(0xE000, 0x00);
        assert!(!mapper.interrupt_flag());
    }

    #[test]
    fn rapid_a12_toggles_are_filtered() {
        let mut mapper = new_mmc3();

        mapper.write_cpu_address(0xC000, 0);
        mapper.write_cpu_address(0xC001, 0x00);
        mapper.write_cpu_address(0xE001, 0x00);

        // Toggling A12 with no low time in between must not clock the counter
        for _ in 0..20 {
            mapper.process_ppu_address(0x0000);
            mapper.process_ppu_address(0x1000);
        }
        assert!(!mapper.interrupt_flag());

        // A single qualifying edge with reload value 0 fires immediately
        a12_rising_edge(&mut mapper);
        assert!(mapper.interrupt_flag());
    }
}

//! Code for the Konami VRC2 and VRC4 boards (iNES mappers 21 + 22 + 23 + 25).
//!
//! Each iNES mapper number covers two possible board wirings, so the register select masks
//! OR together every address line that any wiring of that mapper number uses.

use bincode::{Decode, Encode};

use crate::cartridge::banks::{BankSizeKb, ChrBankMap, PrgBankMap};
use crate::cartridge::mappers::konami::irq::VrcIrqCounter;
use crate::cartridge::mappers::{cpu_open_bus, ChrType, HasBasicPpuMapping, PpuMapResult};
use crate::cartridge::nametables::NametableMirroring;
use crate::cartridge::MapperImpl;
use crate::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum VrcKind {
    Vrc2,
    Vrc4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum PrgMode {
    // $8000 switchable, $C000 fixed to second-to-last
    Mode0,
    // $8000 fixed to second-to-last, $C000 switchable
    Mode1,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Vrc4 {
    kind: VrcKind,
    a0_mask: u16,
    a1_mask: u16,
    // VRC2a wires CHR A10 one line higher, halving the effective bank numbers
    chr_bank_shift: u8,
    chr_type: ChrType,
    prg_mode: PrgMode,
    prg_bank_0: u8,
    prg_bank_1: u8,
    chr_banks: [u16; 8],
    ram_enabled: bool,
    ram_latch: u8,
    irq: VrcIrqCounter,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Vrc4 {
    pub(crate) fn name(&self) -> &'static str {
        match self.kind {
            VrcKind::Vrc2 => "VRC2",
            VrcKind::Vrc4 => "VRC4",
        }
    }

    pub(crate) fn new(
        kind: VrcKind,
        a0_mask: u16,
        a1_mask: u16,
        chr_bank_shift: u8,
        chr_type: ChrType,
        prg_rom_len: u32,
        chr_len: u32,
    ) -> Self {
        let mut vrc4 = Self {
            kind,
            a0_mask,
            a1_mask,
            chr_bank_shift,
            chr_type,
            prg_mode: PrgMode::Mode0,
            prg_bank_0: 0,
            prg_bank_1: 0,
            chr_banks: [0; 8],
            ram_enabled: false,
            ram_latch: 0,
            irq: VrcIrqCounter::new(),
            prg_map: PrgBankMap::new(prg_rom_len),
            chr_map: ChrBankMap::new(chr_len),
        };
        vrc4.rebuild_prg_map();
        vrc4
    }

    /// Normalizes a register address to the canonical $xxx0-$xxx3 layout by reading the chip's
    /// A0/A1 inputs off whichever CPU address lines this board wires them to.
    fn remap_register_address(&self, address: u16) -> u16 {
        (address & 0xF000)
            | (u16::from(address & self.a1_mask != 0) << 1)
            | u16::from(address & self.a0_mask != 0)
    }

    fn rebuild_prg_map(&mut self) {
        let prg_0 = u32::from(self.prg_bank_0);
        let prg_1 = u32::from(self.prg_bank_1);
        match self.prg_mode {
            PrgMode::Mode0 => {
                self.prg_map.set_bank(0x0000, BankSizeKb::Eight, prg_0);
                self.prg_map.set_bank_from_end(0x4000, BankSizeKb::Eight, 2);
            }
            PrgMode::Mode1 => {
                self.prg_map.set_bank_from_end(0x0000, BankSizeKb::Eight, 2);
                self.prg_map.set_bank(0x4000, BankSizeKb::Eight, prg_0);
            }
        }
        self.prg_map.set_bank(0x2000, BankSizeKb::Eight, prg_1);
        self.prg_map.set_bank_from_end(0x6000, BankSizeKb::Eight, 1);
    }

    fn update_chr_bank(&mut self, index: usize, high_nibble: bool, value: u8) {
        let bank = &mut self.chr_banks[index];
        if high_nibble {
            // VRC2 CHR banks are 8 bits; VRC4's are 9
            let mask = match self.kind {
                VrcKind::Vrc2 => 0x0F,
                VrcKind::Vrc4 => 0x1F,
            };
            *bank = (*bank & 0x000F) | (u16::from(value & mask) << 4);
        } else {
            *bank = (*bank & 0xFFF0) | u16::from(value & 0x0F);
        }

        let effective_bank = *bank >> self.chr_bank_shift;
        self.chr_map.set_bank((index as u16) << 10, BankSizeKb::One, u32::from(effective_bank));
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.irq.pending()
    }
}

impl MapperImpl<Vrc4> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x401F => panic!("invalid CPU map address: 0x{address:04X}"),
            0x4020..=0x5FFF => cpu_open_bus(address),
            0x6000..=0x7FFF => {
                if self.cartridge.has_prg_ram() {
                    if self.data.kind == VrcKind::Vrc4 && !self.data.ram_enabled {
                        cpu_open_bus(address)
                    } else {
                        self.cartridge.get_prg_ram(u32::from(address & 0x1FFF))
                    }
                } else if self.data.kind == VrcKind::Vrc2 && address <= 0x6FFF {
                    // VRC2 boards without RAM still have a 1-bit latch here
                    (cpu_open_bus(address) & 0xFE) | self.data.ram_latch
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
                if self.cartridge.has_prg_ram() {
                    if self.data.kind == VrcKind::Vrc2 || self.data.ram_enabled {
                        self.cartridge.set_prg_ram(u32::from(address & 0x1FFF), value);
                    }
                } else if self.data.kind == VrcKind::Vrc2 && address <= 0x6FFF {
                    self.data.ram_latch = value & 0x01;
                }
            }
            0x8000..=0xFFFF => self.process_register_write(address, value),
        }
    }

    fn process_register_write(&mut self, address: u16, value: u8) {
        let register = self.data.remap_register_address(address);
        match register {
            0x8000..=0x8003 => {
                self.data.prg_bank_0 = value & 0x1F;
                self.data.rebuild_prg_map();
            }
            0x9000..=0x9003 => match self.data.kind {
                VrcKind::Vrc2 => {
                    let mirroring = if value.bit(0) {
                        NametableMirroring::Horizontal
                    } else {
                        NametableMirroring::Vertical
                    };
                    self.nametables.set_mirroring(mirroring);
                }
                VrcKind::Vrc4 => {
                    if register.bit(1) {
                        self.data.ram_enabled = value.bit(0);
                        self.data.prg_mode =
                            if value.bit(1) { PrgMode::Mode1 } else { PrgMode::Mode0 };
                        self.data.rebuild_prg_map();
                    } else {
                        let mirroring = match value & 0x03 {
                            0x00 => NametableMirroring::Vertical,
                            0x01 => NametableMirroring::Horizontal,
                            0x02 => NametableMirroring::SingleScreenBank0,
                            0x03 => NametableMirroring::SingleScreenBank1,
                            _ => unreachable!("value & 0x03 is always <= 0x03"),
                        };
                        self.nametables.set_mirroring(mirroring);
                    }
                }
            },
            0xA000..=0xA003 => {
                self.data.prg_bank_1 = value & 0x1F;
                self.data.rebuild_prg_map();
            }
            0xB000..=0xE003 => {
                let index = 2 * usize::from((register - 0xB000) >> 12) + usize::from(register.bit(1));
                self.data.update_chr_bank(index, register.bit(0), value);
            }
            0xF000..=0xF003 if self.data.kind == VrcKind::Vrc4 => match register & 0x0003 {
                0x0000 => self.data.irq.set_reload_value_low_4_bits(value),
                0x0001 => self.data.irq.set_reload_value_high_4_bits(value),
                0x0002 => self.data.irq.set_control(value),
                0x0003 => self.data.irq.acknowledge(),
                _ => unreachable!("register & 0x0003 is always <= 0x0003"),
            },
            _ => {}
        }
    }

    pub(crate) fn tick_cpu(&mut self, cpu_cycles: u32) {
        self.data.irq.tick_cpu(cpu_cycles);
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.data.interrupt_flag()
    }

    pub(crate) fn reset(&mut self) {
        self.data.prg_mode = PrgMode::Mode0;
        self.data.irq = VrcIrqCounter::new();
        self.data.rebuild_prg_map();
    }
}

impl HasBasicPpuMapping for MapperImpl<Vrc4> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        super::super::nrom::basic_map_ppu_address(&self.data.chr_map, self.data.chr_type, address)
    }
}

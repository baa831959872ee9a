//! Code for the Sunsoft FME-7 board and the audio-equipped Sunsoft 5B variant (iNES mapper 69).
//!
//! All configuration goes through a command port at $8000-$9FFF and a parameter port at
//! $A000-$BFFF. The 5B's PSG sits separately at $C000 (register select) and $E000 (data).

use bincode::{Decode, Encode};

use crate::cartridge::audio::{AudioSlot, ExpansionAudioChip, Sunsoft5bAudio};
use crate::cartridge::banks::{BankSizeKb, ChrBankMap, PrgBankMap};
use crate::cartridge::mappers::{cpu_open_bus, ChrType, HasBasicPpuMapping, PpuMapResult};
use crate::cartridge::nametables::NametableMirroring;
use crate::cartridge::MapperImpl;
use crate::num::GetBit;

#[derive(Debug, Clone, Copy, Encode, Decode)]
struct PrgBank0 {
    ram: bool,
    ram_enabled: bool,
    bank: u8,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct SunsoftFme7 {
    chr_type: ChrType,
    command: u8,
    prg_bank_0: PrgBank0,
    irq_enabled: bool,
    irq_counter_enabled: bool,
    irq_counter: u16,
    irq_triggered: bool,
    audio: AudioSlot<Sunsoft5bAudio>,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl SunsoftFme7 {
    pub(crate) fn new(chr_type: ChrType, prg_rom_len: u32, chr_len: u32) -> Self {
        let mut prg_map = PrgBankMap::new(prg_rom_len);
        prg_map.set_bank_from_end(0x6000, BankSizeKb::Eight, 1);

        Self {
            chr_type,
            command: 0,
            prg_bank_0: PrgBank0 { ram: false, ram_enabled: false, bank: 0 },
            irq_enabled: false,
            irq_counter_enabled: false,
            irq_counter: 0,
            irq_triggered: false,
            audio: AudioSlot::new(),
            prg_map,
            chr_map: ChrBankMap::new(chr_len),
        }
    }

    fn clock_irq_counter(&mut self) {
        if !self.irq_counter_enabled {
            return;
        }

        if self.irq_enabled && self.irq_counter == 0 {
            self.irq_triggered = true;
        }
        self.irq_counter = self.irq_counter.wrapping_sub(1);
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.irq_triggered
    }

    pub(crate) fn audio(&mut self) -> &mut AudioSlot<Sunsoft5bAudio> {
        &mut self.audio
    }
}

impl MapperImpl<SunsoftFme7> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x401F => panic!("invalid CPU map address: 0x{address:04X}"),
            0x4020..=0x5FFF => cpu_open_bus(address),
            0x6000..=0x7FFF => {
                let bank_0 = self.data.prg_bank_0;
                let bank_address =
                    (u32::from(bank_0.bank) << 13) | u32::from(address & 0x1FFF);
                if !bank_0.ram {
                    self.cartridge.get_prg_rom(bank_address)
                } else if bank_0.ram_enabled && self.cartridge.has_prg_ram() {
                    self.cartridge.get_prg_ram(bank_address)
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
                let bank_0 = self.data.prg_bank_0;
                if bank_0.ram && bank_0.ram_enabled {
                    let bank_address =
                        (u32::from(bank_0.bank) << 13) | u32::from(address & 0x1FFF);
                    self.cartridge.set_prg_ram(bank_address, value);
                }
            }
            0x8000..=0x9FFF => self.data.command = value & 0x0F,
            0xA000..=0xBFFF => self.process_command_parameter(value),
            0xC000..=0xFFFF => {
                self.data
                    .audio
                    .attach_with("Sunsoft 5B", Sunsoft5bAudio::new)
                    .write_register(address, value);
            }
        }
    }

    fn process_command_parameter(&mut self, value: u8) {
        match self.data.command {
            command @ 0x00..=0x07 => {
                self.data.chr_map.set_bank(u16::from(command) << 10, BankSizeKb::One, u32::from(value));
            }
            0x08 => {
                self.data.prg_bank_0 =
                    PrgBank0 { ram: value.bit(6), ram_enabled: value.bit(7), bank: value & 0x3F };
            }
            command @ 0x09..=0x0B => {
                let region_addr = (u16::from(command) - 0x09) * 0x2000;
                self.data.prg_map.set_bank(region_addr, BankSizeKb::Eight, u32::from(value & 0x3F));
            }
            0x0C => {
                let mirroring = match value & 0x03 {
                    0x00 => NametableMirroring::Vertical,
                    0x01 => NametableMirroring::Horizontal,
                    0x02 => NametableMirroring::SingleScreenBank0,
                    0x03 => NametableMirroring::SingleScreenBank1,
                    _ => unreachable!("value & 0x03 is always <= 0x03"),
                };
                self.nametables.set_mirroring(mirroring);
            }
            0x0D => {
                self.data.irq_enabled = value.bit(0);
                self.data.irq_counter_enabled = value.bit(7);
                self.data.irq_triggered = false;
            }
            0x0E => {
                self.data.irq_counter = (self.data.irq_counter & 0xFF00) | u16::from(value);
            }
            0x0F => {
                self.data.irq_counter =
                    (self.data.irq_counter & 0x00FF) | (u16::from(value) << 8);
            }
            _ => unreachable!("command is masked to 4 bits"),
        }
    }

    pub(crate) fn tick_cpu(&mut self, cpu_cycles: u32) {
        for _ in 0..cpu_cycles {
            self.data.clock_irq_counter();
        }
        if let Some(chip) = self.data.audio.chip_mut() {
            chip.tick_cpu(cpu_cycles);
        }
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.data.interrupt_flag()
    }

    pub(crate) fn reset(&mut self) {
        self.data.irq_enabled = false;
        self.data.irq_counter_enabled = false;
        self.data.irq_triggered = false;
        self.data.prg_map.set_bank_from_end(0x6000, BankSizeKb::Eight, 1);
    }
}

impl HasBasicPpuMapping for MapperImpl<SunsoftFme7> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        super::nrom::basic_map_ppu_address(&self.data.chr_map, self.data.chr_type, address)
    }
}

//! Code for the Konami VRC7 board (iNES mapper 85), which contains a cut-down OPLL FM synthesis
//! chip in addition to 8KB PRG banking and 1KB CHR banking.

use bincode::{Decode, Encode};

use crate::cartridge::audio::{AudioSlot, ExpansionAudioChip, Vrc7Audio};
use crate::cartridge::banks::{BankSizeKb, ChrBankMap, PrgBankMap};
use crate::cartridge::mappers::konami::irq::VrcIrqCounter;
use crate::cartridge::mappers::{cpu_open_bus, ChrType, HasBasicPpuMapping, PpuMapResult};
use crate::cartridge::nametables::NametableMirroring;
use crate::cartridge::MapperImpl;
use crate::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum Vrc7Variant {
    // Submapper 2: second register line on A4, FM sound populated
    Vrc7a,
    // Submappers 0 and 1: second register line on A3, no sound chip
    Vrc7b,
}

impl Vrc7Variant {
    fn second_register_mask(self) -> u16 {
        match self {
            Self::Vrc7a => 0x0010,
            Self::Vrc7b => 0x0008,
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Vrc7 {
    variant: Vrc7Variant,
    chr_type: ChrType,
    ram_enabled: bool,
    audio_enabled: bool,
    irq: VrcIrqCounter,
    audio: AudioSlot<Vrc7Audio>,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Vrc7 {
    pub(crate) fn new(
        variant: Vrc7Variant,
        chr_type: ChrType,
        prg_rom_len: u32,
        chr_len: u32,
    ) -> Self {
        let mut prg_map = PrgBankMap::new(prg_rom_len);
        prg_map.set_bank_from_end(0x6000, BankSizeKb::Eight, 1);

        Self {
            variant,
            chr_type,
            ram_enabled: false,
            audio_enabled: true,
            irq: VrcIrqCounter::new(),
            audio: AudioSlot::new(),
            prg_map,
            chr_map: ChrBankMap::new(chr_len),
        }
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.irq.pending()
    }

    pub(crate) fn audio(&mut self) -> &mut AudioSlot<Vrc7Audio> {
        &mut self.audio
    }
}

impl MapperImpl<Vrc7> {
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
                if self.data.ram_enabled {
                    self.cartridge.set_prg_ram(u32::from(address & 0x1FFF), value);
                }
            }
            0x8000..=0xFFFF => self.process_register_write(address, value),
        }
    }

    fn process_register_write(&mut self, address: u16, value: u8) {
        let second = address & self.data.variant.second_register_mask() != 0;
        match (address & 0xF000, second) {
            (0x8000, false) => {
                self.data.prg_map.set_bank(0x2000, BankSizeKb::Eight, u32::from(value & 0x3F));
            }
            (0x8000, true) => {
                self.data.prg_map.set_bank(0x4000, BankSizeKb::Eight, u32::from(value & 0x3F));
            }
            (0x9000, second) => self.process_9000_write(address, second, value),
            (0xA000..=0xD000, second) => {
                let base = address & 0xF000;
                let window = 2 * u16::from((base - 0xA000) >> 12) + u16::from(second);
                self.data.chr_map.set_bank(window << 10, BankSizeKb::One, u32::from(value));
            }
            (0xE000, false) => {
                let mirroring = match value & 0x03 {
                    0x00 => NametableMirroring::Vertical,
                    0x01 => NametableMirroring::Horizontal,
                    0x02 => NametableMirroring::SingleScreenBank0,
                    0x03 => NametableMirroring::SingleScreenBank1,
                    _ => unreachable!("value & 0x03 is always 0x00-0x03"),
                };
                self.nametables.set_mirroring(mirroring);
                self.data.ram_enabled = value.bit(7);

                self.data.audio_enabled = !value.bit(6);
                if !self.data.audio_enabled {
                    // Setting the silence bit also resets the sound chip
                    self.data.audio.detach();
                }
            }
            (0xE000, true) => self.data.irq.set_reload_value(value),
            (0xF000, false) => self.data.irq.set_control(value),
            (0xF000, true) => self.data.irq.acknowledge(),
            _ => {}
        }
    }

    fn process_9000_write(&mut self, address: u16, second: bool, value: u8) {
        // On VRC7a the sound chip sits behind A4 ($9010 register select, $9030 data); VRC7b has
        // no sound chip and $9000 mirrors across the whole range
        if self.data.variant == Vrc7Variant::Vrc7a && second {
            if self.data.audio_enabled {
                let register = if address.bit(5) { 0x9030 } else { 0x9010 };
                self.data.audio.attach_with("VRC7", Vrc7Audio::new).write_register(register, value);
            }
            return;
        }

        self.data.prg_map.set_bank(0x6000, BankSizeKb::Eight, u32::from(value & 0x3F));
    }

    pub(crate) fn tick_cpu(&mut self, cpu_cycles: u32) {
        self.data.irq.tick_cpu(cpu_cycles);
        if let Some(chip) = self.data.audio.chip_mut() {
            chip.tick_cpu(cpu_cycles);
        }
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.data.interrupt_flag()
    }

    pub(crate) fn reset(&mut self) {
        self.data.irq = VrcIrqCounter::new();
        self.data.prg_map.set_bank_from_end(0x6000, BankSizeKb::Eight, 1);
        self.data.audio.detach();
    }
}

impl HasBasicPpuMapping for MapperImpl<Vrc7> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        super::super::nrom::basic_map_ppu_address(&self.data.chr_map, self.data.chr_type, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::mappers::fixtures;

    fn new_vrc7(variant: Vrc7Variant) -> MapperImpl<Vrc7> {
        fixtures::mapper_impl(
            fixtures::cartridge(128 * 1024, 128 * 1024, 0),
            NametableMirroring::Vertical,
            Vrc7::new(variant, ChrType::ROM, 128 * 1024, 128 * 1024),
        )
    }

    #[test]
    fn prg_8kb_banking_with_fixed_top_bank() {
        let mut mapper = new_vrc7(Vrc7Variant::Vrc7a);
        mapper.write_cpu_address(0x8000, 3);
        mapper.write_cpu_address(0x8010, 7);
        mapper.write_cpu_address(0x9000, 9);

        assert_eq!(mapper.read_cpu_address(0x8000), 3 * 8);
        assert_eq!(mapper.read_cpu_address(0xA000), 7 * 8);
        assert_eq!(mapper.read_cpu_address(0xC000), 9 * 8);
        assert_eq!(mapper.read_cpu_address(0xE000), (128 - 8) as u8);
    }

    #[test]
    fn second_register_line_differs_by_variant() {
        let mut a = new_vrc7(Vrc7Variant::Vrc7a);
        a.write_cpu_address(0xA010, 21);
        assert_eq!(a.read_ppu_address(0x0400), 21);

        let mut b = new_vrc7(Vrc7Variant::Vrc7b);
        b.write_cpu_address(0xA008, 33);
        assert_eq!(b.read_ppu_address(0x0400), 33);

        // $A008 hits CHR register 0 on VRC7a, not register 1
        let mut a = new_vrc7(Vrc7Variant::Vrc7a);
        a.write_cpu_address(0xA008, 33);
        assert_eq!(a.read_ppu_address(0x0000), 33);
    }

    #[test]
    fn sound_chip_only_on_vrc7a() {
        let mut a = new_vrc7(Vrc7Variant::Vrc7a);
        a.write_cpu_address(0x9010, 0x30);
        a.write_cpu_address(0x9030, 0x0F);
        assert!(a.data.audio().chip().is_some());

        // On VRC7b the same address selects PRG bank 2 instead
        let mut b = new_vrc7(Vrc7Variant::Vrc7b);
        b.write_cpu_address(0x9010, 5);
        assert!(b.data.audio().chip().is_none());
        assert_eq!(b.read_cpu_address(0xC000), 5 * 8);
    }

    #[test]
    fn silence_bit_resets_sound_chip() {
        let mut mapper = new_vrc7(Vrc7Variant::Vrc7a);
        mapper.write_cpu_address(0x9010, 0x30);
        assert!(mapper.data.audio().chip().is_some());

        mapper.write_cpu_address(0xE000, 0x40);
        assert!(mapper.data.audio().chip().is_none());

        // Writes while silenced are dropped
        mapper.write_cpu_address(0x9010, 0x30);
        assert!(mapper.data.audio().chip().is_none());
    }

    #[test]
    fn irq_reload_control_and_acknowledge() {
        let mut mapper = new_vrc7(Vrc7Variant::Vrc7a);
        mapper.write_cpu_address(0xE010, 0xFF);
        mapper.write_cpu_address(0xF000, 0x06);

        mapper.tick_cpu(1);
        assert!(mapper.interrupt_flag());
        mapper.write_cpu_address(0xF010, 0x00);
        assert!(!mapper.interrupt_flag());
    }
}

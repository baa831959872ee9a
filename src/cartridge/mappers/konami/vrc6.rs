//! Code for the Konami VRC6 board (iNES mappers 24 + 26), which adds two pulse channels and a
//! sawtooth channel on top of fairly plain PRG/CHR banking.

use bincode::{Decode, Encode};

use crate::cartridge::audio::{AudioSlot, ExpansionAudioChip, Vrc6Audio};
use crate::cartridge::banks::{BankSizeKb, ChrBankMap, PrgBankMap};
use crate::cartridge::mappers::konami::irq::VrcIrqCounter;
use crate::cartridge::mappers::{cpu_open_bus, ChrType, HasBasicPpuMapping, PpuMapResult};
use crate::cartridge::nametables::NametableMirroring;
use crate::cartridge::MapperImpl;
use crate::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum Vrc6Variant {
    // Mapper 24
    Vrc6a,
    // Mapper 26: A0 and A1 swapped
    Vrc6b,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Vrc6 {
    variant: Vrc6Variant,
    chr_type: ChrType,
    ram_enabled: bool,
    irq: VrcIrqCounter,
    audio: AudioSlot<Vrc6Audio>,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Vrc6 {
    pub(crate) fn new(
        variant: Vrc6Variant,
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
            irq: VrcIrqCounter::new(),
            audio: AudioSlot::new(),
            prg_map,
            chr_map: ChrBankMap::new(chr_len),
        }
    }

    fn remap_register_address(&self, address: u16) -> u16 {
        let address = address & 0xF003;
        match self.variant {
            Vrc6Variant::Vrc6a => address,
            Vrc6Variant::Vrc6b => {
                (address & 0xFFFC) | ((address & 0x0001) << 1) | ((address & 0x0002) >> 1)
            }
        }
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.irq.pending()
    }

    pub(crate) fn audio(&mut self) -> &mut AudioSlot<Vrc6Audio> {
        &mut self.audio
    }
}

impl MapperImpl<Vrc6> {
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
        let register = self.data.remap_register_address(address);
        match register {
            0x8000..=0x8003 => {
                self.data.prg_map.set_bank(0x0000, BankSizeKb::Sixteen, u32::from(value & 0x0F));
            }
            0x9000..=0x9003 | 0xA000..=0xA002 | 0xB000..=0xB002 => {
                self.data.audio.attach_with("VRC6", Vrc6Audio::new).write_register(register, value);
            }
            0xB003 => {
                let mirroring = match value & 0x0C {
                    0x00 => NametableMirroring::Vertical,
                    0x04 => NametableMirroring::Horizontal,
                    0x08 => NametableMirroring::SingleScreenBank0,
                    0x0C => NametableMirroring::SingleScreenBank1,
                    _ => unreachable!("value & 0x0C is always 0x00/0x04/0x08/0x0C"),
                };
                self.nametables.set_mirroring(mirroring);
                self.data.ram_enabled = value.bit(7);
            }
            0xC000..=0xC003 => {
                self.data.prg_map.set_bank(0x4000, BankSizeKb::Eight, u32::from(value & 0x1F));
            }
            0xD000..=0xD003 | 0xE000..=0xE003 => {
                let window = 4 * u16::from((register - 0xD000) >> 12) + (register & 0x0003);
                self.data.chr_map.set_bank(window << 10, BankSizeKb::One, u32::from(value));
            }
            0xF000 => self.data.irq.set_reload_value(value),
            0xF001 => self.data.irq.set_control(value),
            0xF002 => self.data.irq.acknowledge(),
            _ => {}
        }
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
    }
}

impl HasBasicPpuMapping for MapperImpl<Vrc6> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        super::super::nrom::basic_map_ppu_address(&self.data.chr_map, self.data.chr_type, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::mappers::fixtures;

    fn new_vrc6(variant: Vrc6Variant) -> MapperImpl<Vrc6> {
        fixtures::mapper_impl(
            fixtures::cartridge(256 * 1024, 256 * 1024, 0),
            NametableMirroring::Vertical,
            Vrc6::new(variant, ChrType::ROM, 256 * 1024, 256 * 1024),
        )
    }

    #[test]
    fn prg_banking() {
        let mut mapper = new_vrc6(Vrc6Variant::Vrc6a);
        mapper.write_cpu_address(0x8000, 3);
        mapper.write_cpu_address(0xC000, 11);

        assert_eq!(mapper.read_cpu_address(0x8000), 3 * 16);
        assert_eq!(mapper.read_cpu_address(0xC000), 11 * 8);
        assert_eq!(mapper.read_cpu_address(0xE000), (256 - 8) as u8);
    }

    #[test]
    fn vrc6b_swaps_register_lines() {
        let mut mapper = new_vrc6(Vrc6Variant::Vrc6b);

        // On VRC6b, CPU A1 drives chip A0: $D002 selects CHR register 1
        mapper.write_cpu_address(0xD002, 25);
        assert_eq!(mapper.read_ppu_address(0x0400), 25);
    }

    #[test]
    fn audio_attaches_on_first_audio_register_write() {
        let mut mapper = new_vrc6(Vrc6Variant::Vrc6a);
        assert!(mapper.data.audio().chip().is_none());

        // Banking writes must not attach the chip
        mapper.write_cpu_address(0x8000, 1);
        mapper.write_cpu_address(0xC000, 1);
        assert!(mapper.data.audio().chip().is_none());

        mapper.write_cpu_address(0x9000, 0x0F);
        assert!(mapper.data.audio().chip().is_some());
    }

    #[test]
    fn irq_via_f_registers() {
        let mut mapper = new_vrc6(Vrc6Variant::Vrc6a);
        mapper.write_cpu_address(0xF000, 0xFF);
        mapper.write_cpu_address(0xF001, 0x06);

        mapper.tick_cpu(1);
        assert!(mapper.interrupt_flag());
        mapper.write_cpu_address(0xF002, 0x00);
        assert!(!mapper.interrupt_flag());
    }
}

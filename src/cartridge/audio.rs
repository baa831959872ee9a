//! Expansion audio register interfaces.
//!
//! A handful of cartridges put an extra sound chip on the board and wire its registers into
//! CPU address space. This module holds the register-level state for those chips: what the
//! games write, latched exactly as the hardware latches it, plus a coarse output level derived
//! from the latched volumes. Waveform synthesis is the host mixer's concern and does not live
//! here.
//!
//! Chips are attached lazily: a mapper creates its chip the first time a game touches an audio
//! register, so cartridges that never use the hardware pay nothing for it.

use bincode::{Decode, Encode};

use crate::num::GetBit;

pub trait ExpansionAudioChip {
    /// Handles a CPU write to one of the chip's registers. `address` is the full CPU address.
    fn write_register(&mut self, address: u16, value: u8);

    /// Advances the chip's internal clock by the given number of CPU cycles.
    fn tick_cpu(&mut self, cpu_cycles: u32);

    /// Current output level in [0, 1], derived from latched channel volumes.
    fn sample(&self) -> f64;
}

/// One-shot attachment point for a mapper's expansion audio chip.
///
/// The chip is created on the first register write and lives for the rest of the emulation
/// session; later writes reuse the existing chip so its register state is never lost.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct AudioSlot<C> {
    chip: Option<C>,
}

impl<C: ExpansionAudioChip> AudioSlot<C> {
    pub(crate) fn new() -> Self {
        Self { chip: None }
    }

    pub(crate) fn attach_with(&mut self, name: &'static str, create: impl FnOnce() -> C) -> &mut C {
        self.chip.get_or_insert_with(|| {
            log::info!("Attaching {name} expansion audio chip on first register write");
            create()
        })
    }

    pub(crate) fn chip(&self) -> Option<&C> {
        self.chip.as_ref()
    }

    pub(crate) fn chip_mut(&mut self) -> Option<&mut C> {
        self.chip.as_mut()
    }

    pub(crate) fn detach(&mut self) {
        self.chip = None;
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
struct Vrc6Pulse {
    volume: u8,
    duty_cycle: u8,
    ignore_duty: bool,
    frequency: u16,
    enabled: bool,
}

impl Vrc6Pulse {
    fn write_control(&mut self, value: u8) {
        self.volume = value & 0x0F;
        self.duty_cycle = (value >> 4) & 0x07;
        self.ignore_duty = value.bit(7);
    }

    fn write_frequency_low(&mut self, value: u8) {
        self.frequency = (self.frequency & 0x0F00) | u16::from(value);
    }

    fn write_frequency_high(&mut self, value: u8) {
        self.frequency = (self.frequency & 0x00FF) | (u16::from(value & 0x0F) << 8);
        self.enabled = value.bit(7);
    }
}

/// VRC6 audio: two extra pulse channels and a sawtooth channel.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub(crate) struct Vrc6Audio {
    pulse_1: Vrc6Pulse,
    pulse_2: Vrc6Pulse,
    saw_accumulator_rate: u8,
    saw_frequency: u16,
    saw_enabled: bool,
    halted: bool,
    cpu_cycles: u64,
}

impl Vrc6Audio {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl ExpansionAudioChip for Vrc6Audio {
    fn write_register(&mut self, address: u16, value: u8) {
        match address {
            0x9000 => self.pulse_1.write_control(value),
            0x9001 => self.pulse_1.write_frequency_low(value),
            0x9002 => self.pulse_1.write_frequency_high(value),
            0x9003 => self.halted = value.bit(0),
            0xA000 => self.pulse_2.write_control(value),
            0xA001 => self.pulse_2.write_frequency_low(value),
            0xA002 => self.pulse_2.write_frequency_high(value),
            0xB000 => self.saw_accumulator_rate = value & 0x3F,
            0xB001 => self.saw_frequency = (self.saw_frequency & 0x0F00) | u16::from(value),
            0xB002 => {
                self.saw_frequency = (self.saw_frequency & 0x00FF) | (u16::from(value & 0x0F) << 8);
                self.saw_enabled = value.bit(7);
            }
            _ => log::debug!("Unexpected VRC6 audio register write: {address:04X} {value:02X}"),
        }
    }

    fn tick_cpu(&mut self, cpu_cycles: u32) {
        self.cpu_cycles += u64::from(cpu_cycles);
    }

    fn sample(&self) -> f64 {
        if self.halted {
            return 0.0;
        }

        let pulse_level = |pulse: &Vrc6Pulse| if pulse.enabled { pulse.volume } else { 0 };
        // Sawtooth peaks at the accumulator rate's high 5 bits after 7 accumulation steps
        let saw_level =
            if self.saw_enabled { (u16::from(self.saw_accumulator_rate) * 7) >> 4 } else { 0 };

        f64::from(
            u16::from(pulse_level(&self.pulse_1)) + u16::from(pulse_level(&self.pulse_2)) + saw_level,
        ) / 61.0
    }
}

/// Sunsoft 5B audio: the YM2149F-derived PSG on Gimmick!'s board.
///
/// Register select at $C000-$DFFF, register data at $E000-$FFFF.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub(crate) struct Sunsoft5bAudio {
    selected_register: u8,
    registers: [u8; 16],
    cpu_cycles: u64,
}

impl Sunsoft5bAudio {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn tone_enabled(&self, channel: u8) -> bool {
        // Enable bits in register 7 are active-low
        !self.registers[7].bit(channel)
    }
}

impl ExpansionAudioChip for Sunsoft5bAudio {
    fn write_register(&mut self, address: u16, value: u8) {
        match address {
            0xC000..=0xDFFF => self.selected_register = value & 0x0F,
            0xE000..=0xFFFF => self.registers[usize::from(self.selected_register)] = value,
            _ => log::debug!("Unexpected 5B audio register write: {address:04X} {value:02X}"),
        }
    }

    fn tick_cpu(&mut self, cpu_cycles: u32) {
        self.cpu_cycles += u64::from(cpu_cycles);
    }

    fn sample(&self) -> f64 {
        let mut level = 0_u16;
        for channel in 0..3_u8 {
            if self.tone_enabled(channel) {
                level += u16::from(self.registers[usize::from(8 + channel)] & 0x0F);
            }
        }
        f64::from(level) / 45.0
    }
}

/// VRC7 audio: the YM2413-derived FM synthesizer, register interface only.
///
/// Register select at $9010, register data at $9030.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Vrc7Audio {
    selected_register: u8,
    registers: [u8; 0x40],
    cpu_cycles: u64,
}

impl Vrc7Audio {
    pub(crate) fn new() -> Self {
        Self { selected_register: 0, registers: [0; 0x40], cpu_cycles: 0 }
    }
}

impl ExpansionAudioChip for Vrc7Audio {
    fn write_register(&mut self, address: u16, value: u8) {
        match address {
            0x9010 => self.selected_register = value & 0x3F,
            0x9030 => self.registers[usize::from(self.selected_register)] = value,
            _ => log::debug!("Unexpected VRC7 audio register write: {address:04X} {value:02X}"),
        }
    }

    fn tick_cpu(&mut self, cpu_cycles: u32) {
        self.cpu_cycles += u64::from(cpu_cycles);
    }

    fn sample(&self) -> f64 {
        // Registers $30-$35 hold each melody channel's volume as an attenuation in the low nibble
        let mut level = 0_u16;
        for channel in 0..6_usize {
            level += u16::from(15 - (self.registers[0x30 + channel] & 0x0F));
        }
        f64::from(level) / 90.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_attaches_once() {
        let mut slot: AudioSlot<Vrc6Audio> = AudioSlot::new();
        assert!(slot.chip().is_none());

        slot.attach_with("VRC6", Vrc6Audio::new).write_register(0x9000, 0x0F);
        slot.attach_with("VRC6", Vrc6Audio::new).write_register(0x9002, 0x80);

        // The second attach must not have recreated the chip and dropped the $9000 write
        let chip = slot.chip().unwrap();
        assert_eq!(chip.pulse_1.volume, 0x0F);
        assert!(chip.pulse_1.enabled);
    }

    #[test]
    fn vrc6_sample_reflects_latched_volumes() {
        let mut chip = Vrc6Audio::new();
        assert!(chip.sample().abs() < f64::EPSILON);

        chip.write_register(0x9000, 0x0F);
        chip.write_register(0x9002, 0x80);
        assert!(chip.sample() > 0.0);

        chip.write_register(0x9003, 0x01);
        assert!(chip.sample().abs() < f64::EPSILON, "halt bit should silence the chip");
    }

    #[test]
    fn sunsoft_5b_register_select_then_data() {
        let mut chip = Sunsoft5bAudio::new();
        chip.write_register(0xC000, 0x08);
        chip.write_register(0xE000, 0x0C);
        assert_eq!(chip.registers[8], 0x0C);

        // All tones disabled
        chip.write_register(0xC000, 0x07);
        chip.write_register(0xE000, 0x3F);
        assert!(chip.sample().abs() < f64::EPSILON);
    }

    #[test]
    fn vrc7_register_select_then_data() {
        let mut chip = Vrc7Audio::new();
        chip.write_register(0x9010, 0x30);
        chip.write_register(0x9030, 0x2F);
        assert_eq!(chip.registers[0x30], 0x2F);
    }
}

//! The IRQ counter shared by the VRC4, VRC6, and VRC7 boards.
//!
//! The counter counts up and raises an IRQ on overflow. In scanline mode a prescaler divides
//! the CPU clock by 113+2/3 so the counter clocks approximately once per NTSC scanline; in
//! cycle mode it clocks every CPU cycle.

use bincode::{Decode, Encode};

use crate::num::GetBit;

// 341 PPU dots per scanline / 3 dots per CPU cycle
const PRESCALER_SEQUENCE: [u8; 3] = [114, 114, 113];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum IrqMode {
    Scanline,
    Cycle,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct VrcIrqCounter {
    mode: IrqMode,
    enabled: bool,
    enabled_after_acknowledge: bool,
    reload_value: u8,
    counter: u8,
    prescaler_counter: u8,
    prescaler_index: u8,
    pending: bool,
}

impl VrcIrqCounter {
    pub(crate) fn new() -> Self {
        Self {
            mode: IrqMode::Scanline,
            enabled: false,
            enabled_after_acknowledge: false,
            reload_value: 0,
            counter: 0,
            prescaler_counter: 0,
            prescaler_index: 0,
            pending: false,
        }
    }

    pub(crate) fn set_reload_value(&mut self, value: u8) {
        self.reload_value = value;
    }

    pub(crate) fn set_reload_value_low_4_bits(&mut self, value: u8) {
        self.reload_value = (self.reload_value & 0xF0) | (value & 0x0F);
    }

    pub(crate) fn set_reload_value_high_4_bits(&mut self, value: u8) {
        self.reload_value = (self.reload_value & 0x0F) | (value << 4);
    }

    pub(crate) fn set_control(&mut self, value: u8) {
        self.pending = false;
        self.enabled_after_acknowledge = value.bit(0);
        self.enabled = value.bit(1);
        self.mode = if value.bit(2) { IrqMode::Cycle } else { IrqMode::Scanline };

        if self.enabled {
            self.counter = self.reload_value;
            self.prescaler_counter = 0;
            self.prescaler_index = 0;
        }
    }

    pub(crate) fn acknowledge(&mut self) {
        self.pending = false;
        self.enabled = self.enabled_after_acknowledge;
    }

    pub(crate) fn tick_cpu(&mut self, cpu_cycles: u32) {
        for _ in 0..cpu_cycles {
            self.tick();
        }
    }

    fn tick(&mut self) {
        if !self.enabled {
            return;
        }

        match self.mode {
            IrqMode::Cycle => self.clock(),
            IrqMode::Scanline => {
                self.prescaler_counter += 1;
                if self.prescaler_counter == PRESCALER_SEQUENCE[usize::from(self.prescaler_index)] {
                    self.prescaler_counter = 0;
                    self.prescaler_index = (self.prescaler_index + 1) % 3;
                    self.clock();
                }
            }
        }
    }

    fn clock(&mut self) {
        if self.counter == u8::MAX {
            self.counter = self.reload_value;
            self.pending = true;
        } else {
            self.counter += 1;
        }
    }

    pub(crate) fn pending(&self) -> bool {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_mode_overflows_after_256_minus_reload_cycles() {
        let mut irq = VrcIrqCounter::new();
        irq.set_reload_value(0xFC);
        irq.set_control(0x06);

        irq.tick_cpu(3);
        assert!(!irq.pending());
        irq.tick_cpu(1);
        assert!(irq.pending(), "counter should overflow on the 4th clock");
    }

    #[test]
    fn scanline_mode_divides_by_prescaler() {
        let mut irq = VrcIrqCounter::new();
        irq.set_reload_value(0xFF);
        irq.set_control(0x02);

        // First scanline clock happens after 114 CPU cycles
        irq.tick_cpu(113);
        assert!(!irq.pending());
        irq.tick_cpu(1);
        assert!(irq.pending());
    }

    #[test]
    fn acknowledge_applies_the_after_ack_enable_bit() {
        let mut irq = VrcIrqCounter::new();
        irq.set_reload_value(0xFF);

        // Enabled now, but disabled after acknowledge
        irq.set_control(0x06);
        irq.tick_cpu(1);
        assert!(irq.pending());

        irq.acknowledge();
        assert!(!irq.pending());
        irq.tick_cpu(300);
        assert!(!irq.pending(), "counting should stop after acknowledge when bit 0 is clear");

        // Enabled, and still enabled after acknowledge
        irq.set_control(0x07);
        irq.tick_cpu(1);
        irq.acknowledge();
        irq.tick_cpu(1);
        assert!(irq.pending(), "counting should continue after acknowledge when bit 0 is set");
    }

    #[test]
    fn control_write_reloads_the_counter() {
        let mut irq = VrcIrqCounter::new();
        irq.set_reload_value_low_4_bits(0x0E);
        irq.set_reload_value_high_4_bits(0x0F);
        irq.set_control(0x06);

        irq.tick_cpu(1);
        assert!(!irq.pending());
        irq.tick_cpu(1);
        assert!(irq.pending());
    }
}

//! The CPU IRQ line and the per-source latch that drives it.
//!
//! The 6502's IRQ input is level-triggered and shared: the cartridge, the APU frame counter,
//! and the APU DMC channel can all pull it low simultaneously. `CpuIrqLine` models the line as
//! a count of active pullers, and `IrqLine` ensures that each individual source contributes at
//! most one pull no matter how many times it re-reports the same asserted/cleared state.

use bincode::{Decode, Encode};

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct CpuIrqLine {
    pulls: u32,
}

impl CpuIrqLine {
    #[must_use]
    pub fn new() -> Self {
        Self { pulls: 0 }
    }

    pub(crate) fn pull(&mut self) {
        self.pulls += 1;
    }

    pub(crate) fn release(&mut self) {
        debug_assert!(self.pulls > 0, "IRQ line released with no active pulls");
        self.pulls = self.pulls.saturating_sub(1);
    }

    /// Whether any source is currently pulling the line low.
    #[must_use]
    pub fn asserted(&self) -> bool {
        self.pulls > 0
    }

    #[must_use]
    pub fn pull_count(&self) -> u32 {
        self.pulls
    }
}

/// A single IRQ source's connection to the shared line.
///
/// Sources report their current output level through [`IrqLine::set`] as often as they like;
/// the line is only pulled on a false-to-true transition and only released on a true-to-false
/// transition.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct IrqLine {
    asserting: bool,
}

impl IrqLine {
    #[must_use]
    pub fn new() -> Self {
        Self { asserting: false }
    }

    pub fn set(&mut self, asserting: bool, cpu_irq_line: &mut CpuIrqLine) {
        if asserting && !self.asserting {
            cpu_irq_line.pull();
        } else if !asserting && self.asserting {
            cpu_irq_line.release();
        }
        self.asserting = asserting;
    }

    #[must_use]
    pub fn asserting(&self) -> bool {
        self.asserting
    }
}

//! Code for the Konami VRC boards:
//!
//! VRC2 and VRC4 (iNES mappers 21 + 22 + 23 + 25)
//! VRC6 (iNES mappers 24 + 26)
//! VRC7 (iNES mapper 85)
//!
//! The variants differ mainly in which CPU address lines they decode as register selects,
//! since the chips' A0/A1 inputs were wired to different lines board by board.

mod irq;
mod vrc4;
mod vrc6;
mod vrc7;

pub(crate) use vrc4::{Vrc4, VrcKind};
pub(crate) use vrc6::{Vrc6, Vrc6Variant};
pub(crate) use vrc7::{Vrc7, Vrc7Variant};

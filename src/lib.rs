#![forbid(unsafe_code)]

mod num;

pub mod cartridge;

pub use cartridge::{
    CartridgeError, CpuIrqLine, ExpansionAudioChip, IrqLine, Mapper, NametableMirroring,
    RomHeader, TimingMode, new_mapper,
};

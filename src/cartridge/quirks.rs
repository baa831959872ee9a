//! Per-title behavior overrides for cartridges that depend on undocumented board wiring.
//!
//! Keyed by CRC32 of the PRG ROM image so the overrides survive header differences between
//! dumps of the same game.

use crc::Crc;

use crate::cartridge::nametables::NametableMirroring;

const CRC: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CartridgeQuirk {
    // Board wires PPU A10/A11 straight to 4KB of cartridge VRAM regardless of the header
    ForceFourScreenVram,
    // Header mirroring bit is known-wrong for this dump
    ForceMirroring(NametableMirroring),
    // Board has no PRG RAM even though the mapper family usually does; reads must float
    DisablePrgRam,
}

pub(crate) fn lookup(prg_rom: &[u8]) -> Option<CartridgeQuirk> {
    let checksum = CRC.checksum(prg_rom);

    let quirk = match checksum {
        // Rad Racer II (U)
        0x404B2E8B => Some(CartridgeQuirk::ForceFourScreenVram),
        // Gauntlet (U)
        0x1D6DECCC => Some(CartridgeQuirk::ForceFourScreenVram),
        // Cybernoid: The Fighting Machine (U)
        0x7BD8F902 => Some(CartridgeQuirk::ForceMirroring(NametableMirroring::Vertical)),
        // Low G Man: The Low Gravity Man (U)
        0x98C1CD4B => Some(CartridgeQuirk::DisablePrgRam),
        _ => None,
    };

    if let Some(quirk) = quirk {
        log::info!("Applying quirk {quirk:?} for PRG ROM with CRC32 {checksum:08X}");
    }

    quirk
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_checksum_has_no_quirk() {
        assert_eq!(lookup(&[0x00; 4096]), None);
    }
}

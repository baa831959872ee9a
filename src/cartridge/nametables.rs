//! Nametable memory and the mirroring control that routes PPU accesses to it.
//!
//! The PPU address space has four 1KB nametable quadrants at $2000-$2FFF but the console only
//! wires up 2KB of internal VRAM (CIRAM); the cartridge decides which physical 1KB page each
//! quadrant resolves to. [`Nametables`] owns the CIRAM, any cartridge-supplied extra nametable
//! RAM, and a 4-slot routing table that mappers reassign either wholesale (standard mirroring
//! writes) or per-quadrant (MMC5 $5105).

use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum NametableMirroring {
    Horizontal,
    Vertical,
    SingleScreenBank0,
    SingleScreenBank1,
    FourScreen,
}

impl NametableMirroring {
    fn to_slots(self) -> [NametableSlot; 4] {
        use NametableSlot::*;

        match self {
            Self::Horizontal => [Ciram0, Ciram0, Ciram1, Ciram1],
            Self::Vertical => [Ciram0, Ciram1, Ciram0, Ciram1],
            Self::SingleScreenBank0 => [Ciram0, Ciram0, Ciram0, Ciram0],
            Self::SingleScreenBank1 => [Ciram1, Ciram1, Ciram1, Ciram1],
            Self::FourScreen => [Ciram0, Ciram1, ExtRam0, ExtRam1],
        }
    }
}

/// A physical 1KB page that a nametable quadrant can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum NametableSlot {
    Ciram0,
    Ciram1,
    ExtRam0,
    ExtRam1,
    /// Reads return a fixed tile/attribute pattern; writes are ignored.
    Fill,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Nametables {
    ciram: Box<[u8; 2048]>,
    extra_ram: Option<Box<[u8; 2048]>>,
    slots: [NametableSlot; 4],
    fill_tile: u8,
    fill_attributes: u8,
}

impl Nametables {
    pub(crate) fn new(mirroring: NametableMirroring, has_extra_ram: bool) -> Self {
        Self {
            ciram: Box::new([0; 2048]),
            extra_ram: has_extra_ram.then(|| Box::new([0; 2048])),
            slots: mirroring.to_slots(),
            fill_tile: 0,
            fill_attributes: 0,
        }
    }

    /// Reassigns all four quadrant slots to the given standard mirroring layout.
    ///
    /// The reassignment takes effect as a unit; there is no intermediate state where some
    /// quadrants reflect the old layout.
    pub(crate) fn set_mirroring(&mut self, mirroring: NametableMirroring) {
        self.slots = mirroring.to_slots();
    }

    pub(crate) fn set_slots(&mut self, slots: [NametableSlot; 4]) {
        self.slots = slots;
    }

    pub(crate) fn slots(&self) -> [NametableSlot; 4] {
        self.slots
    }

    pub(crate) fn set_fill_tile(&mut self, tile: u8) {
        self.fill_tile = tile;
    }

    /// Sets the fill attribute from its low 2 bits, replicated across all four quadrant
    /// positions of the attribute byte.
    pub(crate) fn set_fill_attributes(&mut self, value: u8) {
        let attributes = value & 0x03;
        self.fill_attributes = attributes | (attributes << 2) | (attributes << 4) | (attributes << 6);
    }

    fn slot_for(&self, address: u16) -> NametableSlot {
        self.slots[usize::from((address & 0x0FFF) >> 10)]
    }

    /// Reads from PPU nametable space; `address` must be in $2000-$3EFF.
    pub(crate) fn read(&self, address: u16) -> u8 {
        let offset = usize::from(address & 0x03FF);
        match self.slot_for(address) {
            NametableSlot::Ciram0 => self.ciram[offset],
            NametableSlot::Ciram1 => self.ciram[0x0400 | offset],
            NametableSlot::ExtRam0 => self.extra_ram()[offset],
            NametableSlot::ExtRam1 => self.extra_ram()[0x0400 | offset],
            NametableSlot::Fill => {
                if address & 0x03FF >= 0x03C0 {
                    self.fill_attributes
                } else {
                    self.fill_tile
                }
            }
        }
    }

    /// Writes to PPU nametable space; `address` must be in $2000-$3EFF.
    pub(crate) fn write(&mut self, address: u16, value: u8) {
        let offset = usize::from(address & 0x03FF);
        match self.slot_for(address) {
            NametableSlot::Ciram0 => self.ciram[offset] = value,
            NametableSlot::Ciram1 => self.ciram[0x0400 | offset] = value,
            NametableSlot::ExtRam0 => self.extra_ram_mut()[offset] = value,
            NametableSlot::ExtRam1 => self.extra_ram_mut()[0x0400 | offset] = value,
            NametableSlot::Fill => {}
        }
    }

    pub(crate) fn has_extra_ram(&self) -> bool {
        self.extra_ram.is_some()
    }

    pub(crate) fn extra_ram(&self) -> &[u8; 2048] {
        match &self.extra_ram {
            Some(ram) => ram,
            None => panic!("nametable slot references extra RAM that was never allocated"),
        }
    }

    pub(crate) fn extra_ram_mut(&mut self) -> &mut [u8; 2048] {
        match &mut self.extra_ram {
            Some(ram) => ram,
            None => panic!("nametable slot references extra RAM that was never allocated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_mirroring_pairs_quadrants() {
        let mut nametables = Nametables::new(NametableMirroring::Horizontal, false);

        nametables.write(0x2005, 0xAB);
        assert_eq!(nametables.read(0x2405), 0xAB, "quadrants 0 and 1 should share a page");
        assert_eq!(nametables.read(0x2805), 0x00);

        nametables.write(0x2C05, 0xCD);
        assert_eq!(nametables.read(0x2805), 0xCD, "quadrants 2 and 3 should share a page");
    }

    #[test]
    fn vertical_mirroring_pairs_quadrants() {
        let mut nametables = Nametables::new(NametableMirroring::Vertical, false);

        nametables.write(0x2010, 0x11);
        assert_eq!(nametables.read(0x2810), 0x11);
        assert_eq!(nametables.read(0x2410), 0x00);
    }

    #[test]
    fn mirroring_change_is_atomic() {
        let mut nametables = Nametables::new(NametableMirroring::SingleScreenBank0, false);
        nametables.write(0x2000, 0x55);

        nametables.set_mirroring(NametableMirroring::SingleScreenBank1);
        for quadrant_base in [0x2000, 0x2400, 0x2800, 0x2C00] {
            assert_eq!(nametables.read(quadrant_base), 0x00);
        }
    }

    #[test]
    fn four_screen_quadrants_are_distinct() {
        let mut nametables = Nametables::new(NametableMirroring::FourScreen, true);

        for (i, quadrant_base) in [0x2000_u16, 0x2400, 0x2800, 0x2C00].into_iter().enumerate() {
            nametables.write(quadrant_base + 7, i as u8 + 1);
        }
        for (i, quadrant_base) in [0x2000_u16, 0x2400, 0x2800, 0x2C00].into_iter().enumerate() {
            assert_eq!(nametables.read(quadrant_base + 7), i as u8 + 1);
        }
    }

    #[test]
    fn fill_slot_returns_pattern_and_ignores_writes() {
        let mut nametables = Nametables::new(NametableMirroring::Vertical, false);
        nametables.set_slots([NametableSlot::Fill; 4]);
        nametables.set_fill_tile(0x42);
        nametables.set_fill_attributes(0x02);

        nametables.write(0x2000, 0xFF);
        assert_eq!(nametables.read(0x2000), 0x42);
        assert_eq!(nametables.read(0x23C0), 0b10_10_10_10);
    }

    #[test]
    fn upper_mirror_of_nametable_space() {
        let mut nametables = Nametables::new(NametableMirroring::Vertical, false);
        nametables.write(0x2123, 0x77);
        assert_eq!(nametables.read(0x3123), 0x77);
    }
}

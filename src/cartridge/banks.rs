//! PRG/CHR bank mapping tables.
//!
//! Every mapper resolves CPU and PPU addresses through a [`BankMap`]: a table of 1KB windows
//! covering an address region, each holding a byte offset into the backing ROM/RAM image.
//! Mappers rebuild the affected windows whenever a bank-select register changes, so reads are
//! a table lookup rather than re-deriving the mapping from register state on every access.

use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum BankSizeKb {
    One,
    Two,
    Four,
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl BankSizeKb {
    pub(crate) fn shift(self) -> u32 {
        match self {
            Self::One => 10,
            Self::Two => 11,
            Self::Four => 12,
            Self::Eight => 13,
            Self::Sixteen => 14,
            Self::ThirtyTwo => 15,
        }
    }

    pub(crate) fn window_count(self) -> usize {
        1 << (self.shift() - 10)
    }
}

/// A bank mapping table of `WINDOWS` 1KB windows.
///
/// `BankMap<32>` covers the 32KB CPU cartridge region at $8000-$FFFF and `BankMap<8>` covers
/// the 8KB PPU pattern table region at $0000-$1FFF. Addresses passed in are relative to the
/// region base.
///
/// Bank numbers wrap modulo the image size, so selecting bank 7 of a 4-bank image maps bank 3.
/// Oversized dumps and small boards sharing one register layout both rely on this.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct BankMap<const WINDOWS: usize> {
    offsets: [u32; WINDOWS],
    image_len: u32,
}

pub(crate) type PrgBankMap = BankMap<32>;
pub(crate) type ChrBankMap = BankMap<8>;

impl<const WINDOWS: usize> BankMap<WINDOWS> {
    /// Creates a map with the identity mapping: window N points to offset N*1024, wrapped to
    /// the image size.
    pub(crate) fn new(image_len: u32) -> Self {
        debug_assert!(image_len != 0 && image_len % 1024 == 0, "invalid image size: {image_len}");

        let mut map = Self { offsets: [0; WINDOWS], image_len };
        for window in 0..WINDOWS {
            map.offsets[window] = (window as u32 * 1024) % image_len;
        }
        map
    }

    /// Points the windows starting at `region_addr` at the given bank.
    ///
    /// `region_addr` must be aligned to the bank size.
    pub(crate) fn set_bank(&mut self, region_addr: u16, bank_size: BankSizeKb, bank_number: u32) {
        let bank_addr = bank_number << bank_size.shift();
        if bank_addr >= self.image_len {
            log::trace!(
                "Bank {bank_number} ({}KB) is past the end of a {}-byte image; wrapping",
                1 << (bank_size.shift() - 10),
                self.image_len
            );
        }

        let first_window = usize::from(region_addr >> 10);
        debug_assert!(first_window + bank_size.window_count() <= WINDOWS);
        for (i, offset) in
            self.offsets[first_window..first_window + bank_size.window_count()].iter_mut().enumerate()
        {
            *offset = (bank_addr + i as u32 * 1024) % self.image_len;
        }
    }

    /// Points the windows starting at `region_addr` at the Nth bank from the end of the image.
    ///
    /// `inverse_bank_number` of 1 selects the last bank, 2 the second-to-last, and so on.
    /// Mappers with fixed boot banks use this so the mapping is correct for any image size.
    pub(crate) fn set_bank_from_end(
        &mut self,
        region_addr: u16,
        bank_size: BankSizeKb,
        inverse_bank_number: u32,
    ) {
        let bank_count = self.image_len >> bank_size.shift();
        self.set_bank(region_addr, bank_size, bank_count.saturating_sub(inverse_bank_number));
    }

    /// Points a single 1KB window at an arbitrary byte offset, wrapped to the image size.
    /// For mappers whose window layout does not decompose into aligned power-of-two banks.
    pub(crate) fn map_window(&mut self, region_addr: u16, image_offset: u32) {
        self.offsets[usize::from(region_addr >> 10)] = image_offset % self.image_len;
    }

    /// Translates a region-relative address to a byte offset into the backing image.
    pub(crate) fn resolve(&self, region_addr: u16) -> u32 {
        self.offsets[usize::from(region_addr >> 10) % WINDOWS] + u32::from(region_addr & 0x03FF)
    }
}

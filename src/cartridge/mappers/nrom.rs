//! Code for the NROM board (iNES mapper 0) as well as other boards built from discrete logic:
//!
//! UxROM (iNES mapper 2) and the Codemasters/Fire Hawk variants (iNES mapper 71)
//! CNROM (iNES mapper 3)
//! AxROM (iNES mapper 7)
//! GxROM (iNES mapper 66) and Color Dreams (iNES mapper 11)
//! BNROM and NINA-001 (both iNES mapper 34)

use bincode::{Decode, Encode};

use crate::cartridge::banks::{BankSizeKb, ChrBankMap, PrgBankMap};
use crate::cartridge::mappers::{cpu_open_bus, ChrType, HasBasicPpuMapping, PpuMapResult};
use crate::cartridge::nametables::NametableMirroring;
use crate::cartridge::{Cartridge, MapperImpl};
use crate::num::GetBit;

pub(crate) fn basic_read_cpu_address(
    cartridge: &Cartridge,
    prg_map: &PrgBankMap,
    address: u16,
) -> u8 {
    match address {
        0x0000..=0x401F => panic!("invalid CPU map address: 0x{address:04X}"),
        0x4020..=0x5FFF => cpu_open_bus(address),
        0x6000..=0x7FFF => {
            if cartridge.has_prg_ram() {
                cartridge.get_prg_ram(u32::from(address & 0x1FFF))
            } else {
                cpu_open_bus(address)
            }
        }
        0x8000..=0xFFFF => cartridge.get_prg_rom(prg_map.resolve(address & 0x7FFF)),
    }
}

pub(crate) fn basic_map_ppu_address(
    chr_map: &ChrBankMap,
    chr_type: ChrType,
    address: u16,
) -> PpuMapResult {
    match address {
        0x0000..=0x1FFF => chr_type.to_map_result(chr_map.resolve(address)),
        0x2000..=0x3EFF => PpuMapResult::Nametable(address),
        _ => panic!("invalid PPU map address: 0x{address:04X}"),
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Nrom {
    chr_type: ChrType,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Nrom {
    pub(crate) fn new(chr_type: ChrType, prg_rom_len: u32, chr_len: u32) -> Self {
        // A 16KB image mirrors into both halves of the window through bank wrapping
        Self {
            chr_type,
            prg_map: PrgBankMap::new(prg_rom_len),
            chr_map: ChrBankMap::new(chr_len),
        }
    }
}

impl MapperImpl<Nrom> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        basic_read_cpu_address(&self.cartridge, &self.data.prg_map, address)
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        if let 0x6000..=0x7FFF = address {
            self.cartridge.set_prg_ram(u32::from(address & 0x1FFF), value);
        }
        // No registers; writes to ROM addresses do nothing
    }

    pub(crate) fn reset(&mut self) {}
}

impl HasBasicPpuMapping for MapperImpl<Nrom> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        basic_map_ppu_address(&self.data.chr_map, self.data.chr_type, address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum UxromVariant {
    Uxrom,
    Codemasters,
    FireHawk,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Uxrom {
    variant: UxromVariant,
    chr_type: ChrType,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Uxrom {
    pub(crate) fn name(&self) -> &'static str {
        match self.variant {
            UxromVariant::Uxrom => "UxROM",
            UxromVariant::Codemasters | UxromVariant::FireHawk => "Codemasters",
        }
    }

    pub(crate) fn new(
        variant: UxromVariant,
        chr_type: ChrType,
        prg_rom_len: u32,
        chr_len: u32,
    ) -> Self {
        let mut prg_map = PrgBankMap::new(prg_rom_len);
        prg_map.set_bank(0x0000, BankSizeKb::Sixteen, 0);
        prg_map.set_bank_from_end(0x4000, BankSizeKb::Sixteen, 1);

        Self { variant, chr_type, prg_map, chr_map: ChrBankMap::new(chr_len) }
    }

    fn reset(&mut self) {
        self.prg_map.set_bank(0x0000, BankSizeKb::Sixteen, 0);
        self.prg_map.set_bank_from_end(0x4000, BankSizeKb::Sixteen, 1);
    }
}

impl MapperImpl<Uxrom> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        basic_read_cpu_address(&self.cartridge, &self.data.prg_map, address)
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        let bank_select_range = match self.data.variant {
            UxromVariant::Uxrom => 0x8000..=0xFFFF,
            UxromVariant::Codemasters | UxromVariant::FireHawk => 0xC000..=0xFFFF,
        };

        if self.data.variant == UxromVariant::FireHawk && (0x8000..=0x9FFF).contains(&address) {
            let mirroring = if value.bit(4) {
                NametableMirroring::SingleScreenBank1
            } else {
                NametableMirroring::SingleScreenBank0
            };
            self.nametables.set_mirroring(mirroring);
        }

        if bank_select_range.contains(&address) {
            self.data.prg_map.set_bank(0x0000, BankSizeKb::Sixteen, u32::from(value));
        }
    }

    pub(crate) fn reset(&mut self) {
        self.data.reset();
    }
}

impl HasBasicPpuMapping for MapperImpl<Uxrom> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        basic_map_ppu_address(&self.data.chr_map, self.data.chr_type, address)
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Cnrom {
    chr_type: ChrType,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Cnrom {
    pub(crate) fn new(chr_type: ChrType, prg_rom_len: u32, chr_len: u32) -> Self {
        Self {
            chr_type,
            prg_map: PrgBankMap::new(prg_rom_len),
            chr_map: ChrBankMap::new(chr_len),
        }
    }
}

impl MapperImpl<Cnrom> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        basic_read_cpu_address(&self.cartridge, &self.data.prg_map, address)
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        if address >= 0x8000 {
            self.data.chr_map.set_bank(0x0000, BankSizeKb::Eight, u32::from(value));
        }
    }

    pub(crate) fn reset(&mut self) {
        self.data.chr_map.set_bank(0x0000, BankSizeKb::Eight, 0);
    }
}

impl HasBasicPpuMapping for MapperImpl<Cnrom> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        basic_map_ppu_address(&self.data.chr_map, self.data.chr_type, address)
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Axrom {
    chr_type: ChrType,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Axrom {
    pub(crate) fn new(chr_type: ChrType, prg_rom_len: u32, chr_len: u32) -> Self {
        Self {
            chr_type,
            prg_map: PrgBankMap::new(prg_rom_len),
            chr_map: ChrBankMap::new(chr_len),
        }
    }
}

impl MapperImpl<Axrom> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        basic_read_cpu_address(&self.cartridge, &self.data.prg_map, address)
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        if address >= 0x8000 {
            self.data.prg_map.set_bank(0x0000, BankSizeKb::ThirtyTwo, u32::from(value & 0x07));

            let mirroring = if value.bit(4) {
                NametableMirroring::SingleScreenBank1
            } else {
                NametableMirroring::SingleScreenBank0
            };
            self.nametables.set_mirroring(mirroring);
        }
    }

    pub(crate) fn reset(&mut self) {
        self.data.prg_map.set_bank(0x0000, BankSizeKb::ThirtyTwo, 0);
    }
}

impl HasBasicPpuMapping for MapperImpl<Axrom> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        basic_map_ppu_address(&self.data.chr_map, self.data.chr_type, address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum GxromVariant {
    Gxrom,
    ColorDreams,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Gxrom {
    variant: GxromVariant,
    chr_type: ChrType,
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Gxrom {
    pub(crate) fn name(&self) -> &'static str {
        match self.variant {
            GxromVariant::Gxrom => "GxROM",
            GxromVariant::ColorDreams => "Color Dreams",
        }
    }

    pub(crate) fn new(
        variant: GxromVariant,
        chr_type: ChrType,
        prg_rom_len: u32,
        chr_len: u32,
    ) -> Self {
        Self {
            variant,
            chr_type,
            prg_map: PrgBankMap::new(prg_rom_len),
            chr_map: ChrBankMap::new(chr_len),
        }
    }
}

impl MapperImpl<Gxrom> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        basic_read_cpu_address(&self.cartridge, &self.data.prg_map, address)
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        if address < 0x8000 {
            return;
        }

        let (prg_bank, chr_bank) = match self.data.variant {
            GxromVariant::Gxrom => (value >> 4, value & 0x0F),
            GxromVariant::ColorDreams => (value & 0x0F, value >> 4),
        };
        self.data.prg_map.set_bank(0x0000, BankSizeKb::ThirtyTwo, u32::from(prg_bank));
        self.data.chr_map.set_bank(0x0000, BankSizeKb::Eight, u32::from(chr_bank));
    }

    pub(crate) fn reset(&mut self) {
        self.data.prg_map.set_bank(0x0000, BankSizeKb::ThirtyTwo, 0);
        self.data.chr_map.set_bank(0x0000, BankSizeKb::Eight, 0);
    }
}

impl HasBasicPpuMapping for MapperImpl<Gxrom> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        basic_map_ppu_address(&self.data.chr_map, self.data.chr_type, address)
    }
}

/// BNROM: 32KB PRG banking with 8KB of unbanked CHR RAM.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Bnrom {
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Bnrom {
    pub(crate) fn new(prg_rom_len: u32, chr_ram_len: u32) -> Self {
        Self { prg_map: PrgBankMap::new(prg_rom_len), chr_map: ChrBankMap::new(chr_ram_len) }
    }
}

impl MapperImpl<Bnrom> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        basic_read_cpu_address(&self.cartridge, &self.data.prg_map, address)
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        if address >= 0x8000 {
            self.data.prg_map.set_bank(0x0000, BankSizeKb::ThirtyTwo, u32::from(value));
        }
    }

    pub(crate) fn reset(&mut self) {
        self.data.prg_map.set_bank(0x0000, BankSizeKb::ThirtyTwo, 0);
    }
}

impl HasBasicPpuMapping for MapperImpl<Bnrom> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        basic_map_ppu_address(&self.data.chr_map, ChrType::RAM, address)
    }
}

/// NINA-001: registers overlaid on the top of PRG RAM at $7FFD-$7FFF, with two independently
/// banked 4KB CHR ROM windows.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Nina001 {
    prg_map: PrgBankMap,
    chr_map: ChrBankMap,
}

impl Nina001 {
    pub(crate) fn new(prg_rom_len: u32, chr_rom_len: u32) -> Self {
        Self { prg_map: PrgBankMap::new(prg_rom_len), chr_map: ChrBankMap::new(chr_rom_len) }
    }
}

impl MapperImpl<Nina001> {
    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        basic_read_cpu_address(&self.cartridge, &self.data.prg_map, address)
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        if let 0x6000..=0x7FFF = address {
            // The registers sit on top of PRG RAM; the write lands in both
            self.cartridge.set_prg_ram(u32::from(address & 0x1FFF), value);
            match address {
                0x7FFD => {
                    self.data.prg_map.set_bank(
                        0x0000,
                        BankSizeKb::ThirtyTwo,
                        u32::from(value & 0x01),
                    );
                }
                0x7FFE => {
                    self.data.chr_map.set_bank(0x0000, BankSizeKb::Four, u32::from(value & 0x0F));
                }
                0x7FFF => {
                    self.data.chr_map.set_bank(0x1000, BankSizeKb::Four, u32::from(value & 0x0F));
                }
                _ => {}
            }
        }
    }

    pub(crate) fn reset(&mut self) {}
}

impl HasBasicPpuMapping for MapperImpl<Nina001> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        basic_map_ppu_address(&self.data.chr_map, ChrType::ROM, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::mappers::fixtures;

    #[test]
    fn nrom_128_mirrors_prg() {
        let cartridge = fixtures::cartridge(16 * 1024, 8192, 0);
        let mapper =
            fixtures::mapper_impl(cartridge, NametableMirroring::Vertical, Nrom::new(ChrType::ROM, 16 * 1024, 8192));

        assert_eq!(mapper.read_cpu_address(0x8000), mapper.read_cpu_address(0xC000));
        assert_eq!(mapper.read_cpu_address(0xBFFF), mapper.read_cpu_address(0xFFFF));
    }

    #[test]
    fn uxrom_fixed_bank_survives_bank_writes() {
        let prg_len = 128 * 1024;
        let cartridge = fixtures::cartridge(prg_len, 0, 8192);
        let mut mapper = fixtures::mapper_impl(
            cartridge,
            NametableMirroring::Vertical,
            Uxrom::new(UxromVariant::Uxrom, ChrType::RAM, prg_len as u32, 8192),
        );

        let last_bank_byte = mapper.read_cpu_address(0xC000);
        assert_eq!(last_bank_byte, ((prg_len - 0x4000) >> 10) as u8);

        for bank in 0..16_u8 {
            mapper.write_cpu_address(0x8000, bank);
            assert_eq!(mapper.read_cpu_address(0x8000), (u16::from(bank) * 16) as u8);
            assert_eq!(
                mapper.read_cpu_address(0xC000),
                last_bank_byte,
                "fixed bank must not move when the switchable bank changes"
            );
        }
    }

    #[test]
    fn uxrom_rewriting_the_same_bank_changes_nothing() {
        let prg_len = 128 * 1024;
        let cartridge = fixtures::cartridge(prg_len, 0, 8192);
        let mut mapper = fixtures::mapper_impl(
            cartridge,
            NametableMirroring::Vertical,
            Uxrom::new(UxromVariant::Uxrom, ChrType::RAM, prg_len as u32, 8192),
        );
        let window_addresses = [0x8000_u16, 0x9400, 0xC000, 0xFFFF];

        mapper.write_cpu_address(0x8000, 5);
        let first: Vec<u8> =
            window_addresses.iter().map(|&address| mapper.read_cpu_address(address)).collect();

        mapper.write_cpu_address(0x8000, 5);
        let second: Vec<u8> =
            window_addresses.iter().map(|&address| mapper.read_cpu_address(address)).collect();

        assert_eq!(first, second, "repeating a bank register write should not move any window");
    }

    #[test]
    fn cnrom_chr_bank_select_wraps() {
        let cartridge = fixtures::cartridge(32 * 1024, 32 * 1024, 0);
        let mut mapper = fixtures::mapper_impl(
            cartridge,
            NametableMirroring::Horizontal,
            Cnrom::new(ChrType::ROM, 32 * 1024, 32 * 1024),
        );

        mapper.write_cpu_address(0x8000, 2);
        assert_eq!(mapper.read_ppu_address(0x0000), 16);

        // 4 banks of 8KB; bank 6 wraps to bank 2
        mapper.write_cpu_address(0x8000, 6);
        assert_eq!(mapper.read_ppu_address(0x0000), 16);
    }

    #[test]
    fn axrom_single_screen_mirroring() {
        let cartridge = fixtures::cartridge(128 * 1024, 0, 8192);
        let mut mapper = fixtures::mapper_impl(
            cartridge,
            NametableMirroring::SingleScreenBank0,
            Axrom::new(ChrType::RAM, 128 * 1024, 8192),
        );

        mapper.write_ppu_address(0x2000, 0xAA);
        mapper.write_cpu_address(0x8000, 0x10);
        assert_eq!(mapper.read_ppu_address(0x2000), 0x00, "bank 1 should be a different page");

        mapper.write_cpu_address(0x8000, 0x00);
        assert_eq!(mapper.read_ppu_address(0x2000), 0xAA);
    }

    #[test]
    fn nina001_registers_overlay_prg_ram() {
        let cartridge = fixtures::cartridge(64 * 1024, 64 * 1024, 0);
        let mut mapper = fixtures::mapper_impl(
            cartridge,
            NametableMirroring::Vertical,
            Nina001::new(64 * 1024, 64 * 1024),
        );

        mapper.write_cpu_address(0x7FFE, 0x03);
        assert_eq!(mapper.read_ppu_address(0x0000), 12, "CHR window 0 should point at 4KB bank 3");
        assert_eq!(mapper.read_cpu_address(0x7FFE), 0x03, "register write should also land in RAM");

        mapper.write_cpu_address(0x7FFD, 0x01);
        assert_eq!(mapper.read_cpu_address(0x8000), 32);
    }
}

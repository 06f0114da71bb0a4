//! Cartridge contract and the baseline NROM board.
//!
//! A mapper exposes the cartridge's capability surface: the two 16 KB PRG
//! windows, the two 4 KB CHR windows, nametable access with mirroring
//! translation, save RAM, and the expansion register area. Adding
//! hardware support means adding another implementation of this trait;
//! the loader dispatches on the iNES mapper number.

use thiserror::Error;

use crate::rom::{Mirroring, RomError, RomImage};

/// Failure to attach a cartridge. A failed load leaves nothing installed.
#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("invalid ROM image: {0}")]
    Format(#[from] RomError),
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u8),
}

/// Cartridge capability contract.
///
/// CHR reads take `&mut self` to leave room for boards whose pattern
/// fetches trigger internal latches.
pub trait Mapper {
    /// CPU $8000-$BFFF.
    fn prg_read_low(&self, addr: u16) -> u8;
    fn prg_write_low(&mut self, addr: u16, value: u8);

    /// CPU $C000-$FFFF.
    fn prg_read_high(&self, addr: u16) -> u8;
    fn prg_write_high(&mut self, addr: u16, value: u8);

    /// CPU $6000-$7FFF battery-backed save RAM.
    fn save_read(&self, addr: u16) -> u8;
    fn save_write(&mut self, addr: u16, value: u8);

    /// CPU $4018-$5FFF expansion registers. Boards without any float the
    /// address high byte, like an open bus.
    fn register_read(&self, addr: u16) -> u8 {
        (addr >> 8) as u8
    }
    fn register_write(&mut self, _addr: u16, _value: u8) {}

    /// PPU $0000-$0FFF pattern window.
    fn chr_read_low(&mut self, addr: u16) -> u8;
    fn chr_write_low(&mut self, addr: u16, value: u8);

    /// PPU $1000-$1FFF pattern window.
    fn chr_read_high(&mut self, addr: u16) -> u8;
    fn chr_write_high(&mut self, addr: u16, value: u8);

    /// Nametable access with mirroring translation. The console's 2 KB
    /// VRAM is passed in; four-screen boards substitute a private bank.
    fn nt_read(&mut self, vram: &[u8; 2048], addr: u16) -> u8;
    fn nt_write(&mut self, vram: &mut [u8; 2048], addr: u16, value: u8);

    /// Active mirroring mode.
    fn mirroring(&self) -> Mirroring;

    /// Per-round hook for boards with internal counters.
    fn tick(&mut self, _cpu_cycles: u64) {}

    /// Reset-button hook.
    fn reset(&mut self) {}
}

/// Translate a nametable address to an offset in the console's 2 KB VRAM.
///
/// The address space has four 1 KB logical pages (quadrants); the
/// aliasing modes fold them onto the two physical pages. Four-screen does
/// not alias and never reaches this function.
#[must_use]
pub(crate) fn mirror_vram_offset(mode: Mirroring, addr: u16) -> usize {
    let quadrant = (addr >> 10) & 0x03;
    let offset = (addr & 0x03FF) as usize;
    match mode {
        Mirroring::SingleScreenA => offset,
        Mirroring::SingleScreenB => 0x0400 + offset,
        Mirroring::Horizontal => {
            if quadrant < 2 {
                offset
            } else {
                0x0400 + offset
            }
        }
        Mirroring::Vertical => {
            if quadrant == 0 || quadrant == 2 {
                offset
            } else {
                0x0400 + offset
            }
        }
        Mirroring::FourScreen => unreachable!("four-screen boards carry private VRAM"),
    }
}

/// Select a mapper from a raw iNES image.
pub fn load(data: &[u8]) -> Result<Box<dyn Mapper>, CartridgeError> {
    let rom = RomImage::parse(data)?;
    log::info!(
        "cartridge: mapper {}, {}x16K PRG, {}x8K CHR, {:?} mirroring{}",
        rom.mapper_number,
        rom.prg_pages,
        rom.chr_pages,
        rom.mirroring,
        if rom.has_save_ram { ", save RAM" } else { "" },
    );
    match rom.mapper_number {
        0 => Ok(Box::new(Nrom::new(
            rom.prg_rom,
            rom.chr_rom,
            rom.mirroring,
            rom.has_save_ram,
        ))),
        n => Err(CartridgeError::UnsupportedMapper(n)),
    }
}

const PRG_BANK_SIZE: usize = 16 * 1024;
const CHR_SIZE: usize = 8 * 1024;
const SAVE_RAM_SIZE: usize = 8 * 1024;

/// NROM (mapper 0): fixed banks, no switching.
///
/// A single 16 KB PRG bank mirrors into both CPU windows; 32 KB maps
/// flat. CHR is the image's ROM when present, otherwise a writable 8 KB
/// RAM block. Exactly one of the two is active per board.
pub struct Nrom {
    prg_rom: Vec<u8>,
    /// Offset mask into PRG: $3FFF mirrors a single bank, $7FFF maps 32 KB.
    prg_mask: u16,
    chr: Vec<u8>,
    chr_is_ram: bool,
    save_ram: Option<Box<[u8; SAVE_RAM_SIZE]>>,
    mirroring: Mirroring,
    /// Private bank used instead of console VRAM in four-screen mode.
    four_screen_vram: Option<Box<[u8; 4096]>>,
}

impl Nrom {
    #[must_use]
    pub fn new(prg_rom: Vec<u8>, chr_rom: Vec<u8>, mirroring: Mirroring, save_ram: bool) -> Self {
        let prg_mask = if prg_rom.len() > PRG_BANK_SIZE {
            0x7FFF
        } else {
            0x3FFF
        };
        let chr_is_ram = chr_rom.is_empty();
        let chr = if chr_is_ram {
            vec![0u8; CHR_SIZE]
        } else {
            chr_rom
        };
        Self {
            prg_rom,
            prg_mask,
            chr,
            chr_is_ram,
            save_ram: save_ram.then(|| Box::new([0u8; SAVE_RAM_SIZE])),
            mirroring,
            four_screen_vram: (mirroring == Mirroring::FourScreen)
                .then(|| Box::new([0u8; 4096])),
        }
    }

    fn prg_read(&self, addr: u16) -> u8 {
        self.prg_rom[(addr & self.prg_mask) as usize]
    }

    fn chr_read(&self, addr: u16) -> u8 {
        self.chr[(addr & 0x1FFF) as usize]
    }

    fn chr_write(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            self.chr[(addr & 0x1FFF) as usize] = value;
        }
    }
}

impl Mapper for Nrom {
    fn prg_read_low(&self, addr: u16) -> u8 {
        self.prg_read(addr)
    }

    fn prg_write_low(&mut self, _addr: u16, _value: u8) {
        // PRG ROM, no write side
    }

    fn prg_read_high(&self, addr: u16) -> u8 {
        self.prg_read(addr)
    }

    fn prg_write_high(&mut self, _addr: u16, _value: u8) {}

    fn save_read(&self, addr: u16) -> u8 {
        self.save_ram
            .as_ref()
            .map_or(0, |ram| ram[(addr & 0x1FFF) as usize])
    }

    fn save_write(&mut self, addr: u16, value: u8) {
        if let Some(ram) = self.save_ram.as_mut() {
            ram[(addr & 0x1FFF) as usize] = value;
        }
    }

    fn chr_read_low(&mut self, addr: u16) -> u8 {
        self.chr_read(addr)
    }

    fn chr_write_low(&mut self, addr: u16, value: u8) {
        self.chr_write(addr, value);
    }

    fn chr_read_high(&mut self, addr: u16) -> u8 {
        self.chr_read(addr)
    }

    fn chr_write_high(&mut self, addr: u16, value: u8) {
        self.chr_write(addr, value);
    }

    fn nt_read(&mut self, vram: &[u8; 2048], addr: u16) -> u8 {
        match &self.four_screen_vram {
            Some(private) => private[(addr & 0x0FFF) as usize],
            None => vram[mirror_vram_offset(self.mirroring, addr)],
        }
    }

    fn nt_write(&mut self, vram: &mut [u8; 2048], addr: u16, value: u8) {
        match self.four_screen_vram.as_mut() {
            Some(private) => private[(addr & 0x0FFF) as usize] = value,
            None => vram[mirror_vram_offset(self.mirroring, addr)] = value,
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ines(prg_pages: u8, chr_pages: u8, flags6: u8) -> Vec<u8> {
        let prg_size = usize::from(prg_pages) * PRG_BANK_SIZE;
        let chr_size = usize::from(chr_pages) * CHR_SIZE;
        let mut data = vec![0u8; 16 + prg_size + chr_size];
        data[0..4].copy_from_slice(b"NES\x1a");
        data[4] = prg_pages;
        data[5] = chr_pages;
        data[6] = flags6;
        // Recognizable PRG pattern
        for i in 0..prg_size {
            data[16 + i] = (i & 0xFF) as u8;
        }
        data
    }

    #[test]
    fn single_bank_mirrors_into_both_windows() {
        let mut prg = vec![0u8; PRG_BANK_SIZE];
        prg[0x0123] = 0xAB;
        let cart = Nrom::new(prg, vec![0; CHR_SIZE], Mirroring::Horizontal, false);
        assert_eq!(cart.prg_read_low(0x8123), 0xAB);
        assert_eq!(cart.prg_read_high(0xC123), 0xAB);
    }

    #[test]
    fn two_banks_map_flat() {
        let mut prg = vec![0u8; 2 * PRG_BANK_SIZE];
        prg[0x0000] = 0x11;
        prg[PRG_BANK_SIZE] = 0x22;
        let cart = Nrom::new(prg, vec![0; CHR_SIZE], Mirroring::Horizontal, false);
        assert_eq!(cart.prg_read_low(0x8000), 0x11);
        assert_eq!(cart.prg_read_high(0xC000), 0x22);
    }

    #[test]
    fn chr_rom_ignores_writes() {
        let mut chr = vec![0u8; CHR_SIZE];
        chr[0x10] = 0x55;
        let mut cart = Nrom::new(vec![0; PRG_BANK_SIZE], chr, Mirroring::Horizontal, false);
        cart.chr_write_low(0x0010, 0xAA);
        assert_eq!(cart.chr_read_low(0x0010), 0x55);
    }

    #[test]
    fn chr_ram_when_image_has_none() {
        let mut cart = Nrom::new(vec![0; PRG_BANK_SIZE], Vec::new(), Mirroring::Vertical, false);
        cart.chr_write_low(0x0123, 0x42);
        assert_eq!(cart.chr_read_low(0x0123), 0x42);
        cart.chr_write_high(0x1456, 0x24);
        assert_eq!(cart.chr_read_high(0x1456), 0x24);
    }

    #[test]
    fn save_ram_gated_by_header_flag() {
        let mut with = Nrom::new(vec![0; PRG_BANK_SIZE], Vec::new(), Mirroring::Horizontal, true);
        with.save_write(0x6000, 0x99);
        assert_eq!(with.save_read(0x6000), 0x99);

        let mut without =
            Nrom::new(vec![0; PRG_BANK_SIZE], Vec::new(), Mirroring::Horizontal, false);
        without.save_write(0x6000, 0x99);
        assert_eq!(without.save_read(0x6000), 0);
    }

    #[test]
    fn horizontal_mirroring_pairs_top_and_bottom() {
        assert_eq!(mirror_vram_offset(Mirroring::Horizontal, 0x2000), 0x000);
        assert_eq!(mirror_vram_offset(Mirroring::Horizontal, 0x2400), 0x000);
        assert_eq!(mirror_vram_offset(Mirroring::Horizontal, 0x2800), 0x400);
        assert_eq!(mirror_vram_offset(Mirroring::Horizontal, 0x2C00), 0x400);
    }

    #[test]
    fn vertical_mirroring_pairs_left_and_right() {
        assert_eq!(mirror_vram_offset(Mirroring::Vertical, 0x2000), 0x000);
        assert_eq!(mirror_vram_offset(Mirroring::Vertical, 0x2800), 0x000);
        assert_eq!(mirror_vram_offset(Mirroring::Vertical, 0x2400), 0x400);
        assert_eq!(mirror_vram_offset(Mirroring::Vertical, 0x2C00), 0x400);
    }

    #[test]
    fn single_screen_modes_pin_one_page() {
        assert_eq!(mirror_vram_offset(Mirroring::SingleScreenA, 0x2C33), 0x033);
        assert_eq!(mirror_vram_offset(Mirroring::SingleScreenB, 0x2033), 0x433);
    }

    #[test]
    fn four_screen_uses_private_bank() {
        let mut cart = Nrom::new(vec![0; PRG_BANK_SIZE], Vec::new(), Mirroring::FourScreen, false);
        let mut vram = [0u8; 2048];
        cart.nt_write(&mut vram, 0x2C00, 0x77);
        assert_eq!(cart.nt_read(&vram, 0x2C00), 0x77);
        // Console VRAM untouched
        assert!(vram.iter().all(|&b| b == 0));
        // Quadrants stay distinct
        assert_eq!(cart.nt_read(&vram, 0x2000), 0x00);
    }

    #[test]
    fn load_selects_nrom() {
        let cart = load(&make_ines(1, 1, 0x00)).expect("load failed");
        assert_eq!(cart.mirroring(), Mirroring::Horizontal);
        assert_eq!(cart.prg_read_low(0x8001), 0x01);
    }

    #[test]
    fn load_rejects_unsupported_mapper() {
        // Mapper 4 (flags6 high nibble)
        let result = load(&make_ines(1, 1, 0x40));
        assert!(matches!(result, Err(CartridgeError::UnsupportedMapper(4))));
    }

    #[test]
    fn load_rejects_bad_image() {
        assert!(matches!(
            load(b"not a rom"),
            Err(CartridgeError::Format(RomError::BadMagic))
        ));
    }

    #[test]
    fn expansion_area_floats_address_high_byte() {
        let cart = Nrom::new(vec![0; PRG_BANK_SIZE], Vec::new(), Mirroring::Horizontal, false);
        assert_eq!(cart.register_read(0x5A00), 0x5A);
    }
}

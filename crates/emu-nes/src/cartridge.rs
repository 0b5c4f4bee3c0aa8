//! Mapper-0 (NROM) cartridge: fixed PRG/CHR mapping, no bank switching.
//!
//! Grounded in `DaCodeChick-Lumi/crates/emu-nes/src/cartridge.rs`'s
//! `Cartridge::load`/`read_prg`/`read_chr`, trimmed of mapper 66 (GxROM)
//! support, which is out of scope for this core.

use std::path::Path;

use emu_core::error::{EmulatorError, Result};

use crate::ines::{INesHeader, Mirroring, CHR_BANK_SIZE, PRG_BANK_SIZE, TRAINER_SIZE};

pub struct Cartridge {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    pub mirroring: Mirroring,
    mapper: u8,
}

impl Cartridge {
    /// A cartridge-shaped placeholder occupying the socket before a ROM is
    /// inserted. All reads return 0, all writes are ignored.
    pub fn empty() -> Self {
        Self {
            prg_rom: Vec::new(),
            chr: vec![0u8; CHR_BANK_SIZE],
            chr_is_ram: true,
            mirroring: Mirroring::Horizontal,
            mapper: 0,
        }
    }

    pub fn from_ines_bytes(bytes: &[u8]) -> Result<Cartridge> {
        let (header, mut rest) = INesHeader::parse(bytes)?;
        if header.mapper != 0 {
            return Err(EmulatorError::UnsupportedMapper(header.mapper));
        }

        if header.has_trainer {
            rest = &rest[TRAINER_SIZE..];
        }

        let prg_len = header.prg_banks as usize * PRG_BANK_SIZE;
        let prg_rom = rest[..prg_len].to_vec();
        rest = &rest[prg_len..];

        let (chr, chr_is_ram) = if header.chr_banks == 0 {
            (vec![0u8; CHR_BANK_SIZE], true)
        } else {
            let chr_len = header.chr_banks as usize * CHR_BANK_SIZE;
            (rest[..chr_len].to_vec(), false)
        };

        Ok(Cartridge {
            prg_rom,
            chr,
            chr_is_ram,
            mirroring: header.mirroring,
            mapper: header.mapper,
        })
    }

    pub fn load(path: &Path) -> Result<Cartridge> {
        let bytes = std::fs::read(path)?;
        Self::from_ines_bytes(&bytes)
    }

    pub fn mapper(&self) -> u8 {
        self.mapper
    }

    pub fn prg_bank_count(&self) -> usize {
        self.prg_rom.len() / PRG_BANK_SIZE
    }

    pub fn chr_bank_count(&self) -> usize {
        if self.chr_is_ram {
            0
        } else {
            self.chr.len() / CHR_BANK_SIZE
        }
    }

    pub fn cpu_read(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() || addr < 0x8000 {
            return 0;
        }
        let offset = (addr - 0x8000) as usize % self.prg_rom.len();
        self.prg_rom[offset]
    }

    /// Mapper 0 never accepts PRG writes.
    pub fn cpu_write(&mut self, _addr: u16, _value: u8) {}

    pub fn ppu_read(&self, addr: u16) -> u8 {
        let addr = addr as usize % self.chr.len();
        self.chr[addr]
    }

    pub fn ppu_write(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let addr = addr as usize % self.chr.len();
            self.chr[addr] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with(prg_banks: u8, chr_banks: u8, mirroring_bit: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; 16];
        bytes[0..4].copy_from_slice(b"NES\x1A");
        bytes[4] = prg_banks;
        bytes[5] = chr_banks;
        bytes[6] = mirroring_bit;
        bytes.extend(std::iter::repeat(0u8).take(prg_banks as usize * PRG_BANK_SIZE));
        let chr_len = if chr_banks == 0 {
            0
        } else {
            chr_banks as usize * CHR_BANK_SIZE
        };
        bytes.extend(std::iter::repeat(0u8).take(chr_len));
        bytes
    }

    #[test]
    fn single_prg_bank_mirrors_16kb() {
        let mut bytes = rom_with(1, 1, 0);
        let prg_start = 16;
        bytes[prg_start] = 0xAA;
        bytes[prg_start + PRG_BANK_SIZE - 1] = 0xBB;
        let cart = Cartridge::from_ines_bytes(&bytes).unwrap();
        assert_eq!(cart.cpu_read(0x8000), 0xAA);
        assert_eq!(cart.cpu_read(0xBFFF), 0xBB);
        assert_eq!(cart.cpu_read(0xC000), 0xAA); // mirror of the single bank
        assert_eq!(cart.cpu_read(0xFFFF), 0xBB);
    }

    #[test]
    fn two_prg_banks_are_linear_32kb() {
        let mut bytes = rom_with(2, 1, 0);
        let prg_start = 16;
        bytes[prg_start] = 0x11;
        bytes[prg_start + PRG_BANK_SIZE] = 0x22;
        let cart = Cartridge::from_ines_bytes(&bytes).unwrap();
        assert_eq!(cart.cpu_read(0x8000), 0x11);
        assert_eq!(cart.cpu_read(0xC000), 0x22);
    }

    #[test]
    fn cpu_writes_to_prg_rom_are_ignored() {
        let bytes = rom_with(1, 1, 0);
        let mut cart = Cartridge::from_ines_bytes(&bytes).unwrap();
        let before = cart.cpu_read(0x8000);
        cart.cpu_write(0x8000, 0xFF);
        assert_eq!(cart.cpu_read(0x8000), before);
    }

    #[test]
    fn chr_ram_is_writable_when_no_chr_banks() {
        let bytes = rom_with(1, 0, 0);
        let mut cart = Cartridge::from_ines_bytes(&bytes).unwrap();
        cart.ppu_write(0x0010, 0x42);
        assert_eq!(cart.ppu_read(0x0010), 0x42);
    }

    #[test]
    fn chr_rom_writes_are_ignored() {
        let bytes = rom_with(1, 1, 0);
        let mut cart = Cartridge::from_ines_bytes(&bytes).unwrap();
        let before = cart.ppu_read(0x0010);
        cart.ppu_write(0x0010, 0xFF);
        assert_eq!(cart.ppu_read(0x0010), before);
    }

    #[test]
    fn unsupported_mapper_is_rejected() {
        let mut bytes = rom_with(1, 1, 0x20); // mapper low nibble 2
        bytes[7] = 0x40; // mapper high nibble 4 -> mapper 66
        assert!(matches!(
            Cartridge::from_ines_bytes(&bytes),
            Err(EmulatorError::UnsupportedMapper(66))
        ));
    }
}

//! MBC2: not present in the teacher or in `original_source`; new, grounded on the
//! `Mbc` trait shape shared with `mbc1.rs`/`mbc3.rs` (see DESIGN.md).
//!
//! MBC2 has no external RAM chip; it carries 512x4-bit RAM built into the mapper
//! itself, addressed by the low 9 bits of the address and always read back with the
//! upper nibble set.

use alloc::vec;
use alloc::vec::Vec;

use super::{Mbc, ROM_BANK_SIZE};

const BUILTIN_RAM_SIZE: usize = 0x200;

pub struct Mbc2 {
    rom: Vec<u8>,
    ram: [u8; BUILTIN_RAM_SIZE],
    rom_bank_count: usize,
    rom_bank: u8,
    ram_enabled: bool,
}

impl Mbc2 {
    pub fn new(rom: Vec<u8>) -> Self {
        let rom_bank_count = rom.len() / ROM_BANK_SIZE;
        Mbc2 {
            rom,
            ram: [0; BUILTIN_RAM_SIZE],
            rom_bank_count,
            rom_bank: 1,
            ram_enabled: false,
        }
    }

    fn effective_rom_bank(&self) -> usize {
        let low = self.rom_bank & 0x0F;
        let low = if low == 0 { 1 } else { low };
        usize::from(low) % self.rom_bank_count.max(1)
    }
}

impl Mbc for Mbc2 {
    fn load_saved_ram(&mut self, ram: &[u8]) {
        let len = self.ram.len().min(ram.len());
        self.ram[..len].copy_from_slice(&ram[..len]);
    }

    fn ram_to_save(&self) -> &[u8] {
        &self.ram
    }

    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => self.rom.get(usize::from(address)).copied().unwrap_or(0xFF),
            0x4000..=0x7FFF => {
                let offset = self.effective_rom_bank() * ROM_BANK_SIZE;
                self.rom
                    .get(offset + usize::from(address - 0x4000))
                    .copied()
                    .unwrap_or(0xFF)
            }
            0xA000..=0xBFFF => {
                if !self.ram_enabled {
                    0xFF
                } else {
                    self.ram[usize::from(address) & 0x1FF] | 0xF0
                }
            }
            _ => 0xFF,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            // bit 8 of the address distinguishes a RAM-enable write (0) from a
            // ROM-bank-select write (1); both land in 0x0000..0x4000.
            0x0000..=0x3FFF => {
                if address & 0x100 == 0 {
                    self.ram_enabled = value & 0x0F == 0x0A;
                } else {
                    self.rom_bank = value & 0x0F;
                }
            }
            0xA000..=0xBFFF => {
                if self.ram_enabled {
                    self.ram[usize::from(address) & 0x1FF] = value & 0x0F;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_read_back_masks_upper_nibble() {
        let mut mbc = Mbc2::new(vec![0u8; ROM_BANK_SIZE * 4]);
        mbc.write(0x0000, 0x0A);
        mbc.write(0xA000, 0x07);
        assert_eq!(mbc.read(0xA000), 0xF7);
    }

    #[test]
    fn bank_zero_remaps_to_one() {
        let mut rom = vec![0u8; ROM_BANK_SIZE * 4];
        rom[ROM_BANK_SIZE] = 0xAB;
        let mut mbc = Mbc2::new(rom);
        mbc.write(0x2100, 0x00);
        assert_eq!(mbc.read(0x4000), 0xAB);
    }
}

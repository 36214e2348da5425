//! Cartridge bank switching. Grounded on `gebeh-core/src/mbc/mod.rs`'s `Mbc` trait
//! shape; extended with MBC2 and an MBC3 real-time clock, neither of which appear
//! anywhere in the retrieved teacher or `original_source` (see DESIGN.md).

pub mod mbc1;
pub mod mbc2;
pub mod mbc3;
pub mod mbc5;
pub mod rtc;

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;

/// A cartridge's bank-switching behavior, plus whatever on-board RAM/RTC it owns.
pub trait Mbc {
    fn load_saved_ram(&mut self, _ram: &[u8]) {}

    /// Bytes to persist as the battery-backed save (empty if the cartridge has none).
    fn ram_to_save(&self) -> &[u8] {
        &[]
    }

    fn read(&self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8);

    /// Called once per emulated second by the host driving an RTC-equipped cartridge.
    fn tick_rtc_second(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartridgeType {
    RomOnly,
    Mbc1,
    Mbc1Ram,
    Mbc1RamBattery,
    Mbc2,
    Mbc2Battery,
    Mbc3TimerBattery,
    Mbc3TimerRamBattery,
    Mbc3,
    Mbc3Ram,
    Mbc3RamBattery,
    Mbc5,
    Mbc5Ram,
    Mbc5RamBattery,
}

impl CartridgeType {
    pub fn has_battery(self) -> bool {
        matches!(
            self,
            CartridgeType::Mbc1RamBattery
                | CartridgeType::Mbc2Battery
                | CartridgeType::Mbc3TimerBattery
                | CartridgeType::Mbc3TimerRamBattery
                | CartridgeType::Mbc3RamBattery
                | CartridgeType::Mbc5RamBattery
        )
    }

    pub fn has_rtc(self) -> bool {
        matches!(
            self,
            CartridgeType::Mbc3TimerBattery | CartridgeType::Mbc3TimerRamBattery
        )
    }
}

impl TryFrom<u8> for CartridgeType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            0x00 => CartridgeType::RomOnly,
            0x01 => CartridgeType::Mbc1,
            0x02 => CartridgeType::Mbc1Ram,
            0x03 => CartridgeType::Mbc1RamBattery,
            0x05 => CartridgeType::Mbc2,
            0x06 => CartridgeType::Mbc2Battery,
            0x0F => CartridgeType::Mbc3TimerBattery,
            0x10 => CartridgeType::Mbc3TimerRamBattery,
            0x11 => CartridgeType::Mbc3,
            0x12 => CartridgeType::Mbc3Ram,
            0x13 => CartridgeType::Mbc3RamBattery,
            0x19 => CartridgeType::Mbc5,
            0x1A => CartridgeType::Mbc5Ram,
            0x1B => CartridgeType::Mbc5RamBattery,
            other => return Err(other),
        })
    }
}

/// header byte 0x0148: `32 KiB << code` total ROM bytes.
pub fn rom_size_bytes(code: u8) -> usize {
    0x8000usize << code
}

/// header byte 0x0149.
pub fn ram_size_bytes(code: u8) -> usize {
    match code {
        0 => 0,
        1 => 0x800,
        2 => 0x2000,
        3 => 0x8000,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_header_bytes() {
        assert_eq!(CartridgeType::try_from(0x01), Ok(CartridgeType::Mbc1));
        assert_eq!(CartridgeType::try_from(0x13), Ok(CartridgeType::Mbc3RamBattery));
        assert!(CartridgeType::try_from(0xFF).is_err());
    }

    #[test]
    fn rom_size_doubles_per_code() {
        assert_eq!(rom_size_bytes(0), 0x8000);
        assert_eq!(rom_size_bytes(4), 0x8000 << 4);
    }
}

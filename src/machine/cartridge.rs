use crate::error::Error;

/// Size of one switchable ROM bank.
pub const BANK_SIZE: usize = 0x4000;

const KIND_OFFSET: usize = 0x0147;
const SIZE_OFFSET: usize = 0x0148;

/// Mapper declared by the cartridge header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartridgeKind {
    /// 32 KiB, no mapper; the whole image is addressable as banks 0 and 1.
    RomOnly,
    /// Simple bank switching: writes into the ROM range select which
    /// 16 KiB slice appears at 0x4000-0x7FFF.
    Banked,
}

/// A loaded cartridge image.
///
/// ROM bytes are immutable after load; the active bank index is the only
/// mutable state. Bank 0 is always the fixed region at 0x0000-0x3FFF.
#[derive(Clone, Debug)]
pub struct Cartridge {
    rom: Vec<u8>,
    kind: CartridgeKind,
    bank_count: u8,
    bank: u8,
}

impl Cartridge {
    /// Parse the header and take ownership of the image. Fails before any
    /// instruction runs if the declared type or size is outside the
    /// supported set.
    pub fn from_bytes(rom: Vec<u8>) -> Result<Self, Error> {
        let kind_code = rom.get(KIND_OFFSET).copied().unwrap_or(0);
        let size_code = rom.get(SIZE_OFFSET).copied().unwrap_or(0);

        let kind = match kind_code {
            0x00 => CartridgeKind::RomOnly,
            0x01 => CartridgeKind::Banked,
            _ => {
                return Err(Error::UnsupportedCartridge {
                    kind: kind_code,
                    size: size_code,
                })
            }
        };
        let bank_count = match size_code {
            0x00 => 2,
            0x01 => 4,
            _ => {
                return Err(Error::UnsupportedCartridge {
                    kind: kind_code,
                    size: size_code,
                })
            }
        };

        log::info!(
            "loaded cartridge: {} bytes, {:?}, {} banks",
            rom.len(),
            kind,
            bank_count
        );

        Ok(Self {
            rom,
            kind,
            bank_count,
            bank: 1,
        })
    }

    pub fn kind(&self) -> CartridgeKind {
        self.kind
    }

    /// Currently selected switchable bank.
    pub fn bank(&self) -> u8 {
        self.bank
    }

    /// Read from the fixed bank region (0x0000-0x3FFF).
    pub fn read_fixed(&self, addr: u16) -> u8 {
        self.rom.get(addr as usize).copied().unwrap_or(0xFF)
    }

    /// Read from the switchable bank region (0x4000-0x7FFF) through the
    /// active bank.
    pub fn read_banked(&self, addr: u16) -> u8 {
        let offset = self.bank as usize * BANK_SIZE + (addr as usize - BANK_SIZE);
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    /// Apply a bank-select write. Bank 0 maps to 1 and the index wraps to
    /// the bank count, as the simplest mapper does on hardware.
    pub fn select_bank(&mut self, value: u8) -> Result<(), Error> {
        if self.kind == CartridgeKind::RomOnly {
            return Err(Error::BankChangeRejected { bank: value });
        }
        let mut bank = value & 0x1F;
        if bank == 0 {
            bank = 1;
        }
        bank %= self.bank_count;
        log::debug!("bank select {value:#04X} -> bank {bank}");
        self.bank = bank;
        Ok(())
    }
}

//! Cartridge load errors.

use format_crt::CrtError;
use thiserror::Error;

/// A cartridge that fails validation is rejected whole — there is no
/// partial load.
#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error(transparent)]
    Crt(#[from] CrtError),

    #[error("unsupported cartridge hardware type {hardware_type}")]
    UnsupportedHardware { hardware_type: u16 },

    #[error("cartridge '{name}': chip for bank {bank} is {size:#x} bytes, expected {expected:#x}")]
    BadChipSize {
        name: String,
        bank: u16,
        size: usize,
        expected: usize,
    },

    #[error("cartridge '{name}': chip type at bank {bank} must be ROM")]
    BadChipType { name: String, bank: u16 },

    #[error("cartridge '{name}': chip load address {load_address:#06x} not supported")]
    BadLoadAddress { name: String, load_address: u16 },

    #[error("cartridge '{name}': bank {bank} out of range (limit {limit})")]
    BadBank { name: String, bank: u16, limit: usize },

    #[error("cartridge '{name}': bank {bank} missing or duplicated")]
    BankLayout { name: String, bank: usize },

    #[error("cartridge '{name}': total ROM size {size:#x} not supported")]
    BadTotalSize { name: String, size: usize },

    #[error("cartridge '{name}': GAME/EXROM header levels game={game} exrom={exrom} invalid for this hardware")]
    BadLines { name: String, game: bool, exrom: bool },
}

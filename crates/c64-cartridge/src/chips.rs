//! CHIP-list validation shared by the engines.

use emu_core::{Rom, Shared, shared};
use format_crt::{ChipType, Crt};

use crate::error::CartridgeError;

/// Collect the ROM chips at `load_address` into a dense, bank-indexed
/// vector of shared devices.
///
/// Enforces one chip size, ROM chip type, a bank ceiling, and a gap-free
/// bank layout. Engines layer their own total-size rules on top.
pub(crate) fn rom_banks(
    crt: &Crt,
    load_address: u16,
    chip_size: usize,
    bank_limit: usize,
) -> Result<Vec<Shared<Rom>>, CartridgeError> {
    let mut slots: Vec<Option<Shared<Rom>>> = Vec::new();

    for chip in crt.chips.iter().filter(|c| c.load_address == load_address) {
        if chip.chip_type != ChipType::Rom {
            return Err(CartridgeError::BadChipType {
                name: crt.name.clone(),
                bank: chip.bank,
            });
        }
        if chip.data.len() != chip_size {
            return Err(CartridgeError::BadChipSize {
                name: crt.name.clone(),
                bank: chip.bank,
                size: chip.data.len(),
                expected: chip_size,
            });
        }
        let bank = chip.bank as usize;
        if bank >= bank_limit {
            return Err(CartridgeError::BadBank {
                name: crt.name.clone(),
                bank: chip.bank,
                limit: bank_limit,
            });
        }
        if slots.len() <= bank {
            slots.resize(bank + 1, None);
        }
        if slots[bank].is_some() {
            return Err(CartridgeError::BankLayout {
                name: crt.name.clone(),
                bank,
            });
        }
        let label = format!("{}-{load_address:04x}-{bank}", crt.name);
        slots[bank] = Some(shared(Rom::new(&label, chip.data.clone())));
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(bank, slot)| {
            slot.ok_or(CartridgeError::BankLayout {
                name: crt.name.clone(),
                bank,
            })
        })
        .collect()
}

/// Reject any chip outside the given load addresses.
pub(crate) fn check_load_addresses(
    crt: &Crt,
    allowed: &[u16],
) -> Result<(), CartridgeError> {
    for chip in &crt.chips {
        if !allowed.contains(&chip.load_address) {
            return Err(CartridgeError::BadLoadAddress {
                name: crt.name.clone(),
                load_address: chip.load_address,
            });
        }
    }
    Ok(())
}

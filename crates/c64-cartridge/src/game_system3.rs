//! C64 Game System / System 3 cartridges.
//!
//! Up to 64 × 8K ROML banks. The bank number rides in the *address*: a
//! write anywhere in $DE00–$DE3F selects the bank encoded by the low
//! address bits, the data byte is ignored. Any CPU read in the I/O-1 page
//! turns the cartridge off; a bank write turns it back on.

use emu_core::{ReadMode, Rom, Shared};
use format_crt::Crt;

use crate::chips::{check_load_addresses, rom_banks};
use crate::error::CartridgeError;
use crate::{Change, GameExromMode, WindowDev, window_dev};

/// Allowed bank counts (32K up to 512K boards).
const BANK_COUNTS: [usize; 5] = [4, 8, 16, 32, 64];

pub struct GameSystem3 {
    roml: Vec<Shared<Rom>>,
    bank: usize,
    invisible: bool,
}

impl GameSystem3 {
    pub(crate) fn from_crt(crt: &Crt) -> Result<Self, CartridgeError> {
        check_load_addresses(crt, &[0x8000])?;
        let roml = rom_banks(crt, 0x8000, 0x2000, 64)?;
        if !BANK_COUNTS.contains(&roml.len()) {
            return Err(CartridgeError::BadTotalSize {
                name: crt.name.clone(),
                size: roml.len() * 0x2000,
            });
        }

        if GameExromMode::from_lines(crt.game, crt.exrom) != GameExromMode::Mode8k {
            return Err(CartridgeError::BadLines {
                name: crt.name.clone(),
                game: crt.game,
                exrom: crt.exrom,
            });
        }

        Ok(Self {
            roml,
            bank: 0,
            invisible: false,
        })
    }

    pub(crate) fn reset(&mut self) {
        self.bank = 0;
        self.invisible = false;
    }

    pub(crate) fn read(&mut self, offset: usize, mode: ReadMode) -> (u8, Option<Change>) {
        // Any CPU read in I/O-1 disables the cartridge. Peeks don't.
        if offset < 0x100 && mode == ReadMode::Bus && !self.invisible {
            self.invisible = true;
            return (0xFF, Some(Change::mode(GameExromMode::Invisible)));
        }
        (0xFF, None)
    }

    pub(crate) fn write(&mut self, offset: usize, _value: u8) -> Option<Change> {
        if offset >= 0x40 {
            return None;
        }
        let bank = offset & (self.roml.len() - 1);
        let was_invisible = self.invisible;
        let changed = bank != self.bank;
        self.bank = bank;
        self.invisible = false;

        if was_invisible {
            Some(Change::mode(GameExromMode::Mode8k))
        } else {
            changed.then(|| Change::bank(GameExromMode::Mode8k))
        }
    }

    pub(crate) fn windows(&self) -> (Option<WindowDev>, Option<WindowDev>) {
        (Some(window_dev(&self.roml[self.bank])), None)
    }
}

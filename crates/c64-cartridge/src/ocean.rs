//! Ocean type 1 cartridges (Terminator 2, Robocop 3, ...).
//!
//! Up to 64 × 8K ROM banks, all windowed through ROML. Writing the low six
//! bits of a byte to $DE00 selects the bank; reading $DE00 returns the
//! latched value with bit 7 set. Valid total sizes are 32K, 128K, 256K and
//! 512K. The 256K boards are special: banks 0–15 appear in the ROML
//! window and banks 16–31 in the ROMH window.

use emu_core::{ReadMode, Rom, Shared};
use format_crt::Crt;

use crate::chips::{check_load_addresses, rom_banks};
use crate::error::CartridgeError;
use crate::{Change, GameExromMode, WindowDev, window_dev};

/// Allowed total sizes, expressed in 8K banks.
const BANK_COUNTS: [usize; 4] = [4, 16, 32, 64];

#[derive(Debug)]
pub struct Ocean {
    roml: Vec<Shared<Rom>>,
    /// Populated only for 256K images.
    romh: Vec<Shared<Rom>>,
    /// 6-bit register latch; reads return `reg | 0x80`.
    reg: u8,
    lo_bank: usize,
    hi_bank: usize,
    mode: GameExromMode,
}

impl Ocean {
    pub(crate) fn from_crt(crt: &Crt) -> Result<Self, CartridgeError> {
        check_load_addresses(crt, &[0x8000])?;
        let banks = rom_banks(crt, 0x8000, 0x2000, 64)?;
        if !BANK_COUNTS.contains(&banks.len()) {
            return Err(CartridgeError::BadTotalSize {
                name: crt.name.clone(),
                size: banks.len() * 0x2000,
            });
        }

        let mode = GameExromMode::from_lines(crt.game, crt.exrom);
        if !matches!(mode, GameExromMode::Mode8k | GameExromMode::Mode16k) {
            return Err(CartridgeError::BadLines {
                name: crt.name.clone(),
                game: crt.game,
                exrom: crt.exrom,
            });
        }

        let (roml, romh) = if banks.len() == 32 {
            // 256K: the upper sixteen banks sit behind the ROMH window.
            let romh = banks[16..].to_vec();
            (banks[..16].to_vec(), romh)
        } else {
            (banks, Vec::new())
        };

        Ok(Self {
            roml,
            romh,
            reg: 0,
            lo_bank: 0,
            hi_bank: 0,
            mode,
        })
    }

    pub(crate) fn initial_mode(&self) -> GameExromMode {
        self.mode
    }

    pub(crate) fn reset(&mut self) {
        self.reg = 0;
        self.lo_bank = 0;
        self.hi_bank = 0;
    }

    pub(crate) fn read(&mut self, offset: usize, _mode: ReadMode) -> (u8, Option<Change>) {
        match offset {
            0x00 => (self.reg | 0x80, None),
            _ => (0xFF, None),
        }
    }

    pub(crate) fn write(&mut self, offset: usize, value: u8) -> Option<Change> {
        if offset != 0x00 {
            return None;
        }
        self.reg = value & 0x3F;
        let bank = self.reg as usize;

        let changed = if !self.romh.is_empty() && bank >= 16 {
            let hi = (bank - 16) & (self.romh.len() - 1);
            let changed = hi != self.hi_bank;
            self.hi_bank = hi;
            changed
        } else {
            let lo = bank & (self.roml.len() - 1);
            let changed = lo != self.lo_bank;
            self.lo_bank = lo;
            changed
        };
        changed.then(|| Change::bank(self.mode))
    }

    pub(crate) fn windows(&self) -> (Option<WindowDev>, Option<WindowDev>) {
        (
            Some(window_dev(&self.roml[self.lo_bank])),
            self.romh.get(self.hi_bank).map(window_dev),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use format_crt::{build_chip, build_header, hw};

    fn ocean_crt(banks: u16) -> Crt {
        let mut data = build_header("Ocean Test", hw::OCEAN_TYPE_1, 0, 0);
        for bank in 0..banks {
            data.extend(build_chip(bank, 0x8000, &vec![bank as u8; 0x2000]));
        }
        Crt::parse(&data).expect("valid CRT")
    }

    #[test]
    fn register_round_trip_sets_bit_7() {
        let mut ocean = Ocean::from_crt(&ocean_crt(64)).expect("valid");
        for n in 0..64u8 {
            ocean.write(0x00, n);
            let (value, _) = ocean.read(0x00, ReadMode::Bus);
            assert_eq!(value, n | 0x80);
        }
    }

    #[test]
    fn bank_values_mask_to_six_bits() {
        let mut ocean = Ocean::from_crt(&ocean_crt(64)).expect("valid");
        ocean.write(0x00, 0xC5); // 0b1100_0101 → bank 5
        let (value, _) = ocean.read(0x00, ReadMode::Bus);
        assert_eq!(value, 0x85);
        assert_eq!(ocean.lo_bank, 5);
    }

    #[test]
    fn rejects_odd_total_sizes() {
        let err = Ocean::from_crt(&ocean_crt(5)).expect_err("5 banks is not a valid size");
        assert!(matches!(err, CartridgeError::BadTotalSize { .. }));
    }

    #[test]
    fn splits_256k_images_across_both_windows() {
        let mut ocean = Ocean::from_crt(&ocean_crt(32)).expect("valid");
        ocean.write(0x00, 3);
        assert_eq!(ocean.lo_bank, 3);
        ocean.write(0x00, 20); // bank 20 → ROMH bank 4
        assert_eq!(ocean.hi_bank, 4);
        assert_eq!(ocean.lo_bank, 3, "ROML bank untouched by a ROMH select");

        let (roml, romh) = ocean.windows();
        let roml = roml.expect("roml window");
        let romh = romh.expect("romh window");
        assert_eq!(roml.device.borrow_mut().read(0, ReadMode::Peek), 3);
        assert_eq!(romh.device.borrow_mut().read(0, ReadMode::Peek), 20);
    }

    #[test]
    fn bank_switch_reports_force_propagation() {
        let mut ocean = Ocean::from_crt(&ocean_crt(4)).expect("valid");
        let change = ocean.write(0x00, 2).expect("bank changed");
        assert!(change.is_forced());
        assert!(ocean.write(0x00, 2).is_none(), "same bank, no propagation");
    }
}

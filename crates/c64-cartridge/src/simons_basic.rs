//! Simons' Basic cartridge.
//!
//! A single 16K image (8K ROML + 8K ROMH) with inverted control logic:
//! *reading* $DE00 drops to 8K mode, hiding the ROMH half, and *writing*
//! $DE00 brings 16K mode back. The read-triggered switch only happens on
//! real CPU cycles — a monitor peek leaves the mode alone.

use emu_core::{ReadMode, Rom, Shared};
use format_crt::Crt;

use crate::chips::{check_load_addresses, rom_banks};
use crate::error::CartridgeError;
use crate::{Change, GameExromMode, WindowDev, window_dev};

pub struct SimonsBasic {
    roml: Shared<Rom>,
    romh: Shared<Rom>,
}

impl SimonsBasic {
    pub(crate) fn from_crt(crt: &Crt) -> Result<Self, CartridgeError> {
        check_load_addresses(crt, &[0x8000, 0xA000])?;
        let mut roml = rom_banks(crt, 0x8000, 0x2000, 1)?;
        let mut romh = rom_banks(crt, 0xA000, 0x2000, 1)?;
        let (Some(roml), Some(romh)) = (roml.pop(), romh.pop()) else {
            return Err(CartridgeError::BadTotalSize {
                name: crt.name.clone(),
                size: crt.size(),
            });
        };

        let lines = GameExromMode::from_lines(crt.game, crt.exrom);
        if !matches!(lines, GameExromMode::Mode8k | GameExromMode::Mode16k) {
            return Err(CartridgeError::BadLines {
                name: crt.name.clone(),
                game: crt.game,
                exrom: crt.exrom,
            });
        }

        Ok(Self { roml, romh })
    }

    pub(crate) fn reset(&mut self) {}

    pub(crate) fn read(&mut self, offset: usize, mode: ReadMode) -> (u8, Option<Change>) {
        if offset == 0x00 && mode == ReadMode::Bus {
            (0xFF, Some(Change::mode(GameExromMode::Mode8k)))
        } else {
            (0xFF, None)
        }
    }

    pub(crate) fn write(&mut self, offset: usize, _value: u8) -> Option<Change> {
        (offset == 0x00).then(|| Change::mode(GameExromMode::Mode16k))
    }

    pub(crate) fn windows(&self) -> (Option<WindowDev>, Option<WindowDev>) {
        (Some(window_dev(&self.roml)), Some(window_dev(&self.romh)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use format_crt::{build_chip, build_header, hw};

    fn simons_crt() -> Crt {
        let mut data = build_header("Simons' Basic", hw::SIMONS_BASIC, 0, 0);
        data.extend(build_chip(0, 0x8000, &vec![0x11; 0x2000]));
        data.extend(build_chip(0, 0xA000, &vec![0x22; 0x2000]));
        Crt::parse(&data).expect("valid CRT")
    }

    #[test]
    fn bus_read_drops_to_8k() {
        let mut cart = SimonsBasic::from_crt(&simons_crt()).expect("valid");
        let (_, change) = cart.read(0x00, ReadMode::Bus);
        let change = change.expect("mode change");
        assert_eq!(change.mode, GameExromMode::Mode8k);
    }

    #[test]
    fn peek_leaves_the_mode_alone() {
        let mut cart = SimonsBasic::from_crt(&simons_crt()).expect("valid");
        let (_, change) = cart.read(0x00, ReadMode::Peek);
        assert!(change.is_none(), "inspection reads must not switch banks");
    }

    #[test]
    fn write_restores_16k() {
        let mut cart = SimonsBasic::from_crt(&simons_crt()).expect("valid");
        let change = cart.write(0x00, 0x00).expect("mode change");
        assert_eq!(change.mode, GameExromMode::Mode16k);
    }

    #[test]
    fn rejects_missing_romh_chip() {
        let mut data = build_header("Half", hw::SIMONS_BASIC, 0, 0);
        data.extend(build_chip(0, 0x8000, &vec![0x11; 0x2000]));
        let crt = Crt::parse(&data).expect("valid CRT");
        assert!(SimonsBasic::from_crt(&crt).is_err());
    }
}

//! Zaxxon / Super Zaxxon cartridges.
//!
//! The strangest switcher of the set: there is no register at all. The
//! board watches which half of the ROML window the CPU *fetches* from — a
//! read in $8000–$8FFF selects ROMH bank 0, a read in $9000–$9FFF selects
//! ROMH bank 1. The ROML chip itself is 4K, mirrored across the 8K window
//! (its A12 line isn't wired to the ROM).
//!
//! Implemented with a read observer on the ROML device: the observer sees
//! every CPU read offset, flips the bank cell, and pushes the remap
//! through the shared mode-observer slot. Peeks bypass the observer, so a
//! monitor can inspect the window without switching banks.

use std::cell::Cell;
use std::rc::Rc;

use emu_core::{Device, ReadMode, Rom, Shared, shared};
use format_crt::{ChipType, Crt};

use crate::chips::{check_load_addresses, rom_banks};
use crate::error::CartridgeError;
use crate::{Change, GameExromMode, ObserverSlot, Propagation, WindowDev, notify, window_dev};

pub struct Zaxxon {
    roml: Shared<Rom>,
    romh: Vec<Shared<Rom>>,
    bank: Rc<Cell<usize>>,
}

impl Zaxxon {
    pub(crate) fn from_crt(crt: &Crt, observer: ObserverSlot) -> Result<Self, CartridgeError> {
        check_load_addresses(crt, &[0x8000, 0xA000])?;

        // One 4K chip at $8000.
        let mut roml_chips = crt.chips.iter().filter(|c| c.load_address == 0x8000);
        let (Some(chip), None) = (roml_chips.next(), roml_chips.next()) else {
            return Err(CartridgeError::BadTotalSize {
                name: crt.name.clone(),
                size: crt.size(),
            });
        };
        if chip.chip_type != ChipType::Rom {
            return Err(CartridgeError::BadChipType {
                name: crt.name.clone(),
                bank: chip.bank,
            });
        }
        if chip.data.len() != 0x1000 {
            return Err(CartridgeError::BadChipSize {
                name: crt.name.clone(),
                bank: chip.bank,
                size: chip.data.len(),
                expected: 0x1000,
            });
        }

        // Two 8K ROMH banks at $A000.
        let romh = rom_banks(crt, 0xA000, 0x2000, 2)?;
        if romh.len() != 2 {
            return Err(CartridgeError::BadTotalSize {
                name: crt.name.clone(),
                size: crt.size(),
            });
        }

        if GameExromMode::from_lines(crt.game, crt.exrom) != GameExromMode::Mode16k {
            return Err(CartridgeError::BadLines {
                name: crt.name.clone(),
                game: crt.game,
                exrom: crt.exrom,
            });
        }

        // Mirror the 4K payload across the 8K window so the observer can
        // tell the two halves apart by device offset.
        let mut mirrored = chip.data.clone();
        mirrored.extend_from_slice(&chip.data);
        let roml = shared(Rom::new(&format!("{}-roml", crt.name), mirrored));

        let bank = Rc::new(Cell::new(0usize));
        let observer_bank = Rc::clone(&bank);
        let observer_romh = romh.clone();
        // Non-owning back-reference: the closure lives inside the ROM it
        // describes, so an owning handle would cycle.
        let weak_roml = Rc::downgrade(&roml);
        roml.borrow_mut().set_read_observer(Box::new(move |offset| {
            let new_bank = usize::from(offset & 0x1000 != 0);
            if observer_bank.get() == new_bank {
                return;
            }
            observer_bank.set(new_bank);
            let prop = Propagation {
                mode: GameExromMode::Mode16k,
                force: true,
                roml: weak_roml
                    .upgrade()
                    .map(|d| WindowDev::new(d as Shared<dyn Device>, 0)),
                romh: Some(window_dev(&observer_romh[new_bank])),
            };
            notify(&observer, &prop);
        }));

        Ok(Self { roml, romh, bank })
    }

    pub(crate) fn reset(&mut self) {
        self.bank.set(0);
    }

    pub(crate) fn read(&mut self, _offset: usize, _mode: ReadMode) -> (u8, Option<Change>) {
        (0xFF, None)
    }

    pub(crate) fn write(&mut self, _offset: usize, _value: u8) -> Option<Change> {
        None
    }

    pub(crate) fn windows(&self) -> (Option<WindowDev>, Option<WindowDev>) {
        (
            Some(window_dev(&self.roml)),
            Some(window_dev(&self.romh[self.bank.get()])),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use format_crt::{build_chip, build_header, hw};

    fn zaxxon_crt() -> Crt {
        let mut data = build_header("Zaxxon", hw::ZAXXON, 0, 0);
        data.extend(build_chip(0, 0x8000, &vec![0x4B; 0x1000]));
        data.extend(build_chip(0, 0xA000, &vec![0xB0; 0x2000]));
        data.extend(build_chip(1, 0xA000, &vec![0xB1; 0x2000]));
        Crt::parse(&data).expect("valid CRT")
    }

    fn make_zaxxon() -> (Zaxxon, ObserverSlot) {
        let slot: ObserverSlot = Rc::new(RefCell::new(None));
        let cart = Zaxxon::from_crt(&zaxxon_crt(), Rc::clone(&slot)).expect("valid");
        (cart, slot)
    }

    #[test]
    fn roml_is_mirrored_across_the_window() {
        let (cart, _slot) = make_zaxxon();
        let mut rom = cart.roml.borrow_mut();
        assert_eq!(rom.size(), 0x2000);
        assert_eq!(rom.read(0x0123, ReadMode::Peek), 0x4B);
        assert_eq!(rom.read(0x1123, ReadMode::Peek), 0x4B);
    }

    #[test]
    fn fetch_address_selects_the_romh_bank() {
        let (cart, _slot) = make_zaxxon();
        cart.roml.borrow_mut().read(0x1FFF, ReadMode::Bus);
        assert_eq!(cart.bank.get(), 1);
        cart.roml.borrow_mut().read(0x0000, ReadMode::Bus);
        assert_eq!(cart.bank.get(), 0);
    }

    #[test]
    fn peek_does_not_switch_banks() {
        let (cart, _slot) = make_zaxxon();
        cart.roml.borrow_mut().read(0x1FFF, ReadMode::Peek);
        assert_eq!(cart.bank.get(), 0);
    }

    #[test]
    fn bank_flip_pushes_a_forced_propagation() {
        let (cart, slot) = make_zaxxon();
        let seen: Rc<RefCell<Vec<(GameExromMode, bool, u8)>>> = Rc::new(RefCell::new(Vec::new()));
        let inner = Rc::clone(&seen);
        *slot.borrow_mut() = Some(Box::new(move |prop: &Propagation| {
            let romh_byte = prop
                .romh
                .as_ref()
                .map_or(0, |w| w.device.borrow_mut().read(0, ReadMode::Peek));
            inner.borrow_mut().push((prop.mode, prop.force, romh_byte));
        }));

        cart.roml.borrow_mut().read(0x1000, ReadMode::Bus);
        cart.roml.borrow_mut().read(0x1001, ReadMode::Bus); // same bank, no event
        cart.roml.borrow_mut().read(0x0FFF, ReadMode::Bus);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2, "only actual flips propagate");
        assert_eq!(seen[0], (GameExromMode::Mode16k, true, 0xB1));
        assert_eq!(seen[1], (GameExromMode::Mode16k, true, 0xB0));
    }

    #[test]
    fn windows_report_the_current_bank() {
        let (cart, _slot) = make_zaxxon();
        cart.roml.borrow_mut().read(0x1800, ReadMode::Bus);
        let (_, romh) = cart.windows();
        let romh = romh.expect("romh window");
        assert_eq!(romh.device.borrow_mut().read(0, ReadMode::Peek), 0xB1);
    }

    #[test]
    fn rejects_an_8k_roml_chip() {
        let mut data = build_header("Bad Zaxxon", hw::ZAXXON, 0, 0);
        data.extend(build_chip(0, 0x8000, &vec![0x4B; 0x2000]));
        data.extend(build_chip(0, 0xA000, &vec![0xB0; 0x2000]));
        data.extend(build_chip(1, 0xA000, &vec![0xB1; 0x2000]));
        let crt = Crt::parse(&data).expect("valid CRT");
        let slot: ObserverSlot = Rc::new(RefCell::new(None));
        assert!(matches!(
            Zaxxon::from_crt(&crt, slot),
            Err(CartridgeError::BadChipSize { .. })
        ));
    }
}

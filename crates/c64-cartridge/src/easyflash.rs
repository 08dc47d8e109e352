//! EasyFlash cartridges.
//!
//! Up to 64 banks of dual 8K ROM (ROML + ROMH), two control registers and
//! 256 bytes of battery-backed RAM in the I/O-2 page:
//!
//! - $DE00: bank register, low six bits.
//! - $DE02: mode register. Bit 2 selects register control; bits 0–1 then
//!   pick Invisible, Ultimax, 8K or 16K. With bit 2 clear the GAME line
//!   follows the boot jumper, which this board has wired for Ultimax so
//!   the machine starts from cartridge ROM.
//! - $DF00–$DFFF: RAM. Survives reset — it is battery backed.

use emu_core::{ReadMode, Rom, Shared};
use format_crt::Crt;

use crate::chips::{check_load_addresses, rom_banks};
use crate::error::CartridgeError;
use crate::{Change, GameExromMode, WindowDev, window_dev};

pub struct EasyFlash {
    roml: Vec<Shared<Rom>>,
    romh: Vec<Shared<Rom>>,
    bank: usize,
    control: u8,
    ram: [u8; 256],
}

fn mode_from_control(value: u8) -> GameExromMode {
    if value & 0x04 == 0 {
        return GameExromMode::Ultimax;
    }
    match value & 0x03 {
        0b00 => GameExromMode::Invisible,
        0b01 => GameExromMode::Ultimax,
        0b10 => GameExromMode::Mode8k,
        _ => GameExromMode::Mode16k,
    }
}

impl EasyFlash {
    pub(crate) fn from_crt(crt: &Crt) -> Result<Self, CartridgeError> {
        check_load_addresses(crt, &[0x8000, 0xA000, 0xE000])?;
        let roml = rom_banks(crt, 0x8000, 0x2000, 64)?;
        if roml.is_empty() {
            return Err(CartridgeError::BadTotalSize {
                name: crt.name.clone(),
                size: crt.size(),
            });
        }

        // ROMH chips sit at $A000 in most images, $E000 in Ultimax-only
        // ones; a single image never mixes the two.
        let romh_a = rom_banks(crt, 0xA000, 0x2000, 64)?;
        let romh_e = rom_banks(crt, 0xE000, 0x2000, 64)?;
        let romh = match (romh_a.is_empty(), romh_e.is_empty()) {
            (false, true) => romh_a,
            (true, false) => romh_e,
            (true, true) => Vec::new(),
            (false, false) => {
                return Err(CartridgeError::BadLoadAddress {
                    name: crt.name.clone(),
                    load_address: 0xE000,
                });
            }
        };

        Ok(Self {
            roml,
            romh,
            bank: 0,
            control: 0,
            ram: [0xFF; 256],
        })
    }

    pub(crate) fn initial_mode(&self) -> GameExromMode {
        mode_from_control(self.control)
    }

    pub(crate) fn reset(&mut self) {
        // RAM content survives: battery backed.
        self.bank = 0;
        self.control = 0;
    }

    pub(crate) fn read(&mut self, offset: usize, _mode: ReadMode) -> (u8, Option<Change>) {
        match offset {
            0x100..=0x1FF => (self.ram[offset - 0x100], None),
            _ => (0xFF, None),
        }
    }

    pub(crate) fn write(&mut self, offset: usize, value: u8) -> Option<Change> {
        match offset {
            0x00 => {
                let bank = (value & 0x3F) as usize;
                let changed = bank != self.bank;
                self.bank = bank;
                changed.then(|| Change::bank(mode_from_control(self.control)))
            }
            0x02 => {
                self.control = value;
                Some(Change::mode(mode_from_control(value)))
            }
            0x100..=0x1FF => {
                self.ram[offset - 0x100] = value;
                None
            }
            _ => None,
        }
    }

    pub(crate) fn windows(&self) -> (Option<WindowDev>, Option<WindowDev>) {
        let roml = self.roml.get(self.bank & (self.roml.len() - 1)).map(window_dev);
        let romh = if self.romh.is_empty() {
            None
        } else {
            self.romh.get(self.bank & (self.romh.len() - 1)).map(window_dev)
        };
        (roml, romh)
    }
}

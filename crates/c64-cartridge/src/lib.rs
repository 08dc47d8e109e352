//! C64 expansion-port cartridges.
//!
//! Each supported cartridge type is a fixed, hand-coded decoder mirroring
//! one real PCB: a set of ROM (and sometimes RAM) chips, a current-bank
//! register, and the logic that translates I/O-area accesses into bank
//! selection and GAME/EXROM line changes.
//!
//! | CRT type | Engine | Switching mechanism |
//! |----------|--------|---------------------|
//! | 4  | Simon's Basic  | read $DE00 → 8K, write $DE00 → 16K |
//! | 5  | Ocean type 1   | write bank to $DE00, read back `bank \| 0x80` |
//! | 15 | C64GS/System 3 | bank in the *address* $DE00–$DE3F; any I/O-1 read disables |
//! | 18 | Zaxxon         | bank chosen by the ROML *fetch address* |
//! | 19 | Magic Desk     | bank in low bits of $DE00; `0x80` hides the cartridge |
//! | 32 | EasyFlash      | $DE00 bank + $DE02 mode register + 256B RAM at I/O-2 |
//!
//! A cartridge is both a [`Device`] (it owns the $DE00–$DFFF I/O window)
//! and the authority over which device backs the ROML/ROMH windows. When a
//! register access changes the mapping, the engine pushes a
//! [`Propagation`] through the owner-supplied observer so the address
//! space can re-derive its bank maps — synchronously, before the
//! triggering access returns.

mod chips;
mod easyflash;
mod error;
mod game_system3;
mod magic_desk;
mod ocean;
mod simons_basic;
mod zaxxon;

pub use easyflash::EasyFlash;
pub use error::CartridgeError;
pub use game_system3::GameSystem3;
pub use magic_desk::MagicDesk;
pub use ocean::Ocean;
pub use simons_basic::SimonsBasic;
pub use zaxxon::Zaxxon;

use std::cell::RefCell;
use std::rc::Rc;

use emu_core::{Device, ReadMode, Shared};
use format_crt::{Crt, hw};
use log::debug;

/// Visibility state decoded from the GAME/EXROM control lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameExromMode {
    /// ROML at $8000–$9FFF.
    Mode8k,
    /// ROML at $8000–$9FFF, ROMH at $A000–$BFFF.
    Mode16k,
    /// ROML at $8000–$9FFF, ROMH at $E000–$FFFF, internal RAM mostly gone.
    Ultimax,
    /// Cartridge ROM unmapped.
    Invisible,
}

impl GameExromMode {
    /// Decode the line *levels* (`true` = high = inactive, as stored in a
    /// CRT header).
    #[must_use]
    pub fn from_lines(game: bool, exrom: bool) -> Self {
        match (exrom, game) {
            (false, true) => Self::Mode8k,
            (false, false) => Self::Mode16k,
            (true, false) => Self::Ultimax,
            (true, true) => Self::Invisible,
        }
    }

    /// Base address of the ROMH window in this mode.
    #[must_use]
    pub fn romh_base(self) -> u16 {
        match self {
            Self::Ultimax => 0xE000,
            _ => 0xA000,
        }
    }
}

/// Device handle plus base offset backing one cartridge ROM window.
#[derive(Clone)]
pub struct WindowDev {
    pub device: Shared<dyn Device>,
    /// Device offset corresponding to the first byte of the window.
    pub offset: usize,
}

impl WindowDev {
    fn new(device: Shared<dyn Device>, offset: usize) -> Self {
        Self { device, offset }
    }
}

/// Whole-device window over a ROM bank.
pub(crate) fn window_dev(rom: &Shared<emu_core::Rom>) -> WindowDev {
    WindowDev::new(Rc::clone(rom) as Shared<dyn Device>, 0)
}

/// Mapping change pushed to the address-space owner.
///
/// Carries everything needed to rebuild the bank maps so the owner never
/// has to call back into the (possibly mid-access) cartridge.
pub struct Propagation {
    pub mode: GameExromMode,
    /// Set when the bank changed without a mode transition — ordinary
    /// propagation is keyed off mode changes only.
    pub force: bool,
    /// Backing for $8000–$9FFF, if driven.
    pub roml: Option<WindowDev>,
    /// Backing for $A000–$BFFF ($E000–$FFFF in Ultimax), if driven.
    pub romh: Option<WindowDev>,
}

/// Owner callback receiving mapping changes.
pub type ModeObserverFn = Box<dyn FnMut(&Propagation)>;

/// Observer slot shared between the engine and read-observer closures
/// (the Zaxxon engine fires it from inside a ROM read).
pub(crate) type ObserverSlot = Rc<RefCell<Option<ModeObserverFn>>>;

/// Fire the observer, taking it out of the slot for the duration so a
/// nested notification cannot double-borrow.
pub(crate) fn notify(slot: &ObserverSlot, prop: &Propagation) {
    let taken = slot.borrow_mut().take();
    if let Some(mut f) = taken {
        f(prop);
        *slot.borrow_mut() = Some(f);
    }
}

/// A bank/mode change reported by an engine.
pub(crate) struct Change {
    mode: GameExromMode,
    force: bool,
}

impl Change {
    pub(crate) fn mode(mode: GameExromMode) -> Self {
        Self { mode, force: false }
    }

    pub(crate) fn bank(mode: GameExromMode) -> Self {
        Self { mode, force: true }
    }

    #[cfg(test)]
    pub(crate) fn is_forced(&self) -> bool {
        self.force
    }
}

enum Kind {
    Ocean(Ocean),
    MagicDesk(MagicDesk),
    SimonsBasic(SimonsBasic),
    GameSystem3(GameSystem3),
    EasyFlash(EasyFlash),
    Zaxxon(Zaxxon),
}

/// A loaded cartridge: one of the six engines behind a common surface.
///
/// The four operations every engine provides: `reset` (re-establish the
/// initial bank and mode), `read`/`write` over the I/O window, and
/// `getdev` (which device currently backs a ROML/ROMH address).
pub struct Cartridge {
    name: String,
    size: usize,
    mode: GameExromMode,
    kind: Kind,
    observer: ObserverSlot,
}

impl Cartridge {
    /// Build the engine selected by the container's hardware type.
    ///
    /// # Errors
    ///
    /// Unsupported hardware types and engine-specific validation failures
    /// (wrong chip size or count, disallowed total size, bad load
    /// address) reject the whole cartridge.
    pub fn from_crt(crt: &Crt) -> Result<Self, CartridgeError> {
        let observer: ObserverSlot = Rc::new(RefCell::new(None));
        let kind = match crt.hardware_type {
            hw::OCEAN_TYPE_1 => Kind::Ocean(Ocean::from_crt(crt)?),
            hw::MAGIC_DESK => Kind::MagicDesk(MagicDesk::from_crt(crt)?),
            hw::SIMONS_BASIC => Kind::SimonsBasic(SimonsBasic::from_crt(crt)?),
            hw::C64_GAME_SYSTEM => Kind::GameSystem3(GameSystem3::from_crt(crt)?),
            hw::EASYFLASH => Kind::EasyFlash(EasyFlash::from_crt(crt)?),
            hw::ZAXXON => Kind::Zaxxon(Zaxxon::from_crt(crt, Rc::clone(&observer))?),
            other => {
                return Err(CartridgeError::UnsupportedHardware {
                    hardware_type: other,
                });
            }
        };

        let mut cart = Self {
            name: crt.name.clone(),
            size: crt.size(),
            mode: GameExromMode::Invisible,
            kind,
            observer,
        };
        cart.mode = cart.initial_mode();
        Ok(cart)
    }

    /// Cartridge name from the container header.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total ROM payload in bytes.
    #[must_use]
    pub fn cartsize(&self) -> usize {
        self.size
    }

    /// Current GAME/EXROM visibility.
    #[must_use]
    pub fn mode(&self) -> GameExromMode {
        self.mode
    }

    /// Install the owner callback that receives mapping changes.
    pub fn set_mode_observer(&mut self, observer: ModeObserverFn) {
        *self.observer.borrow_mut() = Some(observer);
    }

    fn initial_mode(&self) -> GameExromMode {
        match &self.kind {
            Kind::Ocean(c) => c.initial_mode(),
            Kind::MagicDesk(_) | Kind::GameSystem3(_) => GameExromMode::Mode8k,
            Kind::SimonsBasic(_) | Kind::Zaxxon(_) => GameExromMode::Mode16k,
            Kind::EasyFlash(c) => c.initial_mode(),
        }
    }

    /// Re-establish the initial bank and mode and force a propagation.
    pub fn reset(&mut self) {
        match &mut self.kind {
            Kind::Ocean(c) => c.reset(),
            Kind::MagicDesk(c) => c.reset(),
            Kind::SimonsBasic(c) => c.reset(),
            Kind::GameSystem3(c) => c.reset(),
            Kind::EasyFlash(c) => c.reset(),
            Kind::Zaxxon(c) => c.reset(),
        }
        self.propagate(self.initial_mode(), true);
    }

    /// Read from the I/O window ($DE00–$DFFF, `offset` 0x000–0x1FF).
    ///
    /// `Bus` reads reach the switching logic (Simon's Basic and the C64GS
    /// switch on reads); `Peek` reads are guaranteed side-effect free.
    pub fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        let (value, change) = match &mut self.kind {
            Kind::Ocean(c) => c.read(offset, mode),
            Kind::MagicDesk(c) => c.read(offset, mode),
            Kind::SimonsBasic(c) => c.read(offset, mode),
            Kind::GameSystem3(c) => c.read(offset, mode),
            Kind::EasyFlash(c) => c.read(offset, mode),
            Kind::Zaxxon(c) => c.read(offset, mode),
        };
        if let Some(change) = change {
            self.propagate(change.mode, change.force);
        }
        value
    }

    /// Write to the I/O window ($DE00–$DFFF, `offset` 0x000–0x1FF).
    ///
    /// May synchronously reconfigure the owning address space through the
    /// mode observer before returning.
    pub fn write(&mut self, offset: usize, value: u8) {
        let change = match &mut self.kind {
            Kind::Ocean(c) => c.write(offset, value),
            Kind::MagicDesk(c) => c.write(offset, value),
            Kind::SimonsBasic(c) => c.write(offset, value),
            Kind::GameSystem3(c) => c.write(offset, value),
            Kind::EasyFlash(c) => c.write(offset, value),
            Kind::Zaxxon(c) => c.write(offset, value),
        };
        if let Some(change) = change {
            self.propagate(change.mode, change.force);
        }
    }

    /// Which devices currently back the ROML/ROMH windows.
    ///
    /// `roml_active`/`romh_active` say which windows the caller is
    /// resolving `addr` against. Returns `(read target, write target)`
    /// as device-plus-offset pairs; cartridge ROM windows never accept
    /// writes, so the write target is `None` for every engine.
    #[must_use]
    pub fn getdev(
        &self,
        addr: u16,
        romh_active: bool,
        roml_active: bool,
    ) -> (
        Option<(Shared<dyn Device>, usize)>,
        Option<(Shared<dyn Device>, usize)>,
    ) {
        let (roml, romh) = self.windows();
        let romh_base = self.mode.romh_base();

        let read = if roml_active && (0x8000..0xA000).contains(&addr) {
            roml.map(|w| (w.device, w.offset + (addr - 0x8000) as usize))
        } else if romh_active
            && (romh_base..=romh_base.saturating_add(0x1FFF)).contains(&addr)
        {
            romh.map(|w| (w.device, w.offset + (addr - romh_base) as usize))
        } else {
            None
        };
        (read, None)
    }

    /// Window backing for the current mode.
    fn windows(&self) -> (Option<WindowDev>, Option<WindowDev>) {
        let (roml, romh) = match &self.kind {
            Kind::Ocean(c) => c.windows(),
            Kind::MagicDesk(c) => c.windows(),
            Kind::SimonsBasic(c) => c.windows(),
            Kind::GameSystem3(c) => c.windows(),
            Kind::EasyFlash(c) => c.windows(),
            Kind::Zaxxon(c) => c.windows(),
        };
        match self.mode {
            GameExromMode::Invisible => (None, None),
            GameExromMode::Mode8k => (roml, None),
            GameExromMode::Mode16k | GameExromMode::Ultimax => (roml, romh),
        }
    }

    fn propagate(&mut self, new_mode: GameExromMode, force: bool) {
        let changed = new_mode != self.mode;
        self.mode = new_mode;
        if !changed && !force {
            return;
        }
        debug!(
            "cartridge '{}': mode {:?}{}",
            self.name,
            self.mode,
            if force { " (bank change)" } else { "" }
        );
        let (roml, romh) = self.windows();
        let prop = Propagation {
            mode: self.mode,
            force,
            roml,
            romh,
        };
        notify(&self.observer, &prop);
    }
}

impl Device for Cartridge {
    fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        Cartridge::read(self, offset, mode)
    }

    fn write(&mut self, offset: usize, value: u8) {
        Cartridge::write(self, offset, value);
    }

    fn size(&self) -> usize {
        0x200
    }

    fn label(&self) -> &str {
        &self.name
    }
}

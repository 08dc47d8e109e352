//! Core traits and types for chip-level emulation.
//!
//! Everything a memory-mapped component needs to participate in an emulated
//! machine: the byte-addressable [`Device`] capability, the banked
//! [`AddressSpace`] that routes CPU cycles to devices, and the [`Clockable`]
//! scheduling contract driven by the master [`Clock`].

mod aspace;
mod clock;
mod device;
mod error;
mod ticks;

pub use aspace::{AddressSpace, Bank, BankMap};
pub use clock::{Clock, ClockControl, Clockable};
pub use device::{Device, Ram, ReadMode, ReadObserver, Rom, Shared, shared};
pub use error::CoreError;
pub use ticks::Ticks;

//! Banked address space.
//!
//! Partitions an address range into power-of-two sized banks. Each bank is
//! independently backed by a device plus a device-relative offset, with
//! separate read and write maps (so a ROM overlay can sit above writable
//! RAM). Resolution is O(1): `bank = addr >> bank_shift`, device offset =
//! `(addr & bank_mask) + bank.offset`.
//!
//! The maps live behind a `RefCell` so that a device access is allowed to
//! remap the very address space that routed it — a cartridge register write
//! can reconfigure the bank layout before the outer `write` call returns.
//! The borrow on the maps is always released before the device is invoked.

use std::cell::RefCell;

use crate::device::{Device, ReadMode, Shared};
use crate::error::CoreError;

/// One bank of a map: backing device plus a device-relative base offset.
#[derive(Clone)]
pub struct Bank {
    pub device: Shared<dyn Device>,
    pub offset: usize,
}

impl Bank {
    #[must_use]
    pub fn new(device: Shared<dyn Device>, offset: usize) -> Self {
        Self { device, offset }
    }
}

/// One entry per bank; the read and write maps must have the same length.
pub type BankMap = Vec<Bank>;

struct Layout {
    read_map: BankMap,
    write_map: BankMap,
    bank_mask: u32,
    bank_shift: u32,
}

/// A banked address space.
///
/// Constructed empty over a fixed range, then configured with [`remap`]
/// whenever the memory layout changes. Reads before the first `remap`, or
/// of banks whose device has shrunk, return open bus (`0xFF`).
///
/// [`remap`]: AddressSpace::remap
pub struct AddressSpace {
    range: usize,
    layout: RefCell<Option<Layout>>,
}

impl AddressSpace {
    /// Create an unconfigured address space covering `range` bytes.
    #[must_use]
    pub fn new(range: usize) -> Self {
        Self {
            range,
            layout: RefCell::new(None),
        }
    }

    /// Install new read and write maps, deriving the bank geometry.
    ///
    /// # Errors
    ///
    /// Fails if the write map is empty, the two maps differ in length, the
    /// bank count is not a power of two, or the resulting bank size is not
    /// a power of two that evenly partitions the range.
    pub fn remap(&self, read_map: BankMap, write_map: BankMap) -> Result<(), CoreError> {
        if write_map.is_empty() {
            return Err(CoreError::EmptyWriteMap);
        }
        if read_map.len() != write_map.len() {
            return Err(CoreError::UnbalancedMaps {
                read: read_map.len(),
                write: write_map.len(),
            });
        }

        let banks = write_map.len();
        if !banks.is_power_of_two() {
            return Err(CoreError::BankCount { banks });
        }
        if self.range % banks != 0 {
            return Err(CoreError::Partition {
                banks,
                range: self.range,
            });
        }
        let bank_size = self.range / banks;
        if !bank_size.is_power_of_two() {
            return Err(CoreError::BankSize { bank_size });
        }

        log::debug!("address space remapped: {banks} banks of {bank_size:#x} bytes");
        *self.layout.borrow_mut() = Some(Layout {
            read_map,
            write_map,
            bank_mask: (bank_size - 1) as u32,
            bank_shift: bank_size.trailing_zeros(),
        });
        Ok(())
    }

    /// Total number of addressable bytes.
    #[must_use]
    pub fn range(&self) -> usize {
        self.range
    }

    /// Size of one bank, if configured.
    #[must_use]
    pub fn bank_size(&self) -> Option<usize> {
        self.layout
            .borrow()
            .as_ref()
            .map(|l| (l.bank_mask as usize) + 1)
    }

    /// Number of banks, if configured.
    #[must_use]
    pub fn bank_count(&self) -> Option<usize> {
        self.layout.borrow().as_ref().map(|l| l.read_map.len())
    }

    /// Resolve an address against the read map: `(bank index, device offset)`.
    #[must_use]
    pub fn resolve(&self, addr: u32) -> Option<(usize, usize)> {
        let layout = self.layout.borrow();
        let layout = layout.as_ref()?;
        let addr = addr as usize & (self.range - 1);
        let bank = addr >> layout.bank_shift;
        let entry = layout.read_map.get(bank)?;
        Some((bank, (addr & layout.bank_mask as usize) + entry.offset))
    }

    /// Read a byte. `Bus` reads may have device side effects, `Peek` reads
    /// must not.
    #[must_use]
    pub fn read(&self, addr: u32, mode: ReadMode) -> u8 {
        // Clone the bank entry out of the map borrow before touching the
        // device: the device may re-enter `remap`.
        let target = {
            let layout = self.layout.borrow();
            layout.as_ref().map(|l| {
                let addr = addr as usize & (self.range - 1);
                let bank = addr >> l.bank_shift;
                let entry = &l.read_map[bank];
                (entry.device.clone(), (addr & l.bank_mask as usize) + entry.offset)
            })
        };
        match target {
            Some((device, offset)) => device.borrow_mut().read(offset, mode),
            None => 0xFF,
        }
    }

    /// Write a byte through the write map.
    ///
    /// The backing device may synchronously remap this address space before
    /// the call returns (cartridge bank switching).
    pub fn write(&self, addr: u32, value: u8) {
        let target = {
            let layout = self.layout.borrow();
            layout.as_ref().map(|l| {
                let addr = addr as usize & (self.range - 1);
                let bank = addr >> l.bank_shift;
                let entry = &l.write_map[bank];
                (entry.device.clone(), (addr & l.bank_mask as usize) + entry.offset)
            })
        };
        if let Some((device, offset)) = target {
            device.borrow_mut().write(offset, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Ram, Rom, shared};
    use std::rc::Rc;

    fn ram_bank(size: usize) -> Shared<dyn Device> {
        shared(Ram::new("ram", size)) as Shared<dyn Device>
    }

    fn flat_map(banks: usize, bank_size: usize) -> BankMap {
        (0..banks).map(|_| Bank::new(ram_bank(bank_size), 0)).collect()
    }

    #[test]
    fn resolves_every_address_to_one_bank() {
        for &(banks, range) in &[(4usize, 0x1_0000usize), (16, 0x1_0000), (2, 0x4000), (8, 0x2000)] {
            let aspace = AddressSpace::new(range);
            let bank_size = range / banks;
            aspace
                .remap(flat_map(banks, bank_size), flat_map(banks, bank_size))
                .expect("valid geometry");

            let shift = bank_size.trailing_zeros();
            for addr in (0..range).step_by(251) {
                let (bank, offset) = aspace.resolve(addr as u32).expect("configured");
                assert_eq!(bank, addr >> shift);
                assert_eq!(offset, addr & (bank_size - 1));
            }
        }
    }

    #[test]
    fn rejects_non_power_of_two_bank_counts() {
        for &banks in &[3usize, 5, 6] {
            let aspace = AddressSpace::new(0x1_0000);
            let map: BankMap = (0..banks).map(|_| Bank::new(ram_bank(0x1000), 0)).collect();
            let err = aspace.remap(map.clone(), map).expect_err("must fail");
            assert!(
                matches!(err, CoreError::BankCount { .. } | CoreError::Partition { .. }),
                "unexpected error for {banks} banks: {err}"
            );
        }
    }

    #[test]
    fn rejects_empty_write_map() {
        let aspace = AddressSpace::new(0x1_0000);
        let err = aspace.remap(Vec::new(), Vec::new()).expect_err("must fail");
        assert!(matches!(err, CoreError::EmptyWriteMap));
    }

    #[test]
    fn separate_read_and_write_maps() {
        // ROM overlay for reads, RAM underneath for writes.
        let ram = shared(Ram::new("ram", 0x1000));
        let rom = shared(Rom::new("rom", vec![0x5A; 0x1000]));
        let aspace = AddressSpace::new(0x1000);
        aspace
            .remap(
                vec![Bank::new(rom as Shared<dyn Device>, 0)],
                vec![Bank::new(Rc::clone(&ram) as Shared<dyn Device>, 0)],
            )
            .expect("valid geometry");

        aspace.write(0x123, 0x99);
        assert_eq!(aspace.read(0x123, ReadMode::Bus), 0x5A, "reads see the ROM");
        assert_eq!(ram.borrow_mut().read(0x123, ReadMode::Bus), 0x99, "writes land in RAM");
    }

    #[test]
    fn bank_offsets_window_into_a_larger_device() {
        // One 16K device split across four 4K banks via offsets.
        let ram = shared(Ram::new("ram", 0x4000));
        for (i, b) in ram.borrow_mut().data_mut().iter_mut().enumerate() {
            *b = (i >> 12) as u8;
        }
        let map: BankMap = (0..4)
            .map(|bank| Bank::new(Rc::clone(&ram) as Shared<dyn Device>, bank * 0x1000))
            .collect();
        let aspace = AddressSpace::new(0x4000);
        aspace.remap(map.clone(), map).expect("valid geometry");

        assert_eq!(aspace.read(0x0000, ReadMode::Bus), 0);
        assert_eq!(aspace.read(0x1FFF, ReadMode::Bus), 1);
        assert_eq!(aspace.read(0x3ABC, ReadMode::Bus), 3);
    }

    /// Device that remaps its owning address space from inside `write`.
    struct Switcher {
        aspace: Rc<AddressSpace>,
        alternate: Shared<dyn Device>,
    }

    impl Device for Switcher {
        fn read(&mut self, _offset: usize, _mode: ReadMode) -> u8 {
            0xFF
        }

        fn write(&mut self, _offset: usize, _value: u8) {
            let map = vec![Bank::new(self.alternate.clone(), 0)];
            self.aspace.remap(map.clone(), map).expect("valid geometry");
        }

        fn size(&self) -> usize {
            0x1000
        }

        fn label(&self) -> &str {
            "switcher"
        }
    }

    #[test]
    fn write_may_remap_reentrantly() {
        let aspace = Rc::new(AddressSpace::new(0x1000));
        let alternate = shared(Ram::filled("alt", 0x1000, 0x77));
        let switcher = shared(Switcher {
            aspace: Rc::clone(&aspace),
            alternate: alternate as Shared<dyn Device>,
        });

        let map = vec![Bank::new(switcher as Shared<dyn Device>, 0)];
        aspace.remap(map.clone(), map).expect("valid geometry");

        // The write lands in the switcher, which swaps the map out from
        // under itself before returning.
        aspace.write(0x0, 0x00);
        assert_eq!(aspace.read(0x0, ReadMode::Bus), 0x77);
    }
}

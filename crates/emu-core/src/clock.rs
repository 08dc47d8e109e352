//! Master clock and clock-driven scheduling.
//!
//! One dedicated thread runs the clock loop, ticking registered components
//! in registration order. A component does not tick on every cycle: each
//! `tick` returns the number of master-clock cycles until the component
//! needs attention again, so a sound chip clocked per audio sample period
//! coexists with a CPU stepping every cycle.
//!
//! A [`ClockControl`] handle lets another thread (typically the UI event
//! loop) pause, resume, and stop the loop. Pause is a flag plus wait: the
//! requester blocks until the loop acknowledges it has stopped ticking, so
//! machine state can be inspected or mutated without tearing. The loop
//! checks the stop flag once per cycle; the controlling thread joins after
//! signalling stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::device::Shared;
use crate::ticks::Ticks;

/// A component advanced by the system clock at its own cadence.
pub trait Clockable {
    /// Do one unit of work. Returns how many master-clock cycles must
    /// elapse before the next activation (treated as at least 1).
    fn tick(&mut self) -> Ticks;
}

/// Cross-thread control surface for a running [`Clock`] loop.
pub struct ClockControl {
    stop: AtomicBool,
    pause_requested: AtomicBool,
    paused: Mutex<bool>,
    cond: Condvar,
}

impl ClockControl {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            stop: AtomicBool::new(false),
            pause_requested: AtomicBool::new(false),
            paused: Mutex::new(false),
            cond: Condvar::new(),
        })
    }

    /// Request a pause and block until the clock loop acknowledges it.
    pub fn pause(&self) {
        self.pause_requested.store(true, Ordering::Release);
        let mut paused = self.paused.lock().expect("clock mutex poisoned");
        while !*paused && !self.stop.load(Ordering::Acquire) {
            paused = self.cond.wait(paused).expect("clock mutex poisoned");
        }
    }

    /// Let a paused clock loop continue.
    pub fn resume(&self) {
        self.pause_requested.store(false, Ordering::Release);
        self.cond.notify_all();
    }

    /// Signal the loop to exit. Checked once per cycle; also wakes a
    /// paused loop. The caller joins the clock thread afterwards.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.pause_requested.store(false, Ordering::Release);
        self.cond.notify_all();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Called by the clock loop: acknowledge the pause and sleep until
    /// resumed or stopped.
    fn wait_while_paused(&self) {
        let mut paused = self.paused.lock().expect("clock mutex poisoned");
        *paused = true;
        self.cond.notify_all();
        while self.pause_requested.load(Ordering::Acquire) && !self.stop.load(Ordering::Acquire) {
            paused = self.cond.wait(paused).expect("clock mutex poisoned");
        }
        *paused = false;
    }
}

struct Slot {
    component: Shared<dyn Clockable>,
    due: u64,
}

/// The system clock: owns the schedule of [`Clockable`] components.
///
/// The loop free-runs; real-time pacing comes from the audio backend
/// draining sample blocks, which is outside this crate.
pub struct Clock {
    frequency_hz: u64,
    cycle: u64,
    slots: Vec<Slot>,
    control: Arc<ClockControl>,
}

impl Clock {
    #[must_use]
    pub fn new(frequency_hz: u64) -> Self {
        Self {
            frequency_hz,
            cycle: 0,
            slots: Vec::new(),
            control: ClockControl::new(),
        }
    }

    /// Crystal frequency in Hz (e.g. `985_248` for a PAL C64).
    #[must_use]
    pub fn frequency_hz(&self) -> u64 {
        self.frequency_hz
    }

    /// Cycles elapsed since construction.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Handle for pausing/stopping the loop from another thread.
    #[must_use]
    pub fn control(&self) -> Arc<ClockControl> {
        Arc::clone(&self.control)
    }

    /// Register a component. Components tick in registration order; the
    /// first activation happens on the next cycle.
    pub fn add(&mut self, component: Shared<dyn Clockable>) {
        self.slots.push(Slot {
            component,
            due: self.cycle,
        });
    }

    /// Advance the machine by one master-clock cycle.
    pub fn step(&mut self) {
        for slot in &mut self.slots {
            if self.cycle >= slot.due {
                let ticks = slot.component.borrow_mut().tick();
                slot.due = self.cycle + ticks.get().max(1);
            }
        }
        self.cycle += 1;
    }

    /// Run until [`ClockControl::stop`] is signalled, honouring pause
    /// requests between cycles.
    pub fn run(&mut self) {
        loop {
            if self.control.is_stopped() {
                break;
            }
            if self.control.pause_requested.load(Ordering::Acquire) {
                self.control.wait_while_paused();
                continue;
            }
            self.step();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::shared;

    struct Counter {
        count: u64,
        period: u64,
    }

    impl Clockable for Counter {
        fn tick(&mut self) -> Ticks {
            self.count += 1;
            Ticks::new(self.period)
        }
    }

    #[test]
    fn components_tick_at_their_own_cadence() {
        let fast = shared(Counter { count: 0, period: 1 });
        let slow = shared(Counter { count: 0, period: 4 });

        let mut clock = Clock::new(1_000_000);
        clock.add(fast.clone());
        clock.add(slow.clone());

        for _ in 0..16 {
            clock.step();
        }

        assert_eq!(fast.borrow().count, 16);
        assert_eq!(slow.borrow().count, 4);
    }

    #[test]
    fn stop_breaks_the_loop() {
        let counter = shared(Counter { count: 0, period: 1 });
        let mut clock = Clock::new(1_000_000);
        clock.add(counter.clone());

        let control = clock.control();
        control.stop();
        clock.run();

        assert_eq!(counter.borrow().count, 0, "stop is checked before ticking");
    }

    #[test]
    fn pause_blocks_until_acknowledged() {
        use std::sync::mpsc;
        use std::thread;

        // The clock runs on its own thread with a component that counts
        // ticks through a channel; the test thread pauses, samples, and
        // verifies the count stays frozen while paused.
        struct Sender {
            tx: mpsc::Sender<u64>,
            count: u64,
        }

        impl Clockable for Sender {
            fn tick(&mut self) -> Ticks {
                self.count += 1;
                let _ = self.tx.send(self.count);
                Ticks::new(1)
            }
        }

        // The clock holds `Rc` handles, so it lives entirely on its own
        // thread; only the `Arc<ClockControl>` crosses over.
        let (tx, rx) = mpsc::channel();
        let (control_tx, control_rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let mut clock = Clock::new(1_000_000);
            let _ = control_tx.send(clock.control());
            clock.add(shared(Sender { tx, count: 0 }));
            clock.run();
        });
        let control = control_rx.recv().expect("control handle");

        // Wait until the loop is demonstrably ticking.
        let _ = rx.recv().expect("clock thread ticking");

        control.pause();
        // Drain anything emitted before the acknowledgment.
        while rx.try_recv().is_ok() {}
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(rx.try_recv().is_err(), "no ticks while paused");

        control.resume();
        let _ = rx.recv().expect("clock resumed");

        control.stop();
        handle.join().expect("clock thread joins");
    }
}

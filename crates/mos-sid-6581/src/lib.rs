//! MOS 6581 SID (Sound Interface Device) synthesis engine.
//!
//! Three voices — oscillator plus ADSR envelope each — feed a shared
//! multi-mode resonant filter and a master volume stage. The chip is
//! clocked once per audio sample period: [`Clockable::tick`] produces one
//! output sample and reports how many system-clock cycles may pass before
//! the next one is due. Completed sample blocks are handed to an
//! externally supplied audio callback.
//!
//! # Register map (29 registers, $D400–$D41C)
//!
//! | Addr | Register          |
//! |------|-------------------|
//! | $00  | Voice 1 freq lo   |
//! | $01  | Voice 1 freq hi   |
//! | $02  | Voice 1 PW lo     |
//! | $03  | Voice 1 PW hi     |
//! | $04  | Voice 1 control   |
//! | $05  | Voice 1 AD        |
//! | $06  | Voice 1 SR        |
//! | $07–$0D | Voice 2 (same layout) |
//! | $0E–$14 | Voice 3 (same layout) |
//! | $15  | Filter cutoff lo  |
//! | $16  | Filter cutoff hi  |
//! | $17  | Filter resonance + routing |
//! | $18  | Volume + filter mode |
//! | $19  | Paddle X (read-only) |
//! | $1A  | Paddle Y (read-only) |
//! | $1B  | OSC3 output (read-only) |
//! | $1C  | ENV3 output (read-only) |
//!
//! Registers are write-only on the real chip; reads of anything but OSC3
//! and ENV3 return whatever byte was last written to the chip, mirroring
//! the floating data bus.

mod envelope;
mod filter;
mod oscillator;

pub use envelope::{Envelope, Stage};
pub use filter::{Filter, MODE_BANDPASS, MODE_HIPASS, MODE_LOPASS};
pub use oscillator::{Oscillator, lfsr_output, lfsr_step};

use emu_core::{Clockable, Device, ReadMode, Ticks};

/// Voice each oscillator syncs and ring-modulates against:
/// voice 1 ← voice 3, voice 2 ← voice 1, voice 3 ← voice 2.
const SIBLING: [usize; 3] = [2, 0, 1];

/// Gain applied to the volume-register click channel when mixing.
const CLICK_GAIN: f32 = 0.25;

/// Sample blocks handed to the audio backend.
pub type AudioSink = Box<dyn FnMut(&[f32])>;

/// The SID chip.
pub struct Sid {
    label: String,
    sample_rate: u32,
    /// Seconds per output sample.
    dt: f32,
    /// System-clock cycles per sample period, derived once.
    cycles_per_sample: u64,

    osc: [Oscillator; 3],
    env: [Envelope; 3],
    pub filter: Filter,

    /// 4-bit master volume.
    volume: u8,
    /// Bit 7 of $D418: voice 3 is cut from the mix (it keeps running and
    /// keeps counting for filter routing — the usual trick for using it as
    /// a silent modulation source).
    voice3_off: bool,
    /// Floating-bus latch: every write lands here, unused reads return it.
    last_written: u8,

    /// Output block under construction.
    buffer: Vec<f32>,
    /// DC steps from volume-register writes, aligned to sample slots of
    /// the current block ("fourth voice" clicks). Mixed at reduced gain
    /// when the block completes, then cleared.
    click: Vec<f32>,
    block_len: usize,
    sink: Option<AudioSink>,
}

impl Sid {
    /// `clock_hz` is the system crystal (985,248 for a PAL C64); output is
    /// produced at `sample_rate` in blocks of `block_len` samples.
    #[must_use]
    pub fn new(label: &str, clock_hz: u32, sample_rate: u32, block_len: usize) -> Self {
        Self {
            label: label.to_string(),
            sample_rate,
            dt: 1.0 / sample_rate as f32,
            cycles_per_sample: u64::from(clock_hz / sample_rate).max(1),
            osc: [
                Oscillator::new(clock_hz),
                Oscillator::new(clock_hz),
                Oscillator::new(clock_hz),
            ],
            env: [
                Envelope::new(clock_hz),
                Envelope::new(clock_hz),
                Envelope::new(clock_hz),
            ],
            filter: Filter::new(sample_rate),
            volume: 0,
            voice3_off: false,
            last_written: 0,
            buffer: Vec::with_capacity(block_len),
            click: vec![0.0; block_len],
            block_len,
            sink: None,
        }
    }

    /// Install the callback that receives completed sample blocks.
    pub fn set_audio_sink(&mut self, sink: AudioSink) {
        self.sink = Some(sink);
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples accumulated towards the current block.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        for osc in &mut self.osc {
            osc.reset();
        }
        for env in &mut self.env {
            env.reset();
        }
        self.filter.reset();
        self.volume = 0;
        self.voice3_off = false;
        self.last_written = 0;
        self.buffer.clear();
        self.click.fill(0.0);
    }

    /// Write a chip register (offset masked to $00–$1F).
    pub fn write(&mut self, reg: u8, value: u8) {
        let reg = reg & 0x1F;
        self.last_written = value;

        if reg < 0x15 {
            let voice = (reg / 7) as usize;
            let osc = &mut self.osc[voice];
            let env = &mut self.env[voice];
            match reg % 7 {
                0 => osc.frequency = (osc.frequency & 0xFF00) | u16::from(value),
                1 => osc.frequency = (osc.frequency & 0x00FF) | (u16::from(value) << 8),
                2 => osc.pulse_width = (osc.pulse_width & 0x0F00) | u16::from(value),
                3 => {
                    osc.pulse_width = (osc.pulse_width & 0x00FF) | ((u16::from(value) & 0x0F) << 8);
                }
                4 => {
                    osc.set_control(value);
                    env.set_gate(value & 0x01 != 0);
                }
                5 => {
                    env.attack = (value >> 4) & 0x0F;
                    env.decay = value & 0x0F;
                }
                _ => {
                    env.sustain = (value >> 4) & 0x0F;
                    env.release = value & 0x0F;
                }
            }
            return;
        }

        match reg {
            0x15 => self.filter.set_cutoff_lo(value),
            0x16 => self.filter.set_cutoff_hi(value),
            0x17 => self.filter.set_resonance_routing(value),
            0x18 => {
                let new_volume = value & 0x0F;
                if new_volume != self.volume {
                    // The DAC steps the moment the register changes; park
                    // the step in the click channel at this block's
                    // current sample slot.
                    let slot = self.buffer.len().min(self.block_len - 1);
                    self.click[slot] +=
                        (f32::from(new_volume) - f32::from(self.volume)) / 15.0;
                }
                self.volume = new_volume;
                self.voice3_off = value & 0x80 != 0;
                self.filter.set_mode(value);
            }
            // $19–$1C are read-only.
            _ => {}
        }
    }

    /// Read a chip register. Only OSC3 and ENV3 carry live data; every
    /// other register returns the floating-bus latch.
    #[must_use]
    pub fn read(&self, reg: u8) -> u8 {
        match reg & 0x1F {
            0x1B => (self.osc[2].sample12() >> 4) as u8,
            0x1C => (self.env[2].amplitude() * 255.0) as u8,
            _ => self.last_written,
        }
    }

    /// Produce one output sample.
    pub fn sample_tick(&mut self) {
        // Sync and ring state from the previous sample, captured before
        // anything advances.
        let wrapped = [
            self.osc[0].wrapped(),
            self.osc[1].wrapped(),
            self.osc[2].wrapped(),
        ];
        let msb = [self.osc[0].msb(), self.osc[1].msb(), self.osc[2].msb()];

        let mut filtered = 0.0;
        let mut direct = 0.0;
        for i in 0..3 {
            let wave = self.osc[i].tick(self.dt, wrapped[SIBLING[i]], msb[SIBLING[i]]);
            let level = wave * self.env[i].tick(self.dt);

            let routed = self.filter.voice_routed(i);
            if i == 2 && self.voice3_off && !routed {
                // Muted, but it ran: OSC3/ENV3 keep reading live values.
                continue;
            }
            if routed {
                filtered += level;
            } else {
                direct += level;
            }
        }

        let mixed =
            (self.filter.process(filtered) + direct) / 3.0 * f32::from(self.volume) / 15.0;
        self.buffer.push(mixed);

        if self.buffer.len() >= self.block_len {
            self.flush();
        }
    }

    /// Mix the click channel in and hand the block to the audio sink.
    fn flush(&mut self) {
        for (sample, click) in self.buffer.iter_mut().zip(self.click.iter()) {
            *sample += click * CLICK_GAIN;
        }
        if let Some(sink) = &mut self.sink {
            sink(&self.buffer);
        }
        self.buffer.clear();
        self.click.fill(0.0);
    }
}

impl Clockable for Sid {
    fn tick(&mut self) -> Ticks {
        self.sample_tick();
        Ticks::new(self.cycles_per_sample)
    }
}

impl Device for Sid {
    fn read(&mut self, offset: usize, _mode: ReadMode) -> u8 {
        Sid::read(self, offset as u8)
    }

    fn write(&mut self, offset: usize, value: u8) {
        Sid::write(self, offset as u8, value);
    }

    fn size(&self) -> usize {
        0x20
    }

    fn label(&self) -> &str {
        &self.label
    }
}

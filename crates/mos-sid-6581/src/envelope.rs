//! SID ADSR envelope generator.
//!
//! Unlike the oscillator section, the envelope is specified in wall-clock
//! terms: the attack/decay/release codes index two fixed tables of times in
//! seconds (scaled for the actual crystal, since the datasheet times assume
//! a 1 MHz clock). Attack is a linear ramp; decay and release follow
//! `target + (start - target) * e^(-t / (T/4))` — the quarter scaling of
//! the table time reproduces how quickly the real chip's curve collapses
//! to near-silence.

/// Attack times in seconds at a 1 MHz clock, indexed by the 4-bit code.
const ATTACK_SECONDS: [f32; 16] = [
    0.002, 0.008, 0.016, 0.024, 0.038, 0.056, 0.068, 0.080, 0.100, 0.250, 0.500, 0.800, 1.000,
    3.000, 5.000, 8.000,
];

/// Decay and release times in seconds at a 1 MHz clock.
const DECAY_SECONDS: [f32; 16] = [
    0.006, 0.024, 0.048, 0.072, 0.114, 0.168, 0.204, 0.240, 0.300, 0.750, 1.500, 2.400, 3.000,
    9.000, 15.000, 24.000,
];

/// Amplitude below which a release is considered finished.
const FLOOR: f32 = 1.0 / 512.0;

/// Envelope stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    None,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// ADSR envelope generator for one voice.
pub struct Envelope {
    /// Attack code (4-bit).
    pub attack: u8,
    /// Decay code (4-bit).
    pub decay: u8,
    /// Sustain level (4-bit fraction of full scale).
    pub sustain: u8,
    /// Release code (4-bit).
    pub release: u8,

    stage: Stage,
    gate: bool,
    /// Time since the current stage started.
    t: f32,
    /// Amplitude when the current stage started.
    start: f32,
    /// Current output amplitude, `[0, 1]`.
    amplitude: f32,
    /// Table times assume 1 MHz; scale for the actual crystal.
    time_scale: f32,
}

impl Envelope {
    #[must_use]
    pub fn new(clock_hz: u32) -> Self {
        Self {
            attack: 0,
            decay: 0,
            sustain: 0,
            release: 0,
            stage: Stage::None,
            gate: false,
            t: 0.0,
            start: 0.0,
            amplitude: 0.0,
            time_scale: 1_000_000.0 / clock_hz as f32,
        }
    }

    pub fn reset(&mut self) {
        self.attack = 0;
        self.decay = 0;
        self.sustain = 0;
        self.release = 0;
        self.stage = Stage::None;
        self.gate = false;
        self.t = 0.0;
        self.start = 0.0;
        self.amplitude = 0.0;
    }

    /// Gate transition. Rising: enter attack from the current amplitude.
    /// Falling: enter release, sampling the instantaneous amplitude as the
    /// release start point — a release begun mid-attack starts from the
    /// partial level reached so far, not from full scale.
    pub fn set_gate(&mut self, gate: bool) {
        if gate && !self.gate {
            self.enter(Stage::Attack);
        } else if !gate && self.gate {
            self.enter(Stage::Release);
        }
        self.gate = gate;
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.start = self.amplitude;
        self.t = 0.0;
    }

    fn sustain_level(&self) -> f32 {
        f32::from(self.sustain & 0x0F) / 15.0
    }

    /// Advance one sample period and return the new amplitude.
    pub fn tick(&mut self, dt: f32) -> f32 {
        self.t += dt;
        match self.stage {
            Stage::None => {
                self.amplitude = 0.0;
            }
            Stage::Attack => {
                let t_attack = ATTACK_SECONDS[(self.attack & 0x0F) as usize] * self.time_scale;
                self.amplitude = if t_attack > 0.0 {
                    self.start + (1.0 - self.start) * (self.t / t_attack)
                } else {
                    1.0
                };
                if self.amplitude >= 1.0 {
                    self.amplitude = 1.0;
                    self.enter(Stage::Decay);
                }
            }
            Stage::Decay => {
                let t_decay = DECAY_SECONDS[(self.decay & 0x0F) as usize] * self.time_scale;
                let target = self.sustain_level();
                self.amplitude = target + (self.start - target) * (-self.t / (t_decay / 4.0)).exp();
                if self.amplitude - target < FLOOR {
                    self.amplitude = target;
                    self.enter(Stage::Sustain);
                }
            }
            Stage::Sustain => {
                // The sustain latch is live: lowering it pulls the level
                // down immediately.
                self.amplitude = self.amplitude.min(self.sustain_level());
            }
            Stage::Release => {
                let t_release = DECAY_SECONDS[(self.release & 0x0F) as usize] * self.time_scale;
                self.amplitude = self.start * (-self.t / (t_release / 4.0)).exp();
                if self.amplitude < FLOOR {
                    self.amplitude = 0.0;
                    self.stage = Stage::None;
                }
            }
        }
        self.amplitude
    }
}

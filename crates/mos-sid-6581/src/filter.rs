//! SID multi-mode resonant filter.
//!
//! One filter is shared by all three voices. The 11-bit cutoff register,
//! 4-bit resonance and the mode bits of $D418 select a combination of
//! low-pass, band-pass and high-pass responses; combinations sum in
//! parallel, which for same-pole biquads reduces to summing numerators.
//!
//! Coefficients are derived lazily: only when cutoff, resonance or mode
//! actually changed since the previous sample. The delay line is kept
//! across coefficient changes — the capacitors on the die don't discharge
//! because a register was written.

use emu_signal::{Biquad, BiquadState};

/// Mode bits as they appear in $D418.
pub const MODE_LOPASS: u8 = 0x10;
pub const MODE_BANDPASS: u8 = 0x20;
pub const MODE_HIPASS: u8 = 0x40;

/// The shared voice filter.
pub struct Filter {
    /// 11-bit cutoff code.
    cutoff: u16,
    /// 4-bit resonance code.
    resonance: u8,
    /// Mode bits (masked to 0x70).
    mode: u8,
    /// Voice routing bits (low nibble of $D417; bit 3 is external input).
    routing: u8,
    ext_in: bool,

    sample_rate: f32,
    /// Settings the current coefficients were derived for.
    derived_for: Option<(u16, u8, u8)>,
    /// How many times coefficients have been derived (cache diagnostics).
    derivations: u32,
    coeffs: Biquad,
    state: BiquadState,
}

impl Filter {
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            cutoff: 0,
            resonance: 0,
            mode: 0,
            routing: 0,
            ext_in: false,
            sample_rate: sample_rate as f32,
            derived_for: None,
            derivations: 0,
            coeffs: Biquad::default(),
            state: BiquadState::new(),
        }
    }

    pub fn reset(&mut self) {
        self.cutoff = 0;
        self.resonance = 0;
        self.mode = 0;
        self.routing = 0;
        self.ext_in = false;
        self.derived_for = None;
        self.state.reset();
    }

    /// $D415: cutoff bits 0-2.
    pub fn set_cutoff_lo(&mut self, value: u8) {
        self.cutoff = (self.cutoff & 0x7F8) | u16::from(value & 0x07);
    }

    /// $D416: cutoff bits 3-10.
    pub fn set_cutoff_hi(&mut self, value: u8) {
        self.cutoff = (self.cutoff & 0x007) | (u16::from(value) << 3);
    }

    /// $D417: resonance in the high nibble, voice routing in the low.
    pub fn set_resonance_routing(&mut self, value: u8) {
        self.resonance = (value >> 4) & 0x0F;
        self.routing = value & 0x07;
        self.ext_in = value & 0x08 != 0;
    }

    /// Mode bits from $D418 (volume bits handled by the chip).
    pub fn set_mode(&mut self, value: u8) {
        self.mode = value & 0x70;
    }

    #[must_use]
    pub fn cutoff(&self) -> u16 {
        self.cutoff
    }

    #[must_use]
    pub fn resonance(&self) -> u8 {
        self.resonance
    }

    /// Is voice `n` (0-2) routed through the filter?
    #[must_use]
    pub fn voice_routed(&self, n: usize) -> bool {
        self.routing & (1 << n) != 0
    }

    /// Feed the summed, routed voices through the filter.
    pub fn process(&mut self, input: f32) -> f32 {
        self.refresh();
        if self.mode == 0 {
            // No response selected: the filtered path contributes nothing.
            return 0.0;
        }
        self.state.process(&self.coeffs, input)
    }

    /// Re-derive the coefficients if cutoff, resonance or mode changed.
    fn refresh(&mut self) {
        let key = (self.cutoff, self.resonance, self.mode);
        if self.derived_for == Some(key) {
            return;
        }
        self.derived_for = Some(key);
        self.derivations += 1;

        if self.mode == 0 {
            return;
        }

        let fs = self.sample_rate;
        let fc = self.cutoff_hz().min(fs * 0.45);
        let q = self.q();

        let mut combined: Option<Biquad> = None;
        let mut add = |section: Biquad| {
            combined = Some(match combined {
                Some(existing) => existing.parallel(section),
                None => section,
            });
        };
        if self.mode & MODE_LOPASS != 0 {
            add(Biquad::lopass(fs, fc, q));
        }
        if self.mode & MODE_BANDPASS != 0 {
            add(Biquad::bandpass(fs, fc, q));
        }
        if self.mode & MODE_HIPASS != 0 {
            add(Biquad::hipass(fs, fc, q));
        }
        self.coeffs = combined.unwrap_or_default();
    }

    /// Map the 11-bit cutoff code to Hz.
    ///
    /// The measured response of the chip is nowhere near the linear
    /// datasheet formula: the bottom quarter of the range barely moves and
    /// the middle climbs steeply. Two logistic segments, switched at the
    /// midpoint code, track that shape.
    fn cutoff_hz(&self) -> f32 {
        let x = f32::from(self.cutoff & 0x7FF);
        if x < 1024.0 {
            220.0 + 4_000.0 / (1.0 + (-(x - 800.0) / 200.0).exp())
        } else {
            220.0 + 11_000.0 / (1.0 + (-(x - 1_280.0) / 280.0).exp())
        }
    }

    /// Resonance code to Q. Spans ~0.707 (no resonance) to ~2.5.
    fn q(&self) -> f32 {
        1.0 / (1.4143 - f32::from(self.resonance) / 14.79)
    }
}

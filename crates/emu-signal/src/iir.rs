//! Biquad IIR coefficient derivation.
//!
//! Standard audio-cookbook two-pole/two-zero sections. Low-pass, high-pass
//! and band-pass prototypes at the same cutoff and Q share an identical
//! denominator, so their parallel combinations reduce to summing the
//! numerator coefficients — which is how the multi-mode filter builds its
//! combined responses without running three filters.

/// Normalised biquad coefficients (`a0` divided through).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Biquad {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Biquad {
    /// Low-pass response at cutoff `fc` Hz for sample rate `fs` Hz.
    #[must_use]
    pub fn lopass(fs: f32, fc: f32, q: f32) -> Self {
        let (cos, alpha) = prewarp(fs, fc, q);
        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 - cos) / 2.0) / a0,
            b1: (1.0 - cos) / a0,
            b2: ((1.0 - cos) / 2.0) / a0,
            a1: (-2.0 * cos) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// High-pass response at cutoff `fc` Hz for sample rate `fs` Hz.
    #[must_use]
    pub fn hipass(fs: f32, fc: f32, q: f32) -> Self {
        let (cos, alpha) = prewarp(fs, fc, q);
        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 + cos) / 2.0) / a0,
            b1: (-(1.0 + cos)) / a0,
            b2: ((1.0 + cos) / 2.0) / a0,
            a1: (-2.0 * cos) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Band-pass response (constant peak gain) centred on `fc` Hz.
    #[must_use]
    pub fn bandpass(fs: f32, fc: f32, q: f32) -> Self {
        let (cos, alpha) = prewarp(fs, fc, q);
        let a0 = 1.0 + alpha;
        Self {
            b0: alpha / a0,
            b1: 0.0,
            b2: -alpha / a0,
            a1: (-2.0 * cos) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Parallel combination of two sections sharing a denominator.
    ///
    /// Only valid for sections derived at the same `fs`/`fc`/`q` — the
    /// poles must coincide for numerator addition to be the parallel sum.
    #[must_use]
    pub fn parallel(self, other: Self) -> Self {
        debug_assert!(
            (self.a1 - other.a1).abs() < 1e-6 && (self.a2 - other.a2).abs() < 1e-6,
            "parallel combination requires matching denominators"
        );
        Self {
            b0: self.b0 + other.b0,
            b1: self.b1 + other.b1,
            b2: self.b2 + other.b2,
            a1: self.a1,
            a2: self.a2,
        }
    }
}

fn prewarp(fs: f32, fc: f32, q: f32) -> (f32, f32) {
    let w0 = core::f32::consts::TAU * (fc / fs);
    let alpha = w0.sin() / (2.0 * q);
    (w0.cos(), alpha)
}

/// Delay-line state for one biquad section (direct form I).
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample through the section described by `coeffs`.
    pub fn process(&mut self, coeffs: &Biquad, x: f32) -> f32 {
        let y = coeffs.b0 * x + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    /// Clear the delay line.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f32 = 48_000.0;

    /// RMS of a pure sine at `freq` pushed through `coeffs`, settled.
    fn response(coeffs: &Biquad, freq: f32) -> f32 {
        let mut state = BiquadState::new();
        let mut sum_sq = 0.0;
        let mut n = 0u32;
        for i in 0..4096 {
            let x = (core::f32::consts::TAU * freq * i as f32 / FS).sin();
            let y = state.process(coeffs, x);
            if i >= 1024 {
                sum_sq += y * y;
                n += 1;
            }
        }
        (sum_sq / n as f32).sqrt()
    }

    #[test]
    fn lopass_attenuates_above_cutoff() {
        let coeffs = Biquad::lopass(FS, 1_000.0, 0.7071);
        let low = response(&coeffs, 100.0);
        let high = response(&coeffs, 10_000.0);
        assert!(low > 0.6, "passband should be near unity, got {low}");
        assert!(high < low * 0.1, "stopband should collapse, got {high} vs {low}");
    }

    #[test]
    fn hipass_attenuates_below_cutoff() {
        let coeffs = Biquad::hipass(FS, 1_000.0, 0.7071);
        let low = response(&coeffs, 100.0);
        let high = response(&coeffs, 10_000.0);
        assert!(high > 0.6);
        assert!(low < high * 0.1);
    }

    #[test]
    fn bandpass_peaks_at_centre() {
        let coeffs = Biquad::bandpass(FS, 2_000.0, 2.0);
        let centre = response(&coeffs, 2_000.0);
        let below = response(&coeffs, 200.0);
        let above = response(&coeffs, 15_000.0);
        assert!(centre > below * 3.0);
        assert!(centre > above * 3.0);
    }

    #[test]
    fn lopass_plus_hipass_forms_a_notch() {
        let lp = Biquad::lopass(FS, 1_500.0, 0.7071);
        let hp = Biquad::hipass(FS, 1_500.0, 0.7071);
        let notch = lp.parallel(hp);
        let centre = response(&notch, 1_500.0);
        let edge = response(&notch, 100.0);
        assert!(centre < edge * 0.5, "notch centre {centre} vs edge {edge}");
    }
}

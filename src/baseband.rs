//! Baseband demodulator: IQ → AM envelope / FM instantaneous-frequency
//! streams (spec §4.1).
//!
//! Grounded on the teacher's `radio/demodulator.rs` magnitude and
//! phase-difference math (`Demodulator::process_samples`,
//! `FmDemodulator::process_samples`), but split out from its
//! level/duration bookkeeping: that's [`crate::pulse_detector`]'s job now.
//! This module's only contract is IQ block in, two parallel i16 streams
//! out, deterministic and referentially transparent per block.

use crate::iq::IqSample;

/// One prior IQ sample carried across calls so block boundaries don't
/// introduce a phase-diff glitch at sample 0 of the next block.
#[derive(Debug, Clone, Copy, Default)]
struct PriorSample {
    i: i32,
    q: i32,
}

/// AM/FM baseband demodulator.
///
/// `am[k] = |I| + |Q|` (L1 envelope approximation — fast, and absolute
/// gain doesn't matter because the pulse detector's thresholds are
/// adaptive). `fm[k]` is an integer-scaled `atan2`-free phase-difference
/// proxy with ~14 fractional bits over `[-pi, +pi]`, matching the
/// teacher's `cross`/`dot` phase discriminator.
pub struct Baseband {
    prior: Option<PriorSample>,
    /// One-pole IIR low-pass state for the AM envelope (optional smoothing).
    am_lp_state: i32,
    /// Low-pass coefficient, 0 disables smoothing. Expressed as a
    /// fixed-point fraction out of 256 (e.g. 26 ≈ alpha 0.1).
    am_lp_alpha_256: i32,
}

/// Scale factor giving ~14 fractional bits over `[-pi, +pi]`.
const FM_SCALE: f64 = 8192.0 / std::f64::consts::PI;

impl Baseband {
    /// Create a demodulator with AM low-pass smoothing disabled.
    pub fn new() -> Self {
        Self { prior: None, am_lp_state: 0, am_lp_alpha_256: 0 }
    }

    /// Create a demodulator with a one-pole AM low-pass of the given
    /// alpha (0.0..=1.0, expressed as a fraction of 256 internally).
    pub fn with_am_smoothing(alpha: f32) -> Self {
        let alpha_256 = (alpha.clamp(0.0, 1.0) * 256.0) as i32;
        Self { prior: None, am_lp_state: 0, am_lp_alpha_256: alpha_256 }
    }

    /// Reset demodulator state (used after a `Reset` transition in the
    /// pulse detector so the next block starts clean).
    pub fn reset(&mut self) {
        self.prior = None;
        self.am_lp_state = 0;
    }

    /// Process a contiguous block of IQ samples. Returns `(am, fm)`
    /// streams of equal length to `samples`. Empty blocks are a no-op
    /// returning empty streams. Carries one prior IQ sample across calls
    /// so the first sample of a block is never glitched.
    pub fn process(&mut self, samples: &[IqSample]) -> (Vec<i16>, Vec<i16>) {
        let n = samples.len();
        let mut am = Vec::with_capacity(n);
        let mut fm = Vec::with_capacity(n);
        if n == 0 {
            return (am, fm);
        }

        let mut prior = self.prior.unwrap_or(PriorSample { i: samples[0].re as i32, q: samples[0].im as i32 });

        for s in samples {
            let i = s.re as i32;
            let q = s.im as i32;

            // AM: L1 envelope, optionally IIR-smoothed.
            let mag = i.unsigned_abs() as i32 + q.unsigned_abs() as i32;
            let smoothed = if self.am_lp_alpha_256 > 0 {
                self.am_lp_state = self.am_lp_state
                    + ((mag - self.am_lp_state) * self.am_lp_alpha_256) / 256;
                self.am_lp_state
            } else {
                mag
            };
            am.push(smoothed.clamp(i16::MIN as i32, i16::MAX as i32) as i16);

            // FM: phase-difference proxy via the conjugate product of
            // current and previous IQ, matching the spec's
            // atan2(I*Q' - Q*I', I*I' + Q*Q') formulation.
            let dot = (i * prior.i + q * prior.q) as f64;
            let cross = (i * prior.q - q * prior.i) as f64;
            let phase = if dot == 0.0 && cross == 0.0 { 0.0 } else { cross.atan2(dot) };
            let scaled = (phase * FM_SCALE).round();
            fm.push(scaled.clamp(i16::MIN as f64, i16::MAX as f64) as i16);

            prior = PriorSample { i, q };
        }

        self.prior = Some(prior);
        (am, fm)
    }
}

impl Default for Baseband {
    fn default() -> Self {
        Self::new()
    }
}

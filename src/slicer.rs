//! Pulse-train slicer family: one pure function per line code, turning a
//! [`PulseData`] packet into a [`BitBuffer`] (spec §4.3).
//!
//! Grounded on the teacher's per-protocol Manchester state machines
//! (`protocols/ford_v0.rs::ManchesterState`, `protocols/fiat_v0.rs`,
//! `protocols/common.rs`), generalized from one bespoke FSM per device
//! into a shared interval classifier plus one slicer per modulation kind
//! that any decoder's declared timings can drive.

use crate::bitbuffer::BitBuffer;
use crate::pulse_detector::PulseData;

/// Nominal timings a decoder declares for its line code (spec §3
/// "Registered decoder").
#[derive(Debug, Clone, Copy)]
pub struct SlicerTiming {
    pub short_us: u32,
    pub long_us: u32,
    pub sync_us: Option<u32>,
    pub tolerance_us: u32,
    pub gap_limit_us: u32,
    pub reset_limit_us: u32,
}

impl SlicerTiming {
    /// Convenience constructor defaulting `tolerance_us` to `short_us/4`
    /// per spec §4.3.
    pub fn new(short_us: u32, long_us: u32, gap_limit_us: u32, reset_limit_us: u32) -> Self {
        Self {
            short_us,
            long_us,
            sync_us: None,
            tolerance_us: (short_us / 4).max(1),
            gap_limit_us,
            reset_limit_us,
        }
    }

    pub fn with_sync(mut self, sync_us: u32) -> Self {
        self.sync_us = Some(sync_us);
        self
    }

    pub fn with_tolerance(mut self, tolerance_us: u32) -> Self {
        self.tolerance_us = tolerance_us;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Short,
    Long,
    Sync,
    Reset,
    Unknown,
}

fn classify(value: u32, timing: &SlicerTiming) -> Class {
    if value >= timing.reset_limit_us {
        return Class::Reset;
    }
    let tol = timing.tolerance_us as i64;
    let v = value as i64;
    if let Some(sync) = timing.sync_us {
        if (v - sync as i64).abs() < tol {
            return Class::Sync;
        }
    }
    if (v - timing.short_us as i64).abs() < tol {
        return Class::Short;
    }
    if (v - timing.long_us as i64).abs() < tol {
        return Class::Long;
    }
    Class::Unknown
}

fn push_units(bb: &mut BitBuffer, bit: bool, duration_us: u32, unit_us: u32) {
    if unit_us == 0 {
        return;
    }
    let units = ((duration_us as i64 + unit_us as i64 / 2) / unit_us as i64).max(1) as u32;
    for _ in 0..units {
        bb.add_bit(bit);
    }
}

/// PCM (RZ/NRZ): one bit per `short_us` of pulse (high=1) and gap
/// (low=0); row break on a gap reaching `gap_limit_us` (spec §4.3 PCM).
pub fn slice_pcm(packet: &PulseData, timing: &SlicerTiming) -> BitBuffer {
    let mut bb = BitBuffer::new();
    for i in 0..packet.num_pulses {
        let pulse = packet.pulse_us[i];
        let gap = packet.gap_us[i];
        push_units(&mut bb, true, pulse, timing.short_us);
        if gap >= timing.reset_limit_us {
            break;
        }
        if gap >= timing.gap_limit_us {
            bb.add_row();
            continue;
        }
        push_units(&mut bb, false, gap, timing.short_us);
    }
    bb
}

/// PPM: bit value encoded by the *gap* between fixed-width pulses. Short
/// gap → 0, long gap → 1, threshold `(short_us+long_us)/2` (spec §4.3 PPM).
pub fn slice_ppm(packet: &PulseData, timing: &SlicerTiming) -> BitBuffer {
    let mut bb = BitBuffer::new();
    let split = (timing.short_us + timing.long_us) / 2;
    for i in 0..packet.num_pulses {
        let gap = packet.gap_us[i];
        if gap >= timing.reset_limit_us {
            break;
        }
        if gap >= timing.gap_limit_us {
            bb.add_row();
            continue;
        }
        bb.add_bit(gap >= split);
    }
    bb
}

/// PWM: bit value encoded by pulse *width*. Short pulse → `1`, long
/// pulse → `0` (or inverted when `zero_is_short`). An optional `sync_us`
/// marks frame boundaries and is consumed, not emitted as data (spec
/// §4.3 PWM).
pub fn slice_pwm(packet: &PulseData, timing: &SlicerTiming, zero_is_short: bool) -> BitBuffer {
    let mut bb = BitBuffer::new();
    for i in 0..packet.num_pulses {
        let pulse = packet.pulse_us[i];
        let gap = packet.gap_us[i];
        match classify(pulse, timing) {
            Class::Sync => {}
            Class::Short => bb.add_bit(!zero_is_short),
            Class::Long => bb.add_bit(zero_is_short),
            Class::Reset | Class::Unknown => {
                bb.add_row();
            }
        }
        if gap >= timing.reset_limit_us {
            break;
        }
        if gap >= timing.gap_limit_us {
            bb.add_row();
        }
    }
    bb
}

/// Raw half-symbol stream shared by the Manchester-family slicers: each
/// pulse/gap becomes one or more `short_us`-wide half-symbols of level
/// high/low, so the Manchester pair decoder in [`crate::bitbuffer`] can
/// run over it directly.
fn raw_half_symbols(packet: &PulseData, timing: &SlicerTiming) -> BitBuffer {
    let mut bb = BitBuffer::new();
    for i in 0..packet.num_pulses {
        let pulse = packet.pulse_us[i];
        let gap = packet.gap_us[i];
        push_units(&mut bb, true, pulse, timing.short_us);
        if gap >= timing.reset_limit_us {
            break;
        }
        if gap >= timing.gap_limit_us {
            bb.add_row();
            continue;
        }
        push_units(&mut bb, false, gap, timing.short_us);
    }
    bb
}

/// Manchester "zero-bit": the leading half-symbol is a start-sync edge,
/// not the first half of a data pair, so it's dropped before pairing.
/// Pairs 01→0, 10→1; any 00/11 pair ends the row (spec §4.3).
pub fn slice_manchester_zero_bit(packet: &PulseData, timing: &SlicerTiming) -> BitBuffer {
    let raw = raw_half_symbols(packet, timing);
    let mut out = BitBuffer::new();
    for row in raw.rows() {
        if row.is_empty() {
            out.add_row();
            continue;
        }
        let mut shifted = BitBuffer::new();
        for i in 1..row.len() {
            shifted.add_bit(row.get(i).unwrap());
        }
        let decoded = shifted.row(0).unwrap().manchester_decode();
        for i in 0..decoded.len() {
            out.add_bit(decoded.get(i).unwrap());
        }
        out.add_row();
    }
    out
}

/// OSv1 Manchester: a non-standard half-symbol ordering used by one
/// device family — same raw generation as standard Manchester but with
/// the half-symbol polarity swapped before pairing.
pub fn slice_osv1_manchester(packet: &PulseData, timing: &SlicerTiming) -> BitBuffer {
    let raw = raw_half_symbols(packet, timing);
    let mut out = BitBuffer::new();
    for row in raw.rows() {
        let mut swapped = BitBuffer::new();
        for i in 0..row.len() {
            swapped.add_bit(!row.get(i).unwrap());
        }
        let decoded = swapped.row(0).unwrap().manchester_decode();
        for i in 0..decoded.len() {
            out.add_bit(decoded.get(i).unwrap());
        }
        out.add_row();
    }
    out
}

/// Differential Manchester: bit determined by presence/absence of a
/// mid-symbol transition after resynchronizing on the symbol clock.
pub fn slice_differential_manchester(packet: &PulseData, timing: &SlicerTiming) -> BitBuffer {
    let raw = raw_half_symbols(packet, timing);
    let mut out = BitBuffer::new();
    for row in raw.rows() {
        let decoded = row.differential_manchester_decode();
        for i in 0..decoded.len() {
            out.add_bit(decoded.get(i).unwrap());
        }
        out.add_row();
    }
    out
}

/// PIWM (pulse-interval-and-width modulation): both pulse and gap carry
/// information. Each transition yields a bit whose value depends on the
/// class (short/long) of the interval just completed (spec §4.3 PIWM).
/// `dc_balance` selects the "DC" variant, which additionally inverts
/// alternate bits to remove the line's DC bias.
pub fn slice_piwm(packet: &PulseData, timing: &SlicerTiming, dc_balance: bool) -> BitBuffer {
    let mut bb = BitBuffer::new();
    let mut toggle = false;
    for i in 0..packet.num_pulses {
        let pulse = packet.pulse_us[i];
        let gap = packet.gap_us[i];
        for (idx, duration) in [pulse, gap].into_iter().enumerate() {
            if idx == 1 && gap >= timing.reset_limit_us {
                return bb;
            }
            if idx == 1 && gap >= timing.gap_limit_us {
                bb.add_row();
                continue;
            }
            match classify(duration, timing) {
                Class::Short => {
                    let bit = if dc_balance { toggle } else { false };
                    bb.add_bit(bit);
                }
                Class::Long => {
                    let bit = if dc_balance { !toggle } else { true };
                    bb.add_bit(bit);
                }
                Class::Sync | Class::Reset | Class::Unknown => {
                    bb.add_row();
                }
            }
            toggle = !toggle;
        }
    }
    bb
}

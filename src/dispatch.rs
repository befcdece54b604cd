//! Decoder registry and dispatch (spec §4.5).
//!
//! Grounded on the teacher's `protocols/mod.rs::ProtocolRegistry`
//! (`process_signal`/`process_signal_stream`, frequency-tolerance
//! matching), generalized from "first registered decoder whose timing
//! matches wins" into per-decoder slicing: each registered decoder
//! declares its own line code and timing, so the same pulse packet is
//! sliced once per candidate decoder rather than once per packet. Every
//! `Default`-tier decoder that matches the packet's modulation family gets a
//! turn, and every one that succeeds contributes events, in registration
//! order — unlike the teacher's registry, which stops at the first match.
//! `Fallback`-tier decoders only get a turn if no `Default` decoder
//! succeeded on the packet (spec §4.5).

use crate::bitbuffer::BitBuffer;
use crate::error::ConfigError;
use crate::event::DecodedEvent;
use crate::log::{decoder_log, Verbosity};
use crate::pulse_detector::{PacketModulation, PulseData};
use crate::slicer::{
    slice_differential_manchester, slice_manchester_zero_bit, slice_osv1_manchester, slice_pcm,
    slice_piwm, slice_ppm, slice_pwm, SlicerTiming,
};

/// Which pulse-detector output a decoder wants fed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationFamily {
    Ook,
    Fsk,
}

/// Which slicer a decoder's declared timing should be run through (spec §4.3).
#[derive(Debug, Clone, Copy)]
pub enum LineCode {
    Pcm,
    Ppm,
    Pwm { zero_is_short: bool },
    ManchesterZeroBit,
    DifferentialManchester,
    Osv1Manchester,
    Piwm { dc_balance: bool },
}

fn slice(packet: &PulseData, timing: &SlicerTiming, code: LineCode) -> BitBuffer {
    match code {
        LineCode::Pcm => slice_pcm(packet, timing),
        LineCode::Ppm => slice_ppm(packet, timing),
        LineCode::Pwm { zero_is_short } => slice_pwm(packet, timing, zero_is_short),
        LineCode::ManchesterZeroBit => slice_manchester_zero_bit(packet, timing),
        LineCode::DifferentialManchester => slice_differential_manchester(packet, timing),
        LineCode::Osv1Manchester => slice_osv1_manchester(packet, timing),
        LineCode::Piwm { dc_balance } => slice_piwm(packet, timing, dc_balance),
    }
}

/// Why a decode attempt did not produce events (spec §4.5 failure kinds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Bit stream too short to contain even a preamble.
    AbortEarly,
    /// Decoded length field disagreed with the bits actually available.
    AbortLength,
    /// Checksum/CRC/MIC validation failed.
    FailMic,
    /// Structurally plausible but a sanity check on field ranges failed.
    FailSanity,
    /// Any other decoder-specific rejection.
    FailOther(String),
}

/// The result of running one registered decoder against one packet.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Success(Vec<DecodedEvent>),
    Fail(DecodeFailure),
}

/// A decoder's dispatch tier (spec §4.5): fallback decoders only get a
/// turn on packets no default-tier decoder has already succeeded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Default,
    Fallback,
}

/// A decoder bound into the dispatcher (spec §3 "Registered decoder").
pub trait RegisteredDecoder: Send + Sync {
    fn name(&self) -> &str;
    fn modulation(&self) -> ModulationFamily;
    fn timing(&self) -> SlicerTiming;
    fn line_code(&self) -> LineCode;
    /// Decode a fully-sliced bit buffer. `packet` is passed through for
    /// decoders that want RF-domain context (RSSI, frequency).
    fn decode(&self, bits: &BitBuffer, packet: &PulseData) -> DecodeOutcome;
    /// Dispatch tier (spec §4.5). Most decoders are `Default`.
    fn priority(&self) -> Priority {
        Priority::Default
    }
}

/// Registry of decoders plus the dispatch loop that runs packets through
/// them (spec §4.5, §6 "Registry surface").
pub struct Dispatcher {
    decoders: Vec<Box<dyn RegisteredDecoder>>,
    started: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self { decoders: Vec::new(), started: false }
    }

    /// Register a decoder. Fails if the dispatcher has already
    /// [`start`](Self::start)ed, or if the name is already taken (spec
    /// §6: registration is a start-up-only step).
    pub fn register(&mut self, decoder: Box<dyn RegisteredDecoder>) -> Result<(), ConfigError> {
        if self.started {
            return Err(ConfigError::RegisteredAfterStart(decoder.name().to_string()));
        }
        if self.decoders.iter().any(|d| d.name() == decoder.name()) {
            return Err(ConfigError::DuplicateName(decoder.name().to_string()));
        }
        self.decoders.push(decoder);
        Ok(())
    }

    /// Freeze the registry. No further `register` calls are accepted.
    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn decoder_count(&self) -> usize {
        self.decoders.len()
    }

    /// Run every registered decoder whose modulation family matches the
    /// packet against it, in registration order. Returns one outcome per
    /// attempted decoder (decoders of the wrong modulation family are
    /// silently skipped, not reported).
    ///
    /// Decoders run in two tiers (spec §4.5): every matching `Default`
    /// decoder is attempted unconditionally; `Fallback` decoders are only
    /// consulted if no `Default` decoder produced a `Success` on this
    /// packet. A fallback decoder skipped this way contributes no outcome
    /// entry at all, the same as a decoder of the wrong modulation family.
    pub fn dispatch(&self, packet: &PulseData) -> Vec<(&str, DecodeOutcome)> {
        let wanted = match packet.modulation {
            PacketModulation::Ook => ModulationFamily::Ook,
            PacketModulation::Fsk => ModulationFamily::Fsk,
        };
        let mut results = Vec::new();
        let mut any_default_succeeded = false;
        for decoder in &self.decoders {
            if decoder.modulation() != wanted || decoder.priority() != Priority::Default {
                continue;
            }
            let outcome = self.run_one(decoder.as_ref(), packet);
            if matches!(outcome, DecodeOutcome::Success(_)) {
                any_default_succeeded = true;
            }
            results.push((decoder.name(), outcome));
        }
        if !any_default_succeeded {
            for decoder in &self.decoders {
                if decoder.modulation() != wanted || decoder.priority() != Priority::Fallback {
                    continue;
                }
                let outcome = self.run_one(decoder.as_ref(), packet);
                results.push((decoder.name(), outcome));
            }
        }
        results
    }

    fn run_one(&self, decoder: &dyn RegisteredDecoder, packet: &PulseData) -> DecodeOutcome {
        let timing = decoder.timing();
        let bits = slice(packet, &timing, decoder.line_code());
        let outcome = decoder.decode(&bits, packet);
        match &outcome {
            DecodeOutcome::Success(events) => decoder_log(
                Verbosity::Debug,
                "dispatch",
                &format!("{} produced {} event(s)", decoder.name(), events.len()),
            ),
            DecodeOutcome::Fail(reason) => decoder_log(
                Verbosity::Trace,
                "dispatch",
                &format!("{} failed: {:?}", decoder.name(), reason),
            ),
        }
        outcome
    }

    /// Convenience: flatten every successful decoder's events, in
    /// registration order (spec §4.5: "all successes are emitted").
    pub fn decode_events(&self, packet: &PulseData) -> Vec<DecodedEvent> {
        self.dispatch(packet)
            .into_iter()
            .filter_map(|(_, outcome)| match outcome {
                DecodeOutcome::Success(events) => Some(events),
                DecodeOutcome::Fail(_) => None,
            })
            .flatten()
            .collect()
    }
}

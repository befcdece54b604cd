//! ISM-band telemetry receiver core: baseband demodulation, pulse
//! detection, pulse-train slicing, and protocol dispatch for short-range
//! sub-GHz sensors (spec §1 OVERVIEW).
//!
//! This crate is deliberately silent on tuner hardware access, CLI/config
//! file parsing, output formatting, and network transport — it is the
//! signal-processing core an embedder wires a tuner and an output sink
//! around. See [`pipeline::Pipeline`] for the synchronous entry point.

pub mod baseband;
pub mod bitbuffer;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod flex;
pub mod iq;
pub mod log;
pub mod pipeline;
pub mod pulse_detector;
pub mod slicer;
pub mod util;

pub use dispatch::{DecodeFailure, DecodeOutcome, Dispatcher, LineCode, ModulationFamily, RegisteredDecoder};
pub use error::ConfigError;
pub use event::{DecodedEvent, FieldValue};
pub use iq::IqSample;
pub use pipeline::Pipeline;
pub use pulse_detector::{DetectorConfig, PulseData};

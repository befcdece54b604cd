//! Typed error values that cross the configuration-time boundary.
//!
//! Nothing in the hot signal path (§4.1–§4.5) returns a `Result`: transient
//! signal errors, truncation, and sanity failures are all represented as
//! [`crate::dispatch::DecodeOutcome`] values, per the propagation policy in
//! the spec's error-handling design. `ConfigError` is the one place the core
//! can fail hard, and only during `register_decoder`/`FlexSpec::parse`,
//! before `Pipeline::start` is called.

use thiserror::Error;

/// Fatal configuration-time errors (spec §7 kind 4).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown modulation kind: {0}")]
    UnknownModulation(String),

    #[error("decoder '{0}' declares short_us ({1}) >= long_us ({2})")]
    InconsistentTimings(String, u32, u32),

    #[error("decoder '{0}' registered after Pipeline::start()")]
    RegisteredAfterStart(String),

    #[error("flex decoder spec parse error: {0}")]
    FlexSpecParse(String),

    #[error("duplicate decoder name: {0}")]
    DuplicateName(String),
}

//! Typed tracing helper replacing the original's variadic printf-style
//! tracing (spec §9). Call sites pass a pre-formatted message; no
//! call-site variadics, no format-string plumbing through the core.

/// Verbosity level for [`decoder_log`], coarser than `tracing::Level` so
/// decoder authors don't need to reach for `tracing` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Per-packet detail: pulse counts, threshold crossings.
    Trace,
    /// Per-decode detail: which decoder matched, field values.
    Debug,
    /// Worth surfacing without `-v`: truncation, buffer overflow.
    Info,
    /// Configuration-time problems that didn't quite abort the process.
    Warn,
}

/// Emit a pre-formatted diagnostic tagged with the originating module.
///
/// `module` is a short static tag (`"pulse_detector"`, `"dispatch"`,
/// decoder name, ...), not a full Rust module path.
pub fn decoder_log(verbosity: Verbosity, module: &str, message: &str) {
    match verbosity {
        Verbosity::Trace => tracing::trace!(target: "ism_telemetry_core", module, "{}", message),
        Verbosity::Debug => tracing::debug!(target: "ism_telemetry_core", module, "{}", message),
        Verbosity::Info => tracing::info!(target: "ism_telemetry_core", module, "{}", message),
        Verbosity::Warn => tracing::warn!(target: "ism_telemetry_core", module, "{}", message),
    }
}

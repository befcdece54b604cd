//! Minimal embedder harness: wires a `Pipeline` with the built-in
//! Acurite-609TXC decoder over a synthetic IQ block and prints whatever
//! events fall out. Shows the shape an embedder's own CLI/capture loop
//! would take around this crate's core (spec §1: tuner access, output
//! formatting, and config files are explicitly out of scope for the
//! library itself).
//!
//! Grounded on the teacher's `src/main.rs`/`src/app.rs` top-level error
//! handling: outer orchestration code propagates with `anyhow`, while
//! the core library stays on its own typed `ConfigError`.

use anyhow::{Context, Result};
use ism_telemetry_core::devices::acurite_609txc::Acurite609TxcDecoder;
use ism_telemetry_core::{DetectorConfig, IqSample, Pipeline};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut pipeline = Pipeline::new(DetectorConfig::default());
    pipeline
        .register_decoder(Box::new(Acurite609TxcDecoder))
        .context("registering the Acurite-609TXC decoder")?;
    pipeline.start();

    let samples = silent_iq_block();
    let events = pipeline.on_samples(&samples);
    println!("decoded {} event(s) from a silent block", events.len());
    for event in &events {
        println!("{}", serde_json::to_string(event).context("serializing decoded event")?);
    }

    Ok(())
}

fn silent_iq_block() -> Vec<IqSample> {
    vec![IqSample::new(0, 0); 256]
}

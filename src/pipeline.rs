//! Synchronous embedder harness wiring baseband → pulse detection →
//! slicing → dispatch end to end (spec §6 "Registry surface").
//!
//! Grounded on the teacher's `radio/rtlsdr.rs::run_receiver_rtlsdr`
//! block-at-a-time receive loop, minus its own threading and hardware
//! I/O: a `Pipeline` here is driven synchronously, one block at a time,
//! by whatever feeds it samples (a file reader, a live tuner callback,
//! a test harness).

use crate::dispatch::{Dispatcher, RegisteredDecoder};
use crate::error::ConfigError;
use crate::event::DecodedEvent;
use crate::iq::{self, IqSample};
use crate::pulse_detector::{DetectorConfig, FskPulseDetector, PulseDetector};
use crate::{baseband::Baseband, log::decoder_log, log::Verbosity};

/// End-to-end receiver core: one per tuned center frequency / sample
/// rate. Not `Clone` — it carries adaptive detector state across calls.
pub struct Pipeline {
    baseband: Baseband,
    ook_detector: PulseDetector,
    fsk_detector: FskPulseDetector,
    dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(cfg: DetectorConfig) -> Self {
        Self {
            baseband: Baseband::new(),
            ook_detector: PulseDetector::new(cfg),
            fsk_detector: FskPulseDetector::new(cfg),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Register a decoder (spec §6: start-up-only, fails after `start`).
    pub fn register_decoder(&mut self, decoder: Box<dyn RegisteredDecoder>) -> Result<(), ConfigError> {
        self.dispatcher.register(decoder)
    }

    /// Freeze the registry; no further `register_decoder` calls accepted.
    pub fn start(&mut self) {
        self.dispatcher.start();
        decoder_log(
            Verbosity::Info,
            "pipeline",
            &format!("started with {} registered decoder(s)", self.dispatcher.decoder_count()),
        );
    }

    /// Feed one block of unsigned-8 IQ (the common RTL-SDR wire format)
    /// through the full pipeline. Returns every event any registered
    /// decoder produced from this block.
    pub fn on_iq_u8(&mut self, buf: &[u8]) -> Vec<DecodedEvent> {
        let samples = iq::from_u8_offset(buf);
        self.on_samples(&samples)
    }

    /// Feed one block of normalized IQ samples through the full pipeline.
    pub fn on_samples(&mut self, samples: &[IqSample]) -> Vec<DecodedEvent> {
        let (am, fm) = self.baseband.process(samples);
        let mut events = Vec::new();

        let dispatcher = &self.dispatcher;
        let ook_detector = &mut self.ook_detector;
        ook_detector.process_am(&am, |packet| {
            events.extend(dispatcher.decode_events(&packet));
        });

        let fsk_detector = &mut self.fsk_detector;
        fsk_detector.process_fm(&fm, |packet| {
            events.extend(dispatcher.decode_events(&packet));
        });

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitbuffer::BitBuffer;
    use crate::dispatch::{DecodeOutcome, LineCode, ModulationFamily};
    use crate::pulse_detector::PulseData;
    use crate::slicer::SlicerTiming;
    use num_complex::Complex;

    struct CountingDecoder;
    impl RegisteredDecoder for CountingDecoder {
        fn name(&self) -> &str {
            "counter"
        }
        fn modulation(&self) -> ModulationFamily {
            ModulationFamily::Ook
        }
        fn timing(&self) -> SlicerTiming {
            SlicerTiming::new(100, 200, 1_000, 5_000)
        }
        fn line_code(&self) -> LineCode {
            LineCode::Pcm
        }
        fn decode(&self, _bits: &BitBuffer, _packet: &PulseData) -> DecodeOutcome {
            DecodeOutcome::Success(vec![DecodedEvent::new("counter")])
        }
    }

    #[test]
    fn registering_after_start_is_rejected_through_the_pipeline() {
        let mut p = Pipeline::new(DetectorConfig::default());
        p.start();
        let err = p.register_decoder(Box::new(CountingDecoder)).unwrap_err();
        assert!(matches!(err, ConfigError::RegisteredAfterStart(_)));
    }

    #[test]
    fn feeding_silence_produces_no_events() {
        let mut p = Pipeline::new(DetectorConfig::default());
        p.register_decoder(Box::new(CountingDecoder)).unwrap();
        p.start();
        let samples = vec![Complex::new(0i16, 0i16); 64];
        let events = p.on_samples(&samples);
        assert!(events.is_empty());
    }

    #[test]
    fn u8_iq_entry_point_accepts_empty_and_short_blocks() {
        let mut p = Pipeline::new(DetectorConfig::default());
        p.start();
        assert!(p.on_iq_u8(&[]).is_empty());
        assert!(p.on_iq_u8(&[128]).is_empty());
    }
}

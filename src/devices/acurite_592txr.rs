//! Acurite 592TXR temperature/humidity sensor.
//!
//! Same PWM line code and sync pulse as [`crate::devices::acurite_609txc`]
//! but a wider 7-byte frame carrying a humidity byte and a CRC-8 (poly
//! 0x07, init 0x00) instead of a byte-sum checksum — the two devices
//! share a sync pulse and bit encoding but diverge in frame layout and
//! integrity check, so they stay separate decoders rather than one
//! parameterized over a format flag.

use crate::bitbuffer::BitBuffer;
use crate::dispatch::{DecodeFailure, DecodeOutcome, LineCode, ModulationFamily, RegisteredDecoder};
use crate::event::DecodedEvent;
use crate::pulse_detector::PulseData;
use crate::slicer::SlicerTiming;
use crate::util::crc8_0x07;

const FRAME_BITS: usize = 56;

pub struct Acurite592TxrDecoder;

impl RegisteredDecoder for Acurite592TxrDecoder {
    fn name(&self) -> &str {
        "Acurite-592TXR"
    }

    fn modulation(&self) -> ModulationFamily {
        ModulationFamily::Ook
    }

    fn timing(&self) -> SlicerTiming {
        SlicerTiming::new(220, 408, 1_700, 4_000).with_sync(620)
    }

    fn line_code(&self) -> LineCode {
        LineCode::Pwm { zero_is_short: false }
    }

    fn decode(&self, bits: &BitBuffer, _packet: &PulseData) -> DecodeOutcome {
        let mut events = Vec::new();
        for row in bits.rows() {
            if row.len() < FRAME_BITS {
                continue;
            }
            let bytes = row.extract_bytes(0, FRAME_BITS);
            let crc = crc8_0x07(&bytes[0..6]);
            if crc != bytes[6] {
                continue;
            }
            let id = u16::from_be_bytes([bytes[0], bytes[1]]) & 0x3FFF;
            let battery_ok = (bytes[1] >> 6) & 1 == 1;
            let temp_raw = u16::from_be_bytes([bytes[2], bytes[3]]) & 0x0FFF;
            let temp_c = (temp_raw as f64 - 400.0) / 10.0;
            let humidity = bytes[4];

            events.push(
                DecodedEvent::new(self.name())
                    .with("id", id as i64)
                    .with("battery_ok", battery_ok as i64)
                    .with("temperature_c", temp_c)
                    .with("humidity", humidity as i64),
            );
        }
        if events.is_empty() {
            DecodeOutcome::Fail(DecodeFailure::FailMic)
        } else {
            DecodeOutcome::Success(events)
        }
    }
}

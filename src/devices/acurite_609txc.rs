//! Acurite 609TXC temperature/humidity sensor (spec §8 scenario 1).
//!
//! PWM-encoded, 5-byte frame: id, a status byte whose bit 3 is the
//! low-battery flag, a 12-bit sign-extended temperature packed across
//! bytes 1-2, a humidity byte, and a trailing byte-sum checksum over the
//! first four bytes. Grounded on the teacher's `protocols/fiat_v0.rs`
//! fixed-width byte-extraction-plus-checksum shape; the 12-bit unpacking
//! and sign extension reuse `src/util.rs::sign_extend`.

use crate::bitbuffer::BitBuffer;
use crate::dispatch::{DecodeFailure, DecodeOutcome, LineCode, ModulationFamily, RegisteredDecoder};
use crate::event::DecodedEvent;
use crate::pulse_detector::PulseData;
use crate::slicer::SlicerTiming;
use crate::util::{byte_sum, sign_extend};

const FRAME_BITS: usize = 40;

pub struct Acurite609TxcDecoder;

impl RegisteredDecoder for Acurite609TxcDecoder {
    fn name(&self) -> &str {
        "Acurite-609TXC"
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
            let checksum = byte_sum(&bytes[0..4]);
            if checksum != bytes[4] {
                continue;
            }
            let id = bytes[0];
            let battery_ok = bytes[1] & 0x08 == 0;
            let raw12 = (((bytes[1] as u32) << 4) | ((bytes[2] as u32) >> 4)) & 0x0FFF;
            let temp_c = sign_extend(raw12, 12) as f64 * 0.1;
            let humidity = bytes[3];

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

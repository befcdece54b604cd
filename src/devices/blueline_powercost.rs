//! Blueline PowerCost Monitor TXID sensor (spec §8 scenario 3).
//!
//! OOK-PPM encoded, 4-byte frame: a fixed sync byte `0xFE`, a 16-bit
//! little-endian TXID, and a trailing CRC-8 (poly 0x07, init 0x00) over
//! the TXID bytes. Grounded on the teacher's sync-byte-then-CRC decoders
//! (`protocols/ford_v0.rs`) for the "sync byte then CRC-checked payload"
//! shape, with the PPM timing itself taken from `src/slicer.rs::slice_ppm`.

use crate::bitbuffer::BitBuffer;
use crate::dispatch::{DecodeFailure, DecodeOutcome, LineCode, ModulationFamily, RegisteredDecoder};
use crate::event::DecodedEvent;
use crate::pulse_detector::PulseData;
use crate::slicer::SlicerTiming;
use crate::util::crc8_0x07;

const FRAME_BITS: usize = 32;
const SYNC_BYTE: u8 = 0xFE;

pub struct BluelinePowerCostDecoder;

impl RegisteredDecoder for BluelinePowerCostDecoder {
    fn name(&self) -> &str {
        "Blueline-PowerCost"
    }

    fn modulation(&self) -> ModulationFamily {
        ModulationFamily::Ook
    }

    fn timing(&self) -> SlicerTiming {
        SlicerTiming::new(500, 1_000, 2_000, 8_000)
    }

    fn line_code(&self) -> LineCode {
        LineCode::Ppm
    }

    fn decode(&self, bits: &BitBuffer, _packet: &PulseData) -> DecodeOutcome {
        let mut events = Vec::new();
        for row in bits.rows() {
            if row.len() < FRAME_BITS {
                continue;
            }
            let bytes = row.extract_bytes(0, FRAME_BITS);
            if bytes[0] != SYNC_BYTE {
                continue;
            }
            let crc = crc8_0x07(&bytes[1..3]);
            if crc != bytes[3] {
                continue;
            }
            let txid = u16::from_le_bytes([bytes[1], bytes[2]]);
            events.push(DecodedEvent::new(self.name()).with("txid", txid as i64));
        }
        if events.is_empty() {
            DecodeOutcome::Fail(DecodeFailure::FailSanity)
        } else {
            DecodeOutcome::Success(events)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::test_support::bits_from_bytes;
    use crate::pulse_detector::{BoundaryReason, PacketModulation, MAX_PULSES};

    fn dummy_packet() -> PulseData {
        PulseData {
            num_pulses: 0,
            pulse_us: [0; MAX_PULSES],
            gap_us: [0; MAX_PULSES],
            sample_rate: 250_000,
            start_ago_samples: 0,
            end_ago_samples: 0,
            centerfreq_hz: 433_920_000,
            freq1_hz: 0,
            freq2_hz: 0,
            rssi_db: 0.0,
            snr_db: 0.0,
            noise_db: 0.0,
            ook_fixed_high_level: None,
            fsk_f1_est: 0,
            fsk_f2_est: 0,
            boundary: BoundaryReason::GapLimit,
            modulation: PacketModulation::Ook,
        }
    }

    #[test]
    fn valid_frame_with_correct_sync_and_crc_decodes_txid() {
        let mut payload = vec![SYNC_BYTE, 0x60, 0xB2];
        let crc = crc8_0x07(&payload[1..3]);
        payload.push(crc);
        let decoder = BluelinePowerCostDecoder;
        let bits = bits_from_bytes(&payload);
        let outcome = decoder.decode(&bits, &dummy_packet());
        match outcome {
            DecodeOutcome::Success(events) => {
                assert_eq!(events[0].get("txid"), Some(&crate::event::FieldValue::Int(0xB260)));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn wrong_sync_byte_fails_sanity() {
        let payload = [0x00u8, 0x60, 0xB2, 0xE2];
        let decoder = BluelinePowerCostDecoder;
        let bits = bits_from_bytes(&payload);
        let outcome = decoder.decode(&bits, &dummy_packet());
        assert_eq!(outcome, DecodeOutcome::Fail(DecodeFailure::FailSanity));
    }
}

//! Mueller Hot Rod water-meter transmitter (spec §8 scenario 2).
//!
//! FSK-PCM-encoded: a fixed 3-byte preamble (`FE B1 00`), a 10-byte
//! payload of a 32-bit big-endian cumulative volume and a flag byte, and
//! a trailing CRC-8 (poly 0x07, init 0x00, final XOR 0x55) over the
//! payload's first eight bytes. Grounded on the teacher's
//! `protocols/fiat_v0.rs` fixed-width byte-extraction-plus-checksum shape.

use crate::bitbuffer::BitBuffer;
use crate::dispatch::{DecodeFailure, DecodeOutcome, LineCode, ModulationFamily, RegisteredDecoder};
use crate::event::DecodedEvent;
use crate::pulse_detector::PulseData;
use crate::slicer::SlicerTiming;
use crate::util::crc8_xorout;

const PREAMBLE: [u8; 3] = [0xFE, 0xB1, 0x00];
const PREAMBLE_BITS: usize = 24;
const PAYLOAD_BITS: usize = 80;
const FRAME_BITS: usize = PREAMBLE_BITS + PAYLOAD_BITS;
const CRC_XOR_OUT: u8 = 0x55;

pub struct MuellerHotRodDecoder;

impl RegisteredDecoder for MuellerHotRodDecoder {
    fn name(&self) -> &str {
        "Mueller-HotRod"
    }

    fn modulation(&self) -> ModulationFamily {
        ModulationFamily::Fsk
    }

    fn timing(&self) -> SlicerTiming {
        SlicerTiming::new(26, 52, 1_200, 3_000)
    }

    fn line_code(&self) -> LineCode {
        LineCode::Pcm
    }

    fn decode(&self, bits: &BitBuffer, _packet: &PulseData) -> DecodeOutcome {
        let mut events = Vec::new();
        for row in bits.rows() {
            if row.len() < FRAME_BITS {
                continue;
            }
            let preamble = row.extract_bytes(0, PREAMBLE_BITS);
            if preamble != PREAMBLE {
                continue;
            }
            let bytes = row.extract_bytes(PREAMBLE_BITS, PAYLOAD_BITS);
            let crc = crc8_xorout(&bytes[0..8], 0x07, 0x00, CRC_XOR_OUT);
            if crc != bytes[9] {
                continue;
            }
            let volume_gal = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
            let flag = bytes[5] as i64;

            events.push(
                DecodedEvent::new(self.name())
                    .with("volume_gal", volume_gal as i64)
                    .with("flag", flag),
            );
        }
        if events.is_empty() {
            DecodeOutcome::Fail(DecodeFailure::FailMic)
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
            centerfreq_hz: 912_600_000,
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

    fn payload_with_crc(leader: u8, volume: u32, flag: u8) -> Vec<u8> {
        let mut payload = vec![leader];
        payload.extend_from_slice(&volume.to_be_bytes());
        payload.push(flag);
        payload.extend_from_slice(&[0u8, 0u8]);
        payload.push(0u8);
        let crc = crc8_xorout(&payload[0..8], 0x07, 0x00, CRC_XOR_OUT);
        payload.push(crc);
        payload
    }

    #[test]
    fn valid_frame_decodes_volume_and_flag() {
        let payload = payload_with_crc(0x00, 0x2884_CC2C, 0x09);
        let mut frame = PREAMBLE.to_vec();
        frame.extend_from_slice(&payload);

        let decoder = MuellerHotRodDecoder;
        let bits = bits_from_bytes(&frame);
        let outcome = decoder.decode(&bits, &dummy_packet());
        match outcome {
            DecodeOutcome::Success(events) => {
                let ev = &events[0];
                assert_eq!(ev.get("volume_gal"), Some(&crate::event::FieldValue::Int(0x2884_CC2C)));
                assert_eq!(ev.get("flag"), Some(&crate::event::FieldValue::Int(9)));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn missing_preamble_fails_mic() {
        let payload = payload_with_crc(0x00, 0x2884_CC2C, 0x09);
        let mut frame = vec![0u8, 0u8, 0u8];
        frame.extend_from_slice(&payload);
        let decoder = MuellerHotRodDecoder;
        let bits = bits_from_bytes(&frame);
        let outcome = decoder.decode(&bits, &dummy_packet());
        assert_eq!(outcome, DecodeOutcome::Fail(DecodeFailure::FailMic));
    }

    #[test]
    fn bad_crc_fails_mic() {
        let mut frame = PREAMBLE.to_vec();
        frame.extend_from_slice(&[0u8; 9]);
        frame.push(0xFF); // deliberately wrong trailing byte
        let decoder = MuellerHotRodDecoder;
        let bits = bits_from_bytes(&frame);
        let outcome = decoder.decode(&bits, &dummy_packet());
        assert_eq!(outcome, DecodeOutcome::Fail(DecodeFailure::FailMic));
    }
}

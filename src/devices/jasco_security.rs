//! Jasco/GE security sensor (door/window contact), spec §8 scenario 4.
//!
//! PCM-sliced at the half-symbol rate: a 16-bit literal preamble
//! (`0xFC 0x0C`), then 64 raw half-symbol bits Manchester-decoded down to
//! a 32-bit (4-byte) payload — 16-bit device ID, a status byte, and a
//! trailing XOR checksum over the first three payload bytes. Grounded on
//! `BitRow::manchester_decode` (already exercised by the Manchester
//! slicers) for the half-symbol pairing, and the teacher's
//! sync-then-checksum decoder shape for the rest.

use crate::bitbuffer::{BitBuffer, BitRow};
use crate::dispatch::{DecodeFailure, DecodeOutcome, LineCode, ModulationFamily, RegisteredDecoder};
use crate::event::DecodedEvent;
use crate::pulse_detector::PulseData;
use crate::slicer::SlicerTiming;
use crate::util::xor_sum;

const PREAMBLE: [u8; 2] = [0xFC, 0x0C];
const PREAMBLE_BITS: usize = 16;
const PAYLOAD_HALF_SYMBOL_BITS: usize = 64;
const MIN_ROW_BITS: usize = PREAMBLE_BITS + PAYLOAD_HALF_SYMBOL_BITS;

pub struct JascoSecurityDecoder;

fn sub_row(row: &BitRow, start: usize, len: usize) -> BitRow {
    let mut bb = BitBuffer::new();
    for i in start..start + len {
        bb.add_bit(row.get(i).unwrap_or(false));
    }
    bb.row(0).cloned().unwrap_or_default()
}

impl RegisteredDecoder for JascoSecurityDecoder {
    fn name(&self) -> &str {
        "Jasco-Security"
    }

    fn modulation(&self) -> ModulationFamily {
        ModulationFamily::Ook
    }

    fn timing(&self) -> SlicerTiming {
        // gap_limit_us must clear the preamble's own longest same-level
        // run (0xFC 0x0C has six contiguous zero half-symbols, 1800us at
        // 300us/unit) or slice_pcm would row-break mid-preamble.
        SlicerTiming::new(300, 300, 2_500, 5_000)
    }

    fn line_code(&self) -> LineCode {
        LineCode::Pcm
    }

    fn decode(&self, bits: &BitBuffer, _packet: &PulseData) -> DecodeOutcome {
        let mut events = Vec::new();
        for row in bits.rows() {
            if row.len() < MIN_ROW_BITS {
                continue;
            }
            let preamble = row.extract_bytes(0, PREAMBLE_BITS);
            if preamble != PREAMBLE {
                continue;
            }
            let half_symbols = sub_row(row, PREAMBLE_BITS, PAYLOAD_HALF_SYMBOL_BITS);
            let payload = half_symbols.manchester_decode();
            if payload.len() < 32 {
                continue;
            }
            let bytes = payload.extract_bytes(0, 32);
            let checksum = xor_sum(&bytes[0..3]);
            if checksum != bytes[3] {
                continue;
            }
            let id = u16::from_be_bytes([bytes[0], bytes[1]]);
            let status = if bytes[2] & 0xEF == 0xEF { "closed" } else { "open" };
            events.push(DecodedEvent::new(self.name()).with("id", id as i64).with("status", status));
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
    use crate::pulse_detector::{BoundaryReason, PacketModulation, MAX_PULSES};

    fn dummy_packet() -> PulseData {
        PulseData {
            num_pulses: 0,
            pulse_us: [0; MAX_PULSES],
            gap_us: [0; MAX_PULSES],
            sample_rate: 250_000,
            start_ago_samples: 0,
            end_ago_samples: 0,
            centerfreq_hz: 315_000_000,
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

    fn manchester_encode_byte(byte: u8) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        for k in (0..8).rev() {
            let bit = (byte >> k) & 1 == 1;
            if bit {
                out.extend([1, 0]);
            } else {
                out.extend([0, 1]);
            }
        }
        out
    }

    fn build_frame(payload_bytes: &[u8; 4]) -> BitBuffer {
        let mut bb = BitBuffer::new();
        for &b in &PREAMBLE {
            for k in (0..8).rev() {
                bb.add_bit((b >> k) & 1 == 1);
            }
        }
        for &byte in payload_bytes {
            for bit in manchester_encode_byte(byte) {
                bb.add_bit(bit != 0);
            }
        }
        bb
    }

    #[test]
    fn valid_frame_decodes_id_and_status() {
        let mut payload = [0x12u8, 0x34, 0xEF, 0x00];
        payload[3] = xor_sum(&payload[0..3]);
        let bits = build_frame(&payload);
        let decoder = JascoSecurityDecoder;
        let outcome = decoder.decode(&bits, &dummy_packet());
        match outcome {
            DecodeOutcome::Success(events) => {
                let ev = &events[0];
                assert_eq!(ev.get("id"), Some(&crate::event::FieldValue::Int(0x1234)));
                assert_eq!(ev.get("status"), Some(&crate::event::FieldValue::Str("closed".to_string())));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn open_status_bit_pattern_decodes_to_open() {
        let mut payload = [0x12u8, 0x34, 0x00, 0x00];
        payload[3] = xor_sum(&payload[0..3]);
        let bits = build_frame(&payload);
        let decoder = JascoSecurityDecoder;
        let outcome = decoder.decode(&bits, &dummy_packet());
        match outcome {
            DecodeOutcome::Success(events) => {
                assert_eq!(
                    events[0].get("status"),
                    Some(&crate::event::FieldValue::Str("open".to_string()))
                );
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn missing_preamble_fails_mic() {
        let mut payload = [0x12u8, 0x34, 0xEF, 0x00];
        payload[3] = xor_sum(&payload[0..3]);
        let mut bb = BitBuffer::new();
        for _ in 0..PREAMBLE_BITS {
            bb.add_bit(false);
        }
        for &byte in &payload {
            for bit in manchester_encode_byte(byte) {
                bb.add_bit(bit != 0);
            }
        }
        let decoder = JascoSecurityDecoder;
        let outcome = decoder.decode(&bb, &dummy_packet());
        assert_eq!(outcome, DecodeOutcome::Fail(DecodeFailure::FailMic));
    }

    #[test]
    fn corrupted_checksum_fails_mic() {
        let payload = [0x12u8, 0x34, 0xEF, 0x00];
        let bits = build_frame(&payload);
        let decoder = JascoSecurityDecoder;
        let outcome = decoder.decode(&bits, &dummy_packet());
        assert_eq!(outcome, DecodeOutcome::Fail(DecodeFailure::FailMic));
    }
}

//! Concrete per-device decoders (spec §4.8, §8).
//!
//! Each submodule is one [`crate::dispatch::RegisteredDecoder`] grounded
//! on the teacher's per-protocol module shape (`protocols/ford_v0.rs`,
//! `protocols/fiat_v0.rs`: one file per device, declared timing plus a
//! `decode` that extracts bytes and checks a frame integrity value)
//! generalized away from car keyfobs to the telemetry sensors named in
//! the end-to-end scenarios.

pub mod acurite_592txr;
pub mod acurite_609txc;
pub mod blueline_powercost;
pub mod jasco_security;
pub mod mueller_hot_rod;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::bitbuffer::BitBuffer;

    /// Build a `BitBuffer` with exactly the given MSB-first bits in its
    /// first row. Used by device decoder tests to exercise `decode`
    /// directly against a known byte layout without round-tripping
    /// through a slicer.
    pub(crate) fn bits_from_bytes(bytes: &[u8]) -> BitBuffer {
        let mut bb = BitBuffer::new();
        for &byte in bytes {
            for k in (0..8).rev() {
                bb.add_bit((byte >> k) & 1 == 1);
            }
        }
        bb
    }
}

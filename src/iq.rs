//! IQ sample ingestion (spec §3, §6).
//!
//! The tuner callback contract accepts either unsigned-8 IQ (offset 128,
//! the common RTL-SDR/HackRF wire format) or signed-16 IQ. The core
//! normalizes both to [`num_complex::Complex<i16>`] before anything in
//! [`crate::baseband`] sees it, grounded on the teacher's
//! `radio/rtlsdr.rs::u8_iq_to_i8` conversion and `radio/hackrf.rs`'s
//! `Complex<i8>` sample buffers, generalized to the wider i16 range
//! `AmSample`/`FmSample` computations want.

use num_complex::Complex;

/// One IQ sample, always signed 16-bit internally regardless of wire form.
pub type IqSample = Complex<i16>;

/// Convert a buffer of interleaved unsigned-8 IQ (I, Q, I, Q, ...) with the
/// usual 128 DC offset into normalized [`IqSample`]s. A trailing odd byte
/// (malformed block) is dropped.
pub fn from_u8_offset(buf: &[u8]) -> Vec<IqSample> {
    buf.chunks_exact(2)
        .map(|chunk| {
            let i = (chunk[0] as i16 - 128) * 256;
            let q = (chunk[1] as i16 - 128) * 256;
            Complex::new(i, q)
        })
        .collect()
}

/// Convert a buffer of interleaved signed-16 IQ (little-endian) into
/// [`IqSample`]s directly, no offset removal needed.
pub fn from_i16(buf: &[i16]) -> Vec<IqSample> {
    buf.chunks_exact(2).map(|c| Complex::new(c[0], c[1])).collect()
}

//! Fixed-capacity row-oriented bit container (spec §3, §4.4).
//!
//! Grounded on the teacher's `bitvec` dependency — declared in its
//! `Cargo.toml` but never actually used there. Here it's load-bearing:
//! each row is a [`bitvec::array::BitArray`] over a fixed `[u32; N]`
//! backing store, so `BitBuffer` never heap-allocates, matching the
//! spec's "fixed-size, stack- or struct-resident" hot-path memory rule.

use bitvec::prelude::*;

/// Maximum rows a `BitBuffer` can hold (spec §3).
pub const MAX_ROWS: usize = 50;
/// Maximum bits per row (spec §3).
pub const MAX_BITS: usize = 2560;

const WORDS_PER_ROW: usize = MAX_BITS.div_ceil(32);

type RowStorage = BitArray<[u32; WORDS_PER_ROW], Msb0>;

/// One bit row: up to `MAX_BITS` bits, MSB-first within each backing word.
#[derive(Clone)]
pub struct BitRow {
    bits: RowStorage,
    len: usize,
}

impl Default for BitRow {
    fn default() -> Self {
        Self { bits: RowStorage::ZERO, len: 0 }
    }
}

impl BitRow {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, i: usize) -> Option<bool> {
        if i < self.len {
            Some(self.bits[i])
        } else {
            None
        }
    }

    fn push(&mut self, bit: bool) -> bool {
        if self.len >= MAX_BITS {
            return false;
        }
        self.bits.set(self.len, bit);
        self.len += 1;
        true
    }

    /// Invert every bit in this row (spec §4.4 `invert`).
    pub fn invert(&mut self) {
        for i in 0..self.len {
            let b = self.bits[i];
            self.bits.set(i, !b);
        }
    }

    /// Reflect (reverse bit order within) each byte of this row, matching
    /// the teacher's `keeloq_common::reverse8` generalized to a whole row.
    pub fn reflect_bytes(&mut self) {
        let full_bytes = self.len / 8;
        for byte_idx in 0..full_bytes {
            let base = byte_idx * 8;
            let mut byte = 0u8;
            for k in 0..8 {
                byte = (byte << 1) | (self.bits[base + k] as u8);
            }
            let reflected = crate::util::reflect8(byte);
            for k in 0..8 {
                self.bits.set(base + k, (reflected >> (7 - k)) & 1 == 1);
            }
        }
    }

    /// Extract `n_bits` starting at `start_bit` into a big-endian (MSB
    /// first within each output byte) byte array.
    pub fn extract_bytes(&self, start_bit: usize, n_bits: usize) -> Vec<u8> {
        let n_bytes = n_bits.div_ceil(8);
        let mut out = vec![0u8; n_bytes];
        for i in 0..n_bits {
            let src = start_bit + i;
            if src >= self.len {
                break;
            }
            if self.bits[src] {
                out[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        out
    }

    /// Manchester-decode this row in place: consecutive half-symbol pairs
    /// 01→0, 10→1; any 00/11 pair ends decoding at that point (spec
    /// §4.3/§4.4). Returns the decoded row.
    pub fn manchester_decode(&self) -> BitRow {
        let mut out = BitRow::default();
        let pairs = self.len / 2;
        for p in 0..pairs {
            let hi = self.bits[p * 2];
            let lo = self.bits[p * 2 + 1];
            match (hi, lo) {
                (false, true) => {
                    if !out.push(false) {
                        break;
                    }
                }
                (true, false) => {
                    if !out.push(true) {
                        break;
                    }
                }
                _ => break, // invalid pair (00 or 11): end of row
            }
        }
        out
    }

    /// Differential-Manchester decode: bit value is determined by
    /// presence/absence of a transition at each symbol boundary rather
    /// than the half-symbol polarity itself.
    pub fn differential_manchester_decode(&self) -> BitRow {
        let mut out = BitRow::default();
        let pairs = self.len / 2;
        let mut prev_level = None;
        for p in 0..pairs {
            let hi = self.bits[p * 2];
            let lo = self.bits[p * 2 + 1];
            let transitioned_mid = hi != lo;
            if !transitioned_mid {
                break;
            }
            let bit = match prev_level {
                None => false,
                Some(prev) => prev == hi,
            };
            if !out.push(bit) {
                break;
            }
            prev_level = Some(lo);
        }
        out
    }
}

/// Bounded collection of bit rows produced by a slicer (spec §3, §4.3, §4.4).
#[derive(Clone)]
pub struct BitBuffer {
    rows: Vec<BitRow>,
    /// Set the instant a slicer stops producing because a capacity limit
    /// was hit (spec §4.3 invariant: the last row's bit count stays
    /// exact, no row is partially written beyond its length field).
    pub truncated: bool,
}

impl Default for BitBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl BitBuffer {
    pub fn new() -> Self {
        Self { rows: vec![BitRow::default()], truncated: false }
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.rows.push(BitRow::default());
        self.truncated = false;
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, i: usize) -> Option<&BitRow> {
        self.rows.get(i)
    }

    pub fn rows(&self) -> &[BitRow] {
        &self.rows
    }

    /// Append a bit to the active row (the last row). If the active row
    /// is at capacity, opens a new row automatically when under
    /// `MAX_ROWS`; otherwise marks the buffer truncated and the bit is
    /// dropped (spec §4.4 `add_bit`).
    pub fn add_bit(&mut self, bit: bool) {
        if self.truncated {
            return;
        }
        let active = self.rows.last_mut().expect("BitBuffer always has an active row");
        if active.push(bit) {
            return;
        }
        if !self.add_row() {
            self.truncated = true;
            return;
        }
        let active = self.rows.last_mut().unwrap();
        if !active.push(bit) {
            self.truncated = true;
        }
    }

    /// Close the active row and open a new one, subject to `MAX_ROWS`.
    /// Returns `false` (and marks `truncated`) if capacity is exhausted.
    pub fn add_row(&mut self) -> bool {
        if self.rows.len() >= MAX_ROWS {
            self.truncated = true;
            return false;
        }
        self.rows.push(BitRow::default());
        true
    }

    /// Search for `pattern` (MSB-first bit values) starting at
    /// `from_bit` within `row`. Returns the bit offset of the first
    /// match, or the row's length if no match (spec §4.4 `search`).
    pub fn search(&self, row: usize, pattern: &[bool], from_bit: usize) -> usize {
        let Some(r) = self.rows.get(row) else { return 0 };
        if pattern.is_empty() || pattern.len() > r.len {
            return r.len;
        }
        let last_start = r.len - pattern.len();
        let mut pos = from_bit;
        while pos <= last_start {
            if (0..pattern.len()).all(|k| r.bits[pos + k] == pattern[k]) {
                return pos;
            }
            pos += 1;
        }
        r.len
    }

    pub fn invert(&mut self) {
        for row in &mut self.rows {
            row.invert();
        }
    }

    pub fn reflect_bytes_each_row(&mut self) {
        for row in &mut self.rows {
            row.reflect_bytes();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_bits(bb: &mut BitBuffer, bits: &[u8]) {
        for &b in bits {
            bb.add_bit(b != 0);
        }
    }

    #[test]
    fn rows_fill_in_order_and_bits_per_row_never_exceeds_capacity() {
        let mut bb = BitBuffer::new();
        push_bits(&mut bb, &[1, 0, 1, 1]);
        bb.add_row();
        push_bits(&mut bb, &[0, 0, 1]);
        assert_eq!(bb.num_rows(), 2);
        assert_eq!(bb.row(0).unwrap().len(), 4);
        assert_eq!(bb.row(1).unwrap().len(), 3);
        for r in bb.rows() {
            assert!(r.len() <= MAX_BITS);
        }
        assert!(bb.num_rows() <= MAX_ROWS);
    }

    #[test]
    fn search_finds_pattern_or_returns_row_length() {
        let mut bb = BitBuffer::new();
        push_bits(&mut bb, &[1, 1, 0, 1, 0, 1, 1]);
        let pat = [false, true, false];
        let pos = bb.search(0, &pat, 0);
        assert_eq!(pos, 2);
        let missing = [true, true, true, true];
        assert_eq!(bb.search(0, &missing, 0), bb.row(0).unwrap().len());
    }

    #[test]
    fn extract_bytes_msb_first() {
        let mut bb = BitBuffer::new();
        push_bits(&mut bb, &[1, 0, 1, 0, 1, 0, 1, 0]);
        let bytes = bb.row(0).unwrap().extract_bytes(0, 8);
        assert_eq!(bytes, vec![0b10101010]);
    }

    #[test]
    fn invert_is_involution() {
        let mut bb = BitBuffer::new();
        push_bits(&mut bb, &[1, 0, 1, 1, 0]);
        let before = bb.row(0).unwrap().extract_bytes(0, 5);
        bb.invert();
        bb.invert();
        let after = bb.row(0).unwrap().extract_bytes(0, 5);
        assert_eq!(before, after);
    }

    #[test]
    fn reflect_bytes_is_involution() {
        let mut bb = BitBuffer::new();
        push_bits(&mut bb, &[1, 1, 0, 0, 0, 1, 0, 1]);
        let before = bb.row(0).unwrap().extract_bytes(0, 8);
        bb.reflect_bytes_each_row();
        bb.reflect_bytes_each_row();
        let after = bb.row(0).unwrap().extract_bytes(0, 8);
        assert_eq!(before, after);
    }

    #[test]
    fn manchester_decode_01_10_pairs() {
        let mut bb = BitBuffer::new();
        // 01 -> 0, 10 -> 1, 01 -> 0
        push_bits(&mut bb, &[0, 1, 1, 0, 0, 1]);
        let decoded = bb.row(0).unwrap().manchester_decode();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.get(0), Some(false));
        assert_eq!(decoded.get(1), Some(true));
        assert_eq!(decoded.get(2), Some(false));
    }

    #[test]
    fn manchester_decode_stops_on_invalid_pair() {
        let mut bb = BitBuffer::new();
        push_bits(&mut bb, &[0, 1, 1, 1, 1, 0]); // second pair (1,1) is invalid
        let decoded = bb.row(0).unwrap().manchester_decode();
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn row_overflow_opens_a_new_row_without_partial_writes() {
        let mut bb = BitBuffer::new();
        for _ in 0..MAX_BITS {
            bb.add_bit(true);
        }
        let len_before = bb.row(0).unwrap().len();
        bb.add_bit(true); // triggers a new row, row capacity allows it
        assert_eq!(bb.row(0).unwrap().len(), len_before);
        assert_eq!(bb.num_rows(), 2);
        assert!(!bb.truncated);
    }

    #[test]
    fn bit_overflow_past_max_rows_marks_truncated() {
        let mut bb = BitBuffer::new();
        for _ in 0..MAX_ROWS {
            for _ in 0..MAX_BITS {
                bb.add_bit(true);
            }
        }
        assert_eq!(bb.num_rows(), MAX_ROWS);
        assert!(!bb.truncated);
        bb.add_bit(true); // no room left: new row refused, bit dropped
        assert!(bb.truncated);
        assert_eq!(bb.num_rows(), MAX_ROWS);
    }

    #[test]
    fn row_count_never_exceeds_max_rows() {
        let mut bb = BitBuffer::new();
        for _ in 0..(MAX_ROWS + 5) {
            bb.add_row();
        }
        assert!(bb.num_rows() <= MAX_ROWS);
        assert!(bb.truncated);
    }
}

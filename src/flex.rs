//! Configurable "flex" decoder (spec §4.6): a single [`RegisteredDecoder`]
//! whose timing, line code, and field extraction are all driven by a
//! parsed key/value spec string instead of Rust code, for devices that
//! don't warrant (or haven't yet earned) their own module.
//!
//! Grounded on the teacher's per-protocol decoders (`protocols/ford_v0.rs`,
//! `protocols/fiat_v0.rs`) for the shape of "timing + bit extraction +
//! CRC check", generalized into data instead of code, the way rtl_433's
//! own `-X` flex spec does it — the nearest real-world analogue for this
//! kind of device.

use std::collections::BTreeMap;

use crate::bitbuffer::BitBuffer;
use crate::dispatch::{DecodeFailure, DecodeOutcome, LineCode, ModulationFamily, RegisteredDecoder};
use crate::error::ConfigError;
use crate::event::{DecodedEvent, FieldValue};
use crate::pulse_detector::PulseData;
use crate::slicer::SlicerTiming;

/// One `get=` field extractor: pull `bits` bits starting at bit `offset`
/// out of a row, optionally mapped through a value table (spec §4.6
/// `get=offset:bits:name[:map]`).
#[derive(Debug, Clone)]
pub struct GetField {
    pub offset: usize,
    pub bits: usize,
    pub name: String,
    pub map: Option<BTreeMap<u64, String>>,
}

/// A parsed flex spec (spec §4.6).
#[derive(Debug, Clone)]
pub struct FlexSpec {
    pub name: String,
    pub modulation: ModulationFamily,
    pub line_code: LineCode,
    pub short_us: u32,
    pub long_us: u32,
    pub sync_us: Option<u32>,
    pub gap_us: u32,
    pub reset_us: u32,
    pub tolerance_us: Option<u32>,
    pub min_bits: Option<usize>,
    pub max_bits: Option<usize>,
    pub min_rows: Option<usize>,
    pub max_rows: Option<usize>,
    pub repeats: Option<u32>,
    pub invert: bool,
    pub reflect: bool,
    pub match_bits: Option<Vec<bool>>,
    pub preamble: Option<Vec<bool>>,
    pub unique: bool,
    pub countonly: bool,
    pub decode_uart: bool,
    pub decode_dm: bool,
    pub symbol_zero: Option<Vec<bool>>,
    pub symbol_one: Option<Vec<bool>>,
    pub get: Vec<GetField>,
}

fn parse_u32(v: &str) -> Result<u32, ConfigError> {
    v.parse::<u32>().map_err(|_| ConfigError::FlexSpecParse(format!("not a number: '{v}'")))
}

fn parse_range(v: &str) -> Result<(usize, usize), ConfigError> {
    if let Some((lo, hi)) = v.split_once('-') {
        let lo = lo.parse().map_err(|_| ConfigError::FlexSpecParse(format!("bad range '{v}'")))?;
        let hi = hi.parse().map_err(|_| ConfigError::FlexSpecParse(format!("bad range '{v}'")))?;
        Ok((lo, hi))
    } else {
        let n = v.parse().map_err(|_| ConfigError::FlexSpecParse(format!("bad range '{v}'")))?;
        Ok((n, n))
    }
}

fn parse_modulation(v: &str) -> Result<(ModulationFamily, LineCode), ConfigError> {
    match v {
        "OOK_PCM" => Ok((ModulationFamily::Ook, LineCode::Pcm)),
        "OOK_PPM" => Ok((ModulationFamily::Ook, LineCode::Ppm)),
        "OOK_PWM" => Ok((ModulationFamily::Ook, LineCode::Pwm { zero_is_short: false })),
        "OOK_MC_ZEROBIT" => Ok((ModulationFamily::Ook, LineCode::ManchesterZeroBit)),
        "OOK_DMC" => Ok((ModulationFamily::Ook, LineCode::DifferentialManchester)),
        "OOK_PIWM_RAW" => Ok((ModulationFamily::Ook, LineCode::Piwm { dc_balance: false })),
        "OOK_PIWM_DC" => Ok((ModulationFamily::Ook, LineCode::Piwm { dc_balance: true })),
        "FSK_PCM" => Ok((ModulationFamily::Fsk, LineCode::Pcm)),
        other => Err(ConfigError::FlexSpecParse(format!("unknown modulation '{other}'"))),
    }
}

/// Parse a hex (`0xAA`) or binary (`0b1010`) literal into MSB-first bits.
fn parse_bit_pattern(v: &str) -> Result<Vec<bool>, ConfigError> {
    if let Some(hex) = v.strip_prefix("0x") {
        let mut bits = Vec::new();
        for c in hex.chars() {
            let nibble = c
                .to_digit(16)
                .ok_or_else(|| ConfigError::FlexSpecParse(format!("bad hex pattern '{v}'")))?;
            for k in (0..4).rev() {
                bits.push((nibble >> k) & 1 == 1);
            }
        }
        Ok(bits)
    } else if let Some(bin) = v.strip_prefix("0b") {
        Ok(bin.chars().map(|c| c == '1').collect())
    } else {
        Err(ConfigError::FlexSpecParse(format!("pattern must start with 0x or 0b: '{v}'")))
    }
}

fn parse_map(v: &str) -> Result<BTreeMap<u64, String>, ConfigError> {
    let inner = v
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| ConfigError::FlexSpecParse(format!("bad map '{v}'")))?;
    let mut out = BTreeMap::new();
    for pair in inner.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (k, val) = pair
            .split_once(':')
            .ok_or_else(|| ConfigError::FlexSpecParse(format!("bad map entry '{pair}'")))?;
        let k: u64 = k.parse().map_err(|_| ConfigError::FlexSpecParse(format!("bad map key '{k}'")))?;
        out.insert(k, val.to_string());
    }
    Ok(out)
}

fn parse_get_field(v: &str) -> Result<GetField, ConfigError> {
    let v = v.strip_prefix('@').unwrap_or(v);
    let parts: Vec<&str> = v.splitn(4, ':').collect();
    if parts.len() < 3 {
        return Err(ConfigError::FlexSpecParse(format!("get= needs offset:bits:name, got '{v}'")));
    }
    let offset = parts[0]
        .parse()
        .map_err(|_| ConfigError::FlexSpecParse(format!("bad get offset '{}'", parts[0])))?;
    let bits = parts[1]
        .parse()
        .map_err(|_| ConfigError::FlexSpecParse(format!("bad get bit count '{}'", parts[1])))?;
    let name = parts[2].to_string();
    let map = match parts.get(3) {
        Some(m) => Some(parse_map(m)?),
        None => None,
    };
    Ok(GetField { offset, bits, name, map })
}

/// Parse a comma-separated flex spec string (spec §4.6).
pub fn parse_flex_spec(spec: &str) -> Result<FlexSpec, ConfigError> {
    let mut name = None;
    let mut modulation = None;
    let mut short_us = None;
    let mut long_us = None;
    let mut sync_us = None;
    let mut gap_us = None;
    let mut reset_us = None;
    let mut tolerance_us = None;
    let mut bits_range = None;
    let mut rows_range = None;
    let mut repeats = None;
    let mut invert = false;
    let mut reflect = false;
    let mut match_bits = None;
    let mut preamble = None;
    let mut unique = false;
    let mut countonly = false;
    let mut decode_uart = false;
    let mut decode_dm = false;
    let mut symbol_zero = None;
    let mut symbol_one = None;
    let mut get = Vec::new();

    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some((k, v)) = token.split_once('=') {
            match k {
                "name" | "n" => name = Some(v.to_string()),
                "modulation" | "m" => modulation = Some(parse_modulation(v)?),
                "short" | "s" => short_us = Some(parse_u32(v)?),
                "long" | "l" => long_us = Some(parse_u32(v)?),
                "sync" | "y" => sync_us = Some(parse_u32(v)?),
                "gap" | "g" => gap_us = Some(parse_u32(v)?),
                "reset" | "r" => reset_us = Some(parse_u32(v)?),
                "tolerance" | "t" => tolerance_us = Some(parse_u32(v)?),
                "bits" | "b" => bits_range = Some(parse_range(v)?),
                "rows" => rows_range = Some(parse_range(v)?),
                "repeats" => repeats = Some(parse_u32(v)?),
                "match" => match_bits = Some(parse_bit_pattern(v)?),
                "preamble" => preamble = Some(parse_bit_pattern(v)?),
                "symbol_zero" => symbol_zero = Some(parse_bit_pattern(v)?),
                "symbol_one" => symbol_one = Some(parse_bit_pattern(v)?),
                "get" => get.push(parse_get_field(v)?),
                other => return Err(ConfigError::FlexSpecParse(format!("unknown key '{other}'"))),
            }
        } else {
            match token {
                "invert" => invert = true,
                "reflect" => reflect = true,
                "unique" => unique = true,
                "countonly" => countonly = true,
                "decode_uart" => decode_uart = true,
                "decode_dm" => decode_dm = true,
                other => return Err(ConfigError::FlexSpecParse(format!("unknown flag '{other}'"))),
            }
        }
    }

    let name = name.ok_or_else(|| ConfigError::FlexSpecParse("missing name=".to_string()))?;
    let (modulation, line_code) =
        modulation.ok_or_else(|| ConfigError::FlexSpecParse("missing modulation=".to_string()))?;
    let short_us = short_us.ok_or_else(|| ConfigError::FlexSpecParse("missing short=".to_string()))?;
    let long_us = long_us.unwrap_or(short_us * 2);
    let gap_us = gap_us.unwrap_or(short_us * 4);
    let reset_us = reset_us.unwrap_or(gap_us * 4);

    if short_us == 0 {
        return Err(ConfigError::InconsistentTimings(name, short_us, long_us));
    }
    if line_code_needs_distinct_long(&line_code) && long_us <= short_us {
        return Err(ConfigError::InconsistentTimings(name, short_us, long_us));
    }

    Ok(FlexSpec {
        name,
        modulation,
        line_code,
        short_us,
        long_us,
        sync_us,
        gap_us,
        reset_us,
        tolerance_us,
        min_bits: bits_range.map(|(lo, _)| lo),
        max_bits: bits_range.map(|(_, hi)| hi),
        min_rows: rows_range.map(|(lo, _)| lo),
        max_rows: rows_range.map(|(_, hi)| hi),
        repeats,
        invert,
        reflect,
        match_bits,
        preamble,
        unique,
        countonly,
        decode_uart,
        decode_dm,
        symbol_zero,
        symbol_one,
        get,
    })
}

fn line_code_needs_distinct_long(code: &LineCode) -> bool {
    !matches!(code, LineCode::Pcm)
}

/// Build a fresh row from a bit sequence. `BitRow::push` is private, so
/// any transform that produces a new, shorter row (preamble-strip,
/// UART-frame-strip, symbol-table re-encoding) goes through a throwaway
/// `BitBuffer` instead of constructing a `BitRow` directly.
fn row_from_bits(bits: impl IntoIterator<Item = bool>) -> crate::bitbuffer::BitRow {
    let mut bb = BitBuffer::new();
    for b in bits {
        bb.add_bit(b);
    }
    bb.row(0).cloned().unwrap_or_default()
}

fn find_pattern(row: &crate::bitbuffer::BitRow, pattern: &[bool]) -> Option<usize> {
    if pattern.is_empty() || pattern.len() > row.len() {
        return None;
    }
    (0..=(row.len() - pattern.len())).find(|&start| {
        (0..pattern.len()).all(|k| row.get(start + k) == Some(pattern[k]))
    })
}

fn matches_at(row: &crate::bitbuffer::BitRow, pos: usize, pattern: &[bool]) -> bool {
    if pattern.is_empty() || pos + pattern.len() > row.len() {
        return false;
    }
    (0..pattern.len()).all(|k| row.get(pos + k) == Some(pattern[k]))
}

/// Strip 10-bit UART framing (start=0, 8 data bits, stop=1), keeping only
/// the 8 data bits of each well-formed frame. Stops at the first frame
/// missing its start/stop bits, the same "malformed input ends the row"
/// idiom as `BitRow::manchester_decode`.
fn decode_uart_frames(row: &crate::bitbuffer::BitRow) -> crate::bitbuffer::BitRow {
    let mut out = Vec::new();
    let frames = row.len() / 10;
    for f in 0..frames {
        let base = f * 10;
        let start = row.get(base).unwrap();
        let stop = row.get(base + 9).unwrap();
        if start || !stop {
            break;
        }
        for k in 1..9 {
            out.push(row.get(base + k).unwrap());
        }
    }
    row_from_bits(out)
}

/// Re-encode a variable-length symbol stream into one bit per matched
/// `symbol_zero`/`symbol_one` pattern, greedily scanning forward from bit
/// 0. Stops the instant neither pattern matches at the current position.
fn decode_symbol_table(
    row: &crate::bitbuffer::BitRow,
    zero: &[bool],
    one: &[bool],
) -> crate::bitbuffer::BitRow {
    let mut out = Vec::new();
    let mut pos = 0;
    loop {
        if matches_at(row, pos, zero) {
            out.push(false);
            pos += zero.len();
        } else if matches_at(row, pos, one) {
            out.push(true);
            pos += one.len();
        } else {
            break;
        }
    }
    row_from_bits(out)
}

/// A decoder driven entirely by a [`FlexSpec`] (spec §4.6).
pub struct FlexDecoder {
    spec: FlexSpec,
}

impl FlexDecoder {
    pub fn new(spec: FlexSpec) -> Self {
        Self { spec }
    }

    pub fn from_str(spec: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(parse_flex_spec(spec)?))
    }

    fn extract_fields(&self, row: &crate::bitbuffer::BitRow) -> BTreeMap<String, FieldValue> {
        let mut fields = BTreeMap::new();
        for field in &self.spec.get {
            if field.offset + field.bits > row.len() {
                continue;
            }
            let bytes = row.extract_bytes(field.offset, field.bits);
            let mut value: u64 = 0;
            for b in &bytes {
                value = (value << 8) | *b as u64;
            }
            // extract_bytes pads the last byte's low bits with zero; shift
            // right to drop that padding for field widths not multiple of 8.
            let pad = bytes.len() * 8 - field.bits;
            value >>= pad;
            let rendered = match &field.map {
                Some(map) => map
                    .get(&value)
                    .cloned()
                    .map(FieldValue::Str)
                    .unwrap_or(FieldValue::Int(value as i64)),
                None => FieldValue::Int(value as i64),
            };
            fields.insert(field.name.clone(), rendered);
        }
        fields
    }
}

impl RegisteredDecoder for FlexDecoder {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn modulation(&self) -> ModulationFamily {
        self.spec.modulation
    }

    fn timing(&self) -> SlicerTiming {
        let mut t = SlicerTiming::new(self.spec.short_us, self.spec.long_us, self.spec.gap_us, self.spec.reset_us);
        if let Some(sync) = self.spec.sync_us {
            t = t.with_sync(sync);
        }
        if let Some(tol) = self.spec.tolerance_us {
            t = t.with_tolerance(tol);
        }
        t
    }

    fn line_code(&self) -> LineCode {
        self.spec.line_code
    }

    fn decode(&self, bits: &BitBuffer, _packet: &PulseData) -> DecodeOutcome {
        if bits.num_rows() == 0 || bits.row(0).map(|r| r.is_empty()).unwrap_or(true) {
            return DecodeOutcome::Fail(DecodeFailure::AbortEarly);
        }
        if let Some(min_rows) = self.spec.min_rows {
            if bits.num_rows() < min_rows {
                return DecodeOutcome::Fail(DecodeFailure::AbortEarly);
            }
        }

        let mut matched_rows = 0usize;
        let mut events = Vec::new();

        for row in bits.rows() {
            let mut row = row.clone();
            if self.spec.invert {
                row.invert();
            }
            if self.spec.reflect {
                row.reflect_bytes();
            }

            if let Some(preamble) = &self.spec.preamble {
                match find_pattern(&row, preamble) {
                    Some(pos) => {
                        let rest: Vec<bool> =
                            (pos + preamble.len()..row.len()).map(|i| row.get(i).unwrap()).collect();
                        row = row_from_bits(rest);
                    }
                    None => continue,
                }
            }
            if self.spec.decode_dm {
                row = row.differential_manchester_decode();
            }
            if self.spec.decode_uart {
                row = decode_uart_frames(&row);
            }
            if let (Some(zero), Some(one)) = (&self.spec.symbol_zero, &self.spec.symbol_one) {
                row = decode_symbol_table(&row, zero, one);
            }

            if let Some(min_bits) = self.spec.min_bits {
                if row.len() < min_bits {
                    continue;
                }
            }
            if let Some(max_bits) = self.spec.max_bits {
                if row.len() > max_bits {
                    return DecodeOutcome::Fail(DecodeFailure::AbortLength);
                }
            }

            if let Some(pattern) = &self.spec.match_bits {
                let mut found = false;
                for i in 0..=row.len().saturating_sub(pattern.len()) {
                    if (0..pattern.len()).all(|k| row.get(i + k) == Some(pattern[k])) {
                        found = true;
                        break;
                    }
                }
                if !found {
                    continue;
                }
            }

            matched_rows += 1;
            if !self.spec.countonly {
                let mut event = DecodedEvent::new(self.spec.name.as_str());
                for (k, v) in self.extract_fields(&row) {
                    event.set(k, v);
                }
                events.push(event);
                if self.spec.unique {
                    break;
                }
            }
        }

        if matched_rows == 0 {
            return DecodeOutcome::Fail(DecodeFailure::FailSanity);
        }
        if let Some(repeats) = self.spec.repeats {
            if matched_rows < repeats as usize {
                return DecodeOutcome::Fail(DecodeFailure::FailSanity);
            }
        }

        if self.spec.countonly {
            let event = DecodedEvent::new(self.spec.name.as_str()).with("count", matched_rows as i64);
            return DecodeOutcome::Success(vec![event]);
        }

        DecodeOutcome::Success(events)
    }
}

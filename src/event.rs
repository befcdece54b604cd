//! Decoded event envelope (spec §3 "Decoded event").
//!
//! Grounded on the teacher's `protocols/common.rs::DecodedSignal`, which
//! is a fixed struct of named fields per car-keyfob signal. Generalized
//! here to the polymorphic keyed record the spec calls for, since a
//! dispatcher covering arbitrary ISM devices can't hardcode one struct's
//! fields — each decoder publishes whatever fields make sense for it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One field value in a decoded event. A sub-record or array lets a
/// decoder emit nested structure (e.g. Flex's `get=` extractors producing
/// several named values from one packet) without a second envelope type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Double(f64),
    Str(String),
    Array(Vec<FieldValue>),
    Record(BTreeMap<String, FieldValue>),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

/// A decoded event: the decoder's name plus a keyed bag of fields (spec
/// §3). Field order isn't meaningful, so a `BTreeMap` gives deterministic
/// serialization for test fixtures and logs alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub decoder: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl DecodedEvent {
    pub fn new(decoder: impl Into<String>) -> Self {
        Self { decoder: decoder.into(), fields: BTreeMap::new() }
    }

    /// Builder-style field setter: `event.with("id", 42i64).with("model", "609TXC")`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_fields_of_mixed_type() {
        let ev = DecodedEvent::new("acurite-609txc")
            .with("id", 0x25i64)
            .with("temperature_c", 21.4f64)
            .with("battery_ok", 1i64)
            .with("model", "Acurite-609TXC");
        assert_eq!(ev.decoder, "acurite-609txc");
        assert_eq!(ev.get("id"), Some(&FieldValue::Int(0x25)));
        assert_eq!(ev.get("model"), Some(&FieldValue::Str("Acurite-609TXC".into())));
    }

    #[test]
    fn nested_record_and_array_fields_round_trip_through_json() {
        let mut sub = BTreeMap::new();
        sub.insert("raw".to_string(), FieldValue::Int(7));
        let ev = DecodedEvent::new("flex")
            .with("values", FieldValue::Array(vec![FieldValue::Int(1), FieldValue::Int(2)]))
            .with("extra", FieldValue::Record(sub));
        let json = serde_json::to_string(&ev).unwrap();
        let back: DecodedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn missing_field_returns_none() {
        let ev = DecodedEvent::new("x");
        assert_eq!(ev.get("nope"), None);
    }
}

//! Dynamically-typed values as they travel on the wire.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A decoded value of one of the accepted kinds.
///
/// The set is closed: scalars are integers, floats or strings, and collections are homogeneous
/// lists or string-keyed maps of one scalar kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WireValue {
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    StrList(Vec<String>),
    IntMap(HashMap<String, i64>),
    FloatMap(HashMap<String, f64>),
    StrMap(HashMap<String, String>),
}

/// Names the variant of a [`WireValue`], or the kind a subscriber expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    Str,
    IntList,
    FloatList,
    StrList,
    IntMap,
    FloatMap,
    StrMap,
}

impl WireValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            WireValue::Int(_) => ValueKind::Int,
            WireValue::Float(_) => ValueKind::Float,
            WireValue::Str(_) => ValueKind::Str,
            WireValue::IntList(_) => ValueKind::IntList,
            WireValue::FloatList(_) => ValueKind::FloatList,
            WireValue::StrList(_) => ValueKind::StrList,
            WireValue::IntMap(_) => ValueKind::IntMap,
            WireValue::FloatMap(_) => ValueKind::FloatMap,
            WireValue::StrMap(_) => ValueKind::StrMap,
        }
    }

    /// The first NaN or infinity carried by this value. JSON has no encoding for them.
    pub fn non_finite(&self) -> Option<f64> {
        match self {
            WireValue::Float(v) => Some(*v).filter(|v| !v.is_finite()),
            WireValue::FloatList(items) => items.iter().copied().find(|v| !v.is_finite()),
            WireValue::FloatMap(entries) => entries.values().copied().find(|v| !v.is_finite()),
            _ => None,
        }
    }
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "str",
            ValueKind::IntList => "int_list",
            ValueKind::FloatList => "float_list",
            ValueKind::StrList => "str_list",
            ValueKind::IntMap => "int_map",
            ValueKind::FloatMap => "float_map",
            ValueKind::StrMap => "str_map",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<i64> for WireValue {
    fn from(value: i64) -> Self {
        WireValue::Int(value)
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        WireValue::Float(value)
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        WireValue::Str(value)
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::Str(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_serialization() {
        let json = serde_json::to_value(WireValue::Int(3)).unwrap();
        assert_eq!(json, json!({"kind": "int", "value": 3}));

        let json = serde_json::to_value(WireValue::Float(7.0)).unwrap();
        assert_eq!(json, json!({"kind": "float", "value": 7.0}));
    }

    #[test]
    fn test_float_tag_survives_integral_value() {
        // 7.0 must stay a float even though JSON would print it as an integer-looking number
        let decoded: WireValue =
            serde_json::from_value(json!({"kind": "float", "value": 7})).unwrap();
        assert_eq!(decoded, WireValue::Float(7.0));
    }

    #[test]
    fn test_collection_deserialization() {
        let decoded: WireValue =
            serde_json::from_value(json!({"kind": "str_map", "value": {"a": "x"}})).unwrap();
        let mut expected = HashMap::new();
        expected.insert("a".to_string(), "x".to_string());
        assert_eq!(decoded, WireValue::StrMap(expected));
        assert_eq!(decoded.kind(), ValueKind::StrMap);
    }

    #[test]
    fn test_non_finite_detection() {
        assert_eq!(WireValue::Float(1.5).non_finite(), None);
        assert_eq!(WireValue::Int(3).non_finite(), None);
        assert_eq!(
            WireValue::FloatList(vec![1.0, f64::INFINITY]).non_finite(),
            Some(f64::INFINITY)
        );
        assert!(WireValue::Float(f64::NAN).non_finite().unwrap().is_nan());

        let mut entries = HashMap::new();
        entries.insert("low".to_string(), f64::NEG_INFINITY);
        assert_eq!(
            WireValue::FloatMap(entries).non_finite(),
            Some(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let decoded: Result<WireValue, _> =
            serde_json::from_value(json!({"kind": "bool", "value": true}));
        assert!(decoded.is_err());
    }
}

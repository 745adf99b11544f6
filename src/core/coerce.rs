//! Conversion of decoded values into the kind a subscriber declared.
//!
//! Scalars follow a small rule set (round floats into integers, parse strings, widen integers
//! into floats); lists and maps apply the same rules element by element.

use std::collections::HashMap;

use crate::core::value::{ValueKind, WireValue};
use crate::error::CoercionError;

/// A statically-typed value that can be sent and received on the wire.
///
/// `Default` supplies the value a subscriber receives when coercion fails.
pub trait WireType: Sized + Default + Send + 'static {
    /// Kind this type expects on the wire
    const KIND: ValueKind;

    /// Convert a decoded value, applying the coercion rules.
    fn from_wire(value: WireValue) -> Result<Self, CoercionError>;

    /// Wrap this value for sending.
    fn into_wire(self) -> WireValue;
}

/// Coerce `value` into `T`, falling back to `T::default()` with a warning.
///
/// Conversion failure never aborts delivery; the subscriber still gets a value.
pub fn coerce_or_default<T: WireType>(address: &str, value: WireValue) -> T {
    match T::from_wire(value) {
        Ok(converted) => converted,
        Err(e) => {
            log::warn!(
                "Delivering default {} to subscriber of {:?}: {}",
                T::KIND,
                address,
                e
            );
            T::default()
        }
    }
}

/// One element of a decoded value, independent of its container.
enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
}

/// A decoded value split into its container shape.
enum Shape {
    One(Scalar),
    List(Vec<Scalar>),
    Map(HashMap<String, Scalar>),
}

fn shape(value: WireValue) -> Shape {
    fn map<V>(m: HashMap<String, V>, f: fn(V) -> Scalar) -> Shape {
        Shape::Map(m.into_iter().map(|(k, v)| (k, f(v))).collect())
    }

    match value {
        WireValue::Int(v) => Shape::One(Scalar::Int(v)),
        WireValue::Float(v) => Shape::One(Scalar::Float(v)),
        WireValue::Str(v) => Shape::One(Scalar::Str(v)),
        WireValue::IntList(v) => Shape::List(v.into_iter().map(Scalar::Int).collect()),
        WireValue::FloatList(v) => Shape::List(v.into_iter().map(Scalar::Float).collect()),
        WireValue::StrList(v) => Shape::List(v.into_iter().map(Scalar::Str).collect()),
        WireValue::IntMap(m) => map(m, Scalar::Int),
        WireValue::FloatMap(m) => map(m, Scalar::Float),
        WireValue::StrMap(m) => map(m, Scalar::Str),
    }
}

fn scalar_kind(scalar: &Scalar) -> ValueKind {
    match scalar {
        Scalar::Int(_) => ValueKind::Int,
        Scalar::Float(_) => ValueKind::Float,
        Scalar::Str(_) => ValueKind::Str,
    }
}

/// Scalar types usable directly and as list or map elements.
trait ScalarType: Sized {
    const KIND: ValueKind;

    fn from_scalar(scalar: Scalar) -> Result<Self, CoercionError>;
}

impl ScalarType for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn from_scalar(scalar: Scalar) -> Result<Self, CoercionError> {
        match scalar {
            Scalar::Int(v) => Ok(v),
            Scalar::Float(v) if !v.is_finite() => Err(CoercionError::NonFinite(v)),
            Scalar::Float(v) => {
                // f64::round rounds half away from zero
                let rounded = v.round();
                // i64::MIN is exactly representable, i64::MAX rounds up to 2^63
                if rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
                    return Err(CoercionError::OutOfRange(v));
                }
                Ok(rounded as i64)
            }
            Scalar::Str(s) => s.parse::<i64>().map_err(|_| CoercionError::Parse {
                input: s,
                to: ValueKind::Int,
            }),
        }
    }
}

impl ScalarType for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_scalar(scalar: Scalar) -> Result<Self, CoercionError> {
        match scalar {
            Scalar::Int(v) => Ok(v as f64),
            Scalar::Float(v) => Ok(v),
            Scalar::Str(s) => s.parse::<f64>().map_err(|_| CoercionError::Parse {
                input: s,
                to: ValueKind::Float,
            }),
        }
    }
}

impl ScalarType for String {
    const KIND: ValueKind = ValueKind::Str;

    fn from_scalar(scalar: Scalar) -> Result<Self, CoercionError> {
        match scalar {
            Scalar::Str(s) => Ok(s),
            other => Err(CoercionError::Mismatch {
                from: scalar_kind(&other),
                to: ValueKind::Str,
            }),
        }
    }
}

fn mismatch(value: &WireValue, to: ValueKind) -> CoercionError {
    CoercionError::Mismatch {
        from: value.kind(),
        to,
    }
}

fn from_one<T: ScalarType>(value: WireValue) -> Result<T, CoercionError> {
    let kind = value.kind();
    match shape(value) {
        Shape::One(scalar) => T::from_scalar(scalar),
        _ => Err(CoercionError::Mismatch { from: kind, to: T::KIND }),
    }
}

fn from_list<T: ScalarType>(value: WireValue, to: ValueKind) -> Result<Vec<T>, CoercionError> {
    let err = mismatch(&value, to);
    match shape(value) {
        Shape::List(items) => items.into_iter().map(T::from_scalar).collect(),
        _ => Err(err),
    }
}

fn from_map<T: ScalarType>(
    value: WireValue,
    to: ValueKind,
) -> Result<HashMap<String, T>, CoercionError> {
    let err = mismatch(&value, to);
    match shape(value) {
        Shape::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| T::from_scalar(v).map(|v| (k, v)))
            .collect(),
        _ => Err(err),
    }
}

macro_rules! wire_type {
    ($ty:ty, $kind:ident, $variant:ident, $convert:ident) => {
        impl WireType for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn from_wire(value: WireValue) -> Result<Self, CoercionError> {
                match value {
                    WireValue::$variant(v) => Ok(v),
                    other => $convert(other, ValueKind::$kind),
                }
            }

            fn into_wire(self) -> WireValue {
                WireValue::$variant(self)
            }
        }
    };
}

fn scalar_convert<T: ScalarType>(value: WireValue, _to: ValueKind) -> Result<T, CoercionError> {
    from_one(value)
}

wire_type!(i64, Int, Int, scalar_convert);
wire_type!(f64, Float, Float, scalar_convert);
wire_type!(String, Str, Str, scalar_convert);
wire_type!(Vec<i64>, IntList, IntList, from_list);
wire_type!(Vec<f64>, FloatList, FloatList, from_list);
wire_type!(Vec<String>, StrList, StrList, from_list);
wire_type!(HashMap<String, i64>, IntMap, IntMap, from_map);
wire_type!(HashMap<String, f64>, FloatMap, FloatMap, from_map);
wire_type!(HashMap<String, String>, StrMap, StrMap, from_map);

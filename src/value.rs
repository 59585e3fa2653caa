//! Numeric values carried by rows and data points.

use std::fmt;

use ordered_float::OrderedFloat;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// A single numeric sample.
///
/// The service returns plain JSON numbers. Integers are kept as integers so
/// that counts survive a round trip without turning into floats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// Signed 64-bit integer.
    Long(i64),

    /// Unsigned 64-bit integer too large for `i64`.
    UnsignedLong(u64),

    /// 64-bit floating point value.
    Double(OrderedFloat<f64>),
}

impl Value {
    /// Returns the value as a f64, converting integers.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Long(i) => *i as f64,
            Value::UnsignedLong(u) => *u as f64,
            Value::Double(f) => f.into_inner(),
        }
    }

    /// Returns the value as an i64 if it is a `Long` variant.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a u64 if it is an `UnsignedLong` variant.
    pub fn as_unsigned_long(&self) -> Option<u64> {
        match self {
            Value::UnsignedLong(u) => Some(*u),
            _ => None,
        }
    }

    /// Returns the value as a f64 if it is a `Double` variant.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(f.into_inner()),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(OrderedFloat::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Long(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Value::Long(i),
            Err(_) => Value::UnsignedLong(v),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Long(i) => write!(f, "{}", i),
            Value::UnsignedLong(u) => write!(f, "{}", u),
            Value::Double(d) => write!(f, "{}", d),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Long(i) => serializer.serialize_i64(*i),
            Value::UnsignedLong(u) => serializer.serialize_u64(*u),
            Value::Double(d) => serializer.serialize_f64(d.into_inner()),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON number")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Long(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::from(v))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_f64() {
        assert_eq!(Value::Long(42).as_f64(), 42.0);
        assert_eq!(Value::UnsignedLong(7).as_f64(), 7.0);
        assert_eq!(Value::from(2.5).as_f64(), 2.5);
    }

    #[test]
    fn test_typed_accessors() {
        assert_eq!(Value::Long(-3).as_long(), Some(-3));
        assert_eq!(Value::from(1.0).as_long(), None);

        assert_eq!(Value::UnsignedLong(u64::MAX).as_unsigned_long(), Some(u64::MAX));
        assert_eq!(Value::Long(1).as_unsigned_long(), None);

        assert_eq!(Value::from(1.5).as_double(), Some(1.5));
        assert_eq!(Value::Long(1).as_double(), None);
    }

    #[test]
    fn test_from_u64_prefers_long() {
        assert_eq!(Value::from(5u64), Value::Long(5));
        assert_eq!(Value::from(u64::MAX), Value::UnsignedLong(u64::MAX));
    }

    #[test]
    fn test_deserialize_numbers() {
        let v: Value = serde_json::from_str("12").unwrap();
        assert_eq!(v, Value::Long(12));

        let v: Value = serde_json::from_str("-12").unwrap();
        assert_eq!(v, Value::Long(-12));

        let v: Value = serde_json::from_str("1.677").unwrap();
        assert_eq!(v, Value::from(1.677));

        let v: Value = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(v, Value::UnsignedLong(u64::MAX));
    }

    #[test]
    fn test_deserialize_rejects_non_numbers() {
        assert!(serde_json::from_str::<Value>("\"1.0\"").is_err());
        assert!(serde_json::from_str::<Value>("null").is_err());
    }

    #[test]
    fn test_serialize() {
        assert_eq!(serde_json::to_string(&Value::Long(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&Value::from(1.5)).unwrap(), "1.5");
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Long(42).to_string(), "42");
        assert_eq!(Value::UnsignedLong(u64::MAX).to_string(), "18446744073709551615");
        assert!(Value::from(1.23456).to_string().starts_with("1.23"));
    }
}

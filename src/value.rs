//! Session values and their wire encoding
//!
//! A session record is one JSON object mapping keys to values. Scalars are
//! decoded back to native values on read. Objects and arrays are kept as the
//! raw JSON fragment they were stored as, byte for byte.

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fmt;

use crate::error::SessionError;

/// Key/value map held by a session
pub type SessionValues = HashMap<String, SessionValue>;

/// A single value stored in a session
#[derive(Debug, Clone)]
pub enum SessionValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Object or array set in-process
    Structured(Value),
    /// Object or array read back from the backend, kept as its raw JSON text
    Fragment(Box<RawValue>),
}

impl SessionValue {
    /// Build a value from anything serializable
    pub fn from_serialize<T: Serialize>(value: T) -> Result<Self, SessionError> {
        Ok(serde_json::to_value(value)?.into())
    }

    /// Build a fragment from raw JSON text, which must be a JSON object or array
    pub fn fragment<S: Into<String>>(json: S) -> Result<Self, SessionError> {
        let json = json.into();
        if !matches!(json.as_bytes().first(), Some(b'{') | Some(b'[')) {
            return Err(SessionError::SerializationError(format!(
                "fragment must be a JSON object or array: {}",
                json
            )));
        }
        Ok(SessionValue::Fragment(RawValue::from_string(json)?))
    }

    /// Whether this is an object or array, in either representation
    pub fn is_structured(&self) -> bool {
        matches!(self, SessionValue::Structured(_) | SessionValue::Fragment(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SessionValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SessionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SessionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SessionValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SessionValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Raw JSON text of a fragment
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            SessionValue::Fragment(raw) => Some(raw.get()),
            _ => None,
        }
    }

    /// Convert into a generic JSON value, parsing fragments
    pub fn to_value(&self) -> Result<Value, SessionError> {
        Ok(match self {
            SessionValue::Null => Value::Null,
            SessionValue::Bool(b) => Value::Bool(*b),
            SessionValue::Number(n) => Value::Number(n.clone()),
            SessionValue::String(s) => Value::String(s.clone()),
            SessionValue::Structured(v) => v.clone(),
            SessionValue::Fragment(raw) => serde_json::from_str(raw.get())?,
        })
    }

    /// Deserialize into a concrete type
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, SessionError> {
        match self {
            SessionValue::Fragment(raw) => Ok(serde_json::from_str(raw.get())?),
            other => Ok(serde_json::from_value(other.to_value()?)?),
        }
    }
}

impl PartialEq for SessionValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SessionValue::Null, SessionValue::Null) => true,
            (SessionValue::Bool(a), SessionValue::Bool(b)) => a == b,
            (SessionValue::Number(a), SessionValue::Number(b)) => a == b,
            (SessionValue::String(a), SessionValue::String(b)) => a == b,
            (SessionValue::Structured(a), SessionValue::Structured(b)) => a == b,
            (SessionValue::Fragment(a), SessionValue::Fragment(b)) => a.get() == b.get(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionValue::Null => f.write_str("null"),
            SessionValue::Bool(b) => write!(f, "{}", b),
            SessionValue::Number(n) => write!(f, "{}", n),
            SessionValue::String(s) => f.write_str(s),
            SessionValue::Structured(v) => write!(f, "{}", v),
            SessionValue::Fragment(raw) => f.write_str(raw.get()),
        }
    }
}

impl Serialize for SessionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SessionValue::Null => serializer.serialize_unit(),
            SessionValue::Bool(b) => serializer.serialize_bool(*b),
            SessionValue::Number(n) => n.serialize(serializer),
            SessionValue::String(s) => serializer.serialize_str(s),
            SessionValue::Structured(v) => v.serialize(serializer),
            SessionValue::Fragment(raw) => raw.serialize(serializer),
        }
    }
}

impl From<Value> for SessionValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SessionValue::Null,
            Value::Bool(b) => SessionValue::Bool(b),
            Value::Number(n) => SessionValue::Number(n),
            Value::String(s) => SessionValue::String(s),
            structured @ (Value::Array(_) | Value::Object(_)) => {
                SessionValue::Structured(structured)
            }
        }
    }
}

impl From<Box<RawValue>> for SessionValue {
    fn from(raw: Box<RawValue>) -> Self {
        SessionValue::Fragment(raw)
    }
}

impl From<&str> for SessionValue {
    fn from(s: &str) -> Self {
        SessionValue::String(s.to_string())
    }
}

impl From<String> for SessionValue {
    fn from(s: String) -> Self {
        SessionValue::String(s)
    }
}

impl From<bool> for SessionValue {
    fn from(b: bool) -> Self {
        SessionValue::Bool(b)
    }
}

impl From<i64> for SessionValue {
    fn from(n: i64) -> Self {
        SessionValue::Number(n.into())
    }
}

impl From<u64> for SessionValue {
    fn from(n: u64) -> Self {
        SessionValue::Number(n.into())
    }
}

impl From<i32> for SessionValue {
    fn from(n: i32) -> Self {
        SessionValue::Number(n.into())
    }
}

impl From<f64> for SessionValue {
    /// Non-finite floats have no JSON form and become `Null`
    fn from(n: f64) -> Self {
        Number::from_f64(n)
            .map(SessionValue::Number)
            .unwrap_or(SessionValue::Null)
    }
}

/// Encode a whole session map into one JSON blob
pub fn encode_values(values: &SessionValues) -> Result<String, SessionError> {
    Ok(serde_json::to_string(values)?)
}

/// Decode a session blob.
///
/// An empty blob, or one that is not a JSON object, yields an empty map. A
/// value starting with `{` or `[` is kept as a raw fragment; anything else is
/// decoded to a scalar, falling back to `Null` if that fails.
pub fn decode_values(blob: &str) -> SessionValues {
    if blob.is_empty() {
        return SessionValues::new();
    }

    let raw: HashMap<String, Box<RawValue>> = match serde_json::from_str(blob) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!("Failed to decode session record: {}", e);
            return SessionValues::new();
        }
    };

    raw.into_iter()
        .map(|(key, raw)| {
            let value = decode_value(&key, raw);
            (key, value)
        })
        .collect()
}

fn decode_value(key: &str, raw: Box<RawValue>) -> SessionValue {
    match raw.get().as_bytes().first() {
        Some(b'{') | Some(b'[') => SessionValue::Fragment(raw),
        _ => match serde_json::from_str::<Value>(raw.get()) {
            Ok(value) => value.into(),
            Err(e) => {
                tracing::error!("Failed to decode session value {:?}: {}", key, e);
                SessionValue::Null
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_decode_to_native_values() {
        let mut values = SessionValues::new();
        values.insert("name".into(), "alice".into());
        values.insert("age".into(), 42i64.into());
        values.insert("ratio".into(), 0.5f64.into());
        values.insert("admin".into(), true.into());
        values.insert("nothing".into(), SessionValue::Null);

        let decoded = decode_values(&encode_values(&values).unwrap());
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_structured_values_come_back_as_fragments() {
        let mut values = SessionValues::new();
        values.insert("cart".into(), json!({"items": [1, 2]}).into());
        values.insert("tags".into(), json!(["a", "b"]).into());

        let decoded = decode_values(&encode_values(&values).unwrap());
        assert_eq!(decoded["cart"].as_raw(), Some(r#"{"items":[1,2]}"#));
        assert_eq!(decoded["tags"].as_raw(), Some(r#"["a","b"]"#));
        assert_eq!(decoded["cart"].to_value().unwrap(), json!({"items": [1, 2]}));
    }

    #[test]
    fn test_fragments_are_preserved_byte_for_byte() {
        let blob = r#"{"prefs": {"b": 2,  "a": 1}}"#;
        let decoded = decode_values(blob);
        assert_eq!(decoded["prefs"].as_raw(), Some(r#"{"b": 2,  "a": 1}"#));

        let reencoded = encode_values(&decoded).unwrap();
        assert_eq!(reencoded, r#"{"prefs":{"b": 2,  "a": 1}}"#);
    }

    #[test]
    fn test_empty_and_invalid_blobs() {
        assert!(decode_values("").is_empty());
        assert!(decode_values("not json").is_empty());
        assert!(decode_values("[1,2,3]").is_empty());
    }

    #[test]
    fn test_non_finite_float_is_null() {
        assert!(SessionValue::from(f64::NAN).is_null());
    }

    #[test]
    fn test_failed_key_defaults_to_null_without_dropping_others() {
        // 1e400 is valid JSON but overflows f64
        let decoded = decode_values(r#"{"a":1e400,"b":2,"c":[1, 2]}"#);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded["a"], SessionValue::Null);
        assert_eq!(decoded["b"].as_i64(), Some(2));
        assert_eq!(decoded["c"].as_raw(), Some("[1, 2]"));
        assert!(decoded["c"].is_structured());
    }

    #[test]
    fn test_scalar_accessors() {
        let name = SessionValue::from("alice");
        assert_eq!(name.as_str(), Some("alice"));
        assert_eq!(name.as_f64(), None);
        assert!(!name.is_structured());

        let ratio = SessionValue::from(0.25f64);
        assert_eq!(ratio.as_f64(), Some(0.25));
        assert_eq!(ratio.as_str(), None);

        assert!(SessionValue::from(serde_json::json!({"k": 1})).is_structured());
    }

    #[test]
    fn test_fragment_rejects_scalars() {
        assert!(matches!(
            SessionValue::fragment("5"),
            Err(SessionError::SerializationError(_))
        ));
        assert!(SessionValue::fragment(r#""text""#).is_err());
        assert!(SessionValue::fragment("").is_err());
        assert!(SessionValue::fragment("[1,").is_err());
        assert!(SessionValue::fragment("[]").unwrap().is_structured());
    }

    #[test]
    fn test_typed_deserialize() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Cart {
            items: Vec<u32>,
        }

        let fragment = SessionValue::fragment(r#"{"items":[3,4]}"#).unwrap();
        assert_eq!(fragment.deserialize::<Cart>().unwrap(), Cart { items: vec![3, 4] });

        let count = SessionValue::from(7i64);
        assert_eq!(count.deserialize::<u32>().unwrap(), 7);
        assert!(count.deserialize::<String>().is_err());
    }
}

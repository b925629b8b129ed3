//! Remote field values.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Command number of the ERP's "replace all links" many-to-many directive.
pub const LINK_SET_COMMAND: i64 = 6;

/// Field values sent with a create or update call, keyed by remote field.
pub type Payload = BTreeMap<String, Value>;

/// A value as exchanged with the ERP.
///
/// The RPC layer has no null; [`Value::normalize`] turns empty data into
/// `false`, which the ERP reads as "unset".
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null (only ever produced when decoding a response).
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (ids, quantities).
    Int(i64),
    /// Floating point number (amounts, weights).
    Float(f64),
    /// Text.
    Text(String),
    /// Plain list of values.
    List(Vec<Value>),
    /// "Set links" directive for many-to-many fields.
    ///
    /// Serialized as `[[6, 0, [items...]]]`.
    LinkSet(Vec<Value>),
    /// Nested record (read results, voucher lines).
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns true for null, the empty string and the empty list.
    pub fn is_empty_equivalent(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::List(items) | Value::LinkSet(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Converts a value into the shape the ERP accepts.
    ///
    /// Empty-equivalent values become `false`; non-empty lists become a
    /// link-set directive. Everything else is returned unchanged.
    #[must_use]
    pub fn normalize(self) -> Value {
        if self.is_empty_equivalent() {
            return Value::Bool(false);
        }
        match self {
            Value::List(items) => Value::LinkSet(items),
            other => other,
        }
    }

    /// Returns true if this is `Bool(false)`.
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get this value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::List(items) => items.serialize(serializer),
            Value::LinkSet(items) => {
                let mut outer = serializer.serialize_seq(Some(1))?;
                outer.serialize_element(&LinkCommand(items))?;
                outer.end()
            }
            Value::Map(map) => map.serialize(serializer),
        }
    }
}

struct LinkCommand<'a>(&'a [Value]);

impl Serialize for LinkCommand<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&LINK_SET_COMMAND)?;
        seq.serialize_element(&0i64)?;
        seq.serialize_element(self.0)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a remote field value")
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Int(n))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<Value, E> {
        i64::try_from(n)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {n} out of range")))
    }

    fn visit_f64<E>(self, f: f64) -> Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E>(self, s: &str) -> Result<Value, E> {
        Ok(Value::Text(s.to_string()))
    }

    fn visit_string<E>(self, s: String) -> Result<Value, E> {
        Ok(Value::Text(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = BTreeMap::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_values_normalize_to_false() {
        assert_eq!(Value::Null.normalize(), Value::Bool(false));
        assert_eq!(Value::from("").normalize(), Value::Bool(false));
        assert_eq!(Value::List(vec![]).normalize(), Value::Bool(false));
    }

    #[test]
    fn scalars_survive_normalization() {
        assert_eq!(Value::Int(0).normalize(), Value::Int(0));
        assert_eq!(Value::Bool(true).normalize(), Value::Bool(true));
        assert_eq!(Value::from("x").normalize(), Value::from("x"));
    }

    #[test]
    fn link_set_uses_replace_command() {
        let value = Value::List(vec![Value::Int(1), Value::Int(5)]).normalize();
        assert_eq!(serde_json::to_value(&value).unwrap(), json!([[6, 0, [1, 5]]]));
    }

    #[test]
    fn decodes_read_results() {
        let value: Value = serde_json::from_value(json!({
            "invoice_ids": [4, 9],
            "state": "manual",
            "partner_id": false,
            "note": null,
            "amount_total": 12.5
        }))
        .unwrap();

        let map = value.as_map().unwrap();
        assert_eq!(
            map["invoice_ids"].as_list().unwrap(),
            &[Value::Int(4), Value::Int(9)]
        );
        assert_eq!(map["state"].as_text(), Some("manual"));
        assert!(map["partner_id"].is_false());
        assert_eq!(map["note"], Value::Null);
        assert_eq!(map["amount_total"].as_f64(), Some(12.5));
    }

    #[test]
    fn integers_widen_to_floats() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::from("3").as_f64(), None);
    }
}

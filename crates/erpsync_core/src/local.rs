//! Snapshots of local objects and attribute path evaluation.
//!
//! The host hands the engine a [`Record`] per object: its kind, id and
//! attributes, with related objects embedded as nested records. Mapping
//! rules read from records through [`AttrPath`]s such as
//! `contact.billing_address.id`. Evaluation is a plain walk over nested
//! records; nothing is executed.

use crate::error::MappingError;
use crate::types::{LocalKey, ObjectId};
use erpsync_codec::Value;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// An attribute value of a local object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalValue {
    /// Absent / null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer (also foreign keys).
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Many-valued attribute.
    List(Vec<LocalValue>),
    /// An embedded related object.
    Record(Box<Record>),
}

impl LocalValue {
    /// Returns the id this value refers to, if it is a reference.
    ///
    /// Integers are taken as ids; embedded records contribute their own id.
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            LocalValue::Int(n) => ObjectId::try_from(*n).ok(),
            LocalValue::Record(r) => Some(r.id),
            _ => None,
        }
    }

    /// Returns the lookup-table key for this value.
    pub fn lookup_key(&self) -> Option<String> {
        match self {
            LocalValue::Null => Some(String::new()),
            LocalValue::Bool(b) => Some(b.to_string()),
            LocalValue::Int(n) => Some(n.to_string()),
            LocalValue::Float(f) => Some(f.to_string()),
            LocalValue::Text(s) => Some(s.clone()),
            LocalValue::List(_) | LocalValue::Record(_) => None,
        }
    }

    /// Converts to the equivalent remote value.
    ///
    /// Embedded records are represented by their id, or `false` when the id
    /// does not fit a remote integer.
    pub fn to_remote(&self) -> Value {
        match self {
            LocalValue::Null => Value::Null,
            LocalValue::Bool(b) => Value::Bool(*b),
            LocalValue::Int(n) => Value::Int(*n),
            LocalValue::Float(f) => Value::Float(*f),
            LocalValue::Text(s) => Value::Text(s.clone()),
            LocalValue::List(items) => Value::List(items.iter().map(Self::to_remote).collect()),
            LocalValue::Record(r) => i64::try_from(r.id).map_or(Value::Bool(false), Value::Int),
        }
    }
}

impl From<bool> for LocalValue {
    fn from(b: bool) -> Self {
        LocalValue::Bool(b)
    }
}

impl From<i64> for LocalValue {
    fn from(n: i64) -> Self {
        LocalValue::Int(n)
    }
}

impl From<f64> for LocalValue {
    fn from(f: f64) -> Self {
        LocalValue::Float(f)
    }
}

impl From<&str> for LocalValue {
    fn from(s: &str) -> Self {
        LocalValue::Text(s.to_string())
    }
}

impl From<String> for LocalValue {
    fn from(s: String) -> Self {
        LocalValue::Text(s)
    }
}

impl From<Record> for LocalValue {
    fn from(r: Record) -> Self {
        LocalValue::Record(Box::new(r))
    }
}

impl From<Vec<LocalValue>> for LocalValue {
    fn from(items: Vec<LocalValue>) -> Self {
        LocalValue::List(items)
    }
}

impl<T: Into<LocalValue>> From<Option<T>> for LocalValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(LocalValue::Null, Into::into)
    }
}

/// A snapshot of one local object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Local entity kind.
    pub kind: String,
    /// Local object id.
    pub id: ObjectId,
    /// Attribute values.
    #[serde(default)]
    pub attrs: BTreeMap<String, LocalValue>,
}

impl Record {
    /// Creates a record with no attributes.
    pub fn new(kind: impl Into<String>, id: ObjectId) -> Self {
        Self {
            kind: kind.into(),
            id,
            attrs: BTreeMap::new(),
        }
    }

    /// Adds an attribute (builder style).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<LocalValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Sets an attribute.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<LocalValue>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Returns the key identifying this object.
    pub fn key(&self) -> LocalKey {
        LocalKey::new(self.kind.clone(), self.id)
    }

    /// Reads a single attribute. `id` falls back to the record's id.
    pub fn get(&self, name: &str) -> Option<LocalValue> {
        match self.attrs.get(name) {
            Some(value) => Some(value.clone()),
            None if name == "id" => i64::try_from(self.id).ok().map(LocalValue::Int),
            None => None,
        }
    }

    /// Evaluates a dotted attribute path against this record.
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] if a segment is missing, or an intermediate
    /// segment is null or not a record.
    pub fn resolve(&self, path: &AttrPath) -> Result<LocalValue, PathError> {
        let mut current = self;
        let (last, intermediate) = path
            .segments
            .split_last()
            .ok_or_else(|| PathError::Missing(String::new()))?;

        for segment in intermediate {
            match current.attrs.get(segment) {
                Some(LocalValue::Record(next)) => current = next,
                Some(LocalValue::Null) => return Err(PathError::NullIntermediate(segment.clone())),
                Some(_) => return Err(PathError::NotARecord(segment.clone())),
                None => return Err(PathError::Missing(segment.clone())),
            }
        }

        current
            .get(last)
            .ok_or_else(|| PathError::Missing(last.clone()))
    }
}

/// Why an attribute path could not be evaluated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    /// The attribute does not exist.
    #[error("attribute '{0}' is missing")]
    Missing(String),
    /// An intermediate attribute is null.
    #[error("attribute '{0}' is null")]
    NullIntermediate(String),
    /// An intermediate attribute is not a related object.
    #[error("attribute '{0}' is not a related object")]
    NotARecord(String),
}

/// A validated dotted attribute path, e.g. `contact.primary_phone.phone`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttrPath {
    segments: Vec<String>,
}

impl AttrPath {
    /// Parses a dotted path.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::InvalidPath`] if the path is empty or a
    /// segment is not an identifier.
    pub fn parse(text: &str) -> Result<Self, MappingError> {
        let invalid = |reason: &str| MappingError::InvalidPath {
            path: text.to_string(),
            reason: reason.to_string(),
        };

        if text.is_empty() {
            return Err(invalid("path is empty"));
        }

        let segments: Vec<String> = text.split('.').map(str::to_string).collect();
        for segment in &segments {
            let mut chars = segment.chars();
            match chars.next() {
                None => return Err(invalid("empty segment")),
                Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
                    return Err(invalid("segments must start with a letter or '_'"))
                }
                _ => {}
            }
            if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid("segments may only contain letters, digits and '_'"));
            }
        }

        Ok(Self { segments })
    }

    /// Returns the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl TryFrom<String> for AttrPath {
    type Error = MappingError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<AttrPath> for String {
    fn from(path: AttrPath) -> Self {
        path.to_string()
    }
}

/// Loads local objects for backlog replay.
///
/// The host implements this over its own persistence; a mapper whose object
/// cannot be loaded any more cannot be replayed.
pub trait LocalSource: Send + Sync {
    /// Loads the current snapshot of an object.
    fn load(&self, kind: &str, id: ObjectId) -> Option<Record>;
}

/// An in-memory local source for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySource {
    records: RwLock<HashMap<LocalKey, Record>>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn put(&self, record: Record) {
        self.records.write().insert(record.key(), record);
    }

    /// Removes a record.
    pub fn remove(&self, kind: &str, id: ObjectId) -> Option<Record> {
        self.records.write().remove(&LocalKey::new(kind, id))
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no record is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl LocalSource for MemorySource {
    fn load(&self, kind: &str, id: ObjectId) -> Option<Record> {
        self.records.read().get(&LocalKey::new(kind, id)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Record {
        let contact = Record::new("Contact", 7)
            .with("email", "ada@example.com")
            .with("primary_phone", LocalValue::Null);
        Record::new("AddressBook", 3)
            .with("city", "Basel")
            .with("contact", contact)
            .with("country_id", 41i64)
    }

    fn path(text: &str) -> AttrPath {
        AttrPath::parse(text).unwrap()
    }

    #[test]
    fn resolves_nested_attributes() {
        let record = address();
        assert_eq!(record.resolve(&path("city")).unwrap(), LocalValue::from("Basel"));
        assert_eq!(
            record.resolve(&path("contact.email")).unwrap(),
            LocalValue::from("ada@example.com")
        );
    }

    #[test]
    fn ids_beyond_remote_range_are_not_wrapped() {
        let huge = Record::new("Contact", u64::MAX);
        assert_eq!(LocalValue::from(huge.clone()).to_remote(), Value::Bool(false));
        assert_eq!(huge.get("id"), None);

        let small = Record::new("Contact", 7);
        assert_eq!(LocalValue::from(small).to_remote(), Value::Int(7));
    }

    #[test]
    fn id_falls_back_to_record_id() {
        let record = address();
        assert_eq!(record.resolve(&path("id")).unwrap(), LocalValue::Int(3));
        assert_eq!(record.resolve(&path("contact.id")).unwrap(), LocalValue::Int(7));
    }

    #[test]
    fn path_errors_name_the_segment() {
        let record = address();
        assert_eq!(
            record.resolve(&path("street1")),
            Err(PathError::Missing("street1".into()))
        );
        assert_eq!(
            record.resolve(&path("contact.primary_phone.phone")),
            Err(PathError::NullIntermediate("primary_phone".into()))
        );
        assert_eq!(
            record.resolve(&path("city.name")),
            Err(PathError::NotARecord("city".into()))
        );
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", "a..b", ".a", "a.", "contact.email()", "1abc", "unit price"] {
            assert!(AttrPath::parse(bad).is_err(), "{bad:?} should be rejected");
        }
        assert_eq!(path("main_category.id").segments(), &["main_category", "id"]);
    }

    #[test]
    fn path_deserializes_from_string() {
        let parsed: AttrPath = serde_json::from_str("\"contact.role_id\"").unwrap();
        assert_eq!(parsed.to_string(), "contact.role_id");
        assert!(serde_json::from_str::<AttrPath>("\"contact..role\"").is_err());
    }

    #[test]
    fn object_ids_from_references() {
        assert_eq!(LocalValue::Int(5).as_object_id(), Some(5));
        assert_eq!(LocalValue::Int(-1).as_object_id(), None);
        assert_eq!(LocalValue::from(Record::new("Country", 41)).as_object_id(), Some(41));
        assert_eq!(LocalValue::from("5").as_object_id(), None);
    }

    #[test]
    fn memory_source_roundtrip() {
        let source = MemorySource::new();
        source.put(address());
        assert_eq!(source.len(), 1);
        assert_eq!(source.load("AddressBook", 3).unwrap().id, 3);
        assert!(source.load("AddressBook", 4).is_none());
        source.remove("AddressBook", 3);
        assert!(source.is_empty());
    }
}

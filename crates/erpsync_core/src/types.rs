//! Identifier and timestamp types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a local object (the host's primary key).
pub type ObjectId = u64;

/// Identifier of a remote ERP object.
pub type RemoteId = i64;

/// Wall-clock timestamp stored on mapper rows.
pub type Timestamp = DateTime<Utc>;

/// Store-assigned identifier of a mapper row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapperId(pub u64);

impl fmt::Display for MapperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mapper:{}", self.0)
    }
}

/// Store-assigned identifier of a tombstone row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TombstoneId(pub u64);

impl fmt::Display for TombstoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tombstone:{}", self.0)
    }
}

/// A local object reference: entity kind plus id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalKey {
    /// Local entity kind (e.g. `"Product"`).
    pub kind: String,
    /// Local object id.
    pub id: ObjectId,
}

impl LocalKey {
    /// Creates a local key.
    pub fn new(kind: impl Into<String>, id: ObjectId) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

impl fmt::Display for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(MapperId(4).to_string(), "mapper:4");
        assert_eq!(TombstoneId(9).to_string(), "tombstone:9");
        assert_eq!(LocalKey::new("Category", 12).to_string(), "Category#12");
    }
}

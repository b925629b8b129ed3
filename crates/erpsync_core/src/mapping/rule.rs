//! Field rules: how one remote field is computed from a local snapshot.

use crate::local::AttrPath;
use erpsync_codec::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key of the fallback entry in a lookup table.
pub const DEFAULT_LOOKUP_KEY: &str = "_default";

/// The remote mutation a payload is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// The remote object is being created.
    Create,
    /// The remote object is being updated.
    Update,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => f.write_str("create"),
            Action::Update => f.write_str("update"),
        }
    }
}

/// The actions a field participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Action>", into = "Vec<Action>")]
pub struct ActionSet {
    create: bool,
    update: bool,
}

impl ActionSet {
    /// Both create and update.
    pub const ALL: ActionSet = ActionSet {
        create: true,
        update: true,
    };

    /// Create only.
    pub const CREATE: ActionSet = ActionSet {
        create: true,
        update: false,
    };

    /// Update only.
    pub const UPDATE: ActionSet = ActionSet {
        create: false,
        update: true,
    };

    /// Returns true if the set includes `action`.
    pub fn contains(self, action: Action) -> bool {
        match action {
            Action::Create => self.create,
            Action::Update => self.update,
        }
    }
}

impl From<Vec<Action>> for ActionSet {
    fn from(actions: Vec<Action>) -> Self {
        Self {
            create: actions.contains(&Action::Create),
            update: actions.contains(&Action::Update),
        }
    }
}

impl From<ActionSet> for Vec<Action> {
    fn from(set: ActionSet) -> Self {
        let mut actions = Vec::with_capacity(2);
        if set.create {
            actions.push(Action::Create);
        }
        if set.update {
            actions.push(Action::Update);
        }
        actions
    }
}

/// Where a field's value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSource {
    /// A constant.
    Static {
        /// The value sent.
        value: Value,
    },
    /// An attribute of the snapshot.
    Direct {
        /// Attribute path.
        path: AttrPath,
        /// Value used when the path cannot be evaluated.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
    /// The remote id of the object an attribute refers to.
    Identifier {
        /// Attribute holding the local reference.
        path: AttrPath,
        /// Local kind of the referenced object; the snapshot's kind if unset.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        /// Remote model of the referenced mapper; the mapped model if unset.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    /// The remote ids of a many-valued relation, as a link set.
    IdentifierCollection {
        /// Attribute holding the list of local references.
        path: AttrPath,
        /// Local kind of the referenced objects.
        kind: String,
        /// Remote model of the referenced mappers; the mapped model if unset.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    /// Whether an attribute equals a comparison value.
    BooleanCheck {
        /// Attribute path.
        path: AttrPath,
        /// Comparison value.
        #[serde(default = "default_equals")]
        equals: Value,
    },
    /// An attribute translated through a fixed table.
    Lookup {
        /// Attribute path.
        path: AttrPath,
        /// Translation table, optionally with a `_default` entry.
        table: BTreeMap<String, Value>,
    },
}

fn default_equals() -> Value {
    Value::Bool(true)
}

impl FieldSource {
    /// The action set used when a rule does not name one.
    pub fn default_actions(&self) -> ActionSet {
        match self {
            FieldSource::Static { .. } => ActionSet::CREATE,
            _ => ActionSet::ALL,
        }
    }
}

/// One remote field of a model node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Value source.
    #[serde(flatten)]
    pub source: FieldSource,
    /// Explicit action set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<ActionSet>,
}

impl FieldRule {
    /// Wraps a source with its default action set.
    pub fn new(source: FieldSource) -> Self {
        Self {
            source,
            actions: None,
        }
    }

    /// A constant value, sent on create.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::new(FieldSource::Static {
            value: value.into(),
        })
    }

    /// An attribute path without default.
    pub fn direct(path: AttrPath) -> Self {
        Self::new(FieldSource::Direct {
            path,
            default: None,
        })
    }

    /// An attribute path with a fallback value.
    pub fn direct_or(path: AttrPath, default: impl Into<Value>) -> Self {
        Self::new(FieldSource::Direct {
            path,
            default: Some(default.into()),
        })
    }

    /// A reference resolved through the mapper store.
    pub fn identifier(path: AttrPath, kind: Option<&str>, model: Option<&str>) -> Self {
        Self::new(FieldSource::Identifier {
            path,
            kind: kind.map(str::to_string),
            model: model.map(str::to_string),
        })
    }

    /// A many-valued reference resolved through the mapper store.
    pub fn identifier_collection(path: AttrPath, kind: &str, model: Option<&str>) -> Self {
        Self::new(FieldSource::IdentifierCollection {
            path,
            kind: kind.to_string(),
            model: model.map(str::to_string),
        })
    }

    /// An equality check.
    pub fn boolean_check(path: AttrPath, equals: impl Into<Value>) -> Self {
        Self::new(FieldSource::BooleanCheck {
            path,
            equals: equals.into(),
        })
    }

    /// A table lookup.
    pub fn lookup<K, V>(path: AttrPath, table: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new(FieldSource::Lookup {
            path,
            table: table
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        })
    }

    /// Overrides the action set.
    #[must_use]
    pub fn on(mut self, actions: ActionSet) -> Self {
        self.actions = Some(actions);
        self
    }

    /// The effective action set.
    pub fn actions(&self) -> ActionSet {
        self.actions
            .unwrap_or_else(|| self.source.default_actions())
    }

    /// Returns true if the field is computed for `action`.
    pub fn applies_to(&self, action: Action) -> bool {
        self.actions().contains(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> AttrPath {
        AttrPath::parse(text).unwrap()
    }

    #[test]
    fn static_fields_default_to_create_only() {
        let rule = FieldRule::constant(1i64);
        assert!(rule.applies_to(Action::Create));
        assert!(!rule.applies_to(Action::Update));

        let rule = FieldRule::direct(path("name"));
        assert!(rule.applies_to(Action::Create));
        assert!(rule.applies_to(Action::Update));

        let rule = FieldRule::constant(true).on(ActionSet::ALL);
        assert!(rule.applies_to(Action::Update));
    }

    #[test]
    fn rules_deserialize_from_tagged_json() {
        let rule: FieldRule = serde_json::from_str(
            r#"{"type": "boolean_check", "path": "contact.role_id", "equals": "Customer"}"#,
        )
        .unwrap();
        assert_eq!(rule, FieldRule::boolean_check(path("contact.role_id"), "Customer"));

        let rule: FieldRule = serde_json::from_str(
            r#"{"type": "static", "value": 1, "actions": ["create", "update"]}"#,
        )
        .unwrap();
        assert_eq!(rule.actions(), ActionSet::ALL);

        let rule: FieldRule =
            serde_json::from_str(r#"{"type": "boolean_check", "path": "active"}"#).unwrap();
        assert_eq!(
            rule.source,
            FieldSource::BooleanCheck {
                path: path("active"),
                equals: Value::Bool(true),
            }
        );
    }

    #[test]
    fn unknown_rule_type_is_rejected() {
        let err = serde_json::from_str::<FieldRule>(r#"{"type": "eval", "path": "name"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn action_set_serializes_as_list() {
        let json = serde_json::to_string(&ActionSet::CREATE).unwrap();
        assert_eq!(json, r#"["create"]"#);
    }
}

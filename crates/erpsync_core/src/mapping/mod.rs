//! The static mapping from local entity kinds to remote models.
//!
//! A [`MappingConfig`] is read-only once loaded. Each local kind maps to an
//! ordered list of [`ModelNode`]s; a node names a remote model, the rules
//! computing its fields, and child nodes synced after it with the node's
//! mapper as parent.
//!
//! ## JSON form
//!
//! ```json
//! {
//!   "Product": {
//!     "access_inline": true,
//!     "models": [{
//!       "model": "product.template",
//!       "fields": {
//!         "name": {"type": "direct", "path": "name"},
//!         "categ_id": {"type": "identifier", "path": "main_category.id",
//!                      "kind": "Category", "model": "product.category"}
//!       },
//!       "children": [{"model": "product.product", "auto_delete": true,
//!                     "fields": {"default_code": {"type": "direct", "path": "sku"}}}]
//!     }]
//!   }
//! }
//! ```

mod rule;

pub use rule::{Action, ActionSet, FieldRule, FieldSource, DEFAULT_LOOKUP_KEY};

use crate::error::{MappingError, MappingResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One remote model in a kind's mapping tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelNode {
    /// Remote model name.
    pub model: String,
    /// Remote field name to rule.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldRule>,
    /// Nested models, synced after this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ModelNode>,
    /// The remote object is removed by its parent's deletion.
    #[serde(default)]
    pub auto_delete: bool,
}

impl ModelNode {
    /// Creates a node without fields.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            fields: BTreeMap::new(),
            children: Vec::new(),
            auto_delete: false,
        }
    }

    /// Adds a field rule.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    /// Adds a child node.
    #[must_use]
    pub fn child(mut self, child: ModelNode) -> Self {
        self.children.push(child);
        self
    }

    /// Sets the auto-delete flag.
    #[must_use]
    pub fn auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    /// Finds a direct child by model name.
    pub fn child_node(&self, model: &str) -> Option<&ModelNode> {
        self.children.iter().find(|c| c.model == model)
    }

    fn validate(&self, kind: &str, trail: &str) -> MappingResult<()> {
        let here = format!("{trail}/{}", self.model);
        if self.model.is_empty() {
            return Err(MappingError::InvalidConfig(format!(
                "{kind}{trail}: empty model name"
            )));
        }
        for (name, rule) in &self.fields {
            if let FieldSource::Lookup { table, .. } = &rule.source {
                if table.is_empty() {
                    return Err(MappingError::InvalidConfig(format!(
                        "{kind}{here}.{name}: lookup table is empty"
                    )));
                }
            }
        }
        check_unique(kind, &here, &self.children)?;
        for child in &self.children {
            child.validate(kind, &here)?;
        }
        Ok(())
    }
}

fn check_unique(kind: &str, trail: &str, nodes: &[ModelNode]) -> MappingResult<()> {
    let mut seen = HashSet::new();
    for node in nodes {
        if !seen.insert(node.model.as_str()) {
            return Err(MappingError::InvalidConfig(format!(
                "{kind}{trail}: model '{}' is mapped twice",
                node.model
            )));
        }
    }
    Ok(())
}

/// The mapping of one local kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindMapping {
    /// Top-level remote models in sync order.
    #[serde(default)]
    pub models: Vec<ModelNode>,
    /// Host hint: saves of this kind should expose inline children.
    #[serde(default)]
    pub access_inline: bool,
    /// Host hint: custom operator action for this kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_action: Option<String>,
}

impl KindMapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a top-level model.
    #[must_use]
    pub fn model(mut self, node: ModelNode) -> Self {
        self.models.push(node);
        self
    }

    /// Sets the inline-access hint.
    #[must_use]
    pub fn with_access_inline(mut self, access_inline: bool) -> Self {
        self.access_inline = access_inline;
        self
    }

    /// Sets the operator action hint.
    #[must_use]
    pub fn with_admin_action(mut self, action: impl Into<String>) -> Self {
        self.admin_action = Some(action.into());
        self
    }
}

/// Local kind to remote model tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingConfig {
    kinds: BTreeMap<String, KindMapping>,
}

impl MappingConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a kind (builder style).
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>, mapping: KindMapping) -> Self {
        self.kinds.insert(kind.into(), mapping);
        self
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Parse`] for malformed JSON and
    /// [`MappingError::InvalidConfig`] if validation fails.
    pub fn from_json_str(json: &str) -> MappingResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MappingError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks structural rules: sibling model names are unique and lookup
    /// tables are non-empty.
    pub fn validate(&self) -> MappingResult<()> {
        for (kind, mapping) in &self.kinds {
            check_unique(kind, "", &mapping.models)?;
            for node in &mapping.models {
                node.validate(kind, "")?;
            }
        }
        Ok(())
    }

    /// Returns the mapping of a kind.
    pub fn get(&self, kind: &str) -> Option<&KindMapping> {
        self.kinds.get(kind)
    }

    /// Returns the top-level models of a kind, empty if unmapped.
    pub fn models(&self, kind: &str) -> &[ModelNode] {
        self.kinds
            .get(kind)
            .map(|m| m.models.as_slice())
            .unwrap_or(&[])
    }

    /// Returns true if the kind is mapped.
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Iterates over mapped kinds.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Kinds flagged for inline access.
    pub fn inline_kinds(&self) -> Vec<&str> {
        self.kinds
            .iter()
            .filter(|(_, m)| m.access_inline)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Finds the node reached by following `models` from the kind's
    /// top level, e.g. `["product.template", "product.product"]`.
    pub fn node_at(&self, kind: &str, models: &[&str]) -> Option<&ModelNode> {
        let (first, rest) = models.split_first()?;
        let mut node = self.models(kind).iter().find(|n| n.model == *first)?;
        for model in rest {
            node = node.child_node(model)?;
        }
        Some(node)
    }
}

//! Field resolution: local snapshot to remote payload.

use crate::error::{MappingError, MappingResult};
use crate::local::{LocalValue, Record};
use crate::mapping::{Action, FieldRule, FieldSource, ModelNode, DEFAULT_LOOKUP_KEY};
use crate::store::MapperStore;
use crate::types::ObjectId;
use erpsync_codec::{Payload, Value};
use tracing::{debug, warn};

/// Computes remote payloads from local snapshots.
///
/// Identifier rules consult the mapper store to translate local ids into
/// remote ids; everything else is a pure function of the snapshot.
pub struct FieldResolver<'a, S: MapperStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: MapperStore + ?Sized> FieldResolver<'a, S> {
    /// Creates a resolver reading mappers from `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Computes the payload of `node` for `action`.
    ///
    /// Fields whose action set excludes `action` are left out.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Field`] naming the first field that could
    /// not be resolved.
    pub fn resolve_payload(
        &self,
        record: &Record,
        node: &ModelNode,
        action: Action,
    ) -> MappingResult<Payload> {
        let mut payload = Payload::new();
        for (name, rule) in &node.fields {
            if let Some(value) = self.resolve_field(record, &node.model, name, rule, action)? {
                payload.insert(name.clone(), value);
            }
        }
        Ok(payload)
    }

    /// Computes one field; `None` if the rule does not apply to `action`.
    pub fn resolve_field(
        &self,
        record: &Record,
        model: &str,
        name: &str,
        rule: &FieldRule,
        action: Action,
    ) -> MappingResult<Option<Value>> {
        if !rule.applies_to(action) {
            return Ok(None);
        }
        self.compute(record, model, &rule.source)
            .map(|v| Some(v.normalize()))
            .map_err(|reason| MappingError::field(name, reason))
    }

    fn compute(&self, record: &Record, model: &str, source: &FieldSource) -> Result<Value, String> {
        match source {
            FieldSource::Static { value } => Ok(value.clone()),

            FieldSource::Direct { path, default } => match record.resolve(path) {
                Ok(value) => Ok(value.to_remote()),
                Err(e) => default.clone().ok_or_else(|| e.to_string()),
            },

            FieldSource::Identifier { path, kind, model: target } => {
                let value = record.resolve(path).map_err(|e| e.to_string())?;
                if value == LocalValue::Null {
                    debug!(kind = %record.kind, id = record.id, %path, "reference is null");
                    return Ok(Value::Bool(false));
                }
                let id = value
                    .as_object_id()
                    .ok_or_else(|| format!("attribute '{path}' is not an object reference"))?;
                let kind = kind.as_deref().unwrap_or(&record.kind);
                let target = target.as_deref().unwrap_or(model);
                Ok(self
                    .remote_id(kind, id, target)?
                    .map_or(Value::Bool(false), Value::Int))
            }

            FieldSource::IdentifierCollection { path, kind, model: target } => {
                let value = record.resolve(path).map_err(|e| e.to_string())?;
                let members = match value {
                    LocalValue::Null => Vec::new(),
                    LocalValue::List(items) => items,
                    _ => return Err(format!("attribute '{path}' is not a collection")),
                };
                let target = target.as_deref().unwrap_or(model);
                let mut ids = Vec::with_capacity(members.len());
                for member in &members {
                    let id = member
                        .as_object_id()
                        .ok_or_else(|| format!("attribute '{path}' holds a non-reference"))?;
                    if let Some(remote) = self.remote_id(kind, id, target)? {
                        ids.push(Value::Int(remote));
                    }
                }
                Ok(Value::List(ids))
            }

            FieldSource::BooleanCheck { path, equals } => {
                let value = record.resolve(path).map_err(|e| e.to_string())?;
                Ok(Value::Bool(value.to_remote() == *equals))
            }

            FieldSource::Lookup { path, table } => {
                let value = record.resolve(path).map_err(|e| e.to_string())?;
                let hit = value
                    .lookup_key()
                    .and_then(|key| table.get(&key))
                    .or_else(|| table.get(DEFAULT_LOOKUP_KEY));
                Ok(hit.cloned().unwrap_or(Value::Bool(false)))
            }
        }
    }

    fn remote_id(&self, kind: &str, id: ObjectId, model: &str) -> Result<Option<i64>, String> {
        let mapper = self
            .store
            .lookup(kind, id, model)
            .map_err(|e| format!("mapper lookup failed: {e}"))?;
        match mapper.and_then(|m| m.remote_id) {
            Some(remote) => Ok(Some(remote)),
            None => {
                warn!(kind, id, model, "no mapper found for referenced object");
                Ok(None)
            }
        }
    }
}

//! Keyed store of validated event schemas.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::loader::SchemaSource;
use super::redaction::RedactedPolicies;
use super::EventSchema;
use crate::event::{EventData, SchemaKey};
use crate::{EventError, EventResult};

/// Registry of event schemas keyed by `($id, version)`.
///
/// The set of redacted policies is fixed when the registry is built and
/// applies to every event processed through it.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<SchemaKey, Arc<EventSchema>>,
    redacted_policies: RedactedPolicies,
}

impl SchemaRegistry {
    /// Creates a registry that redacts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that strips the given policies from every event.
    pub fn with_redacted_policies(redacted_policies: RedactedPolicies) -> Self {
        Self {
            schemas: HashMap::new(),
            redacted_policies,
        }
    }

    /// The policies stripped from processed events.
    pub fn redacted_policies(&self) -> &RedactedPolicies {
        &self.redacted_policies
    }

    /// Constructs and registers a schema. Duplicates are rejected, never overwritten.
    pub fn register(&mut self, source: impl Into<SchemaSource>) -> EventResult<Arc<EventSchema>> {
        let schema = EventSchema::new(source)?;
        let key = schema.key().clone();

        if self.schemas.contains_key(&key) {
            return Err(EventError::SchemaAlreadyRegistered {
                id: key.id,
                version: key.version,
            });
        }

        let schema = Arc::new(schema);
        self.schemas.insert(key.clone(), schema.clone());

        tracing::info!(schema_id = %key.id, version = key.version, "Registered event schema");
        Ok(schema)
    }

    /// Looks up a schema.
    pub fn get(&self, key: &SchemaKey) -> EventResult<Arc<EventSchema>> {
        self.schemas.get(key).cloned().ok_or_else(|| not_found(key))
    }

    /// Removes a schema.
    pub fn remove(&mut self, key: &SchemaKey) -> EventResult<Arc<EventSchema>> {
        let removed = self.schemas.remove(key).ok_or_else(|| not_found(key))?;
        tracing::info!(schema_id = %key.id, version = key.version, "Removed event schema");
        Ok(removed)
    }

    /// Returns true if the key is registered.
    pub fn contains(&self, key: &SchemaKey) -> bool {
        self.schemas.contains_key(key)
    }

    /// Validates event data against a registered schema.
    pub fn validate_event(&self, key: &SchemaKey, data: &Value) -> EventResult<()> {
        self.get(key)?.validate(data)
    }

    /// Validates, then strips the registry's redacted policies from `data` in place.
    pub fn process_event(&self, key: &SchemaKey, data: &mut EventData) -> EventResult<()> {
        self.get(key)?.process(data, &self.redacted_policies)
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<SchemaKey> {
        let mut keys: Vec<SchemaKey> = self.schemas.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Iterates over registered schemas in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EventSchema>> {
        self.schemas.values()
    }
}

fn not_found(key: &SchemaKey) -> EventError {
    EventError::SchemaNotFound {
        id: key.id.clone(),
        version: key.version,
    }
}

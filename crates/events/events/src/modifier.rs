//! Modifiers: synchronous transforms applied to event data before validation.

use std::sync::Arc;

use crate::callback::CallbackSignature;
use crate::error::{EventError, EventResult};
use crate::event::{EventData, SchemaKey};

/// A transform of `(schema_id, data) -> data`.
pub trait Modifier: Send + Sync {
    /// Returns an identifier used in diagnostics.
    fn id(&self) -> &str {
        "anonymous"
    }

    /// Describes the parameter list; checked once when the modifier is added.
    fn signature(&self) -> CallbackSignature {
        CallbackSignature::modifier()
    }

    /// Transforms the event data.
    fn modify(&self, schema_id: &str, data: EventData) -> EventData;

    /// Transforms data emitted against a specific schema version.
    /// Defaults to [`Modifier::modify`].
    fn modify_versioned(&self, key: &SchemaKey, data: EventData) -> EventData {
        self.modify(&key.id, data)
    }
}

/// Wrapper for closure-based modifiers.
pub struct FnModifier<F>
where
    F: Fn(&str, EventData) -> EventData + Send + Sync,
{
    id: String,
    modifier: F,
}

impl<F> FnModifier<F>
where
    F: Fn(&str, EventData) -> EventData + Send + Sync,
{
    /// Creates a new closure modifier.
    pub fn new(id: impl Into<String>, modifier: F) -> Self {
        Self {
            id: id.into(),
            modifier,
        }
    }
}

impl<F> Modifier for FnModifier<F>
where
    F: Fn(&str, EventData) -> EventData + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn modify(&self, schema_id: &str, data: EventData) -> EventData {
        (self.modifier)(schema_id, data)
    }
}

/// Ordered chain of modifiers. Empty by default.
#[derive(Default)]
pub struct ModifierChain {
    modifiers: Vec<Arc<dyn Modifier>>,
}

impl ModifierChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a modifier after checking its signature.
    ///
    /// Adding the same instance twice keeps a single entry.
    pub fn add(&mut self, modifier: Arc<dyn Modifier>) -> EventResult<()> {
        CallbackSignature::modifier()
            .check(&modifier.signature())
            .map_err(|reason| {
                EventError::Modifier(format!("modifier '{}' rejected: {}", modifier.id(), reason))
            })?;

        if !self.contains(&modifier) {
            self.modifiers.push(modifier);
        }
        Ok(())
    }

    /// Removes a modifier by identity. Unknown modifiers are ignored.
    pub fn remove(&mut self, modifier: &Arc<dyn Modifier>) {
        self.modifiers.retain(|m| !Arc::ptr_eq(m, modifier));
    }

    /// Returns true if this exact instance is in the chain.
    pub fn contains(&self, modifier: &Arc<dyn Modifier>) -> bool {
        self.modifiers.iter().any(|m| Arc::ptr_eq(m, modifier))
    }

    /// Runs every modifier in registration order, threading the data through.
    pub fn apply(&self, key: &SchemaKey, data: EventData) -> EventData {
        self.modifiers
            .iter()
            .fold(data, |data, modifier| modifier.modify_versioned(key, data))
    }

    /// Returns the number of modifiers in the chain.
    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    /// Checks if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }
}

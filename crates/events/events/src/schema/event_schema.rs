//! A validated event schema with its compiled validator and redaction index.

use serde_json::Value;

use super::loader::SchemaSource;
use super::redaction::{RedactedPolicies, RedactionIndex};
use super::validator::{InstanceValidator, validate_schema};
use crate::event::{EventData, SchemaKey};
use crate::{EventError, EventResult};

/// One registered event type. Immutable once constructed.
#[derive(Debug)]
pub struct EventSchema {
    key: SchemaKey,
    document: Value,
    validator: InstanceValidator,
    redaction: RedactionIndex,
}

impl EventSchema {
    /// Loads, validates and compiles a schema.
    pub fn new(source: impl Into<SchemaSource>) -> EventResult<Self> {
        match source.into() {
            SchemaSource::Schema(schema) => Ok(schema),
            source => Self::from_document(source.load()?),
        }
    }

    /// Builds a schema from a parsed document.
    pub fn from_document(document: Value) -> EventResult<Self> {
        validate_schema(&document)?;

        let key = identity(&document)?;
        let validator = InstanceValidator::compile(key.clone(), &document)?;
        let redaction = RedactionIndex::from_schema(&document);

        tracing::debug!(
            schema_id = %key.id,
            version = key.version,
            policies = ?redaction.policies().collect::<Vec<_>>(),
            "Constructed event schema"
        );

        Ok(Self {
            key,
            document,
            validator,
            redaction,
        })
    }

    /// Schema `$id`.
    pub fn id(&self) -> &str {
        &self.key.id
    }

    /// Schema version.
    pub fn version(&self) -> u32 {
        self.key.version
    }

    /// Registry key.
    pub fn key(&self) -> &SchemaKey {
        &self.key
    }

    /// The source document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Optional `title` of the schema.
    pub fn title(&self) -> Option<&str> {
        self.document.get("title").and_then(Value::as_str)
    }

    /// The policy-to-paths index.
    pub fn redaction_index(&self) -> &RedactionIndex {
        &self.redaction
    }

    /// Validates a JSON value against this schema.
    pub fn validate(&self, data: &Value) -> EventResult<()> {
        self.validator.validate(data)
    }

    /// Validates event data in place. The payload is moved into a `Value`
    /// for the validator and moved back, so `data` is never copied.
    pub fn validate_data(&self, data: &mut EventData) -> EventResult<()> {
        let value = Value::Object(std::mem::take(data));
        let result = self.validator.validate(&value);
        if let Value::Object(map) = value {
            *data = map;
        }
        result
    }

    /// Strips fields governed by the selected policies. Mutates `data`.
    pub fn enforce_redaction(&self, data: &mut EventData, policies: &RedactedPolicies) {
        if policies.is_empty() || self.redaction.is_empty() {
            return;
        }
        self.redaction.enforce(data, policies);
    }

    /// Validates the unredacted data, then redacts it in place.
    pub fn process(&self, data: &mut EventData, policies: &RedactedPolicies) -> EventResult<()> {
        self.validate_data(data)?;
        self.enforce_redaction(data, policies);
        Ok(())
    }
}

fn identity(document: &Value) -> EventResult<SchemaKey> {
    let id = document
        .get("$id")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("`$id` must be a URI string".to_string(), "/$id"))?;
    let raw = document.get("version").unwrap_or(&Value::Null);
    let version = schema_version(raw).ok_or_else(|| {
        invalid(
            format!("`version` must be a positive integer no greater than {}, got {raw}", u32::MAX),
            "/version",
        )
    })?;
    Ok(SchemaKey::new(id, version))
}

/// Reads `version`. Integral floats such as `1.0` are accepted.
fn schema_version(value: &Value) -> Option<u32> {
    let number = match value.as_u64() {
        Some(number) => number,
        None => {
            let float = value.as_f64().filter(|v| v.fract() == 0.0)?;
            if !(1.0..=f64::from(u32::MAX)).contains(&float) {
                return None;
            }
            float as u64
        }
    };
    u32::try_from(number).ok().filter(|v| *v >= 1)
}

fn invalid(message: String, path: &str) -> EventError {
    EventError::SchemaInvalid {
        message,
        instance_path: path.to_string(),
    }
}

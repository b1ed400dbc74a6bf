//! Event instances, registry keys and the emitted capsule.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EventError, EventResult};

/// Event payload: a JSON object.
pub type EventData = Map<String, Value>;

/// Version of the capsule envelope written by this crate.
pub const METADATA_VERSION: u32 = 1;

/// Prefix reserved for envelope keys; schema properties may not use it.
pub const RESERVED_PREFIX: &str = "__";

/// Identity of a registered schema: `$id` plus version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaKey {
    /// Schema `$id` (a URI).
    pub id: String,
    /// Schema version, starting at 1.
    pub version: u32,
}

impl SchemaKey {
    /// Creates a new key.
    pub fn new(id: impl Into<String>, version: u32) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl std::fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (version {})", self.id, self.version)
    }
}

/// An event to be emitted against a registered schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Schema `$id` the data conforms to.
    pub schema_id: String,
    /// Schema version.
    pub version: u32,
    /// The event payload.
    pub data: EventData,
    /// Overrides the capsule timestamp; defaults to the emit time.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Event {
    /// Creates a new event.
    pub fn new(schema_id: impl Into<String>, version: u32, data: EventData) -> Self {
        Self {
            schema_id: schema_id.into(),
            version,
            data,
            timestamp: None,
        }
    }

    /// Creates an event from a JSON value, which must be an object.
    pub fn from_value(schema_id: impl Into<String>, version: u32, data: Value) -> EventResult<Self> {
        let schema_id = schema_id.into();
        match data {
            Value::Object(map) => Ok(Self::new(schema_id, version, map)),
            other => Err(EventError::EventValidation {
                schema_id,
                version,
                message: format!("event data must be a JSON object, got {}", json_kind(&other)),
                instance_path: String::new(),
            }),
        }
    }

    /// Sets an explicit timestamp for the capsule.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns the registry key of this event.
    pub fn key(&self) -> SchemaKey {
        SchemaKey::new(self.schema_id.clone(), self.version)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Renders a timestamp the way it appears in `__timestamp__`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The enveloped record handed to sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    /// ISO-8601 UTC timestamp with a trailing `Z`.
    #[serde(rename = "__timestamp__")]
    pub timestamp: String,
    /// Schema `$id`.
    #[serde(rename = "__schema__")]
    pub schema: String,
    /// Schema version.
    #[serde(rename = "__schema_version__")]
    pub schema_version: u32,
    /// Envelope protocol version.
    #[serde(rename = "__metadata_version__")]
    pub metadata_version: u32,
    /// Validated (and possibly redacted) event fields.
    #[serde(flatten)]
    pub data: EventData,
}

impl Capsule {
    /// Wraps validated data in the envelope.
    pub fn new(key: &SchemaKey, data: EventData, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: format_timestamp(&timestamp),
            schema: key.id.clone(),
            schema_version: key.version,
            metadata_version: METADATA_VERSION,
            data,
        }
    }

    /// Flattens the capsule into a single JSON object, envelope keys first.
    pub fn to_record(&self) -> EventData {
        let mut record = EventData::with_capacity(self.data.len() + 4);
        record.insert("__timestamp__".into(), Value::String(self.timestamp.clone()));
        record.insert("__schema__".into(), Value::String(self.schema.clone()));
        record.insert("__schema_version__".into(), Value::from(self.schema_version));
        record.insert("__metadata_version__".into(), Value::from(self.metadata_version));
        for (key, value) in &self.data {
            record.insert(key.clone(), value.clone());
        }
        record
    }

    /// Serializes the capsule as a single-line JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_record())
    }
}

/// How a single `emit` call terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// No sinks and no listeners: returned before any validation.
    NoSinks,
    /// The schema key is not registered; nothing was written.
    UnregisteredSchema,
    /// The capsule was handed to every sink.
    Emitted {
        /// Number of listener invocations scheduled.
        listeners_scheduled: usize,
    },
}

impl EmitOutcome {
    /// Returns true if a capsule was written.
    pub fn is_emitted(&self) -> bool {
        matches!(self, EmitOutcome::Emitted { .. })
    }
}

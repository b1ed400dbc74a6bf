//! Builders for schema documents and event payloads.

use std::sync::Arc;

use schema_events::{Event, EventData, EventError, EventLogger, EventResult, EventSchema};
use serde::Serialize;
use serde_json::{Map, Value};

/// Builder for event schema documents.
///
/// Produces a document that passes meta-schema validation as long as no
/// property name starts with `__`.
#[derive(Debug, Clone)]
pub struct SchemaDocumentBuilder {
    id: String,
    version: u32,
    title: Option<String>,
    description: Option<String>,
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl SchemaDocumentBuilder {
    /// Creates a builder for the given `$id` and version.
    pub fn new(id: impl Into<String>, version: u32) -> Self {
        Self {
            id: id.into(),
            version,
            title: None,
            description: None,
            properties: Map::new(),
            required: Vec::new(),
        }
    }

    /// Sets the schema title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the schema description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a property. Properties keep insertion order.
    pub fn property(mut self, name: impl Into<String>, property: PropertyBuilder) -> Self {
        self.properties.insert(name.into(), property.build());
        self
    }

    /// Adds a property the event must carry.
    pub fn required(mut self, name: impl Into<String>, property: PropertyBuilder) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.property(name, property)
    }

    /// Builds the schema document.
    pub fn build(self) -> Value {
        let mut document = Map::new();
        document.insert("$id".into(), Value::String(self.id));
        document.insert("version".into(), Value::from(self.version));
        if let Some(title) = self.title {
            document.insert("title".into(), Value::String(title));
        }
        if let Some(description) = self.description {
            document.insert("description".into(), Value::String(description));
        }
        document.insert("type".into(), Value::String("object".into()));
        if !self.required.is_empty() {
            document.insert(
                "required".into(),
                Value::Array(self.required.into_iter().map(Value::String).collect()),
            );
        }
        document.insert("properties".into(), Value::Object(self.properties));
        Value::Object(document)
    }

    /// Builds the document and registers it with a logger.
    pub fn register(self, logger: &EventLogger) -> EventResult<Arc<EventSchema>> {
        logger.register_event_schema(self.build())
    }
}

/// Builder for a single property schema.
#[derive(Debug, Clone)]
pub struct PropertyBuilder {
    schema: Map<String, Value>,
}

impl PropertyBuilder {
    fn typed(kind: &str) -> Self {
        let mut schema = Map::new();
        schema.insert("type".into(), Value::String(kind.into()));
        Self { schema }
    }

    /// A string property.
    pub fn string() -> Self {
        Self::typed("string")
    }

    /// An integer property.
    pub fn integer() -> Self {
        Self::typed("integer")
    }

    /// A number property.
    pub fn number() -> Self {
        Self::typed("number")
    }

    /// A boolean property.
    pub fn boolean() -> Self {
        Self::typed("boolean")
    }

    /// An object property; add nested fields with [`PropertyBuilder::property`].
    pub fn object() -> Self {
        Self::typed("object")
    }

    /// An array whose elements match `items`.
    pub fn array(items: PropertyBuilder) -> Self {
        let mut builder = Self::typed("array");
        builder.schema.insert("items".into(), items.build());
        builder
    }

    /// A property restricted to a fixed set of values.
    pub fn one_of<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let values = values
            .into_iter()
            .map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
            .collect();
        let mut schema = Map::new();
        schema.insert("enum".into(), Value::Array(values));
        Self { schema }
    }

    /// Sets the property title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.schema.insert("title".into(), Value::String(title.into()));
        self
    }

    /// Sets the property description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.schema
            .insert("description".into(), Value::String(description.into()));
        self
    }

    /// Sets a string format such as `date-time` or `email`.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.schema.insert("format".into(), Value::String(format.into()));
        self
    }

    /// Tags the property with redaction policies.
    pub fn redaction_policies<I, S>(mut self, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let policies = policies
            .into_iter()
            .map(|p| Value::String(p.into()))
            .collect();
        self.schema
            .insert("redactionPolicies".into(), Value::Array(policies));
        self
    }

    /// Adds a nested property.
    pub fn property(mut self, name: impl Into<String>, property: PropertyBuilder) -> Self {
        let properties = self
            .schema
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(properties) = properties {
            properties.insert(name.into(), property.build());
        }
        self
    }

    /// Builds the property schema.
    pub fn build(self) -> Value {
        Value::Object(self.schema)
    }
}

/// Builder for constructing event payloads.
#[derive(Debug, Clone, Default)]
pub struct EventPayloadBuilder {
    data: EventData,
}

impl EventPayloadBuilder {
    /// Creates a new payload builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to the payload.
    pub fn field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.data.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(Value::Null),
        );
        self
    }

    /// Adds a string field.
    pub fn string(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.field(key, value.into())
    }

    /// Adds an integer field.
    pub fn int(self, key: impl Into<String>, value: i64) -> Self {
        self.field(key, value)
    }

    /// Adds a boolean field.
    pub fn bool(self, key: impl Into<String>, value: bool) -> Self {
        self.field(key, value)
    }

    /// Adds a nested object field.
    pub fn object(self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.field(key, value)
    }

    /// Adds an optional field (only if Some).
    pub fn optional<T: Serialize>(self, key: impl Into<String>, value: Option<T>) -> Self {
        if let Some(v) = value {
            self.field(key, v)
        } else {
            self
        }
    }

    /// Builds the payload.
    pub fn build(self) -> EventData {
        self.data
    }

    /// Builds the payload and creates an event.
    pub fn into_event(self, schema_id: impl Into<String>, version: u32) -> Event {
        Event::new(schema_id, version, self.data)
    }
}

/// Trait for types that can be converted to event payloads.
pub trait IntoEventPayload {
    /// Converts this type into event data. Fails unless it serializes to a
    /// JSON object.
    fn into_payload(self) -> EventResult<EventData>;
}

impl<T: Serialize> IntoEventPayload for T {
    fn into_payload(self) -> EventResult<EventData> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(EventError::Serialization(format!(
                "event payload must serialize to a JSON object, got `{other}`"
            ))),
        }
    }
}

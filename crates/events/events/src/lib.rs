//! # Schema Events
//!
//! Structured, schema-validated event emission:
//! - Event schemas checked against a bundled meta-schema
//! - Registry keyed by schema `$id` and version
//! - Redaction of fields by policy before anything leaves the process
//! - Modifier chain for transforming data ahead of validation
//! - Redactors masking or removing fields by name, pattern or schema
//! - Sinks receiving one enveloped record (capsule) per event
//! - Asynchronous listeners, isolated from each other and from `emit`
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use schema_events::{Event, EventLogger, MemorySink};
//!
//! let logger = EventLogger::new();
//! logger.register_event_schema(serde_json::json!({
//!     "$id": "http://myapp.dev/events/user-created",
//!     "version": 1,
//!     "type": "object",
//!     "properties": {
//!         "user_id": { "type": "string" },
//!         "email": { "type": "string", "redactionPolicies": ["user-identifier"] }
//!     }
//! }))?;
//!
//! let sink = Arc::new(MemorySink::new());
//! logger.register_handler(sink.clone());
//!
//! logger.emit(Event::from_value(
//!     "http://myapp.dev/events/user-created",
//!     1,
//!     serde_json::json!({ "user_id": "123", "email": "a@b.c" }),
//! )?)?;
//! ```

mod callback;
mod config;
mod error;
mod event;
mod listener;
mod logger;
mod modifier;
mod redactor;
pub mod schema;
mod sink;

pub use callback::{CallbackSignature, Param, ParamKind};
pub use config::{EventLoggerConfig, SinkConfig};
pub use error::{EventError, EventResult};
pub use event::{
    Capsule, EmitOutcome, Event, EventData, METADATA_VERSION, RESERVED_PREFIX, SchemaKey,
    format_timestamp,
};
pub use listener::{ActiveListeners, EventListener, FnListener, ListenerMode, ListenerTable};
pub use logger::EventLogger;
pub use modifier::{FnModifier, Modifier, ModifierChain};
pub use redactor::{DEFAULT_MASK, RedactionAction, Redactor, RedactorConfig, RedactorKind};
pub use schema::{EventSchema, RedactedPolicies, RedactionIndex, SchemaRegistry, SchemaSource};
pub use sink::{EventSink, JsonLinesSink, MemorySink, TracingSink};


//! # Schema Events SDK
//!
//! Helpers for components built on the schema event logger.
//!
//! This crate provides traits and utilities to:
//! - Build schema documents and event payloads
//! - Declare the schemas a component emits
//! - Attach listeners a component provides
//! - Capture emitted events in tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use schema_events_sdk::{PropertyBuilder, SchemaDocumentBuilder, SchemaProvider, SchemaSource};
//!
//! pub struct Accounts;
//!
//! impl SchemaProvider for Accounts {
//!     fn event_schemas() -> Vec<SchemaSource> {
//!         vec![
//!             SchemaDocumentBuilder::new("http://myapp.dev/events/user-created", 1)
//!                 .required("user_id", PropertyBuilder::string())
//!                 .property(
//!                     "email",
//!                     PropertyBuilder::string().redaction_policies(["user-identifier"]),
//!                 )
//!                 .build()
//!                 .into(),
//!         ]
//!     }
//! }
//! ```

mod builder;
mod testing;
mod traits;

pub use builder::{EventPayloadBuilder, IntoEventPayload, PropertyBuilder, SchemaDocumentBuilder};
pub use testing::TestEventLogger;
pub use traits::{EventObserver, EventRegistrar, SchemaEventEmitter, SchemaProvider};

// Re-export core event types for convenience
pub use schema_events::{
    EmitOutcome, Event, EventData, EventError, EventListener, EventLogger, EventLoggerConfig,
    EventResult, EventSchema, ListenerMode, RedactedPolicies, SchemaSource,
};

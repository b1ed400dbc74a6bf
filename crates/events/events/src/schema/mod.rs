//! Event schemas: loading, meta-schema validation, redaction and the registry.
//!
//! - [`validate_schema`] checks a document against the bundled meta-schema
//! - [`RedactionIndex`] maps redaction policies to the fields they govern
//! - [`EventSchema`] bundles identity, compiled validator and redaction index
//! - [`SchemaRegistry`] stores schemas by `($id, version)`

mod event_schema;
mod loader;
mod metaschema;
mod redaction;
mod registry;
mod validator;

pub use event_schema::EventSchema;
pub use loader::{SchemaSource, load_file, parse_document};
pub use metaschema::{EVENT_METASCHEMA_ID, PROPERTY_METASCHEMA_ID, event_metaschema, property_metaschema};
pub use redaction::{FieldPath, PathSegment, RedactedPolicies, RedactionIndex, remove_path};
pub use registry::SchemaRegistry;
pub use validator::{InstanceValidator, validate_schema};

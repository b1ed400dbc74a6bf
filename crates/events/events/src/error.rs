//! Event error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;

/// Error type for schema registration and event emission.
#[derive(Debug, Error)]
pub enum EventError {
    /// The schema source could not be read or parsed into a mapping.
    #[error("Schema loading error: {0}")]
    SchemaLoading(String),

    /// A schema path was given but nothing exists there.
    #[error("Schema file not present at path: {}", .0.display())]
    SchemaFileAbsent(PathBuf),

    /// The schema document does not conform to the event meta-schema.
    #[error("Invalid schema: {message}")]
    SchemaInvalid {
        /// Human readable reason.
        message: String,
        /// JSON pointer into the schema document.
        instance_path: String,
    },

    /// A schema with the same `$id` and version is already registered.
    #[error(
        "The schema, {id} (version {version}), is already registered. \
         Try removing it and registering it again."
    )]
    SchemaAlreadyRegistered {
        /// Schema `$id`.
        id: String,
        /// Schema version.
        version: u32,
    },

    /// No schema is registered under the requested key.
    #[error(
        "The requested schema, {id} (version {version}), was not found in the \
         schema registry. Are you sure it was previously registered?"
    )]
    SchemaNotFound {
        /// Schema `$id`.
        id: String,
        /// Schema version.
        version: u32,
    },

    /// Event data does not conform to its schema.
    #[error("Event validation failed for {schema_id} (version {version}): {message}")]
    EventValidation {
        /// Schema `$id`.
        schema_id: String,
        /// Schema version.
        version: u32,
        /// Message from the underlying validator.
        message: String,
        /// JSON pointer into the event data.
        instance_path: String,
    },

    /// A modifier was rejected at registration time.
    #[error("Modifier error: {0}")]
    Modifier(String),

    /// A listener was rejected at registration time.
    #[error("Listener error: {0}")]
    Listener(String),

    /// A listener invocation failed.
    #[error("Listener failed: {0}")]
    ListenerFailed(String),

    /// A sink could not write a capsule.
    #[error("Sink error: {0}")]
    Sink(String),

    /// Logger configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EventError {
    /// Returns true for errors raised while loading or validating a schema document.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            EventError::SchemaLoading(_)
                | EventError::SchemaFileAbsent(_)
                | EventError::SchemaInvalid { .. }
        )
    }
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}

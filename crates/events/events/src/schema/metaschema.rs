//! The bundled event and property meta-schemas.

use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use serde_json::Value;

use super::loader::parse_document;

/// `$id` of the event-level meta-schema.
pub const EVENT_METASCHEMA_ID: &str = "https://schema-events.dev/schemas/event-metaschema";

/// `$id` of the property-level meta-schema.
pub const PROPERTY_METASCHEMA_ID: &str = "https://schema-events.dev/schemas/property-metaschema";

const EVENT_METASCHEMA_SOURCE: &str = include_str!("../../schemas/event-metaschema.yml");
const PROPERTY_METASCHEMA_SOURCE: &str = include_str!("../../schemas/property-metaschema.yml");

static METASCHEMA_VALIDATOR: LazyLock<Result<Validator, String>> = LazyLock::new(compile);

/// Returns the event-level meta-schema document.
pub fn event_metaschema() -> Result<Value, String> {
    parse_document(EVENT_METASCHEMA_SOURCE, "event metaschema").map_err(|e| e.to_string())
}

/// Returns the property-level meta-schema document.
pub fn property_metaschema() -> Result<Value, String> {
    parse_document(PROPERTY_METASCHEMA_SOURCE, "property metaschema").map_err(|e| e.to_string())
}

/// The compiled meta-schema validator, built once per process.
pub(crate) fn validator() -> Result<&'static Validator, String> {
    METASCHEMA_VALIDATOR.as_ref().map_err(Clone::clone)
}

fn compile() -> Result<Validator, String> {
    let event = event_metaschema()?;
    let property = property_metaschema()?;

    let validator = jsonschema::options()
        .with_draft(Draft::Draft7)
        .should_validate_formats(true)
        .with_resource(PROPERTY_METASCHEMA_ID, Draft::Draft7.create_resource(property))
        .build(&event)
        .map_err(|e| format!("bundled metaschema failed to compile: {}", e))?;

    tracing::debug!(metaschema = EVENT_METASCHEMA_ID, "Compiled event metaschema");
    Ok(validator)
}

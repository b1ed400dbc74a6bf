//! Meta-schema validation of schema documents and instance validation of event data.

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, ValidationError, Validator};
use serde_json::Value;

use super::metaschema;
use crate::event::{RESERVED_PREFIX, SchemaKey};
use crate::{EventError, EventResult};

/// Validates a candidate schema document against the event meta-schema.
///
/// A property name starting with the reserved `__` prefix gets a dedicated
/// message naming the property. Every other violation is reported with the
/// underlying validator's message.
pub fn validate_schema(document: &Value) -> EventResult<()> {
    let validator = metaschema::validator().map_err(EventError::Internal)?;
    match validator.validate(document) {
        Ok(()) => Ok(()),
        Err(err) => Err(schema_error(&err)),
    }
}

fn schema_error(err: &ValidationError<'_>) -> EventError {
    if let Some(name) = reserved_property(err) {
        return EventError::SchemaInvalid {
            message: format!(
                "{name:?} is an invalid property name because it starts with `{RESERVED_PREFIX}`. \
                 Properties starting with `{RESERVED_PREFIX}` are reserved for the event envelope."
            ),
            instance_path: err.instance_path.to_string(),
        };
    }
    EventError::SchemaInvalid {
        message: err.to_string(),
        instance_path: err.instance_path.to_string(),
    }
}

/// Pattern the meta-schemas put under `propertyNames`.
const RESERVED_NAME_PATTERN: &str = "^(?!__.*)";

fn reserved_property(err: &ValidationError<'_>) -> Option<String> {
    match &err.kind {
        // A propertyNames violation wraps the error raised for the name itself.
        ValidationErrorKind::PropertyNames { error } => reserved_property(error),
        ValidationErrorKind::Pattern { .. } => match err.instance.as_ref() {
            Value::String(name) if name.starts_with(RESERVED_PREFIX) => Some(name.clone()),
            _ => reserved_name_from_message(&err.to_string()),
        },
        _ => reserved_name_from_message(&err.to_string()),
    }
}

/// Recovers the property name from `"<name>" does not match "^(?!__.*)"`.
fn reserved_name_from_message(message: &str) -> Option<String> {
    let suffix = format!(" does not match \"{RESERVED_NAME_PATTERN}\"");
    let quoted = message.strip_suffix(&suffix)?;
    let name: String = serde_json::from_str(quoted).ok()?;
    name.starts_with(RESERVED_PREFIX).then_some(name)
}

/// A compiled validator for instances of one event schema.
///
/// Stateless once built; shared freely between threads.
pub struct InstanceValidator {
    key: SchemaKey,
    inner: Validator,
}

impl InstanceValidator {
    /// Compiles a validator for a document that already passed [`validate_schema`].
    pub fn compile(key: SchemaKey, document: &Value) -> EventResult<Self> {
        let inner = jsonschema::options()
            .with_draft(Draft::Draft7)
            .should_validate_formats(true)
            .build(document)
            .map_err(|e| EventError::SchemaInvalid {
                message: e.to_string(),
                instance_path: e.instance_path.to_string(),
            })?;
        Ok(Self { key, inner })
    }

    /// Validates event data, reporting the first violation.
    pub fn validate(&self, data: &Value) -> EventResult<()> {
        self.inner
            .validate(data)
            .map_err(|e| EventError::EventValidation {
                schema_id: self.key.id.clone(),
                version: self.key.version,
                message: e.to_string(),
                instance_path: e.instance_path.to_string(),
            })
    }

    /// Returns true if the data conforms.
    pub fn is_valid(&self, data: &Value) -> bool {
        self.inner.is_valid(data)
    }
}

impl std::fmt::Debug for InstanceValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceValidator")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(err: EventError) -> String {
        match err {
            EventError::SchemaInvalid { message, .. } => message,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_minimal_schema_is_valid() {
        let schema = json!({
            "$id": "http://test/test",
            "version": 1,
            "properties": {
                "something": {"type": "string", "title": "test"}
            }
        });
        validate_schema(&schema).unwrap();
    }

    #[test]
    fn test_missing_required_keys() {
        for schema in [
            json!({"properties": {}}),
            json!({"$id": "http://test/test", "$version": 1}),
            json!({"$id": "http://test/test", "version": 1}),
            json!({"properties": true}),
        ] {
            let err = validate_schema(&schema).unwrap_err();
            assert!(matches!(err, EventError::SchemaInvalid { .. }), "{schema}");
        }
    }

    #[test]
    fn test_version_must_be_positive() {
        let schema = json!({"$id": "http://test/test", "version": 0, "properties": {}});
        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn test_reserved_property_names_the_property() {
        let schema = json!({
            "$id": "http://test/test",
            "version": 1,
            "properties": {"__badName": {"type": "string"}}
        });
        let msg = message(validate_schema(&schema).unwrap_err());
        assert!(msg.contains("__badName"), "{msg}");
        assert!(msg.contains("reserved"), "{msg}");
    }

    #[test]
    fn test_reserved_property_at_top_level_of_error() {
        let schema = json!({
            "$id": "http://test/test",
            "version": 1,
            "properties": {"__timestamp__": {"type": "string"}}
        });
        let err = validate_schema(&schema).unwrap_err();
        assert!(matches!(err, EventError::SchemaInvalid { .. }));
        let msg = message(err);
        assert!(msg.starts_with("\"__timestamp__\" is an invalid property name"), "{msg}");
        assert!(msg.contains("reserved for the event envelope"), "{msg}");
    }

    #[test]
    fn test_reserved_name_from_message() {
        assert_eq!(
            reserved_name_from_message(r#""__badName" does not match "^(?!__.*)""#),
            Some("__badName".to_string())
        );
        assert_eq!(
            reserved_name_from_message(r#""name" does not match "^[a-z]+$""#),
            None
        );
        assert_eq!(reserved_name_from_message("1 is not of type \"string\""), None);
    }

    #[test]
    fn test_nested_reserved_property() {
        let schema = json!({
            "$id": "http://test/test",
            "version": 1,
            "properties": {
                "thing": {
                    "type": "object",
                    "properties": {"__inner": {"type": "string"}}
                }
            }
        });
        let msg = message(validate_schema(&schema).unwrap_err());
        assert!(msg.contains("__inner"), "{msg}");
        assert!(msg.contains("reserved"), "{msg}");
    }

    #[test]
    fn test_bad_id_is_not_a_uri() {
        let schema = json!({"$id": "not a uri", "version": 1, "properties": {}});
        let msg = message(validate_schema(&schema).unwrap_err());
        assert!(msg.contains("uri"), "{msg}");
    }

    #[test]
    fn test_redaction_policies_must_be_strings() {
        let schema = json!({
            "$id": "http://test/test",
            "version": 1,
            "properties": {"email": {"type": "string", "redactionPolicies": [1, 2]}}
        });
        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn test_instance_validator_enum_and_format() {
        let schema = json!({
            "$id": "http://test/test",
            "version": 1,
            "type": "object",
            "properties": {
                "status": {"enum": ["success", "failure"]},
                "when": {"type": "string", "format": "date-time"}
            }
        });
        let validator = InstanceValidator::compile(SchemaKey::new("http://test/test", 1), &schema).unwrap();

        assert!(validator.is_valid(&json!({"status": "success"})));
        let err = validator.validate(&json!({"status": "hi"})).unwrap_err();
        assert!(matches!(err, EventError::EventValidation { .. }));
        assert!(validator.validate(&json!({"when": "chucknorris"})).is_err());
        assert!(validator.validate(&json!({"when": "2023-05-17T08:30:00Z"})).is_ok());
    }
}

//! Redactors: modifiers that mask or remove selected event fields.
//!
//! A redactor selects fields three ways:
//!
//! - by property name for one schema version (`redact_property`)
//! - by a regular expression that must match the whole property name (`redact_pattern`)
//! - by schema version, which selects every top-level field (`redact_schema`)
//!
//! Property names are matched at any depth. Nested objects and objects
//! inside arrays are walked; objects and arrays themselves are never
//! redacted, only their leaf fields. When a schema has property rules,
//! patterns are not consulted for it.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{EventError, EventResult};
use crate::event::{EventData, SchemaKey};
use crate::modifier::Modifier;

/// Replacement written by a masking redactor unless configured otherwise.
pub const DEFAULT_MASK: &str = "<masked>";

/// What happens to a selected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedactionAction {
    /// Delete the field.
    Remove,
    /// Replace the value with this string.
    Mask(String),
}

/// A [`Modifier`] that masks or removes selected fields before validation.
#[derive(Debug, Clone)]
pub struct Redactor {
    id: String,
    action: RedactionAction,
    properties: BTreeMap<SchemaKey, BTreeSet<String>>,
    patterns: Vec<Regex>,
    schemas: HashSet<SchemaKey>,
}

impl Redactor {
    /// Creates a redactor that deletes selected fields.
    pub fn removal() -> Self {
        Self::new("removal-redactor", RedactionAction::Remove)
    }

    /// Creates a redactor that replaces selected values with [`DEFAULT_MASK`].
    pub fn mask() -> Self {
        Self::new("mask-redactor", RedactionAction::Mask(DEFAULT_MASK.to_string()))
    }

    fn new(id: &str, action: RedactionAction) -> Self {
        Self {
            id: id.to_string(),
            action,
            properties: BTreeMap::new(),
            patterns: Vec::new(),
            schemas: HashSet::new(),
        }
    }

    /// Sets the identifier used in diagnostics.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replaces values with `mask` instead of deleting them.
    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.action = RedactionAction::Mask(mask.into());
        self
    }

    /// Selects `property` in events of one schema version.
    pub fn redact_property(
        mut self,
        schema_id: impl Into<String>,
        version: u32,
        property: impl Into<String>,
    ) -> Self {
        self.properties
            .entry(SchemaKey::new(schema_id, version))
            .or_default()
            .insert(property.into());
        self
    }

    /// Selects every property whose whole name matches `pattern`.
    pub fn redact_pattern(mut self, pattern: &str) -> EventResult<Self> {
        let anchored = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            EventError::Modifier(format!("invalid redaction pattern `{pattern}`: {e}"))
        })?;
        self.patterns.push(anchored);
        Ok(self)
    }

    /// Selects every top-level field of one schema version.
    pub fn redact_schema(mut self, schema_id: impl Into<String>, version: u32) -> Self {
        self.schemas.insert(SchemaKey::new(schema_id, version));
        self
    }

    /// The action applied to selected fields.
    pub fn action(&self) -> &RedactionAction {
        &self.action
    }

    /// Redacts `data` emitted against `schema_id`. A `version` of `None`
    /// matches rules for every version of the schema.
    pub fn redact(&self, schema_id: &str, version: Option<u32>, mut data: EventData) -> EventData {
        let applies = |key: &SchemaKey| key.id == schema_id && version.is_none_or(|v| v == key.version);

        if self.schemas.iter().any(|key| applies(key)) {
            match &self.action {
                RedactionAction::Remove => data.clear(),
                RedactionAction::Mask(mask) => {
                    for value in data.values_mut() {
                        *value = Value::String(mask.clone());
                    }
                }
            }
            return data;
        }

        let named: HashSet<&str> = self
            .properties
            .iter()
            .filter(|(key, _)| applies(key))
            .flat_map(|(_, names)| names.iter().map(String::as_str))
            .collect();
        let selector = if named.is_empty() {
            if self.patterns.is_empty() {
                return data;
            }
            Selector::Patterns(&self.patterns)
        } else {
            Selector::Names(named)
        };

        self.redact_object(&mut data, &selector);
        data
    }

    fn redact_object(&self, object: &mut EventData, selector: &Selector<'_>) {
        let mut removed = Vec::new();
        for (name, value) in object.iter_mut() {
            match value {
                Value::Object(inner) => self.redact_object(inner, selector),
                Value::Array(items) => {
                    for item in items.iter_mut() {
                        if let Value::Object(inner) = item {
                            self.redact_object(inner, selector);
                        }
                    }
                }
                leaf if selector.selects(name) => match &self.action {
                    RedactionAction::Remove => removed.push(name.clone()),
                    RedactionAction::Mask(mask) => *leaf = Value::String(mask.clone()),
                },
                _ => {}
            }
        }
        if !removed.is_empty() {
            object.retain(|name, _| !removed.contains(name));
        }
    }
}

enum Selector<'a> {
    Names(HashSet<&'a str>),
    Patterns(&'a [Regex]),
}

impl Selector<'_> {
    fn selects(&self, name: &str) -> bool {
        match self {
            Selector::Names(names) => names.contains(name),
            Selector::Patterns(patterns) => patterns.iter().any(|p| p.is_match(name)),
        }
    }
}

impl Modifier for Redactor {
    fn id(&self) -> &str {
        &self.id
    }

    fn modify(&self, schema_id: &str, data: EventData) -> EventData {
        self.redact(schema_id, None, data)
    }

    fn modify_versioned(&self, key: &SchemaKey, data: EventData) -> EventData {
        self.redact(&key.id, Some(key.version), data)
    }
}

/// A redactor declared in configuration.
///
/// ```yaml
/// redactors:
///   - action: mask
///     mask_string: "***"
///     redacted_patterns: ["user(name)?"]
///   - action: remove
///     redacted_properties: [["http://myapp.dev/events/login", 1, password]]
///     redacted_schemas: [["http://myapp.dev/events/debug", 1]]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedactorConfig {
    /// What to do with selected fields.
    pub action: RedactorKind,
    /// Replacement for `mask`; defaults to [`DEFAULT_MASK`].
    #[serde(default)]
    pub mask_string: Option<String>,
    /// `(schema_id, version, property)` triples.
    #[serde(default)]
    pub redacted_properties: Vec<(String, u32, String)>,
    /// Full-match property name patterns.
    #[serde(default)]
    pub redacted_patterns: Vec<String>,
    /// `(schema_id, version)` pairs redacted entirely.
    #[serde(default)]
    pub redacted_schemas: Vec<(String, u32)>,
}

/// Action of a configured redactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactorKind {
    /// Delete selected fields.
    Remove,
    /// Mask selected fields.
    Mask,
}

impl RedactorConfig {
    /// Creates the configured redactor.
    pub fn build(&self) -> EventResult<Redactor> {
        let mut redactor = match (self.action, &self.mask_string) {
            (RedactorKind::Remove, Some(_)) => {
                return Err(EventError::Config(
                    "`mask_string` only applies to mask redactors".to_string(),
                ));
            }
            (RedactorKind::Remove, None) => Redactor::removal(),
            (RedactorKind::Mask, Some(mask)) => Redactor::mask().with_mask(mask.clone()),
            (RedactorKind::Mask, None) => Redactor::mask(),
        };
        for (schema_id, version, property) in &self.redacted_properties {
            redactor = redactor.redact_property(schema_id.clone(), *version, property.clone());
        }
        for pattern in &self.redacted_patterns {
            redactor = redactor.redact_pattern(pattern)?;
        }
        for (schema_id, version) in &self.redacted_schemas {
            redactor = redactor.redact_schema(schema_id.clone(), *version);
        }
        Ok(redactor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const USER: &str = "http://event.jupyter.org/user";
    const USER2: &str = "http://event.jupyter.org/user2";

    fn data(value: Value) -> EventData {
        value.as_object().cloned().unwrap()
    }

    fn alice() -> EventData {
        data(json!({"name": "Alice", "username": "jovyan", "hobby": "Coding"}))
    }

    fn user(version: u32) -> SchemaKey {
        SchemaKey::new(USER, version)
    }

    #[test]
    fn test_mask_pattern() {
        let redactor = Redactor::mask().redact_pattern("username").unwrap();
        let out = redactor.modify_versioned(&user(1), alice());
        assert_eq!(
            Value::Object(out),
            json!({"name": "Alice", "username": "<masked>", "hobby": "Coding"})
        );
    }

    #[test]
    fn test_pattern_must_match_whole_name() {
        let redactor = Redactor::removal().redact_pattern("user").unwrap();
        let out = redactor.modify_versioned(&user(1), alice());
        assert_eq!(out["username"], "jovyan");

        let redactor = Redactor::removal().redact_pattern("user.*").unwrap();
        let out = redactor.modify_versioned(&user(1), alice());
        assert!(!out.contains_key("username"));
    }

    #[test]
    fn test_mask_properties_only_for_their_schema() {
        let redactor = Redactor::mask().redact_property(USER, 1, "username");

        let out = redactor.modify_versioned(&user(1), alice());
        assert_eq!(out["username"], "<masked>");
        assert_eq!(out["hobby"], "Coding");
        assert_eq!(out["name"], "Alice");

        let out = redactor.modify_versioned(&SchemaKey::new(USER2, 1), alice());
        assert_eq!(out, alice());

        let out = redactor.modify_versioned(&user(2), alice());
        assert_eq!(out, alice());
    }

    #[test]
    fn test_mask_whole_schema() {
        let redactor = Redactor::mask().redact_schema(USER, 1);

        let out = redactor.modify_versioned(&user(1), alice());
        assert_eq!(
            Value::Object(out),
            json!({"name": "<masked>", "username": "<masked>", "hobby": "<masked>"})
        );
        assert_eq!(redactor.modify_versioned(&SchemaKey::new(USER2, 1), alice()), alice());
    }

    #[test]
    fn test_removal_pattern() {
        let redactor = Redactor::removal().redact_pattern("username").unwrap();
        let out = redactor.modify_versioned(&user(1), alice());
        assert_eq!(Value::Object(out), json!({"name": "Alice", "hobby": "Coding"}));
    }

    #[test]
    fn test_removal_whole_schema() {
        let redactor = Redactor::removal().redact_schema(USER, 1);
        assert!(redactor.modify_versioned(&user(1), alice()).is_empty());
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let redactor = Redactor::mask().with_mask("***").redact_pattern("email").unwrap();
        let out = redactor.modify_versioned(
            &user(1),
            data(json!({
                "email": "top@example.com",
                "profile": {"email": "nested@example.com", "age": 3},
                "contacts": [{"email": "a@example.com"}, {"email": "b@example.com"}, "plain"]
            })),
        );
        assert_eq!(
            Value::Object(out),
            json!({
                "email": "***",
                "profile": {"email": "***", "age": 3},
                "contacts": [{"email": "***"}, {"email": "***"}, "plain"]
            })
        );
    }

    #[test]
    fn test_containers_are_not_redacted() {
        let redactor = Redactor::removal().redact_pattern("profile").unwrap();
        let input = data(json!({"profile": {"name": "x"}, "tags": ["a"]}));
        assert_eq!(redactor.modify_versioned(&user(1), input.clone()), input);
    }

    #[test]
    fn test_removal_keeps_field_order() {
        let redactor = Redactor::removal().redact_property(USER, 1, "b");
        let out = redactor.modify_versioned(&user(1), data(json!({"a": 1, "b": 2, "c": 3, "d": 4})));
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_schema_properties_take_precedence_over_patterns() {
        let redactor = Redactor::removal()
            .redact_property(USER, 1, "name")
            .redact_pattern("username")
            .unwrap();

        let out = redactor.modify_versioned(&user(1), alice());
        assert!(!out.contains_key("name"));
        assert_eq!(out["username"], "jovyan");

        // Schemas without property rules fall back to the patterns.
        let out = redactor.modify_versioned(&SchemaKey::new(USER2, 1), alice());
        assert!(!out.contains_key("username"));
        assert_eq!(out["name"], "Alice");
    }

    #[test]
    fn test_unversioned_modify_matches_every_version() {
        let redactor = Redactor::mask().redact_property(USER, 3, "username");
        let out = redactor.modify(USER, alice());
        assert_eq!(out["username"], "<masked>");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Redactor::mask().redact_pattern("(unclosed").unwrap_err();
        assert!(matches!(err, EventError::Modifier(ref msg) if msg.contains("(unclosed")));
    }

    #[test]
    fn test_config_builds_redactor() {
        let config: RedactorConfig = serde_yaml::from_str(
            r####"
action: mask
mask_string: "###"
redacted_properties:
  - ["http://event.jupyter.org/user", 1, username]
redacted_schemas:
  - ["http://event.jupyter.org/user2", 1]
"####,
        )
        .unwrap();
        let redactor = config.build().unwrap();

        assert_eq!(redactor.action(), &RedactionAction::Mask("###".to_string()));
        assert_eq!(redactor.modify_versioned(&user(1), alice())["username"], "###");
        assert_eq!(
            redactor.modify_versioned(&SchemaKey::new(USER2, 1), alice())["name"],
            "###"
        );
    }

    #[test]
    fn test_config_rejects_mask_string_for_removal() {
        let config: RedactorConfig =
            serde_yaml::from_str("action: remove\nmask_string: x\n").unwrap();
        assert!(matches!(config.build().unwrap_err(), EventError::Config(_)));

        let config: RedactorConfig =
            serde_yaml::from_str("action: remove\nredacted_patterns: ['(']\n").unwrap();
        assert!(matches!(config.build().unwrap_err(), EventError::Modifier(_)));
    }
}

//! Loading schema documents from values, files and inline text.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::EventSchema;
use crate::{EventError, EventResult};

/// Anything a schema can be registered from.
#[derive(Debug)]
pub enum SchemaSource {
    /// An already parsed document.
    Document(Value),
    /// A JSON or YAML file on disk.
    Path(PathBuf),
    /// Serialized JSON or YAML text.
    Text(String),
    /// A schema that was already constructed and validated.
    Schema(EventSchema),
}

impl SchemaSource {
    /// Creates a source from serialized JSON or YAML text.
    pub fn text(text: impl Into<String>) -> Self {
        SchemaSource::Text(text.into())
    }

    /// Interprets a command-line style argument as either a path or inline text.
    ///
    /// The argument is a path if a file exists there, or if it carries a
    /// schema file extension (so a missing file is reported as absent rather
    /// than as unparsable text).
    pub fn infer(arg: &str) -> Self {
        let path = Path::new(arg);
        if path.is_file() || has_schema_extension(path) {
            SchemaSource::Path(path.to_path_buf())
        } else {
            SchemaSource::Text(arg.to_string())
        }
    }

    /// Loads the raw document without validating it.
    pub fn load(&self) -> EventResult<Value> {
        match self {
            SchemaSource::Document(value) => ensure_mapping(value.clone(), "schema document"),
            SchemaSource::Path(path) => load_file(path),
            SchemaSource::Text(text) => parse_document(text, "inline schema"),
            SchemaSource::Schema(schema) => Ok(schema.document().clone()),
        }
    }
}

impl From<Value> for SchemaSource {
    fn from(value: Value) -> Self {
        SchemaSource::Document(value)
    }
}

impl From<PathBuf> for SchemaSource {
    fn from(path: PathBuf) -> Self {
        SchemaSource::Path(path)
    }
}

impl From<&Path> for SchemaSource {
    fn from(path: &Path) -> Self {
        SchemaSource::Path(path.to_path_buf())
    }
}

impl From<EventSchema> for SchemaSource {
    fn from(schema: EventSchema) -> Self {
        SchemaSource::Schema(schema)
    }
}

fn has_schema_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json" | "yaml" | "yml")
    )
}

/// Reads and parses a schema file. JSON files go through the YAML parser too.
pub fn load_file(path: &Path) -> EventResult<Value> {
    if !path.exists() {
        return Err(EventError::SchemaFileAbsent(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| {
        EventError::SchemaLoading(format!("failed to read {}: {}", path.display(), e))
    })?;
    parse_document(&text, &path.display().to_string())
}

/// Parses JSON or YAML text into a mapping.
pub fn parse_document(text: &str, origin: &str) -> EventResult<Value> {
    let value: Value = serde_yaml::from_str(text)
        .map_err(|e| EventError::SchemaLoading(format!("could not parse {}: {}", origin, e)))?;
    ensure_mapping(value, origin)
}

fn ensure_mapping(value: Value, origin: &str) -> EventResult<Value> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(EventError::SchemaLoading(format!(
            "{} did not deserialize into a mapping",
            origin
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = "$id: http://test/test\nversion: 1\nproperties: {}\n";
        let json = r#"{"$id": "http://test/test", "version": 1, "properties": {}}"#;

        assert_eq!(parse_document(yaml, "yaml").unwrap(), parse_document(json, "json").unwrap());
    }

    #[test]
    fn test_scalar_text_is_loading_error() {
        let err = SchemaSource::text("random string").load().unwrap_err();
        assert!(matches!(err, EventError::SchemaLoading(_)));
    }

    #[test]
    fn test_missing_file_is_absent() {
        let err = SchemaSource::infer("non/existent/path/file.yaml").load().unwrap_err();
        assert!(matches!(err, EventError::SchemaFileAbsent(_)));
    }

    #[test]
    fn test_infer_inline_text() {
        let source = SchemaSource::infer("{\"$id\": \"http://test/test\"}");
        assert!(matches!(source, SchemaSource::Text(_)));
    }

    #[test]
    fn test_load_file_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "$id: http://test/test\nversion: 1\nproperties:\n  prop:\n    type: string").unwrap();

        let doc = SchemaSource::infer(file.path().to_str().unwrap()).load().unwrap();
        assert_eq!(doc["properties"]["prop"], json!({"type": "string"}));
    }

    #[test]
    fn test_invalid_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "- just\n- a\n- list").unwrap();

        let err = load_file(file.path()).unwrap_err();
        assert!(matches!(err, EventError::SchemaLoading(_)));
    }
}

//! Redaction policies: which fields each policy governs, and how to strip them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::EventData;

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A literal property name.
    Key(String),
    /// Every element of the array at this position.
    EachItem,
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::EachItem => f.write_str("[]"),
        }
    }
}

/// A path from the event root to a governed field.
pub type FieldPath = Vec<PathSegment>;

/// Maps each redaction policy to the field paths it governs, in schema order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedactionIndex {
    policies: BTreeMap<String, Vec<FieldPath>>,
}

impl RedactionIndex {
    /// Builds the index from a schema document that passed meta-schema validation.
    pub fn from_schema(document: &Value) -> Self {
        let mut index = Self::default();
        if let Some(properties) = document.get("properties").and_then(Value::as_object) {
            index.walk(properties, &mut Vec::new());
        }
        index
    }

    // Depth-first, in document order. Array-typed properties continue into
    // `items.properties` behind an `EachItem` segment.
    fn walk(&mut self, properties: &Map<String, Value>, prefix: &mut FieldPath) {
        for (name, property) in properties {
            prefix.push(PathSegment::Key(name.clone()));

            if let Some(policies) = property.get("redactionPolicies").and_then(Value::as_array) {
                for policy in policies.iter().filter_map(Value::as_str) {
                    self.policies
                        .entry(policy.to_string())
                        .or_default()
                        .push(prefix.clone());
                }
            }

            if let Some(nested) = property.get("properties").and_then(Value::as_object) {
                self.walk(nested, prefix);
            }

            if let Some(nested) = property
                .get("items")
                .and_then(|items| items.get("properties"))
                .and_then(Value::as_object)
            {
                prefix.push(PathSegment::EachItem);
                self.walk(nested, prefix);
                prefix.pop();
            }

            prefix.pop();
        }
    }

    /// Returns the paths governed by a policy.
    pub fn paths(&self, policy: &str) -> &[FieldPath] {
        self.policies.get(policy).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns every policy named by the schema.
    pub fn policies(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    /// Returns true if the schema declares no redaction policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Removes every field governed by the selected policies, in place.
    pub fn enforce(&self, data: &mut EventData, redacted: &RedactedPolicies) {
        for (policy, paths) in &self.policies {
            if !redacted.includes(policy) {
                continue;
            }
            for path in paths {
                remove_path(data, path);
            }
        }
    }
}

/// Removes the field at `path`. Missing intermediate keys are ignored.
pub fn remove_path(data: &mut EventData, path: &[PathSegment]) {
    match path {
        [] => {}
        [PathSegment::Key(key)] => {
            data.remove(key);
        }
        [PathSegment::Key(key), rest @ ..] => {
            if let Some(child) = data.get_mut(key) {
                remove_in_value(child, rest);
            }
        }
        // An object has no elements to iterate.
        [PathSegment::EachItem, ..] => {}
    }
}

fn remove_in_value(value: &mut Value, path: &[PathSegment]) {
    match (path, value) {
        ([PathSegment::EachItem, rest @ ..], Value::Array(items)) => {
            for item in items {
                remove_in_value(item, rest);
            }
        }
        (path, Value::Object(map)) => remove_path(map, path),
        _ => {}
    }
}

/// Which redaction policies a registry strips from every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicies", into = "RawPolicies")]
pub enum RedactedPolicies {
    /// Strip every policy a schema declares.
    All,
    /// Strip only the named policies.
    Only(BTreeSet<String>),
}

impl RedactedPolicies {
    /// Redacts nothing.
    pub fn none() -> Self {
        RedactedPolicies::Only(BTreeSet::new())
    }

    /// Redacts the named policies.
    pub fn only<I, S>(policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RedactedPolicies::Only(policies.into_iter().map(Into::into).collect())
    }

    /// Returns true if fields under `policy` must be stripped.
    pub fn includes(&self, policy: &str) -> bool {
        match self {
            RedactedPolicies::All => true,
            RedactedPolicies::Only(set) => set.contains(policy),
        }
    }

    /// Returns true if nothing is redacted.
    pub fn is_empty(&self) -> bool {
        matches!(self, RedactedPolicies::Only(set) if set.is_empty())
    }
}

impl Default for RedactedPolicies {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawPolicies {
    Keyword(String),
    List(BTreeSet<String>),
}

impl TryFrom<RawPolicies> for RedactedPolicies {
    type Error = String;

    fn try_from(raw: RawPolicies) -> Result<Self, Self::Error> {
        match raw {
            RawPolicies::Keyword(word) if word == "all" => Ok(RedactedPolicies::All),
            RawPolicies::Keyword(word) => Err(format!(
                "expected \"all\" or a list of policy names, got {:?}",
                word
            )),
            RawPolicies::List(set) => Ok(RedactedPolicies::Only(set)),
        }
    }
}

impl From<RedactedPolicies> for RawPolicies {
    fn from(policies: RedactedPolicies) -> Self {
        match policies {
            RedactedPolicies::All => RawPolicies::Keyword("all".to_string()),
            RedactedPolicies::Only(set) => RawPolicies::List(set),
        }
    }
}

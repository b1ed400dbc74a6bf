//! Signature descriptors for user callbacks.
//!
//! Modifiers and listeners describe their parameter list through a
//! [`CallbackSignature`]. The logger compares it with the expected shape
//! once, when the callback is added, and rejects anything that differs.

use std::borrow::Cow;

/// What a callback parameter carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// The emitting `EventLogger`.
    Logger,
    /// The event's schema `$id`.
    SchemaId,
    /// The event payload.
    Data,
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamKind::Logger => "EventLogger",
            ParamKind::SchemaId => "str",
            ParamKind::Data => "EventData",
        };
        f.write_str(name)
    }
}

/// A named, typed callback parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name.
    pub name: Cow<'static, str>,
    /// Parameter kind.
    pub kind: ParamKind,
}

impl Param {
    /// Creates a parameter.
    pub fn new(name: impl Into<Cow<'static, str>>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered parameter list of a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackSignature {
    params: Vec<Param>,
}

impl CallbackSignature {
    /// Creates a signature from its parameters.
    pub fn new(params: impl IntoIterator<Item = Param>) -> Self {
        Self {
            params: params.into_iter().collect(),
        }
    }

    /// `(schema_id, data)`: the shape every modifier must have.
    pub fn modifier() -> Self {
        Self::new([
            Param::new("schema_id", ParamKind::SchemaId),
            Param::new("data", ParamKind::Data),
        ])
    }

    /// `(logger, schema_id, data)`: the shape every listener must have.
    pub fn listener() -> Self {
        Self::new([
            Param::new("logger", ParamKind::Logger),
            Param::new("schema_id", ParamKind::SchemaId),
            Param::new("data", ParamKind::Data),
        ])
    }

    /// The parameters, in order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Checks `actual` against this expected shape: arity, then each name and kind.
    pub fn check(&self, actual: &CallbackSignature) -> Result<(), String> {
        if self.params.len() != actual.params.len() {
            return Err(format!(
                "expected {} parameters {}, found {} {}",
                self.params.len(),
                self,
                actual.params.len(),
                actual
            ));
        }
        for (position, (expected, found)) in self.params.iter().zip(&actual.params).enumerate() {
            if expected != found {
                return Err(format!(
                    "parameter {} must be `{}: {}`, found `{}: {}`",
                    position, expected.name, expected.kind, found.name, found.kind
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for CallbackSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", param.name, param.kind)?;
        }
        f.write_str(")")
    }
}

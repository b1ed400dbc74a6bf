//! Logger configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::runtime::Handle;

use crate::error::{EventError, EventResult};
use crate::redactor::RedactorConfig;
use crate::schema::RedactedPolicies;
use crate::sink::{EventSink, JsonLinesSink, TracingSink};

/// Configuration for an [`EventLogger`](crate::EventLogger).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventLoggerConfig {
    /// Policies stripped from every emitted event.
    pub redacted_policies: RedactedPolicies,

    /// Sinks created when the logger is built.
    pub sinks: Vec<SinkConfig>,

    /// Schema files registered when the logger is built.
    pub schemas: Vec<PathBuf>,

    /// Redactors added to the modifier chain, in order, when the logger is built.
    pub redactors: Vec<RedactorConfig>,

    /// Whether to warn (once per key) about events for unregistered schemas.
    pub warn_unregistered: bool,

    /// Runtime used to spawn listener tasks. Defaults to the ambient runtime.
    #[serde(skip)]
    pub runtime: Option<Handle>,
}

impl Default for EventLoggerConfig {
    fn default() -> Self {
        Self {
            redacted_policies: RedactedPolicies::none(),
            sinks: Vec::new(),
            schemas: Vec::new(),
            redactors: Vec::new(),
            warn_unregistered: true,
            runtime: None,
        }
    }
}

impl EventLoggerConfig {
    /// Reads a YAML or JSON configuration file.
    pub fn from_file(path: &Path) -> EventResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EventError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Parses YAML or JSON configuration text.
    pub fn parse(text: &str) -> EventResult<Self> {
        serde_yaml::from_str(text).map_err(|e| EventError::Config(e.to_string()))
    }

    /// Sets the redacted policies.
    pub fn with_redacted_policies(mut self, policies: RedactedPolicies) -> Self {
        self.redacted_policies = policies;
        self
    }

    /// Adds a sink.
    pub fn with_sink(mut self, sink: SinkConfig) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Adds a schema file.
    pub fn with_schema(mut self, path: impl Into<PathBuf>) -> Self {
        self.schemas.push(path.into());
        self
    }

    /// Adds a redactor.
    pub fn with_redactor(mut self, redactor: RedactorConfig) -> Self {
        self.redactors.push(redactor);
        self
    }

    /// Spawns listener tasks on the given runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

/// A sink declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    /// JSON lines appended to a file.
    Jsonl {
        /// Output file.
        path: PathBuf,
    },
    /// JSON lines on standard output.
    Stdout,
    /// Capsules logged through `tracing`.
    Tracing,
}

impl SinkConfig {
    /// Creates the configured sink.
    pub fn build(&self) -> EventResult<Arc<dyn EventSink>> {
        Ok(match self {
            SinkConfig::Jsonl { path } => Arc::new(JsonLinesSink::append_to(path)?),
            SinkConfig::Stdout => Arc::new(JsonLinesSink::stdout()),
            SinkConfig::Tracing => Arc::new(TracingSink::new()),
        })
    }
}

//! Sinks: destinations that receive emitted capsules.

use std::fs::OpenOptions;
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{EventError, EventResult};
use crate::event::{Capsule, EventData};

/// Receives one structured record per emitted event.
pub trait EventSink: Send + Sync {
    /// Returns an identifier used in diagnostics.
    fn id(&self) -> &str {
        "anonymous"
    }

    /// Writes a capsule.
    fn write(&self, capsule: &Capsule) -> EventResult<()>;
}

/// Keeps capsules in memory. Useful for tests.
#[derive(Default)]
pub struct MemorySink {
    capsules: Mutex<Vec<Capsule>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything written so far.
    pub fn capsules(&self) -> Vec<Capsule> {
        self.lock().clone()
    }

    /// Drains and returns everything written so far.
    pub fn take(&self) -> Vec<Capsule> {
        std::mem::take(&mut *self.lock())
    }

    /// Drains the captured capsules as flat JSON records.
    pub fn take_records(&self) -> Vec<EventData> {
        self.take().iter().map(Capsule::to_record).collect()
    }

    /// Number of captured capsules.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Capsule>> {
        self.capsules.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for MemorySink {
    fn id(&self) -> &str {
        "memory"
    }

    fn write(&self, capsule: &Capsule) -> EventResult<()> {
        self.lock().push(capsule.clone());
        Ok(())
    }
}

/// Writes each capsule as one line of JSON.
pub struct JsonLinesSink {
    id: String,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    /// Wraps any writer.
    pub fn new(id: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            id: id.into(),
            writer: Mutex::new(Box::new(LineWriter::new(writer))),
        }
    }

    /// Appends to a file, creating it if needed.
    pub fn append_to(path: &Path) -> EventResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| EventError::Sink(format!("cannot open {}: {}", path.display(), e)))?;
        Ok(Self::new(path.display().to_string(), file))
    }

    /// Writes to standard output.
    pub fn stdout() -> Self {
        Self::new("stdout", std::io::stdout())
    }
}

impl EventSink for JsonLinesSink {
    fn id(&self) -> &str {
        &self.id
    }

    fn write(&self, capsule: &Capsule) -> EventResult<()> {
        let line = capsule.to_json()?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)
            .and_then(|()| writer.flush())
            .map_err(|e| EventError::Sink(format!("{}: {}", self.id, e)))
    }
}

/// Logs each capsule through `tracing` on the `schema_events::capsule` target.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Creates a new tracing sink.
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingSink {
    fn id(&self) -> &str {
        "tracing"
    }

    fn write(&self, capsule: &Capsule) -> EventResult<()> {
        let json = capsule.to_json()?;
        tracing::info!(
            target: "schema_events::capsule",
            schema = %capsule.schema,
            version = capsule.schema_version,
            capsule = %json
        );
        Ok(())
    }
}

//! Test fixture: a logger that captures everything it emits.

use std::ops::Deref;
use std::sync::Arc;

use schema_events::{
    EventData, EventLogger, EventLoggerConfig, EventResult, MemorySink, SchemaSource,
};

/// An [`EventLogger`] with a [`MemorySink`] attached.
///
/// Dereferences to the logger, so every logger operation is available.
#[derive(Clone)]
pub struct TestEventLogger {
    logger: EventLogger,
    sink: Arc<MemorySink>,
}

impl TestEventLogger {
    /// Creates a fixture with default configuration.
    pub fn new() -> Self {
        Self::attach(EventLogger::new())
    }

    /// Creates a fixture from configuration. Configured sinks stay attached.
    pub fn with_config(config: EventLoggerConfig) -> EventResult<Self> {
        Ok(Self::attach(EventLogger::with_config(config)?))
    }

    fn attach(logger: EventLogger) -> Self {
        let sink = Arc::new(MemorySink::new());
        logger.register_handler(sink.clone());
        Self { logger, sink }
    }

    /// Registers a schema and returns the fixture.
    pub fn with_schema(self, source: impl Into<SchemaSource>) -> EventResult<Self> {
        self.logger.register_event_schema(source)?;
        Ok(self)
    }

    /// Returns the wrapped logger.
    pub fn logger(&self) -> &EventLogger {
        &self.logger
    }

    /// Returns the capturing sink.
    pub fn sink(&self) -> &Arc<MemorySink> {
        &self.sink
    }

    /// Drains the captured capsules as flat JSON records.
    pub fn read_emitted_events(&self) -> Vec<EventData> {
        self.sink.take_records()
    }

    /// Number of capsules captured and not yet read.
    pub fn emitted_count(&self) -> usize {
        self.sink.len()
    }

    /// Waits for every scheduled listener to finish.
    pub async fn settle(&self) {
        self.logger.gather_listeners().await;
    }
}

impl Default for TestEventLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestEventLogger {
    type Target = EventLogger;

    fn deref(&self) -> &Self::Target {
        &self.logger
    }
}

impl std::fmt::Debug for TestEventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestEventLogger")
            .field("logger", &self.logger)
            .field("captured", &self.sink.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_events::{Event, RedactedPolicies};
    use serde_json::json;

    fn schema() -> serde_json::Value {
        json!({
            "$id": "http://myapp.dev/events/login",
            "version": 1,
            "properties": {
                "user": {"type": "string", "redactionPolicies": ["user-identifier"]},
                "ok": {"type": "boolean"}
            }
        })
    }

    #[test]
    fn test_read_emitted_events_drains() {
        let fixture = TestEventLogger::new().with_schema(schema()).unwrap();
        fixture
            .emit(Event::from_value(
                "http://myapp.dev/events/login",
                1,
                json!({"user": "alice", "ok": true}),
            )
            .unwrap())
            .unwrap();

        assert_eq!(fixture.emitted_count(), 1);
        let events = fixture.read_emitted_events();
        assert_eq!(events[0]["__schema__"], "http://myapp.dev/events/login");
        assert_eq!(events[0]["user"], "alice");
        assert_eq!(fixture.emitted_count(), 0);
    }

    #[test]
    fn test_with_config_redacts() {
        let config = EventLoggerConfig::default()
            .with_redacted_policies(RedactedPolicies::only(["user-identifier"]));
        let fixture = TestEventLogger::with_config(config)
            .unwrap()
            .with_schema(schema())
            .unwrap();
        fixture
            .emit(Event::from_value(
                "http://myapp.dev/events/login",
                1,
                json!({"user": "alice", "ok": false}),
            )
            .unwrap())
            .unwrap();

        let events = fixture.read_emitted_events();
        assert!(!events[0].contains_key("user"));
        assert_eq!(events[0]["ok"], false);
    }
}

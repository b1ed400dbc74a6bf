//! The event logger: validates, redacts, envelopes and routes events.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::Span;

use crate::config::EventLoggerConfig;
use crate::error::EventResult;
use crate::event::{Capsule, EmitOutcome, Event, EventData, SchemaKey};
use crate::listener::{ActiveListeners, EventListener, ListenerMode, ListenerTable};
use crate::modifier::{Modifier, ModifierChain};
use crate::schema::{EventSchema, RedactedPolicies, SchemaRegistry, SchemaSource};
use crate::sink::EventSink;

/// Emits schema-validated events to sinks and listeners.
///
/// Cloning is cheap and yields a handle to the same logger. Each logger
/// records its own diagnostics inside a dedicated `event_logger` span
/// carrying its unique name, so two loggers never share output.
#[derive(Clone)]
pub struct EventLogger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    name: String,
    span: Span,
    schemas: RwLock<SchemaRegistry>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    modifiers: RwLock<ModifierChain>,
    listeners: RwLock<ListenerTable>,
    active: ActiveListeners,
    /// Unregistered keys that were already warned about.
    warned: Mutex<HashSet<SchemaKey>>,
    warn_unregistered: bool,
    runtime: Option<Handle>,
}

impl EventLogger {
    /// Creates a logger with no sinks, no schemas and no redaction.
    pub fn new() -> Self {
        Self::build(&EventLoggerConfig::default())
    }

    /// Creates a logger from configuration, building its sinks and redactors
    /// and registering its schema files.
    pub fn with_config(config: EventLoggerConfig) -> EventResult<Self> {
        let logger = Self::build(&config);
        for sink in &config.sinks {
            logger.register_handler(sink.build()?);
        }
        for path in &config.schemas {
            logger.register_event_schema(path.as_path())?;
        }
        for redactor in &config.redactors {
            logger.add_modifier(Arc::new(redactor.build()?))?;
        }
        Ok(logger)
    }

    fn build(config: &EventLoggerConfig) -> Self {
        let name = format!("schema_events.logger.{}", uuid::Uuid::new_v4());
        let span = tracing::info_span!("event_logger", logger = %name);
        Self {
            inner: Arc::new(LoggerInner {
                name,
                span,
                schemas: RwLock::new(SchemaRegistry::with_redacted_policies(
                    config.redacted_policies.clone(),
                )),
                sinks: RwLock::new(Vec::new()),
                modifiers: RwLock::new(ModifierChain::new()),
                listeners: RwLock::new(ListenerTable::new()),
                active: ActiveListeners::new(),
                warned: Mutex::new(HashSet::new()),
                warn_unregistered: config.warn_unregistered,
                runtime: config.runtime.clone(),
            }),
        }
    }

    /// Unique name of this logger instance.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The span all diagnostics of this logger are recorded in.
    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    // --- Schemas ---

    /// Registers an event schema from a document, path, inline text or prebuilt schema.
    pub fn register_event_schema(
        &self,
        source: impl Into<SchemaSource>,
    ) -> EventResult<Arc<EventSchema>> {
        let _entered = self.inner.span.enter();
        self.write_schemas().register(source)
    }

    /// Removes a registered schema.
    pub fn remove_event_schema(&self, schema_id: &str, version: u32) -> EventResult<()> {
        let _entered = self.inner.span.enter();
        self.write_schemas()
            .remove(&SchemaKey::new(schema_id, version))
            .map(|_| ())
    }

    /// Looks up a registered schema.
    pub fn schema(&self, schema_id: &str, version: u32) -> EventResult<Arc<EventSchema>> {
        self.read_schemas().get(&SchemaKey::new(schema_id, version))
    }

    /// Returns true if the schema is registered.
    pub fn has_schema(&self, schema_id: &str, version: u32) -> bool {
        self.read_schemas().contains(&SchemaKey::new(schema_id, version))
    }

    /// Registered schema keys, sorted.
    pub fn schema_keys(&self) -> Vec<SchemaKey> {
        self.read_schemas().keys()
    }

    /// Validates data against a registered schema without emitting anything.
    pub fn validate_event(&self, schema_id: &str, version: u32, data: &Value) -> EventResult<()> {
        self.read_schemas()
            .validate_event(&SchemaKey::new(schema_id, version), data)
    }

    /// Policies stripped from every emitted event.
    pub fn redacted_policies(&self) -> RedactedPolicies {
        self.read_schemas().redacted_policies().clone()
    }

    // --- Sinks ---

    /// Adds a sink.
    pub fn register_handler(&self, sink: Arc<dyn EventSink>) {
        let mut sinks = self.write_sinks();
        if !sinks.iter().any(|s| Arc::ptr_eq(s, &sink)) {
            tracing::debug!(parent: &self.inner.span, sink = sink.id(), "Registered sink");
            sinks.push(sink);
        }
    }

    /// Removes a sink by identity. Unknown sinks are ignored.
    pub fn remove_handler(&self, sink: &Arc<dyn EventSink>) {
        self.write_sinks().retain(|s| !Arc::ptr_eq(s, sink));
    }

    /// Number of registered sinks.
    pub fn handler_count(&self) -> usize {
        self.read_sinks().len()
    }

    // --- Modifiers ---

    /// Appends a modifier. Rejects callbacks whose signature does not match.
    pub fn add_modifier(&self, modifier: Arc<dyn Modifier>) -> EventResult<()> {
        self.write_modifiers().add(modifier)
    }

    /// Removes a modifier. Unknown modifiers are ignored.
    pub fn remove_modifier(&self, modifier: &Arc<dyn Modifier>) {
        self.write_modifiers().remove(modifier);
    }

    /// Number of registered modifiers.
    pub fn modifier_count(&self) -> usize {
        self.read_modifiers().len()
    }

    // --- Listeners ---

    /// Registers a listener for every version of a schema id.
    pub fn add_listener(
        &self,
        schema_id: &str,
        listener: Arc<dyn EventListener>,
        mode: ListenerMode,
    ) -> EventResult<()> {
        self.write_listeners().add(schema_id, listener, mode)
    }

    /// Removes a listener from every schema id it was registered under.
    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>) {
        self.write_listeners().remove(listener);
    }

    /// Number of listener invocations still in flight.
    pub fn active_listener_count(&self) -> usize {
        self.inner.active.len()
    }

    /// Waits for every scheduled listener invocation to finish.
    pub async fn gather_listeners(&self) {
        self.inner.active.gather().await;
    }

    // --- Emission ---

    /// Emits an event.
    ///
    /// Returns early when nothing would observe the event, and skips events
    /// whose schema is not registered. Validation errors abort the emit:
    /// nothing is written and no listener is scheduled.
    pub fn emit(&self, event: Event) -> EventResult<EmitOutcome> {
        let _entered = self.inner.span.enter();
        let Event {
            schema_id,
            version,
            data,
            timestamp,
        } = event;
        let key = SchemaKey::new(schema_id, version);

        let (modified_listeners, unmodified_listeners) = {
            let listeners = self.read_listeners();
            (
                listeners.get(&key.id, ListenerMode::Modified).to_vec(),
                listeners.get(&key.id, ListenerMode::Unmodified).to_vec(),
            )
        };
        let sinks = self.read_sinks().clone();
        if sinks.is_empty() && modified_listeners.is_empty() && unmodified_listeners.is_empty() {
            return Ok(EmitOutcome::NoSinks);
        }

        if !self.read_schemas().contains(&key) {
            self.warn_unregistered(&key);
            return Ok(EmitOutcome::UnregisteredSchema);
        }

        let original = if unmodified_listeners.is_empty() {
            None
        } else {
            Some(Value::Object(data.clone()))
        };
        let mut data = self.read_modifiers().apply(&key, data);

        {
            let schemas = self.read_schemas();
            if let Some(original) = &original {
                schemas.validate_event(&key, original)?;
            }
            schemas.process_event(&key, &mut data)?;
        }

        let modified = if modified_listeners.is_empty() {
            None
        } else {
            Some(data.clone())
        };

        let capsule = Capsule::new(&key, data, timestamp.unwrap_or_else(Utc::now));
        for sink in &sinks {
            if let Err(err) = sink.write(&capsule) {
                tracing::error!(sink = sink.id(), schema_id = %key.id, error = %err, "Sink write failed");
            }
        }
        drop(capsule);

        let mut scheduled = 0;
        if let Some(data) = modified {
            scheduled += self.schedule(&key.id, modified_listeners, data);
        }
        if let Some(Value::Object(data)) = original {
            scheduled += self.schedule(&key.id, unmodified_listeners, data);
        }

        tracing::debug!(schema_id = %key.id, version = key.version, listeners = scheduled, "Emitted event");
        Ok(EmitOutcome::Emitted {
            listeners_scheduled: scheduled,
        })
    }

    fn schedule(
        &self,
        schema_id: &str,
        listeners: Vec<Arc<dyn EventListener>>,
        data: EventData,
    ) -> usize {
        let Some(runtime) = self.runtime() else {
            tracing::error!(
                schema_id,
                listeners = listeners.len(),
                "No tokio runtime available; listeners were not scheduled"
            );
            return 0;
        };

        let data = Arc::new(data);
        let count = listeners.len();
        for listener in listeners {
            let logger = self.clone();
            let schema_id = schema_id.to_string();
            let data = data.clone();
            let label = format!("{}:{}", listener.id(), schema_id);

            self.inner.active.spawn(&runtime, label, async move {
                if let Err(err) = listener.on_event(&logger, &schema_id, &data).await {
                    tracing::error!(
                        listener = listener.id(),
                        schema_id = %schema_id,
                        error = %err,
                        "Event listener failed"
                    );
                }
            });
        }
        count
    }

    fn runtime(&self) -> Option<Handle> {
        self.inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    fn warn_unregistered(&self, key: &SchemaKey) {
        if !self.inner.warn_unregistered {
            return;
        }
        let first = self
            .inner
            .warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        if first {
            tracing::warn!(
                schema_id = %key.id,
                version = key.version,
                "Event schema is not registered; events for it are not emitted"
            );
        }
    }

    fn read_schemas(&self) -> RwLockReadGuard<'_, SchemaRegistry> {
        self.inner.schemas.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_schemas(&self) -> RwLockWriteGuard<'_, SchemaRegistry> {
        self.inner.schemas.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_sinks(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn EventSink>>> {
        self.inner.sinks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sinks(&self) -> RwLockWriteGuard<'_, Vec<Arc<dyn EventSink>>> {
        self.inner.sinks.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_modifiers(&self) -> RwLockReadGuard<'_, ModifierChain> {
        self.inner.modifiers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_modifiers(&self) -> RwLockWriteGuard<'_, ModifierChain> {
        self.inner.modifiers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_listeners(&self) -> RwLockReadGuard<'_, ListenerTable> {
        self.inner.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_listeners(&self) -> RwLockWriteGuard<'_, ListenerTable> {
        self.inner.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("name", &self.inner.name)
            .field("schemas", &self.schema_keys())
            .field("sinks", &self.handler_count())
            .field("active_listeners", &self.active_listener_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::FnModifier;
    use crate::sink::MemorySink;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schema() -> Value {
        json!({
            "$id": "http://test/test",
            "version": 1,
            "type": "object",
            "properties": {"something": {"type": "string"}}
        })
    }

    fn event(value: Value) -> Event {
        Event::from_value("http://test/test", 1, value).unwrap()
    }

    #[test]
    fn test_no_sinks_skips_pipeline() {
        let logger = EventLogger::new();
        logger.register_event_schema(schema()).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        logger
            .add_modifier(Arc::new(FnModifier::new("count", move |_id: &str, data: EventData| {
                counter.fetch_add(1, Ordering::SeqCst);
                data
            })))
            .unwrap();

        // Invalid data is not even looked at.
        let outcome = logger.emit(event(json!({"something": 42}))).unwrap();
        assert_eq!(outcome, EmitOutcome::NoSinks);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregistered_schema_is_skipped() {
        let logger = EventLogger::new();
        let sink = Arc::new(MemorySink::new());
        logger.register_handler(sink.clone());

        let outcome = logger.emit(event(json!({"something": "x"}))).unwrap();
        assert_eq!(outcome, EmitOutcome::UnregisteredSchema);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_remove_handler() {
        let logger = EventLogger::new();
        logger.register_event_schema(schema()).unwrap();
        let memory = Arc::new(MemorySink::new());
        let sink: Arc<dyn EventSink> = memory.clone();

        logger.register_handler(sink.clone());
        logger.register_handler(sink.clone());
        assert_eq!(logger.handler_count(), 1);

        logger.emit(event(json!({"something": "x"}))).unwrap();
        logger.remove_handler(&sink);
        assert_eq!(
            logger.emit(event(json!({"something": "y"}))).unwrap(),
            EmitOutcome::NoSinks
        );
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_loggers_have_unique_names() {
        let a = EventLogger::new();
        let b = EventLogger::new();
        assert_ne!(a.name(), b.name());
        assert_eq!(a.clone().name(), a.name());
    }

    #[test]
    fn test_remove_event_schema() {
        let logger = EventLogger::new();
        logger.register_event_schema(schema()).unwrap();
        assert!(logger.has_schema("http://test/test", 1));

        logger.remove_event_schema("http://test/test", 1).unwrap();
        assert!(!logger.has_schema("http://test/test", 1));
        assert!(logger.remove_event_schema("http://test/test", 1).is_err());
    }
}

//! Traits for components that emit or observe schema events.

use std::sync::Arc;

use schema_events::{
    EmitOutcome, Event, EventError, EventListener, EventLogger, EventResult, EventSchema,
    ListenerMode, SchemaSource,
};
use serde::Serialize;

use crate::builder::IntoEventPayload;

/// Trait for components that emit events.
///
/// Implement this trait to declare the schemas your component emits, so
/// they can be registered in one call before anything is emitted.
pub trait SchemaProvider {
    /// Returns the schemas this component emits.
    fn event_schemas() -> Vec<SchemaSource>;

    /// Registers every declared schema with a logger.
    ///
    /// Stops at the first schema that fails to register.
    fn register_with(logger: &EventLogger) -> EventResult<Vec<Arc<EventSchema>>> {
        Self::event_schemas()
            .into_iter()
            .map(|source| logger.register_event_schema(source))
            .collect()
    }
}

/// Trait for components that listen to events.
pub trait EventObserver {
    /// Returns the schema ids this component listens to.
    fn observed_schemas() -> Vec<String>;

    /// Creates the listeners for the observed schemas.
    ///
    /// Override this to provide listeners. The default implementation
    /// returns an empty vector.
    fn create_listeners(&self) -> Vec<(String, Arc<dyn EventListener>, ListenerMode)> {
        Vec::new()
    }
}

/// Trait for components that emit through a logger they hold.
pub trait SchemaEventEmitter: SchemaProvider {
    /// Returns the logger events are emitted through.
    fn event_logger(&self) -> &EventLogger;

    /// Emits an event.
    fn emit_event(&self, event: Event) -> EventResult<EmitOutcome> {
        self.event_logger().emit(event)
    }

    /// Emits a serializable payload against a schema.
    fn emit_payload(
        &self,
        schema_id: &str,
        version: u32,
        payload: impl Serialize,
    ) -> EventResult<EmitOutcome> {
        self.emit_event(Event::new(schema_id, version, payload.into_payload()?))
    }
}

/// Helper struct for registering component schemas and listeners.
#[derive(Debug, Clone)]
pub struct EventRegistrar {
    logger: EventLogger,
}

impl EventRegistrar {
    /// Creates a new registrar.
    pub fn new(logger: EventLogger) -> Self {
        Self { logger }
    }

    /// Registers a component's schemas.
    pub fn register_provider<P: SchemaProvider>(&self) -> EventResult<Vec<Arc<EventSchema>>> {
        P::register_with(&self.logger)
    }

    /// Registers a component's listeners.
    ///
    /// Every listener must target one of the component's observed schemas.
    /// Nothing is registered if any of them does not.
    pub fn register_observer<O: EventObserver>(&self, observer: &O) -> EventResult<()> {
        let observed = O::observed_schemas();
        let listeners = observer.create_listeners();
        if let Some((schema_id, listener, _)) = listeners
            .iter()
            .find(|(schema_id, _, _)| !observed.contains(schema_id))
        {
            return Err(EventError::Listener(format!(
                "listener `{}` targets {schema_id}, which is not among the observed schemas {observed:?}",
                listener.id()
            )));
        }

        for (schema_id, listener, mode) in listeners {
            self.logger.add_listener(&schema_id, listener, mode)?;
        }
        Ok(())
    }

    /// Returns the logger.
    pub fn logger(&self) -> &EventLogger {
        &self.logger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{PropertyBuilder, SchemaDocumentBuilder};
    use crate::testing::TestEventLogger;
    use async_trait::async_trait;
    use schema_events::{EventData, EventError};
    use std::sync::Mutex;

    const SIGNUP: &str = "http://myapp.dev/events/signup";

    struct SignupComponent {
        logger: EventLogger,
    }

    impl SchemaProvider for SignupComponent {
        fn event_schemas() -> Vec<SchemaSource> {
            vec![
                SchemaDocumentBuilder::new(SIGNUP, 1)
                    .required("user_id", PropertyBuilder::string())
                    .build()
                    .into(),
                SchemaSource::text(
                    "$id: http://myapp.dev/events/signout\nversion: 1\nproperties:\n  user_id:\n    type: string\n",
                ),
            ]
        }
    }

    impl SchemaEventEmitter for SignupComponent {
        fn event_logger(&self) -> &EventLogger {
            &self.logger
        }
    }

    #[derive(Default)]
    struct Audit {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventListener for Audit {
        fn id(&self) -> &str {
            "audit"
        }

        async fn on_event(
            &self,
            _logger: &EventLogger,
            schema_id: &str,
            _data: &EventData,
        ) -> Result<(), EventError> {
            self.seen.lock().unwrap().push(schema_id.to_string());
            Ok(())
        }
    }

    struct AuditComponent {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl EventObserver for AuditComponent {
        fn observed_schemas() -> Vec<String> {
            vec![SIGNUP.to_string()]
        }

        fn create_listeners(&self) -> Vec<(String, Arc<dyn EventListener>, ListenerMode)> {
            Self::observed_schemas()
                .into_iter()
                .map(|id| {
                    let listener: Arc<dyn EventListener> = Arc::new(Audit {
                        seen: self.seen.clone(),
                    });
                    (id, listener, ListenerMode::Modified)
                })
                .collect()
        }
    }

    #[test]
    fn test_register_provider() {
        let registrar = EventRegistrar::new(EventLogger::new());
        let schemas = registrar.register_provider::<SignupComponent>().unwrap();
        assert_eq!(schemas.len(), 2);
        assert!(registrar.logger().has_schema("http://myapp.dev/events/signout", 1));

        // A second registration hits the duplicate check.
        assert!(registrar.register_provider::<SignupComponent>().is_err());
    }

    #[tokio::test]
    async fn test_emit_payload_reaches_observer() {
        let fixture = TestEventLogger::new();
        let registrar = EventRegistrar::new(fixture.logger().clone());
        registrar.register_provider::<SignupComponent>().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        registrar
            .register_observer(&AuditComponent { seen: seen.clone() })
            .unwrap();

        #[derive(Serialize)]
        struct Signup<'a> {
            user_id: &'a str,
        }

        let component = SignupComponent {
            logger: fixture.logger().clone(),
        };
        let outcome = component
            .emit_payload(SIGNUP, 1, Signup { user_id: "u-1" })
            .unwrap();
        assert!(outcome.is_emitted());

        fixture.settle().await;
        assert_eq!(*seen.lock().unwrap(), vec![SIGNUP.to_string()]);
        assert_eq!(fixture.read_emitted_events()[0]["user_id"], "u-1");
    }

    struct StrayComponent {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl EventObserver for StrayComponent {
        fn observed_schemas() -> Vec<String> {
            vec![SIGNUP.to_string()]
        }

        fn create_listeners(&self) -> Vec<(String, Arc<dyn EventListener>, ListenerMode)> {
            ["http://myapp.dev/events/signout", SIGNUP]
                .into_iter()
                .map(|id| {
                    let listener: Arc<dyn EventListener> = Arc::new(Audit {
                        seen: self.seen.clone(),
                    });
                    (id.to_string(), listener, ListenerMode::Modified)
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn test_observer_listener_outside_observed_schemas_is_rejected() {
        let fixture = TestEventLogger::new();
        let registrar = EventRegistrar::new(fixture.logger().clone());
        registrar.register_provider::<SignupComponent>().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let err = registrar
            .register_observer(&StrayComponent { seen: seen.clone() })
            .unwrap_err();
        assert!(matches!(err, EventError::Listener(ref msg) if msg.contains("signout")), "{err}");

        // The declared listener was not registered either.
        let outcome = fixture
            .emit(Event::new(SIGNUP, 1, EventData::from_iter([("user_id".to_string(), "u-1".into())])))
            .unwrap();
        assert_eq!(outcome, EmitOutcome::Emitted { listeners_scheduled: 0 });
        fixture.settle().await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_emit_payload_rejects_non_object() {
        let fixture = TestEventLogger::new();
        SignupComponent::register_with(fixture.logger()).unwrap();
        let component = SignupComponent {
            logger: fixture.logger().clone(),
        };

        let err = component.emit_payload(SIGNUP, 1, vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, EventError::Serialization(_)));
        assert!(fixture.read_emitted_events().is_empty());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let fixture = TestEventLogger::new();
        SignupComponent::register_with(fixture.logger()).unwrap();
        let component = SignupComponent {
            logger: fixture.logger().clone(),
        };

        let err = component
            .emit_payload(SIGNUP, 1, serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, EventError::EventValidation { .. }));
        assert!(fixture.read_emitted_events().is_empty());
    }
}

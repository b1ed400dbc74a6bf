//! Listeners: asynchronous observers invoked after an event is emitted.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::Instrument;

use crate::callback::CallbackSignature;
use crate::error::{EventError, EventResult};
use crate::event::EventData;
use crate::logger::EventLogger;

/// Trait for event listeners.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Returns an identifier used in diagnostics.
    fn id(&self) -> &str {
        "anonymous"
    }

    /// Describes the parameter list; checked once when the listener is added.
    fn signature(&self) -> CallbackSignature {
        CallbackSignature::listener()
    }

    /// Handles an emitted event. Errors are logged by the logger, never propagated.
    async fn on_event(
        &self,
        logger: &EventLogger,
        schema_id: &str,
        data: &EventData,
    ) -> Result<(), EventError>;
}

/// Wrapper for closure-based listeners.
pub struct FnListener<F> {
    id: String,
    listener: F,
}

impl<F, Fut> FnListener<F>
where
    F: Fn(EventLogger, String, EventData) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), EventError>> + Send + 'static,
{
    /// Creates a new closure listener.
    pub fn new(id: impl Into<String>, listener: F) -> Self {
        Self {
            id: id.into(),
            listener,
        }
    }
}

#[async_trait]
impl<F, Fut> EventListener for FnListener<F>
where
    F: Fn(EventLogger, String, EventData) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), EventError>> + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn on_event(
        &self,
        logger: &EventLogger,
        schema_id: &str,
        data: &EventData,
    ) -> Result<(), EventError> {
        (self.listener)(logger.clone(), schema_id.to_string(), data.clone()).await
    }
}

/// Which version of the data a listener receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerMode {
    /// Data after modifiers and redaction, as written to sinks.
    #[default]
    Modified,
    /// Validated data as the caller supplied it, before any modifier ran.
    Unmodified,
}

/// Per-schema listener sets, one table per [`ListenerMode`].
#[derive(Default)]
pub struct ListenerTable {
    modified: HashMap<String, Vec<Arc<dyn EventListener>>>,
    unmodified: HashMap<String, Vec<Arc<dyn EventListener>>>,
}

impl ListenerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for a schema id after checking its signature.
    pub fn add(
        &mut self,
        schema_id: &str,
        listener: Arc<dyn EventListener>,
        mode: ListenerMode,
    ) -> EventResult<()> {
        CallbackSignature::listener()
            .check(&listener.signature())
            .map_err(|reason| {
                EventError::Listener(format!("listener '{}' rejected: {}", listener.id(), reason))
            })?;

        let bucket = self.table_mut(mode).entry(schema_id.to_string()).or_default();
        if !bucket.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            bucket.push(listener);
        }
        Ok(())
    }

    /// Removes a listener from every schema id and mode it was registered under.
    pub fn remove(&mut self, listener: &Arc<dyn EventListener>) {
        for table in [&mut self.modified, &mut self.unmodified] {
            for bucket in table.values_mut() {
                bucket.retain(|l| !Arc::ptr_eq(l, listener));
            }
            table.retain(|_, bucket| !bucket.is_empty());
        }
    }

    /// Listeners registered for a schema id in the given mode.
    pub fn get(&self, schema_id: &str, mode: ListenerMode) -> &[Arc<dyn EventListener>] {
        self.table(mode)
            .get(schema_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns true if any listener, in either mode, is registered for the schema id.
    pub fn has_listeners(&self, schema_id: &str) -> bool {
        !self.get(schema_id, ListenerMode::Modified).is_empty()
            || !self.get(schema_id, ListenerMode::Unmodified).is_empty()
    }

    fn table(&self, mode: ListenerMode) -> &HashMap<String, Vec<Arc<dyn EventListener>>> {
        match mode {
            ListenerMode::Modified => &self.modified,
            ListenerMode::Unmodified => &self.unmodified,
        }
    }

    fn table_mut(&mut self, mode: ListenerMode) -> &mut HashMap<String, Vec<Arc<dyn EventListener>>> {
        match mode {
            ListenerMode::Modified => &mut self.modified,
            ListenerMode::Unmodified => &mut self.unmodified,
        }
    }
}

/// Tracks listener invocations from scheduling until they finish.
#[derive(Clone, Default)]
pub struct ActiveListeners {
    inner: Arc<ActiveState>,
}

#[derive(Default)]
struct ActiveState {
    tasks: Mutex<ActiveTasks>,
    drained: Notify,
}

#[derive(Default)]
struct ActiveTasks {
    next_id: u64,
    running: HashMap<u64, String>,
}

impl ActiveListeners {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` on `runtime` and tracks it until it completes or panics.
    pub fn spawn<Fut>(&self, runtime: &Handle, label: String, task: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        // The entry must exist before the task can possibly finish.
        let id = {
            let mut tasks = self.lock();
            let id = tasks.next_id;
            tasks.next_id += 1;
            tasks.running.insert(id, label);
            id
        };

        let guard = CompletionGuard {
            id,
            active: self.clone(),
        };
        runtime.spawn(
            async move {
                let _guard = guard;
                task.await;
            }
            .in_current_span(),
        );
    }

    /// Number of invocations still in flight.
    pub fn len(&self) -> usize {
        self.lock().running.len()
    }

    /// Returns true if no invocation is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels of the invocations still in flight.
    pub fn labels(&self) -> Vec<String> {
        self.lock().running.values().cloned().collect()
    }

    /// Waits until every tracked invocation, including ones scheduled while
    /// waiting, has finished.
    pub async fn gather(&self) {
        loop {
            let drained = self.inner.drained.notified();
            if self.is_empty() {
                return;
            }
            drained.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActiveTasks> {
        self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, id: u64) {
        let mut tasks = self.lock();
        if let Some(label) = tasks.running.remove(&id) {
            if std::thread::panicking() {
                tracing::error!(listener = %label, "Event listener panicked");
            }
        }
        if tasks.running.is_empty() {
            self.inner.drained.notify_waiters();
        }
    }
}

struct CompletionGuard {
    id: u64,
    active: ActiveListeners,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.active.finish(self.id);
    }
}

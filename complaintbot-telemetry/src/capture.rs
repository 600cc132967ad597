use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{Level, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// One event recorded by a [`CaptureLayer`].
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEvent {
    /// Event level as text (`"WARN"`, `"INFO"`, ...).
    pub level: String,
    /// Module path the event was emitted from.
    pub target: String,
    /// The event message, if any.
    pub message: Option<String>,
    /// All other fields, keyed by name.
    pub fields: HashMap<String, serde_json::Value>,
}

impl CapturedEvent {
    /// Field value as a string, if it was recorded as one.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }
}

/// Shared storage for captured events
#[derive(Debug, Clone, Default)]
pub struct CapturedEvents {
    events: Arc<RwLock<Vec<CapturedEvent>>>,
}

impl CapturedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every captured event, oldest first.
    pub fn all(&self) -> Vec<CapturedEvent> {
        self.events.read().map(|events| events.clone()).unwrap_or_default()
    }

    /// Events at exactly `level`.
    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        let level = level.to_string();
        self.all().into_iter().filter(|e| e.level == level).collect()
    }

    /// Events whose message contains `needle`.
    pub fn with_message(&self, needle: &str) -> Vec<CapturedEvent> {
        self.all()
            .into_iter()
            .filter(|e| e.message.as_deref().is_some_and(|m| m.contains(needle)))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }

    fn push(&self, event: CapturedEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}

/// A tracing layer that records events in memory
///
/// Used by tests to assert on what a run logged:
///
/// ```
/// use complaintbot_telemetry::CaptureLayer;
/// use tracing_subscriber::prelude::*;
///
/// let (layer, events) = CaptureLayer::new();
/// let subscriber = tracing_subscriber::registry().with(layer);
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::warn!(chunk_id = "7_0", "skipping chunk");
/// });
/// assert_eq!(events.with_message("skipping").len(), 1);
/// ```
pub struct CaptureLayer {
    storage: CapturedEvents,
}

impl CaptureLayer {
    /// A new layer and a handle to the events it will capture.
    pub fn new() -> (Self, CapturedEvents) {
        let storage = CapturedEvents::new();
        (Self { storage: storage.clone() }, storage)
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let mut fields = visitor.0;
        let message = fields.remove("message").map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

        let metadata = event.metadata();
        self.storage.push(CapturedEvent {
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message,
            fields,
        });
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}

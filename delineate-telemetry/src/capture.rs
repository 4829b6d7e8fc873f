use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{Id, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// A closed span as recorded by [`SpanCapture`]
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
    pub duration_micros: u128,
}

/// A log event as recorded by [`SpanCapture`]
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub level: String,
    /// Name of the innermost span the event was emitted in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
}

impl EventRecord {
    pub fn message(&self) -> Option<&str> {
        self.fields.get("message").and_then(|v| v.as_str())
    }
}

/// Shared storage for captured spans and events
#[derive(Debug, Clone, Default)]
pub struct CapturedSpans {
    spans: Arc<RwLock<Vec<SpanRecord>>>,
    events: Arc<RwLock<Vec<EventRecord>>>,
}

impl CapturedSpans {
    pub fn new() -> Self {
        Self::default()
    }

    /// All closed spans, in closing order
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn span_names(&self) -> Vec<String> {
        self.spans().into_iter().map(|s| s.name).collect()
    }

    pub fn spans_named(&self, name: &str) -> Vec<SpanRecord> {
        self.spans().into_iter().filter(|s| s.name == name).collect()
    }

    pub fn contains_span(&self, name: &str) -> bool {
        self.spans.read().map(|s| s.iter().any(|r| r.name == name)).unwrap_or(false)
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut spans) = self.spans.write() {
            spans.clear();
        }
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }

    fn push_span(&self, record: SpanRecord) {
        if let Ok(mut spans) = self.spans.write() {
            spans.push(record);
        }
    }

    fn push_event(&self, record: EventRecord) {
        if let Ok(mut events) = self.events.write() {
            events.push(record);
        }
    }
}

/// A tracing layer that records spans and events in memory
pub struct SpanCapture {
    storage: CapturedSpans,
}

impl SpanCapture {
    pub fn new(storage: CapturedSpans) -> Self {
        Self { storage }
    }
}

struct SpanFields(HashMap<String, serde_json::Value>);

impl<S> Layer<S> for SpanCapture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);

        let mut extensions = span.extensions_mut();
        extensions.insert(Instant::now());
        extensions.insert(SpanFields(visitor.0));
    }

    fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            fields.0.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        self.storage.push_event(EventRecord {
            level: event.metadata().level().to_string(),
            span: ctx.event_span(event).map(|s| s.name().to_string()),
            fields: visitor.0,
        });
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else {
            return;
        };
        let extensions = span.extensions();
        let duration_micros =
            extensions.get::<Instant>().map(|start| start.elapsed().as_micros()).unwrap_or(0);
        let fields = extensions.get::<SpanFields>().map(|f| f.0.clone()).unwrap_or_default();

        self.storage.push_span(SpanRecord {
            name: span.name().to_string(),
            parent: span.parent().map(|p| p.name().to_string()),
            fields,
            duration_micros,
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

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}

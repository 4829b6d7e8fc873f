//! # delineate-telemetry
//!
//! Logging setup for the delineate retrieval engine, plus an in-memory
//! span recorder for asserting on pipeline behaviour in tests.
//!
//! ```rust,ignore
//! delineate_telemetry::init_telemetry("ingest-worker")?;
//! ```
//!
//! ```rust,ignore
//! use delineate_telemetry::{CapturedSpans, SpanCapture};
//! use tracing_subscriber::prelude::*;
//!
//! let spans = CapturedSpans::new();
//! let subscriber = tracing_subscriber::registry().with(SpanCapture::new(spans.clone()));
//! let _guard = tracing::subscriber::set_default(subscriber);
//! // ... run a query ...
//! assert!(!spans.contains_span("semantic_search"));
//! ```

pub mod capture;
pub mod init;

pub use capture::{CapturedSpans, EventRecord, SpanCapture, SpanRecord};
pub use init::{TelemetryError, init_json, init_telemetry, init_with_capture, init_with_filter};

pub use tracing::{Span, debug, error, info, instrument, trace, warn};

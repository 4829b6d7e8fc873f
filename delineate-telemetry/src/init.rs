//! Global subscriber installation.
//!
//! Every function reads `RUST_LOG` first and falls back to the given
//! default directive. A process can install only one global subscriber;
//! later calls return [`TelemetryError::AlreadyInitialized`].

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::capture::{CapturedSpans, SpanCapture};

const DEFAULT_DIRECTIVE: &str = "info";

/// Errors raised while installing a subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid filter directive '{directive}': {message}")]
    InvalidFilter { directive: String, message: String },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

fn env_filter(default_directive: &str) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_directive).map_err(|e| TelemetryError::InvalidFilter {
        directive: default_directive.to_string(),
        message: e.to_string(),
    })
}

/// Install a human-readable console logger at `info`.
///
/// `service` is logged once so interleaved output from several processes
/// can be told apart.
pub fn init_telemetry(service: &str) -> Result<(), TelemetryError> {
    init_with_filter(DEFAULT_DIRECTIVE)?;
    tracing::info!(service, "telemetry initialized");
    Ok(())
}

/// Install a console logger with a custom default directive,
/// e.g. `"delineate_rag=debug,warn"`.
pub fn init_with_filter(directive: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(env_filter(directive)?))
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)
}

/// Install a logger that writes one JSON object per event, with span context.
pub fn init_json() -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_filter(env_filter(DEFAULT_DIRECTIVE)?),
        )
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)
}

/// Install a console logger plus a [`SpanCapture`] layer feeding `storage`.
///
/// The capture layer is unfiltered, so it sees every span regardless of
/// `RUST_LOG`.
pub fn init_with_capture(service: &str, storage: CapturedSpans) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(env_filter(DEFAULT_DIRECTIVE)?))
        .with(SpanCapture::new(storage))
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)?;
    tracing::info!(service, "telemetry initialized with span capture");
    Ok(())
}

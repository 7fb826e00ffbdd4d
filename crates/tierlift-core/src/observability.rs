//! Observability infrastructure for tierlift.
//!
//! Structured logging with consistent spans: one span per pipeline pass and
//! one per inbound webhook batch, so every log line carries its source blob.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `tierlift_remediation=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span covering one remediation pass over a source spreadsheet.
///
/// `source` should already be redacted if it can carry credentials.
#[must_use]
pub fn remediation_span(source: &str) -> Span {
    tracing::info_span!("remediation", source = source)
}

/// Creates a span covering one inbound webhook batch.
#[must_use]
pub fn webhook_span(endpoint: &str, events: usize) -> Span {
    tracing::info_span!("webhook", endpoint = endpoint, events = events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_succeeds() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn test_span_helpers_create_spans() {
        let span = remediation_span("https://acct.blob.core.windows.net/in/a.xlsx");
        let _guard = span.enter();
        tracing::info!("inside remediation span");

        let span = webhook_span("/process", 3);
        let _guard = span.enter();
        tracing::info!("inside webhook span");
    }
}

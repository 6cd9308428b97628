//! Tracing setup and standard spans.

use tracing_subscriber::EnvFilter;

/// Output format for [`init_tracing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install a global subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

/// Standardized span constructors for state storage.
pub mod spans {
    use tracing::{Span, debug_span, info_span};
    use uuid::Uuid;

    /// Span for a manager operation on one state.
    pub fn state_operation(operation: &'static str, id: Uuid) -> Span {
        info_span!("state", operation = operation, id = %id)
    }

    /// Span for a single store round trip.
    pub fn store_request(method: &'static str, id: &str) -> Span {
        debug_span!("store", method = method, id = %id)
    }
}

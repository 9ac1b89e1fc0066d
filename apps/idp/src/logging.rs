//! Tracing subscriber setup.
//!
//! Production emits flattened JSON suitable for log aggregation; development
//! gets the human-readable formatter.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppEnvironment;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes priority over the configured filter when set.
///
/// # Panics
///
/// Panics if a subscriber has already been installed.
pub fn init_logging(filter: &str, environment: AppEnvironment) {
    let filter_layer =
        match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter)) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("FATAL: Failed to create log filter: {e}");
                std::process::exit(1);
            }
        };

    if environment.is_production() {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .flatten_event(true);
        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter_layer)
            .init();
    }

    tracing::info!(filter = %filter, "Logging initialized");
}

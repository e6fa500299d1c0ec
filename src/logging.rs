//! Logging initialization.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the binary (or any embedding application) through [`init`].

use tracing::Level;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSettings;

/// Initialize the global tracing subscriber.
///
/// `verbosity` raises the configured level: 1 = DEBUG, 2+ = TRACE. `RUST_LOG`
/// takes precedence over both when set. With `json`, events are written as
/// JSON lines to stderr.
pub fn init(settings: &LoggingSettings, verbosity: u8) -> Result<(), TryInitError> {
    let configured = settings.level.parse::<Level>().unwrap_or(Level::WARN);
    let level = match verbosity {
        0 => configured,
        1 => configured.max(Level::DEBUG),
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,querybridge={level}")));

    let subscriber = tracing_subscriber::registry().with(filter);

    if settings.json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    }
}

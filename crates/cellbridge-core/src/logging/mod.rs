//! Structured logging with `tracing`.
//!
//! - [`init_from_settings`] picks the output format from [`LoggingSettings`]
//! - [`init_subscriber`] installs the global stderr subscriber
//! - [`capture_logs`] captures events in memory for test assertions
//!
//! Context such as the session id travels in spans: the session actor runs
//! inside a span carrying `session_id`, so every event it logs is tagged.

pub mod test_utils;

use cellbridge_settings::LoggingSettings;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

/// Initialize the global subscriber from the `logging` settings section.
pub fn init_from_settings(settings: &LoggingSettings) {
    if settings.json {
        init_json_subscriber(&settings.level);
    } else {
        init_subscriber(&settings.level);
    }
}

/// Initialize the global tracing subscriber with stderr output.
///
/// `RUST_LOG` wins over `level` when set. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}

/// Initialize the global tracing subscriber with JSON lines on stderr.
///
/// Intended for deployments that ship logs to a collector.
pub fn init_json_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_does_not_panic() {
        // Multiple calls should be safe (no-op after first)
        init_subscriber("warn");
        init_subscriber("debug");
        init_json_subscriber("info");
    }

    #[test]
    fn init_from_settings_does_not_panic() {
        init_from_settings(&LoggingSettings::default());
        init_from_settings(&LoggingSettings {
            level: "debug".into(),
            json: true,
        });
    }
}

//! Settings type definitions.
//!
//! All types use camelCase JSON and `#[serde(default)]`, so a settings file
//! only needs the keys it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings.
///
/// ```json
/// {
///   "logging": { "level": "debug" },
///   "session": { "correlationTtlMs": 600000 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellbridgeSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Per-session router tuning.
    pub session: SessionSettings,
    /// Notebook storage location.
    pub storage: StorageSettings,
}

impl Default for CellbridgeSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "cellbridge".to_string(),
            logging: LoggingSettings::default(),
            session: SessionSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Session router settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Capacity of each session's inbound event queue.
    pub inbound_queue_capacity: usize,
    /// Outbound frame buffer per channel-backed connection.
    pub connection_buffer: usize,
    /// How long a request id stays resolvable. `None` keeps entries until
    /// the kernel closes them out.
    pub correlation_ttl_ms: Option<u64>,
    /// How often expired correlation entries are swept.
    pub eviction_interval_ms: u64,
    /// Write the notebook to storage when the session shuts down.
    pub persist_on_shutdown: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            inbound_queue_capacity: 256,
            connection_buffer: 1024,
            correlation_ttl_ms: Some(3_600_000),
            eviction_interval_ms: 60_000,
            persist_on_shutdown: true,
        }
    }
}

impl SessionSettings {
    /// Correlation TTL as a [`Duration`].
    #[must_use]
    pub fn correlation_ttl(&self) -> Option<Duration> {
        self.correlation_ttl_ms.map(Duration::from_millis)
    }

    /// Eviction sweep interval as a [`Duration`].
    #[must_use]
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }
}

/// Storage settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Directory notebook paths are resolved against.
    pub root: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: "notebooks".to_string(),
        }
    }
}

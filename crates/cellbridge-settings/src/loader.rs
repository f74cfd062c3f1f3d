//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`CellbridgeSettings::default()`]
//! 2. If `~/.cellbridge/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `CELLBRIDGE_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)
//!
//! A correlation TTL of `0` (from either layer) disables expiry.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::CellbridgeSettings;

/// Resolve the path to the settings file (`~/.cellbridge/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".cellbridge").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<CellbridgeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<CellbridgeSettings> {
    let defaults = serde_json::to_value(CellbridgeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: CellbridgeSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    normalize(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut CellbridgeSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup` (the environment in production,
/// a map in tests).
///
/// Invalid values are logged and ignored, falling back to file/default.
pub fn apply_overrides_from<F>(settings: &mut CellbridgeSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("CELLBRIDGE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("CELLBRIDGE_LOG_JSON") {
        settings.logging.json = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = env.usize("CELLBRIDGE_QUEUE_CAPACITY", 1, 1_000_000) {
        settings.session.inbound_queue_capacity = v;
    }
    if let Some(v) = env.usize("CELLBRIDGE_CONNECTION_BUFFER", 1, 1_000_000) {
        settings.session.connection_buffer = v;
    }
    if let Some(v) = env.u64("CELLBRIDGE_CORRELATION_TTL_MS", 0, 86_400_000) {
        settings.session.correlation_ttl_ms = Some(v);
    }
    if let Some(v) = env.u64("CELLBRIDGE_EVICTION_INTERVAL_MS", 100, 3_600_000) {
        settings.session.eviction_interval_ms = v;
    }
    if let Some(v) = env.bool("CELLBRIDGE_PERSIST_ON_SHUTDOWN") {
        settings.session.persist_on_shutdown = v;
    }

    // ── Storage ─────────────────────────────────────────────────────
    if let Some(v) = env.string("CELLBRIDGE_STORAGE_ROOT") {
        settings.storage.root = v;
    }
}

fn normalize(settings: &mut CellbridgeSettings) {
    if settings.session.correlation_ttl_ms == Some(0) {
        settings.session.correlation_ttl_ms = None;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.lookup)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

//! Settings loading and saving.
//!
//! Loading flow:
//! 1. Start with compiled [`WispSettings::default()`]
//! 2. If `config.json` exists, deep-merge user values over defaults
//! 3. Apply `WISP_*` environment variable overrides (highest priority)
//!
//! Keys the file does not know about are carried through untouched, so a
//! save never drops settings written by a newer front end.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};
use wisp_core::UsageStats;

use crate::errors::Result;
use crate::types::WispSettings;

/// Key holding the usage counters inside `config.json`.
const USAGE_STATS_KEY: &str = "persistent_usage_stats";

/// Load `path` layered over the defaults, then apply `WISP_*` overrides.
///
/// A missing file yields the defaults. Unparseable JSON and values that
/// fail [`WispSettings::validate`] are errors.
pub fn load_settings_from_path(path: &Path) -> Result<WispSettings> {
    let defaults = serde_json::to_value(WispSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: WispSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Write the full settings file, creating its directory if needed.
pub fn save_settings_to_path(settings: &WispSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, text)?;
    info!(?path, "settings saved");
    Ok(())
}

/// Update only the usage counters inside the settings file.
///
/// Reads the current file, replaces the stats section, and writes it back so
/// that other keys are left untouched. A missing file starts from `{}`.
pub fn save_usage_stats(stats: &UsageStats, path: &Path) -> Result<()> {
    let mut current: Value = if path.exists() {
        serde_json::from_str(&std::fs::read_to_string(path)?)?
    } else {
        Value::Object(serde_json::Map::new())
    };

    let stats_value = serde_json::to_value(stats)?;
    match current.as_object_mut() {
        Some(map) => {
            let _ = map.insert(USAGE_STATS_KEY.to_string(), stats_value);
        }
        None => {
            let mut map = serde_json::Map::new();
            let _ = map.insert(USAGE_STATS_KEY.to_string(), stats_value);
            current = Value::Object(map);
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&current)?)?;
    debug!(api_requests = stats.api_requests, "usage stats persisted");
    Ok(())
}

/// Merge `source` into `target`.
///
/// Nested objects merge key by key; any other `source` value wins outright.
/// A `null` in `source` keeps the `target` value.
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

/// Apply `WISP_*` environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (falling back to file/default).
pub fn apply_env_overrides(settings: &mut WispSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
pub fn apply_overrides_from(settings: &mut WispSettings, lookup: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = string("WISP_API_KEY") {
        settings.api_key = v;
    }
    if let Some(v) = string("WISP_AGENT_NAME") {
        settings.agent_name = v;
    }
    if let Some(v) = string("WISP_USER_NAME") {
        settings.user_name = v;
    }
    if let Some(v) = string("WISP_MODEL") {
        settings.model = v;
    }
    if let Some(v) = string("WISP_LOG_LEVEL") {
        settings.log_level = v;
    }
    if let Some(v) = string("WISP_AUTO_TURN") {
        match parse_bool(&v) {
            Some(b) => settings.auto_turn_enabled = b,
            None => tracing::warn!(key = "WISP_AUTO_TURN", value = %v, "invalid boolean env var, ignoring"),
        }
    }
    if let Some(v) = string("WISP_AUTO_TURN_SECS") {
        match parse_u64_range(&v, 1, 86_400) {
            Some(n) => settings.auto_turn_duration = n,
            None => tracing::warn!(key = "WISP_AUTO_TURN_SECS", value = %v, "invalid u64 env var, ignoring"),
        }
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

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BotSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `SLACKBOT_*` environment overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{BotSettings, HighlightStrip, MatchPolicy};

/// Resolve the default settings path (`~/.slackbot/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".slackbot").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BotSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<BotSettings> {
    let defaults = serde_json::to_value(BotSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: BotSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key, arrays and primitives are replaced, and nulls in
/// `source` leave `target` untouched.
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

/// Apply environment variable overrides to loaded settings.
///
/// Values that fail to parse are ignored with a warning.
pub fn apply_env_overrides(settings: &mut BotSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

fn apply_overrides(settings: &mut BotSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("SLACKBOT_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = read("SLACKBOT_BOOTSTRAP_METHOD") {
        settings.bootstrap_method = v;
    }
    if let Some(v) = read("SLACKBOT_DIRECT_PREFIX") {
        settings.direct_channel_prefix = v;
    }
    if let Some(v) = read("SLACKBOT_LOG_LEVEL") {
        settings.log_level = v;
    }
    if let Some(v) = read("SLACKBOT_MATCH_POLICY") {
        match v.parse::<MatchPolicy>() {
            Ok(policy) => settings.match_policy = policy,
            Err(e) => tracing::warn!(key = "SLACKBOT_MATCH_POLICY", error = %e, "ignoring env var"),
        }
    }
    if let Some(v) = read("SLACKBOT_HIGHLIGHT_STRIP") {
        match v.parse::<HighlightStrip>() {
            Ok(mode) => settings.highlight_strip = mode,
            Err(e) => tracing::warn!(key = "SLACKBOT_HIGHLIGHT_STRIP", error = %e, "ignoring env var"),
        }
    }
    if let Some(v) = read("SLACKBOT_INTAKE_CAPACITY") {
        if let Some(n) = parse_usize_range(&v, 1, 4096) {
            settings.intake_capacity = n;
        } else {
            tracing::warn!(key = "SLACKBOT_INTAKE_CAPACITY", value = %v, "invalid usize env var, ignoring");
        }
    }
    if let Some(v) = read("SLACKBOT_OUTBOUND_QUEUE") {
        if let Some(n) = parse_usize_range(&v, 1, 65_536) {
            settings.outbound_queue = n;
        } else {
            tracing::warn!(key = "SLACKBOT_OUTBOUND_QUEUE", value = %v, "invalid usize env var, ignoring");
        }
    }
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Layered settings: compiled defaults, then `~/.threadline/settings.json`,
//! then `THREADLINE_*` environment variables. The result is validated once
//! all layers are applied.
//!
//! File values are deep-merged into the defaults: nested objects merge per
//! key, anything else is replaced, and `null` leaves the default in place.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::ThreadlineSettings;

/// Resolve the path to the settings file (`~/.threadline/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".threadline").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ThreadlineSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or invalid values are errors.
pub fn load_settings_from_path(path: &Path) -> Result<ThreadlineSettings> {
    let mut settings = read_layers(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    settings.validate()?;
    Ok(settings)
}

/// Defaults deep-merged with the file at `path`, without env overrides.
fn read_layers(path: &Path) -> Result<ThreadlineSettings> {
    let defaults = serde_json::to_value(ThreadlineSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Merge `overlay` into `base`. Objects merge recursively, `null` overlay
/// values are skipped, and every other overlay value replaces the base.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay.into_iter().filter(|(_, v)| !v.is_null()) {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

/// Apply `THREADLINE_*` overrides read through `lookup`.
///
/// Unparseable values are logged and skipped, leaving the file or default
/// value in place.
fn apply_overrides(settings: &mut ThreadlineSettings, lookup: impl Fn(&str) -> Option<String>) {
    let text = |raw: &str| Some(raw.to_string());

    if let Some(level) = env_value(&lookup, "THREADLINE_LOG_LEVEL", text) {
        settings.logging.level = level;
    }
    if let Some(json) = env_value(&lookup, "THREADLINE_LOG_JSON", flag) {
        settings.logging.json = json;
    }
    if let Some(status) = env_value(&lookup, "THREADLINE_IDLE_STATUS", text) {
        settings.live.idle_status = status;
    }
    let page_size = env_value(&lookup, "THREADLINE_PAGE_SIZE", |raw| bounded(raw, 10_000));
    if let Some(size) = page_size {
        settings.hydration.page_size = size;
    }
    let max_pages = env_value(&lookup, "THREADLINE_MAX_PAGES", |raw| bounded(raw, 1_000_000));
    if let Some(pages) = max_pages {
        settings.hydration.max_pages = Some(pages);
    }
}

/// Non-empty variable `name`, parsed. Parse failures are logged.
fn env_value<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = lookup(name).filter(|v| !v.is_empty())?;
    let value = parse(&raw);
    if value.is_none() {
        warn!(key = name, value = %raw, "ignoring unparseable override");
    }
    value
}

fn flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Positive integer no larger than `max`.
fn bounded(raw: &str, max: usize) -> Option<usize> {
    raw.parse().ok().filter(|n| (1..=max).contains(n))
}

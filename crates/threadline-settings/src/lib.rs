//! # threadline-settings
//!
//! Configuration for the timeline engine, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`ThreadlineSettings::default()`]
//! 2. **User file**: `~/.threadline/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `THREADLINE_*` overrides (highest priority)
//!
//! Components take the settings they need by value or reference, so tests
//! build their own [`ThreadlineSettings`] instead of touching the global.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton, initialized on first access.
static SETTINGS: OnceLock<ThreadlineSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.threadline/settings.json` with env
/// var overrides. If loading fails, returns compiled defaults.
pub fn get_settings() -> &'static ThreadlineSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// Returns `Err(settings)` if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: ThreadlineSettings) -> std::result::Result<(), ThreadlineSettings> {
    SETTINGS.set(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_settings_resolve() {
        let settings = get_settings();
        assert!(settings.hydration.page_size > 0);
    }
}

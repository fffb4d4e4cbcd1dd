//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`,
//! so a settings file may specify any subset of fields.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "logging": { "level": "info" },
///   "live": { "idleStatus": "idle" },
///   "hydration": { "pageSize": 200 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThreadlineSettings {
    /// Settings schema version.
    pub version: String,
    /// Log output configuration.
    pub logging: LoggingSettings,
    /// Live push channel interpretation.
    pub live: LiveSettings,
    /// Bulk hydration from the relational store.
    pub hydration: HydrationSettings,
    /// `SQLite` row source configuration.
    pub storage: StorageSettings,
}

impl Default for ThreadlineSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            logging: LoggingSettings::default(),
            live: LiveSettings::default(),
            hydration: HydrationSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl ThreadlineSettings {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.hydration.page_size == 0 {
            return Err(SettingsError::invalid("hydration.pageSize", "must be positive"));
        }
        if self.live.idle_status.trim().is_empty() {
            return Err(SettingsError::invalid("live.idleStatus", "must not be empty"));
        }
        if self.storage.pool_size == 0 {
            return Err(SettingsError::invalid("storage.poolSize", "must be positive"));
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Live push channel settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveSettings {
    /// `agent_status` value that means the session went idle.
    pub idle_status: String,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            idle_status: "idle".to_string(),
        }
    }
}

/// Hydration settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HydrationSettings {
    /// Rows requested per page.
    pub page_size: usize,
    /// Stop after this many pages (`None` = until the source is exhausted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
}

impl Default for HydrationSettings {
    fn default() -> Self {
        Self {
            page_size: 200,
            max_pages: None,
        }
    }
}

/// `SQLite` settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Maximum pool size.
    pub pool_size: u32,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            pool_size: 4,
            busy_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ThreadlineSettings::default().validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: ThreadlineSettings =
            serde_json::from_str(r#"{"hydration": {"pageSize": 50}}"#).unwrap();
        assert_eq!(settings.hydration.page_size, 50);
        assert_eq!(settings.hydration.max_pages, None);
        assert_eq!(settings.live.idle_status, "idle");
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    fn camel_case_wire_names() {
        let json = serde_json::to_value(ThreadlineSettings::default()).unwrap();
        assert!(json["live"].get("idleStatus").is_some());
        assert!(json["storage"].get("busyTimeoutMs").is_some());
        assert!(json["hydration"].get("maxPages").is_none());
    }

    #[test]
    fn zero_page_size_rejected() {
        let mut settings = ThreadlineSettings::default();
        settings.hydration.page_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn blank_idle_status_rejected() {
        let mut settings = ThreadlineSettings::default();
        settings.live.idle_status = "  ".into();
        assert!(settings.validate().is_err());
    }
}

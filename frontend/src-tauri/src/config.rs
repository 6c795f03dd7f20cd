use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use log::{info as log_info, warn as log_warn};
use serde::{Deserialize, Serialize};

use crate::meeting::apps::MeetingApp;

/// User-tunable configuration for the detection core, persisted as JSON under
/// the OS per-user config directory (mirrors `MeetingDetectionSettings` /
/// `NotificationSettings` elsewhere in this codebase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Catalog ids considered "meeting apps" for process-set matching.
    pub enabled_apps: HashSet<String>,
    /// Display-name fragments used to recognise browsers.
    pub browser_apps: HashSet<String>,
    /// User-defined catalog entries, keyed by their own `bundle_id`, on top
    /// of the built-in catalog. `#[serde(default)]` so config files saved
    /// before this field existed still load.
    #[serde(default)]
    pub custom_apps: Vec<MeetingApp>,
    pub check_on_wake: bool,
    pub microphone_polling_interval_secs: f64,
    pub mic_deactivation_grace_period_secs: f64,
    pub window_title_polling_interval_secs: f64,
    pub enable_window_title_detection: bool,
    pub auto_transcribe: bool,
    pub auto_generate_summary: bool,
    pub auto_generate_action_items: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled_apps: ["zoom", "teams", "meet", "slack", "discord"]
                .into_iter()
                .map(String::from)
                .collect(),
            browser_apps: ["Chrome", "Safari", "Firefox", "Edge", "Brave"]
                .into_iter()
                .map(String::from)
                .collect(),
            custom_apps: Vec::new(),
            check_on_wake: true,
            microphone_polling_interval_secs: 1.0,
            mic_deactivation_grace_period_secs: 8.0,
            window_title_polling_interval_secs: 1.0,
            enable_window_title_detection: false,
            auto_transcribe: true,
            auto_generate_summary: true,
            auto_generate_action_items: true,
        }
    }
}

impl DetectorConfig {
    fn settings_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| anyhow!("could not find config directory"))?;
        path.push("meetwatch");
        path.push("detector_config.json");
        Ok(path)
    }

    /// Load from disk, falling back to defaults on a missing file or a parse
    /// error (logged at `warn`, never fatal to startup).
    pub async fn load() -> Self {
        let path = match Self::settings_path() {
            Ok(p) => p,
            Err(e) => {
                log_warn!("detector config path unavailable: {e}");
                return Self::default();
            }
        };

        if !path.exists() {
            log_info!("no detector config found at {:?}, using defaults", path);
            return Self::default();
        }

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Self>(&content) {
                Ok(config) => config,
                Err(e) => {
                    log_warn!("failed to parse detector config, using defaults: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                log_warn!("failed to read detector config, using defaults: {e}");
                Self::default()
            }
        }
    }

    pub async fn save(&self) -> Result<()> {
        let path = Self::settings_path()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, content).await?;
        log_info!("saved detector config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enabled_apps_match_configuration_table() {
        let config = DetectorConfig::default();
        assert!(config.enabled_apps.contains("zoom"));
        assert!(config.enabled_apps.contains("teams"));
        assert!(config.enabled_apps.contains("meet"));
        assert!(config.enabled_apps.contains("slack"));
        assert!(config.enabled_apps.contains("discord"));
        assert!(config.check_on_wake);
        assert_eq!(config.mic_deactivation_grace_period_secs, 8.0);
    }

    #[test]
    fn round_trips_through_json() {
        let config = DetectorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: DetectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}

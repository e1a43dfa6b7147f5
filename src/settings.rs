use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;

use crate::presence::{ConnectionState, CoordinatorConfig, LogLevel, DEFAULT_APP_ID};

const SETTINGS_FILE: &str = "settings.json";
const APP_DIR: &str = "nowplaying-presence";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to locate the config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub discord_app_id: i64,
    pub reconnect_delay_secs: u64,
    pub pump_interval_ms: u64,
    pub client_log_level: LogLevel,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            discord_app_id: DEFAULT_APP_ID,
            reconnect_delay_secs: 5,
            pump_interval_ms: 16,
            client_log_level: LogLevel::Verbose,
        }
    }
}

impl AppSettings {
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            app_id: self.discord_app_id,
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
            // A zero period would make the pump interval panic
            pump_interval: Duration::from_millis(self.pump_interval_ms.max(1)),
            client_log_level: self.client_log_level,
        }
    }
}

fn get_settings_path() -> Result<PathBuf, SettingsError> {
    let config_dir = dirs::config_dir()
        .ok_or(SettingsError::NoConfigDir)?
        .join(APP_DIR);

    fs::create_dir_all(&config_dir)?;

    Ok(config_dir.join(SETTINGS_FILE))
}

pub fn load_settings() -> Result<AppSettings, SettingsError> {
    load_settings_from(&get_settings_path()?)
}

pub fn load_settings_from(path: &Path) -> Result<AppSettings, SettingsError> {
    tracing::debug!("Loading settings from {}", path.display());

    if !path.exists() {
        return Ok(AppSettings::default());
    }

    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn save_settings(settings: &AppSettings) -> Result<(), SettingsError> {
    save_settings_to(&get_settings_path()?, settings)
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
    tracing::debug!("Saving settings to {}", path.display());
    let contents = serde_json::to_string_pretty(settings)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Observable values other parts of the app read to reflect the connection
#[derive(Debug)]
pub struct SettingsStore {
    connected_user: watch::Sender<String>,
    connection_state: watch::Sender<ConnectionState>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self {
            connected_user: watch::channel(String::new()).0,
            connection_state: watch::channel(ConnectionState::Closed).0,
        }
    }

    pub fn set_connected_user(&self, username: impl Into<String>) {
        let username = username.into();
        self.connected_user.send_if_modified(|current| {
            if *current == username {
                return false;
            }
            *current = username;
            true
        });
    }

    pub fn connected_user(&self) -> String {
        self.connected_user.borrow().clone()
    }

    pub fn watch_connected_user(&self) -> watch::Receiver<String> {
        self.connected_user.subscribe()
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        self.connection_state.send_replace(state);
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection_state.borrow()
    }

    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection_state.subscribe()
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

//! # Configuration
//!
//! Loaded from `vectorclock.toml` next to the binary, falling back to
//! built-in defaults when the file is missing or malformed so a bare install
//! still boots. `SERVER_URL` in the environment overrides the configured
//! server address, matching how the deployment scripts point devices at a
//! dashboard.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const CONFIG_FILE: &str = "vectorclock.toml";
const SERVER_URL_ENV: &str = "SERVER_URL";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub display: DisplayConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the dashboard server.
    pub base_url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    /// Flight and now-playing poll cadence, seconds.
    pub flight_check_secs: u64,
    /// Weather poll cadence, seconds.
    pub weather_update_secs: u64,
    /// Anti-ghosting full refresh interval, seconds.
    pub full_refresh_secs: u64,
    /// TrueType fonts tried in order; first readable one wins.
    pub font_paths: Vec<String>,
    pub hardware: HardwarePins,
}

/// BCM pin numbers for the panel's control lines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwarePins {
    pub dc_pin: u8,
    pub rst_pin: u8,
    pub busy_pin: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            flight_check_secs: 15,
            weather_update_secs: 600,
            full_refresh_secs: 21_600,
            font_paths: vec![
                "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".to_string(),
                "/usr/share/fonts/truetype/freefont/FreeSansBold.ttf".to_string(),
                "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf".to_string(),
            ],
            hardware: HardwarePins::default(),
        }
    }
}

impl Default for HardwarePins {
    fn default() -> Self {
        Self {
            dc_pin: 25,
            rst_pin: 17,
            busy_pin: 24,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_from_path(CONFIG_FILE);
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            info!("Server URL overridden from environment: {url}");
            config.server.base_url = url;
        }
        config
    }

    /// Load from an explicit path; any failure falls back to defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(err) => {
                    warn!("Invalid config {}: {err}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn flight_check_interval(&self) -> Duration {
        Duration::from_secs(self.display.flight_check_secs)
    }

    pub fn weather_update_interval(&self) -> Duration {
        Duration::from_secs(self.display.weather_update_secs)
    }

    pub fn full_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.display.full_refresh_secs)
    }
}

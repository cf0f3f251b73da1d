//! Application configuration

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;

use crate::errors::FleetTrackerError;

const ENV_PREFIX: &str = "FLEETTRACKER";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub positions: PositionsConfig,
    pub map: MapConfig,
}

/// Tracking backend location and credentials
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Whether the hosting page was loaded over a secure transport
    #[serde(default)]
    pub secure: bool,
    /// Host used when `secure` is set
    pub public_host: String,
    /// Host used otherwise, usually a local network address
    pub local_host: String,
    /// Static bearer credential for the REST API
    pub token: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectMode {
    /// Retry after the same delay every time
    #[default]
    Fixed,
    /// Double the delay after each failed attempt, up to `max_reconnect_delay`
    Backoff,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "ChannelConfig::default_reconnect_delay")]
    pub reconnect_delay: Duration,
    #[serde(default)]
    pub reconnect: ReconnectMode,
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "ChannelConfig::default_max_reconnect_delay")]
    pub max_reconnect_delay: Duration,
    /// Capacity of the frame queue between the socket task and the view
    #[serde(default = "ChannelConfig::default_buffer")]
    pub buffer: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PositionOrdering {
    /// Every ping overwrites the stored one
    #[default]
    LastWriteWins,
    /// Pings with an older fix time than the stored one are dropped
    NewerOnly,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PositionsConfig {
    #[serde(default)]
    pub ordering: PositionOrdering,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    /// Tile template used in light mode
    pub tile_url: String,
    /// Tile template used in dark mode, falls back to `tile_url`
    #[serde(default)]
    pub tile_url_dark: Option<String>,
    #[serde(default)]
    pub attribution: String,
    #[serde(default)]
    pub dark_mode: bool,
    /// Lowest zoom the camera uses when focusing a vehicle
    #[serde(default = "MapConfig::default_focus_zoom")]
    pub focus_zoom: f64,
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "MapConfig::default_fly_duration")]
    pub fly_duration: Duration,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder(File::with_name("config/default").required(false))
    }

    /// Load configuration from an explicit file, still honouring the environment
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::builder(File::from(path).required(true))
    }

    fn builder<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<(), FleetTrackerError> {
        self.server.validate()?;
        self.channel.validate()?;
        self.map.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    /// Host selected by the secure/insecure branch
    pub fn host(&self) -> &str {
        if self.secure {
            &self.public_host
        } else {
            &self.local_host
        }
    }

    /// Streaming endpoint, `wss` on secure pages and `ws` otherwise
    pub fn socket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}/api/socket", scheme, self.host())
    }

    /// Bulk device listing endpoint
    pub fn devices_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}/api/devices", scheme, self.host())
    }

    fn validate(&self) -> Result<(), FleetTrackerError> {
        if self.host().trim().is_empty() {
            return Err(FleetTrackerError::ConfigurationError {
                message: format!(
                    "{} host cannot be empty",
                    if self.secure { "Public" } else { "Local" }
                ),
            });
        }
        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Self::default_reconnect_delay(),
            reconnect: ReconnectMode::default(),
            max_reconnect_delay: Self::default_max_reconnect_delay(),
            buffer: Self::default_buffer(),
        }
    }
}

impl ChannelConfig {
    fn default_reconnect_delay() -> Duration {
        Duration::from_millis(5000)
    }

    fn default_max_reconnect_delay() -> Duration {
        Duration::from_secs(60)
    }

    fn default_buffer() -> usize {
        100
    }

    fn validate(&self) -> Result<(), FleetTrackerError> {
        if self.reconnect_delay.is_zero() {
            return Err(FleetTrackerError::ConfigurationError {
                message: "Reconnect delay must be greater than zero".to_string(),
            });
        }
        if self.buffer == 0 {
            return Err(FleetTrackerError::ConfigurationError {
                message: "Channel buffer must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl MapConfig {
    fn default_focus_zoom() -> f64 {
        14.0
    }

    fn default_fly_duration() -> Duration {
        Duration::from_millis(1500)
    }

    fn validate(&self) -> Result<(), FleetTrackerError> {
        if self.tile_url.trim().is_empty() {
            return Err(FleetTrackerError::ConfigurationError {
                message: "Tile URL cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

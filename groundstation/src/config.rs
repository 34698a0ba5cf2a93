/*!
Configuration management for the ground station console.
*/

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use anyhow::{Context, Result};
use shared::{SharedError, GROUND_NODE_ID, REMOTE_NODE_ID};

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub radio: RadioConfig,
    pub antenna: AntennaConfig,
    pub gui: GuiConfig,
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            radio: RadioConfig::default(),
            antenna: AntennaConfig::default(),
            gui: GuiConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Radio link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Address of the packet-radio gateway
    pub gateway_addr: String,

    /// Local UDP bind address
    pub bind_addr: String,

    /// Local UDP port to listen on
    pub bind_port: u16,

    /// Node id of this station
    pub node_id: u8,

    /// Node id every command is sent to
    pub destination_id: u8,

    /// How long one receive poll waits for a frame
    pub poll_timeout_ms: u64,

    /// Use the built-in simulated radio instead of the gateway
    pub simulate: bool,

    /// Telemetry interval of the simulated radio
    pub simulated_interval_ms: u64,
}

impl RadioConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn simulated_interval(&self) -> Duration {
        Duration::from_millis(self.simulated_interval_ms)
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            gateway_addr: "127.0.0.1:5005".to_string(),
            bind_addr: "0.0.0.0".to_string(),
            bind_port: 5006,
            node_id: GROUND_NODE_ID,
            destination_id: REMOTE_NODE_ID,
            poll_timeout_ms: 100,
            simulate: false,
            simulated_interval_ms: 1000,
        }
    }
}

/// Antenna array geometry used by beam-angle mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntennaConfig {
    /// Design frequency in Hz
    pub design_frequency_hz: f64,

    /// Propagation speed in m/s
    pub propagation_speed_m_s: f64,

    /// Distance between elements in metres; half a wavelength when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_spacing_m: Option<f64>,
}

impl AntennaConfig {
    /// Element spacing over wavelength
    pub fn geometry_ratio(&self) -> shared::Result<f64> {
        shared::beam::geometry_ratio(
            self.design_frequency_hz,
            self.propagation_speed_m_s,
            self.element_spacing_m,
        )
        .ok_or_else(|| SharedError::config(format!(
            "invalid antenna geometry: frequency {} Hz, speed {} m/s, spacing {:?} m",
            self.design_frequency_hz, self.propagation_speed_m_s, self.element_spacing_m
        )))
    }
}

impl Default for AntennaConfig {
    fn default() -> Self {
        Self {
            design_frequency_hz: 10e9,
            propagation_speed_m_s: 3e8,
            element_spacing_m: None,
        }
    }
}

/// GUI specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuiConfig {
    /// Window width
    pub window_width: f32,

    /// Window height
    pub window_height: f32,

    /// Enable dark mode
    pub dark_mode: bool,

    /// Auto-save configuration on exit
    pub auto_save_config: bool,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            window_width: 650.0,
            window_height: 420.0,
            dark_mode: true,
            auto_save_config: true,
        }
    }
}

//! Configuration System using Figment
//!
//! Strongly-typed configuration for the autofocus driver. Configuration is loaded from:
//! 1. `config/autofocus.toml` (or an explicit path)
//! 2. Environment variables prefixed with `WDI_AUTOFOCUS_`, nested keys separated by `__`
//!
//! Every section and field has a default, so an empty or missing file yields a
//! usable configuration that matches the device's power-on property values.
//!
//! # Example
//! ```no_run
//! use wdi_autofocus::config::AutofocusConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AutofocusConfig::load()?;
//! config.validate()?;
//! println!("WDI endpoint: {}:{}", config.device.wdi_host, config.device.wdi_port);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppResult, AutofocusError};
use crate::validation::{
    is_finite, is_in_range, is_not_empty, AXIS_NUMBER_RANGE, DEVICE_ADDRESS_RANGE,
    TCP_PORT_RANGE, TURRET_ADDRESS_RANGE,
};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/autofocus.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "WDI_AUTOFOCUS_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutofocusConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Initial device property values
    pub device: DeviceConfiguration,
    /// Transport timeouts
    pub transport: TransportConfig,
    /// Simulated transport used by the CLI
    pub simulation: SimulationConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "WDI Autofocus".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Connection parameters and soft limits of one autofocus device.
///
/// Host, ports and addresses are connection-relevant: changing any of them
/// after the connection is up invalidates it. The limits are not; they are
/// pushed to the live device instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfiguration {
    /// Port of the motion-control connection (serial device or share URL).
    pub motion_port: String,
    /// Hostname or IP address of the WDI autofocus provider.
    pub wdi_host: String,
    /// TCP port of the WDI autofocus provider.
    pub wdi_port: u16,
    /// Device address of the focus stage.
    pub focus_address: u8,
    /// Axis number of the focus stage within its device.
    pub focus_axis: u8,
    /// Device address of the objective turret; `<= 0` means no turret.
    pub objective_turret_address: i8,
    /// Lower soft travel limit in millimetres.
    pub limit_min: f64,
    /// Upper soft travel limit in millimetres.
    pub limit_max: f64,
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self {
            motion_port: "COM1".to_string(),
            wdi_host: "Undefined".to_string(),
            wdi_port: 27,
            focus_address: 1,
            focus_axis: 1,
            objective_turret_address: -1,
            limit_min: 0.0,
            limit_max: 25.0,
        }
    }
}

impl DeviceConfiguration {
    /// Turret address, if a turret is configured.
    pub fn turret_address(&self) -> Option<u8> {
        u8::try_from(self.objective_turret_address)
            .ok()
            .filter(|address| *address > 0)
    }

    /// Validate every field against its property limits.
    pub fn validate(&self) -> AppResult<()> {
        is_not_empty("motion_port", &self.motion_port)?;
        is_not_empty("wdi_host", &self.wdi_host)?;
        is_in_range("wdi_port", i64::from(self.wdi_port), TCP_PORT_RANGE)?;
        is_in_range(
            "focus_address",
            i64::from(self.focus_address),
            DEVICE_ADDRESS_RANGE,
        )?;
        is_in_range("focus_axis", i64::from(self.focus_axis), AXIS_NUMBER_RANGE)?;
        is_in_range(
            "objective_turret_address",
            i64::from(self.objective_turret_address),
            TURRET_ADDRESS_RANGE,
        )?;
        is_finite("limit_min", self.limit_min)?;
        is_finite("limit_max", self.limit_max)?;
        if self.limit_min > self.limit_max {
            return Err(AutofocusError::Configuration(format!(
                "limit_min ({}) exceeds limit_max ({})",
                self.limit_min, self.limit_max
            )));
        }
        Ok(())
    }
}

/// Timeouts applied to every transport call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Budget for opening the endpoint and resolving addresses, in milliseconds
    pub connect_timeout_ms: u64,
    /// Budget for a single device command, in milliseconds
    pub command_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            // A full focus scan can take several seconds.
            command_timeout_ms: 30_000,
        }
    }
}

impl TransportConfig {
    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Command timeout as a `Duration`.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// One simulated motion-control device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedDevice {
    /// Device address
    pub address: u8,
    /// Number of axes (0 for peripherals such as a turret)
    #[serde(default)]
    pub axes: u8,
}

/// Behaviour of the simulated transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Hosts the simulated provider refuses to connect to
    pub unreachable_hosts: Vec<String>,
    /// Devices present on the simulated motion-control network
    pub devices: Vec<SimulatedDevice>,
    /// Raw value returned by the focus position register
    pub raw_position: i32,
    /// Whether the device reports "in focus"
    pub in_focus: bool,
    /// Artificial latency added to every call, in milliseconds
    pub latency_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            unreachable_hosts: Vec::new(),
            devices: vec![
                SimulatedDevice {
                    address: 1,
                    axes: 1,
                },
                SimulatedDevice {
                    address: 2,
                    axes: 0,
                },
            ],
            raw_position: 0,
            in_focus: true,
            latency_ms: 0,
        }
    }
}

impl AutofocusConfig {
    /// Load configuration from `config/autofocus.toml` and environment variables
    ///
    /// Environment variables override file values, e.g.
    /// `WDI_AUTOFOCUS_DEVICE__WDI_HOST=10.0.0.5`.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(AutofocusError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        self.device.validate()?;

        if self.transport.connect_timeout_ms == 0 || self.transport.command_timeout_ms == 0 {
            return Err(AutofocusError::Configuration(
                "transport timeouts must be greater than zero".to_string(),
            ));
        }

        let mut addresses = std::collections::HashSet::new();
        for device in &self.simulation.devices {
            is_in_range(
                "simulation device address",
                i64::from(device.address),
                DEVICE_ADDRESS_RANGE,
            )?;
            if !addresses.insert(device.address) {
                return Err(AutofocusError::Configuration(format!(
                    "Duplicate simulated device address: {}",
                    device.address
                )));
            }
        }

        Ok(())
    }
}

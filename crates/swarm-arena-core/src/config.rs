//! JSON configuration for the tracker and its server.

use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationParams;
use crate::tag::TagId;
use crate::world::{SensingParams, DEFAULT_SENSOR_RANGE_M};

/// Default port of the query server.
pub const DEFAULT_PORT: u16 = 6000;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_reference_distance_m() -> f64 {
    CalibrationParams::default().reference_distance_m
}

fn default_min_corner_separation_px() -> f64 {
    CalibrationParams::default().min_corner_separation_px
}

fn default_sensor_range_m() -> f64 {
    DEFAULT_SENSOR_RANGE_M
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Listen address of the query server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|_| {
            ConfigError::Invalid(format!("host {:?} is not an IP address", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Full tracker configuration. Every field has a default, so `{}` is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Distance between the two arena corner markers, metres.
    #[serde(default = "default_reference_distance_m")]
    pub reference_distance_m: f64,
    #[serde(default = "default_min_corner_separation_px")]
    pub min_corner_separation_px: f64,
    /// Sensor range of every robot without an override, metres.
    #[serde(default = "default_sensor_range_m")]
    pub sensor_range_m: f64,
    /// Robot id -> sensor range, metres.
    #[serde(default)]
    pub sensor_range_overrides: BTreeMap<u32, f64>,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            reference_distance_m: default_reference_distance_m(),
            min_corner_separation_px: default_min_corner_separation_px(),
            sensor_range_m: default_sensor_range_m(),
            sensor_range_overrides: BTreeMap::new(),
            server: ServerConfig::default(),
        }
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be finite and > 0 (got {value})"
        )))
    }
}

impl TrackerConfig {
    /// Load and validate a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("reference_distance_m", self.reference_distance_m)?;
        check_positive("min_corner_separation_px", self.min_corner_separation_px)?;
        check_positive("sensor_range_m", self.sensor_range_m)?;
        for (&id, &range) in &self.sensor_range_overrides {
            if TagId::from(id).is_corner_reference() {
                return Err(ConfigError::Invalid(
                    "marker 0 is the arena corner reference, not a robot".to_owned(),
                ));
            }
            check_positive(&format!("sensor range of robot {id}"), range)?;
        }
        self.server.socket_addr()?;
        Ok(())
    }

    pub fn calibration_params(&self) -> CalibrationParams {
        CalibrationParams {
            reference_distance_m: self.reference_distance_m,
            min_corner_separation_px: self.min_corner_separation_px,
        }
    }

    pub fn sensing_params(&self) -> SensingParams {
        SensingParams {
            default_range_m: self.sensor_range_m,
            overrides: self
                .sensor_range_overrides
                .iter()
                .map(|(&id, &range)| (TagId::from(id), range))
                .collect(),
        }
    }
}

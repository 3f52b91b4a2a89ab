//! # Configuration
//!
//! Everything tunable lives in one TOML file, loaded once at startup:
//!
//! ```toml
//! [broker]
//! fast_capacity = 1000
//!
//! [sync]
//! broadcast_rate_hz = 20.0
//! smoothing_decay = 0.001
//! snap_enabled = true
//! liveness_timeout_secs = 2.0
//!
//! [network]
//! latency_ticks = 3
//! jitter_ticks = 1
//! ```
//!
//! Every field is optional; missing fields take the values in
//! [`crate::constants`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tandem_core::BrokerConfig;

use crate::constants::{
    ANGLE_STEP_DEGREES, BROADCAST_RATE_HZ, POSITION_GRID, SMOOTHING_DECAY, TICK_RATE,
};
use crate::error::{ConfigError, ConfigResult};

/// Per-movable replication settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Authoritative broadcasts per second while held.
    pub broadcast_rate_hz: f32,
    /// Remaining error fraction after one second of smoothing, in (0, 1).
    pub smoothing_decay: f32,
    /// Snap broadcast poses to the grid.
    pub snap_enabled: bool,
    /// Position grid used when snapping.
    pub position_grid: f32,
    /// Euler angle step used when snapping, in degrees.
    pub angle_step_degrees: f32,
    /// Settle a tracked object whose owner went quiet for this long.
    /// `None` keeps tracking the last target indefinitely.
    pub liveness_timeout_secs: Option<f32>,
    /// Log state transitions at info level.
    pub debug_enabled: bool,
}

impl SyncConfig {
    /// Seconds between two rate-limited broadcasts.
    #[must_use]
    pub fn broadcast_interval(&self) -> f32 {
        1.0 / self.broadcast_rate_hz
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            broadcast_rate_hz: BROADCAST_RATE_HZ,
            smoothing_decay: SMOOTHING_DECAY,
            snap_enabled: false,
            position_grid: POSITION_GRID,
            angle_step_degrees: ANGLE_STEP_DEGREES,
            liveness_timeout_secs: None,
            debug_enabled: false,
        }
    }
}

/// Loopback network simulation settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Fixed delivery delay in hub ticks.
    pub latency_ticks: u32,
    /// Extra random delay, 0..=jitter_ticks.
    pub jitter_ticks: u32,
    /// Seed for the jitter generator.
    pub seed: u64,
    /// Ticks per second driving the simulation.
    pub tick_rate: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            latency_ticks: 0,
            jitter_ticks: 0,
            seed: 0x7A4D_E15E,
            tick_rate: TICK_RATE,
        }
    }
}

/// Complete configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    /// Update broker section.
    pub broker: BrokerConfig,
    /// Replication section.
    pub sync: SyncConfig,
    /// Network simulation section.
    pub network: NetworkConfig,
}

impl TandemConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`]
    /// for out-of-range values.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`TandemConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Checks every value range.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        let sync = &self.sync;

        if !(sync.broadcast_rate_hz.is_finite() && sync.broadcast_rate_hz > 0.0) {
            return Err(invalid(format!(
                "sync.broadcast_rate_hz must be positive, got {}",
                sync.broadcast_rate_hz
            )));
        }
        if !(sync.smoothing_decay > 0.0 && sync.smoothing_decay < 1.0) {
            return Err(invalid(format!(
                "sync.smoothing_decay must be in (0, 1), got {}",
                sync.smoothing_decay
            )));
        }
        if !(sync.position_grid.is_finite() && sync.position_grid > 0.0) {
            return Err(invalid(format!(
                "sync.position_grid must be positive, got {}",
                sync.position_grid
            )));
        }
        if !(sync.angle_step_degrees > 0.0 && sync.angle_step_degrees <= 360.0) {
            return Err(invalid(format!(
                "sync.angle_step_degrees must be in (0, 360], got {}",
                sync.angle_step_degrees
            )));
        }
        if let Some(timeout) = sync.liveness_timeout_secs {
            if !(timeout.is_finite() && timeout > 0.0) {
                return Err(invalid(format!(
                    "sync.liveness_timeout_secs must be positive, got {timeout}"
                )));
            }
        }

        if self.broker.fast_capacity == Some(0) || self.broker.slow_capacity == Some(0) {
            return Err(invalid("broker capacities must be at least 1".to_string()));
        }
        if self.network.tick_rate == 0 {
            return Err(invalid("network.tick_rate must be at least 1".to_string()));
        }

        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = TandemConfig::from_toml_str("").unwrap();
        assert_eq!(config, TandemConfig::default());
        assert_eq!(config.broker.fast_capacity, Some(1000));
        assert!((config.sync.broadcast_interval() - 0.05).abs() < 1e-6);
        assert_eq!(config.sync.liveness_timeout_secs, None);
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config = TandemConfig::from_toml_str(
            r"
            [sync]
            snap_enabled = true
            liveness_timeout_secs = 1.5

            [network]
            latency_ticks = 4
            ",
        )
        .unwrap();

        assert!(config.sync.snap_enabled);
        assert_eq!(config.sync.liveness_timeout_secs, Some(1.5));
        assert!((config.sync.smoothing_decay - 0.001).abs() < f32::EPSILON);
        assert_eq!(config.network.latency_ticks, 4);
        assert_eq!(config.network.tick_rate, 60);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        for text in [
            "[sync]\nsmoothing_decay = 1.0",
            "[sync]\nsmoothing_decay = 0.0",
            "[sync]\nbroadcast_rate_hz = 0.0",
            "[sync]\nposition_grid = -0.35",
            "[sync]\nliveness_timeout_secs = 0.0",
            "[broker]\nfast_capacity = 0",
            "[network]\ntick_rate = 0",
        ] {
            let err = TandemConfig::from_toml_str(text).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{text}: {err}");
        }
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = TandemConfig::from_toml_str("[sync\nbroken").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nbroadcast_rate_hz = 10.0").unwrap();

        let config = TandemConfig::load(file.path()).unwrap();
        assert!((config.sync.broadcast_interval() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = TandemConfig::load("/definitely/not/here/tandem.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

//! # TANDEM Shared
//!
//! Types every peer agrees on: pose math, broadcast quantization,
//! default constants and the TOML configuration.
//!
//! ## Rule
//!
//! This crate never depends on a transport. If it talks to the network,
//! it belongs in `tandem_networking`.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod constants;
pub mod error;
pub mod math;
pub mod quantize;

pub use config::{NetworkConfig, SyncConfig, TandemConfig};
pub use constants::{ANGLE_STEP_DEGREES, BROADCAST_RATE_HZ, POSITION_GRID, SMOOTHING_DECAY, TICK_RATE};
pub use error::{ConfigError, ConfigResult};
pub use math::{Pose, Quaternion, Vec3};
pub use quantize::{snap_pose, snap_position, snap_rotation};

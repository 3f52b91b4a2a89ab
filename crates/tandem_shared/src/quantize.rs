//! # Pose Quantization
//!
//! Grid snapping for authoritative broadcasts.
//!
//! ```text
//! position:  1.20 / 0.35 = 3.43  ->  round 3  ->  1.05
//! angle:     44° / 30°   = 1.47  ->  round 1  ->  30°
//! ```
//!
//! Only the broadcast copy is snapped; while held, the local pose keeps full
//! precision so the hand never visibly jumps.

use crate::math::{Pose, Quaternion, Vec3};

/// Snaps a scalar to the nearest multiple of `step`.
///
/// A non-positive or non-finite step leaves the value unchanged.
#[must_use]
pub fn snap_scalar(value: f32, step: f32) -> f32 {
    if step <= 0.0 || !step.is_finite() {
        return value;
    }
    let snapped = (value / step).round() * step;
    // Avoid broadcasting negative zero.
    if snapped == 0.0 {
        0.0
    } else {
        snapped
    }
}

/// Snaps each component of a position to the nearest multiple of `grid`.
#[must_use]
pub fn snap_position(position: Vec3, grid: f32) -> Vec3 {
    position.map(|c| snap_scalar(c, grid))
}

/// Snaps each Euler angle of a rotation to the nearest multiple of `step_degrees`.
#[must_use]
pub fn snap_rotation(rotation: Quaternion, step_degrees: f32) -> Quaternion {
    let angles = rotation.to_euler_degrees().map(|a| snap_scalar(a, step_degrees));
    Quaternion::from_euler_degrees(angles)
}

/// Snaps both halves of a pose.
#[must_use]
pub fn snap_pose(pose: Pose, grid: f32, step_degrees: f32) -> Pose {
    Pose::new(
        snap_position(pose.position, grid),
        snap_rotation(pose.rotation, step_degrees),
    )
}

//! Pose math shared by every peer.
//!
//! These are the canonical representations carried in the wire protocol.
//! Euler angles are in degrees, applied roll (X), then pitch (Y), then yaw (Z).

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 3D Vector - position, offset, Euler angles
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Linear interpolation; `t = 0` gives `self`, `t = 1` gives `other`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self * (1.0 - t) + other * t
    }

    /// Applies `f` to every component.
    #[must_use]
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self::new(f(self.x), f(self.y), f(self.z))
    }

    /// True if every component is finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Quaternion for rotations
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Quaternion {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Quaternion {
    /// Creates a new quaternion
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Converts to array (x, y, z, w)
    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Creates from array (x, y, z, w)
    #[must_use]
    pub const fn from_array(arr: [f32; 4]) -> Self {
        Self::new(arr[0], arr[1], arr[2], arr[3])
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Returns the unit quaternion, or identity for a degenerate input.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.dot(self).sqrt();
        if len <= f32::EPSILON || !len.is_finite() {
            return Self::IDENTITY;
        }
        self.scale(1.0 / len)
    }

    fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s, self.w * s)
    }

    fn negate(self) -> Self {
        self.scale(-1.0)
    }

    /// Spherical interpolation along the shortest arc.
    #[must_use]
    pub fn slerp(self, other: Self, t: f32) -> Self {
        let mut end = other;
        let mut cos_theta = self.dot(other);
        if cos_theta < 0.0 {
            end = end.negate();
            cos_theta = -cos_theta;
        }

        // Nearly parallel: nlerp avoids dividing by a vanishing sine.
        if cos_theta > 0.9995 {
            let mixed = Self::new(
                self.x + (end.x - self.x) * t,
                self.y + (end.y - self.y) * t,
                self.z + (end.z - self.z) * t,
                self.w + (end.w - self.w) * t,
            );
            return mixed.normalize();
        }

        let theta = cos_theta.min(1.0).acos();
        let sin_theta = theta.sin();
        let a = ((1.0 - t) * theta).sin() / sin_theta;
        let b = (t * theta).sin() / sin_theta;
        Self::new(
            self.x * a + end.x * b,
            self.y * a + end.y * b,
            self.z * a + end.z * b,
            self.w * a + end.w * b,
        )
        .normalize()
    }

    /// Rotation angle between two orientations, in degrees.
    #[must_use]
    pub fn angle_to(self, other: Self) -> f32 {
        let d = self.normalize().dot(other.normalize()).abs().min(1.0);
        (2.0 * d.acos()).to_degrees()
    }

    /// Builds a rotation from Euler angles in degrees.
    #[must_use]
    pub fn from_euler_degrees(angles: Vec3) -> Self {
        let (sr, cr) = (angles.x.to_radians() * 0.5).sin_cos();
        let (sp, cp) = (angles.y.to_radians() * 0.5).sin_cos();
        let (sy, cy) = (angles.z.to_radians() * 0.5).sin_cos();

        Self::new(
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
            cr * cp * cy + sr * sp * sy,
        )
    }

    /// Decomposes into Euler angles in degrees.
    ///
    /// Pitch is clamped to ±90° at the poles.
    #[must_use]
    pub fn to_euler_degrees(self) -> Vec3 {
        let q = self.normalize();

        let roll = (2.0 * (q.w * q.x + q.y * q.z)).atan2(1.0 - 2.0 * (q.x * q.x + q.y * q.y));
        let sin_pitch = 2.0 * (q.w * q.y - q.z * q.x);
        let pitch = if sin_pitch.abs() >= 1.0 {
            std::f32::consts::FRAC_PI_2.copysign(sin_pitch)
        } else {
            sin_pitch.asin()
        };
        let yaw = (2.0 * (q.w * q.z + q.x * q.y)).atan2(1.0 - 2.0 * (q.y * q.y + q.z * q.z));

        Vec3::new(roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
    }

    /// True if every component is finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Pose - position + rotation of a rigid object
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Pose {
    /// Position
    pub position: Vec3,
    /// Rotation
    pub rotation: Quaternion,
}

impl Pose {
    /// Creates a new pose
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }

    /// Identity pose at the origin
    pub const IDENTITY: Self = Self::new(Vec3::ZERO, Quaternion::IDENTITY);

    /// Positional and angular (degrees) distance to another pose.
    #[must_use]
    pub fn error_to(self, other: Self) -> (f32, f32) {
        (
            self.position.distance(other.position),
            self.rotation.angle_to(other.rotation),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a.dot(b), 32.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert!((Vec3::ZERO.distance(Vec3::new(3.0, 4.0, 0.0)) - 5.0).abs() < EPS);
    }

    #[test]
    fn test_pose_is_pod() {
        let pose = Pose::IDENTITY;
        let bytes: &[u8] = bytemuck::bytes_of(&pose);
        assert_eq!(bytes.len(), 28);
    }

    #[test]
    fn test_euler_roundtrip_off_poles() {
        let angles = Vec3::new(30.0, -45.0, 120.0);
        let back = Quaternion::from_euler_degrees(angles).to_euler_degrees();
        assert!((back.x - angles.x).abs() < 1e-3);
        assert!((back.y - angles.y).abs() < 1e-3);
        assert!((back.z - angles.z).abs() < 1e-3);
    }

    #[test]
    fn test_slerp_endpoints_and_midpoint() {
        let a = Quaternion::IDENTITY;
        let b = Quaternion::from_euler_degrees(Vec3::new(0.0, 0.0, 90.0));

        assert!(a.slerp(b, 0.0).angle_to(a) < 0.1);
        assert!(a.slerp(b, 1.0).angle_to(b) < 0.1);
        let mid = a.slerp(b, 0.5);
        assert!((mid.angle_to(a) - 45.0).abs() < 0.1);
    }

    #[test]
    fn test_slerp_takes_shortest_arc() {
        let a = Quaternion::IDENTITY;
        // Same rotation, opposite hemisphere.
        let b = Quaternion::new(0.0, 0.0, 0.0, -1.0);
        assert!(a.slerp(b, 0.5).angle_to(a) < 0.1);
    }

    #[test]
    fn test_normalize_degenerate_is_identity() {
        let zero = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(zero.normalize(), Quaternion::IDENTITY);
    }
}

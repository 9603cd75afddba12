//!
//! Math types and helpers shared by the samplers and blenders.
//!

use glam::{Mat4, Quat, Vec3, Vec4};
use glam_ext::Transform3A;

/// Local-space bone transform: translation, rotation and scale.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    #[inline]
    fn default() -> BoneTransform {
        return BoneTransform::IDENTITY;
    }
}

impl BoneTransform {
    pub const IDENTITY: BoneTransform = BoneTransform {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    pub const fn new(position: Vec3, rotation: Quat, scale: Vec3) -> BoneTransform {
        return BoneTransform {
            position,
            rotation,
            scale,
        };
    }

    #[inline]
    pub fn from_position(position: Vec3) -> BoneTransform {
        return BoneTransform {
            position,
            ..BoneTransform::IDENTITY
        };
    }

    /// Composes `self * other`, `other` is applied first.
    #[inline]
    pub fn mul(&self, other: &BoneTransform) -> BoneTransform {
        return BoneTransform {
            position: self.position + self.rotation * (self.scale * other.position),
            rotation: (self.rotation * other.rotation).normalize(),
            scale: self.scale * other.scale,
        };
    }

    /// Inverse transform. Exact for uniform scales.
    #[inline]
    pub fn inverse(&self) -> BoneTransform {
        let rotation = self.rotation.conjugate();
        let scale = self.scale.recip();
        return BoneTransform {
            position: -(scale * (rotation * self.position)),
            rotation,
            scale,
        };
    }

    /// Raises the transform to an integer power by binary exponentiation.
    /// Negative powers compose the inverse transform.
    pub fn powi(&self, n: i32) -> BoneTransform {
        let (mut base, mut exp) = if n < 0 {
            (self.inverse(), n.unsigned_abs())
        } else {
            (*self, n as u32)
        };
        let mut result = BoneTransform::IDENTITY;
        while exp > 0 {
            if exp & 1 == 1 {
                result = result.mul(&base);
            }
            base = base.mul(&base);
            exp >>= 1;
        }
        return result;
    }

    #[inline]
    pub fn abs_diff_eq(&self, other: &BoneTransform, max_abs_diff: f32) -> bool {
        return self.position.abs_diff_eq(other.position, max_abs_diff)
            && quat_abs_diff_eq_signless(self.rotation, other.rotation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff);
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        return self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite();
    }
}

impl From<BoneTransform> for Mat4 {
    #[inline]
    fn from(t: BoneTransform) -> Mat4 {
        return Mat4::from_scale_rotation_translation(t.scale, t.rotation, t.position);
    }
}

impl From<BoneTransform> for Transform3A {
    #[inline]
    fn from(t: BoneTransform) -> Transform3A {
        return Transform3A::new(t.position, t.rotation, t.scale);
    }
}

impl From<Transform3A> for BoneTransform {
    #[inline]
    fn from(t: Transform3A) -> BoneTransform {
        return BoneTransform {
            position: Vec3::from(t.translation),
            rotation: t.rotation,
            scale: Vec3::from(t.scale),
        };
    }
}

/// Compares two rotations, `q` and `-q` are considered equal.
#[inline]
pub fn quat_abs_diff_eq_signless(a: Quat, b: Quat, max_abs_diff: f32) -> bool {
    return a.abs_diff_eq(b, max_abs_diff) || a.abs_diff_eq(-b, max_abs_diff);
}

/// Flips `q` into the hemisphere of `reference`, so that interpolating or summing them
/// follows the shortest path.
#[inline]
pub fn quat_shortest_path(reference: Vec4, q: Quat) -> Quat {
    if reference.dot(Vec4::from(q)) < 0.0 {
        return -q;
    }
    return q;
}

/// Flips `q` so that its `w` is positive.
#[inline]
pub fn quat_positive_w(q: Quat) -> Quat {
    if q.w < 0.0 {
        return -q;
    }
    return q;
}

/// Weights a rotation against identity: `normalize(lerp(identity, q, weight))`, on the
/// shortest path.
#[inline]
pub fn quat_weighted(q: Quat, weight: f32) -> Quat {
    let q = quat_positive_w(q);
    let v = Vec4::new(q.x * weight, q.y * weight, q.z * weight, (q.w - 1.0) * weight + 1.0);
    return quat_normalize_or_identity(v);
}

/// Normalizes a raw quaternion accumulator, zero length accumulators give identity.
#[inline]
pub fn quat_normalize_or_identity(v: Vec4) -> Quat {
    let len_sq = v.length_squared();
    if len_sq <= f32::EPSILON * f32::EPSILON || !len_sq.is_finite() {
        return Quat::IDENTITY;
    }
    return Quat::from_vec4(v / len_sq.sqrt());
}

/// Builds a rotation from euler angles in radians, X applied first, then Y, then Z.
#[inline]
pub fn quat_from_euler_xyz(angles: Vec3) -> Quat {
    return Quat::from_rotation_z(angles.z) * Quat::from_rotation_y(angles.y) * Quat::from_rotation_x(angles.x);
}

/// Cubic hermite interpolation between `(v0, m0)` and `(v1, m1)` at `s` in [0, 1].
/// Tangents are already scaled by the segment duration.
#[inline]
pub fn hermite(v0: f32, m0: f32, v1: f32, m1: f32, s: f32) -> f32 {
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    return h00 * v0 + h10 * m0 + h01 * v1 + h11 * m1;
}

#[inline(always)]
pub(crate) fn f32_clamp_or_max(v: f32, min: f32, max: f32) -> f32 {
    return v.min(max).max(min);
}

/*!
Math aliases and small vector helpers shared by the scene and the controller.

This module intentionally contains no collision algorithms.
*/

use nalgebra as na;

use crate::constants::DIST_EPS;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Point3 = na::Point3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// Build an isometry from a translation vector and a rotation.
#[inline]
pub fn iso(translation: Vec3, rotation: Quat) -> Iso {
    Iso::from_parts(
        na::Translation3::new(translation.x, translation.y, translation.z),
        rotation,
    )
}

/// Component of `v` along the unit vector `axis`.
#[inline]
pub fn along(v: &Vec3, axis: &Vec3) -> Vec3 {
    axis * v.dot(axis)
}

/// Remove the component of `v` along the unit `normal`.
#[inline]
pub fn project_on_plane(v: &Vec3, normal: &Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Normalize `v`, returning `None` when it is too short to have a direction.
#[inline]
pub fn try_normalize(v: &Vec3) -> Option<Vec3> {
    let len_sq = v.norm_squared();
    if len_sq <= DIST_EPS * DIST_EPS {
        None
    } else {
        Some(v / len_sq.sqrt())
    }
}

#[inline]
pub fn is_finite(v: &Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[inline]
pub fn is_finite_quat(q: &Quat) -> bool {
    let c = q.coords;
    c.x.is_finite() && c.y.is_finite() && c.z.is_finite() && c.w.is_finite()
}

/// Shortest-arc rotation taking `from` onto `to`.
///
/// Falls back to a half turn around any perpendicular axis for opposite vectors.
pub fn rotation_between(from: &Vec3, to: &Vec3) -> Quat {
    if let Some(q) = Quat::rotation_between(from, to) {
        return q;
    }
    if from.dot(to) > 0.0 {
        return Quat::identity();
    }
    let axis = any_perpendicular(from);
    Quat::from_axis_angle(&na::Unit::new_normalize(axis), std::f32::consts::PI)
}

/// Some unit vector perpendicular to `v`.
pub fn any_perpendicular(v: &Vec3) -> Vec3 {
    let candidate = if v.x.abs() < 0.9 { Vec3::x() } else { Vec3::z() };
    try_normalize(&v.cross(&candidate)).unwrap_or_else(Vec3::y)
}

/// Decompose `rotation` into a twist around unit `axis` and drop the swing.
///
/// Used to keep only the yaw of a platform's rotation.
pub fn twist_about(rotation: &Quat, axis: &Vec3) -> Quat {
    let q = rotation.quaternion();
    let proj = axis * q.imag().dot(axis);
    let twist = na::Quaternion::new(q.w, proj.x, proj.y, proj.z);
    if twist.norm_squared() <= DIST_EPS * DIST_EPS {
        return Quat::identity();
    }
    Quat::from_quaternion(twist)
}

/// Signed angle (radians) of a twist rotation around `axis`.
pub fn twist_angle(rotation: &Quat, axis: &Vec3) -> f32 {
    let twist = twist_about(rotation, axis);
    match twist.axis() {
        Some(a) => twist.angle() * a.dot(axis).signum(),
        None => 0.0,
    }
}

/// Rotate `rotation` so that its local +Y matches `up`, keeping the heading as far as possible.
pub fn align_up(rotation: &Quat, up: &Vec3) -> Quat {
    let current_up = rotation * Vec3::y();
    rotation_between(&current_up, up) * rotation
}

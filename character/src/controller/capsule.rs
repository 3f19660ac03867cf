use rapier3d::parry::shape::Capsule;

use crate::{
    constants::MIN_RADIUS,
    math::{Iso, Quat, Vec3, iso},
};

/// Clamp a capsule to valid dimensions: radius at least `MIN_RADIUS`, height at least twice
/// the radius. Non-finite values fall back to `fallback`.
pub fn clamp_dimensions(height: f32, radius: f32, fallback: (f32, f32)) -> (f32, f32) {
    let radius = if radius.is_finite() {
        radius.max(MIN_RADIUS)
    } else {
        fallback.1.max(MIN_RADIUS)
    };
    let height = if height.is_finite() { height } else { fallback.0 };
    (height.max(2.0 * radius), radius)
}

/// Y capsule for the given full height and radius.
pub fn capsule_for(height: f32, radius: f32) -> Capsule {
    Capsule::new_y((height * 0.5 - radius).max(0.0), radius)
}

/// Pose of the capsule center for feet at `position`.
pub fn capsule_pose(position: &Vec3, up: &Vec3, rotation: &Quat, height: f32) -> Iso {
    iso(position + up * (height * 0.5), *rotation)
}

use rapier3d::parry::{
    query::{self, Ray, ShapeCastOptions},
    shape::{HalfSpace, Shape},
};

use crate::{
    constants::DIST_EPS,
    math::{Iso, Point3, Vec3, try_normalize},
};

/// Geometry of a single shape-cast hit in world space.
#[derive(Clone, Copy, Debug)]
pub struct CastContact {
    pub point: Point3,
    /// Unit normal pointing away from the obstacle, toward the moving shape.
    pub normal: Vec3,
    pub distance: f32,
}

/// Cast `shape` from `pose` along the unit `direction` against one static `other` shape.
///
/// Returns the travelled distance (meters, up to `max_distance`) and the contact geometry.
/// If the shapes already overlap and `direction` goes deeper, the distance is zero.
pub fn cast_against(
    shape: &dyn Shape,
    pose: &Iso,
    direction: &Vec3,
    max_distance: f32,
    other: &dyn Shape,
    other_pose: &Iso,
) -> Option<CastContact> {
    let mut opts = ShapeCastOptions::with_max_time_of_impact(max_distance.max(0.0));
    // Shapes leaving an overlap are not reported, so a character can always move out.
    opts.stop_at_penetration = false;

    // With a unit direction the time of impact is a distance in meters.
    let hit = match query::cast_shapes(
        pose,
        direction,
        shape,
        other_pose,
        &Vec3::zeros(),
        other,
        opts,
    ) {
        Ok(Some(hit)) => hit,
        _ => return None,
    };

    // Witnesses and normals are expressed in each shape's local frame.
    let moved_pose = {
        let mut p = *pose;
        p.translation.vector += direction * hit.time_of_impact;
        p
    };
    let outward = moved_pose.rotation * hit.normal1.into_inner();
    let mut normal = try_normalize(&-outward).unwrap_or(-direction);
    // Keep the normal opposing the motion (consistent with slide logic).
    if normal.dot(direction) > 0.0 {
        normal = -normal;
    }

    Some(CastContact {
        point: other_pose * hit.witness2,
        normal,
        distance: hit.time_of_impact,
    })
}

/// Cast a ray against one shape. Returns the distance along the unit `direction` and the
/// world-space surface normal.
pub fn ray_against(
    origin: &Point3,
    direction: &Vec3,
    max_distance: f32,
    other: &dyn Shape,
    other_pose: &Iso,
) -> Option<(f32, Vec3)> {
    let ray = Ray::new(*origin, *direction);
    other
        .cast_ray_and_get_normal(other_pose, &ray, max_distance.max(0.0), true)
        .map(|hit| (hit.time_of_impact, hit.normal))
}

/// Overlap between `shape` and `other`, as a unit push-out direction for `shape` and a depth.
///
/// Returns `None` when the shapes are separated or only touching (depth below `min_depth`).
pub fn penetration_against(
    shape: &dyn Shape,
    pose: &Iso,
    other: &dyn Shape,
    other_pose: &Iso,
    min_depth: f32,
) -> Option<(Vec3, f32)> {
    // parry's support map vs half-space contact reads the relative pose un-inverted, so planes
    // are measured here from the support point instead.
    if let Some(plane) = other.as_shape::<HalfSpace>() {
        return penetration_against_plane(shape, pose, plane, other_pose, min_depth);
    }

    let contact = match query::contact(pose, shape, other_pose, other, 0.0) {
        Ok(Some(contact)) => contact,
        _ => return None,
    };

    let depth = -contact.dist;
    if depth <= min_depth {
        return None;
    }

    // `normal1` points from `shape` toward `other`; push the opposite way.
    let direction = try_normalize(&-contact.normal1.into_inner())
        .or_else(|| try_normalize(&(pose.translation.vector - other_pose.translation.vector)))
        .unwrap_or_else(Vec3::y);

    if direction.norm_squared() <= DIST_EPS {
        return None;
    }
    Some((direction, depth))
}

/// Depth of the deepest point of `shape` below the plane, measured along the plane normal.
fn penetration_against_plane(
    shape: &dyn Shape,
    pose: &Iso,
    plane: &HalfSpace,
    plane_pose: &Iso,
    min_depth: f32,
) -> Option<(Vec3, f32)> {
    let normal = plane_pose.rotation * plane.normal.into_inner();
    let offset = normal.dot(&plane_pose.translation.vector);
    let deepest = shape.as_support_map()?.support_point(pose, &-normal);

    let separation = normal.dot(&deepest.coords) - offset;
    if separation >= 0.0 {
        return None;
    }
    let depth = -separation;
    (depth > min_depth).then_some((normal, depth))
}

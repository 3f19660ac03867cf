use nalgebra as na;
use rapier3d::parry::{
    bounding_volume::Aabb,
    partitioning::{Bvh, BvhBuildStrategy},
    shape::Shape,
};

use crate::math::{Iso, Vec3};

/// Broad-phase accelerator over the scene's static colliders.
///
/// Notes:
/// - Finite static shapes are stored as world-space AABBs in a BVH.
/// - `leaf_colliders` maps each BVH leaf back to its index in the scene's collider list.
/// - Half-spaces are unbounded and kept in `plane_colliders`; they are tested on every query.
/// - Colliders attached to moving bodies are not indexed here.
pub struct StaticAccel {
    pub bvh: Bvh,
    pub leaf_colliders: Vec<usize>,
    pub plane_colliders: Vec<usize>,
}

impl StaticAccel {
    pub fn empty() -> Self {
        Self {
            bvh: Bvh::from_leaves(BvhBuildStrategy::Binned, &[]),
            leaf_colliders: Vec::new(),
            plane_colliders: Vec::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaf_colliders.is_empty() && self.plane_colliders.is_empty()
    }

    /// Number of indexed (finite) colliders.
    #[inline]
    pub fn len(&self) -> usize {
        self.leaf_colliders.len()
    }
}

/// Static entry handed to [`build_static_accel`].
pub struct StaticEntry<'a> {
    pub index: usize,
    pub shape: &'a dyn Shape,
    pub pose: Iso,
    pub is_plane: bool,
}

/// Build the broad-phase accelerator over static colliders.
pub fn build_static_accel<'a>(entries: impl IntoIterator<Item = StaticEntry<'a>>) -> StaticAccel {
    let mut aabbs: Vec<Aabb> = Vec::new();
    let mut leaf_colliders: Vec<usize> = Vec::new();
    let mut plane_colliders: Vec<usize> = Vec::new();

    for entry in entries {
        if entry.is_plane {
            plane_colliders.push(entry.index);
        } else {
            aabbs.push(entry.shape.compute_aabb(&entry.pose));
            leaf_colliders.push(entry.index);
        }
    }

    StaticAccel {
        bvh: if aabbs.is_empty() {
            Bvh::from_leaves(BvhBuildStrategy::Binned, &[])
        } else {
            Bvh::from_leaves(BvhBuildStrategy::Binned, &aabbs)
        },
        leaf_colliders,
        plane_colliders,
    }
}

/// AABB of `shape` at `pose` swept by `translation`, inflated by `margin`.
pub fn swept_aabb(shape: &dyn Shape, pose: &Iso, translation: Vec3, margin: f32) -> Aabb {
    let start = shape.compute_aabb(pose);
    let mut end_pose = *pose;
    end_pose.translation.vector += translation;
    let end = shape.compute_aabb(&end_pose);

    let swept = aabb_union(&start, &end);
    if margin > 0.0 {
        aabb_inflate(&swept, margin)
    } else {
        swept
    }
}

/// Indices of static colliders whose AABB intersects `aabb`.
///
/// Returns indices into the scene collider list (not the BVH leaf array).
pub fn query_static_candidates<'a>(
    accel: &'a StaticAccel,
    aabb: &'a Aabb,
) -> impl Iterator<Item = usize> + 'a {
    accel
        .bvh
        .intersect_aabb(aabb)
        .map(move |leaf_idx| accel.leaf_colliders[leaf_idx as usize])
}

/// Compute the union of two AABBs.
pub fn aabb_union(a: &Aabb, b: &Aabb) -> Aabb {
    let min = na::Point3::new(
        a.mins.x.min(b.mins.x),
        a.mins.y.min(b.mins.y),
        a.mins.z.min(b.mins.z),
    );
    let max = na::Point3::new(
        a.maxs.x.max(b.maxs.x),
        a.maxs.y.max(b.maxs.y),
        a.maxs.z.max(b.maxs.z),
    );
    Aabb {
        mins: min,
        maxs: max,
    }
}

/// Inflate an AABB by `margin` on all sides.
pub fn aabb_inflate(a: &Aabb, margin: f32) -> Aabb {
    if margin <= 0.0 {
        return *a;
    }
    let delta = na::Vector3::new(margin, margin, margin);
    Aabb {
        mins: a.mins - delta,
        maxs: a.maxs + delta,
    }
}

/// Test two AABBs for intersection.
pub fn aabb_intersects(a: &Aabb, b: &Aabb) -> bool {
    !(a.maxs.x < b.mins.x
        || a.mins.x > b.maxs.x
        || a.maxs.y < b.mins.y
        || a.mins.y > b.maxs.y
        || a.maxs.z < b.mins.z
        || a.mins.z > b.maxs.z)
}

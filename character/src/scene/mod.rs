/*!
Scene root module: the physics queries a character controller needs.

The controller talks to physics only through the [`CollisionWorld`] trait so it can be bound
to any backend. [`CollisionScene`] is the bundled implementation, using parry3d (re-exported
by rapier3d) for narrow-phase queries and a BVH broad-phase over static geometry:

- types:        handles, filters, hit records
- shapes:       collider definitions and validation
- broad:        broad-phase helpers (swept AABBs, static BVH)
- narrow_phase: thin wrappers over parry3d queries (shape casts, rays, contacts)
*/

pub mod broad;
pub mod narrow_phase;
pub mod shapes;
pub mod types;

use rapier3d::parry::{
    bounding_volume::Aabb,
    shape::{Shape, SharedShape},
};

pub use shapes::{ColliderDef, ColliderShapeDef, shape_from_def};
pub use types::{
    BodyId, BodyInfo, BodyKind, CharacterHit, CharacterId, ColliderId, ColliderInfo,
    ContactCategory, Penetration, QueryFilter, RayHit, SweepHit,
};

use crate::{
    bitmask_flags::Layer,
    math::{Iso, Point3, Vec3, iso, is_finite},
};
use broad::{StaticAccel, StaticEntry, aabb_inflate, aabb_intersects, swept_aabb};

/// Errors produced while building or editing a scene.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("collider pose is not finite")]
    NonFinitePose,
    #[error("invalid {shape} dimension: {value}")]
    InvalidDimension { shape: &'static str, value: f32 },
    #[error("body mass must be positive and finite, got {0}")]
    InvalidMass(f32),
    #[error("unknown body {0:?}")]
    UnknownBody(BodyId),
    #[error("unknown collider {0:?}")]
    UnknownCollider(ColliderId),
}

/// A body whose pose can carry characters standing on it.
pub trait MovingPlatform {
    /// Pose of the platform at the current fixed tick.
    fn fixed_pose(&self) -> Iso;
}

/// Physics backend used by the character controller.
///
/// All queries are synchronous and run to completion within the caller's tick.
pub trait CollisionWorld {
    /// Sweep `shape` from `pose` along unit `direction` and return the earliest hit within
    /// `max_distance`.
    fn cast_shape(
        &self,
        shape: &dyn Shape,
        pose: &Iso,
        direction: &Vec3,
        max_distance: f32,
        filter: &QueryFilter,
    ) -> Option<SweepHit>;

    /// Cast a ray and return the earliest hit within `max_distance`.
    fn cast_ray(
        &self,
        origin: &Point3,
        direction: &Vec3,
        max_distance: f32,
        filter: &QueryFilter,
    ) -> Option<RayHit>;

    /// Collect overlaps of `shape` at `pose` deeper than `min_depth` into `out` (not cleared),
    /// stopping once `out` holds `max` entries.
    fn penetrations(
        &self,
        shape: &dyn Shape,
        pose: &Iso,
        min_depth: f32,
        filter: &QueryFilter,
        max: usize,
        out: &mut Vec<Penetration>,
    );

    fn collider(&self, collider: ColliderId) -> Option<ColliderInfo>;

    fn body(&self, body: BodyId) -> Option<BodyInfo>;

    /// The body as a moving platform, if it is one.
    fn moving_platform(&self, body: BodyId) -> Option<&dyn MovingPlatform>;

    /// Apply an impulse (N·s) at a world-space point to a dynamic body.
    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3, point: Point3);

    /// Tell the struck collider's hit handlers about a character hit.
    fn notify_hit(&mut self, _hit: &CharacterHit) {}
}

/// Callback invoked when a character strikes a collider.
pub type HitHandler = Box<dyn FnMut(&CharacterHit)>;

struct SceneCollider {
    shape: SharedShape,
    /// World pose for free colliders, body-relative pose for attached ones.
    local_pose: Iso,
    layer: Layer,
    body: Option<BodyId>,
    character: Option<CharacterId>,
    is_plane: bool,
}

/// A rigid body in the scene.
#[derive(Clone, Debug)]
pub struct SceneBody {
    pub kind: BodyKind,
    pub pose: Iso,
    pub mass: f32,
    /// Velocity accumulated from impulses; the host physics integrates it.
    pub linear_velocity: Vec3,
    /// Character this body represents, if any.
    pub character: Option<CharacterId>,
}

impl MovingPlatform for SceneBody {
    fn fixed_pose(&self) -> Iso {
        self.pose
    }
}

/// In-memory query world with static colliders and kinematic/dynamic bodies.
///
/// Static colliders are indexed in a BVH that is rebuilt whenever static geometry changes.
/// Colliders attached to kinematic or dynamic bodies are tested linearly after an AABB check.
pub struct CollisionScene {
    colliders: Vec<SceneCollider>,
    bodies: Vec<SceneBody>,
    accel: StaticAccel,
    moving: Vec<usize>,
    hit_handlers: Vec<(ColliderId, HitHandler)>,
}

impl Default for CollisionScene {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionScene {
    pub fn new() -> Self {
        Self {
            colliders: Vec::new(),
            bodies: Vec::new(),
            accel: StaticAccel::empty(),
            moving: Vec::new(),
            hit_handlers: Vec::new(),
        }
    }

    /// Insert a free (static) collider.
    pub fn insert_static(&mut self, def: ColliderDef) -> Result<ColliderId, SceneError> {
        let shape = shape_from_def(&def)?;
        let id = self.push_collider(SceneCollider {
            is_plane: matches!(def.shape, ColliderShapeDef::Plane { .. }),
            shape,
            local_pose: iso(def.pose_translation(), def.rotation),
            layer: def.layer,
            body: None,
            character: None,
        });
        self.rebuild_accel();
        Ok(id)
    }

    /// Insert a body. `mass` is only meaningful for dynamic bodies but must be positive.
    pub fn insert_body(&mut self, kind: BodyKind, pose: Iso, mass: f32) -> Result<BodyId, SceneError> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(SceneError::InvalidMass(mass));
        }
        if !is_finite(&pose.translation.vector) {
            return Err(SceneError::NonFinitePose);
        }
        let id = BodyId(self.bodies.len() as u32);
        self.bodies.push(SceneBody {
            kind,
            pose,
            mass,
            linear_velocity: Vec3::zeros(),
            character: None,
        });
        Ok(id)
    }

    /// Attach a collider to `body`, posed relative to it.
    pub fn insert_attached(
        &mut self,
        body: BodyId,
        def: ColliderDef,
    ) -> Result<ColliderId, SceneError> {
        let kind = self.body_ref(body)?.kind;
        let character = self.body_ref(body)?.character;
        let shape = shape_from_def(&def)?;
        let id = self.push_collider(SceneCollider {
            is_plane: matches!(def.shape, ColliderShapeDef::Plane { .. }),
            shape,
            local_pose: iso(def.pose_translation(), def.rotation),
            layer: def.layer,
            body: Some(body),
            character,
        });
        if kind == BodyKind::Fixed {
            self.rebuild_accel();
        } else {
            self.moving.push(id.0 as usize);
        }
        Ok(id)
    }

    /// Insert the kinematic body and capsule collider representing a character.
    ///
    /// The collider is a Y capsule whose bottom sits at the body origin.
    pub fn insert_character(
        &mut self,
        character: CharacterId,
        pose: Iso,
        height: f32,
        radius: f32,
        mass: f32,
    ) -> Result<(BodyId, ColliderId), SceneError> {
        let body = self.insert_body(BodyKind::Kinematic, pose, mass)?;
        self.bodies[body.0 as usize].character = Some(character);
        let collider = self.insert_attached(
            body,
            ColliderDef::capsule_y((height * 0.5 - radius).max(0.0), radius)
                .translation(Vec3::new(0.0, height * 0.5, 0.0))
                .layer(Layer::Character),
        )?;
        Ok((body, collider))
    }

    /// Replace a collider's shape and local pose.
    pub fn set_collider_shape(
        &mut self,
        collider: ColliderId,
        def: ColliderDef,
    ) -> Result<(), SceneError> {
        let shape = shape_from_def(&def)?;
        let entry = self
            .colliders
            .get_mut(collider.0 as usize)
            .ok_or(SceneError::UnknownCollider(collider))?;
        entry.shape = shape;
        entry.local_pose = iso(def.pose_translation(), def.rotation);
        entry.is_plane = matches!(def.shape, ColliderShapeDef::Plane { .. });
        let body = entry.body;
        if self.is_static(body) {
            self.rebuild_accel();
        }
        Ok(())
    }

    /// Move a body. Kinematic bodies moved this way act as moving platforms.
    pub fn set_body_pose(&mut self, body: BodyId, pose: Iso) -> Result<(), SceneError> {
        if !is_finite(&pose.translation.vector) {
            return Err(SceneError::NonFinitePose);
        }
        let entry = self
            .bodies
            .get_mut(body.0 as usize)
            .ok_or(SceneError::UnknownBody(body))?;
        entry.pose = pose;
        if entry.kind == BodyKind::Fixed {
            self.rebuild_accel();
        }
        Ok(())
    }

    pub fn body_state(&self, body: BodyId) -> Option<&SceneBody> {
        self.bodies.get(body.0 as usize)
    }

    pub fn set_body_velocity(&mut self, body: BodyId, velocity: Vec3) -> Result<(), SceneError> {
        let entry = self
            .bodies
            .get_mut(body.0 as usize)
            .ok_or(SceneError::UnknownBody(body))?;
        entry.linear_velocity = velocity;
        Ok(())
    }

    /// Register a handler called whenever a character strikes `collider`.
    pub fn add_hit_handler(&mut self, collider: ColliderId, handler: HitHandler) {
        self.hit_handlers.push((collider, handler));
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    fn push_collider(&mut self, collider: SceneCollider) -> ColliderId {
        let id = ColliderId(self.colliders.len() as u32);
        self.colliders.push(collider);
        id
    }

    fn body_ref(&self, body: BodyId) -> Result<&SceneBody, SceneError> {
        self.bodies
            .get(body.0 as usize)
            .ok_or(SceneError::UnknownBody(body))
    }

    fn is_static(&self, body: Option<BodyId>) -> bool {
        match body {
            None => true,
            Some(b) => self
                .bodies
                .get(b.0 as usize)
                .is_none_or(|body| body.kind == BodyKind::Fixed),
        }
    }

    fn world_pose(&self, collider: &SceneCollider) -> Iso {
        match collider.body.and_then(|b| self.bodies.get(b.0 as usize)) {
            Some(body) => body.pose * collider.local_pose,
            None => collider.local_pose,
        }
    }

    fn rebuild_accel(&mut self) {
        let entries: Vec<StaticEntry<'_>> = self
            .colliders
            .iter()
            .enumerate()
            .filter(|(_, c)| self.is_static(c.body))
            .map(|(index, c)| StaticEntry {
                index,
                shape: c.shape.as_ref(),
                pose: self.world_pose(c),
                is_plane: c.is_plane,
            })
            .collect();
        self.accel = broad::build_static_accel(entries);
    }

    fn passes(&self, collider: &SceneCollider, filter: &QueryFilter) -> bool {
        if !filter.layers.has(collider.layer) {
            return false;
        }
        if filter.exclude_character.is_some() && collider.character == filter.exclude_character {
            return false;
        }
        if filter.exclude_body.is_some() && collider.body == filter.exclude_body {
            return false;
        }
        true
    }

    /// Visit every collider that may touch `aabb` and passes `filter`.
    fn for_each_candidate(
        &self,
        aabb: &Aabb,
        filter: &QueryFilter,
        mut visit: impl FnMut(usize, &SceneCollider, Iso),
    ) {
        for &idx in &self.accel.plane_colliders {
            let c = &self.colliders[idx];
            if self.passes(c, filter) {
                visit(idx, c, self.world_pose(c));
            }
        }
        for idx in broad::query_static_candidates(&self.accel, aabb) {
            let c = &self.colliders[idx];
            if self.passes(c, filter) {
                visit(idx, c, self.world_pose(c));
            }
        }
        for &idx in &self.moving {
            let c = &self.colliders[idx];
            if !self.passes(c, filter) {
                continue;
            }
            let pose = self.world_pose(c);
            if c.is_plane || aabb_intersects(&c.shape.compute_aabb(&pose), aabb) {
                visit(idx, c, pose);
            }
        }
    }
}

impl CollisionWorld for CollisionScene {
    fn cast_shape(
        &self,
        shape: &dyn Shape,
        pose: &Iso,
        direction: &Vec3,
        max_distance: f32,
        filter: &QueryFilter,
    ) -> Option<SweepHit> {
        let swept = swept_aabb(shape, pose, direction * max_distance, 0.01);
        let mut best: Option<SweepHit> = None;
        self.for_each_candidate(&swept, filter, |idx, c, other_pose| {
            if let Some(hit) = narrow_phase::cast_against(
                shape,
                pose,
                direction,
                max_distance,
                c.shape.as_ref(),
                &other_pose,
            ) {
                if best.is_none_or(|b| hit.distance < b.distance) {
                    best = Some(SweepHit {
                        collider: ColliderId(idx as u32),
                        body: c.body,
                        character: c.character,
                        point: hit.point,
                        normal: hit.normal,
                        distance: hit.distance,
                    });
                }
            }
        });
        best
    }

    fn cast_ray(
        &self,
        origin: &Point3,
        direction: &Vec3,
        max_distance: f32,
        filter: &QueryFilter,
    ) -> Option<RayHit> {
        let end = origin + direction * max_distance;
        let aabb = aabb_inflate(&Aabb::new(origin.inf(&end), origin.sup(&end)), 0.01);
        let mut best: Option<RayHit> = None;
        self.for_each_candidate(&aabb, filter, |idx, c, other_pose| {
            if let Some((distance, normal)) = narrow_phase::ray_against(
                origin,
                direction,
                max_distance,
                c.shape.as_ref(),
                &other_pose,
            ) {
                if best.is_none_or(|b| distance < b.distance) {
                    best = Some(RayHit {
                        collider: ColliderId(idx as u32),
                        body: c.body,
                        point: origin + direction * distance,
                        normal,
                        distance,
                    });
                }
            }
        });
        best
    }

    fn penetrations(
        &self,
        shape: &dyn Shape,
        pose: &Iso,
        min_depth: f32,
        filter: &QueryFilter,
        max: usize,
        out: &mut Vec<Penetration>,
    ) {
        let aabb = aabb_inflate(&shape.compute_aabb(pose), 0.01);
        self.for_each_candidate(&aabb, filter, |idx, c, other_pose| {
            if out.len() >= max {
                return;
            }
            if let Some((direction, depth)) = narrow_phase::penetration_against(
                shape,
                pose,
                c.shape.as_ref(),
                &other_pose,
                min_depth,
            ) {
                let kind = c.body.and_then(|b| self.bodies.get(b.0 as usize)).map(|b| b.kind);
                out.push(Penetration {
                    collider: ColliderId(idx as u32),
                    category: ContactCategory::from(kind),
                    direction,
                    depth,
                });
            }
        });
    }

    fn collider(&self, collider: ColliderId) -> Option<ColliderInfo> {
        self.colliders.get(collider.0 as usize).map(|c| ColliderInfo {
            body: c.body,
            character: c.character,
        })
    }

    fn body(&self, body: BodyId) -> Option<BodyInfo> {
        self.bodies.get(body.0 as usize).map(|b| BodyInfo {
            kind: b.kind,
            mass: b.mass,
        })
    }

    fn moving_platform(&self, body: BodyId) -> Option<&dyn MovingPlatform> {
        self.bodies
            .get(body.0 as usize)
            .filter(|b| b.kind == BodyKind::Kinematic && b.character.is_none())
            .map(|b| b as &dyn MovingPlatform)
    }

    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3, _point: Point3) {
        if let Some(b) = self.bodies.get_mut(body.0 as usize) {
            if b.kind == BodyKind::Dynamic && is_finite(&impulse) {
                b.linear_velocity += impulse / b.mass;
            }
        }
    }

    fn notify_hit(&mut self, hit: &CharacterHit) {
        for (collider, handler) in self.hit_handlers.iter_mut() {
            if *collider == hit.collider {
                handler(hit);
            }
        }
    }
}

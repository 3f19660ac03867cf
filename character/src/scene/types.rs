/*!
Data types exchanged between the scene and the character controller.

This module contains no algorithms. It defines:
- handles for colliders, bodies and characters,
- query filters,
- results of sweeps, ray casts and overlap queries,
- the contact record passed to hit handlers.
*/

use crate::{
    bitmask_flags::{CollisionFlags, LayerMask},
    math::{Point3, Vec3},
};

/// Handle of a collider inside a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderId(pub u32);

/// Handle of a body inside a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

/// Identity of a character controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacterId(pub u32);

/// How a body participates in the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// Never moves.
    Fixed,
    /// Moved by game code (platforms, characters).
    Kinematic,
    /// Moved by forces; can be pushed.
    Dynamic,
}

/// Broad category of the thing the character overlaps or hits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactCategory {
    /// No body, or a fixed body.
    Static,
    Kinematic,
    Dynamic,
}

impl From<Option<BodyKind>> for ContactCategory {
    fn from(kind: Option<BodyKind>) -> Self {
        match kind {
            None | Some(BodyKind::Fixed) => ContactCategory::Static,
            Some(BodyKind::Kinematic) => ContactCategory::Kinematic,
            Some(BodyKind::Dynamic) => ContactCategory::Dynamic,
        }
    }
}

/// Which colliders a query may report.
#[derive(Clone, Copy, Debug)]
pub struct QueryFilter {
    /// Only colliders on one of these layers are reported.
    pub layers: LayerMask,
    /// Colliders owned by this character are skipped.
    pub exclude_character: Option<CharacterId>,
    /// Colliders attached to this body are skipped.
    pub exclude_body: Option<BodyId>,
}

impl QueryFilter {
    pub fn new(layers: LayerMask) -> Self {
        Self {
            layers,
            exclude_character: None,
            exclude_body: None,
        }
    }

    pub fn excluding_character(mut self, character: CharacterId) -> Self {
        self.exclude_character = Some(character);
        self
    }

    pub fn excluding_body(mut self, body: BodyId) -> Self {
        self.exclude_body = Some(body);
        self
    }
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self::new(LayerMask::all())
    }
}

/// Earliest hit of a shape swept along a direction.
#[derive(Clone, Copy, Debug)]
pub struct SweepHit {
    pub collider: ColliderId,
    pub body: Option<BodyId>,
    pub character: Option<CharacterId>,
    /// World-space contact point on the obstacle.
    pub point: Point3,
    /// World-space unit normal pointing away from the obstacle, toward the swept shape.
    pub normal: Vec3,
    /// Distance travelled along the sweep direction before contact (meters).
    pub distance: f32,
}

/// Earliest hit of a ray.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    pub collider: ColliderId,
    pub body: Option<BodyId>,
    pub point: Point3,
    /// World-space unit surface normal.
    pub normal: Vec3,
    pub distance: f32,
}

/// An overlap between a query shape and a collider.
#[derive(Clone, Copy, Debug)]
pub struct Penetration {
    pub collider: ColliderId,
    pub category: ContactCategory,
    /// Unit direction moving the query shape out of the collider.
    pub direction: Vec3,
    /// Overlap depth along `direction` (meters, positive).
    pub depth: f32,
}

/// Collider metadata visible to the controller.
#[derive(Clone, Copy, Debug)]
pub struct ColliderInfo {
    pub body: Option<BodyId>,
    pub character: Option<CharacterId>,
}

/// Body metadata visible to the controller.
#[derive(Clone, Copy, Debug)]
pub struct BodyInfo {
    pub kind: BodyKind,
    pub mass: f32,
}

/// Full record of a character striking something during its move loop.
#[derive(Clone, Copy, Debug)]
pub struct CharacterHit {
    /// The character that moved.
    pub character: CharacterId,
    /// The collider it struck.
    pub collider: ColliderId,
    pub body: Option<BodyId>,
    /// Character owning the struck collider, if any.
    pub other_character: Option<CharacterId>,
    pub point: Point3,
    pub normal: Vec3,
    /// Direction of the move segment that produced the hit.
    pub move_direction: Vec3,
    /// Distance the segment still wanted to travel when it hit.
    pub move_length: f32,
    /// Side classification of this contact.
    pub flags: CollisionFlags,
}

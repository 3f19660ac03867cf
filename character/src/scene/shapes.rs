use rapier3d::parry::shape::SharedShape;

use crate::{
    bitmask_flags::Layer,
    math::{Quat, Vec3, is_finite, is_finite_quat},
    scene::SceneError,
};

/// Supported collider shapes.
#[derive(Clone, Debug)]
pub enum ColliderShapeDef {
    /// Infinite plane (half-space).
    ///
    /// The plane normal is derived from the pose as `rotation * +Y`, and the plane is moved
    /// `offset_along_normal` meters along it.
    Plane { offset_along_normal: f32 },

    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vec3 },

    /// Sphere/ball (meters).
    Sphere { radius: f32 },

    /// Y-aligned capsule (meters). `half_height` is half the cylinder segment.
    CapsuleY { radius: f32, half_height: f32 },

    /// Y-aligned cylinder (meters).
    CylinderY { radius: f32, half_height: f32 },

    /// Y-aligned cone (meters).
    ConeY { radius: f32, half_height: f32 },

    /// Rounded cuboid (meters). `border_radius` rounds all edges/corners.
    RoundCuboid {
        half_extents: Vec3,
        border_radius: f32,
    },
}

/// Definition of a collider to insert into a scene.
///
/// The pose is world-space for free colliders and body-relative for attached ones.
#[derive(Clone, Debug)]
pub struct ColliderDef {
    pub shape: ColliderShapeDef,
    pub translation: Vec3,
    pub rotation: Quat,
    pub layer: Layer,
}

impl ColliderDef {
    pub fn new(shape: ColliderShapeDef) -> Self {
        Self {
            shape,
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
            layer: Layer::Default,
        }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(ColliderShapeDef::Cuboid { half_extents })
    }

    pub fn plane() -> Self {
        Self::new(ColliderShapeDef::Plane {
            offset_along_normal: 0.0,
        })
    }

    pub fn sphere(radius: f32) -> Self {
        Self::new(ColliderShapeDef::Sphere { radius })
    }

    pub fn capsule_y(half_height: f32, radius: f32) -> Self {
        Self::new(ColliderShapeDef::CapsuleY {
            radius,
            half_height,
        })
    }

    pub fn translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    /// Pose of the shape, including the plane offset.
    pub(crate) fn pose_translation(&self) -> Vec3 {
        match self.shape {
            ColliderShapeDef::Plane {
                offset_along_normal,
            } => self.translation + self.rotation * Vec3::y() * offset_along_normal,
            _ => self.translation,
        }
    }
}

fn positive(shape: &'static str, value: f32) -> Result<f32, SceneError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SceneError::InvalidDimension { shape, value })
    }
}

fn non_negative(shape: &'static str, value: f32) -> Result<f32, SceneError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SceneError::InvalidDimension { shape, value })
    }
}

fn positive_extents(shape: &'static str, he: &Vec3) -> Result<Vec3, SceneError> {
    Ok(Vec3::new(
        positive(shape, he.x)?,
        positive(shape, he.y)?,
        positive(shape, he.z)?,
    ))
}

/// Validate a definition and build its parry shape.
pub fn shape_from_def(def: &ColliderDef) -> Result<SharedShape, SceneError> {
    if !is_finite(&def.translation) || !is_finite_quat(&def.rotation) {
        return Err(SceneError::NonFinitePose);
    }

    let shape = match &def.shape {
        ColliderShapeDef::Plane {
            offset_along_normal,
        } => {
            if !offset_along_normal.is_finite() {
                return Err(SceneError::InvalidDimension {
                    shape: "plane",
                    value: *offset_along_normal,
                });
            }
            // Local +Y; the collider pose orients it.
            SharedShape::halfspace(Vec3::y_axis())
        }

        ColliderShapeDef::Cuboid { half_extents } => {
            let he = positive_extents("cuboid", half_extents)?;
            SharedShape::cuboid(he.x, he.y, he.z)
        }

        ColliderShapeDef::Sphere { radius } => SharedShape::ball(positive("sphere", *radius)?),

        ColliderShapeDef::CapsuleY {
            radius,
            half_height,
        } => SharedShape::capsule_y(
            non_negative("capsule", *half_height)?,
            positive("capsule", *radius)?,
        ),

        ColliderShapeDef::CylinderY {
            radius,
            half_height,
        } => SharedShape::cylinder(
            positive("cylinder", *half_height)?,
            positive("cylinder", *radius)?,
        ),

        ColliderShapeDef::ConeY {
            radius,
            half_height,
        } => SharedShape::cone(positive("cone", *half_height)?, positive("cone", *radius)?),

        ColliderShapeDef::RoundCuboid {
            half_extents,
            border_radius,
        } => {
            let he = positive_extents("round cuboid", half_extents)?;
            SharedShape::round_cuboid(
                he.x,
                he.y,
                he.z,
                non_negative("round cuboid", *border_radius)?,
            )
        }
    };

    Ok(shape)
}

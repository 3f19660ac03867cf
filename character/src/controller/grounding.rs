use log::trace;
use rapier3d::parry::shape::Ball;

use crate::{
    bitmask_flags::CollisionFlag,
    constants::{
        EDGE_NORMAL_TOLERANCE, EDGE_PROBE_HEIGHT, EDGE_PROBE_OFFSET, GROUND_CHECK_DISTANCE,
        MIN_MOVE_DISTANCE,
    },
    math::{Point3, Vec3, iso, project_on_plane, try_normalize},
    scene::{BodyId, CollisionWorld},
};

use super::{CharacterController, MoveInput, VelocityCorrection};

/// Result of the post-move ground probe.
#[derive(Clone, Copy, Debug)]
pub(super) struct GroundContact {
    pub normal: Vec3,
    pub surface_normal: Vec3,
    pub body: Option<BodyId>,
}

impl CharacterController {
    /// Surface normal at a ground contact, corrected for edges.
    ///
    /// A ray is cast down just behind the contact (against the horizontal part of `normal`).
    /// If it finds a flatter surface, the contact is on an edge and that surface's normal wins.
    pub(super) fn edge_surface_normal(
        &self,
        world: &dyn CollisionWorld,
        point: &Point3,
        normal: &Vec3,
    ) -> Vec3 {
        let Some(inward) = try_normalize(&project_on_plane(normal, &self.up)) else {
            return *normal;
        };
        let origin = point - inward * EDGE_PROBE_OFFSET + self.up * EDGE_PROBE_HEIGHT;
        let probe = world.cast_ray(
            &origin,
            &-self.up,
            EDGE_PROBE_HEIGHT * 2.0,
            &self.collision_filter(),
        );
        match probe {
            Some(hit)
                if hit.normal.dot(&self.up) > normal.dot(&self.up) + EDGE_NORMAL_TOLERANCE =>
            {
                hit.normal
            }
            _ => *normal,
        }
    }

    /// Probe below the capsule for ground.
    ///
    /// A sphere matching the bottom of the capsule is cast down for the skin width plus
    /// `GROUND_CHECK_DISTANCE`. If it finds nothing that qualifies, a ray from the feet decides.
    /// Ground must have `normal · up > sin(wall_angle)`.
    pub(super) fn probe_ground(&self, world: &dyn CollisionWorld) -> Option<GroundContact> {
        let up = self.up;
        let skin = self.config.skin_width();
        let wall_sine = self.config.wall_sine();
        let filter = self.collision_filter();
        let distance = skin + GROUND_CHECK_DISTANCE;

        let ball = Ball::new(self.radius);
        let pose = iso(self.position + up * self.radius, self.rotation);
        if let Some(hit) = world.cast_shape(&ball, &pose, &-up, distance, &filter) {
            if hit.normal.dot(&up) > wall_sine {
                return Some(GroundContact {
                    normal: hit.normal,
                    surface_normal: self.edge_surface_normal(world, &hit.point, &hit.normal),
                    body: hit.body,
                });
            }
        }

        let origin = Point3::from(self.position + up * skin);
        let hit = world.cast_ray(&origin, &-up, distance + skin, &filter)?;
        (hit.normal.dot(&up) > wall_sine).then_some(GroundContact {
            normal: hit.normal,
            surface_normal: hit.normal,
            body: hit.body,
        })
    }

    pub(super) fn update_grounding(&mut self, world: &dyn CollisionWorld, dt: f32) {
        match self.probe_ground(world) {
            Some(ground) => {
                self.state.is_grounded = true;
                self.state.air_time = 0.0;
                self.state.ground_normal = ground.normal;
                self.state.ground_surface_normal = ground.surface_normal;
                self.state.collision_flags.add(CollisionFlag::Below);
                self.ground_body = ground.body;
            }
            None => {
                self.state.is_grounded = false;
                self.state.air_time += dt;
                self.state.ground_normal = Vec3::zeros();
                self.state.ground_surface_normal = Vec3::zeros();
                self.ground_body = None;
            }
        }
    }

    /// Pull the capsule down onto walkable ground within `ground_snap_height`.
    ///
    /// Skipped unless the input asked for it, the character was grounded last tick, is not
    /// moving away from the ground and snapping is not blocked (teleports block it for a tick).
    pub(super) fn snap_to_ground(&mut self, world: &dyn CollisionWorld, input: &MoveInput) {
        if !input.stick_to_ground || self.block_ground_snap || !self.state.is_grounded {
            return;
        }
        if self.state.target_velocity.dot(&self.up) > 0.0 {
            return;
        }
        let snap_height = self.config.ground_snap_height();
        if snap_height <= 0.0 {
            return;
        }

        let skin = self.config.skin_width();
        let down = -self.up;
        let Some(hit) = world.cast_shape(
            &self.capsule_shape(),
            &self.capsule_pose(),
            &down,
            snap_height + skin,
            &self.collision_filter(),
        ) else {
            return;
        };
        if hit.normal.dot(&self.up) < self.config.slope_cosine() {
            return;
        }

        let drop = hit.distance - skin;
        if drop > MIN_MOVE_DISTANCE {
            trace!("character {:?}: snapping down {drop}", self.id);
            let displacement = down * drop;
            self.position += displacement;
            self.corrections += VelocityCorrection::Full.excluded(&displacement, &self.up);
        }
    }
}

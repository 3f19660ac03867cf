use log::{debug, trace};

use crate::{
    config::PlatformInheritance,
    math::{Iso, Point3, Vec3, is_finite, twist_about, twist_angle},
    scene::{BodyId, CollisionWorld},
};

use super::{CharacterController, MoveSegment, VelocityCorrection};

/// How [`CharacterController::add_force`] interprets its vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForceMode {
    /// Newtons, applied over the next tick: `dv = F / m * dt`.
    Force,
    /// m/s², applied over the next tick: `dv = a * dt`.
    Acceleration,
    /// N·s, applied at once: `dv = J / m`.
    Impulse,
    /// m/s, applied at once.
    VelocityChange,
}

/// Moving platform the character is standing on, with its pose at the end of the last tick.
#[derive(Clone, Copy, Debug)]
pub(super) struct PlatformLink {
    pub body: BodyId,
    pub last_pose: Iso,
}

impl PlatformInheritance {
    /// Correction tag for platform displacement under this inheritance mode.
    fn correction(self) -> VelocityCorrection {
        match self {
            PlatformInheritance::None => VelocityCorrection::Full,
            PlatformInheritance::Full => VelocityCorrection::None,
            PlatformInheritance::HorizontalOnly => VelocityCorrection::Vertical,
            PlatformInheritance::VerticalOnly => VelocityCorrection::Horizontal,
        }
    }
}

impl CharacterController {
    /// Accumulate an external force. Everything accumulated is drained on the next tick.
    pub fn add_force(&mut self, force: Vec3, mode: ForceMode) {
        if !is_finite(&force) {
            debug!("character {:?}: discarding non-finite force {force:?}", self.id);
            return;
        }
        let mass = self.config.mass();
        match mode {
            ForceMode::Force => self.pending_acceleration += force / mass,
            ForceMode::Acceleration => self.pending_acceleration += force,
            ForceMode::Impulse => self.pending_velocity_change += force / mass,
            ForceMode::VelocityChange => self.pending_velocity_change += force,
        }
    }

    /// Velocity change that the next tick will apply.
    pub fn pending_velocity_change(&self, dt: f32) -> Vec3 {
        self.pending_velocity_change + self.pending_acceleration * dt
    }

    pub(super) fn queue_forces(&mut self, dt: f32) {
        let dv = self.pending_velocity_change(dt);
        self.pending_acceleration = Vec3::zeros();
        self.pending_velocity_change = Vec3::zeros();

        if let Some(segment) =
            MoveSegment::from_displacement(dv * dt, true, VelocityCorrection::None)
        {
            self.queue.add_last(segment);
        }
    }

    /// Carry the character with its platform's motion since the last tick.
    pub(super) fn follow_platform(&mut self, world: &dyn CollisionWorld) {
        let Some(link) = self.platform else {
            return;
        };
        let Some(platform) = world.moving_platform(link.body) else {
            trace!("character {:?}: platform {:?} is gone", self.id, link.body);
            self.platform = None;
            self.state.platform = None;
            return;
        };

        let current = platform.fixed_pose();
        let delta = current * link.last_pose.inverse();
        let carried = delta.transform_point(&Point3::from(self.position));
        let displacement = carried.coords - self.position;
        let correction = self.config.inherit_platform_velocity().correction();
        if let Some(segment) = MoveSegment::from_displacement(displacement, true, correction) {
            self.queue.add_last(segment);
        }

        if self.config.inherit_platform_yaw() {
            let yaw = twist_about(&delta.rotation, &self.up);
            self.rotation = yaw * self.rotation;
            self.state.platform_yaw_delta = twist_angle(&yaw, &self.up);
        }

        self.platform = Some(PlatformLink {
            body: link.body,
            last_pose: current,
        });
    }

    /// Link to (or unlink from) the moving platform under the character's feet.
    pub(super) fn update_platform_link(&mut self, world: &dyn CollisionWorld) {
        let body = if self.state.is_grounded {
            self.ground_body
        } else {
            None
        };
        let platform = body.and_then(|b| world.moving_platform(b).map(|p| (b, p.fixed_pose())));

        self.platform = match (platform, self.platform) {
            (Some((body, _)), Some(link)) if link.body == body => Some(link),
            (Some((body, pose)), _) => Some(PlatformLink {
                body,
                last_pose: pose,
            }),
            (None, _) => None,
        };
        self.state.platform = self.platform.map(|link| link.body);
    }
}

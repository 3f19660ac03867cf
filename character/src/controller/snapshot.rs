use serde::{Deserialize, Serialize};

use crate::{
    bitmask_flags::{CollisionFlags, LayerMask},
    config::PlatformInheritance,
    math::{Quat, Vec3, is_finite, is_finite_quat},
};

use super::{CharacterController, ResizeState, clamp_dimensions};

/// Flat, serializable copy of a controller's pose, runtime state and configuration.
///
/// Restoring a snapshot leaves no pending moves, forces, resizes or platform link, and blocks
/// ground snapping for one tick like a teleport.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CharacterSnapshot {
    pub position: [f32; 3],
    /// `[x, y, z, w]`
    pub rotation: [f32; 4],
    pub up: [f32; 3],
    pub height: f32,
    pub radius: f32,

    pub velocity: [f32; 3],
    pub raw_velocity: [f32; 3],
    pub target_velocity: [f32; 3],
    pub is_grounded: bool,
    pub air_time: f32,
    pub ground_normal: [f32; 3],
    pub ground_surface_normal: [f32; 3],
    pub collision_flags: u8,

    pub collision_layers: u32,
    pub depenetration_layers: u32,

    pub slope_limit: f32,
    pub slope_friction: f32,
    pub ledge_friction: f32,
    pub wall_angle: f32,
    pub step_height: f32,
    pub step_max_angle: f32,
    pub ground_snap_height: f32,
    pub skin_width: f32,
    pub low_rigidbody_push_mass: f32,
    pub max_rigidbody_push_mass: f32,
    pub rigidbody_push: f32,
    pub character_push: f32,
    pub mass: f32,
    pub pushable: bool,
    pub gravity: [f32; 3],
    pub orient_up_with_gravity: bool,
    pub up_smoothing: f32,
    pub inherit_platform_velocity: PlatformInheritance,
    pub inherit_platform_yaw: bool,
}

fn arr(v: &Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

/// Non-finite vectors come back as `fallback`.
fn vec(a: [f32; 3], fallback: Vec3) -> Vec3 {
    let v = Vec3::from(a);
    if is_finite(&v) { v } else { fallback }
}

/// Stored unit quaternions are taken as-is so a restore reproduces them exactly.
fn rotation_from([x, y, z, w]: [f32; 4]) -> Quat {
    let q = nalgebra::Quaternion::new(w, x, y, z);
    let norm = q.norm();
    if !norm.is_finite() || norm < 1.0e-6 {
        return Quat::identity();
    }
    let rotation = if (norm - 1.0).abs() < 1.0e-4 {
        Quat::new_unchecked(q)
    } else {
        Quat::from_quaternion(q)
    };
    if is_finite_quat(&rotation) {
        rotation
    } else {
        Quat::identity()
    }
}

impl CharacterController {
    pub fn snapshot(&self) -> CharacterSnapshot {
        let q = self.rotation.coords;
        let cfg = &self.config;
        CharacterSnapshot {
            position: arr(&self.position),
            rotation: [q.x, q.y, q.z, q.w],
            up: arr(&self.up),
            height: self.height,
            radius: self.radius,

            velocity: arr(&self.state.velocity),
            raw_velocity: arr(&self.state.raw_velocity),
            target_velocity: arr(&self.state.target_velocity),
            is_grounded: self.state.is_grounded,
            air_time: self.state.air_time,
            ground_normal: arr(&self.state.ground_normal),
            ground_surface_normal: arr(&self.state.ground_surface_normal),
            collision_flags: self.state.collision_flags.bits,

            collision_layers: cfg.collision_layers().bits,
            depenetration_layers: cfg.depenetration_layers().bits,

            slope_limit: cfg.slope_limit(),
            slope_friction: cfg.slope_friction(),
            ledge_friction: cfg.ledge_friction(),
            wall_angle: cfg.wall_angle(),
            step_height: cfg.step_height(),
            step_max_angle: cfg.step_max_angle(),
            ground_snap_height: cfg.ground_snap_height(),
            skin_width: cfg.skin_width(),
            low_rigidbody_push_mass: cfg.low_rigidbody_push_mass(),
            max_rigidbody_push_mass: cfg.max_rigidbody_push_mass(),
            rigidbody_push: cfg.rigidbody_push(),
            character_push: cfg.character_push(),
            mass: cfg.mass(),
            pushable: cfg.pushable(),
            gravity: arr(&cfg.gravity()),
            orient_up_with_gravity: cfg.orient_up_with_gravity(),
            up_smoothing: cfg.up_smoothing(),
            inherit_platform_velocity: cfg.inherit_platform_velocity(),
            inherit_platform_yaw: cfg.inherit_platform_yaw(),
        }
    }

    /// Overwrite the controller with `snap`. Values go through the usual setters, so the
    /// result satisfies the same limits as a freshly configured controller.
    pub fn restore(&mut self, snap: &CharacterSnapshot) {
        self.rotation = rotation_from(snap.rotation);
        self.up = self.rotation * Vec3::y();
        self.position = vec(snap.position, self.position);
        let (height, radius) = clamp_dimensions(snap.height, snap.radius, (self.height, self.radius));
        self.height = height;
        self.radius = radius;

        let cfg = &mut self.config;
        // Wall angle first: it bounds the slope limit, which bounds the step angle.
        cfg.set_wall_angle(snap.wall_angle);
        cfg.set_slope_limit(snap.slope_limit);
        cfg.set_step_max_angle(snap.step_max_angle);
        cfg.set_slope_friction(snap.slope_friction);
        cfg.set_ledge_friction(snap.ledge_friction);
        cfg.set_step_height(snap.step_height);
        cfg.set_ground_snap_height(snap.ground_snap_height);
        cfg.set_skin_width(snap.skin_width);
        cfg.set_rigidbody_push_masses(snap.low_rigidbody_push_mass, snap.max_rigidbody_push_mass);
        cfg.set_rigidbody_push(snap.rigidbody_push);
        cfg.set_character_push(snap.character_push);
        cfg.set_mass(snap.mass);
        cfg.set_pushable(snap.pushable);
        cfg.set_collision_layers(LayerMask::new(snap.collision_layers));
        cfg.set_depenetration_layers(LayerMask::new(snap.depenetration_layers));
        cfg.set_gravity(Vec3::from(snap.gravity));
        cfg.set_orient_up_with_gravity(snap.orient_up_with_gravity);
        cfg.set_up_smoothing(snap.up_smoothing);
        cfg.set_inherit_platform_velocity(snap.inherit_platform_velocity);
        cfg.set_inherit_platform_yaw(snap.inherit_platform_yaw);
        cfg.fit_capsule(height, radius);

        let zero = Vec3::zeros();
        self.state.velocity = vec(snap.velocity, zero);
        self.state.raw_velocity = vec(snap.raw_velocity, zero);
        self.state.target_velocity = vec(snap.target_velocity, zero);
        self.state.is_grounded = snap.is_grounded;
        self.state.air_time = if snap.air_time.is_finite() {
            snap.air_time.max(0.0)
        } else {
            0.0
        };
        self.state.ground_normal = vec(snap.ground_normal, zero);
        self.state.ground_surface_normal = vec(snap.ground_surface_normal, zero);
        self.state.collision_flags = CollisionFlags::new(snap.collision_flags);
        self.state.up = self.up;
        self.state.platform = None;
        self.state.platform_yaw_delta = 0.0;

        self.up_alignment = super::gravity::UpAlignment::new(self.up);
        self.resize = ResizeState::Idle;
        self.resize_countdown = 0;
        self.queue.clear();
        self.platform = None;
        self.ground_body = None;
        self.pending_acceleration = zero;
        self.pending_velocity_change = zero;
        self.block_ground_snap = true;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::CharacterConfig;
    use approx::assert_relative_eq;

    #[test]
    fn restore_reproduces_state_and_config() {
        let mut scene = flat_floor();
        let mut cfg = CharacterConfig::default();
        cfg.set_slope_limit(60.0);
        cfg.set_ledge_friction(0.8);
        cfg.set_inherit_platform_velocity(PlatformInheritance::HorizontalOnly);
        let mut a = standing(cfg);
        a.set_move_callback(|s| super::super::MoveInput {
            velocity: Vec3::new(2.0, s.velocity.y, 0.0),
            ..Default::default()
        });
        run(&mut a, &mut scene, 20);

        let snap = a.snapshot();
        let mut b = standing(CharacterConfig::default());
        b.restore(&snap);

        assert_eq!(b.snapshot(), snap);
        assert_relative_eq!(b.position(), a.position());
        assert_eq!(b.config().inherit_platform_velocity(), PlatformInheritance::HorizontalOnly);
        assert!(b.is_ground_snap_blocked());
    }

    #[test]
    fn restore_sanitizes_bad_values() {
        let mut c = standing(CharacterConfig::default());
        let mut snap = c.snapshot();
        snap.rotation = [f32::NAN; 4];
        snap.velocity = [f32::INFINITY, 0.0, 0.0];
        snap.height = 0.1;
        snap.radius = 0.5;
        snap.slope_limit = 200.0;
        c.restore(&snap);

        assert_eq!(c.rotation(), Quat::identity());
        assert_eq!(c.velocity(), Vec3::zeros());
        assert_eq!(c.height(), 1.0);
        assert_eq!(c.config().slope_limit(), 90.0 - c.config().wall_angle());
    }
}

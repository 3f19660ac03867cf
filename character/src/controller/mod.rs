/*!
Kinematic character controller.

A capsule that moves by sweeping through a [`CollisionWorld`] instead of being simulated.
Each call to [`CharacterController::tick`] runs, in order:

1. up-vector alignment with gravity, platform following, deferred resize retry
2. depenetration (static colliders first, then kinematic bodies)
3. input, gravity and accumulated forces are queued as move segments
4. the move loop sweeps and resolves every queued segment
5. ground snap, then the grounding check
6. velocity derivation (corrected and raw), platform link update, `on_moved` dispatch

Positions are at the character's feet; the capsule center sits `height / 2` above along `up`.
*/

mod capsule;
mod depenetration;
pub mod events;
mod gravity;
mod grounding;
mod move_loop;
mod move_queue;
mod platform;
mod push;
mod resize;
mod snapshot;

use log::{debug, trace};
use rapier3d::parry::shape::Capsule;

pub use capsule::{capsule_for, capsule_pose, clamp_dimensions};
pub use events::{HeightChanged, SubscriptionId, Teleported};
pub use move_queue::{MoveQueue, MoveSegment, VelocityCorrection};
pub use platform::ForceMode;
pub use push::rigidbody_push_scale;
pub use resize::ResizeState;
pub use snapshot::CharacterSnapshot;

use crate::{
    bitmask_flags::CollisionFlags,
    config::CharacterConfig,
    math::{Iso, Quat, Vec3, align_up, is_finite, is_finite_quat},
    scene::{BodyId, CharacterHit, CharacterId, CollisionWorld, Penetration, QueryFilter},
};
use events::ControllerEvents;
use gravity::UpAlignment;
use platform::PlatformLink;

/// What the character wants to do this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveInput {
    /// Desired velocity (m/s, world space).
    pub velocity: Vec3,
    /// Add `gravity * dt` to `velocity`.
    pub apply_gravity: bool,
    /// Allow ground snapping this tick.
    pub stick_to_ground: bool,
}

impl Default for MoveInput {
    fn default() -> Self {
        Self {
            velocity: Vec3::zeros(),
            apply_gravity: true,
            stick_to_ground: true,
        }
    }
}

/// Per-tick movement callback.
pub type MoveCallback = Box<dyn FnMut(&CharacterState) -> MoveInput>;

/// Runtime state derived once per tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacterState {
    /// Velocity with step, snap, depenetration and platform corrections removed (m/s).
    pub velocity: Vec3,
    /// Actual displacement over the tick divided by `dt` (m/s).
    pub raw_velocity: Vec3,
    /// Velocity requested by input, gravity included (m/s).
    pub target_velocity: Vec3,
    pub is_grounded: bool,
    /// Seconds since the character last touched ground. Exactly zero while grounded.
    pub air_time: f32,
    /// Normal of the ground contact; zero when airborne.
    pub ground_normal: Vec3,
    /// Ground normal corrected for edges; zero when airborne.
    pub ground_surface_normal: Vec3,
    /// Contacts made this tick.
    pub collision_flags: CollisionFlags,
    /// Moving platform the character stands on.
    pub platform: Option<BodyId>,
    pub up: Vec3,
    /// Yaw (radians about `up`) inherited from the platform this tick.
    pub platform_yaw_delta: f32,
}

impl Default for CharacterState {
    fn default() -> Self {
        Self {
            velocity: Vec3::zeros(),
            raw_velocity: Vec3::zeros(),
            target_velocity: Vec3::zeros(),
            is_grounded: false,
            air_time: 0.0,
            ground_normal: Vec3::zeros(),
            ground_surface_normal: Vec3::zeros(),
            collision_flags: CollisionFlags::empty(),
            platform: None,
            up: Vec3::y(),
            platform_yaw_delta: 0.0,
        }
    }
}

/// Capabilities other systems (and other characters) rely on.
pub trait NeoCharacter {
    fn id(&self) -> CharacterId;
    fn mass(&self) -> f32;
    /// Whether other characters may push this one.
    fn pushable(&self) -> bool;
    fn add_force(&mut self, force: Vec3, mode: ForceMode);
    fn velocity(&self) -> Vec3;
    fn is_grounded(&self) -> bool;
}

/// Mutable access to the other characters in a scene, used for character pushing.
pub trait CharacterLookup {
    fn character_mut(&mut self, id: CharacterId) -> Option<&mut dyn NeoCharacter>;
}

/// Lookup for a character that is alone.
pub struct NoCharacters;

impl CharacterLookup for NoCharacters {
    fn character_mut(&mut self, _id: CharacterId) -> Option<&mut dyn NeoCharacter> {
        None
    }
}

/// Characters whose up vector can follow a changing gravity direction.
pub trait VariableGravity {
    fn gravity(&self) -> Vec3;
    fn set_gravity(&mut self, gravity: Vec3);
    fn orient_up_with_gravity(&self) -> bool;
    fn set_orient_up_with_gravity(&mut self, orient: bool);
    fn up(&self) -> Vec3;
}

pub struct CharacterController {
    id: CharacterId,
    config: CharacterConfig,

    position: Vec3,
    rotation: Quat,
    up: Vec3,
    height: f32,
    radius: f32,

    state: CharacterState,
    queue: MoveQueue,
    /// Displacement this tick that must not show up in `velocity`.
    corrections: Vec3,
    ground_body: Option<BodyId>,
    block_ground_snap: bool,

    pending_acceleration: Vec3,
    pending_velocity_change: Vec3,
    platform: Option<PlatformLink>,
    up_alignment: UpAlignment,

    resize: ResizeState,
    resize_countdown: u32,

    // Scratch buffers owned per instance.
    pushed_bodies: Vec<BodyId>,
    overlaps: Vec<Penetration>,

    move_callback: Option<MoveCallback>,
    events: ControllerEvents,
}

impl CharacterController {
    /// Create a controller with feet at `position`.
    ///
    /// `up` is taken from `rotation * +Y`. Dimensions are clamped so that `height >= 2 * radius`.
    pub fn new(
        id: CharacterId,
        position: Vec3,
        rotation: Quat,
        height: f32,
        radius: f32,
        config: CharacterConfig,
    ) -> Self {
        let rotation = if is_finite_quat(&rotation) {
            rotation
        } else {
            Quat::identity()
        };
        let position = if is_finite(&position) {
            position
        } else {
            Vec3::zeros()
        };
        let (height, radius) = clamp_dimensions(height, radius, (2.0, 0.5));
        let up = rotation * Vec3::y();
        let mut config = config;
        config.fit_capsule(height, radius);

        Self {
            id,
            config,
            position,
            rotation,
            up,
            height,
            radius,
            state: CharacterState {
                up,
                ..CharacterState::default()
            },
            queue: MoveQueue::default(),
            corrections: Vec3::zeros(),
            ground_body: None,
            block_ground_snap: false,
            pending_acceleration: Vec3::zeros(),
            pending_velocity_change: Vec3::zeros(),
            platform: None,
            up_alignment: UpAlignment::new(up),
            resize: ResizeState::Idle,
            resize_countdown: 0,
            pushed_bodies: Vec::new(),
            overlaps: Vec::new(),
            move_callback: None,
            events: ControllerEvents::default(),
        }
    }

    /// Advance the character by one fixed step of `dt` seconds.
    pub fn tick(
        &mut self,
        world: &mut dyn CollisionWorld,
        characters: &mut dyn CharacterLookup,
        dt: f32,
    ) {
        if !(dt.is_finite() && dt > 0.0) {
            debug!("character {:?}: ignoring tick with dt {dt}", self.id);
            return;
        }
        let start = self.position;

        self.queue.clear();
        self.corrections = Vec3::zeros();
        self.pushed_bodies.clear();
        self.state.collision_flags.clear();
        self.state.platform_yaw_delta = 0.0;

        self.update_up(dt);
        self.follow_platform(&*world);
        self.retry_resize(&*world);
        self.depenetrate(&*world);

        let input = self.read_input();
        self.queue_input(&input, dt);
        self.queue_forces(dt);

        let outcome = self.run_move_loop(world, characters);
        trace!(
            "character {:?}: move loop {:?} after {} sweeps",
            self.id, outcome.end, outcome.iterations
        );

        self.snap_to_ground(&*world, &input);
        self.update_grounding(&*world, dt);

        let displacement = self.position - start;
        self.state.raw_velocity = displacement / dt;
        self.state.velocity = (displacement - self.corrections) / dt;
        self.state.up = self.up;

        self.update_platform_link(&*world);
        self.block_ground_snap = false;

        let state = self.state;
        self.events.moved.notify(&state);
    }

    fn read_input(&mut self) -> MoveInput {
        match self.move_callback.as_mut() {
            Some(callback) => callback(&self.state),
            None => self.idle_input(),
        }
    }

    /// Input used without a callback: keep falling or sliding, stand still on walkable ground.
    fn idle_input(&self) -> MoveInput {
        let standing = self.state.is_grounded
            && self.state.ground_surface_normal.dot(&self.up) >= self.config.slope_cosine();
        MoveInput {
            velocity: if standing {
                Vec3::zeros()
            } else {
                self.state.velocity
            },
            ..MoveInput::default()
        }
    }

    fn queue_input(&mut self, input: &MoveInput, dt: f32) {
        let mut velocity = input.velocity;
        if !is_finite(&velocity) {
            debug!("character {:?}: discarding non-finite move {velocity:?}", self.id);
            velocity = Vec3::zeros();
        }
        if input.apply_gravity {
            velocity += self.config.gravity() * dt;
        }
        self.state.target_velocity = velocity;

        if let Some(segment) =
            MoveSegment::from_displacement(velocity * dt, true, VelocityCorrection::None)
        {
            self.queue.add_last(segment);
        }
    }

    // --- Queries ---

    pub(crate) fn collision_filter(&self) -> QueryFilter {
        QueryFilter::new(self.config.collision_layers()).excluding_character(self.id)
    }

    pub(crate) fn depenetration_filter(&self) -> QueryFilter {
        QueryFilter::new(self.config.depenetration_layers()).excluding_character(self.id)
    }

    /// Parry shape of the capsule at its current dimensions.
    pub fn capsule_shape(&self) -> Capsule {
        capsule_for(self.height, self.radius)
    }

    /// Pose of the capsule center.
    pub fn capsule_pose(&self) -> Iso {
        capsule_pose(&self.position, &self.up, &self.rotation, self.height)
    }

    // --- Accessors ---

    pub fn id(&self) -> CharacterId {
        self.id
    }

    pub fn config(&self) -> &CharacterConfig {
        &self.config
    }

    /// Edit the configuration. Capsule-dependent limits are re-applied afterwards.
    pub fn configure(&mut self, edit: impl FnOnce(&mut CharacterConfig)) {
        edit(&mut self.config);
        self.config.fit_capsule(self.height, self.radius);
    }

    pub fn state(&self) -> &CharacterState {
        &self.state
    }

    /// Feet position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn velocity(&self) -> Vec3 {
        self.state.velocity
    }

    pub fn is_grounded(&self) -> bool {
        self.state.is_grounded
    }

    /// True from a teleport until the end of the next tick.
    pub fn is_ground_snap_blocked(&self) -> bool {
        self.block_ground_snap
    }

    // --- Input and motion ---

    pub fn set_move_callback(
        &mut self,
        callback: impl FnMut(&CharacterState) -> MoveInput + 'static,
    ) {
        self.move_callback = Some(Box::new(callback));
    }

    pub fn clear_move_callback(&mut self) {
        self.move_callback = None;
    }

    /// Set the heading. The character's up vector is kept.
    pub fn set_rotation(&mut self, rotation: Quat) {
        if !is_finite_quat(&rotation) {
            debug!("character {:?}: discarding non-finite rotation", self.id);
            return;
        }
        self.rotation = align_up(&rotation, &self.up);
    }

    /// Move instantly.
    ///
    /// With `relative_rotation` the current rotation and velocity are rotated by `rotation`;
    /// otherwise `rotation` replaces the current one and velocity is rotated by the difference.
    /// Ground snap is blocked for the next tick and any platform link is dropped.
    pub fn teleport(&mut self, position: Vec3, rotation: Quat, relative_rotation: bool) {
        if !is_finite(&position) || !is_finite_quat(&rotation) {
            debug!("character {:?}: discarding non-finite teleport", self.id);
            return;
        }
        let from = self.position;
        let old = self.rotation;
        let (new_rotation, delta) = if relative_rotation {
            (rotation * old, rotation)
        } else {
            (rotation, rotation * old.inverse())
        };

        self.position = position;
        self.rotation = new_rotation;
        self.up = new_rotation * Vec3::y();
        self.up_alignment = UpAlignment::new(self.up);
        self.state.velocity = delta * self.state.velocity;
        self.state.raw_velocity = delta * self.state.raw_velocity;
        self.state.target_velocity = delta * self.state.target_velocity;
        self.state.up = self.up;
        self.queue.clear();
        self.platform = None;
        self.state.platform = None;
        self.block_ground_snap = true;

        let event = Teleported {
            from,
            to: position,
            rotation: new_rotation,
        };
        self.events.teleported.notify(&event);
    }

    /// Zero every velocity and drop pending forces.
    pub fn reset_velocity(&mut self) {
        self.state.velocity = Vec3::zeros();
        self.state.raw_velocity = Vec3::zeros();
        self.state.target_velocity = Vec3::zeros();
        self.pending_acceleration = Vec3::zeros();
        self.pending_velocity_change = Vec3::zeros();
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.set_gravity(gravity);
    }

    pub fn set_orient_up_with_gravity(&mut self, orient: bool) {
        self.config.set_orient_up_with_gravity(orient);
    }

    // --- Events ---

    pub fn on_height_changed(
        &mut self,
        handler: impl FnMut(&HeightChanged) + 'static,
    ) -> SubscriptionId {
        self.events.on_height_changed(handler)
    }

    pub fn on_teleported(&mut self, handler: impl FnMut(&Teleported) + 'static) -> SubscriptionId {
        self.events.on_teleported(handler)
    }

    pub fn on_hit(&mut self, handler: impl FnMut(&CharacterHit) + 'static) -> SubscriptionId {
        self.events.on_hit(handler)
    }

    /// Called once per tick after the pose and state are committed.
    pub fn on_moved(&mut self, handler: impl FnMut(&CharacterState) + 'static) -> SubscriptionId {
        self.events.on_moved(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}

impl NeoCharacter for CharacterController {
    fn id(&self) -> CharacterId {
        self.id
    }

    fn mass(&self) -> f32 {
        self.config.mass()
    }

    fn pushable(&self) -> bool {
        self.config.pushable()
    }

    fn add_force(&mut self, force: Vec3, mode: ForceMode) {
        CharacterController::add_force(self, force, mode);
    }

    fn velocity(&self) -> Vec3 {
        self.state.velocity
    }

    fn is_grounded(&self) -> bool {
        self.state.is_grounded
    }
}

impl VariableGravity for CharacterController {
    fn gravity(&self) -> Vec3 {
        self.config.gravity()
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        CharacterController::set_gravity(self, gravity);
    }

    fn orient_up_with_gravity(&self) -> bool {
        self.config.orient_up_with_gravity()
    }

    fn set_orient_up_with_gravity(&mut self, orient: bool) {
        CharacterController::set_orient_up_with_gravity(self, orient);
    }

    fn up(&self) -> Vec3 {
        self.up
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{
        bitmask_flags::Layer,
        scene::{ColliderDef, CollisionScene},
    };

    pub const DT: f32 = 1.0 / 60.0;

    pub fn flat_floor() -> CollisionScene {
        let mut scene = CollisionScene::new();
        scene
            .insert_static(ColliderDef::plane().layer(Layer::Environment))
            .expect("floor");
        scene
    }

    /// Character of height 2 and radius 0.5 standing at the origin.
    pub fn standing(config: CharacterConfig) -> CharacterController {
        CharacterController::new(
            CharacterId(1),
            Vec3::new(0.0, 0.01, 0.0),
            Quat::identity(),
            2.0,
            0.5,
            config,
        )
    }

    pub fn run(
        controller: &mut CharacterController,
        scene: &mut CollisionScene,
        ticks: usize,
    ) {
        for _ in 0..ticks {
            controller.tick(scene, &mut NoCharacters, DT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use approx::assert_relative_eq;
    use std::{cell::Cell, f32::consts::FRAC_PI_2, rc::Rc};

    #[test]
    fn settles_on_flat_floor() {
        let mut scene = flat_floor();
        let mut c = standing(CharacterConfig::default());
        run(&mut c, &mut scene, 30);

        assert!(c.is_grounded());
        assert_eq!(c.state().air_time, 0.0);
        assert_relative_eq!(c.state().ground_normal, Vec3::y(), epsilon = 1.0e-4);
        assert!(c.position().y >= 0.0);
        assert!(c.position().y < 0.05);
        assert!(c.velocity().norm() < 1.0e-3);
    }

    #[test]
    fn falls_without_callback() {
        let mut scene = flat_floor();
        let mut c = CharacterController::new(
            CharacterId(1),
            Vec3::new(0.0, 5.0, 0.0),
            Quat::identity(),
            2.0,
            0.5,
            CharacterConfig::default(),
        );
        run(&mut c, &mut scene, 10);
        assert!(!c.is_grounded());
        assert!(c.position().y < 5.0);
        assert!(c.velocity().y < -1.0);
        assert_relative_eq!(c.state().air_time, 10.0 * DT, epsilon = 1.0e-5);
    }

    #[test]
    fn moved_fires_once_per_tick() {
        let mut scene = flat_floor();
        let mut c = standing(CharacterConfig::default());
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        c.on_moved(move |_| seen.set(seen.get() + 1));
        run(&mut c, &mut scene, 4);
        assert_eq!(count.get(), 4);
    }

    #[test]
    fn nan_input_is_discarded() {
        let mut scene = flat_floor();
        let mut c = standing(CharacterConfig::default());
        c.set_move_callback(|_| MoveInput {
            velocity: Vec3::new(f32::NAN, 0.0, 0.0),
            ..MoveInput::default()
        });
        run(&mut c, &mut scene, 3);
        assert!(is_finite(&c.position()));
        assert!(is_finite(&c.velocity()));
    }

    #[test]
    fn relative_teleport_rotates_velocity() {
        let mut c = standing(CharacterConfig::default());
        c.state.velocity = Vec3::new(3.0, 0.0, 0.0);
        let quarter = Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2);
        c.teleport(Vec3::new(10.0, 0.0, 0.0), quarter, true);

        assert_relative_eq!(c.velocity(), Vec3::new(0.0, 0.0, -3.0), epsilon = 1.0e-5);
        assert_relative_eq!(c.position(), Vec3::new(10.0, 0.0, 0.0));
        assert!(c.is_ground_snap_blocked());
    }

    #[test]
    fn absolute_teleport_rotates_velocity_by_difference() {
        let mut c = standing(CharacterConfig::default());
        c.set_rotation(Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2));
        c.state.velocity = Vec3::new(0.0, 0.0, 2.0);
        // Back to identity: a -90 degree turn about +Y.
        c.teleport(Vec3::zeros(), Quat::identity(), false);
        assert_relative_eq!(c.velocity(), Vec3::new(-2.0, 0.0, 0.0), epsilon = 1.0e-5);
    }

    #[test]
    fn snap_block_lasts_one_tick() {
        let mut scene = flat_floor();
        let mut c = standing(CharacterConfig::default());
        let teleports = Rc::new(Cell::new(0));
        let seen = teleports.clone();
        c.on_teleported(move |_| seen.set(seen.get() + 1));

        c.teleport(Vec3::new(0.0, 0.01, 0.0), Quat::identity(), false);
        assert!(c.is_ground_snap_blocked());
        c.tick(&mut scene, &mut NoCharacters, DT);
        assert!(!c.is_ground_snap_blocked());
        assert_eq!(teleports.get(), 1);
    }

    #[test]
    fn configure_reapplies_capsule_limits() {
        let mut c = CharacterController::new(
            CharacterId(1),
            Vec3::zeros(),
            Quat::identity(),
            0.5,
            0.25,
            CharacterConfig::default(),
        );
        c.configure(|cfg| {
            cfg.set_step_height(1.0);
            cfg.set_skin_width(0.1);
        });
        assert!(c.config().skin_width() <= 0.125 + 1.0e-6);
        assert!(c.config().step_height() <= 0.5 - 0.25 - c.config().skin_width() + 1.0e-6);
    }
}

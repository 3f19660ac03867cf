/*!
Character controller configuration.

Values are expressed in meters, seconds and degrees (converted to radians or
sines at use sites). Every setter clamps its input, and setters whose limits
depend on another value re-clamp the dependents as well:

- `slope_limit` lives in `[MIN_SLOPE_LIMIT_DEG, 90 - wall_angle]`, so changing the
  wall angle re-clamps the slope limit.
- `step_max_angle` lives in `[0, slope_limit]`.
- `step_height` and `skin_width` depend on the capsule, see [`CharacterConfig::fit_capsule`].
*/

use crate::{
    bitmask_flags::LayerMask,
    constants::*,
    math::Vec3,
};

/// How much of a moving platform's motion shows up in the character's reported velocity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum PlatformInheritance {
    /// Platform motion moves the character but never appears in its velocity.
    #[default]
    None,
    /// Full platform velocity is reported.
    Full,
    /// Only the horizontal part of the platform velocity is reported.
    HorizontalOnly,
    /// Only the vertical part of the platform velocity is reported.
    VerticalOnly,
}

#[derive(Clone, Debug)]
pub struct CharacterConfig {
    slope_limit: f32,
    slope_friction: f32,
    ledge_friction: f32,
    wall_angle: f32,
    step_height: f32,
    step_max_angle: f32,
    ground_snap_height: f32,
    skin_width: f32,

    low_rigidbody_push_mass: f32,
    max_rigidbody_push_mass: f32,
    rigidbody_push: f32,
    character_push: f32,

    mass: f32,
    pushable: bool,

    collision_layers: LayerMask,
    depenetration_layers: LayerMask,

    gravity: Vec3,
    orient_up_with_gravity: bool,
    up_smoothing: f32,

    inherit_platform_velocity: PlatformInheritance,
    inherit_platform_yaw: bool,

    /// Requested values, kept so capsule changes can re-apply them.
    requested_step_height: f32,
    requested_skin_width: f32,
    step_height_limit: f32,
    skin_width_limit: f32,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        let layers = LayerMask::character_default();
        Self {
            slope_limit: DEFAULT_SLOPE_LIMIT_DEG,
            slope_friction: DEFAULT_SLOPE_FRICTION,
            ledge_friction: DEFAULT_LEDGE_FRICTION,
            wall_angle: DEFAULT_WALL_ANGLE_DEG,
            step_height: DEFAULT_STEP_HEIGHT,
            step_max_angle: DEFAULT_STEP_MAX_ANGLE_DEG,
            ground_snap_height: DEFAULT_GROUND_SNAP_HEIGHT,
            skin_width: DEFAULT_SKIN_WIDTH,
            low_rigidbody_push_mass: DEFAULT_LOW_RIGIDBODY_PUSH_MASS,
            max_rigidbody_push_mass: DEFAULT_MAX_RIGIDBODY_PUSH_MASS,
            rigidbody_push: DEFAULT_RIGIDBODY_PUSH,
            character_push: DEFAULT_CHARACTER_PUSH,
            mass: DEFAULT_MASS,
            pushable: true,
            collision_layers: layers,
            depenetration_layers: layers,
            gravity: Vec3::new(0.0, -GRAVITY_MPS2, 0.0),
            orient_up_with_gravity: false,
            up_smoothing: DEFAULT_UP_SMOOTHING,
            inherit_platform_velocity: PlatformInheritance::None,
            inherit_platform_yaw: true,
            requested_step_height: DEFAULT_STEP_HEIGHT,
            requested_skin_width: DEFAULT_SKIN_WIDTH,
            step_height_limit: f32::MAX,
            skin_width_limit: MAX_SKIN_WIDTH,
        }
    }
}

/// Clamp helper that maps NaN to the lower bound.
#[inline]
fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max.max(min))
}

impl CharacterConfig {
    // --- Getters ---

    /// Steepest walkable slope (degrees).
    pub fn slope_limit(&self) -> f32 {
        self.slope_limit
    }

    /// 0 = full slide down steep slopes, 1 = no slide.
    pub fn slope_friction(&self) -> f32 {
        self.slope_friction
    }

    /// 0 = slide off ledges freely, 1 = stick to ledges.
    pub fn ledge_friction(&self) -> f32 {
        self.ledge_friction
    }

    /// Surfaces within this angle of vertical are walls (degrees).
    pub fn wall_angle(&self) -> f32 {
        self.wall_angle
    }

    pub fn step_height(&self) -> f32 {
        self.step_height
    }

    /// Steepest top surface a step may have (degrees).
    pub fn step_max_angle(&self) -> f32 {
        self.step_max_angle
    }

    pub fn ground_snap_height(&self) -> f32 {
        self.ground_snap_height
    }

    pub fn skin_width(&self) -> f32 {
        self.skin_width
    }

    pub fn low_rigidbody_push_mass(&self) -> f32 {
        self.low_rigidbody_push_mass
    }

    pub fn max_rigidbody_push_mass(&self) -> f32 {
        self.max_rigidbody_push_mass
    }

    pub fn rigidbody_push(&self) -> f32 {
        self.rigidbody_push
    }

    pub fn character_push(&self) -> f32 {
        self.character_push
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn pushable(&self) -> bool {
        self.pushable
    }

    pub fn collision_layers(&self) -> LayerMask {
        self.collision_layers
    }

    /// Always a subset of [`Self::collision_layers`].
    pub fn depenetration_layers(&self) -> LayerMask {
        self.depenetration_layers
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn orient_up_with_gravity(&self) -> bool {
        self.orient_up_with_gravity
    }

    /// Seconds taken to turn the up vector toward a new gravity direction.
    pub fn up_smoothing(&self) -> f32 {
        self.up_smoothing
    }

    pub fn inherit_platform_velocity(&self) -> PlatformInheritance {
        self.inherit_platform_velocity
    }

    pub fn inherit_platform_yaw(&self) -> bool {
        self.inherit_platform_yaw
    }

    /// `sin(wall_angle)`: normals with an up component above this are floors, below the
    /// negative are ceilings.
    pub fn wall_sine(&self) -> f32 {
        self.wall_angle.to_radians().sin()
    }

    /// `cos(slope_limit)`: minimum up component of a walkable normal.
    pub fn slope_cosine(&self) -> f32 {
        self.slope_limit.to_radians().cos()
    }

    /// `cos(step_max_angle)`: minimum up component of a step's top surface normal.
    pub fn step_cosine(&self) -> f32 {
        self.step_max_angle.to_radians().cos()
    }

    // --- Setters ---

    pub fn set_slope_limit(&mut self, degrees: f32) {
        self.slope_limit = clamp(degrees, MIN_SLOPE_LIMIT_DEG, 90.0 - self.wall_angle);
        self.step_max_angle = clamp(self.step_max_angle, 0.0, self.slope_limit);
    }

    pub fn set_slope_friction(&mut self, friction: f32) {
        self.slope_friction = clamp(friction, 0.0, 1.0);
    }

    pub fn set_ledge_friction(&mut self, friction: f32) {
        self.ledge_friction = clamp(friction, 0.0, 1.0);
    }

    pub fn set_wall_angle(&mut self, degrees: f32) {
        self.wall_angle = clamp(degrees, MIN_WALL_ANGLE_DEG, MAX_WALL_ANGLE_DEG);
        // Dependents.
        self.set_slope_limit(self.slope_limit);
    }

    pub fn set_step_max_angle(&mut self, degrees: f32) {
        self.step_max_angle = clamp(degrees, 0.0, self.slope_limit);
    }

    pub fn set_ground_snap_height(&mut self, height: f32) {
        self.ground_snap_height = clamp(height, 0.0, MAX_GROUND_SNAP_HEIGHT);
    }

    /// Requested step height; the effective value is limited by the capsule, see
    /// [`Self::fit_capsule`].
    pub fn set_step_height(&mut self, height: f32) {
        self.requested_step_height = clamp(height, 0.0, f32::MAX);
        self.step_height = self.requested_step_height.min(self.step_height_limit);
    }

    /// Requested skin width; limited by the capsule radius, see [`Self::fit_capsule`].
    pub fn set_skin_width(&mut self, width: f32) {
        self.requested_skin_width = clamp(width, MIN_SKIN_WIDTH, MAX_SKIN_WIDTH);
        self.skin_width = self.requested_skin_width.min(self.skin_width_limit);
    }

    pub fn set_rigidbody_push_masses(&mut self, low: f32, max: f32) {
        self.low_rigidbody_push_mass = clamp(low, 0.0, f32::MAX);
        self.max_rigidbody_push_mass = clamp(max, self.low_rigidbody_push_mass, f32::MAX);
    }

    pub fn set_rigidbody_push(&mut self, multiplier: f32) {
        self.rigidbody_push = clamp(multiplier, 0.0, MAX_RIGIDBODY_PUSH);
    }

    pub fn set_character_push(&mut self, multiplier: f32) {
        self.character_push = clamp(multiplier, 0.0, MAX_CHARACTER_PUSH);
    }

    pub fn set_mass(&mut self, mass: f32) {
        self.mass = clamp(mass, 0.01, f32::MAX);
    }

    pub fn set_pushable(&mut self, pushable: bool) {
        self.pushable = pushable;
    }

    pub fn set_collision_layers(&mut self, layers: LayerMask) {
        self.collision_layers = layers;
        self.depenetration_layers = self.depenetration_layers.intersection(layers);
    }

    pub fn set_depenetration_layers(&mut self, layers: LayerMask) {
        self.depenetration_layers = layers.intersection(self.collision_layers);
    }

    /// Non-finite gravity vectors are ignored.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        if crate::math::is_finite(&gravity) {
            self.gravity = gravity;
        }
    }

    pub fn set_orient_up_with_gravity(&mut self, orient: bool) {
        self.orient_up_with_gravity = orient;
    }

    pub fn set_up_smoothing(&mut self, seconds: f32) {
        self.up_smoothing = clamp(seconds, 0.0, MAX_UP_SMOOTHING);
    }

    pub fn set_inherit_platform_velocity(&mut self, mode: PlatformInheritance) {
        self.inherit_platform_velocity = mode;
    }

    pub fn set_inherit_platform_yaw(&mut self, inherit: bool) {
        self.inherit_platform_yaw = inherit;
    }

    /// Re-apply the capsule dependent clamps for a capsule of `height` and `radius`.
    ///
    /// - skin width: at most half the radius.
    /// - step height: at most `height - radius - skin_width`.
    pub fn fit_capsule(&mut self, height: f32, radius: f32) {
        self.skin_width_limit = (radius * 0.5).max(MIN_SKIN_WIDTH);
        self.skin_width = self.requested_skin_width.min(self.skin_width_limit);
        self.step_height_limit = (height - radius - self.skin_width).max(0.0);
        self.step_height = self.requested_step_height.min(self.step_height_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_limit_is_clamped_against_wall_angle() {
        let mut cfg = CharacterConfig::default();
        cfg.set_wall_angle(10.0);
        cfg.set_slope_limit(89.0);
        assert_eq!(cfg.slope_limit(), 80.0);

        cfg.set_slope_limit(5.0);
        assert_eq!(cfg.slope_limit(), MIN_SLOPE_LIMIT_DEG);
    }

    #[test]
    fn raising_wall_angle_reclamps_slope_limit() {
        let mut cfg = CharacterConfig::default();
        cfg.set_slope_limit(85.0);
        assert_eq!(cfg.slope_limit(), 85.0);
        cfg.set_wall_angle(20.0);
        assert_eq!(cfg.slope_limit(), 70.0);
    }

    #[test]
    fn frictions_are_unit_clamped() {
        let mut cfg = CharacterConfig::default();
        cfg.set_slope_friction(3.0);
        cfg.set_ledge_friction(-1.0);
        assert_eq!(cfg.slope_friction(), 1.0);
        assert_eq!(cfg.ledge_friction(), 0.0);
        cfg.set_slope_friction(f32::NAN);
        assert_eq!(cfg.slope_friction(), 0.0);
    }

    #[test]
    fn step_height_follows_capsule() {
        let mut cfg = CharacterConfig::default();
        cfg.fit_capsule(2.0, 0.25);
        cfg.set_step_height(0.3);
        assert_eq!(cfg.step_height(), 0.3);

        // A sphere-sized capsule can not step higher than its radius minus skin.
        cfg.fit_capsule(0.5, 0.25);
        assert!((cfg.step_height() - (0.25 - cfg.skin_width())).abs() < 1.0e-6);

        // Growing back restores the requested value.
        cfg.fit_capsule(2.0, 0.25);
        assert_eq!(cfg.step_height(), 0.3);
    }

    #[test]
    fn depenetration_layers_stay_inside_collision_layers() {
        use crate::bitmask_flags::Layer;

        let mut cfg = CharacterConfig::default();
        cfg.set_collision_layers(LayerMask::from_flags(&[Layer::Default, Layer::Environment]));
        cfg.set_depenetration_layers(LayerMask::all());
        assert!(cfg.depenetration_layers().has(Layer::Environment));
        assert!(!cfg.depenetration_layers().has(Layer::Dynamic));
    }

    #[test]
    fn push_masses_are_ordered() {
        let mut cfg = CharacterConfig::default();
        cfg.set_rigidbody_push_masses(50.0, 20.0);
        assert_eq!(cfg.low_rigidbody_push_mass(), 50.0);
        assert_eq!(cfg.max_rigidbody_push_mass(), 50.0);
    }
}

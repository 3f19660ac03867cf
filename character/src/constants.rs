/*!
Character controller tolerances, caps and default tunables.

These constants centralize the values used by the move loop, grounding,
depenetration and resize logic. Keeping them together makes tuning easier
and keeps the per-tick behaviour bounded.

Notes
- Distances are in meters, time in seconds, angles in degrees unless the name says otherwise.
- Favor practical world-space tolerances over machine epsilon for robust behavior.
- Per-character values live in `CharacterConfig`; these are its defaults and hard limits.
*/

/// Capacity of the per-tick move queue. Segments pushed beyond this are dropped.
pub const MOVE_QUEUE_CAPACITY: usize = 16;

/// Hard cap on sweep iterations per tick. The move loop always terminates within this.
pub const MAX_MOVE_ITERATIONS: u32 = 20;

/// Progress below this (meters) counts as a "no progress" sweep.
pub const MIN_MOVE_DISTANCE: f32 = 1.0e-4;

/// Number of consecutive no-progress sweeps before the move loop gives up for the tick.
pub const MAX_STUCK_SWEEPS: u32 = 3;

/// Segments shorter than this are not queued.
pub const MIN_SEGMENT_DISTANCE: f32 = 1.0e-5;

/// Lower bound on the approach cosine used to convert the skin into a travel distance.
/// Prevents `skin / cos` from exploding at grazing angles.
pub const MIN_APPROACH_COS: f32 = 0.1;

/// Practical small distance for comparisons (meters).
pub const DIST_EPS: f32 = 1.0e-6;

/// Default separation kept from surfaces after a sweep (meters).
pub const DEFAULT_SKIN_WIDTH: f32 = 0.01;

/// Skin width limits (meters). The upper bound is further limited by the capsule radius.
pub const MIN_SKIN_WIDTH: f32 = 0.001;
pub const MAX_SKIN_WIDTH: f32 = 0.1;

/// Extra distance probed below the capsule when checking for ground (meters).
pub const GROUND_CHECK_DISTANCE: f32 = 0.05;

/// Horizontal offset of the edge probe ray from the contact point (meters).
pub const EDGE_PROBE_OFFSET: f32 = 0.02;

/// Height above the contact point the edge probe ray starts from (meters).
pub const EDGE_PROBE_HEIGHT: f32 = 0.05;

/// Minimum difference (cosine) between raw and probed normals to call a contact an edge.
pub const EDGE_NORMAL_TOLERANCE: f32 = 1.0e-3;

/// Horizontal distance past a step's face used to find the step's top surface (meters).
pub const STEP_PROBE_AHEAD: f32 = 0.05;

/// Maximum correction applied for a single overlap in one depenetration pass (meters).
pub const MAX_DEPENETRATION_PER_ITERATION: f32 = 0.25;

/// Extra distance added to every depenetration so the capsule ends strictly outside.
pub const DEPENETRATION_PADDING: f32 = 1.0e-3;

/// Overlaps shallower than this are ignored (meters).
pub const MIN_PENETRATION_DEPTH: f32 = 1.0e-4;

/// Depenetration pass caps for static geometry and for kinematic bodies.
pub const STATIC_DEPENETRATION_ITERATIONS: u32 = 2;
pub const KINEMATIC_DEPENETRATION_ITERATIONS: u32 = 4;

/// Upper bound on the number of overlaps collected per depenetration pass.
pub const MAX_OVERLAPS: usize = 16;

/// Distinct rigid bodies that may be pushed in a single tick.
pub const MAX_PUSHED_BODIES: usize = 8;

/// Deferred resizes retry once every this many ticks.
pub const RESIZE_RETRY_INTERVAL: u32 = 5;

/// Smallest capsule radius accepted (meters).
pub const MIN_RADIUS: f32 = 0.05;

/// Default tunables.
pub const DEFAULT_SLOPE_LIMIT_DEG: f32 = 45.0;
pub const DEFAULT_WALL_ANGLE_DEG: f32 = 5.0;
pub const DEFAULT_SLOPE_FRICTION: f32 = 0.0;
pub const DEFAULT_LEDGE_FRICTION: f32 = 0.5;
pub const DEFAULT_STEP_HEIGHT: f32 = 0.3;
pub const DEFAULT_STEP_MAX_ANGLE_DEG: f32 = 30.0;
pub const DEFAULT_GROUND_SNAP_HEIGHT: f32 = 0.3;
pub const DEFAULT_LOW_RIGIDBODY_PUSH_MASS: f32 = 10.0;
pub const DEFAULT_MAX_RIGIDBODY_PUSH_MASS: f32 = 200.0;
pub const DEFAULT_RIGIDBODY_PUSH: f32 = 1.0;
pub const DEFAULT_CHARACTER_PUSH: f32 = 1.0;
pub const DEFAULT_MASS: f32 = 80.0;
pub const DEFAULT_UP_SMOOTHING: f32 = 0.0;

/// Gravity magnitude in meters per second squared (positive value).
pub const GRAVITY_MPS2: f32 = 9.81;

/// Clamp ranges for tunables.
pub const MIN_SLOPE_LIMIT_DEG: f32 = 30.0;
pub const MIN_WALL_ANGLE_DEG: f32 = 1.0;
pub const MAX_WALL_ANGLE_DEG: f32 = 30.0;
pub const MAX_GROUND_SNAP_HEIGHT: f32 = 1.0;
pub const MAX_RIGIDBODY_PUSH: f32 = 100.0;
pub const MAX_CHARACTER_PUSH: f32 = 10.0;
pub const MAX_UP_SMOOTHING: f32 = 5.0;

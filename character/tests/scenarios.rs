use approx::assert_relative_eq;
use neo_character::{
    BodyKind, CharacterConfig, CharacterController, CharacterId, CharacterWorld, ColliderDef,
    CollisionScene, Layer, MoveInput, NoCharacters,
    math::{Quat, Vec3, iso},
};

const DT: f32 = 1.0 / 60.0;

fn floor() -> CollisionScene {
    let mut scene = CollisionScene::new();
    scene
        .insert_static(ColliderDef::plane().layer(Layer::Environment))
        .expect("floor");
    scene
}

fn character(position: Vec3, height: f32, radius: f32, config: CharacterConfig) -> CharacterController {
    CharacterController::new(CharacterId(0), position, Quat::identity(), height, radius, config)
}

/// Walk along +X at `speed`, keeping whatever vertical velocity the solver reported.
fn walk(c: &mut CharacterController, speed: f32) {
    c.set_move_callback(move |s| MoveInput {
        velocity: Vec3::new(speed, s.velocity.y, 0.0),
        ..MoveInput::default()
    });
}

fn run(c: &mut CharacterController, scene: &mut CollisionScene, ticks: usize) {
    for _ in 0..ticks {
        c.tick(scene, &mut NoCharacters, DT);
    }
}

#[test]
fn thin_wall_is_never_crossed() {
    for speed in [1.0, 10.0, 50.0, 200.0, 1000.0] {
        let mut scene = floor();
        // 10 cm thick wall, near face at x = 2.95.
        scene
            .insert_static(
                ColliderDef::cuboid(Vec3::new(0.05, 3.0, 5.0))
                    .translation(Vec3::new(3.0, 0.0, 0.0))
                    .layer(Layer::Environment),
            )
            .expect("wall");
        let mut c = character(Vec3::new(0.0, 0.01, 0.0), 2.0, 0.5, CharacterConfig::default());
        walk(&mut c, speed);
        for _ in 0..30 {
            c.tick(&mut scene, &mut NoCharacters, DT);
            assert!(
                c.position().x + 0.5 <= 2.95 + 1.0e-3,
                "crossed the wall at {speed} m/s: x = {}",
                c.position().x
            );
        }
    }
}

#[test]
fn falls_onto_plane_floor_and_settles() {
    let mut scene = floor();
    let mut c = character(Vec3::new(0.0, 5.0, 0.0), 2.0, 0.5, CharacterConfig::default());
    let mut last = c.position().y;
    for tick in 0..120 {
        c.tick(&mut scene, &mut NoCharacters, DT);
        let y = c.position().y;
        assert!(y <= last + 1.0e-6, "rose from {last} to {y} at tick {tick}");
        last = y;
    }
    assert!(c.is_grounded());
    assert!((0.0..0.05).contains(&c.position().y), "rests at {}", c.position().y);
    assert!(c.velocity().norm() < 1.0e-3);
}

#[test]
fn height_never_drops_below_diameter() {
    let mut scene = floor();
    let mut c = character(Vec3::new(0.0, 0.01, 0.0), 2.0, 0.5, CharacterConfig::default());
    assert!(c.try_set_height(&scene, 0.3, 0.0));
    assert_eq!(c.height(), 1.0);

    c.set_radius(0.9);
    for _ in 0..10 {
        c.tick(&mut scene, &mut NoCharacters, DT);
        assert!(c.height() >= 2.0 * c.radius());
    }
    assert_relative_eq!(c.radius(), 0.9);
    assert_relative_eq!(c.height(), 1.8);
}

#[test]
fn depenetration_is_idempotent() {
    let mut scene = floor();
    scene
        .insert_static(
            ColliderDef::cuboid(Vec3::new(0.5, 2.0, 0.5))
                .translation(Vec3::new(0.8, 0.0, 0.0))
                .layer(Layer::Environment),
        )
        .expect("pillar");
    let mut c = character(Vec3::new(0.0, 0.01, 0.0), 2.0, 0.5, CharacterConfig::default());

    let first = c.depenetrate(&scene);
    assert!(first.norm() > 0.1);
    let second = c.depenetrate(&scene);
    assert_eq!(second, Vec3::zeros());
}

#[test]
fn low_step_keeps_horizontal_speed() {
    let mut scene = floor();
    // Step face at x = 1, top at y = 0.3.
    scene
        .insert_static(
            ColliderDef::cuboid(Vec3::new(5.0, 0.15, 5.0))
                .translation(Vec3::new(6.0, 0.15, 0.0))
                .layer(Layer::Environment),
        )
        .expect("step");
    let mut config = CharacterConfig::default();
    config.set_step_height(0.3);
    let mut c = character(Vec3::new(0.0, 0.01, 0.0), 2.0, 0.25, config);
    run(&mut c, &mut scene, 5);
    assert!(c.is_grounded());

    walk(&mut c, 3.0);
    let top = 0.3 + c.config().skin_width();
    for tick in 0..40 {
        c.tick(&mut scene, &mut NoCharacters, DT);
        let v = c.velocity();
        assert_relative_eq!(v.x, 3.0, epsilon = 0.15);
        assert!(v.y.abs() < 0.5, "vertical spike {} at tick {tick}", v.y);
        assert!(
            c.position().y <= top + 0.02,
            "thrown above the step at tick {tick}: y = {}",
            c.position().y
        );
    }
    assert!(c.position().x > 1.5);
    assert_relative_eq!(c.position().y, top, epsilon = 0.02);
    assert!(c.is_grounded());
}

fn slope(degrees: f32) -> CollisionScene {
    let mut scene = CollisionScene::new();
    // Rising toward +X, so downhill is -X.
    scene
        .insert_static(
            ColliderDef::plane()
                .rotation(Quat::from_axis_angle(&Vec3::z_axis(), degrees.to_radians()))
                .layer(Layer::Environment),
        )
        .expect("slope");
    scene
}

/// Character resting against a slope through the origin with normal `n`.
fn on_slope(n: Vec3, friction: f32) -> CharacterController {
    let radius = 0.5;
    let mut config = CharacterConfig::default();
    config.set_slope_friction(friction);
    let feet = n * (radius + 0.02) - Vec3::y() * radius;
    let mut c = character(feet, 2.0, radius, config);
    c.set_move_callback(|s| MoveInput {
        velocity: s.velocity,
        ..MoveInput::default()
    });
    c
}

#[test]
fn steep_slope_slides_without_friction() {
    let angle = 55.0_f32;
    let n = Quat::from_axis_angle(&Vec3::z_axis(), angle.to_radians()) * Vec3::y();
    let mut scene = slope(angle);
    let mut c = on_slope(n, 0.0);
    let start = c.position();

    run(&mut c, &mut scene, 10);
    let early = c.velocity().norm();
    run(&mut c, &mut scene, 20);
    let late = c.velocity().norm();

    assert!(early > 0.1);
    assert!(late > early);
    assert!(c.position().x < start.x - 0.3);
}

#[test]
fn steep_slope_holds_with_full_friction() {
    let angle = 55.0_f32;
    let n = Quat::from_axis_angle(&Vec3::z_axis(), angle.to_radians()) * Vec3::y();
    let mut scene = slope(angle);
    let mut c = on_slope(n, 1.0);
    let start = c.position();

    run(&mut c, &mut scene, 60);
    assert!(c.velocity().norm() < 0.2);
    assert!((c.position() - start).norm() < 0.05);
}

/// Character hanging over the edge of a block (top at y = 0, edge at x = 0), its rounded
/// bottom touching the edge with a contact normal 60 degrees from up.
fn on_ledge(friction: f32) -> (CollisionScene, CharacterController) {
    let mut scene = CollisionScene::new();
    scene
        .insert_static(
            ColliderDef::cuboid(Vec3::new(1.0, 1.0, 1.0))
                .translation(Vec3::new(-1.0, -1.0, 0.0))
                .layer(Layer::Environment),
        )
        .expect("block");
    let radius = 0.5;
    let mut config = CharacterConfig::default();
    config.set_ledge_friction(friction);
    let skin = config.skin_width();
    let n = Vec3::new(60.0_f32.to_radians().sin(), 0.5, 0.0);
    let feet = n * (radius + skin) - Vec3::y() * radius;
    let mut c = character(feet, 2.0, radius, config);
    c.set_move_callback(|s| MoveInput {
        velocity: s.velocity,
        ..MoveInput::default()
    });
    (scene, c)
}

#[test]
fn ledge_friction_holds_the_character_on_an_edge() {
    let (mut scene, mut c) = on_ledge(1.0);
    let start = c.position();
    run(&mut c, &mut scene, 30);
    assert!(c.is_grounded());
    assert!((c.position() - start).norm() < 0.01, "slid to {:?}", c.position());
    assert!(c.velocity().norm() < 0.1);
    // The edge is reported with the flat top as its surface.
    assert_relative_eq!(c.state().ground_surface_normal, Vec3::y(), epsilon = 1.0e-3);
}

#[test]
fn ledge_without_friction_slides_off() {
    let (mut scene, mut c) = on_ledge(0.0);
    let start = c.position();
    run(&mut c, &mut scene, 30);
    assert!(c.position().x > start.x + 0.05, "stayed at {:?}", c.position());
    assert!(c.position().y < start.y);
}

#[test]
fn walking_into_a_corner_stops_clear_of_both_walls() {
    let mut scene = floor();
    // Faces at x = 2 and z = 2.
    for (half, center) in [
        (Vec3::new(0.5, 3.0, 5.0), Vec3::new(2.5, 0.0, 0.0)),
        (Vec3::new(5.0, 3.0, 0.5), Vec3::new(0.0, 0.0, 2.5)),
    ] {
        scene
            .insert_static(ColliderDef::cuboid(half).translation(center).layer(Layer::Environment))
            .expect("wall");
    }
    let mut c = character(Vec3::new(0.0, 0.01, 0.0), 2.0, 0.5, CharacterConfig::default());
    c.set_move_callback(|s| MoveInput {
        velocity: Vec3::new(3.0, s.velocity.y, 3.0),
        ..MoveInput::default()
    });

    for _ in 0..60 {
        c.tick(&mut scene, &mut NoCharacters, DT);
        assert!(c.position().x + 0.5 <= 2.0 + 1.0e-3);
        assert!(c.position().z + 0.5 <= 2.0 + 1.0e-3);
    }
    assert!(c.position().x > 1.4);
    assert!(c.position().z > 1.4);
    assert!(c.velocity().x.abs() < 0.1);
    assert!(c.velocity().z.abs() < 0.1);
    assert!(c.is_grounded());
}

#[test]
fn air_time_accumulates_then_resets_on_landing() {
    let mut scene = floor();
    let mut c = character(Vec3::new(0.0, 1.0, 0.0), 2.0, 0.5, CharacterConfig::default());
    let mut longest = 0.0_f32;
    for _ in 0..120 {
        c.tick(&mut scene, &mut NoCharacters, DT);
        if c.is_grounded() {
            break;
        }
        assert!(c.state().air_time > longest);
        longest = c.state().air_time;
    }
    assert!(c.is_grounded());
    assert!(longest > 0.3);
    assert_eq!(c.state().air_time, 0.0);
}

fn crate_scene(mass: f32) -> (CollisionScene, neo_character::BodyId) {
    let mut scene = floor();
    let body = scene
        .insert_body(BodyKind::Dynamic, iso(Vec3::new(2.0, 0.5, 0.0), Quat::identity()), mass)
        .expect("crate body");
    scene
        .insert_attached(body, ColliderDef::cuboid(Vec3::repeat(0.5)).layer(Layer::Dynamic))
        .expect("crate collider");
    (scene, body)
}

fn pushed_velocity(mass: f32) -> Vec3 {
    let (mut scene, body) = crate_scene(mass);
    let mut c = character(Vec3::new(0.0, 0.01, 0.0), 2.0, 0.5, CharacterConfig::default());
    walk(&mut c, 3.0);
    // Reach the crate (face at x = 1.5) and touch it once.
    for _ in 0..60 {
        c.tick(&mut scene, &mut NoCharacters, DT);
        let v = scene.body_state(body).map(|b| b.linear_velocity);
        if v.is_some_and(|v| v != Vec3::zeros()) {
            break;
        }
    }
    scene
        .body_state(body)
        .map(|b| b.linear_velocity)
        .unwrap_or_else(Vec3::zeros)
}

#[test]
fn push_is_full_at_low_mass_and_zero_at_max_mass() {
    let config = CharacterConfig::default();
    let full = pushed_velocity(config.low_rigidbody_push_mass());
    let horizontal = Vec3::new(full.x, 0.0, full.z);
    assert_relative_eq!(horizontal.norm(), config.rigidbody_push(), epsilon = 1.0e-3);
    assert!(full.x > 0.0);
    assert!(full.y.abs() < 1.0e-2, "push has a vertical part: {full:?}");

    let none = pushed_velocity(config.max_rigidbody_push_mass());
    assert_eq!(none, Vec3::zeros());
}

#[test]
fn teleport_rotates_velocity_and_blocks_snap_once() {
    let mut scene = floor();
    let mut c = character(Vec3::new(0.0, 0.01, 0.0), 2.0, 0.5, CharacterConfig::default());
    walk(&mut c, 3.0);
    run(&mut c, &mut scene, 10);
    assert_relative_eq!(c.velocity().x, 3.0, epsilon = 1.0e-3);
    c.clear_move_callback();

    let before = c.velocity();
    let quarter = Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2);
    let lifted = c.position() + Vec3::new(0.0, 0.04, 0.0);
    c.teleport(lifted, quarter, true);
    assert_relative_eq!(c.velocity(), quarter * before, epsilon = 1.0e-5);
    assert_relative_eq!(c.velocity().x, 0.0, epsilon = 1.0e-3);
    assert_relative_eq!(c.velocity().z, -3.0, epsilon = 1.0e-3);
    assert!(c.is_ground_snap_blocked());

    // Standing still now: without snapping only gravity moves the character this tick.
    c.reset_velocity();
    c.tick(&mut scene, &mut NoCharacters, DT);
    assert!(!c.is_ground_snap_blocked());
    assert!(c.position().y > 0.03);
    assert!(c.is_grounded());

    c.tick(&mut scene, &mut NoCharacters, DT);
    assert!(c.position().y < 0.02);
}

#[test]
fn characters_push_lighter_characters() {
    let mut world = CharacterWorld::new(floor());
    let walker = world
        .spawn(Vec3::new(0.0, 0.01, 0.0), Quat::identity(), 2.0, 0.5, CharacterConfig::default())
        .expect("walker");
    let mut light = CharacterConfig::default();
    light.set_mass(40.0);
    let target = world
        .spawn(Vec3::new(1.5, 0.01, 0.0), Quat::identity(), 2.0, 0.5, light)
        .expect("target");
    if let Some(c) = world.character_mut(walker) {
        walk(c, 3.0);
    }

    for _ in 0..60 {
        world.step(DT);
    }
    let x = world.character(target).map(|c| c.position().x).unwrap_or(1.5);
    assert!(x > 1.55, "target did not move: {x}");
    let w = world.character(walker).map(|c| c.position().x).unwrap_or(0.0);
    assert!(w + 1.0 <= x + 1.0e-3);
}

use log::trace;

use crate::{
    constants::MAX_PUSHED_BODIES,
    scene::{BodyId, BodyKind, CharacterHit, CharacterId, CollisionWorld},
};

use super::{CharacterController, CharacterLookup, ForceMode};

/// Fraction of the configured push a body of `mass` receives.
///
/// 1 at or below `low`, falling linearly to 0 at `max`, 0 above.
pub fn rigidbody_push_scale(mass: f32, low: f32, max: f32) -> f32 {
    if mass.is_nan() || mass >= max {
        return 0.0;
    }
    if mass <= low {
        return 1.0;
    }
    ((max - mass) / (max - low)).clamp(0.0, 1.0)
}

impl CharacterController {
    /// React to a side or ceiling hit by pushing what was struck.
    pub(super) fn push_struck(
        &mut self,
        world: &mut dyn CollisionWorld,
        characters: &mut dyn CharacterLookup,
        hit: &CharacterHit,
    ) {
        match (hit.other_character, hit.body) {
            (Some(other), _) => self.push_character(characters, other, hit),
            (None, Some(body)) => self.push_rigidbody(world, body, hit),
            (None, None) => {}
        }
    }

    /// Give a dynamic body a velocity change of `rigidbody_push` m/s (scaled by its mass) away
    /// from the character. Each body is pushed at most once per tick.
    fn push_rigidbody(&mut self, world: &mut dyn CollisionWorld, body: BodyId, hit: &CharacterHit) {
        let Some(info) = world.body(body) else {
            return;
        };
        if info.kind != BodyKind::Dynamic {
            return;
        }
        let scale = rigidbody_push_scale(
            info.mass,
            self.config.low_rigidbody_push_mass(),
            self.config.max_rigidbody_push_mass(),
        );
        if scale <= 0.0 || self.pushed_bodies.contains(&body) {
            return;
        }
        if self.pushed_bodies.len() >= MAX_PUSHED_BODIES {
            trace!("character {:?}: push list full, skipping {body:?}", self.id);
            return;
        }
        self.pushed_bodies.push(body);

        let impulse = -hit.normal * (self.config.rigidbody_push() * scale * info.mass);
        world.apply_impulse(body, impulse, hit.point);
    }

    /// Push another character no heavier than this one, if it accepts pushes.
    fn push_character(
        &mut self,
        characters: &mut dyn CharacterLookup,
        other: CharacterId,
        hit: &CharacterHit,
    ) {
        let Some(target) = characters.character_mut(other) else {
            return;
        };
        if !target.pushable() || target.mass() > self.config.mass() {
            return;
        }
        let mass = target.mass();
        target.add_force(
            -hit.normal * (self.config.character_push() * mass),
            ForceMode::Impulse,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::NeoCharacter;
    use super::super::test_support::*;
    use super::*;
    use crate::{
        bitmask_flags::CollisionFlags,
        config::CharacterConfig,
        math::{Iso, Point3, Vec3},
        scene::{ColliderId, CollisionScene},
    };
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    #[test]
    fn push_scale_is_linear_between_masses() {
        assert_eq!(rigidbody_push_scale(5.0, 10.0, 200.0), 1.0);
        assert_eq!(rigidbody_push_scale(10.0, 10.0, 200.0), 1.0);
        assert_relative_eq!(rigidbody_push_scale(105.0, 10.0, 200.0), 0.5);
        assert_eq!(rigidbody_push_scale(200.0, 10.0, 200.0), 0.0);
        assert_eq!(rigidbody_push_scale(500.0, 10.0, 200.0), 0.0);
        assert_eq!(rigidbody_push_scale(f32::NAN, 10.0, 200.0), 0.0);
    }

    fn hit_on(body: Option<BodyId>, other: Option<CharacterId>) -> CharacterHit {
        CharacterHit {
            character: CharacterId(1),
            collider: ColliderId(0),
            body,
            other_character: other,
            point: Point3::origin(),
            normal: -Vec3::x(),
            move_direction: Vec3::x(),
            move_length: 1.0,
            flags: CollisionFlags::empty(),
        }
    }

    #[test]
    fn rigidbodies_pushed_once_per_tick() {
        let mut scene = CollisionScene::new();
        let light = scene
            .insert_body(BodyKind::Dynamic, Iso::identity(), 10.0)
            .expect("light");
        let heavy = scene
            .insert_body(BodyKind::Dynamic, Iso::identity(), 200.0)
            .expect("heavy");
        let mut c = standing(CharacterConfig::default());
        let hit = hit_on(Some(light), None);
        c.push_struck(&mut scene, &mut super::super::NoCharacters, &hit);
        c.push_struck(&mut scene, &mut super::super::NoCharacters, &hit);
        c.push_struck(&mut scene, &mut super::super::NoCharacters, &hit_on(Some(heavy), None));

        let v = scene.body_state(light).map(|b| b.linear_velocity).unwrap_or_else(Vec3::zeros);
        assert_relative_eq!(v, Vec3::new(c.config().rigidbody_push(), 0.0, 0.0), epsilon = 1.0e-5);
        let v = scene.body_state(heavy).map(|b| b.linear_velocity).unwrap_or_else(Vec3::zeros);
        assert_eq!(v, Vec3::zeros());
    }

    struct Others(HashMap<CharacterId, CharacterController>);

    impl CharacterLookup for Others {
        fn character_mut(&mut self, id: CharacterId) -> Option<&mut dyn NeoCharacter> {
            self.0.get_mut(&id).map(|c| c as &mut dyn NeoCharacter)
        }
    }

    #[test]
    fn characters_pushed_only_when_lighter_and_pushable() {
        let mut scene = CollisionScene::new();
        let mut c = standing(CharacterConfig::default());

        let mut light = CharacterConfig::default();
        light.set_mass(40.0);
        let mut heavy = CharacterConfig::default();
        heavy.set_mass(120.0);
        let mut stubborn = CharacterConfig::default();
        stubborn.set_mass(40.0);
        stubborn.set_pushable(false);

        let mut others = Others(HashMap::new());
        for (i, cfg) in [(2, light), (3, heavy), (4, stubborn)] {
            let mut other = standing(cfg);
            other.id = CharacterId(i);
            others.0.insert(CharacterId(i), other);
        }
        for i in 2..=4 {
            c.push_struck(&mut scene, &mut others, &hit_on(None, Some(CharacterId(i))));
        }

        let dv = |id: u32| others.0[&CharacterId(id)].pending_velocity_change(0.0);
        assert_relative_eq!(dv(2), Vec3::new(c.config().character_push(), 0.0, 0.0));
        assert_eq!(dv(3), Vec3::zeros());
        assert_eq!(dv(4), Vec3::zeros());
    }
}

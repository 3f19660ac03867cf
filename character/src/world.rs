/*!
A collision scene together with the characters living in it.

[`CharacterWorld`] owns a [`CollisionScene`] and one kinematic capsule body per character.
Characters tick in spawn order; after each tick the character's body is moved to its new pose
so characters ticking later collide with it. Character-to-character pushes are routed to the
struck controller through [`CharacterLookup`].
*/

use log::{debug, warn};

use crate::{
    bitmask_flags::Layer,
    config::CharacterConfig,
    controller::{CharacterController, CharacterLookup, NeoCharacter},
    math::{Quat, Vec3, iso},
    scene::{BodyId, CharacterId, ColliderDef, ColliderId, CollisionScene, SceneError},
};

struct CharacterSlot {
    controller: CharacterController,
    body: BodyId,
    collider: ColliderId,
    synced_height: f32,
    synced_radius: f32,
}

/// Every character except the one currently ticking.
struct OthersView<'a> {
    slots: &'a mut [Option<CharacterSlot>],
}

impl CharacterLookup for OthersView<'_> {
    fn character_mut(&mut self, id: CharacterId) -> Option<&mut dyn NeoCharacter> {
        self.slots
            .get_mut(id.0 as usize)?
            .as_mut()
            .map(|slot| &mut slot.controller as &mut dyn NeoCharacter)
    }
}

fn capsule_def(height: f32, radius: f32) -> ColliderDef {
    ColliderDef::capsule_y((height * 0.5 - radius).max(0.0), radius)
        .translation(Vec3::new(0.0, height * 0.5, 0.0))
        .layer(Layer::Character)
}

#[derive(Default)]
pub struct CharacterWorld {
    scene: CollisionScene,
    slots: Vec<Option<CharacterSlot>>,
}

impl CharacterWorld {
    pub fn new(scene: CollisionScene) -> Self {
        Self {
            scene,
            slots: Vec::new(),
        }
    }

    /// Add a character with feet at `position`.
    pub fn spawn(
        &mut self,
        position: Vec3,
        rotation: Quat,
        height: f32,
        radius: f32,
        config: CharacterConfig,
    ) -> Result<CharacterId, SceneError> {
        let id = CharacterId(self.slots.len() as u32);
        let controller = CharacterController::new(id, position, rotation, height, radius, config);
        let (body, collider) = self.scene.insert_character(
            id,
            iso(controller.position(), controller.rotation()),
            controller.height(),
            controller.radius(),
            controller.config().mass(),
        )?;
        debug!("spawned character {id:?} with body {body:?}");
        self.slots.push(Some(CharacterSlot {
            synced_height: controller.height(),
            synced_radius: controller.radius(),
            controller,
            body,
            collider,
        }));
        Ok(id)
    }

    /// Tick every character once.
    pub fn step(&mut self, dt: f32) {
        for index in 0..self.slots.len() {
            let Some(mut slot) = self.slots[index].take() else {
                continue;
            };
            let mut others = OthersView {
                slots: &mut self.slots,
            };
            slot.controller.tick(&mut self.scene, &mut others, dt);
            self.sync_body(&mut slot);
            self.slots[index] = Some(slot);
        }
    }

    fn sync_body(&mut self, slot: &mut CharacterSlot) {
        let c = &slot.controller;
        if let Err(err) = self.scene.set_body_pose(slot.body, iso(c.position(), c.rotation())) {
            warn!("character {:?}: body pose not synced: {err}", c.id());
        }
        if c.height() != slot.synced_height || c.radius() != slot.synced_radius {
            match self
                .scene
                .set_collider_shape(slot.collider, capsule_def(c.height(), c.radius()))
            {
                Ok(()) => {
                    slot.synced_height = c.height();
                    slot.synced_radius = c.radius();
                }
                Err(err) => warn!("character {:?}: capsule not synced: {err}", c.id()),
            }
        }
    }

    pub fn scene(&self) -> &CollisionScene {
        &self.scene
    }

    /// Mutable scene access, e.g. to move platforms between steps.
    pub fn scene_mut(&mut self) -> &mut CollisionScene {
        &mut self.scene
    }

    pub fn character(&self, id: CharacterId) -> Option<&CharacterController> {
        self.slots
            .get(id.0 as usize)?
            .as_ref()
            .map(|slot| &slot.controller)
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut CharacterController> {
        self.slots
            .get_mut(id.0 as usize)?
            .as_mut()
            .map(|slot| &mut slot.controller)
    }

    /// Body representing the character in the scene.
    pub fn body_of(&self, id: CharacterId) -> Option<BodyId> {
        self.slots.get(id.0 as usize)?.as_ref().map(|slot| slot.body)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

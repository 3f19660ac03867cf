use log::trace;

use crate::{
    constants::{
        DEPENETRATION_PADDING, KINEMATIC_DEPENETRATION_ITERATIONS, MAX_DEPENETRATION_PER_ITERATION,
        MAX_OVERLAPS, MIN_PENETRATION_DEPTH, STATIC_DEPENETRATION_ITERATIONS,
    },
    math::Vec3,
    scene::{CollisionWorld, ContactCategory},
};

use super::{CharacterController, VelocityCorrection};

impl CharacterController {
    /// Push the capsule out of overlapping colliders on the depenetration layers.
    ///
    /// Static colliders are resolved first, then kinematic bodies with a higher pass cap.
    /// Dynamic bodies are left alone. Every correction is excluded from the reported velocity.
    /// Returns the total correction applied.
    pub fn depenetrate(&mut self, world: &dyn CollisionWorld) -> Vec3 {
        let mut total = self.depenetrate_category(
            world,
            ContactCategory::Static,
            STATIC_DEPENETRATION_ITERATIONS,
        );
        total += self.depenetrate_category(
            world,
            ContactCategory::Kinematic,
            KINEMATIC_DEPENETRATION_ITERATIONS,
        );
        total
    }

    fn depenetrate_category(
        &mut self,
        world: &dyn CollisionWorld,
        category: ContactCategory,
        passes: u32,
    ) -> Vec3 {
        let filter = self.depenetration_filter();
        let mut total = Vec3::zeros();

        for _ in 0..passes {
            let mut overlaps = std::mem::take(&mut self.overlaps);
            overlaps.clear();
            world.penetrations(
                &self.capsule_shape(),
                &self.capsule_pose(),
                MIN_PENETRATION_DEPTH,
                &filter,
                MAX_OVERLAPS,
                &mut overlaps,
            );

            let push: Vec3 = overlaps
                .iter()
                .filter(|p| p.category == category)
                .map(|p| {
                    p.direction * (p.depth + DEPENETRATION_PADDING).min(MAX_DEPENETRATION_PER_ITERATION)
                })
                .sum();
            self.overlaps = overlaps;

            if push.norm_squared() == 0.0 {
                break;
            }
            trace!("character {:?}: depenetrating {push:?} ({category:?})", self.id);
            self.position += push;
            self.corrections += VelocityCorrection::Full.excluded(&push, &self.up);
            total += push;
        }
        total
    }
}

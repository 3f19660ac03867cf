/*!
Capsule resizing.

`try_*` resizes check for room first and leave the capsule untouched when blocked. `set_*`
resizes record a target and are retried by the tick every `RESIZE_RETRY_INTERVAL` ticks until
they succeed or are cancelled:

```text
Idle -> ResizingHeight { then_radius } -> ResizingRadius -> Idle
```

A radius that needs more height than the capsule has goes through `ResizingHeight` first.
*/

use log::debug;

use crate::{
    constants::{DIST_EPS, MIN_PENETRATION_DEPTH, MIN_RADIUS, RESIZE_RETRY_INTERVAL},
    math::Vec3,
    scene::CollisionWorld,
};

use super::{CharacterController, HeightChanged, capsule_for, capsule_pose};

/// Pending deferred resize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResizeState {
    Idle,
    ResizingHeight {
        target: f32,
        /// Normalized height (0 = feet, 1 = head) that stays fixed.
        pivot: f32,
        /// Radius to apply once the height is in place.
        then_radius: Option<f32>,
    },
    ResizingRadius {
        target: f32,
    },
}

impl CharacterController {
    pub fn resize_state(&self) -> ResizeState {
        self.resize
    }

    /// Change the height now if there is room. Returns false (and changes nothing) if blocked.
    ///
    /// Heights below twice the radius are raised to exactly twice the radius. `pivot` is the
    /// normalized height that stays in place.
    pub fn try_set_height(&mut self, world: &dyn CollisionWorld, height: f32, pivot: f32) -> bool {
        if !height.is_finite() {
            return false;
        }
        let height = height.max(2.0 * self.radius);
        let pivot = if pivot.is_finite() {
            pivot.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let growth = height - self.height;
        if growth.abs() <= DIST_EPS {
            return true;
        }
        if growth > 0.0 && !self.has_room_to_grow(world, growth * (1.0 - pivot), growth * pivot) {
            return false;
        }
        self.commit_height(height, pivot);
        true
    }

    /// Change the height, retrying until there is room.
    pub fn set_height(&mut self, height: f32, pivot: f32) {
        if !height.is_finite() {
            return;
        }
        self.resize = ResizeState::ResizingHeight {
            target: height,
            pivot,
            then_radius: None,
        };
        self.resize_countdown = 0;
    }

    /// Change the radius now if there is room, growing the height first when needed (feet fixed).
    pub fn try_set_radius(&mut self, world: &dyn CollisionWorld, radius: f32) -> bool {
        if !radius.is_finite() {
            return false;
        }
        let radius = radius.max(MIN_RADIUS);
        let height = self.height.max(2.0 * radius);
        let growth = height - self.height;

        if growth > DIST_EPS && !self.has_room_to_grow(world, growth, 0.0) {
            return false;
        }
        if radius > self.radius && self.overlaps_with(world, height, radius) {
            return false;
        }

        if growth > DIST_EPS {
            self.commit_height(height, 0.0);
        }
        self.radius = radius;
        self.config.fit_capsule(self.height, self.radius);
        true
    }

    /// Change the radius, retrying until there is room.
    pub fn set_radius(&mut self, radius: f32) {
        if !radius.is_finite() {
            return;
        }
        let radius = radius.max(MIN_RADIUS);
        self.resize = if 2.0 * radius > self.height {
            ResizeState::ResizingHeight {
                target: 2.0 * radius,
                pivot: 0.0,
                then_radius: Some(radius),
            }
        } else {
            ResizeState::ResizingRadius { target: radius }
        };
        self.resize_countdown = 0;
    }

    /// Drop any deferred resize.
    pub fn cancel_resize(&mut self) {
        self.resize = ResizeState::Idle;
    }

    /// Attempt the deferred resize if its retry interval has elapsed.
    pub(super) fn retry_resize(&mut self, world: &dyn CollisionWorld) {
        if self.resize == ResizeState::Idle {
            return;
        }
        if self.resize_countdown > 0 {
            self.resize_countdown -= 1;
            return;
        }

        if let ResizeState::ResizingHeight {
            target,
            pivot,
            then_radius,
        } = self.resize
        {
            if !self.try_set_height(world, target, pivot) {
                debug!("character {:?}: height {target} blocked, retrying", self.id);
                self.resize_countdown = RESIZE_RETRY_INTERVAL - 1;
                return;
            }
            self.resize = match then_radius {
                Some(target) => ResizeState::ResizingRadius { target },
                None => ResizeState::Idle,
            };
        }

        if let ResizeState::ResizingRadius { target } = self.resize {
            if !self.try_set_radius(world, target) {
                debug!("character {:?}: radius {target} blocked, retrying", self.id);
                self.resize_countdown = RESIZE_RETRY_INTERVAL - 1;
                return;
            }
            self.resize = ResizeState::Idle;
        }
    }

    /// Sweep the capsule up by `top` and down by `bottom` to check for room.
    fn has_room_to_grow(&self, world: &dyn CollisionWorld, top: f32, bottom: f32) -> bool {
        let shape = self.capsule_shape();
        let pose = self.capsule_pose();
        let filter = self.collision_filter();
        let skin = self.config.skin_width();

        let clear = |direction: Vec3, distance: f32| {
            distance <= DIST_EPS
                || world
                    .cast_shape(&shape, &pose, &direction, distance + skin, &filter)
                    .is_none_or(|hit| hit.distance - skin >= distance)
        };
        clear(self.up, top) && clear(-self.up, bottom)
    }

    fn overlaps_with(&self, world: &dyn CollisionWorld, height: f32, radius: f32) -> bool {
        let mut overlaps = Vec::new();
        world.penetrations(
            &capsule_for(height, radius),
            &capsule_pose(&self.position, &self.up, &self.rotation, height),
            MIN_PENETRATION_DEPTH,
            &self.collision_filter(),
            1,
            &mut overlaps,
        );
        !overlaps.is_empty()
    }

    fn commit_height(&mut self, height: f32, pivot: f32) {
        let root_offset = (self.height - height) * pivot;
        self.position += self.up * root_offset;
        self.height = height;
        self.config.fit_capsule(self.height, self.radius);

        let event = HeightChanged {
            height,
            root_offset,
        };
        self.events.height_changed.notify(&event);
    }
}

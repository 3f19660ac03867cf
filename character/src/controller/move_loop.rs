/*!
The move loop: sweep the capsule along each queued segment and resolve what it hits.

Each popped segment is swept for its distance plus an overshoot of `skin / MIN_APPROACH_COS`.
On a hit the capsule stops `skin / cos(approach)` short of the contact, so it keeps a skin-wide
gap from the surface. Whatever distance is left is deflected according to the contact type and
queued at the front, so continuations run before anything queued earlier.

Contacts are classified in the capsule's local frame against `sin(wall_angle)`:
- `Below`: ground. Walkable ground redirects the move along the surface; steep ground and
  ledges slide the downward part along the plane, reduced by slope or ledge friction.
- `Above`: ceilings. Upward motion is removed (flat) or turned outward (sloped).
- `Left` / `Right` / `Front` / `Back`: walls. Motion into the wall is removed.

Side contacts, steep ground and ledge edges below the step height may instead be stepped over.
A step queues three segments (up, across, down); up and down are excluded from velocity and never
slide. The hit that started a step is not reported.
*/

use log::{debug, trace};

use crate::{
    bitmask_flags::{CollisionFlag, CollisionFlags},
    constants::{
        MAX_MOVE_ITERATIONS, MAX_STUCK_SWEEPS, MIN_APPROACH_COS, MIN_MOVE_DISTANCE,
        MIN_SEGMENT_DISTANCE, STEP_PROBE_AHEAD,
    },
    math::{Point3, Vec3, along, project_on_plane, try_normalize},
    scene::{CharacterHit, CollisionWorld, SweepHit},
};

use super::{CharacterController, CharacterLookup, MoveSegment, VelocityCorrection};

/// Contact side for a normal expressed in the capsule's local frame.
pub fn classify_local_normal(local_normal: &Vec3, wall_sine: f32) -> CollisionFlag {
    if local_normal.y > wall_sine {
        CollisionFlag::Below
    } else if local_normal.y < -wall_sine {
        CollisionFlag::Above
    } else if local_normal.x.abs() > local_normal.z.abs() {
        // The normal points away from the obstacle.
        if local_normal.x > 0.0 {
            CollisionFlag::Left
        } else {
            CollisionFlag::Right
        }
    } else if local_normal.z > 0.0 {
        CollisionFlag::Back
    } else {
        CollisionFlag::Front
    }
}

/// Remove the part of the horizontal motion that goes into the obstacle.
fn deflect_horizontal(horizontal: &Vec3, normal: &Vec3, up: &Vec3) -> Vec3 {
    match try_normalize(&project_on_plane(normal, up)) {
        Some(outward) if horizontal.dot(&outward) < 0.0 => {
            horizontal - outward * horizontal.dot(&outward)
        }
        _ => *horizontal,
    }
}

/// Split `motion` into its parts along and across `up`.
fn split(motion: &Vec3, up: &Vec3) -> (Vec3, Vec3) {
    let vertical = along(motion, up);
    (motion - vertical, vertical)
}

/// Wall contact: slide along the wall plane.
fn deflect_wall(motion: &Vec3, normal: &Vec3, up: &Vec3) -> Vec3 {
    let (horizontal, vertical) = split(motion, up);
    let vertical = if vertical.dot(normal) < 0.0 {
        project_on_plane(&vertical, normal)
    } else {
        vertical
    };
    deflect_horizontal(&horizontal, normal, up) + vertical
}

/// Ceiling contact: drop upward motion into a flat ceiling, slide outward under a sloped one.
fn deflect_ceiling(motion: &Vec3, normal: &Vec3, up: &Vec3) -> Vec3 {
    let (horizontal, vertical) = split(motion, up);
    let vertical = if vertical.dot(up) > 0.0 {
        project_on_plane(&vertical, normal)
    } else {
        vertical
    };
    deflect_horizontal(&horizontal, normal, up) + vertical
}

/// Walkable ground: follow the surface, keeping the horizontal speed.
fn follow_surface(horizontal: &Vec3, normal: &Vec3) -> Vec3 {
    let tangent = project_on_plane(horizontal, normal);
    try_normalize(&tangent)
        .map(|dir| dir * horizontal.norm())
        .unwrap_or_else(Vec3::zeros)
}

/// Why the move loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum LoopEnd {
    /// Every queued segment was consumed.
    Drained,
    /// `MAX_STUCK_SWEEPS` sweeps in a row made no progress.
    Stuck,
    /// `MAX_MOVE_ITERATIONS` sweeps were used up.
    IterationCap,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct LoopOutcome {
    pub iterations: u32,
    pub end: LoopEnd,
}

impl CharacterController {
    pub(super) fn run_move_loop(
        &mut self,
        world: &mut dyn CollisionWorld,
        characters: &mut dyn CharacterLookup,
    ) -> LoopOutcome {
        let filter = self.collision_filter();
        let mut stuck = 0;
        let mut iterations = 0;

        while let Some(segment) = self.queue.pop() {
            if iterations >= MAX_MOVE_ITERATIONS {
                trace!(
                    "character {:?}: iteration cap reached, {} segments dropped",
                    self.id,
                    self.queue.len() + 1
                );
                self.queue.clear();
                return LoopOutcome {
                    iterations,
                    end: LoopEnd::IterationCap,
                };
            }
            iterations += 1;

            let skin = self.config.skin_width();
            let hit = world.cast_shape(
                &self.capsule_shape(),
                &self.capsule_pose(),
                &segment.direction,
                segment.distance + skin / MIN_APPROACH_COS,
                &filter,
            );
            let Some(hit) = hit else {
                self.advance(&segment, segment.distance);
                stuck = 0;
                continue;
            };

            let approach = (-segment.direction).dot(&hit.normal).max(MIN_APPROACH_COS);
            let moved = (hit.distance - skin / approach).max(0.0);
            if moved >= segment.distance {
                // The contact lies past the end of the segment.
                self.advance(&segment, segment.distance);
                stuck = 0;
                continue;
            }
            self.advance(&segment, moved);
            trace!(
                "character {:?}: hit {:?} after {moved} of {}",
                self.id, hit.collider, segment.distance
            );

            self.resolve_hit(world, characters, &segment, &hit, segment.distance - moved);

            if moved < MIN_MOVE_DISTANCE {
                stuck += 1;
                if stuck >= MAX_STUCK_SWEEPS {
                    debug!("character {:?}: no progress, abandoning moves this tick", self.id);
                    self.queue.clear();
                    return LoopOutcome {
                        iterations,
                        end: LoopEnd::Stuck,
                    };
                }
            } else {
                stuck = 0;
            }
        }
        LoopOutcome {
            iterations,
            end: LoopEnd::Drained,
        }
    }

    /// Move along `segment` by `distance`, booking its velocity correction.
    fn advance(&mut self, segment: &MoveSegment, distance: f32) {
        let displacement = segment.direction * distance;
        self.position += displacement;
        self.corrections += segment.correction.excluded(&displacement, &self.up);
    }

    fn resolve_hit(
        &mut self,
        world: &mut dyn CollisionWorld,
        characters: &mut dyn CharacterLookup,
        segment: &MoveSegment,
        hit: &SweepHit,
        remaining: f32,
    ) {
        let local_normal = self.rotation.inverse() * hit.normal;
        let side = classify_local_normal(&local_normal, self.config.wall_sine());
        self.state.collision_flags.add(side);

        let surface = if side == CollisionFlag::Below {
            self.edge_surface_normal(&*world, &hit.point, &hit.normal)
        } else {
            hit.normal
        };
        if segment.slide {
            let steep = hit.normal.dot(&self.up) < self.config.slope_cosine();
            let on_edge = surface != hit.normal;
            if (side != CollisionFlag::Below || steep || on_edge)
                && self.try_step(&*world, segment, hit, remaining)
            {
                return;
            }
        }

        let record = CharacterHit {
            character: self.id,
            collider: hit.collider,
            body: hit.body,
            other_character: hit.character,
            point: hit.point,
            normal: hit.normal,
            move_direction: segment.direction,
            move_length: remaining,
            flags: CollisionFlags::from_flags(&[side]),
        };
        self.events.hit.notify(&record);
        world.notify_hit(&record);
        if side != CollisionFlag::Below {
            self.push_struck(world, characters, &record);
        }

        if !segment.slide {
            return;
        }
        let motion = segment.direction * remaining;
        let continuation = match side {
            CollisionFlag::Below => self.deflect_ground(&motion, &hit.normal, &surface),
            CollisionFlag::Above => deflect_ceiling(&motion, &hit.normal, &self.up),
            _ => deflect_wall(&motion, &hit.normal, &self.up),
        };
        if let Some(next) = MoveSegment::from_displacement(continuation, true, segment.correction) {
            self.queue.add_first(next);
        }
    }

    /// Ground contact. `surface` is the edge-corrected normal at the contact.
    fn deflect_ground(&self, motion: &Vec3, normal: &Vec3, surface: &Vec3) -> Vec3 {
        let up = self.up;
        let slope_cosine = self.config.slope_cosine();
        let (horizontal, vertical) = split(motion, &up);

        if normal.dot(&up) >= slope_cosine {
            return follow_surface(&horizontal, normal);
        }

        // Too steep to stand on, unless it is the edge of something walkable.
        let friction = if surface.dot(&up) >= slope_cosine {
            self.config.ledge_friction()
        } else {
            self.config.slope_friction()
        };
        let vertical = if vertical.dot(&up) < 0.0 {
            project_on_plane(&vertical, normal) * (1.0 - friction)
        } else {
            vertical
        };
        deflect_horizontal(&horizontal, normal, &up) + vertical
    }

    /// Try to climb onto the obstacle struck by `segment`. On success the step sequence is
    /// queued and the hit is absorbed.
    fn try_step(
        &mut self,
        world: &dyn CollisionWorld,
        segment: &MoveSegment,
        hit: &SweepHit,
        remaining: f32,
    ) -> bool {
        let step_height = self.config.step_height();
        let skin = self.config.skin_width();
        let up = self.up;
        if !self.state.is_grounded || step_height <= 0.0 || self.queue.len() + 3 > self.queue.capacity() {
            return false;
        }

        // A capsule resting on a lip can touch it right at its feet; the probed top decides.
        let contact_height = (hit.point.coords - self.position).dot(&up);
        if contact_height > step_height {
            return false;
        }
        let horizontal = project_on_plane(&(segment.direction * remaining), &up);
        let Some(forward) = try_normalize(&horizontal) else {
            return false;
        };
        match try_normalize(&project_on_plane(&hit.normal, &up)) {
            Some(outward) if forward.dot(&outward) < 0.0 => {}
            _ => return false,
        }

        // Find the top of the step just past the contact.
        let filter = self.collision_filter();
        let feet_level = hit.point.coords - up * contact_height;
        let origin = Point3::from(feet_level + forward * STEP_PROBE_AHEAD + up * (step_height + skin));
        let Some(top) = world.cast_ray(&origin, &-up, step_height + skin, &filter) else {
            return false;
        };
        if top.normal.dot(&up) < self.config.step_cosine() {
            return false;
        }
        let top_height = (top.point.coords - self.position).dot(&up);
        if top_height <= 0.0 || top_height > step_height {
            return false;
        }

        // Room above for the lift.
        let lift = top_height + skin;
        let blocked = world
            .cast_shape(&self.capsule_shape(), &self.capsule_pose(), &up, lift + skin, &filter)
            .is_some_and(|h| h.distance - skin < lift);
        if blocked {
            trace!("character {:?}: step blocked overhead", self.id);
            return false;
        }

        trace!("character {:?}: stepping up {lift}", self.id);
        let rise = MoveSegment {
            direction: up,
            distance: lift,
            slide: false,
            correction: VelocityCorrection::Full,
        };
        let settle = MoveSegment {
            direction: -up,
            distance: lift,
            ..rise
        };
        // Queued in reverse so they run up, across, down.
        self.queue.add_first(settle);
        if horizontal.norm() > MIN_SEGMENT_DISTANCE {
            if let Some(across) = MoveSegment::from_displacement(horizontal, true, segment.correction) {
                self.queue.add_first(across);
            }
        }
        self.queue.add_first(rise);
        true
    }
}

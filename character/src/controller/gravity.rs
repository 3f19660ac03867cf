use crate::{
    constants::DIST_EPS,
    math::{Vec3, rotation_between, try_normalize},
};

use super::CharacterController;

/// Progress of the up vector turning toward a new gravity direction.
#[derive(Clone, Copy, Debug)]
pub(super) struct UpAlignment {
    target: Vec3,
    /// Radians per second; infinite when there is no smoothing.
    rate: f32,
}

impl UpAlignment {
    pub fn new(up: Vec3) -> Self {
        Self {
            target: up,
            rate: f32::INFINITY,
        }
    }
}

impl CharacterController {
    /// Turn `up` (and the capsule with it) toward `-gravity`.
    ///
    /// A new gravity direction restarts the turn so it completes in `up_smoothing` seconds. The
    /// heading is carried over by the shortest-arc rotation between the old and new up vectors.
    pub(super) fn update_up(&mut self, dt: f32) {
        if !self.config.orient_up_with_gravity() {
            return;
        }
        let Some(target) = try_normalize(&-self.config.gravity()) else {
            return;
        };

        if (target - self.up_alignment.target).norm_squared() > DIST_EPS {
            let angle = self.up.dot(&target).clamp(-1.0, 1.0).acos();
            let smoothing = self.config.up_smoothing();
            self.up_alignment = UpAlignment {
                target,
                rate: if smoothing > 0.0 {
                    angle / smoothing
                } else {
                    f32::INFINITY
                },
            };
        }

        let remaining = self.up.dot(&target).clamp(-1.0, 1.0).acos();
        if remaining <= DIST_EPS {
            return;
        }
        let arc = rotation_between(&self.up, &target);
        let step = if self.up_alignment.rate * dt >= remaining {
            arc
        } else {
            arc.powf(self.up_alignment.rate * dt / remaining)
        };
        self.rotation = step * self.rotation;
        self.up = try_normalize(&(self.rotation * Vec3::y())).unwrap_or(target);
        self.state.up = self.up;
    }
}

#[cfg(test)]
mod tests {
    use super::super::VariableGravity;
    use super::super::test_support::*;
    use crate::config::CharacterConfig;
    use crate::math::Quat;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn up_snaps_to_gravity_without_smoothing() {
        let mut c = standing(CharacterConfig::default());
        c.set_orient_up_with_gravity(true);
        c.set_gravity(Vec3::new(-9.81, 0.0, 0.0));
        c.update_up(DT);
        assert_relative_eq!(VariableGravity::up(&c), Vec3::x(), epsilon = 1.0e-5);
        assert_relative_eq!(c.rotation() * Vec3::y(), Vec3::x(), epsilon = 1.0e-5);
    }

    #[test]
    fn up_turns_over_smoothing_time() {
        let mut c = standing(CharacterConfig::default());
        c.configure(|cfg| cfg.set_up_smoothing(1.0));
        c.set_orient_up_with_gravity(true);
        c.set_gravity(Vec3::new(-9.81, 0.0, 0.0));

        c.update_up(0.5);
        let half = c.up().dot(&Vec3::y()).acos();
        assert_relative_eq!(half, FRAC_PI_2 * 0.5, epsilon = 1.0e-3);

        c.update_up(0.5);
        assert_relative_eq!(c.up(), Vec3::x(), epsilon = 1.0e-4);
    }

    #[test]
    fn up_is_fixed_when_not_oriented() {
        let mut c = standing(CharacterConfig::default());
        c.set_rotation(Quat::from_axis_angle(&Vec3::y_axis(), 1.0));
        c.set_gravity(Vec3::new(0.0, 9.81, 0.0));
        c.update_up(DT);
        assert_relative_eq!(c.up(), Vec3::y());
    }
}

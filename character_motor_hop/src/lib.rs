//! Hop movement motor (velocity intent only).
#![forbid(unsafe_code)]

use std::f32::consts::{PI, TAU};

use rapier3d::math::Vector;
use rapier3d::prelude::Real;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HopMotorConfig {
    /// Horizontal speed while a direction is held.
    pub move_speed: Real,
    /// Vertical velocity injected by a hop.
    pub hop_height: Real,
    /// Minimum time between two hops, in seconds.
    pub hop_cooldown: Real,
    pub gravity: Real,
    /// Multiplicative horizontal damping applied every tick.
    pub damping: Real,
    /// Fraction of the remaining yaw difference closed per tick.
    pub facing_lerp: Real,
}

impl Default for HopMotorConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            hop_height: 6.0,
            hop_cooldown: 0.35,
            gravity: 30.0,
            damping: 0.85,
            facing_lerp: 0.4,
        }
    }
}

/// Held directional keys. Up moves toward -z, right toward +x.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectionKeys {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DirectionKeys {
    pub fn any(&self) -> bool {
        self.up || self.down || self.left || self.right
    }
}

#[derive(Clone, Copy, Debug)]
pub struct HopMotorState {
    pub velocity: Vector<Real>,
    pub grounded: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct HopMotorOutput {
    pub desired_translation: Vector<Real>,
    pub next_velocity: Vector<Real>,
    pub target_facing: Option<Real>,
    pub hopped: bool,
}

pub struct HopMotor {
    config: HopMotorConfig,
    clock: Real,
    last_hop: Option<Real>,
}

impl HopMotor {
    pub fn new(config: HopMotorConfig) -> Self {
        Self {
            config,
            clock: 0.0,
            last_hop: None,
        }
    }

    pub fn config(&self) -> HopMotorConfig {
        self.config
    }

    /// Seconds of simulated time seen by this motor.
    pub fn clock(&self) -> Real {
        self.clock
    }

    pub fn last_hop(&self) -> Option<Real> {
        self.last_hop
    }

    pub fn hop_ready(&self) -> bool {
        match self.last_hop {
            Some(last) => self.clock - last > self.config.hop_cooldown,
            None => true,
        }
    }

    pub fn step(&mut self, keys: DirectionKeys, state: HopMotorState, dt: Real) -> HopMotorOutput {
        let dt = dt.max(0.0);
        self.clock += dt;

        let direction = input_direction(keys);
        let mut velocity = state.velocity;
        velocity.x *= self.config.damping;
        velocity.z *= self.config.damping;

        let mut target_facing = None;
        if let Some(dir) = direction {
            velocity.x = dir.x * self.config.move_speed;
            velocity.z = dir.z * self.config.move_speed;
            target_facing = Some(dir.x.atan2(dir.z));
        }

        let mut hopped = false;
        if state.grounded && direction.is_some() && self.hop_ready() {
            velocity.y = self.config.hop_height;
            self.last_hop = Some(self.clock);
            hopped = true;
        }

        if !state.grounded {
            velocity.y -= self.config.gravity * dt;
        }

        HopMotorOutput {
            desired_translation: velocity * dt,
            next_velocity: velocity,
            target_facing,
            hopped,
        }
    }

    /// Gravity-only integration used while input is suspended.
    pub fn fall(&mut self, state: HopMotorState, dt: Real) -> HopMotorOutput {
        let dt = dt.max(0.0);
        self.clock += dt;
        let mut velocity = state.velocity;
        velocity.x *= self.config.damping;
        velocity.z *= self.config.damping;
        if !state.grounded {
            velocity.y -= self.config.gravity * dt;
        }
        HopMotorOutput {
            desired_translation: velocity * dt,
            next_velocity: velocity,
            target_facing: None,
            hopped: false,
        }
    }
}

/// Unit planar direction from held keys, or `None` when nothing (or only opposing pairs) is held.
pub fn input_direction(keys: DirectionKeys) -> Option<Vector<Real>> {
    let x = axis(keys.right, keys.left);
    let z = axis(keys.down, keys.up);
    let dir = Vector::new(x, 0.0, z);
    if dir.norm_squared() <= 0.0 {
        return None;
    }
    Some(dir.normalize())
}

fn axis(positive: bool, negative: bool) -> Real {
    match (positive, negative) {
        (true, false) => 1.0,
        (false, true) => -1.0,
        _ => 0.0,
    }
}

/// Wrap an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: Real) -> Real {
    let mut wrapped = angle % TAU;
    if wrapped <= -PI {
        wrapped += TAU;
    } else if wrapped > PI {
        wrapped -= TAU;
    }
    wrapped
}

/// Move `current` toward `target` along the shorter arc by `fraction` of the gap.
pub fn smooth_facing(current: Real, target: Real, fraction: Real) -> Real {
    let diff = wrap_angle(target - current);
    wrap_angle(lerp(current, current + diff, fraction.clamp(0.0, 1.0)))
}

/// Velocity after touching a surface: landing stops the fall, walls and ceilings absorb the
/// component pointing into them.
pub fn respond_to_contact(
    velocity: Vector<Real>,
    normal: Vector<Real>,
    grounded: bool,
) -> Vector<Real> {
    let mut velocity = velocity;
    if grounded {
        if velocity.y < 0.0 {
            velocity.y = 0.0;
        }
        return velocity;
    }
    let into = velocity.dot(&normal);
    if into < 0.0 {
        velocity -= normal * into;
    }
    velocity
}

fn lerp(a: Real, b: Real, t: Real) -> Real {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const DT: Real = 1.0 / 60.0;

    fn grounded(velocity: Vector<Real>) -> HopMotorState {
        HopMotorState {
            velocity,
            grounded: true,
        }
    }

    #[test]
    fn held_direction_sets_exact_speed() {
        let config = HopMotorConfig::default();
        let cases = [
            DirectionKeys {
                up: true,
                ..Default::default()
            },
            DirectionKeys {
                up: true,
                right: true,
                ..Default::default()
            },
            DirectionKeys {
                down: true,
                left: true,
                ..Default::default()
            },
        ];
        for keys in cases {
            let mut motor = HopMotor::new(config);
            let out = motor.step(
                keys,
                HopMotorState {
                    velocity: Vector::new(3.0, 0.0, -1.0),
                    grounded: false,
                },
                DT,
            );
            let dir = input_direction(keys).expect("direction");
            assert_abs_diff_eq!(out.next_velocity.x, dir.x * config.move_speed, epsilon = 1.0e-6);
            assert_abs_diff_eq!(out.next_velocity.z, dir.z * config.move_speed, epsilon = 1.0e-6);
            let planar = Vector::new(out.next_velocity.x, 0.0, out.next_velocity.z);
            assert_abs_diff_eq!(planar.norm(), config.move_speed, epsilon = 1.0e-5);
        }
    }

    #[test]
    fn opposing_keys_cancel() {
        let keys = DirectionKeys {
            up: true,
            down: true,
            left: true,
            right: false,
        };
        let dir = input_direction(keys).expect("left survives");
        assert_abs_diff_eq!(dir, Vector::new(-1.0, 0.0, 0.0));
        let all = DirectionKeys {
            up: true,
            down: true,
            left: true,
            right: true,
        };
        assert!(input_direction(all).is_none());
    }

    #[test]
    fn no_input_only_damps() {
        let mut motor = HopMotor::new(HopMotorConfig::default());
        let out = motor.step(DirectionKeys::default(), grounded(Vector::new(2.0, 0.0, 0.0)), DT);
        assert_abs_diff_eq!(out.next_velocity.x, 1.7, epsilon = 1.0e-6);
        assert!(!out.hopped);
        assert!(out.target_facing.is_none());
    }

    #[test]
    fn hops_respect_cooldown() {
        let config = HopMotorConfig::default();
        let mut motor = HopMotor::new(config);
        let keys = DirectionKeys {
            right: true,
            ..Default::default()
        };
        let mut hops = Vec::new();
        for _ in 0..240 {
            let out = motor.step(keys, grounded(Vector::zeros()), DT);
            if out.hopped {
                assert_eq!(out.next_velocity.y, config.hop_height);
                hops.push(motor.clock());
            }
        }
        assert!(hops.len() > 2);
        for pair in hops.windows(2) {
            assert!(pair[1] - pair[0] > config.hop_cooldown);
        }
    }

    #[test]
    fn airborne_never_hops_and_falls() {
        let config = HopMotorConfig::default();
        let mut motor = HopMotor::new(config);
        let keys = DirectionKeys {
            up: true,
            ..Default::default()
        };
        let out = motor.step(
            keys,
            HopMotorState {
                velocity: Vector::zeros(),
                grounded: false,
            },
            DT,
        );
        assert!(!out.hopped);
        assert_abs_diff_eq!(out.next_velocity.y, -config.gravity * DT, epsilon = 1.0e-6);
    }

    #[test]
    fn facing_takes_short_way_across_wrap() {
        let next = smooth_facing(3.0, -3.0, 0.5);
        let step = wrap_angle(next - 3.0);
        assert!(step > 0.0);
        assert!(step.abs() <= PI);
        assert_abs_diff_eq!(step, (TAU - 6.0) * 0.5, epsilon = 1.0e-5);
    }

    #[test]
    fn facing_step_never_exceeds_half_turn() {
        let mut current = 0.0;
        for i in 0..64 {
            let target = wrap_angle(i as Real * 2.3);
            let next = smooth_facing(current, target, 1.0);
            assert!(wrap_angle(next - current).abs() <= PI + 1.0e-5);
            current = next;
        }
    }

    #[test]
    fn contact_response_stops_falls_and_wall_pushes() {
        let landed = respond_to_contact(Vector::new(1.0, -4.0, 0.0), Vector::y(), true);
        assert_abs_diff_eq!(landed, Vector::new(1.0, 0.0, 0.0));
        let wall = respond_to_contact(Vector::new(3.0, 1.0, 0.0), -Vector::x(), false);
        assert_abs_diff_eq!(wall, Vector::new(0.0, 1.0, 0.0));
    }
}

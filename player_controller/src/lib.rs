//! Locomotion controller composition (input snapshot + hop motor + capsule collision).
#![forbid(unsafe_code)]

mod input;

pub use input::{InputSnapshot, KeyBindings};

use character_capsule::{CapsuleBody, CapsuleProfile};
use character_motor_hop::{respond_to_contact, smooth_facing, HopMotor, HopMotorConfig, HopMotorState};
use collision_index::{CollisionIndex, Contact};
use rapier3d::math::{Point, Vector};
use rapier3d::prelude::Real;
use thiserror::Error;

/// A single tick never integrates more than this many steps; leftover time is dropped.
pub const MAX_SUBSTEPS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("character is not ready")]
    NotReady,
}

/// What the controller does while the panel gate is open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GatePolicy {
    /// No input, gravity, or collision until the gate closes.
    #[default]
    Freeze,
    /// Ignore input but keep integrating gravity and collision.
    GravityOnly,
}

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub motor: HopMotorConfig,
    pub capsule: CapsuleProfile,
    pub bindings: KeyBindings,
    pub gate_policy: GatePolicy,
    /// Feet below this height trigger a respawn.
    pub fall_threshold: Real,
    /// Longest integration step; longer ticks are split into substeps.
    pub max_step: Real,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            motor: HopMotorConfig::default(),
            capsule: CapsuleProfile::default(),
            bindings: KeyBindings::default(),
            gate_policy: GatePolicy::Freeze,
            fall_threshold: -25.0,
            max_step: 1.0 / 30.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Character {
    pub position: Point<Real>,
    pub facing: Real,
    pub target_facing: Real,
    pub velocity: Vector<Real>,
    pub grounded: bool,
    pub spawn_position: Point<Real>,
    pub animating: bool,
}

impl Character {
    fn new(spawn_position: Point<Real>, facing: Real) -> Self {
        Self {
            position: spawn_position,
            facing,
            target_facing: facing,
            velocity: Vector::zeros(),
            grounded: false,
            spawn_position,
            animating: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocomotionEvent {
    TookOff,
    Landed,
    Respawned,
}

#[derive(Clone, Debug)]
pub struct LocomotionFrame {
    pub character: Character,
    pub contact: Option<Contact>,
    pub events: Vec<LocomotionEvent>,
}

struct Spawned {
    character: Character,
    capsule: CapsuleBody,
}

pub struct PlayerController {
    config: ControllerConfig,
    motor: HopMotor,
    spawned: Option<Spawned>,
    hop_count: u32,
}

impl PlayerController {
    pub fn new(config: ControllerConfig) -> Self {
        let motor = HopMotor::new(config.motor);
        Self {
            config,
            motor,
            spawned: None,
            hop_count: 0,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn motor(&self) -> &HopMotor {
        &self.motor
    }

    pub fn is_ready(&self) -> bool {
        self.spawned.is_some()
    }

    /// Create the character once its geometry is available. Replaces any previous character.
    pub fn spawn(&mut self, spawn_position: Point<Real>, facing: Real) {
        let capsule = CapsuleBody::at_feet(spawn_position, &self.config.capsule);
        log::debug!(
            "character spawned at ({:.2}, {:.2}, {:.2})",
            spawn_position.x,
            spawn_position.y,
            spawn_position.z
        );
        self.spawned = Some(Spawned {
            character: Character::new(spawn_position, facing),
            capsule,
        });
    }

    pub fn character(&self) -> Option<&Character> {
        self.spawned.as_ref().map(|spawned| &spawned.character)
    }

    pub fn capsule(&self) -> Option<&CapsuleBody> {
        self.spawned.as_ref().map(|spawned| &spawned.capsule)
    }

    /// Hops injected since the controller was created.
    pub fn hop_count(&self) -> u32 {
        self.hop_count
    }

    pub fn set_animating(&mut self, animating: bool) {
        if let Some(spawned) = self.spawned.as_mut() {
            spawned.character.animating = animating;
        }
    }

    /// Put the character back at its spawn point with zero velocity.
    pub fn respawn(&mut self) -> Result<(), ControllerError> {
        let spawned = self.spawned.as_mut().ok_or(ControllerError::NotReady)?;
        respawn_spawned(spawned);
        Ok(())
    }

    pub fn tick(
        &mut self,
        index: &CollisionIndex,
        input: &InputSnapshot,
        gated: bool,
        dt: Real,
    ) -> Result<LocomotionFrame, ControllerError> {
        let Some(spawned) = self.spawned.as_mut() else {
            log::trace!("tick skipped: character not ready");
            return Err(ControllerError::NotReady);
        };
        let mut events = Vec::new();

        if gated && self.config.gate_policy == GatePolicy::Freeze {
            return Ok(LocomotionFrame {
                character: spawned.character.clone(),
                contact: None,
                events,
            });
        }

        if !gated && self.config.bindings.respawn_requested(input) {
            respawn_spawned(spawned);
            events.push(LocomotionEvent::Respawned);
            return Ok(LocomotionFrame {
                character: spawned.character.clone(),
                contact: None,
                events,
            });
        }

        let (steps, step_dt) = substeps(dt, self.config.max_step);
        if steps > 1 {
            log::trace!("tick of {:.3}s split into {} steps of {:.4}s", dt, steps, step_dt);
        }
        let keys = (!gated).then(|| self.config.bindings.direction_keys(input));
        let mut contact = None;
        let mut target_facing = None;
        for _ in 0..steps {
            let state = HopMotorState {
                velocity: spawned.character.velocity,
                grounded: spawned.character.grounded,
            };
            let output = match keys {
                Some(keys) => self.motor.step(keys, state, step_dt),
                None => self.motor.fall(state, step_dt),
            };
            if output.hopped {
                self.hop_count += 1;
            }
            if output.target_facing.is_some() {
                target_facing = output.target_facing;
            }

            let resolved = spawned.capsule.move_and_resolve(
                index,
                &self.config.capsule,
                output.desired_translation,
                step_dt,
            );
            contact = resolved.contact;
            let was_grounded = spawned.character.grounded;
            let mut velocity = output.next_velocity;
            if let Some(contact) = resolved.contact {
                velocity = respond_to_contact(velocity, contact.normal, resolved.grounded);
            }
            if resolved.grounded && velocity.y < 0.0 {
                velocity.y = 0.0;
            }
            if resolved.grounded && !was_grounded {
                velocity.x = 0.0;
                velocity.z = 0.0;
                events.push(LocomotionEvent::Landed);
            }

            let character = &mut spawned.character;
            character.grounded = resolved.grounded;
            character.velocity = velocity;
            character.position = spawned.capsule.feet();

            if character.position.y < self.config.fall_threshold {
                log::info!(
                    "character fell below {:.1}; respawning",
                    self.config.fall_threshold
                );
                respawn_spawned(spawned);
                events.push(LocomotionEvent::Respawned);
                return Ok(LocomotionFrame {
                    character: spawned.character.clone(),
                    contact,
                    events,
                });
            }

            if output.hopped {
                log::trace!("hop at t={:.3}", self.motor.clock());
                events.push(LocomotionEvent::TookOff);
            }
        }

        let character = &mut spawned.character;
        if let Some(target) = target_facing {
            character.target_facing = target;
        }
        character.facing = smooth_facing(
            character.facing,
            character.target_facing,
            self.config.motor.facing_lerp,
        );

        Ok(LocomotionFrame {
            character: character.clone(),
            contact,
            events,
        })
    }
}

/// Split `dt` into equal steps no longer than `max_step`, capped at [`MAX_SUBSTEPS`].
fn substeps(dt: Real, max_step: Real) -> (u32, Real) {
    if !dt.is_finite() || dt <= 0.0 {
        return (1, 0.0);
    }
    if !(max_step.is_finite() && max_step > 0.0) || dt <= max_step {
        return (1, dt);
    }
    let count = (dt / max_step).ceil();
    if count > MAX_SUBSTEPS as Real {
        log::debug!(
            "tick of {:.3}s exceeds {} steps; dropping {:.3}s",
            dt,
            MAX_SUBSTEPS,
            dt - max_step * MAX_SUBSTEPS as Real
        );
        return (MAX_SUBSTEPS, max_step);
    }
    let count = count as u32;
    (count, dt / count as Real)
}

fn respawn_spawned(spawned: &mut Spawned) {
    let character = &mut spawned.character;
    character.velocity = Vector::zeros();
    character.position = character.spawn_position;
    character.grounded = false;
    spawned.capsule.reset_to_feet(character.spawn_position);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rapier3d::prelude::*;

    const DT: Real = 1.0 / 60.0;

    fn floor_index() -> CollisionIndex {
        let floor = ColliderBuilder::cuboid(20.0, 0.5, 20.0)
            .translation(vector![0.0, -0.5, 0.0])
            .build();
        CollisionIndex::build([floor])
    }

    fn spawned_controller(config: ControllerConfig, spawn: Point<Real>) -> PlayerController {
        let mut controller = PlayerController::new(config);
        controller.spawn(spawn, 0.0);
        controller
    }

    fn settle(controller: &mut PlayerController, index: &CollisionIndex) -> Vec<LocomotionEvent> {
        let input = InputSnapshot::new();
        let mut events = Vec::new();
        for _ in 0..120 {
            let frame = controller.tick(index, &input, false, DT).expect("ready");
            events.extend(frame.events);
        }
        events
    }

    #[test]
    fn tick_before_spawn_is_not_ready() {
        let mut controller = PlayerController::new(ControllerConfig::default());
        let index = floor_index();
        let result = controller.tick(&index, &InputSnapshot::new(), false, DT);
        assert_eq!(result.err(), Some(ControllerError::NotReady));
        assert_eq!(controller.respawn(), Err(ControllerError::NotReady));
    }

    #[test]
    fn falls_and_lands_once() {
        let index = floor_index();
        let mut controller = spawned_controller(ControllerConfig::default(), point![0.0, 2.0, 0.0]);
        let events = settle(&mut controller, &index);
        let landings = events
            .iter()
            .filter(|event| **event == LocomotionEvent::Landed)
            .count();
        assert_eq!(landings, 1);
        let character = controller.character().expect("character");
        assert!(character.grounded);
        assert_on_floor(character.position.y, &index);
        assert_abs_diff_eq!(character.velocity.y, 0.0);
    }

    fn assert_on_floor(feet: Real, index: &CollisionIndex) {
        assert!(
            feet >= -1.0e-3 && feet <= index.contact_skin() + 1.0e-3,
            "feet at {feet}"
        );
    }

    #[test]
    fn idle_at_high_frame_rate_lands_exactly_once() {
        let index = floor_index();
        let mut controller = spawned_controller(ControllerConfig::default(), point![0.0, 1.0, 0.0]);
        let input = InputSnapshot::new();
        let mut landings = 0;
        for _ in 0..600 {
            let frame = controller.tick(&index, &input, false, 1.0 / 144.0).expect("ready");
            for event in frame.events {
                match event {
                    LocomotionEvent::Landed => landings += 1,
                    other => panic!("unexpected {other:?}"),
                }
            }
        }
        assert_eq!(landings, 1);
        let character = controller.character().expect("character");
        assert!(character.grounded);
        assert_on_floor(character.position.y, &index);
    }

    #[test]
    fn one_second_tick_does_not_tunnel_through_floor() {
        let index = floor_index();
        let mut controller = spawned_controller(ControllerConfig::default(), point![0.0, 0.0, 0.0]);
        settle(&mut controller, &index);
        let input = InputSnapshot::new();
        let frame = controller.tick(&index, &input, false, 1.0).expect("ready");
        assert!(!frame.events.contains(&LocomotionEvent::Respawned));
        assert!(frame.character.grounded);
        assert_on_floor(frame.character.position.y, &index);

        let mut dropped = spawned_controller(ControllerConfig::default(), point![0.0, 2.0, 0.0]);
        for _ in 0..4 {
            let frame = dropped.tick(&index, &input, false, 1.0).expect("ready");
            assert!(!frame.events.contains(&LocomotionEvent::Respawned));
        }
        let character = dropped.character().expect("character");
        assert!(character.grounded);
        assert_on_floor(character.position.y, &index);
    }

    #[test]
    fn long_ticks_are_split_and_capped() {
        assert_eq!(substeps(1.0 / 60.0, 1.0 / 30.0), (1, 1.0 / 60.0));
        let (count, step) = substeps(0.05, 1.0 / 30.0);
        assert_eq!(count, 2);
        assert_abs_diff_eq!(step, 0.025, epsilon = 1.0e-6);
        assert_eq!(substeps(1.0, 1.0 / 30.0), (MAX_SUBSTEPS, 1.0 / 30.0));
        assert_eq!(substeps(Real::NAN, 1.0 / 30.0), (1, 0.0));
        assert_eq!(substeps(-1.0, 1.0 / 30.0), (1, 0.0));
    }

    #[test]
    fn holding_a_direction_hops_forward() {
        let index = floor_index();
        let mut controller = spawned_controller(ControllerConfig::default(), point![0.0, 0.0, 0.0]);
        settle(&mut controller, &index);

        let mut input = InputSnapshot::new();
        input.key_down("d");
        let mut took_off = 0;
        let mut landed = 0;
        let mut max_height: Real = 0.0;
        for _ in 0..120 {
            let frame = controller.tick(&index, &input, false, DT).expect("ready");
            for event in frame.events {
                match event {
                    LocomotionEvent::TookOff => took_off += 1,
                    LocomotionEvent::Landed => landed += 1,
                    LocomotionEvent::Respawned => panic!("unexpected respawn"),
                }
            }
            max_height = max_height.max(frame.character.position.y);
            input.end_frame();
        }
        let character = controller.character().expect("character");
        assert!(took_off >= 2);
        assert!(landed + 1 >= took_off);
        assert_eq!(controller.hop_count(), took_off);
        assert!(max_height > 0.3);
        assert!(character.position.x > 2.0);
        assert!(character.facing > 1.0);
    }

    #[test]
    fn frozen_gate_changes_nothing() {
        let index = floor_index();
        let mut controller = spawned_controller(ControllerConfig::default(), point![0.0, 3.0, 0.0]);
        let mut input = InputSnapshot::new();
        input.key_down("w");
        let before = controller.character().cloned().expect("character");
        for _ in 0..30 {
            let frame = controller.tick(&index, &input, true, DT).expect("ready");
            assert!(frame.events.is_empty());
        }
        assert_eq!(controller.character(), Some(&before));
    }

    #[test]
    fn gravity_only_gate_still_falls_without_moving() {
        let index = floor_index();
        let config = ControllerConfig {
            gate_policy: GatePolicy::GravityOnly,
            ..ControllerConfig::default()
        };
        let mut controller = spawned_controller(config, point![0.0, 3.0, 0.0]);
        let mut input = InputSnapshot::new();
        input.key_down("d");
        for _ in 0..30 {
            controller.tick(&index, &input, true, DT).expect("ready");
        }
        let character = controller.character().expect("character");
        assert!(character.position.y < 3.0);
        assert_abs_diff_eq!(character.position.x, 0.0, epsilon = 1.0e-4);
        assert_eq!(controller.hop_count(), 0);
    }

    #[test]
    fn respawn_is_idempotent() {
        let index = floor_index();
        let mut controller = spawned_controller(ControllerConfig::default(), point![1.0, 0.5, -2.0]);
        let mut input = InputSnapshot::new();
        input.key_down("a");
        for _ in 0..40 {
            controller.tick(&index, &input, false, DT).expect("ready");
        }
        controller.respawn().expect("ready");
        let once = controller.character().cloned().expect("character");
        let capsule_once = *controller.capsule().expect("capsule");
        controller.respawn().expect("ready");
        assert_eq!(controller.character(), Some(&once));
        assert_eq!(controller.capsule(), Some(&capsule_once));
        assert_eq!(once.velocity, Vector::zeros());
        assert_eq!(once.position, once.spawn_position);
    }

    #[test]
    fn falling_out_of_world_respawns() {
        let index = CollisionIndex::build(Vec::new());
        let config = ControllerConfig {
            fall_threshold: -2.0,
            ..ControllerConfig::default()
        };
        let mut controller = spawned_controller(config, point![0.0, 1.0, 0.0]);
        let input = InputSnapshot::new();
        let mut respawned = false;
        for _ in 0..120 {
            let frame = controller.tick(&index, &input, false, DT).expect("ready");
            if frame.events.contains(&LocomotionEvent::Respawned) {
                respawned = true;
                assert_eq!(frame.character.position, point![0.0, 1.0, 0.0]);
                assert_eq!(frame.character.velocity, Vector::zeros());
                break;
            }
        }
        assert!(respawned);
    }

    #[test]
    fn respawn_key_is_edge_triggered() {
        let index = floor_index();
        let mut controller = spawned_controller(ControllerConfig::default(), point![0.0, 0.0, 0.0]);
        let mut input = InputSnapshot::new();
        input.key_down("r");
        let frame = controller.tick(&index, &input, false, DT).expect("ready");
        assert_eq!(frame.events, vec![LocomotionEvent::Respawned]);
        input.end_frame();
        let frame = controller.tick(&index, &input, false, DT).expect("ready");
        assert!(!frame.events.contains(&LocomotionEvent::Respawned));
    }
}

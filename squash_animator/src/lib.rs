//! Squash-and-stretch sequences for the character and hotspots, driven by a cooperative tween
//! scheduler stepped with the frame's delta time.
#![forbid(unsafe_code)]

mod easing;
mod tween;

pub use easing::Easing;
pub use tween::{Field, Keyframe, Tweens, VisualPose};

use std::collections::BTreeSet;

use rapier3d::prelude::Real;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnimTarget {
    Character,
    Hotspot(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sequence {
    Takeoff,
    Landing,
    Bounce,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub target: AnimTarget,
    pub sequence: Sequence,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnimatorError {
    #[error("hotspot `{0}` is already bouncing")]
    ConcurrentBounceRejected(String),
}

/// Shapes and timings of the three sequences. Durations are in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationConfig {
    /// Vertical scale at the bottom of a squash.
    pub squash_y: Real,
    /// Horizontal scale at the bottom of a squash.
    pub squash_xz: Real,
    pub stretch_y: Real,
    pub stretch_xz: Real,
    pub squash_duration: Real,
    pub stretch_duration: Real,
    pub settle_duration: Real,
    /// Peak vertical offset of a hotspot bounce.
    pub bounce_height: Real,
    pub bounce_rise_duration: Real,
    pub bounce_fall_duration: Real,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            squash_y: 0.8,
            squash_xz: 1.2,
            stretch_y: 1.2,
            stretch_xz: 0.85,
            squash_duration: 0.08,
            stretch_duration: 0.1,
            settle_duration: 0.2,
            bounce_height: 0.6,
            bounce_rise_duration: 0.15,
            bounce_fall_duration: 0.35,
        }
    }
}

impl AnimationConfig {
    pub fn takeoff_steps(&self) -> Vec<Keyframe> {
        vec![
            self.squash(),
            self.stretch(),
            Keyframe::new(self.settle_duration, Easing::BackOut).scale(1.0, 1.0),
        ]
    }

    pub fn landing_steps(&self) -> Vec<Keyframe> {
        vec![
            self.squash(),
            Keyframe::new(self.settle_duration, Easing::BackOut).scale(1.0, 1.0),
        ]
    }

    pub fn bounce_steps(&self) -> Vec<Keyframe> {
        vec![
            self.squash(),
            self.stretch(),
            Keyframe::new(self.bounce_rise_duration, Easing::QuadOut)
                .to(Field::OffsetY, self.bounce_height),
            Keyframe::new(self.bounce_fall_duration, Easing::BounceOut)
                .to(Field::OffsetY, 0.0)
                .scale(1.0, 1.0),
        ]
    }

    fn squash(&self) -> Keyframe {
        Keyframe::new(self.squash_duration, Easing::QuadOut).scale(self.squash_xz, self.squash_y)
    }

    fn stretch(&self) -> Keyframe {
        Keyframe::new(self.stretch_duration, Easing::QuadOut).scale(self.stretch_xz, self.stretch_y)
    }
}

pub struct SquashAnimator {
    config: AnimationConfig,
    tweens: Tweens<AnimTarget, Sequence>,
    bouncing: BTreeSet<String>,
}

impl SquashAnimator {
    pub fn new(config: AnimationConfig) -> Self {
        Self {
            config,
            tweens: Tweens::new(),
            bouncing: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    pub fn on_takeoff(&mut self, target: AnimTarget) {
        self.restart(target, self.config.takeoff_steps(), Sequence::Takeoff);
    }

    pub fn on_landing(&mut self, target: AnimTarget) {
        self.restart(target, self.config.landing_steps(), Sequence::Landing);
    }

    /// Start a bounce on a hotspot unless one is already running there.
    pub fn on_hotspot_bounce(&mut self, id: &str) -> Result<(), AnimatorError> {
        if self.bouncing.contains(id) {
            log::debug!("bounce on `{id}` rejected: already bouncing");
            return Err(AnimatorError::ConcurrentBounceRejected(id.to_string()));
        }
        self.bouncing.insert(id.to_string());
        self.restart(
            AnimTarget::Hotspot(id.to_string()),
            self.config.bounce_steps(),
            Sequence::Bounce,
        );
        Ok(())
    }

    pub fn is_bouncing(&self, id: &str) -> bool {
        self.bouncing.contains(id)
    }

    pub fn is_animating(&self, target: &AnimTarget) -> bool {
        self.tweens.is_active(target)
    }

    /// Cancel whatever is running on `target` and restore its rest pose. Idempotent.
    pub fn cancel(&mut self, target: &AnimTarget) {
        if self.tweens.cancel(target) {
            log::trace!("cancelled tween on {target:?}");
        }
        if let AnimTarget::Hotspot(id) = target {
            self.bouncing.remove(id);
        }
    }

    pub fn pose(&self, target: &AnimTarget) -> VisualPose {
        self.tweens.pose(target)
    }

    pub fn advance(&mut self, dt: Real) -> Vec<Completion> {
        let finished = self.tweens.advance(dt);
        let mut completions = Vec::with_capacity(finished.len());
        for (target, sequence) in finished {
            if let (Sequence::Bounce, AnimTarget::Hotspot(id)) = (sequence, &target) {
                self.bouncing.remove(id);
            }
            completions.push(Completion { target, sequence });
        }
        completions
    }

    fn restart(&mut self, target: AnimTarget, steps: Vec<Keyframe>, sequence: Sequence) {
        self.tweens.cancel(&target);
        self.tweens.schedule(target, steps, sequence);
    }
}

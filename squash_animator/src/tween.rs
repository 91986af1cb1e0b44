use std::collections::{BTreeMap, VecDeque};

use rapier3d::math::Vector;
use rapier3d::prelude::Real;

use crate::easing::Easing;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    ScaleX,
    ScaleY,
    ScaleZ,
    OffsetY,
}

/// Visual transform owned by the animator: scale and a vertical offset on top of the physics pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualPose {
    pub scale: Vector<Real>,
    pub offset_y: Real,
}

impl Default for VisualPose {
    fn default() -> Self {
        Self {
            scale: Vector::repeat(1.0),
            offset_y: 0.0,
        }
    }
}

impl VisualPose {
    pub fn get(&self, field: Field) -> Real {
        match field {
            Field::ScaleX => self.scale.x,
            Field::ScaleY => self.scale.y,
            Field::ScaleZ => self.scale.z,
            Field::OffsetY => self.offset_y,
        }
    }

    pub fn set(&mut self, field: Field, value: Real) {
        match field {
            Field::ScaleX => self.scale.x = value,
            Field::ScaleY => self.scale.y = value,
            Field::ScaleZ => self.scale.z = value,
            Field::OffsetY => self.offset_y = value,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub fields: Vec<(Field, Real)>,
    pub duration: Real,
    pub easing: Easing,
}

impl Keyframe {
    pub fn new(duration: Real, easing: Easing) -> Self {
        Self {
            fields: Vec::new(),
            duration,
            easing,
        }
    }

    pub fn to(mut self, field: Field, value: Real) -> Self {
        self.fields.push((field, value));
        self
    }

    /// Uniform horizontal scale `xz` and vertical scale `y`.
    pub fn scale(self, xz: Real, y: Real) -> Self {
        self.to(Field::ScaleX, xz)
            .to(Field::ScaleY, y)
            .to(Field::ScaleZ, xz)
    }
}

struct Track<T> {
    steps: VecDeque<Keyframe>,
    from: Vec<Real>,
    elapsed: Real,
    tag: T,
}

/// Cooperative keyframe scheduler keyed by target. One sequence per target; scheduling a new
/// sequence replaces the old one.
pub struct Tweens<K: Ord + Clone, T: Copy> {
    tracks: BTreeMap<K, Track<T>>,
    poses: BTreeMap<K, VisualPose>,
}

impl<K: Ord + Clone, T: Copy> Default for Tweens<K, T> {
    fn default() -> Self {
        Self {
            tracks: BTreeMap::new(),
            poses: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, T: Copy> Tweens<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, target: K, steps: Vec<Keyframe>, tag: T) {
        let pose = self.poses.entry(target.clone()).or_default();
        let steps: VecDeque<Keyframe> = steps.into();
        let from = steps
            .front()
            .map(|step| capture_from(pose, step))
            .unwrap_or_default();
        self.tracks.insert(
            target,
            Track {
                steps,
                from,
                elapsed: 0.0,
                tag,
            },
        );
    }

    /// Drop any pending sequence and restore the rest pose. Safe when nothing is active.
    pub fn cancel(&mut self, target: &K) -> bool {
        let cancelled = self.tracks.remove(target).is_some();
        if let Some(pose) = self.poses.get_mut(target) {
            *pose = VisualPose::default();
        }
        cancelled
    }

    pub fn is_active(&self, target: &K) -> bool {
        self.tracks.contains_key(target)
    }

    pub fn pose(&self, target: &K) -> VisualPose {
        self.poses.get(target).copied().unwrap_or_default()
    }

    /// Step every track by `dt`. Returns the targets whose sequence finished during this call.
    pub fn advance(&mut self, dt: Real) -> Vec<(K, T)> {
        let dt = dt.max(0.0);
        let mut finished = Vec::new();
        for (target, track) in self.tracks.iter_mut() {
            let pose = self.poses.entry(target.clone()).or_default();
            if advance_track(track, pose, dt) {
                finished.push((target.clone(), track.tag));
            }
        }
        for (target, _) in &finished {
            self.tracks.remove(target);
        }
        finished
    }
}

fn capture_from(pose: &VisualPose, step: &Keyframe) -> Vec<Real> {
    step.fields.iter().map(|(field, _)| pose.get(*field)).collect()
}

/// Returns true once the last step has been applied.
fn advance_track<T>(track: &mut Track<T>, pose: &mut VisualPose, dt: Real) -> bool {
    let mut remaining = dt;
    loop {
        let Some(step) = track.steps.front() else {
            return true;
        };
        let left = step.duration - track.elapsed;
        if step.duration <= 0.0 || remaining >= left {
            for (field, end) in &step.fields {
                pose.set(*field, *end);
            }
            remaining -= left.max(0.0);
            track.steps.pop_front();
            track.elapsed = 0.0;
            match track.steps.front() {
                Some(next) => track.from = capture_from(pose, next),
                None => return true,
            }
            continue;
        }
        track.elapsed += remaining;
        let progress = step.easing.apply(track.elapsed / step.duration);
        for ((field, end), start) in step.fields.iter().zip(track.from.iter()) {
            pose.set(*field, start + (end - start) * progress);
        }
        return false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn steps_run_in_order_and_complete_once() {
        let mut tweens: Tweens<u32, ()> = Tweens::new();
        tweens.schedule(
            1,
            vec![
                Keyframe::new(0.1, Easing::Linear).to(Field::OffsetY, 1.0),
                Keyframe::new(0.1, Easing::Linear).to(Field::OffsetY, 0.0),
            ],
            (),
        );
        assert!(tweens.advance(0.05).is_empty());
        assert_abs_diff_eq!(tweens.pose(&1).offset_y, 0.5, epsilon = 1.0e-5);
        assert!(tweens.advance(0.1).is_empty());
        assert_abs_diff_eq!(tweens.pose(&1).offset_y, 0.5, epsilon = 1.0e-4);
        assert_eq!(tweens.advance(0.1), vec![(1, ())]);
        assert_eq!(tweens.pose(&1).offset_y, 0.0);
        assert!(tweens.advance(0.1).is_empty());
        assert!(!tweens.is_active(&1));
    }

    #[test]
    fn large_step_finishes_whole_sequence() {
        let mut tweens: Tweens<u32, u8> = Tweens::new();
        tweens.schedule(
            3,
            vec![
                Keyframe::new(0.1, Easing::QuadOut).scale(1.2, 0.8),
                Keyframe::new(0.2, Easing::BackOut).scale(1.0, 1.0),
            ],
            7,
        );
        assert_eq!(tweens.advance(5.0), vec![(3, 7)]);
        assert_eq!(tweens.pose(&3), VisualPose::default());
    }

    #[test]
    fn cancel_is_idempotent_and_resets_pose() {
        let mut tweens: Tweens<u32, ()> = Tweens::new();
        tweens.schedule(
            2,
            vec![Keyframe::new(1.0, Easing::Linear).scale(2.0, 2.0)],
            (),
        );
        tweens.advance(0.5);
        assert!(tweens.pose(&2).scale.x > 1.0);
        assert!(tweens.cancel(&2));
        assert!(!tweens.cancel(&2));
        assert!(!tweens.cancel(&9));
        assert_eq!(tweens.pose(&2), VisualPose::default());
        assert!(tweens.advance(1.0).is_empty());
    }
}

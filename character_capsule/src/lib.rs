//! Capsule body for the hop character and its resolution against the collision index.
//!
//! The body is a vertical segment (`start` below `end`) plus a radius. Its height never changes;
//! callers only translate it and let [`CapsuleBody::resolve`] push it out of terrain.
#![forbid(unsafe_code)]

use collision_index::{CollisionIndex, Contact};
use rapier3d::math::{Point, Vector};
use rapier3d::prelude::{Capsule, Real};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapsuleProfile {
    /// Capsule radius in meters.
    pub radius: Real,
    /// Distance between the two sphere centers in meters.
    pub height: Real,
    /// A resolved contact counts as ground when its normal's y exceeds this.
    pub ground_normal_min_y: Real,
    /// Extra reach of the downward support probe below the lower sphere.
    pub support_probe_distance: Real,
    /// Minimum normal y a probed surface needs to count as support.
    pub support_normal_min_y: Real,
}

impl Default for CapsuleProfile {
    fn default() -> Self {
        Self {
            radius: 0.35,
            height: 0.7,
            ground_normal_min_y: 0.0,
            support_probe_distance: 0.05,
            support_normal_min_y: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapsuleResolve {
    pub contact: Option<Contact>,
    pub correction: Vector<Real>,
    pub grounded: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapsuleBody {
    start: Point<Real>,
    end: Point<Real>,
    radius: Real,
}

impl CapsuleBody {
    /// Place a capsule whose lowest point touches `feet`.
    pub fn at_feet(feet: Point<Real>, profile: &CapsuleProfile) -> Self {
        let radius = profile.radius.max(0.0);
        let start = feet + Vector::y() * radius;
        Self {
            start,
            end: start + Vector::y() * profile.height.max(0.0),
            radius,
        }
    }

    pub fn start(&self) -> Point<Real> {
        self.start
    }

    pub fn end(&self) -> Point<Real> {
        self.end
    }

    pub fn radius(&self) -> Real {
        self.radius
    }

    pub fn height(&self) -> Real {
        self.end.y - self.start.y
    }

    /// Lowest point of the capsule: the lower endpoint minus the radius.
    pub fn feet(&self) -> Point<Real> {
        self.start - Vector::y() * self.radius
    }

    pub fn translate(&mut self, delta: Vector<Real>) {
        self.start += delta;
        self.end += delta;
    }

    pub fn reset_to_feet(&mut self, feet: Point<Real>) {
        let delta = feet - self.feet();
        self.translate(delta);
    }

    pub fn shape(&self) -> Capsule {
        Capsule::new(self.start, self.end, self.radius)
    }

    /// Query the index and translate out of any penetration.
    ///
    /// Ground comes from an upward-facing contact or, failing that, a downward support ray below the
    /// capsule, so a body resting just outside the contact skin stays grounded.
    pub fn resolve(&mut self, index: &CollisionIndex, profile: &CapsuleProfile) -> CapsuleResolve {
        let contact = index.sweep_capsule(&self.shape());
        let correction = contact.map_or(Vector::zeros(), |contact| {
            contact.normal * contact.depth.max(0.0)
        });
        self.translate(correction);
        let grounded = contact.is_some_and(|contact| contact.normal.y > profile.ground_normal_min_y)
            || self.supported(index, profile);
        CapsuleResolve {
            contact,
            correction,
            grounded,
        }
    }

    /// Sweep by `desired` through the index, then resolve whatever overlap remains.
    ///
    /// A rising move is never grounded. When the resolve finds nothing within the skin, the
    /// surface the sweep stopped against is reported as a zero-depth contact.
    pub fn move_and_resolve(
        &mut self,
        index: &CollisionIndex,
        profile: &CapsuleProfile,
        desired: Vector<Real>,
        dt: Real,
    ) -> CapsuleResolve {
        let step = index.move_capsule(&self.shape(), desired, dt);
        self.translate(step.translation);
        let mut resolved = self.resolve(index, profile);
        if resolved.contact.is_none() {
            resolved.contact = step.hit_normal.map(|normal| Contact { normal, depth: 0.0 });
        }
        if desired.y > 0.0 {
            resolved.grounded = false;
        } else {
            resolved.grounded |= step.grounded;
        }
        resolved
    }

    fn supported(&self, index: &CollisionIndex, profile: &CapsuleProfile) -> bool {
        index.has_support_below(
            &self.shape(),
            profile.support_probe_distance,
            profile.support_normal_min_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rapier3d::prelude::*;

    fn floor_index() -> CollisionIndex {
        CollisionIndex::build([ColliderBuilder::halfspace(Vector::y_axis()).build()])
    }

    fn box_floor_index() -> CollisionIndex {
        let floor = ColliderBuilder::cuboid(20.0, 0.5, 20.0)
            .translation(vector![0.0, -0.5, 0.0])
            .build();
        CollisionIndex::build([floor])
    }

    #[test]
    fn falling_capsule_settles_on_floor_in_one_resolve() {
        let index = floor_index();
        let profile = CapsuleProfile::default();
        let mut body = CapsuleBody::at_feet(point![0.0, 0.5, 0.0], &profile);
        body.translate(vector![0.0, -0.8, 0.0]);

        let result = body.resolve(&index, &profile);

        let contact = result.contact.expect("floor contact");
        assert_abs_diff_eq!(contact.normal, Vector::y(), epsilon = 1.0e-4);
        assert!(result.grounded);
        assert_abs_diff_eq!(body.feet().y, 0.0, epsilon = 1.0e-4);
        assert_abs_diff_eq!(body.start().y, profile.radius, epsilon = 1.0e-4);
    }

    #[test]
    fn height_is_fixed_through_translation_and_resolution() {
        let index = floor_index();
        let profile = CapsuleProfile::default();
        let mut body = CapsuleBody::at_feet(point![1.0, 2.0, -1.0], &profile);
        body.translate(vector![0.3, -2.4, 0.1]);
        body.resolve(&index, &profile);
        body.reset_to_feet(point![0.0, 5.0, 0.0]);
        assert_abs_diff_eq!(body.height(), profile.height, epsilon = 1.0e-5);
        assert_abs_diff_eq!(body.feet().y, 5.0, epsilon = 1.0e-5);
    }

    #[test]
    fn airborne_capsule_is_not_grounded() {
        let index = floor_index();
        let profile = CapsuleProfile::default();
        let mut body = CapsuleBody::at_feet(point![0.0, 3.0, 0.0], &profile);
        let result = body.resolve(&index, &profile);
        assert!(result.contact.is_none());
        assert!(!result.grounded);
        assert_eq!(body.feet().y, 3.0);
    }

    #[test]
    fn wall_contact_in_the_air_is_not_ground() {
        let wall = ColliderBuilder::cuboid(0.5, 10.0, 10.0)
            .translation(vector![1.0, 0.0, 0.0])
            .build();
        let index = CollisionIndex::build([wall]);
        let profile = CapsuleProfile::default();
        let mut body = CapsuleBody::at_feet(point![0.2, 3.0, 0.0], &profile);
        let result = body.resolve(&index, &profile);
        let contact = result.contact.expect("wall contact");
        assert!(contact.normal.x < -0.99);
        assert!(!result.grounded);
        assert!(body.start().x + profile.radius <= 0.5 + 1.0e-4);
    }

    #[test]
    fn sunk_capsule_is_lifted_out_of_box_floor() {
        let index = box_floor_index();
        let profile = CapsuleProfile::default();
        let mut body = CapsuleBody::at_feet(point![0.0, -0.45, 0.0], &profile);
        let result = body.resolve(&index, &profile);
        let contact = result.contact.expect("floor contact");
        assert!(contact.normal.y > 0.99);
        assert!(result.grounded);
        assert_abs_diff_eq!(body.feet().y, 0.0, epsilon = 1.0e-3);
    }

    #[test]
    fn large_drop_onto_box_floor_round_trips_to_surface() {
        let index = box_floor_index();
        let profile = CapsuleProfile::default();
        for drop in [0.8, 3.0, 12.0] {
            let mut body = CapsuleBody::at_feet(point![0.0, 0.5, 0.0], &profile);
            let result = body.move_and_resolve(&index, &profile, vector![0.0, -drop, 0.0], 1.0 / 60.0);
            let feet = body.feet().y;
            assert!(
                feet >= -1.0e-3 && feet <= index.contact_skin() + 1.0e-3,
                "feet at {feet} after drop {drop}"
            );
            assert!(result.grounded);
            let contact = result.contact.expect("floor contact");
            assert!(contact.normal.y > 0.99);
        }
    }

    #[test]
    fn resting_just_outside_the_skin_stays_grounded() {
        let index = box_floor_index();
        let profile = CapsuleProfile::default();
        let mut body = CapsuleBody::at_feet(point![0.0, 0.04, 0.0], &profile);
        let result = body.resolve(&index, &profile);
        assert!(result.contact.is_none());
        assert!(result.grounded);
        assert_eq!(body.feet().y, 0.04);
    }

    #[test]
    fn hop_off_box_floor_is_not_grounded() {
        let index = box_floor_index();
        let profile = CapsuleProfile::default();
        let mut body = CapsuleBody::at_feet(point![0.0, 0.0, 0.0], &profile);
        let result = body.move_and_resolve(&index, &profile, vector![0.0, 0.1, 0.0], 1.0 / 60.0);
        assert!(!result.grounded);
        assert!(body.feet().y > 0.09);
    }
}

//! Static collision index over scene geometry (capsule sweeps and ray picks).
//!
//! The index is built once from a list of colliders and never mutated afterwards. Colliders are
//! inserted without parent bodies; `user_data` is left to the caller (the picking layer stores a
//! group index there).
#![forbid(unsafe_code)]

use rapier3d::control::{CharacterLength, KinematicCharacterController};
use rapier3d::parry::bounding_volume::BoundingVolume;
use rapier3d::parry::query::{self, PointQuery};
use rapier3d::prelude::*;

/// Distance within which a separated surface still counts as a contact.
pub const DEFAULT_CONTACT_SKIN: Real = 0.02;

/// Contacts whose normals are closer than this (dot product) are merged instead of summed.
const MERGE_NORMAL_DOT: Real = 0.99;
const EPS_SQ: Real = 1.0e-12;

/// Ground within this distance below a capsule that is not rising pulls it down onto the surface.
pub const GROUND_SNAP_DISTANCE: Real = 0.1;
/// Smallest clearance the mover keeps from surfaces.
const MIN_MOVE_OFFSET: Real = 1.0e-3;

/// Resolution for a capsule overlapping the index.
///
/// Translating the capsule by `normal * depth` separates it from every penetrated collider.
/// A `depth` of zero means the capsule only touches geometry within the contact skin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub normal: Vector<Real>,
    pub depth: Real,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub collider: ColliderHandle,
    pub user_data: u128,
    pub toi: Real,
    pub point: Point<Real>,
}

/// Result of [`CollisionIndex::move_capsule`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapsuleMove {
    /// Translation actually applied after stopping and sliding.
    pub translation: Vector<Real>,
    /// Ground under the capsule at the end of a move that was not rising.
    pub grounded: bool,
    /// Most upward-facing surface normal hit during the move.
    pub hit_normal: Option<Vector<Real>>,
}

pub struct CollisionIndex {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    query_pipeline: QueryPipeline,
    contact_skin: Real,
    mover: KinematicCharacterController,
}

impl CollisionIndex {
    pub fn build(geometry: impl IntoIterator<Item = Collider>) -> Self {
        Self::build_with_skin(geometry, DEFAULT_CONTACT_SKIN)
    }

    pub fn build_with_skin(geometry: impl IntoIterator<Item = Collider>, contact_skin: Real) -> Self {
        let mut colliders = ColliderSet::new();
        for collider in geometry {
            colliders.insert(collider);
        }
        let mut query_pipeline = QueryPipeline::new();
        query_pipeline.update(&colliders);
        let contact_skin = contact_skin.max(0.0);
        let mover = KinematicCharacterController {
            offset: CharacterLength::Absolute((contact_skin * 0.5).max(MIN_MOVE_OFFSET)),
            autostep: None,
            snap_to_ground: Some(CharacterLength::Absolute(GROUND_SNAP_DISTANCE)),
            ..KinematicCharacterController::default()
        };
        log::debug!(
            "collision index built ({} colliders, skin {:.3})",
            colliders.len(),
            contact_skin
        );
        Self {
            bodies: RigidBodySet::new(),
            colliders,
            query_pipeline,
            contact_skin,
            mover,
        }
    }

    pub fn contact_skin(&self) -> Real {
        self.contact_skin
    }

    pub fn colliders(&self) -> &ColliderSet {
        &self.colliders
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Test a world-space capsule against the index.
    ///
    /// Distances are measured from the capsule's core segment, so the depth stays meaningful
    /// until the segment itself enters a solid. Returns `None` when nothing lies within the
    /// contact skin.
    pub fn sweep_capsule(&self, capsule: &Capsule) -> Option<Contact> {
        let skin = self.contact_skin;
        let mut penetrations: Vec<(Vector<Real>, Real)> = Vec::new();
        let mut touching = Vector::zeros();
        let mut touched = false;

        let bounds = capsule.aabb(&Isometry::identity()).loosened(skin);
        self.query_pipeline
            .colliders_with_aabb_intersecting_aabb(&bounds, |handle| {
                let Some(collider) = self.colliders.get(*handle) else {
                    return true;
                };
                let Some((normal, depth)) = segment_penetration(capsule, collider, skin) else {
                    return true;
                };
                touched = true;
                if depth > 0.0 {
                    merge_penetration(&mut penetrations, normal, depth);
                } else {
                    touching += normal;
                }
                true
            });

        let push = penetrations
            .iter()
            .fold(Vector::zeros(), |acc, (normal, depth)| acc + normal * *depth);
        if push.norm_squared() > EPS_SQ {
            let depth = push.norm();
            return Some(Contact {
                normal: push / depth,
                depth,
            });
        }
        if !touched {
            return None;
        }
        let normal = if touching.norm_squared() > EPS_SQ {
            touching.normalize()
        } else {
            Vector::y()
        };
        Some(Contact { normal, depth: 0.0 })
    }

    /// Move a world-space capsule by `desired`, stopping and sliding at terrain.
    ///
    /// The capsule stops half the contact skin short of surfaces it runs into, and is snapped
    /// down onto ground within [`GROUND_SNAP_DISTANCE`] unless it is moving up.
    pub fn move_capsule(&self, capsule: &Capsule, desired: Vector<Real>, dt: Real) -> CapsuleMove {
        let mut controller = self.mover;
        let rising = desired.y > 0.0;
        if rising {
            controller.snap_to_ground = None;
        }
        let mut hit_normal: Option<Vector<Real>> = None;
        let mut best_up = Real::MIN;
        let output = controller.move_shape(
            dt.max(0.0),
            &self.bodies,
            &self.colliders,
            &self.query_pipeline,
            capsule,
            &Isometry::identity(),
            desired,
            QueryFilter::default(),
            |collision| {
                let normal = collision.hit.normal1.into_inner();
                if normal.y > best_up {
                    best_up = normal.y;
                    hit_normal = Some(normal);
                }
            },
        );
        CapsuleMove {
            translation: output.translation,
            grounded: output.grounded && !rising,
            hit_normal,
        }
    }

    /// Probe straight down from the capsule's lower sphere for walkable support.
    pub fn has_support_below(&self, capsule: &Capsule, distance: Real, min_normal_y: Real) -> bool {
        let foot = if capsule.segment.a.y <= capsule.segment.b.y {
            capsule.segment.a
        } else {
            capsule.segment.b
        };
        let ray = Ray::new(foot, -Vector::y());
        let max_toi = capsule.radius + distance.max(0.0) + self.contact_skin;
        let hit = self
            .query_pipeline
            .cast_ray_and_get_normal(
                &self.bodies,
                &self.colliders,
                &ray,
                max_toi,
                true,
                QueryFilter::default(),
            )
            .or_else(|| {
                self.query_pipeline.cast_ray_and_get_normal(
                    &self.bodies,
                    &self.colliders,
                    &ray,
                    max_toi,
                    false,
                    QueryFilter::default(),
                )
            });
        match hit {
            Some((_, intersection)) => intersection.normal.y >= min_normal_y,
            None => false,
        }
    }

    /// Nearest hit along a ray, reporting the hit collider's `user_data`.
    pub fn cast_ray(
        &self,
        origin: Point<Real>,
        direction: Vector<Real>,
        max_toi: Real,
    ) -> Option<RayHit> {
        if direction.norm_squared() <= EPS_SQ {
            return None;
        }
        let ray = Ray::new(origin, direction.normalize());
        let (handle, toi) = self.query_pipeline.cast_ray(
            &self.bodies,
            &self.colliders,
            &ray,
            max_toi,
            true,
            QueryFilter::default(),
        )?;
        let collider = self.colliders.get(handle)?;
        Some(RayHit {
            collider: handle,
            user_data: collider.user_data,
            toi,
            point: ray.point_at(toi),
        })
    }
}

/// Separation of a capsule from one collider as `(outward normal, depth)`; negative depth is a
/// gap still inside the skin.
fn segment_penetration(
    capsule: &Capsule,
    collider: &Collider,
    skin: Real,
) -> Option<(Vector<Real>, Real)> {
    let shape = collider.shape();
    let position = collider.position();
    let segment = &capsule.segment;

    // The core is inside the solid: push the deepest endpoint back to the nearest face.
    let mut deepest: Option<(Vector<Real>, Real)> = None;
    for point in [segment.a, segment.b] {
        let projection = shape.project_point(position, &point, false);
        if !projection.is_inside {
            continue;
        }
        let offset = projection.point - point;
        let distance = offset.norm();
        if distance <= EPS_SQ.sqrt() {
            continue;
        }
        let depth = distance + capsule.radius;
        if deepest.map_or(true, |(_, best)| depth > best) {
            deepest = Some((offset / distance, depth));
        }
    }
    if deepest.is_some() {
        return deepest;
    }

    let contact = query::contact(
        &Isometry::identity(),
        segment,
        position,
        shape,
        capsule.radius + skin,
    )
    .ok()??;
    // normal1 points out of the segment; the separating direction is its opposite.
    let normal = -contact.normal1.into_inner();
    Some((normal, capsule.radius - contact.dist.max(0.0)))
}

fn merge_penetration(penetrations: &mut Vec<(Vector<Real>, Real)>, normal: Vector<Real>, depth: Real) {
    for (existing, existing_depth) in penetrations.iter_mut() {
        if existing.dot(&normal) >= MERGE_NORMAL_DOT {
            *existing_depth = existing_depth.max(depth);
            return;
        }
    }
    penetrations.push((normal, depth));
}

use std::collections::BTreeMap;

use collision_index::CollisionIndex;
use rapier3d::math::{Point, Vector};
use rapier3d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier3d::prelude::{Collider, Real};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanelContent {
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Navigable(PanelContent),
    Bouncy,
}

#[derive(Clone, Debug)]
pub struct HotspotDef {
    pub id: String,
    pub classification: Classification,
    /// Pivot at the bottom-center of the group's bounds instead of its center.
    pub foot_anchored: bool,
}

/// A named piece of geometry from the scene; several may belong to one hotspot.
#[derive(Clone)]
pub struct NamedPrimitive {
    pub name: String,
    pub collider: Collider,
}

#[derive(Clone, Debug)]
pub struct HotspotGroup {
    pub id: String,
    pub classification: Classification,
    pub members: Vec<String>,
    pub bounds: Aabb,
    pub pivot: Point<Real>,
}

/// Immutable hotspot table plus a picking index over the hotspot geometry.
pub struct InteractiveRegistry {
    groups: Vec<HotspotGroup>,
    by_id: BTreeMap<String, usize>,
    picking: CollisionIndex,
}

impl InteractiveRegistry {
    pub fn empty() -> Self {
        Self {
            groups: Vec::new(),
            by_id: BTreeMap::new(),
            picking: CollisionIndex::build(Vec::new()),
        }
    }

    /// Partition `primitives` into hotspot groups by name prefix.
    ///
    /// A primitive joins the hotspot with the longest id that equals its name or prefixes it
    /// followed by `_` or `.`. Hotspots without geometry are kept but can never be picked.
    pub fn build(hotspots: Vec<HotspotDef>, primitives: Vec<NamedPrimitive>) -> Self {
        let mut defs: Vec<HotspotDef> = Vec::with_capacity(hotspots.len());
        let mut by_id = BTreeMap::new();
        for def in hotspots {
            if by_id.contains_key(&def.id) {
                log::warn!("duplicate hotspot `{}` ignored", def.id);
                continue;
            }
            by_id.insert(def.id.clone(), defs.len());
            defs.push(def);
        }

        let mut members: Vec<Vec<String>> = vec![Vec::new(); defs.len()];
        let mut bounds: Vec<Option<Aabb>> = vec![None; defs.len()];
        let mut picking_colliders = Vec::new();
        for primitive in primitives {
            let Some(group) = match_group(&defs, &primitive.name) else {
                log::debug!("primitive `{}` matches no hotspot", primitive.name);
                continue;
            };
            let mut collider = primitive.collider;
            collider.user_data = group as u128;
            let aabb = collider.compute_aabb();
            bounds[group] = Some(match bounds[group] {
                Some(existing) => existing.merged(&aabb),
                None => aabb,
            });
            members[group].push(primitive.name);
            picking_colliders.push(collider);
        }

        let groups: Vec<HotspotGroup> = defs
            .into_iter()
            .zip(members)
            .zip(bounds)
            .map(|((def, members), bounds)| {
                if members.is_empty() {
                    log::warn!("hotspot `{}` has no geometry", def.id);
                }
                let bounds = bounds.unwrap_or_else(|| Aabb::new(Point::origin(), Point::origin()));
                let pivot = group_pivot(&bounds, def.foot_anchored);
                HotspotGroup {
                    id: def.id,
                    classification: def.classification,
                    members,
                    bounds,
                    pivot,
                }
            })
            .collect();
        log::info!(
            "registry built ({} hotspots, {} pickable primitives)",
            groups.len(),
            picking_colliders.len()
        );
        Self {
            groups,
            by_id,
            picking: CollisionIndex::build(picking_colliders),
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[HotspotGroup] {
        &self.groups
    }

    pub fn get(&self, id: &str) -> Option<&HotspotGroup> {
        self.by_id.get(id).map(|index| &self.groups[*index])
    }

    pub fn classification(&self, id: &str) -> Option<&Classification> {
        self.get(id).map(|group| &group.classification)
    }

    /// Nearest hotspot group along a ray.
    pub fn pick(
        &self,
        origin: Point<Real>,
        dir: Vector<Real>,
        max_toi: Real,
    ) -> Option<&HotspotGroup> {
        let hit = self.picking.cast_ray(origin, dir, max_toi)?;
        self.groups.get(usize::try_from(hit.user_data).ok()?)
    }
}

fn match_group(defs: &[HotspotDef], name: &str) -> Option<usize> {
    defs.iter()
        .enumerate()
        .filter(|(_, def)| primitive_in_group(name, &def.id))
        .max_by_key(|(_, def)| def.id.len())
        .map(|(index, _)| index)
}

/// Whether a primitive named `name` belongs to hotspot `id`: an exact match, or `id` followed by
/// `_` or `.`.
pub fn primitive_in_group(name: &str, id: &str) -> bool {
    match name.strip_prefix(id) {
        Some("") => true,
        Some(rest) => rest.starts_with('_') || rest.starts_with('.'),
        None => false,
    }
}

fn group_pivot(bounds: &Aabb, foot_anchored: bool) -> Point<Real> {
    let center = bounds.center();
    if foot_anchored {
        Point::new(center.x, bounds.mins.y, center.z)
    } else {
        center
    }
}

use rapier3d::na::UnitQuaternion;
use rapier3d::math::{Isometry, Point, Translation, UnitVector, Vector};
use rapier3d::prelude::{Collider, ColliderBuilder, Real};
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Box,
    Plane,
    Sphere,
    Capsule,
    Cylinder,
    Mesh,
}

/// Geometry shared by terrain solids and hotspot primitives.
///
/// `pos` is the shape center (for planes, a point on the plane). `height` is the full height of a
/// cylinder and the distance between sphere centers of a capsule.
#[derive(Clone, Debug, Deserialize)]
pub struct ShapeSpec {
    pub kind: ShapeKind,
    #[serde(default)]
    pub pos: [f32; 3],
    #[serde(default)]
    pub size: Option<[f32; 3]>,
    #[serde(default)]
    pub radius: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub normal: Option<[f32; 3]>,
    #[serde(default)]
    pub yaw_deg: Option<f32>,
    #[serde(default)]
    pub rot_euler_deg: Option<[f32; 3]>,
    #[serde(default)]
    pub vertices: Vec<[f32; 3]>,
    #[serde(default)]
    pub indices: Vec<[u32; 3]>,
}

impl ShapeSpec {
    /// Reason the shape cannot be built, if any.
    pub fn check(&self) -> Result<(), String> {
        if !vector_is_finite(self.pos) {
            return Err("pos must be finite".to_string());
        }
        match self.kind {
            ShapeKind::Box => {
                let size = self.size.ok_or("box needs size")?;
                if !vector_is_finite(size) || size.iter().any(|value| *value <= 0.0) {
                    return Err("box size must be > 0".to_string());
                }
            }
            ShapeKind::Plane => {
                let normal = self.plane_normal();
                if !vector_is_finite(normal) || normal.iter().all(|value| *value == 0.0) {
                    return Err("plane normal must be non-zero".to_string());
                }
            }
            ShapeKind::Sphere => {
                positive(self.radius, "sphere needs radius > 0")?;
            }
            ShapeKind::Capsule => {
                positive(self.radius, "capsule needs radius > 0")?;
                let height = self.height.unwrap_or(0.0);
                if !height.is_finite() || height < 0.0 {
                    return Err("capsule height must be >= 0".to_string());
                }
            }
            ShapeKind::Cylinder => {
                positive(self.radius, "cylinder needs radius > 0")?;
                positive(self.height, "cylinder needs height > 0")?;
            }
            ShapeKind::Mesh => {
                if self.vertices.is_empty() || self.indices.is_empty() {
                    return Err("mesh needs vertices and indices".to_string());
                }
                if !self.vertices.iter().all(|vertex| vector_is_finite(*vertex)) {
                    return Err("mesh vertices must be finite".to_string());
                }
                let count = self.vertices.len() as u32;
                if self
                    .indices
                    .iter()
                    .flatten()
                    .any(|index| *index >= count)
                {
                    return Err(format!("mesh index out of range (vertex count {count})"));
                }
            }
        }
        Ok(())
    }

    pub fn build_collider(&self) -> Result<Collider, String> {
        self.check()?;
        let translation = Translation::from(Vector::new(self.pos[0], self.pos[1], self.pos[2]));
        let iso = Isometry::from_parts(translation, self.rotation());
        let builder = match self.kind {
            ShapeKind::Box => {
                let size = self.size.unwrap_or([1.0; 3]);
                ColliderBuilder::cuboid(size[0] * 0.5, size[1] * 0.5, size[2] * 0.5)
            }
            ShapeKind::Plane => {
                let n = self.plane_normal();
                let normal = UnitVector::new_normalize(Vector::new(n[0], n[1], n[2]));
                let builder = ColliderBuilder::halfspace(normal);
                // Planes ignore rotation; the normal already orients them.
                return Ok(builder.translation(translation.vector).build());
            }
            ShapeKind::Sphere => ColliderBuilder::ball(self.radius.unwrap_or(0.5)),
            ShapeKind::Capsule => ColliderBuilder::capsule_y(
                self.height.unwrap_or(0.0) * 0.5,
                self.radius.unwrap_or(0.5),
            ),
            ShapeKind::Cylinder => ColliderBuilder::cylinder(
                self.height.unwrap_or(1.0) * 0.5,
                self.radius.unwrap_or(0.5),
            ),
            ShapeKind::Mesh => {
                let vertices: Vec<Point<Real>> = self
                    .vertices
                    .iter()
                    .map(|v| Point::new(v[0], v[1], v[2]))
                    .collect();
                ColliderBuilder::trimesh(vertices, self.indices.clone())
            }
        };
        Ok(builder.position(iso).build())
    }

    fn plane_normal(&self) -> [f32; 3] {
        self.normal.unwrap_or([0.0, 1.0, 0.0])
    }

    fn rotation(&self) -> UnitQuaternion<Real> {
        if let Some(euler) = self.rot_euler_deg {
            UnitQuaternion::from_euler_angles(
                euler[0].to_radians(),
                euler[1].to_radians(),
                euler[2].to_radians(),
            )
        } else if let Some(yaw) = self.yaw_deg {
            UnitQuaternion::from_euler_angles(0.0, yaw.to_radians(), 0.0)
        } else {
            UnitQuaternion::identity()
        }
    }
}

fn positive(value: Option<f32>, message: &str) -> Result<(), String> {
    match value {
        Some(value) if value.is_finite() && value > 0.0 => Ok(()),
        _ => Err(message.to_string()),
    }
}

pub(crate) fn vector_is_finite(value: [f32; 3]) -> bool {
    value.iter().all(|component| component.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(kind: ShapeKind) -> ShapeSpec {
        ShapeSpec {
            kind,
            pos: [0.0; 3],
            size: None,
            radius: None,
            height: None,
            normal: None,
            yaw_deg: None,
            rot_euler_deg: None,
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    #[test]
    fn missing_parameters_are_reported() {
        assert!(shape(ShapeKind::Box).check().is_err());
        assert!(shape(ShapeKind::Sphere).check().is_err());
        assert!(shape(ShapeKind::Cylinder).check().is_err());
        assert!(shape(ShapeKind::Mesh).check().is_err());
        assert!(shape(ShapeKind::Plane).check().is_ok());
    }

    #[test]
    fn mesh_indices_are_bounds_checked() {
        let mut mesh = shape(ShapeKind::Mesh);
        mesh.vertices = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        mesh.indices = vec![[0, 1, 3]];
        assert!(mesh.check().is_err());
        mesh.indices = vec![[0, 2, 1]];
        assert!(mesh.build_collider().is_ok());
    }

    #[test]
    fn box_collider_is_placed_and_rotated() {
        let mut solid = shape(ShapeKind::Box);
        solid.size = Some([4.0, 1.0, 2.0]);
        solid.pos = [1.0, 2.0, 3.0];
        solid.yaw_deg = Some(90.0);
        let collider = solid.build_collider().expect("collider");
        let aabb = collider.compute_aabb();
        assert!((aabb.center().x - 1.0).abs() < 1.0e-4);
        assert!((aabb.maxs.x - aabb.mins.x - 2.0).abs() < 1.0e-3);
        assert!((aabb.maxs.z - aabb.mins.z - 4.0).abs() < 1.0e-3);
    }
}

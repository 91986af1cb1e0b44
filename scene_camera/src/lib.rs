//! Fixed scene camera: projection, viewport, pointer rays, and target follow.
#![forbid(unsafe_code)]

use rapier3d::math::{Point, Vector};
use rapier3d::prelude::Real;

const EPS: Real = 1.0e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    /// Vertical half extent of the view volume; horizontal extent scales with aspect.
    Orthographic { half_height: Real },
    /// Vertical field of view in radians.
    Perspective { fov_y: Real },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub eye: Point<Real>,
    pub target: Point<Real>,
    pub up: Vector<Real>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickRay {
    pub origin: Point<Real>,
    pub dir: Vector<Real>,
    pub max_toi: Real,
}

#[derive(Clone, Copy, Debug)]
pub struct SceneCamera {
    projection: Projection,
    eye: Point<Real>,
    target: Point<Real>,
    up: Vector<Real>,
    near: Real,
    far: Real,
    viewport: [Real; 2],
    follow_offset: Vector<Real>,
}

impl SceneCamera {
    pub fn new(
        projection: Projection,
        eye: Point<Real>,
        target: Point<Real>,
        near: Real,
        far: Real,
        viewport: [Real; 2],
    ) -> Self {
        let mut camera = Self {
            projection,
            eye,
            target,
            up: Vector::y(),
            near: near.max(0.0),
            far: far.max(near),
            viewport: [1.0, 1.0],
            follow_offset: eye - target,
        };
        camera.resize(viewport[0], viewport[1]);
        camera
    }

    /// The isometric-style orthographic view of the scene: a 100 unit tall volume looking at the
    /// origin from `(10, 19, -51)`.
    pub fn isometric(viewport: [Real; 2]) -> Self {
        Self::new(
            Projection::Orthographic { half_height: 50.0 },
            Point::new(10.0, 19.0, -51.0),
            Point::origin(),
            1.0,
            1500.0,
            viewport,
        )
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn viewport(&self) -> [Real; 2] {
        self.viewport
    }

    pub fn aspect(&self) -> Real {
        self.viewport[0] / self.viewport[1]
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            eye: self.eye,
            target: self.target,
            up: self.up,
        }
    }

    /// Update the viewport after a window resize. Degenerate sizes are clamped to one pixel.
    pub fn resize(&mut self, width: Real, height: Real) {
        self.viewport = [width.max(1.0), height.max(1.0)];
    }

    /// Keep the current eye-target offset while re-centering on `target`.
    pub fn follow(&mut self, target: Point<Real>) -> CameraPose {
        self.target = target;
        self.eye = target + self.follow_offset;
        self.pose()
    }

    /// Pixel position (origin top-left) to normalized device coordinates (y up).
    pub fn pixel_to_ndc(&self, pixel: [Real; 2]) -> [Real; 2] {
        [
            pixel[0] / self.viewport[0] * 2.0 - 1.0,
            1.0 - pixel[1] / self.viewport[1] * 2.0,
        ]
    }

    pub fn ndc_to_pixel(&self, ndc: [Real; 2]) -> [Real; 2] {
        [
            (ndc[0] + 1.0) * 0.5 * self.viewport[0],
            (1.0 - ndc[1]) * 0.5 * self.viewport[1],
        ]
    }

    pub fn ray_from_ndc(&self, ndc: [Real; 2]) -> PickRay {
        let (forward, right, up) = self.basis();
        let max_toi = (self.far - self.near).max(0.0);
        match self.projection {
            Projection::Orthographic { half_height } => {
                let half_width = half_height * self.aspect();
                let origin = self.eye
                    + right * (ndc[0] * half_width)
                    + up * (ndc[1] * half_height)
                    + forward * self.near;
                PickRay {
                    origin,
                    dir: forward,
                    max_toi,
                }
            }
            Projection::Perspective { fov_y } => {
                let tan = (fov_y * 0.5).tan();
                let dir = (forward + right * (ndc[0] * tan * self.aspect()) + up * (ndc[1] * tan))
                    .normalize();
                let cos = dir.dot(&forward).max(EPS);
                PickRay {
                    origin: self.eye + dir * (self.near / cos),
                    dir,
                    max_toi: max_toi / cos,
                }
            }
        }
    }

    /// Project a world point to normalized device coordinates, or `None` behind the camera.
    pub fn project(&self, point: Point<Real>) -> Option<[Real; 2]> {
        let (forward, right, up) = self.basis();
        let rel = point - self.eye;
        match self.projection {
            Projection::Orthographic { half_height } => {
                let half_width = half_height * self.aspect();
                Some([rel.dot(&right) / half_width, rel.dot(&up) / half_height])
            }
            Projection::Perspective { fov_y } => {
                let depth = rel.dot(&forward);
                if depth <= EPS {
                    return None;
                }
                let tan = (fov_y * 0.5).tan();
                Some([
                    rel.dot(&right) / (depth * tan * self.aspect()),
                    rel.dot(&up) / (depth * tan),
                ])
            }
        }
    }

    fn basis(&self) -> (Vector<Real>, Vector<Real>, Vector<Real>) {
        let view = self.target - self.eye;
        let forward = if view.norm_squared() > EPS {
            view.normalize()
        } else {
            -Vector::z()
        };
        let mut right = forward.cross(&self.up);
        if right.norm_squared() <= EPS {
            right = forward.cross(&Vector::z());
        }
        let right = right.normalize();
        let up = right.cross(&forward);
        (forward, right, up)
    }
}

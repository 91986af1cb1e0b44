use std::collections::HashSet;

use character_capsule::CapsuleProfile;
use character_motor_hop::HopMotorConfig;
use hotspot_interaction::{Classification, HotspotDef, NamedPrimitive, PanelContent};
use player_controller::{ControllerConfig, GatePolicy, KeyBindings};
use rapier3d::math::Point;
use rapier3d::prelude::{Collider, Real};
use scene_camera::{Projection, SceneCamera};
use squash_animator::AnimationConfig;

use crate::{GatePolicySpec, HotspotKind, ProjectionSpec, SceneMap, SceneMapError};

/// Runtime-ready pieces of a validated scene.
pub struct CookedScene {
    pub name: String,
    pub controller: ControllerConfig,
    pub spawn: Point<Real>,
    pub facing: Real,
    pub contact_skin: Real,
    pub terrain: Vec<Collider>,
    pub hotspots: Vec<HotspotDef>,
    pub primitives: Vec<NamedPrimitive>,
    pub camera: SceneCamera,
    pub camera_follow: bool,
    pub animation: AnimationConfig,
    pub panel_rect: [Real; 4],
}

impl SceneMap {
    /// Validate and convert everything the runtime needs. Warnings are logged; errors abort.
    pub fn cook(&self) -> Result<CookedScene, SceneMapError> {
        let validation = self.validate();
        for warning in &validation.warnings {
            log::warn!("scene '{}': {warning}", self.name);
        }
        if !validation.is_ok() {
            return Err(SceneMapError::Invalid(validation.errors));
        }
        let spawn = self.character.spawn;
        let cooked = CookedScene {
            name: self.name.clone(),
            controller: self.controller_config(),
            spawn: Point::new(spawn[0], spawn[1], spawn[2]),
            facing: self.character.facing_deg.to_radians(),
            contact_skin: self.tuning.contact_skin,
            terrain: self.terrain_colliders()?,
            hotspots: self.hotspot_defs()?,
            primitives: self.named_primitives()?,
            camera: self.scene_camera(),
            camera_follow: self.camera.follow,
            animation: self.animation_config(),
            panel_rect: self.panel.rect,
        };
        log::info!(
            "cooked scene '{}' ({} terrain, {} hotspots, {} primitives)",
            cooked.name,
            cooked.terrain.len(),
            cooked.hotspots.len(),
            cooked.primitives.len()
        );
        Ok(cooked)
    }

    pub fn terrain_colliders(&self) -> Result<Vec<Collider>, SceneMapError> {
        let mut seen = HashSet::new();
        let mut colliders = Vec::with_capacity(self.terrain.len());
        for solid in &self.terrain {
            if !seen.insert(solid.id.as_str()) {
                return Err(SceneMapError::DuplicateId(solid.id.clone()));
            }
            let collider =
                solid
                    .shape
                    .build_collider()
                    .map_err(|reason| SceneMapError::BadShape {
                        id: solid.id.clone(),
                        reason,
                    })?;
            colliders.push(collider);
        }
        Ok(colliders)
    }

    pub fn hotspot_defs(&self) -> Result<Vec<HotspotDef>, SceneMapError> {
        let mut seen = HashSet::new();
        let mut defs = Vec::with_capacity(self.hotspots.len());
        for hotspot in &self.hotspots {
            if !seen.insert(hotspot.id.as_str()) {
                return Err(SceneMapError::DuplicateId(hotspot.id.clone()));
            }
            let classification = match hotspot.kind {
                HotspotKind::Bouncy => Classification::Bouncy,
                HotspotKind::Navigable => Classification::Navigable(PanelContent {
                    title: hotspot.title.clone().unwrap_or_else(|| hotspot.id.clone()),
                    body: hotspot.body.clone().unwrap_or_default(),
                    link: hotspot.link.clone(),
                }),
            };
            defs.push(HotspotDef {
                id: hotspot.id.clone(),
                classification,
                foot_anchored: hotspot.foot_anchored,
            });
        }
        Ok(defs)
    }

    pub fn named_primitives(&self) -> Result<Vec<NamedPrimitive>, SceneMapError> {
        self.primitives
            .iter()
            .map(|primitive| {
                let collider =
                    primitive
                        .shape
                        .build_collider()
                        .map_err(|reason| SceneMapError::BadShape {
                            id: primitive.name.clone(),
                            reason,
                        })?;
                Ok(NamedPrimitive {
                    name: primitive.name.clone(),
                    collider,
                })
            })
            .collect()
    }

    pub fn controller_config(&self) -> ControllerConfig {
        let tuning = &self.tuning;
        let defaults = KeyBindings::default();
        let keys = &self.keys;
        ControllerConfig {
            motor: HopMotorConfig {
                move_speed: tuning.move_speed,
                hop_height: tuning.hop_height,
                hop_cooldown: tuning.hop_cooldown,
                gravity: tuning.gravity,
                damping: tuning.damping,
                facing_lerp: tuning.facing_lerp,
            },
            capsule: CapsuleProfile {
                radius: self.character.radius,
                height: self.character.height,
                ..CapsuleProfile::default()
            },
            bindings: KeyBindings {
                up: keys.up.clone().unwrap_or(defaults.up),
                down: keys.down.clone().unwrap_or(defaults.down),
                left: keys.left.clone().unwrap_or(defaults.left),
                right: keys.right.clone().unwrap_or(defaults.right),
                respawn: keys.respawn.clone().unwrap_or(defaults.respawn),
            },
            gate_policy: match tuning.gate_policy {
                GatePolicySpec::Freeze => GatePolicy::Freeze,
                GatePolicySpec::GravityOnly => GatePolicy::GravityOnly,
            },
            fall_threshold: tuning.fall_threshold,
            max_step: tuning.max_step,
        }
    }

    pub fn animation_config(&self) -> AnimationConfig {
        let animation = &self.animation;
        AnimationConfig {
            squash_y: animation.squash_y,
            squash_xz: animation.squash_xz,
            stretch_y: animation.stretch_y,
            stretch_xz: animation.stretch_xz,
            squash_duration: animation.squash_duration,
            stretch_duration: animation.stretch_duration,
            settle_duration: animation.settle_duration,
            bounce_height: animation.bounce_height,
            bounce_rise_duration: animation.bounce_rise_duration,
            bounce_fall_duration: animation.bounce_fall_duration,
        }
    }

    pub fn scene_camera(&self) -> SceneCamera {
        let camera = &self.camera;
        let projection = match camera.projection {
            ProjectionSpec::Orthographic => Projection::Orthographic {
                half_height: camera.half_height,
            },
            ProjectionSpec::Perspective => Projection::Perspective {
                fov_y: camera.fov_deg.to_radians(),
            },
        };
        SceneCamera::new(
            projection,
            Point::new(camera.eye[0], camera.eye[1], camera.eye[2]),
            Point::new(camera.target[0], camera.target[1], camera.target[2]),
            camera.near,
            camera.far,
            camera.viewport,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SCENE: &str = r#"
version = 1
name = "cook"

[character]
spawn = [1.0, 2.0, 3.0]
facing_deg = 90.0

[tuning]
move_speed = 7.0
gate_policy = "gravity_only"

[keys]
up = ["i"]

[[terrain]]
id = "ground"
kind = "plane"

[[terrain]]
id = "rock"
kind = "sphere"
pos = [4.0, 0.0, 0.0]
radius = 1.0

[[hotspots]]
id = "About"
kind = "navigable"
body = "Hi"

[[hotspots]]
id = "Miso"
kind = "bouncy"
foot_anchored = true

[[primitives]]
name = "About_Sign"
kind = "box"
size = [1.0, 1.0, 1.0]

[[primitives]]
name = "Miso"
kind = "capsule"
radius = 0.3
height = 0.4
"#;

    #[test]
    fn cook_converts_sections() {
        let map = SceneMap::parse_toml(SCENE).expect("parse");
        let cooked = map.cook().expect("cook");
        assert_eq!(cooked.terrain.len(), 2);
        assert_eq!(cooked.primitives.len(), 2);
        assert_eq!(cooked.controller.motor.move_speed, 7.0);
        assert_eq!(cooked.controller.gate_policy, GatePolicy::GravityOnly);
        assert_abs_diff_eq!(cooked.controller.max_step, 1.0 / 30.0, epsilon = 1.0e-6);
        assert_eq!(cooked.controller.bindings.up, vec!["i".to_string()]);
        assert_eq!(cooked.controller.bindings.down, KeyBindings::default().down);
        assert_abs_diff_eq!(cooked.facing, std::f32::consts::FRAC_PI_2, epsilon = 1.0e-6);
        assert_eq!(cooked.spawn, Point::new(1.0, 2.0, 3.0));
        match &cooked.hotspots[0].classification {
            Classification::Navigable(content) => {
                assert_eq!(content.title, "About");
                assert_eq!(content.body, "Hi");
                assert!(content.link.is_none());
            }
            other => panic!("unexpected classification {other:?}"),
        }
        assert_eq!(cooked.hotspots[1].classification, Classification::Bouncy);
    }

    #[test]
    fn cook_refuses_invalid_scene() {
        let text = SCENE.replace("version = 1", "version = 9");
        let map = SceneMap::parse_toml(&text).expect("parse");
        match map.cook() {
            Err(SceneMapError::Invalid(errors)) => {
                assert!(errors.iter().any(|err| err.contains("version")));
            }
            other => panic!("expected invalid scene, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn duplicate_terrain_is_rejected_when_building() {
        let text = SCENE.replace("id = \"rock\"", "id = \"ground\"");
        let map = SceneMap::parse_toml(&text).expect("parse");
        assert!(matches!(
            map.terrain_colliders(),
            Err(SceneMapError::DuplicateId(id)) if id == "ground"
        ));
    }
}

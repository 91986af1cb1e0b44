//! Scene file format (TOML): terrain, character, tuning, camera, and hotspots.
#![forbid(unsafe_code)]

mod cook;
mod shapes;

pub use cook::CookedScene;
pub use shapes::{ShapeKind, ShapeSpec};

use std::collections::HashSet;
use std::path::Path;

use hotspot_interaction::primitive_in_group;
use serde::Deserialize;
use shapes::vector_is_finite;
use thiserror::Error;

pub const SCENE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SceneMapError {
    #[error("failed to read scene: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scene: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid scene: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("duplicate id '{0}'")]
    DuplicateId(String),
    #[error("bad shape '{id}': {reason}")]
    BadShape { id: String, reason: String },
}

#[derive(Clone, Debug, Deserialize)]
pub struct SceneMap {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub character: CharacterSection,
    #[serde(default)]
    pub tuning: TuningSection,
    #[serde(default)]
    pub camera: CameraSection,
    #[serde(default)]
    pub panel: PanelSection,
    #[serde(default)]
    pub keys: KeysSection,
    #[serde(default)]
    pub animation: AnimationSection,
    #[serde(default)]
    pub terrain: Vec<TerrainSpec>,
    #[serde(default)]
    pub primitives: Vec<PrimitiveSpec>,
    #[serde(default)]
    pub hotspots: Vec<HotspotSpec>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CharacterSection {
    pub spawn: [f32; 3],
    pub facing_deg: f32,
    pub radius: f32,
    pub height: f32,
}

impl Default for CharacterSection {
    fn default() -> Self {
        Self {
            spawn: [0.0, 1.0, 0.0],
            facing_deg: 0.0,
            radius: 0.35,
            height: 0.7,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicySpec {
    #[default]
    Freeze,
    GravityOnly,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TuningSection {
    pub move_speed: f32,
    pub hop_height: f32,
    pub hop_cooldown: f32,
    pub gravity: f32,
    pub damping: f32,
    pub facing_lerp: f32,
    pub fall_threshold: f32,
    pub contact_skin: f32,
    /// Longest simulation step; longer frames are split.
    pub max_step: f32,
    pub gate_policy: GatePolicySpec,
}

impl Default for TuningSection {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            hop_height: 6.0,
            hop_cooldown: 0.35,
            gravity: 30.0,
            damping: 0.85,
            facing_lerp: 0.4,
            fall_threshold: -25.0,
            contact_skin: 0.02,
            max_step: 1.0 / 30.0,
            gate_policy: GatePolicySpec::Freeze,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionSpec {
    #[default]
    Orthographic,
    Perspective,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CameraSection {
    pub projection: ProjectionSpec,
    pub half_height: f32,
    pub fov_deg: f32,
    pub eye: [f32; 3],
    pub target: [f32; 3],
    pub near: f32,
    pub far: f32,
    pub viewport: [f32; 2],
    /// Re-center on the character every frame, keeping the initial offset.
    pub follow: bool,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            projection: ProjectionSpec::Orthographic,
            half_height: 50.0,
            fov_deg: 45.0,
            eye: [10.0, 19.0, -51.0],
            target: [0.0, 0.0, 0.0],
            near: 1.0,
            far: 1500.0,
            viewport: [1280.0, 720.0],
            follow: false,
        }
    }
}

/// Pixel rectangle `[x0, y0, x1, y1]` of the info panel, used for outside-click tests.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PanelSection {
    pub rect: [f32; 4],
}

impl Default for PanelSection {
    fn default() -> Self {
        Self {
            rect: [320.0, 120.0, 960.0, 600.0],
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct KeysSection {
    pub up: Option<Vec<String>>,
    pub down: Option<Vec<String>>,
    pub left: Option<Vec<String>>,
    pub right: Option<Vec<String>>,
    pub respawn: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AnimationSection {
    pub squash_y: f32,
    pub squash_xz: f32,
    pub stretch_y: f32,
    pub stretch_xz: f32,
    pub squash_duration: f32,
    pub stretch_duration: f32,
    pub settle_duration: f32,
    pub bounce_height: f32,
    pub bounce_rise_duration: f32,
    pub bounce_fall_duration: f32,
}

impl Default for AnimationSection {
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

#[derive(Clone, Debug, Deserialize)]
pub struct TerrainSpec {
    pub id: String,
    #[serde(flatten)]
    pub shape: ShapeSpec,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PrimitiveSpec {
    pub name: String,
    #[serde(flatten)]
    pub shape: ShapeSpec,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HotspotKind {
    Navigable,
    Bouncy,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HotspotSpec {
    pub id: String,
    pub kind: HotspotKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub foot_anchored: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SceneValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl SceneValidation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl SceneMap {
    pub fn parse_toml(text: &str) -> Result<Self, SceneMapError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, SceneMapError> {
        let text = std::fs::read_to_string(path)?;
        let map = Self::parse_toml(&text)?;
        log::debug!("loaded scene '{}' from {}", map.name, path.display());
        Ok(map)
    }

    pub fn validate(&self) -> SceneValidation {
        let mut validation = SceneValidation::default();
        if self.version != SCENE_VERSION {
            validation
                .errors
                .push(format!("unsupported version {}", self.version));
        }
        if self.name.trim().is_empty() {
            validation
                .warnings
                .push("scene name is empty".to_string());
        }
        self.validate_character(&mut validation);
        self.validate_tuning(&mut validation);
        self.validate_camera(&mut validation);
        self.validate_animation(&mut validation);
        self.validate_terrain(&mut validation);
        self.validate_hotspots(&mut validation);
        validation
    }

    fn validate_character(&self, validation: &mut SceneValidation) {
        let character = &self.character;
        if !vector_is_finite(character.spawn) {
            validation
                .errors
                .push("character spawn must be finite".to_string());
        }
        if !character.facing_deg.is_finite() {
            validation
                .errors
                .push("character facing_deg must be finite".to_string());
        }
        if !(character.radius.is_finite() && character.radius > 0.0) {
            validation
                .errors
                .push("character radius must be > 0".to_string());
        }
        if !(character.height.is_finite() && character.height >= 0.0) {
            validation
                .errors
                .push("character height must be >= 0".to_string());
        }
        if character.spawn[1] <= self.tuning.fall_threshold {
            validation
                .errors
                .push("character spawn is below the fall threshold".to_string());
        }
    }

    fn validate_tuning(&self, validation: &mut SceneValidation) {
        let tuning = &self.tuning;
        let positive = [
            ("move_speed", tuning.move_speed),
            ("hop_height", tuning.hop_height),
            ("gravity", tuning.gravity),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                validation
                    .errors
                    .push(format!("tuning {name} must be > 0"));
            }
        }
        if !(tuning.hop_cooldown.is_finite() && tuning.hop_cooldown >= 0.0) {
            validation
                .errors
                .push("tuning hop_cooldown must be >= 0".to_string());
        }
        if !(0.0..=1.0).contains(&tuning.damping) {
            validation
                .errors
                .push("tuning damping must be within [0, 1]".to_string());
        }
        if !(tuning.facing_lerp > 0.0 && tuning.facing_lerp <= 1.0) {
            validation
                .errors
                .push("tuning facing_lerp must be within (0, 1]".to_string());
        }
        if !tuning.fall_threshold.is_finite() {
            validation
                .errors
                .push("tuning fall_threshold must be finite".to_string());
        }
        if !(tuning.contact_skin.is_finite() && tuning.contact_skin >= 0.0) {
            validation
                .errors
                .push("tuning contact_skin must be >= 0".to_string());
        }
        if !(tuning.max_step.is_finite() && tuning.max_step > 0.0) {
            validation
                .errors
                .push("tuning max_step must be > 0".to_string());
        }
        if tuning.contact_skin > self.character.radius * 0.5 {
            validation
                .warnings
                .push("contact_skin is large relative to the capsule radius".to_string());
        }
    }

    fn validate_camera(&self, validation: &mut SceneValidation) {
        let camera = &self.camera;
        if !vector_is_finite(camera.eye) || !vector_is_finite(camera.target) {
            validation
                .errors
                .push("camera eye/target must be finite".to_string());
        }
        if camera.eye == camera.target {
            validation
                .errors
                .push("camera eye and target must differ".to_string());
        }
        if !(camera.near >= 0.0 && camera.far > camera.near) {
            validation
                .errors
                .push("camera requires 0 <= near < far".to_string());
        }
        match camera.projection {
            ProjectionSpec::Orthographic => {
                if !(camera.half_height.is_finite() && camera.half_height > 0.0) {
                    validation
                        .errors
                        .push("camera half_height must be > 0".to_string());
                }
            }
            ProjectionSpec::Perspective => {
                if !(camera.fov_deg > 0.0 && camera.fov_deg < 180.0) {
                    validation
                        .errors
                        .push("camera fov_deg must be within (0, 180)".to_string());
                }
            }
        }
        if camera.viewport.iter().any(|side| !(*side >= 1.0)) {
            validation
                .errors
                .push("camera viewport must be at least 1x1".to_string());
        }
        let [x0, y0, x1, y1] = self.panel.rect;
        if !(x1 > x0 && y1 > y0) {
            validation
                .errors
                .push("panel rect must have positive size".to_string());
        }
    }

    fn validate_animation(&self, validation: &mut SceneValidation) {
        let animation = &self.animation;
        let durations = [
            ("squash_duration", animation.squash_duration),
            ("stretch_duration", animation.stretch_duration),
            ("settle_duration", animation.settle_duration),
            ("bounce_rise_duration", animation.bounce_rise_duration),
            ("bounce_fall_duration", animation.bounce_fall_duration),
        ];
        for (name, value) in durations {
            if !(value.is_finite() && value >= 0.0) {
                validation
                    .errors
                    .push(format!("animation {name} must be >= 0"));
            }
        }
        let scales = [
            ("squash_y", animation.squash_y),
            ("squash_xz", animation.squash_xz),
            ("stretch_y", animation.stretch_y),
            ("stretch_xz", animation.stretch_xz),
        ];
        for (name, value) in scales {
            if !(value.is_finite() && value > 0.0) {
                validation
                    .errors
                    .push(format!("animation {name} must be > 0"));
            }
        }
    }

    fn validate_terrain(&self, validation: &mut SceneValidation) {
        if self.terrain.is_empty() {
            validation
                .warnings
                .push("scene contains no terrain".to_string());
        }
        let mut seen = HashSet::new();
        for solid in &self.terrain {
            if solid.id.trim().is_empty() {
                validation
                    .errors
                    .push("terrain id must not be empty".to_string());
            } else if !seen.insert(solid.id.as_str()) {
                validation
                    .errors
                    .push(format!("duplicate terrain id '{}'", solid.id));
            }
            if let Err(reason) = solid.shape.check() {
                validation
                    .errors
                    .push(format!("terrain '{}': {reason}", solid.id));
            }
        }
    }

    fn validate_hotspots(&self, validation: &mut SceneValidation) {
        let mut ids = HashSet::new();
        for hotspot in &self.hotspots {
            if hotspot.id.trim().is_empty() {
                validation
                    .errors
                    .push("hotspot id must not be empty".to_string());
                continue;
            }
            if !ids.insert(hotspot.id.as_str()) {
                validation
                    .errors
                    .push(format!("duplicate hotspot id '{}'", hotspot.id));
            }
            if hotspot.kind == HotspotKind::Navigable && hotspot.title.is_none() {
                validation
                    .warnings
                    .push(format!("navigable hotspot '{}' has no title", hotspot.id));
            }
            let has_geometry = self
                .primitives
                .iter()
                .any(|primitive| primitive_in_group(&primitive.name, &hotspot.id));
            if !has_geometry {
                validation
                    .warnings
                    .push(format!("hotspot '{}' has no primitives", hotspot.id));
            }
        }
        for primitive in &self.primitives {
            if primitive.name.trim().is_empty() {
                validation
                    .errors
                    .push("primitive name must not be empty".to_string());
            }
            if let Err(reason) = primitive.shape.check() {
                validation
                    .errors
                    .push(format!("primitive '{}': {reason}", primitive.name));
            }
            if !ids.iter().any(|id| primitive_in_group(&primitive.name, id)) {
                validation
                    .warnings
                    .push(format!("primitive '{}' matches no hotspot", primitive.name));
            }
        }
    }
}

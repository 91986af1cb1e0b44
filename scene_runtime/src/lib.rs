//! Per-frame session: locomotion, animator flush, picking, then click side effects.
#![forbid(unsafe_code)]

use collision_index::CollisionIndex;
use hotspot_interaction::{
    ClickAction, CursorHint, InteractiveRegistry, PanelGate, PickingDispatcher, RectPanel,
};
use player_controller::{
    Character, ControllerError, InputSnapshot, LocomotionEvent, PlayerController,
};
use rapier3d::math::Point;
use rapier3d::prelude::Real;
use scene_camera::SceneCamera;
use scene_map::CookedScene;
use squash_animator::{AnimTarget, Completion, Sequence, SquashAnimator, VisualPose};

/// Running totals since the session started.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub skipped_frames: u64,
    pub takeoffs: u32,
    pub landings: u32,
    pub respawns: u32,
    pub bounces: u32,
    pub panels_opened: u32,
    pub ignored_clicks: u32,
}

/// What happened during one [`Session::frame`].
#[derive(Clone, Debug)]
pub struct FrameReport {
    /// `None` until the character has been spawned.
    pub character: Option<Character>,
    pub events: Vec<LocomotionEvent>,
    pub completions: Vec<Completion>,
    pub hover: Option<String>,
    pub cursor: CursorHint,
    pub clicks: Vec<ClickAction>,
}

pub struct Session {
    name: String,
    controller: PlayerController,
    spawn: Point<Real>,
    facing: Real,
    terrain: CollisionIndex,
    registry: InteractiveRegistry,
    camera: SceneCamera,
    camera_follow: bool,
    animator: SquashAnimator,
    dispatcher: PickingDispatcher,
    gate: PanelGate,
    panel: RectPanel,
    input: InputSnapshot,
    stats: SessionStats,
}

impl Session {
    /// Build the static indices for a cooked scene. The character does not exist until
    /// [`Session::spawn_character`]; frames before that are no-ops for locomotion.
    pub fn new(scene: CookedScene) -> Self {
        let terrain = CollisionIndex::build_with_skin(scene.terrain, scene.contact_skin);
        let registry = InteractiveRegistry::build(scene.hotspots, scene.primitives);
        log::info!(
            "session '{}' ready ({} terrain colliders, {} hotspots)",
            scene.name,
            terrain.collider_count(),
            registry.len()
        );
        Self {
            name: scene.name,
            controller: PlayerController::new(scene.controller),
            spawn: scene.spawn,
            facing: scene.facing,
            terrain,
            registry,
            camera: scene.camera,
            camera_follow: scene.camera_follow,
            animator: SquashAnimator::new(scene.animation),
            dispatcher: PickingDispatcher::new(),
            gate: PanelGate::default(),
            panel: RectPanel::new(scene.panel_rect),
            input: InputSnapshot::new(),
            stats: SessionStats::default(),
        }
    }

    /// Build the session and place the character at the scene's spawn point.
    pub fn with_character(scene: CookedScene) -> Self {
        let mut session = Self::new(scene);
        session.spawn_character();
        session
    }

    pub fn spawn_character(&mut self) {
        self.controller.spawn(self.spawn, self.facing);
        self.animator.cancel(&AnimTarget::Character);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn character(&self) -> Option<&Character> {
        self.controller.character()
    }

    pub fn controller(&self) -> &PlayerController {
        &self.controller
    }

    pub fn registry(&self) -> &InteractiveRegistry {
        &self.registry
    }

    pub fn camera(&self) -> &SceneCamera {
        &self.camera
    }

    pub fn animator(&self) -> &SquashAnimator {
        &self.animator
    }

    pub fn gate(&self) -> &PanelGate {
        &self.gate
    }

    pub fn panel(&self) -> &RectPanel {
        &self.panel
    }

    pub fn hover(&self) -> Option<&str> {
        self.dispatcher.hover()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn character_pose(&self) -> VisualPose {
        self.animator.pose(&AnimTarget::Character)
    }

    pub fn key_down(&mut self, key: &str) {
        self.input.key_down(key);
    }

    pub fn key_up(&mut self, key: &str) {
        self.input.key_up(key);
    }

    /// Drop every held key, e.g. when the window loses focus.
    pub fn release_keys(&mut self) {
        self.input.release_all();
    }

    pub fn pointer_move(&mut self, ndc: [Real; 2]) {
        self.input.pointer_move(ndc);
    }

    pub fn pointer_move_pixel(&mut self, pixel: [Real; 2]) {
        self.input.pointer_move(self.camera.pixel_to_ndc(pixel));
    }

    pub fn pointer_leave(&mut self) {
        self.input.pointer_leave();
    }

    /// Queue a click. The pointer moves to the click position so the next frame picks under it.
    pub fn click(&mut self, pixel: [Real; 2]) {
        self.pointer_move_pixel(pixel);
        self.input.click(pixel);
    }

    pub fn resize(&mut self, width: Real, height: Real) {
        self.camera.resize(width, height);
    }

    /// Explicit close action from the panel's own close button.
    pub fn close_panel(&mut self) {
        if !self.gate.is_open() {
            return;
        }
        self.apply_click(ClickAction::ClosePanel);
    }

    pub fn frame(&mut self, dt: Real) -> FrameReport {
        self.stats.frames += 1;
        let gated = self.gate.is_open();

        let mut events = Vec::new();
        match self.controller.tick(&self.terrain, &self.input, gated, dt) {
            Ok(frame) => events = frame.events,
            Err(ControllerError::NotReady) => {
                self.stats.skipped_frames += 1;
                log::trace!("frame {}: locomotion not ready", self.stats.frames);
            }
        }
        for event in &events {
            self.forward_event(*event);
        }

        let completions = self.animator.advance(dt);
        for completion in &completions {
            log::trace!("{:?} finished on {:?}", completion.sequence, completion.target);
        }
        self.controller
            .set_animating(self.animator.is_animating(&AnimTarget::Character));

        if self.camera_follow {
            if let Some(character) = self.controller.character() {
                self.camera.follow(character.position);
            }
        }

        let hover = self
            .dispatcher
            .update_hover(self.input.pointer_ndc(), &self.camera, &self.registry)
            .map(str::to_string);

        let clicks: Vec<ClickAction> = self
            .input
            .take_clicks()
            .into_iter()
            .map(|pixel| {
                let action = self.dispatcher.handle_click(
                    pixel,
                    &self.gate,
                    &self.panel,
                    &self.registry,
                    &self.animator,
                );
                self.apply_click(action)
            })
            .collect();

        self.input.end_frame();

        FrameReport {
            character: self.controller.character().cloned(),
            events,
            completions,
            hover,
            cursor: self.dispatcher.cursor_hint(),
            clicks,
        }
    }

    /// Run `frames` frames of `dt` and return the last report.
    pub fn run(&mut self, frames: u32, dt: Real) -> Option<FrameReport> {
        let mut last = None;
        for _ in 0..frames {
            last = Some(self.frame(dt));
        }
        last
    }

    fn forward_event(&mut self, event: LocomotionEvent) {
        match event {
            LocomotionEvent::TookOff => {
                self.stats.takeoffs += 1;
                self.animator.on_takeoff(AnimTarget::Character);
            }
            LocomotionEvent::Landed => {
                self.stats.landings += 1;
                self.animator.on_landing(AnimTarget::Character);
            }
            LocomotionEvent::Respawned => {
                self.stats.respawns += 1;
                self.animator.cancel(&AnimTarget::Character);
            }
        }
    }

    fn apply_click(&mut self, action: ClickAction) -> ClickAction {
        let applied = self.dispatcher.apply(
            &action,
            &mut self.gate,
            &mut self.panel,
            &mut self.animator,
        );
        match (&action, applied) {
            (_, Err(err)) => {
                log::debug!("click rejected: {err}");
                self.stats.ignored_clicks += 1;
                return ClickAction::Ignored(err);
            }
            (ClickAction::Bounce(_), Ok(())) => self.stats.bounces += 1,
            (ClickAction::OpenPanel { .. }, Ok(())) => self.stats.panels_opened += 1,
            (ClickAction::Ignored(_), Ok(())) => self.stats.ignored_clicks += 1,
            (ClickAction::None | ClickAction::ClosePanel, Ok(())) => {}
        }
        action
    }
}

/// Whether a completion is the end of a hotspot bounce on `id`.
pub fn is_bounce_of(completion: &Completion, id: &str) -> bool {
    completion.sequence == Sequence::Bounce
        && matches!(&completion.target, AnimTarget::Hotspot(target) if target == id)
}

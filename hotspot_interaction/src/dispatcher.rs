use rapier3d::prelude::Real;
use scene_camera::SceneCamera;
use squash_animator::{AnimTarget, SquashAnimator};

use crate::registry::{Classification, InteractiveRegistry, PanelContent};
use crate::InteractionError;

/// Modal-open flag. While open, locomotion input and hotspot clicks are suspended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PanelGate {
    open_for: Option<String>,
}

impl PanelGate {
    pub fn is_open(&self) -> bool {
        self.open_for.is_some()
    }

    /// Hotspot whose panel is showing.
    pub fn open_for(&self) -> Option<&str> {
        self.open_for.as_deref()
    }

    pub fn open(&mut self, id: &str) {
        self.open_for = Some(id.to_string());
    }

    /// Close the gate, returning the hotspot whose panel was showing.
    pub fn close(&mut self) -> Option<String> {
        self.open_for.take()
    }
}

/// The overlay that renders panel content. The core never draws it.
pub trait PanelRenderer {
    fn open_panel(&mut self, id: &str, content: &PanelContent);
    fn close_panel(&mut self);
    /// Whether a pixel position lies inside the visible panel.
    fn contains(&self, pixel: [Real; 2]) -> bool;
}

/// Headless panel occupying a fixed pixel rectangle `[x0, y0, x1, y1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct RectPanel {
    pub rect: [Real; 4],
    pub shown: Option<(String, PanelContent)>,
}

impl RectPanel {
    pub fn new(rect: [Real; 4]) -> Self {
        Self { rect, shown: None }
    }
}

impl PanelRenderer for RectPanel {
    fn open_panel(&mut self, id: &str, content: &PanelContent) {
        self.shown = Some((id.to_string(), content.clone()));
    }

    fn close_panel(&mut self) {
        self.shown = None;
    }

    fn contains(&self, pixel: [Real; 2]) -> bool {
        let [x0, y0, x1, y1] = self.rect;
        self.shown.is_some()
            && pixel[0] >= x0
            && pixel[0] <= x1
            && pixel[1] >= y0
            && pixel[1] <= y1
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CursorHint {
    Pointer,
    #[default]
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickAction {
    /// Nothing under the pointer, or a click inside an open panel.
    None,
    /// Click outside an open panel; consumed.
    ClosePanel,
    OpenPanel { id: String, content: PanelContent },
    Bounce(String),
    Ignored(InteractionError),
}

#[derive(Debug, Default)]
pub struct PickingDispatcher {
    hover: Option<String>,
}

impl PickingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hover(&self) -> Option<&str> {
        self.hover.as_deref()
    }

    pub fn cursor_hint(&self) -> CursorHint {
        if self.hover.is_some() {
            CursorHint::Pointer
        } else {
            CursorHint::Default
        }
    }

    /// Recompute the hovered hotspot from the pointer position. `None` means the pointer left
    /// the canvas.
    pub fn update_hover(
        &mut self,
        pointer_ndc: Option<[Real; 2]>,
        camera: &SceneCamera,
        registry: &InteractiveRegistry,
    ) -> Option<&str> {
        let next = pointer_ndc.and_then(|ndc| {
            let ray = camera.ray_from_ndc(ndc);
            registry
                .pick(ray.origin, ray.dir, ray.max_toi)
                .map(|group| group.id.clone())
        });
        if next != self.hover {
            log::trace!("hover {:?} -> {:?}", self.hover, next);
        }
        self.hover = next;
        self.hover.as_deref()
    }

    /// Decide what a click does. Nothing is mutated; see [`PickingDispatcher::apply`].
    pub fn handle_click(
        &self,
        pixel: [Real; 2],
        gate: &PanelGate,
        panel: &dyn PanelRenderer,
        registry: &InteractiveRegistry,
        animator: &SquashAnimator,
    ) -> ClickAction {
        if gate.is_open() {
            if panel.contains(pixel) {
                return ClickAction::None;
            }
            return ClickAction::ClosePanel;
        }
        let Some(id) = self.hover.as_deref() else {
            return ClickAction::None;
        };
        match registry.classification(id) {
            None => ClickAction::Ignored(InteractionError::UnknownInteractionTarget(
                id.to_string(),
            )),
            Some(Classification::Bouncy) => {
                if animator.is_bouncing(id) {
                    ClickAction::Ignored(InteractionError::ConcurrentBounceRejected(id.to_string()))
                } else {
                    ClickAction::Bounce(id.to_string())
                }
            }
            Some(Classification::Navigable(content)) => ClickAction::OpenPanel {
                id: id.to_string(),
                content: content.clone(),
            },
        }
    }

    /// Carry out a click decision on the gate, panel, and animator.
    pub fn apply(
        &self,
        action: &ClickAction,
        gate: &mut PanelGate,
        panel: &mut dyn PanelRenderer,
        animator: &mut SquashAnimator,
    ) -> Result<(), InteractionError> {
        match action {
            ClickAction::None => Ok(()),
            ClickAction::ClosePanel => {
                if let Some(id) = gate.close() {
                    log::info!("panel `{id}` closed");
                    animator.cancel(&AnimTarget::Hotspot(id));
                }
                panel.close_panel();
                Ok(())
            }
            ClickAction::OpenPanel { id, content } => {
                log::info!("panel `{id}` opened");
                gate.open(id);
                panel.open_panel(id, content);
                Ok(())
            }
            ClickAction::Bounce(id) => animator
                .on_hotspot_bounce(id)
                .map_err(|_| InteractionError::ConcurrentBounceRejected(id.clone())),
            ClickAction::Ignored(err) => {
                log::debug!("click ignored: {err}");
                Ok(())
            }
        }
    }
}

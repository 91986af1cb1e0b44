//! Hotspot registry, pointer picking, click dispatch, and the panel gate.
#![forbid(unsafe_code)]

mod dispatcher;
mod registry;

pub use dispatcher::{ClickAction, CursorHint, PanelGate, PanelRenderer, PickingDispatcher, RectPanel};
pub use registry::{
    primitive_in_group, Classification, HotspotDef, HotspotGroup, InteractiveRegistry,
    NamedPrimitive, PanelContent,
};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractionError {
    #[error("no hotspot named `{0}`")]
    UnknownInteractionTarget(String),
    #[error("hotspot `{0}` is already bouncing")]
    ConcurrentBounceRejected(String),
}

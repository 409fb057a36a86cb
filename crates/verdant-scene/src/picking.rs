//! Pointer gesture tracking and ray picking against registered entities

use bevy::math::Vec2;
use tracing::debug;

use crate::camera::{CameraPose, Viewport};
use crate::graph::SceneGraph;
use crate::registry::{EntityHandle, EntityRegistry};

/// One press-move-release interaction
#[derive(Debug, Clone, Copy, PartialEq)]
struct DragSession {
    start: Vec2,
    last: Vec2,
}

/// Separates orbit drags from clicks.
///
/// A press followed by a release further than the threshold from the press
/// point is a drag, and the click the browser fires after it is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerTracker {
    threshold: f32,
    session: Option<DragSession>,
    suppress_click: bool,
}

impl PointerTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            session: None,
            suppress_click: false,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.session.is_some()
    }

    /// Start a session, ending any session still open
    pub fn pointer_down(&mut self, position: Vec2) {
        self.session = Some(DragSession {
            start: position,
            last: position,
        });
        self.suppress_click = false;
    }

    /// Movement since the previous event while pressed, in pixels
    pub fn pointer_move(&mut self, position: Vec2) -> Option<Vec2> {
        let session = self.session.as_mut()?;
        let delta = position - session.last;
        session.last = position;
        (delta != Vec2::ZERO).then_some(delta)
    }

    /// End the session; returns `true` when it was a drag
    pub fn pointer_up(&mut self, position: Vec2) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        let dragged = position.distance(session.start) > self.threshold;
        self.suppress_click = dragged;
        dragged
    }

    /// Whether a click at this point should pick; consumes drag suppression
    pub fn click(&mut self) -> bool {
        !std::mem::take(&mut self.suppress_click)
    }

    pub fn reset(&mut self) {
        self.session = None;
        self.suppress_click = false;
    }
}

/// Resolve the entity under `position` (CSS pixels in the viewport).
///
/// The nearest geometry hit decides; if it belongs to nothing registered the
/// result is `None` even when registered geometry lies behind it.
pub fn pick(
    graph: &SceneGraph,
    registry: &EntityRegistry,
    pose: &CameraPose,
    viewport: &Viewport,
    position: Vec2,
) -> Option<EntityHandle> {
    let ndc = viewport.to_ndc(position)?;
    let ray = pose.ray_from_ndc(ndc, viewport)?;
    let hit = graph.raycast(ray)?;
    let handle = registry.resolve_handle(graph, hit.node);
    debug!(
        x = position.x,
        y = position.y,
        node = hit.node.index(),
        distance = hit.distance,
        resolved = handle.is_some(),
        "Pick"
    );
    handle
}

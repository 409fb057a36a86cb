//! Host abstraction: the container the viewer mounts into and the surface it
//! draws on

use crate::camera::{CameraPose, Viewport};
use crate::error::ViewerError;
use crate::graph::SceneGraph;
use crate::labels::Label;

/// Everything a surface needs to present one frame
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub graph: &'a SceneGraph,
    pub pose: CameraPose,
    pub viewport: Viewport,
    pub labels: &'a [Label],
    /// Index of this frame since mount
    pub number: u64,
}

/// A drawable owned by the viewer for the lifetime of one mount
pub trait RenderSurface {
    /// Present the frame. Called at most once per frame.
    fn draw(&mut self, frame: &Frame<'_>);

    /// Free GPU and host resources. Must tolerate repeated calls.
    fn release(&mut self);
}

/// Pointer events the viewer subscribes to on its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    Down,
    Move,
    Up,
    Click,
}

impl PointerEventKind {
    pub const ALL: [PointerEventKind; 4] = [Self::Down, Self::Move, Self::Up, Self::Click];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u32);

/// The element hosting the viewer (a canvas, a window, a test double)
pub trait Container {
    type Surface: RenderSurface;

    /// Acquire a rendering context sized to `viewport`.
    ///
    /// Hosts report failure as [`ViewerError::ContextAcquisition`].
    fn create_surface(&mut self, viewport: Viewport) -> Result<Self::Surface, ViewerError>;

    /// Current drawable size in CSS pixels
    fn viewport(&self) -> Viewport;

    fn listen(&mut self, kind: PointerEventKind) -> ListenerId;

    fn unlisten(&mut self, id: ListenerId);

    /// Ask the host to call back for another frame
    fn request_frame(&mut self);
}

//! Verdant Scene - Digital-twin viewer core
//!
//! This crate holds everything the greenhouse viewer does independently of
//! the host that displays it:
//! - An arena scene graph built from zone snapshots, with ray casting
//! - The entity registry mapping hit geometry back to zones and actuators
//! - The orbit camera rig with auto-patrol
//! - Pointer gesture handling and picking
//! - Projection of alert anchors into screen-space labels
//! - The [`Viewer`] context tying these to a host [`Container`]

pub mod builder;
pub mod camera;
pub mod config;
pub mod error;
pub mod graph;
pub mod labels;
pub mod picking;
pub mod registry;
pub mod render_loop;
pub mod surface;
pub mod viewer;

// Re-export commonly used types
pub use builder::{status_color, AlertAnchor, BuildReport, Scene, PLACEHOLDER_TEXT};
pub use camera::{CameraPose, CameraRig, Viewport};
pub use config::{ConfigError, ViewerConfig};
pub use error::ViewerError;
pub use graph::{Material, NodeId, SceneGraph, SceneNode, Shape};
pub use labels::Label;
pub use registry::{EntityHandle, EntityKind, RegistryError, SceneEntity};
pub use render_loop::LoopHandle;
pub use surface::{Container, Frame, ListenerId, PointerEventKind, RenderSurface};
pub use viewer::{issue_control, SelectCallback, Viewer};

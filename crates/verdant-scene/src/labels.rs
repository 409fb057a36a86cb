//! Screen-space alert labels projected from 3D anchors

use bevy::math::{Vec3, Vec4};
use serde::Serialize;
use verdant_core::ZoneStatus;

use crate::builder::AlertAnchor;
use crate::camera::{CameraPose, Viewport};
use crate::graph::SceneGraph;

/// A label the overlay draws this frame, positioned in CSS pixels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub id: String,
    pub status: ZoneStatus,
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// Project every anchor and keep those in front of the camera and on screen.
///
/// Output order follows `anchors`. Anchors whose node no longer exists are
/// skipped.
pub fn project_anchors(
    graph: &SceneGraph,
    anchors: &[AlertAnchor],
    pose: &CameraPose,
    viewport: &Viewport,
) -> Vec<Label> {
    if viewport.is_empty() {
        return Vec::new();
    }
    let view_projection = pose.view_projection(viewport);

    anchors
        .iter()
        .filter_map(|anchor| {
            let world = graph.world_position(anchor.node)?;
            let (x, y) = project_point(view_projection, world, viewport)?;
            Some(Label {
                id: anchor.zone_id.clone(),
                status: anchor.status,
                text: anchor.text.clone(),
                x,
                y,
            })
        })
        .collect()
}

fn project_point(view_projection: bevy::math::Mat4, world: Vec3, viewport: &Viewport) -> Option<(f32, f32)> {
    let clip = view_projection * Vec4::new(world.x, world.y, world.z, 1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    if ndc.z >= 1.0 {
        return None;
    }

    // Drawing buffer pixels, then back to CSS pixels
    let ratio = viewport.device_pixel_ratio.max(f32::EPSILON);
    let buffer_width = viewport.width * ratio;
    let buffer_height = viewport.height * ratio;
    let x = (ndc.x + 1.0) * 0.5 * buffer_width / ratio;
    let y = (1.0 - ndc.y) * 0.5 * buffer_height / ratio;

    let inside = (0.0..=viewport.width).contains(&x) && (0.0..=viewport.height).contains(&y);
    inside.then_some((x, y))
}

//! Scene construction from zone snapshots
//!
//! Each build starts from an empty graph and registry. There is no diffing:
//! the previous scene is discarded before the new nodes are inserted.

use bevy::color::Color;
use bevy::math::{Vec2, Vec3};
use tracing::{debug, info};
use verdant_core::{ActuatorKind, Zone, ZoneStatus};

use crate::graph::{Material, NodeId, SceneGraph, SceneNode, Shape};
use crate::registry::{EntityData, EntityKind, EntityRegistry, RegistryError};

/// Height of every zone group's origin above the floor
const ZONE_BASE_Y: f32 = 0.5;
const CROPS_PER_ZONE: usize = 8;
/// Local offset of the alert anchor and pulse marker above the zone origin
const ANCHOR_OFFSET: Vec3 = Vec3::new(0.0, 2.0, 0.0);
const ENCLOSURE_SIZE: Vec3 = Vec3::new(14.0, 8.0, 20.0);
const FRAME_BEAM_THICKNESS: f32 = 0.06;
pub const PLACEHOLDER_TEXT: &str = "No greenhouse data";

/// A projection source for one floating alert label
#[derive(Debug, Clone, PartialEq)]
pub struct AlertAnchor {
    pub zone_id: String,
    pub status: ZoneStatus,
    pub text: String,
    pub node: NodeId,
}

/// Counts describing the scene produced by one build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildReport {
    pub zones: usize,
    pub entities: usize,
    pub hitboxes: usize,
    pub anchors: usize,
    pub placeholder: bool,
}

pub fn status_color(status: ZoneStatus) -> Color {
    let [r, g, b] = status.color_rgb();
    Color::srgb_u8(r, g, b)
}

fn actuator_color(kind: ActuatorKind) -> Color {
    match kind {
        ActuatorKind::Fan => Color::srgb_u8(0x38, 0xbd, 0xf8),
        ActuatorKind::Light => Color::srgb_u8(0xfa, 0xcc, 0x15),
        ActuatorKind::Pump => Color::srgb_u8(0x3b, 0x82, 0xf6),
        ActuatorKind::Heater => Color::srgb_u8(0xf9, 0x73, 0x16),
    }
}

/// Live scene: graph, registry, and the handles the frame loop iterates
#[derive(Debug, Default)]
pub struct Scene {
    pub graph: SceneGraph,
    pub registry: EntityRegistry,
    pub anchors: Vec<AlertAnchor>,
    /// Nodes animated by the pulse effect
    pub pulses: Vec<NodeId>,
    pub placeholder: Option<NodeId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard everything, including the environment
    pub fn clear(&mut self) {
        self.graph.clear();
        self.registry.clear();
        self.anchors.clear();
        self.pulses.clear();
        self.placeholder = None;
    }

    /// Replace the scene with one built from `zones`
    pub fn rebuild(&mut self, zones: &[Zone]) -> Result<BuildReport, RegistryError> {
        self.clear();
        self.build_environment();

        if zones.is_empty() {
            self.build_placeholder();
        } else {
            for zone in zones {
                self.build_zone(zone)?;
            }
        }

        let report = BuildReport {
            zones: zones.len(),
            entities: self.registry.len(),
            hitboxes: self.registry.hitbox_count(),
            anchors: self.anchors.len(),
            placeholder: self.placeholder.is_some(),
        };
        info!(
            zones = report.zones,
            entities = report.entities,
            anchors = report.anchors,
            nodes = self.graph.len(),
            "Scene rebuilt"
        );
        Ok(report)
    }

    fn build_environment(&mut self) {
        self.graph.insert(
            SceneNode::new("ground", Shape::Plane { size: Vec2::splat(30.0) })
                .at(0.0, -0.1, 0.0)
                .with_material(Material::lit(Color::srgb_u8(0x1e, 0x29, 0x3b))),
            None,
        );
        // Glass shell encloses every zone; it must not swallow picking rays
        self.graph.insert(
            SceneNode::new("enclosure", Shape::Cuboid { size: ENCLOSURE_SIZE })
                .at(0.0, 4.0, 0.0)
                .with_material(Material::lit(Color::srgb_u8(0x94, 0xa3, 0xb8)).with_opacity(0.1))
                .with_pickable(false),
            None,
        );
        self.build_enclosure_frame(ENCLOSURE_SIZE, 4.0);
    }

    /// Edge frame of the glass shell, one thin beam per box edge
    fn build_enclosure_frame(&mut self, size: Vec3, center_y: f32) {
        let frame = self.graph.insert(
            SceneNode::group("enclosure-frame").at(0.0, center_y, 0.0),
            None,
        );
        let material = Material::unlit(Color::srgb_u8(0x33, 0x41, 0x55));
        let half = size * 0.5;
        let t = FRAME_BEAM_THICKNESS;

        let mut beams = Vec::with_capacity(12);
        for a in [-1.0, 1.0] {
            for b in [-1.0, 1.0] {
                // along x, y and z respectively
                beams.push((Vec3::new(size.x, t, t), Vec3::new(0.0, a * half.y, b * half.z)));
                beams.push((Vec3::new(t, size.y, t), Vec3::new(a * half.x, 0.0, b * half.z)));
                beams.push((Vec3::new(t, t, size.z), Vec3::new(a * half.x, b * half.y, 0.0)));
            }
        }
        for (beam, offset) in beams {
            self.graph.insert(
                SceneNode::new("frame-beam", Shape::Cuboid { size: beam })
                    .at(offset.x, offset.y, offset.z)
                    .with_material(material.clone())
                    .with_pickable(false),
                Some(frame),
            );
        }
    }

    fn build_placeholder(&mut self) {
        let node = self.graph.insert(
            SceneNode::new(
                "placeholder",
                Shape::Billboard {
                    size: Vec2::new(8.0, 2.0),
                    text: PLACEHOLDER_TEXT.to_string(),
                },
            )
            .at(0.0, 4.0, 0.0)
            .with_material(Material::unlit(Color::srgb_u8(0x1e, 0x29, 0x3b))),
            None,
        );
        self.placeholder = Some(node);
        debug!("Empty zone list, showing placeholder");
    }

    fn build_zone(&mut self, zone: &Zone) -> Result<(), RegistryError> {
        let [x, _, z] = zone.placement.position;
        let w = zone.placement.footprint.width;
        let d = zone.placement.footprint.depth;
        let status = status_color(zone.status);
        let data = EntityData::Zone(zone.clone());

        let group = self
            .graph
            .insert(SceneNode::group(format!("zone:{}", zone.id)).at(x, ZONE_BASE_Y, z), None);

        let planter = self.graph.insert(
            SceneNode::new("planter", Shape::Cuboid { size: Vec3::new(w, 1.0, d) })
                .with_material(Material::lit(Color::srgb_u8(0x33, 0x41, 0x55))),
            Some(group),
        );

        let soil = self.graph.insert(
            SceneNode::new(
                "soil",
                Shape::Cuboid {
                    size: Vec3::new(w - 0.2, 0.1, d - 0.2),
                },
            )
            .at(0.0, 0.5, 0.0)
            .with_material(Material::lit(Color::srgb_u8(0x3f, 0x2e, 0x26))),
            Some(group),
        );

        let crop_material = Material::lit(Color::srgb_u8(0x22, 0xc5, 0x5e));
        for offset in crop_offsets(w, d) {
            self.graph.insert(
                SceneNode::new(
                    "crop",
                    Shape::Cone {
                        radius: 0.2,
                        height: 0.8,
                    },
                )
                .at(offset.x, 0.8, offset.y)
                .with_material(crop_material.clone()),
                Some(group),
            );
        }

        self.graph.insert(
            SceneNode::new(
                "status-strip",
                Shape::Cuboid {
                    size: Vec3::new(w + 0.1, 0.1, d + 0.1),
                },
            )
            .at(0.0, -0.4, 0.0)
            .with_material(Material::unlit(status).with_opacity(0.6)),
            Some(group),
        );

        // The group itself is a hitbox so crops and markers bubble up to the zone
        for node in [group, planter, soil] {
            self.registry
                .register(node, EntityKind::Zone, &zone.id, data.clone())?;
        }

        let count = zone.actuators.len();
        for (i, actuator) in zone.actuators.iter().enumerate() {
            let ax = -w * 0.5 + (i as f32 + 1.0) * w / (count as f32 + 1.0);
            let marker = self.graph.insert(
                SceneNode::new(
                    format!("actuator:{}", actuator.id),
                    Shape::Cylinder {
                        radius: 0.15,
                        height: 0.5,
                    },
                )
                .at(ax, 0.8, d * 0.5 - 0.3)
                .with_material(Material::lit(actuator_color(actuator.kind))),
                Some(group),
            );
            self.registry.register(
                marker,
                EntityKind::Actuator,
                &actuator.id,
                EntityData::Actuator(actuator.clone()),
            )?;
        }

        if let Some(text) = zone.alert_text() {
            let anchor = self.graph.insert(
                SceneNode::group("alert-anchor").at(ANCHOR_OFFSET.x, ANCHOR_OFFSET.y, ANCHOR_OFFSET.z),
                Some(group),
            );
            let pulse = self.graph.insert(
                SceneNode::new("alert-pulse", Shape::Sphere { radius: 0.3 })
                    .at(ANCHOR_OFFSET.x, ANCHOR_OFFSET.y, ANCHOR_OFFSET.z)
                    .with_material(Material::unlit(status).wireframe()),
                Some(group),
            );
            self.anchors.push(AlertAnchor {
                zone_id: zone.id.clone(),
                status: zone.status,
                text,
                node: anchor,
            });
            self.pulses.push(pulse);
        }

        Ok(())
    }

    /// Status strip color of the zone `zone_id`, if it is in the scene
    pub fn status_color_of(&self, zone_id: &str) -> Option<Color> {
        let group_name = format!("zone:{}", zone_id);
        let group = self
            .graph
            .iter()
            .find(|(_, node)| node.name == group_name)
            .map(|(id, _)| id)?;
        self.graph
            .iter()
            .find(|(_, node)| node.parent == Some(group) && node.name == "status-strip")
            .map(|(_, node)| node.material.color)
    }
}

/// Two rows of crops laid out evenly inside the soil bed
fn crop_offsets(width: f32, depth: f32) -> impl Iterator<Item = Vec2> {
    let columns = 2;
    let rows = CROPS_PER_ZONE / columns;
    let span_x = (width - 0.5).max(0.0);
    let span_z = (depth - 0.5).max(0.0);
    (0..CROPS_PER_ZONE).map(move |i| {
        let column = (i % columns) as f32;
        let row = (i / columns) as f32;
        Vec2::new(
            -span_x * 0.5 + (column + 0.5) * span_x / columns as f32,
            -span_z * 0.5 + (row + 0.5) * span_z / rows as f32,
        )
    })
}

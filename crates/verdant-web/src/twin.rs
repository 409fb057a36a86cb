//! Bevy host for the viewer: container, surface, and ECS mirroring

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bevy::prelude::*;
use bevy::render::renderer::RenderDevice;
use tracing::{debug, error};
use verdant_scene::{
    CameraPose, Container, Frame, ListenerId, Material as NodeMaterial,
    PointerEventKind, RenderSurface, Shape, Viewer, ViewerConfig, ViewerError, Viewport,
};

pub struct TwinPlugin {
    pub config: ViewerConfig,
}

impl Plugin for TwinPlugin {
    fn build(&self, app: &mut App) {
        app.insert_non_send_resource(TwinViewer::new(self.config.clone()))
            .init_resource::<ViewerStatus>()
            .init_resource::<MirroredEpoch>()
            .add_systems(Startup, setup_stage)
            .add_systems(Update, (mount_viewer, drive_viewer, mirror_scene).chain());
    }
}

/// Marker component for the camera the viewer drives
#[derive(Component)]
pub struct TwinCamera;

/// Entity standing in for one scene-graph node
#[derive(Component)]
pub struct TwinNode {
    pub index: usize,
}

/// Lifecycle of the viewer mount, shown by the UI
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub enum ViewerStatus {
    #[default]
    Starting,
    Running,
    /// Mount failed; the UI shows a fallback instead of the 3D view
    Failed(String),
}

/// Scene-graph epoch currently mirrored into ECS entities
#[derive(Resource, Default)]
struct MirroredEpoch(Option<u32>);

/// One node as drawn in the last frame
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub index: usize,
    pub world: Mat4,
    pub shape: Shape,
    pub material: NodeMaterial,
}

/// What the surface handed over for the ECS to display
#[derive(Debug, Clone)]
pub struct DrawList {
    pub epoch: u32,
    pub frame: u64,
    pub pose: CameraPose,
    pub items: Vec<DrawItem>,
}

/// State shared between the container, its surface, and Bevy systems
pub struct HostLink {
    viewport: Viewport,
    listeners: Vec<(ListenerId, PointerEventKind)>,
    next_listener: u32,
    frame_requested: bool,
    draw: Option<DrawList>,
}

impl Default for HostLink {
    fn default() -> Self {
        Self {
            viewport: Viewport::new(0.0, 0.0),
            listeners: Vec::new(),
            next_listener: 0,
            frame_requested: false,
            draw: None,
        }
    }
}

impl HostLink {
    pub fn is_listening(&self, kind: PointerEventKind) -> bool {
        self.listeners.iter().any(|(_, k)| *k == kind)
    }
}

pub struct BevyContainer {
    link: Rc<RefCell<HostLink>>,
    /// Whether the render plugin produced a GPU device
    context_available: bool,
}

pub struct BevySurface {
    link: Rc<RefCell<HostLink>>,
}

impl RenderSurface for BevySurface {
    fn draw(&mut self, frame: &Frame<'_>) {
        let items = frame
            .graph
            .iter()
            .filter(|(_, node)| !matches!(node.shape, Shape::Empty))
            .filter_map(|(id, node)| {
                Some(DrawItem {
                    index: id.index(),
                    world: frame.graph.world_matrix(id)?,
                    shape: node.shape.clone(),
                    material: node.material.clone(),
                })
            })
            .collect();

        self.link.borrow_mut().draw = Some(DrawList {
            epoch: frame.graph.epoch(),
            frame: frame.number,
            pose: frame.pose,
            items,
        });
    }

    fn release(&mut self) {
        self.link.borrow_mut().draw = None;
    }
}

impl Container for BevyContainer {
    type Surface = BevySurface;

    fn create_surface(&mut self, _viewport: Viewport) -> Result<BevySurface, ViewerError> {
        if !self.context_available {
            return Err(ViewerError::ContextAcquisition(
                "no GPU render device (WebGPU/WebGL2 unsupported?)".to_string(),
            ));
        }
        Ok(BevySurface {
            link: self.link.clone(),
        })
    }

    fn viewport(&self) -> Viewport {
        self.link.borrow().viewport
    }

    fn listen(&mut self, kind: PointerEventKind) -> ListenerId {
        let mut link = self.link.borrow_mut();
        link.next_listener += 1;
        let id = ListenerId(link.next_listener);
        link.listeners.push((id, kind));
        id
    }

    fn unlisten(&mut self, id: ListenerId) {
        self.link.borrow_mut().listeners.retain(|(l, _)| *l != id);
    }

    fn request_frame(&mut self) {
        self.link.borrow_mut().frame_requested = true;
    }
}

/// The viewer lives on the main thread; `Rc` state keeps it non-send
pub struct TwinViewer {
    pub viewer: Viewer<BevyContainer>,
    pub link: Rc<RefCell<HostLink>>,
}

impl TwinViewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            viewer: Viewer::new(config),
            link: Rc::new(RefCell::new(HostLink::default())),
        }
    }
}

fn viewport_of(window: &Window) -> Viewport {
    Viewport::new(window.width(), window.height()).with_device_pixel_ratio(window.scale_factor())
}

fn setup_stage(mut commands: Commands) {
    let pose = CameraPose {
        position: Vec3::new(0.0, 12.0, 18.0),
        target: Vec3::ZERO,
        up: Vec3::Y,
        fov_y_radians: 45f32.to_radians(),
        near: 0.1,
        far: 100.0,
    };
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: pose.fov_y_radians,
            near: pose.near,
            far: pose.far,
            ..default()
        }),
        Transform::from_translation(pose.position).looking_at(pose.target, pose.up),
        TwinCamera,
    ));

    // Soft fill so shaded sides of the planters stay readable
    commands.spawn((
        PointLight {
            intensity: 2_000_000.0,
            range: 60.0,
            shadows_enabled: false,
            color: Color::srgb(0.9, 0.95, 1.0),
            ..default()
        },
        Transform::from_xyz(-8.0, 10.0, -6.0),
    ));

    // Sunlight through the greenhouse roof
    commands.spawn((
        DirectionalLight {
            illuminance: 8000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 20.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

/// Mount once the window exists; a missing GPU device is a context failure
fn mount_viewer(
    mut twin: NonSendMut<TwinViewer>,
    mut status: ResMut<ViewerStatus>,
    windows: Query<&Window>,
    render_device: Option<Res<RenderDevice>>,
) {
    if *status != ViewerStatus::Starting {
        return;
    }
    let Ok(window) = windows.single() else {
        return;
    };

    twin.link.borrow_mut().viewport = viewport_of(window);
    let container = BevyContainer {
        link: twin.link.clone(),
        context_available: render_device.is_some(),
    };

    match twin.viewer.mount(container) {
        Ok(_) => {
            *status = ViewerStatus::Running;
        }
        Err(e) => {
            error!("Viewer mount failed: {}", e);
            *status = ViewerStatus::Failed(e.to_string());
        }
    }
}

/// Run a viewer frame whenever the viewer asked for one
pub fn drive_viewer(mut twin: NonSendMut<TwinViewer>, windows: Query<&Window>, time: Res<Time<Real>>) {
    let requested = {
        let mut link = twin.link.borrow_mut();
        if let Ok(window) = windows.single() {
            link.viewport = viewport_of(window);
        }
        std::mem::take(&mut link.frame_requested)
    };
    if requested {
        twin.viewer.frame(time.elapsed());
    }
}

fn mesh_for(shape: &Shape) -> Option<Mesh> {
    let mesh = match shape {
        Shape::Empty => return None,
        Shape::Cuboid { size } => Cuboid::from_size(*size).into(),
        Shape::Plane { size } => Plane3d::new(Vec3::Y, *size * 0.5).into(),
        Shape::Cone { radius, height } => Cone {
            radius: *radius,
            height: *height,
        }
        .into(),
        Shape::Cylinder { radius, height } => Cylinder::new(*radius, *height).into(),
        Shape::Sphere { radius } => Sphere::new(*radius).into(),
        // Caption text is drawn by the overlay
        Shape::Billboard { size, .. } => Rectangle::new(size.x, size.y).into(),
    };
    Some(mesh)
}

fn material_for(material: &NodeMaterial) -> StandardMaterial {
    // Without a line renderer, wireframes are drawn as faint shells
    let alpha = if material.wireframe {
        material.opacity.min(0.45)
    } else {
        material.opacity
    };
    let mut standard = StandardMaterial {
        base_color: material.color.with_alpha(alpha),
        unlit: material.unlit,
        ..default()
    };
    if alpha < 1.0 {
        standard.alpha_mode = AlphaMode::Blend;
        standard.double_sided = true;
        standard.cull_mode = None;
    }
    standard
}

/// Mirror the last drawn frame into Bevy entities and the camera.
///
/// A new epoch means a rebuilt scene: every mirrored entity is replaced.
/// Within an epoch only transforms change.
fn mirror_scene(
    mut commands: Commands,
    twin: NonSend<TwinViewer>,
    mut mirrored: ResMut<MirroredEpoch>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut nodes: Query<(Entity, &TwinNode, &mut Transform), Without<TwinCamera>>,
    mut camera: Query<(&mut Transform, &mut Projection), With<TwinCamera>>,
) {
    let link = twin.link.borrow();
    let Some(draw) = link.draw.as_ref() else {
        // Surface released: nothing may remain on screen
        if mirrored.0.take().is_some() {
            for (entity, _, _) in nodes.iter() {
                commands.entity(entity).despawn();
            }
        }
        return;
    };

    if let Ok((mut transform, mut projection)) = camera.single_mut() {
        *transform = Transform::from_translation(draw.pose.position)
            .looking_at(draw.pose.target, draw.pose.up);
        if let Projection::Perspective(perspective) = projection.as_mut() {
            perspective.fov = draw.pose.fov_y_radians;
            perspective.near = draw.pose.near;
            perspective.far = draw.pose.far;
        }
    }

    if mirrored.0 == Some(draw.epoch) {
        let worlds: HashMap<usize, &Mat4> = draw.items.iter().map(|i| (i.index, &i.world)).collect();
        for (_, node, mut transform) in nodes.iter_mut() {
            if let Some(world) = worlds.get(&node.index) {
                *transform = Transform::from_matrix(**world);
            }
        }
        return;
    }

    for (entity, _, _) in nodes.iter() {
        commands.entity(entity).despawn();
    }
    for item in &draw.items {
        let Some(mesh) = mesh_for(&item.shape) else {
            continue;
        };
        commands.spawn((
            Mesh3d(meshes.add(mesh)),
            MeshMaterial3d(materials.add(material_for(&item.material))),
            Transform::from_matrix(item.world),
            TwinNode { index: item.index },
        ));
    }
    debug!(epoch = draw.epoch, frame = draw.frame, entities = draw.items.len(), "Mirrored rebuilt scene");
    mirrored.0 = Some(draw.epoch);
}

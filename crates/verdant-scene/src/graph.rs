//! Arena scene graph with local transforms, primitive shapes, and ray casting
//!
//! Nodes live in a flat `Vec` and refer to their parent by [`NodeId`]. A
//! parent is always inserted before its children, so ancestor walks are
//! bounded by the arena length. [`SceneGraph::clear`] bumps an epoch so that
//! handles from a previous build never resolve against the new one.

use bevy::color::Color;
use bevy::math::{Mat4, Quat, Ray3d, Vec2, Vec3};

/// Stable handle to a node in one build of the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    epoch: u32,
    index: u32,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Renderable primitive, centered on the node origin
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Grouping or anchor node with no geometry
    Empty,
    Cuboid { size: Vec3 },
    /// Horizontal plane facing +Y
    Plane { size: Vec2 },
    /// Y-aligned cone
    Cone { radius: f32, height: f32 },
    /// Y-aligned cylinder
    Cylinder { radius: f32, height: f32 },
    Sphere { radius: f32 },
    /// Vertical quad facing +Z carrying a text caption
    Billboard { size: Vec2, text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Color,
    pub opacity: f32,
    pub unlit: bool,
    pub wireframe: bool,
}

impl Material {
    pub fn lit(color: Color) -> Self {
        Self {
            color,
            opacity: 1.0,
            unlit: false,
            wireframe: false,
        }
    }

    pub fn unlit(color: Color) -> Self {
        Self {
            unlit: true,
            ..Self::lit(color)
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn wireframe(mut self) -> Self {
        self.wireframe = true;
        self
    }

    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::lit(Color::WHITE)
    }
}

/// Transform relative to the parent node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl LocalTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self {
            translation: Vec3::new(x, y, z),
            ..Self::IDENTITY
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub transform: LocalTransform,
    pub shape: Shape,
    pub material: Material,
    /// Whether picking rays test this node's geometry
    pub pickable: bool,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        let pickable = !matches!(shape, Shape::Empty | Shape::Billboard { .. });
        Self {
            name: name.into(),
            parent: None,
            transform: LocalTransform::IDENTITY,
            shape,
            material: Material::default(),
            pickable,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, Shape::Empty)
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.translation = Vec3::new(x, y, z);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_pickable(mut self, pickable: bool) -> Self {
        self.pickable = pickable;
        self
    }
}

/// Nearest intersection reported by [`SceneGraph::raycast`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub node: NodeId,
    /// Distance along the ray in world units
    pub distance: f32,
    pub point: Vec3,
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    epoch: u32,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every node and invalidate all outstanding handles
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Build generation; changes on every [`clear`](Self::clear)
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.epoch == self.epoch && id.index() < self.nodes.len()
    }

    /// Insert `node` under `parent`. A stale parent handle makes it a root.
    pub fn insert(&mut self, mut node: SceneNode, parent: Option<NodeId>) -> NodeId {
        node.parent = parent.filter(|p| self.contains(*p));
        let id = NodeId {
            epoch: self.epoch,
            index: self.nodes.len() as u32,
        };
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        if self.contains(id) {
            self.nodes.get(id.index())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        if self.contains(id) {
            self.nodes.get_mut(id.index())
        } else {
            None
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        let epoch = self.epoch;
        self.nodes.iter().enumerate().map(move |(index, node)| {
            (
                NodeId {
                    epoch,
                    index: index as u32,
                },
                node,
            )
        })
    }

    /// Composed transform from node space to world space
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.get(id)?;
        let mut matrix = node.transform.to_matrix();
        for _ in 0..self.nodes.len() {
            let Some(parent) = node.parent.and_then(|p| self.get(p)) else {
                break;
            };
            matrix = parent.transform.to_matrix() * matrix;
            node = parent;
        }
        Some(matrix)
    }

    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        self.world_matrix(id).map(|m| m.transform_point3(Vec3::ZERO))
    }

    /// Nearest pickable node hit by `ray`, ties going to the earlier node
    pub fn raycast(&self, ray: Ray3d) -> Option<RayHit> {
        let direction: Vec3 = *ray.direction;
        let mut nearest: Option<RayHit> = None;

        for (id, node) in self.iter() {
            if !node.pickable {
                continue;
            }
            let Some(world) = self.world_matrix(id) else {
                continue;
            };
            if world.determinant().abs() < f32::EPSILON {
                continue;
            }
            let inverse = world.inverse();
            // The local direction is left unnormalized so `t` stays in world units
            let local_origin = inverse.transform_point3(ray.origin);
            let local_direction = inverse.transform_vector3(direction);

            let Some(t) = intersect_shape(&node.shape, local_origin, local_direction) else {
                continue;
            };
            if nearest.map_or(true, |hit| t < hit.distance) {
                nearest = Some(RayHit {
                    node: id,
                    distance: t,
                    point: ray.origin + direction * t,
                });
            }
        }

        nearest
    }
}

fn intersect_shape(shape: &Shape, origin: Vec3, direction: Vec3) -> Option<f32> {
    match shape {
        Shape::Empty | Shape::Billboard { .. } => None,
        Shape::Cuboid { size } => intersect_aabb(origin, direction, *size * -0.5, *size * 0.5),
        // Cones and cylinders are tested against their bounding box
        Shape::Cone { radius, height } | Shape::Cylinder { radius, height } => {
            let half = Vec3::new(*radius, height * 0.5, *radius);
            intersect_aabb(origin, direction, -half, half)
        }
        Shape::Sphere { radius } => intersect_sphere(origin, direction, *radius),
        Shape::Plane { size } => intersect_plane(origin, direction, *size),
    }
}

fn intersect_aabb(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let mut t_near = f32::NEG_INFINITY;
    let mut t_far = f32::INFINITY;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < f32::EPSILON {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let t1 = (min[axis] - o) / d;
        let t2 = (max[axis] - o) / d;
        t_near = t_near.max(t1.min(t2));
        t_far = t_far.min(t1.max(t2));
        if t_near > t_far {
            return None;
        }
    }

    if t_near >= 0.0 {
        Some(t_near)
    } else if t_far >= 0.0 {
        Some(t_far)
    } else {
        None
    }
}

fn intersect_sphere(origin: Vec3, direction: Vec3, radius: f32) -> Option<f32> {
    let a = direction.length_squared();
    let b = 2.0 * origin.dot(direction);
    let c = origin.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if a < f32::EPSILON || discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let t0 = (-b - root) / (2.0 * a);
    let t1 = (-b + root) / (2.0 * a);
    if t0 >= 0.0 {
        Some(t0)
    } else if t1 >= 0.0 {
        Some(t1)
    } else {
        None
    }
}

fn intersect_plane(origin: Vec3, direction: Vec3, size: Vec2) -> Option<f32> {
    if direction.y.abs() < f32::EPSILON {
        return None;
    }
    let t = -origin.y / direction.y;
    if t < 0.0 {
        return None;
    }
    let hit = origin + direction * t;
    (hit.x.abs() <= size.x * 0.5 && hit.z.abs() <= size.y * 0.5).then_some(t)
}

//! Entity registry: which logical zone or actuator a scene node stands for

use std::collections::HashMap;

use thiserror::Error;
use verdant_core::{Actuator, Zone};

use crate::graph::{NodeId, SceneGraph};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("entity data does not match kind {0:?}")]
    KindMismatch(EntityKind),
    #[error("node {node:?} is already bound to {existing_kind:?} '{existing_id}'")]
    NodeAlreadyBound {
        node: NodeId,
        existing_kind: EntityKind,
        existing_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Zone,
    Actuator,
}

/// Display data carried alongside the logical entity
#[derive(Debug, Clone, PartialEq)]
pub enum EntityData {
    Zone(Zone),
    Actuator(Actuator),
}

impl EntityData {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Zone(_) => EntityKind::Zone,
            Self::Actuator(_) => EntityKind::Actuator,
        }
    }
}

/// Handle into the registry's entity arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(u32);

#[derive(Debug, Clone, PartialEq)]
pub struct SceneEntity {
    pub kind: EntityKind,
    pub id: String,
    pub data: EntityData,
}

impl SceneEntity {
    pub fn zone(&self) -> Option<&Zone> {
        match &self.data {
            EntityData::Zone(zone) => Some(zone),
            EntityData::Actuator(_) => None,
        }
    }

    pub fn actuator(&self) -> Option<&Actuator> {
        match &self.data {
            EntityData::Actuator(actuator) => Some(actuator),
            EntityData::Zone(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Vec<SceneEntity>,
    by_key: HashMap<(EntityKind, String), EntityHandle>,
    by_node: HashMap<NodeId, EntityHandle>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `node` to the logical entity `(kind, id)`.
    ///
    /// Several nodes may share one entity; the first registration's data is
    /// kept. Rebinding a node to a different entity is an error.
    pub fn register(
        &mut self,
        node: NodeId,
        kind: EntityKind,
        id: &str,
        data: EntityData,
    ) -> Result<EntityHandle, RegistryError> {
        if data.kind() != kind {
            return Err(RegistryError::KindMismatch(kind));
        }

        let key = (kind, id.to_string());
        if let Some(existing) = self.by_node.get(&node).and_then(|h| self.get(*h)) {
            if existing.kind != kind || existing.id != id {
                return Err(RegistryError::NodeAlreadyBound {
                    node,
                    existing_kind: existing.kind,
                    existing_id: existing.id.clone(),
                });
            }
        }

        let handle = match self.by_key.get(&key) {
            Some(handle) => *handle,
            None => {
                let handle = EntityHandle(self.entities.len() as u32);
                self.entities.push(SceneEntity {
                    kind,
                    id: id.to_string(),
                    data,
                });
                self.by_key.insert(key, handle);
                handle
            }
        };
        self.by_node.insert(node, handle);
        Ok(handle)
    }

    /// Walk from `node` up its ancestors to the first registered node
    pub fn resolve_handle(&self, graph: &SceneGraph, node: NodeId) -> Option<EntityHandle> {
        let mut current = Some(node);
        // Parents precede children in the arena, so the walk is bounded by its length
        for _ in 0..=graph.len() {
            let id = current?;
            if let Some(handle) = self.by_node.get(&id) {
                return Some(*handle);
            }
            current = graph.parent(id);
        }
        None
    }

    pub fn resolve(&self, graph: &SceneGraph, node: NodeId) -> Option<&SceneEntity> {
        self.resolve_handle(graph, node).and_then(|h| self.get(h))
    }

    pub fn get(&self, handle: EntityHandle) -> Option<&SceneEntity> {
        self.entities.get(handle.0 as usize)
    }

    pub fn find(&self, kind: EntityKind, id: &str) -> Option<EntityHandle> {
        self.by_key.get(&(kind, id.to_string())).copied()
    }

    /// Number of logical entities (not hitboxes)
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn hitbox_count(&self) -> usize {
        self.by_node.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneEntity> {
        self.entities.iter()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.by_key.clear();
        self.by_node.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SceneNode;
    use verdant_core::{slot_for_index, ZoneStatus};

    fn zone(id: &str) -> Zone {
        Zone {
            id: id.to_string(),
            name: format!("Zone {}", id),
            crop: "Lettuce".to_string(),
            status: ZoneStatus::Optimal,
            moisture: None,
            temperature: None,
            days_planted: None,
            alert: None,
            placement: slot_for_index(0),
            actuators: Vec::new(),
        }
    }

    #[test]
    fn test_shared_hitboxes_resolve_to_one_entity() {
        let mut graph = SceneGraph::new();
        let mut registry = EntityRegistry::new();
        let group = graph.insert(SceneNode::group("zone"), None);
        let planter = graph.insert(SceneNode::group("planter"), Some(group));
        let crop = graph.insert(SceneNode::group("crop"), Some(group));

        let a = registry
            .register(group, EntityKind::Zone, "A", EntityData::Zone(zone("A")))
            .unwrap();
        let b = registry
            .register(planter, EntityKind::Zone, "A", EntityData::Zone(zone("A")))
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.hitbox_count(), 2);
        // Unregistered child bubbles up to the group
        assert_eq!(registry.resolve(&graph, crop).map(|e| e.id.as_str()), Some("A"));
    }

    #[test]
    fn test_rebinding_node_is_rejected() {
        let mut graph = SceneGraph::new();
        let mut registry = EntityRegistry::new();
        let node = graph.insert(SceneNode::group("planter"), None);

        registry
            .register(node, EntityKind::Zone, "A", EntityData::Zone(zone("A")))
            .unwrap();
        let err = registry
            .register(node, EntityKind::Zone, "B", EntityData::Zone(zone("B")))
            .unwrap_err();
        assert!(matches!(err, RegistryError::NodeAlreadyBound { .. }));
        assert_eq!(registry.resolve(&graph, node).map(|e| e.id.as_str()), Some("A"));
    }

    #[test]
    fn test_kind_must_match_data() {
        let mut graph = SceneGraph::new();
        let mut registry = EntityRegistry::new();
        let node = graph.insert(SceneNode::group("x"), None);
        assert_eq!(
            registry.register(node, EntityKind::Actuator, "A", EntityData::Zone(zone("A"))),
            Err(RegistryError::KindMismatch(EntityKind::Actuator))
        );
    }

    #[test]
    fn test_unregistered_root_resolves_to_none() {
        let mut graph = SceneGraph::new();
        let registry = EntityRegistry::new();
        let ground = graph.insert(SceneNode::group("ground"), None);
        assert!(registry.resolve(&graph, ground).is_none());
    }
}

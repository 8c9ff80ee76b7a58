use std::collections::HashMap;

use tracing::trace;

use crate::model::{Node, NodeId, Properties};

/// The identity map of a session: one snapshot per node id, as last loaded or
/// saved.
#[derive(Debug, Default)]
pub struct MappingContext {
    nodes: HashMap<NodeId, Node>,
}

impl MappingContext {
    pub fn new() -> MappingContext {
        MappingContext::default()
    }

    /// Registers a node, replacing (refreshing) any previous snapshot with the
    /// same id.
    pub fn merge(&mut self, node: Node) -> &Node {
        let id = node.id;
        if self.nodes.insert(id, node).is_some() {
            trace!(%id, "refreshed snapshot");
        }
        &self.nodes[&id]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Checks whether `properties` differ from the snapshot of the given node.
    /// Nodes without a snapshot are always dirty.
    pub fn is_dirty(&self, id: NodeId, properties: &Properties) -> bool {
        self.nodes
            .get(&id)
            .map_or(true, |node| &node.properties != properties)
    }

    /// Forgets a node. Returns whether there was a snapshot of it.
    pub fn evict(&mut self, id: NodeId) -> bool {
        self.nodes.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

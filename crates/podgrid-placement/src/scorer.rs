//! Candidate nodes for placement decisions.
//!
//! Builds a [`NodeResources`] view of every node that could accept a pod:
//! - **Health**: only `Healthy` nodes are candidates
//! - **Resource availability**: reject nodes that can't fit the request
//! - **Exclusion**: optionally skip one node (the one being evacuated)

use podgrid_state::{ClusterState, Node, NodeId};

/// Resource capacity and usage for a single node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeResources {
    pub node_id: NodeId,
    pub capacity: u32,
    pub used: u64,
}

impl NodeResources {
    pub fn from_node(node: &Node) -> Self {
        Self {
            node_id: node.id.clone(),
            capacity: node.capacity,
            used: node.used(),
        }
    }

    pub fn free(&self) -> u64 {
        u64::from(self.capacity).saturating_sub(self.used)
    }

    /// Capacity left over if `cpu_request` were placed here.
    pub fn leftover(&self, cpu_request: u32) -> u64 {
        self.free().saturating_sub(u64::from(cpu_request))
    }
}

/// Healthy nodes with room for `cpu_request`, ordered by node id.
pub fn eligible_nodes(
    state: &ClusterState,
    cpu_request: u32,
    exclude: Option<&str>,
) -> Vec<NodeResources> {
    state
        .nodes()
        .filter(|n| n.is_healthy())
        .filter(|n| exclude != Some(n.id.as_str()))
        .filter(|n| n.fits(cpu_request))
        .map(NodeResources::from_node)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgrid_state::NodeStatus;

    fn state() -> ClusterState {
        let mut state = ClusterState::new();
        state.insert_node(Node::new("n2", 8, 0));
        state.insert_node(Node::new("n1", 4, 0));
        let mut down = Node::new("n3", 16, 0);
        down.status = NodeStatus::Unhealthy;
        state.insert_node(down);
        state
    }

    #[test]
    fn rejects_unhealthy_node() {
        let ids: Vec<_> = eligible_nodes(&state(), 1, None)
            .into_iter()
            .map(|n| n.node_id)
            .collect();
        assert_eq!(ids, vec!["n1", "n2"]);
    }

    #[test]
    fn rejects_insufficient_capacity() {
        let mut state = state();
        state.place_pod("p1", 3, "n1").unwrap();

        let ids: Vec<_> = eligible_nodes(&state, 2, None)
            .into_iter()
            .map(|n| n.node_id)
            .collect();
        assert_eq!(ids, vec!["n2"]);
    }

    #[test]
    fn exact_fit_is_eligible() {
        let eligible = eligible_nodes(&state(), 4, None);
        assert!(eligible.iter().any(|n| n.node_id == "n1" && n.leftover(4) == 0));
    }

    #[test]
    fn excluded_node_is_skipped() {
        let eligible = eligible_nodes(&state(), 1, Some("n1"));
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].node_id, "n2");
    }
}

//! In-memory view of the whole cluster.
//!
//! `ClusterState` is what [`crate::StateStore::snapshot`] returns and what
//! [`crate::StateStore::apply`] hands to mutation closures. Maps are ordered
//! by id, so iteration is deterministic (lowest id first).

use std::collections::{BTreeMap, HashMap};

use crate::error::{StateError, StateResult};
use crate::types::*;

/// All node and pod records as of one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterState {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) pods: BTreeMap<PodId, Pod>,
}

impl ClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// All nodes, ordered by id.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Insert or replace a node record.
    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Remove a node record, returning it. Pods that referenced it are left
    /// untouched; callers must detach them in the same transaction.
    pub fn remove_node(&mut self, node_id: &str) -> Option<Node> {
        self.nodes.remove(node_id)
    }

    // ── Pods ───────────────────────────────────────────────────────

    /// All pods, ordered by id.
    pub fn pods(&self) -> impl Iterator<Item = &Pod> {
        self.pods.values()
    }

    pub fn pod(&self, pod_id: &str) -> Option<&Pod> {
        self.pods.get(pod_id)
    }

    pub fn contains_pod(&self, pod_id: &str) -> bool {
        self.pods.contains_key(pod_id)
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    /// Record `pod_id` as Running on `node_id` and append the placement.
    ///
    /// Any previous placement of the pod is removed first, so this is also
    /// how a pod migrates. Capacity is not checked here; `validate` rejects
    /// an over-committed node at commit time.
    pub fn place_pod(&mut self, pod_id: &str, cpu_request: u32, node_id: &str) -> StateResult<()> {
        if !self.nodes.contains_key(node_id) {
            return Err(StateError::InvariantViolation(format!(
                "cannot place pod {pod_id} on unknown node {node_id}"
            )));
        }
        self.unlink_placement(pod_id);
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.placements.push(Placement {
                pod_id: pod_id.to_string(),
                cpu_units: cpu_request,
            });
        }
        self.pods.insert(
            pod_id.to_string(),
            Pod::running(pod_id, cpu_request, node_id),
        );
        Ok(())
    }

    /// Record `pod_id` as Unscheduled, removing any placement it holds.
    pub fn unschedule_pod(&mut self, pod_id: &str, cpu_request: u32) {
        self.unlink_placement(pod_id);
        self.pods
            .insert(pod_id.to_string(), Pod::unscheduled(pod_id, cpu_request));
    }

    /// Delete a pod and its placement entry.
    pub fn remove_pod(&mut self, pod_id: &str) -> Option<Pod> {
        self.unlink_placement(pod_id);
        self.pods.remove(pod_id)
    }

    /// Drop the placement entry for `pod_id` from whichever node holds it.
    fn unlink_placement(&mut self, pod_id: &str) {
        let Some(node_id) = self
            .pods
            .get(pod_id)
            .and_then(|p| p.assigned_node.clone())
        else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.placements.retain(|p| p.pod_id != pod_id);
        }
    }

    // ── Invariants ─────────────────────────────────────────────────

    /// Check every cluster invariant. Called before each commit.
    ///
    /// - every node: Σ placement cpu ≤ capacity, capacity > 0
    /// - every placement refers to a pod Running on that node with the
    ///   same cpu, and each pod is placed at most once
    /// - every Running pod has an assigned, existing node holding its
    ///   placement; every Unscheduled pod has no assigned node
    pub fn validate(&self) -> StateResult<()> {
        let mut placed: HashMap<&str, &str> = HashMap::new();

        for node in self.nodes.values() {
            if node.capacity == 0 {
                return violation(format!("node {} has zero capacity", node.id));
            }
            if node.used() > u64::from(node.capacity) {
                return violation(format!(
                    "node {} over capacity: used {} > capacity {}",
                    node.id,
                    node.used(),
                    node.capacity
                ));
            }
            for placement in &node.placements {
                if let Some(other) = placed.insert(placement.pod_id.as_str(), node.id.as_str()) {
                    return violation(format!(
                        "pod {} placed on both {} and {}",
                        placement.pod_id, other, node.id
                    ));
                }
                match self.pods.get(&placement.pod_id) {
                    Some(pod)
                        if pod.is_running()
                            && pod.assigned_node.as_deref() == Some(node.id.as_str())
                            && pod.cpu_request == placement.cpu_units => {}
                    Some(_) => {
                        return violation(format!(
                            "placement of pod {} on node {} disagrees with pod record",
                            placement.pod_id, node.id
                        ));
                    }
                    None => {
                        return violation(format!(
                            "node {} holds placement for unknown pod {}",
                            node.id, placement.pod_id
                        ));
                    }
                }
            }
        }

        for pod in self.pods.values() {
            if pod.cpu_request == 0 {
                return violation(format!("pod {} has zero cpu request", pod.id));
            }
            match (pod.status, pod.assigned_node.as_deref()) {
                (PodStatus::Running, Some(node_id)) => {
                    if placed.get(pod.id.as_str()) != Some(&node_id) {
                        return violation(format!(
                            "running pod {} not placed on its node {}",
                            pod.id, node_id
                        ));
                    }
                }
                (PodStatus::Running, None) => {
                    return violation(format!("running pod {} has no node", pod.id));
                }
                (PodStatus::Unscheduled, Some(node_id)) => {
                    return violation(format!(
                        "unscheduled pod {} still references node {}",
                        pod.id, node_id
                    ));
                }
                (PodStatus::Unscheduled, None) => {}
            }
        }

        Ok(())
    }
}

fn violation(msg: String) -> StateResult<()> {
    Err(StateError::InvariantViolation(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_nodes() -> ClusterState {
        let mut state = ClusterState::new();
        state.insert_node(Node::new("a", 4, 0));
        state.insert_node(Node::new("b", 8, 0));
        state
    }

    #[test]
    fn empty_state_is_valid() {
        assert!(ClusterState::new().validate().is_ok());
    }

    #[test]
    fn place_pod_links_both_sides() {
        let mut state = two_nodes();
        state.place_pod("p1", 3, "a").unwrap();

        let node = state.node("a").unwrap();
        assert_eq!(node.used(), 3);
        assert_eq!(node.available(), 1);
        let pod = state.pod("p1").unwrap();
        assert_eq!(pod.assigned_node.as_deref(), Some("a"));
        assert!(pod.is_running());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn place_pod_moves_existing_placement() {
        let mut state = two_nodes();
        state.place_pod("p1", 3, "a").unwrap();
        state.place_pod("p1", 3, "b").unwrap();

        assert!(state.node("a").unwrap().placements.is_empty());
        assert_eq!(state.node("b").unwrap().used(), 3);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn place_pod_on_unknown_node_fails() {
        let mut state = two_nodes();
        assert!(state.place_pod("p1", 1, "zzz").is_err());
        assert!(!state.contains_pod("p1"));
    }

    #[test]
    fn unschedule_clears_placement() {
        let mut state = two_nodes();
        state.place_pod("p1", 2, "a").unwrap();
        state.unschedule_pod("p1", 2);

        assert!(state.node("a").unwrap().placements.is_empty());
        assert_eq!(state.pod("p1").unwrap().status, PodStatus::Unscheduled);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn remove_pod_clears_placement() {
        let mut state = two_nodes();
        state.place_pod("p1", 2, "a").unwrap();
        assert!(state.remove_pod("p1").is_some());
        assert!(state.remove_pod("p1").is_none());
        assert_eq!(state.node("a").unwrap().used(), 0);
    }

    #[test]
    fn over_capacity_is_rejected() {
        let mut state = two_nodes();
        state.place_pod("p1", 3, "a").unwrap();
        state.place_pod("p2", 3, "a").unwrap();

        let err = state.validate().unwrap_err();
        assert!(matches!(err, StateError::InvariantViolation(_)));
    }

    #[test]
    fn dangling_pod_reference_is_rejected() {
        let mut state = two_nodes();
        state.place_pod("p1", 1, "a").unwrap();
        // Removing the node without detaching leaves the pod dangling.
        state.remove_node("a");
        assert!(state.validate().is_err());
    }

    #[test]
    fn orphaned_placement_is_rejected() {
        let mut state = two_nodes();
        state.node_mut("a").unwrap().placements.push(Placement {
            pod_id: "ghost".to_string(),
            cpu_units: 1,
        });
        assert!(state.validate().is_err());
    }

    #[test]
    fn mismatched_cpu_is_rejected() {
        let mut state = two_nodes();
        state.place_pod("p1", 2, "a").unwrap();
        state.node_mut("a").unwrap().placements[0].cpu_units = 1;
        assert!(state.validate().is_err());
    }

    #[test]
    fn iteration_is_ordered_by_id() {
        let mut state = ClusterState::new();
        state.insert_node(Node::new("c", 1, 0));
        state.insert_node(Node::new("a", 1, 0));
        state.insert_node(Node::new("b", 1, 0));

        let ids: Vec<&str> = state.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}

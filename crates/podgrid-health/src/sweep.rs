//! One failure-detection pass over a cluster state.

use podgrid_placement::evacuate_node;
use podgrid_state::{ClusterState, NodeId, NodeStatus, PodId, StateResult};
use tracing::warn;

/// What a sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Nodes that went Healthy → Unhealthy in this pass.
    pub failed_nodes: Vec<NodeId>,
    /// Pods moved off failed nodes: (pod, new node).
    pub relocated: Vec<(PodId, NodeId)>,
    /// Pods that found no other home.
    pub unscheduled: Vec<PodId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.failed_nodes.is_empty()
    }
}

/// Mark stale nodes Unhealthy and evacuate them.
///
/// A node is stale when it is Healthy and `now_ms - last_heartbeat` exceeds
/// `stale_threshold_ms`. All stale nodes are marked first, so no pod is ever
/// moved onto a node that is failing in the same pass.
pub fn sweep(
    state: &mut ClusterState,
    now_ms: u64,
    stale_threshold_ms: u64,
) -> StateResult<SweepReport> {
    let stale: Vec<NodeId> = state
        .nodes()
        .filter(|n| n.is_healthy() && n.heartbeat_age(now_ms) > stale_threshold_ms)
        .map(|n| n.id.clone())
        .collect();

    let mut report = SweepReport::default();
    for node_id in &stale {
        if let Some(node) = state.node_mut(node_id) {
            warn!(
                %node_id,
                age_ms = node.heartbeat_age(now_ms),
                pods = node.placements.len(),
                "node missed heartbeats, marking unhealthy"
            );
            node.status = NodeStatus::Unhealthy;
        }
    }

    for node_id in stale {
        let evacuation = evacuate_node(state, &node_id)?;
        report.relocated.extend(evacuation.relocated);
        report.unscheduled.extend(evacuation.unscheduled);
        report.failed_nodes.push(node_id);
    }

    Ok(report)
}

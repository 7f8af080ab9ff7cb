//! Read-only views returned to callers.

use podgrid_state::{Node, NodeId, NodeStatus, Placement, Pod, PodId, PodStatus};
use serde::{Deserialize, Serialize};

/// A node as reported by `list_nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: NodeId,
    pub capacity: u32,
    pub status: NodeStatus,
    pub available_capacity: u64,
    pub placements: Vec<Placement>,
    /// Unix timestamp (milliseconds) of the last heartbeat.
    pub last_heartbeat: u64,
}

impl From<&Node> for NodeView {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            capacity: node.capacity,
            status: node.status,
            available_capacity: node.available(),
            placements: node.placements.clone(),
            last_heartbeat: node.last_heartbeat,
        }
    }
}

/// A pod as reported by `list_pods`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodView {
    pub id: PodId,
    pub cpu_request: u32,
    pub node_id: Option<NodeId>,
    pub status: PodStatus,
}

impl From<&Pod> for PodView {
    fn from(pod: &Pod) -> Self {
        Self {
            id: pod.id.clone(),
            cpu_request: pod.cpu_request,
            node_id: pod.assigned_node.clone(),
            status: pod.status,
        }
    }
}

/// Result of a scheduling request. Not finding room is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScheduleOutcome {
    Scheduled { pod_id: PodId, node_id: NodeId },
    Unscheduled { pod_id: PodId },
}

impl ScheduleOutcome {
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::Scheduled { node_id, .. } => Some(node_id.as_str()),
            Self::Unscheduled { .. } => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled { .. })
    }
}

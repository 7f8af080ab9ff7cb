//! Domain types for the podgrid state store.
//!
//! A [`Node`] owns the list of placements currently assigned to it; a
//! [`Pod`] holds a non-owning back-reference to at most one node. The two
//! sides are kept consistent by [`crate::ClusterState::validate`], which runs
//! before every commit.

use serde::{Deserialize, Serialize};

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

/// Caller-supplied identifier for a pod, unique cluster-wide.
pub type PodId = String;

// ── Node ──────────────────────────────────────────────────────────

/// Liveness status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Healthy,
    Unhealthy,
}

/// A single pod assignment on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub pod_id: PodId,
    pub cpu_units: u32,
}

/// A simulated compute host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Total capacity in abstract CPU units.
    pub capacity: u32,
    pub status: NodeStatus,
    pub placements: Vec<Placement>,
    /// Unix timestamp (milliseconds) of the last heartbeat.
    pub last_heartbeat: u64,
}

impl Node {
    /// A fresh, healthy node with no placements.
    pub fn new(id: impl Into<NodeId>, capacity: u32, now_ms: u64) -> Self {
        Self {
            id: id.into(),
            capacity,
            status: NodeStatus::Healthy,
            placements: Vec::new(),
            last_heartbeat: now_ms,
        }
    }

    /// Sum of CPU units currently placed on this node.
    pub fn used(&self) -> u64 {
        self.placements.iter().map(|p| u64::from(p.cpu_units)).sum()
    }

    /// Capacity not yet claimed by placements.
    pub fn available(&self) -> u64 {
        u64::from(self.capacity).saturating_sub(self.used())
    }

    pub fn is_healthy(&self) -> bool {
        self.status == NodeStatus::Healthy
    }

    /// Whether `cpu_units` more would still fit within capacity.
    pub fn fits(&self, cpu_units: u32) -> bool {
        self.available() >= u64::from(cpu_units)
    }

    /// Milliseconds since the last heartbeat, as of `now_ms`.
    pub fn heartbeat_age(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_heartbeat)
    }
}

// ── Pod ───────────────────────────────────────────────────────────

/// Scheduling status of a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodStatus {
    Running,
    Unscheduled,
}

/// A schedulable workload unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub id: PodId,
    pub cpu_request: u32,
    pub assigned_node: Option<NodeId>,
    pub status: PodStatus,
}

impl Pod {
    pub fn running(id: impl Into<PodId>, cpu_request: u32, node_id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            cpu_request,
            assigned_node: Some(node_id.into()),
            status: PodStatus::Running,
        }
    }

    pub fn unscheduled(id: impl Into<PodId>, cpu_request: u32) -> Self {
        Self {
            id: id.into(),
            cpu_request,
            assigned_node: None,
            status: PodStatus::Unscheduled,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == PodStatus::Running
    }
}

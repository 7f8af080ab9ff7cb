//! View types for dashboard template rendering.
//!
//! Templates only print fields; every count, percentage and label is
//! computed here.

use podgrid_state::{ClusterState, Node, NodeStatus, Pod, PodStatus};

// ── Cluster Summary ─────────────────────────────────────────────

pub struct ClusterSummary {
    pub node_count: usize,
    pub nodes_healthy: usize,
    pub pod_count: usize,
    pub pods_running: usize,
    pub pods_unscheduled: usize,
    pub cpu: ResourceBar,
}

impl ClusterSummary {
    /// Utilisation counts only healthy nodes; an unhealthy node holds no pods.
    pub fn from_state(state: &ClusterState) -> Self {
        let (used, total) = state
            .nodes()
            .filter(|n| n.is_healthy())
            .fold((0u64, 0u64), |(used, total), n| {
                (used + n.used(), total + u64::from(n.capacity))
            });

        Self {
            node_count: state.node_count(),
            nodes_healthy: state.nodes().filter(|n| n.is_healthy()).count(),
            pod_count: state.pod_count(),
            pods_running: state
                .pods()
                .filter(|p| p.status == PodStatus::Running)
                .count(),
            pods_unscheduled: state
                .pods()
                .filter(|p| p.status == PodStatus::Unscheduled)
                .count(),
            cpu: ResourceBar::cpu(used, total),
        }
    }
}

pub struct ResourceBar {
    pub used: u64,
    pub total: u64,
    pub percent: f64,
    pub percent_int: String,
}

impl ResourceBar {
    pub fn cpu(used: u64, total: u64) -> Self {
        let percent = if total > 0 {
            (used as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self {
            used,
            total,
            percent,
            percent_int: format!("{:.0}", percent),
        }
    }

    pub fn bar_color(&self) -> &'static str {
        if self.percent > 90.0 {
            "red"
        } else if self.percent > 70.0 {
            "amber"
        } else {
            "green"
        }
    }
}

// ── Nodes ───────────────────────────────────────────────────────

pub struct NodeRow {
    pub id: String,
    pub short_id: String,
    pub status: &'static str,
    pub status_class: &'static str,
    pub capacity: u32,
    pub used: u64,
    pub available: u64,
    pub bar: ResourceBar,
    pub pods: String,
    pub last_heartbeat: u64,
}

impl NodeRow {
    pub fn from_node(node: &Node) -> Self {
        let (status, status_class) = match node.status {
            NodeStatus::Healthy => ("Healthy", "ok"),
            NodeStatus::Unhealthy => ("Unhealthy", "bad"),
        };
        let pods = node
            .placements
            .iter()
            .map(|p| format!("{} ({})", p.pod_id, p.cpu_units))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            id: node.id.clone(),
            short_id: node.id.chars().take(8).collect(),
            status,
            status_class,
            capacity: node.capacity,
            used: node.used(),
            available: node.available(),
            bar: ResourceBar::cpu(node.used(), u64::from(node.capacity)),
            pods,
            last_heartbeat: node.last_heartbeat,
        }
    }
}

// ── Pods ────────────────────────────────────────────────────────

pub struct PodRow {
    pub id: String,
    pub cpu_request: u32,
    pub node: String,
    pub status: &'static str,
    pub status_class: &'static str,
}

impl PodRow {
    pub fn from_pod(pod: &Pod) -> Self {
        let (status, status_class) = match pod.status {
            PodStatus::Running => ("Running", "ok"),
            PodStatus::Unscheduled => ("Unscheduled", "warn"),
        };
        Self {
            id: pod.id.clone(),
            cpu_request: pod.cpu_request,
            node: pod
                .assigned_node
                .as_ref()
                .map(|id| id.chars().take(8).collect())
                .unwrap_or_else(|| "unassigned".to_string()),
            status,
            status_class,
        }
    }
}

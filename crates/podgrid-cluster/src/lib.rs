//! podgrid-cluster — the cluster manager.
//!
//! Everything a caller can do to the cluster goes through
//! [`ClusterManager`]: adding and removing nodes, stopping and starting
//! them, ingesting heartbeats, and scheduling or deleting pods. Each
//! operation is a single [`podgrid_state::StateStore::apply`] transaction.
//!
//! # Architecture
//!
//! ```text
//! ClusterManager
//!   ├── StateStore (apply / snapshot)
//!   ├── Policies (best_fit, worst_fit, first_fit, round_robin)
//!   ├── Clock (heartbeat timestamps)
//!   └── AgentLauncher (none | process | docker)
//!
//! NodeAgent (runs beside each node)
//!   └── POST {server}/api/v1/heartbeat every interval
//! ```

pub mod agent;
pub mod error;
pub mod launcher;
pub mod manager;
pub mod scheduler;
pub mod views;

pub use agent::{AgentConfig, NodeAgent};
pub use error::{ClusterError, ClusterResult};
pub use launcher::{AgentLauncher, DockerLauncher, LaunchError, NoopLauncher, ProcessLauncher};
pub use manager::ClusterManager;
pub use views::{NodeView, PodView, ScheduleOutcome};

//! podgrid-state — the cluster state authority.
//!
//! Backed by [redb](https://docs.rs/redb), stores every node and pod record
//! and exposes the two operations all other components are built on:
//!
//! - [`StateStore::snapshot`] — a consistent, read-only view of the cluster
//!   as of one instant.
//! - [`StateStore::apply`] — an atomic read-modify-write over the whole
//!   cluster. The closure sees an owned [`ClusterState`]; its changes are
//!   validated against the cluster invariants and committed durably in a
//!   single redb write transaction, or not at all.
//!
//! # Architecture
//!
//! ```text
//! StateStore (Arc<Database>, Clone + Send + Sync)
//!   ├── nodes table: {node_id} → {"schema": N, ...Node}
//!   ├── pods table:  {pod_id}  → {"schema": N, ...Pod}
//!   └── apply(): begin_write → load → mutate → validate → diff → commit
//! ```
//!
//! redb admits a single writer at a time, so `apply` is the global
//! serialization point. Readers use MVCC snapshots and never block writers.

pub mod clock;
pub mod error;
pub mod state;
pub mod store;
pub mod tables;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StateError, StateResult};
pub use state::ClusterState;
pub use store::StateStore;
pub use types::*;

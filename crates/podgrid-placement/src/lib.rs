//! podgrid placement engine.
//!
//! This crate decides *where* a pod goes. It does not own any state: it
//! reads and mutates a [`podgrid_state::ClusterState`] handed to it from
//! inside a store transaction.
//!
//! # Components
//!
//! - **`scorer`** — candidate node view and the eligibility filter
//! - **`policy`** — the [`PlacementPolicy`] trait and its implementations
//! - **`placer`** — placing a single pod and evacuating a failed node

pub mod placer;
pub mod policy;
pub mod scorer;

pub use placer::{Evacuation, evacuate_node, place_pod};
pub use policy::{
    BestFit, FirstFit, PlacementPolicy, Policies, PolicyKind, RoundRobin, UnknownPolicy, WorstFit,
};
pub use scorer::{NodeResources, eligible_nodes};

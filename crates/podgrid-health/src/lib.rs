//! podgrid-health — failure detection and rebalancing for podgrid.
//!
//! Nodes prove liveness by heartbeating. A background [`FailureDetector`]
//! periodically sweeps the cluster: any Healthy node whose last heartbeat is
//! older than the stale threshold is marked Unhealthy and its pods are moved
//! to other nodes.
//!
//! # Architecture
//!
//! ```text
//! FailureDetector
//!   └── run() loop (every sweep interval, until shutdown)
//!       └── sweep_once() → StateStore::apply
//!           ├── mark stale Healthy nodes Unhealthy
//!           ├── evacuate_node() for each newly failed node (best-fit)
//!           └── SweepReport
//! ```
//!
//! A sweep is a single transaction. Storage errors during a background
//! sweep are logged and the loop keeps going; they never reach API callers.

pub mod detector;
pub mod sweep;

pub use detector::{
    DEFAULT_STALE_THRESHOLD, DEFAULT_SWEEP_INTERVAL, FailureDetector, MIN_SWEEP_INTERVAL,
};
pub use sweep::{SweepReport, sweep};

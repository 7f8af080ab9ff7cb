//! podgrid-dashboard — server-rendered web UI for podgrid.
//!
//! A single read-only page showing cluster utilisation, every node with its
//! placements, and every pod. It renders from one state snapshot, so the
//! numbers on the page are always mutually consistent.
//!
//! # Routes
//!
//! | Route | Handler |
//! |---|---|
//! | `/` | Cluster overview |

pub mod pages;
pub mod views;

use axum::Router;
use axum::routing::get;
use podgrid_state::StateStore;

/// Shared state for dashboard handlers.
#[derive(Clone)]
pub struct DashboardState {
    pub store: StateStore,
}

/// Build the dashboard router.
pub fn dashboard_router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(pages::overview))
        .with_state(state)
}

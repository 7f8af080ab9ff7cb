//! Dashboard page handlers.

use askama::Template;
use axum::extract::State;
use axum::response::Html;
use podgrid_state::ClusterState;
use tracing::warn;

use crate::DashboardState;
use crate::views::*;

fn render<T: Template>(tmpl: T) -> Html<String> {
    Html(tmpl.render().unwrap_or_else(|e| {
        format!("<pre>Template error: {e}</pre>")
    }))
}

// ── Overview ────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "overview.html")]
struct OverviewTemplate {
    summary: ClusterSummary,
    nodes: Vec<NodeRow>,
    pods: Vec<PodRow>,
    error: Option<String>,
}

pub async fn overview(State(state): State<DashboardState>) -> Html<String> {
    let (snapshot, error) = match state.store.snapshot() {
        Ok(snapshot) => (snapshot, None),
        Err(e) => {
            warn!(error = %e, "dashboard could not read cluster state");
            (ClusterState::default(), Some(e.to_string()))
        }
    };

    render(OverviewTemplate {
        summary: ClusterSummary::from_state(&snapshot),
        nodes: snapshot.nodes().map(NodeRow::from_node).collect(),
        pods: snapshot.pods().map(PodRow::from_pod).collect(),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use podgrid_state::{Node, StateError, StateStore};

    fn test_state() -> DashboardState {
        DashboardState {
            store: StateStore::open_in_memory().unwrap(),
        }
    }

    async fn page_text(state: DashboardState) -> String {
        let resp = overview(State(state)).await.into_response();
        assert_eq!(resp.status(), 200);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn overview_empty_state() {
        let html = page_text(test_state()).await;
        assert!(html.contains("No nodes"));
        assert!(!html.contains("Template error"));
    }

    #[tokio::test]
    async fn overview_lists_nodes_and_pods() {
        let state = test_state();
        state
            .store
            .apply(|c| {
                c.insert_node(Node::new("node-one", 4, 1_000));
                c.place_pod("web-1", 3, "node-one")?;
                c.unschedule_pod("big-job", 9);
                Ok::<_, StateError>(())
            })
            .unwrap();

        let html = page_text(state).await;
        assert!(html.contains("node-one"));
        assert!(html.contains("web-1 (3)"));
        assert!(html.contains("big-job"));
        assert!(html.contains("Unscheduled"));
        assert!(html.contains("75%"));
    }

    #[tokio::test]
    async fn pod_ids_are_escaped() {
        let state = test_state();
        state
            .store
            .apply(|c| {
                c.unschedule_pod("<script>x</script>", 1);
                Ok::<_, StateError>(())
            })
            .unwrap();

        let html = page_text(state).await;
        assert!(!html.contains("<script>x</script>"));
    }
}

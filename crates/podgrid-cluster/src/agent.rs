//! Node agent — heartbeats on behalf of one node.
//!
//! The agent posts `{"node_id": ...}` to the manager's heartbeat endpoint
//! every interval. A failed heartbeat is logged and retried on the next
//! tick; the agent only stops when told to shut down.

use std::time::Duration;

use anyhow::{Context, bail};
use bytes::Bytes;
use http::Uri;
use http_body_util::Full;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Path of the heartbeat endpoint, relative to the server URL.
pub const HEARTBEAT_PATH: &str = "/api/v1/heartbeat";

/// Configuration for the node agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Node this agent speaks for.
    pub node_id: String,
    /// Base URL of the manager, e.g. `http://127.0.0.1:8080`.
    pub server_url: String,
    /// Time between heartbeats.
    pub interval: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl AgentConfig {
    pub fn new(node_id: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            server_url: server_url.into(),
            interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Serialize)]
struct HeartbeatRequest<'a> {
    node_id: &'a str,
}

/// Where to connect and what to request.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    host: String,
    /// `host:port` for the TCP connection.
    address: String,
    path: String,
}

impl Endpoint {
    fn parse(server_url: &str) -> anyhow::Result<Self> {
        let uri: Uri = server_url
            .parse()
            .with_context(|| format!("invalid server url: {server_url}"))?;
        match uri.scheme_str() {
            Some("http") | None => {}
            Some(other) => bail!("unsupported scheme {other}, only http is supported"),
        }
        let authority = uri
            .authority()
            .with_context(|| format!("server url has no host: {server_url}"))?;
        let port = authority.port_u16().unwrap_or(80);
        let base = uri.path().trim_end_matches('/');

        Ok(Self {
            host: authority.as_str().to_string(),
            address: format!("{}:{port}", authority.host()),
            path: format!("{base}{HEARTBEAT_PATH}"),
        })
    }
}

/// Sends heartbeats for a single node.
pub struct NodeAgent {
    config: AgentConfig,
    endpoint: Endpoint,
}

impl NodeAgent {
    pub fn new(config: AgentConfig) -> anyhow::Result<Self> {
        let endpoint = Endpoint::parse(&config.server_url)?;
        Ok(Self { config, endpoint })
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    /// Send one heartbeat and wait for a 2xx answer.
    pub async fn send_heartbeat(&self) -> anyhow::Result<()> {
        tokio::time::timeout(self.config.request_timeout, self.post_heartbeat())
            .await
            .with_context(|| {
                format!("heartbeat timed out after {:?}", self.config.request_timeout)
            })?
    }

    async fn post_heartbeat(&self) -> anyhow::Result<()> {
        let body = serde_json::to_vec(&HeartbeatRequest {
            node_id: &self.config.node_id,
        })?;

        let stream = tokio::net::TcpStream::connect(&self.endpoint.address)
            .await
            .with_context(|| format!("connect to {}", self.endpoint.address))?;
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("POST")
            .uri(&self.endpoint.path)
            .header("host", &self.endpoint.host)
            .header("content-type", "application/json")
            .header("user-agent", "podgrid-agent/0.1")
            .body(Full::new(Bytes::from(body)))?;

        let resp = sender.send_request(req).await?;
        if !resp.status().is_success() {
            bail!("server answered {}", resp.status());
        }
        Ok(())
    }

    /// Heartbeat every interval until `shutdown` flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let node_id = &self.config.node_id;
        info!(%node_id, server = %self.config.server_url, interval = ?self.config.interval, "heartbeat loop started");

        let mut interval = tokio::time::interval(self.config.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.send_heartbeat().await {
                        Ok(()) => debug!(%node_id, "heartbeat sent"),
                        Err(e) => warn!(%node_id, error = %e, "heartbeat failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!(%node_id, "heartbeat loop shutting down");
                    break;
                }
            }
        }
    }
}

//! Agent launchers — start and stop the heartbeat agent behind each node.
//!
//! A node only stays Healthy while something heartbeats on its behalf.
//! When the manager creates a node it asks an [`AgentLauncher`] to bring
//! that something up; when the node is deleted it asks for it to be torn
//! down.
//!
//! - [`NoopLauncher`]: does nothing (tests, externally managed agents)
//! - [`ProcessLauncher`]: one `podgridd agent` child process per node
//! - [`DockerLauncher`]: one container per node, via the `docker` CLI

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How long a launcher command may run before it is abandoned.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Boxed future returned by launcher operations.
pub type LaunchFuture<'a> = Pin<Box<dyn Future<Output = Result<(), LaunchError>> + Send + 'a>>;

/// Errors from starting or stopping an agent.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Starts and stops the heartbeat agent for a node.
pub trait AgentLauncher: Send + Sync {
    /// Short name for logs and config (`none`, `process`, `docker`).
    fn name(&self) -> &'static str;

    /// Start an agent that heartbeats `node_id` to `callback_address`.
    fn launch<'a>(&'a self, node_id: &'a str, callback_address: &'a str) -> LaunchFuture<'a>;

    /// Stop the agent for `node_id`. Unknown nodes are not an error.
    fn terminate<'a>(&'a self, node_id: &'a str) -> LaunchFuture<'a>;
}

// ── Noop ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLauncher;

impl AgentLauncher for NoopLauncher {
    fn name(&self) -> &'static str {
        "none"
    }

    fn launch<'a>(&'a self, node_id: &'a str, _callback_address: &'a str) -> LaunchFuture<'a> {
        Box::pin(async move {
            debug!(%node_id, "noop launcher: agent not started");
            Ok(())
        })
    }

    fn terminate<'a>(&'a self, _node_id: &'a str) -> LaunchFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

// ── Local processes ───────────────────────────────────────────────

/// Runs `<program> agent --node-id ID --server URL --interval D` per node.
///
/// Children are killed on terminate, and when the launcher is dropped.
pub struct ProcessLauncher {
    program: PathBuf,
    heartbeat_interval: Duration,
    children: Mutex<HashMap<String, Child>>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, heartbeat_interval: Duration) -> Self {
        Self {
            program: program.into(),
            heartbeat_interval,
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Launch copies of the currently running executable.
    pub fn current_exe(heartbeat_interval: Duration) -> Result<Self, LaunchError> {
        let program = std::env::current_exe()
            .map_err(|e| LaunchError::Other(format!("cannot locate current executable: {e}")))?;
        Ok(Self::new(program, heartbeat_interval))
    }

    pub async fn running(&self) -> usize {
        self.children.lock().await.len()
    }
}

impl AgentLauncher for ProcessLauncher {
    fn name(&self) -> &'static str {
        "process"
    }

    fn launch<'a>(&'a self, node_id: &'a str, callback_address: &'a str) -> LaunchFuture<'a> {
        Box::pin(async move {
            let child = Command::new(&self.program)
                .arg("agent")
                .arg("--node-id")
                .arg(node_id)
                .arg("--server")
                .arg(callback_address)
                .arg("--interval")
                .arg(format!("{}ms", self.heartbeat_interval.as_millis()))
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| LaunchError::Spawn {
                    program: self.program.display().to_string(),
                    source,
                })?;

            info!(%node_id, pid = ?child.id(), "agent process started");
            if let Some(mut old) = self.children.lock().await.insert(node_id.to_string(), child) {
                if let Err(e) = old.start_kill() {
                    warn!(%node_id, error = %e, "failed to kill replaced agent process");
                }
            }
            Ok(())
        })
    }

    fn terminate<'a>(&'a self, node_id: &'a str) -> LaunchFuture<'a> {
        Box::pin(async move {
            let child = self.children.lock().await.remove(node_id);
            let Some(mut child) = child else {
                return Ok(());
            };
            child
                .kill()
                .await
                .map_err(|e| LaunchError::Other(format!("kill agent for {node_id}: {e}")))?;
            info!(%node_id, "agent process stopped");
            Ok(())
        })
    }
}

// ── Docker ────────────────────────────────────────────────────────

/// Runs each agent as a detached container named `node_<first 8 of id>`.
///
/// The container receives `NODE_ID` and `API_SERVER_URL` in its
/// environment and is expected to heartbeat on its own.
#[derive(Debug, Clone)]
pub struct DockerLauncher {
    image: String,
    docker: String,
    timeout: Duration,
}

impl DockerLauncher {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            docker: "docker".to_string(),
            timeout: DEFAULT_LAUNCH_TIMEOUT,
        }
    }

    /// Override the `docker` binary (e.g. `podman`).
    pub fn with_binary(mut self, docker: impl Into<String>) -> Self {
        self.docker = docker.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    fn run_args(&self, node_id: &str, callback_address: &str) -> Vec<String> {
        vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            container_name(node_id),
            "--env".to_string(),
            format!("NODE_ID={node_id}"),
            "--env".to_string(),
            format!("API_SERVER_URL={callback_address}"),
            self.image.clone(),
        ]
    }

    async fn docker(&self, args: &[String]) -> Result<String, LaunchError> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.docker)
                .args(args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| LaunchError::Timeout {
            program: self.docker.clone(),
            timeout: self.timeout,
        })?
        .map_err(|source| LaunchError::Spawn {
            program: self.docker.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(LaunchError::CommandFailed {
                program: self.docker.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl AgentLauncher for DockerLauncher {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn launch<'a>(&'a self, node_id: &'a str, callback_address: &'a str) -> LaunchFuture<'a> {
        Box::pin(async move {
            let container_id = self.docker(&self.run_args(node_id, callback_address)).await?;
            info!(%node_id, %container_id, image = %self.image, "agent container started");
            Ok(())
        })
    }

    fn terminate<'a>(&'a self, node_id: &'a str) -> LaunchFuture<'a> {
        Box::pin(async move {
            let name = container_name(node_id);
            match self
                .docker(&["rm".to_string(), "-f".to_string(), name.clone()])
                .await
            {
                Ok(_) => {
                    info!(%node_id, container = %name, "agent container removed");
                    Ok(())
                }
                Err(e) => {
                    warn!(%node_id, container = %name, error = %e, "failed to remove agent container");
                    Err(e)
                }
            }
        })
    }
}

/// `node_` followed by the first eight characters of the node id.
pub fn container_name(node_id: &str) -> String {
    let short: String = node_id.chars().take(8).collect();
    format!("node_{short}")
}

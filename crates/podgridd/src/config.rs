//! podgrid.toml configuration and command-line overrides.
//!
//! Every setting has a built-in default, may be set in the TOML file, and
//! may be overridden by a flag. Flags win over the file.
//!
//! ```toml
//! [server]
//! port = 8080
//! data_dir = "/var/lib/podgrid"
//! callback_url = "http://10.0.0.4:8080"
//!
//! [detector]
//! stale_threshold = "10s"
//! sweep_interval = "5s"
//!
//! [launcher]
//! kind = "docker"          # none | process | docker
//! image = "node-sim"
//! heartbeat_interval = "5s"
//! timeout = "30s"
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use clap::Args;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodgridConfig {
    pub server: Option<ServerConfig>,
    pub detector: Option<DetectorConfig>,
    pub launcher: Option<LauncherConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub stale_threshold: Option<String>,
    pub sweep_interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub kind: Option<String>,
    pub image: Option<String>,
    pub docker_binary: Option<String>,
    pub heartbeat_interval: Option<String>,
    pub timeout: Option<String>,
}

impl PodgridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: PodgridConfig =
            toml::from_str(&content).with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }
}

/// Flags for `podgridd serve`. Unset flags fall back to the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Path to a podgrid.toml file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to bind the API server to.
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Data directory for persistent state.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// URL agents use to reach this server.
    #[arg(long)]
    pub callback_url: Option<String>,

    /// How long a node may go without heartbeating (e.g. "10s").
    #[arg(long)]
    pub stale_threshold: Option<String>,

    /// How often the failure detector sweeps (e.g. "5s").
    #[arg(long)]
    pub sweep_interval: Option<String>,

    /// Agent launcher: none, process or docker.
    #[arg(long)]
    pub launcher: Option<String>,

    /// Image used by the docker launcher.
    #[arg(long)]
    pub docker_image: Option<String>,
}

/// How node agents are started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LauncherKind {
    #[default]
    None,
    Process,
    Docker,
}

impl FromStr for LauncherKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Self::None),
            "process" => Ok(Self::Process),
            "docker" => Ok(Self::Docker),
            other => bail!("unknown launcher {other:?}, expected none, process or docker"),
        }
    }
}

/// Fully resolved settings for serve mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeSettings {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
    pub callback_url: String,
    pub stale_threshold: Duration,
    pub sweep_interval: Duration,
    pub launcher: LauncherKind,
    pub docker_image: String,
    pub docker_binary: String,
    pub heartbeat_interval: Duration,
    pub launch_timeout: Duration,
}

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "/var/lib/podgrid";
pub const DEFAULT_DOCKER_IMAGE: &str = "node-sim";

impl ServeSettings {
    /// Merge flags over the config file over defaults.
    pub fn resolve(args: ServeArgs, file: PodgridConfig) -> anyhow::Result<Self> {
        let server = file.server.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let launcher = file.launcher.unwrap_or_default();

        let bind = args
            .bind
            .or(server.bind)
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port = args.port.or(server.port).unwrap_or(DEFAULT_PORT);
        let callback_url = args
            .callback_url
            .or(server.callback_url)
            .unwrap_or_else(|| format!("http://127.0.0.1:{port}"));

        let launcher_kind = match args.launcher.or(launcher.kind) {
            Some(kind) => kind.parse()?,
            None => LauncherKind::default(),
        };

        Ok(Self {
            addr: SocketAddr::new(bind, port),
            data_dir: args
                .data_dir
                .or(server.data_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            callback_url,
            stale_threshold: duration_setting(
                "stale_threshold",
                args.stale_threshold.or(detector.stale_threshold),
                Duration::from_secs(10),
            )?,
            sweep_interval: period_setting(
                "sweep_interval",
                args.sweep_interval.or(detector.sweep_interval),
                Duration::from_secs(5),
            )?,
            launcher: launcher_kind,
            docker_image: args
                .docker_image
                .or(launcher.image)
                .unwrap_or_else(|| DEFAULT_DOCKER_IMAGE.to_string()),
            docker_binary: launcher.docker_binary.unwrap_or_else(|| "docker".to_string()),
            heartbeat_interval: period_setting(
                "heartbeat_interval",
                launcher.heartbeat_interval,
                Duration::from_secs(5),
            )?,
            launch_timeout: period_setting(
                "timeout",
                launcher.timeout,
                Duration::from_secs(30),
            )?,
        })
    }
}

fn duration_setting(name: &str, value: Option<String>, default: Duration) -> anyhow::Result<Duration> {
    match value {
        Some(s) => parse_duration(&s).ok_or_else(|| anyhow!("invalid duration for {name}: {s:?}")),
        None => Ok(default),
    }
}

/// Like [`duration_setting`], but zero is rejected.
fn period_setting(name: &str, value: Option<String>, default: Duration) -> anyhow::Result<Duration> {
    let period = duration_setting(name, value, default)?;
    if period.is_zero() {
        bail!("{name} must be greater than zero");
    }
    Ok(period)
}

/// Parse a duration string like "5s", "500ms", "1m". A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

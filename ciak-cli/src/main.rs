mod room_ui;

use anyhow::{Context, Result};
use ciak_core::PeerDescriptor;
use ciak_mesh::{Lobby, MeshConfig, RoomHandle, WebRtcEngine, announce};
use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOBBY_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "ciak")]
#[command(version, about = "Peer mesh video rooms over a local network")]
struct Cli {
    /// JSON file with mesh settings; missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    base_port: Option<u16>,

    #[arg(long, global = true)]
    max_peers: Option<u16>,

    #[arg(long, global = true)]
    lobby_port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a room as admin and admit joiners through the lobby.
    Host,

    /// Join a room hosted on another device.
    Join {
        #[arg(long)]
        host: IpAddr,

        /// Address the host should use for us. Defaults to what it sees.
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        ip: IpAddr,
    },

    /// Start from a fixed peer list, skipping the lobby.
    Connect {
        /// `ip:port` to dial or `ip:port:listen` to wait for the peer.
        #[arg(long = "peer", required = true)]
        peers: Vec<PeerDescriptor>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let engine = Arc::new(WebRtcEngine::new());

    match cli.command {
        Commands::Host => {
            println!("{}", "🎬 Hosting a room...".green().bold());
            let lobby = Lobby::bind(config.lobby_port, config.port_plan(), LOBBY_EXCHANGE_TIMEOUT).await?;
            println!(
                "   Lobby on port {}, room for {} joiners",
                config.lobby_port.to_string().as_str().cyan(),
                config.max_peers.saturating_sub(1)
            );

            let (handle, events) = RoomHandle::start(config, engine, Vec::new());
            let admissions = admit_joiners(lobby, handle.clone());
            let result = room_ui::run(handle, events).await;
            admissions.abort();
            result
        }

        Commands::Join { host, ip } => {
            let lobby_addr = SocketAddr::new(host, config.lobby_port);
            println!("{} {}", "🔗 Joining room at".green().bold(), lobby_addr);

            let descriptor = announce(lobby_addr, ip)
                .await
                .with_context(|| format!("Lobby at {} refused us", lobby_addr))?;
            println!("   Assigned star link {}", descriptor.to_string().as_str().cyan());

            let (handle, events) = RoomHandle::start(config, engine, vec![descriptor]);
            room_ui::run(handle, events).await
        }

        Commands::Connect { peers } => {
            println!("{} {} peer(s)", "🔗 Connecting to".green().bold(), peers.len());
            let (handle, events) = RoomHandle::start(config, engine, peers);
            room_ui::run(handle, events).await
        }
    }
}

fn load_config(cli: &Cli) -> Result<MeshConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            MeshConfig::from_json(&json)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => MeshConfig::default(),
    };

    if let Some(base_port) = cli.base_port {
        config.base_port = base_port;
    }
    if let Some(max_peers) = cli.max_peers {
        config.max_peers = max_peers;
    }
    if let Some(lobby_port) = cli.lobby_port {
        config.lobby_port = lobby_port;
    }

    if config.max_peers < 2 {
        anyhow::bail!("max_peers must be at least 2");
    }
    let plan = config.port_plan();
    let last = config.max_peers - 1;
    let fits = if last > 1 {
        plan.mesh_port(last - 1, last).is_some()
    } else {
        plan.star_port(last).is_some()
    };
    if !fits {
        anyhow::bail!("base_port {} leaves no room for {} peers", config.base_port, config.max_peers);
    }

    info!(config = %serde_json::to_string(&config)?, "Mesh configuration");
    Ok(config)
}

/// Feed every admitted joiner to the room until the lobby is full.
fn admit_joiners(mut lobby: Lobby, handle: RoomHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        while !lobby.is_full() {
            match lobby.accept_joiner().await {
                Ok(descriptor) => {
                    if handle.add_peers(vec![descriptor]).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Lobby stopped");
                    break;
                }
            }
        }
        info!(joined = lobby.joined(), "Lobby closed");
    })
}

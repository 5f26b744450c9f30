use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wisp::client::{
    ClientConfig, DepartureReason, Orchestrator, RoomObserver, SessionState, WebRtcLinkProvider,
    WispError,
};
use wisp::model::{PeerId, PeerRef, RoomId, SignalKind};
use wisp::server::{ServerConfig, serve};

#[derive(Parser)]
#[command(name = "wisp", version, about = "Peer-to-peer session signaling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Serve {
        #[arg(long, env = "WISP_BIND_ADDR")]
        addr: Option<SocketAddr>,
    },
    /// Join a room and keep links to everyone in it until Ctrl-C.
    Join {
        #[arg(long, env = "WISP_RELAY_URL")]
        relay_url: Option<String>,

        #[arg(long)]
        room: String,

        #[arg(long, default_value = "wisp-cli")]
        name: String,
    },
}

/// Prints room activity to the terminal.
struct ConsoleObserver;

#[async_trait]
impl RoomObserver for ConsoleObserver {
    async fn on_peer_joined(&self, peer: &PeerRef) {
        println!("{} {} ({})", "+".green().bold(), peer.display_name, peer.id);
    }

    async fn on_peer_left(&self, peer: &PeerRef, reason: DepartureReason) {
        println!(
            "{} {} ({:?})",
            "-".red().bold(),
            peer.display_name,
            reason
        );
    }

    async fn on_signal(&self, from: &PeerId, kind: SignalKind, _data: &Value) {
        println!("  {} {} from {}", "~".dimmed(), kind, from);
    }

    async fn on_link_state_change(&self, peer: &PeerId, state: SessionState) {
        let state = match state {
            SessionState::Connected => state.to_string().green(),
            SessionState::GraceDisconnected => state.to_string().yellow(),
            SessionState::Failed | SessionState::Closed => state.to_string().red(),
            _ => state.to_string().normal(),
        };
        println!("  {} link to {} is {}", "*".cyan(), peer, state);
    }

    async fn on_room_lost(&self, error: &WispError) {
        eprintln!("{} {}", "Room lost:".red().bold(), error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve { addr } => {
            let mut config = ServerConfig::from_env();
            if let Some(addr) = addr {
                config.bind_addr = addr;
            }
            serve(config).await
        }

        Commands::Join {
            relay_url,
            room,
            name,
        } => join(relay_url, room, name).await,
    }
}

async fn join(relay_url: Option<String>, room: String, name: String) -> Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = relay_url {
        config = config.with_relay(url);
    }

    let links = Arc::new(WebRtcLinkProvider::from_config(&config));
    let orchestrator = Orchestrator::new(config, links, Arc::new(ConsoleObserver));

    let handle = orchestrator
        .join_room(RoomId::from(room.as_str()), name)
        .await
        .with_context(|| format!("failed to join room {room}"))?;

    println!(
        "{} {} as {} over {:?}",
        "Joined".green().bold(),
        room,
        handle.local_peer().id,
        handle.transport_kind()
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            info!("Leaving room {}", room);
        }
        _ = handle.closed() => {}
    }

    handle.leave().await?;
    Ok(())
}

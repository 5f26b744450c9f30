use crate::config::ClientConfig;
use crate::link::{LinkEvents, LinkProvider, LinkState, PeerLink};
use crate::session::Role;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use wisp_core::{IceServerConfig, PeerId};

/// Label of the data channel the initiator opens.
pub const DATA_CHANNEL_LABEL: &str = "messages";

/// `{type, sdp}` descriptor as exchanged by browsers.
#[derive(Deserialize)]
struct Descriptor {
    sdp: String,
}

/// Link provider backed by webrtc-rs peer connections.
pub struct WebRtcLinkProvider {
    ice_servers: Vec<IceServerConfig>,
}

impl WebRtcLinkProvider {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.ice_servers.clone())
    }

    fn rtc_config(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LinkProvider for WebRtcLinkProvider {
    async fn open(
        &self,
        peer: &PeerId,
        role: Role,
        events: LinkEvents,
    ) -> Result<Box<dyn PeerLink>> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(self.rtc_config())
                .await
                .context("failed to create peer connection")?,
        );

        let state_events = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let events = state_events.clone();
            Box::pin(async move {
                debug!("Peer connection state for {}: {:?}", events.peer(), s);
                if let Some(state) = link_state(s) {
                    events.state_changed(state);
                }
            })
        }));

        let ice_events = events.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                match serde_json::to_value(&init) {
                    Ok(value) => events.candidate(value),
                    Err(e) => warn!("Cannot encode candidate for {}: {}", events.peer(), e),
                }
            })
        }));

        match role {
            Role::Initiator => {
                let dc = pc
                    .create_data_channel(DATA_CHANNEL_LABEL, None)
                    .await
                    .context("failed to create data channel")?;
                watch_channel(peer.clone(), dc);
            }
            Role::Responder => {
                let dc_peer = peer.clone();
                pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                    let peer = dc_peer.clone();
                    Box::pin(async move { watch_channel(peer, dc) })
                }));
            }
        }

        Ok(Box::new(WebRtcLink {
            peer: peer.clone(),
            pc,
            pending_candidates: Mutex::new(Vec::new()),
        }))
    }
}

fn link_state(state: RTCPeerConnectionState) -> Option<LinkState> {
    match state {
        RTCPeerConnectionState::Connecting => Some(LinkState::Connecting),
        RTCPeerConnectionState::Connected => Some(LinkState::Connected),
        RTCPeerConnectionState::Disconnected => Some(LinkState::Disconnected),
        RTCPeerConnectionState::Failed => Some(LinkState::Failed),
        RTCPeerConnectionState::Closed => Some(LinkState::Closed),
        _ => None,
    }
}

fn watch_channel(peer: PeerId, dc: Arc<RTCDataChannel>) {
    let label = dc.label().to_owned();

    let open_peer = peer.clone();
    let open_label = label.clone();
    dc.on_open(Box::new(move || {
        let peer = open_peer.clone();
        let label = open_label.clone();
        Box::pin(async move {
            info!("DataChannel '{}' open with {}", label, peer);
        })
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let peer = peer.clone();
        let label = label.clone();
        Box::pin(async move {
            debug!("{} bytes on '{}' from {}", msg.data.len(), label, peer);
        })
    }));
}

struct WebRtcLink {
    peer: PeerId,
    pc: Arc<RTCPeerConnection>,
    /// Remote candidates received before any remote description.
    pending_candidates: Mutex<Vec<RTCIceCandidateInit>>,
}

impl WebRtcLink {
    async fn set_remote(&self, desc: RTCSessionDescription) -> Result<()> {
        self.pc
            .set_remote_description(desc)
            .await
            .context("failed to set remote description")?;

        let pending = std::mem::take(&mut *self.pending_candidates.lock().await);
        for candidate in pending {
            if let Err(e) = self.pc.add_ice_candidate(candidate).await {
                warn!("Dropping buffered candidate for {}: {}", self.peer, e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PeerLink for WebRtcLink {
    async fn create_offer(&self) -> Result<Value> {
        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer.clone()).await?;
        Ok(json!({ "type": "offer", "sdp": offer.sdp }))
    }

    async fn accept_offer(&self, offer: Value) -> Result<Value> {
        let offer: Descriptor = serde_json::from_value(offer).context("malformed offer")?;
        self.set_remote(RTCSessionDescription::offer(offer.sdp)?).await?;

        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer.clone()).await?;
        Ok(json!({ "type": "answer", "sdp": answer.sdp }))
    }

    async fn apply_answer(&self, answer: Value) -> Result<()> {
        let answer: Descriptor = serde_json::from_value(answer).context("malformed answer")?;
        self.set_remote(RTCSessionDescription::answer(answer.sdp)?).await
    }

    async fn add_candidate(&self, candidate: Value) -> Result<()> {
        let candidate: RTCIceCandidateInit =
            serde_json::from_value(candidate).context("Failed to parse ICE candidate JSON")?;

        if self.pc.remote_description().await.is_none() {
            self.pending_candidates.lock().await.push(candidate);
            return Ok(());
        }
        self.pc.add_ice_candidate(candidate).await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut desc = RTCSessionDescription::default();
        desc.sdp_type = RTCSdpType::Rollback;
        self.pc
            .set_local_description(desc)
            .await
            .context("rollback failed")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pc.close().await?;
        Ok(())
    }
}

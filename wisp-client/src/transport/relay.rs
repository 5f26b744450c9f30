use crate::error::{Result, WispError};
use crate::session::OutboundSignal;
use crate::transport::{ReconnectPolicy, SignalingTransport, TransportEvent, TransportKind};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use wisp_core::{ClientMessage, PeerId, PeerRef, RoomId, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum RelayCommand {
    Send(ClientMessage),
    Close(oneshot::Sender<()>),
}

/// Signaling through the relay server over a WebSocket.
pub struct RelayTransport {
    commands: mpsc::UnboundedSender<RelayCommand>,
}

impl RelayTransport {
    /// Opens the socket and registers in `room`. Fails if the first
    /// connection cannot be made; later drops are retried per `policy`.
    pub async fn connect(
        url: &str,
        room: RoomId,
        local: PeerRef,
        policy: ReconnectPolicy,
        connect_timeout: Duration,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let ws = open_session(url, &room, &local, connect_timeout).await?;
        info!("Connected to relay {} as {}", url, local.id);

        let (tx, rx) = mpsc::unbounded_channel();
        let session = RelaySession {
            url: url.to_owned(),
            room,
            local,
            policy,
            connect_timeout,
            events,
            commands: rx,
        };
        tokio::spawn(session.run(ws));

        Ok(Self { commands: tx })
    }
}

#[async_trait]
impl SignalingTransport for RelayTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Relay
    }

    async fn send(&self, signal: OutboundSignal) -> Result<()> {
        let message = match signal.to {
            Some(to) => ClientMessage::Signal {
                to,
                signal_type: signal.kind,
                data: signal.data,
            },
            None => ClientMessage::BroadcastSignal {
                signal_type: signal.kind,
                data: signal.data,
            },
        };
        self.commands
            .send(RelayCommand::Send(message))
            .map_err(|_| WispError::RoomClosed)
    }

    async fn close(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        if self.commands.send(RelayCommand::Close(done)).is_ok() {
            let _ = wait.await;
        }
        Ok(())
    }
}

async fn open_session(
    url: &str,
    room: &RoomId,
    local: &PeerRef,
    connect_timeout: Duration,
) -> Result<WsStream> {
    let (mut ws, _) = tokio::time::timeout(connect_timeout, connect_async(url))
        .await
        .map_err(|_| WispError::ConnectTimeout(connect_timeout))??;
    let join = ClientMessage::Join {
        room_id: room.clone(),
        user_id: local.id.clone(),
        username: local.display_name.clone(),
    };
    send_message(&mut ws, &join).await?;
    Ok(ws)
}

async fn send_message(ws: &mut WsStream, message: &ClientMessage) -> Result<()> {
    let text = serde_json::to_string(message)?;
    ws.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Peer a server frame is attributed to, for self-filtering.
fn sender_of(message: &ServerMessage) -> Option<&PeerId> {
    match message {
        ServerMessage::PeerJoined { user_id, .. } | ServerMessage::PeerLeft { user_id } => {
            Some(user_id)
        }
        ServerMessage::Offer { from, .. }
        | ServerMessage::Answer { from, .. }
        | ServerMessage::IceCandidate { from, .. } => Some(from),
        _ => None,
    }
}

enum Pump {
    /// Connection lost unexpectedly.
    Dropped,
    /// Closed on request, or the room went away.
    Closed,
}

struct RelaySession {
    url: String,
    room: RoomId,
    local: PeerRef,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    events: mpsc::Sender<TransportEvent>,
    commands: mpsc::UnboundedReceiver<RelayCommand>,
}

impl RelaySession {
    async fn run(mut self, mut ws: WsStream) {
        loop {
            if let Pump::Closed = self.pump(&mut ws).await {
                debug!("Relay session for {} finished", self.room);
                return;
            }

            warn!("Relay connection to {} lost", self.url);
            match self.reconnect().await {
                Some(fresh) => ws = fresh,
                None => return,
            }
            if self.events.send(TransportEvent::Reconnected).await.is_err() {
                return;
            }
        }
    }

    async fn pump(&mut self, ws: &mut WsStream) -> Pump {
        loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !self.deliver(text.as_str()).await {
                            return Pump::Closed;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Pump::Dropped,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Relay socket error: {}", e);
                        return Pump::Dropped;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(RelayCommand::Send(message)) => {
                        if let Err(e) = send_message(ws, &message).await {
                            warn!("Relay send failed: {}", e);
                            return Pump::Dropped;
                        }
                    }
                    Some(RelayCommand::Close(done)) => {
                        say_goodbye(ws).await;
                        let _ = done.send(());
                        return Pump::Closed;
                    }
                    None => {
                        say_goodbye(ws).await;
                        return Pump::Closed;
                    }
                },
            }
        }
    }

    /// Retries with backoff. The attempt count starts over on every outage.
    async fn reconnect(&mut self) -> Option<WsStream> {
        for attempt in 1..=self.policy.max_attempts {
            let delay = self.policy.delay(attempt)?;
            info!(
                "Reconnecting to {} in {:?} (attempt {}/{})",
                self.url, delay, attempt, self.policy.max_attempts
            );

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    command = self.commands.recv() => match command {
                        Some(RelayCommand::Send(message)) => {
                            debug!("Dropping {:?} while reconnecting", message);
                        }
                        Some(RelayCommand::Close(done)) => {
                            let _ = done.send(());
                            return None;
                        }
                        None => return None,
                    },
                }
            }

            match open_session(&self.url, &self.room, &self.local, self.connect_timeout).await {
                Ok(ws) => {
                    info!("Reconnected to {} after {} attempts", self.url, attempt);
                    return Some(ws);
                }
                Err(e) => warn!("Reconnect attempt {} failed: {}", attempt, e),
            }
        }

        let attempts = self.policy.max_attempts;
        error!("Giving up on relay {} after {} attempts", self.url, attempts);
        let _ = self
            .events
            .send(TransportEvent::Lost(WispError::ReconnectExhausted { attempts }))
            .await;
        None
    }

    /// Returns false once nobody listens for events anymore.
    async fn deliver(&self, text: &str) -> bool {
        let message = match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping relay frame: {}", WispError::MalformedEnvelope(e));
                return true;
            }
        };

        if let ServerMessage::Error { message: reason } = &message {
            warn!("Relay reported: {}", reason);
            return true;
        }
        if sender_of(&message) == Some(&self.local.id) {
            return true;
        }

        let Some(envelope) = message.into_envelope(&self.room, &self.local.id) else {
            debug!("Ignoring unknown relay frame");
            return true;
        };
        self.events
            .send(TransportEvent::Envelope(envelope))
            .await
            .is_ok()
    }
}

async fn say_goodbye(ws: &mut WsStream) {
    if let Err(e) = send_message(ws, &ClientMessage::Leave).await {
        debug!("Could not send leave: {}", e);
    }
    let _ = ws.close(None).await;
}

use crate::error::{Result, WispError};
use crate::session::OutboundSignal;
use crate::transport::{SignalingTransport, TransportEvent, TransportKind};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Notify, broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use wisp_core::{PeerId, PeerRef, RoomId, SignalEnvelope, SignalKind, now_ms};

const DEFAULT_CAPACITY: usize = 256;

/// Peers silent for this many presence intervals are considered gone.
const SILENCE_LIMIT: u32 = 3;

/// In-process broadcast medium shared by every room member running in the
/// same process. Hand the same bus to each orchestrator that should see
/// the others.
#[derive(Clone)]
pub struct LocalBus {
    rooms: Arc<DashMap<RoomId, broadcast::Sender<SignalEnvelope>>>,
    capacity: usize,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Posts an envelope to every subscriber of its room.
    pub fn publish(&self, envelope: SignalEnvelope) {
        let sender = self.channel(&envelope.room_id);
        if sender.send(envelope).is_err() {
            debug!("Local bus room has no subscribers");
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn channel(&self, room: &RoomId) -> broadcast::Sender<SignalEnvelope> {
        self.rooms
            .entry(room.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    fn prune(&self, room: &RoomId) {
        self.rooms.remove_if(room, |_, tx| tx.receiver_count() == 0);
    }
}

/// Signaling over a [`LocalBus`]. Presence is inferred from periodic pings
/// since there is no directory to announce departures.
pub struct LocalBusTransport {
    local: PeerId,
    room: RoomId,
    sender: broadcast::Sender<SignalEnvelope>,
    shutdown: Arc<Notify>,
    closed: AtomicBool,
}

impl LocalBusTransport {
    pub fn connect(
        bus: &LocalBus,
        room: RoomId,
        local: PeerRef,
        presence_interval: Duration,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let sender = bus.channel(&room);
        let shutdown = Arc::new(Notify::new());

        let presence = Presence {
            bus: bus.clone(),
            room: room.clone(),
            local: local.clone(),
            sender: sender.clone(),
            rx: sender.subscribe(),
            events,
            interval: presence_interval,
            seen: HashMap::new(),
            shutdown: shutdown.clone(),
        };
        presence.announce();
        tokio::spawn(presence.run());

        info!("Joined local bus room {} as {}", room, local.id);
        Ok(Self {
            local: local.id,
            room,
            sender,
            shutdown,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl SignalingTransport for LocalBusTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::LocalBus
    }

    async fn send(&self, signal: OutboundSignal) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WispError::RoomClosed);
        }

        let from = self.local.clone();
        let room = self.room.clone();
        let envelope = match signal.to {
            Some(to) => SignalEnvelope::directed(signal.kind, from, to, room, signal.data),
            None => SignalEnvelope::broadcast(signal.kind, from, room, signal.data),
        };
        self.sender
            .send(envelope)
            .map(|_| ())
            .map_err(|_| WispError::RoomClosed)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let leave = SignalEnvelope::broadcast(
            SignalKind::Leave,
            self.local.clone(),
            self.room.clone(),
            Value::Null,
        );
        let _ = self.sender.send(leave);
        self.shutdown.notify_one();
        Ok(())
    }
}

impl Drop for LocalBusTransport {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

struct Presence {
    bus: LocalBus,
    room: RoomId,
    local: PeerRef,
    sender: broadcast::Sender<SignalEnvelope>,
    rx: broadcast::Receiver<SignalEnvelope>,
    events: mpsc::Sender<TransportEvent>,
    interval: Duration,
    /// Last time each remote peer was heard from.
    seen: HashMap<PeerId, Instant>,
    shutdown: Arc<Notify>,
}

impl Presence {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let alive = tokio::select! {
                _ = self.shutdown.notified() => false,
                _ = ticker.tick() => {
                    self.post(SignalKind::Ping, self.presence_data());
                    self.expire_silent().await
                }
                received = self.rx.recv() => match received {
                    Ok(envelope) => self.handle(envelope).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Local bus lagged, {} envelopes lost in room {}", skipped, self.room);
                        true
                    }
                    Err(RecvError::Closed) => false,
                },
            };
            if !alive {
                break;
            }
        }

        let Presence { bus, room, rx, .. } = self;
        drop(rx);
        bus.prune(&room);
        debug!("Local bus presence for room {} stopped", room);
    }

    async fn handle(&mut self, envelope: SignalEnvelope) -> bool {
        if envelope.from == self.local.id || envelope.is_addressed_elsewhere(&self.local.id) {
            return true;
        }

        let from = envelope.from.clone();
        let is_new = !self.seen.contains_key(&from);

        if envelope.kind == SignalKind::Leave {
            self.seen.remove(&from);
        } else {
            self.seen.insert(from.clone(), Instant::now());
            if is_new {
                // Let the newcomer learn about us too.
                self.announce();
            }
        }

        let envelope = match envelope.kind {
            SignalKind::Ping if is_new => SignalEnvelope::broadcast(
                SignalKind::Join,
                from,
                self.room.clone(),
                envelope.data,
            ),
            SignalKind::Ping => return true,
            _ => envelope,
        };
        self.forward(envelope).await
    }

    /// Reports peers that stopped pinging as departed.
    async fn expire_silent(&mut self) -> bool {
        let limit = self.interval * SILENCE_LIMIT;
        let now = Instant::now();
        let silent: Vec<PeerId> = self
            .seen
            .iter()
            .filter(|(_, last)| now.duration_since(**last) > limit)
            .map(|(peer, _)| peer.clone())
            .collect();

        for peer in silent {
            self.seen.remove(&peer);
            info!("Peer {} went silent in room {}", peer, self.room);
            let leave =
                SignalEnvelope::broadcast(SignalKind::Leave, peer, self.room.clone(), Value::Null);
            if !self.forward(leave).await {
                return false;
            }
        }
        true
    }

    async fn forward(&self, envelope: SignalEnvelope) -> bool {
        self.events
            .send(TransportEvent::Envelope(envelope))
            .await
            .is_ok()
    }

    fn announce(&self) {
        self.post(SignalKind::Join, self.presence_data());
    }

    fn presence_data(&self) -> Value {
        json!({ "username": self.local.display_name, "timestamp": now_ms() })
    }

    fn post(&self, kind: SignalKind, data: Value) {
        let envelope =
            SignalEnvelope::broadcast(kind, self.local.id.clone(), self.room.clone(), data);
        let _ = self.sender.send(envelope);
    }
}

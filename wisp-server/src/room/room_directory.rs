use crate::room::room::Room;
use crate::room::room_command::{ConnectionId, Member, RoomCommand};
use anyhow::{Result, bail};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use wisp_core::{PeerId, PeerSummary, RoomId, ServerMessage};

/// A join can lose the race against a room that is shutting down; it is
/// retried against a fresh room this many times.
const JOIN_ATTEMPTS: usize = 8;

struct RoomSlot {
    generation: u64,
    sender: mpsc::Sender<RoomCommand>,
}

/// Authoritative per-room membership. Each room is an actor task, so
/// operations inside one room are serialized while rooms run in parallel.
#[derive(Clone)]
pub struct RoomDirectory {
    rooms: Arc<DashMap<RoomId, RoomSlot>>,
    generations: Arc<AtomicU64>,
    channel_capacity: usize,
}

impl RoomDirectory {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            generations: Arc::new(AtomicU64::new(0)),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Registers `member` and returns the other live members of the room.
    /// Existing members receive `peer-joined`.
    pub async fn join(&self, room_id: &RoomId, member: Member) -> Result<Vec<PeerSummary>> {
        for _ in 0..JOIN_ATTEMPTS {
            let sender = self.room_sender(room_id);
            let (reply_tx, reply_rx) = oneshot::channel();

            let cmd = RoomCommand::Join {
                member: member.clone(),
                reply: reply_tx,
            };
            if sender.send(cmd).await.is_err() {
                debug!("Room {} closed during join, retrying", room_id);
                continue;
            }

            match reply_rx.await {
                Ok(snapshot) => return Ok(snapshot),
                Err(_) => debug!("Room {} shut down before join completed, retrying", room_id),
            }
        }

        bail!("could not join room {room_id}")
    }

    /// Routes a message inside a room. A room without a directory entry has
    /// already been torn down, so this is a no-op.
    pub async fn route(
        &self,
        room_id: &RoomId,
        from: PeerId,
        to: Option<PeerId>,
        message: ServerMessage,
    ) {
        let Some(sender) = self.existing_sender(room_id) else {
            debug!("Dropping message for torn down room {}", room_id);
            return;
        };
        let _ = sender.send(RoomCommand::Route { from, to, message }).await;
    }

    pub async fn leave(&self, room_id: &RoomId, peer_id: PeerId, connection: ConnectionId) {
        let Some(sender) = self.existing_sender(room_id) else {
            return;
        };
        let _ = sender
            .send(RoomCommand::Leave {
                peer_id,
                connection,
            })
            .await;
    }

    pub async fn members(&self, room_id: &RoomId) -> Vec<PeerSummary> {
        let Some(sender) = self.existing_sender(room_id) else {
            return Vec::new();
        };
        let (reply, rx) = oneshot::channel();
        if sender.send(RoomCommand::Members { reply }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Removes the directory entry of a room that became empty, unless the
    /// entry already belongs to a newer room with the same id.
    pub(crate) fn retire(&self, room_id: &RoomId, generation: u64) {
        if self
            .rooms
            .remove_if(room_id, |_, slot| slot.generation == generation)
            .is_some()
        {
            info!("Room {} removed from directory", room_id);
        }
    }

    fn existing_sender(&self, room_id: &RoomId) -> Option<mpsc::Sender<RoomCommand>> {
        self.rooms.get(room_id).map(|slot| slot.sender.clone())
    }

    fn room_sender(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        if let Some(slot) = self.rooms.get(room_id) {
            if !slot.sender.is_closed() {
                return slot.sender.clone();
            }
        }

        let mut slot = self.rooms.entry(room_id.clone()).or_insert_with(|| self.spawn_room(room_id));
        if slot.sender.is_closed() {
            *slot = self.spawn_room(room_id);
        }
        slot.sender.clone()
    }

    fn spawn_room(&self, room_id: &RoomId) -> RoomSlot {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        info!("Creating new room: {}", room_id);

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let room = Room::new(room_id.clone(), generation, rx, self.clone());
        tokio::spawn(room.run());

        RoomSlot {
            generation,
            sender: tx,
        }
    }
}

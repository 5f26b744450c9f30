use crate::room::room_command::{ConnectionId, Member, RoomCommand};
use crate::room::room_directory::RoomDirectory;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wisp_core::{PeerId, PeerSummary, RoomId, ServerMessage};

/// Room actor. Owns the membership of one room and serializes every
/// join, leave and routing decision for it.
pub struct Room {
    id: RoomId,
    generation: u64,
    /// Members in join order.
    members: Vec<Member>,
    command_rx: mpsc::Receiver<RoomCommand>,
    directory: RoomDirectory,
}

impl Room {
    pub(crate) fn new(
        id: RoomId,
        generation: u64,
        command_rx: mpsc::Receiver<RoomCommand>,
        directory: RoomDirectory,
    ) -> Self {
        Self {
            id,
            generation,
            members: Vec::new(),
            command_rx,
            directory,
        }
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);

            if self.members.is_empty() {
                break;
            }
        }

        // Unpublish first so new joins create a fresh room, then refuse
        // whatever is still queued. Dropped join replies make the joiner retry.
        self.directory.retire(&self.id, self.generation);
        self.command_rx.close();
        while let Some(cmd) = self.command_rx.recv().await {
            debug!("Room {} discarding {:?} after shutdown", self.id, cmd);
        }

        info!("Room {} is empty, event loop finished", self.id);
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { member, reply } => {
                let snapshot = self.join(member);
                let _ = reply.send(snapshot);
            }

            RoomCommand::Route { from, to, message } => self.route(&from, to.as_ref(), message),

            RoomCommand::Leave {
                peer_id,
                connection,
            } => self.leave(&peer_id, connection),

            RoomCommand::Members { reply } => {
                let _ = reply.send(self.members.iter().map(Member::summary).collect());
            }
        }
    }

    fn join(&mut self, member: Member) -> Vec<PeerSummary> {
        info!(
            "User {} ({}) joined room {}",
            member.peer_id, member.username, self.id
        );

        if let Some(pos) = self.position(&member.peer_id) {
            let stale = self.members.remove(pos);
            warn!(
                "Replacing stale connection for {} in room {}",
                stale.peer_id, self.id
            );
            self.broadcast(
                None,
                ServerMessage::PeerLeft {
                    user_id: stale.peer_id,
                },
            );
        }

        let existing: Vec<PeerSummary> = self.members.iter().map(Member::summary).collect();

        // Queued ahead of anything the existing members may send in reaction
        // to the join notification below.
        if !existing.is_empty() {
            deliver(
                &member,
                ServerMessage::ExistingPeers {
                    peers: existing.clone(),
                },
            );
        }

        self.broadcast(
            Some(&member.peer_id),
            ServerMessage::PeerJoined {
                user_id: member.peer_id.clone(),
                username: member.username.clone(),
            },
        );

        self.members.push(member);
        existing
    }

    fn route(&self, from: &PeerId, to: Option<&PeerId>, message: ServerMessage) {
        if self.position(from).is_none() {
            warn!(
                "Dropping message from {} which is not a member of room {}",
                from, self.id
            );
            return;
        }

        match to {
            Some(target) => match self.position(target) {
                Some(pos) => deliver(&self.members[pos], message),
                None => {
                    warn!(
                        "Target {} not found in room {}, falling back to broadcast",
                        target, self.id
                    );
                    self.broadcast(Some(from), message);
                }
            },
            None => self.broadcast(Some(from), message),
        }
    }

    fn leave(&mut self, peer_id: &PeerId, connection: ConnectionId) {
        let Some(pos) = self.position(peer_id) else {
            return;
        };
        if self.members[pos].connection != connection {
            debug!(
                "Ignoring leave of replaced connection for {} in room {}",
                peer_id, self.id
            );
            return;
        }

        self.members.remove(pos);
        info!("User {} left room {}", peer_id, self.id);

        self.broadcast(
            None,
            ServerMessage::PeerLeft {
                user_id: peer_id.clone(),
            },
        );
    }

    fn broadcast(&self, exclude: Option<&PeerId>, message: ServerMessage) {
        for member in &self.members {
            if Some(&member.peer_id) == exclude {
                continue;
            }
            deliver(member, message.clone());
        }
    }

    fn position(&self, peer_id: &PeerId) -> Option<usize> {
        self.members.iter().position(|m| &m.peer_id == peer_id)
    }
}

fn deliver(member: &Member, message: ServerMessage) {
    if member.handle.send(message).is_err() {
        debug!("Connection of {} already closed", member.peer_id);
    }
}

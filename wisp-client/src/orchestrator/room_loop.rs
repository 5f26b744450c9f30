use crate::error::WispError;
use crate::link::{LinkEvent, LinkProvider, LinkWorker, SessionEvent};
use crate::orchestrator::{RoomControl, RoomObserver};
use crate::session::{PeerSessionManager, RoomEvent, SessionCommand, TimerId};
use crate::transport::{SignalingTransport, TransportEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use wisp_core::{PeerId, RoomId};

/// Event loop of one joined room. Owns the session manager and is the only
/// place its commands are executed, so sessions never see two events at once.
pub(crate) struct RoomLoop {
    room: RoomId,
    manager: PeerSessionManager,
    transport: Box<dyn SignalingTransport>,
    provider: Arc<dyn LinkProvider>,
    observer: Arc<dyn RoomObserver>,
    control_rx: mpsc::Receiver<RoomControl>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
    session_rx: mpsc::UnboundedReceiver<SessionEvent>,
    links: HashMap<PeerId, LinkWorker>,
    timers: HashMap<TimerId, AbortHandle>,
}

impl RoomLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        room: RoomId,
        local: PeerId,
        grace_period: Duration,
        transport: Box<dyn SignalingTransport>,
        provider: Arc<dyn LinkProvider>,
        observer: Arc<dyn RoomObserver>,
        control_rx: mpsc::Receiver<RoomControl>,
        transport_rx: mpsc::Receiver<TransportEvent>,
    ) -> Self {
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        Self {
            room,
            manager: PeerSessionManager::new(local, grace_period),
            transport,
            provider,
            observer,
            control_rx,
            transport_rx,
            session_tx,
            session_rx,
            links: HashMap::new(),
            timers: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.room);

        loop {
            let running = tokio::select! {
                control = self.control_rx.recv() => match control {
                    Some(control) => self.handle_control(control).await,
                    None => {
                        debug!("All handles of room {} dropped", self.room);
                        self.leave().await;
                        false
                    }
                },
                event = self.transport_rx.recv() => match event {
                    Some(TransportEvent::Envelope(envelope)) => {
                        self.manager.on_envelope(envelope);
                        true
                    }
                    Some(TransportEvent::Reconnected) => {
                        info!("Signaling of room {} re-established", self.room);
                        self.manager.on_signaling_reset();
                        true
                    }
                    Some(TransportEvent::Lost(e)) => {
                        self.lose(e).await;
                        false
                    }
                    None => {
                        self.lose(WispError::RoomClosed).await;
                        false
                    }
                },
                Some(event) = self.session_rx.recv() => {
                    self.handle_session_event(event);
                    true
                }
            };

            self.execute().await;
            if !running {
                break;
            }
        }

        info!("Room {} event loop finished", self.room);
    }

    async fn handle_control(&mut self, control: RoomControl) -> bool {
        match control {
            RoomControl::Send { signal, reply } => {
                let result = match &signal.to {
                    Some(to) if self.manager.session(to).is_none() => {
                        Err(WispError::UnknownPeerTarget(to.clone()))
                    }
                    _ => self.transport.send(signal).await,
                };
                let _ = reply.send(result);
            }

            RoomControl::Renegotiate { peer, reply } => {
                let _ = reply.send(self.manager.renegotiate(&peer));
            }

            RoomControl::Sessions { reply } => {
                let _ = reply.send(self.manager.sessions());
            }

            RoomControl::Leave { reply } => {
                self.leave().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Link {
                peer,
                session,
                event,
            } => match event {
                LinkEvent::State(state) => self.manager.on_link_state_change(&peer, session, state),
                LinkEvent::LocalCandidate(candidate) => {
                    self.manager.on_local_candidate(&peer, session, candidate)
                }
                LinkEvent::OfferReady(offer) => self.manager.on_offer_ready(&peer, session, offer),
                LinkEvent::AnswerReady(answer) => {
                    self.manager.on_answer_ready(&peer, session, answer)
                }
                LinkEvent::Failed(reason) => self.manager.on_link_error(&peer, session, &reason),
            },

            SessionEvent::GraceExpired { peer, timer } => {
                self.timers.remove(&timer);
                self.manager.on_grace_expired(&peer, timer);
            }
        }
    }

    /// Runs everything the session manager queued, in order.
    async fn execute(&mut self) {
        for command in self.manager.take_commands() {
            self.apply(command).await;
        }
    }

    async fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Open {
                peer,
                session,
                role,
            } => {
                let worker = LinkWorker::spawn(
                    self.provider.clone(),
                    peer.clone(),
                    session,
                    role,
                    self.session_tx.clone(),
                );
                if let Some(replaced) = self.links.insert(peer, worker) {
                    replaced.close();
                }
            }

            SessionCommand::Link { peer, session, op } => match self.links.get(&peer) {
                Some(worker) if worker.session == session => worker.submit(op),
                _ => debug!("No link for {} in session {:?}, dropping {:?}", peer, session, op),
            },

            SessionCommand::Close { peer, session } => {
                if self.links.get(&peer).is_some_and(|w| w.session == session) {
                    if let Some(worker) = self.links.remove(&peer) {
                        worker.close();
                    }
                }
            }

            SessionCommand::Send(signal) => {
                if let Err(e) = self.transport.send(signal).await {
                    warn!("Signal in room {} not sent: {}", self.room, e);
                }
            }

            SessionCommand::ArmGraceTimer { peer, timer, after } => {
                let tx = self.session_tx.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(SessionEvent::GraceExpired { peer, timer });
                });
                self.timers.insert(timer, task.abort_handle());
            }

            SessionCommand::CancelGraceTimer { timer } => {
                if let Some(task) = self.timers.remove(&timer) {
                    task.abort();
                }
            }

            SessionCommand::Notify(event) => self.notify(event).await,
        }
    }

    async fn notify(&self, event: RoomEvent) {
        match event {
            RoomEvent::PeerJoined(peer) => self.observer.on_peer_joined(&peer).await,
            RoomEvent::PeerLeft { peer, reason } => {
                self.observer.on_peer_left(&peer, reason).await
            }
            RoomEvent::Signal { from, kind, data } => {
                self.observer.on_signal(&from, kind, &data).await
            }
            RoomEvent::LinkStateChanged { peer, state } => {
                self.observer.on_link_state_change(&peer, state).await
            }
        }
    }

    async fn leave(&mut self) {
        info!("Leaving room {}", self.room);
        self.teardown().await;
        if let Err(e) = self.transport.close().await {
            warn!("Closing transport of room {} failed: {}", self.room, e);
        }
    }

    async fn lose(&mut self, error: WispError) {
        error!("Room {} lost: {}", self.room, error);
        self.teardown().await;
        self.observer.on_room_lost(&error).await;
    }

    async fn teardown(&mut self) {
        self.manager.close_all();
        self.execute().await;

        for (_, worker) in self.links.drain() {
            worker.close();
        }
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}

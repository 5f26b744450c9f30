use crate::link::{LinkEvent, LinkEvents, LinkProvider, PeerLink, SessionEvent};
use crate::session::{LinkOp, Role, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use wisp_core::PeerId;

/// Runs the link operations of one session in submission order. Sessions
/// of different peers proceed in parallel.
pub(crate) struct LinkWorker {
    pub session: SessionId,
    ops: mpsc::UnboundedSender<LinkOp>,
}

impl LinkWorker {
    pub fn spawn(
        provider: Arc<dyn LinkProvider>,
        peer: PeerId,
        session: SessionId,
        role: Role,
        tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (ops, ops_rx) = mpsc::unbounded_channel();
        let events = LinkEvents::new(peer.clone(), session, tx);
        tokio::spawn(run(provider, peer, role, events, ops_rx));
        Self { session, ops }
    }

    pub fn submit(&self, op: LinkOp) {
        if self.ops.send(op).is_err() {
            debug!("Link worker of session {:?} already stopped", self.session);
        }
    }

    /// Lets queued operations finish, then closes the link.
    pub fn close(self) {
        drop(self.ops);
    }
}

async fn run(
    provider: Arc<dyn LinkProvider>,
    peer: PeerId,
    role: Role,
    events: LinkEvents,
    mut ops: mpsc::UnboundedReceiver<LinkOp>,
) {
    let link = match provider.open(&peer, role, events.clone()).await {
        Ok(link) => link,
        Err(e) => {
            events.emit(LinkEvent::Failed(format!("open failed: {e:#}")));
            return;
        }
    };

    while let Some(op) = ops.recv().await {
        if let Err(e) = execute(link.as_ref(), op, &events).await {
            events.emit(LinkEvent::Failed(format!("{e:#}")));
        }
    }

    if let Err(e) = link.close().await {
        warn!("Closing link to {} failed: {:#}", peer, e);
    }
    debug!("Link worker for {} finished", peer);
}

async fn execute(link: &dyn PeerLink, op: LinkOp, events: &LinkEvents) -> anyhow::Result<()> {
    match op {
        LinkOp::CreateOffer => {
            let offer = link.create_offer().await?;
            events.emit(LinkEvent::OfferReady(offer));
        }
        LinkOp::AcceptOffer(offer) => {
            let answer = link.accept_offer(offer).await?;
            events.emit(LinkEvent::AnswerReady(answer));
        }
        LinkOp::ApplyAnswer(answer) => link.apply_answer(answer).await?,
        LinkOp::AddCandidate(candidate) => {
            // A bad candidate does not doom the link.
            if let Err(e) = link.add_candidate(candidate).await {
                warn!("Ignoring candidate for {}: {:#}", events.peer(), e);
            }
        }
        LinkOp::Rollback => link.rollback().await?,
    }
    Ok(())
}

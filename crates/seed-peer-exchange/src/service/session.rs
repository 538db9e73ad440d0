//! The per-session task.
//!
//! A reader sub-task decodes frames into a channel; the session loop owns
//! the writer, the PEX machine and every timer, the seed-mode churn
//! deadline included, so protocol state is never shared.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info};

use super::core::{monotonic_now, Switch};
use super::events::{DisconnectReason, SessionCommand, SessionEvent};
use crate::adapters::{read_frame, write_frame};
use crate::domain::{
    random_jitter, ConnectionDirection, NetAddress, NodeInfo, PexEvent, PexMessage, PexProtocol,
    WireError,
};
use crate::ports::BoxedConnection;

/// Frames decoded ahead of the session loop.
const FRAME_QUEUE: usize = 16;

type Frame = Result<PexMessage, WireError>;

pub(super) struct SessionRunner {
    switch: Switch,
    peer: NodeInfo,
    /// Where the peer can be dialed; the source of what it tells us
    source: NetAddress,
    session_id: u64,
    direction: ConnectionDirection,
    conn: BoxedConnection,
    commands: mpsc::Receiver<SessionCommand>,
}

/// Live state of a started session.
struct Session {
    switch: Switch,
    peer: NodeInfo,
    source: NetAddress,
    session_id: u64,
    pex: PexProtocol,
    rng: StdRng,
    writer: WriteHalf<BoxedConnection>,
    /// Seed mode: when the session is churned
    churn_at: Option<Instant>,
}

impl SessionRunner {
    pub(super) fn new(
        switch: Switch,
        peer: NodeInfo,
        source: NetAddress,
        session_id: u64,
        direction: ConnectionDirection,
        conn: BoxedConnection,
        commands: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        Self {
            switch,
            peer,
            source,
            session_id,
            direction,
            conn,
            commands,
        }
    }

    /// Run until disconnect. Does nothing if `start` is dropped.
    pub(super) async fn run(self, start: oneshot::Receiver<()>) {
        if start.await.is_err() {
            return;
        }
        let SessionRunner {
            switch,
            peer,
            source,
            session_id,
            direction,
            conn,
            mut commands,
        } = self;

        let config = switch.config();
        let (reader, writer) = tokio::io::split(conn);
        let (frames_tx, mut frames) = mpsc::channel(FRAME_QUEUE);
        let reader_task = tokio::spawn(read_frames(reader, config.max_frame_size, frames_tx));

        let mut rng = StdRng::from_entropy();
        let pex = PexProtocol::new(peer.id.clone(), config.pex.clone(), monotonic_now(), &mut rng);
        let mut session = Session {
            switch: switch.clone(),
            peer,
            source,
            session_id,
            pex,
            rng,
            writer,
            churn_at: None,
        };
        let mut shutdown = switch.subscribe_shutdown();
        debug!(peer = %session.peer.id, session_id, %direction, "session started");

        let reason = loop {
            if *shutdown.borrow() {
                break DisconnectReason::Shutdown;
            }
            let pex_wakeup = session.pex.next_wakeup().map(Instant::from_std);
            let churn_at = session.churn_at;

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break DisconnectReason::Shutdown;
                    }
                }
                command = commands.recv() => match command {
                    Some(SessionCommand::Disconnect) | None => {
                        break if switch.is_shutting_down() {
                            DisconnectReason::Shutdown
                        } else {
                            DisconnectReason::Requested
                        };
                    }
                },
                _ = sleep_until_opt(churn_at) => break DisconnectReason::Churned,
                _ = sleep_until_opt(pex_wakeup) => {
                    if let Err(reason) = session.on_timer().await {
                        break reason;
                    }
                }
                frame = frames.recv() => match frame {
                    Some(Ok(message)) => {
                        if let Err(reason) = session.on_message(message).await {
                            break reason;
                        }
                    }
                    Some(Err(e)) => break DisconnectReason::Transport(e),
                    None => break DisconnectReason::Transport(WireError::Closed),
                },
            }
        };

        reader_task.abort();
        let _ = timeout(config.write_timeout, session.writer.shutdown()).await;
        let peer_id = session.peer.id;
        // Banned before the slot frees up, so a reconnect is refused.
        if let DisconnectReason::Violation(violation) = &reason {
            switch.ban_peer(&peer_id, violation);
        }
        switch.inner.slots.lock().remove(&peer_id, session_id);

        if reason.is_error() {
            info!(peer = %peer_id, session_id, %reason, "session ended");
        } else {
            debug!(peer = %peer_id, session_id, %reason, "session ended");
        }
        let _ = switch.inner.events_tx.try_send(SessionEvent::Disconnected {
            peer: peer_id,
            session_id,
            direction,
            reason,
        });
    }
}

impl Session {
    /// A PEX timer fired.
    async fn on_timer(&mut self) -> Result<(), DisconnectReason> {
        match self.pex.poll(monotonic_now()) {
            Ok(Some(message)) => {
                debug!(peer = %self.peer.id, "requesting addresses");
                self.send(&message).await
            }
            Ok(None) => Ok(()),
            Err(violation) => Err(DisconnectReason::Violation(violation)),
        }
    }

    async fn on_message(&mut self, message: PexMessage) -> Result<(), DisconnectReason> {
        let event = self
            .pex
            .on_message(message, monotonic_now(), &mut self.rng)
            .map_err(DisconnectReason::Violation)?;

        match event {
            Some(PexEvent::Respond { exchange_completed }) => {
                let max = self.switch.config().pex.max_addresses_per_response;
                let selection: Vec<NetAddress> = self
                    .switch
                    .address_book()
                    .get_selection(max)
                    .into_iter()
                    .filter(|addr| addr.id != self.peer.id)
                    .collect();
                debug!(peer = %self.peer.id, count = selection.len(), "answering address request");
                self.send(&PexMessage::Addrs(selection)).await?;
                if exchange_completed {
                    self.exchange_completed();
                }
            }
            Some(PexEvent::Learned {
                addrs,
                exchange_completed,
            }) => {
                let received = addrs.len();
                let addrs: Vec<NetAddress> = addrs
                    .into_iter()
                    .filter(|addr| !self.switch.is_banned(&addr.id))
                    .collect();
                let added = self.switch.address_book().add_addresses(addrs, &self.source);
                debug!(peer = %self.peer.id, received, added, "received addresses");
                if exchange_completed {
                    self.exchange_completed();
                }
            }
            Some(PexEvent::RequestIgnored { ignored }) => {
                debug!(peer = %self.peer.id, ignored, "ignoring early address request");
            }
            Some(PexEvent::UnsolicitedDiscarded { count, score }) => {
                debug!(peer = %self.peer.id, count, score, "discarded unsolicited addresses");
                self.notify(SessionEvent::Misbehaved {
                    peer: self.peer.id.clone(),
                    score,
                });
            }
            None => {}
        }
        Ok(())
    }

    async fn send(&mut self, message: &PexMessage) -> Result<(), DisconnectReason> {
        let config = self.switch.config();
        let (limit, max) = (config.write_timeout, config.max_frame_size);
        match timeout(limit, write_frame(&mut self.writer, message, max)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DisconnectReason::Transport(e)),
            Err(_) => Err(DisconnectReason::WriteTimeout(limit)),
        }
    }

    /// Arm the churn deadline in seed mode, then tell the switch.
    fn exchange_completed(&mut self) {
        let config = self.switch.config();
        if config.seed_mode && self.churn_at.is_none() {
            let delay = config.churn_grace + random_jitter(&mut self.rng, config.churn_jitter);
            self.churn_at = Some(Instant::now() + delay);
            debug!(peer = %self.peer.id, ?delay, "scheduled churn disconnect");
        }
        self.notify(SessionEvent::ExchangeCompleted {
            peer: self.peer.id.clone(),
            session_id: self.session_id,
        });
    }

    fn notify(&self, event: SessionEvent) {
        if let Err(e) = self.switch.inner.events_tx.try_send(event) {
            debug!(peer = %self.peer.id, error = %e, "session event dropped");
        }
    }
}

async fn read_frames(
    mut reader: ReadHalf<BoxedConnection>,
    max_frame_size: usize,
    frames: mpsc::Sender<Frame>,
) {
    loop {
        let frame = read_frame(&mut reader, max_frame_size).await;
        let failed = frame.is_err();
        if frames.send(frame).await.is_err() || failed {
            break;
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

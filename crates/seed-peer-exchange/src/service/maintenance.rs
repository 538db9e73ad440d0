//! Background loops of the switch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::core::{monotonic_now, Switch};
use super::events::SessionEvent;
use crate::ports::TransportListener;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

impl Switch {
    /// Spawn the event, dial and save loops.
    ///
    /// Only the first call has an effect.
    pub fn start(&self) {
        let Some(events) = self.inner.events_rx.lock().take() else {
            warn!("switch already started");
            return;
        };
        let tasks = [
            tokio::spawn(self.clone().event_loop(events)),
            tokio::spawn(self.clone().dial_loop()),
            tokio::spawn(self.clone().save_loop()),
        ];
        self.inner.background.lock().extend(tasks);

        let config = self.config();
        info!(
            seed_mode = config.seed_mode,
            seeds = config.seeds.len(),
            max_inbound = config.slots.max_inbound,
            max_outbound = config.slots.max_outbound,
            "switch started"
        );
    }

    /// Accept connections from `listener` until shutdown.
    ///
    /// Each connection is admitted on its own tracked task so a slow
    /// handshake never blocks the accept loop.
    pub fn spawn_listener(&self, listener: Arc<dyn TransportListener>) {
        let task = tokio::spawn(self.clone().listen_loop(listener));
        self.inner.background.lock().push(task);
    }

    async fn listen_loop(self, listener: Arc<dyn TransportListener>) {
        let mut shutdown = self.subscribe_shutdown();
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => {}
                accepted = listener.accept() => match accepted {
                    Ok((conn, remote)) => {
                        let switch = self.clone();
                        self.spawn_tracked(async move {
                            if let Err(e) = switch.accept(conn, remote).await {
                                debug!(remote = %remote, error = %e, "rejected inbound connection");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                },
            }
        }
        debug!("listener stopped");
    }

    async fn event_loop(self, mut events: mpsc::Receiver<SessionEvent>) {
        let mut shutdown = self.subscribe_shutdown();
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => {}
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }
        debug!("event loop stopped");
    }

    pub(super) fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::ExchangeCompleted { peer, session_id } => {
                debug!(peer = %peer, session_id, "address exchange completed");
            }
            SessionEvent::Misbehaved { peer, score } => {
                warn!(peer = %peer, score, "peer pushed unsolicited addresses");
            }
            SessionEvent::Disconnected {
                peer,
                session_id,
                direction,
                reason,
            } => {
                debug!(peer = %peer, session_id, %direction, %reason, "session left");
            }
        }
    }

    async fn dial_loop(self) {
        let mut shutdown = self.subscribe_shutdown();
        let mut ticker = tokio::time::interval(self.config().dial_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => {}
                _ = ticker.tick() => {
                    self.inner.backoff.lock().prune(monotonic_now());
                    let forgiven = self.prune_bans();
                    if forgiven > 0 {
                        debug!(forgiven, "bans expired");
                    }
                    let started = self.dial_tick();
                    if started > 0 {
                        debug!(started, "dialing peers");
                    }
                }
            }
        }
        debug!("dial loop stopped");
    }

    async fn save_loop(self) {
        let mut shutdown = self.subscribe_shutdown();
        let mut ticker = tokio::time::interval(self.config().save_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing worth saving yet.
        ticker.tick().await;
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => {}
                _ = ticker.tick() => {
                    if let Err(e) = self.inner.book.save().await {
                        warn!(error = %e, "failed to save address book");
                    }
                }
            }
        }
        debug!("save loop stopped");
    }
}

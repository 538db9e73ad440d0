use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch, OnceCell};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::address_book::SharedAddressBook;
use super::config::SwitchConfig;
use super::events::{SessionCommand, SessionEvent, SessionHandle};
use super::session::SessionRunner;
use crate::domain::{
    AcceptError, BannedPeers, ConnectionDirection, ConnectionSlots, DialBackoff, DialError,
    HandshakeError, NetAddress, NodeIdentity, NodeInfo, PeerId, PeerSession, ProtocolViolation,
    Reservation, Timestamp,
};
use crate::ports::{BoxedConnection, Dialer, HandshakeOutcome, Handshaker, SwitchStats};

/// Where a dial target came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DialOrigin {
    /// Configured seed, dialed while the book is empty
    Seed,
    /// Entry of the address book
    AddressBook,
}

pub(super) struct Inner {
    pub(super) config: SwitchConfig,
    pub(super) identity: NodeIdentity,
    pub(super) book: SharedAddressBook,
    dialer: Arc<dyn Dialer>,
    handshaker: Arc<dyn Handshaker>,
    pub(super) slots: Mutex<ConnectionSlots<SessionHandle>>,
    pub(super) backoff: Mutex<DialBackoff>,
    pub(super) banned: Mutex<BannedPeers>,
    /// Dial, save, event and listener loops
    pub(super) background: Mutex<Vec<JoinHandle<()>>>,
    /// Outbound dials and inbound admissions
    inflight: Mutex<JoinSet<()>>,
    pub(super) shutdown_tx: watch::Sender<bool>,
    pub(super) events_tx: mpsc::Sender<SessionEvent>,
    pub(super) events_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    teardown: OnceCell<()>,
    next_session_id: AtomicU64,
}

/// Connection manager of the seed.
///
/// Cheap to clone; every clone drives the same switch.
///
/// # Example
///
/// ```rust,ignore
/// let switch = Switch::new(config, identity, book, dialer, handshaker);
/// switch.start();
/// switch.spawn_listener(listener);
/// tokio::signal::ctrl_c().await?;
/// switch.shutdown().await;
/// ```
#[derive(Clone)]
pub struct Switch {
    pub(super) inner: Arc<Inner>,
}

impl Switch {
    /// Create a stopped switch. Call [`start`](Self::start) to run the
    /// background loops.
    pub fn new(
        config: SwitchConfig,
        identity: NodeIdentity,
        book: SharedAddressBook,
        dialer: Arc<dyn Dialer>,
        handshaker: Arc<dyn Handshaker>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::channel(config.event_queue_size.max(1));
        let slots = ConnectionSlots::new(config.slots.clone());
        let backoff = DialBackoff::new(config.backoff_base, config.backoff_max);
        Self {
            inner: Arc::new(Inner {
                config,
                identity,
                book,
                dialer,
                handshaker,
                slots: Mutex::new(slots),
                backoff: Mutex::new(backoff),
                banned: Mutex::new(BannedPeers::new()),
                background: Mutex::new(Vec::new()),
                inflight: Mutex::new(JoinSet::new()),
                shutdown_tx,
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                teardown: OnceCell::new(),
                next_session_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &SwitchConfig {
        &self.inner.config
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.inner.identity
    }

    pub fn address_book(&self) -> &SharedAddressBook {
        &self.inner.book
    }

    /// Whether shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    /// Receiver that flips to `true` when shutdown begins
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.inner.shutdown_tx.subscribe()
    }

    /// Ids of every live session
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.inner.slots.lock().connected_peers()
    }

    /// Current counts
    pub fn stats(&self) -> SwitchStats {
        let connections = self.inner.slots.lock().stats();
        SwitchStats {
            connections,
            address_book: self.inner.book.stats(),
            backing_off: self.inner.backoff.lock().len(),
            shutting_down: self.is_shutting_down(),
        }
    }

    /// Time left before `peer` may be dialed again
    pub fn retry_delay(&self, peer: &PeerId) -> Option<Duration> {
        self.inner.backoff.lock().remaining(peer, monotonic_now())
    }

    /// Whether `peer` is refused for an earlier protocol violation
    pub fn is_banned(&self, peer: &PeerId) -> bool {
        let now = self.inner.book.now();
        self.inner.banned.lock().is_banned(peer, now)
    }

    /// Refuse `peer` for the configured ban duration and drop its book entry.
    pub(super) fn ban_peer(&self, peer: &PeerId, violation: &ProtocolViolation) {
        let duration = self.inner.config.ban_duration;
        let now = self.inner.book.now();
        let until = Timestamp::new(now.as_secs().saturating_add(duration.as_secs()));
        self.inner.banned.lock().ban(peer.clone(), until, violation);
        self.inner.book.mark_bad(peer);
        warn!(peer = %peer, %violation, ban = ?duration, "banned peer");
    }

    /// Forget bans that ran out. Returns how many were dropped.
    pub(super) fn prune_bans(&self) -> usize {
        let now = self.inner.book.now();
        self.inner.banned.lock().gc_expired(now)
    }

    /// Run `task` until it finishes or shutdown begins.
    ///
    /// Teardown waits for every such task before the final save.
    pub(super) fn spawn_tracked<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.subscribe_shutdown();
        let mut inflight = self.inner.inflight.lock();
        while inflight.try_join_next().is_some() {}
        inflight.spawn(async move {
            tokio::select! {
                _ = task => {}
                _ = shutdown.wait_for(|down| *down) => {}
            }
        });
    }

    /// Dials and admissions still running
    pub fn inflight_tasks(&self) -> usize {
        let mut inflight = self.inner.inflight.lock();
        while inflight.try_join_next().is_some() {}
        inflight.len()
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Admit an inbound connection.
    ///
    /// Capacity and duplicate-IP checks run before the handshake, the ban
    /// check right after it. No rejection touches the address book.
    pub async fn accept(
        &self,
        conn: BoxedConnection,
        remote: SocketAddr,
    ) -> Result<PeerId, AcceptError> {
        let reservation = self.inner.slots.lock().try_reserve_inbound(remote.ip())?;

        let limit = self.inner.config.handshake_timeout;
        let handshake = timeout(
            limit,
            self.inner
                .handshaker
                .handshake(conn, ConnectionDirection::Inbound),
        )
        .await;
        let outcome = match handshake {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                self.inner.slots.lock().release(reservation);
                return Err(e.into());
            }
            Err(_) => {
                self.inner.slots.lock().release(reservation);
                return Err(HandshakeError::Timeout(limit).into());
            }
        };

        let identity = &self.inner.identity;
        if &outcome.peer.id == identity.id() || identity.is_self(&outcome.peer.listen_addr) {
            self.inner.slots.lock().release(reservation);
            return Err(AcceptError::SelfConnection);
        }
        if self.is_banned(&outcome.peer.id) {
            self.inner.slots.lock().release(reservation);
            return Err(AcceptError::Banned(outcome.peer.id));
        }

        let advertised = advertised_address(&outcome.peer, remote);
        let peer_id = outcome.peer.id.clone();
        self.start_session(reservation, outcome, remote, advertised.clone())?;

        if self.inner.book.add_address(advertised.clone(), &advertised) {
            debug!(peer = %peer_id, addr = %advertised, "learned address of inbound peer");
        }
        info!(peer = %peer_id, remote = %remote, "accepted inbound peer");
        Ok(peer_id)
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Dial one address now, outside the dial loop.
    pub async fn dial(&self, addr: NetAddress) -> Result<PeerId, DialError> {
        if self.inner.identity.is_self(&addr) {
            return Err(DialError::SelfDial);
        }
        if self.is_banned(&addr.id) {
            return Err(DialError::Banned(addr.id));
        }
        let origin = if self.inner.book.contains(&addr.id) {
            DialOrigin::AddressBook
        } else {
            DialOrigin::Seed
        };
        let reservation = self.inner.slots.lock().try_reserve_outbound(&addr.id)?;
        self.dial_reserved(addr, origin, reservation).await
    }

    /// Start dials for one tick of the dial loop.
    ///
    /// Seeds are dialed while the address book is empty, book entries
    /// afterwards. Connected, in-flight, self, banned and backing-off peers
    /// are skipped. Returns how many dials were started.
    pub fn dial_tick(&self) -> usize {
        let config = &self.inner.config;
        let now = monotonic_now();

        let (budget, mut excluded) = {
            let slots = self.inner.slots.lock();
            if slots.is_closed() {
                return 0;
            }
            let free = config
                .slots
                .max_outbound
                .saturating_sub(slots.outbound_count());
            (free.min(config.max_dials_per_tick), slots.busy_peers())
        };
        if budget == 0 {
            return 0;
        }
        excluded.extend(self.inner.backoff.lock().blocked_peers(now));
        let wall_now = self.inner.book.now();
        excluded.extend(self.inner.banned.lock().active(wall_now).cloned());
        excluded.insert(self.inner.identity.id().clone());

        let targets = self.select_targets(budget, &mut excluded);
        let mut started = 0;
        for (addr, origin) in targets {
            let reservation = match self.inner.slots.lock().try_reserve_outbound(&addr.id) {
                Ok(reservation) => reservation,
                Err(e) => {
                    debug!(peer = %addr.id, error = %e, "skipping dial");
                    continue;
                }
            };
            let switch = self.clone();
            self.spawn_tracked(async move {
                // Failed dials are logged and backed off inside.
                let _ = switch.dial_reserved(addr, origin, reservation).await;
            });
            started += 1;
        }
        started
    }

    fn select_targets(
        &self,
        budget: usize,
        excluded: &mut HashSet<PeerId>,
    ) -> Vec<(NetAddress, DialOrigin)> {
        if self.inner.book.is_empty() {
            return self
                .inner
                .config
                .seeds
                .iter()
                .filter(|seed| !excluded.contains(&seed.id) && !self.inner.identity.is_self(seed))
                .take(budget)
                .map(|seed| (seed.clone(), DialOrigin::Seed))
                .collect();
        }

        let mut targets = Vec::with_capacity(budget);
        while targets.len() < budget {
            let Some(addr) = self
                .inner
                .book
                .pick_dial_candidate(|id| excluded.contains(id))
            else {
                break;
            };
            excluded.insert(addr.id.clone());
            targets.push((addr, DialOrigin::AddressBook));
        }
        targets
    }

    async fn dial_reserved(
        &self,
        addr: NetAddress,
        origin: DialOrigin,
        reservation: Reservation,
    ) -> Result<PeerId, DialError> {
        let outcome = match self.connect(&addr).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.inner.slots.lock().release(reservation);
                self.record_dial_failure(&addr, &e);
                return Err(e);
            }
        };

        if outcome.peer.id != addr.id {
            self.inner.slots.lock().release(reservation);
            let e = DialError::UnexpectedPeer {
                expected: addr.id.clone(),
                actual: outcome.peer.id.clone(),
            };
            self.record_dial_failure(&addr, &e);
            return Err(e);
        }

        self.start_session(reservation, outcome, addr.socket_addr(), addr.clone())?;
        self.inner.backoff.lock().record_success(&addr.id);

        let book = &self.inner.book;
        if origin == DialOrigin::Seed && !book.contains(&addr.id) {
            book.add_address(addr.clone(), &addr);
        }
        book.mark_good(&addr.id);
        info!(peer = %addr.id, addr = %addr, ?origin, "dialed peer");
        Ok(addr.id)
    }

    async fn connect(&self, addr: &NetAddress) -> Result<HandshakeOutcome, DialError> {
        let config = &self.inner.config;
        let conn = timeout(config.dial_timeout, self.inner.dialer.dial(addr.socket_addr()))
            .await
            .map_err(|_| DialError::Timeout(config.dial_timeout))??;
        let outcome = timeout(
            config.handshake_timeout,
            self.inner
                .handshaker
                .handshake(conn, ConnectionDirection::Outbound),
        )
        .await
        .map_err(|_| HandshakeError::Timeout(config.handshake_timeout))??;
        Ok(outcome)
    }

    /// Penalize the book entry, if any, and back off.
    ///
    /// Seeds are never written into the book here: the book only records
    /// failures for ids it already holds.
    fn record_dial_failure(&self, addr: &NetAddress, error: &DialError) {
        if error.is_unreachable() {
            self.inner.book.mark_failed(&addr.id);
        } else {
            self.inner.book.mark_attempt(&addr.id);
        }
        let delay = self
            .inner
            .backoff
            .lock()
            .record_failure(&addr.id, monotonic_now());
        debug!(peer = %addr.id, addr = %addr, error = %error, retry_in = ?delay, "dial failed");
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Spawn the session task and register it.
    ///
    /// The task waits for a start signal that is only sent once the
    /// registration succeeded; a refused session exits without I/O.
    fn start_session(
        &self,
        reservation: Reservation,
        outcome: HandshakeOutcome,
        remote: SocketAddr,
        advertised: NetAddress,
    ) -> Result<(), AcceptError> {
        let session_id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
        let direction = reservation.direction();
        let (commands_tx, commands_rx) =
            mpsc::channel(self.inner.config.command_queue_size.max(1));
        let (start_tx, start_rx) = oneshot::channel();

        let peer_id = outcome.peer.id.clone();
        let runner = SessionRunner::new(
            self.clone(),
            outcome.peer,
            advertised.clone(),
            session_id,
            direction,
            outcome.conn,
            commands_rx,
        );
        let task = tokio::spawn(runner.run(start_rx));

        let session = PeerSession {
            peer_id,
            session_id,
            remote_addr: remote,
            listen_addr: advertised,
            direction,
            connected_at: self.inner.book.now(),
            handle: SessionHandle {
                commands: commands_tx,
                task,
            },
        };
        self.inner.slots.lock().register(reservation, session)?;
        // The receiver only goes away if the task was aborted.
        let _ = start_tx.send(());
        Ok(())
    }

    /// Ask one session to disconnect. `false` if it is not connected.
    pub fn disconnect(&self, peer: &PeerId) -> bool {
        let slots = self.inner.slots.lock();
        slots
            .get(peer)
            .is_some_and(|s| s.handle.commands.try_send(SessionCommand::Disconnect).is_ok())
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stop accepting and dialing, end every session, flush the book.
    ///
    /// Idempotent. Concurrent callers wait for the same teardown.
    pub async fn shutdown(&self) {
        let switch = self.clone();
        self.inner
            .teardown
            .get_or_init(|| async move { switch.teardown().await })
            .await;
    }

    async fn teardown(&self) {
        info!("switch shutting down");
        self.inner.shutdown_tx.send_replace(true);

        let sessions = self.inner.slots.lock().close_and_drain();
        let session_count = sessions.len();
        let mut tasks = Vec::with_capacity(session_count);
        for session in sessions {
            // A full queue still sees the shutdown signal.
            let _ = session.handle.commands.try_send(SessionCommand::Disconnect);
            tasks.push(session.handle.task);
        }
        tasks.extend(self.inner.background.lock().drain(..));

        let deadline = Instant::now() + self.inner.config.shutdown_grace;
        let mut aborted = 0usize;
        for mut task in tasks {
            if timeout_at(deadline, &mut task).await.is_err() {
                task.abort();
                aborted += 1;
            }
        }
        let mut inflight = std::mem::take(&mut *self.inner.inflight.lock());
        let drained = timeout_at(deadline, async {
            while inflight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            aborted += inflight.len();
            inflight.shutdown().await;
        }
        if aborted > 0 {
            warn!(aborted, "aborted tasks that outlived the shutdown grace period");
        }

        match self.inner.book.save().await {
            Ok(()) => info!(
                sessions = session_count,
                addresses = self.inner.book.size(),
                "switch stopped, address book saved"
            ),
            Err(e) => warn!(error = %e, "failed to save address book on shutdown"),
        }
    }
}

impl std::fmt::Debug for Switch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Switch")
            .field("id", self.inner.identity.id())
            .field("shutting_down", &self.is_shutting_down())
            .finish_non_exhaustive()
    }
}

/// Monotonic now, following the runtime clock so paused-time tests work.
pub(super) fn monotonic_now() -> std::time::Instant {
    Instant::now().into_std()
}

/// The address a peer can be dialed at.
///
/// A peer listening on an unspecified address is reached at the host it
/// connected from.
fn advertised_address(peer: &NodeInfo, remote: SocketAddr) -> NetAddress {
    let listen = &peer.listen_addr;
    if listen.ip.is_unspecified() {
        NetAddress::new(peer.id.clone(), remote.ip(), listen.port)
    } else {
        listen.clone()
    }
}

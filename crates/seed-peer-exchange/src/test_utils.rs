//! Test doubles for the driven ports.
//!
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust
//! use seed_peer_exchange::test_utils::FixedTimeSource;
//! use seed_peer_exchange::ports::TimeSource;
//!
//! let time = FixedTimeSource::new(12345);
//! time.advance(5);
//! assert_eq!(time.now().as_secs(), 12350);
//! ```

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::{AddrBookSnapshot, PersistenceError, Timestamp};
use crate::ports::{AddrBookStore, BoxedConnection, Dialer, TimeSource, TransportListener};

/// Buffer size of in-memory connections.
pub const MEMORY_CONNECTION_BUFFER: usize = 64 * 1024;

/// A wall clock that only moves when told to.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    secs: AtomicU64,
}

impl FixedTimeSource {
    /// Create a new fixed time source at `secs`.
    pub fn new(secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(secs),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Get the configured timestamp value.
    pub fn timestamp(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.timestamp())
    }
}

/// Address book store kept in memory, counting saves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<AddrBookSnapshot>>,
    saves: AtomicUsize,
    fail_load: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that starts out holding `snapshot`.
    pub fn with_snapshot(snapshot: AddrBookSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Store whose every load reports a corrupt file.
    pub fn corrupt() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    /// Last saved snapshot.
    pub fn snapshot(&self) -> Option<AddrBookSnapshot> {
        self.snapshot.lock().clone()
    }

    /// Number of completed saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl AddrBookStore for MemoryStore {
    fn load(&self) -> Result<Option<AddrBookSnapshot>, PersistenceError> {
        if self.fail_load {
            return Err(PersistenceError::Format("corrupt test store".into()));
        }
        Ok(self.snapshot.lock().clone())
    }

    fn save(&self, snapshot: &AddrBookSnapshot) -> Result<(), PersistenceError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

type Incoming = mpsc::UnboundedSender<(BoxedConnection, SocketAddr)>;

/// In-process network of duplex pipes keyed by socket address.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    listeners: Arc<Mutex<HashMap<SocketAddr, Incoming>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener at `addr`, replacing any previous one.
    pub fn listen(&self, addr: SocketAddr) -> MemoryListener {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().insert(addr, tx);
        MemoryListener {
            addr,
            incoming: tokio::sync::Mutex::new(rx),
        }
    }

    /// Remove the listener at `addr`; later dials are refused.
    pub fn unlisten(&self, addr: &SocketAddr) {
        self.listeners.lock().remove(addr);
    }

    /// Dialer whose connections appear to come from `local`.
    pub fn dialer(&self, local: SocketAddr) -> MemoryDialer {
        MemoryDialer {
            network: self.clone(),
            local,
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn connect(&self, local: SocketAddr, target: SocketAddr) -> io::Result<BoxedConnection> {
        let listeners = self.listeners.lock();
        let incoming = listeners
            .get(&target)
            .ok_or_else(|| io::Error::from(io::ErrorKind::ConnectionRefused))?;
        let (ours, theirs) = tokio::io::duplex(MEMORY_CONNECTION_BUFFER);
        incoming
            .send((Box::new(theirs), local))
            .map_err(|_| io::Error::from(io::ErrorKind::ConnectionRefused))?;
        Ok(Box::new(ours))
    }
}

/// Listener half of a [`MemoryNetwork`] endpoint.
pub struct MemoryListener {
    addr: SocketAddr,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<(BoxedConnection, SocketAddr)>>,
}

#[async_trait]
impl TransportListener for MemoryListener {
    async fn accept(&self) -> io::Result<(BoxedConnection, SocketAddr)> {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.addr)
    }
}

/// Dialer over a [`MemoryNetwork`] that records every target.
pub struct MemoryDialer {
    network: MemoryNetwork,
    local: SocketAddr,
    attempts: Mutex<Vec<SocketAddr>>,
}

impl MemoryDialer {
    /// Targets dialed so far, in order.
    pub fn attempts(&self) -> Vec<SocketAddr> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    async fn dial(&self, addr: SocketAddr) -> io::Result<BoxedConnection> {
        self.attempts.lock().push(addr);
        self.network.connect(self.local, addr)
    }
}

/// Dialer that refuses every connection and records the targets.
#[derive(Debug, Default)]
pub struct FailingDialer {
    attempts: Mutex<Vec<SocketAddr>>,
}

impl FailingDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets dialed so far, in order.
    pub fn attempts(&self) -> Vec<SocketAddr> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Dialer for FailingDialer {
    async fn dial(&self, addr: SocketAddr) -> io::Result<BoxedConnection> {
        self.attempts.lock().push(addr);
        Err(io::Error::from(io::ErrorKind::ConnectionRefused))
    }
}

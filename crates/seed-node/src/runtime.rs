//! # Seed Runtime
//!
//! Wires configuration, key, address book, transport and switch together.
//!
//! ## Startup Sequence
//!
//! 1. Create the home directory layout and take the `data/LOCK` lock
//! 2. Load or generate the node key
//! 3. Bind the listener
//! 4. Load the address book and resolve the seed list
//! 5. Start the switch and the accept loop
//!
//! Shutdown stops the switch, which flushes the address book, then
//! releases the lock.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use seed_peer_exchange::{
    resolve_seed_list, JsonFileStore, NetAddress, NodeIdentity, NodeInfo, NodeInfoHandshaker,
    SharedAddressBook, Switch, SystemTimeSource, TcpDialer, TcpTransportListener,
    TransportListener,
};

use crate::config::SeedConfig;
use crate::lock::HomeLock;
use crate::node_key::NodeKey;

/// Version string advertised in the handshake.
pub const SEED_VERSION: &str = "0.6.9";

/// A running seed.
pub struct SeedRuntime {
    switch: Switch,
    listener: Arc<TcpTransportListener>,
    local_addr: SocketAddr,
    home: PathBuf,
    _lock: HomeLock,
}

impl SeedRuntime {
    /// Prepare everything up to a bound listener. Nothing runs until
    /// [`start`](Self::start).
    pub async fn bootstrap(config: SeedConfig, home: &Path) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let lock = HomeLock::acquire(&home.join("data")).context("failed to lock home directory")?;

        let key_path = config.node_key_path(home);
        let key = NodeKey::load_or_generate(&key_path).context("failed to load node key")?;

        let listen = config.listen_addr()?;
        let listener = TcpTransportListener::bind(listen)
            .await
            .with_context(|| format!("failed to listen on {listen}"))?;
        let local_addr = listener.local_addr().context("listener has no local address")?;

        let identity = NodeIdentity::new(NetAddress::from_socket(key.id(), local_addr));
        let node_info = NodeInfo::for_seed(&identity, &config.chain_id, SEED_VERSION);

        info!(
            key = %key.id(),
            listen = %local_addr,
            chain = %config.chain_id,
            strict_routing = config.addr_book_strict,
            max_inbound = config.max_num_inbound_peers,
            max_outbound = config.max_num_outbound_peers,
            "tenderseed"
        );

        let book_path = config.addr_book_path(home);
        let book = SharedAddressBook::load(
            identity.clone(),
            config.address_book_config(),
            Arc::new(JsonFileStore::new(book_path)),
            Arc::new(SystemTimeSource::new()),
        );

        let seeds = resolve_seed_list(&config.seeds).await;
        info!(seeds = seeds.len(), "resolved seeds");

        let switch_config = config.switch_config(seeds);
        let handshaker = NodeInfoHandshaker::new(node_info, switch_config.max_frame_size);
        let switch = Switch::new(
            switch_config,
            identity,
            book,
            Arc::new(TcpDialer::new()),
            Arc::new(handshaker),
        );

        Ok(Self {
            switch,
            listener: Arc::new(listener),
            local_addr,
            home: home.to_path_buf(),
            _lock: lock,
        })
    }

    /// Start the switch loops and accept connections.
    pub fn start(&self) {
        self.switch.start();
        self.switch.spawn_listener(self.listener.clone());
        info!(listen = %self.local_addr, home = %self.home.display(), "seed running");
    }

    pub fn switch(&self) -> &Switch {
        &self.switch
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run until `signal` resolves, then shut down.
    pub async fn run_until(self, signal: impl Future<Output = ()>) {
        self.start();
        signal.await;
        info!("shutting down...");
        self.switch.shutdown().await;
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

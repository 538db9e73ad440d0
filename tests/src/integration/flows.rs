//! # Discovery Flows
//!
//! A seed and two ordinary nodes, each a full `Switch`, on one in-memory
//! network with a paused clock.
//!
//! ```text
//! node A ──dial──→ seed      seed learns A, churns A after the exchange
//! node B ──dial──→ seed      B asks for addresses and learns A
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;

    use seed_peer_exchange::test_utils::{FixedTimeSource, MemoryNetwork, MemoryStore};
    use seed_peer_exchange::{
        AddressBook, AddressBookConfig, BucketKey, NetAddress, NodeIdentity, NodeInfo,
        NodeInfoHandshaker, SharedAddressBook, Switch, SwitchConfig,
    };

    const NETWORK: &str = "flow-net";
    const WAIT: Duration = Duration::from_secs(120);

    struct Node {
        addr: NetAddress,
        switch: Switch,
        store: Arc<MemoryStore>,
    }

    fn addr(raw: &str) -> NetAddress {
        raw.parse().unwrap()
    }

    /// Build a switch listening on `network` at `raw`.
    fn spawn_node(
        network: &MemoryNetwork,
        raw: &str,
        tweak: impl FnOnce(&mut SwitchConfig),
    ) -> Node {
        let addr = addr(raw);
        let identity = NodeIdentity::new(addr.clone());
        let book_config = AddressBookConfig {
            strict: false,
            ..AddressBookConfig::default()
        };
        let book = AddressBook::new(
            identity.clone(),
            book_config,
            BucketKey::random(&mut rand::thread_rng()),
        );
        let store = Arc::new(MemoryStore::new());
        let book =
            SharedAddressBook::new(book, store.clone(), Arc::new(FixedTimeSource::new(1_000)));

        let mut config = SwitchConfig::for_testing();
        tweak(&mut config);

        let handshaker = NodeInfoHandshaker::new(
            NodeInfo::for_seed(&identity, NETWORK, "0.1.0"),
            config.max_frame_size,
        );
        let switch = Switch::new(
            config,
            identity,
            book,
            Arc::new(network.dialer(addr.socket_addr())),
            Arc::new(handshaker),
        );
        switch.spawn_listener(Arc::new(network.listen(addr.socket_addr())));
        Node {
            addr,
            switch,
            store,
        }
    }

    /// Ordinary node bootstrapping from `seeds`.
    fn client(seeds: &[&Node]) -> impl FnOnce(&mut SwitchConfig) {
        let seeds: Vec<NetAddress> = seeds.iter().map(|n| n.addr.clone()).collect();
        move |config| {
            config.seed_mode = false;
            config.seeds = seeds;
        }
    }

    async fn eventually(what: &str, check: impl Fn() -> bool) {
        let waited = timeout(WAIT, async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "timed out waiting until {what}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_node_learns_earlier_node_through_seed() {
        let network = MemoryNetwork::new();
        let seed = spawn_node(&network, "5eed@10.1.0.1:26656", |_| {});
        seed.switch.start();

        let node_a = spawn_node(&network, "aa@10.2.0.1:26656", client(&[&seed]));
        node_a.switch.start();
        eventually("the seed knows node A", || {
            seed.switch.address_book().contains(&node_a.addr.id)
        })
        .await;
        // Node A recorded the seed after a successful dial.
        eventually("node A knows the seed", || {
            node_a.switch.address_book().contains(&seed.addr.id)
        })
        .await;

        let node_b = spawn_node(&network, "bb@10.3.0.1:26656", client(&[&seed]));
        node_b.switch.start();
        eventually("node B learned node A", || {
            node_b.switch.address_book().contains(&node_a.addr.id)
        })
        .await;

        let learned = node_b.switch.address_book().get(&node_a.addr.id).unwrap();
        assert_eq!(learned.addr, node_a.addr);

        for node in [&node_b, &node_a, &seed] {
            node.switch.shutdown().await;
        }
        assert!(seed.store.save_count() >= 1);
        assert!(seed.switch.connected_peers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_churns_every_peer_it_exchanged_with() {
        let network = MemoryNetwork::new();
        // One dial tick each, so the churn is observable before any redial.
        let seed = spawn_node(&network, "5eed@10.1.0.1:26656", |config| {
            config.dial_interval = Duration::from_secs(3600);
        });
        seed.switch.start();

        let seeds = client(&[&seed]);
        let node_a = spawn_node(&network, "aa@10.2.0.1:26656", |config| {
            seeds(config);
            config.dial_interval = Duration::from_secs(3600);
        });
        node_a.switch.start();
        eventually("node A is connected to the seed", || {
            node_a.switch.connected_peers().contains(&seed.addr.id)
        })
        .await;
        eventually("the seed dropped node A", || {
            !node_a.switch.connected_peers().contains(&seed.addr.id)
        })
        .await;
        assert!(!seed.switch.is_shutting_down());

        node_a.switch.shutdown().await;
        seed.switch.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_seed_is_retried_with_backoff() {
        let network = MemoryNetwork::new();
        let missing = addr("dead@10.9.0.1:26656");
        let seeds = vec![missing.clone()];
        let node = spawn_node(&network, "aa@10.2.0.1:26656", |config| {
            config.seed_mode = false;
            config.seeds = seeds;
        });
        node.switch.start();

        eventually("the seed is backing off", || {
            node.switch.retry_delay(&missing.id).is_some()
        })
        .await;
        assert!(node.switch.address_book().is_empty());
        assert!(node.switch.stats().backing_off >= 1);
        assert!(node.switch.connected_peers().is_empty());

        node.switch.shutdown().await;
    }
}

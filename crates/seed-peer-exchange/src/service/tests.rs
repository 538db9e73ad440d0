use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

use super::*;
use crate::adapters::{read_frame, write_frame, NodeInfoHandshaker, DEFAULT_MAX_FRAME_SIZE};
use crate::domain::{
    AcceptError, AddressBook, AddressBookConfig, BucketKey, ConnectionDirection, DialError,
    NetAddress, NodeIdentity, NodeInfo, PeerId, PexMessage, ProtocolViolation, WireError,
};
use crate::ports::{BoxedConnection, Dialer, Handshaker, TransportListener};
use crate::test_utils::{
    FailingDialer, FixedTimeSource, MemoryNetwork, MemoryStore, MEMORY_CONNECTION_BUFFER,
};

const NETWORK: &str = "test-net";
const SELF_ADDR: &str = "aa@10.0.0.1:26656";
const WAIT: Duration = Duration::from_secs(60);

fn addr(raw: &str) -> NetAddress {
    raw.parse().unwrap()
}

fn node_info(addr: &NetAddress) -> NodeInfo {
    NodeInfo::for_seed(&NodeIdentity::new(addr.clone()), NETWORK, "0.1.0")
}

fn handshaker_for(addr: &NetAddress) -> NodeInfoHandshaker {
    NodeInfoHandshaker::new(node_info(addr), DEFAULT_MAX_FRAME_SIZE)
}

fn build(config: SwitchConfig, dialer: Arc<dyn Dialer>) -> (Switch, Arc<MemoryStore>) {
    let identity = NodeIdentity::new(addr(SELF_ADDR));
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
    let book = SharedAddressBook::new(book, store.clone(), Arc::new(FixedTimeSource::new(1_000)));
    let handshaker = Arc::new(handshaker_for(&addr(SELF_ADDR)));
    let switch = Switch::new(config, identity, book, dialer, handshaker);
    (switch, store)
}

fn build_offline(config: SwitchConfig) -> (Switch, Arc<MemoryStore>) {
    build(config, Arc::new(FailingDialer::new()))
}

/// Take the event stream so the test observes sessions directly.
fn take_events(switch: &Switch) -> mpsc::Receiver<SessionEvent> {
    switch.inner.events_rx.lock().take().unwrap()
}

/// Connect a fake remote node to `switch`; returns the remote's end of the
/// connection when its handshake succeeded.
async fn connect_inbound(
    switch: &Switch,
    remote: &NetAddress,
) -> (Result<PeerId, AcceptError>, Option<BoxedConnection>) {
    let (ours, theirs) = tokio::io::duplex(MEMORY_CONNECTION_BUFFER);
    let peer = handshaker_for(remote);
    let (accepted, outcome) = tokio::join!(
        switch.accept(Box::new(ours), remote.socket_addr()),
        peer.handshake(Box::new(theirs), ConnectionDirection::Outbound),
    );
    (accepted, outcome.ok().map(|o| o.conn))
}

async fn recv(conn: &mut BoxedConnection) -> Result<PexMessage, WireError> {
    read_frame(conn, DEFAULT_MAX_FRAME_SIZE).await
}

async fn send(conn: &mut BoxedConnection, message: PexMessage) {
    write_frame(conn, &message, DEFAULT_MAX_FRAME_SIZE)
        .await
        .unwrap();
}

/// Read until the switch closes the connection.
async fn drain_until_closed(conn: &mut BoxedConnection) {
    timeout(WAIT, async {
        while recv(conn).await.is_ok() {}
    })
    .await
    .unwrap();
}

async fn next_disconnect(events: &mut mpsc::Receiver<SessionEvent>) -> DisconnectReason {
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(SessionEvent::Disconnected { reason, .. }) => return reason,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .unwrap()
}

/// Wait for every dial started by `dial_tick` to finish.
async fn wait_for_dials(switch: &Switch) {
    timeout(WAIT, async {
        while switch.inflight_tasks() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn wait_until_disconnected(switch: &Switch) {
    timeout(WAIT, async {
        while !switch.connected_peers().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

// =============================================================================
// TEST GROUP 1: Dialing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_empty_book_dials_seed_and_failure_leaves_book_empty() {
    let seed = addr("bb@1.2.3.4:26656");
    let mut config = SwitchConfig::for_testing();
    config.seeds = vec![seed.clone()];
    let dialer = Arc::new(FailingDialer::new());
    let (switch, _store) = build(config, dialer.clone());

    assert_eq!(switch.dial_tick(), 1);
    wait_for_dials(&switch).await;

    assert_eq!(dialer.attempts(), vec![seed.socket_addr()]);
    assert!(switch.address_book().is_empty());
    let delay = switch.retry_delay(&seed.id).unwrap();
    assert!(delay > Duration::ZERO);

    // Backing off: the next tick has nothing to dial.
    assert_eq!(switch.dial_tick(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_successful_seed_dial_adds_seed_as_good_address() {
    let seed = addr("bb@1.2.3.4:26656");
    let network = MemoryNetwork::new();
    let listener = network.listen(seed.socket_addr());
    let remote = handshaker_for(&seed);
    let peer_task = tokio::spawn(async move {
        let (conn, _) = listener.accept().await.unwrap();
        remote
            .handshake(conn, ConnectionDirection::Inbound)
            .await
            .unwrap()
            .conn
    });

    let mut config = SwitchConfig::for_testing();
    config.seeds = vec![seed.clone()];
    let (switch, _store) = build(config, Arc::new(network.dialer(addr(SELF_ADDR).socket_addr())));

    assert_eq!(switch.dial_tick(), 1);
    let _conn = peer_task.await.unwrap();
    wait_for_dials(&switch).await;

    assert_eq!(switch.connected_peers(), vec![seed.id.clone()]);
    let entry = switch.address_book().get(&seed.id).unwrap();
    assert!(entry.is_old());
    assert!(switch.retry_delay(&seed.id).is_none());
    assert_eq!(switch.stats().connections.outbound, 1);

    switch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dial_answered_by_other_node_is_rejected() {
    let seed = addr("bb@1.2.3.4:26656");
    let impostor = addr("cc@1.2.3.4:26656");
    let network = MemoryNetwork::new();
    let listener = network.listen(seed.socket_addr());
    let remote = handshaker_for(&impostor);
    tokio::spawn(async move {
        let (conn, _) = listener.accept().await.unwrap();
        let _ = remote.handshake(conn, ConnectionDirection::Inbound).await;
    });

    let (switch, _store) = build(
        SwitchConfig::for_testing(),
        Arc::new(network.dialer(addr(SELF_ADDR).socket_addr())),
    );
    let err = switch.dial(seed.clone()).await.unwrap_err();

    assert!(matches!(err, DialError::UnexpectedPeer { .. }));
    assert!(switch.connected_peers().is_empty());
    assert!(!switch.address_book().contains(&seed.id));
    assert!(!switch.address_book().contains(&impostor.id));
    assert!(switch.retry_delay(&seed.id).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_dial_self_is_refused() {
    let (switch, _store) = build_offline(SwitchConfig::for_testing());
    let err = switch.dial(addr(SELF_ADDR)).await.unwrap_err();
    assert!(matches!(err, DialError::SelfDial));
}

// =============================================================================
// TEST GROUP 2: Inbound Admission
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_inbound_at_capacity_is_rejected_without_book_change() {
    let mut config = SwitchConfig::for_testing();
    config.slots.max_inbound = 1;
    let (switch, _store) = build_offline(config);

    let first = addr("bb@1.2.3.4:26656");
    let (accepted, _first_conn) = connect_inbound(&switch, &first).await;
    assert_eq!(accepted.unwrap(), first.id);
    let size_before = switch.address_book().size();

    let second = addr("cc@5.6.7.8:26656");
    let (rejected, _) = connect_inbound(&switch, &second).await;

    assert!(matches!(
        rejected,
        Err(AcceptError::CapacityExceeded { current: 1, max: 1 })
    ));
    assert_eq!(switch.address_book().size(), size_before);
    assert!(!switch.address_book().contains(&second.id));
    assert_eq!(switch.connected_peers(), vec![first.id.clone()]);

    switch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_inbound_peer_with_unspecified_listen_ip_is_recorded_at_remote_host() {
    let (switch, _store) = build_offline(SwitchConfig::for_testing());
    let declared = addr("bb@0.0.0.0:26656");
    let (ours, theirs) = tokio::io::duplex(MEMORY_CONNECTION_BUFFER);
    let remote_socket = "5.6.7.8:40000".parse().unwrap();
    let peer = handshaker_for(&declared);

    let (accepted, outcome) = tokio::join!(
        switch.accept(Box::new(ours), remote_socket),
        peer.handshake(Box::new(theirs), ConnectionDirection::Outbound),
    );
    let _conn = outcome.unwrap().conn;

    assert_eq!(accepted.unwrap(), declared.id);
    let entry = switch.address_book().get(&declared.id).unwrap();
    assert_eq!(entry.addr.ip, remote_socket.ip());
    assert_eq!(entry.addr.port, 26656);

    switch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_self_connection_is_rejected() {
    let (switch, _store) = build_offline(SwitchConfig::for_testing());
    let (rejected, _) = connect_inbound(&switch, &addr(SELF_ADDR)).await;

    assert!(matches!(rejected, Err(AcceptError::SelfConnection)));
    assert!(switch.address_book().is_empty());
    assert_eq!(switch.stats().connections.pending_inbound, 0);
    assert!(switch.connected_peers().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_session_for_same_peer_is_rejected() {
    let (switch, _store) = build_offline(SwitchConfig::for_testing());
    let peer = addr("bb@1.2.3.4:26656");

    let (first, _conn) = connect_inbound(&switch, &peer).await;
    assert!(first.is_ok());
    let (second, _) = connect_inbound(&switch, &peer).await;

    assert!(matches!(second, Err(AcceptError::DuplicatePeer(_))));
    assert_eq!(switch.connected_peers().len(), 1);
    assert_eq!(switch.stats().connections.pending_inbound, 0);

    switch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_second_inbound_from_same_host_is_rejected_without_book_change() {
    let mut config = SwitchConfig::for_testing();
    config.slots.allow_duplicate_ip = false;
    let (switch, _store) = build_offline(config);

    let first = addr("bb@1.2.3.4:26656");
    let (accepted, _first_conn) = connect_inbound(&switch, &first).await;
    assert_eq!(accepted.unwrap(), first.id);
    let size_before = switch.address_book().size();

    let second = addr("cc@1.2.3.4:26656");
    let (rejected, _) = connect_inbound(&switch, &second).await;

    assert!(matches!(
        rejected,
        Err(AcceptError::DuplicateIp(ip)) if ip == first.ip
    ));
    assert_eq!(switch.address_book().size(), size_before);
    assert!(!switch.address_book().contains(&second.id));
    assert_eq!(switch.connected_peers(), vec![first.id.clone()]);
    assert_eq!(switch.stats().connections.pending_inbound, 0);

    switch.shutdown().await;
}

// =============================================================================
// TEST GROUP 3: Sessions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_session_requests_addresses_and_learns_response() {
    let mut config = SwitchConfig::for_testing();
    config.seed_mode = false;
    let (switch, _store) = build_offline(config);
    let mut events = take_events(&switch);

    let peer = addr("bb@1.2.3.4:26656");
    let (_, conn) = connect_inbound(&switch, &peer).await;
    let mut conn = conn.unwrap();

    assert_eq!(recv(&mut conn).await.unwrap(), PexMessage::Request);
    let learned = vec![addr("cc@5.6.7.8:26656"), addr("dd@9.9.9.9:26656")];
    send(&mut conn, PexMessage::Addrs(learned.clone())).await;

    let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert!(matches!(
        event,
        SessionEvent::ExchangeCompleted { peer: ref id, .. } if *id == peer.id
    ));
    for learned in &learned {
        let entry = switch.address_book().get(&learned.id).unwrap();
        assert_eq!(entry.source, peer);
    }

    switch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_request_is_answered_without_the_requester() {
    let mut config = SwitchConfig::for_testing();
    config.seed_mode = false;
    let (switch, _store) = build_offline(config);
    let known = addr("cc@5.6.7.8:26656");
    let source = addr("ee@8.8.4.4:26656");
    switch.address_book().add_address(known.clone(), &source);

    let peer = addr("bb@1.2.3.4:26656");
    let (_, conn) = connect_inbound(&switch, &peer).await;
    let mut conn = conn.unwrap();
    // The inbound peer itself is in the book now.
    assert!(switch.address_book().contains(&peer.id));

    send(&mut conn, PexMessage::Request).await;
    let answer = timeout(WAIT, async {
        loop {
            if let PexMessage::Addrs(addrs) = recv(&mut conn).await.unwrap() {
                return addrs;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(answer, vec![known]);

    switch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unsolicited_responses_disconnect_peer() {
    let mut config = SwitchConfig::for_testing();
    config.seed_mode = false;
    let (switch, _store) = build_offline(config);
    let mut events = take_events(&switch);

    let peer = addr("bb@1.2.3.4:26656");
    let (_, conn) = connect_inbound(&switch, &peer).await;
    let mut conn = conn.unwrap();

    assert_eq!(recv(&mut conn).await.unwrap(), PexMessage::Request);
    send(&mut conn, PexMessage::Addrs(Vec::new())).await;
    for _ in 0..3 {
        send(&mut conn, PexMessage::Addrs(vec![addr("cc@5.6.7.8:26656")])).await;
    }

    let reason = next_disconnect(&mut events).await;
    assert!(matches!(
        reason,
        DisconnectReason::Violation(ProtocolViolation::Misbehaving { score: 3, max: 2 })
    ));
    drain_until_closed(&mut conn).await;
    wait_until_disconnected(&switch).await;
    assert!(!switch.address_book().contains(&addr("cc@5.6.7.8:26656").id));
}

#[tokio::test(start_paused = true)]
async fn test_peer_disconnected_for_violation_is_refused_on_reconnect() {
    let mut config = SwitchConfig::for_testing();
    config.seed_mode = false;
    let dialer = Arc::new(FailingDialer::new());
    let (switch, _store) = build(config, dialer.clone());
    let mut events = take_events(&switch);

    let peer = addr("bb@1.2.3.4:26656");
    let (_, conn) = connect_inbound(&switch, &peer).await;
    let mut conn = conn.unwrap();
    assert!(switch.address_book().contains(&peer.id));

    assert_eq!(recv(&mut conn).await.unwrap(), PexMessage::Request);
    send(&mut conn, PexMessage::Addrs(Vec::new())).await;
    for _ in 0..3 {
        send(&mut conn, PexMessage::Addrs(vec![addr("cc@5.6.7.8:26656")])).await;
    }
    let reason = next_disconnect(&mut events).await;
    assert!(matches!(reason, DisconnectReason::Violation(_)));
    drain_until_closed(&mut conn).await;
    wait_until_disconnected(&switch).await;

    assert!(switch.is_banned(&peer.id));
    assert!(!switch.address_book().contains(&peer.id));

    let (again, _) = connect_inbound(&switch, &peer).await;
    assert!(matches!(again, Err(AcceptError::Banned(ref id)) if *id == peer.id));
    assert!(switch.connected_peers().is_empty());
    assert_eq!(switch.stats().connections.pending_inbound, 0);
    assert!(!switch.address_book().contains(&peer.id));

    // Relearned from elsewhere, it is still never dialed.
    let source = addr("ee@8.8.4.4:26656");
    switch.address_book().add_address(peer.clone(), &source);
    assert_eq!(switch.dial_tick(), 0);
    assert!(matches!(
        switch.dial(peer.clone()).await,
        Err(DialError::Banned(_))
    ));
    assert!(dialer.attempts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_request_times_out() {
    let (switch, _store) = build_offline(SwitchConfig::for_testing());
    let mut events = take_events(&switch);

    let peer = addr("bb@1.2.3.4:26656");
    let (_, conn) = connect_inbound(&switch, &peer).await;
    let mut conn = conn.unwrap();
    assert_eq!(recv(&mut conn).await.unwrap(), PexMessage::Request);

    let reason = next_disconnect(&mut events).await;
    assert!(matches!(
        reason,
        DisconnectReason::Violation(ProtocolViolation::ResponseTimeout(d))
            if d == Duration::from_secs(5)
    ));
    wait_until_disconnected(&switch).await;
}

#[tokio::test(start_paused = true)]
async fn test_oversized_response_disconnects_peer() {
    let mut config = SwitchConfig::for_testing();
    config.seed_mode = false;
    let max = config.pex.max_addresses_per_response;
    let (switch, _store) = build_offline(config);
    let mut events = take_events(&switch);

    let peer = addr("bb@1.2.3.4:26656");
    let (_, conn) = connect_inbound(&switch, &peer).await;
    let mut conn = conn.unwrap();
    assert_eq!(recv(&mut conn).await.unwrap(), PexMessage::Request);

    let flood: Vec<NetAddress> = (0..=max)
        .map(|i| addr(&format!("{:02x}@7.7.{}.1:26656", i + 16, i)))
        .collect();
    send(&mut conn, PexMessage::Addrs(flood)).await;

    let reason = next_disconnect(&mut events).await;
    assert!(matches!(
        reason,
        DisconnectReason::Violation(ProtocolViolation::OversizedResponse { .. })
    ));
    // Nothing from the flood was learned and the offender left the book.
    assert!(switch.address_book().is_empty());
    assert!(switch.is_banned(&peer.id));
}

#[tokio::test(start_paused = true)]
async fn test_seed_mode_churns_peer_after_exchange() {
    let (switch, _store) = build_offline(SwitchConfig::for_testing());
    switch.start();

    let peer = addr("bb@1.2.3.4:26656");
    let (_, conn) = connect_inbound(&switch, &peer).await;
    let mut conn = conn.unwrap();

    assert_eq!(recv(&mut conn).await.unwrap(), PexMessage::Request);
    send(&mut conn, PexMessage::Addrs(vec![addr("cc@5.6.7.8:26656")])).await;
    let answered_at = Instant::now();

    drain_until_closed(&mut conn).await;
    assert!(answered_at.elapsed() >= switch.config().churn_grace);
    wait_until_disconnected(&switch).await;
    assert!(!switch.is_shutting_down());

    switch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_churn_happens_even_when_event_queue_is_full() {
    let mut config = SwitchConfig::for_testing();
    config.event_queue_size = 1;
    let (switch, _store) = build_offline(config);
    // Nobody drains the queue; fill its only slot.
    switch
        .inner
        .events_tx
        .try_send(SessionEvent::Misbehaved {
            peer: addr("ff@9.9.9.9:26656").id,
            score: 0,
        })
        .unwrap();

    let peer = addr("bb@1.2.3.4:26656");
    let (_, conn) = connect_inbound(&switch, &peer).await;
    let mut conn = conn.unwrap();

    assert_eq!(recv(&mut conn).await.unwrap(), PexMessage::Request);
    send(&mut conn, PexMessage::Addrs(vec![addr("cc@5.6.7.8:26656")])).await;
    let answered_at = Instant::now();

    drain_until_closed(&mut conn).await;
    assert!(answered_at.elapsed() >= switch.config().churn_grace);
    wait_until_disconnected(&switch).await;
    assert!(!switch.is_banned(&peer.id));

    switch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_command_ends_session() {
    let (switch, _store) = build_offline(SwitchConfig::for_testing());
    let mut events = take_events(&switch);

    let peer = addr("bb@1.2.3.4:26656");
    let (_, conn) = connect_inbound(&switch, &peer).await;
    let mut conn = conn.unwrap();

    assert!(switch.disconnect(&peer.id));
    let reason = next_disconnect(&mut events).await;
    assert!(matches!(reason, DisconnectReason::Requested));
    drain_until_closed(&mut conn).await;
    wait_until_disconnected(&switch).await;
    assert!(!switch.disconnect(&peer.id));
}

// =============================================================================
// TEST GROUP 4: Shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_idempotent_and_saves_once() {
    let (switch, store) = build_offline(SwitchConfig::for_testing());
    switch.start();

    let peer = addr("bb@1.2.3.4:26656");
    let (_, conn) = connect_inbound(&switch, &peer).await;
    let mut conn = conn.unwrap();

    let other = switch.clone();
    tokio::join!(switch.shutdown(), other.shutdown());
    switch.shutdown().await;

    assert!(switch.is_shutting_down());
    assert!(switch.stats().shutting_down);
    assert!(switch.connected_peers().is_empty());
    assert_eq!(store.save_count(), 1);
    let saved = store.snapshot().unwrap();
    assert!(saved.addrs.iter().any(|e| e.addr.id == peer.id));
    drain_until_closed(&mut conn).await;
}

#[tokio::test(start_paused = true)]
async fn test_no_admission_after_shutdown() {
    let (switch, _store) = build_offline(SwitchConfig::for_testing());
    switch.shutdown().await;

    let (rejected, _) = connect_inbound(&switch, &addr("bb@1.2.3.4:26656")).await;
    assert!(matches!(rejected, Err(AcceptError::ShuttingDown)));

    let err = switch.dial(addr("cc@5.6.7.8:26656")).await.unwrap_err();
    assert!(matches!(err, DialError::ShuttingDown));
    assert_eq!(switch.dial_tick(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_listener_loop_accepts_and_stops_on_shutdown() {
    let network = MemoryNetwork::new();
    let (switch, _store) = build_offline(SwitchConfig::for_testing());
    let listener = Arc::new(network.listen(addr(SELF_ADDR).socket_addr()));
    assert_eq!(
        listener.local_addr().unwrap(),
        addr(SELF_ADDR).socket_addr()
    );
    switch.start();
    switch.spawn_listener(listener);

    let peer = addr("bb@1.2.3.4:26656");
    let dialer = network.dialer(peer.socket_addr());
    let conn = dialer.dial(addr(SELF_ADDR).socket_addr()).await.unwrap();
    let outcome = handshaker_for(&peer)
        .handshake(conn, ConnectionDirection::Outbound)
        .await
        .unwrap();
    let mut conn = outcome.conn;
    assert_eq!(recv(&mut conn).await.unwrap(), PexMessage::Request);
    assert_eq!(switch.connected_peers(), vec![peer.id.clone()]);

    switch.shutdown().await;
    drain_until_closed(&mut conn).await;
    assert!(switch.connected_peers().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_dials_before_saving() {
    let target = addr("bb@1.2.3.4:26656");
    let network = MemoryNetwork::new();
    // Accepts the connection but never handshakes.
    let _listener = network.listen(target.socket_addr());
    let (switch, store) = build(
        SwitchConfig::for_testing(),
        Arc::new(network.dialer(addr(SELF_ADDR).socket_addr())),
    );
    let source = addr("ee@8.8.4.4:26656");
    switch.address_book().add_address(target.clone(), &source);

    assert_eq!(switch.dial_tick(), 1);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(switch.inflight_tasks(), 1);

    switch.shutdown().await;
    assert_eq!(switch.inflight_tasks(), 0);
    assert_eq!(store.save_count(), 1);
    let saved = store.snapshot().unwrap();
    let saved_entry = saved.addrs.iter().find(|e| e.addr.id == target.id).unwrap();
    assert_eq!(saved_entry.attempts, 0);

    // Long past the handshake timeout, the cancelled dial changed nothing.
    tokio::time::sleep(switch.config().handshake_timeout * 2).await;
    let entry = switch.address_book().get(&target.id).unwrap();
    assert_eq!(entry.attempts, 0);
    assert!(entry.last_attempt.is_none());
    assert!(switch.retry_delay(&target.id).is_none());
    assert_eq!(store.save_count(), 1);
}

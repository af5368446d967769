//! Heartbeat gossip over UDP.
//!
//! Every node keeps a table of the peers it knows about, each with a
//! heartbeat counter that only its owner increments. Every gossip round a
//! node bumps its own heartbeat and pushes its table to a few random peers,
//! which merge it (higher heartbeat wins) and answer with their own table.
//! A peer whose heartbeat stops advancing for `suspect_timeout` is declared
//! dead. Departures are announced with a `Leave` message carrying a bumped
//! heartbeat so that they win over stale gossip.
//!
//! Records are versioned by `(incarnation, heartbeat)`. The incarnation is
//! taken from the clock at startup, so a restarted node outranks the
//! tombstone its previous run left behind even though its heartbeat starts
//! over.

use crate::collab::membership::{Member, Membership, MembershipEvent};
use anyhow::{Result, bail};
use futures::future::join_all;
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time;

const MAX_DATAGRAM_SIZE: usize = 65_507;
const EVENT_QUEUE_CAPACITY: usize = 256;
/// Tombstones outlive the suspect timeout by this factor.
const TOMBSTONE_FACTOR: u32 = 10;

#[derive(Debug, Clone)]
pub struct GossipConfig {
    pub name: String,
    pub bind_addr: SocketAddr,
    /// Address peers use to reach us, defaults to the bound socket address
    pub advertise_addr: Option<SocketAddr>,
    pub gossip_interval: Duration,
    pub suspect_timeout: Duration,
    /// How long a join waits for seeds to answer
    pub join_timeout: Duration,
    pub fanout: usize,
}

impl GossipConfig {
    pub fn new(name: impl Into<String>, bind_addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            bind_addr,
            advertise_addr: None,
            gossip_interval: Duration::from_secs(1),
            suspect_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(3),
            fanout: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum NodeState {
    Alive,
    Left,
    Dead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct NodeDigest {
    name: String,
    address: SocketAddr,
    /// Absent from nodes that predate it, which then rank below any restart
    #[serde(default)]
    incarnation: u64,
    heartbeat: u64,
    state: NodeState,
}

impl NodeDigest {
    fn version(&self) -> (u64, u64) {
        (self.incarnation, self.heartbeat)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum GossipMessage {
    Sync { from: String, nodes: Vec<NodeDigest> },
    SyncAck { from: String, nodes: Vec<NodeDigest> },
    Leave { node: NodeDigest },
}

#[derive(Debug, Clone)]
struct NodeRecord {
    address: SocketAddr,
    incarnation: u64,
    heartbeat: u64,
    state: NodeState,
    /// Last time the heartbeat advanced or the state changed
    changed_at: Instant,
}

impl NodeRecord {
    fn version(&self) -> (u64, u64) {
        (self.incarnation, self.heartbeat)
    }

    fn member(&self, name: &str) -> Member {
        Member {
            name: name.to_string(),
            address: self.address,
        }
    }
}

#[derive(Debug)]
struct MembershipTable {
    local: Member,
    incarnation: u64,
    heartbeat: u64,
    state: NodeState,
    peers: HashMap<String, NodeRecord>,
}

impl MembershipTable {
    fn new(local: Member, incarnation: u64) -> Self {
        Self {
            local,
            incarnation,
            heartbeat: 0,
            state: NodeState::Alive,
            peers: HashMap::new(),
        }
    }

    fn tick(&mut self) {
        if self.state == NodeState::Alive {
            self.heartbeat += 1;
        }
    }

    fn local_digest(&self) -> NodeDigest {
        NodeDigest {
            name: self.local.name.clone(),
            address: self.local.address,
            incarnation: self.incarnation,
            heartbeat: self.heartbeat,
            state: self.state,
        }
    }

    /// Our own record plus every peer that is alive or has left. Dead peers
    /// are not gossiped, each node finds out on its own.
    fn digest(&self) -> Vec<NodeDigest> {
        let peers = self
            .peers
            .iter()
            .filter(|(_, record)| record.state != NodeState::Dead)
            .map(|(name, record)| NodeDigest {
                name: name.clone(),
                address: record.address,
                incarnation: record.incarnation,
                heartbeat: record.heartbeat,
                state: record.state,
            });

        std::iter::once(self.local_digest()).chain(peers).collect()
    }

    fn merge(&mut self, nodes: Vec<NodeDigest>, now: Instant) -> Vec<MembershipEvent> {
        let mut events = Vec::new();

        for node in nodes {
            if node.name == self.local.name {
                // Someone remembers a version of us at least as new as ours:
                // jump past it so our liveness wins again.
                if self.state == NodeState::Alive
                    && node.version() >= (self.incarnation, self.heartbeat)
                {
                    debug!(
                        "refuting stale record of '{}' at heartbeat {}",
                        node.name, node.heartbeat
                    );
                    self.incarnation = node.incarnation;
                    self.heartbeat = node.heartbeat + 1;
                }
                continue;
            }

            if node.state == NodeState::Dead {
                continue;
            }

            let Some(record) = self.peers.get_mut(&node.name) else {
                let record = NodeRecord {
                    address: node.address,
                    incarnation: node.incarnation,
                    heartbeat: node.heartbeat,
                    state: node.state,
                    changed_at: now,
                };
                if node.state == NodeState::Alive {
                    events.push(MembershipEvent::Joined(record.member(&node.name)));
                }
                self.peers.insert(node.name, record);
                continue;
            };

            let newer = node.version() > record.version();
            let left_now = node.version() == record.version()
                && node.state == NodeState::Left
                && record.state == NodeState::Alive;

            if !newer && !left_now {
                continue;
            }

            match (record.state, node.state) {
                (NodeState::Alive, NodeState::Left) => {
                    events.push(MembershipEvent::Left(record.member(&node.name)));
                }
                (NodeState::Left | NodeState::Dead, NodeState::Alive) => {
                    events.push(MembershipEvent::Joined(Member {
                        name: node.name.clone(),
                        address: node.address,
                    }));
                }
                (NodeState::Alive, NodeState::Alive) if record.address != node.address => {
                    events.push(MembershipEvent::Updated(Member {
                        name: node.name.clone(),
                        address: node.address,
                    }));
                }
                _ => {}
            }

            record.address = node.address;
            record.incarnation = node.incarnation;
            record.heartbeat = node.heartbeat;
            record.state = node.state;
            record.changed_at = now;
        }

        events
    }

    /// Declares silent peers dead and forgets old tombstones.
    fn reap(&mut self, now: Instant, suspect_timeout: Duration) -> Vec<MembershipEvent> {
        let mut events = Vec::new();
        let tombstone_ttl = suspect_timeout * TOMBSTONE_FACTOR;

        for (name, record) in self.peers.iter_mut() {
            let silence = now.saturating_duration_since(record.changed_at);
            if record.state == NodeState::Alive && silence > suspect_timeout {
                record.state = NodeState::Dead;
                record.changed_at = now;
                events.push(MembershipEvent::Left(record.member(name)));
            }
        }

        self.peers.retain(|_, record| {
            record.state == NodeState::Alive
                || now.saturating_duration_since(record.changed_at) <= tombstone_ttl
        });

        events
    }

    fn leave(&mut self) -> NodeDigest {
        self.heartbeat += 1;
        self.state = NodeState::Left;
        self.local_digest()
    }

    fn alive_peers(&self) -> Vec<SocketAddr> {
        self.peers
            .values()
            .filter(|record| record.state == NodeState::Alive)
            .map(|record| record.address)
            .collect()
    }

    fn members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .peers
            .iter()
            .filter(|(_, record)| record.state == NodeState::Alive)
            .map(|(name, record)| record.member(name))
            .collect();

        if self.state == NodeState::Alive {
            members.push(self.local.clone());
        }

        members.sort_by(|a, b| a.name.cmp(&b.name));
        members
    }
}

struct GossipState {
    config: GossipConfig,
    socket: UdpSocket,
    table: Mutex<MembershipTable>,
    events: mpsc::Sender<MembershipEvent>,
    /// Nodes that answered a `Sync` since the last join started, by name.
    /// Source addresses are not compared: a dual-stack socket sees IPv4
    /// peers as mapped IPv6 and multi-homed peers may answer from elsewhere.
    acks: Mutex<HashSet<String>>,
    ack_received: Notify,
}

impl GossipState {
    /// Never blocks: a full queue drops the event.
    fn emit(&self, events: Vec<MembershipEvent>) {
        for event in events {
            if let Err(e) = self.events.try_send(event) {
                debug!("dropping membership event: {e}");
            }
        }
    }

    async fn send(&self, message: &GossipMessage, target: SocketAddr) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        if payload.len() > MAX_DATAGRAM_SIZE {
            bail!("gossip message of {} bytes does not fit a datagram", payload.len());
        }

        self.socket.send_to(&payload, target).await?;

        Ok(())
    }

    async fn handle(&self, payload: &[u8], source: SocketAddr) -> Result<()> {
        let message: GossipMessage = serde_json::from_slice(payload)?;
        trace!("gossip from {source}: {message:?}");

        let now = Instant::now();

        match message {
            GossipMessage::Sync { from, nodes } => {
                let (events, reply) = {
                    let mut table = self.table.lock();
                    let events = table.merge(nodes, now);
                    let reply = GossipMessage::SyncAck {
                        from: table.local.name.clone(),
                        nodes: table.digest(),
                    };
                    (events, reply)
                };
                self.emit(events);

                if let Err(e) = self.send(&reply, source).await {
                    warn!("failed to answer sync from '{from}' at {source}: {e}");
                }
            }
            GossipMessage::SyncAck { from, nodes } => {
                let events = self.table.lock().merge(nodes, now);
                self.emit(events);

                self.acks.lock().insert(from);
                self.ack_received.notify_waiters();
            }
            GossipMessage::Leave { node } => {
                let events = self.table.lock().merge(vec![node], now);
                self.emit(events);
            }
        }

        Ok(())
    }

    async fn gossip_round(&self) {
        let (message, targets) = {
            let mut table = self.table.lock();
            table.tick();
            let events = table.reap(Instant::now(), self.config.suspect_timeout);
            self.emit(events);

            let peers = table.alive_peers();
            let targets: Vec<SocketAddr> = peers
                .choose_multiple(&mut rand::rng(), self.config.fanout)
                .copied()
                .collect();
            let message = GossipMessage::Sync {
                from: table.local.name.clone(),
                nodes: table.digest(),
            };

            (message, targets)
        };

        for target in targets {
            if let Err(e) = self.send(&message, target).await {
                warn!("failed to gossip to {target}: {e}");
            }
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((length, source)) => {
                    if let Err(e) = self.handle(&buffer[..length], source).await {
                        warn!("dropping gossip message from {source}: {e}");
                    }
                }
                Err(e) => error!("gossip socket receive failed: {e}"),
            }
        }
    }

    async fn gossip_loop(self: Arc<Self>) {
        let mut ticker = time::interval(self.config.gossip_interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.gossip_round().await;
        }
    }
}

/// Milliseconds since the epoch, so each run outranks the previous one.
fn startup_incarnation() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// A [`Membership`] backed by heartbeat gossip over a UDP socket.
pub struct GossipMembership {
    state: Arc<GossipState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GossipMembership {
    /// Binds the socket and starts gossiping.
    ///
    /// The returned receiver carries join/leave/update notifications. It is
    /// bounded and fed with `try_send`, so a slow consumer loses events
    /// instead of stalling the transport.
    pub async fn start(config: GossipConfig) -> Result<(Self, mpsc::Receiver<MembershipEvent>)> {
        let socket = UdpSocket::bind(config.bind_addr).await?;
        let address = match config.advertise_addr {
            Some(address) => address,
            None => socket.local_addr()?,
        };

        let local = Member {
            name: config.name.clone(),
            address,
        };
        let (events, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let state = Arc::new(GossipState {
            config,
            socket,
            table: Mutex::new(MembershipTable::new(local, startup_incarnation())),
            events,
            acks: Mutex::new(HashSet::new()),
            ack_received: Notify::new(),
        });

        let tasks = vec![
            tokio::spawn(state.clone().receive_loop()),
            tokio::spawn(state.clone().gossip_loop()),
        ];

        info!(
            "gossip transport started for '{}' on {}",
            state.config.name, address
        );

        Ok((
            Self {
                state,
                tasks: Mutex::new(tasks),
            },
            events_rx,
        ))
    }

    pub fn local_member(&self) -> Member {
        self.state.table.lock().local.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.state.socket.local_addr()?)
    }
}

impl Membership for GossipMembership {
    async fn join(&self, seeds: &[SocketAddr]) -> Result<usize> {
        if seeds.is_empty() {
            bail!("no seeds to join");
        }

        self.state.acks.lock().clear();

        let message = {
            let table = self.state.table.lock();
            GossipMessage::Sync {
                from: table.local.name.clone(),
                nodes: table.digest(),
            }
        };

        for seed in seeds {
            if let Err(e) = self.state.send(&message, *seed).await {
                warn!("failed to contact seed {seed}: {e}");
            }
        }

        let answered = || self.state.acks.lock().len();

        let wait = async {
            loop {
                let notified = self.state.ack_received.notified();
                if answered() > 0 {
                    return;
                }
                notified.await;
            }
        };

        if time::timeout(self.state.config.join_timeout, wait).await.is_err() {
            bail!("none of the {} seeds answered", seeds.len());
        }

        Ok(answered())
    }

    fn members(&self) -> Vec<Member> {
        self.state.table.lock().members()
    }

    async fn leave(&self, timeout: Duration) -> Result<()> {
        let (node, peers) = {
            let mut table = self.state.table.lock();
            (table.leave(), table.alive_peers())
        };

        let message = GossipMessage::Leave { node };
        let sends = peers.iter().map(|peer| self.state.send(&message, *peer));

        let results = time::timeout(timeout, join_all(sends)).await?;
        let failed = results.iter().filter(|result| result.is_err()).count();
        if failed > 0 {
            bail!("failed to notify {failed} of {} peers", peers.len());
        }

        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();

        if !tasks.is_empty() {
            for task in tasks {
                task.abort();
            }
            info!("gossip transport for '{}' stopped", self.state.config.name);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::membership::member_names;

    fn member(name: &str, port: u16) -> Member {
        Member {
            name: name.to_string(),
            address: SocketAddr::from(([127, 0, 0, 1], port)),
        }
    }

    fn digest(name: &str, port: u16, heartbeat: u64, state: NodeState) -> NodeDigest {
        digest_at(name, port, 1, heartbeat, state)
    }

    fn digest_at(
        name: &str,
        port: u16,
        incarnation: u64,
        heartbeat: u64,
        state: NodeState,
    ) -> NodeDigest {
        NodeDigest {
            name: name.to_string(),
            address: SocketAddr::from(([127, 0, 0, 1], port)),
            incarnation,
            heartbeat,
            state,
        }
    }

    fn names(table: &MembershipTable) -> Vec<String> {
        member_names(&table.members())
    }

    #[test]
    fn test_merge_new_and_newer_records() {
        let now = Instant::now();
        let mut table = MembershipTable::new(member("a", 1), 1);

        let events = table.merge(vec![digest("b", 2, 5, NodeState::Alive)], now);
        assert_eq!(events, vec![MembershipEvent::Joined(member("b", 2))]);
        assert_eq!(names(&table), vec!["a", "b"]);

        // stale heartbeat is ignored
        let events = table.merge(vec![digest("b", 3, 4, NodeState::Alive)], now);
        assert!(events.is_empty());
        assert_eq!(table.peers["b"].address, member("b", 2).address);

        // newer heartbeat with another address is an update
        let events = table.merge(vec![digest("b", 3, 6, NodeState::Alive)], now);
        assert_eq!(events, vec![MembershipEvent::Updated(member("b", 3))]);

        let events = table.merge(vec![digest("b", 3, 7, NodeState::Left)], now);
        assert_eq!(events, vec![MembershipEvent::Left(member("b", 3))]);
        assert_eq!(names(&table), vec!["a"]);

        // gossip older than the departure cannot resurrect it
        let events = table.merge(vec![digest("b", 3, 6, NodeState::Alive)], now);
        assert!(events.is_empty());
        assert_eq!(names(&table), vec!["a"]);

        // a restart with a higher heartbeat does
        let events = table.merge(vec![digest("b", 3, 8, NodeState::Alive)], now);
        assert_eq!(events, vec![MembershipEvent::Joined(member("b", 3))]);
    }

    #[test]
    fn test_merge_ignores_dead_and_unknown_departed() {
        let now = Instant::now();
        let mut table = MembershipTable::new(member("a", 1), 1);

        let events = table.merge(
            vec![
                digest("b", 2, 1, NodeState::Dead),
                digest("c", 3, 1, NodeState::Left),
            ],
            now,
        );

        assert!(events.is_empty());
        assert_eq!(names(&table), vec!["a"]);
        assert!(!table.peers.contains_key("b"));
        assert_eq!(table.peers["c"].state, NodeState::Left);
    }

    #[test]
    fn test_refutes_stale_self_record() {
        let now = Instant::now();
        let mut table = MembershipTable::new(member("a", 1), 1);
        table.tick();

        table.merge(vec![digest("a", 1, 40, NodeState::Left)], now);

        assert_eq!(table.heartbeat, 41);
        assert_eq!(table.state, NodeState::Alive);
        assert!(table.peers.is_empty());
    }

    #[test]
    fn test_reap_silent_peers() {
        let suspect = Duration::from_secs(5);
        let start = Instant::now();
        let mut table = MembershipTable::new(member("a", 1), 1);
        table.merge(
            vec![
                digest("b", 2, 1, NodeState::Alive),
                digest("c", 3, 1, NodeState::Alive),
            ],
            start,
        );

        // c keeps beating, b goes silent
        let later = start + Duration::from_secs(4);
        table.merge(vec![digest("c", 3, 2, NodeState::Alive)], later);

        let events = table.reap(start + Duration::from_secs(6), suspect);
        assert_eq!(events, vec![MembershipEvent::Left(member("b", 2))]);
        assert_eq!(names(&table), vec!["a", "c"]);
        assert_eq!(table.peers["b"].state, NodeState::Dead);

        // dead peers are not gossiped
        assert!(table.digest().iter().all(|d| d.name != "b"));

        // tombstone is eventually forgotten
        table.merge(vec![digest("c", 3, 3, NodeState::Alive)], start + suspect * 20);
        table.reap(start + suspect * 20, suspect);
        assert!(!table.peers.contains_key("b"));
        assert!(table.peers.contains_key("c"));
    }

    #[test]
    fn test_restarted_node_outranks_its_tombstone() {
        let suspect = Duration::from_secs(5);
        let start = Instant::now();
        let mut table = MembershipTable::new(member("a", 1), 1);
        table.merge(vec![digest_at("b", 2, 10, 50, NodeState::Alive)], start);

        // b crashes and is declared dead
        let events = table.reap(start + Duration::from_secs(6), suspect);
        assert_eq!(events, vec![MembershipEvent::Left(member("b", 2))]);

        // late gossip from the old run does not bring it back
        let later = start + Duration::from_secs(7);
        let events = table.merge(vec![digest_at("b", 2, 10, 50, NodeState::Alive)], later);
        assert!(events.is_empty());
        assert_eq!(names(&table), vec!["a"]);

        // the new run starts its heartbeat over but carries a newer incarnation
        let events = table.merge(vec![digest_at("b", 3, 11, 1, NodeState::Alive)], later);
        assert_eq!(events, vec![MembershipEvent::Joined(member("b", 3))]);
        assert_eq!(names(&table), vec!["a", "b"]);

        // and the old run can no longer override it
        let events = table.merge(vec![digest_at("b", 2, 10, 99, NodeState::Left)], later);
        assert!(events.is_empty());
        assert_eq!(names(&table), vec!["a", "b"]);
    }

    #[test]
    fn test_adopts_newer_incarnation_of_self() {
        let mut table = MembershipTable::new(member("a", 1), 5);
        table.tick();

        // a record from an older run is ignored
        table.merge(vec![digest_at("a", 1, 4, 90, NodeState::Left)], Instant::now());
        assert_eq!((table.incarnation, table.heartbeat), (5, 1));

        // one that claims to be newer is outranked again
        table.merge(vec![digest_at("a", 1, 6, 3, NodeState::Left)], Instant::now());
        assert_eq!((table.incarnation, table.heartbeat), (6, 4));
        assert_eq!(table.state, NodeState::Alive);
    }

    #[test]
    fn test_leave_marks_local_node() {
        let mut table = MembershipTable::new(member("a", 1), 1);
        table.merge(vec![digest("b", 2, 1, NodeState::Alive)], Instant::now());
        table.tick();

        let node = table.leave();
        assert_eq!(node.state, NodeState::Left);
        assert_eq!(node.heartbeat, 2);
        assert_eq!(names(&table), vec!["b"]);

        // a departed node no longer bumps its heartbeat
        table.tick();
        assert_eq!(table.heartbeat, 2);
    }

    fn test_config(name: &str) -> GossipConfig {
        GossipConfig {
            gossip_interval: Duration::from_millis(50),
            suspect_timeout: Duration::from_millis(600),
            join_timeout: Duration::from_millis(500),
            ..GossipConfig::new(name, SocketAddr::from(([127, 0, 0, 1], 0)))
        }
    }

    async fn wait_for_members(membership: &GossipMembership, expected: &[&str]) {
        let result = time::timeout(Duration::from_secs(5), async {
            loop {
                if member_names(&membership.members()) == expected {
                    return;
                }
                time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;

        assert!(
            result.is_ok(),
            "expected members {expected:?}, got {:?}",
            member_names(&membership.members())
        );
    }

    #[tokio::test]
    async fn test_nodes_discover_each_other() -> Result<()> {
        let (a, _a_events) = GossipMembership::start(test_config("a")).await?;
        let (b, mut b_events) = GossipMembership::start(test_config("b")).await?;
        let (c, _c_events) = GossipMembership::start(test_config("c")).await?;

        assert_eq!(b.join(&[a.local_addr()?]).await?, 1);
        assert_eq!(c.join(&[b.local_addr()?]).await?, 1);

        for node in [&a, &b, &c] {
            wait_for_members(node, &["a", "b", "c"]).await;
        }

        let event = b_events.recv().await.expect("event channel open");
        assert!(matches!(event, MembershipEvent::Joined(_)));

        // graceful departure reaches everyone
        c.leave(Duration::from_secs(1)).await?;
        c.shutdown().await?;
        wait_for_members(&a, &["a", "b"]).await;
        wait_for_members(&b, &["a", "b"]).await;

        a.shutdown().await?;
        b.shutdown().await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_join_self() -> Result<()> {
        let (a, _events) = GossipMembership::start(test_config("a")).await?;

        assert_eq!(a.join(&[a.local_addr()?]).await?, 1);
        assert_eq!(member_names(&a.members()), vec!["a"]);

        a.shutdown().await?;
        // idempotent
        a.shutdown().await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_crashed_node_is_declared_dead() -> Result<()> {
        let (a, _a_events) = GossipMembership::start(test_config("a")).await?;
        let (b, _b_events) = GossipMembership::start(test_config("b")).await?;

        b.join(&[a.local_addr()?]).await?;
        wait_for_members(&a, &["a", "b"]).await;

        // no leave: b just stops talking
        b.shutdown().await?;
        wait_for_members(&a, &["a"]).await;

        a.shutdown().await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_dual_stack_node_joins_ipv4_seed() -> Result<()> {
        let (seed, _seed_events) = GossipMembership::start(test_config("seed")).await?;

        let config = GossipConfig {
            bind_addr: "[::]:0".parse()?,
            ..test_config("n1")
        };
        // hosts without IPv6 cannot run this
        let Ok((node, _node_events)) = GossipMembership::start(config).await else {
            seed.shutdown().await?;
            return Ok(());
        };

        // the ack arrives from [::ffff:127.0.0.1], not from the seed address itself
        assert_eq!(node.join(&[seed.local_addr()?]).await?, 1);
        wait_for_members(&seed, &["n1", "seed"]).await;

        node.shutdown().await?;
        seed.shutdown().await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_join_without_answer_fails() -> Result<()> {
        let silent = std::net::UdpSocket::bind("127.0.0.1:0")?;
        let (a, _events) = GossipMembership::start(test_config("a")).await?;

        let result = a.join(&[silent.local_addr()?]).await;
        assert!(result.is_err());
        assert!(a.join(&[]).await.is_err());

        a.shutdown().await?;

        Ok(())
    }
}

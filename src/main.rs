use log::{error, info, warn};
use reqwest::Client;
use ringwork::{
    collab::{
        MembershipEvent, Rendezvous,
        gossip::{GossipConfig, GossipMembership},
        network::get_first_network_address,
        node_name,
    },
    eager_env::{self, check_env},
    utils::init_logger,
    worker::{
        JoinOutcome, Worker, WorkerConfig, fetch::EntitySourceClient, join_cluster,
        push::MetricSinkClient,
    },
};
use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    process::ExitCode,
    sync::Arc,
    time::Duration,
};
use tokio::sync::{mpsc, watch};

/// Flips the watch channel on SIGINT or SIGTERM.
fn spawn_signal_listener() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT"),
            _ = terminate => info!("received SIGTERM"),
        }

        let _ = tx.send(true);
    });

    rx
}

fn spawn_event_logger(node: String, mut events: mpsc::Receiver<MembershipEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                MembershipEvent::Joined(member) => {
                    info!("[{}] member joined: {} ({})", node, member.name, member.address)
                }
                MembershipEvent::Left(member) => {
                    info!("[{}] member left: {} ({})", node, member.name, member.address)
                }
                MembershipEvent::Updated(member) => {
                    info!("[{}] member updated: {} ({})", node, member.name, member.address)
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();
    check_env();

    let node = node_name(&eager_env::NODE_NAME).expect("failed to determine the node name");

    let port = *eager_env::GOSSIP_PORT;
    let advertise_addr = if eager_env::GOSSIP_ADVERTISE_ADDR.is_empty() {
        let address = get_first_network_address(port);
        if address.is_none() {
            warn!("no private network address found, advertising the bound socket address");
        }
        address
    } else {
        let address = eager_env::GOSSIP_ADVERTISE_ADDR
            .parse::<SocketAddr>()
            .or_else(|_| {
                eager_env::GOSSIP_ADVERTISE_ADDR
                    .parse()
                    .map(|ip| SocketAddr::new(ip, port))
            })
            .expect("Invalid GOSSIP_ADVERTISE_ADDR");
        Some(address)
    };

    let bind_ip: IpAddr = match advertise_addr {
        Some(address) if address.is_ipv6() => Ipv6Addr::UNSPECIFIED.into(),
        _ => Ipv4Addr::UNSPECIFIED.into(),
    };

    let gossip_config = GossipConfig {
        advertise_addr,
        gossip_interval: Duration::from_millis(*eager_env::GOSSIP_INTERVAL_MILLIS),
        suspect_timeout: Duration::from_millis(*eager_env::GOSSIP_SUSPECT_MILLIS),
        ..GossipConfig::new(node.clone(), SocketAddr::new(bind_ip, port))
    };

    let worker_config = WorkerConfig {
        node_name: node.clone(),
        reconcile_interval: Duration::from_secs(*eager_env::RECONCILE_INTERVAL_SECONDS),
        join_deadline: Duration::from_secs(*eager_env::JOIN_DEADLINE_SECONDS),
        join_retry: Duration::from_secs(*eager_env::JOIN_RETRY_SECONDS),
        leave_timeout: Duration::from_secs(*eager_env::LEAVE_TIMEOUT_SECONDS),
    };

    let client = Client::builder()
        .timeout(Duration::from_secs(*eager_env::REQUEST_TIMEOUT_SECONDS))
        .build()
        .expect("failed to build the HTTP client");
    let entity_source =
        EntitySourceClient::new(client.clone(), eager_env::ENTITY_SOURCE_URL.as_str())
            .expect("Invalid ENTITY_SOURCE_URL");
    let metric_sink = MetricSinkClient::new(client, eager_env::METRIC_SINK_URL.as_str())
        .expect("Invalid METRIC_SINK_URL");

    let (membership, events) = GossipMembership::start(gossip_config)
        .await
        .expect("failed to start the gossip transport");
    let membership = Arc::new(membership);
    spawn_event_logger(node.clone(), events);

    let mut shutdown = spawn_signal_listener();
    let seeds = Rendezvous::new(eager_env::GOSSIP_ADDR.as_str(), port);

    let worker = Worker::new(
        worker_config.clone(),
        membership.clone(),
        entity_source,
        metric_sink,
    );

    let joined = join_cluster(membership.as_ref(), &seeds, &worker_config, &mut shutdown).await;
    let exit_code = match joined {
        Ok(JoinOutcome::Joined) => {
            worker.run(&mut shutdown).await;
            ExitCode::SUCCESS
        }
        Ok(JoinOutcome::Cancelled) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[{}] {}", node, e);
            ExitCode::FAILURE
        }
    };

    if let Err(e) = worker.leave_cluster().await {
        warn!("[{}] {}", node, e);
    }

    info!("[{}] bye", node);
    exit_code
}

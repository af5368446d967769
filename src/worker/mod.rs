//! The reconciler: joins the cluster, then on every tick works out which
//! entities this node owns and relays their data from the entity source to
//! the metric sink.

pub mod error;
pub mod fetch;
pub mod push;

use crate::collab::{ConsistentHash, Membership, SeedSource, membership::member_names};
use error::WorkerError;
use fetch::EntitySourceClient;
use log::{debug, error, info, warn};
use push::{MetricSinkClient, build_submission};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    time::{self, Instant, MissedTickBehavior},
};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub node_name: String,
    pub reconcile_interval: Duration,
    pub join_deadline: Duration,
    pub join_retry: Duration,
    pub leave_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub members: usize,
    pub entities: usize,
    pub owned: usize,
}

/// Resolves once `true` has been sent. A dropped sender never resolves.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn join_attempt<M, S>(membership: &M, seeds: &S, node: &str) -> anyhow::Result<usize>
where
    M: Membership,
    S: SeedSource,
{
    let seeds = seeds.resolve().await?;
    info!("[{}] joining through {:?}", node, seeds);

    membership.join(&seeds).await
}

/// Retries joining until a seed answers, the deadline passes or shutdown is
/// requested. The first attempt runs immediately.
pub async fn join_cluster<M, S>(
    membership: &M,
    seeds: &S,
    config: &WorkerConfig,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<JoinOutcome, WorkerError>
where
    M: Membership,
    S: SeedSource,
{
    let node = config.node_name.as_str();
    let started = Instant::now();

    let deadline = time::sleep(config.join_deadline);
    tokio::pin!(deadline);

    let mut retry = time::interval(config.join_retry.max(Duration::from_millis(1)));
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_requested(shutdown) => {
                info!("[{}] shutdown requested while joining", node);
                return Ok(JoinOutcome::Cancelled);
            }
            _ = &mut deadline => {
                let elapsed = started.elapsed();
                error!("[{}] could not join the cluster within {:?}", node, elapsed);
                return Err(WorkerError::JoinTimeout { elapsed });
            }
            _ = retry.tick() => {}
        }

        match join_attempt(membership, seeds, node).await {
            Ok(answered) => {
                info!(
                    "[{}] joined the cluster, {} seeds answered, {} members known",
                    node,
                    answered,
                    membership.members().len()
                );
                return Ok(JoinOutcome::Joined);
            }
            Err(e) => warn!("[{}] join attempt failed: {:#}", node, e),
        }
    }
}

/// The entities of `entities` the ring assigns to `node`, in input order.
pub fn owned_entities(ring: &ConsistentHash, entities: &[String], node: &str) -> Vec<String> {
    entities
        .iter()
        .filter(|entity| ring.is_assigned(node, entity))
        .cloned()
        .collect()
}

pub struct Worker<M> {
    config: WorkerConfig,
    membership: Arc<M>,
    entity_source: EntitySourceClient,
    metric_sink: MetricSinkClient,
}

impl<M: Membership> Worker<M> {
    pub fn new(
        config: WorkerConfig,
        membership: Arc<M>,
        entity_source: EntitySourceClient,
        metric_sink: MetricSinkClient,
    ) -> Self {
        Self {
            config,
            membership,
            entity_source,
            metric_sink,
        }
    }

    pub fn node_name(&self) -> &str {
        &self.config.node_name
    }

    /// Runs cycles until shutdown is requested. Cycles run inline, so a slow
    /// one delays the next tick instead of overlapping with it.
    pub async fn run(&self, shutdown: &mut watch::Receiver<bool>) {
        let period = self.config.reconcile_interval.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("[{}] worker started, cycle every {:?}", self.node_name(), period);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_requested(shutdown) => break,
                _ = ticker.tick() => {}
            }

            match self.run_cycle().await {
                Ok(report) => info!(
                    "[{}] cycle done: {} members, {} entities, {} owned",
                    self.node_name(),
                    report.members,
                    report.entities,
                    report.owned
                ),
                Err(e) => error!("[{}] cycle failed: {}", self.node_name(), e),
            }
        }

        info!("[{}] worker stopped", self.node_name());
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, WorkerError> {
        let node = self.node_name();
        debug!("[{}] cycle started", node);

        let started = Instant::now();
        let entities = self.entity_source.list_entities().await?;
        info!(
            "[{}] fetched {} entities in {:?}",
            node,
            entities.len(),
            started.elapsed()
        );

        let members = member_names(&self.membership.members());
        let ring = ConsistentHash::new();
        ring.add_buckets(members.iter().cloned());

        let owned = owned_entities(&ring, &entities, node);
        let report = CycleReport {
            members: members.len(),
            entities: entities.len(),
            owned: owned.len(),
        };

        if owned.is_empty() {
            debug!("[{}] owns no entities among {:?}", node, members);
            return Ok(report);
        }

        let started = Instant::now();
        let data = self.entity_source.entity_data(&owned).await?;
        info!(
            "[{}] fetched data of {} entities in {:?}",
            node,
            data.len(),
            started.elapsed()
        );

        let started = Instant::now();
        let submission = build_submission(node, data);
        self.metric_sink.push(&submission).await?;
        info!(
            "[{}] pushed {} values in {:?}",
            node,
            submission.values.len(),
            started.elapsed()
        );

        Ok(report)
    }

    /// Leaves the cluster, then stops the transport. Both steps run even if
    /// the first fails; the first error is returned.
    pub async fn leave_cluster(&self) -> Result<(), WorkerError> {
        let node = self.node_name();
        info!("[{}] leaving the cluster", node);

        let left = self.membership.leave(self.config.leave_timeout).await;
        if let Err(e) = &left {
            warn!("[{}] leave failed: {:#}", node, e);
        }

        let stopped = self.membership.shutdown().await;
        if let Err(e) = &stopped {
            warn!("[{}] membership shutdown failed: {:#}", node, e);
        }

        info!("[{}] left the cluster", node);

        left.and(stopped).map_err(WorkerError::Shutdown)
    }
}

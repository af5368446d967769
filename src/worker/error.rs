use std::time::Duration;
use thiserror::Error;

/// Failures of the reconciler. Only `JoinTimeout` is fatal; the others end a
/// single cycle or get logged on the way out.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to join the cluster within {elapsed:?}")]
    JoinTimeout { elapsed: Duration },

    #[error("failed to fetch the entity list: {0}")]
    FetchEntities(#[source] reqwest::Error),

    #[error("failed to fetch entity data: {0}")]
    FetchEntityData(#[source] reqwest::Error),

    #[error("failed to push metrics: {0}")]
    PushMetrics(#[source] reqwest::Error),

    #[error("shutdown step failed: {0}")]
    Shutdown(#[source] anyhow::Error),
}

impl WorkerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkerError::JoinTimeout { .. })
    }
}

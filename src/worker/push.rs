use crate::{
    types::{MetricSinkSubmission, MetricSinkSubmissionValue},
    worker::{error::WorkerError, fetch::endpoint},
};
use anyhow::Result;
use log::trace;
use reqwest::Client;
use std::collections::BTreeMap;
use url::Url;

/// One submission value per entity, all reported under `hostname`.
pub fn build_submission(hostname: &str, data: BTreeMap<String, u64>) -> MetricSinkSubmission {
    let values = data
        .into_iter()
        .map(|(entity, value)| MetricSinkSubmissionValue {
            entity,
            hostname: hostname.to_string(),
            value: i64::try_from(value).unwrap_or(i64::MAX),
        })
        .collect();

    MetricSinkSubmission { values }
}

#[derive(Debug, Clone)]
pub struct MetricSinkClient {
    client: Client,
    submit_url: Url,
}

impl MetricSinkClient {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            submit_url: endpoint(base_url, "submit")?,
        })
    }

    pub async fn push(&self, submission: &MetricSinkSubmission) -> Result<(), WorkerError> {
        trace!(
            "POST {} with {} values",
            self.submit_url,
            submission.values.len()
        );

        self.client
            .post(self.submit_url.clone())
            .json(submission)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(WorkerError::PushMetrics)?;

        Ok(())
    }
}

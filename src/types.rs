//! Wire types shared by the worker and the two HTTP services. Field names
//! follow the JSON the services have always spoken.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// A batch of values reported to the metric sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MetricSinkSubmission {
    #[serde(default)]
    pub values: Vec<MetricSinkSubmissionValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MetricSinkSubmissionValue {
    pub entity: String,
    /// Identity of the reporting node
    pub hostname: String,
    pub value: i64,
}

/// Counters returned by the entity source, keyed by entity id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct EntityDataResponse {
    #[serde(default)]
    pub entities: BTreeMap<String, u64>,
}

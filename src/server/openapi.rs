use crate::{
    metrics::Metric,
    types::{EntityDataResponse, MetricSinkSubmission, MetricSinkSubmissionValue},
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = "health", description = "Health-related endpoints."),
        (name = "entities", description = "Entity catalog and per-entity counters."),
    ),
    components(schemas(EntityDataResponse)),
)]
pub struct EntitySourceApiDoc;

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = "health", description = "Health-related endpoints."),
        (name = "metrics", description = "Accumulated per-entity reports."),
    ),
    components(schemas(MetricSinkSubmission, MetricSinkSubmissionValue, Metric)),
)]
pub struct MetricSinkApiDoc;

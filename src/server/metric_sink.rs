use crate::{
    metrics::{Metric, MetricStore},
    server::{SHUTDOWN_TIMEOUT_SECONDS, cors, health::*, openapi::MetricSinkApiDoc, openapi_json},
    types::MetricSinkSubmission,
};
use actix_web::{
    App, HttpResponse, HttpServer, ResponseError, get,
    http::StatusCode,
    post,
    web::{self, Bytes, Data},
};
use log::{debug, warn};
use std::{collections::BTreeMap, net::TcpListener, sync::Arc};
use thiserror::Error;
use utoipa::OpenApi;
use utoipa_actix_web::{AppExt, service_config::ServiceConfig};

const MAX_SUBMISSION_BYTES: usize = 16 * 1024 * 1024;

pub type MetricSinkState = Arc<MetricSinkInner>;

#[derive(Debug, Default)]
pub struct MetricSinkInner {
    pub store: MetricStore,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid post body: {0}")]
    MalformedSubmission(#[from] serde_json::Error),
}

impl ResponseError for SubmitError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::BadRequest().body(self.to_string())
    }
}

pub fn configure_routes(config: &mut ServiceConfig) {
    config.service(dump).service(submit);
}

#[utoipa::path(
    summary = "Dump metrics",
    responses(
        (status = 200, description = "Everything recorded so far, keyed by entity", body = BTreeMap<String, Metric>)
    ),
    tags = ["metrics"]
)]
#[get("/")]
async fn dump(app_state: Data<MetricSinkState>) -> HttpResponse {
    let snapshot: BTreeMap<String, Metric> = app_state.store.snapshot();
    HttpResponse::Ok().json(snapshot)
}

#[utoipa::path(
    summary = "Submit metric values",
    request_body = MetricSinkSubmission,
    responses(
        (status = 204, description = "Values recorded"),
        (status = 400, description = "Body is not a valid submission", body = String)
    ),
    tags = ["metrics"]
)]
#[post("/submit")]
async fn submit(app_state: Data<MetricSinkState>, body: Bytes) -> Result<HttpResponse, SubmitError> {
    let submission: MetricSinkSubmission = serde_json::from_slice(&body).inspect_err(|e| {
        warn!("rejected submission of {} bytes: {}", body.len(), e);
    })?;

    let recorded = app_state.store.submit(submission);
    debug!("recorded {} values", recorded);

    Ok(HttpResponse::NoContent().finish())
}

/// The full document of this service, routes included.
pub fn openapi_doc() -> utoipa::openapi::OpenApi {
    let (_, api) = App::new()
        .into_utoipa_app()
        .openapi(MetricSinkApiDoc::openapi())
        .service(health)
        .configure(configure_routes)
        .split_for_parts();

    api
}

pub async fn start_server(state: MetricSinkState, listener: TcpListener) -> std::io::Result<()> {
    let data = Data::new(state);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .into_utoipa_app()
            .openapi(MetricSinkApiDoc::openapi())
            .service(health)
            .configure(configure_routes)
            .app_data(data.clone())
            .app_data(web::PayloadConfig::new(MAX_SUBMISSION_BYTES))
            .openapi_service(openapi_json)
            .into_app()
    })
    .shutdown_timeout(SHUTDOWN_TIMEOUT_SECONDS)
    .listen(listener)?
    .run();

    server.await
}

#[cfg(test)]
pub fn start_server_test() -> (u16, MetricSinkState) {
    let state = Arc::new(MetricSinkInner::default());
    let (listener, port) = crate::server::bind_test_listener();

    let server_state = state.clone();
    tokio::spawn(async move {
        start_server(server_state, listener).await.unwrap();
    });

    (port, state)
}

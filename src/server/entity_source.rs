use crate::{
    catalog::Catalog,
    server::{SHUTDOWN_TIMEOUT_SECONDS, cors, health::*, openapi::EntitySourceApiDoc, openapi_json},
    types::EntityDataResponse,
};
use actix_web::{
    App, HttpResponse, HttpServer, get,
    web::{Data, Query},
};
use log::debug;
use serde::Deserialize;
use std::{net::TcpListener, sync::Arc};
use utoipa::{IntoParams, OpenApi};
use utoipa_actix_web::{AppExt, service_config::ServiceConfig};

pub type EntitySourceState = Arc<EntitySourceInner>;

#[derive(Debug)]
pub struct EntitySourceInner {
    pub catalog: Catalog,
}

pub fn configure_routes(config: &mut ServiceConfig) {
    config.service(list_entities).service(entity_data);
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DataQuery {
    /// Comma-separated entity ids, every entity when omitted
    pub s: Option<String>,
}

fn requested_ids(raw: Option<&str>) -> Vec<&str> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[utoipa::path(
    summary = "List entities",
    responses(
        (status = 200, description = "Every entity id in the catalog", body = Vec<String>)
    ),
    tags = ["entities"]
)]
#[get("/")]
async fn list_entities(app_state: Data<EntitySourceState>) -> HttpResponse {
    HttpResponse::Ok().json(app_state.catalog.ids())
}

#[utoipa::path(
    summary = "Read entity counters",
    description = "Increments and returns the counters of the requested entities. Every read counts: the counter is the number of times the entity has been pulled. Unknown ids are left out.",
    params(DataQuery),
    responses(
        (status = 200, description = "Counters of the requested entities", body = EntityDataResponse)
    ),
    tags = ["entities"]
)]
#[get("/data")]
async fn entity_data(app_state: Data<EntitySourceState>, query: Query<DataQuery>) -> HttpResponse {
    let ids = requested_ids(query.s.as_deref());
    let requested = ids.len();

    let entities = app_state.catalog.read(ids);
    debug!(
        "served {} counters ({} requested)",
        entities.len(),
        requested
    );

    HttpResponse::Ok().json(EntityDataResponse { entities })
}

/// The full document of this service, routes included.
pub fn openapi_doc() -> utoipa::openapi::OpenApi {
    let (_, api) = App::new()
        .into_utoipa_app()
        .openapi(EntitySourceApiDoc::openapi())
        .service(health)
        .configure(configure_routes)
        .split_for_parts();

    api
}

pub async fn start_server(state: EntitySourceState, listener: TcpListener) -> std::io::Result<()> {
    let data = Data::new(state);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .into_utoipa_app()
            .openapi(EntitySourceApiDoc::openapi())
            .service(health)
            .configure(configure_routes)
            .app_data(data.clone())
            .openapi_service(openapi_json)
            .into_app()
    })
    .shutdown_timeout(SHUTDOWN_TIMEOUT_SECONDS)
    .listen(listener)?
    .run();

    server.await
}

#[cfg(test)]
pub fn start_server_test(catalog: Catalog) -> (u16, EntitySourceState) {
    let state = Arc::new(EntitySourceInner { catalog });
    let (listener, port) = crate::server::bind_test_listener();

    let server_state = state.clone();
    tokio::spawn(async move {
        start_server(server_state, listener).await.unwrap();
    });

    (port, state)
}

//! HTTP layer of the two services the workers talk to.

pub mod entity_source;
mod health;
pub mod metric_sink;
pub mod openapi;

use actix_cors::Cors;
use actix_web::{HttpResponse, Resource, web};
use std::net::TcpListener;
use utoipa::openapi::OpenApi;

const SHUTDOWN_TIMEOUT_SECONDS: u64 = 10;

/// Accepts Go-style `:3000`, meaning every interface.
pub fn normalize_bind_addr(bind_addr: &str) -> String {
    if bind_addr.starts_with(':') {
        format!("0.0.0.0{bind_addr}")
    } else {
        bind_addr.to_string()
    }
}

pub fn bind_listener(bind_addr: &str) -> std::io::Result<TcpListener> {
    TcpListener::bind(normalize_bind_addr(bind_addr))
}

fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec!["Content-Type"])
        .max_age(60 * 60 * 12)
}

/// Serves the generated document at `/api/openapi.json`.
fn openapi_json(api: OpenApi) -> Resource {
    web::resource("/api/openapi.json").route(web::get().to(move || {
        let api = api.clone();
        async move { HttpResponse::Ok().json(api) }
    }))
}

#[cfg(test)]
fn bind_test_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind to random port");
    let port = listener
        .local_addr()
        .expect("failed to get local addr")
        .port();

    (listener, port)
}

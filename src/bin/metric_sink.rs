use log::info;
use ringwork::{
    eager_env::{self, check_env},
    server::{
        bind_listener,
        metric_sink::{MetricSinkInner, start_server},
    },
    utils::init_logger,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logger();
    check_env();

    let state = Arc::new(MetricSinkInner::default());
    let listener = bind_listener(&eager_env::BIND_ADDR)?;

    info!("Listening on {}", listener.local_addr()?);

    start_server(state, listener).await
}

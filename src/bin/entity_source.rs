use log::info;
use ringwork::{
    catalog::Catalog,
    eager_env::{self, check_env},
    server::{
        bind_listener,
        entity_source::{EntitySourceInner, start_server},
    },
    utils::init_logger,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logger();
    check_env();

    let catalog = Catalog::embedded();
    info!("serving {} entities", catalog.len());

    let state = Arc::new(EntitySourceInner { catalog });
    let listener = bind_listener(&eager_env::BIND_ADDR)?;

    info!("Listening on {}", listener.local_addr()?);

    start_server(state, listener).await
}

pub mod catalog;
pub mod collab;
pub mod eager_env;
pub mod metrics;
pub mod server;
pub mod types;
pub mod utils;
pub mod worker;

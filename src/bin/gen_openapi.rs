use ringwork::server::{entity_source, metric_sink};
use std::fs;

fn main() {
    let doc = entity_source::openapi_doc()
        .to_pretty_json()
        .expect("OpenAPI serialization error");
    fs::write("./EntitySource.OpenAPI.json", doc).expect("OpenAPI write error");

    let doc = metric_sink::openapi_doc()
        .to_pretty_json()
        .expect("OpenAPI serialization error");
    fs::write("./MetricSink.OpenAPI.json", doc).expect("OpenAPI write error");
}

use crate::{types::EntityDataResponse, worker::error::WorkerError};
use anyhow::Result;
use itertools::Itertools;
use log::trace;
use reqwest::Client;
use std::collections::BTreeMap;
use url::Url;

/// Joins `path` below `base`, treating `base` as a directory even without a
/// trailing slash.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let directory = format!("{}/", base.path());
        base.set_path(&directory);
    }

    Ok(base.join(path)?)
}

#[derive(Debug, Clone)]
pub struct EntitySourceClient {
    client: Client,
    entities_url: Url,
    data_url: Url,
}

impl EntitySourceClient {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            entities_url: endpoint(base_url, "")?,
            data_url: endpoint(base_url, "data")?,
        })
    }

    pub async fn list_entities(&self) -> Result<Vec<String>, WorkerError> {
        trace!("GET {}", self.entities_url);

        self.client
            .get(self.entities_url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(WorkerError::FetchEntities)?
            .json()
            .await
            .map_err(WorkerError::FetchEntities)
    }

    /// Pulls the counters of `ids`. Must not be called with an empty slice:
    /// the source answers an empty selection with every entity.
    pub async fn entity_data(&self, ids: &[String]) -> Result<BTreeMap<String, u64>, WorkerError> {
        let selection = ids.iter().join(",");
        trace!("GET {}?s={}", self.data_url, selection);

        let response: EntityDataResponse = self
            .client
            .get(self.data_url.clone())
            .query(&[("s", selection)])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(WorkerError::FetchEntityData)?
            .json()
            .await
            .map_err(WorkerError::FetchEntityData)?;

        Ok(response.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_endpoint() {
        assert_eq!(
            endpoint("http://data-plane:3000/", "data").unwrap().as_str(),
            "http://data-plane:3000/data"
        );
        assert_eq!(
            endpoint("http://data-plane:3000", "data").unwrap().as_str(),
            "http://data-plane:3000/data"
        );
        assert_eq!(
            endpoint("http://proxy/source", "data").unwrap().as_str(),
            "http://proxy/source/data"
        );
        assert_eq!(
            endpoint("http://proxy/source", "").unwrap().as_str(),
            "http://proxy/source/"
        );
        assert!(endpoint("not a url", "data").is_err());
    }

    #[tokio::test]
    async fn test_list_entities() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200).json_body(json!(["e1", "e2"]));
        });

        let client = EntitySourceClient::new(Client::new(), &server.base_url()).unwrap();
        let entities = client.list_entities().await.unwrap();

        mock.assert();
        assert_eq!(entities, vec!["e1", "e2"]);
    }

    #[tokio::test]
    async fn test_list_entities_server_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(500);
        });

        let client = EntitySourceClient::new(Client::new(), &server.base_url()).unwrap();
        let error = client.list_entities().await.unwrap_err();

        assert!(matches!(error, WorkerError::FetchEntities(_)));
    }

    #[tokio::test]
    async fn test_entity_data_sends_selection() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/data").query_param("s", "e1,e3");
            then.status(200)
                .json_body(json!({ "Entities": { "e1": 4, "e3": 1 } }));
        });

        let client = EntitySourceClient::new(Client::new(), &server.base_url()).unwrap();
        let data = client
            .entity_data(&["e1".to_string(), "e3".to_string()])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(
            data,
            BTreeMap::from([("e1".to_string(), 4), ("e3".to_string(), 1)])
        );
    }

    #[tokio::test]
    async fn test_entity_data_bad_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/data");
            then.status(200).body("not json");
        });

        let client = EntitySourceClient::new(Client::new(), &server.base_url()).unwrap();
        let error = client.entity_data(&["e1".to_string()]).await.unwrap_err();

        assert!(matches!(error, WorkerError::FetchEntityData(_)));
    }
}

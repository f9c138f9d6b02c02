use async_trait::async_trait;
use reqwest::Client;

use super::{
    ensure_created, queries, Credentials, DatabaseConnector, LoadedVocabState, SparqlEndpoints,
    SparqlStore,
};
use crate::error::SyncError;

/// Apache Jena Fuseki: one dataset exposing separate query, update and data endpoints.
#[derive(Debug, Clone)]
pub struct Fuseki {
    dataset_url: String,
    store: SparqlStore,
}

impl Fuseki {
    /// `dataset_url` is the dataset root, e.g. `http://fuseki:3030/skosmos`.
    pub fn new(client: Client, dataset_url: &str, credentials: Credentials) -> Self {
        let dataset_url = dataset_url.trim_end_matches('/').to_string();
        let endpoints = SparqlEndpoints {
            read: format!("{dataset_url}/sparql"),
            write: format!("{dataset_url}/update"),
            http: format!("{dataset_url}/data"),
        };
        Self {
            store: SparqlStore::new(client, endpoints, credentials),
            dataset_url,
        }
    }

    pub fn endpoints(&self) -> &SparqlEndpoints {
        self.store.endpoints()
    }

    /// Server admin root and dataset name, split off the dataset URL.
    fn admin_target(&self) -> Result<(&str, &str), SyncError> {
        self.dataset_url
            .rsplit_once('/')
            .filter(|(server, name)| !server.is_empty() && !name.is_empty())
            .ok_or_else(|| {
                SyncError::invalid(format!(
                    "Fuseki endpoint '{}' does not name a dataset",
                    self.dataset_url
                ))
            })
    }
}

#[async_trait]
impl DatabaseConnector for Fuseki {
    fn name(&self) -> &'static str {
        "Fuseki"
    }

    async fn setup(&self) -> Result<(), SyncError> {
        if self.store.repository_exists().await? {
            tracing::info!("EXISTS FUSEKI [{}]", self.dataset_url);
            return Ok(());
        }

        let (server, db_name) = self.admin_target()?;
        let response = self
            .store
            .authed(self.store.client().post(format!("{server}/$/datasets")))
            .query(&[("dbName", db_name), ("dbType", "tdb")])
            .send()
            .await?;
        if !ensure_created("dataset creation", response).await? {
            return Ok(());
        }
        tracing::info!("CREATED FUSEKI [{}] DB [{}.tdb]", self.dataset_url, db_name);
        Ok(())
    }

    async fn add_vocabulary(
        &self,
        content: &[u8],
        graph_name: &str,
        extension: &str,
        append: bool,
    ) -> Result<(), SyncError> {
        tracing::info!("[Fuseki] Adding vocabulary {}", graph_name);
        self.store
            .write_graph(content, extension, &[("graph", graph_name.to_string())], append)
            .await
    }

    async fn get_loaded_vocabs(&self) -> Result<LoadedVocabState, SyncError> {
        self.store.loaded_vocabs().await
    }

    async fn set_timestamp(&self, graph_name: &str, timestamp: i64) -> Result<(), SyncError> {
        self.store
            .update("set timestamp", &queries::set_timestamp(graph_name, timestamp))
            .await
    }

    async fn update_timestamp(&self, graph_name: &str, timestamp: i64) -> Result<(), SyncError> {
        self.store
            .update(
                "update timestamp",
                &queries::update_timestamp(graph_name, timestamp),
            )
            .await
    }
}

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;

use super::{
    ensure_created, queries, Credentials, DatabaseConnector, LoadedVocabState, SparqlEndpoints,
    SparqlStore,
};
use crate::error::SyncError;

/// Ontotext GraphDB: one repository URL serving queries, with updates and
/// graph uploads under its `/statements` resource.
#[derive(Debug, Clone)]
pub struct GraphDb {
    store: SparqlStore,
    repository_config: PathBuf,
}

impl GraphDb {
    /// `repository_config` is the turtle repository definition used to create
    /// the repository when it does not exist.
    pub fn new<P: Into<PathBuf>>(
        client: Client,
        repository_url: &str,
        credentials: Credentials,
        repository_config: P,
    ) -> Self {
        let repository_url = repository_url.trim_end_matches('/');
        let endpoints = SparqlEndpoints {
            read: repository_url.to_string(),
            write: format!("{repository_url}/statements"),
            http: format!("{repository_url}/statements"),
        };
        Self {
            store: SparqlStore::new(client, endpoints, credentials),
            repository_config: repository_config.into(),
        }
    }

    pub fn endpoints(&self) -> &SparqlEndpoints {
        self.store.endpoints()
    }
}

#[async_trait]
impl DatabaseConnector for GraphDb {
    fn name(&self) -> &'static str {
        "GraphDB"
    }

    async fn setup(&self) -> Result<(), SyncError> {
        let repository = &self.store.endpoints().read;
        if self.store.repository_exists().await? {
            tracing::info!("EXISTS GRAPHDB [{}]", repository);
            return Ok(());
        }

        let definition = tokio::fs::read(&self.repository_config).await.map_err(|e| {
            SyncError::Environment(format!(
                "Cannot read GraphDB repository definition {}: {e}",
                self.repository_config.display()
            ))
        })?;
        let response = self
            .store
            .authed(self.store.client().put(repository))
            .header(reqwest::header::CONTENT_TYPE, "text/turtle")
            .body(definition)
            .send()
            .await?;
        if !ensure_created("repository creation", response).await? {
            return Ok(());
        }
        tracing::info!("CREATED GRAPHDB [{}]", repository);
        Ok(())
    }

    async fn add_vocabulary(
        &self,
        content: &[u8],
        graph_name: &str,
        extension: &str,
        append: bool,
    ) -> Result<(), SyncError> {
        tracing::info!("[GraphDB] Adding vocabulary {}", graph_name);
        self.store
            .write_graph(
                content,
                extension,
                &[("context", format!("<{graph_name}>"))],
                append,
            )
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

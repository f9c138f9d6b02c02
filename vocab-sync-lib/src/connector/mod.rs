//! Triple store access.
//!
//! [`DatabaseConnector`] is the capability set the reconciler needs from a
//! store. Each backend only differs in endpoint layout, bootstrap call and
//! graph-targeting parameter; the HTTP plumbing they share lives in
//! [`SparqlStore`].

mod fuseki;
mod graphdb;
pub mod queries;

pub use fuseki::Fuseki;
pub use graphdb::GraphDb;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::error::SyncError;

/// Graph IRI → last modification as Unix seconds.
pub type LoadedVocabState = HashMap<String, i64>;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("has_password", &!self.password.is_empty())
            .finish()
    }
}

/// `read` answers queries, `write` takes updates, `http` is the graph store protocol endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparqlEndpoints {
    pub read: String,
    pub write: String,
    pub http: String,
}

#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create the repository or dataset if the store does not have it yet.
    async fn setup(&self) -> Result<(), SyncError>;

    /// Replace the contents of `graph_name`, or append to them when `append` is set.
    async fn add_vocabulary(
        &self,
        content: &[u8],
        graph_name: &str,
        extension: &str,
        append: bool,
    ) -> Result<(), SyncError>;

    async fn get_loaded_vocabs(&self) -> Result<LoadedVocabState, SyncError>;

    async fn set_timestamp(&self, graph_name: &str, timestamp: i64) -> Result<(), SyncError>;

    async fn update_timestamp(&self, graph_name: &str, timestamp: i64) -> Result<(), SyncError>;
}

/// Content type for a payload format; unknown formats are sent as turtle.
pub fn mime_type(extension: &str) -> &'static str {
    match extension {
        "ttl" | "turtle" => "text/turtle",
        "trig" => "application/x-trig",
        _ => "text/turtle",
    }
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    results: SparqlBindings,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings {
    bindings: Vec<HashMap<String, SparqlTerm>>,
}

#[derive(Debug, Deserialize)]
struct SparqlTerm {
    value: String,
}

/// Authenticated access to one set of SPARQL endpoints.
#[derive(Debug, Clone)]
pub struct SparqlStore {
    client: Client,
    endpoints: SparqlEndpoints,
    credentials: Credentials,
}

impl SparqlStore {
    pub fn new(client: Client, endpoints: SparqlEndpoints, credentials: Credentials) -> Self {
        Self {
            client,
            endpoints,
            credentials,
        }
    }

    pub fn endpoints(&self) -> &SparqlEndpoints {
        &self.endpoints
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.credentials.username, Some(&self.credentials.password))
    }

    pub async fn repository_exists(&self) -> Result<bool, SyncError> {
        let url = format!("{}/size", self.endpoints.http);
        tracing::debug!("Probing {}", url);
        let response = self.authed(self.client.get(&url)).send().await?;
        Ok(response.status() == StatusCode::OK)
    }

    pub async fn loaded_vocabs(&self) -> Result<LoadedVocabState, SyncError> {
        let response = self
            .authed(self.client.post(&self.endpoints.read))
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .form(&[("query", queries::LOADED_VOCABS)])
            .send()
            .await?;
        let response = ensure_success("freshness query", response).await?;
        let results: SparqlResults = serde_json::from_slice(&response.bytes().await?)?;

        let mut loaded = LoadedVocabState::new();
        for binding in results.results.bindings {
            let (Some(graph), Some(timestamp)) = (binding.get("graph"), binding.get("timestamp"))
            else {
                continue;
            };
            match timestamp.value.trim().parse::<i64>() {
                Ok(ts) => {
                    loaded.insert(graph.value.clone(), ts);
                }
                Err(_) => tracing::warn!(
                    "Ignoring non-numeric timestamp '{}' for graph {}",
                    timestamp.value,
                    graph.value
                ),
            }
        }
        tracing::debug!("Loaded vocabularies: {:?}", loaded);
        Ok(loaded)
    }

    pub async fn update(&self, operation: &str, sparql: &str) -> Result<(), SyncError> {
        tracing::debug!("SPARQL update ({}): {}", operation, sparql);
        let response = self
            .authed(self.client.post(&self.endpoints.write))
            .form(&[("update", sparql)])
            .send()
            .await?;
        ensure_success(operation, response).await?;
        Ok(())
    }

    /// PUT (replace) or POST (append) a payload to the graph store endpoint.
    pub async fn write_graph(
        &self,
        content: &[u8],
        extension: &str,
        params: &[(&str, String)],
        append: bool,
    ) -> Result<(), SyncError> {
        let request = if append {
            self.client.post(&self.endpoints.http)
        } else {
            self.client.put(&self.endpoints.http)
        };
        let response = self
            .authed(request)
            .header(reqwest::header::CONTENT_TYPE, mime_type(extension))
            .query(params)
            .body(content.to_vec())
            .send()
            .await?;
        tracing::info!("RESPONSE: {}", response.status());
        ensure_success(if append { "graph append" } else { "graph replace" }, response).await?;
        Ok(())
    }
}

pub(crate) async fn ensure_success(operation: &str, response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Store {
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Like `ensure_success` for bootstrap requests, but a 409 Conflict means the
/// dataset or repository is already there. Returns whether it was created.
pub(crate) async fn ensure_created(operation: &str, response: Response) -> Result<bool, SyncError> {
    if response.status() == StatusCode::CONFLICT {
        let body = response.text().await.unwrap_or_default();
        tracing::info!("{} skipped, already exists: {}", operation, body.trim());
        return Ok(false);
    }
    ensure_success(operation, response).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> SparqlStore {
        let base = server.uri();
        SparqlStore::new(
            Client::new(),
            SparqlEndpoints {
                read: format!("{base}/sparql"),
                write: format!("{base}/update"),
                http: format!("{base}/data"),
            },
            Credentials::new("admin", "pw"),
        )
    }

    #[test]
    fn maps_formats_to_mime_types() {
        assert_eq!(mime_type("ttl"), "text/turtle");
        assert_eq!(mime_type("turtle"), "text/turtle");
        assert_eq!(mime_type("trig"), "application/x-trig");
        assert_eq!(mime_type("rdf"), "text/turtle");
    }

    #[test]
    fn credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }

    #[tokio::test]
    async fn parses_loaded_vocabs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sparql"))
            .and(basic_auth("admin", "pw"))
            .and(body_string_contains("query="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "head": {"vars": ["graph", "timestamp"]},
                "results": {"bindings": [
                    {"graph": {"type": "uri", "value": "http://example.org/a/"},
                     "timestamp": {"type": "literal", "value": "1700000000"}},
                    {"graph": {"type": "uri", "value": "http://example.org/b/"},
                     "timestamp": {"type": "literal", "value": "yesterday"}}
                ]}
            })))
            .mount(&server)
            .await;

        let loaded = store(&server).loaded_vocabs().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["http://example.org/a/"], 1700000000);
    }

    #[tokio::test]
    async fn update_posts_form_encoded_sparql() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .and(body_string_contains("update=INSERT+DATA"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .update("set timestamp", &queries::set_timestamp("http://g/", 5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn append_uses_post_and_replace_uses_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/data"))
            .and(header("Content-Type", "application/x-trig"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server);
        store.write_graph(b"<a> <b> <c> .", "trig", &[], false).await.unwrap();
        store.write_graph(b"<a> <b> <d> .", "ttl", &[], true).await.unwrap();
    }

    #[tokio::test]
    async fn store_rejection_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad turtle"))
            .mount(&server)
            .await;

        let err = store(&server)
            .write_graph(b"garbage", "ttl", &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store { status: 400, ref body, .. } if body == "bad turtle"));
    }
}

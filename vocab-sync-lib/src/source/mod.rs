//! Turns a [`SourceDescriptor`] into the bytes it points at.
//!
//! Local files are read relative to the data directory; everything else goes
//! through the shared HTTP client.

mod gitlab;

pub use gitlab::raw_file_url;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use reqwest::{Client, RequestBuilder, Response};

use crate::error::SyncError;
use crate::manifest::{AuthDescriptor, Source, SourceDescriptor};

/// Resolved content of a descriptor together with where it came from.
#[derive(Debug, Clone)]
pub struct SourceContent {
    origin: String,
    bytes: Vec<u8>,
}

impl SourceContent {
    pub fn new(origin: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            origin: origin.into(),
            bytes,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// The request a `fetch` descriptor turns into once authentication is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// Apply `auth` to a fetch: github adds a token header, gitlab also rewrites the URL.
pub fn authenticate(
    location: &str,
    auth: Option<&AuthDescriptor>,
) -> Result<AuthenticatedRequest, SyncError> {
    let Some(auth) = auth else {
        return Ok(AuthenticatedRequest {
            url: location.to_string(),
            headers: Vec::new(),
        });
    };

    match auth.type_.as_str() {
        "github" => Ok(AuthenticatedRequest {
            url: location.to_string(),
            headers: vec![("Authorization".into(), format!("token {}", auth.token))],
        }),
        "gitlab" => Ok(AuthenticatedRequest {
            url: raw_file_url(location)?,
            headers: vec![("PRIVATE-TOKEN".into(), auth.token.clone())],
        }),
        other => Err(SyncError::UnknownAuthenticationType(other.to_string())),
    }
}

pub struct SourceResolver {
    client: Client,
    data_dir: PathBuf,
}

impl SourceResolver {
    pub fn new<P: Into<PathBuf>>(client: Client, data_dir: P) -> Self {
        Self {
            client,
            data_dir: data_dir.into(),
        }
    }

    pub async fn resolve(&self, descriptor: &SourceDescriptor) -> Result<SourceContent, SyncError> {
        match descriptor.source()? {
            Source::File { location } => {
                let path = self.data_dir.join(location);
                let bytes = read_local(&path).await?;
                Ok(SourceContent::new(path.display().to_string(), bytes))
            }
            Source::Fetch {
                location,
                headers,
                auth,
            } => {
                let request = authenticate(location, auth)?;
                tracing::debug!("Fetching {}", request.url);
                let mut builder = with_headers(self.client.get(&request.url), headers);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                let bytes = read_response(&request.url, builder.send().await?).await?;
                Ok(SourceContent::new(request.url, bytes))
            }
            Source::Post {
                location,
                headers,
                body,
            } => {
                tracing::debug!("Posting to {}", location);
                let builder = with_headers(self.client.post(location), headers)
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(serde_json::to_vec(body)?);
                let bytes = read_response(location, builder.send().await?).await?;
                Ok(SourceContent::new(location, bytes))
            }
            Source::Sparql {
                location,
                headers,
                query_location,
            } => {
                let query_path = self.data_dir.join(query_location);
                let query = String::from_utf8_lossy(&read_local(&query_path).await?).into_owned();
                tracing::debug!("Querying {} with {}", location, query_path.display());
                let builder = with_headers(self.client.post(location), headers)
                    .header(reqwest::header::ACCEPT, "text/turtle")
                    .form(&[("query", query.as_str())]);
                let bytes = read_response(location, builder.send().await?).await?;
                Ok(SourceContent::new(location, bytes))
            }
        }
    }
}

fn with_headers(mut builder: RequestBuilder, headers: &BTreeMap<String, String>) -> RequestBuilder {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

async fn read_local(path: &Path) -> Result<Vec<u8>, SyncError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SyncError::NotFound(path.to_path_buf()),
        _ => SyncError::Io(e),
    })
}

async fn read_response(url: &str, response: Response) -> Result<Vec<u8>, SyncError> {
    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::Fetch {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.bytes().await?.to_vec())
}

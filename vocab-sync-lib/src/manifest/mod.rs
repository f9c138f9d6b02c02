mod template;

pub use template::Template;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthDescriptor {
    #[serde(rename = "type")]
    pub type_: String,
    pub token: String,
}

/// Where a piece of content lives and how to retrieve it.
///
/// `type` is kept as a plain string so that an unknown type surfaces when the
/// descriptor is resolved, and only fails the manifest that declares it.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SourceDescriptor {
    #[serde(rename = "type")]
    pub type_: String,
    pub location: Option<String>,
    pub format: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub auth: Option<AuthDescriptor>,
    pub body: Option<serde_json::Value>,
    pub query_location: Option<String>,
    pub refresh: Option<bool>,
    #[serde(rename = "refreshInterval")]
    pub refresh_interval: Option<f64>,
    #[serde(rename = "alwaysRefresh")]
    pub always_refresh: Option<bool>,
}

/// A validated descriptor with exactly the fields its type uses.
#[derive(Debug, Clone, PartialEq)]
pub enum Source<'a> {
    File {
        location: &'a str,
    },
    Fetch {
        location: &'a str,
        headers: &'a BTreeMap<String, String>,
        auth: Option<&'a AuthDescriptor>,
    },
    Post {
        location: &'a str,
        headers: &'a BTreeMap<String, String>,
        body: &'a serde_json::Value,
    },
    Sparql {
        location: &'a str,
        headers: &'a BTreeMap<String, String>,
        query_location: &'a str,
    },
}

impl SourceDescriptor {
    pub fn source(&self) -> Result<Source<'_>, SyncError> {
        let kind = self.type_.as_str();
        if !matches!(kind, "file" | "fetch" | "post" | "sparql") {
            return Err(SyncError::invalid(format!(
                "Unknown source type '{}' [Expected: file, fetch, post, sparql]",
                self.type_
            )));
        }

        let location = self
            .location
            .as_deref()
            .ok_or_else(|| SyncError::invalid(format!("Source of type '{kind}' needs a location")))?;

        if self.body.is_some() && kind != "post" {
            return Err(SyncError::invalid(format!(
                "'body' is only valid for post sources, not '{kind}'"
            )));
        }
        if self.query_location.is_some() && kind != "sparql" {
            return Err(SyncError::invalid(format!(
                "'query_location' is only valid for sparql sources, not '{kind}'"
            )));
        }
        if !self.headers.is_empty() && kind == "file" {
            return Err(SyncError::invalid("'headers' are not valid for file sources"));
        }
        if self.auth.is_some() && kind != "fetch" {
            return Err(SyncError::invalid(format!(
                "'auth' is only valid for fetch sources, not '{kind}'"
            )));
        }

        let source = match kind {
            "file" => Source::File { location },
            "fetch" => Source::Fetch {
                location,
                headers: &self.headers,
                auth: self.auth.as_ref(),
            },
            "post" => Source::Post {
                location,
                headers: &self.headers,
                body: self.body.as_ref().ok_or_else(|| {
                    SyncError::invalid("Source of type 'post' needs a body")
                })?,
            },
            _ => Source::Sparql {
                location,
                headers: &self.headers,
                query_location: self.query_location.as_deref().ok_or_else(|| {
                    SyncError::invalid("Source of type 'sparql' needs a query_location")
                })?,
            },
        };
        Ok(source)
    }

    /// Payload format: the explicit `format`, else the extension of the last
    /// path segment of `location` with any query string removed. Empty when
    /// that segment has no extension.
    pub fn format(&self) -> String {
        if let Some(format) = &self.format {
            return format.clone();
        }
        let location = self.location.as_deref().unwrap_or_default();
        let path = location.split(['?', '#']).next().unwrap_or_default();
        let segment = path.rsplit('/').next().unwrap_or_default();
        segment
            .rsplit_once('.')
            .map(|(_, extension)| extension.to_string())
            .unwrap_or_default()
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        if self.refresh.unwrap_or(false) || self.always_refresh.unwrap_or(false) {
            RefreshPolicy::After {
                hours: self.refresh_interval.unwrap_or(0.0),
            }
        } else {
            RefreshPolicy::Never
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshPolicy {
    /// Only load when the graph is missing from the store.
    Never,
    /// Reload once the stored timestamp is strictly older than `hours`.
    After { hours: f64 },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VocabularyManifest {
    #[serde(skip)]
    pub id: String,
    pub config: SourceDescriptor,
    pub source: SourceDescriptor,
    pub tweaks: Option<SourceDescriptor>,
}

impl VocabularyManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SyncError> {
        let path = path.as_ref();
        tracing::debug!("Loading manifest from {:?}", path);
        let file = std::fs::File::open(path)?;
        let mut manifest: VocabularyManifest = serde_yaml::from_reader(file).map_err(|e| {
            SyncError::invalid(format!("Failed to parse manifest {}: {e}", path.display()))
        })?;
        manifest.id = manifest_id(path);
        Ok(manifest)
    }

    /// Check every descriptor without touching the network or the data directory.
    pub fn validate(&self) -> Result<(), SyncError> {
        self.config.source()?;
        self.source.source()?;
        if let Some(tweaks) = &self.tweaks {
            tweaks.source()?;
        }
        for descriptor in self.descriptors() {
            if let Some(auth) = &descriptor.auth {
                if !matches!(auth.type_.as_str(), "github" | "gitlab") {
                    return Err(SyncError::UnknownAuthenticationType(auth.type_.clone()));
                }
            }
        }
        Ok(())
    }

    fn descriptors(&self) -> impl Iterator<Item = &SourceDescriptor> {
        [Some(&self.config), Some(&self.source), self.tweaks.as_ref()]
            .into_iter()
            .flatten()
    }
}

fn manifest_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// One discovered manifest file; parsing is deferred so a broken file only
/// fails its own entry.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub id: String,
    pub path: PathBuf,
}

impl ManifestEntry {
    pub fn load(&self) -> Result<VocabularyManifest, SyncError> {
        VocabularyManifest::from_file(&self.path)
    }
}

/// The `*.yaml` manifests directly inside the data directory, ordered by file name.
#[derive(Debug, Clone)]
pub struct ManifestSet {
    entries: Vec<ManifestEntry>,
}

impl ManifestSet {
    pub fn discover<P: AsRef<Path>>(data_dir: P) -> Result<Self, SyncError> {
        let data_dir = data_dir.as_ref();
        if !data_dir.is_dir() {
            return Err(SyncError::Environment(format!(
                "Data directory {} does not exist",
                data_dir.display()
            )));
        }

        let mut entries = std::fs::read_dir(data_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().map(|ext| ext == "yaml").unwrap_or(false)
            })
            .map(|path| ManifestEntry {
                id: manifest_id(&path),
                path,
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!(
            "Discovered {} manifest(s) in {}",
            entries.len(),
            data_dir.display()
        );
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use std::str::FromStr;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    File,
    Fetch,
    Sparql,
}

impl Template {
    pub fn content(&self) -> &'static str {
        match self {
            Template::File => FILE_MANIFEST,
            Template::Fetch => FETCH_MANIFEST,
            Template::Sparql => SPARQL_MANIFEST,
        }
    }
}

impl FromStr for Template {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Template::File),
            "fetch" => Ok(Template::Fetch),
            "sparql" => Ok(Template::Sparql),
            other => Err(SyncError::invalid(format!(
                "Invalid template type '{other}'. Must be one of 'file', 'fetch' or 'sparql'"
            ))),
        }
    }
}

const FILE_MANIFEST: &str = r#"# Vocabulary manifest. The file name (without .yaml) identifies the vocabulary.

# The Skosmos configuration fragment for this vocabulary. It must contain a
# skosmos:sparqlGraph line naming the graph the vocabulary is loaded into.
config:
  type: file
  location: my-vocab.ttl
  # Reload the vocabulary when the stored copy is older than refreshInterval hours
  refresh: false
  refreshInterval: 0

# The vocabulary data itself, relative to the data directory
source:
  type: file
  location: my-vocab-data.ttl

# Optional triples appended on top of the source
# tweaks:
#   type: file
#   location: my-vocab-tweaks.ttl
"#;

const FETCH_MANIFEST: &str = r#"# Vocabulary manifest fetching its data from a remote repository.

config:
  type: file
  location: my-vocab.ttl
  refresh: true
  refreshInterval: 24

source:
  type: fetch
  location: https://gitlab.example.com/group/project/-/blob/main/vocab/my-vocab.ttl
  # Extra request headers
  headers:
    Accept: text/turtle
  # github adds 'Authorization: token <token>', gitlab rewrites the blob URL to the
  # raw file API and adds 'PRIVATE-TOKEN: <token>'
  auth:
    type: gitlab
    token: replace-me
"#;

const SPARQL_MANIFEST: &str = r#"# Vocabulary manifest built from a CONSTRUCT query against a remote endpoint.

config:
  type: file
  location: my-vocab.ttl

source:
  type: sparql
  location: https://example.org/sparql
  # Query text, relative to the data directory
  query_location: my-vocab.rq
  format: ttl
"#;

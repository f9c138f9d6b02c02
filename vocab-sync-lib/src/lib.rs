//! Vocabulary synchronization library
//!
//! This library keeps a triple store in step with a directory of vocabulary
//! manifests and assembles the Skosmos configuration for the vocabularies
//! that were processed successfully.

mod connector;
mod error;
mod manifest;
mod output;
mod reconciler;
mod settings;
mod source;
mod utils;

pub use connector::{
    mime_type, queries, Credentials, DatabaseConnector, Fuseki, GraphDb, LoadedVocabState,
    SparqlEndpoints, SparqlStore,
};
pub use error::{ProcessingMessage, Severity, SyncError};
pub use manifest::{
    AuthDescriptor, ManifestEntry, ManifestSet, RefreshPolicy, Source, SourceDescriptor, Template,
    VocabularyManifest,
};
pub use output::ConfigAccumulator;
pub use reconciler::{
    decide_reload, synchronize, Clock, FixedClock, IngestPolicy, ManifestOutcome, ManifestResult,
    Reconciler, ReloadDecision, SyncReport, SystemClock, VocabState,
};
pub use settings::{Backend, SyncSettings};
pub use source::{authenticate, raw_file_url, AuthenticatedRequest, SourceContent, SourceResolver};
pub use utils::extract_graph;

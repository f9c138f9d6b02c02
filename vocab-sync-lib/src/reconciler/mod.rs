//! Decides which vocabularies to (re)load and drives the connector, resolver
//! and config accumulator for each manifest in turn.

mod report;

pub use report::{ManifestOutcome, SyncReport, VocabState};

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::connector::{DatabaseConnector, LoadedVocabState};
use crate::error::SyncError;
use crate::manifest::{ManifestEntry, ManifestSet, RefreshPolicy};
use crate::output::ConfigAccumulator;
use crate::settings::SyncSettings;
use crate::source::SourceResolver;
use crate::utils::{age_in_hours, extract_graph};

pub trait Clock: Send + Sync {
    /// Current time as Unix seconds.
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// What happens when the store rejects a vocabulary upload or timestamp write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IngestPolicy {
    /// The manifest fails and its configuration is left out of the output.
    #[default]
    Strict,
    /// The rejection is recorded as a warning and the manifest carries on.
    BestEffort,
}

impl FromStr for IngestPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(IngestPolicy::Strict),
            "best-effort" | "lenient" => Ok(IngestPolicy::BestEffort),
            other => Err(SyncError::invalid(format!(
                "Invalid ingest policy '{other}' [Expected: strict, best-effort]"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadDecision {
    /// Graph absent from the snapshot.
    New,
    /// Graph present but older than its refresh interval.
    Stale,
    Fresh,
}

impl ReloadDecision {
    pub fn reload(&self) -> bool {
        !matches!(self, ReloadDecision::Fresh)
    }
}

pub fn decide_reload(
    graph: &str,
    policy: RefreshPolicy,
    snapshot: &LoadedVocabState,
    now: i64,
) -> ReloadDecision {
    let Some(&timestamp) = snapshot.get(graph) else {
        return ReloadDecision::New;
    };
    match policy {
        RefreshPolicy::Never => ReloadDecision::Fresh,
        RefreshPolicy::After { hours } if age_in_hours(timestamp, now) > hours => {
            ReloadDecision::Stale
        }
        RefreshPolicy::After { .. } => ReloadDecision::Fresh,
    }
}

/// Per-manifest result: the caller continues on `Processed` and `Skipped`
/// and stops the run on `Fatal`.
#[derive(Debug)]
pub enum ManifestResult {
    Processed(ManifestOutcome),
    Skipped(ManifestOutcome),
    Fatal(SyncError),
}

pub struct Reconciler {
    connector: Box<dyn DatabaseConnector>,
    resolver: SourceResolver,
    accumulator: ConfigAccumulator,
    clock: Box<dyn Clock>,
    ingest_policy: IngestPolicy,
}

impl Reconciler {
    pub fn new(
        connector: Box<dyn DatabaseConnector>,
        resolver: SourceResolver,
        accumulator: ConfigAccumulator,
    ) -> Self {
        Self {
            connector,
            resolver,
            accumulator,
            clock: Box::new(SystemClock),
            ingest_policy: IngestPolicy::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_ingest_policy(mut self, policy: IngestPolicy) -> Self {
        self.ingest_policy = policy;
        self
    }

    /// Reconcile every manifest against a single freshness snapshot.
    pub async fn run(&self, manifests: &ManifestSet) -> Result<SyncReport, SyncError> {
        let mut snapshot = self.connector.get_loaded_vocabs().await?;
        tracing::info!("{} vocabularies already loaded", snapshot.len());

        let mut report = SyncReport::default();
        for entry in manifests.entries() {
            match self.process_manifest(entry, &mut snapshot).await {
                ManifestResult::Processed(outcome) | ManifestResult::Skipped(outcome) => {
                    report.push(outcome)
                }
                ManifestResult::Fatal(e) => {
                    tracing::error!("Aborting at manifest '{}': {}", entry.id, e);
                    return Err(e);
                }
            }
        }

        tracing::info!(
            "Reloaded: {:?}, fresh: {:?}, failed: {:?}",
            report.reloaded(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    pub async fn process_manifest(
        &self,
        entry: &ManifestEntry,
        snapshot: &mut LoadedVocabState,
    ) -> ManifestResult {
        let mut outcome = ManifestOutcome::new(&entry.id);
        match self.reconcile(entry, snapshot, &mut outcome).await {
            Ok(state) => {
                outcome.state = state;
                ManifestResult::Processed(outcome)
            }
            Err(e) if e.is_fatal() => ManifestResult::Fatal(e),
            Err(e) => {
                if e.is_invalid_configuration() {
                    tracing::warn!("Invalid configuration: {}", e);
                } else {
                    tracing::warn!("Processing failed: {}", e);
                }
                tracing::warn!("Skipping vocab '{}'", entry.id);
                outcome.state = VocabState::Failed(e.to_string());
                ManifestResult::Skipped(outcome)
            }
        }
    }

    async fn reconcile(
        &self,
        entry: &ManifestEntry,
        snapshot: &mut LoadedVocabState,
        outcome: &mut ManifestOutcome,
    ) -> Result<VocabState, SyncError> {
        let manifest = entry.load()?;

        let config = self.resolver.resolve(&manifest.config).await?;
        let graph = extract_graph(&config.text());
        tracing::info!("Graph: {}", graph);
        if graph.is_empty() {
            outcome.add_warning(format!(
                "{} does not declare a sparqlGraph",
                config.origin()
            ));
        }
        outcome.graph = Some(graph.clone());

        let now = self.clock.now();
        let decision = decide_reload(&graph, manifest.config.refresh_policy(), snapshot, now);
        tracing::debug!("Reload decision for '{}': {:?}", entry.id, decision);

        let state = if decision.reload() {
            tracing::info!("Loading vocabulary {}", entry.id);
            let source = self.resolver.resolve(&manifest.source).await?;
            let result = self
                .connector
                .add_vocabulary(source.as_bytes(), &graph, &manifest.source.format(), false)
                .await;
            self.tolerate(result, outcome)?;

            if let Some(tweaks) = &manifest.tweaks {
                tracing::info!("Applying tweaks to {}", graph);
                let overlay = self.resolver.resolve(tweaks).await?;
                let result = self
                    .connector
                    .add_vocabulary(overlay.as_bytes(), &graph, &tweaks.format(), true)
                    .await;
                self.tolerate(result, outcome)?;
            }

            let result = match decision {
                ReloadDecision::New => self.connector.set_timestamp(&graph, now).await,
                _ => self.connector.update_timestamp(&graph, now).await,
            };
            self.tolerate(result, outcome)?;
            snapshot.insert(graph, now);
            tracing::info!("... DONE");
            VocabState::Reloaded
        } else {
            VocabState::FreshSkip
        };

        // Appending last keeps a vocabulary that failed above out of the output.
        let config = self.resolver.resolve(&manifest.config).await?;
        self.accumulator.append(config.as_bytes())?;
        Ok(state)
    }

    fn tolerate(
        &self,
        result: Result<(), SyncError>,
        outcome: &mut ManifestOutcome,
    ) -> Result<(), SyncError> {
        match result {
            Err(e @ SyncError::Store { .. }) if self.ingest_policy == IngestPolicy::BestEffort => {
                tracing::warn!("Store rejected data for '{}': {}", outcome.id, e);
                outcome.add_warning(e.to_string());
                Ok(())
            }
            other => other,
        }
    }
}

/// A complete provisioning run: bootstrap the output, prepare the store and
/// reconcile every manifest in the data directory.
pub async fn synchronize(settings: &SyncSettings) -> Result<SyncReport, SyncError> {
    if settings.startup_delay > 0 {
        tracing::info!("Waiting {}s before contacting the store", settings.startup_delay);
        tokio::time::sleep(Duration::from_secs(settings.startup_delay)).await;
    }

    let manifests = ManifestSet::discover(&settings.data)?;

    let accumulator = ConfigAccumulator::new(&settings.config_output);
    accumulator.initialize(&settings.data, &settings.base_config)?;

    let client = settings.http_client()?;
    let connector = settings.connector(client.clone())?;
    tracing::info!("Setting up {} store", connector.name());
    connector.setup().await?;

    let reconciler = Reconciler::new(
        connector,
        SourceResolver::new(client, &settings.data),
        accumulator,
    )
    .with_ingest_policy(settings.ingest_policy);
    reconciler.run(&manifests).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::Client;
    use std::fs;
    use std::path::Path;
    use std::sync::{Arc, Mutex, Once};

    static INIT: Once = Once::new();

    /// Initialize logging exactly once for all tests
    fn init_logging() {
        INIT.call_once(|| {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(tracing::Level::DEBUG)
                .init();
        });
    }

    const HOUR: i64 = 3600;
    const NOW: i64 = 1_700_000_000;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Add { graph: String, append: bool },
        Set(String, i64),
        Update(String, i64),
    }

    #[derive(Default)]
    struct StoreState {
        timestamps: LoadedVocabState,
        calls: Vec<Call>,
        reject_adds: bool,
    }

    #[derive(Clone, Default)]
    struct MemoryConnector {
        state: Arc<Mutex<StoreState>>,
    }

    impl MemoryConnector {
        fn with_timestamps(entries: &[(&str, i64)]) -> Self {
            let connector = Self::default();
            connector.state.lock().unwrap().timestamps = entries
                .iter()
                .map(|(g, t)| (g.to_string(), *t))
                .collect();
            connector
        }

        fn rejecting() -> Self {
            let connector = Self::default();
            connector.state.lock().unwrap().reject_adds = true;
            connector
        }

        fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        fn clear_calls(&self) {
            self.state.lock().unwrap().calls.clear();
        }
    }

    #[async_trait]
    impl DatabaseConnector for MemoryConnector {
        fn name(&self) -> &'static str {
            "memory"
        }

        async fn setup(&self) -> Result<(), SyncError> {
            Ok(())
        }

        async fn add_vocabulary(
            &self,
            _content: &[u8],
            graph_name: &str,
            _extension: &str,
            append: bool,
        ) -> Result<(), SyncError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Add {
                graph: graph_name.to_string(),
                append,
            });
            if state.reject_adds {
                return Err(SyncError::Store {
                    operation: "graph replace".into(),
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(())
        }

        async fn get_loaded_vocabs(&self) -> Result<LoadedVocabState, SyncError> {
            Ok(self.state.lock().unwrap().timestamps.clone())
        }

        async fn set_timestamp(&self, graph_name: &str, timestamp: i64) -> Result<(), SyncError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Set(graph_name.to_string(), timestamp));
            state.timestamps.insert(graph_name.to_string(), timestamp);
            Ok(())
        }

        async fn update_timestamp(&self, graph_name: &str, timestamp: i64) -> Result<(), SyncError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Update(graph_name.to_string(), timestamp));
            state.timestamps.insert(graph_name.to_string(), timestamp);
            Ok(())
        }
    }

    fn write_vocab(dir: &Path, id: &str, config_extra: &str) {
        fs::write(
            dir.join(format!("{id}.ttl")),
            format!(":{id} a skosmos:Vocabulary ;\n    skosmos:sparqlGraph <http://example.org/{id}/> .\n"),
        )
        .unwrap();
        fs::write(dir.join(format!("{id}-data.ttl")), "<a> <b> <c> .\n").unwrap();
        fs::write(
            dir.join(format!("{id}.yaml")),
            format!(
                "config:\n  type: file\n  location: {id}.ttl\n{config_extra}\
                 source:\n  type: file\n  location: {id}-data.ttl\n"
            ),
        )
        .unwrap();
    }

    fn reconciler(dir: &Path, connector: &MemoryConnector, now: i64) -> Reconciler {
        Reconciler::new(
            Box::new(connector.clone()),
            SourceResolver::new(Client::new(), dir),
            ConfigAccumulator::new(dir.join("out.ttl")),
        )
        .with_clock(FixedClock(now))
    }

    fn output(dir: &Path) -> String {
        fs::read_to_string(dir.join("out.ttl")).unwrap_or_default()
    }

    #[test]
    fn new_graph_always_loads() {
        let snapshot = LoadedVocabState::new();
        for policy in [RefreshPolicy::Never, RefreshPolicy::After { hours: 1000.0 }] {
            assert_eq!(
                decide_reload("http://g/", policy, &snapshot, NOW),
                ReloadDecision::New
            );
        }
    }

    #[test]
    fn reload_boundary_is_strict() {
        let policy = RefreshPolicy::After { hours: 2.0 };
        let snapshot: LoadedVocabState = [("http://g/".to_string(), NOW - 2 * HOUR)].into();
        assert_eq!(
            decide_reload("http://g/", policy, &snapshot, NOW),
            ReloadDecision::Fresh
        );
        assert_eq!(
            decide_reload("http://g/", policy, &snapshot, NOW + 1),
            ReloadDecision::Stale
        );
    }

    #[test]
    fn zero_interval_reloads_on_any_positive_age() {
        let policy = RefreshPolicy::After { hours: 0.0 };
        let snapshot: LoadedVocabState = [("http://g/".to_string(), NOW)].into();
        assert_eq!(
            decide_reload("http://g/", policy, &snapshot, NOW),
            ReloadDecision::Fresh
        );
        assert_eq!(
            decide_reload("http://g/", policy, &snapshot, NOW + 1),
            ReloadDecision::Stale
        );
    }

    #[test]
    fn without_refresh_present_graph_is_never_reloaded() {
        let snapshot: LoadedVocabState = [("http://g/".to_string(), 0)].into();
        assert_eq!(
            decide_reload("http://g/", RefreshPolicy::Never, &snapshot, NOW),
            ReloadDecision::Fresh
        );
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        write_vocab(dir.path(), "a", "  refresh: true\n");
        write_vocab(dir.path(), "b", "");
        let manifests = ManifestSet::discover(dir.path()).unwrap();
        let connector = MemoryConnector::default();

        let first = reconciler(dir.path(), &connector, NOW)
            .run(&manifests)
            .await
            .unwrap();
        assert_eq!(first.reloaded(), vec!["a", "b"]);
        assert_eq!(
            connector.calls(),
            vec![
                Call::Add { graph: "http://example.org/a/".into(), append: false },
                Call::Set("http://example.org/a/".into(), NOW),
                Call::Add { graph: "http://example.org/b/".into(), append: false },
                Call::Set("http://example.org/b/".into(), NOW),
            ]
        );

        connector.clear_calls();
        let second = reconciler(dir.path(), &connector, NOW)
            .run(&manifests)
            .await
            .unwrap();
        assert!(connector.calls().is_empty());
        assert_eq!(second.skipped(), vec!["a", "b"]);
        assert!(second.reloaded().is_empty());
    }

    #[tokio::test]
    async fn stale_graph_is_updated_and_tweaks_appended() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        write_vocab(dir.path(), "yso", "  refresh: true\n  refreshInterval: 2\n");
        fs::write(dir.path().join("yso-tweaks.ttl"), "<a> <b> <d> .\n").unwrap();
        let mut manifest = fs::read_to_string(dir.path().join("yso.yaml")).unwrap();
        manifest.push_str("tweaks:\n  type: file\n  location: yso-tweaks.ttl\n");
        fs::write(dir.path().join("yso.yaml"), manifest).unwrap();

        let connector =
            MemoryConnector::with_timestamps(&[("http://example.org/yso/", NOW - 3 * HOUR)]);
        let report = reconciler(dir.path(), &connector, NOW)
            .run(&ManifestSet::discover(dir.path()).unwrap())
            .await
            .unwrap();

        assert_eq!(report.reloaded(), vec!["yso"]);
        assert_eq!(
            connector.calls(),
            vec![
                Call::Add { graph: "http://example.org/yso/".into(), append: false },
                Call::Add { graph: "http://example.org/yso/".into(), append: true },
                Call::Update("http://example.org/yso/".into(), NOW),
            ]
        );
    }

    #[tokio::test]
    async fn failed_manifest_is_left_out_of_config() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        write_vocab(dir.path(), "a", "");
        write_vocab(dir.path(), "c", "");
        fs::write(dir.path().join("b.ttl"), "skosmos:sparqlGraph <http://example.org/b/> .\n").unwrap();
        fs::write(
            dir.path().join("b.yaml"),
            "config:\n  type: bogus\n  location: b.ttl\nsource:\n  type: file\n  location: b.ttl\n",
        )
        .unwrap();

        let connector = MemoryConnector::default();
        let report = reconciler(dir.path(), &connector, NOW)
            .run(&ManifestSet::discover(dir.path()).unwrap())
            .await
            .unwrap();

        assert_eq!(report.appended(), vec!["a", "c"]);
        assert_eq!(report.failed(), vec!["b"]);
        let out = output(dir.path());
        assert!(out.contains("http://example.org/a/"));
        assert!(!out.contains("http://example.org/b/"));
        assert!(out.find("example.org/a/").unwrap() < out.find("example.org/c/").unwrap());
    }

    #[tokio::test]
    async fn unknown_auth_only_skips_its_manifest() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        write_vocab(dir.path(), "a", "");
        fs::write(dir.path().join("z.ttl"), "skosmos:sparqlGraph <http://example.org/z/> .\n").unwrap();
        fs::write(
            dir.path().join("z.yaml"),
            "config:\n  type: file\n  location: z.ttl\n\
             source:\n  type: fetch\n  location: http://127.0.0.1:9/z.ttl\n  auth:\n    type: svn\n    token: T\n",
        )
        .unwrap();

        let connector = MemoryConnector::default();
        let report = reconciler(dir.path(), &connector, NOW)
            .run(&ManifestSet::discover(dir.path()).unwrap())
            .await
            .unwrap();

        assert_eq!(report.appended(), vec!["a"]);
        let failed = &report.outcomes()[1];
        assert_eq!(failed.id, "z");
        assert_eq!(failed.graph.as_deref(), Some("http://example.org/z/"));
        assert!(matches!(&failed.state, VocabState::Failed(reason) if reason.contains("svn")));
        assert!(!connector
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Add { graph, .. } if graph.contains("/z/"))));
    }

    #[tokio::test]
    async fn unparseable_manifest_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_vocab(dir.path(), "a", "");
        fs::write(dir.path().join("broken.yaml"), "config: [not, a, descriptor\n").unwrap();

        let connector = MemoryConnector::default();
        let report = reconciler(dir.path(), &connector, NOW)
            .run(&ManifestSet::discover(dir.path()).unwrap())
            .await
            .unwrap();
        assert_eq!(report.failed(), vec!["broken"]);
        assert_eq!(report.appended(), vec!["a"]);
    }

    #[tokio::test]
    async fn strict_policy_fails_on_store_rejection() {
        let dir = tempfile::tempdir().unwrap();
        write_vocab(dir.path(), "a", "");
        let connector = MemoryConnector::rejecting();

        let report = reconciler(dir.path(), &connector, NOW)
            .run(&ManifestSet::discover(dir.path()).unwrap())
            .await
            .unwrap();
        assert_eq!(report.failed(), vec!["a"]);
        assert!(output(dir.path()).is_empty());
        assert!(!connector.calls().iter().any(|c| matches!(c, Call::Set(..))));
    }

    #[tokio::test]
    async fn best_effort_policy_keeps_going_with_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        write_vocab(dir.path(), "a", "");
        let connector = MemoryConnector::rejecting();

        let report = reconciler(dir.path(), &connector, NOW)
            .with_ingest_policy(IngestPolicy::BestEffort)
            .run(&ManifestSet::discover(dir.path()).unwrap())
            .await
            .unwrap();
        assert_eq!(report.reloaded(), vec!["a"]);
        assert!(report.has_warnings());
        assert!(output(dir.path()).contains("http://example.org/a/"));
        assert!(connector.calls().contains(&Call::Set("http://example.org/a/".into(), NOW)));
    }

    #[tokio::test]
    async fn unwritable_output_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        write_vocab(dir.path(), "a", "");
        write_vocab(dir.path(), "b", "");
        let connector = MemoryConnector::default();
        let reconciler = Reconciler::new(
            Box::new(connector.clone()),
            SourceResolver::new(Client::new(), dir.path()),
            ConfigAccumulator::new(dir.path().join("missing-dir/out.ttl")),
        )
        .with_clock(FixedClock(NOW));

        let err = reconciler
            .run(&ManifestSet::discover(dir.path()).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(connector.calls().len(), 2);
    }

    #[test]
    fn parses_ingest_policy() {
        assert_eq!("strict".parse::<IngestPolicy>().unwrap(), IngestPolicy::Strict);
        assert_eq!(
            "best-effort".parse::<IngestPolicy>().unwrap(),
            IngestPolicy::BestEffort
        );
        assert!("sometimes".parse::<IngestPolicy>().is_err());
    }
}

use crate::error::ProcessingMessage;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VocabState {
    #[default]
    Unprocessed,
    /// Present in the store and not due for a refresh.
    FreshSkip,
    Reloaded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ManifestOutcome {
    pub id: String,
    pub graph: Option<String>,
    pub state: VocabState,
    pub warnings: Vec<ProcessingMessage>,
}

impl ManifestOutcome {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            graph: None,
            state: VocabState::Unprocessed,
            warnings: Vec::new(),
        }
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings
            .push(ProcessingMessage::new(message, Some(self.id.clone())));
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, VocabState::Failed(_))
    }
}

/// Outcome of every discovered manifest, in discovery order.
#[derive(Debug, Default)]
pub struct SyncReport {
    outcomes: Vec<ManifestOutcome>,
}

impl SyncReport {
    pub fn push(&mut self, outcome: ManifestOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[ManifestOutcome] {
        &self.outcomes
    }

    pub fn reloaded(&self) -> Vec<&str> {
        self.ids_where(|o| o.state == VocabState::Reloaded)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.ids_where(|o| o.state == VocabState::FreshSkip)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.ids_where(ManifestOutcome::is_failed)
    }

    /// Manifests whose configuration fragment reached the output.
    pub fn appended(&self) -> Vec<&str> {
        self.ids_where(|o| matches!(o.state, VocabState::Reloaded | VocabState::FreshSkip))
    }

    pub fn has_warnings(&self) -> bool {
        self.outcomes.iter().any(|o| !o.warnings.is_empty())
    }

    fn ids_where(&self, predicate: impl Fn(&ManifestOutcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| predicate(o))
            .map(|o| o.id.as_str())
            .collect()
    }
}

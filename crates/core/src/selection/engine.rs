use std::collections::BTreeSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::directory::{ProfileLookup, UserDirectory};
use crate::domain::participant::{Candidate, Message};
use crate::domain::selection::{SelectionMode, SelectionRecord, SelectionScope};
use crate::errors::ApplicationError;
use crate::history::SelectionHistoryStore;
use crate::selection::collector::{collect, collect_roster};
use crate::selection::eligibility::{EligibilityFilter, Exclusion};
use crate::selection::fairness::{FairnessPolicy, WeightTable};
use crate::selection::selector::select;

/// Plain configuration values the engine runs with.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionSettings {
    pub bot_id: Candidate,
    pub excluded_status_markers: Vec<String>,
    pub allowed_reaction_emojis: BTreeSet<String>,
    pub history_window: usize,
    pub fairness: FairnessPolicy,
}

impl SelectionSettings {
    pub fn new(bot_id: Candidate) -> Self {
        let fairness = FairnessPolicy::default();
        Self {
            bot_id,
            excluded_status_markers: Vec::new(),
            allowed_reaction_emojis: BTreeSet::new(),
            history_window: fairness.history_window(),
            fairness,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParticipantSource {
    Thread(Vec<Message>),
    Roster(Vec<Candidate>),
}

/// Audit fields copied onto the stored selection record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordContext {
    pub invoked_by: Option<Candidate>,
    pub thread_ts: Option<String>,
    pub channel_name: Option<String>,
    pub task: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionRequest {
    pub scope: SelectionScope,
    pub mode: SelectionMode,
    pub source: ParticipantSource,
    pub record: RecordContext,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmptyPoolReason {
    /// Nothing was collected: no messages, authors or roster members.
    NoParticipants,
    /// Participants were found but every one of them was filtered out.
    EveryoneFiltered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Weighting {
    History,
    Uniform,
}

/// A secondary failure the engine recovered from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Degradation {
    DirectoryUnavailable(String),
    HistoryUnavailable(String),
    RecordWriteFailed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub selected: Candidate,
    pub eligible_count: usize,
    pub weighting: Weighting,
    pub weights: WeightTable,
    pub excluded: Vec<Exclusion>,
    pub degradations: Vec<Degradation>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectionOutcome {
    Selected(Selection),
    EmptyPool {
        reason: EmptyPoolReason,
        collected: usize,
        excluded: Vec<Exclusion>,
        degradations: Vec<Degradation>,
    },
}

/// Runs collect → filter → weight → select → record for one trigger.
pub struct SelectionEngine {
    directory: Arc<dyn UserDirectory>,
    history: Arc<dyn SelectionHistoryStore>,
    settings: SelectionSettings,
    filter: EligibilityFilter,
}

impl SelectionEngine {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        history: Arc<dyn SelectionHistoryStore>,
        settings: SelectionSettings,
    ) -> Self {
        let filter = EligibilityFilter::new(
            settings.bot_id.clone(),
            settings.excluded_status_markers.clone(),
        );
        Self { directory, history, settings, filter }
    }

    pub fn settings(&self) -> &SelectionSettings {
        &self.settings
    }

    pub async fn run(
        &self,
        request: SelectionRequest,
    ) -> Result<SelectionOutcome, ApplicationError> {
        let mut rng = StdRng::from_entropy();
        self.run_with_rng(request, &mut rng).await
    }

    pub async fn run_with_rng<R>(
        &self,
        request: SelectionRequest,
        rng: &mut R,
    ) -> Result<SelectionOutcome, ApplicationError>
    where
        R: Rng + Send,
    {
        let SelectionRequest { scope, mode, source, record } = request;
        let mut degradations = Vec::new();

        let collected = match &source {
            ParticipantSource::Thread(messages) => {
                collect(messages, &self.settings.allowed_reaction_emojis)
            }
            ParticipantSource::Roster(members) => collect_roster(members.iter().cloned()),
        };
        if collected.is_empty() {
            return Ok(SelectionOutcome::EmptyPool {
                reason: EmptyPoolReason::NoParticipants,
                collected: 0,
                excluded: Vec::new(),
                degradations,
            });
        }

        let lookup: BTreeSet<Candidate> =
            collected.iter().filter(|id| *id != self.filter.bot_id()).cloned().collect();
        let resolved = if lookup.is_empty() {
            ProfileLookup::default()
        } else {
            match self.directory.resolve_profiles(&lookup).await {
                Ok(resolved) => resolved,
                Err(error) => {
                    degradations.push(Degradation::DirectoryUnavailable(error.to_string()));
                    ProfileLookup::default()
                }
            }
        };
        // Ids whose lookup failed have no profile and are dropped as unknown.
        if let Some(summary) = resolved.failure_summary() {
            degradations.push(Degradation::DirectoryUnavailable(summary));
        }

        let eligibility = self.filter.filter(&collected, mode, &resolved.profiles);
        if eligibility.is_empty() {
            return Ok(SelectionOutcome::EmptyPool {
                reason: EmptyPoolReason::EveryoneFiltered,
                collected: collected.len(),
                excluded: eligibility.excluded,
                degradations,
            });
        }
        let eligible = eligibility.eligible;

        let (weighting, weights) = if eligible.len() == 1 {
            (Weighting::Uniform, FairnessPolicy::uniform(&eligible))
        } else {
            match self.history.recent_selections(&scope, self.settings.history_window).await {
                Ok(recent) => {
                    (Weighting::History, self.settings.fairness.weights(&eligible, &recent))
                }
                Err(error) => {
                    degradations.push(Degradation::HistoryUnavailable(error.to_string()));
                    (Weighting::Uniform, FairnessPolicy::uniform(&eligible))
                }
            }
        };

        let selected = select(&eligible, &weights, rng)?;

        let mut entry = SelectionRecord::new(scope, selected.clone(), eligible.len() as u32);
        entry.invoked_by = record.invoked_by;
        entry.thread_ts = record.thread_ts;
        entry.channel_name = record.channel_name;
        entry.task = record.task;
        if let Err(error) = self.history.append(entry).await {
            degradations.push(Degradation::RecordWriteFailed(error.to_string()));
        }

        Ok(SelectionOutcome::Selected(Selection {
            selected,
            eligible_count: eligible.len(),
            weighting,
            weights,
            excluded: eligibility.excluded,
            degradations,
        }))
    }
}

use std::collections::{BTreeSet, HashMap};

use crate::domain::participant::{Candidate, Profile};
use crate::domain::selection::SelectionMode;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExclusionReason {
    SelfBot,
    Bot,
    Deleted,
    UnknownProfile,
    Status { marker: String },
}

impl ExclusionReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SelfBot => "self_bot",
            Self::Bot => "bot",
            Self::Deleted => "deleted",
            Self::UnknownProfile => "unknown_profile",
            Self::Status { .. } => "status",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exclusion {
    pub candidate: Candidate,
    pub reason: ExclusionReason,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EligibilityOutcome {
    /// Sorted by identifier.
    pub eligible: Vec<Candidate>,
    pub excluded: Vec<Exclusion>,
}

impl EligibilityOutcome {
    pub fn is_empty(&self) -> bool {
        self.eligible.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EligibilityFilter {
    bot_id: Candidate,
    excluded_status_markers: Vec<String>,
}

impl EligibilityFilter {
    pub fn new(bot_id: Candidate, excluded_status_markers: Vec<String>) -> Self {
        let excluded_status_markers =
            excluded_status_markers.into_iter().filter(|marker| !marker.is_empty()).collect();
        Self { bot_id, excluded_status_markers }
    }

    pub fn bot_id(&self) -> &Candidate {
        &self.bot_id
    }

    /// Drops the invoking bot, non-human and deleted accounts, and candidates
    /// without a resolved profile. In channel mode a candidate whose status
    /// emoji or text contains an excluded marker is dropped as well.
    pub fn filter(
        &self,
        candidates: &BTreeSet<Candidate>,
        mode: SelectionMode,
        profiles: &HashMap<Candidate, Profile>,
    ) -> EligibilityOutcome {
        let mut outcome = EligibilityOutcome::default();

        for candidate in candidates {
            match self.exclusion_reason(candidate, mode, profiles.get(candidate)) {
                Some(reason) => {
                    outcome.excluded.push(Exclusion { candidate: candidate.clone(), reason })
                }
                None => outcome.eligible.push(candidate.clone()),
            }
        }

        outcome
    }

    fn exclusion_reason(
        &self,
        candidate: &Candidate,
        mode: SelectionMode,
        profile: Option<&Profile>,
    ) -> Option<ExclusionReason> {
        if candidate == &self.bot_id {
            return Some(ExclusionReason::SelfBot);
        }

        let Some(profile) = profile else {
            return Some(ExclusionReason::UnknownProfile);
        };
        if profile.is_bot {
            return Some(ExclusionReason::Bot);
        }
        if profile.is_deleted {
            return Some(ExclusionReason::Deleted);
        }

        if mode == SelectionMode::Channel {
            if let Some(marker) = self.matching_marker(profile) {
                return Some(ExclusionReason::Status { marker: marker.to_owned() });
            }
        }

        None
    }

    fn matching_marker(&self, profile: &Profile) -> Option<&str> {
        self.excluded_status_markers
            .iter()
            .find(|marker| {
                profile.status_emoji.contains(marker.as_str())
                    || profile.status_text.contains(marker.as_str())
            })
            .map(String::as_str)
    }
}

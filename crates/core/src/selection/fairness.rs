use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::participant::Candidate;
use crate::errors::DomainError;

/// Per-request draw weights. Every eligible candidate has an entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightTable {
    weights: BTreeMap<Candidate, f64>,
}

impl WeightTable {
    pub fn get(&self, candidate: &Candidate) -> Option<f64> {
        self.weights.get(candidate).copied()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Candidate, f64)> {
        self.weights.iter().map(|(candidate, weight)| (candidate, *weight))
    }

    /// Draw probability of `candidate`, or zero when it has no entry.
    pub fn probability(&self, candidate: &Candidate) -> f64 {
        let total = self.total();
        match self.get(candidate) {
            Some(weight) if total > 0.0 => weight / total,
            _ => 0.0,
        }
    }
}

impl FromIterator<(Candidate, f64)> for WeightTable {
    fn from_iter<T: IntoIterator<Item = (Candidate, f64)>>(iter: T) -> Self {
        Self { weights: iter.into_iter().collect() }
    }
}

/// Recency penalty model. The entry at history index `i` costs its candidate
/// `max(max_penalty - i * penalty_step, 0)`, and no weight drops below
/// `min_weight`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FairnessPolicy {
    pub base_weight: f64,
    pub max_penalty: f64,
    pub penalty_step: f64,
    pub min_weight: f64,
}

impl Default for FairnessPolicy {
    fn default() -> Self {
        Self { base_weight: 100.0, max_penalty: 50.0, penalty_step: 2.5, min_weight: 1.0 }
    }
}

/// Upper bound for `base_weight`; keeps the summed weights of any realistic
/// pool finite.
pub const MAX_BASE_WEIGHT: f64 = 1_000_000.0;

impl FairnessPolicy {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.min_weight.is_finite() || self.min_weight <= 0.0 {
            return Err(DomainError::InvalidArgument(
                "min_weight must be greater than zero".to_owned(),
            ));
        }
        if !self.base_weight.is_finite() || self.base_weight < self.min_weight {
            return Err(DomainError::InvalidArgument(
                "base_weight must be at least min_weight".to_owned(),
            ));
        }
        if self.base_weight > MAX_BASE_WEIGHT {
            return Err(DomainError::InvalidArgument(format!(
                "base_weight must be at most {MAX_BASE_WEIGHT}"
            )));
        }
        let negative = |value: f64| !value.is_finite() || value < 0.0;
        if negative(self.max_penalty) || negative(self.penalty_step) {
            return Err(DomainError::InvalidArgument(
                "max_penalty and penalty_step must not be negative".to_owned(),
            ));
        }
        Ok(())
    }

    /// Number of most-recent history entries that can still carry a penalty.
    pub fn history_window(&self) -> usize {
        if self.max_penalty <= 0.0 {
            return 0;
        }
        if self.penalty_step <= 0.0 {
            return usize::MAX;
        }
        (self.max_penalty / self.penalty_step).ceil() as usize
    }

    pub fn penalty_at(&self, index: usize) -> f64 {
        (self.max_penalty - index as f64 * self.penalty_step).max(0.0)
    }

    /// `recent` is ordered most-recent-first. Entries for candidates that are
    /// not in `eligible` are skipped; repeated entries compound.
    pub fn weights(&self, eligible: &[Candidate], recent: &[Candidate]) -> WeightTable {
        let mut weights: BTreeMap<Candidate, f64> =
            eligible.iter().map(|candidate| (candidate.clone(), self.base_weight)).collect();

        for (index, candidate) in recent.iter().enumerate().take(self.history_window()) {
            let Some(weight) = weights.get_mut(candidate) else {
                continue;
            };
            *weight = (*weight - self.penalty_at(index)).max(self.min_weight);
        }

        WeightTable { weights }
    }

    pub fn uniform(eligible: &[Candidate]) -> WeightTable {
        eligible.iter().map(|candidate| (candidate.clone(), 1.0)).collect()
    }
}

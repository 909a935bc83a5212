pub mod collector;
pub mod eligibility;
pub mod engine;
pub mod fairness;
pub mod selector;

pub use collector::{collect, collect_roster};
pub use eligibility::{EligibilityFilter, EligibilityOutcome, Exclusion, ExclusionReason};
pub use engine::{
    Degradation, EmptyPoolReason, ParticipantSource, RecordContext, Selection, SelectionEngine,
    SelectionOutcome, SelectionRequest, SelectionSettings, Weighting,
};
pub use fairness::{FairnessPolicy, WeightTable, MAX_BASE_WEIGHT};
pub use selector::select;

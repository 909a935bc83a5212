//! Core selection engine for SpinBot.
//!
//! Everything in this crate is transport-agnostic: Slack, SQLite, and the
//! process surfaces live in sibling crates and talk to the engine through the
//! [`UserDirectory`] and [`SelectionHistoryStore`] ports.

pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod history;
pub mod selection;

pub use directory::{CachedUserDirectory, ProfileLookup, UserDirectory};
pub use domain::participant::{Candidate, Message, Profile, Reaction};
pub use domain::selection::{SelectionMode, SelectionRecord, SelectionRecordId, SelectionScope};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use history::SelectionHistoryStore;
pub use selection::{
    EligibilityFilter, EligibilityOutcome, Exclusion, ExclusionReason, FairnessPolicy,
    SelectionEngine, SelectionOutcome, SelectionRequest, SelectionSettings, WeightTable,
};

//! Scheduler-focused contract re-exports.

pub use crate::{Action, ConflictPair, EventDraft, MediationOutcome, ThermalChange};

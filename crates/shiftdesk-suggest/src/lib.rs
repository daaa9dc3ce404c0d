//! # Shiftdesk Suggest
//!
//! Turns an external text generator into reviewable shift drafts.
//!
//! ```text
//! CandidatePool ──► prompt ──► TextGenerator ──► parse/validate ──► DraftSuggestions
//!   (active,                      (timeout,            (unknown ids        │
//!    leave, load)                  failover)            dropped)           ▼
//!                                                             apply_suggestions
//!                                                             (Slot Store checks)
//! ```
//!
//! When the generator can't answer, single-slot recommendations fall back to
//! the least-recently-scheduled eligible employee, and `auto_fill` offers a
//! fully deterministic draft.

pub mod autofill;
pub mod candidates;
pub mod draft;
pub mod fallback;
pub mod generator;
pub mod integrator;
pub mod parse;
pub mod prompt;

pub use candidates::{Candidate, CandidatePool};
pub use draft::{
    ApplyOutcome, DraftSuggestions, Dropped, Recommendation, RejectReason, RejectedSuggestion,
    ShiftSuggestion, Strategy, SuggestConstraints, SuggestionSource,
};
pub use generator::{FailoverGenerator, OpenAiCompatibleGenerator, create_generator};
pub use integrator::SuggestionIntegrator;

//! Draft suggestion shapes. Drafts are never committed on their own; they go
//! back through [`crate::SuggestionIntegrator::apply_suggestions`].

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use shiftdesk_core::config::SuggestConfig;
use shiftdesk_core::error::Result;
use shiftdesk_core::types::{Assignment, Interval};

/// How the generator should weigh candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "instructions", rename_all = "snake_case")]
pub enum Strategy {
    /// Spread hours evenly, respect availability.
    #[default]
    Balanced,
    /// Caller-supplied free text.
    Custom(String),
}

impl Strategy {
    pub fn from_text(text: Option<&str>) -> Self {
        match text.map(str::trim) {
            Some(t) if !t.is_empty() && !t.eq_ignore_ascii_case("balanced") => {
                Strategy::Custom(t.to_string())
            }
            _ => Strategy::Balanced,
        }
    }
}

/// Numeric limits passed to the generator and honoured by auto-fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestConstraints {
    pub min_headcount_per_shift: u32,
    pub max_weekly_hours: f64,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl SuggestConstraints {
    pub fn from_config(config: &SuggestConfig) -> Self {
        Self {
            min_headcount_per_shift: config.min_headcount_per_shift,
            max_weekly_hours: config.max_weekly_hours,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions.filter(|s| !s.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftSuggestion {
    pub employee_id: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ShiftSuggestion {
    pub fn interval(&self) -> Result<Interval> {
        Interval::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum SuggestionSource {
    /// Produced by the named text generator.
    Generator(String),
    /// Least-recently-scheduled pick after the generator failed.
    Fallback,
    /// Deterministic auto-fill.
    AutoFill,
    /// Generator failed and no fallback applies.
    Unavailable,
}

/// Entries removed while validating generator output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dropped {
    /// Employee id not in the eligible set.
    pub unknown_employee: usize,
    /// Missing fields, unparsable or inverted times.
    pub invalid: usize,
}

impl Dropped {
    pub fn total(&self) -> usize {
        self.unknown_employee + self.invalid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSuggestions {
    pub schedule_id: String,
    pub strategy: Strategy,
    pub suggestions: Vec<ShiftSuggestion>,
    pub summary: String,
    pub source: SuggestionSource,
    #[serde(default)]
    pub dropped: Dropped,
}

impl DraftSuggestions {
    pub(crate) fn unavailable(schedule_id: &str, strategy: Strategy, reason: &str) -> Self {
        Self {
            schedule_id: schedule_id.to_string(),
            strategy,
            suggestions: Vec::new(),
            summary: format!("No suggestions available: {reason}"),
            source: SuggestionSource::Unavailable,
            dropped: Dropped::default(),
        }
    }
}

/// Single-slot pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub slot_id: String,
    /// `None` when nobody is eligible.
    pub employee_id: Option<String>,
    pub employee_name: Option<String>,
    pub reason: String,
    pub source: SuggestionSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    UnknownEmployee,
    Inactive,
    OnLeave { date: NaiveDate },
    Overlap { conflicting_slot_id: String },
    InvalidInterval { message: String },
    OutsideWeek,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedSuggestion {
    pub suggestion: ShiftSuggestion,
    #[serde(flatten)]
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub applied: Vec<Assignment>,
    pub rejected: Vec<RejectedSuggestion>,
}

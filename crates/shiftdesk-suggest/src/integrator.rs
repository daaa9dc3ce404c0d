//! `SuggestionIntegrator`: draft suggestions in, constrained writes out.
//!
//! Generator calls are timeout-bound and never hold a store lock: the pool is
//! read first, the generator runs, and nothing is written until
//! [`SuggestionIntegrator::apply_suggestions`] is called with a reviewed draft.

use chrono::{Duration as ChronoDuration, NaiveDate};
use shiftdesk_core::config::{RulesConfig, SuggestConfig};
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::traits::{AvailabilityProvider, TextGenerator};
use shiftdesk_core::types::{Employee, Interval, SlotWithAssignments};
use shiftdesk_store::ShiftDb;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::autofill::{AutoFillLimits, plan_auto_fill};
use crate::candidates::{Candidate, CandidatePool};
use crate::draft::{
    ApplyOutcome, DraftSuggestions, Dropped, Recommendation, RejectReason, RejectedSuggestion,
    ShiftSuggestion, Strategy, SuggestConstraints, SuggestionSource,
};
use crate::fallback::{fallback_reason, least_recently_scheduled};
use crate::parse::{ParsedSuggestions, parse_suggestions};
use crate::prompt::{build_slot_prompt, build_week_prompt};

pub struct SuggestionIntegrator {
    db: Arc<ShiftDb>,
    generator: Option<Arc<dyn TextGenerator>>,
    rules: RulesConfig,
    timeout: Duration,
}

impl SuggestionIntegrator {
    pub fn new(
        db: Arc<ShiftDb>,
        generator: Option<Arc<dyn TextGenerator>>,
        rules: &RulesConfig,
        suggest: &SuggestConfig,
    ) -> Self {
        Self {
            db,
            generator,
            rules: rules.clone(),
            timeout: Duration::from_secs(suggest.timeout_secs.max(1)),
        }
    }

    /// Override the generator timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn generator_name(&self) -> Option<&str> {
        self.generator.as_deref().map(|g| g.name())
    }

    /// Generator call bounded by the configured timeout.
    async fn ask(&self, generator: &dyn TextGenerator, prompt: &str) -> Result<String> {
        match tokio::time::timeout(self.timeout, generator.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ShiftdeskError::external(format!(
                "{} timed out after {}s",
                generator.name(),
                self.timeout.as_secs()
            ))),
        }
    }

    async fn ask_and_parse(
        &self,
        generator: &dyn TextGenerator,
        prompt: &str,
        eligible: &HashSet<&str>,
    ) -> Result<ParsedSuggestions> {
        let raw = self.ask(generator, prompt).await?;
        parse_suggestions(&raw, eligible)
    }

    // ── Draft generation ───────────────────────────────────

    /// Ask the generator for a week draft.
    ///
    /// Generator failures never fail the call: the draft comes back empty with
    /// source `Unavailable`. Unknown schedules still surface as `NotFound`.
    pub async fn suggest(
        &self,
        org_id: &str,
        schedule_id: &str,
        strategy: Strategy,
        constraints: &SuggestConstraints,
    ) -> Result<DraftSuggestions> {
        let pool = CandidatePool::load(&self.db, org_id, schedule_id, &self.rules)?;
        let Some(generator) = self.generator.as_deref() else {
            return Ok(DraftSuggestions::unavailable(
                schedule_id,
                strategy,
                "no suggestion generator configured",
            ));
        };

        let eligible: HashSet<&str> = pool.eligible().map(|c| c.id()).collect();
        let prompt = build_week_prompt(&pool, &strategy, constraints);
        tracing::debug!(
            "🧠 Requesting suggestions from {} ({} eligible employees)",
            generator.name(),
            eligible.len()
        );

        match self.ask_and_parse(generator, &prompt, &eligible).await {
            Ok(parsed) => {
                if parsed.dropped.unknown_employee > 0 {
                    tracing::warn!(
                        "⚠️ {} suggestion(s) named employees outside the eligible set",
                        parsed.dropped.unknown_employee
                    );
                }
                tracing::info!(
                    "💡 {} suggestion(s) drafted for schedule {schedule_id}",
                    parsed.suggestions.len()
                );
                Ok(DraftSuggestions {
                    schedule_id: schedule_id.to_string(),
                    strategy,
                    suggestions: parsed.suggestions,
                    summary: parsed.summary,
                    source: SuggestionSource::Generator(generator.name().to_string()),
                    dropped: parsed.dropped,
                })
            }
            Err(e) => {
                tracing::warn!("⚠️ Suggestion generator failed: {e}");
                Ok(DraftSuggestions::unavailable(schedule_id, strategy, &e.to_string()))
            }
        }
    }

    /// Deterministic draft filling every understaffed slot. No generator involved.
    pub fn auto_fill(
        &self,
        org_id: &str,
        schedule_id: &str,
        constraints: &SuggestConstraints,
    ) -> Result<DraftSuggestions> {
        let pool = CandidatePool::load(&self.db, org_id, schedule_id, &self.rules)?;
        let limits = AutoFillLimits {
            max_weekly_hours: constraints
                .max_weekly_hours
                .min(self.rules.overtime_threshold_hours),
            min_headcount: constraints.min_headcount_per_shift,
        };
        let suggestions = plan_auto_fill(&pool, limits);
        let open_seats: u32 = pool
            .slots
            .iter()
            .map(|s| {
                s.slot
                    .counts
                    .required
                    .saturating_sub(s.assignments.len() as u32)
            })
            .sum();
        let summary = format!(
            "Auto-fill proposed {} assignment(s) for {} open seat(s)",
            suggestions.len(),
            open_seats
        );
        tracing::info!("🧩 {summary} in schedule {schedule_id}");
        Ok(DraftSuggestions {
            schedule_id: schedule_id.to_string(),
            strategy: Strategy::Balanced,
            suggestions,
            summary,
            source: SuggestionSource::AutoFill,
            dropped: Dropped::default(),
        })
    }

    // ── Single-slot recommendation ─────────────────────────

    /// Best employee for one slot.
    ///
    /// Tries the generator first; on any generator failure (or no usable
    /// answer) falls back to the least-recently-scheduled eligible employee.
    pub async fn recommend_for_slot(&self, org_id: &str, slot_id: &str) -> Result<Recommendation> {
        let target = self.db.get_slot(org_id, slot_id)?;
        let pool = CandidatePool::load(&self.db, org_id, &target.slot.schedule_id, &self.rules)?;
        let eligible = slot_eligible(&pool, &target);

        if let Some(generator) = self.generator.as_deref() {
            if !eligible.is_empty() {
                match self.recommend_with(generator, &pool, &target, &eligible).await {
                    Ok(Some(rec)) => return Ok(rec),
                    Ok(None) => tracing::warn!(
                        "⚠️ {} returned no usable pick for slot {slot_id}; using fallback",
                        generator.name()
                    ),
                    Err(e) => tracing::warn!(
                        "⚠️ Suggestion generator failed for slot {slot_id}: {e}; using fallback"
                    ),
                }
            }
        }

        let last_ends = self.db.last_assigned_end(org_id, target.slot.interval.start)?;
        let picked = least_recently_scheduled(
            eligible
                .iter()
                .map(|c| (c.id(), last_ends.get(c.id()).copied())),
        );
        let rec = match picked {
            Some((employee_id, last_end)) => Recommendation {
                slot_id: slot_id.to_string(),
                employee_id: Some(employee_id.to_string()),
                employee_name: pool.get(employee_id).map(|c| c.employee.display_name.clone()),
                reason: fallback_reason(last_end),
                source: SuggestionSource::Fallback,
            },
            None => Recommendation {
                slot_id: slot_id.to_string(),
                employee_id: None,
                employee_name: None,
                reason: "no eligible employee is free for this slot".to_string(),
                source: SuggestionSource::Fallback,
            },
        };
        tracing::info!(
            "🎯 Fallback recommendation for slot {slot_id}: {}",
            rec.employee_id.as_deref().unwrap_or("nobody")
        );
        Ok(rec)
    }

    async fn recommend_with(
        &self,
        generator: &dyn TextGenerator,
        pool: &CandidatePool,
        target: &SlotWithAssignments,
        eligible: &[&Candidate],
    ) -> Result<Option<Recommendation>> {
        let ids: HashSet<&str> = eligible.iter().map(|c| c.id()).collect();
        let prompt = build_slot_prompt(pool, &target.slot, eligible);
        let parsed = self.ask_and_parse(generator, &prompt, &ids).await?;
        Ok(parsed.suggestions.into_iter().next().map(|s| Recommendation {
            slot_id: target.slot.id.clone(),
            employee_name: pool.get(&s.employee_id).map(|c| c.employee.display_name.clone()),
            employee_id: Some(s.employee_id),
            reason: s.reason.unwrap_or_else(|| parsed.summary.clone()),
            source: SuggestionSource::Generator(generator.name().to_string()),
        }))
    }

    // ── Apply ──────────────────────────────────────────────

    /// Commit reviewed suggestions through the regular assignment path.
    ///
    /// Each suggestion is checked and written independently; rejections are
    /// reported alongside the assignments that went through.
    pub fn apply_suggestions(
        &self,
        org_id: &str,
        schedule_id: &str,
        suggestions: &[ShiftSuggestion],
    ) -> Result<ApplyOutcome> {
        let schedule = self.db.get_schedule(org_id, schedule_id)?;
        let employees: HashMap<String, Employee> = self
            .db
            .list_employees(org_id, false)?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        let mut outcome = ApplyOutcome::default();
        for suggestion in suggestions {
            let reject = |reason: RejectReason| RejectedSuggestion {
                suggestion: suggestion.clone(),
                reason,
            };

            let interval = match suggestion.interval() {
                Ok(iv) => iv,
                Err(e) => {
                    outcome.rejected.push(reject(RejectReason::InvalidInterval {
                        message: e.to_string(),
                    }));
                    continue;
                }
            };
            if !schedule.covers(&interval) {
                outcome.rejected.push(reject(RejectReason::OutsideWeek));
                continue;
            }
            let Some(employee) = employees.get(&suggestion.employee_id) else {
                outcome.rejected.push(reject(RejectReason::UnknownEmployee));
                continue;
            };
            if !employee.active {
                outcome.rejected.push(reject(RejectReason::Inactive));
                continue;
            }
            if let Some(date) = self.leave_date(org_id, &employee.id, &interval)? {
                outcome.rejected.push(reject(RejectReason::OnLeave { date }));
                continue;
            }

            match self.db.assign_to_window(
                org_id,
                schedule_id,
                &employee.id,
                interval,
                suggestion.position.as_deref(),
            ) {
                Ok(assignment) => outcome.applied.push(assignment),
                Err(ShiftdeskError::OverlapConflict {
                    conflicting_slot_id,
                    ..
                }) => outcome
                    .rejected
                    .push(reject(RejectReason::Overlap { conflicting_slot_id })),
                Err(ShiftdeskError::Validation(message)) => outcome
                    .rejected
                    .push(reject(RejectReason::InvalidInterval { message })),
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "✅ Applied {} suggestion(s), rejected {} on schedule {schedule_id}",
            outcome.applied.len(),
            outcome.rejected.len()
        );
        Ok(outcome)
    }

    /// First date of `interval` covered by a leave of `employee_id`.
    fn leave_date(
        &self,
        org_id: &str,
        employee_id: &str,
        interval: &Interval,
    ) -> Result<Option<NaiveDate>> {
        let from = interval.start.date();
        // a shift ending exactly at midnight does not touch the next day
        let to = (interval.end - ChronoDuration::seconds(1)).date().max(from);
        let leaves = self.db.leaves(org_id, employee_id, from, to)?;
        Ok(from
            .iter_days()
            .take_while(|d| *d <= to)
            .find(|d| leaves.iter().any(|l| l.covers(*d))))
    }
}

/// Pool members who could take `target` right now.
fn slot_eligible<'p>(pool: &'p CandidatePool, target: &SlotWithAssignments) -> Vec<&'p Candidate> {
    let interval = &target.slot.interval;
    pool.candidates
        .iter()
        .filter(|c| !c.on_leave(interval.date()))
        .filter(|c| target.assignments.iter().all(|a| a.employee_id != c.employee.id))
        .filter(|c| pool.booked_overlap(c.id(), interval, Some(&target.slot.id)).is_none())
        .collect()
}

use async_trait::async_trait;
use chrono::NaiveDate;
use shiftdesk_core::config::{RulesConfig, SuggestConfig};
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::traits::TextGenerator;
use shiftdesk_core::types::{
    AvailabilityTemplate, Employee, Interval, LeaveInterval, LeaveKind, NewSlot, Organization,
    Schedule, ScheduleSettings, Slot, parse_datetime,
};
use shiftdesk_store::ShiftDb;
use shiftdesk_suggest::{
    RejectReason, ShiftSuggestion, Strategy, SuggestConstraints, SuggestionIntegrator,
    SuggestionSource,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ORG: &str = "org-a";

/// Canned replies; remembers every prompt it was sent.
struct FakeGenerator {
    reply: std::result::Result<String, String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            delay: None,
            prompts: Mutex::default(),
        })
    }

    fn failing(msg: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(msg.to_string()),
            delay: None,
            prompts: Mutex::default(),
        })
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(ShiftdeskError::external)
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn iv(a: &str, b: &str) -> Interval {
    Interval::parse(a, b).unwrap()
}

/// e1..e4 active, e5 inactive; e3 on leave Wednesday 2024-06-12.
fn setup() -> (Arc<ShiftDb>, Schedule) {
    let db = Arc::new(ShiftDb::open(&PathBuf::from(":memory:")).unwrap());
    db.upsert_organization(&Organization {
        id: ORG.into(),
        name: "Corner Café".into(),
    })
    .unwrap();
    for (id, active) in [("e1", true), ("e2", true), ("e3", true), ("e4", true), ("e5", false)] {
        db.upsert_employee(&Employee {
            id: id.into(),
            org_id: ORG.into(),
            user_id: Some(format!("u-{id}")),
            display_name: id.to_uppercase(),
            role: None,
            default_weekly_hours: 40.0,
            availability: AvailabilityTemplate::default(),
            active,
        })
        .unwrap();
    }
    db.add_leave(
        ORG,
        &LeaveInterval {
            employee_id: "e3".into(),
            start_date: date("2024-06-12"),
            end_date: date("2024-06-12"),
            kind: LeaveKind::Personal,
            note: None,
        },
    )
    .unwrap();
    let schedule = db
        .create_schedule(ORG, date("2024-06-10"), None, ScheduleSettings::default())
        .unwrap();
    (db, schedule)
}

fn slot(db: &ShiftDb, schedule: &Schedule, start: &str, end: &str) -> Slot {
    db.create_slot(
        ORG,
        &NewSlot {
            schedule_id: schedule.id.clone(),
            interval: iv(start, end),
            position: None,
            required_count: 1,
            min_count: None,
            max_count: None,
        },
    )
    .unwrap()
}

fn integrator(db: &Arc<ShiftDb>, generator: Option<Arc<FakeGenerator>>) -> SuggestionIntegrator {
    SuggestionIntegrator::new(
        db.clone(),
        generator.map(|g| g as Arc<dyn TextGenerator>),
        &RulesConfig::default(),
        &SuggestConfig::default(),
    )
}

fn constraints() -> SuggestConstraints {
    SuggestConstraints::from_config(&SuggestConfig::default())
}

fn suggestion(employee: &str, start: &str, end: &str) -> ShiftSuggestion {
    ShiftSuggestion {
        employee_id: employee.into(),
        start_time: parse_datetime(start).unwrap(),
        end_time: parse_datetime(end).unwrap(),
        position: None,
        reason: None,
    }
}

#[tokio::test]
async fn test_draft_drops_unknown_and_on_leave_employees() {
    let (db, schedule) = setup();
    slot(&db, &schedule, "2024-06-10T09:00", "2024-06-10T17:00");
    let generator = FakeGenerator::replying(
        r#"```json
        {"suggestions": [
            {"employeeId": "e1", "startTime": "2024-06-10T09:00", "endTime": "2024-06-10T17:00", "reason": "free"},
            {"employeeId": "e3", "startTime": "2024-06-11T09:00", "endTime": "2024-06-11T17:00"},
            {"employeeId": "nobody", "startTime": "2024-06-11T09:00", "endTime": "2024-06-11T17:00"},
            {"employeeId": "e2", "startTime": "soon", "endTime": "later"}
        ], "summary": "Monday covered."}
        ```"#,
    );
    let draft = integrator(&db, Some(generator.clone()))
        .suggest(
            ORG,
            &schedule.id,
            Strategy::Custom("keep e1 on mornings".into()),
            &constraints(),
        )
        .await
        .unwrap();

    assert_eq!(draft.source, SuggestionSource::Generator("fake".into()));
    assert_eq!(draft.suggestions.len(), 1);
    assert_eq!(draft.suggestions[0].employee_id, "e1");
    assert_eq!(draft.dropped.unknown_employee, 2);
    assert_eq!(draft.dropped.invalid, 1);
    assert_eq!(draft.summary, "Monday covered.");

    // e3 has leave this week and is never offered; inactive e5 neither
    let prompt = generator.last_prompt();
    assert!(prompt.contains("- e1 (E1)"));
    assert!(!prompt.contains("- e3 (E3)"));
    assert!(!prompt.contains("- e5 (E5)"));
    assert!(prompt.contains("keep e1 on mornings"));

    // nothing was written
    let slots = db.slots_with_assignments(ORG, &schedule.id).unwrap();
    assert!(slots.iter().all(|s| s.assignments.is_empty()));
}

#[tokio::test]
async fn test_generator_failures_yield_unavailable_draft() {
    let (db, schedule) = setup();

    let none = integrator(&db, None)
        .suggest(ORG, &schedule.id, Strategy::Balanced, &constraints())
        .await
        .unwrap();
    assert_eq!(none.source, SuggestionSource::Unavailable);

    let down = integrator(&db, Some(FakeGenerator::failing("503 upstream")))
        .suggest(ORG, &schedule.id, Strategy::Balanced, &constraints())
        .await
        .unwrap();
    assert_eq!(down.source, SuggestionSource::Unavailable);
    assert!(down.suggestions.is_empty());
    assert!(down.summary.starts_with("No suggestions available"));

    let garbage = integrator(&db, Some(FakeGenerator::replying("I'd rather not.")))
        .suggest(ORG, &schedule.id, Strategy::Balanced, &constraints())
        .await
        .unwrap();
    assert_eq!(garbage.source, SuggestionSource::Unavailable);

    // unknown schedule is still a caller error
    assert!(matches!(
        integrator(&db, None)
            .suggest(ORG, "missing", Strategy::Balanced, &constraints())
            .await,
        Err(ShiftdeskError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_slow_generator_times_out() {
    let (db, schedule) = setup();
    let slow = Arc::new(FakeGenerator {
        reply: Ok(r#"{"suggestions": []}"#.into()),
        delay: Some(Duration::from_secs(5)),
        prompts: Mutex::default(),
    });
    let draft = integrator(&db, Some(slow))
        .with_timeout(Duration::from_millis(50))
        .suggest(ORG, &schedule.id, Strategy::Balanced, &constraints())
        .await
        .unwrap();
    assert_eq!(draft.source, SuggestionSource::Unavailable);
    assert!(draft.summary.contains("timed out"));
}

#[tokio::test]
async fn test_recommend_falls_back_to_least_recently_scheduled() {
    let (db, schedule) = setup();
    let prior = db
        .create_schedule(ORG, date("2024-06-03"), None, ScheduleSettings::default())
        .unwrap();
    for (employee, day) in [("e1", "07"), ("e2", "05"), ("e4", "06")] {
        db.assign_to_window(
            ORG,
            &prior.id,
            employee,
            iv(&format!("2024-06-{day}T09:00"), &format!("2024-06-{day}T17:00")),
            None,
        )
        .unwrap();
    }
    // e3 has no history but is on leave that Wednesday
    let wed = slot(&db, &schedule, "2024-06-12T09:00", "2024-06-12T17:00");

    let generator = FakeGenerator::replying("Sorry, something went wrong.");
    let rec = integrator(&db, Some(generator.clone()))
        .recommend_for_slot(ORG, &wed.id)
        .await
        .unwrap();
    assert_eq!(rec.source, SuggestionSource::Fallback);
    assert_eq!(rec.employee_id.as_deref(), Some("e2"));
    assert_eq!(rec.employee_name.as_deref(), Some("E2"));
    assert!(rec.reason.contains("2024-06-05 17:00"));
    // the generator was tried first
    assert!(generator.last_prompt().contains(&wed.id));

    // without any generator the same pick is made
    let offline = integrator(&db, None)
        .recommend_for_slot(ORG, &wed.id)
        .await
        .unwrap();
    assert_eq!(offline.employee_id.as_deref(), Some("e2"));
}

#[tokio::test]
async fn test_recommend_uses_generator_pick_when_valid() {
    let (db, schedule) = setup();
    let mon = slot(&db, &schedule, "2024-06-10T09:00", "2024-06-10T17:00");
    let generator = FakeGenerator::replying(
        r#"{"suggestions": [{"employeeId": "e4", "startTime": "2024-06-10T09:00", "endTime": "2024-06-10T17:00", "reason": "knows the till"}]}"#,
    );
    let rec = integrator(&db, Some(generator))
        .recommend_for_slot(ORG, &mon.id)
        .await
        .unwrap();
    assert_eq!(rec.source, SuggestionSource::Generator("fake".into()));
    assert_eq!(rec.employee_id.as_deref(), Some("e4"));
    assert_eq!(rec.reason, "knows the till");
}

#[tokio::test]
async fn test_apply_reports_each_rejection() {
    let (db, schedule) = setup();
    let booked = db
        .assign_to_window(ORG, &schedule.id, "e1", iv("2024-06-10T09:00", "2024-06-10T17:00"), None)
        .unwrap();

    let mut inverted = suggestion("e4", "2024-06-13T09:00", "2024-06-13T17:00");
    inverted.end_time = parse_datetime("2024-06-13T08:00").unwrap();

    let batch = vec![
        suggestion("e2", "2024-06-10T09:00", "2024-06-10T17:00"),
        suggestion("e1", "2024-06-10T12:00", "2024-06-10T20:00"),
        suggestion("e3", "2024-06-12T09:00", "2024-06-12T17:00"),
        suggestion("ghost", "2024-06-11T09:00", "2024-06-11T17:00"),
        suggestion("e2", "2024-06-20T09:00", "2024-06-20T17:00"),
        suggestion("e5", "2024-06-11T09:00", "2024-06-11T17:00"),
        inverted,
    ];
    let outcome = integrator(&db, None)
        .apply_suggestions(ORG, &schedule.id, &batch)
        .unwrap();

    assert_eq!(outcome.applied.len(), 1);
    assert_eq!(outcome.applied[0].employee_id, "e2");
    assert_eq!(outcome.applied[0].slot_id, booked.slot_id);

    let reasons: Vec<RejectReason> = outcome.rejected.iter().map(|r| r.reason.clone()).collect();
    assert_eq!(reasons.len(), 6);
    assert_eq!(
        reasons[0],
        RejectReason::Overlap {
            conflicting_slot_id: booked.slot_id.clone()
        }
    );
    assert_eq!(
        reasons[1],
        RejectReason::OnLeave {
            date: date("2024-06-12")
        }
    );
    assert_eq!(reasons[2], RejectReason::UnknownEmployee);
    assert_eq!(reasons[3], RejectReason::OutsideWeek);
    assert_eq!(reasons[4], RejectReason::Inactive);
    assert!(matches!(reasons[5], RejectReason::InvalidInterval { .. }));

    // the rejected overlap left no stray slot behind
    assert_eq!(db.slots_with_assignments(ORG, &schedule.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_auto_fill_then_apply() {
    let (db, schedule) = setup();
    let mon = slot(&db, &schedule, "2024-06-10T09:00", "2024-06-10T17:00");
    let wed = slot(&db, &schedule, "2024-06-12T09:00", "2024-06-12T17:00");
    let integrator = integrator(&db, None);

    let draft = integrator.auto_fill(ORG, &schedule.id, &constraints()).unwrap();
    assert_eq!(draft.source, SuggestionSource::AutoFill);
    let picks: Vec<(&str, String)> = draft
        .suggestions
        .iter()
        .map(|s| (s.employee_id.as_str(), s.start_time.date().to_string()))
        .collect();
    assert_eq!(
        picks,
        vec![("e1", "2024-06-10".to_string()), ("e2", "2024-06-12".to_string())]
    );

    let outcome = integrator
        .apply_suggestions(ORG, &schedule.id, &draft.suggestions)
        .unwrap();
    assert_eq!(outcome.applied.len(), 2);
    assert!(outcome.rejected.is_empty());
    assert_eq!(db.get_slot(ORG, &mon.id).unwrap().assignments.len(), 1);
    assert_eq!(db.get_slot(ORG, &wed.id).unwrap().assignments.len(), 1);

    // fully staffed now: a second pass proposes nothing
    let again = integrator.auto_fill(ORG, &schedule.id, &constraints()).unwrap();
    assert!(again.suggestions.is_empty());
}

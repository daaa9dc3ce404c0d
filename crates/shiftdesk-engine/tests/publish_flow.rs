use async_trait::async_trait;
use chrono::NaiveDate;
use shiftdesk_core::config::RulesConfig;
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::traits::{NotificationDispatcher, NotificationKind};
use shiftdesk_core::types::{
    AvailabilityTemplate, Employee, EmployeeGroup, Interval, NewSlot, Organization, Schedule,
    ScheduleSettings, ScheduleStatus, Slot,
};
use shiftdesk_engine::{AssignmentRef, ShiftEngine};
use shiftdesk_store::{NotificationStatus, ShiftDb};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const ORG: &str = "org-a";

/// Records every notice; fails for user ids listed in `fail_for`.
#[derive(Default)]
struct RecordingDispatcher {
    sent: Mutex<Vec<(String, NotificationKind)>>,
    fail_for: Vec<String>,
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        _payload: serde_json::Value,
    ) -> Result<()> {
        if self.fail_for.iter().any(|u| u == user_id) {
            return Err(ShiftdeskError::Notification("mailbox full".into()));
        }
        self.sent.lock().unwrap().push((user_id.to_string(), kind));
        Ok(())
    }
}

impl RecordingDispatcher {
    fn take(&self) -> Vec<(String, NotificationKind)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

fn setup(dispatcher: Arc<RecordingDispatcher>) -> (ShiftEngine, Schedule) {
    let db = Arc::new(ShiftDb::open(&PathBuf::from(":memory:")).unwrap());
    db.upsert_organization(&Organization {
        id: ORG.into(),
        name: "Corner Café".into(),
    })
    .unwrap();
    for (id, user) in [
        ("e1", Some("u1")),
        ("e2", Some("u2")),
        ("e3", Some("u3")),
        ("e4", Some("u4")),
        ("e5", None),
    ] {
        db.upsert_employee(&Employee {
            id: id.into(),
            org_id: ORG.into(),
            user_id: user.map(str::to_string),
            display_name: format!("Employee {id}"),
            role: None,
            default_weekly_hours: 40.0,
            availability: AvailabilityTemplate::default(),
            active: true,
        })
        .unwrap();
    }
    let engine = ShiftEngine::new(db, dispatcher, &RulesConfig::default());
    let schedule = engine
        .create_schedule(
            ORG,
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            None,
            ScheduleSettings::default(),
        )
        .unwrap();
    (engine, schedule)
}

fn slot(engine: &ShiftEngine, schedule: &Schedule, start: &str, end: &str) -> Slot {
    engine
        .create_slot(
            ORG,
            &NewSlot {
                schedule_id: schedule.id.clone(),
                interval: Interval::parse(start, end).unwrap(),
                position: None,
                required_count: 1,
                min_count: None,
                max_count: None,
            },
        )
        .unwrap()
}

#[tokio::test]
async fn test_week_example_overlap_then_move() {
    let (engine, schedule) = setup(Arc::default());
    let a = slot(&engine, &schedule, "2024-06-03T09:00", "2024-06-03T17:00");
    let b = slot(&engine, &schedule, "2024-06-03T12:00", "2024-06-03T20:00");

    engine.assign_employee(ORG, &a.id, "e1", None).unwrap();
    let err = engine.assign_employee(ORG, &b.id, "e1", None).unwrap_err();
    assert!(matches!(err, ShiftdeskError::OverlapConflict { .. }));

    let tuesday = Interval::parse("2024-06-04T09:00", "2024-06-04T17:00").unwrap();
    let moved = engine.move_slot(ORG, &b.id, tuesday, Some("e1")).unwrap();
    assert_eq!(moved.assignments[0].employee_id, "e1");
}

#[tokio::test]
async fn test_publish_twice_second_diff_is_empty() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (engine, schedule) = setup(dispatcher.clone());
    let a = slot(&engine, &schedule, "2024-06-03T09:00", "2024-06-03T17:00");
    engine.assign_employee(ORG, &a.id, "e1", None).unwrap();

    let first = engine.publish(ORG, &schedule.id).await.unwrap();
    assert_eq!(first.version, 1);
    assert!(first.diff.is_first_publish);
    assert_eq!(first.diff.summary.added_count, 1);
    assert_eq!(
        dispatcher.take(),
        vec![("u1".to_string(), NotificationKind::SchedulePublished)]
    );
    assert_eq!(
        engine.db().get_schedule(ORG, &schedule.id).unwrap().status,
        ScheduleStatus::Published
    );

    let second = engine.publish(ORG, &schedule.id).await.unwrap();
    assert_eq!(second.version, 2);
    assert!(!second.diff.is_first_publish);
    assert_eq!(second.diff.summary.added_count, 0);
    assert_eq!(second.diff.summary.removed_count, 0);
    assert_eq!(second.diff.summary.changed_count, 0);
    // nobody changed, nobody hears about it
    assert!(dispatcher.take().is_empty());
    assert!(second.notifications.affected().is_empty());
}

#[tokio::test]
async fn test_notification_minimality_on_republish() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (engine, schedule) = setup(dispatcher.clone());
    let mon = slot(&engine, &schedule, "2024-06-03T09:00", "2024-06-03T17:00");
    let tue = slot(&engine, &schedule, "2024-06-04T09:00", "2024-06-04T17:00");
    let wed = slot(&engine, &schedule, "2024-06-05T09:00", "2024-06-05T17:00");
    engine.assign_employee(ORG, &mon.id, "e1", None).unwrap();
    let e2_tue = engine.assign_employee(ORG, &tue.id, "e2", None).unwrap();
    engine.assign_employee(ORG, &wed.id, "e3", None).unwrap();
    engine.publish(ORG, &schedule.id).await.unwrap();
    dispatcher.take();

    // e2 leaves Tuesday, e4 takes it; Wednesday only shifts an hour
    engine
        .remove_assignment(ORG, &AssignmentRef::Persisted(e2_tue.id.clone()))
        .unwrap();
    engine.assign_employee(ORG, &tue.id, "e4", None).unwrap();
    let later = Interval::parse("2024-06-05T10:00", "2024-06-05T18:00").unwrap();
    engine.move_slot(ORG, &wed.id, later, None).unwrap();

    let preview = engine.publish_diff(ORG, &schedule.id).unwrap();
    assert_eq!(preview.summary.changed_count, 2);

    let outcome = engine.publish(ORG, &schedule.id).await.unwrap();
    assert_eq!(outcome.diff.summary.changed_count, 2);
    let mut users: Vec<String> = dispatcher.take().into_iter().map(|(u, _)| u).collect();
    users.sort();
    assert_eq!(users, vec!["u2".to_string(), "u4".to_string()]);
    assert!(!outcome.notifications.affected().contains("e1"));
    assert!(!outcome.notifications.affected().contains("e3"));

    let log = engine
        .db()
        .notifications_for_version(ORG, &schedule.id, 2)
        .unwrap();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|n| n.status == NotificationStatus::Sent));
}

#[tokio::test]
async fn test_delivery_failures_do_not_fail_publish() {
    let dispatcher = Arc::new(RecordingDispatcher {
        fail_for: vec!["u1".into()],
        ..Default::default()
    });
    let (engine, schedule) = setup(dispatcher.clone());
    let a = slot(&engine, &schedule, "2024-06-03T09:00", "2024-06-03T17:00");
    let b = slot(&engine, &schedule, "2024-06-04T09:00", "2024-06-04T17:00");
    let c = slot(&engine, &schedule, "2024-06-05T09:00", "2024-06-05T17:00");
    engine.assign_employee(ORG, &a.id, "e1", None).unwrap();
    engine.assign_employee(ORG, &b.id, "e2", None).unwrap();
    engine.assign_employee(ORG, &c.id, "e5", None).unwrap();

    let outcome = engine.publish(ORG, &schedule.id).await.unwrap();
    assert_eq!(outcome.notifications.notified, vec!["e2".to_string()]);
    assert_eq!(outcome.notifications.unreachable, vec!["e5".to_string()]);
    assert_eq!(outcome.notifications.failed[0].employee_id, "e1");
    assert_eq!(engine.list_versions(ORG, &schedule.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_bulk_assign_group_of_five_with_one_conflict() {
    let (engine, schedule) = setup(Arc::default());
    let early = slot(&engine, &schedule, "2024-06-06T06:00", "2024-06-06T10:00");
    engine.assign_employee(ORG, &early.id, "e4", None).unwrap();

    engine
        .db()
        .upsert_group(&EmployeeGroup {
            id: "g-floor".into(),
            org_id: ORG.into(),
            name: "Floor".into(),
            employee_ids: ["e1", "e2", "e3", "e4", "e5"].iter().map(|s| s.to_string()).collect(),
        })
        .unwrap();

    let window = Interval::parse("2024-06-06T09:00", "2024-06-06T17:00").unwrap();
    let outcome = engine
        .bulk_assign_group(ORG, &schedule.id, "g-floor", window, Some("floor"))
        .unwrap();
    assert_eq!(outcome.created, 4);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].employee_id, "e4");
}

#[tokio::test]
async fn test_conflicts_and_staffing_are_advisory() {
    let (engine, schedule) = setup(Arc::default());
    let mut slots = Vec::new();
    for day in 3..=8 {
        slots.push(slot(
            &engine,
            &schedule,
            &format!("2024-06-0{day}T08:00"),
            &format!("2024-06-0{day}T16:00"),
        ));
    }
    for s in &slots {
        engine.assign_employee(ORG, &s.id, "e1", None).unwrap();
    }
    // an empty slot is understaffed but still publishable
    let empty = slot(&engine, &schedule, "2024-06-09T08:00", "2024-06-09T12:00");

    let report = engine.analyze_conflicts(ORG, &schedule.id).unwrap();
    assert!(report.is_overtime("e1"));
    assert_eq!(report.staffing.len(), 1);
    assert_eq!(report.staffing[0].slot_id, empty.id);

    let outcome = engine.publish(ORG, &schedule.id).await.unwrap();
    assert_eq!(outcome.staffing.len(), 1);
}

#[tokio::test]
async fn test_other_tenant_sees_nothing() {
    let (engine, schedule) = setup(Arc::default());
    let a = slot(&engine, &schedule, "2024-06-03T09:00", "2024-06-03T17:00");
    assert!(matches!(
        engine.publish("org-b", &schedule.id).await,
        Err(ShiftdeskError::NotFound(_))
    ));
    assert!(matches!(
        engine.assign_employee("org-b", &a.id, "e1", None),
        Err(ShiftdeskError::NotFound(_))
    ));
    assert!(engine.list_versions(ORG, &schedule.id).unwrap().is_empty());
}

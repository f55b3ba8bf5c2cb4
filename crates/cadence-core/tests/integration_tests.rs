use std::sync::Arc;

use cadence_core::error::CoreError;
use cadence_core::models::{NewScheduleData, RecurrenceInput, ScheduleChanges, Task};
use cadence_core::recurrence::RecurrenceKind;
use cadence_core::repository::{InMemoryRepository, ScheduleRepository, TaskRepository};
use cadence_core::service::ScheduleService;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

/// Fixed reference clock for deterministic tests. 2030-01-07 is a Monday.
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 7, 8, 0, 0).unwrap()
}

fn setup() -> (ScheduleService<InMemoryRepository>, Arc<InMemoryRepository>) {
    let repository = Arc::new(InMemoryRepository::new());
    (ScheduleService::with_defaults(repository.clone()), repository)
}

/// Daily schedule anchored the morning after `now`, 30-minute slots.
fn daily_draft(owner_id: Uuid, finish_after_days: Option<i64>) -> NewScheduleData {
    let start_at = Utc.with_ymd_and_hms(2030, 1, 8, 9, 0, 0).unwrap();
    NewScheduleData {
        owner_id,
        title: "Morning review".to_string(),
        description: Some("Inbox and plan".to_string()),
        category_id: Some(Uuid::now_v7()),
        recurrence: RecurrenceInput {
            kind: RecurrenceKind::EveryDay,
            pattern: String::new(),
        },
        start_at,
        finish_at: finish_after_days.map(|d| start_at + Duration::days(d)),
        allocated_duration: Duration::minutes(30),
        previous_id: None,
    }
}

fn standalone_task(owner_id: Uuid, start_dt: DateTime<Utc>, minutes: i64) -> Task {
    Task {
        id: Uuid::now_v7(),
        owner_id,
        title: "Dentist".to_string(),
        description: None,
        start_dt,
        allocated_duration: Duration::minutes(minutes),
        finish_dt: None,
        schedule_id: None,
        sequence_number: 1,
        category_id: None,
    }
}

#[tokio::test]
async fn create_schedule_materializes_sequenced_occurrences() {
    let (service, repo) = setup();
    let owner = Uuid::now_v7();

    let schedule = service
        .create_schedule(daily_draft(owner, Some(4)), now())
        .await
        .expect("creation should succeed");

    let occurrences = repo.occurrences_of(schedule.id).await.unwrap();
    assert_eq!(occurrences.len(), 5); // Jan 8 through Jan 12 inclusive

    for (i, task) in occurrences.iter().enumerate() {
        assert_eq!(task.sequence_number, i as i32 + 1);
        assert_eq!(task.start_dt, schedule.start_at + Duration::days(i as i64));
        assert_eq!(task.owner_id, owner);
        assert_eq!(task.schedule_id, Some(schedule.id));
        assert_eq!(task.title, schedule.title);
        assert_eq!(task.category_id, schedule.category_id);
    }
}

#[tokio::test]
async fn creation_conflict_persists_nothing() {
    let (service, repo) = setup();
    let owner = Uuid::now_v7();

    // Overlaps the third would-be occurrence (Jan 10, 09:00–09:30).
    let blocker = standalone_task(
        owner,
        Utc.with_ymd_and_hms(2030, 1, 10, 9, 15, 0).unwrap(),
        30,
    );
    repo.seed_task(blocker.clone());

    let result = service.create_schedule(daily_draft(owner, Some(4)), now()).await;
    match result {
        Err(CoreError::Conflict { task_id }) => assert_eq!(task_id, blocker.id),
        other => panic!("expected conflict, got {:?}", other.map(|s| s.id)),
    }

    assert_eq!(repo.schedule_count(), 0);
    assert_eq!(repo.task_count(), 1); // only the seeded blocker
}

#[tokio::test]
async fn conflicts_ignore_other_owners() {
    let (service, repo) = setup();
    let owner = Uuid::now_v7();

    let other_owner_task = standalone_task(
        Uuid::now_v7(),
        Utc.with_ymd_and_hms(2030, 1, 10, 9, 15, 0).unwrap(),
        30,
    );
    repo.seed_task(other_owner_task);

    assert!(service
        .create_schedule(daily_draft(owner, Some(4)), now())
        .await
        .is_ok());
}

#[tokio::test]
async fn unbounded_schedule_starting_beyond_lookahead_is_created() {
    let (service, repo) = setup();
    let owner = Uuid::now_v7();

    // Anchor well past the default 90-day lookahead, no finish bound.
    let mut draft = daily_draft(owner, None);
    draft.start_at = now() + Duration::days(120);

    let schedule = service
        .create_schedule(draft, now())
        .await
        .expect("far-future unbounded schedule should be creatable");

    let occurrences = repo.occurrences_of(schedule.id).await.unwrap();
    assert!(!occurrences.is_empty());
    assert_eq!(occurrences[0].start_dt, schedule.start_at);
    assert_eq!(occurrences[0].sequence_number, 1);
}

#[tokio::test]
async fn schedule_with_no_reachable_occurrence_is_rejected() {
    let (service, repo) = setup();

    // Sequence rules never occur on the anchor; the first hit lands a
    // day out, past this 12-hour finish bound.
    let mut draft = daily_draft(Uuid::now_v7(), None);
    draft.recurrence = RecurrenceInput {
        kind: RecurrenceKind::Sequence,
        pattern: "110".to_string(),
    };
    draft.finish_at = Some(draft.start_at + Duration::hours(12));

    let result = service.create_schedule(draft, now()).await;
    assert!(matches!(result, Err(CoreError::EmptyMaterialization)));
    assert_eq!(repo.schedule_count(), 0);
}

#[tokio::test]
async fn invalid_draft_reports_all_field_errors() {
    let (service, _repo) = setup();

    let mut draft = daily_draft(Uuid::now_v7(), Some(4));
    draft.recurrence.pattern = "2".to_string();
    draft.start_at = now() - Duration::days(1);
    draft.finish_at = None;

    match service.create_schedule(draft, now()).await {
        Err(CoreError::Validation(errors)) => {
            let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
            assert_eq!(fields, vec!["pattern", "start_at"]);
        }
        other => panic!("expected validation failure, got {:?}", other.map(|s| s.id)),
    }
}

#[tokio::test]
async fn invalid_edit_reports_all_field_errors() {
    let (service, _repo) = setup();
    let schedule = service
        .create_schedule(daily_draft(Uuid::now_v7(), Some(4)), now())
        .await
        .unwrap();

    // Malformed pattern plus an oversized slot in one edit.
    let result = service
        .edit_schedule(
            schedule.id,
            ScheduleChanges {
                recurrence: Some(RecurrenceInput {
                    kind: RecurrenceKind::EveryNDay,
                    pattern: "abc".to_string(),
                }),
                allocated_duration: Some(Duration::hours(25)),
                ..Default::default()
            },
            now() + Duration::hours(1),
        )
        .await;
    match result {
        Err(CoreError::Validation(errors)) => {
            let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
            assert_eq!(fields, vec!["pattern", "allocated_duration"]);
        }
        other => panic!("expected validation failure, got {:?}", other.map(|s| s.id)),
    }
}

#[tokio::test]
async fn category_only_edit_cascades_to_every_occurrence() {
    let (service, repo) = setup();
    let owner = Uuid::now_v7();

    let schedule = service
        .create_schedule(daily_draft(owner, Some(4)), now())
        .await
        .unwrap();
    let before = repo.occurrences_of(schedule.id).await.unwrap();
    assert_eq!(before.len(), 5);

    let new_category = Some(Uuid::now_v7());
    let updated = service
        .edit_schedule(
            schedule.id,
            ScheduleChanges {
                category_id: Some(new_category),
                ..Default::default()
            },
            now() + Duration::hours(1),
        )
        .await
        .unwrap();
    assert_eq!(updated.category_id, new_category);

    let after = repo.occurrences_of(schedule.id).await.unwrap();
    assert_eq!(after.len(), 5);
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(new.category_id, new_category);
        // Untouched apart from the category.
        assert_eq!(new.start_dt, old.start_dt);
        assert_eq!(new.sequence_number, old.sequence_number);
    }
}

#[tokio::test]
async fn tightened_finish_deletes_only_trailing_occurrences() {
    let (service, repo) = setup();
    let schedule = service
        .create_schedule(daily_draft(Uuid::now_v7(), Some(4)), now())
        .await
        .unwrap();

    // Pull the finish back from Jan 12 to Jan 10.
    let new_finish = schedule.start_at + Duration::days(2);
    service
        .edit_schedule(
            schedule.id,
            ScheduleChanges {
                finish_at: Some(Some(new_finish)),
                ..Default::default()
            },
            now() + Duration::hours(1),
        )
        .await
        .unwrap();

    let remaining = repo.occurrences_of(schedule.id).await.unwrap();
    assert_eq!(remaining.len(), 3);
    assert!(remaining.iter().all(|t| t.start_dt <= new_finish));
}

#[tokio::test]
async fn extended_finish_appends_sequenced_occurrences() {
    let (service, repo) = setup();
    let schedule = service
        .create_schedule(daily_draft(Uuid::now_v7(), Some(2)), now())
        .await
        .unwrap();
    assert_eq!(repo.occurrences_of(schedule.id).await.unwrap().len(), 3);

    let new_finish = schedule.start_at + Duration::days(4);
    service
        .edit_schedule(
            schedule.id,
            ScheduleChanges {
                finish_at: Some(Some(new_finish)),
                ..Default::default()
            },
            now() + Duration::hours(1),
        )
        .await
        .unwrap();

    let occurrences = repo.occurrences_of(schedule.id).await.unwrap();
    assert_eq!(occurrences.len(), 5);
    let sequences: Vec<i32> = occurrences.iter().map(|t| t.sequence_number).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    assert_eq!(occurrences[4].start_dt, new_finish);
}

#[tokio::test]
async fn conflicting_extension_is_rejected_atomically() {
    let (service, repo) = setup();
    let owner = Uuid::now_v7();
    let schedule = service
        .create_schedule(daily_draft(owner, Some(2)), now())
        .await
        .unwrap();

    // Occupies Jan 12 09:00, inside the extension window.
    let blocker = standalone_task(
        owner,
        Utc.with_ymd_and_hms(2030, 1, 12, 9, 0, 0).unwrap(),
        45,
    );
    repo.seed_task(blocker.clone());
    let tasks_before = repo.task_count();

    let result = service
        .edit_schedule(
            schedule.id,
            ScheduleChanges {
                finish_at: Some(Some(schedule.start_at + Duration::days(4))),
                ..Default::default()
            },
            now() + Duration::hours(1),
        )
        .await;
    match result {
        Err(CoreError::Conflict { task_id }) => assert_eq!(task_id, blocker.id),
        other => panic!("expected conflict, got {:?}", other.map(|s| s.id)),
    }

    // Nothing persisted: no new tasks, schedule keeps its old finish.
    assert_eq!(repo.task_count(), tasks_before);
    let stored = repo.find_schedule_by_id(schedule.id).await.unwrap().unwrap();
    assert_eq!(stored.finish_at, schedule.finish_at);
}

#[tokio::test]
async fn recurrence_edit_with_occurrences_is_refused() {
    let (service, _repo) = setup();
    let schedule = service
        .create_schedule(daily_draft(Uuid::now_v7(), Some(4)), now())
        .await
        .unwrap();

    let result = service
        .edit_schedule(
            schedule.id,
            ScheduleChanges {
                recurrence: Some(RecurrenceInput {
                    kind: RecurrenceKind::WorkDay,
                    pattern: String::new(),
                }),
                ..Default::default()
            },
            now() + Duration::hours(1),
        )
        .await;
    assert!(matches!(result, Err(CoreError::EditRejected)));
}

#[tokio::test]
async fn recurrence_edit_without_occurrences_is_plain_update() {
    let (service, repo) = setup();
    let owner = Uuid::now_v7();

    // Insert a schedule row directly, with no materialized occurrences.
    let draft = daily_draft(owner, Some(4));
    let schedule = cadence_core::models::Schedule {
        id: Uuid::now_v7(),
        owner_id: owner,
        title: draft.title.clone(),
        description: None,
        category_id: None,
        recurrence: cadence_core::recurrence::Recurrence::EveryDay,
        start_at: draft.start_at,
        finish_at: draft.finish_at,
        allocated_duration: draft.allocated_duration,
        previous_id: None,
        created_at: now(),
        updated_at: now(),
    };
    repo.insert_schedule(schedule.clone()).await.unwrap();

    let updated = service
        .edit_schedule(
            schedule.id,
            ScheduleChanges {
                recurrence: Some(RecurrenceInput {
                    kind: RecurrenceKind::WeekEnd,
                    pattern: String::new(),
                }),
                ..Default::default()
            },
            now(),
        )
        .await
        .expect("edit of an unmaterialized schedule should pass");
    assert_eq!(
        updated.recurrence.kind(),
        RecurrenceKind::WeekEnd
    );
}

#[tokio::test]
async fn delete_preserves_started_occurrences() {
    let (service, repo) = setup();
    let schedule = service
        .create_schedule(daily_draft(Uuid::now_v7(), Some(4)), now())
        .await
        .unwrap();
    assert_eq!(repo.task_count(), 5);

    // Midday Jan 10: occurrences of Jan 8–10 have started, 11–12 have not.
    let later = Utc.with_ymd_and_hms(2030, 1, 10, 12, 0, 0).unwrap();
    service.delete_schedule(schedule.id, later).await.unwrap();

    assert_eq!(repo.schedule_count(), 0);
    assert_eq!(repo.task_count(), 3);

    let result = service
        .edit_schedule(schedule.id, ScheduleChanges::default(), later)
        .await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn preview_lists_instants_without_persisting() {
    let (service, repo) = setup();
    let draft = daily_draft(Uuid::now_v7(), None);

    let instants = service.preview_occurrences(&draft, now(), 3).unwrap();
    assert_eq!(
        instants,
        vec![
            draft.start_at,
            draft.start_at + Duration::days(1),
            draft.start_at + Duration::days(2),
        ]
    );
    assert_eq!(repo.task_count(), 0);
    assert_eq!(repo.schedule_count(), 0);
}

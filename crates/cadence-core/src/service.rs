use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::CoreError;
use crate::materialize::{first_conflict, MaterializationConfig, Materializer};
use crate::models::{NewScheduleData, Schedule, ScheduleChanges, Task};
use crate::reconcile::{classify, EditAction};
use crate::recurrence::Recurrence;
use crate::repository::{ScheduleRepository, TaskRepository};
use crate::validate::{validate_edited_schedule, validate_new_schedule};

/// ScheduleService: drives the engine over the repository seam.
///
/// Responsibilities:
/// 1. Validate schedule drafts and edits (collected field errors)
/// 2. Materialize occurrence batches and conflict-check them
/// 3. Classify edits and apply the resulting reconciliation
/// 4. Persist only on full success; a conflict or rejection leaves
///    the store untouched
///
/// The service assumes single-writer-per-schedule semantics; concurrent
/// edits of one schedule (and schedule creation per owner) must be
/// serialized by the caller, since conflict checks rely on a stable
/// snapshot of existing occurrences.
pub struct ScheduleService<R> {
    repository: Arc<R>,
    materializer: Materializer,
}

impl<R> ScheduleService<R>
where
    R: ScheduleRepository + TaskRepository,
{
    pub fn new(repository: Arc<R>, config: MaterializationConfig) -> Self {
        Self {
            repository,
            materializer: Materializer::new(config),
        }
    }

    pub fn with_defaults(repository: Arc<R>) -> Self {
        Self::new(repository, MaterializationConfig::default())
    }

    /// Creates a schedule and materializes its first occurrence batch.
    ///
    /// # Errors
    /// * [`CoreError::Validation`] - malformed draft, all violations collected
    /// * [`CoreError::EmptyMaterialization`] - the first computable
    ///   occurrence falls past the schedule's own finish date
    /// * [`CoreError::Conflict`] - an occurrence overlaps one of the
    ///   owner's existing tasks; nothing is persisted
    pub async fn create_schedule(
        &self,
        data: NewScheduleData,
        now: DateTime<Utc>,
    ) -> Result<Schedule, CoreError> {
        let errors = validate_new_schedule(&data, now);
        if !errors.is_empty() {
            return Err(CoreError::Validation(errors));
        }
        let recurrence = Recurrence::from_parts(
            data.recurrence.kind,
            &data.recurrence.pattern,
            data.start_at.date_naive(),
        )
        .map_err(|error| CoreError::Validation(vec![error]))?;

        let schedule = Schedule {
            id: Uuid::now_v7(),
            owner_id: data.owner_id,
            title: data.title,
            description: data.description,
            category_id: data.category_id,
            recurrence,
            start_at: data.start_at,
            finish_at: data.finish_at,
            allocated_duration: data.allocated_duration,
            previous_id: data.previous_id,
            created_at: now,
            updated_at: now,
        };

        // The lookahead horizon counts from the anchor when it lies in
        // the future, so a far-future unbounded schedule still gets a
        // non-empty first batch.
        let until = self.materializer.horizon(now.max(schedule.start_at));
        let tasks = self
            .materializer
            .materialize(&schedule, schedule.start_at, until, 1);
        if tasks.is_empty() {
            return Err(CoreError::EmptyMaterialization);
        }

        self.check_conflicts(&schedule, &tasks, None).await?;

        let count = tasks.len();
        self.repository.insert_schedule(schedule.clone()).await?;
        self.repository.add_tasks(tasks).await?;
        info!(schedule_id = %schedule.id, occurrences = count, "schedule created");
        Ok(schedule)
    }

    /// Applies an edit to an existing schedule.
    ///
    /// The edit is classified against the persisted schedule and
    /// dispatched: metadata update, category cascade, truncation of
    /// occurrences past a tightened finish date, extension with freshly
    /// materialized (and conflict-checked) occurrences, or rejection
    /// when `recurrence`/`start_at` change while occurrences exist.
    pub async fn edit_schedule(
        &self,
        id: Uuid,
        changes: ScheduleChanges,
        now: DateTime<Utc>,
    ) -> Result<Schedule, CoreError> {
        let previous = self
            .repository
            .find_schedule_by_id(id)
            .await?
            .ok_or(CoreError::NotFound(id))?;
        let mut changes = changes;
        let recurrence_input = changes.recurrence.take();
        let mut proposed = apply_changes(&previous, changes);

        let errors =
            validate_edited_schedule(&previous, &proposed, recurrence_input.as_ref(), now);
        if !errors.is_empty() {
            return Err(CoreError::Validation(errors));
        }
        if let Some(input) = recurrence_input {
            proposed.recurrence =
                Recurrence::from_parts(input.kind, &input.pattern, proposed.start_at.date_naive())
                    .map_err(|error| CoreError::Validation(vec![error]))?;
        }

        let existing = self.repository.occurrences_of(id).await?;
        let action = classify(&previous, &proposed, !existing.is_empty());
        debug!(schedule_id = %id, ?action, "edit classified");
        proposed.updated_at = now;

        match action {
            EditAction::MetadataOnly => {}
            EditAction::CategoryCascade => {
                self.repository
                    .set_category_for_schedule(id, proposed.category_id)
                    .await?;
            }
            EditAction::Truncate { cascade_category } => {
                if let Some(finish) = proposed.finish_at {
                    let deleted = self
                        .repository
                        .delete_occurrences_starting_after(id, finish)
                        .await?;
                    debug!(schedule_id = %id, deleted, "occurrences truncated");
                }
                if cascade_category {
                    self.repository
                        .set_category_for_schedule(id, proposed.category_id)
                        .await?;
                }
            }
            EditAction::Extend { cascade_category } => {
                self.extend_occurrences(&proposed, &existing, now).await?;
                if cascade_category {
                    self.repository
                        .set_category_for_schedule(id, proposed.category_id)
                        .await?;
                }
            }
            EditAction::Reject => return Err(CoreError::EditRejected),
        }

        self.repository.update_schedule(proposed.clone()).await?;
        Ok(proposed)
    }

    /// Deletes a schedule, cascading to its not-yet-started occurrences
    /// only; past and in-progress tasks survive as historical record.
    pub async fn delete_schedule(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.repository
            .find_schedule_by_id(id)
            .await?
            .ok_or(CoreError::NotFound(id))?;
        let deleted = self
            .repository
            .delete_occurrences_starting_after(id, now)
            .await?;
        self.repository.delete_schedule(id).await?;
        info!(schedule_id = %id, deleted, "schedule deleted");
        Ok(())
    }

    /// Computes the next `count` occurrence instants for a draft without
    /// persisting anything. Lets a UI show what a rule means before the
    /// schedule is saved.
    pub fn preview_occurrences(
        &self,
        data: &NewScheduleData,
        now: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<DateTime<Utc>>, CoreError> {
        let errors = validate_new_schedule(data, now);
        if !errors.is_empty() {
            return Err(CoreError::Validation(errors));
        }
        let recurrence = Recurrence::from_parts(
            data.recurrence.kind,
            &data.recurrence.pattern,
            data.start_at.date_naive(),
        )
        .map_err(|error| CoreError::Validation(vec![error]))?;

        let mut instants = Vec::with_capacity(count);
        let mut lower = data.start_at;
        while instants.len() < count {
            let occurrence = match recurrence.next_occurrence(data.start_at, lower) {
                Some(dt) if data.finish_at.map_or(true, |finish| dt <= finish) => dt,
                _ => break,
            };
            instants.push(occurrence);
            lower = occurrence + Duration::seconds(1);
        }
        Ok(instants)
    }

    /// Materializes trailing occurrences for an extended schedule and
    /// persists them once they clear the conflict check.
    async fn extend_occurrences(
        &self,
        proposed: &Schedule,
        existing: &[Task],
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        // Classification guarantees `existing` is non-empty here.
        let latest_start = existing
            .iter()
            .map(|t| t.start_dt)
            .max()
            .unwrap_or(proposed.start_at);
        let next_sequence = existing
            .iter()
            .map(|t| t.sequence_number)
            .max()
            .unwrap_or(0)
            + 1;

        let from = latest_start + Duration::seconds(1);
        let until = self.materializer.horizon(now);
        let tasks = self
            .materializer
            .materialize(proposed, from, until, next_sequence);
        if tasks.is_empty() {
            return Ok(());
        }

        self.check_conflicts(proposed, &tasks, Some(proposed.id))
            .await?;
        let count = tasks.len();
        self.repository.add_tasks(tasks).await?;
        info!(schedule_id = %proposed.id, occurrences = count, "schedule extended");
        Ok(())
    }

    /// Fetches the owner's existing tasks around the candidate window
    /// and fails with [`CoreError::Conflict`] on the first overlap.
    async fn check_conflicts(
        &self,
        schedule: &Schedule,
        candidates: &[Task],
        exclude_schedule: Option<Uuid>,
    ) -> Result<(), CoreError> {
        let Some(first) = candidates.first() else {
            return Ok(());
        };
        let last = candidates.last().unwrap_or(first);
        // allocated_duration is capped at 24h, so a one-day margin
        // catches existing tasks straddling the window start.
        let window_start = first.start_dt - Duration::days(1);
        let window_end = last.interval_end();

        let existing: Vec<Task> = self
            .repository
            .occurrences_belonging_to(schedule.owner_id, window_start, window_end)
            .await?
            .into_iter()
            .filter(|t| exclude_schedule.map_or(true, |id| t.schedule_id != Some(id)))
            .collect();

        match first_conflict(candidates, &existing) {
            Some(task_id) => Err(CoreError::Conflict { task_id }),
            None => Ok(()),
        }
    }
}

fn apply_changes(previous: &Schedule, changes: ScheduleChanges) -> Schedule {
    let mut proposed = previous.clone();
    if let Some(title) = changes.title {
        proposed.title = title;
    }
    if let Some(description) = changes.description {
        proposed.description = description;
    }
    if let Some(category_id) = changes.category_id {
        proposed.category_id = category_id;
    }
    if let Some(start_at) = changes.start_at {
        proposed.start_at = start_at;
    }
    if let Some(finish_at) = changes.finish_at {
        proposed.finish_at = finish_at;
    }
    if let Some(allocated) = changes.allocated_duration {
        proposed.allocated_duration = allocated;
    }
    proposed
}

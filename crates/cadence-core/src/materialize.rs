use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{Schedule, Task};

/// Policy knobs for occurrence materialization.
#[derive(Debug, Clone)]
pub struct MaterializationConfig {
    /// Horizon for schedules without a finish date, in days from "now".
    pub lookahead_days: i64,
    /// Hard cap on occurrences produced in a single batch.
    pub max_batch_size: usize,
}

impl Default for MaterializationConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 90,
            max_batch_size: 10_000,
        }
    }
}

/// Materializer: turns a schedule into concrete task occurrences.
///
/// Generation is bounded: through the schedule's `finish_at` when one is
/// set, otherwise up to the caller-supplied horizon (one batch, never
/// unbounded). Each produced task copies the schedule's template fields
/// and receives a strictly increasing sequence number.
pub struct Materializer {
    config: MaterializationConfig,
}

impl Materializer {
    pub fn new(config: MaterializationConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(MaterializationConfig::default())
    }

    pub fn config(&self) -> &MaterializationConfig {
        &self.config
    }

    /// Batch end for a schedule without a finish date.
    pub fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.config.lookahead_days)
    }

    /// Produces the ordered occurrence batch for `schedule`.
    ///
    /// # Arguments
    /// * `from` - Lower bound; the first occurrence is the earliest valid
    ///   instant at or after it
    /// * `until` - Batch bound used when the schedule has no `finish_at`
    /// * `from_sequence` - Sequence number assigned to the first produced
    ///   task; subsequent tasks count up from it
    ///
    /// An empty result is a legitimate outcome (the first computable
    /// occurrence falls past the bound), not an error; the creation path
    /// maps it to `CoreError::EmptyMaterialization`.
    pub fn materialize(
        &self,
        schedule: &Schedule,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        from_sequence: i32,
    ) -> Vec<Task> {
        let upper = schedule.finish_at.unwrap_or(until);
        let mut tasks = Vec::new();
        let mut lower = from;
        let mut sequence = from_sequence;

        while tasks.len() < self.config.max_batch_size {
            let occurrence = match schedule.recurrence.next_occurrence(schedule.start_at, lower) {
                Some(dt) if dt <= upper => dt,
                _ => break,
            };
            tasks.push(occurrence_task(schedule, occurrence, sequence));
            sequence += 1;
            lower = occurrence + Duration::seconds(1);
        }

        tasks
    }
}

fn occurrence_task(schedule: &Schedule, start_dt: DateTime<Utc>, sequence: i32) -> Task {
    Task {
        id: Uuid::now_v7(),
        owner_id: schedule.owner_id,
        title: schedule.title.clone(),
        description: schedule.description.clone(),
        start_dt,
        allocated_duration: schedule.allocated_duration,
        finish_dt: None,
        schedule_id: Some(schedule.id),
        sequence_number: sequence,
        category_id: schedule.category_id,
    }
}

/// Finds the first candidate/existing pair whose half-open intervals
/// `[start_dt, start_dt + allocated_duration)` intersect, comparing only
/// tasks of the same owner.
///
/// Deterministic order: candidates in sequence-number order, existing
/// tasks in start-time order (sorted internally, so correctness does not
/// depend on the caller's pre-filtering or ordering). Returns the id of
/// the conflicting *existing* task.
pub fn first_conflict(candidates: &[Task], existing: &[Task]) -> Option<Uuid> {
    let mut candidates: Vec<&Task> = candidates.iter().collect();
    candidates.sort_by_key(|t| t.sequence_number);
    let mut existing: Vec<&Task> = existing.iter().collect();
    existing.sort_by_key(|t| t.start_dt);

    for candidate in &candidates {
        for other in &existing {
            if candidate.owner_id == other.owner_id && candidate.overlaps(other) {
                return Some(other.id);
            }
        }
    }
    None
}

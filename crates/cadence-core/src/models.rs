use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recurrence::{Recurrence, RecurrenceKind};

/// Serializes a `chrono::Duration` as whole seconds.
pub(crate) mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        value.num_seconds().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(secs))
    }
}

/// A persisted recurrence rule owned by a user.
///
/// The schedule's `start_at` is the anchor all occurrence math is relative
/// to: the first possible occurrence is at or after it, never before, and
/// every occurrence inherits its time-of-day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(with = "uuid::serde::compact")]
    pub id: Uuid,
    #[serde(with = "uuid::serde::compact")]
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    /// Parsed recurrence rule; invalid kind/pattern combinations are
    /// unrepresentable here (see [`Recurrence::from_parts`]).
    pub recurrence: Recurrence,
    /// Anchor instant. Invariant: `finish_at`, if set, is later.
    pub start_at: DateTime<Utc>,
    /// Optional hard upper bound; no occurrence may start after it.
    pub finish_at: Option<DateTime<Utc>>,
    /// Applied to every materialized occurrence. Invariant: within [0, 24h].
    #[serde(with = "duration_secs")]
    pub allocated_duration: Duration,
    /// Weak back-reference to a prior version of this schedule.
    /// Lookup only; never traversed by the engine, no cascading semantics.
    pub previous_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A concrete, dated task instance.
///
/// Created either directly by a user (`schedule_id = None`,
/// `sequence_number = 1`) or materialized from a [`Schedule`], in which
/// case `sequence_number` is strictly increasing and unique within the
/// owning schedule. A materialized task's `schedule_id` is never
/// reassigned after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(with = "uuid::serde::compact")]
    pub id: Uuid,
    #[serde(with = "uuid::serde::compact")]
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_dt: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub allocated_duration: Duration,
    /// Set once the task has been performed.
    pub finish_dt: Option<DateTime<Utc>>,
    pub schedule_id: Option<Uuid>,
    pub sequence_number: i32,
    pub category_id: Option<Uuid>,
}

impl Task {
    /// Exclusive end of this task's occupied interval.
    pub fn interval_end(&self) -> DateTime<Utc> {
        self.start_dt + self.allocated_duration
    }

    /// Half-open interval intersection: `[start, start + duration)`.
    /// A zero-length interval occupies no time and overlaps nothing.
    pub fn overlaps(&self, other: &Task) -> bool {
        if self.allocated_duration.is_zero() || other.allocated_duration.is_zero() {
            return false;
        }
        self.start_dt < other.interval_end() && other.start_dt < self.interval_end()
    }
}

/// Raw recurrence rule as submitted by a caller: a kind tag plus the
/// pattern string whose required shape depends on the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceInput {
    pub kind: RecurrenceKind,
    pub pattern: String,
}

/// Data required to create a new schedule.
#[derive(Debug, Clone)]
pub struct NewScheduleData {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub recurrence: RecurrenceInput,
    pub start_at: DateTime<Utc>,
    pub finish_at: Option<DateTime<Utc>>,
    pub allocated_duration: Duration,
    /// Points the new schedule back at a deleted predecessor after a
    /// delete-and-recreate cycle.
    pub previous_id: Option<Uuid>,
}

/// Field changes proposed for an existing schedule.
///
/// `None` leaves a field untouched; `Some(None)` on the double-optional
/// fields clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct ScheduleChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<Uuid>>,
    pub recurrence: Option<RecurrenceInput>,
    pub start_at: Option<DateTime<Utc>>,
    pub finish_at: Option<Option<DateTime<Utc>>>,
    pub allocated_duration: Option<Duration>,
}

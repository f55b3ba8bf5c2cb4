use chrono::{DateTime, Utc};

use crate::models::Schedule;

/// Classification of a schedule edit.
///
/// Editing `recurrence` or `start_at` invalidates the sequencing and
/// conflict guarantees of already-materialized occurrences, so only
/// `finish_at`/`category_id` moves are safe to apply incrementally;
/// everything else either touches no tasks at all or is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    /// Plain field update of the schedule row; no task changes.
    MetadataOnly,
    /// Only `category_id` changed: rewrite it on every existing
    /// occurrence, then update the schedule row.
    CategoryCascade,
    /// `finish_at` moved earlier (or was newly set): delete occurrences
    /// starting after the new bound, then update the schedule row.
    Truncate { cascade_category: bool },
    /// `finish_at` moved later (or was unset): materialize trailing
    /// occurrences, conflict-check them, then update the schedule row.
    Extend { cascade_category: bool },
    /// `recurrence` or `start_at` changed while occurrences exist; the
    /// caller must delete and recreate instead.
    Reject,
}

enum FinishShift {
    Unchanged,
    Earlier,
    Later,
}

fn finish_shift(
    previous: Option<DateTime<Utc>>,
    proposed: Option<DateTime<Utc>>,
) -> FinishShift {
    match (previous, proposed) {
        (None, None) => FinishShift::Unchanged,
        // A new upper bound on a previously unbounded schedule can only
        // remove occurrences.
        (None, Some(_)) => FinishShift::Earlier,
        (Some(_), None) => FinishShift::Later,
        (Some(old), Some(new)) => {
            if new == old {
                FinishShift::Unchanged
            } else if new < old {
                FinishShift::Earlier
            } else {
                FinishShift::Later
            }
        }
    }
}

/// Classifies an edit by comparing the persisted schedule to the
/// proposed one.
///
/// With no materialized occurrences there is nothing to reconcile, so
/// any combination of changes is a plain update.
pub fn classify(previous: &Schedule, proposed: &Schedule, has_occurrences: bool) -> EditAction {
    if !has_occurrences {
        return EditAction::MetadataOnly;
    }
    if proposed.recurrence != previous.recurrence || proposed.start_at != previous.start_at {
        return EditAction::Reject;
    }

    let cascade_category = proposed.category_id != previous.category_id;
    match finish_shift(previous.finish_at, proposed.finish_at) {
        FinishShift::Unchanged if cascade_category => EditAction::CategoryCascade,
        FinishShift::Unchanged => EditAction::MetadataOnly,
        FinishShift::Earlier => EditAction::Truncate { cascade_category },
        FinishShift::Later => EditAction::Extend { cascade_category },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::Recurrence;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;
    use uuid::Uuid;

    fn base_schedule() -> Schedule {
        let start_at = Utc.with_ymd_and_hms(2030, 3, 4, 9, 0, 0).unwrap();
        Schedule {
            id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            title: "Standup".to_string(),
            description: None,
            category_id: Some(Uuid::now_v7()),
            recurrence: Recurrence::EveryDay,
            start_at,
            finish_at: Some(start_at + Duration::days(30)),
            allocated_duration: Duration::minutes(30),
            previous_id: None,
            created_at: start_at,
            updated_at: start_at,
        }
    }

    #[test]
    fn unchanged_tracked_fields_are_metadata_only() {
        let previous = base_schedule();
        let mut proposed = previous.clone();
        proposed.title = "Renamed".to_string();
        proposed.description = Some("new".to_string());
        assert_eq!(classify(&previous, &proposed, true), EditAction::MetadataOnly);
    }

    #[test]
    fn category_change_alone_cascades() {
        let previous = base_schedule();
        let mut proposed = previous.clone();
        proposed.category_id = Some(Uuid::now_v7());
        assert_eq!(classify(&previous, &proposed, true), EditAction::CategoryCascade);
    }

    #[rstest]
    #[case(Duration::days(-10), EditAction::Truncate { cascade_category: false })]
    #[case(Duration::days(10), EditAction::Extend { cascade_category: false })]
    fn finish_moves_truncate_or_extend(#[case] shift: Duration, #[case] expected: EditAction) {
        let previous = base_schedule();
        let mut proposed = previous.clone();
        proposed.finish_at = previous.finish_at.map(|f| f + shift);
        assert_eq!(classify(&previous, &proposed, true), expected);
    }

    #[test]
    fn clearing_finish_extends() {
        let previous = base_schedule();
        let mut proposed = previous.clone();
        proposed.finish_at = None;
        assert_eq!(
            classify(&previous, &proposed, true),
            EditAction::Extend { cascade_category: false }
        );
    }

    #[test]
    fn newly_set_finish_truncates() {
        let mut previous = base_schedule();
        previous.finish_at = None;
        let mut proposed = previous.clone();
        proposed.finish_at = Some(previous.start_at + Duration::days(5));
        assert_eq!(
            classify(&previous, &proposed, true),
            EditAction::Truncate { cascade_category: false }
        );
    }

    #[test]
    fn finish_move_carries_category_cascade() {
        let previous = base_schedule();
        let mut proposed = previous.clone();
        proposed.category_id = None;
        proposed.finish_at = previous.finish_at.map(|f| f + Duration::days(10));
        assert_eq!(
            classify(&previous, &proposed, true),
            EditAction::Extend { cascade_category: true }
        );
    }

    #[test]
    fn recurrence_change_with_occurrences_rejects() {
        let previous = base_schedule();
        let mut proposed = previous.clone();
        proposed.recurrence = Recurrence::WorkDay;
        assert_eq!(classify(&previous, &proposed, true), EditAction::Reject);
    }

    #[test]
    fn anchor_change_with_occurrences_rejects() {
        let previous = base_schedule();
        let mut proposed = previous.clone();
        proposed.start_at = previous.start_at + Duration::hours(1);
        assert_eq!(classify(&previous, &proposed, true), EditAction::Reject);
    }

    #[test]
    fn any_change_without_occurrences_is_metadata_only() {
        let previous = base_schedule();
        let mut proposed = previous.clone();
        proposed.recurrence = Recurrence::WeekEnd;
        proposed.start_at = previous.start_at + Duration::days(2);
        proposed.category_id = None;
        assert_eq!(classify(&previous, &proposed, false), EditAction::MetadataOnly);
    }
}

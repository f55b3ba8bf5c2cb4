use chrono::{DateTime, Duration, Utc};

use crate::error::FieldError;
use crate::models::{NewScheduleData, RecurrenceInput, Schedule};
use crate::recurrence::Recurrence;

/// Validates a schedule draft, collecting every violation in one pass.
///
/// This is the pure surface the HTTP layer maps to a 400-style response;
/// an empty result means the draft is valid. `now` is the reference
/// clock (schedule creation time); there is no hidden global clock.
pub fn validate_new_schedule(data: &NewScheduleData, now: DateTime<Utc>) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if data.title.trim().is_empty() {
        errors.push(FieldError::new("title", "title must not be empty"));
    }
    if let Err(error) = Recurrence::from_parts(
        data.recurrence.kind,
        &data.recurrence.pattern,
        data.start_at.date_naive(),
    ) {
        errors.push(error);
    }
    if data.start_at < now {
        errors.push(FieldError::new("start_at", "must not be in the past"));
    }
    if let Some(finish) = data.finish_at {
        if finish <= data.start_at {
            errors.push(FieldError::new("finish_at", "must be after start_at"));
        }
    }
    push_duration_errors(&mut errors, data.allocated_duration);

    errors
}

/// Validates a proposed edit of an existing schedule.
///
/// `recurrence` is the raw replacement rule from the edit, if any; its
/// shape errors are collected alongside the other field errors instead
/// of aborting the pass. The "not in the past" rule only applies when
/// the edit actually moves `start_at`; otherwise every metadata edit of
/// a running schedule would be rejected.
pub fn validate_edited_schedule(
    previous: &Schedule,
    proposed: &Schedule,
    recurrence: Option<&RecurrenceInput>,
    now: DateTime<Utc>,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if proposed.title.trim().is_empty() {
        errors.push(FieldError::new("title", "title must not be empty"));
    }
    if let Some(input) = recurrence {
        if let Err(error) =
            Recurrence::from_parts(input.kind, &input.pattern, proposed.start_at.date_naive())
        {
            errors.push(error);
        }
    }
    if proposed.start_at != previous.start_at && proposed.start_at < now {
        errors.push(FieldError::new("start_at", "must not be in the past"));
    }
    if let Some(finish) = proposed.finish_at {
        if finish <= proposed.start_at {
            errors.push(FieldError::new("finish_at", "must be after start_at"));
        }
    }
    push_duration_errors(&mut errors, proposed.allocated_duration);

    errors
}

fn push_duration_errors(errors: &mut Vec<FieldError>, allocated: Duration) {
    if allocated < Duration::zero() || allocated > Duration::days(1) {
        errors.push(FieldError::new(
            "allocated_duration",
            "must be between 0 seconds and 24 hours",
        ));
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// A single field-level validation failure.
///
/// Validation is collected, not short-circuited: callers receive every
/// violation found in one pass so the surrounding HTTP layer can report
/// them all at once.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{field}: {message}")]
pub struct FieldError {
    /// Name of the offending field (e.g. `"pattern"`, `"start_at"`).
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("no occurrence can be materialized before the schedule's finish date")]
    EmptyMaterialization,

    #[error("occurrence overlaps existing task {task_id}")]
    Conflict { task_id: Uuid },

    #[error(
        "edit changes the recurrence rule or anchor of a schedule with materialized occurrences; \
         delete and recreate the schedule instead"
    )]
    EditRejected,

    #[error("invalid window: from {from} is after to {to}")]
    InvalidRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("schedule not found: {0}")]
    NotFound(Uuid),
}

impl CoreError {
    /// Returns the collected field errors if this is a validation failure.
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            CoreError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

//! # Cadence Core Library
//!
//! A recurring-schedule engine: recurrence rule evaluation, occurrence
//! materialization, time-range conflict detection and edit
//! reconciliation for user-owned task schedules.
//!
//! ## Features
//!
//! - **Ten recurrence kinds**: daily, workday/weekend, annual, weekly and
//!   monthly bitmaps, fixed-period and variable-offset cycles, validated
//!   at construction so invalid patterns are unrepresentable
//! - **Deterministic occurrence math**: explicit anchor and `now`
//!   parameters everywhere, no hidden clock
//! - **Conflict detection**: half-open interval intersection across all
//!   of an owner's tasks before anything is persisted
//! - **Edit reconciliation**: a five-state classification deciding
//!   between metadata update, category cascade, truncation, extension
//!   and rejection
//! - **Narrow persistence seam**: async repository traits with an
//!   in-memory implementation; storage backends live out of tree
//!
//! ## Core Modules
//!
//! - [`models`]: schedules, task occurrences and transfer objects
//! - [`recurrence`]: the `Recurrence` sum type and occurrence calculator
//! - [`validate`]: collected, field-tagged draft validation
//! - [`materialize`]: occurrence batch generation and conflict scan
//! - [`reconcile`]: edit classification state machine
//! - [`repository`]: persistence traits and the in-memory store
//! - [`service`]: create/edit/delete/preview control flow
//! - [`error`]: error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cadence_core::{
//!     error::CoreError,
//!     models::{NewScheduleData, RecurrenceInput},
//!     recurrence::RecurrenceKind,
//!     repository::InMemoryRepository,
//!     service::ScheduleService,
//! };
//! use chrono::{Duration, Utc};
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CoreError> {
//!     let repository = Arc::new(InMemoryRepository::new());
//!     let service = ScheduleService::with_defaults(repository);
//!
//!     let now = Utc::now();
//!     let draft = NewScheduleData {
//!         owner_id: Uuid::now_v7(),
//!         title: "Daily standup".to_string(),
//!         description: None,
//!         category_id: None,
//!         recurrence: RecurrenceInput {
//!             kind: RecurrenceKind::WorkDay,
//!             pattern: String::new(),
//!         },
//!         start_at: now + Duration::hours(1),
//!         finish_at: Some(now + Duration::days(30)),
//!         allocated_duration: Duration::minutes(15),
//!         previous_id: None,
//!     };
//!
//!     let schedule = service.create_schedule(draft, now).await?;
//!     println!("Created schedule: {}", schedule.title);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod materialize;
pub mod models;
pub mod reconcile;
pub mod recurrence;
pub mod repository;
pub mod service;
pub mod validate;

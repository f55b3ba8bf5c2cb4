use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Schedule, Task};

/// Domain-specific trait for schedule persistence.
///
/// The engine itself is computation-only; these traits are the narrow
/// contract through which the surrounding service layer loads snapshots
/// and persists engine output. `previous_id` chaining is stored as-is
/// and resolved here on demand, never traversed by the engine.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn find_schedule_by_id(&self, id: Uuid) -> Result<Option<Schedule>, CoreError>;
    async fn insert_schedule(&self, schedule: Schedule) -> Result<(), CoreError>;
    async fn update_schedule(&self, schedule: Schedule) -> Result<(), CoreError>;
    async fn delete_schedule(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for task occurrence persistence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// All of an owner's tasks whose occupied interval intersects
    /// `[from, to)`, regardless of which schedule (if any) owns them.
    async fn occurrences_belonging_to(
        &self,
        owner_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Task>, CoreError>;

    /// Every materialized occurrence of one schedule.
    async fn occurrences_of(&self, schedule_id: Uuid) -> Result<Vec<Task>, CoreError>;

    async fn add_tasks(&self, tasks: Vec<Task>) -> Result<(), CoreError>;

    /// Rewrites `category_id` on every occurrence of a schedule.
    /// Returns the number of rows touched.
    async fn set_category_for_schedule(
        &self,
        schedule_id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<usize, CoreError>;

    /// Deletes occurrences of a schedule with `start_dt > after`.
    /// Returns the number of rows deleted.
    async fn delete_occurrences_starting_after(
        &self,
        schedule_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<usize, CoreError>;
}

#[derive(Default)]
struct StoreState {
    schedules: HashMap<Uuid, Schedule>,
    tasks: HashMap<Uuid, Task>,
}

/// In-memory repository backing the service layer in tests and embedded
/// use. A relational backend implements the same traits out of tree.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<StoreState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of a single task, for assertions.
    pub fn task(&self, id: Uuid) -> Option<Task> {
        self.state().tasks.get(&id).cloned()
    }

    /// Number of stored tasks, for assertions.
    pub fn task_count(&self) -> usize {
        self.state().tasks.len()
    }

    /// Number of stored schedules, for assertions.
    pub fn schedule_count(&self) -> usize {
        self.state().schedules.len()
    }

    /// Inserts a task directly, bypassing the engine. Used to seed
    /// pre-existing (including non-recurring) tasks.
    pub fn seed_task(&self, task: Task) {
        self.state().tasks.insert(task.id, task);
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryRepository {
    async fn find_schedule_by_id(&self, id: Uuid) -> Result<Option<Schedule>, CoreError> {
        Ok(self.state().schedules.get(&id).cloned())
    }

    async fn insert_schedule(&self, schedule: Schedule) -> Result<(), CoreError> {
        self.state().schedules.insert(schedule.id, schedule);
        Ok(())
    }

    async fn update_schedule(&self, schedule: Schedule) -> Result<(), CoreError> {
        let mut state = self.state();
        if !state.schedules.contains_key(&schedule.id) {
            return Err(CoreError::NotFound(schedule.id));
        }
        state.schedules.insert(schedule.id, schedule);
        Ok(())
    }

    async fn delete_schedule(&self, id: Uuid) -> Result<(), CoreError> {
        if self.state().schedules.remove(&id).is_none() {
            return Err(CoreError::NotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for InMemoryRepository {
    async fn occurrences_belonging_to(
        &self,
        owner_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Task>, CoreError> {
        let mut tasks: Vec<Task> = self
            .state()
            .tasks
            .values()
            .filter(|t| t.owner_id == owner_id && t.start_dt < to && t.interval_end() > from)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.start_dt);
        Ok(tasks)
    }

    async fn occurrences_of(&self, schedule_id: Uuid) -> Result<Vec<Task>, CoreError> {
        let mut tasks: Vec<Task> = self
            .state()
            .tasks
            .values()
            .filter(|t| t.schedule_id == Some(schedule_id))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.sequence_number);
        Ok(tasks)
    }

    async fn add_tasks(&self, tasks: Vec<Task>) -> Result<(), CoreError> {
        let mut state = self.state();
        for task in tasks {
            state.tasks.insert(task.id, task);
        }
        Ok(())
    }

    async fn set_category_for_schedule(
        &self,
        schedule_id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<usize, CoreError> {
        let mut touched = 0;
        for task in self.state().tasks.values_mut() {
            if task.schedule_id == Some(schedule_id) {
                task.category_id = category_id;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn delete_occurrences_starting_after(
        &self,
        schedule_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<usize, CoreError> {
        let mut state = self.state();
        let before = state.tasks.len();
        state
            .tasks
            .retain(|_, t| !(t.schedule_id == Some(schedule_id) && t.start_dt > after));
        Ok(before - state.tasks.len())
    }
}

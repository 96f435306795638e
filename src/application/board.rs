use crate::application::error::CoreError;
use crate::application::retry::{with_retry, RetryPolicy};
use crate::domain::error::ValidationError;
use crate::domain::models::{Task, TaskPatch, TaskStatus};
use crate::domain::time_slot::{falls_on_any, week_dates};
use crate::infrastructure::task_store::TaskStore;
use chrono::NaiveDate;

/// The caller-owned, in-memory view of the task list. Services update it
/// optimistically and restore the previous task when a write fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskBoard {
    tasks: Vec<Task>,
}

impl TaskBoard {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    /// Swaps in `task` at the position of the task with the same id and
    /// returns what was there.
    pub fn replace(&mut self, task: Task) -> Option<Task> {
        let slot = self.tasks.iter_mut().find(|existing| existing.id == task.id)?;
        Some(std::mem::replace(slot, task))
    }

    /// New tasks go to the front, matching the newest-first listing.
    pub fn insert(&mut self, task: Task) {
        if self.get(&task.id).is_some() {
            self.replace(task);
        } else {
            self.tasks.insert(0, task);
        }
    }

    pub fn remove(&mut self, task_id: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|task| task.id == task_id)?;
        Some(self.tasks.remove(index))
    }

    pub fn column(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|task| task.status == status).collect()
    }

    pub fn unscheduled(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|task| !task.is_scheduled).collect()
    }

    /// Scheduled tasks whose wall-clock start falls in the Sunday-started
    /// week containing `date`.
    pub fn scheduled_in_week(&self, date: NaiveDate) -> Vec<&Task> {
        let week = week_dates(date);
        self.tasks
            .iter()
            .filter(|task| task.is_scheduled)
            .filter(|task| {
                task.start_time
                    .as_deref()
                    .map(|start_time| falls_on_any(start_time, &week))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub(crate) fn require(&self, task_id: &str) -> Result<Task, CoreError> {
        self.get(task_id)
            .cloned()
            .ok_or_else(|| ValidationError::TaskNotFound(task_id.to_string()).into())
    }
}

/// Applies `speculative` to the board, persists `patch`, and keeps the
/// store's copy on success. On failure the board gets `original` back and the
/// store error is returned.
pub(crate) async fn commit_optimistic<S>(
    store: &S,
    retry_policy: &RetryPolicy,
    board: &mut TaskBoard,
    original: Task,
    speculative: Task,
    patch: &TaskPatch,
    operation: &'static str,
) -> Result<Task, CoreError>
where
    S: TaskStore + ?Sized,
{
    let task_id = original.id.clone();
    board.replace(speculative);

    let persisted = with_retry(retry_policy, operation, || store.update_task(&task_id, patch)).await;
    match persisted {
        Ok(saved) => {
            tracing::info!(operation, task_id = %task_id, "task update persisted");
            board.replace(saved.clone());
            Ok(saved)
        }
        Err(error) => {
            tracing::error!(operation, task_id = %task_id, %error, "task update failed; reverting");
            board.replace(original);
            Err(CoreError::Persistence(error))
        }
    }
}

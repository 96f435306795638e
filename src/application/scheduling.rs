use crate::application::board::{commit_optimistic, TaskBoard};
use crate::application::error::CoreError;
use crate::application::retry::RetryPolicy;
use crate::domain::models::{validate_duration, Task, TaskPatch};
use crate::domain::time_slot::Slot;
use crate::infrastructure::task_store::TaskStore;
use chrono::NaiveDate;
use std::sync::Arc;

/// The task as it looks once placed in `slot`. The duration is kept, or
/// defaulted when the task never had one.
pub fn assign_slot(task: &Task, slot: Slot) -> Task {
    let mut scheduled = task.clone();
    scheduled.start_time = Some(slot.encode());
    scheduled.is_scheduled = true;
    scheduled.duration_minutes = Some(task.effective_duration_minutes());
    scheduled
}

/// Places board tasks on the calendar and persists the result. Every command
/// validates before touching the board, and a failed write leaves the board
/// exactly as it was.
pub struct ScheduleService<S>
where
    S: TaskStore,
{
    store: Arc<S>,
    retry_policy: RetryPolicy,
}

impl<S> ScheduleService<S>
where
    S: TaskStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub async fn assign(
        &self,
        board: &mut TaskBoard,
        task_id: &str,
        date: NaiveDate,
        hour: u32,
    ) -> Result<Task, CoreError> {
        let slot = Slot::new(date, hour)?;
        self.assign_to_slot(board, task_id, slot).await
    }

    /// Same as `assign`, addressed by a calendar cell key such as `2024-03-10-14`.
    pub async fn assign_slot_key(
        &self,
        board: &mut TaskBoard,
        task_id: &str,
        slot_key: &str,
    ) -> Result<Task, CoreError> {
        let slot = Slot::parse_key(slot_key)?;
        self.assign_to_slot(board, task_id, slot).await
    }

    pub async fn assign_to_slot(
        &self,
        board: &mut TaskBoard,
        task_id: &str,
        slot: Slot,
    ) -> Result<Task, CoreError> {
        let original = board.require(task_id)?;
        let scheduled = assign_slot(&original, slot);
        validate_duration(scheduled.duration_minutes)?;
        let patch = TaskPatch::schedule(slot.encode(), scheduled.effective_duration_minutes());

        tracing::debug!(task_id, slot = %slot.key(), "assigning task to slot");
        commit_optimistic(
            self.store.as_ref(),
            &self.retry_policy,
            board,
            original,
            scheduled,
            &patch,
            "assign_slot",
        )
        .await
    }

    pub async fn resize(
        &self,
        board: &mut TaskBoard,
        task_id: &str,
        duration_minutes: u32,
    ) -> Result<Task, CoreError> {
        validate_duration(Some(duration_minutes))?;
        let original = board.require(task_id)?;
        if original.duration_minutes == Some(duration_minutes) {
            return Ok(original);
        }

        let mut resized = original.clone();
        resized.duration_minutes = Some(duration_minutes);
        let patch = TaskPatch {
            duration_minutes: Some(duration_minutes),
            ..TaskPatch::default()
        };
        commit_optimistic(
            self.store.as_ref(),
            &self.retry_policy,
            board,
            original,
            resized,
            &patch,
            "resize",
        )
        .await
    }

    pub async fn unschedule(&self, board: &mut TaskBoard, task_id: &str) -> Result<Task, CoreError> {
        let original = board.require(task_id)?;
        if !original.is_scheduled && original.start_time.is_none() {
            return Ok(original);
        }

        let mut cleared = original.clone();
        cleared.is_scheduled = false;
        cleared.start_time = None;
        commit_optimistic(
            self.store.as_ref(),
            &self.retry_policy,
            board,
            original,
            cleared,
            &TaskPatch::unschedule(),
            "unschedule",
        )
        .await
    }
}

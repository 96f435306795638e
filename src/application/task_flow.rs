use crate::application::board::{commit_optimistic, TaskBoard};
use crate::application::error::CoreError;
use crate::application::retry::{with_retry, RetryPolicy};
use crate::domain::error::ValidationError;
use crate::domain::history::{timeline, TimelineItem};
use crate::domain::models::{NewTask, Task, TaskPatch, TaskStatus};
use crate::infrastructure::snapshot_store::SnapshotStore;
use crate::infrastructure::task_store::TaskStore;
use std::sync::Arc;

/// Where a loaded board came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardSource {
    Primary,
    Snapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedBoard {
    pub board: TaskBoard,
    pub source: BoardSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Unchanged(Task),
    Moved(Task),
}

impl MoveOutcome {
    pub fn task(&self) -> &Task {
        match self {
            Self::Unchanged(task) | Self::Moved(task) => task,
        }
    }
}

/// Kanban lifecycle commands: loading the board, creating, moving, completing
/// and deleting tasks, and reading a task's status timeline.
pub struct TaskFlowService<S, F>
where
    S: TaskStore,
    F: SnapshotStore,
{
    store: Arc<S>,
    snapshot: Arc<F>,
    retry_policy: RetryPolicy,
}

impl<S, F> TaskFlowService<S, F>
where
    S: TaskStore,
    F: SnapshotStore,
{
    pub fn new(store: Arc<S>, snapshot: Arc<F>) -> Self {
        Self {
            store,
            snapshot,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Reads the primary store and refreshes the snapshot. When the primary
    /// read fails the snapshot is served instead; the two are never merged.
    pub async fn load_board(&self) -> Result<LoadedBoard, CoreError> {
        let primary = with_retry(&self.retry_policy, "list_tasks", || self.store.list_tasks()).await;

        match primary {
            Ok(tasks) => {
                tracing::info!(task_count = tasks.len(), "loaded tasks from primary store");
                self.refresh_snapshot(&tasks);
                Ok(LoadedBoard {
                    board: TaskBoard::new(tasks),
                    source: BoardSource::Primary,
                })
            }
            Err(error) => match self.snapshot.read_all() {
                Ok(Some(tasks)) => {
                    tracing::warn!(%error, task_count = tasks.len(), "primary store unavailable; serving snapshot");
                    Ok(LoadedBoard {
                        board: TaskBoard::new(tasks),
                        source: BoardSource::Snapshot,
                    })
                }
                Ok(None) => {
                    tracing::error!(%error, "primary store unavailable and no snapshot exists");
                    Err(CoreError::Persistence(error))
                }
                Err(snapshot_error) => {
                    tracing::error!(%error, %snapshot_error, "primary store and snapshot both unreadable");
                    Err(CoreError::Persistence(error))
                }
            },
        }
    }

    pub async fn create_task(&self, board: &mut TaskBoard, task: NewTask) -> Result<Task, CoreError> {
        let task = task.normalized()?;
        let created = self.store.insert_task(&task).await.map_err(|error| {
            tracing::error!(title = %task.title, %error, "task insert failed");
            CoreError::Persistence(error)
        })?;

        tracing::info!(task_id = %created.id, status = %created.status, "task created");
        board.insert(created.clone());
        self.refresh_snapshot(board.tasks());
        Ok(created)
    }

    /// Moves a task to another column. The store appends the history entry.
    pub async fn move_status(
        &self,
        board: &mut TaskBoard,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<MoveOutcome, CoreError> {
        let original = board.require(task_id)?;
        if original.status == status {
            return Ok(MoveOutcome::Unchanged(original));
        }

        let mut moved = original.clone();
        moved.status = status;
        tracing::debug!(task_id, from = %original.status, to = %status, "moving task");
        let saved = commit_optimistic(
            self.store.as_ref(),
            &self.retry_policy,
            board,
            original,
            moved,
            &TaskPatch::status(status),
            "move_status",
        )
        .await?;
        self.refresh_snapshot(board.tasks());
        Ok(MoveOutcome::Moved(saved))
    }

    /// Flips the `completed` checkbox. Independent of the status column.
    pub async fn set_completed(
        &self,
        board: &mut TaskBoard,
        task_id: &str,
        completed: bool,
    ) -> Result<Task, CoreError> {
        let original = board.require(task_id)?;
        if original.completed == completed {
            return Ok(original);
        }

        let mut toggled = original.clone();
        toggled.completed = completed;
        let patch = TaskPatch {
            completed: Some(completed),
            ..TaskPatch::default()
        };
        let saved = commit_optimistic(
            self.store.as_ref(),
            &self.retry_policy,
            board,
            original,
            toggled,
            &patch,
            "set_completed",
        )
        .await?;
        self.refresh_snapshot(board.tasks());
        Ok(saved)
    }

    /// Deletes in the store first; the board only drops the task once the
    /// delete succeeded.
    pub async fn delete_task(&self, board: &mut TaskBoard, task_id: &str) -> Result<Task, CoreError> {
        if task_id.trim().is_empty() {
            return Err(ValidationError::EmptyId("task_id").into());
        }
        let existing = board.require(task_id)?;

        with_retry(&self.retry_policy, "delete_task", || self.store.delete_task(task_id))
            .await
            .map_err(|error| {
                tracing::error!(task_id, %error, "task delete failed");
                CoreError::Persistence(error)
            })?;

        board.remove(task_id);
        tracing::info!(task_id, "task deleted");
        self.refresh_snapshot(board.tasks());
        Ok(existing)
    }

    /// The task's transitions, oldest first, with display names and the time
    /// spent in the status each one left.
    pub async fn timeline(&self, task_id: &str) -> Result<Vec<TimelineItem>, CoreError> {
        if task_id.trim().is_empty() {
            return Err(ValidationError::EmptyId("task_id").into());
        }
        let entries = with_retry(&self.retry_policy, "list_status_history", || {
            self.store.list_status_history(Some(task_id))
        })
        .await?;
        Ok(timeline(&entries, task_id))
    }

    fn refresh_snapshot(&self, tasks: &[Task]) {
        if let Err(error) = self.snapshot.write_all(tasks) {
            tracing::warn!(%error, "failed to refresh task snapshot");
        }
    }
}

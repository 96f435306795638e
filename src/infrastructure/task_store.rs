use crate::domain::models::{NewTask, StatusHistoryEntry, Tag, Task, TaskPatch};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;

/// The durable store the board is backed by.
///
/// The store is authoritative. It appends a `StatusHistoryEntry` whenever a
/// task's status is set, including the initial status on insert, and never
/// rewrites history.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, InfraError>;

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, InfraError>;

    async fn insert_task(&self, task: &NewTask) -> Result<Task, InfraError>;

    async fn delete_task(&self, task_id: &str) -> Result<(), InfraError>;

    /// Ordered by `changed_at`, oldest first.
    async fn list_status_history(
        &self,
        task_id: Option<&str>,
    ) -> Result<Vec<StatusHistoryEntry>, InfraError>;

    async fn list_tags(&self) -> Result<Vec<Tag>, InfraError>;
}

use crate::domain::history::next_entry;
use crate::domain::models::{NewTask, StatusHistoryEntry, Tag, Task, TaskPatch};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::task_store::TaskStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Default)]
struct MemoryState {
    tasks: Vec<Task>,
    history: Vec<StatusHistoryEntry>,
    tags: Vec<Tag>,
    next_task_id: u64,
    next_entry_id: u64,
}

impl MemoryState {
    fn record_status(&mut self, task: &Task, changed_at: DateTime<Utc>) {
        self.next_entry_id += 1;
        let previous = self
            .history
            .iter()
            .filter(|entry| entry.task_id == task.id)
            .max_by_key(|entry| entry.changed_at);
        let entry = next_entry(
            self.next_entry_id.to_string(),
            task.id.clone(),
            previous,
            task.status,
            changed_at,
        );
        self.history.push(entry);
    }
}

/// Store kept in process memory. Emulates the history trigger of the remote
/// store so lifecycle analytics work offline and in tests.
pub struct InMemoryTaskStore {
    state: Mutex<MemoryState>,
    now_provider: NowProvider,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            now_provider: Arc::new(Utc::now),
        }
    }
}

impl InMemoryTaskStore {
    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn with_tags(self, tags: Vec<Tag>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.tags = tags;
        }
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("task store lock poisoned: {error}")))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list_tasks(&self) -> Result<Vec<Task>, InfraError> {
        let state = self.lock()?;
        let mut tasks = state.tasks.clone();
        tasks.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(tasks)
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, InfraError> {
        let now = (self.now_provider)();
        let mut state = self.lock()?;
        let Some(index) = state.tasks.iter().position(|task| task.id == task_id) else {
            return Err(InfraError::NotFound(format!("task {task_id}")));
        };

        let previous_status = state.tasks[index].status;
        let updated = patch.apply_to(&state.tasks[index]);
        state.tasks[index] = updated.clone();
        if updated.status != previous_status {
            state.record_status(&updated, now);
        }
        Ok(updated)
    }

    async fn insert_task(&self, task: &NewTask) -> Result<Task, InfraError> {
        let now = (self.now_provider)();
        let mut state = self.lock()?;
        state.next_task_id += 1;
        let created = task.clone().into_task(state.next_task_id.to_string(), now);
        state.tasks.push(created.clone());
        state.record_status(&created, now);
        Ok(created)
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), InfraError> {
        let mut state = self.lock()?;
        let before = state.tasks.len();
        state.tasks.retain(|task| task.id != task_id);
        if state.tasks.len() == before {
            return Err(InfraError::NotFound(format!("task {task_id}")));
        }
        Ok(())
    }

    async fn list_status_history(
        &self,
        task_id: Option<&str>,
    ) -> Result<Vec<StatusHistoryEntry>, InfraError> {
        let state = self.lock()?;
        let mut entries = state
            .history
            .iter()
            .filter(|entry| task_id.map(|id| entry.task_id == id).unwrap_or(true))
            .cloned()
            .collect::<Vec<_>>();
        entries.sort_by(|left, right| left.changed_at.cmp(&right.changed_at));
        Ok(entries)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, InfraError> {
        let state = self.lock()?;
        Ok(state.tags.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::validate_chain;
    use crate::domain::models::TaskStatus;
    use chrono::Duration;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-10T08:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn clock() -> (Arc<Mutex<DateTime<Utc>>>, NowProvider) {
        let current = Arc::new(Mutex::new(fixed_time()));
        let reader = Arc::clone(&current);
        let provider: NowProvider = Arc::new(move || *reader.lock().expect("clock lock"));
        (current, provider)
    }

    #[tokio::test]
    async fn insert_records_creation_entry() {
        let store = InMemoryTaskStore::default();
        let created = store
            .insert_task(&NewTask::new("Write report"))
            .await
            .expect("insert task");

        assert_eq!(created.status, TaskStatus::Backlog);
        let history = store
            .list_status_history(Some(&created.id))
            .await
            .expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_status, None);
        assert_eq!(history[0].to_status, TaskStatus::Backlog);
    }

    #[tokio::test]
    async fn status_change_appends_entry_with_elapsed_time() {
        let (current, provider) = clock();
        let store = InMemoryTaskStore::default().with_now_provider(provider);
        let created = store
            .insert_task(&NewTask::new("Write report"))
            .await
            .expect("insert task");

        *current.lock().expect("clock lock") = fixed_time() + Duration::hours(2);
        store
            .update_task(&created.id, &TaskPatch::status(TaskStatus::InProgress))
            .await
            .expect("move task");
        store
            .update_task(
                &created.id,
                &TaskPatch {
                    title: Some("Write the report".to_string()),
                    ..TaskPatch::default()
                },
            )
            .await
            .expect("rename task");

        let history = store.list_status_history(None).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].from_status, Some(TaskStatus::Backlog));
        assert_eq!(history[1].to_status, TaskStatus::InProgress);
        assert_eq!(history[1].duration_in_previous_status.as_deref(), Some("02:00:00"));
        assert_eq!(validate_chain(&history), Ok(()));
    }

    #[tokio::test]
    async fn missing_tasks_are_reported() {
        let store = InMemoryTaskStore::default();
        assert!(matches!(
            store.update_task("404", &TaskPatch::status(TaskStatus::Done)).await,
            Err(InfraError::NotFound(_))
        ));
        assert!(matches!(store.delete_task("404").await, Err(InfraError::NotFound(_))));
    }

    #[tokio::test]
    async fn tasks_are_listed_newest_first() {
        let (current, provider) = clock();
        let store = InMemoryTaskStore::default().with_now_provider(provider);
        store.insert_task(&NewTask::new("first")).await.expect("insert");
        *current.lock().expect("clock lock") = fixed_time() + Duration::minutes(5);
        store.insert_task(&NewTask::new("second")).await.expect("insert");

        let titles = store
            .list_tasks()
            .await
            .expect("list")
            .into_iter()
            .map(|task| task.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["second".to_string(), "first".to_string()]);
    }
}

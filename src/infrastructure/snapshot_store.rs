use crate::domain::models::Task;
use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Last known-good copy of the task list, read only when the primary store
/// cannot be reached. Writes replace the whole snapshot.
pub trait SnapshotStore: Send + Sync {
    /// `None` when no snapshot has ever been written.
    fn read_all(&self) -> Result<Option<Vec<Task>>, InfraError>;
    fn write_all(&self, tasks: &[Task]) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSnapshotStore {
    db_path: PathBuf,
}

impl SqliteSnapshotStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn read_all(&self) -> Result<Option<Vec<Task>>, InfraError> {
        let connection = self.connect()?;
        let written: Option<String> = connection
            .query_row("SELECT written_at FROM snapshot_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        if written.is_none() {
            return Ok(None);
        }

        let mut statement =
            connection.prepare("SELECT payload FROM task_snapshot ORDER BY position ASC")?;
        let payloads = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let tasks = payloads
            .iter()
            .map(|payload| serde_json::from_str::<Task>(payload))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(tasks))
    }

    fn write_all(&self, tasks: &[Task]) -> Result<(), InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        transaction.execute("DELETE FROM task_snapshot", [])?;
        for (position, task) in tasks.iter().enumerate() {
            let payload = serde_json::to_string(task)?;
            transaction.execute(
                "INSERT INTO task_snapshot (id, position, payload) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                   position = excluded.position,
                   payload = excluded.payload",
                params![task.id, position as i64, payload],
            )?;
        }
        transaction.execute(
            "INSERT INTO snapshot_state (id, written_at, task_count)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
               written_at = excluded.written_at,
               task_count = excluded.task_count",
            params![Utc::now().to_rfc3339(), tasks.len() as i64],
        )?;
        transaction.commit()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    state: Mutex<Option<Vec<Task>>>,
}

impl SnapshotStore for InMemorySnapshotStore {
    fn read_all(&self) -> Result<Option<Vec<Task>>, InfraError> {
        let state = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("snapshot lock poisoned: {error}")))?;
        Ok(state.clone())
    }

    fn write_all(&self, tasks: &[Task]) -> Result<(), InfraError> {
        let mut state = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("snapshot lock poisoned: {error}")))?;
        *state = Some(tasks.to_vec());
        Ok(())
    }
}

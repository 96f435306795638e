use crate::application::analytics::AnalyticsService;
use crate::application::bootstrap::bootstrap_workspace;
use crate::application::scheduling::ScheduleService;
use crate::application::task_flow::TaskFlowService;
use crate::domain::models::{NewTask, StatusHistoryEntry, Tag, Task, TaskPatch};
use crate::infrastructure::config::{
    read_app_settings, read_store_settings, save_timezone, AppSettings, StoreSettings,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::logging::{init_logging, LOG_FILTER_ENV};
use crate::infrastructure::memory_task_store::InMemoryTaskStore;
use crate::infrastructure::rest_task_store::{RemoteStoreConfig, ReqwestTaskStore};
use crate::infrastructure::snapshot_store::SqliteSnapshotStore;
use crate::infrastructure::task_store::TaskStore;
use async_trait::async_trait;
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const STORE_URL_KEYS: [&str; 2] = ["TASKFLOW_STORE_URL", "SUPABASE_URL"];
const STORE_KEY_KEYS: [&str; 2] = ["TASKFLOW_STORE_KEY", "SUPABASE_ANON_KEY"];

/// The store selected at startup.
pub enum TaskBackend {
    Remote(ReqwestTaskStore),
    Memory(InMemoryTaskStore),
}

impl TaskBackend {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    fn as_store(&self) -> &dyn TaskStore {
        match self {
            Self::Remote(store) => store,
            Self::Memory(store) => store,
        }
    }
}

#[async_trait]
impl TaskStore for TaskBackend {
    async fn list_tasks(&self) -> Result<Vec<Task>, InfraError> {
        self.as_store().list_tasks().await
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, InfraError> {
        self.as_store().update_task(task_id, patch).await
    }

    async fn insert_task(&self, task: &NewTask) -> Result<Task, InfraError> {
        self.as_store().insert_task(task).await
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), InfraError> {
        self.as_store().delete_task(task_id).await
    }

    async fn list_status_history(
        &self,
        task_id: Option<&str>,
    ) -> Result<Vec<StatusHistoryEntry>, InfraError> {
        self.as_store().list_status_history(task_id).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, InfraError> {
        self.as_store().list_tags().await
    }
}

/// Workspace wiring: config, logging, the task store and the snapshot
/// fallback, plus constructors for the services that use them.
pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    settings: AppSettings,
    store: Arc<TaskBackend>,
    snapshot: Arc<SqliteSnapshotStore>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::with_lookup(workspace_root, |key| std::env::var(key).ok())
    }

    pub fn with_lookup<F>(workspace_root: PathBuf, lookup: F) -> Result<Self, InfraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        init_logging(&bootstrap.logs_dir, lookup(LOG_FILTER_ENV).as_deref())?;

        let settings = read_app_settings(&bootstrap.config_dir)?;
        let store_settings = read_store_settings(&bootstrap.config_dir)?;
        let store = match load_remote_store_config_from_lookup(&store_settings, &lookup)? {
            Some(config) => {
                tracing::info!(base_url = %config.base_url, "using remote task store");
                TaskBackend::Remote(ReqwestTaskStore::new(config)?)
            }
            None => {
                tracing::info!("no store url configured; using in-memory task store");
                TaskBackend::Memory(InMemoryTaskStore::default())
            }
        };

        Ok(Self {
            config_dir: bootstrap.config_dir,
            snapshot: Arc::new(SqliteSnapshotStore::new(&bootstrap.database_path)),
            database_path: bootstrap.database_path,
            settings,
            store: Arc::new(store),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Persists the zone to `app.json`; services built afterwards use it.
    pub fn set_time_zone(&mut self, time_zone: Tz) -> Result<(), InfraError> {
        save_timezone(&self.config_dir, time_zone)?;
        tracing::info!(time_zone = time_zone.name(), "time zone updated");
        self.settings.time_zone = time_zone;
        Ok(())
    }

    pub fn store(&self) -> Arc<TaskBackend> {
        Arc::clone(&self.store)
    }

    pub fn task_flow(&self) -> TaskFlowService<TaskBackend, SqliteSnapshotStore> {
        TaskFlowService::new(Arc::clone(&self.store), Arc::clone(&self.snapshot))
    }

    pub fn scheduling(&self) -> ScheduleService<TaskBackend> {
        ScheduleService::new(Arc::clone(&self.store))
    }

    pub fn analytics(&self) -> AnalyticsService<TaskBackend> {
        AnalyticsService::new(Arc::clone(&self.store), self.settings.time_zone)
            .with_sample_policy(self.settings.sample_policy)
            .with_default_window(self.settings.report_window)
    }
}

fn load_remote_store_config_from_lookup<F>(
    settings: &StoreSettings,
    lookup: &F,
) -> Result<Option<RemoteStoreConfig>, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(base_url) =
        optional_lookup_value(lookup, &STORE_URL_KEYS).or_else(|| settings.base_url.clone())
    else {
        return Ok(None);
    };
    let api_key = required_lookup_value(lookup, &STORE_KEY_KEYS, "store api key")?;
    Ok(Some(RemoteStoreConfig::from_settings(settings, base_url, api_key)))
}

fn required_lookup_value<F>(
    lookup: &F,
    keys: &[&str],
    field_name: &str,
) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_lookup_value(lookup, keys).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "missing {} (set one of: {})",
            field_name,
            keys.join(", ")
        ))
    })
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|&key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

use crate::domain::models::{NewTask, StatusHistoryEntry, Tag, Task, TaskPatch};
use crate::infrastructure::config::StoreSettings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::task_store::TaskStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const REST_PREFIX: [&str; 2] = ["rest", "v1"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub tasks_table: String,
    pub history_table: String,
    pub tags_table: String,
    pub timeout: Duration,
}

impl RemoteStoreConfig {
    pub fn from_settings(
        settings: &StoreSettings,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            tasks_table: settings.tasks_table.clone(),
            history_table: settings.history_table.clone(),
            tags_table: settings.tags_table.clone(),
            timeout: Duration::from_secs(settings.timeout_seconds),
        }
    }
}

/// `TaskStore` backed by a PostgREST-compatible HTTP API. The history table is
/// maintained server side by a trigger on the tasks table.
#[derive(Debug, Clone)]
pub struct ReqwestTaskStore {
    client: Client,
    base_url: Url,
    config: RemoteStoreConfig,
}

impl ReqwestTaskStore {
    pub fn new(config: RemoteStoreConfig) -> Result<Self, InfraError> {
        if config.api_key.trim().is_empty() {
            return Err(InfraError::InvalidConfig("store api key must not be empty".to_string()));
        }
        let base_url = Url::parse(config.base_url.trim()).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid store url '{}': {error}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(format!(
                "store url '{}' cannot be a base",
                config.base_url
            )));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    fn table_endpoint(&self, table: &str) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("store url cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.extend(REST_PREFIX);
            segments.push(table);
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    fn store_http_error(status: StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            "empty response body".to_string()
        } else {
            body.trim().to_string()
        };
        InfraError::Store {
            status: status.as_u16(),
            message,
        }
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<String, InfraError> {
        let response = self.authorized(request).send().await.map_err(|error| {
            tracing::warn!(operation, %error, "store request failed");
            InfraError::Http(error)
        })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(operation, status = status.as_u16(), "store rejected request");
            return Err(Self::store_http_error(status, &body));
        }
        tracing::debug!(operation, status = status.as_u16(), "store request succeeded");
        Ok(body)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T, InfraError> {
        let body = self.send(request, operation).await?;
        serde_json::from_str(&body).map_err(InfraError::from)
    }

    /// List reads keep every row that decodes and log the ones that do not.
    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<Vec<T>, InfraError> {
        let body = self.send(request, operation).await?;
        decode_rows(&body, operation)
    }

    async fn fetch_single(
        &self,
        request: RequestBuilder,
        operation: &str,
        task_id: &str,
    ) -> Result<Task, InfraError> {
        let rows: Vec<Task> = self
            .fetch(request.header("Prefer", "return=representation"), operation)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| InfraError::NotFound(format!("task {task_id}")))
    }
}

fn decode_rows<T: DeserializeOwned>(body: &str, operation: &str) -> Result<Vec<T>, InfraError> {
    let rows: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let total = rows.len();
    let decoded = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value(row) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(operation, index, %error, "skipping undecodable store row");
                None
            }
        })
        .collect::<Vec<T>>();
    if decoded.len() < total {
        tracing::warn!(operation, total, kept = decoded.len(), "store rows skipped");
    }
    Ok(decoded)
}

fn id_filter(task_id: &str) -> String {
    format!("eq.{task_id}")
}

#[async_trait]
impl TaskStore for ReqwestTaskStore {
    async fn list_tasks(&self) -> Result<Vec<Task>, InfraError> {
        let url = self.table_endpoint(&self.config.tasks_table)?;
        let request = self
            .client
            .get(url)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.fetch_rows(request, "list_tasks").await
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, InfraError> {
        let url = self.table_endpoint(&self.config.tasks_table)?;
        let request = self
            .client
            .patch(url)
            .query(&[("id", id_filter(task_id))])
            .json(patch);
        self.fetch_single(request, "update_task", task_id).await
    }

    async fn insert_task(&self, task: &NewTask) -> Result<Task, InfraError> {
        let url = self.table_endpoint(&self.config.tasks_table)?;
        let request = self.client.post(url).json(task);
        self.fetch_single(request, "insert_task", &task.title).await
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), InfraError> {
        let url = self.table_endpoint(&self.config.tasks_table)?;
        let request = self.client.delete(url).query(&[("id", id_filter(task_id))]);
        self.send(request, "delete_task").await?;
        Ok(())
    }

    async fn list_status_history(
        &self,
        task_id: Option<&str>,
    ) -> Result<Vec<StatusHistoryEntry>, InfraError> {
        let url = self.table_endpoint(&self.config.history_table)?;
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "changed_at.asc".to_string()),
        ];
        if let Some(task_id) = task_id {
            query.push(("task_id", id_filter(task_id)));
        }
        let request = self.client.get(url).query(&query);
        self.fetch_rows(request, "list_status_history").await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, InfraError> {
        let url = self.table_endpoint(&self.config.tags_table)?;
        let request = self
            .client
            .get(url)
            .query(&[("select", "*"), ("order", "name.asc")]);
        self.fetch_rows(request, "list_tags").await
    }
}

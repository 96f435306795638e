use crate::domain::durations::SamplePolicy;
use crate::domain::metrics::ReportWindow;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const STORE_JSON: &str = "store.json";
const DEFAULT_TASKS_TABLE: &str = "tasks";
const DEFAULT_HISTORY_TABLE: &str = "task_status_history";
const DEFAULT_TAGS_TABLE: &str = "tags";
const DEFAULT_TIMEOUT_SECONDS: u64 = 15;

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub store: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub app_name: String,
    pub time_zone: Tz,
    pub report_window: ReportWindow,
    pub sample_policy: SamplePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub base_url: Option<String>,
    pub tasks_table: String,
    pub history_table: String,
    pub tags_table: String,
    pub timeout_seconds: u64,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "TaskFlow",
                "timezone": "UTC",
                "reportWindow": "week",
                "samplePolicy": "drop"
            }),
        ),
        (
            STORE_JSON,
            serde_json::json!({
                "schema": 1,
                "baseUrl": null,
                "tasksTable": DEFAULT_TASKS_TABLE,
                "historyTable": DEFAULT_HISTORY_TABLE,
                "tagsTable": DEFAULT_TAGS_TABLE,
                "timeoutSeconds": DEFAULT_TIMEOUT_SECONDS
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, InfraError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        store: read_config(&config_dir.join(STORE_JSON))?,
    })
}

fn string_field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn read_app_settings(config_dir: &Path) -> Result<AppSettings, InfraError> {
    let path = config_dir.join(APP_JSON);
    let app = read_config(&path)?;

    let time_zone = match string_field(&app, "timezone") {
        Some(raw) => raw.parse::<Tz>().map_err(|error| {
            InfraError::InvalidConfig(format!("invalid timezone '{raw}' in {}: {error}", path.display()))
        })?,
        None => Tz::UTC,
    };
    let report_window = match string_field(&app, "reportWindow") {
        Some(raw) => raw.parse::<ReportWindow>().map_err(|error| {
            InfraError::InvalidConfig(format!("{error} in {}", path.display()))
        })?,
        None => ReportWindow::default(),
    };
    let sample_policy = match string_field(&app, "samplePolicy") {
        Some("drop") | None => SamplePolicy::Drop,
        Some("zero") => SamplePolicy::Zero,
        Some(other) => {
            return Err(InfraError::InvalidConfig(format!(
                "unsupported samplePolicy '{other}' in {}",
                path.display()
            )));
        }
    };

    Ok(AppSettings {
        app_name: string_field(&app, "appName").unwrap_or("TaskFlow").to_string(),
        time_zone,
        report_window,
        sample_policy,
    })
}

pub fn read_store_settings(config_dir: &Path) -> Result<StoreSettings, InfraError> {
    let store = read_config(&config_dir.join(STORE_JSON))?;
    let timeout_seconds = store
        .get("timeoutSeconds")
        .and_then(serde_json::Value::as_u64)
        .filter(|seconds| *seconds > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS);

    Ok(StoreSettings {
        base_url: string_field(&store, "baseUrl").map(ToOwned::to_owned),
        tasks_table: string_field(&store, "tasksTable")
            .unwrap_or(DEFAULT_TASKS_TABLE)
            .to_string(),
        history_table: string_field(&store, "historyTable")
            .unwrap_or(DEFAULT_HISTORY_TABLE)
            .to_string(),
        tags_table: string_field(&store, "tagsTable")
            .unwrap_or(DEFAULT_TAGS_TABLE)
            .to_string(),
        timeout_seconds,
    })
}

pub fn save_timezone(config_dir: &Path, time_zone: Tz) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    let mut app = read_config(&path)?;
    let object = app.as_object_mut().ok_or_else(|| {
        InfraError::InvalidConfig(format!("invalid object structure in {}", path.display()))
    })?;
    object.insert(
        "timezone".to_string(),
        serde_json::Value::String(time_zone.name().to_string()),
    );

    let formatted = serde_json::to_string_pretty(&app)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "taskflow-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn defaults_are_written_and_readable() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");

        let app = read_app_settings(&dir.path).expect("app settings");
        assert_eq!(app.app_name, "TaskFlow");
        assert_eq!(app.time_zone, Tz::UTC);
        assert_eq!(app.report_window, ReportWindow::Week);
        assert_eq!(app.sample_policy, SamplePolicy::Drop);

        let store = read_store_settings(&dir.path).expect("store settings");
        assert_eq!(store.base_url, None);
        assert_eq!(store.history_table, "task_status_history");
        assert_eq!(store.timeout_seconds, 15);
    }

    #[test]
    fn existing_files_are_not_overwritten() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(APP_JSON),
            r#"{"schema":1,"timezone":"Asia/Tokyo","reportWindow":"month"}"#,
        )
        .expect("write app.json");
        ensure_default_configs(&dir.path).expect("write defaults");

        let app = read_app_settings(&dir.path).expect("app settings");
        assert_eq!(app.time_zone, chrono_tz::Asia::Tokyo);
        assert_eq!(app.report_window, ReportWindow::Month);
    }

    #[test]
    fn rejects_unknown_schema_and_bad_timezone() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");

        fs::write(dir.path.join(STORE_JSON), r#"{"schema":2}"#).expect("write store.json");
        assert!(matches!(
            read_store_settings(&dir.path),
            Err(InfraError::InvalidConfig(_))
        ));

        fs::write(dir.path.join(APP_JSON), r#"{"schema":1,"timezone":"Mars/Olympus"}"#)
            .expect("write app.json");
        assert!(matches!(read_app_settings(&dir.path), Err(InfraError::InvalidConfig(_))));
    }

    #[test]
    fn save_timezone_keeps_other_fields() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        save_timezone(&dir.path, chrono_tz::America::New_York).expect("save timezone");

        let app = read_app_settings(&dir.path).expect("app settings");
        assert_eq!(app.time_zone, chrono_tz::America::New_York);
        assert_eq!(app.app_name, "TaskFlow");
    }
}

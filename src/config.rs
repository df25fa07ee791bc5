use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{PipelineSettings, RetryPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "config/lingua.json";

const ENV_TUTOR_API_KEY: &str = "LINGUA_TUTOR_API_KEY";
const ENV_STORE_ENDPOINT: &str = "LINGUA_STORE_ENDPOINT";
const ENV_DATA_DIR: &str = "LINGUA_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub target_language: String,
    pub native_language: String,
    pub history_limit: usize,
    pub speak_replies: bool,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub queue: QueueConfig,
    pub store: StoreConfig,
    pub tutor: TutorConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub capacity: usize,
    pub window_ms: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    pub endpoint: Option<String>,
    pub model: String,
    /// Read from the environment, never written back to disk.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub context_messages: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            target_language: "es".to_string(),
            native_language: "en".to_string(),
            history_limit: 50,
            speak_replies: false,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            queue: QueueConfig::default(),
            store: StoreConfig::default(),
            tutor: TutorConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            window_ms: 60_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            multiplier: 2.0,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_retries: 5 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            endpoint: None,
            timeout_secs: 10,
        }
    }
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            timeout_secs: 20,
            context_messages: 10,
        }
    }
}

impl AppConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("lingua.db")
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            rate_capacity: self.rate_limit.capacity,
            rate_window_ms: self.rate_limit.window_ms,
            retry: RetryPolicy {
                max_retries: self.retry.max_retries,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                multiplier: self.retry.multiplier,
            },
            queue_max_retries: self.queue.max_retries,
        }
    }

    /// Applies `LINGUA_*` environment overrides (after `.env` is loaded).
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_TUTOR_API_KEY).filter(|v| !v.is_empty()) {
            self.tutor.api_key = Some(key);
        }
        if let Some(endpoint) = lookup(ENV_STORE_ENDPOINT).filter(|v| !v.is_empty()) {
            self.store.endpoint = Some(endpoint);
            self.store.backend = StoreBackend::Http;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "target_language": "fr", "rate_limit": { "capacity": 5 } }"#,
        )
        .unwrap();

        assert_eq!(config.target_language, "fr");
        assert_eq!(config.native_language, "en");
        assert_eq!(config.rate_limit.capacity, 5);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.queue.max_retries, 5);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
    }

    #[test]
    fn pipeline_settings_follow_config() {
        let mut config = AppConfig::default();
        config.retry.base_delay_ms = 250;
        config.retry.multiplier = 3.0;

        let settings = config.pipeline_settings();
        assert_eq!(settings.retry.base_delay, Duration::from_millis(250));
        assert_eq!(settings.retry.delay_for(2), Duration::from_millis(2250));
        assert_eq!(settings.rate_capacity, 20);
    }

    #[test]
    fn env_overrides_switch_store_to_http() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            ENV_STORE_ENDPOINT => Some("https://store.example".to_string()),
            ENV_TUTOR_API_KEY => Some("secret".to_string()),
            _ => None,
        });

        assert_eq!(config.store.backend, StoreBackend::Http);
        assert_eq!(config.store.endpoint.as_deref(), Some("https://store.example"));
        assert_eq!(config.tutor.api_key.as_deref(), Some("secret"));
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn api_key_is_not_serialized() {
        let mut config = AppConfig::default();
        config.tutor.api_key = Some("secret".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config("definitely/not/here.json");
        assert_eq!(config.history_limit, 50);
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Ingestion/chunking knobs (spec.md §4.4, §4.5, §6).
#[derive(Debug, Deserialize, Clone)]
pub struct IngestionConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

/// Chat-call knobs (spec.md §4.10 step 4, §6).
#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Background processing knobs (spec.md §4.8, §5, §6).
#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_processing_attempts_max")]
    pub processing_attempts_max: u32,
    #[serde(default = "default_processing_task_deadline_secs")]
    pub processing_task_deadline_secs: u64,
}

fn default_worker_pool_size() -> usize {
    4
}

fn default_processing_attempts_max() -> u32 {
    3
}

fn default_processing_task_deadline_secs() -> u64 {
    5 * 60
}

/// Per-request deadline knobs (spec.md §4.10, §6).
#[derive(Debug, Deserialize, Clone)]
pub struct RequestConfig {
    #[serde(default = "default_request_chat_deadline_secs")]
    pub request_chat_deadline_secs: u64,
}

fn default_request_chat_deadline_secs() -> u64 {
    30
}

/// CORS is external to the core domain, but spec.md §6 enumerates it as a
/// recognized config knob, so it is carried here rather than dropped.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub allow_all_origins: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub ingestion: IngestionConfig,
    pub chat: ChatConfig,
    pub processing: ProcessingConfig,
    pub request: RequestConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl AppConfig {
    /// Layers `config/default.{toml,yaml,...}`, then `config/{RUN_MODE}` if
    /// present, then `HEALTHSYNC_`-prefixed environment variables, in that
    /// order — later sources win.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("HEALTHSYNC").separator("__"));

        builder.build()?.try_deserialize()
    }
}

use serde::{Deserialize, Serialize};

use super::resource::ConcurrencyBounds;

/// Main configuration structure for wavesmith
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Admission control bounds and telemetry cadence
    #[serde(default)]
    pub resources: ResourcesConfig,

    /// Wave scheduler behavior
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Verification commands and limits
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Repair state machine settings
    #[serde(default)]
    pub repair: RepairConfig,

    /// LLM generator backend
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Context store settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Resource-adaptive admission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResourcesConfig {
    #[serde(flatten)]
    pub bounds: ConcurrencyBounds,

    /// Milliseconds between limit recomputations
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

const fn default_check_interval_ms() -> u64 {
    2000
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            bounds: ConcurrencyBounds::default(),
            check_interval_ms: default_check_interval_ms(),
        }
    }
}

/// What to do when a task does not produce all of its declared outputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingOutputPolicy {
    /// Write placeholder content for each missing path
    #[default]
    Placeholder,
    /// Write only what was produced
    Skip,
    /// Abort the run
    FailFast,
}

/// Wave scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    #[serde(default)]
    pub missing_outputs: MissingOutputPolicy,

    /// Upper bound on one task's generation, in seconds
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Persist run state after every wave
    #[serde(default = "default_true")]
    pub checkpoint: bool,
}

const fn default_task_timeout_secs() -> u64 {
    600
}

const fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            missing_outputs: MissingOutputPolicy::default(),
            task_timeout_secs: default_task_timeout_secs(),
            checkpoint: true,
        }
    }
}

/// Verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VerificationConfig {
    /// Explicit commands; when empty they are derived from the tech stack
    #[serde(default)]
    pub commands: Vec<String>,

    /// Per-command timeout in seconds
    #[serde(default = "default_verify_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum characters kept from stdout and from stderr
    #[serde(default = "default_output_limit")]
    pub output_limit: usize,
}

const fn default_verify_timeout_secs() -> u64 {
    600
}

const fn default_output_limit() -> usize {
    2000
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            timeout_secs: default_verify_timeout_secs(),
            output_limit: default_output_limit(),
        }
    }
}

/// Repair configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RepairConfig {
    /// Run the repair state machine after a failed verification
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Timeout for each post-fix command, in seconds
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Maximum characters of any file content sent with a fix request
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,

    /// Manifest files given to holistic diagnosis
    #[serde(default = "default_manifest_files")]
    pub manifest_files: Vec<String>,
}

const fn default_command_timeout_secs() -> u64 {
    120
}

const fn default_max_file_chars() -> usize {
    6000
}

fn default_manifest_files() -> Vec<String> {
    [
        "package.json",
        "requirements.txt",
        "pyproject.toml",
        "Cargo.toml",
        "go.mod",
        "tsconfig.json",
        "Dockerfile",
        "docker-compose.yml",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command_timeout_secs: default_command_timeout_secs(),
            max_file_chars: default_max_file_chars(),
            manifest_files: default_manifest_files(),
        }
    }
}

/// OpenAI-compatible generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GeneratorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

const fn default_temperature() -> f32 {
    0.3
}

const fn default_max_tokens() -> u32 {
    8192
}

const fn default_request_timeout_secs() -> u64 {
    180
}

const fn default_requests_per_second() -> f64 {
    2.0
}

const fn default_burst_size() -> u32 {
    4
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Context store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ContextConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Snippets returned per query
    #[serde(default = "default_results")]
    pub results: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

const fn default_results() -> usize {
    5
}

const fn default_chunk_size() -> usize {
    500
}

const fn default_chunk_overlap() -> usize {
    50
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            results: default_results(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for the babysitter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Ceiling on submissions per descriptor; 0 disables the check
    #[serde(default)]
    pub max_submissions: u32,

    /// Lifecycle driver configuration
    #[serde(default)]
    pub driver: DriverConfig,

    /// Decision engine configuration
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Execution backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// The submission ceiling, if one is configured.
    pub const fn submission_ceiling(&self) -> Option<u32> {
        if self.max_submissions == 0 {
            None
        } else {
            Some(self.max_submissions)
        }
    }
}

/// Lifecycle driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DriverConfig {
    /// Maximum loop iterations per descriptor and invocation
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Number of descriptors processed concurrently (1-256)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Poll interval used when waiting on a process we did not spawn
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_max_iterations() -> usize {
    64
}

const fn default_concurrency() -> usize {
    8
}

const fn default_poll_interval_ms() -> u64 {
    5000
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Reaction to `primal/dual feasible jump detected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpPolicy {
    /// Rerun with doubled precision
    #[default]
    EscalatePrecision,
    /// Treat the jump as a feasibility verdict for an active binary search
    Bisect,
}

/// Decision engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub jump_detected: JumpPolicy,

    /// Precision assumed when a descriptor does not set one
    #[serde(default = "default_baseline_precision")]
    pub baseline_precision: u32,

    /// Divisor applied to initial matrix scales on `maxComplementarity exceeded`
    #[serde(default = "default_matrix_scale_divisor")]
    pub matrix_scale_divisor: String,

    /// Initial matrix scale assumed when a descriptor does not set one
    #[serde(default = "default_matrix_scale")]
    pub default_matrix_scale: String,
}

const fn default_baseline_precision() -> u32 {
    800
}

fn default_matrix_scale_divisor() -> String {
    "100".to_string()
}

fn default_matrix_scale() -> String {
    "1e18".to_string()
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            jump_detected: JumpPolicy::default(),
            baseline_precision: default_baseline_precision(),
            matrix_scale_divisor: default_matrix_scale_divisor(),
            default_matrix_scale: default_matrix_scale(),
        }
    }
}

/// Which execution backend drives submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Child processes on this machine
    #[default]
    Local,
    /// HTCondor-style batch scheduler
    Batch,
    /// Log only
    Noop,
}

impl BackendKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Batch => "batch",
            Self::Noop => "noop",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "batch" | "condor" => Some(Self::Batch),
            "noop" => Some(Self::Noop),
            _ => None,
        }
    }
}

/// Execution backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// Executables invoked by the worker and the backends
    #[serde(default)]
    pub executables: ExecutablesConfig,

    /// Prepended to `LD_LIBRARY_PATH` for every tool invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_path: Option<String>,

    /// Batch scheduler settings
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Executable paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutablesConfig {
    /// The optimization solver
    #[serde(default = "default_solver")]
    pub solver: String,

    /// Tool generating missing data files from a descriptor
    #[serde(default = "default_aux_creator")]
    pub aux_creator: String,

    /// Binary spawned as the worker; defaults to the running executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
}

fn default_solver() -> String {
    "sdpb".to_string()
}

fn default_aux_creator() -> String {
    "sdp-create".to_string()
}

impl Default for ExecutablesConfig {
    fn default() -> Self {
        Self {
            solver: default_solver(),
            aux_creator: default_aux_creator(),
            worker: None,
        }
    }
}

/// Batch scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    #[serde(default = "default_submit_command")]
    pub submit_command: String,

    #[serde(default = "default_query_command")]
    pub query_command: String,

    #[serde(default = "default_wait_command")]
    pub wait_command: String,

    /// Default staging directory for file transfer to compute nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,

    /// Extra `key = value` lines for every submit description
    #[serde(default)]
    pub attributes: std::collections::BTreeMap<String, String>,
}

fn default_submit_command() -> String {
    "condor_submit".to_string()
}

fn default_query_command() -> String {
    "condor_q".to_string()
}

fn default_wait_command() -> String {
    "condor_wait".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            submit_command: default_submit_command(),
            query_command: default_query_command(),
            wait_command: default_wait_command(),
            staging_dir: None,
            attributes: std::collections::BTreeMap::new(),
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

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; console only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Also log to the console when writing to `log_dir`
    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    /// Log file rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_true() -> bool {
    true
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
            enable_stdout: true,
            rotation: default_rotation(),
        }
    }
}

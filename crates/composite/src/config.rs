//! Configuration for compositing.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do when a scene's companion rasters cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFailurePolicy {
    /// Fail the whole accumulation.
    #[default]
    Abort,
    /// Log a warning and continue with the remaining scenes.
    Skip,
}

impl SourceFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Skip => "skip",
        }
    }
}

impl FromStr for SourceFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown source failure policy '{}'", other)),
        }
    }
}

impl std::fmt::Display for SourceFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for the composite accumulator and its raster sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// Newline-delimited table of good quality-flag codes.
    pub quality_flags_path: PathBuf,

    /// Maximum number of scenes fetched and decoded at once.
    pub concurrency: usize,

    /// Behaviour when a scene's rasters cannot be read.
    pub failure_policy: SourceFailurePolicy,

    /// Maximum number of retry attempts for remote sources.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles each retry).
    pub initial_retry_delay_ms: u64,

    /// Maximum retry delay in milliseconds.
    pub max_retry_delay_ms: u64,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Directory that relative local hrefs are resolved against.
    pub data_root: Option<PathBuf>,

    /// Directory composites are written to.
    pub output_dir: PathBuf,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            quality_flags_path: PathBuf::from("config/quality_flags.txt"),
            concurrency: 4,
            failure_policy: SourceFailurePolicy::Abort,
            max_retries: 3,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 30_000,
            request_timeout_secs: 300,
            data_root: None,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl CompositeConfig {
    /// Override fields from `NTL_*` environment variables. Unparseable
    /// values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("NTL_QUALITY_FLAGS") {
            self.quality_flags_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("NTL_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                self.concurrency = n;
            }
        }

        if let Ok(val) = std::env::var("NTL_FAILURE_POLICY") {
            if let Ok(policy) = val.parse() {
                self.failure_policy = policy;
            }
        }

        if let Ok(val) = std::env::var("NTL_MAX_RETRIES") {
            if let Ok(n) = val.parse() {
                self.max_retries = n;
            }
        }

        if let Ok(val) = std::env::var("NTL_INITIAL_RETRY_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                self.initial_retry_delay_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("NTL_MAX_RETRY_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                self.max_retry_delay_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("NTL_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.request_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("NTL_DATA_ROOT") {
            self.data_root = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("NTL_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(val);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be > 0".to_string());
        }

        if self.initial_retry_delay_ms > self.max_retry_delay_ms {
            return Err("initial_retry_delay_ms must not exceed max_retry_delay_ms".to_string());
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be > 0".to_string());
        }

        Ok(())
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

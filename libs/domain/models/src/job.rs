// [libs/domain/models/src/job.rs]
//! Job entity and job-spec schema.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `pending → running → (completed | failed | cancelled)`.
/// `cancelled` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// `options.fetch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOptions {
    pub fetch_size: u32,
    pub fetch_workers: u32,
    /// `0` means auto-sized from the tiered table.
    #[serde(default)]
    pub shard_size: u64,
    #[serde(default)]
    pub index_start: u64,
    /// `0` means "current log tree size" — resolved by the caller
    /// (an external STH lookup) before `BulkCreateShards` is called.
    #[serde(default)]
    pub index_end: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorPolicy {
    All,
    Nonfatal,
}

/// `options.match`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchOptions {
    #[serde(default)]
    pub subject_regex: Option<String>,
    #[serde(default)]
    pub issuer_regex: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub sct_timestamp: Option<i64>,
    #[serde(default)]
    pub domain_include: Vec<String>,
    #[serde(default)]
    pub domain_exclude: Vec<String>,
    #[serde(default)]
    pub parse_errors: Option<ParseErrorPolicy>,
    #[serde(default)]
    pub validation_errors: bool,
    #[serde(default)]
    pub skip_precerts: bool,
    #[serde(default)]
    pub precerts_only: bool,
    #[serde(default)]
    pub workers: Option<u32>,
}

/// `options.output` — names the ETL pipeline components; the
/// pipeline crate resolves these names to concrete implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputOptions {
    #[serde(default)]
    pub chunk_records: Option<u32>,
    #[serde(default)]
    pub chunk_bytes: Option<u64>,
    pub extractor: String,
    #[serde(default)]
    pub extractor_options: HashMap<String, serde_json::Value>,
    pub transformer: String,
    #[serde(default)]
    pub transformer_options: HashMap<String, serde_json::Value>,
    pub sink: String,
    #[serde(default)]
    pub sink_options: HashMap<String, serde_json::Value>,
}

/// Nested `options` object of the job spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOptions {
    pub fetch: FetchOptions,
    #[serde(default)]
    pub r#match: MatchOptions,
    pub output: OutputOptions,
}

/// A submitted job specification, as validated by `SubmitJob`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub version: String,
    #[serde(default)]
    pub note: Option<String>,
    pub log_uri: String,
    pub options: JobOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum JobSpecValidationError {
    #[error("job spec is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("job spec field '{field}' must be positive, got {value}")]
    NotPositive { field: &'static str, value: i64 },
    #[error("job spec names an empty '{0}'")]
    EmptyName(&'static str),
}

impl JobSpec {
    /// Mirrors `SubmitJob`'s validation: required version, log URI,
    /// positive fetch size/workers, and named extractor/transformer/sink.
    pub fn validate(&self) -> Result<(), JobSpecValidationError> {
        if self.version.trim().is_empty() {
            return Err(JobSpecValidationError::MissingField("version"));
        }
        if self.log_uri.trim().is_empty() {
            return Err(JobSpecValidationError::MissingField("log_uri"));
        }
        if self.options.fetch.fetch_size == 0 {
            return Err(JobSpecValidationError::NotPositive {
                field: "options.fetch.fetch_size",
                value: self.options.fetch.fetch_size as i64,
            });
        }
        if self.options.fetch.fetch_workers == 0 {
            return Err(JobSpecValidationError::NotPositive {
                field: "options.fetch.fetch_workers",
                value: self.options.fetch.fetch_workers as i64,
            });
        }
        if self.options.output.extractor.trim().is_empty() {
            return Err(JobSpecValidationError::EmptyName("output.extractor"));
        }
        if self.options.output.transformer.trim().is_empty() {
            return Err(JobSpecValidationError::EmptyName("output.transformer"));
        }
        if self.options.output.sink.trim().is_empty() {
            return Err(JobSpecValidationError::EmptyName("output.sink"));
        }
        Ok(())
    }
}

/// Assembled view of a job's sub-keys, returned by `GetJob`/`ListJobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub job_id: String,
    pub spec: JobSpec,
    pub status: JobStatus,
    pub submitted: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub cancelled: Option<DateTime<Utc>>,
}

impl JobInfo {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> JobSpec {
        JobSpec {
            version: "0.1.0".into(),
            note: None,
            log_uri: "https://ct.example/log".into(),
            options: JobOptions {
                fetch: FetchOptions {
                    fetch_size: 2,
                    fetch_workers: 1,
                    shard_size: 0,
                    index_start: 0,
                    index_end: 4,
                },
                r#match: MatchOptions::default(),
                output: OutputOptions {
                    chunk_records: None,
                    chunk_bytes: None,
                    extractor: "raw".into(),
                    extractor_options: HashMap::new(),
                    transformer: "passthrough".into(),
                    transformer_options: HashMap::new(),
                    sink: "null".into(),
                    sink_options: HashMap::new(),
                },
            },
        }
    }

    #[test]
    fn valid_spec_passes() {
        assert!(sample_spec().validate().is_ok());
    }

    #[test]
    fn missing_log_uri_is_rejected() {
        let mut spec = sample_spec();
        spec.log_uri = String::new();
        assert!(matches!(
            spec.validate(),
            Err(JobSpecValidationError::MissingField("log_uri"))
        ));
    }

    #[test]
    fn zero_fetch_size_is_rejected() {
        let mut spec = sample_spec();
        spec.options.fetch.fetch_size = 0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn cancelled_reachable_from_any_non_terminal_status() {
        for status in [JobStatus::Pending, JobStatus::Running] {
            assert!(!status.is_terminal());
        }
        assert!(JobStatus::Cancelled.is_terminal());
    }
}

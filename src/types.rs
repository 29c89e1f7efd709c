/// Core types and structures for the tenantbox system
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for tenantbox
#[derive(Error, Debug)]
pub enum GovernanceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Privilege error: {0}")]
    Privilege(String),

    #[error("Audit log error: {0}")]
    Audit(String),
}

/// Result type alias for tenantbox operations
pub type Result<T> = std::result::Result<T, GovernanceError>;

/// Outcome of a single best-effort resource write.
///
/// Cgroup and rlimit writes are layered defense: when the kernel feature or
/// the privilege is absent the caller keeps running with reduced isolation
/// instead of failing. The outcome makes that degradation observable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    /// Whether the write reached the kernel
    pub applied: bool,
    /// Why it did not, when `applied` is false
    pub reason: Option<String>,
}

impl ApplyOutcome {
    pub fn applied() -> Self {
        Self {
            applied: true,
            reason: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            applied: false,
            reason: Some(reason.into()),
        }
    }
}

/// Aggregated outcomes of one ensure/apply pass, keyed by control name
/// (e.g. "memory.max", "nproc")
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyReport {
    pub outcomes: BTreeMap<String, ApplyOutcome>,
}

impl ApplyReport {
    pub fn record(&mut self, control: impl Into<String>, outcome: ApplyOutcome) {
        self.outcomes.insert(control.into(), outcome);
    }

    /// True when every attempted write reached the kernel
    pub fn fully_applied(&self) -> bool {
        self.outcomes.values().all(|o| o.applied)
    }

    /// Controls that were skipped, with reasons
    pub fn skipped(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.applied)
            .map(|(k, o)| (k.as_str(), o.reason.as_deref().unwrap_or("unknown")))
            .collect()
    }
}

/// Per-tenant cgroup limits. Absent fields inherit from the parent cgroup,
/// they do not mean zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantLimits {
    /// cpu.weight (1-10000, default 100)
    pub cpu_weight: Option<u64>,
    /// cpu.max, e.g. "50000 100000" or "max"
    pub cpu_max: Option<String>,
    /// memory.high soft limit, e.g. "512M"
    pub memory_high: Option<String>,
    /// memory.max hard limit, e.g. "1G"
    pub memory_max: Option<String>,
    /// pids.max; negative writes the literal "max"
    pub pids_max: Option<i64>,
}

impl TenantLimits {
    pub fn is_empty(&self) -> bool {
        self.cpu_weight.is_none()
            && self.cpu_max.is_none()
            && self.memory_high.is_none()
            && self.memory_max.is_none()
            && self.pids_max.is_none()
    }
}

/// POSIX rlimit specification applied to a live pid. Partial-application
/// semantics match [`TenantLimits`]: absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RLimitSpec {
    /// RLIMIT_NPROC
    pub nproc: Option<u64>,
    /// RLIMIT_NOFILE
    pub nofile: Option<u64>,
    /// RLIMIT_FSIZE in bytes
    pub fsize: Option<u64>,
    /// RLIMIT_AS in bytes
    pub address_space: Option<u64>,
    /// RLIMIT_CPU in seconds
    pub cpu_secs: Option<u64>,
}

impl RLimitSpec {
    pub fn is_empty(&self) -> bool {
        self.nproc.is_none()
            && self.nofile.is_none()
            && self.fsize.is_none()
            && self.address_space.is_none()
            && self.cpu_secs.is_none()
    }
}

/// One assembled sandbox launch. Ephemeral: handed to the exec layer and
/// never persisted.
#[derive(Debug, Clone)]
pub struct SandboxInvocation {
    /// Full launcher argument vector, command tokens last
    pub argv: Vec<String>,
    /// The single writable mount
    pub workspace: PathBuf,
}

/// An incoming file write for the scoped store
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub project_id: String,
    pub file_name: String,
    pub content: String,
}

/// Metadata of a file accepted by the scoped store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub project_id: String,
    pub file_name: String,
    pub size: u64,
    pub path: PathBuf,
}

/// Audit log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// One structured audit line. Masking happens before construction, never
/// after: a `LogEntry` holding a cleartext secret is a bug upstream of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

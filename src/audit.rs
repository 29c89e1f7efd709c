/// Secret-redacting audit logging for compliance and incident response
///
/// An [`AuditLog`] is an explicit service instance: constructed once at
/// startup and passed by reference to every component that logs or renders
/// commands. There is no process-wide singleton, so tests and embedders can
/// hold multiple isolated instances without cross-contamination.
///
/// Masking is exact substring replacement of registered secrets. Values
/// logged before registration leak in cleartext, and re-encoded variants of
/// a secret (base64, hex) are not caught; register every representation that
/// can appear in output.
use crate::types::{GovernanceError, LogEntry, LogLevel, Result};
use log::error;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Fixed-length replacement for every masked secret
const MASK: &str = "********";

/// Environment variables whose values are registered as secrets at startup
pub const WELL_KNOWN_SECRET_VARS: &[&str] = &[
    "PRIVATE_KEY",
    "SECRET_KEY",
    "API_KEY",
    "ACCESS_TOKEN",
    "PASSWORD",
    "DATABASE_URL",
    "JWT_SECRET",
    "MNEMONIC",
];

pub struct AuditLog {
    /// Correlation id distinguishing this instance's entries
    instance_id: String,
    /// One timestamped target per instance lifetime
    log_path: PathBuf,
    file: Mutex<File>,
    secrets: Mutex<Vec<String>>,
}

impl AuditLog {
    /// Open a fresh timestamped log file for `identifier` under `dir`
    /// (default: the system temp directory). Re-initialization produces a
    /// new target; it does not merge with previous files.
    pub fn new(identifier: &str, dir: Option<PathBuf>) -> Result<Self> {
        crate::sanitize::sanitize_project_id(identifier)?;

        let dir = dir.unwrap_or_else(|| std::env::temp_dir().join("tenantbox"));
        std::fs::create_dir_all(&dir)
            .map_err(|e| GovernanceError::Audit(format!("cannot create log directory: {}", e)))?;

        let log_path = dir.join(format!("{}-{}.log", identifier, unix_now()));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_path)
            .map_err(|e| GovernanceError::Audit(format!("cannot open audit log: {}", e)))?;

        Ok(Self {
            instance_id: Uuid::new_v4().to_string(),
            log_path,
            file: Mutex::new(file),
            secrets: Mutex::new(Vec::new()),
        })
    }

    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }

    /// Register a value for redaction. Empty strings are ignored; masking an
    /// empty substring would corrupt every message.
    pub fn register_secret(&self, value: &str) {
        if value.is_empty() {
            return;
        }
        let mut secrets = self.secrets.lock().unwrap_or_else(|p| p.into_inner());
        if !secrets.iter().any(|s| s == value) {
            secrets.push(value.to_string());
            // Longest first, so an overlapping shorter secret cannot split
            // a longer one into recognizable halves
            secrets.sort_by(|a, b| b.len().cmp(&a.len()));
        }
    }

    /// Register the values of the well-known secret environment variables
    pub fn register_environment_secrets(&self) {
        for var in WELL_KNOWN_SECRET_VARS {
            if let Ok(value) = std::env::var(var) {
                self.register_secret(&value);
            }
        }
    }

    /// Drop every registered secret. Intended for tests only; production
    /// code never unregisters.
    pub fn clear_secrets(&self) {
        self.secrets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }

    /// Replace every registered secret in `text` with the fixed mask
    pub fn mask_secrets(&self, text: &str) -> String {
        let secrets = self.secrets.lock().unwrap_or_else(|p| p.into_inner());
        let mut masked = text.to_string();
        for secret in secrets.iter() {
            masked = masked.replace(secret, MASK);
        }
        masked
    }

    /// Mask and append one structured entry. On file-write failure the
    /// masked entry falls back to the log facade instead of being dropped.
    pub fn secure_log(
        &self,
        message: &str,
        level: LogLevel,
        context: Option<BTreeMap<String, Value>>,
    ) -> Result<()> {
        let entry = LogEntry {
            timestamp: unix_now(),
            level,
            message: self.mask_secrets(message),
            context: context
                .map(|ctx| {
                    ctx.into_iter()
                        .map(|(k, v)| (k, self.mask_value(v)))
                        .collect()
                })
                .unwrap_or_default(),
        };

        let line = serde_json::json!({
            "instance_id": self.instance_id,
            "timestamp": entry.timestamp,
            "level": entry.level.as_str(),
            "message": entry.message,
            "context": entry.context,
        });

        let mut file = self.file.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
            error!("audit log write failed ({}); entry: {}", e, line);
        }
        Ok(())
    }

    /// Masked display form of a full command line. The executed command
    /// embeds the real secret; this form is safe to show or log.
    pub fn secure_command(&self, cmd: &str, args: &[String]) -> String {
        let mut rendered = self.mask_secrets(cmd);
        for arg in args {
            rendered.push(' ');
            rendered.push_str(&self.mask_secrets(arg));
        }
        rendered
    }

    /// Recursively mask string values inside structured context
    fn mask_value(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.mask_secrets(&s)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.mask_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, self.mask_value(v)))
                    .collect(),
            ),
            other => other,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

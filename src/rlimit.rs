/// POSIX rlimit application to live pids
///
/// Secondary defense layered under the cgroup hierarchy: limits are applied
/// by invoking prlimit(1) against the target pid with a discrete argument
/// vector. When the utility or the capability is absent the cgroup limits
/// remain the primary enforcement, so failures here degrade instead of
/// propagating.
use crate::sanitize;
use crate::types::{ApplyOutcome, ApplyReport, RLimitSpec, Result};
use std::env;
use std::process::Command;

/// Environment variables feeding [`RLimitSpec::from_environment`]
pub const ENV_NPROC: &str = "TENANT_NPROC";
pub const ENV_NOFILE: &str = "TENANT_NOFILE";
pub const ENV_FSIZE: &str = "TENANT_FSIZE";
pub const ENV_AS: &str = "TENANT_AS";
pub const ENV_CPU_SECS: &str = "TENANT_CPU_SECS";

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl RLimitSpec {
    /// Parse the fixed set of TENANT_* variables. Unparseable or absent
    /// values leave the field unset rather than erroring.
    pub fn from_environment() -> Self {
        Self {
            nproc: env_u64(ENV_NPROC),
            nofile: env_u64(ENV_NOFILE),
            fsize: env_u64(ENV_FSIZE),
            address_space: env_u64(ENV_AS),
            cpu_secs: env_u64(ENV_CPU_SECS),
        }
    }
}

pub struct ProcessLimiter {
    /// Limit-setting utility, normally "prlimit"; overridable for tests
    utility: String,
}

impl ProcessLimiter {
    pub fn new() -> Self {
        Self {
            utility: "prlimit".to_string(),
        }
    }

    /// Use an alternate limit-setting utility
    pub fn with_utility(utility: impl Into<String>) -> Self {
        Self {
            utility: utility.into(),
        }
    }

    /// Build the prlimit flag vector for a spec, one flag per set field,
    /// each as soft:hard with both bounds equal.
    pub fn build_flags(spec: &RLimitSpec) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(v) = spec.nproc {
            flags.push(format!("--nproc={}:{}", v, v));
        }
        if let Some(v) = spec.nofile {
            flags.push(format!("--nofile={}:{}", v, v));
        }
        if let Some(v) = spec.fsize {
            flags.push(format!("--fsize={}:{}", v, v));
        }
        if let Some(v) = spec.address_space {
            flags.push(format!("--as={}:{}", v, v));
        }
        if let Some(v) = spec.cpu_secs {
            flags.push(format!("--cpu={}:{}", v, v));
        }
        flags
    }

    /// Apply the spec to a live pid. Empty spec is a no-op. The utility is
    /// invoked once with every flag; a missing utility or a non-zero exit
    /// reports unapplied outcomes instead of an error.
    pub fn apply(&self, pid: i64, spec: &RLimitSpec) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        if spec.is_empty() {
            return Ok(report);
        }

        let pid = sanitize::validate_pid(pid)?;
        let flags = Self::build_flags(spec);

        let status = Command::new(&self.utility)
            .arg(format!("--pid={}", pid))
            .args(&flags)
            .status();

        let outcome = match status {
            Ok(status) if status.success() => ApplyOutcome::applied(),
            Ok(status) => {
                log::warn!(
                    "{} exited with {} while limiting pid {}",
                    self.utility,
                    status,
                    pid
                );
                ApplyOutcome::skipped(format!("{} exited with {}", self.utility, status))
            }
            Err(e) => {
                log::warn!("{} unavailable: {}", self.utility, e);
                ApplyOutcome::skipped(format!("{} unavailable: {}", self.utility, e))
            }
        };

        for flag in &flags {
            // "--nproc=10:10" -> "nproc"
            let name = flag
                .trim_start_matches("--")
                .split('=')
                .next()
                .unwrap_or(flag);
            report.record(name, outcome.clone());
        }

        Ok(report)
    }
}

impl Default for ProcessLimiter {
    fn default() -> Self {
        Self::new()
    }
}

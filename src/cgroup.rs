/// Cgroup v2 tenant hierarchy management for resource governance
///
/// One subtree per tenant under `{root}/tenants/{user_id}` on the unified
/// hierarchy. Every control-file write is best-effort: the caller may run
/// with reduced privilege, and partial limit application beats hard failure.
/// Each write reports an [`ApplyOutcome`] so degraded isolation stays
/// observable instead of silently swallowed.
use crate::sanitize;
use crate::types::{ApplyOutcome, ApplyReport, Result, TenantLimits};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Controllers the hierarchy tries to delegate to every tenant subtree
const CONTROLLERS: &[&str] = &["cpu", "memory", "pids", "io"];

/// Directory under the cgroup root holding all tenant subtrees
const TENANTS_SUBDIR: &str = "tenants";

pub struct TenantHierarchy {
    root: PathBuf,
    /// Set once a degraded-isolation warning has been emitted, so operators
    /// see it at most once per manager instance
    degraded_warned: AtomicBool,
}

impl TenantHierarchy {
    /// Manager over the production unified hierarchy at /sys/fs/cgroup
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("/sys/fs/cgroup"))
    }

    /// Manager over an alternate hierarchy root (tests, delegated subtrees)
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            root,
            degraded_warned: AtomicBool::new(false),
        }
    }

    /// Probe for the unified hierarchy. When this is false every other
    /// operation is a no-op reporting unapplied outcomes: the system runs
    /// without kernel isolation rather than failing.
    pub fn is_supported(&self) -> bool {
        self.root.join("cgroup.controllers").exists()
    }

    /// Path of one tenant's subtree
    pub fn tenant_path(&self, user_id: &str) -> PathBuf {
        self.root.join(TENANTS_SUBDIR).join(user_id)
    }

    /// Idempotently create the tenant subtree, enable controllers top-down,
    /// and write each present limit. Safe to call concurrently for the same
    /// tenant: every write is idempotent and order-independent, so the worst
    /// case of a race is a harmless duplicate write.
    pub fn ensure_tenant(&self, user_id: &str, limits: &TenantLimits) -> Result<ApplyReport> {
        sanitize::sanitize_project_id(user_id)?;

        let mut report = ApplyReport::default();

        if !self.is_supported() {
            self.warn_degraded("cgroup v2 unified hierarchy not present");
            report.record(
                "cgroup",
                ApplyOutcome::skipped("cgroup v2 not supported on this host"),
            );
            return Ok(report);
        }

        let tenant_path = self.tenant_path(user_id);
        match fs::create_dir_all(&tenant_path) {
            Ok(()) => report.record("subtree", ApplyOutcome::applied()),
            Err(e) => {
                self.warn_degraded(&format!("cannot create tenant subtree: {}", e));
                report.record("subtree", ApplyOutcome::skipped(e.to_string()));
                return Ok(report);
            }
        }

        self.enable_controllers(&mut report);
        self.write_limits(&tenant_path, limits, &mut report);

        if !report.fully_applied() {
            self.warn_degraded("some tenant limits were not applied");
        }

        Ok(report)
    }

    /// Append a pid to the tenant's cgroup.procs. Best-effort, like every
    /// other write; attach before ensure does not error but enforces nothing.
    pub fn attach(&self, user_id: &str, pid: i64) -> Result<ApplyOutcome> {
        sanitize::sanitize_project_id(user_id)?;
        let pid = sanitize::validate_pid(pid)?;

        if !self.is_supported() {
            return Ok(ApplyOutcome::skipped(
                "cgroup v2 not supported on this host",
            ));
        }

        let procs_file = self.tenant_path(user_id).join("cgroup.procs");
        match fs::write(&procs_file, pid.to_string()) {
            Ok(()) => Ok(ApplyOutcome::applied()),
            Err(e) => {
                log::warn!("failed to attach pid {} to {}: {}", pid, user_id, e);
                Ok(ApplyOutcome::skipped(e.to_string()))
            }
        }
    }

    /// Remove the tenant subtree. Fails quietly while member processes are
    /// alive; the kernel refuses rmdir on a populated cgroup.
    pub fn remove_tenant(&self, user_id: &str) -> Result<ApplyOutcome> {
        sanitize::sanitize_project_id(user_id)?;

        let tenant_path = self.tenant_path(user_id);
        if !tenant_path.exists() {
            return Ok(ApplyOutcome::applied());
        }
        match fs::remove_dir(&tenant_path) {
            Ok(()) => Ok(ApplyOutcome::applied()),
            Err(e) => Ok(ApplyOutcome::skipped(e.to_string())),
        }
    }

    /// Enable controllers level by level from the root down to the tenant
    /// parent. A child can only enable a controller its parent delegated, so
    /// each level is restricted to what that level's cgroup.controllers
    /// actually lists.
    fn enable_controllers(&self, report: &mut ApplyReport) {
        // The leaf's own subtree_control only matters for grandchildren,
        // so only the levels above the tenant directory are written.
        let levels = [self.root.clone(), self.root.join(TENANTS_SUBDIR)];

        for level in levels {
            let available = Self::available_controllers(&level);
            let wanted: Vec<&str> = CONTROLLERS
                .iter()
                .copied()
                .filter(|c| available.contains(*c))
                .collect();
            if wanted.is_empty() {
                continue;
            }

            let tokens = wanted
                .iter()
                .map(|c| format!("+{}", c))
                .collect::<Vec<_>>()
                .join(" ");
            let control_file = level.join("cgroup.subtree_control");
            let key = format!("subtree_control:{}", level.display());
            match fs::write(&control_file, &tokens) {
                Ok(()) => report.record(key, ApplyOutcome::applied()),
                Err(e) => {
                    log::debug!("controller enable failed at {}: {}", level.display(), e);
                    report.record(key, ApplyOutcome::skipped(e.to_string()));
                }
            }
        }
    }

    /// Write each present limit field into its control file
    fn write_limits(&self, tenant_path: &Path, limits: &TenantLimits, report: &mut ApplyReport) {
        if let Some(weight) = limits.cpu_weight {
            self.write_control(tenant_path, "cpu.weight", &weight.to_string(), report);
        }
        if let Some(ref cpu_max) = limits.cpu_max {
            self.write_control(tenant_path, "cpu.max", cpu_max, report);
        }
        if let Some(ref memory_high) = limits.memory_high {
            self.write_control(tenant_path, "memory.high", memory_high, report);
        }
        if let Some(ref memory_max) = limits.memory_max {
            self.write_control(tenant_path, "memory.max", memory_max, report);
        }
        if let Some(pids_max) = limits.pids_max {
            // Negative means unlimited, spelled "max" in the control file
            let value = if pids_max < 0 {
                "max".to_string()
            } else {
                pids_max.to_string()
            };
            self.write_control(tenant_path, "pids.max", &value, report);
        }
    }

    fn write_control(
        &self,
        tenant_path: &Path,
        control: &str,
        value: &str,
        report: &mut ApplyReport,
    ) {
        match fs::write(tenant_path.join(control), value) {
            Ok(()) => report.record(control, ApplyOutcome::applied()),
            Err(e) => {
                log::debug!(
                    "write {} failed for {}: {}",
                    control,
                    tenant_path.display(),
                    e
                );
                report.record(control, ApplyOutcome::skipped(e.to_string()));
            }
        }
    }

    fn available_controllers(level: &Path) -> HashSet<String> {
        fs::read_to_string(level.join("cgroup.controllers"))
            .map(|content| content.split_whitespace().map(|s| s.to_string()).collect())
            .unwrap_or_default()
    }

    fn warn_degraded(&self, reason: &str) {
        if !self.degraded_warned.swap(true, Ordering::Relaxed) {
            log::warn!("tenant isolation degraded: {}", reason);
        }
    }
}

impl Default for TenantHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

/// OS ownership and permission normalization for tenant workspaces
///
/// After file mutations, ownership transfers to `{user}:{shared_group}` with
/// mode 0700, so one tenant's files stay inaccessible to another even on a
/// shared mount namespace. Commands run as discrete argument vectors whose
/// only variables are the already-gate-validated user id and path; no shell
/// string is ever assembled.
use crate::sanitize;
use crate::types::{GovernanceError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct OwnershipManager {
    /// Every transferred path must resolve inside this root
    workspace_root: PathBuf,
    /// Group shared by all tenant users
    shared_group: String,
    /// Allow-listed provisioning script, argument shape fixed to {user_id}
    provision_script: PathBuf,
    chown_bin: PathBuf,
    chmod_bin: PathBuf,
}

impl OwnershipManager {
    pub fn new(workspace_root: PathBuf, shared_group: &str, provision_script: PathBuf) -> Self {
        Self {
            workspace_root,
            shared_group: shared_group.to_string(),
            provision_script,
            chown_bin: PathBuf::from("chown"),
            chmod_bin: PathBuf::from("chmod"),
        }
    }

    /// Override the ownership utilities (tests)
    pub fn with_binaries(mut self, chown: PathBuf, chmod: PathBuf) -> Self {
        self.chown_bin = chown;
        self.chmod_bin = chmod;
        self
    }

    /// Recursively set `{user}:{shared_group}` ownership and mode 0700 on a
    /// workspace path. Failure surfaces as a privilege error and is never
    /// retried here.
    pub fn transfer_ownership(&self, user_id: &str, path: &Path) -> Result<()> {
        sanitize::sanitize_project_id(user_id)?;
        let path_str = path.to_str().ok_or_else(|| {
            GovernanceError::Validation("path is not valid UTF-8".to_string())
        })?;
        let contained = sanitize::resolve_workspace(&self.workspace_root, path_str)?;

        let owner = format!("{}:{}", user_id, self.shared_group);
        run_fixed(
            &self.chown_bin,
            &["-R", &owner, &contained.to_string_lossy()],
        )?;
        run_fixed(
            &self.chmod_bin,
            &["-R", "0700", &contained.to_string_lossy()],
        )?;
        Ok(())
    }

    /// Provision a dedicated OS user for a new tenant via the allow-listed
    /// script. The argument shape is fixed: only the user id varies.
    pub fn ensure_user(&self, user_id: &str) -> Result<()> {
        sanitize::sanitize_project_id(user_id)?;
        run_fixed(&self.provision_script, &[user_id])
    }
}

fn run_fixed(program: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new(program).args(args).output().map_err(|e| {
        GovernanceError::Privilege(format!("{} failed to start: {}", program.display(), e))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GovernanceError::Privilege(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(root: &Path, ok: bool) -> OwnershipManager {
        let bin = if ok { "/bin/true" } else { "/bin/false" };
        OwnershipManager::new(
            root.to_path_buf(),
            "tenants",
            PathBuf::from(bin),
        )
        .with_binaries(PathBuf::from(bin), PathBuf::from(bin))
    }

    #[test]
    fn transfer_succeeds_inside_workspace_root() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(dir.path(), true);
        let target = dir.path().join("alice");
        std::fs::create_dir(&target).unwrap();

        mgr.transfer_ownership("alice", &target).unwrap();
    }

    #[test]
    fn transfer_rejects_paths_outside_root() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(dir.path(), true);

        let err = mgr
            .transfer_ownership("alice", Path::new("/etc/passwd"))
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Validation(_)));
    }

    #[test]
    fn transfer_rejects_hostile_user_before_invocation() {
        let dir = TempDir::new().unwrap();
        // /bin/false would fail loudly if ever reached
        let mgr = manager(dir.path(), false);

        let err = mgr
            .transfer_ownership("alice;rm -rf /", dir.path())
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Validation(_)));
    }

    #[test]
    fn command_failure_surfaces_as_privilege_error() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(dir.path(), false);
        let target = dir.path().join("bob");
        std::fs::create_dir(&target).unwrap();

        let err = mgr.transfer_ownership("bob", &target).unwrap_err();
        assert!(matches!(err, GovernanceError::Privilege(_)));
    }

    #[test]
    fn ensure_user_runs_allow_listed_script_only() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(dir.path(), true);
        mgr.ensure_user("carol").unwrap();
        assert!(mgr.ensure_user("carol&payload").is_err());
    }

    #[test]
    fn missing_script_is_a_privilege_error() {
        let dir = TempDir::new().unwrap();
        let mgr = OwnershipManager::new(
            dir.path().to_path_buf(),
            "tenants",
            PathBuf::from("/nonexistent/provision-tenant"),
        );
        let err = mgr.ensure_user("dave").unwrap_err();
        assert!(matches!(err, GovernanceError::Privilege(_)));
    }
}

/// Bubblewrap argument construction for namespace/bind-mount sandboxes
///
/// This module only produces data: the ordered argument vector a namespacing
/// launcher (bwrap) needs to confine one command to one workspace. Spawning,
/// pid tracking, and termination belong to the exec layer.
use crate::sanitize;
use crate::types::{GovernanceError, Result, SandboxInvocation};
use std::path::{Path, PathBuf};

/// System directories bound read-only when present on the host. Toolchains,
/// loaders, and TLS roots live here; nothing in this list is writable inside
/// the sandbox.
const RO_SYSTEM_DIRS: &[&str] = &["/usr", "/lib", "/lib64", "/bin", "/sbin"];

/// Host files bound read-only for name resolution and identity lookups
const RO_SYSTEM_FILES: &[&str] = &[
    "/etc/ssl/certs",
    "/etc/ca-certificates",
    "/etc/resolv.conf",
    "/etc/passwd",
    "/etc/group",
    "/etc/hosts",
];

pub struct SandboxArgsBuilder {
    /// Extra read-only binds beyond the system defaults
    extra_ro_binds: Vec<PathBuf>,
    /// PATH inside the sandbox
    path_env: String,
}

impl SandboxArgsBuilder {
    pub fn new() -> Self {
        Self {
            extra_ro_binds: Vec::new(),
            path_env: "/usr/local/bin:/usr/bin:/bin".to_string(),
        }
    }

    /// Bind an additional host directory read-only (e.g. a toolchain root)
    pub fn ro_bind(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_ro_binds.push(path.into());
        self
    }

    /// Assemble the launcher argument vector for one command in one
    /// workspace. Tokens pass the gate first; the workspace must be an
    /// absolute, traversal-free path (the caller resolves it through
    /// [`sanitize::resolve_workspace`]).
    ///
    /// Ordering invariant: the workspace bind is the only writable mount and
    /// comes after every broader read-only bind, so a later read-only
    /// remount of an ancestor can never shadow it.
    pub fn build_args(
        &self,
        command_tokens: &[String],
        workspace: &Path,
    ) -> Result<SandboxInvocation> {
        let (command, args) = command_tokens.split_first().ok_or_else(|| {
            GovernanceError::Validation("empty command token list".to_string())
        })?;
        sanitize::validate_command_token(command)?;
        for arg in args {
            sanitize::validate_argument_token(arg)?;
        }

        if !workspace.is_absolute() {
            return Err(GovernanceError::Validation(format!(
                "workspace path must be absolute: {}",
                workspace.display()
            )));
        }
        let workspace_str = workspace.to_str().ok_or_else(|| {
            GovernanceError::Validation("workspace path is not valid UTF-8".to_string())
        })?;
        if workspace_str.contains("..") {
            return Err(GovernanceError::Validation(
                "workspace path contains traversal components".to_string(),
            ));
        }

        let mut argv: Vec<String> = Vec::new();

        // (a) read-only system binds first
        for dir in RO_SYSTEM_DIRS {
            if Path::new(dir).exists() {
                push3(&mut argv, "--ro-bind", dir, dir);
            }
        }
        for file in RO_SYSTEM_FILES {
            if Path::new(file).exists() {
                push3(&mut argv, "--ro-bind", file, file);
            }
        }
        for extra in &self.extra_ro_binds {
            if let Some(s) = extra.to_str() {
                push3(&mut argv, "--ro-bind", s, s);
            }
        }
        argv.push("--proc".to_string());
        argv.push("/proc".to_string());
        if Path::new("/sys").exists() {
            push3(&mut argv, "--ro-bind", "/sys", "/sys");
        }

        // (b) the single writable mount
        push3(&mut argv, "--bind", workspace_str, workspace_str);

        // (c) empty scratch filesystems
        argv.push("--tmpfs".to_string());
        argv.push("/tmp".to_string());
        argv.push("--tmpfs".to_string());
        argv.push("/var".to_string());
        argv.push("--dev".to_string());
        argv.push("/dev".to_string());

        // (d) canonical symlinks for merged-usr layouts
        if !Path::new("/bin").exists() {
            push3(&mut argv, "--symlink", "usr/bin", "/bin");
        }
        if !Path::new("/sbin").exists() {
            push3(&mut argv, "--symlink", "usr/sbin", "/sbin");
        }

        // (e) working directory
        argv.push("--chdir".to_string());
        argv.push(workspace_str.to_string());

        // (f) namespace unsharing; user namespaces may be denied by the
        // kernel, so the -try form is used for that one
        argv.push("--unshare-user-try".to_string());
        argv.push("--unshare-pid".to_string());
        argv.push("--unshare-ipc".to_string());
        argv.push("--unshare-uts".to_string());

        // (g) no orphaned sandboxes
        argv.push("--die-with-parent".to_string());

        // (h) explicit minimal environment, never the inherited one
        argv.push("--clearenv".to_string());
        push3(&mut argv, "--setenv", "PATH", &self.path_env);
        push3(&mut argv, "--setenv", "HOME", workspace_str);
        let cargo_home = format!("{}/.cargo", workspace_str);
        push3(&mut argv, "--setenv", "CARGO_HOME", &cargo_home);

        // (i) the real command last
        argv.extend(command_tokens.iter().cloned());

        Ok(SandboxInvocation {
            argv,
            workspace: workspace.to_path_buf(),
        })
    }
}

impl Default for SandboxArgsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn push3(argv: &mut Vec<String>, flag: &str, a: &str, b: &str) {
    argv.push(flag.to_string());
    argv.push(a.to_string());
    argv.push(b.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn build(parts: &[&str], workspace: &str) -> Result<SandboxInvocation> {
        SandboxArgsBuilder::new().build_args(&tokens(parts), Path::new(workspace))
    }

    #[test]
    fn command_tokens_come_last() {
        let inv = build(&["cargo", "build", "--release"], "/srv/tenants/alice/ws").unwrap();
        let n = inv.argv.len();
        assert_eq!(&inv.argv[n - 3..], &["cargo", "build", "--release"]);
    }

    #[test]
    fn workspace_is_the_only_writable_bind() {
        let inv = build(&["forge", "test"], "/srv/tenants/alice/ws").unwrap();
        let writable: Vec<usize> = inv
            .argv
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "--bind")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(writable.len(), 1);
        assert_eq!(inv.argv[writable[0] + 1], "/srv/tenants/alice/ws");
    }

    #[test]
    fn workspace_bind_ordered_after_readonly_binds() {
        let inv = build(&["nargo", "check"], "/srv/tenants/bob/ws").unwrap();
        let last_ro = inv
            .argv
            .iter()
            .rposition(|a| a == "--ro-bind")
            .expect("at least one read-only bind");
        let rw = inv
            .argv
            .iter()
            .position(|a| a == "--bind")
            .expect("workspace bind");
        assert!(rw > last_ro, "workspace bind must follow read-only binds");
    }

    #[test]
    fn environment_is_explicit_not_inherited() {
        let inv = build(&["slither", "."], "/srv/tenants/carol/ws").unwrap();
        let clearenv = inv.argv.iter().position(|a| a == "--clearenv").unwrap();
        let setenv = inv.argv.iter().position(|a| a == "--setenv").unwrap();
        assert!(setenv > clearenv);
        assert!(inv.argv.iter().any(|a| a == "PATH"));
        assert!(inv.argv.iter().any(|a| a == "CARGO_HOME"));
    }

    #[test]
    fn namespaces_and_parent_tether_present() {
        let inv = build(&["anchor", "build"], "/srv/tenants/dave/ws").unwrap();
        for flag in [
            "--unshare-user-try",
            "--unshare-pid",
            "--unshare-ipc",
            "--unshare-uts",
            "--die-with-parent",
            "--chdir",
        ] {
            assert!(inv.argv.iter().any(|a| a == flag), "missing {}", flag);
        }
    }

    #[test]
    fn rejects_hostile_tokens_and_paths() {
        assert!(build(&[], "/srv/ws").is_err());
        assert!(build(&["sh; rm"], "/srv/ws").is_err());
        assert!(build(&["cast", "`id`"], "/srv/ws").is_err());
        assert!(build(&["cargo", "build"], "relative/ws").is_err());
        assert!(build(&["cargo", "build"], "/srv/../etc").is_err());
    }
}

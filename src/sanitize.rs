/// Input sanitization gate for injection prevention and path validation
///
/// Every externally supplied string crosses one of these validators before it
/// can reach a filesystem path or a command line. All validators are total
/// and fail closed: anything outside the allow-list is rejected with a
/// descriptive, secret-free message and no filesystem call happens first.
use crate::types::{GovernanceError, Result};
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};

/// Gate violation types for validation failures
#[derive(Debug, thiserror::Error)]
pub enum GateViolation {
    #[error("Invalid project id: {0}")]
    InvalidProjectId(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Path traversal attempt detected")]
    PathTraversal,

    #[error("Invalid port: {0} (must be 1-65535)")]
    InvalidPort(i64),

    #[error("Invalid pid: {0} (must be positive)")]
    InvalidPid(i64),

    #[error("Command token not allowed: {0}")]
    CommandNotAllowed(String),

    #[error("Argument token not allowed: {0}")]
    ArgumentNotAllowed(String),

    #[error("Workspace escape attempt: {0}")]
    WorkspaceEscape(String),
}

impl From<GateViolation> for GovernanceError {
    fn from(err: GateViolation) -> Self {
        GovernanceError::Validation(err.to_string())
    }
}

/// Shell metacharacters rejected in project ids
const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '\\', '\'', '"', '<', '>', '\n', '\r',
];

/// Validate a project identifier. Returns the input unchanged on success.
///
/// Allow-list is `[A-Za-z0-9_-]+`; `..`, absolute paths, and shell
/// metacharacters are rejected explicitly so rejection messages stay
/// specific.
pub fn sanitize_project_id(project_id: &str) -> Result<&str> {
    if project_id.is_empty() {
        return Err(GateViolation::InvalidProjectId("empty".to_string()).into());
    }
    if project_id.contains("..") {
        return Err(GateViolation::PathTraversal.into());
    }
    if project_id.starts_with('/') || project_id.starts_with('\\') {
        return Err(
            GateViolation::InvalidProjectId("absolute path not allowed".to_string()).into(),
        );
    }
    if project_id.contains(SHELL_METACHARACTERS) {
        return Err(
            GateViolation::InvalidProjectId("shell metacharacter rejected".to_string()).into(),
        );
    }
    if !project_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(GateViolation::InvalidProjectId(
            "only [A-Za-z0-9_-] permitted".to_string(),
        )
        .into());
    }
    Ok(project_id)
}

/// Validate a file name, decoding percent-escapes first.
///
/// Decoding before validating closes the encoded-traversal bypass
/// (`%2e%2e%2f` passing a raw `..` check). When the input is not valid
/// percent-encoding the raw string is validated instead.
pub fn validate_and_decode_file_name(file_name: &str) -> Result<String> {
    if file_name.is_empty() {
        return Err(GateViolation::InvalidFileName("empty".to_string()).into());
    }

    let decoded = match percent_decode_str(file_name).decode_utf8() {
        Ok(cow) => cow.into_owned(),
        Err(_) => file_name.to_string(),
    };

    for candidate in [file_name, decoded.as_str()] {
        if candidate.contains("..") {
            return Err(GateViolation::PathTraversal.into());
        }
        if candidate.starts_with('/') || candidate.starts_with('\\') {
            return Err(
                GateViolation::InvalidFileName("leading path separator".to_string()).into(),
            );
        }
    }

    if !decoded
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'))
    {
        return Err(GateViolation::InvalidFileName(
            "only [A-Za-z0-9._/-] permitted".to_string(),
        )
        .into());
    }

    Ok(decoded)
}

/// Validate a TCP/UDP port number
pub fn validate_port(port: i64) -> Result<u16> {
    if !(1..=65535).contains(&port) {
        return Err(GateViolation::InvalidPort(port).into());
    }
    Ok(port as u16)
}

/// Validate a process id
pub fn validate_pid(pid: i64) -> Result<u32> {
    if pid <= 0 || pid > u32::MAX as i64 {
        return Err(GateViolation::InvalidPid(pid).into());
    }
    Ok(pid as u32)
}

/// Validate a command token against the closed allow-list `[A-Za-z0-9_-\s]+`
pub fn validate_command_token(token: &str) -> Result<&str> {
    if token.is_empty()
        || !token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c.is_ascii_whitespace())
    {
        return Err(GateViolation::CommandNotAllowed(token.to_string()).into());
    }
    Ok(token)
}

/// Validate an argument token. Slightly richer than the command allow-list:
/// flags, paths, key=value pairs and version strings must survive, shell
/// control characters must not.
pub fn validate_argument_token(token: &str) -> Result<&str> {
    if token.is_empty()
        || !token.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '_' | '-' | '.' | '/' | '=' | ':' | ',' | '@' | '+')
                || c.is_ascii_whitespace()
        })
    {
        return Err(GateViolation::ArgumentNotAllowed(token.to_string()).into());
    }
    Ok(token)
}

/// Path containment module for workspace resolution
pub mod path_containment {
    use super::*;

    /// Lexically normalize a path: resolve `.` and `..` components without
    /// touching the filesystem. `..` above the root is reported as traversal.
    fn normalize(path: &Path) -> Result<PathBuf> {
        let mut normalized = PathBuf::new();
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(GateViolation::PathTraversal.into());
                    }
                    if normalized.as_os_str().is_empty() {
                        return Err(GateViolation::PathTraversal.into());
                    }
                }
                Component::CurDir => {}
                other => normalized.push(other),
            }
        }
        Ok(normalized)
    }

    /// Resolve `candidate` inside `root` and prove containment.
    ///
    /// The candidate equals the root or is root-prefixed at a full path
    /// separator boundary; a plain string prefix is not enough
    /// (`/srv/tenant-evil` must never match root `/srv/tenant`).
    pub fn resolve_workspace(root: &Path, candidate: &str) -> Result<PathBuf> {
        if !root.is_absolute() {
            return Err(GateViolation::WorkspaceEscape(format!(
                "workspace root must be absolute: {}",
                root.display()
            ))
            .into());
        }

        let joined = if Path::new(candidate).is_absolute() {
            PathBuf::from(candidate)
        } else {
            root.join(candidate)
        };

        let root = normalize(root)?;
        let resolved = normalize(&joined)?;

        if !is_contained(&root, &resolved) {
            return Err(GateViolation::WorkspaceEscape(format!(
                "{} is outside the workspace root",
                resolved.display()
            ))
            .into());
        }

        Ok(resolved)
    }

    /// Boundary-aware prefix check over path components
    pub fn is_contained(root: &Path, candidate: &Path) -> bool {
        candidate == root || candidate.starts_with(root)
    }
}

pub use path_containment::resolve_workspace;

/// Quote a value for display inside a shell-ish command line.
///
/// Defense-in-depth only: values reach this function after an allow-list
/// validator accepted them, and real execution goes through discrete
/// argument vectors, never through a shell string.
pub fn shell_escape(value: &str) -> String {
    #[cfg(unix)]
    {
        if !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':'))
        {
            return value.to_string();
        }
        format!("'{}'", value.replace('\'', r"'\''"))
    }
    #[cfg(not(unix))]
    {
        format!("\"{}\"", value.replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_clean_project_ids() {
        assert_eq!(sanitize_project_id("my-project_1").unwrap(), "my-project_1");
        assert_eq!(sanitize_project_id("ABC123").unwrap(), "ABC123");
    }

    #[test]
    fn rejects_traversal_project_ids() {
        assert!(sanitize_project_id("../../etc/passwd").is_err());
        assert!(sanitize_project_id("..").is_err());
        assert!(sanitize_project_id("/etc").is_err());
        assert!(sanitize_project_id("").is_err());
    }

    #[test]
    fn rejects_shell_metacharacters_in_project_ids() {
        for bad in [
            "a;b", "a&b", "a|b", "a`b", "a$b", "a(b", "a)b", "a{b", "a}b", "a[b", "a]b", "a\\b",
        ] {
            assert!(sanitize_project_id(bad).is_err(), "should reject {:?}", bad);
        }
    }

    #[test]
    fn decodes_legal_file_names_unchanged() {
        assert_eq!(
            validate_and_decode_file_name("report.json").unwrap(),
            "report.json"
        );
        assert_eq!(
            validate_and_decode_file_name("sub/dir/file-1.txt").unwrap(),
            "sub/dir/file-1.txt"
        );
    }

    #[test]
    fn rejects_encoded_traversal() {
        // %2e%2e%2f == "../"
        assert!(validate_and_decode_file_name("%2e%2e%2fetc/passwd").is_err());
        assert!(validate_and_decode_file_name("..%2fsecret").is_err());
        assert!(validate_and_decode_file_name("%2fabs/path").is_err());
    }

    #[test]
    fn rejects_raw_traversal_and_leading_separator() {
        assert!(validate_and_decode_file_name("../up.json").is_err());
        assert!(validate_and_decode_file_name("/abs.json").is_err());
        assert!(validate_and_decode_file_name("\\win.json").is_err());
        assert!(validate_and_decode_file_name("").is_err());
    }

    #[test]
    fn port_and_pid_bounds() {
        assert_eq!(validate_port(8080).unwrap(), 8080);
        assert!(validate_port(0).is_err());
        assert!(validate_port(65536).is_err());
        assert!(validate_port(-1).is_err());

        assert_eq!(validate_pid(1234).unwrap(), 1234);
        assert!(validate_pid(0).is_err());
        assert!(validate_pid(-5).is_err());
    }

    #[test]
    fn command_tokens_are_narrow() {
        assert!(validate_command_token("forge build").is_ok());
        assert!(validate_command_token("cargo-fuzz").is_ok());
        assert!(validate_command_token("rm -rf /;").is_err());
        assert!(validate_command_token("$(reboot)").is_err());
        assert!(validate_command_token("").is_err());
    }

    #[test]
    fn argument_tokens_allow_flags_and_paths() {
        assert!(validate_argument_token("--out-dir=target/release").is_ok());
        assert!(validate_argument_token("rpc:127.0.0.1,8545").is_ok());
        assert!(validate_argument_token("a|b").is_err());
        assert!(validate_argument_token("`id`").is_err());
    }

    #[test]
    fn workspace_resolution_contains_descendants() {
        let root = Path::new("/srv/tenants/alice");
        let resolved = resolve_workspace(root, "sub/dir").unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/tenants/alice/sub/dir"));
        assert!(path_containment::is_contained(root, &resolved));
    }

    #[test]
    fn workspace_resolution_rejects_escape() {
        let root = Path::new("/srv/tenants/alice");
        assert!(resolve_workspace(root, "../../etc").is_err());
        assert!(resolve_workspace(root, "/etc/passwd").is_err());
        assert!(resolve_workspace(root, "sub/../../bob").is_err());
    }

    #[test]
    fn sibling_prefix_is_not_containment() {
        let root = Path::new("/srv/tenant");
        assert!(resolve_workspace(root, "/srv/tenant-evil/x").is_err());
        // The root itself resolves fine
        assert_eq!(
            resolve_workspace(root, ".").unwrap(),
            PathBuf::from("/srv/tenant")
        );
    }

    #[cfg(unix)]
    #[test]
    fn shell_escape_quotes_suspicious_values() {
        assert_eq!(shell_escape("plain-value.txt"), "plain-value.txt");
        assert_eq!(shell_escape("has space"), "'has space'");
        assert_eq!(shell_escape("a'b"), r"'a'\''b'");
    }
}

//! Integration tests for the governance substrate
//!
//! These tests verify cross-module interactions: validation ordering,
//! ensure-then-attach, quota boundaries, and end-to-end secret redaction.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tenantbox::{
    AuditLog, FileUpload, GovernanceError, LogLevel, ProcessLimiter, RLimitSpec,
    SandboxArgsBuilder, ScopedFileStore, StoreConfig, TenantHierarchy, TenantLimits,
};

fn fake_hierarchy(dir: &Path) -> TenantHierarchy {
    fs::write(dir.join("cgroup.controllers"), "cpu memory pids io").unwrap();
    fs::write(dir.join("cgroup.subtree_control"), "").unwrap();
    TenantHierarchy::with_root(dir.to_path_buf())
}

#[test]
fn ensure_then_attach_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let hierarchy = fake_hierarchy(dir.path());

    let limits = TenantLimits {
        memory_max: Some("1G".to_string()),
        pids_max: Some(50),
        ..Default::default()
    };

    let report = hierarchy.ensure_tenant("tenant-a", &limits).unwrap();
    assert!(report.outcomes.contains_key("memory.max"));

    let outcome = hierarchy.attach("tenant-a", 1234).unwrap();
    assert!(outcome.applied);

    let tenant = hierarchy.tenant_path("tenant-a");
    assert_eq!(fs::read_to_string(tenant.join("pids.max")).unwrap(), "50");
    assert_eq!(
        fs::read_to_string(tenant.join("cgroup.procs")).unwrap(),
        "1234"
    );
}

#[test]
fn double_ensure_leaves_identical_state() {
    let dir = tempfile::TempDir::new().unwrap();
    let hierarchy = fake_hierarchy(dir.path());
    let limits = TenantLimits {
        cpu_weight: Some(150),
        memory_high: Some("256M".to_string()),
        ..Default::default()
    };

    hierarchy.ensure_tenant("tenant-b", &limits).unwrap();
    let tenant = hierarchy.tenant_path("tenant-b");
    let snapshot = |name: &str| fs::read_to_string(tenant.join(name)).unwrap();
    let (w1, h1) = (snapshot("cpu.weight"), snapshot("memory.high"));

    hierarchy.ensure_tenant("tenant-b", &limits).unwrap();
    assert_eq!(snapshot("cpu.weight"), w1);
    assert_eq!(snapshot("memory.high"), h1);
    // Exactly one tenant directory, no duplicates
    let tenants: Vec<_> = fs::read_dir(dir.path().join("tenants"))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(tenants.len(), 1);
}

#[test]
fn gate_rejects_before_any_filesystem_mutation() {
    let dir = tempfile::TempDir::new().unwrap();
    let hierarchy = fake_hierarchy(dir.path());

    for hostile in ["../../etc/passwd", "a;b", "a|b", "a$(id)", "a`id`"] {
        let err = hierarchy
            .ensure_tenant(hostile, &TenantLimits::default())
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Validation(_)));
    }
    assert!(!dir.path().join("tenants").exists());
}

#[test]
fn store_quota_lifecycle() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = ScopedFileStore::new(StoreConfig {
        base_dir: dir.path().to_path_buf(),
        max_file_size: 4096,
        max_files_per_project: 2,
        extension: "json".to_string(),
    });

    let upload = |name: &str| FileUpload {
        project_id: "proj".to_string(),
        file_name: name.to_string(),
        content: "{}".to_string(),
    };

    store.create_file(&upload("a")).unwrap();
    store.create_file(&upload("b")).unwrap();
    assert!(matches!(
        store.create_file(&upload("c")),
        Err(GovernanceError::Quota(_))
    ));

    assert!(store.remove_file("proj", "a").unwrap());
    store.create_file(&upload("c")).unwrap();
    assert_eq!(store.file_count("proj").unwrap(), 2);
}

#[test]
fn sandbox_argv_wraps_validated_command() {
    let builder = SandboxArgsBuilder::new();
    let command = vec!["cargo".to_string(), "build".to_string()];
    let inv = builder
        .build_args(&command, Path::new("/srv/tenants/alice/ws"))
        .unwrap();

    // Real command tokens last, launcher flags before them
    assert_eq!(&inv.argv[inv.argv.len() - 2..], &["cargo", "build"]);
    assert!(inv.argv.contains(&"--die-with-parent".to_string()));
    assert_eq!(inv.workspace, Path::new("/srv/tenants/alice/ws"));
}

#[test]
fn secrets_never_reach_the_audit_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let audit = AuditLog::new("integration", Some(dir.path().to_path_buf())).unwrap();
    audit.register_secret("sk_live_abc123");

    let mut ctx = BTreeMap::new();
    ctx.insert(
        "command".to_string(),
        serde_json::Value::String(audit.secure_command(
            "cast",
            &["--private-key".to_string(), "sk_live_abc123".to_string()],
        )),
    );
    audit
        .secure_log("deploy key=sk_live_abc123", LogLevel::Info, Some(ctx))
        .unwrap();

    let written = fs::read_to_string(audit.log_path()).unwrap();
    assert!(written.contains("key=********"));
    assert!(written.contains("--private-key ********"));
    assert!(!written.contains("sk_live_abc123"));
}

#[test]
fn rlimit_degrades_without_failing_the_run() {
    let limiter = ProcessLimiter::with_utility("/nonexistent/prlimit");
    let spec = RLimitSpec {
        nproc: Some(64),
        nofile: Some(1024),
        ..Default::default()
    };

    let report = limiter.apply(std::process::id() as i64, &spec).unwrap();
    assert!(!report.fully_applied());
    assert_eq!(report.skipped().len(), 2);
}

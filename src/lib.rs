//! tenantbox: per-tenant resource governance and sandbox construction
//!
//! Lets many untrusted tenants run developer-tool subprocesses (compilers,
//! validators, provers, fuzzers) on shared hosts without one tenant starving
//! or compromising another. Tool adapters and the exec layer are external
//! collaborators: this crate validates inputs, computes resource limits, and
//! constructs the arguments and on-disk state those limits require. It never
//! spawns or tracks subprocess lifecycles itself.
//!
//! # Architecture
//!
//! Components, leaves first:
//!
//! - [`sanitize`]: fail-closed validators for every externally supplied
//!   string (ids, paths, ports, pids, command/argument tokens)
//! - [`storage`]: quota-bounded per-project file store
//! - [`cgroup`]: cgroup v2 tenant hierarchy (create, delegate, limit, attach)
//! - [`rlimit`]: POSIX rlimit application to live pids, layered under cgroups
//! - [`sandbox`]: bubblewrap namespace/bind-mount argument construction
//! - [`audit`]: secret-redacting structured audit log
//! - [`ownership`]: OS ownership/permission normalization after writes
//! - [`config`]: environment-driven limit configuration
//!
//! Control flow for one adapter request: the gate validates every field,
//! the hierarchy ensures the tenant's cgroup and limits exist, the sandbox
//! builder assembles the launcher argv around the externally spawned
//! command, the new pid is attached and rlimited, ownership transfer
//! normalizes permissions after file mutations, and every logged value
//! passes through the audit log's mask.
//!
//! # Design principles
//!
//! 1. **Fail closed at the gate** - no external string reaches a path or
//!    command line unvalidated
//! 2. **Degrade, don't die** - resource-limit writes are best-effort and
//!    report explicit [`types::ApplyOutcome`]s instead of failing the run
//! 3. **Data, not side effects** - the sandbox builder only produces argv;
//!    spawning belongs to the exec layer
//! 4. **No shell strings** - commands are discrete argument vectors end to
//!    end; escaping exists only as display-layer defense in depth

pub mod audit;
pub mod cgroup;
pub mod config;
pub mod ownership;
pub mod rlimit;
pub mod sandbox;
pub mod sanitize;
pub mod storage;
pub mod types;

pub use audit::AuditLog;
pub use cgroup::TenantHierarchy;
pub use ownership::OwnershipManager;
pub use rlimit::ProcessLimiter;
pub use sandbox::SandboxArgsBuilder;
pub use storage::{ScopedFileStore, StoreConfig};
pub use types::{
    ApplyOutcome, ApplyReport, FileUpload, GovernanceError, LogEntry, LogLevel, RLimitSpec,
    Result, SandboxInvocation, StoredFile, TenantLimits,
};

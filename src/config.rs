/// Environment-driven limit configuration
///
/// Operators tune per-tenant governance through a fixed set of TENANT_*
/// variables. Absent or unparseable values leave the field unset, which
/// means "inherit from the parent cgroup", never zero.
use crate::types::TenantLimits;
use std::env;

pub const ENV_CPU_WEIGHT: &str = "TENANT_CPU_WEIGHT";
pub const ENV_CPU_MAX: &str = "TENANT_CPU_MAX";
pub const ENV_MEM_HIGH: &str = "TENANT_MEM_HIGH";
pub const ENV_MEM_MAX: &str = "TENANT_MEM_MAX";
pub const ENV_PIDS_MAX: &str = "TENANT_PIDS_MAX";

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TenantLimits {
    /// Parse the fixed TENANT_* variable set into limits
    pub fn from_environment() -> Self {
        Self {
            cpu_weight: env_string(ENV_CPU_WEIGHT).and_then(|v| v.parse().ok()),
            cpu_max: env_string(ENV_CPU_MAX),
            memory_high: env_string(ENV_MEM_HIGH),
            memory_max: env_string(ENV_MEM_MAX),
            pids_max: env_string(ENV_PIDS_MAX).and_then(|v| v.parse().ok()),
        }
    }
}

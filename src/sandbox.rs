mod docker;
mod runtime;

// Re-export the trait and common types
pub use docker::DockerRuntime;
pub use runtime::SandboxRuntime;

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Opaque id of one live sandbox instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxHandle(String);

impl SandboxHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SandboxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Container ids are long; the first 12 characters identify them
        f.write_str(self.0.get(..12).unwrap_or(self.0.as_str()))
    }
}

/// Largest memory ceiling a backend is asked to enforce
pub const MAX_MEMORY_BYTES: u64 = i64::MAX as u64;

/// Hard resource ceilings of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub memory_bytes: u64,
    /// CPU allotment in billionths of a core
    pub cpu_nanos: u64,
    pub pids_limit: u64,
    pub oom_kill: bool,
}

/// Isolation settings of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityPosture {
    pub network_disabled: bool,
    pub no_new_privileges: bool,
    pub ephemeral_storage: bool,
}

impl SecurityPosture {
    /// The posture every judged program runs under
    pub const LOCKED_DOWN: Self = Self {
        network_disabled: true,
        no_new_privileges: true,
        ephemeral_storage: true,
    };
}

/// Everything a backend needs to create one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    pub image: String,
    pub command: Vec<String>,
    pub working_dir: String,
    pub limits: ResourceLimits,
    pub security: SecurityPosture,
}

/// How waiting on an instance ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited(i64),
    DeadlineExceeded,
}

/// Demultiplexed output streams of an instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceLogs {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Failure of a sandbox backend call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("sandbox runtime unavailable: {0}")]
    Unavailable(String),
    #[error("sandbox {operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },
}

impl RuntimeError {
    pub fn api(operation: &'static str, err: impl fmt::Display) -> Self {
        Self::Api {
            operation,
            message: err.to_string(),
        }
    }
}

/// Sandbox tuning shared by every run
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxSettings {
    /// Lowest memory ceiling ever applied, whatever the submission asks for
    pub memory_floor_mb: u64,
    pub pids_limit: u64,
    pub cpu_nanos: u64,
    pub working_dir: String,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            memory_floor_mb: 512,
            pids_limit: 100,
            cpu_nanos: 1_000_000_000,
            working_dir: "/usr/app".to_string(),
        }
    }
}

impl SandboxSettings {
    /// Limits for a run that asked for `memory_limit_mb`
    ///
    /// The ceiling saturates at [`MAX_MEMORY_BYTES`] so an absurd request can
    /// never wrap around to "no limit".
    pub fn limits_for(&self, memory_limit_mb: u64) -> ResourceLimits {
        let memory_mb = memory_limit_mb.max(self.memory_floor_mb);
        ResourceLimits {
            memory_bytes: memory_mb.saturating_mul(1024 * 1024).min(MAX_MEMORY_BYTES),
            cpu_nanos: self.cpu_nanos,
            pids_limit: self.pids_limit,
            oom_kill: true,
        }
    }

    /// Absolute path of `file_name` inside the instance
    pub fn path_in_sandbox(&self, file_name: &str) -> String {
        format!("{}/{}", self.working_dir.trim_end_matches('/'), file_name)
    }
}

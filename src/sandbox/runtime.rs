use std::time::Duration;

use async_trait::async_trait;

use super::{InstanceLogs, InstanceSpec, RuntimeError, SandboxHandle, WaitOutcome};

/// Backend capable of running programs in isolated, disposable instances
///
/// This trait abstracts the primitives the executor needs, so a container
/// engine, a micro-VM manager or a namespace sandbox can be swapped in without
/// touching the judging logic. Every call is a single attempt; callers decide
/// what a failure means.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Creates a stopped instance that will run `spec.command` when started
    async fn create(&self, spec: &InstanceSpec) -> Result<SandboxHandle, RuntimeError>;

    /// Places `contents` at the absolute path `dest` inside the instance
    async fn inject_file(
        &self,
        handle: &SandboxHandle,
        contents: Vec<u8>,
        dest: &str,
    ) -> Result<(), RuntimeError>;

    async fn start(&self, handle: &SandboxHandle) -> Result<(), RuntimeError>;

    /// Resolves with the exit code once the entry process has terminated
    async fn wait(&self, handle: &SandboxHandle) -> Result<i64, RuntimeError>;

    /// Races [`SandboxRuntime::wait`] against `deadline`
    ///
    /// The instance is left running when the deadline wins; killing it is up
    /// to the caller.
    async fn wait_for_exit(
        &self,
        handle: &SandboxHandle,
        deadline: Duration,
    ) -> Result<WaitOutcome, RuntimeError> {
        tokio::select! {
            code = self.wait(handle) => code.map(WaitOutcome::Exited),
            _ = tokio::time::sleep(deadline) => Ok(WaitOutcome::DeadlineExceeded),
        }
    }

    /// Terminates the instance immediately, without a grace period
    async fn kill(&self, handle: &SandboxHandle) -> Result<(), RuntimeError>;

    async fn read_logs(&self, handle: &SandboxHandle) -> Result<InstanceLogs, RuntimeError>;

    /// Peak (or current, if the backend cannot tell) memory usage in bytes
    async fn read_memory_usage(&self, handle: &SandboxHandle) -> Result<Option<u64>, RuntimeError>;

    /// Destroys the instance and everything stored in it
    async fn remove(&self, handle: &SandboxHandle) -> Result<(), RuntimeError>;
}

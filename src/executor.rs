use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::task;

use crate::checker::{self, CheckerKind};
use crate::config::StagingConfig;
use crate::error::{ExecutionError, JudgeError};
use crate::language::{INPUT_FILE_NAME, LanguageProfile, LanguageRegistry};
use crate::sandbox::{
    InstanceSpec, SandboxHandle, SandboxRuntime, SandboxSettings, SecurityPosture, WaitOutcome,
};
use crate::status::Status;

const STAGING_DIR_PREFIX: &str = "judge_sandbox_";
const TIME_LIMIT_DETAILS: &str = "Time Limit Exceeded";

/// One execution request: a program, one input and how to judge its output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub language: String,
    pub source_code: String,
    pub stdin: String,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
    pub expected_output: String,
    pub checker: CheckerKind,
}

/// Classified outcome of one sandboxed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub status: Status,
    /// Program output; normalized when a checker ran
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u64,
    pub peak_memory_mb: u64,
    pub details: String,
}

impl RunResult {
    pub fn internal_error(details: impl Into<String>) -> Self {
        Self {
            status: Status::InternalError,
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: 0,
            peak_memory_mb: 0,
            details: details.into(),
        }
    }
}

/// Anything able to turn a [`RunSpec`] into a [`RunResult`]
///
/// An `Err` means no result could be produced at all, which is different from
/// a run classified as `InternalError`.
#[async_trait]
pub trait Judger: Send + Sync {
    async fn execute(&self, spec: RunSpec) -> Result<RunResult, JudgeError>;
}

/// Source and input files written for one run
struct StagedRun {
    dir: TempDir,
    source: PathBuf,
    input: PathBuf,
}

impl StagedRun {
    /// Writes `source` and `stdin` into a fresh directory under `root`
    fn create(
        root: &Path,
        source_file: &str,
        source: &str,
        stdin: &str,
    ) -> Result<Self, ExecutionError> {
        fs::create_dir_all(root).map_err(ExecutionError::staging("create staging root"))?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_DIR_PREFIX)
            .tempdir_in(root)
            .map_err(ExecutionError::staging("create staging directory"))?;

        let source_path = dir.path().join(source_file);
        let input_path = dir.path().join(INPUT_FILE_NAME);
        fs::write(&source_path, source).map_err(ExecutionError::staging("write source"))?;
        fs::write(&input_path, stdin).map_err(ExecutionError::staging("write input"))?;

        Ok(Self {
            dir,
            source: source_path,
            input: input_path,
        })
    }

    fn purge(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            log::warn!("Failed to purge staging directory {}: {e}", path.display());
        }
    }
}

/// Owns a live instance until it is explicitly released
///
/// If the owning future is dropped before `release`, removal is handed to the
/// async runtime so the instance still goes away.
struct InstanceGuard {
    runtime: Arc<dyn SandboxRuntime>,
    handle: Option<SandboxHandle>,
}

impl InstanceGuard {
    fn new(runtime: Arc<dyn SandboxRuntime>, handle: SandboxHandle) -> Self {
        Self {
            runtime,
            handle: Some(handle),
        }
    }

    async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            remove_instance(self.runtime.as_ref(), &handle).await;
        }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let runtime = Arc::clone(&self.runtime);
                rt.spawn(async move { remove_instance(runtime.as_ref(), &handle).await });
            }
            Err(_) => log::error!("Sandbox {handle} leaked: no async runtime to remove it"),
        }
    }
}

async fn remove_instance(runtime: &dyn SandboxRuntime, handle: &SandboxHandle) {
    match runtime.remove(handle).await {
        Ok(()) => log::debug!("Sandbox {handle} removed"),
        Err(e) => log::error!("Failed to remove sandbox {handle}: {e}"),
    }
}

/// Status of a run that exited with `exit_code`, or `None` when the output
/// still has to go through the checker
fn classify_exit(compile_phase: bool, exit_code: i64, stdout: &str, stderr: &str) -> Option<Status> {
    if exit_code == 0 {
        return None;
    }

    // A failed build leaves diagnostics on stderr and never gets to print
    if compile_phase && stdout.is_empty() && !stderr.is_empty() {
        Some(Status::CompileError)
    } else {
        Some(Status::RuntimeError)
    }
}

fn bytes_to_mb(bytes: u64) -> u64 {
    bytes / 1024 / 1024
}

/// Runs single programs in fresh sandbox instances
///
/// Cheap to clone; clones share the runtime and the language table. Calls are
/// independent of each other and may run concurrently.
#[derive(Clone)]
pub struct SandboxExecutor {
    runtime: Arc<dyn SandboxRuntime>,
    languages: Arc<LanguageRegistry>,
    settings: SandboxSettings,
    staging: StagingConfig,
}

impl SandboxExecutor {
    pub fn new(
        runtime: Arc<dyn SandboxRuntime>,
        languages: Arc<LanguageRegistry>,
        settings: SandboxSettings,
        staging: StagingConfig,
    ) -> Self {
        Self {
            runtime,
            languages,
            settings,
            staging,
        }
    }

    /// Runs `spec` once and classifies the outcome
    ///
    /// Never fails: setup and runtime failures come back as `InternalError`
    /// with the cause in `details`. The sandbox instance and the staged files
    /// are gone by the time this returns.
    pub async fn run_once(&self, spec: &RunSpec) -> RunResult {
        match self.try_run(spec).await {
            Ok(result) => {
                log::info!(
                    "Run finished: language={} status={} time={}ms memory={}MB",
                    spec.language,
                    result.status,
                    result.elapsed_ms,
                    result.peak_memory_mb
                );
                result
            }
            Err(e) => {
                log::error!("Run failed before classification: {e}");
                RunResult::internal_error(e.to_string())
            }
        }
    }

    async fn try_run(&self, spec: &RunSpec) -> Result<RunResult, ExecutionError> {
        let profile = self.languages.resolve(&spec.language)?;
        let staged = self.stage(profile, spec).await?;

        let instance = InstanceSpec {
            image: profile.image.clone(),
            command: profile.entry_command(),
            working_dir: self.settings.working_dir.clone(),
            limits: self.settings.limits_for(spec.memory_limit_mb),
            security: SecurityPosture::LOCKED_DOWN,
        };
        let handle = self.runtime.create(&instance).await?;
        let guard = InstanceGuard::new(Arc::clone(&self.runtime), handle.clone());
        log::debug!("Sandbox {handle} created from {}", instance.image);

        let outcome = self.supervise(&handle, profile, spec, &staged).await;

        guard.release().await;
        if let Err(e) = task::spawn_blocking(move || staged.purge()).await {
            log::warn!("Staging purge task failed: {e}");
        }
        outcome
    }

    /// Writes the (transformed) source and the input off the async workers
    async fn stage(
        &self,
        profile: &LanguageProfile,
        spec: &RunSpec,
    ) -> Result<StagedRun, ExecutionError> {
        let root = self.staging.root.clone();
        let source_file = profile.source_file.clone();
        let source = profile.prepare_source(&spec.source_code).into_owned();
        let stdin = spec.stdin.clone();

        task::spawn_blocking(move || StagedRun::create(&root, &source_file, &source, &stdin))
            .await
            .map_err(io::Error::other)
            .map_err(ExecutionError::staging("join staging task"))?
    }

    async fn supervise(
        &self,
        handle: &SandboxHandle,
        profile: &LanguageProfile,
        spec: &RunSpec,
        staged: &StagedRun,
    ) -> Result<RunResult, ExecutionError> {
        let source = tokio::fs::read(&staged.source)
            .await
            .map_err(ExecutionError::staging("read source"))?;
        self.runtime
            .inject_file(handle, source, &self.settings.path_in_sandbox(&profile.source_file))
            .await?;
        let input = tokio::fs::read(&staged.input)
            .await
            .map_err(ExecutionError::staging("read input"))?;
        self.runtime
            .inject_file(handle, input, &self.settings.path_in_sandbox(INPUT_FILE_NAME))
            .await?;

        let deadline = profile.deadline(Duration::from_millis(spec.time_limit_ms));
        let started = Instant::now();
        self.runtime.start(handle).await?;

        let exit_code = match self.runtime.wait_for_exit(handle, deadline).await? {
            WaitOutcome::Exited(code) => code,
            WaitOutcome::DeadlineExceeded => {
                return Ok(self.time_limit_exceeded(handle, deadline).await);
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        log::debug!("Sandbox {handle} exited with code {exit_code} after {elapsed_ms}ms");

        let peak_memory_mb = self.peak_memory_mb(handle).await;
        let logs = self.runtime.read_logs(handle).await?;
        let stdout = String::from_utf8_lossy(&logs.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&logs.stderr).into_owned();

        if let Some(status) = classify_exit(profile.compile_phase, exit_code, &stdout, &stderr) {
            return Ok(RunResult {
                status,
                details: stderr.clone(),
                stdout,
                stderr,
                elapsed_ms,
                peak_memory_mb,
            });
        }

        let verdict = checker::check(&spec.checker, &stdout, &spec.expected_output);
        Ok(RunResult {
            status: verdict.status,
            stdout: verdict.actual_output,
            stderr,
            elapsed_ms,
            peak_memory_mb,
            details: verdict.details,
        })
    }

    /// Kills an instance that overran its deadline and reports it
    async fn time_limit_exceeded(&self, handle: &SandboxHandle, deadline: Duration) -> RunResult {
        log::debug!("Sandbox {handle} hit its {}ms deadline", deadline.as_millis());
        if let Err(e) = self.runtime.kill(handle).await {
            log::warn!("Failed to kill sandbox {handle}: {e}");
        }

        RunResult {
            status: Status::TimeLimitExceeded,
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: deadline.as_millis() as u64,
            peak_memory_mb: self.peak_memory_mb(handle).await,
            details: TIME_LIMIT_DETAILS.to_string(),
        }
    }

    /// Best-effort memory reading; 0 when the runtime cannot tell
    async fn peak_memory_mb(&self, handle: &SandboxHandle) -> u64 {
        match self.runtime.read_memory_usage(handle).await {
            Ok(bytes) => bytes.map_or(0, bytes_to_mb),
            Err(e) => {
                log::warn!("Failed to read memory usage of sandbox {handle}: {e}");
                0
            }
        }
    }
}

#[async_trait]
impl Judger for SandboxExecutor {
    /// Runs on its own task so a panic inside one run surfaces as an error
    /// instead of tearing down the caller
    async fn execute(&self, spec: RunSpec) -> Result<RunResult, JudgeError> {
        let executor = self.clone();
        tokio::spawn(async move { executor.run_once(&spec).await })
            .await
            .map_err(|e| JudgeError::Executor(e.to_string()))
    }
}

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use judger::checker::CheckerKind;
use judger::error::JudgeError;
use judger::executor::{Judger, RunResult, RunSpec};
use judger::judge::{Submission, TestCase};
use judger::sandbox::{InstanceLogs, InstanceSpec, RuntimeError, SandboxHandle, SandboxRuntime};
use judger::status::Status;

/// How the mocked program terminates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Code(i64),
    /// Never exits; only the deadline can end the wait
    Hang,
    /// The wait channel itself fails
    WaitError,
}

/// Behaviour of every instance created by a [`MockRuntime`]
#[derive(Debug, Clone)]
pub struct Script {
    pub exit: Exit,
    pub stdout: String,
    pub stderr: String,
    pub memory_bytes: Option<u64>,
    pub memory_error: bool,
    /// Name of the operation that should fail: "create", "inject", "start",
    /// "kill" or "read logs"
    pub fail_on: Option<&'static str>,
}

impl Script {
    pub fn exits(code: i64, stdout: &str, stderr: &str) -> Self {
        Self {
            exit: Exit::Code(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            memory_bytes: Some(16 * 1024 * 1024),
            memory_error: false,
            fail_on: None,
        }
    }

    pub fn hangs() -> Self {
        Self {
            exit: Exit::Hang,
            ..Self::exits(0, "", "")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(InstanceSpec),
    Inject {
        handle: SandboxHandle,
        dest: String,
        contents: Vec<u8>,
    },
    Start(SandboxHandle),
    Wait(SandboxHandle),
    Kill(SandboxHandle),
    ReadLogs(SandboxHandle),
    ReadMemory(SandboxHandle),
    Remove(SandboxHandle),
}

/// In-memory sandbox runtime that records every call it receives
pub struct MockRuntime {
    script: Script,
    next_id: AtomicU32,
    calls: Mutex<Vec<Call>>,
}

impl MockRuntime {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            next_id: AtomicU32::new(1),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn fail_if(&self, operation: &'static str) -> Result<(), RuntimeError> {
        if self.script.fail_on == Some(operation) {
            return Err(RuntimeError::api(operation, "mock failure"));
        }
        Ok(())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<InstanceSpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub fn removed(&self) -> Vec<SandboxHandle> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Remove(handle) => Some(handle),
                _ => None,
            })
            .collect()
    }

    pub fn injected(&self, dest: &str) -> Option<String> {
        self.calls().into_iter().find_map(|c| match c {
            Call::Inject { dest: d, contents, .. } if d == dest => {
                Some(String::from_utf8(contents).unwrap())
            }
            _ => None,
        })
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(*c)).count()
    }
}

#[async_trait]
impl SandboxRuntime for MockRuntime {
    async fn create(&self, spec: &InstanceSpec) -> Result<SandboxHandle, RuntimeError> {
        self.record(Call::Create(spec.clone()));
        self.fail_if("create")?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(SandboxHandle::new(format!("mock-{id}")))
    }

    async fn inject_file(
        &self,
        handle: &SandboxHandle,
        contents: Vec<u8>,
        dest: &str,
    ) -> Result<(), RuntimeError> {
        self.record(Call::Inject {
            handle: handle.clone(),
            dest: dest.to_string(),
            contents,
        });
        self.fail_if("inject")
    }

    async fn start(&self, handle: &SandboxHandle) -> Result<(), RuntimeError> {
        self.record(Call::Start(handle.clone()));
        self.fail_if("start")
    }

    async fn wait(&self, handle: &SandboxHandle) -> Result<i64, RuntimeError> {
        self.record(Call::Wait(handle.clone()));
        match self.script.exit {
            Exit::Code(code) => Ok(code),
            Exit::Hang => std::future::pending().await,
            Exit::WaitError => Err(RuntimeError::api("wait", "connection reset")),
        }
    }

    async fn kill(&self, handle: &SandboxHandle) -> Result<(), RuntimeError> {
        self.record(Call::Kill(handle.clone()));
        self.fail_if("kill")
    }

    async fn read_logs(&self, handle: &SandboxHandle) -> Result<InstanceLogs, RuntimeError> {
        self.record(Call::ReadLogs(handle.clone()));
        self.fail_if("read logs")?;
        Ok(InstanceLogs {
            stdout: self.script.stdout.as_bytes().to_vec(),
            stderr: self.script.stderr.as_bytes().to_vec(),
        })
    }

    async fn read_memory_usage(&self, handle: &SandboxHandle) -> Result<Option<u64>, RuntimeError> {
        self.record(Call::ReadMemory(handle.clone()));
        if self.script.memory_error {
            return Err(RuntimeError::api("read stats", "stats unavailable"));
        }
        Ok(self.script.memory_bytes)
    }

    async fn remove(&self, handle: &SandboxHandle) -> Result<(), RuntimeError> {
        self.record(Call::Remove(handle.clone()));
        Ok(())
    }
}

/// Judger replaying a fixed list of outcomes, one per call
pub struct ScriptedJudger {
    outcomes: Mutex<VecDeque<Result<RunResult, JudgeError>>>,
    specs: Mutex<Vec<RunSpec>>,
}

impl ScriptedJudger {
    pub fn new(outcomes: Vec<Result<RunResult, JudgeError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            specs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_statuses(statuses: &[Status]) -> Self {
        Self::new(
            statuses
                .iter()
                .enumerate()
                .map(|(i, s)| Ok(run_result(*s, 10 * (i as u64 + 1), 4 * (i as u64 + 1))))
                .collect(),
        )
    }

    pub fn specs(&self) -> Vec<RunSpec> {
        self.specs.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.specs.lock().unwrap().len()
    }
}

#[async_trait]
impl Judger for ScriptedJudger {
    async fn execute(&self, spec: RunSpec) -> Result<RunResult, JudgeError> {
        self.specs.lock().unwrap().push(spec);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .expect("judger called more often than scripted")
    }
}

pub fn run_result(status: Status, elapsed_ms: u64, peak_memory_mb: u64) -> RunResult {
    RunResult {
        status,
        stdout: format!("{status} output"),
        stderr: String::new(),
        elapsed_ms,
        peak_memory_mb,
        details: format!("{status} details"),
    }
}

pub fn run_spec(language: &str, code: &str) -> RunSpec {
    RunSpec {
        language: language.to_string(),
        source_code: code.to_string(),
        stdin: "1 2\n".to_string(),
        time_limit_ms: 1000,
        memory_limit_mb: 256,
        expected_output: "3".to_string(),
        checker: CheckerKind::Exact,
    }
}

pub fn submission(case_count: usize) -> Submission {
    Submission {
        id: "sub-1".to_string(),
        language: "python".to_string(),
        code: "print(sum(map(int, input().split())))".to_string(),
        time_limit_ms: 1000,
        memory_limit_mb: 256,
        checker: CheckerKind::Exact,
        custom_checker_code: None,
        test_cases: (1..=case_count)
            .map(|i| TestCase {
                id: format!("t{i}"),
                input: format!("{i} {i}\n"),
                expected_output: format!("{}\n", i * 2),
            })
            .collect(),
    }
}

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checker::CheckerKind;
use crate::error::JudgeError;
use crate::executor::{Judger, RunResult, RunSpec};
use crate::status::Status;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub id: String,
    #[serde(rename = "input_data")]
    pub input: String,
    pub expected_output: String,
}

/// One judging request; test case order is significant
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    #[serde(rename = "submission_id")]
    pub id: String,
    pub language: String,
    pub code: String,
    /// Milliseconds
    #[serde(rename = "time_limit")]
    pub time_limit_ms: u64,
    /// Megabytes
    #[serde(rename = "memory_limit")]
    pub memory_limit_mb: u64,
    #[serde(rename = "checker_type")]
    pub checker: CheckerKind,
    /// Accepted for compatibility, never evaluated
    #[serde(default)]
    pub custom_checker_code: Option<String>,
    pub test_cases: Vec<TestCase>,
}

impl Submission {
    fn run_spec(&self, case: &TestCase) -> RunSpec {
        RunSpec {
            language: self.language.clone(),
            source_code: self.code.clone(),
            stdin: case.input.clone(),
            time_limit_ms: self.time_limit_ms,
            memory_limit_mb: self.memory_limit_mb,
            expected_output: case.expected_output.clone(),
            checker: self.checker.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestVerdict {
    pub id: String,
    pub status: Status,
    #[serde(rename = "is_passed")]
    pub passed: bool,
    pub actual_output: String,
    #[serde(rename = "execution_time_ms")]
    pub elapsed_ms: u64,
    #[serde(rename = "memory_used_mb")]
    pub peak_memory_mb: u64,
    pub details: String,
}

impl TestVerdict {
    fn new(case: &TestCase, result: RunResult) -> Self {
        Self {
            id: case.id.clone(),
            status: result.status,
            passed: result.status.is_accepted(),
            actual_output: result.stdout,
            elapsed_ms: result.elapsed_ms,
            peak_memory_mb: result.peak_memory_mb,
            details: result.details,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmissionVerdict {
    pub submission_id: String,
    pub final_status: Status,
    #[serde(rename = "max_time_ms")]
    pub max_elapsed_ms: u64,
    pub max_memory_mb: u64,
    pub error_message: String,
    pub test_results: Vec<TestVerdict>,
}

impl SubmissionVerdict {
    fn empty(submission: &Submission) -> Self {
        Self {
            submission_id: submission.id.clone(),
            final_status: Status::Accepted,
            max_elapsed_ms: 0,
            max_memory_mb: 0,
            error_message: String::new(),
            test_results: Vec::with_capacity(submission.test_cases.len()),
        }
    }

    fn record(&mut self, verdict: TestVerdict) {
        self.max_elapsed_ms = self.max_elapsed_ms.max(verdict.elapsed_ms);
        self.max_memory_mb = self.max_memory_mb.max(verdict.peak_memory_mb);
        self.test_results.push(verdict);
    }
}

/// Judging stopped because the executor could not produce a result
///
/// Carries the verdict accumulated so far, already marked `InternalError`.
#[derive(Error, Debug)]
#[error("judging of submission {} aborted: {source}", .verdict.submission_id)]
pub struct AbortedJudging {
    pub verdict: SubmissionVerdict,
    #[source]
    pub source: JudgeError,
}

impl AbortedJudging {
    pub fn into_verdict(self) -> SubmissionVerdict {
        self.verdict
    }
}

/// Runs a submission's test cases in order and folds them into one verdict
#[derive(Clone)]
pub struct VerdictAggregator {
    judger: Arc<dyn Judger>,
}

impl VerdictAggregator {
    pub fn new(judger: Arc<dyn Judger>) -> Self {
        Self { judger }
    }

    /// Judges every test case, one at a time
    ///
    /// - The first compile or runtime error stops iteration and becomes the
    ///   final status; its details become the error message.
    /// - Any other failing status keeps iteration going; the first one seen
    ///   becomes the final status unless a later fatal status overrides it.
    /// - Maxima cover every executed case, passed or not.
    pub async fn judge(&self, submission: &Submission) -> Result<SubmissionVerdict, AbortedJudging> {
        let mut verdict = SubmissionVerdict::empty(submission);

        for (idx, case) in submission.test_cases.iter().enumerate() {
            let result = match self.judger.execute(submission.run_spec(case)).await {
                Ok(result) => result,
                Err(source) => {
                    log::error!(
                        "Submission {}: executor error on test {idx} ({}): {source}",
                        submission.id,
                        case.id
                    );
                    verdict.final_status = Status::InternalError;
                    verdict.error_message = source.to_string();
                    return Err(AbortedJudging { verdict, source });
                }
            };

            let test = TestVerdict::new(case, result);
            log::debug!(
                "Submission {}: test {} -> {}",
                submission.id,
                test.id,
                test.status
            );
            let status = test.status;
            let details = test.details.clone();
            verdict.record(test);

            if status.is_fatal() {
                verdict.final_status = status;
                verdict.error_message = details;
                break;
            }

            if !status.is_accepted() && verdict.final_status.is_accepted() {
                verdict.final_status = status;
            }
        }

        log::info!(
            "Submission {} judged: {} ({} of {} tests run)",
            submission.id,
            verdict.final_status,
            verdict.test_results.len(),
            submission.test_cases.len()
        );
        Ok(verdict)
    }
}

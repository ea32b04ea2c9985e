use std::io;

use thiserror::Error;

use crate::sandbox::RuntimeError;

/// Failures that stop a single run before it can be classified
///
/// None of these are retried. The executor turns each of them into an
/// `InternalError` verdict with the message below as details.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("staging failed: {context}: {source}")]
    StagingIo {
        context: &'static str,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    RuntimeApi(#[from] RuntimeError),
}

impl ExecutionError {
    pub(crate) fn staging(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::StagingIo { context, source }
    }
}

/// Executor-level failure observed by the aggregator
///
/// Distinct from an `InternalError` status: this means the executor itself
/// could not produce a result at all.
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("executor failed: {0}")]
    Executor(String),
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classified outcome of a single run or of a whole submission
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    #[serde(rename = "ACCEPTED")]
    Accepted,
    #[serde(rename = "WRONG_ANSWER")]
    WrongAnswer,
    #[serde(rename = "TIME_LIMIT")]
    TimeLimitExceeded,
    /// Reserved: no code path produces it yet
    #[serde(rename = "MEMORY_LIMIT")]
    MemoryLimitExceeded,
    #[serde(rename = "RUNTIME_ERROR")]
    RuntimeError,
    #[serde(rename = "COMPILE_ERROR")]
    CompileError,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl Status {
    /// Whether this status stops the remaining test cases of a submission
    ///
    /// Compile and runtime errors mean the program itself is broken, so further
    /// inputs cannot tell us anything new.
    pub fn is_fatal(self) -> bool {
        match self {
            Self::CompileError | Self::RuntimeError => true,
            Self::Accepted
            | Self::WrongAnswer
            | Self::TimeLimitExceeded
            | Self::MemoryLimitExceeded
            | Self::InternalError => false,
        }
    }

    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::WrongAnswer => "WRONG_ANSWER",
            Self::TimeLimitExceeded => "TIME_LIMIT",
            Self::MemoryLimitExceeded => "MEMORY_LIMIT",
            Self::RuntimeError => "RUNTIME_ERROR",
            Self::CompileError => "COMPILE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::Status;

/// Comparison strategy requested for a submission
///
/// Unknown kinds are kept rather than rejected, so the run can report which
/// checker it could not apply.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum CheckerKind {
    Exact,
    Unimplemented(String),
}

impl From<String> for CheckerKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "exact" => Self::Exact,
            _ => Self::Unimplemented(kind),
        }
    }
}

impl From<&str> for CheckerKind {
    fn from(kind: &str) -> Self {
        Self::from(kind.to_string())
    }
}

impl From<CheckerKind> for String {
    fn from(kind: CheckerKind) -> Self {
        match kind {
            CheckerKind::Exact => "exact".to_string(),
            CheckerKind::Unimplemented(kind) => kind,
        }
    }
}

impl fmt::Display for CheckerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Unimplemented(kind) => f.write_str(kind),
        }
    }
}

/// Result of comparing a program's output with the expected answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: Status,
    /// Normalized program output
    pub actual_output: String,
    pub details: String,
}

/// Strips leading and trailing whitespace; inner whitespace is significant
pub fn normalize(output: &str) -> &str {
    output.trim()
}

/// Judges `actual` against `expected` with the requested checker
///
/// Only called for runs that exited normally.
pub fn check(kind: &CheckerKind, actual: &str, expected: &str) -> Verdict {
    let actual = normalize(actual);
    let expected = normalize(expected);

    match kind {
        CheckerKind::Exact if actual == expected => Verdict {
            status: Status::Accepted,
            actual_output: actual.to_string(),
            details: "OK".to_string(),
        },
        CheckerKind::Exact => Verdict {
            status: Status::WrongAnswer,
            actual_output: actual.to_string(),
            details: format!("Output mismatch. Expected: '{expected}', Got: '{actual}'"),
        },
        CheckerKind::Unimplemented(name) => {
            log::warn!("Unsupported checker type: {name}");
            Verdict {
                status: Status::InternalError,
                actual_output: actual.to_string(),
                details: format!("Checker type not implemented: {name}"),
            }
        }
    }
}

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error::ExecutionError;

/// Name of the injected stdin file, relative to the sandbox working directory
pub const INPUT_FILE_NAME: &str = "input.txt";

/// Deadline multiplier applied to profiles with a compile phase
pub const COMPILE_DEADLINE_FACTOR: u32 = 3;

/// Class name the Java run command expects
pub const JAVA_CLASS_NAME: &str = "Solution";

lazy_static! {
    static ref JAVA_PUBLIC_CLASS: Regex = Regex::new(r"public\s+class\s+(\w+)").unwrap();
}

/// Rewrite applied to submitted source before it is staged
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceTransform {
    #[default]
    None,
    /// Renames the first `public class <Name>` to [`JAVA_CLASS_NAME`]
    JavaPublicClass,
}

impl SourceTransform {
    pub fn apply<'a>(&self, source: &'a str) -> Cow<'a, str> {
        match self {
            Self::None => Cow::Borrowed(source),
            // Only the first declaration is touched; nested or additional
            // public types are left as submitted.
            Self::JavaPublicClass => JAVA_PUBLIC_CLASS.replacen(
                source,
                1,
                format!("public class {JAVA_CLASS_NAME}").as_str(),
            ),
        }
    }
}

/// How to build and run one language inside a sandbox
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    pub id: String,
    pub image: String,
    pub source_file: String,
    /// Shell command run with `sh -c`; compiles (if needed) then runs with
    /// stdin redirected from [`INPUT_FILE_NAME`]
    pub command: String,
    #[serde(default)]
    pub compile_phase: bool,
    #[serde(default = "default_deadline_factor")]
    pub deadline_factor: u32,
    #[serde(default)]
    pub source_transform: SourceTransform,
}

fn default_deadline_factor() -> u32 {
    COMPILE_DEADLINE_FACTOR
}

impl LanguageProfile {
    fn builtin(
        id: &str,
        image: &str,
        source_file: &str,
        command: &str,
        compile_phase: bool,
    ) -> Self {
        Self {
            id: id.to_string(),
            image: image.to_string(),
            source_file: source_file.to_string(),
            command: command.to_string(),
            compile_phase,
            deadline_factor: COMPILE_DEADLINE_FACTOR,
            source_transform: SourceTransform::None,
        }
    }

    /// Wall-clock budget for one run of this profile
    pub fn deadline(&self, time_limit: Duration) -> Duration {
        if self.compile_phase {
            time_limit.saturating_mul(self.deadline_factor)
        } else {
            time_limit
        }
    }

    /// Source code as it should be written into the sandbox
    pub fn prepare_source<'a>(&self, source: &'a str) -> Cow<'a, str> {
        self.source_transform.apply(source)
    }

    /// Entry command for the sandbox instance
    pub fn entry_command(&self) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), self.command.clone()]
    }
}

/// Lookup table from language id to profile
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    profiles: HashMap<String, LanguageProfile>,
}

impl LanguageRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the languages supported out of the box
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.insert(LanguageProfile::builtin(
            "python",
            "python:3.10-slim",
            "user_code.py",
            "python user_code.py < input.txt",
            false,
        ));
        registry.insert(LanguageProfile::builtin(
            "cpp",
            "gcc:latest",
            "user_code.cpp",
            "g++ -O2 -o solution user_code.cpp && ./solution < input.txt",
            true,
        ));
        registry.insert(LanguageProfile {
            source_transform: SourceTransform::JavaPublicClass,
            ..LanguageProfile::builtin(
                "java",
                "openjdk:17-alpine",
                "Solution.java",
                "javac Solution.java && java Solution < input.txt",
                true,
            )
        });
        registry.insert(LanguageProfile::builtin(
            "javascript",
            "node:18-alpine",
            "user_code.js",
            "node user_code.js < input.txt",
            false,
        ));
        registry
    }

    /// Adds a profile, replacing any existing one with the same id
    pub fn insert(&mut self, profile: LanguageProfile) -> Option<LanguageProfile> {
        self.profiles.insert(profile.id.clone(), profile)
    }

    pub fn resolve(&self, language: &str) -> Result<&LanguageProfile, ExecutionError> {
        self.profiles
            .get(language)
            .ok_or_else(|| ExecutionError::UnsupportedLanguage(language.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::language::{LanguageProfile, LanguageRegistry};
use crate::sandbox::SandboxSettings;

/// Environment variable selecting where per-run artifacts are staged
pub const STAGING_ROOT_ENV: &str = "JUDGER_SHARED_DIR";

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_BIND_PORT: u16 = 8001;

#[derive(Parser, Debug)]
#[command(name = "judger", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to an optional JSON configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<PathBuf>,

    /// Address to listen on, overrides the configuration file
    #[arg(long = "bind-address")]
    pub bind_address: Option<String>,

    /// Port to listen on, overrides the configuration file
    #[arg(long = "bind-port", short = 'p')]
    pub bind_port: Option<u16>,
}

impl CliArgs {
    /// Load the configuration file if given, then apply command line overrides
    pub fn to_config(&self) -> std::io::Result<Config> {
        let mut config = match &self.config_path {
            Some(path) => {
                let file = std::fs::File::open(path)?;
                let reader = std::io::BufReader::new(file);
                serde_json::from_reader(reader)?
            }
            None => Config::default(),
        };

        if let Some(address) = &self.bind_address {
            config.server.bind_address = Some(address.clone());
        }
        if let Some(port) = self.bind_port {
            config.server.bind_port = Some(port);
        }

        Ok(config)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sandbox: SandboxSettings,
    /// Extra or replacement language profiles
    pub languages: Vec<LanguageProfile>,
}

impl Config {
    /// Built-in languages with the configured entries layered on top
    pub fn language_registry(&self) -> LanguageRegistry {
        let mut registry = LanguageRegistry::with_builtin();
        for profile in &self.languages {
            if registry.insert(profile.clone()).is_some() {
                log::info!("Language {} overridden by configuration", profile.id);
            }
        }
        registry
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

impl ServerConfig {
    pub fn address(&self) -> (String, u16) {
        (
            self.bind_address
                .clone()
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            self.bind_port.unwrap_or(DEFAULT_BIND_PORT),
        )
    }
}

/// Where staged source and input files live
///
/// Read once at startup and handed to the executor; never consulted again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingConfig {
    pub root: PathBuf,
}

impl StagingConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads [`STAGING_ROOT_ENV`], falling back to the system temp directory
    pub fn from_env() -> Self {
        Self::from_value(std::env::var_os(STAGING_ROOT_ENV).map(PathBuf::from))
    }

    fn from_value(value: Option<PathBuf>) -> Self {
        match value {
            Some(root) if !root.as_os_str().is_empty() => Self::new(root),
            _ => Self::new(std::env::temp_dir()),
        }
    }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub build: BuildConfig,
    pub extract: ExtractConfig,
    pub adapter: AdapterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            extract: ExtractConfig::default(),
            adapter: AdapterConfig::default(),
        }
    }
}

/// Command line used to compile test binaries without running them.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BuildConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Directory for the scratch log captured during a build. Falls back to
    /// the system temp directory when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: "cargo".to_string(),
            args: vec![
                "test".to_string(),
                "--no-run".to_string(),
                "--message-format=json".to_string(),
            ],
            scratch_dir: None,
        }
    }
}

/// Tie-break when more than one record or line announces a binary. The
/// build tool promises no ordering, so the choice is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    First,
    Last,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ExtractConfig {
    pub strategy: SelectionStrategy,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::First,
        }
    }
}

/// Debug-adapter companion process the host launches against the produced
/// binary. `port_arg` may contain `{port}`, replaced at launch time.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AdapterConfig {
    pub program: String,
    pub port_arg: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            program: "codelldb".to_string(),
            port_arg: "--port={port}".to_string(),
        }
    }
}

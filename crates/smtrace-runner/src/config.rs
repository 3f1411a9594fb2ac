//! `smtrace.toml`: corpus location, solver template and version matrix
//!
//! ```toml
//! problems = "problems"
//! logs = "logs"
//! solver = "solvers/z3-{version}/bin/z3"
//! timeout_secs = 10
//! extra_args = ["proof=true"]
//! versions = ["4.8.7", "4.12.2"]
//! archive_dir = "diagnostics"
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use crate::SolverCommand;
use serde::{Deserialize, Serialize};
use smtrace_core::{SmtraceError, SolverVersion};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "smtrace.toml";
const VERSION_PLACEHOLDER: &str = "{version}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub problems: PathBuf,
    pub logs: PathBuf,
    pub extension: String,
    /// Solver program; `{version}` is replaced by the raw matrix version
    pub solver: String,
    pub timeout_secs: u64,
    pub kill_grace_secs: u64,
    pub extra_args: Vec<String>,
    pub versions: Vec<String>,
    pub archive_dir: Option<PathBuf>,
    /// Time allowed for parsing one log during a check
    pub check_budget_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            problems: PathBuf::from("problems"),
            logs: PathBuf::from("logs"),
            extension: "smt2".to_string(),
            solver: "z3".to_string(),
            timeout_secs: 10,
            kill_grace_secs: 5,
            extra_args: Vec::new(),
            versions: Vec::new(),
            archive_dir: None,
            check_budget_secs: 10,
        }
    }
}

impl Config {
    /// # Errors
    ///
    /// Returns `SmtraceError::Config` for invalid TOML, unknown keys or
    /// invalid values
    pub fn from_toml_str(text: &str) -> Result<Self, SmtraceError> {
        let config: Self =
            toml::from_str(text).map_err(|e| SmtraceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file and resolve its relative paths
    ///
    /// # Errors
    ///
    /// Returns `SmtraceError::Io` if the file cannot be read and
    /// `SmtraceError::Config` if its contents are invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SmtraceError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| SmtraceError::io(path, e))?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        tracing::debug!("loaded {} ({} versions)", path.display(), config.versions.len());
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &Path| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.to_path_buf()
            }
        };
        self.problems = resolve(&self.problems);
        self.logs = resolve(&self.logs);
        self.archive_dir = self.archive_dir.as_deref().map(resolve);
        // Bare program names are looked up on PATH; only paths are resolved
        if self.solver.contains('/') && Path::new(&self.solver).is_relative() {
            self.solver = base.join(&self.solver).to_string_lossy().into_owned();
        }
    }

    fn validate(&self) -> Result<(), SmtraceError> {
        if self.timeout_secs == 0 {
            return Err(SmtraceError::Config("timeout_secs must be positive".to_string()));
        }
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(SmtraceError::Config("extension must not be empty".to_string()));
        }
        if self.solver.trim().is_empty() {
            return Err(SmtraceError::Config("solver must not be empty".to_string()));
        }
        self.versions()?;
        Ok(())
    }

    /// The version matrix
    ///
    /// # Errors
    ///
    /// Returns `SmtraceError::InvalidVersion` for blank entries
    pub fn versions(&self) -> Result<Vec<SolverVersion>, SmtraceError> {
        self.versions.iter().map(SolverVersion::new).collect()
    }

    #[must_use]
    pub fn solver_program(&self, version: &SolverVersion) -> PathBuf {
        PathBuf::from(self.solver.replace(VERSION_PLACEHOLDER, version.as_str()))
    }

    #[must_use]
    pub fn solver_command(&self, version: &SolverVersion) -> SolverCommand {
        SolverCommand::new(self.solver_program(version))
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_kill_grace(Duration::from_secs(self.kill_grace_secs))
            .with_extra_args(self.extra_args.clone())
    }

    /// Log directory of one matrix entry
    #[must_use]
    pub fn logs_for(&self, version: &SolverVersion) -> PathBuf {
        self.logs.join(version.sanitized())
    }
}

//! Corpus runner for smtrace
//!
//! Runs the solver once per problem file, naming each trace log after the
//! problem's content hash so unchanged problems are never solved twice.
//! A failing problem is recorded and the run moves on to the next one.

pub mod archive;
pub mod config;
pub mod corpus;
pub mod solver;

pub use archive::{FailureEntry, Manifest, bundle, log_files};
pub use config::Config;
pub use corpus::Corpus;
pub use solver::{SolverCommand, SolverRun};

use serde::Serialize;
use smtrace_core::{ContentHash, LogName, SmtraceError, hash_file};
use std::fs;
use std::path::{Path, PathBuf};

/// What happened to one problem file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// A log for this exact content already existed
    Cached,
    Solved {
        result: Option<String>,
        elapsed_secs: f64,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProblemRecord {
    pub problem: PathBuf,
    /// `None` when the problem could not be hashed
    pub log: Option<PathBuf>,
    pub hash: Option<ContentHash>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub records: Vec<ProblemRecord>,
}

impl RunReport {
    #[must_use]
    pub fn solved(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Solved { .. }))
    }

    #[must_use]
    pub fn cached(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Cached))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Failures in the form the diagnostics archive records them
    #[must_use]
    pub fn failures(&self) -> Vec<FailureEntry> {
        self.records
            .iter()
            .filter_map(|r| match &r.outcome {
                Outcome::Failed { reason } => Some(FailureEntry {
                    source: r.problem.display().to_string(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

pub struct Runner {
    solver: SolverCommand,
}

impl Runner {
    #[must_use]
    pub const fn new(solver: SolverCommand) -> Self {
        Self { solver }
    }

    #[must_use]
    pub const fn solver(&self) -> &SolverCommand {
        &self.solver
    }

    /// Solve every problem of `corpus` that has no log in `logs_dir` yet
    ///
    /// # Errors
    ///
    /// Returns `SmtraceError::Io` only if `logs_dir` cannot be created;
    /// per-problem failures end up in the report
    pub fn run(&self, corpus: &Corpus, logs_dir: &Path) -> Result<RunReport, SmtraceError> {
        fs::create_dir_all(logs_dir).map_err(|e| SmtraceError::io(logs_dir, e))?;

        let mut report = RunReport::default();
        for problem in corpus.files() {
            let record = self.run_one(problem, logs_dir);
            if let Outcome::Failed { reason } = &record.outcome {
                tracing::warn!("{} failed: {reason}", problem.display());
            }
            report.records.push(record);
        }

        tracing::info!(
            "{} problems: {} solved, {} cached, {} failed",
            report.records.len(),
            report.solved(),
            report.cached(),
            report.failed()
        );
        Ok(report)
    }

    fn run_one(&self, problem: &Path, logs_dir: &Path) -> ProblemRecord {
        let failed = |reason: String| ProblemRecord {
            problem: problem.to_path_buf(),
            log: None,
            hash: None,
            outcome: Outcome::Failed { reason },
        };

        let hash = match hash_file(problem) {
            Ok(hash) => hash,
            Err(err) => return failed(err.to_string()),
        };
        let Some(name) = LogName::for_problem(problem, hash) else {
            return failed("problem path has no file name".to_string());
        };
        let log = logs_dir.join(name.file_name());

        let outcome = if log.exists() {
            tracing::debug!("{} already has {}", problem.display(), name);
            Outcome::Cached
        } else {
            tracing::info!("solving {}", problem.display());
            match self.solver.run(problem, &log) {
                Ok(run) => match run.failure_reason() {
                    None => Outcome::Solved {
                        result: run.first_line,
                        elapsed_secs: run.elapsed.as_secs_f64(),
                    },
                    Some(reason) => Outcome::Failed { reason },
                },
                Err(err) => Outcome::Failed {
                    reason: err.to_string(),
                },
            }
        };

        ProblemRecord {
            problem: problem.to_path_buf(),
            log: Some(log),
            hash: Some(hash),
            outcome,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;
    use tempfile::TempDir;

    const FAKE_SOLVER: &str = r#"#!/bin/sh
log=""
problem=""
for arg in "$@"; do
  case "$arg" in
    trace_file_name=*) log="${arg#trace_file_name=}" ;;
    -T:*|*=*) ;;
    *) problem="$arg" ;;
  esac
done
if grep -q bad "$problem"; then
  echo '(error "bad input")'
  exit 1
fi
printf '[tool-version] Z3 4.12.2\n[mk-app] #1 true\n[eof]\n' > "$log"
echo sat
"#;

    fn fake_solver(dir: &Path) -> SolverCommand {
        let script = dir.join("fake-z3");
        fs::write(&script, FAKE_SOLVER).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        SolverCommand::new(script).with_timeout(Duration::from_secs(5))
    }

    fn corpus(dir: &Path, files: &[(&str, &str)]) -> Corpus {
        let problems = dir.join("problems");
        fs::create_dir_all(&problems).unwrap();
        for (name, content) in files {
            fs::write(problems.join(name), content).unwrap();
        }
        Corpus::discover(&problems, "smt2").unwrap()
    }

    #[test]
    fn test_run_solves_and_names_logs() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(dir.path(), &[("simple.smt2", "(check-sat)")]);
        let logs = dir.path().join("logs");

        let report = Runner::new(fake_solver(dir.path())).run(&corpus, &logs).unwrap();

        assert_eq!(report.solved(), 1);
        let record = &report.records[0];
        let hash = hash_file(&corpus.files()[0]).unwrap();
        let expected = logs.join(format!("simple_fHash_{hash}.log"));
        assert_eq!(record.log.as_deref(), Some(expected.as_path()));
        assert!(expected.exists());
        assert!(matches!(
            &record.outcome,
            Outcome::Solved { result: Some(r), .. } if r == "sat"
        ));
    }

    #[test]
    fn test_second_run_uses_cached_logs() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(dir.path(), &[("a.smt2", "(check-sat)"), ("b.smt2", "(push)")]);
        let logs = dir.path().join("logs");
        let runner = Runner::new(fake_solver(dir.path()));

        runner.run(&corpus, &logs).unwrap();
        let report = runner.run(&corpus, &logs).unwrap();

        assert_eq!(report.cached(), 2);
        assert_eq!(report.solved(), 0);
    }

    #[test]
    fn test_failure_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(
            dir.path(),
            &[("a_bad.smt2", "bad"), ("b_good.smt2", "(check-sat)")],
        );
        let logs = dir.path().join("logs");

        let report = Runner::new(fake_solver(dir.path())).run(&corpus, &logs).unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.solved(), 1);
        assert!(report.has_failures());
        let failures = report.failures();
        assert!(failures[0].source.ends_with("a_bad.smt2"));
        assert!(failures[0].reason.contains("bad input"));
    }

    #[test]
    fn test_missing_solver_is_per_file_failure() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(dir.path(), &[("a.smt2", "x"), ("b.smt2", "y")]);
        let runner = Runner::new(SolverCommand::new("/nonexistent/smtrace/z3"));

        let report = runner.run(&corpus, &dir.path().join("logs")).unwrap();
        assert_eq!(report.failed(), 2);
        assert!(report.failures()[0].reason.contains("ERR_SOLVER_SPAWN"));
    }

    #[test]
    fn test_report_serializes_outcomes() {
        let report = RunReport {
            records: vec![ProblemRecord {
                problem: PathBuf::from("p/a.smt2"),
                log: None,
                hash: None,
                outcome: Outcome::Failed {
                    reason: "boom".to_string(),
                },
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["records"][0]["outcome"]["status"], "failed");
        assert_eq!(json["records"][0]["outcome"]["reason"], "boom");
    }
}

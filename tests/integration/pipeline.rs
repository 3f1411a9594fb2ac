//! Runner output fed into the trace checker and the diagnostics archive
#![cfg(unix)]

use smtrace_runner::{Corpus, Runner, SolverCommand, bundle, log_files};
use smtrace_trace::TraceParser;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
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
if grep -q garbage "$problem"; then
  printf '[mk-app] #1 f #2\n' > "$log"
  echo unknown
  exit 0
fi
printf '[tool-version] Z3 4.8.7\n[mk-app] #1 a\n[mk-app] #2 f #1\n' > "$log"
echo sat
"#;

fn setup(dir: &Path, files: &[(&str, &str)]) -> (Runner, Corpus) {
    let script = dir.join("fake-z3");
    fs::write(&script, FAKE_SOLVER).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let problems = dir.join("problems");
    fs::create_dir_all(&problems).unwrap();
    for (name, content) in files {
        fs::write(problems.join(name), content).unwrap();
    }
    let runner = Runner::new(SolverCommand::new(script).with_timeout(Duration::from_secs(5)));
    (runner, Corpus::discover(&problems, "smt2").unwrap())
}

#[test]
fn test_runner_logs_parse_cleanly() {
    let dir = TempDir::new().unwrap();
    let (runner, corpus) = setup(dir.path(), &[("a.smt2", "(check-sat)"), ("b.smt2", "(pop)")]);
    let logs = dir.path().join("logs");

    let report = runner.run(&corpus, &logs).unwrap();
    assert!(!report.has_failures());

    for record in &report.records {
        let log = record.log.as_ref().unwrap();
        let summary = TraceParser::new().parse_file(log).unwrap();
        assert_eq!(summary.terms, 2);
        assert_eq!(summary.version.unwrap().version.to_string(), "4.8.7");
    }
}

#[test]
fn test_malformed_log_is_archived() {
    let dir = TempDir::new().unwrap();
    let (runner, corpus) = setup(dir.path(), &[("good.smt2", "ok"), ("junk.smt2", "garbage")]);
    let logs = dir.path().join("logs");
    runner.run(&corpus, &logs).unwrap();

    let parser = TraceParser::new();
    let failures: Vec<_> = log_files(&logs)
        .unwrap()
        .iter()
        .filter_map(|log| parser.parse_file(log).err().map(|e| (log.clone(), e)))
        .map(|(log, e)| smtrace_runner::FailureEntry {
            source: log.display().to_string(),
            reason: e.to_string(),
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].source.contains("junk_fHash_"));

    let out = bundle(&logs, &dir.path().join("archive"), "check", &failures).unwrap();
    assert_eq!(log_files(&out).unwrap().len(), 2);
    let manifest = fs::read_to_string(out.join("manifest.json")).unwrap();
    assert!(manifest.contains("ERR_TRACE"));
}

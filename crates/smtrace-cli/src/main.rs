//! smtrace CLI
//!
//! Runs a solver over a problem corpus with tracing enabled, names the logs
//! after problem content hashes and checks the resulting Z3 trace logs.

use anyhow::{Context, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use serde::Serialize;
use smtrace_core::{LogName, SolverVersion, hash_file};
use smtrace_runner::config::DEFAULT_CONFIG_FILE;
use smtrace_runner::{
    Config, Corpus, FailureEntry, Outcome, RunReport, Runner, SolverCommand, bundle, log_files,
};
use smtrace_trace::{ParseMode, TraceParser, TraceSummary};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

/// Diagnostics kept per log in lenient mode
const LENIENT_MAX_ERRORS: usize = 20;

fn cli() -> Command {
    Command::new("smtrace")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Solver trace corpus runner and Z3 trace checker")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level; RUST_LOG takes precedence")
                .global(true)
                .default_value("info")
                .value_parser(["error", "warn", "info", "debug", "trace"]),
        )
        .subcommand(
            Command::new("cache-key")
                .about("Print the cache key of a corpus for one solver version")
                .arg(
                    Arg::new("version")
                        .long("version")
                        .value_name("VERSION")
                        .required(true),
                )
                .arg(problems_arg())
                .arg(extension_arg()),
        )
        .subcommand(
            Command::new("log-name")
                .about("Print the trace log name of one problem file")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Run the solver on every problem without a log")
                .arg(
                    Arg::new("solver")
                        .long("solver")
                        .value_name("BIN")
                        .default_value("z3")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(problems_arg())
                .arg(logs_arg())
                .arg(extension_arg())
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("SECS")
                        .default_value("10")
                        .value_parser(value_parser!(u64).range(1..)),
                )
                .arg(archive_arg())
                .arg(
                    Arg::new("extra")
                        .value_name("SOLVER_ARGS")
                        .help("Extra solver arguments, after --")
                        .num_args(1..)
                        .last(true),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Parse every trace log of a directory")
                .arg(logs_arg())
                .arg(
                    Arg::new("budget")
                        .long("budget")
                        .value_name("SECS")
                        .help("Time allowed per log")
                        .default_value("10")
                        .value_parser(value_parser!(u64)),
                )
                .arg(lenient_arg())
                .arg(json_arg())
                .arg(archive_arg()),
        )
        .subcommand(
            Command::new("summary")
                .about("Summarise one trace log")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("top")
                        .long("top")
                        .value_name("N")
                        .default_value("10")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("graph")
                        .long("graph")
                        .value_name("FORMAT")
                        .help("Print the instantiation graph instead of the summary")
                        .value_parser(["dot", "json"])
                        .conflicts_with("json"),
                )
                .arg(lenient_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("matrix")
                .about("Run and check the corpus for every configured solver version")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_name("FILE")
                        .default_value(DEFAULT_CONFIG_FILE)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

fn problems_arg() -> Arg {
    Arg::new("problems")
        .long("problems")
        .value_name("DIR")
        .default_value("problems")
        .value_parser(value_parser!(PathBuf))
}

fn logs_arg() -> Arg {
    Arg::new("logs")
        .long("logs")
        .value_name("DIR")
        .default_value("logs")
        .value_parser(value_parser!(PathBuf))
}

fn extension_arg() -> Arg {
    Arg::new("extension")
        .long("extension")
        .value_name("EXT")
        .default_value("smt2")
}

fn archive_arg() -> Arg {
    Arg::new("archive")
        .long("archive")
        .value_name("DIR")
        .help("Bundle logs and failures here when something failed")
        .value_parser(value_parser!(PathBuf))
}

fn lenient_arg() -> Arg {
    Arg::new("lenient")
        .long("lenient")
        .help("Report every malformed line instead of stopping at the first")
        .action(ArgAction::SetTrue)
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Print JSON instead of text")
        .action(ArgAction::SetTrue)
}

fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let matches = cli().get_matches();
    init_logging(
        matches
            .get_one::<String>("log-level")
            .map_or("info", String::as_str),
    );

    match dispatch(&matches) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("{e:#}");
            process::exit(1);
        }
    }
}

fn dispatch(matches: &ArgMatches) -> anyhow::Result<i32> {
    match matches.subcommand() {
        Some(("cache-key", sub)) => cache_key(
            required::<String>(sub, "version")?,
            required::<PathBuf>(sub, "problems")?,
            required::<String>(sub, "extension")?,
        ),
        Some(("log-name", sub)) => log_name(required::<PathBuf>(sub, "file")?),
        Some(("run", sub)) => {
            let extra = sub
                .get_many::<String>("extra")
                .map(|args| args.cloned().collect())
                .unwrap_or_default();
            let solver = SolverCommand::new(required::<PathBuf>(sub, "solver")?)
                .with_timeout(Duration::from_secs(*required::<u64>(sub, "timeout")?))
                .with_extra_args(extra);
            run(
                solver,
                required::<PathBuf>(sub, "problems")?,
                required::<PathBuf>(sub, "logs")?,
                required::<String>(sub, "extension")?,
                sub.get_one::<PathBuf>("archive").map(PathBuf::as_path),
            )
        }
        Some(("check", sub)) => check(
            required::<PathBuf>(sub, "logs")?,
            &parser_for(sub, Some(*required::<u64>(sub, "budget")?)),
            sub.get_flag("json"),
            sub.get_one::<PathBuf>("archive").map(PathBuf::as_path),
        ),
        Some(("summary", sub)) => {
            let output = match sub.get_one::<String>("graph").map(String::as_str) {
                Some("dot") => SummaryOutput::Dot,
                Some(_) => SummaryOutput::GraphJson,
                None if sub.get_flag("json") => SummaryOutput::Json,
                None => SummaryOutput::Text(*required::<usize>(sub, "top")?),
            };
            summary(required::<PathBuf>(sub, "file")?, &parser_for(sub, None), output)
        }
        Some(("matrix", sub)) => matrix(required::<PathBuf>(sub, "config")?),
        _ => bail!("no subcommand given"),
    }
}

fn required<'a, T: Clone + Send + Sync + 'static>(
    matches: &'a ArgMatches,
    id: &str,
) -> anyhow::Result<&'a T> {
    matches
        .get_one::<T>(id)
        .with_context(|| format!("missing argument --{id}"))
}

fn parser_for(matches: &ArgMatches, budget_secs: Option<u64>) -> TraceParser {
    let mut parser = TraceParser::new();
    if matches.get_flag("lenient") {
        parser = parser.with_mode(ParseMode::Lenient {
            max_errors: LENIENT_MAX_ERRORS,
        });
    }
    if let Some(secs) = budget_secs.filter(|s| *s > 0) {
        parser = parser.with_budget(Duration::from_secs(secs));
    }
    parser
}

fn cache_key(version: &str, problems: &Path, extension: &str) -> anyhow::Result<i32> {
    let version = SolverVersion::new(version)?;
    let corpus = Corpus::discover(problems, extension)?;
    println!("{}", corpus.cache_key(&version)?);
    Ok(0)
}

fn log_name(file: &Path) -> anyhow::Result<i32> {
    let hash = hash_file(file)?;
    let name = LogName::for_problem(file, hash)
        .with_context(|| format!("{} has no file name", file.display()))?;
    println!("{name}");
    Ok(0)
}

fn run(
    solver: SolverCommand,
    problems: &Path,
    logs: &Path,
    extension: &str,
    archive: Option<&Path>,
) -> anyhow::Result<i32> {
    let corpus = Corpus::discover(problems, extension)?;
    let report = Runner::new(solver).run(&corpus, logs)?;
    print_report(&report);

    if !report.has_failures() {
        return Ok(0);
    }
    if let Some(archive) = archive {
        let label = corpus
            .hash()
            .map_or_else(|_| "run".to_string(), |hash| format!("run-{hash}"));
        bundle(logs, archive, &label, &report.failures())?;
    }
    Ok(1)
}

fn print_report(report: &RunReport) {
    for record in &report.records {
        let problem = record.problem.display();
        match &record.outcome {
            Outcome::Cached => println!("cached  {problem}"),
            Outcome::Solved {
                result,
                elapsed_secs,
            } => println!(
                "solved  {problem}: {} ({elapsed_secs:.2}s)",
                result.as_deref().unwrap_or("no output")
            ),
            Outcome::Failed { reason } => println!("failed  {problem}: {reason}"),
        }
    }
    println!(
        "{} problems: {} solved, {} cached, {} failed",
        report.records.len(),
        report.solved(),
        report.cached(),
        report.failed()
    );
}

/// Outcome of checking one log
#[derive(Debug, Serialize)]
struct LogCheck {
    log: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<TraceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl LogCheck {
    fn failed(&self) -> bool {
        self.error.is_some() || self.summary.as_ref().is_some_and(|s| !s.is_clean())
    }

    fn failure(&self) -> Option<FailureEntry> {
        let reason = match (&self.error, &self.summary) {
            (Some(error), _) => error.clone(),
            (None, Some(s)) if !s.is_clean() => format!("{} malformed lines", s.error_count),
            _ => return None,
        };
        Some(FailureEntry {
            source: self.log.display().to_string(),
            reason,
        })
    }
}

fn check_logs(logs: &Path, parser: &TraceParser) -> anyhow::Result<Vec<LogCheck>> {
    let checks = log_files(logs)?
        .into_iter()
        .map(|log| match parser.parse_file(&log) {
            Ok(summary) => {
                if summary.timed_out {
                    tracing::warn!("{}: check budget exhausted", log.display());
                }
                LogCheck {
                    log,
                    summary: Some(summary),
                    error: None,
                }
            }
            Err(err) => LogCheck {
                log,
                summary: None,
                error: Some(err.to_string()),
            },
        })
        .collect();
    Ok(checks)
}

fn print_checks(checks: &[LogCheck]) {
    for check in checks {
        let log = check.log.display();
        match (&check.error, &check.summary) {
            (Some(error), _) => println!("FAIL {log}: {error}"),
            (None, Some(s)) => {
                let status = if s.is_clean() { "ok  " } else { "FAIL" };
                println!(
                    "{status} {log}: {} terms, {} quantifiers, {} instances, {} errors",
                    s.terms, s.quantifiers, s.instances, s.error_count
                );
                for d in &s.diagnostics {
                    println!("     {}:{}: {}", d.line, d.column, d.message);
                }
            }
            (None, None) => {}
        }
    }
    let failed = checks.iter().filter(|c| c.failed()).count();
    println!("{} logs checked, {failed} failed", checks.len());
}

fn check(
    logs: &Path,
    parser: &TraceParser,
    json: bool,
    archive: Option<&Path>,
) -> anyhow::Result<i32> {
    let checks = check_logs(logs, parser)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&checks)?);
    } else {
        print_checks(&checks);
    }

    let failures: Vec<_> = checks.iter().filter_map(LogCheck::failure).collect();
    if failures.is_empty() {
        return Ok(0);
    }
    if let Some(archive) = archive {
        let label = logs
            .file_name()
            .map_or_else(|| "check".to_string(), |n| format!("check-{}", n.to_string_lossy()));
        bundle(logs, archive, &label, &failures)?;
    }
    Ok(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SummaryOutput {
    /// Text with the given number of top quantifiers
    Text(usize),
    Json,
    Dot,
    GraphJson,
}

fn summary(file: &Path, parser: &TraceParser, output: SummaryOutput) -> anyhow::Result<i32> {
    let summary = parser.parse_file(file)?;
    match output {
        SummaryOutput::Text(top) => print_summary(&summary, top),
        SummaryOutput::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        SummaryOutput::Dot => print!("{}", summary.graph.to_dot()),
        SummaryOutput::GraphJson => {
            println!("{}", serde_json::to_string_pretty(&summary.graph)?);
        }
    }
    Ok(i32::from(!summary.is_clean()))
}

fn print_summary(s: &TraceSummary, top: usize) {
    println!("{}", s.file);
    if let Some(version) = &s.version {
        println!("  solver:        {} {}", version.solver, version.version);
    }
    println!("  lines:         {}", s.lines);
    println!("  terms:         {}", s.terms);
    println!("  quantifiers:   {}", s.quantifiers);
    println!(
        "  matches:       {} ({} discovered)",
        s.matches, s.discovered_matches
    );
    println!(
        "  instances:     {} (max depth {}, {} open)",
        s.instances, s.max_instance_depth, s.open_instances
    );
    println!("  dependencies:  {}", s.dependency_edges);
    if s.truncated_tail {
        println!("  last line truncated");
    }
    if s.timed_out {
        println!("  stopped early: budget exhausted");
    }
    for d in &s.diagnostics {
        println!("  error {}:{}: {}", d.line, d.column, d.message);
    }

    let quantifiers = s.top_quantifiers(top);
    if !quantifiers.is_empty() {
        println!("  top quantifiers:");
        for q in quantifiers {
            println!("    {:>8}  {}", q.instances, q.name);
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_FILE) {
        tracing::warn!("{DEFAULT_CONFIG_FILE} not found, using defaults");
        return Ok(Config::default());
    }
    Ok(Config::load(path)?)
}

/// Run and check one matrix entry, returning what failed
fn run_version(
    config: &Config,
    version: &SolverVersion,
    corpus: &Corpus,
    logs: &Path,
    parser: &TraceParser,
) -> anyhow::Result<Vec<FailureEntry>> {
    let report = Runner::new(config.solver_command(version)).run(corpus, logs)?;
    print_report(&report);

    let checks = check_logs(logs, parser)?;
    print_checks(&checks);

    let mut failures = report.failures();
    failures.extend(checks.iter().filter_map(LogCheck::failure));
    Ok(failures)
}

fn matrix(config_path: &Path) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;
    let versions = config.versions()?;
    if versions.is_empty() {
        bail!("no solver versions configured in {}", config_path.display());
    }

    let corpus = Corpus::discover(&config.problems, &config.extension)?;
    let budget = Duration::from_secs(config.check_budget_secs);
    let parser = if budget.is_zero() {
        TraceParser::new()
    } else {
        TraceParser::new().with_budget(budget)
    };

    let mut failed_versions = Vec::new();
    for version in &versions {
        let logs = config.logs_for(version);
        let label = match corpus.cache_key(version) {
            Ok(key) => key.to_string(),
            Err(err) => {
                tracing::warn!("no cache key for {version}: {err}");
                format!("logs-{}", version.sanitized())
            }
        };
        println!("== {version} ({label})");

        // One broken version must not stop the others
        let failures =
            run_version(&config, version, &corpus, &logs, &parser).unwrap_or_else(|err| {
                println!("error   {version}: {err:#}");
                vec![FailureEntry {
                    source: logs.display().to_string(),
                    reason: format!("{err:#}"),
                }]
            });
        if failures.is_empty() {
            continue;
        }
        failed_versions.push(version.to_string());
        if let Some(archive) = &config.archive_dir {
            if let Err(err) = bundle(&logs, archive, &label, &failures) {
                tracing::error!("archiving {version} failed: {err}");
            }
        }
    }

    if failed_versions.is_empty() {
        println!("all {} versions passed", versions.len());
        Ok(0)
    } else {
        println!("failed versions: {}", failed_versions.join(", "));
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CLEAN_LOG: &str = "[tool-version] Z3 4.12.2\n[mk-app] #1 true\n[eof]\n";

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_run_collects_extra_args() {
        let matches = cli()
            .try_get_matches_from([
                "smtrace", "run", "--solver", "z3", "--", "proof=true", "smt.mbqi=false",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let extra: Vec<_> = sub.get_many::<String>("extra").unwrap().collect();
        assert_eq!(extra, ["proof=true", "smt.mbqi=false"]);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = cli().try_get_matches_from(["smtrace", "run", "--timeout", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_name_of_missing_file() {
        assert!(log_name(Path::new("nonexistent.smt2")).is_err());
    }

    #[test]
    fn test_check_exit_codes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a_fHash_00.log"), CLEAN_LOG).unwrap();
        assert_eq!(check(dir.path(), &TraceParser::new(), false, None).unwrap(), 0);

        fs::write(dir.path().join("b_fHash_00.log"), "[mk-app] #1 f #2\n").unwrap();
        assert_eq!(check(dir.path(), &TraceParser::new(), false, None).unwrap(), 1);
    }

    #[test]
    fn test_check_archives_failures() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir(&logs).unwrap();
        fs::write(logs.join("bad_fHash_00.log"), "[instance] 0x1\n").unwrap();

        let archive = dir.path().join("archive");
        let code = check(&logs, &TraceParser::new(), true, Some(&archive)).unwrap();

        assert_eq!(code, 1);
        assert!(archive.join("check-logs").join("bad_fHash_00.log").exists());
    }

    #[test]
    fn test_lenient_failure_entry() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("x.log"), "[mk-app] #1 f #2\n[mk-app] #3 a\n").unwrap();
        let parser = TraceParser::new().with_mode(ParseMode::Lenient { max_errors: 5 });

        let checks = check_logs(dir.path(), &parser).unwrap();
        assert!(checks[0].failed());
        assert_eq!(checks[0].failure().unwrap().reason, "1 malformed lines");
    }

    #[test]
    fn test_summary_graph_option() {
        let matches = cli()
            .try_get_matches_from(["smtrace", "summary", "--graph", "dot", "t.log"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("graph").unwrap(), "dot");

        assert!(cli()
            .try_get_matches_from(["smtrace", "summary", "--graph", "svg", "t.log"])
            .is_err());
        assert!(cli()
            .try_get_matches_from(["smtrace", "summary", "--graph", "dot", "--json", "t.log"])
            .is_err());
    }

    #[test]
    fn test_summary_graph_exit_code() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("a_fHash_00.log");
        fs::write(&log, CLEAN_LOG).unwrap();
        assert_eq!(summary(&log, &TraceParser::new(), SummaryOutput::Dot).unwrap(), 0);
        assert_eq!(
            summary(&log, &TraceParser::new(), SummaryOutput::GraphJson).unwrap(),
            0
        );
    }

    #[test]
    fn test_matrix_continues_after_version_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("problems")).unwrap();
        fs::write(dir.path().join("problems/a.smt2"), "(check-sat)").unwrap();
        // Log directories cannot be created below a regular file
        fs::write(dir.path().join("logs"), "not a directory").unwrap();
        let config = dir.path().join("smtrace.toml");
        fs::write(
            &config,
            "solver = \"/nonexistent/z3\"\nversions = [\"4.8.7\", \"4.12.2\"]\narchive_dir = \"diag\"\n",
        )
        .unwrap();

        assert_eq!(matrix(&config).unwrap(), 1);

        let bundles: Vec<_> = fs::read_dir(dir.path().join("diag"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(bundles.len(), 2);
        assert!(bundles.iter().any(|b| b.starts_with("logs-4_8_7-")));
        assert!(bundles.iter().any(|b| b.starts_with("logs-4_12_2-")));
    }

    #[test]
    fn test_matrix_without_versions() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("smtrace.toml");
        fs::write(&config, "problems = \"p\"\n").unwrap();
        let err = matrix(&config).unwrap_err();
        assert!(err.to_string().contains("no solver versions"));
    }
}

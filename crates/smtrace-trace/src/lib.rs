//! Z3 trace log parser for smtrace
//!
//! Reads logs written by `z3 trace=true` line by line, checks that every
//! line is well formed and refers only to terms, quantifiers and matches
//! defined earlier, and reports a `TraceSummary`.

mod cursor;
mod model;
mod summary;

pub use model::LineKind;
pub use summary::{
    DependencyKind, Diagnostic, InstanceEdge, InstanceNode, InstantiationGraph, QuantifierCount,
    TraceSummary, VersionInfo,
};

use model::TraceModel;
use smtrace_core::{Position, SmtraceError};
use smtrace_lexer::Lexer;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

/// How often (in lines) the time budget is checked
const BUDGET_CHECK_INTERVAL: usize = 1024;

/// What to do with a malformed line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Stop at the first malformed line and return it as an error
    #[default]
    Strict,
    /// Record malformed lines (keeping at most `max_errors`) and go on
    Lenient { max_errors: usize },
}

#[derive(Debug, Clone, Default)]
pub struct TraceParser {
    mode: ParseMode,
    budget: Option<Duration>,
}

impl TraceParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: ParseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Stop parsing once `budget` has elapsed; the summary is marked
    /// `timed_out`
    #[must_use]
    pub const fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Parse trace text held in memory
    ///
    /// # Errors
    ///
    /// In strict mode, returns `SmtraceError::Trace` for the first malformed line
    pub fn parse_str(&self, input: &str, filename: &str) -> Result<TraceSummary, SmtraceError> {
        self.parse_reader(input.as_bytes(), filename)
    }

    /// Parse a trace file
    ///
    /// # Errors
    ///
    /// Returns `SmtraceError::Io` if the file cannot be read, and in strict
    /// mode `SmtraceError::Trace` for the first malformed line
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<TraceSummary, SmtraceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SmtraceError::io(path, e))?;
        let filename = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |f| f.to_string_lossy().into_owned());
        self.parse_reader(BufReader::new(file), &filename)
            .map_err(|err| match err {
                SmtraceError::Io { source, .. } => SmtraceError::io(path, source),
                other => other,
            })
    }

    /// Parse a trace from any buffered reader
    ///
    /// # Errors
    ///
    /// Returns `SmtraceError::Io` on read failures, and in strict mode
    /// `SmtraceError::Trace` for the first malformed line
    pub fn parse_reader<R: BufRead>(
        &self,
        mut reader: R,
        filename: &str,
    ) -> Result<TraceSummary, SmtraceError> {
        let started = Instant::now();
        let mut model = TraceModel::new();
        let mut summary = TraceSummary {
            file: filename.to_string(),
            ..TraceSummary::default()
        };
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| SmtraceError::io(filename, e))?;
            if read == 0 {
                break;
            }
            // Checked before blank lines are skipped so that no multiple of
            // the interval is missed
            if let Some(budget) = self.budget {
                let done = summary.lines;
                if done > 0 && done % BUDGET_CHECK_INTERVAL == 0 && started.elapsed() > budget {
                    tracing::info!(
                        "{filename}: stopped after {done} lines, budget of {:.1}s used up",
                        budget.as_secs_f32()
                    );
                    summary.timed_out = true;
                    break;
                }
            }
            summary.lines += 1;
            let line_no = summary.lines;
            let terminated = buf.last() == Some(&b'\n');

            let text = String::from_utf8_lossy(&buf);
            let line = text.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }

            let tokens = Lexer::new(line).tokenize();
            match model.apply(line_no, line, &tokens) {
                Ok(kind) => match kind {
                    LineKind::Match => summary.matches += 1,
                    LineKind::DiscoveredMatch => summary.discovered_matches += 1,
                    LineKind::Search => summary.search_lines += 1,
                    LineKind::Unknown => summary.unknown_lines += 1,
                    _ => {}
                },
                Err(_) if !terminated => {
                    // The solver was stopped in the middle of writing
                    tracing::warn!("{filename}:{line_no}: ignoring truncated last line");
                    summary.truncated_tail = true;
                }
                Err(err) => match self.mode {
                    ParseMode::Strict => {
                        return Err(SmtraceError::trace(err.kind, err.span, line_no, filename));
                    }
                    ParseMode::Lenient { max_errors } => {
                        let pos = Position::in_line(line_no, err.span);
                        tracing::warn!("{filename}:{}:{}: {}", pos.line, pos.column, err.kind);
                        summary.error_count += 1;
                        if summary.diagnostics.len() < max_errors {
                            summary.diagnostics.push(Diagnostic {
                                line: pos.line,
                                column: pos.column,
                                message: err.kind.to_string(),
                            });
                        }
                    }
                },
            }
        }

        summary.version = model.version().cloned();
        summary.terms = model.term_count();
        summary.quantifiers = model.quantifier_count();
        summary.instances = model.instance_count();
        summary.dependency_edges = model.dependency_edges();
        summary.max_instance_depth = model.max_instance_depth();
        summary.open_instances = model.open_instances();
        summary.quantifier_instances = model.quantifier_counts();
        summary.graph = model.instantiation_graph();

        tracing::debug!(
            "{filename}: {} lines, {} terms, {} instances in {:.3}s",
            summary.lines,
            summary.terms,
            summary.instances,
            started.elapsed().as_secs_f32()
        );
        Ok(summary)
    }
}

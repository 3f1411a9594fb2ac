//! Shared types for smtrace
//!
//! Naming conventions for cache keys and log files, content hashing, and the
//! workspace error type. Trace errors carry line/column positions.

use std::path::{Path, PathBuf};

pub mod hashing;
pub mod naming;

pub use hashing::{ContentHash, corpus_hash, hash_bytes, hash_file};
pub use naming::{CacheKey, LogName, SolverVersion};

/// Byte range inside a single trace line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Line and column position in a trace file (both 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position of `span` on line number `line`
    #[must_use]
    pub const fn in_line(line: usize, span: Span) -> Self {
        Self::new(line, span.start + 1)
    }
}

/// What went wrong on a trace line
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceErrorKind {
    #[error("unexpected character {0:?}")]
    Lexical(String),

    #[error("expected {expected}, found {found:?}")]
    UnexpectedToken { expected: &'static str, found: String },

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("unexpected trailing data {0:?}")]
    TrailingData(String),

    #[error("term {0} is used before it is defined")]
    UnknownTerm(String),

    #[error("term {0} is not a quantifier")]
    NotAQuantifier(String),

    #[error("quantifier {0} has no body")]
    EmptyQuantifier(String),

    #[error("instance of unknown match {0}")]
    UnknownFingerprint(String),

    #[error("[end-of-instance] without an open instance")]
    UnbalancedEndOfInstance,

    #[error("invalid solver version {0:?}")]
    InvalidVersion(String),
}

/// Error types with location information where it exists
#[derive(thiserror::Error, Debug)]
pub enum SmtraceError {
    #[error("smtrace:{}: ERR_IO: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("smtrace: ERR_VERSION: {0:?} is not a usable solver version")]
    InvalidVersion(String),

    #[error("smtrace: ERR_CACHE_KEY: {0:?} is not a cache key")]
    InvalidCacheKey(String),

    #[error("smtrace: ERR_CONFIG: {0}")]
    Config(String),

    #[error("smtrace:{file}:{line}:{column}: ERR_TRACE: {kind}")]
    Trace {
        kind: TraceErrorKind,
        span: Span,
        file: String,
        line: usize,
        column: usize,
    },

    #[error("smtrace:{}: ERR_SOLVER_SPAWN: {source}", program.display())]
    SolverSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SmtraceError {
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    #[must_use]
    pub fn trace(kind: TraceErrorKind, span: Span, line: usize, filename: &str) -> Self {
        let pos = Position::in_line(line, span);
        Self::Trace {
            kind,
            span,
            file: filename.to_string(),
            line: pos.line,
            column: pos.column,
        }
    }

    #[must_use]
    pub const fn span(&self) -> Option<Span> {
        match self {
            Self::Trace { span, .. } => Some(*span),
            _ => None,
        }
    }

    #[must_use]
    pub const fn position(&self) -> Option<Position> {
        match self {
            Self::Trace { line, column, .. } => Some(Position::new(*line, *column)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_creation() {
        let span = Span::new(10, 20);
        assert_eq!(span.start, 10);
        assert_eq!(span.end, 20);
    }

    #[test]
    fn test_position_in_line() {
        let pos = Position::in_line(7, Span::new(9, 12));
        assert_eq!(pos.line, 7);
        assert_eq!(pos.column, 10);
    }

    #[test]
    fn test_trace_error_format() {
        let error = SmtraceError::trace(
            TraceErrorKind::UnknownTerm("#42".to_string()),
            Span::new(9, 12),
            3,
            "a_fHash_00.log",
        );

        let error_str = format!("{error}");
        assert!(error_str.contains("smtrace:a_fHash_00.log:3:10"));
        assert!(error_str.contains("ERR_TRACE"));
        assert!(error_str.contains("#42"));
        assert_eq!(error.position(), Some(Position::new(3, 10)));
    }

    #[test]
    fn test_io_error_keeps_path() {
        let error = SmtraceError::io(
            "problems/missing.smt2",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let error_str = format!("{error}");
        assert!(error_str.contains("problems/missing.smt2"));
        assert!(error_str.contains("ERR_IO"));
        assert!(error.span().is_none());
    }
}

//! Naming conventions shared by the runner, the checker and the cache
//!
//! - cache key: `logs-<version_with_underscores>-<corpus sha256>`
//! - log file: `<problem stem>_fHash_<problem sha256>.log`

use crate::{ContentHash, SmtraceError};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const CACHE_KEY_PREFIX: &str = "logs";
pub const LOG_HASH_MARKER: &str = "_fHash_";
pub const LOG_EXTENSION: &str = "log";

/// Solver release identifier as written in the version matrix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SolverVersion(String);

impl SolverVersion {
    /// # Errors
    ///
    /// Returns `SmtraceError::InvalidVersion` for blank versions
    pub fn new(raw: impl Into<String>) -> Result<Self, SmtraceError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SmtraceError::InvalidVersion(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Version usable as a cache key fragment: anything other than an ASCII
    /// letter or digit becomes `_`.
    #[must_use]
    pub fn sanitized(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl FromStr for SolverVersion {
    type Err = SmtraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for SolverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a cached log directory for one solver version and one corpus
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    version: String,
    corpus: ContentHash,
}

impl CacheKey {
    #[must_use]
    pub fn new(version: &SolverVersion, corpus: ContentHash) -> Self {
        Self {
            version: version.sanitized(),
            corpus,
        }
    }

    /// Split a rendered key back into its parts
    ///
    /// # Errors
    ///
    /// Returns `SmtraceError::InvalidCacheKey` if `key` does not follow the
    /// `logs-<version>-<hash>` layout
    pub fn parse(key: &str) -> Result<Self, SmtraceError> {
        let invalid = || SmtraceError::InvalidCacheKey(key.to_string());

        let rest = key
            .strip_prefix(CACHE_KEY_PREFIX)
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(invalid)?;
        let (version, hash) = rest.rsplit_once('-').ok_or_else(invalid)?;
        if version.is_empty() || !version.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid());
        }
        let corpus = ContentHash::from_hex(hash).ok_or_else(invalid)?;
        Ok(Self {
            version: version.to_string(),
            corpus,
        })
    }

    #[must_use]
    pub fn version_fragment(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub const fn corpus_hash(&self) -> ContentHash {
        self.corpus
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CACHE_KEY_PREFIX}-{}-{}", self.version, self.corpus)
    }
}

/// File name of the trace log produced for one problem file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogName {
    stem: String,
    hash: ContentHash,
}

impl LogName {
    /// Log name for `problem` with content hash `hash`.
    ///
    /// Returns `None` if the path has no file name.
    #[must_use]
    pub fn for_problem(problem: &Path, hash: ContentHash) -> Option<Self> {
        let stem = problem.file_stem()?.to_string_lossy().into_owned();
        Some(Self { stem, hash })
    }

    /// Recover stem and hash from a log file name
    #[must_use]
    pub fn parse(file_name: &str) -> Option<Self> {
        let base = file_name
            .strip_suffix(LOG_EXTENSION)
            .and_then(|b| b.strip_suffix('.'))?;
        let (stem, hash) = base.rsplit_once(LOG_HASH_MARKER)?;
        Some(Self {
            stem: stem.to_string(),
            hash: ContentHash::from_hex(hash)?,
        })
    }

    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    #[must_use]
    pub const fn hash(&self) -> ContentHash {
        self.hash
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LogName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{LOG_HASH_MARKER}{}.{LOG_EXTENSION}",
            self.stem, self.hash
        )
    }
}

//! Problem corpus discovery

use smtrace_core::{CacheKey, ContentHash, SmtraceError, SolverVersion, corpus_hash};
use std::fs;
use std::path::{Path, PathBuf};

/// Sorted set of problem files under one directory
#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl Corpus {
    /// Collect every file below `root` whose extension is `extension`.
    /// Hidden files and directories are skipped.
    ///
    /// # Errors
    ///
    /// Returns `SmtraceError::Io` if `root` or one of its subdirectories
    /// cannot be read
    pub fn discover(root: impl AsRef<Path>, extension: &str) -> Result<Self, SmtraceError> {
        let root = root.as_ref();
        let extension = extension.trim_start_matches('.');
        let mut files = Vec::new();
        collect(root, extension, &mut files)?;
        files.sort();
        tracing::debug!(
            "found {} .{extension} files under {}",
            files.len(),
            root.display()
        );
        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// # Errors
    ///
    /// Returns `SmtraceError::Io` if a problem file cannot be read
    pub fn hash(&self) -> Result<ContentHash, SmtraceError> {
        corpus_hash(&self.files)
    }

    /// # Errors
    ///
    /// Returns `SmtraceError::Io` if a problem file cannot be read
    pub fn cache_key(&self, version: &SolverVersion) -> Result<CacheKey, SmtraceError> {
        Ok(CacheKey::new(version, self.hash()?))
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

fn collect(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> Result<(), SmtraceError> {
    let entries = fs::read_dir(dir).map_err(|e| SmtraceError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SmtraceError::io(dir, e))?;
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }
        let file_type = entry.file_type().map_err(|e| SmtraceError::io(&path, e))?;
        if file_type.is_dir() {
            collect(&path, extension, out)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        {
            out.push(path);
        }
    }
    Ok(())
}

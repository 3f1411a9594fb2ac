//! Diagnostics bundle written when a run or a check fails

use serde::Serialize;
use smtrace_core::{ContentHash, SmtraceError, hash_file};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    /// Problem file or log file that failed
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub name: String,
    pub bytes: u64,
    pub sha256: ContentHash,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub label: String,
    pub created_unix: u64,
    pub logs: Vec<ManifestEntry>,
    pub failures: Vec<FailureEntry>,
}

/// `.log` files directly inside `dir`, sorted
///
/// # Errors
///
/// Returns `SmtraceError::Io` if `dir` cannot be listed
pub fn log_files(dir: &Path) -> Result<Vec<PathBuf>, SmtraceError> {
    let mut logs = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| SmtraceError::io(dir, e))? {
        let path = entry.map_err(|e| SmtraceError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "log") {
            logs.push(path);
        }
    }
    logs.sort();
    Ok(logs)
}

/// Copy every log of `logs_dir` into `<archive_root>/<label>/` next to a
/// `manifest.json` describing them and the failures. Returns the bundle
/// directory.
///
/// # Errors
///
/// Returns `SmtraceError::Io` if logs cannot be read or the bundle cannot
/// be written
pub fn bundle(
    logs_dir: &Path,
    archive_root: &Path,
    label: &str,
    failures: &[FailureEntry],
) -> Result<PathBuf, SmtraceError> {
    let target = archive_root.join(label);
    fs::create_dir_all(&target).map_err(|e| SmtraceError::io(&target, e))?;

    let logs = if logs_dir.is_dir() {
        log_files(logs_dir)?
    } else {
        Vec::new()
    };

    let mut entries = Vec::with_capacity(logs.len());
    for log in &logs {
        let Some(name) = log.file_name() else {
            continue;
        };
        let dest = target.join(name);
        let bytes = fs::copy(log, &dest).map_err(|e| SmtraceError::io(log, e))?;
        entries.push(ManifestEntry {
            name: name.to_string_lossy().into_owned(),
            bytes,
            sha256: hash_file(&dest)?,
        });
    }

    let manifest = Manifest {
        label: label.to_string(),
        created_unix: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs()),
        logs: entries,
        failures: failures.to_vec(),
    };
    let manifest_path = target.join(MANIFEST_FILE);
    let json = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| SmtraceError::io(&manifest_path, e.into()))?;
    fs::write(&manifest_path, json).map_err(|e| SmtraceError::io(&manifest_path, e))?;

    tracing::info!(
        "archived {} logs and {} failures to {}",
        manifest.logs.len(),
        manifest.failures.len(),
        target.display()
    );
    Ok(target)
}

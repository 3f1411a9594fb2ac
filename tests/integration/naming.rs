//! Cache keys and log names computed from a real corpus on disk

use smtrace_core::{CacheKey, LogName, SolverVersion, hash_file};
use smtrace_runner::Corpus;
use std::fs;
use tempfile::TempDir;

fn corpus_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

#[test]
fn test_cache_key_round_trips_through_text() {
    let dir = corpus_dir(&[("a.smt2", "(check-sat)"), ("sub/b.smt2", "(push)")]);
    let corpus = Corpus::discover(dir.path(), "smt2").unwrap();
    let version = SolverVersion::new("4.8.10").unwrap();

    let key = corpus.cache_key(&version).unwrap();
    let parsed = CacheKey::parse(&key.to_string()).unwrap();

    assert_eq!(parsed, key);
    assert_eq!(parsed.version_fragment(), "4_8_10");
    assert_eq!(parsed.corpus_hash(), corpus.hash().unwrap());
}

#[test]
fn test_cache_key_ignores_unrelated_files() {
    let dir = corpus_dir(&[("a.smt2", "(check-sat)")]);
    let version = SolverVersion::new("4.12.2").unwrap();
    let before = Corpus::discover(dir.path(), "smt2")
        .unwrap()
        .cache_key(&version)
        .unwrap();

    fs::write(dir.path().join("README.txt"), "notes").unwrap();
    let after = Corpus::discover(dir.path(), "smt2")
        .unwrap()
        .cache_key(&version)
        .unwrap();

    assert_eq!(before, after);
}

#[test]
fn test_same_content_same_hash_different_stem() {
    let dir = corpus_dir(&[("x.smt2", "(assert p)"), ("nested/y.smt2", "(assert p)")]);
    let corpus = Corpus::discover(dir.path(), "smt2").unwrap();

    let names: Vec<_> = corpus
        .files()
        .iter()
        .map(|p| LogName::for_problem(p, hash_file(p).unwrap()).unwrap())
        .collect();

    assert_eq!(names[0].hash(), names[1].hash());
    assert_ne!(names[0].file_name(), names[1].file_name());
    // nested/y.smt2 sorts before x.smt2
    assert_eq!(LogName::parse(&names[0].file_name()).unwrap().stem(), "y");
}

//! SHA-256 content hashes of problem files and whole corpora

use crate::SmtraceError;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A SHA-256 digest, displayed as 64 lowercase hex characters
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub const HEX_LEN: usize = 64;

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64 character hex string (either case)
    #[must_use]
    pub fn from_hex(text: &str) -> Option<Self> {
        if text.len() != Self::HEX_LEN {
            return None;
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash(Sha256::digest(bytes).into())
}

/// Stream a file through SHA-256
///
/// # Errors
///
/// Returns `SmtraceError::Io` if the file cannot be opened or read
pub fn hash_file(path: impl AsRef<Path>) -> Result<ContentHash, SmtraceError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| SmtraceError::io(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| SmtraceError::io(path, e))?;
    Ok(ContentHash(hasher.finalize().into()))
}

/// Hash of a whole corpus: the digest of the per-file digests in path order.
///
/// The input order does not matter; paths are sorted first.
///
/// # Errors
///
/// Returns `SmtraceError::Io` if any file cannot be read
pub fn corpus_hash<P: AsRef<Path>>(paths: &[P]) -> Result<ContentHash, SmtraceError> {
    let mut sorted: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    for path in &sorted {
        hasher.update(hash_file(path)?.as_bytes());
    }
    Ok(ContentHash(hasher.finalize().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // sha256("abc")
    const ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn test_hash_bytes_known_vector() {
        assert_eq!(hash_bytes(b"abc").to_hex(), ABC);
    }

    #[test]
    fn test_hash_file_matches_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.smt2");
        fs::write(&path, "abc").unwrap();

        assert_eq!(hash_file(&path).unwrap().to_hex(), ABC);
    }

    #[test]
    fn test_hash_file_missing() {
        let result = hash_file("/nonexistent/smtrace/p.smt2");
        assert!(matches!(result, Err(SmtraceError::Io { .. })));
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(ContentHash::from_hex(ABC).is_some());
        assert!(ContentHash::from_hex(&ABC.to_uppercase()).is_some());
        assert!(ContentHash::from_hex(&ABC[1..]).is_none());
        assert!(ContentHash::from_hex(&ABC.replace('b', "z")).is_none());
    }

    #[test]
    fn test_corpus_hash_ignores_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.smt2");
        let b = dir.path().join("b.smt2");
        fs::write(&a, "(check-sat)").unwrap();
        fs::write(&b, "(assert false)").unwrap();

        let forward = corpus_hash(&[&a, &b]).unwrap();
        let backward = corpus_hash(&[&b, &a]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_corpus_hash_changes_with_content() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.smt2");
        fs::write(&a, "(check-sat)").unwrap();
        let before = corpus_hash(&[&a]).unwrap();

        fs::write(&a, "(check-sat)\n").unwrap();
        let after = corpus_hash(&[&a]).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_empty_corpus_hash() {
        let empty: [&Path; 0] = [];
        assert_eq!(corpus_hash(&empty).unwrap(), hash_bytes(b""));
    }
}

use crate::error::Error;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Content fingerprint of a whole file: BLAKE3 over every byte, hex encoded.
///
/// Depends on content only; path and timestamps never enter the hash.
/// Anything but a regular file (after following links) is an `EntryRead` error.
pub fn fingerprint_file(path: &Path) -> Result<String, Error> {
    hash_reader(path).map_err(|source| Error::EntryRead {
        path: path.to_path_buf(),
        source,
    })
}

pub fn fingerprint_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Fingerprint a file, treating an unreadable file as "no fingerprint".
pub fn fingerprint_or_none(path: &Path) -> Option<String> {
    match fingerprint_file(path) {
        Ok(fp) => Some(fp),
        Err(e) => {
            debug!("Fingerprint unavailable: {}", e);
            None
        }
    }
}

fn hash_reader(path: &Path) -> io::Result<String> {
    if !fs::metadata(path)?.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "content1").unwrap();

        let first = fingerprint_file(&path).unwrap();
        let second = fingerprint_file(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert_eq!(first, fingerprint_bytes(b"content1"));
    }

    #[test]
    fn test_fingerprint_differs_on_content() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "content1").unwrap();
        fs::write(&b, "content2").unwrap();

        assert_ne!(fingerprint_file(&a).unwrap(), fingerprint_file(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_ignores_path() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("one.bin");
        let b = dir.path().join("nested_two.bin");
        let data = vec![0xAAu8; READ_BUFFER_SIZE * 2 + 17];
        fs::write(&a, &data).unwrap();
        fs::write(&b, &data).unwrap();

        assert_eq!(fingerprint_file(&a).unwrap(), fingerprint_file(&b).unwrap());
    }

    #[test]
    fn test_empty_file_has_a_fingerprint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, "").unwrap();

        let fp = fingerprint_or_none(&path);
        assert_eq!(fp.as_deref(), Some(fingerprint_bytes(b"").as_str()));
        assert!(!fp.unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");

        match fingerprint_file(&missing) {
            Err(Error::EntryRead { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected EntryRead, got {:?}", other),
        }
        assert!(fingerprint_or_none(&missing).is_none());
    }

    #[test]
    fn test_directory_is_read_error() {
        let dir = tempdir().unwrap();

        match fingerprint_file(dir.path()) {
            Err(Error::EntryRead { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput)
            }
            other => panic!("expected EntryRead, got {:?}", other),
        }
    }
}

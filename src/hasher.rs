//! Content fingerprints for duplicate detection.
//!
//! Files are streamed through BLAKE3 in fixed-size chunks, so hashing a
//! multi-gigabyte video costs the same memory as hashing a text file.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default read size used when streaming a file into the digest.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Errors that can occur while fingerprinting a file.
#[derive(Error, Debug)]
pub enum HashError {
    /// The file could not be opened or read (permission denied, vanished mid-scan, ...).
    #[error("Failed to hash {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A 256-bit BLAKE3 digest of a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Lower-case hex form, as written to the action log.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<blake3::Hash> for Fingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

/// Computes fingerprints by streaming files in `chunk_size` pieces.
#[derive(Debug, Clone, Copy)]
pub struct FileHasher {
    chunk_size: usize,
}

impl FileHasher {
    /// Creates a hasher reading `chunk_size` bytes at a time.
    ///
    /// A zero chunk size is bumped to one byte; configuration validation
    /// rejects zero before it ever gets here.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fingerprints the file at `path`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pctidy::hasher::FileHasher;
    /// use std::path::Path;
    ///
    /// let fingerprint = FileHasher::default()
    ///     .fingerprint(Path::new("/path/to/file.bin"))
    ///     .expect("hash failed");
    /// println!("{}", fingerprint);
    /// ```
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let file = File::open(path).map_err(|e| HashError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.fingerprint_reader(file).map_err(|e| HashError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Fingerprints everything readable from `reader`.
    pub fn fingerprint_reader<R: Read>(&self, mut reader: R) -> io::Result<Fingerprint> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..read]);
        }
        Ok(hasher.finalize().into())
    }
}

impl Default for FileHasher {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_identical_content_same_fingerprint() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("b.txt");
        fs::write(&a, "same content").expect("Failed to write a");
        fs::write(&b, "same content").expect("Failed to write b");

        let hasher = FileHasher::default();
        assert_eq!(
            hasher.fingerprint(&a).expect("hash a"),
            hasher.fingerprint(&b).expect("hash b")
        );
    }

    #[test]
    fn test_different_content_different_fingerprint() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("b.txt");
        fs::write(&a, "content X").expect("Failed to write a");
        fs::write(&b, "content Y").expect("Failed to write b");

        let hasher = FileHasher::default();
        assert_ne!(
            hasher.fingerprint(&a).expect("hash a"),
            hasher.fingerprint(&b).expect("hash b")
        );
    }

    #[test]
    fn test_chunk_size_does_not_change_fingerprint() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let small = FileHasher::new(7).fingerprint_reader(&data[..]).unwrap();
        let large = FileHasher::new(DEFAULT_CHUNK_SIZE)
            .fingerprint_reader(&data[..])
            .unwrap();

        assert_eq!(small, large);
        assert_eq!(small, Fingerprint::from(blake3::hash(&data)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = FileHasher::default().fingerprint(&temp_dir.path().join("gone.bin"));
        assert!(matches!(result, Err(HashError::Io { .. })));
    }

    #[test]
    fn test_hex_display() {
        let fingerprint = Fingerprint::from(blake3::hash(b""));
        let hex = fingerprint.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("af1349b9"));
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        assert_eq!(FileHasher::new(0).chunk_size(), 1);
    }
}

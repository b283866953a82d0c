//! Content hashing for image identity.
//!
//! The BLAKE3 hash of the encoded bytes is what the session uses to decide
//! whether the image changed, and what `models download` uses to verify files.

use blake3::Hasher as Blake3Hasher;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// BLAKE3 content hashing.
pub struct Hasher;

impl Hasher {
    /// Generate a BLAKE3 hash of file contents.
    ///
    /// Streams the file so large model downloads are never held in memory.
    pub fn content_hash(path: &Path) -> std::io::Result<String> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = Blake3Hasher::new();

        let mut buffer = [0u8; 65536];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Generate a BLAKE3 hash from an in-memory byte buffer.
    pub fn content_hash_from_bytes(data: &[u8]) -> String {
        blake3::hash(data).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_and_bytes_hash_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, b"captionist").unwrap();

        let from_file = Hasher::content_hash(&path).unwrap();
        let from_bytes = Hasher::content_hash_from_bytes(b"captionist");
        assert_eq!(from_file, from_bytes);
        assert_eq!(from_file.len(), 64);
    }

    #[test]
    fn test_different_bytes_differ() {
        assert_ne!(
            Hasher::content_hash_from_bytes(b"cat"),
            Hasher::content_hash_from_bytes(b"dog")
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Hasher::content_hash(Path::new("/nonexistent/file.onnx")).is_err());
    }
}

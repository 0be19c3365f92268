// src/hash.rs

//! SHA-256 content hashing for payloads and containers
//!
//! Every payload and every packed container is identified by the lowercase
//! hex SHA-256 of its bytes; the runtime engine re-verifies these hashes at
//! install time, so the encoding here is part of the bundle format.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Hash and size of one on-disk file, captured in a single pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Lowercase hex SHA-256
    pub hash: String,
    /// File length in bytes
    pub size: u64,
}

/// Compute the SHA-256 of a byte slice as lowercase hex
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-256 of a reader's remaining bytes, returning hash and length
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<FileDigest> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        size += n as u64;
    }

    Ok(FileDigest {
        hash: hex::encode(hasher.finalize()),
        size,
    })
}

/// Hash and stat a file in one streaming pass
pub fn digest_file(path: &Path) -> io::Result<FileDigest> {
    let mut file = File::open(path)?;
    sha256_reader(&mut file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sha256_value() {
        let digest = sha256_bytes(b"Hello, World!");
        assert_eq!(
            digest,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn reader_matches_bytes_and_counts_length() {
        let data = b"Hello, World!";
        let mut cursor = io::Cursor::new(data);

        let digest = sha256_reader(&mut cursor).unwrap();
        assert_eq!(digest.hash, sha256_bytes(data));
        assert_eq!(digest.size, data.len() as u64);
    }

    #[test]
    fn empty_input_hashes_to_empty_digest() {
        let digest = sha256_reader(&mut io::Cursor::new(b"")).unwrap();
        assert_eq!(
            digest.hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(digest.size, 0);
    }

    #[test]
    fn digest_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, b"payload contents").unwrap();

        let digest = digest_file(&path).unwrap();
        assert_eq!(digest.hash, sha256_bytes(b"payload contents"));
        assert_eq!(digest.size, 16);
    }
}

use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;

use crate::TransferError;
use crate::source::{Origin, UploadFile};

/// Read buffer for the dedicated hashing pass.
const HASH_BUFFER_SIZE: usize = 256 * 1024;

/// Incremental MD5 over a whole file, fed in byte order.
///
/// The result depends only on the bytes fed, never on how they were split.
pub struct FileDigest {
    hasher: Md5,
    bytes: u64,
}

impl Default for FileDigest {
    fn default() -> Self {
        Self::new()
    }
}

impl FileDigest {
    pub fn new() -> Self {
        Self {
            hasher: Md5::new(),
            bytes: 0,
        }
    }

    /// Feeds the next contiguous run of bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Returns the lowercase hex digest.
    pub fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// MD5 of an in-memory buffer, hex-encoded.
pub fn digest_bytes(data: &[u8]) -> String {
    let mut digest = FileDigest::new();
    digest.update(data);
    digest.finalize()
}

/// Hashes a whole source in a dedicated pass.
///
/// Fails with [`TransferError::SizeMismatch`] if the source no longer has
/// the size recorded when it was described.
pub async fn digest_source(file: &UploadFile) -> Result<String, TransferError> {
    match file.origin() {
        Origin::Memory(data) => Ok(digest_bytes(data)),
        Origin::Path(path) => {
            let mut reader = tokio::fs::File::open(path).await?;
            let mut digest = FileDigest::new();
            let mut buf = vec![0u8; HASH_BUFFER_SIZE];
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                digest.update(&buf[..n]);
            }
            if digest.bytes_hashed() != file.size() {
                return Err(TransferError::SizeMismatch {
                    expected: file.size(),
                    actual: digest.bytes_hashed(),
                });
            }
            Ok(digest.finalize())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_digest() {
        assert_eq!(digest_bytes(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            digest_bytes(b"The quick brown fox jumps over the lazy dog"),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    #[test]
    fn split_points_do_not_change_digest() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let whole = digest_bytes(&data);

        for split in [1usize, 7, 4096, 9_999] {
            let mut digest = FileDigest::new();
            for part in data.chunks(split) {
                digest.update(part);
            }
            assert_eq!(digest.bytes_hashed(), data.len() as u64);
            assert_eq!(digest.finalize(), whole, "split size {split}");
        }
    }

    #[tokio::test]
    async fn digest_source_matches_memory() {
        let dir = tempfile::tempdir().unwrap();
        let data = vec![0x5Au8; HASH_BUFFER_SIZE * 2 + 17];
        let path = dir.path().join("variants.vcf");
        std::fs::write(&path, &data).unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(digest_source(&file).await.unwrap(), digest_bytes(&data));

        let mem = UploadFile::from_bytes("variants.vcf", data.clone()).unwrap();
        assert_eq!(digest_source(&mem).await.unwrap(), digest_bytes(&data));
    }

    #[tokio::test]
    async fn digest_source_detects_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shrinking.bin");
        std::fs::write(&path, b"0123456789").unwrap();
        let file = UploadFile::from_path(&path).await.unwrap();

        std::fs::write(&path, b"01234").unwrap();
        let result = digest_source(&file).await;
        assert!(matches!(
            result,
            Err(TransferError::SizeMismatch {
                expected: 10,
                actual: 5
            })
        ));
    }
}

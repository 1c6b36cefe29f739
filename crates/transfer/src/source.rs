use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::TransferError;

/// A named byte source with a size known before the upload starts.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    size: u64,
    origin: Origin,
}

#[derive(Debug, Clone)]
pub(crate) enum Origin {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

impl UploadFile {
    /// Describes a regular file on disk. The display name is the path's
    /// final component; the size is taken from metadata now.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidSource(format!(
                "not a regular file: {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        validate_file_name(&name)?;

        Ok(Self {
            name,
            size: metadata.len(),
            origin: Origin::Path(path.to_path_buf()),
        })
    }

    /// Wraps an in-memory buffer.
    pub fn from_bytes(
        name: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<Self, TransferError> {
        let name = name.into();
        validate_file_name(&name)?;
        let data = data.into();
        Ok(Self {
            name,
            size: data.len() as u64,
            origin: Origin::Memory(data),
        })
    }

    /// Replaces the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Result<Self, TransferError> {
        let name = name.into();
        validate_file_name(&name)?;
        self.name = name;
        Ok(self)
    }

    /// Display name sent to the backend.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Local path, if the source is a file on disk.
    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            Origin::Path(p) => Some(p),
            Origin::Memory(_) => None,
        }
    }

    pub(crate) fn origin(&self) -> &Origin {
        &self.origin
    }
}

/// Rejects names that are empty or that carry path structure.
///
/// The name is metadata for the backend, never a storage path.
fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidSource("empty file name".into()));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(TransferError::InvalidSource(format!(
            "file name must not contain path separators: {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_path_reads_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ct-scan.dcm");
        std::fs::write(&path, b"DICM0123").unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name(), "ct-scan.dcm");
        assert_eq!(file.size(), 8);
        assert_eq!(file.path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn from_path_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = UploadFile::from_path(dir.path()).await;
        assert!(matches!(result, Err(TransferError::InvalidSource(_))));
    }

    #[tokio::test]
    async fn from_path_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = UploadFile::from_path(dir.path().join("absent.vcf")).await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }

    #[test]
    fn from_bytes_keeps_size() {
        let file = UploadFile::from_bytes("report.pdf", b"%PDF-1.7".to_vec()).unwrap();
        assert_eq!(file.size(), 8);
        assert!(file.path().is_none());
    }

    #[test]
    fn empty_name_rejected() {
        assert!(UploadFile::from_bytes("", Vec::new()).is_err());
        assert!(UploadFile::from_bytes("   ", Vec::new()).is_err());
    }

    #[test]
    fn separators_rejected() {
        assert!(UploadFile::from_bytes("../etc/passwd", Vec::new()).is_err());
        assert!(UploadFile::from_bytes("dir\\file.bin", Vec::new()).is_err());
    }

    #[test]
    fn with_name_validates() {
        let file = UploadFile::from_bytes("a.bin", vec![1, 2, 3]).unwrap();
        let renamed = file.clone().with_name("biopsy.tiff").unwrap();
        assert_eq!(renamed.name(), "biopsy.tiff");
        assert!(file.with_name("").is_err());
    }
}

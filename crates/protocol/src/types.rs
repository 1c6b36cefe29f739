use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Clinical modality tag; routes a file to its storage/processing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileCategory {
    #[serde(rename = "pathology")]
    Pathology,
    #[serde(rename = "radiology")]
    Radiology,
    #[serde(rename = "clinical")]
    Clinical,
    #[serde(rename = "genomic")]
    Genomic,
}

impl FileCategory {
    /// All categories accepted by the backend.
    pub const ALL: [FileCategory; 4] = [
        FileCategory::Pathology,
        FileCategory::Radiology,
        FileCategory::Clinical,
        FileCategory::Genomic,
    ];

    /// Returns the wire string for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Pathology => "pathology",
            FileCategory::Radiology => "radiology",
            FileCategory::Clinical => "clinical",
            FileCategory::Genomic => "genomic",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the four category tags.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown file category: {0}")]
pub struct ParseCategoryError(pub String);

impl FromStr for FileCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// Per-chunk transfer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkState {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in_flight")]
    InFlight,
    #[serde(rename = "acknowledged")]
    Acknowledged,
    #[serde(rename = "failed")]
    Failed,
}

/// Current state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "finalizing")]
    Finalizing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl UploadStatus {
    /// Returns `true` once the session can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::Failed | UploadStatus::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_wire_strings() {
        assert_eq!(
            serde_json::to_string(&FileCategory::Pathology).unwrap(),
            "\"pathology\""
        );
        assert_eq!(
            serde_json::to_string(&FileCategory::Genomic).unwrap(),
            "\"genomic\""
        );
        for category in FileCategory::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn category_from_str() {
        assert_eq!(
            "radiology".parse::<FileCategory>().unwrap(),
            FileCategory::Radiology
        );
        assert_eq!(
            "clinical".parse::<FileCategory>().unwrap(),
            FileCategory::Clinical
        );
    }

    #[test]
    fn category_rejects_unknown_and_case_variants() {
        assert!("Pathology".parse::<FileCategory>().is_err());
        assert!("imaging".parse::<FileCategory>().is_err());
        let err = "".parse::<FileCategory>().unwrap_err();
        assert_eq!(err.to_string(), "unknown file category: ");
    }

    #[test]
    fn category_deserialize_rejects_unknown() {
        let result: Result<FileCategory, _> = serde_json::from_str("\"histology\"");
        assert!(result.is_err());
    }

    #[test]
    fn chunk_state_serialization() {
        assert_eq!(
            serde_json::to_string(&ChunkState::InFlight).unwrap(),
            "\"in_flight\""
        );
        assert_eq!(
            serde_json::to_string(&ChunkState::Acknowledged).unwrap(),
            "\"acknowledged\""
        );
    }

    #[test]
    fn upload_status_serialization() {
        assert_eq!(
            serde_json::to_string(&UploadStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&UploadStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn upload_status_terminal() {
        assert!(!UploadStatus::Pending.is_terminal());
        assert!(!UploadStatus::InProgress.is_terminal());
        assert!(!UploadStatus::Finalizing.is_terminal());
        assert!(UploadStatus::Completed.is_terminal());
        assert!(UploadStatus::Failed.is_terminal());
        assert!(UploadStatus::Cancelled.is_terminal());
    }
}

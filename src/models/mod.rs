use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::utils::hash::calculate_hash;

/// Canonical identity of a stored file: hex-encoded SHA-256 of its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(data: &[u8]) -> Self {
        Self(calculate_hash(data))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-side request correlation id, derived from file metadata.
///
/// Two different files can share a request id (same name, size and
/// modification time), and the same content can arrive under different
/// request ids. It never stands in for a [`ContentHash`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn derive(name: &str, size: u64, last_modified: i64) -> Self {
        Self(format!("{}-{}-{}", name, size, last_modified))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Hex SHA-256 of the content; equal to the store key.
    #[schema(value_type = String)]
    pub checksum: ContentHash,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    /// Present only on a dedup hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[schema(value_type = String)]
    pub file_id: ContentHash,
    pub file: StoredFile,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<StoredFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_is_metadata_only() {
        let id = RequestId::derive("a.txt", 10, 1_700_000_000_000);
        assert_eq!(id.as_str(), "a.txt-10-1700000000000");
        // Same metadata, different content: same request id.
        assert_eq!(id, RequestId::derive("a.txt", 10, 1_700_000_000_000));
        assert_ne!(ContentHash::of(b"0123456789"), ContentHash::of(b"9876543210"));
    }

    #[test]
    fn test_upload_response_wire_format() {
        let checksum = ContentHash::of(b"a.txt content");
        let response = UploadResponse {
            success: true,
            message: None,
            file_id: checksum.clone(),
            file: StoredFile {
                name: "a.txt".to_string(),
                size: 13,
                uploaded_at: Utc::now(),
                checksum,
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("message").is_none());
        assert_eq!(json["fileId"], json["file"]["checksum"]);
        assert!(json["file"]["uploadedAt"].is_string());
    }
}

//! Upload client: drives one file's attempts against the upload endpoint
//! until it succeeds, is refused, runs out of retries or is cancelled.

pub mod backoff;
pub mod error;
pub mod sleeper;
pub mod transport;
pub mod uploader;

pub use backoff::BackoffPolicy;
pub use error::UploadError;
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
pub use transport::{HttpTransport, TransportError, UploadTransport};
pub use uploader::{UploadClient, UploadTask};

use crate::models::{ContentHash, RequestId, StoredFile};
use anyhow::Context;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// A file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
    pub content: Bytes,
}

impl FilePayload {
    pub fn new(name: impl Into<String>, last_modified: i64, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            last_modified,
            content: content.into(),
        }
    }

    pub async fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let modified = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .with_context(|| format!("stat {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();

        Ok(Self::new(
            name,
            DateTime::<Utc>::from(modified).timestamp_millis(),
            content,
        ))
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn request_id(&self) -> RequestId {
        RequestId::derive(&self.name, self.size(), self.last_modified)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Retrying,
    Success,
    Error,
}

/// Observer notification, delivered in order on the task's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Status(UploadStatus),
    /// `attempt` counts from 1. Within one attempt `percent` strictly
    /// increases; 100 is only sent after the endpoint confirmed success.
    Progress { attempt: u32, percent: u8 },
    /// Sent before waiting `delay` ahead of retry number `retry` (from 1).
    Retry {
        retry: u32,
        delay: Duration,
        error: TransportError,
    },
}

/// Successful terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub file_id: ContentHash,
    pub file: StoredFile,
    /// The endpoint already held this content.
    pub duplicate: bool,
    /// Total attempts made, including the successful one.
    pub attempts: u32,
}

/// Flat summary of an upload, shaped like the endpoint's JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<ContentHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<UploadReceipt, UploadError>> for UploadResult {
    fn from(outcome: &Result<UploadReceipt, UploadError>) -> Self {
        match outcome {
            Ok(receipt) => UploadResult {
                success: true,
                file_id: Some(receipt.file_id.clone()),
                error: None,
            },
            Err(err) => UploadResult {
                success: false,
                file_id: None,
                error: Some(err.to_string()),
            },
        }
    }
}

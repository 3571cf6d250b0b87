use crate::client::FilePayload;
use crate::models::{ErrorResponse, RequestId, UploadResponse};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upload failed with status {status}")]
    Status {
        status: u16,
        message: Option<String>,
    },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// 4xx responses mean the payload itself was refused; resending the
    /// same bytes cannot help. 408 and 429 are the exceptions.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Timeout(_) => true,
            TransportError::Status { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
        }
    }
}

/// One round trip to the upload endpoint.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send(
        &self,
        request_id: &RequestId,
        file: &FilePayload,
    ) -> Result<UploadResponse, TransportError>;
}

/// Multipart POST to `{base_url}/api/upload`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/upload", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn send(
        &self,
        request_id: &RequestId,
        file: &FilePayload,
    ) -> Result<UploadResponse, TransportError> {
        let part = Part::bytes(file.content.to_vec()).file_name(file.name.clone());
        let form = Form::new()
            .part("file", part)
            .text("fileId", request_id.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .map(|body| body.error);
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<UploadResponse>()
            .await
            .map_err(|e| TransportError::Network(format!("Invalid response body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let status = |status| TransportError::Status {
            status,
            message: None,
        };
        assert!(TransportError::Network("reset".into()).is_retryable());
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(408).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(413).is_retryable());
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        assert_eq!(
            HttpTransport::new("http://127.0.0.1:3000/").endpoint(),
            "http://127.0.0.1:3000/api/upload"
        );
        assert_eq!(
            HttpTransport::new("http://localhost:8080").endpoint(),
            "http://localhost:8080/api/upload"
        );
    }
}

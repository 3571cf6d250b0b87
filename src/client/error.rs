use crate::client::transport::TransportError;
use thiserror::Error;

/// Terminal failure of an upload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    /// Every attempt failed transiently.
    #[error("Upload failed after {retries} retries")]
    RetriesExhausted {
        retries: u32,
        last_error: TransportError,
    },

    /// The endpoint refused the payload; not retried.
    #[error("Upload rejected: {0}")]
    InvalidInput(String),

    #[error("Upload cancelled")]
    Cancelled,
}

impl UploadError {
    pub(crate) fn rejected(err: &TransportError) -> Self {
        match err {
            TransportError::Status {
                message: Some(message),
                ..
            } => UploadError::InvalidInput(message.clone()),
            other => UploadError::InvalidInput(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_hides_transport_detail() {
        let err = UploadError::RetriesExhausted {
            retries: 3,
            last_error: TransportError::Network("connection reset by peer".into()),
        };
        assert_eq!(err.to_string(), "Upload failed after 3 retries");
    }

    #[test]
    fn test_rejected_prefers_server_message() {
        let err = UploadError::rejected(&TransportError::Status {
            status: 400,
            message: Some("No file provided".into()),
        });
        assert_eq!(err, UploadError::InvalidInput("No file provided".into()));

        let err = UploadError::rejected(&TransportError::Status {
            status: 413,
            message: None,
        });
        assert_eq!(err.to_string(), "Upload rejected: Upload failed with status 413");
    }
}

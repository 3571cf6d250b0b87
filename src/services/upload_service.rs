use crate::api::error::AppError;
use crate::config::ServerConfig;
use crate::models::{ContentHash, RequestId, StoredFile, UploadResponse};
use crate::services::fault::FailureInjector;
use crate::services::store::{FileStore, PutOutcome};
use crate::utils::validation::validate_file_size;
use chrono::Utc;
use std::sync::Arc;

pub const ALREADY_UPLOADED_MESSAGE: &str = "File already uploaded (idempotent)";
pub const SIMULATED_FAILURE_MESSAGE: &str = "Simulated network error";
/// Stored in place of an empty client filename.
pub const UNNAMED_FILE: &str = "unnamed";

/// What happened to one accepted attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Created(StoredFile),
    /// Dedup hit: the content was already stored, nothing was written.
    AlreadyUploaded(StoredFile),
}

impl IngestOutcome {
    pub fn file(&self) -> &StoredFile {
        match self {
            IngestOutcome::Created(file) | IngestOutcome::AlreadyUploaded(file) => file,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestOutcome::AlreadyUploaded(_))
    }
}

impl From<IngestOutcome> for UploadResponse {
    fn from(outcome: IngestOutcome) -> Self {
        let (file, message) = match outcome {
            IngestOutcome::Created(file) => (file, None),
            IngestOutcome::AlreadyUploaded(file) => {
                (file, Some(ALREADY_UPLOADED_MESSAGE.to_string()))
            }
        };
        UploadResponse {
            success: true,
            message,
            file_id: file.checksum.clone(),
            file,
        }
    }
}

/// Idempotent ingestion: at most one record per distinct content.
pub struct UploadService {
    store: Arc<dyn FileStore>,
    failures: Arc<dyn FailureInjector>,
    config: ServerConfig,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn FileStore>,
        failures: Arc<dyn FailureInjector>,
        config: ServerConfig,
    ) -> Self {
        Self {
            store,
            failures,
            config,
        }
    }

    pub async fn ingest(
        &self,
        filename: &str,
        data: &[u8],
        request_id: Option<&RequestId>,
    ) -> Result<IngestOutcome, AppError> {
        let request_id = request_id.map(RequestId::as_str).unwrap_or("-");

        if self.failures.should_fail() {
            tracing::warn!(request_id, "Injected failure for {}", filename);
            return Err(AppError::Unavailable(SIMULATED_FAILURE_MESSAGE.to_string()));
        }

        let name = if filename.is_empty() {
            UNNAMED_FILE
        } else {
            filename
        };
        validate_file_size(data.len(), self.config.max_file_size)?;

        let checksum = ContentHash::of(data);

        // Fast path: no write needed for content we have seen.
        if let Some(existing) = self.store.get(&checksum).await? {
            tracing::info!(request_id, %checksum, "Deduplication hit for {}", name);
            return Ok(IngestOutcome::AlreadyUploaded(existing));
        }

        let record = StoredFile {
            name: name.to_string(),
            size: data.len() as u64,
            uploaded_at: Utc::now(),
            checksum,
        };

        // A concurrent upload of the same bytes may win between the lookup
        // above and this insert; put_if_absent settles it.
        match self.store.put_if_absent(record).await? {
            PutOutcome::Inserted(file) => {
                tracing::info!(
                    request_id,
                    checksum = %file.checksum,
                    size = file.size,
                    "File uploaded: {}",
                    file.name
                );
                Ok(IngestOutcome::Created(file))
            }
            PutOutcome::Existing(file) => {
                tracing::info!(request_id, checksum = %file.checksum, "Lost insert race, reusing record");
                Ok(IngestOutcome::AlreadyUploaded(file))
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<StoredFile>, AppError> {
        Ok(self.store.list().await?)
    }

    pub async fn count(&self) -> Result<usize, AppError> {
        Ok(self.store.len().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fault::{FailFirst, NoFailures};
    use crate::services::store::InMemoryFileStore;

    fn service(failures: Arc<dyn FailureInjector>) -> UploadService {
        UploadService::new(
            Arc::new(InMemoryFileStore::new()),
            failures,
            ServerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_first_upload_creates_record() {
        let svc = service(Arc::new(NoFailures));
        let outcome = svc.ingest("a.txt", b"a.txt content", None).await.unwrap();

        assert!(!outcome.is_duplicate());
        assert_eq!(outcome.file().checksum, ContentHash::of(b"a.txt content"));
        assert_eq!(outcome.file().size, 13);
        assert_eq!(svc.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_repeat_upload_is_idempotent() {
        let svc = service(Arc::new(NoFailures));
        let first = svc.ingest("a.txt", b"payload", None).await.unwrap();
        let again = svc.ingest("renamed.txt", b"payload", None).await.unwrap();

        assert!(again.is_duplicate());
        assert_eq!(again.file(), first.file());
        assert_eq!(svc.count().await.unwrap(), 1);

        let response: UploadResponse = again.into();
        assert_eq!(response.message.as_deref(), Some(ALREADY_UPLOADED_MESSAGE));
        assert_eq!(response.file_id, first.file().checksum);
    }

    #[tokio::test]
    async fn test_injected_failure_writes_nothing() {
        let svc = service(Arc::new(FailFirst::new(1)));

        let err = svc.ingest("a.txt", b"payload", None).await.unwrap_err();
        assert!(matches!(err, AppError::Unavailable(ref m) if m == SIMULATED_FAILURE_MESSAGE));
        assert_eq!(svc.count().await.unwrap(), 0);

        assert!(svc.ingest("a.txt", b"payload", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let svc = UploadService::new(
            Arc::new(InMemoryFileStore::new()),
            Arc::new(NoFailures),
            ServerConfig {
                max_file_size: 4,
                ..ServerConfig::default()
            },
        );
        let err = svc.ingest("big.bin", b"12345", None).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn test_filename_stored_as_given() {
        let svc = service(Arc::new(NoFailures));

        let odd = svc.ingest("notes:v2?.txt", b"one", None).await.unwrap();
        assert_eq!(odd.file().name, "notes:v2?.txt");

        let nested = svc.ingest("../dir/", b"two", None).await.unwrap();
        assert_eq!(nested.file().name, "../dir/");

        let empty = svc.ingest("", b"three", None).await.unwrap();
        assert!(!empty.is_duplicate());
        assert_eq!(empty.file().name, UNNAMED_FILE);
        assert_eq!(svc.count().await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_uploads_create_once() {
        let svc = Arc::new(service(Arc::new(NoFailures)));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.ingest("race.bin", b"same bytes", None).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if !handle.await.unwrap().unwrap().is_duplicate() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(svc.count().await.unwrap(), 1);
    }
}

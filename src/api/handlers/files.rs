use crate::AppState;
use crate::api::error::AppError;
use crate::models::{FileListResponse, RequestId, UploadResponse};
use axum::{
    Json,
    extract::{Multipart, State},
};
use bytes::Bytes;

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = Multipart, description = "Multipart form with a `file` part and an optional `fileId` request id"),
    responses(
        (status = 200, description = "Stored, or already stored (idempotent)", body = UploadResponse),
        (status = 400, description = "No file provided", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Transient failure, retry", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload: Option<(String, Bytes)> = None;
    let mut request_id: Option<RequestId> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?;
            upload = Some((filename, data));
        } else if name == "fileId" {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?;
            if !text.is_empty() {
                request_id = Some(RequestId::from(text));
            }
        }
    }

    let (filename, data) =
        upload.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let outcome = state
        .upload_service
        .ingest(&filename, &data, request_id.as_ref())
        .await?;

    Ok(Json(outcome.into()))
}

#[utoipa::path(
    get,
    path = "/api/upload",
    responses(
        (status = 200, description = "All stored files", body = FileListResponse)
    ),
    tag = "files"
)]
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FileListResponse>, AppError> {
    let files = state.upload_service.list().await?;
    Ok(Json(FileListResponse { files }))
}

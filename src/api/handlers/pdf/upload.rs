use crate::api::error::AppError;
use crate::models::StoredFile;
use crate::services::pdf_service::UploadRequest;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use futures::TryStreamExt;

use super::types::*;

/// Multipart field carrying the attachment.
pub const FILE_FIELD: &str = "file";

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

#[utoipa::path(
    post,
    path = "/api/pdf/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "PDF upload"),
    responses(
        (status = 201, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "No file attached or not a PDF"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "File too large"),
        (status = 500, description = "File upload failed")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "pdf"
)]
pub async fn upload_pdf(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Upload without a multipart body: {}", e);
        AppError::BadRequest("No file attached".to_string())
    })?;

    let result: Result<StoredFile, AppError> = async {
        let mut stored: Option<StoredFile> = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }
            // A plain form value named "file" is not an attachment, and
            // browsers send an empty filename when nothing was picked
            let Some(filename) = field
                .file_name()
                .filter(|name| !name.is_empty())
                .map(str::to_string)
            else {
                continue;
            };
            if stored.is_some() {
                tracing::warn!("Ignoring extra attachment {}", filename);
                continue;
            }

            let content_type = field.content_type().map(str::to_string);
            let body = field.map_err(std::io::Error::other);

            let file = state
                .pdf_service
                .upload(UploadRequest {
                    filename,
                    content_type,
                    owner_id: Some(claims.sub.clone()),
                    body,
                })
                .await?;
            stored = Some(file);
        }

        stored.ok_or_else(|| AppError::BadRequest("No file attached".to_string()))
    }
    .await;

    match result {
        Ok(stored) => Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "File uploaded successfully".to_string(),
                file_id: stored.id,
            }),
        )),
        Err(e) => {
            // Consume the rest of the body so the client sees the response
            // instead of a connection reset
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}

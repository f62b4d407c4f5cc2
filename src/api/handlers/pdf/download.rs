use crate::api::error::AppError;
use crate::models::StoredFile;
use crate::services::pdf_service::PdfDownload;
use crate::utils::auth::Claims;
use crate::utils::validation::PDF_CONTENT_TYPE;
use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// RFC 5987 attr-chars that may stay unescaped besides alphanumerics.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

#[utoipa::path(
    get,
    path = "/api/pdf/download/{filename}",
    params(
        ("filename" = String, Path, description = "Filename given at upload")
    ),
    responses(
        (status = 200, description = "PDF byte stream", body = Vec<u8>, content_type = "application/pdf"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Error retrieving file")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "pdf"
)]
pub async fn download_pdf(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let download = state.pdf_service.download_by_filename(&filename).await?;

    tracing::info!(
        "📥 Streaming {} ({}) to user={}",
        download.file.filename,
        download.file.id,
        claims.sub
    );

    pdf_response(download)
}

#[utoipa::path(
    get,
    path = "/api/pdf/files/{id}",
    params(
        ("id" = String, Path, description = "Stored file ID")
    ),
    responses(
        (status = 200, description = "PDF byte stream", body = Vec<u8>, content_type = "application/pdf"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Error retrieving file")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "pdf"
)]
pub async fn download_pdf_by_id(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let download = state.pdf_service.download_by_id(&file_id).await?;

    tracing::info!(
        "📥 Streaming {} ({}) to user={}",
        download.file.filename,
        download.file.id,
        claims.sub
    );

    pdf_response(download)
}

#[utoipa::path(
    get,
    path = "/api/pdf/files",
    responses(
        (status = 200, description = "Files uploaded by the caller, newest first", body = [StoredFile]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "pdf"
)]
pub async fn list_files(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<StoredFile>>, AppError> {
    let files = state.pdf_service.list_for_owner(&claims.sub).await?;
    Ok(Json(files))
}

/// Headers are sent before the first chunk is read, so a store failure in
/// the middle of the body can only cut the stream short.
fn pdf_response(download: PdfDownload) -> Result<Response, AppError> {
    let PdfDownload { file, body } = download;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, PDF_CONTENT_TYPE)
        .header(header::CONTENT_DISPOSITION, content_disposition(&file.filename))
        .header(header::CONTENT_LENGTH, file.length)
        .body(Body::from_stream(body))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}

/// `attachment` disposition with an ASCII fallback name and the exact name
/// in RFC 5987 form.
pub fn content_disposition(filename: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .collect::<String>();
    let fallback_filename = if ascii_filename.trim().is_empty() {
        "document.pdf"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, FILENAME_ENCODE_SET).to_string();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    )
}

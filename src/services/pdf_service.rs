use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::models::StoredFile;
use crate::services::storage::{ByteSource, ObjectStore, UploadSink};
use crate::utils::validation::{
    PDF_CONTENT_TYPE, PDF_SIGNATURE, validate_file_size, validate_filename,
    validate_pdf_media_type, verify_pdf_signature,
};
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use std::sync::Arc;

/// One attachment to store, with its body as a lazy byte sequence.
pub struct UploadRequest<S> {
    pub filename: String,
    pub content_type: Option<String>,
    pub owner_id: Option<String>,
    pub body: S,
}

/// A resolved download: headers come from `file`, bytes from `body`.
pub struct PdfDownload {
    pub file: StoredFile,
    pub body: ByteSource,
}

pub struct PdfService {
    store: Arc<dyn ObjectStore>,
    max_file_size: usize,
    verify_signature: bool,
}

impl PdfService {
    pub fn new(store: Arc<dyn ObjectStore>, config: &AppConfig) -> Self {
        Self {
            store,
            max_file_size: config.max_file_size,
            verify_signature: config.verify_pdf_signature,
        }
    }

    /// Validates the attachment and streams it into a new upload sink.
    ///
    /// Nothing is opened in the store when validation fails. When streaming
    /// fails the sink is aborted and the error is returned as is; the caller
    /// has to upload again.
    pub async fn upload<S>(&self, request: UploadRequest<S>) -> Result<StoredFile, AppError>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin + Send,
    {
        validate_pdf_media_type(request.content_type.as_deref())?;
        validate_filename(&request.filename)?;
        let filename = request.filename;

        let mut sink = self
            .store
            .open_upload_sink(&filename, PDF_CONTENT_TYPE, request.owner_id.as_deref())
            .await
            .map_err(|e| AppError::store("File upload failed", e))?;

        tracing::info!("📄 Uploading {:?} as {}", filename, sink.id());

        let result = match self.pump(sink.as_mut(), request.body).await {
            Ok(()) => sink
                .finish()
                .await
                .map_err(|e| AppError::store("File upload failed", e)),
            Err(e) => Err(e),
        };

        match result {
            Ok(stored) => {
                tracing::info!(
                    "✅ Stored {} ({} bytes) as {}",
                    stored.filename,
                    stored.length,
                    stored.id
                );
                Ok(stored)
            }
            Err(e) => {
                if let Err(abort_err) = sink.abort().await {
                    tracing::warn!("Failed to abort upload {}: {}", sink.id(), abort_err);
                }
                Err(e)
            }
        }
    }

    /// Copies the body into the sink in arrival order.
    async fn pump<S>(&self, sink: &mut dyn UploadSink, mut body: S) -> Result<(), AppError>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin + Send,
    {
        let mut written = 0usize;
        let mut header: Vec<u8> = Vec::with_capacity(PDF_SIGNATURE.len());
        let mut header_checked = !self.verify_signature;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?
        {
            written += chunk.len();
            validate_file_size(written, self.max_file_size)?;

            if !header_checked {
                let take = (PDF_SIGNATURE.len() - header.len()).min(chunk.len());
                header.extend_from_slice(&chunk[..take]);
                if header.len() == PDF_SIGNATURE.len() {
                    verify_pdf_signature(&header)?;
                    header_checked = true;
                }
            }

            sink.write(&chunk)
                .await
                .map_err(|e| AppError::store("File upload failed", e))?;
        }

        if !header_checked {
            // Shorter than the signature itself
            verify_pdf_signature(&header)?;
        }

        Ok(())
    }

    /// Resolves a filename to the first stored match and opens its bytes.
    pub async fn download_by_filename(&self, filename: &str) -> Result<PdfDownload, AppError> {
        let matches = self
            .store
            .find_by_filename(filename)
            .await
            .map_err(|e| AppError::store("Error retrieving file", e))?;

        if matches.len() > 1 {
            tracing::debug!(
                "{} files named {}, serving the first upload",
                matches.len(),
                filename
            );
        }

        let file = matches
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        self.open(file).await
    }

    pub async fn download_by_id(&self, id: &str) -> Result<PdfDownload, AppError> {
        let file = self
            .store
            .find_by_id(id)
            .await
            .map_err(|e| AppError::store("Error retrieving file", e))?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        self.open(file).await
    }

    pub async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<StoredFile>, AppError> {
        self.store
            .list_by_owner(owner_id)
            .await
            .map_err(|e| AppError::store("Error listing files", e))
    }

    async fn open(&self, file: StoredFile) -> Result<PdfDownload, AppError> {
        let source = self
            .store
            .open_download_source(&file.id)
            .await
            .map_err(|e| AppError::store("Error retrieving file", e))?;

        let file_id = file.id.clone();
        let body = source.inspect_err(move |e| {
            tracing::error!("Download of {} failed mid-stream: {}", file_id, e);
        });

        Ok(PdfDownload {
            file,
            body: Box::pin(body),
        })
    }
}

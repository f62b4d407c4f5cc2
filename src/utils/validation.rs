/// The only media type accepted for uploads.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Leading bytes of every PDF document.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

const MAX_FILENAME_BYTES: usize = 255;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Checks the declared media type of an attachment.
///
/// Only the declared value is inspected, and it must be exactly
/// `application/pdf`.
pub fn validate_pdf_media_type(content_type: Option<&str>) -> Result<(), ValidationError> {
    match content_type {
        Some(PDF_CONTENT_TYPE) => Ok(()),
        other => {
            tracing::debug!("Rejected upload with media type {:?}", other);
            Err(ValidationError::new(
                "UNSUPPORTED_MEDIA_TYPE",
                "Only PDF files are allowed",
            ))
        }
    }
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError::new(
            "FILE_TOO_LARGE",
            format!(
                "File size exceeds maximum allowed {} bytes ({} MB)",
                max_size,
                max_size / 1024 / 1024
            ),
        ));
    }
    Ok(())
}

/// Checks the attachment's filename. The name is stored exactly as sent,
/// since downloads look it up byte for byte; header escaping happens when
/// the download response is built.
pub fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    if filename.is_empty() {
        return Err(ValidationError::new("INVALID_FILENAME", "No file attached"));
    }

    if filename.len() > MAX_FILENAME_BYTES {
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            format!("Filename exceeds {} bytes", MAX_FILENAME_BYTES),
        ));
    }

    Ok(())
}

/// Checks that the first bytes of a payload look like a PDF document.
pub fn verify_pdf_signature(header: &[u8]) -> Result<(), ValidationError> {
    if header.starts_with(PDF_SIGNATURE) {
        return Ok(());
    }
    Err(ValidationError::new(
        "SIGNATURE_MISMATCH",
        "File content is not a PDF document",
    ))
}

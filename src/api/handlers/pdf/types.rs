use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub file_id: String,
}

/// Shape of the multipart upload body, for the API docs only.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The PDF attachment, sent with `Content-Type: application/pdf`
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

use crate::entities::stored_files;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A persisted binary object plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoredFile {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub length: i64,
    pub chunk_size: i32,
    pub upload_date: DateTime<Utc>,
    pub owner_id: Option<String>,
}

impl StoredFile {
    /// Number of chunks the file occupies in a chunked bucket.
    pub fn chunk_count(&self) -> i32 {
        if self.length <= 0 || self.chunk_size <= 0 {
            return 0;
        }
        let chunk_size = self.chunk_size as i64;
        ((self.length + chunk_size - 1) / chunk_size) as i32
    }
}

impl From<stored_files::Model> for StoredFile {
    fn from(model: stored_files::Model) -> Self {
        Self {
            id: model.id,
            filename: model.filename,
            content_type: model.content_type,
            length: model.length,
            chunk_size: model.chunk_size,
            upload_date: model.upload_date,
            owner_id: model.owner_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(length: i64, chunk_size: i32) -> StoredFile {
        StoredFile {
            id: "id".to_string(),
            filename: "a.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            length,
            chunk_size,
            upload_date: Utc::now(),
            owner_id: None,
        }
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(file(0, 16).chunk_count(), 0);
        assert_eq!(file(1, 16).chunk_count(), 1);
        assert_eq!(file(16, 16).chunk_count(), 1);
        assert_eq!(file(17, 16).chunk_count(), 2);
        assert_eq!(file(48, 16).chunk_count(), 3);
    }
}

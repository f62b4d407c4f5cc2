use crate::models::StoredFile;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream::BoxStream;
use thiserror::Error;

pub mod chunked;
pub(crate) mod metadata;
pub mod s3;

pub use chunked::ChunkedBucket;
pub use s3::S3Bucket;

/// Lazy, finite and non-restartable sequence of byte chunks read from a store.
pub type ByteSource = BoxStream<'static, Result<Bytes, StoreError>>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("stored file not found: {0}")]
    NotFound(String),

    #[error("chunk {n} of stored file {file_id} is missing")]
    MissingChunk { file_id: String, n: i32 },

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("object storage error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload sink for {0} is already closed")]
    SinkClosed(String),
}

/// Write end of a single upload.
///
/// The identifier is allocated when the sink is opened, so callers can
/// correlate logs with it before any byte is written. Bytes become visible to
/// lookups only after `finish` succeeds.
#[async_trait]
pub trait UploadSink: Send {
    fn id(&self) -> &str;

    /// Appends bytes; full chunks are persisted before this returns.
    async fn write(&mut self, data: &[u8]) -> Result<(), StoreError>;

    /// Flushes the trailing partial chunk and records the file.
    async fn finish(&mut self) -> Result<StoredFile, StoreError>;

    /// Discards whatever was persisted so far.
    async fn abort(&mut self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn open_upload_sink(
        &self,
        filename: &str,
        content_type: &str,
        owner_id: Option<&str>,
    ) -> Result<Box<dyn UploadSink>, StoreError>;

    async fn open_download_source(&self, id: &str) -> Result<ByteSource, StoreError>;

    /// All completed files with this exact filename, first upload first.
    async fn find_by_filename(&self, filename: &str) -> Result<Vec<StoredFile>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<StoredFile>, StoreError>;

    /// Files uploaded by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<StoredFile>, StoreError>;
}

/// Cuts an incoming byte sequence into fixed-size chunks.
pub(crate) struct ChunkBuffer {
    chunk_size: usize,
    buffer: Vec<u8>,
    total: i64,
}

impl ChunkBuffer {
    pub(crate) fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            buffer: Vec::with_capacity(chunk_size),
            total: 0,
        }
    }

    /// Appends `data` and returns every chunk that became full, in order.
    pub(crate) fn push(&mut self, mut data: &[u8]) -> Vec<Bytes> {
        let mut ready = Vec::new();
        self.total += data.len() as i64;

        while !data.is_empty() {
            let take = (self.chunk_size - self.buffer.len()).min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.buffer.len() == self.chunk_size {
                let full = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.chunk_size));
                ready.push(Bytes::from(full));
            }
        }

        ready
    }

    /// Returns the trailing partial chunk, if any.
    pub(crate) fn take_tail(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(Bytes::from(std::mem::take(&mut self.buffer)))
        }
    }

    pub(crate) fn total(&self) -> i64 {
        self.total
    }
}

/// Metadata of an upload that has not been finished yet.
pub(crate) struct PendingFile {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub owner_id: Option<String>,
    pub chunk_size: i32,
}

impl PendingFile {
    pub(crate) fn new(
        filename: &str,
        content_type: &str,
        owner_id: Option<&str>,
        chunk_size: usize,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            owner_id: owner_id.map(str::to_string),
            chunk_size: i32::try_from(chunk_size).unwrap_or(i32::MAX),
        }
    }

    pub(crate) fn complete(&self, length: i64) -> StoredFile {
        StoredFile {
            id: self.id.clone(),
            filename: self.filename.clone(),
            content_type: self.content_type.clone(),
            length,
            chunk_size: self.chunk_size,
            upload_date: Utc::now(),
            owner_id: self.owner_id.clone(),
        }
    }
}

/// Lives inside a download stream and is dropped with it, which is how an
/// early release (client gone, response dropped) shows up in the logs.
pub(crate) struct SourceGuard {
    file_id: String,
    expected: i64,
    emitted: i64,
    completed: bool,
}

impl SourceGuard {
    pub(crate) fn new(file_id: &str, expected: i64) -> Self {
        Self {
            file_id: file_id.to_string(),
            expected,
            emitted: 0,
            completed: false,
        }
    }

    pub(crate) fn advance(&mut self, len: usize) {
        self.emitted += len as i64;
    }

    pub(crate) fn complete(&mut self) {
        self.completed = true;
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        if self.completed {
            tracing::trace!("Download source for {} drained", self.file_id);
        } else {
            tracing::debug!(
                "Download source for {} released after {}/{} bytes",
                self.file_id,
                self.emitted,
                self.expected
            );
        }
    }
}

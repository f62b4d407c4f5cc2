use super::{
    ByteSource, ChunkBuffer, ObjectStore, PendingFile, SourceGuard, StoreError, UploadSink,
    metadata,
};
use crate::entities::{prelude::*, *};
use crate::models::StoredFile;
use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

/// Default segment size, matching what document databases use for their
/// binary stores.
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// Bucket that keeps file bytes inside the database, split into fixed-size
/// rows of `file_chunks`.
#[derive(Clone)]
pub struct ChunkedBucket {
    db: DatabaseConnection,
    chunk_size: usize,
}

impl ChunkedBucket {
    pub fn new(db: DatabaseConnection, chunk_size: usize) -> Self {
        Self {
            db,
            chunk_size: chunk_size.max(1),
        }
    }
}

#[async_trait]
impl ObjectStore for ChunkedBucket {
    async fn open_upload_sink(
        &self,
        filename: &str,
        content_type: &str,
        owner_id: Option<&str>,
    ) -> Result<Box<dyn UploadSink>, StoreError> {
        let file = PendingFile::new(filename, content_type, owner_id, self.chunk_size);
        tracing::debug!("Opened chunked upload {} for {}", file.id, filename);

        Ok(Box::new(ChunkedUploadSink {
            db: self.db.clone(),
            buffer: ChunkBuffer::new(self.chunk_size),
            file,
            next_n: 0,
            closed: false,
        }))
    }

    async fn open_download_source(&self, id: &str) -> Result<ByteSource, StoreError> {
        let file = metadata::find_by_id(&self.db, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        Ok(Box::pin(chunk_stream(self.db.clone(), file)))
    }

    async fn find_by_filename(&self, filename: &str) -> Result<Vec<StoredFile>, StoreError> {
        metadata::find_by_filename(&self.db, filename).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<StoredFile>, StoreError> {
        metadata::find_by_id(&self.db, id).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<StoredFile>, StoreError> {
        metadata::list_by_owner(&self.db, owner_id).await
    }
}

/// Fetches one chunk per poll; nothing is held between polls except the pool
/// handle, so dropping the stream releases it.
fn chunk_stream(
    db: DatabaseConnection,
    file: StoredFile,
) -> impl Stream<Item = Result<Bytes, StoreError>> + Send + 'static {
    try_stream! {
        let mut guard = SourceGuard::new(&file.id, file.length);

        for n in 0..file.chunk_count() {
            let chunk = FileChunks::find_by_id((file.id.clone(), n))
                .one(&db)
                .await?
                .ok_or_else(|| StoreError::MissingChunk {
                    file_id: file.id.clone(),
                    n,
                })?;

            guard.advance(chunk.data.len());
            yield Bytes::from(chunk.data);
        }

        guard.complete();
    }
}

struct ChunkedUploadSink {
    db: DatabaseConnection,
    buffer: ChunkBuffer,
    file: PendingFile,
    next_n: i32,
    closed: bool,
}

impl ChunkedUploadSink {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::SinkClosed(self.file.id.clone()));
        }
        Ok(())
    }

    async fn persist(&mut self, data: Bytes) -> Result<(), StoreError> {
        let chunk = file_chunks::ActiveModel {
            file_id: Set(self.file.id.clone()),
            n: Set(self.next_n),
            data: Set(data.to_vec()),
        };
        FileChunks::insert(chunk).exec(&self.db).await?;
        self.next_n += 1;
        Ok(())
    }
}

#[async_trait]
impl UploadSink for ChunkedUploadSink {
    fn id(&self) -> &str {
        &self.file.id
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        for chunk in self.buffer.push(data) {
            self.persist(chunk).await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<StoredFile, StoreError> {
        self.ensure_open()?;
        if let Some(tail) = self.buffer.take_tail() {
            self.persist(tail).await?;
        }

        let stored = self.file.complete(self.buffer.total());
        metadata::insert(&self.db, &stored).await?;
        self.closed = true;

        tracing::debug!(
            "Chunked upload {} finished: {} bytes in {} chunks",
            stored.id,
            stored.length,
            self.next_n
        );
        Ok(stored)
    }

    async fn abort(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        let res = FileChunks::delete_many()
            .filter(file_chunks::Column::FileId.eq(self.file.id.as_str()))
            .exec(&self.db)
            .await?;
        tracing::debug!(
            "Chunked upload {} aborted, removed {} chunks",
            self.file.id,
            res.rows_affected
        );
        Ok(())
    }
}

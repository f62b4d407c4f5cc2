use super::{
    ByteSource, ChunkBuffer, ObjectStore, PendingFile, SourceGuard, StoreError, UploadSink,
    metadata,
};
use crate::models::StoredFile;
use async_stream::try_stream;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use sea_orm::DatabaseConnection;
use tokio_util::io::ReaderStream;

/// S3 rejects non-final multipart parts below 5 MiB.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Bucket that keeps file bytes in an S3-compatible object store and the
/// metadata in the database. Every multipart part is one chunk.
#[derive(Clone)]
pub struct S3Bucket {
    client: Client,
    bucket: String,
    db: DatabaseConnection,
    part_size: usize,
}

fn s3_error<E: std::error::Error>(err: E) -> StoreError {
    StoreError::Backend(DisplayErrorContext(err).to_string())
}

/// Part size used for a configured chunk size.
fn part_size_for(chunk_size: usize) -> usize {
    chunk_size.max(MIN_PART_SIZE)
}

/// S3 part numbers start at 1.
fn part_number(parts_uploaded: usize) -> i32 {
    parts_uploaded as i32 + 1
}

/// What exists on the S3 side for one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Remote {
    /// Multipart upload created and not yet completed or aborted.
    MultipartOpen,
    /// Multipart upload aborted and nothing written.
    Released,
    /// The object is stored under its key.
    ObjectWritten,
}

/// How `finish` turns the buffered parts into an object.
#[derive(Debug, PartialEq)]
enum Completion {
    /// No part was filled: drop the multipart upload and put the bytes.
    PutObject(Bytes),
    /// Upload the trailing part, if any, then complete the upload.
    Multipart { tail: Option<Bytes> },
}

fn plan_completion(parts_uploaded: usize, tail: Option<Bytes>) -> Completion {
    if parts_uploaded == 0 {
        Completion::PutObject(tail.unwrap_or_default())
    } else {
        Completion::Multipart { tail }
    }
}

/// Requests `abort` has to send.
#[derive(Debug, PartialEq)]
enum Cleanup {
    DeleteObject,
    AbortMultipart,
    Nothing,
}

fn plan_cleanup(remote: Remote) -> Cleanup {
    match remote {
        Remote::ObjectWritten => Cleanup::DeleteObject,
        Remote::MultipartOpen => Cleanup::AbortMultipart,
        Remote::Released => Cleanup::Nothing,
    }
}

impl S3Bucket {
    pub fn new(client: Client, bucket: String, db: DatabaseConnection, chunk_size: usize) -> Self {
        Self {
            client,
            bucket,
            db,
            part_size: part_size_for(chunk_size),
        }
    }

    fn object_key(id: &str) -> String {
        format!("files/{}", id)
    }
}

#[async_trait]
impl ObjectStore for S3Bucket {
    async fn open_upload_sink(
        &self,
        filename: &str,
        content_type: &str,
        owner_id: Option<&str>,
    ) -> Result<Box<dyn UploadSink>, StoreError> {
        let file = PendingFile::new(filename, content_type, owner_id, self.part_size);
        let key = Self::object_key(&file.id);

        let multipart_upload_res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .send()
            .await
            .map_err(s3_error)?;

        let upload_id = multipart_upload_res
            .upload_id()
            .ok_or_else(|| StoreError::Backend("No upload ID".to_string()))?
            .to_string();

        tracing::debug!("Opened S3 multipart upload {} for {}", file.id, filename);

        Ok(Box::new(S3UploadSink {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            db: self.db.clone(),
            key,
            upload_id,
            buffer: ChunkBuffer::new(self.part_size),
            file,
            parts: Vec::new(),
            remote: Remote::MultipartOpen,
            closed: false,
        }))
    }

    async fn open_download_source(&self, id: &str) -> Result<ByteSource, StoreError> {
        let file = metadata::find_by_id(&self.db, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(Self::object_key(id))
            .send()
            .await
            .map_err(s3_error)?;

        Ok(Box::pin(object_stream(file, object.body)))
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

fn object_stream(
    file: StoredFile,
    body: ByteStream,
) -> impl Stream<Item = Result<Bytes, StoreError>> + Send + 'static {
    try_stream! {
        let mut guard = SourceGuard::new(&file.id, file.length);
        let mut reader = Box::pin(ReaderStream::new(body.into_async_read()));

        while let Some(chunk) = reader.try_next().await? {
            guard.advance(chunk.len());
            yield chunk;
        }

        guard.complete();
    }
}

struct S3UploadSink {
    client: Client,
    bucket: String,
    db: DatabaseConnection,
    key: String,
    upload_id: String,
    buffer: ChunkBuffer,
    file: PendingFile,
    parts: Vec<CompletedPart>,
    remote: Remote,
    closed: bool,
}

impl S3UploadSink {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::SinkClosed(self.file.id.clone()));
        }
        Ok(())
    }

    async fn upload_part(&mut self, data: Bytes) -> Result<(), StoreError> {
        let part_number = part_number(self.parts.len());
        let upload_part_res = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .body(ByteStream::from(data))
            .part_number(part_number)
            .send()
            .await
            .map_err(s3_error)?;

        self.parts.push(
            CompletedPart::builder()
                .e_tag(upload_part_res.e_tag().unwrap_or_default())
                .part_number(part_number)
                .build(),
        );
        Ok(())
    }

    async fn abort_multipart(&mut self) -> Result<(), StoreError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .send()
            .await
            .map_err(s3_error)?;
        self.remote = Remote::Released;
        Ok(())
    }

    /// Completes the multipart upload, or replaces it with a plain put when
    /// the file never filled a single part.
    async fn write_object(&mut self) -> Result<(), StoreError> {
        let tail = match plan_completion(self.parts.len(), self.buffer.take_tail()) {
            Completion::PutObject(data) => {
                if self.remote == Remote::MultipartOpen {
                    self.abort_multipart().await?;
                }
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(&self.key)
                    .content_type(&self.file.content_type)
                    .body(ByteStream::from(data))
                    .send()
                    .await
                    .map_err(s3_error)?;
                self.remote = Remote::ObjectWritten;
                return Ok(());
            }
            Completion::Multipart { tail } => tail,
        };

        if let Some(tail) = tail {
            self.upload_part(tail).await?;
        }

        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(self.parts.clone()))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await
            .map_err(s3_error)?;
        self.remote = Remote::ObjectWritten;
        Ok(())
    }
}

#[async_trait]
impl UploadSink for S3UploadSink {
    fn id(&self) -> &str {
        &self.file.id
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        for part in self.buffer.push(data) {
            self.upload_part(part).await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<StoredFile, StoreError> {
        self.ensure_open()?;
        if self.remote != Remote::ObjectWritten {
            self.write_object().await?;
        }

        let stored = self.file.complete(self.buffer.total());
        metadata::insert(&self.db, &stored).await?;
        self.closed = true;

        tracing::debug!(
            "S3 upload {} finished: {} bytes in {} parts",
            stored.id,
            stored.length,
            self.parts.len().max(1)
        );
        Ok(stored)
    }

    async fn abort(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        match plan_cleanup(self.remote) {
            Cleanup::DeleteObject => {
                self.client
                    .delete_object()
                    .bucket(&self.bucket)
                    .key(&self.key)
                    .send()
                    .await
                    .map_err(s3_error)?;
                self.remote = Remote::Released;
            }
            Cleanup::AbortMultipart => self.abort_multipart().await?,
            Cleanup::Nothing => {}
        }
        tracing::debug!("S3 upload {} aborted", self.file.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays the sink's bookkeeping for a sequence of writes: part numbers
    /// handed out while streaming, then how `finish` completes.
    fn plan_upload(part_size: usize, writes: &[&[u8]]) -> (Vec<(i32, usize)>, Completion) {
        let mut buffer = ChunkBuffer::new(part_size);
        let mut parts = Vec::new();
        for data in writes {
            for part in buffer.push(data) {
                parts.push((part_number(parts.len()), part.len()));
            }
        }
        let completion = plan_completion(parts.len(), buffer.take_tail());
        (parts, completion)
    }

    #[test]
    fn test_part_size_is_clamped_to_s3_minimum() {
        assert_eq!(part_size_for(16 * 1024), MIN_PART_SIZE);
        assert_eq!(part_size_for(MIN_PART_SIZE), MIN_PART_SIZE);
        assert_eq!(part_size_for(8 * 1024 * 1024), 8 * 1024 * 1024);
    }

    #[test]
    fn test_object_key() {
        assert_eq!(S3Bucket::object_key("abc-123"), "files/abc-123");
    }

    #[test]
    fn test_parts_are_numbered_from_one() {
        let (parts, completion) = plan_upload(4, &[b"abcde", b"fghij", b"k"]);
        assert_eq!(parts, vec![(1, 4), (2, 4)]);
        assert_eq!(
            completion,
            Completion::Multipart {
                tail: Some(Bytes::from_static(b"ijk"))
            }
        );
    }

    #[test]
    fn test_small_file_falls_back_to_put_object() {
        let (parts, completion) = plan_upload(4, &[b"ab", b"c"]);
        assert!(parts.is_empty());
        assert_eq!(completion, Completion::PutObject(Bytes::from_static(b"abc")));
    }

    #[test]
    fn test_empty_file_puts_an_empty_object() {
        let (parts, completion) = plan_upload(4, &[]);
        assert!(parts.is_empty());
        assert_eq!(completion, Completion::PutObject(Bytes::new()));
    }

    #[test]
    fn test_exact_multiple_completes_without_tail() {
        let (parts, completion) = plan_upload(4, &[b"abcdefgh"]);
        assert_eq!(parts, vec![(1, 4), (2, 4)]);
        assert_eq!(completion, Completion::Multipart { tail: None });
    }

    #[test]
    fn test_cleanup_follows_remote_state() {
        assert_eq!(plan_cleanup(Remote::MultipartOpen), Cleanup::AbortMultipart);
        assert_eq!(plan_cleanup(Remote::ObjectWritten), Cleanup::DeleteObject);
        // The put fallback already aborted the multipart upload; a failed
        // put leaves nothing to clean up
        assert_eq!(plan_cleanup(Remote::Released), Cleanup::Nothing);
    }
}

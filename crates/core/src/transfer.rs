//! Single-object transfers
//!
//! The engine moves bytes between a local file and the backend. Both
//! directions pass the byte stream through a [`CountingReader`] so a
//! [`ByteObserver`] sees throughput without the transfer logic tracking it.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio_util::sync::CancellationToken;

use crate::address::SCHEME;
use crate::error::{Error, Result};
use crate::traits::{PutOptions, StorageBackend};

/// Content type used when the extension is unknown
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Content-type lookup for local files
pub trait ContentTypes: Send + Sync {
    fn content_type_for(&self, path: &Path) -> String;
}

/// Guess content types from the file extension
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeGuessContentTypes;

impl ContentTypes for MimeGuessContentTypes {
    fn content_type_for(&self, path: &Path) -> String {
        mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string()
    }
}

/// Receives byte counts as a stream is consumed
pub trait ByteObserver: Send {
    /// Called for every chunk read
    fn observe(&mut self, bytes: u64);

    /// Called once when the stream reaches its end
    fn finish(&mut self);
}

/// Creates one observer per transfer
pub trait ProgressFactory: Send + Sync {
    fn start(&self, label: &str, total: u64) -> Box<dyn ByteObserver>;
}

/// Progress that goes nowhere
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ByteObserver for NoProgress {
    fn observe(&mut self, _bytes: u64) {}

    fn finish(&mut self) {}
}

impl ProgressFactory for NoProgress {
    fn start(&self, _label: &str, _total: u64) -> Box<dyn ByteObserver> {
        Box::new(NoProgress)
    }
}

/// AsyncRead adapter that reports every chunk to an observer
pub struct CountingReader<R> {
    inner: R,
    observer: Box<dyn ByteObserver>,
    count: u64,
    finished: bool,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R, observer: Box<dyn ByteObserver>) -> Self {
        Self {
            inner,
            observer,
            count: 0,
            finished: false,
        }
    }

    /// Bytes read so far
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = &mut *self;
        let had_room = buf.remaining() > 0;
        let before = buf.filled().len();

        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let read = (buf.filled().len() - before) as u64;
            if read > 0 {
                this.count += read;
                this.observer.observe(read);
            } else if had_room && !this.finished {
                this.finished = true;
                this.observer.finish();
            }
        }
        poll
    }
}

/// One file-to-object or object-to-file mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferUnit {
    Upload {
        source: PathBuf,
        bucket: String,
        key: String,
        public: bool,
    },
    Download {
        bucket: String,
        key: String,
        dest: PathBuf,
        size_hint: Option<u64>,
    },
}

/// Executes single-object uploads and downloads
#[derive(Clone)]
pub struct TransferEngine {
    backend: Arc<dyn StorageBackend>,
    content_types: Arc<dyn ContentTypes>,
    progress: Arc<dyn ProgressFactory>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl TransferEngine {
    /// Create an engine with extension-based content types and no progress output
    pub fn new(backend: Arc<dyn StorageBackend>, cancel: CancellationToken) -> Self {
        Self {
            backend,
            content_types: Arc::new(MimeGuessContentTypes),
            progress: Arc::new(NoProgress),
            cancel,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressFactory>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_content_types(mut self, content_types: Arc<dyn ContentTypes>) -> Self {
        self.content_types = content_types;
        self
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail with `Error::Cancelled` once the cancellation signal has fired
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run one transfer unit, returning the number of bytes moved
    pub async fn execute(&self, unit: TransferUnit) -> Result<u64> {
        match unit {
            TransferUnit::Upload {
                source,
                bucket,
                key,
                public,
            } => self.put_file(&source, &bucket, &key, public).await,
            TransferUnit::Download {
                bucket, key, dest, ..
            } => self.get_file(&bucket, &key, &dest).await,
        }
    }

    /// Upload a local file to `bucket/key`
    pub async fn put_file(&self, source: &Path, bucket: &str, key: &str, public: bool) -> Result<u64> {
        self.check_cancelled()?;

        let file = tokio::fs::File::open(source)
            .await
            .map_err(|e| Error::local_io("open", source, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| Error::local_io("stat", source, e))?
            .len();

        let options = PutOptions {
            content_type: self.content_types.content_type_for(source),
            public,
        };

        tracing::debug!(
            source = %source.display(),
            bucket,
            key,
            size,
            content_type = %options.content_type,
            public,
            "uploading"
        );

        let label = format!("{} -> {SCHEME}{bucket}/{key}", source.display());
        let observer = self.progress.start(&label, size);
        let body = Box::pin(CountingReader::new(file, observer));

        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = self.backend.put_object(bucket, key, body, size, &options) => result,
        }?;

        Ok(size)
    }

    /// Download `bucket/key` into `dest`, creating parent directories
    pub async fn get_file(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64> {
        self.check_cancelled()?;

        let stream = tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            stream = self.backend.get_object(bucket, key) => stream,
        }?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::local_io("create_dir", parent, e))?;
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::local_io("create", dest, e))?;

        tracing::debug!(bucket, key, dest = %dest.display(), size = stream.size, "downloading");

        let label = format!("{SCHEME}{bucket}/{key} -> {}", dest.display());
        let observer = self.progress.start(&label, stream.size);
        let mut reader = CountingReader::new(stream.reader, observer);

        let copied = tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            copied = copy_body(&mut reader, &mut file, bucket, key, dest) => copied,
        };

        match copied {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                drop(file);
                if let Err(cleanup) = tokio::fs::remove_file(dest).await {
                    tracing::debug!(dest = %dest.display(), "could not remove partial download: {cleanup}");
                }
                Err(e)
            }
        }
    }

    /// Produce a presigned GET URL for an existing object
    ///
    /// Backends that can presign but cannot stat (signature v2 profiles)
    /// skip the existence check.
    pub async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        self.check_cancelled()?;
        if ttl.is_zero() {
            return Err(Error::InvalidArgument(
                "URL expiry must be greater than zero".into(),
            ));
        }

        match self.backend.stat_object(bucket, key).await {
            Ok(_) => {}
            Err(Error::UnsupportedFeature(reason)) => {
                tracing::debug!(bucket, key, "presigning without existence check: {reason}");
            }
            Err(e) => return Err(e),
        }
        self.backend.presign_get(bucket, key, ttl).await
    }
}

async fn copy_body<R>(
    reader: &mut R,
    file: &mut tokio::fs::File,
    bucket: &str,
    key: &str,
    dest: &Path,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| Error::backend("get_object", format!("{bucket}/{key}"), e))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .await
            .map_err(|e| Error::local_io("write", dest, e))?;
        total += n as u64;
    }
    file.flush()
        .await
        .map_err(|e| Error::local_io("write", dest, e))?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockStorageBackend, ObjectMeta, ObjectStream};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default, Clone)]
    struct Recorded(Arc<Mutex<Vec<String>>>);

    struct RecordingObserver {
        events: Recorded,
    }

    impl ByteObserver for RecordingObserver {
        fn observe(&mut self, bytes: u64) {
            self.events.0.lock().unwrap().push(format!("+{bytes}"));
        }

        fn finish(&mut self) {
            self.events.0.lock().unwrap().push("done".into());
        }
    }

    impl ProgressFactory for Recorded {
        fn start(&self, label: &str, total: u64) -> Box<dyn ByteObserver> {
            self.0.lock().unwrap().push(format!("start {label} {total}"));
            Box::new(RecordingObserver {
                events: self.clone(),
            })
        }
    }

    fn reader_of(bytes: &'static [u8]) -> ObjectStream {
        ObjectStream {
            reader: Box::pin(bytes),
            size: bytes.len() as u64,
        }
    }

    #[test]
    fn test_content_type_inference() {
        let types = MimeGuessContentTypes;
        assert_eq!(types.content_type_for(Path::new("a/page.html")), "text/html");
        assert_eq!(types.content_type_for(Path::new("photo.png")), "image/png");
        assert_eq!(
            types.content_type_for(Path::new("blob.zz-unknown")),
            DEFAULT_CONTENT_TYPE
        );
        assert_eq!(types.content_type_for(Path::new("noext")), DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_counting_reader_observes_chunks() {
        let events = Recorded::default();
        let observer = events.start("x", 5);
        let mut reader = CountingReader::new(&b"hello"[..], observer);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, b"hello");
        assert_eq!(reader.count(), 5);
        let events = events.0.lock().unwrap().clone();
        assert_eq!(events, vec!["start x 5", "+5", "done"]);
    }

    #[tokio::test]
    async fn test_put_file_uploads_with_content_type() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("index.html");
        std::fs::write(&source, "<html></html>").unwrap();

        let mut mock = MockStorageBackend::new();
        mock.expect_put_object()
            .withf(|bucket, key, _, size, opts| {
                bucket == "site"
                    && key == "www/index.html"
                    && *size == 13
                    && opts.content_type == "text/html"
                    && opts.public
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));

        let engine = TransferEngine::new(Arc::new(mock), CancellationToken::new());
        let sent = engine
            .put_file(&source, "site", "www/index.html", true)
            .await
            .unwrap();
        assert_eq!(sent, 13);
    }

    #[tokio::test]
    async fn test_put_file_missing_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("missing.txt");
        let mock = MockStorageBackend::new();

        let engine = TransferEngine::new(Arc::new(mock), CancellationToken::new());
        match engine.put_file(&source, "b", "k", false).await {
            Err(Error::LocalIo { op, path, .. }) => {
                assert_eq!(op, "open");
                assert_eq!(path, source);
            }
            other => panic!("expected LocalIo, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_file_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested/deeper/out.txt");

        let mut mock = MockStorageBackend::new();
        mock.expect_get_object()
            .withf(|bucket, key| bucket == "b" && key == "docs/out.txt")
            .times(1)
            .returning(|_, _| Ok(reader_of(b"payload")));

        let progress = Recorded::default();
        let engine = TransferEngine::new(Arc::new(mock), CancellationToken::new())
            .with_progress(Arc::new(progress.clone()));
        let received = engine.get_file("b", "docs/out.txt", &dest).await.unwrap();

        assert_eq!(received, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        let events = progress.0.lock().unwrap().clone();
        assert!(events[0].starts_with("start s3://b/docs/out.txt"));
        assert_eq!(events.last().map(String::as_str), Some("done"));
    }

    #[tokio::test]
    async fn test_get_file_missing_object() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.txt");

        let mut mock = MockStorageBackend::new();
        mock.expect_get_object()
            .returning(|_, key| Err(Error::not_found("get_object", format!("b/{key}"))));

        let engine = TransferEngine::new(Arc::new(mock), CancellationToken::new());
        let err = engine.get_file("b", "nope", &dest).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_transfer() {
        let mock = MockStorageBackend::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let engine = TransferEngine::new(Arc::new(mock), cancel);
        let err = engine
            .get_file("b", "k", Path::new("unused"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_execute_dispatches() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("x.bin");

        let mut mock = MockStorageBackend::new();
        mock.expect_get_object()
            .times(1)
            .returning(|_, _| Ok(reader_of(b"xyz")));

        let engine = TransferEngine::new(Arc::new(mock), CancellationToken::new());
        let unit = TransferUnit::Download {
            bucket: "b".into(),
            key: "x.bin".into(),
            dest: dest.clone(),
            size_hint: Some(3),
        };
        assert_eq!(engine.execute(unit).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_presign_requires_existing_object() {
        let mut mock = MockStorageBackend::new();
        mock.expect_stat_object()
            .returning(|_, key| Err(Error::not_found("stat_object", key)));
        mock.expect_presign_get().never();

        let engine = TransferEngine::new(Arc::new(mock), CancellationToken::new());
        let err = engine
            .presign_get("b", "gone.txt", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_presign_delegates_after_stat() {
        let mut mock = MockStorageBackend::new();
        mock.expect_stat_object().returning(|_, key| {
            Ok(ObjectMeta {
                key: key.to_string(),
                size: 1,
                last_modified: None,
                etag: None,
                content_type: None,
            })
        });
        mock.expect_presign_get()
            .withf(|_, _, ttl| *ttl == Duration::from_secs(3600))
            .returning(|bucket, key, _| Ok(format!("https://s3.local/{bucket}/{key}?sig=1")));

        let engine = TransferEngine::new(Arc::new(mock), CancellationToken::new());
        let url = engine
            .presign_get("b", "a.txt", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(url, "https://s3.local/b/a.txt?sig=1");
    }

    #[tokio::test]
    async fn test_presign_without_stat_support() {
        let mut mock = MockStorageBackend::new();
        mock.expect_stat_object().returning(|_, _| {
            Err(Error::UnsupportedFeature("stat_object with signature v2".into()))
        });
        mock.expect_presign_get()
            .times(1)
            .returning(|bucket, key, _| Ok(format!("https://s3.local/{bucket}/{key}?Signature=x")));

        let engine = TransferEngine::new(Arc::new(mock), CancellationToken::new());
        let url = engine
            .presign_get("b", "a.txt", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(url, "https://s3.local/b/a.txt?Signature=x");
    }

    #[tokio::test]
    async fn test_presign_rejects_zero_ttl() {
        let engine = TransferEngine::new(
            Arc::new(MockStorageBackend::new()),
            CancellationToken::new(),
        );
        let err = engine
            .presign_get("b", "a.txt", Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}

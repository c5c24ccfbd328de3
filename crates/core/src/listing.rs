//! Lazy, paginated listing of a remote prefix
//!
//! A background task walks the backend's pages and publishes entries into a
//! single-slot channel, so at most one entry is fetched ahead of the consumer.
//! An `Err` item is always the last item a [`Listing`] yields.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::traits::{DEFAULT_PAGE_SIZE, ListOptions, ListingEntry, StorageBackend};

/// Parameters of a listing
#[derive(Debug, Clone)]
pub struct ListRequest {
    /// Bucket to list
    pub bucket: String,

    /// Key prefix
    pub prefix: String,

    /// Return every key below the prefix instead of immediate children
    pub recursive: bool,

    /// Only yield entries whose key ends with '/'
    pub folders_only: bool,

    /// Keys requested per backend call
    pub page_limit: i32,
}

impl ListRequest {
    /// Create a single-level listing request with the default page size
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            recursive: false,
            folders_only: false,
            page_limit: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn folders_only(mut self, folders_only: bool) -> Self {
        self.folders_only = folders_only;
        self
    }

    pub fn page_limit(mut self, page_limit: i32) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }
}

/// A lazy sequence of listing entries
///
/// Not resumable: list again to restart. Dropping the listing stops the
/// background task before its next backend call.
pub struct Listing {
    rx: mpsc::Receiver<Result<ListingEntry>>,
    worker: JoinHandle<()>,
    cancel: CancellationToken,
    done: bool,
}

impl std::fmt::Debug for Listing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listing")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Start listing `request` against `backend`
///
/// Must be called from within a tokio runtime.
pub fn list(
    backend: Arc<dyn StorageBackend>,
    request: ListRequest,
    cancel: CancellationToken,
) -> Listing {
    let (tx, rx) = mpsc::channel(1);
    let worker = tokio::spawn(paginate(backend, request, cancel.clone(), tx));
    Listing {
        rx,
        worker,
        cancel,
        done: false,
    }
}

async fn paginate(
    backend: Arc<dyn StorageBackend>,
    request: ListRequest,
    cancel: CancellationToken,
    tx: mpsc::Sender<Result<ListingEntry>>,
) {
    let mut options = ListOptions {
        prefix: request.prefix.clone(),
        recursive: request.recursive,
        max_keys: request.page_limit,
        continuation_token: None,
    };

    loop {
        let page = tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            page = backend.list_objects(&request.bucket, &options) => page,
        };

        let page = match page {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!(bucket = %request.bucket, prefix = %request.prefix, "listing failed: {e}");
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        tracing::debug!(
            bucket = %request.bucket,
            prefix = %request.prefix,
            entries = page.entries.len(),
            more = page.next_token.is_some(),
            "fetched listing page"
        );

        for entry in page.entries {
            if request.folders_only && !entry.is_prefix_marker {
                continue;
            }
            if tx.send(Ok(entry)).await.is_err() {
                return;
            }
        }

        match page.next_token {
            Some(token) => options.continuation_token = Some(token),
            None => return,
        }
    }
}

impl Listing {
    /// Receive the next entry, or None once the listing is exhausted
    ///
    /// Returns `Err(Error::Cancelled)` once if the cancellation token fires
    /// while waiting.
    pub async fn next_entry(&mut self) -> Option<Result<ListingEntry>> {
        if self.done {
            return None;
        }

        let item = tokio::select! {
            biased;
            item = self.rx.recv() => item,
            _ = self.cancel.cancelled() => Some(Err(Error::Cancelled)),
        };

        match item {
            Some(Ok(entry)) => Some(Ok(entry)),
            Some(Err(e)) => {
                self.finish();
                Some(Err(e))
            }
            None => {
                self.done = true;
                None
            }
        }
    }

    /// Drain the listing into a vector, stopping at the first error
    pub async fn collect_entries(mut self) -> Result<Vec<ListingEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry().await {
            entries.push(entry?);
        }
        Ok(entries)
    }

    fn finish(&mut self) {
        self.done = true;
        self.rx.close();
        self.worker.abort();
    }
}

impl Stream for Listing {
    type Item = Result<ListingEntry>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(entry))) => Poll::Ready(Some(Ok(entry))),
            Poll::Ready(Some(Err(e))) => {
                self.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending if self.cancel.is_cancelled() => {
                self.finish();
                Poll::Ready(Some(Err(Error::Cancelled)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Listing {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Whether at least one entry exists under `prefix`
///
/// Fetches a single-key page and inspects only the first item.
pub async fn has_any_entry(
    backend: Arc<dyn StorageBackend>,
    bucket: &str,
    prefix: &str,
    cancel: CancellationToken,
) -> Result<bool> {
    let request = ListRequest::new(bucket, prefix).page_limit(1);
    let mut listing = list(backend, request, cancel);
    match listing.next_entry().await {
        Some(Ok(_)) => Ok(true),
        Some(Err(e)) => Err(e),
        None => Ok(false),
    }
}

//! Directory-level operations
//!
//! Composes the tree walker and the listing with the transfer engine. Every
//! batch runs strictly sequentially and stops at the first failure.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::listing::{self, ListRequest};
use crate::traits::StorageBackend;
use crate::transfer::{TransferEngine, TransferUnit};
use crate::walker::{self, object_key};

/// Totals of a completed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub files: u64,
    pub bytes: u64,
}

impl BulkSummary {
    fn add(&mut self, bytes: u64) {
        self.files += 1;
        self.bytes += bytes;
    }
}

/// Outcome of a bucket removal request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveBucketOutcome {
    Removed,
    /// The bucket still holds objects and was left in place
    NotEmpty,
}

/// Outcome of a bucket creation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MakeBucketOutcome {
    Created,
    AlreadyExists,
}

/// Directory upload, download and delete on top of [`TransferEngine`]
#[derive(Debug, Clone)]
pub struct BulkOps {
    engine: TransferEngine,
    page_size: i32,
}

impl BulkOps {
    pub fn new(engine: TransferEngine) -> Self {
        Self {
            engine,
            page_size: crate::traits::DEFAULT_PAGE_SIZE,
        }
    }

    /// Keys requested per listing page
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    fn backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(self.engine.backend())
    }

    fn recursive_listing(&self, bucket: &str, prefix: &str) -> listing::Listing {
        let request = ListRequest::new(bucket, prefix)
            .recursive(true)
            .page_limit(self.page_size);
        listing::list(self.backend(), request, self.engine.cancel_token().clone())
    }

    /// Upload every file below `local_dir` to `bucket` under `dest_prefix`
    pub async fn upload_directory(
        &self,
        bucket: &str,
        local_dir: &Path,
        dest_prefix: &str,
        public: bool,
    ) -> Result<BulkSummary> {
        let mut summary = BulkSummary::default();

        for entry in walker::walk(local_dir)? {
            self.engine.check_cancelled()?;
            let entry = entry?;
            let key = object_key(dest_prefix, &entry.relative_key);
            let unit = TransferUnit::Upload {
                source: entry.path,
                bucket: bucket.to_string(),
                key: key.clone(),
                public,
            };
            let bytes = self
                .engine
                .execute(unit)
                .await
                .map_err(|e| stop_batch("upload_directory", bucket, &key, e))?;
            summary.add(bytes);
        }

        tracing::info!(
            bucket,
            prefix = dest_prefix,
            files = summary.files,
            bytes = summary.bytes,
            "directory upload complete"
        );
        Ok(summary)
    }

    /// Download every object below `prefix` into `dest_dir`
    ///
    /// Keys are placed relative to `prefix`; prefix markers are skipped.
    pub async fn download_directory(
        &self,
        bucket: &str,
        prefix: &str,
        dest_dir: &Path,
    ) -> Result<BulkSummary> {
        let mut summary = BulkSummary::default();
        let mut entries = self.recursive_listing(bucket, prefix);

        while let Some(entry) = entries.next_entry().await {
            self.engine.check_cancelled()?;
            let entry = entry?;
            if entry.is_prefix_marker {
                continue;
            }

            let relative = entry.key.strip_prefix(prefix).unwrap_or(&entry.key);
            let dest = local_destination(dest_dir, relative)?;
            let unit = TransferUnit::Download {
                bucket: bucket.to_string(),
                size_hint: u64::try_from(entry.size).ok(),
                key: entry.key.clone(),
                dest,
            };
            let bytes = self
                .engine
                .execute(unit)
                .await
                .map_err(|e| stop_batch("download_directory", bucket, &entry.key, e))?;
            summary.add(bytes);
        }

        tracing::info!(
            bucket,
            prefix,
            files = summary.files,
            bytes = summary.bytes,
            "directory download complete"
        );
        Ok(summary)
    }

    /// Delete every object below `prefix`
    pub async fn delete_directory(&self, bucket: &str, prefix: &str) -> Result<BulkSummary> {
        let mut summary = BulkSummary::default();
        let backend = self.backend();
        let mut entries = self.recursive_listing(bucket, prefix);

        while let Some(entry) = entries.next_entry().await {
            self.engine.check_cancelled()?;
            let entry = entry?;
            tracing::debug!(bucket, key = %entry.key, "deleting");
            backend
                .remove_object(bucket, &entry.key)
                .await
                .map_err(|e| stop_batch("delete_directory", bucket, &entry.key, e))?;
            summary.add(u64::try_from(entry.size).unwrap_or(0));
        }

        tracing::info!(bucket, prefix, objects = summary.files, "directory delete complete");
        Ok(summary)
    }

    /// Remove `bucket` if it holds no objects
    pub async fn remove_bucket(&self, bucket: &str) -> Result<RemoveBucketOutcome> {
        self.engine.check_cancelled()?;

        let cancel = self.engine.cancel_token().clone();
        if listing::has_any_entry(self.backend(), bucket, "", cancel).await? {
            tracing::warn!(bucket, "bucket is not empty, leaving it in place");
            return Ok(RemoveBucketOutcome::NotEmpty);
        }

        self.backend().remove_bucket(bucket).await?;
        Ok(RemoveBucketOutcome::Removed)
    }

    /// Create `bucket`, treating an existing bucket as a no-op
    pub async fn make_bucket(&self, bucket: &str) -> Result<MakeBucketOutcome> {
        self.engine.check_cancelled()?;

        let backend = self.backend();
        match backend.make_bucket(bucket).await {
            Ok(()) => Ok(MakeBucketOutcome::Created),
            Err(Error::Conflict(_)) => {
                tracing::warn!(bucket, "bucket already exists");
                Ok(MakeBucketOutcome::AlreadyExists)
            }
            Err(e) => match backend.bucket_exists(bucket).await {
                Ok(true) => {
                    tracing::warn!(bucket, "bucket already exists");
                    Ok(MakeBucketOutcome::AlreadyExists)
                }
                _ => Err(e),
            },
        }
    }
}

/// Record which batch stopped at `item`; the error itself is returned as is
fn stop_batch(batch: &'static str, bucket: &str, item: &str, err: Error) -> Error {
    tracing::warn!(batch, bucket, item, "stopping at first failure: {err}");
    err
}

/// Local path for a key relative to the download root
///
/// Refuses relative keys that would leave `dest_dir`.
fn local_destination(dest_dir: &Path, relative: &str) -> Result<PathBuf> {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        return Err(Error::InvalidArgument(
            "object key has no name below the download prefix".into(),
        ));
    }

    let mut dest = dest_dir.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => dest.push(part),
            (Some(Component::CurDir), None) => {}
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "refusing to download '{relative}' outside of {}",
                    dest_dir.display()
                )));
            }
        }
    }
    Ok(dest)
}

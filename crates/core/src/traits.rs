//! StorageBackend trait definition
//!
//! This trait defines the interface for S3-compatible storage operations.
//! It allows the core engine to be decoupled from the specific S3 SDK implementation.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::error::Result;

/// Default number of keys requested per listing page
pub const DEFAULT_PAGE_SIZE: i32 = 1000;

/// Byte stream handed to or returned by the backend
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// A single entry produced by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    /// Object key, or a common prefix ending with '/'
    pub key: String,

    /// Size in bytes (0 for prefix markers)
    pub size: i64,

    /// Last modified timestamp (absent for prefix markers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// Whether the key ends with '/'
    pub is_prefix_marker: bool,
}

impl ListingEntry {
    /// Create an entry for an object
    pub fn object(key: impl Into<String>, size: i64, last_modified: Option<Timestamp>) -> Self {
        let key = key.into();
        let is_prefix_marker = key.ends_with('/');
        Self {
            key,
            size,
            last_modified,
            is_prefix_marker,
        }
    }

    /// Create an entry for a common prefix grouped by the backend
    pub fn prefix(key: impl Into<String>) -> Self {
        let key = key.into();
        let is_prefix_marker = key.ends_with('/');
        Self {
            key,
            size: 0,
            last_modified: None,
            is_prefix_marker,
        }
    }
}

/// Bucket metadata
#[derive(Debug, Clone, Serialize)]
pub struct BucketInfo {
    /// Bucket name
    pub name: String,

    /// Creation timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<Timestamp>,
}

/// Object metadata returned by stat
#[derive(Debug, Clone, Serialize)]
pub struct ObjectMeta {
    /// Object key
    pub key: String,

    /// Size in bytes
    pub size: i64,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// ETag without surrounding quotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Entries in backend order
    pub entries: Vec<ListingEntry>,

    /// Token for the next page; None when the listing is exhausted
    pub next_token: Option<String>,
}

/// Options for a single list request
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Key prefix to filter by
    pub prefix: String,

    /// List every key below the prefix instead of grouping by '/'
    pub recursive: bool,

    /// Maximum number of keys to return per request
    pub max_keys: i32,

    /// Continuation token from the previous page
    pub continuation_token: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            recursive: false,
            max_keys: DEFAULT_PAGE_SIZE,
            continuation_token: None,
        }
    }
}

/// Options for an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    /// Content type recorded on the object
    pub content_type: String,

    /// Attach a public-read ACL
    pub public: bool,
}

/// A downloadable object body
pub struct ObjectStream {
    /// Object bytes
    pub reader: ObjectReader,

    /// Content length reported by the backend
    pub size: u64,
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Trait for S3-compatible storage operations
///
/// This trait is implemented by the S3 adapter and can be mocked for testing.
/// Implementations decorate their errors with the operation and bucket/key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// List buckets
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>>;

    /// Fetch one page of objects in a bucket
    async fn list_objects(&self, bucket: &str, options: &ListOptions) -> Result<ListPage>;

    /// Upload an object from a byte stream of known size
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectReader,
        size: u64,
        options: &PutOptions,
    ) -> Result<()>;

    /// Open an object for reading
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectStream>;

    /// Get object metadata, or `Error::NotFound`
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta>;

    /// Delete an object
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Create a bucket
    async fn make_bucket(&self, bucket: &str) -> Result<()>;

    /// Check if a bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Delete an empty bucket
    async fn remove_bucket(&self, bucket: &str) -> Result<()>;

    /// Produce a time-limited GET URL for an object
    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String>;
}

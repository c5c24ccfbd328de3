//! s3ctl-core: Core library for the s3ctl S3 CLI client
//!
//! This crate provides the core functionality for s3ctl, including:
//! - Address parsing (`s3://bucket/key`) and prefix classification
//! - Lazy, paginated listings and local tree walks
//! - Single-object transfers with progress accounting
//! - Directory-level upload, download and delete
//! - Configuration and profile management
//!
//! This crate is independent of any specific S3 SDK: the backend is reached
//! only through the [`StorageBackend`] trait.

pub mod address;
pub mod bulk;
pub mod config;
pub mod error;
pub mod listing;
pub mod profile;
pub mod progress;
pub mod traits;
pub mod transfer;
pub mod walker;

pub use address::{Address, resolve, resolve_bucket};
pub use bulk::{BulkOps, BulkSummary, MakeBucketOutcome, RemoveBucketOutcome};
pub use config::{Config, ConfigManager};
pub use error::{Error, Result};
pub use listing::{ListRequest, Listing, has_any_entry, list};
pub use profile::{Profile, ProfileManager, SignatureVersion, mask_secret};
pub use progress::{ProgressReporter, ProgressSink, ReporterFactory, TerminalWidth};
pub use traits::{
    BucketInfo, ListOptions, ListPage, ListingEntry, ObjectMeta, ObjectReader, ObjectStream,
    PutOptions, StorageBackend,
};
pub use transfer::{ByteObserver, ProgressFactory, TransferEngine, TransferUnit};
pub use walker::{TreeWalk, WalkEntry, walk};

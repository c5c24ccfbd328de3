//! s3ctl-s3: S3 SDK adapter for the s3ctl client
//!
//! This crate provides the implementation of the StorageBackend trait
//! using the aws-sdk-s3 crate. It is the only crate that directly
//! depends on the AWS SDK.

mod body;
pub mod client;
pub mod multipart;
pub mod presign_v2;

pub use client::S3Backend;
pub use presign_v2::V2Presigner;

//! Multipart upload support
//!
//! Bodies larger than the configured threshold are sent as a sequence of
//! parts. The upload is all-or-nothing: a failed part aborts the whole upload.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use tokio::io::AsyncReadExt;

use s3ctl_core::{Error, ObjectReader, PutOptions, Result};

use crate::client::classify;

/// Default part size: 64 MiB
pub const DEFAULT_PART_SIZE: u64 = 64 * 1024 * 1024;

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: usize = 10_000;

/// Multipart upload configuration
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Part size in bytes
    pub part_size: u64,

    /// Bodies larger than this are uploaded in parts
    pub threshold: u64,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            threshold: DEFAULT_PART_SIZE,
        }
    }
}

impl MultipartConfig {
    /// Whether a body of `size` bytes goes through the multipart path
    pub fn should_split(&self, size: u64) -> bool {
        size > self.threshold
    }

    /// Calculate appropriate part size for a file
    pub fn calculate_part_size(&self, file_size: u64) -> u64 {
        if file_size <= MIN_PART_SIZE {
            return MIN_PART_SIZE;
        }

        let parts = file_size.div_ceil(self.part_size);

        if parts <= MAX_PARTS as u64 {
            self.part_size
        } else {
            // Need larger parts to fit within 10,000 limit
            let required_size = file_size.div_ceil(MAX_PARTS as u64);
            required_size.clamp(MIN_PART_SIZE, MAX_PART_SIZE)
        }
    }
}

/// Calculate number of parts for a file
pub fn calculate_parts(file_size: u64, part_size: u64) -> usize {
    file_size.div_ceil(part_size) as usize
}

/// Upload `body` to `bucket/key` in parts
pub(crate) async fn upload(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    mut body: ObjectReader,
    size: u64,
    options: &PutOptions,
    config: &MultipartConfig,
) -> Result<()> {
    let target = format!("{bucket}/{key}");
    let part_size = config.calculate_part_size(size);

    let mut request = client
        .create_multipart_upload()
        .bucket(bucket)
        .key(key)
        .content_type(&options.content_type);
    if options.public {
        request = request.acl(ObjectCannedAcl::PublicRead);
    }
    let created = request
        .send()
        .await
        .map_err(|e| classify("create_multipart_upload", &target, e))?;
    let upload_id = created
        .upload_id()
        .ok_or_else(|| Error::backend("create_multipart_upload", &target, "no upload id returned"))?
        .to_string();

    tracing::debug!(
        bucket,
        key,
        size,
        part_size,
        parts = calculate_parts(size, part_size),
        "starting multipart upload"
    );

    match upload_parts(client, bucket, key, &upload_id, &mut body, part_size, &target).await {
        Ok(parts) => {
            client
                .complete_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(parts))
                        .build(),
                )
                .send()
                .await
                .map_err(|e| classify("complete_multipart_upload", &target, e))?;
            Ok(())
        }
        Err(e) => {
            if let Err(abort) = client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                tracing::warn!(bucket, key, "failed to abort multipart upload: {abort}");
            }
            Err(e)
        }
    }
}

async fn upload_parts(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    body: &mut ObjectReader,
    part_size: u64,
    target: &str,
) -> Result<Vec<CompletedPart>> {
    let mut parts = Vec::new();
    let mut part_number = 1;

    loop {
        let chunk = read_part(body, part_size)
            .await
            .map_err(|e| Error::backend("upload_part", target, e))?;
        if chunk.is_empty() && part_number > 1 {
            break;
        }
        let last = (chunk.len() as u64) < part_size;

        let uploaded = client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(chunk))
            .send()
            .await
            .map_err(|e| classify("upload_part", target, e))?;

        parts.push(
            CompletedPart::builder()
                .part_number(part_number)
                .set_e_tag(uploaded.e_tag().map(str::to_string))
                .build(),
        );

        if last {
            break;
        }
        part_number += 1;
    }

    Ok(parts)
}

/// Read up to `limit` bytes; a short read means the body is exhausted
async fn read_part(body: &mut ObjectReader, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(limit as usize);
    (&mut *body).take(limit).read_to_end(&mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MultipartConfig::default();
        assert_eq!(config.part_size, DEFAULT_PART_SIZE);
        assert!(!config.should_split(DEFAULT_PART_SIZE));
        assert!(config.should_split(DEFAULT_PART_SIZE + 1));
    }

    #[test]
    fn test_calculate_part_size_small_file() {
        let config = MultipartConfig::default();
        assert_eq!(config.calculate_part_size(1024 * 1024), MIN_PART_SIZE);
    }

    #[test]
    fn test_calculate_part_size_large_file() {
        let config = MultipartConfig::default();
        let huge_file = DEFAULT_PART_SIZE * 20_000;
        let size = config.calculate_part_size(huge_file);
        assert!(calculate_parts(huge_file, size) <= MAX_PARTS);
    }

    #[test]
    fn test_calculate_parts() {
        assert_eq!(calculate_parts(100, 10), 10);
        assert_eq!(calculate_parts(101, 10), 11);
        assert_eq!(calculate_parts(99, 10), 10);
    }

    #[tokio::test]
    async fn test_read_part_splits_body() {
        let data: Vec<u8> = (0..25u8).collect();
        let mut body: ObjectReader = Box::pin(std::io::Cursor::new(data));

        assert_eq!(read_part(&mut body, 10).await.unwrap().len(), 10);
        assert_eq!(read_part(&mut body, 10).await.unwrap().len(), 10);
        let tail = read_part(&mut body, 10).await.unwrap();
        assert_eq!(tail, vec![20, 21, 22, 23, 24]);
        assert!(read_part(&mut body, 10).await.unwrap().is_empty());
    }
}

//! S3 backend implementation
//!
//! Wraps aws-sdk-s3 and implements the StorageBackend trait from s3ctl-core.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl};

use s3ctl_core::{
    BucketInfo, Error, ListOptions, ListPage, ListingEntry, ObjectMeta, ObjectReader,
    ObjectStream, Profile, PutOptions, Result, SignatureVersion, StorageBackend,
};

use crate::body::ChannelBody;
use crate::multipart::{self, MultipartConfig};
use crate::presign_v2::V2Presigner;

/// Region that must not be sent as a location constraint
const DEFAULT_REGION: &str = "us-east-1";

/// S3 storage backend
///
/// Requests are signed with signature v4. A profile asking for v2 can only
/// produce presigned URLs; every other operation reports it as unsupported.
pub struct S3Backend {
    inner: aws_sdk_s3::Client,
    region: String,
    multipart: MultipartConfig,
    signature: SignatureVersion,
    presign_signature: SignatureVersion,
    v2: V2Presigner,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("region", &self.region)
            .field("multipart", &self.multipart)
            .field("signature", &self.signature)
            .field("presign_signature", &self.presign_signature)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new backend from a profile
    pub async fn new(profile: &Profile) -> Result<Self> {
        let endpoint_url = profile.endpoint_url()?;
        let endpoint = endpoint_url.as_str().trim_end_matches('/').to_string();

        let credentials = aws_credential_types::Credentials::new(
            profile.access_key_id.clone(),
            profile.secret_access_key.clone(),
            None, // session token
            None, // expiry
            "s3ctl-static-credentials",
        );

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(profile.region.clone()))
            .endpoint_url(&endpoint)
            .load()
            .await;

        // Path-style addressing works with every S3-compatible server
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();

        tracing::debug!(
            profile = %profile.name,
            endpoint,
            region = %profile.region,
            signature = %profile.signature,
            "connecting"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            region: profile.region.clone(),
            multipart: MultipartConfig::default(),
            signature: profile.signature,
            presign_signature: profile.signature,
            v2: V2Presigner::new(
                endpoint_url,
                profile.access_key_id.clone(),
                profile.secret_access_key.clone(),
            ),
        })
    }

    /// Sign presigned URLs with `signature` regardless of the profile
    pub fn with_presign_signature(mut self, signature: SignatureVersion) -> Self {
        self.presign_signature = signature;
        self
    }

    fn require_v4(&self, op: &str) -> Result<()> {
        match self.signature {
            SignatureVersion::V4 => Ok(()),
            SignatureVersion::V2 => Err(Error::UnsupportedFeature(format!(
                "{op} with signature v2; only presigned URLs can be signed with v2"
            ))),
        }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Convert an SDK error into a core error named after the failing operation
pub(crate) fn classify<E, R>(op: &'static str, target: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    let message = DisplayErrorContext(&err).to_string();
    classify_code(op, target, code.as_deref(), message)
}

fn classify_code(op: &'static str, target: &str, code: Option<&str>, message: String) -> Error {
    match code {
        Some("NoSuchKey" | "NoSuchBucket" | "NotFound" | "NoSuchUpload") => {
            Error::not_found(op, target)
        }
        Some(
            code @ ("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
            | "ExpiredToken" | "InvalidToken" | "Forbidden"),
        ) => Error::Auth(format!("{op} {target}: {code}")),
        Some(
            code @ ("BucketAlreadyOwnedByYou" | "BucketAlreadyExists" | "BucketNotEmpty"),
        ) => Error::Conflict(format!("{op} {target}: {code}")),
        // HEAD responses carry no body, so a missing object may only show up in the message
        None if message.contains("NotFound") || message.contains("404") => {
            Error::not_found(op, target)
        }
        _ => Error::backend(op, target, message),
    }
}

fn timestamp(dt: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::new(dt.secs(), dt.subsec_nanos() as i32).ok()
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        self.require_v4("list_buckets")?;

        let response = self
            .inner
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify("list_buckets", "", e))?;

        let buckets = response
            .buckets()
            .iter()
            .map(|b| BucketInfo {
                name: b.name().unwrap_or_default().to_string(),
                created: b.creation_date().and_then(timestamp),
            })
            .collect();

        Ok(buckets)
    }

    async fn list_objects(&self, bucket: &str, options: &ListOptions) -> Result<ListPage> {
        self.require_v4("list_objects")?;

        let mut request = self
            .inner
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(options.max_keys);

        if !options.prefix.is_empty() {
            request = request.prefix(&options.prefix);
        }

        // Group deeper keys into common prefixes for single-level listings
        if !options.recursive {
            request = request.delimiter("/");
        }

        if let Some(token) = &options.continuation_token {
            request = request.continuation_token(token);
        }

        let target = format!("{bucket}/{}", options.prefix);
        let response = request
            .send()
            .await
            .map_err(|e| classify("list_objects", &target, e))?;

        let mut entries: Vec<ListingEntry> = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .map(ListingEntry::prefix)
            .collect();

        for object in response.contents() {
            entries.push(ListingEntry::object(
                object.key().unwrap_or_default(),
                object.size().unwrap_or(0),
                object.last_modified().and_then(timestamp),
            ));
        }

        // Prefixes and objects come back as two sorted lists
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            entries,
            next_token,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectReader,
        size: u64,
        options: &PutOptions,
    ) -> Result<()> {
        self.require_v4("put_object")?;

        if self.multipart.should_split(size) {
            return multipart::upload(&self.inner, bucket, key, body, size, options, &self.multipart)
                .await;
        }

        let target = format!("{bucket}/{key}");
        let length = i64::try_from(size)
            .map_err(|_| Error::InvalidArgument(format!("{target}: size {size} out of range")))?;

        let mut request = self
            .inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(&options.content_type)
            .content_length(length)
            .body(ChannelBody::spawn(body, size).into_byte_stream());

        if options.public {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request
            .send()
            .await
            .map_err(|e| classify("put_object", &target, e))?;

        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectStream> {
        self.require_v4("get_object")?;

        let target = format!("{bucket}/{key}");
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify("get_object", &target, e))?;

        let size = response.content_length().unwrap_or(0).max(0) as u64;
        Ok(ObjectStream {
            reader: Box::pin(response.body.into_async_read()),
            size,
        })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        self.require_v4("stat_object")?;

        let target = format!("{bucket}/{key}");
        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify("stat_object", &target, e))?;

        Ok(ObjectMeta {
            key: key.to_string(),
            size: response.content_length().unwrap_or(0),
            last_modified: response.last_modified().and_then(timestamp),
            etag: response.e_tag().map(|e| e.trim_matches('"').to_string()),
            content_type: response.content_type().map(str::to_string),
        })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.require_v4("remove_object")?;

        let target = format!("{bucket}/{key}");
        self.inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify("remove_object", &target, e))?;

        Ok(())
    }

    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        self.require_v4("make_bucket")?;

        let mut request = self.inner.create_bucket().bucket(bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| classify("make_bucket", bucket, e))?;

        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.require_v4("bucket_exists")?;

        match self.inner.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match classify("bucket_exists", bucket, e) {
                Error::NotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        self.require_v4("remove_bucket")?;

        self.inner
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify("remove_bucket", bucket, e))?;

        Ok(())
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        if self.presign_signature == SignatureVersion::V2 {
            let secs = i64::try_from(ttl.as_secs())
                .map_err(|_| Error::InvalidArgument(format!("URL expiry {ttl:?} out of range")))?;
            let expires = jiff::Timestamp::now().as_second().saturating_add(secs);
            return self.v2.presign_get(bucket, key, expires);
        }

        let config = PresigningConfig::expires_in(ttl)
            .map_err(|e| Error::InvalidArgument(format!("invalid URL expiry: {e}")))?;

        let target = format!("{bucket}/{key}");
        let request = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| classify("presign_get", &target, e))?;

        Ok(request.uri().to_string())
    }
}

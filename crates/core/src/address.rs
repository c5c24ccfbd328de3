//! Address parsing and resolution
//!
//! Handles parsing of remote addresses in the format: s3://bucket[/key]
//! A trailing slash, or a bucket-only address, denotes a prefix (directory).

use crate::error::{Error, Result};

/// Scheme prefix every remote address must start with
pub const SCHEME: &str = "s3://";

/// A parsed remote address pointing to an S3 location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Bucket name
    pub bucket: String,
    /// Object key (empty for bucket root)
    pub key: String,
    /// Whether the address denotes a prefix rather than a single object
    pub is_prefix: bool,
}

impl Address {
    /// Create a new Address, classifying the key
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        let is_prefix = key.is_empty() || key.ends_with('/');
        Self {
            bucket: bucket.into(),
            key,
            is_prefix,
        }
    }

    /// Whether this address is the bucket root
    pub fn is_bucket_root(&self) -> bool {
        self.key.is_empty()
    }

    /// Last path segment of the key, ignoring a trailing slash
    pub fn base_name(&self) -> &str {
        let key = self.key.trim_end_matches('/');
        key.rsplit('/').next().unwrap_or(key)
    }

    /// Key for an object placed under this address
    ///
    /// Prefix addresses get `file_name` appended; object addresses name the
    /// object themselves.
    pub fn object_key_for(&self, file_name: &str) -> String {
        if self.is_prefix {
            format!("{}{}", self.key, file_name)
        } else {
            self.key.clone()
        }
    }

    /// Listing prefix up to and including the last slash
    ///
    /// Used to print listing entries relative to the directory being listed.
    pub fn display_prefix(&self) -> String {
        match self.key.rfind('/') {
            Some(pos) => format!("{SCHEME}{}/{}", self.bucket, &self.key[..=pos]),
            None => format!("{SCHEME}{}/", self.bucket),
        }
    }

    /// Full `s3://` URI for a key in this address's bucket
    pub fn uri_for(&self, key: &str) -> String {
        format!("{SCHEME}{}/{key}", self.bucket)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.key.is_empty() {
            write!(f, "{SCHEME}{}", self.bucket)
        } else {
            write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
        }
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        resolve(s)
    }
}

/// Parse an address string into an Address
///
/// Purely syntactic: no existence check is performed.
pub fn resolve(raw: &str) -> Result<Address> {
    let rest = raw.strip_prefix(SCHEME).ok_or_else(|| {
        Error::InvalidAddress(format!(
            "'{raw}' is missing the {SCHEME} scheme. Use format: {SCHEME}bucket[/key]"
        ))
    })?;

    let (bucket, key) = match rest.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (rest, ""),
    };

    if bucket.is_empty() {
        return Err(Error::InvalidAddress(format!(
            "'{raw}' has an empty bucket name"
        )));
    }

    Ok(Address::new(bucket, key))
}

/// Parse an address that must name a bucket only (`s3://bucket` or `s3://bucket/`)
pub fn resolve_bucket(raw: &str) -> Result<String> {
    let address = resolve(raw)?;
    if !address.is_bucket_root() {
        return Err(Error::InvalidAddress(format!(
            "'{raw}' is not a bucket address; bucket names cannot contain '/'"
        )));
    }
    Ok(address.bucket)
}

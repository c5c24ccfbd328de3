//! Signature version 2 query-string presigning
//!
//! Builds path-style GET URLs carrying `AWSAccessKeyId`, `Expires` and
//! `Signature` parameters for servers that still accept the legacy scheme.
//! The string to sign is
//!
//! ```text
//! GET\n\n\n<expires>\n/<bucket>/<key>
//! ```
//!
//! and the signature is Base64(HMAC-SHA1(secret, string to sign)).

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;
use url::Url;

use s3ctl_core::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// Unreserved characters stay literal; '/' keeps separating key segments
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Presigns GET requests with signature version 2
#[derive(Clone)]
pub struct V2Presigner {
    endpoint: Url,
    access_key_id: String,
    secret_access_key: String,
}

impl std::fmt::Debug for V2Presigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V2Presigner")
            .field("endpoint", &self.endpoint.as_str())
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl V2Presigner {
    pub fn new(
        endpoint: Url,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// URL for `bucket/key` valid until `expires`, in seconds since the Unix epoch
    pub fn presign_get(&self, bucket: &str, key: &str, expires: i64) -> Result<String> {
        let resource = format!(
            "/{}/{}",
            utf8_percent_encode(bucket, PATH_ENCODE_SET),
            utf8_percent_encode(key, PATH_ENCODE_SET)
        );
        let signature = self.sign(&format!("GET\n\n\n{expires}\n{resource}"))?;

        Ok(format!(
            "{}{resource}?AWSAccessKeyId={}&Expires={expires}&Signature={}",
            self.endpoint.as_str().trim_end_matches('/'),
            utf8_percent_encode(&self.access_key_id, QUERY_ENCODE_SET),
            utf8_percent_encode(&signature, QUERY_ENCODE_SET)
        ))
    }

    fn sign(&self, string_to_sign: &str) -> Result<String> {
        let mut mac = HmacSha1::new_from_slice(self.secret_access_key.as_bytes())
            .map_err(|e| Error::General(format!("signature v2 key: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

//! In-memory storage backend for scenario tests

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use s3ctl_core::{
    BucketInfo, Error, ListOptions, ListPage, ListingEntry, ObjectMeta, ObjectReader,
    ObjectStream, PutOptions, Result, StorageBackend,
};
use tokio::io::AsyncReadExt;

type PutHook = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
pub struct MemoryBackend {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
    uploads: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
    unreadable: Mutex<Vec<String>>,
    put_hook: Option<PutHook>,
}

impl MemoryBackend {
    pub fn with_bucket(bucket: &str) -> Self {
        let backend = Self::default();
        backend
            .buckets
            .lock()
            .unwrap()
            .insert(bucket.to_string(), BTreeMap::new());
        backend
    }

    /// Run `hook` with the key after every successful upload
    pub fn on_put(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.put_hook = Some(Box::new(hook));
        self
    }

    /// Keep `key` in listings but fail every read of it, like an object
    /// deleted between the listing and the download
    pub fn unreadable(self, key: &str) -> Self {
        self.unreadable.lock().unwrap().push(key.to_string());
        self
    }

    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    /// Keys passed to `get_object`, in call order
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.lock().unwrap().contains_key(bucket)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        Ok(self
            .buckets
            .lock()
            .unwrap()
            .keys()
            .map(|name| BucketInfo {
                name: name.clone(),
                created: None,
            })
            .collect())
    }

    async fn list_objects(&self, bucket: &str, options: &ListOptions) -> Result<ListPage> {
        let buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Error::not_found("list_objects", format!("bucket {bucket}")))?;

        let token = options.continuation_token.as_deref();
        let limit = options.max_keys.max(1) as usize;
        let mut entries: Vec<ListingEntry> = Vec::new();
        let mut last_key = None;

        for (key, data) in objects.range(options.prefix.clone()..) {
            if !key.starts_with(&options.prefix) {
                break;
            }
            if let Some(token) = token {
                if key.as_str() <= token || (token.ends_with('/') && key.starts_with(token)) {
                    continue;
                }
            }

            let rest = &key[options.prefix.len()..];
            let entry = match rest.find('/') {
                Some(pos) if !options.recursive => {
                    let common = format!("{}{}", options.prefix, &rest[..=pos]);
                    if entries.last().is_some_and(|e| e.key == common) {
                        continue;
                    }
                    ListingEntry::prefix(common)
                }
                _ => ListingEntry::object(key.clone(), data.len() as i64, None),
            };

            if entries.len() == limit {
                return Ok(ListPage {
                    entries,
                    next_token: last_key,
                });
            }
            last_key = Some(entry.key.clone());
            entries.push(entry);
        }

        Ok(ListPage {
            entries,
            next_token: None,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: ObjectReader,
        size: u64,
        _options: &PutOptions,
    ) -> Result<()> {
        if !self.has_bucket(bucket) {
            return Err(Error::not_found("put_object", format!("bucket {bucket}")));
        }

        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .await
            .map_err(|e| Error::backend("put_object", format!("{bucket}/{key}"), e))?;
        assert_eq!(data.len() as u64, size, "size hint for {key}");

        self.insert(bucket, key, &data);
        self.uploads.lock().unwrap().push(key.to_string());
        if let Some(hook) = &self.put_hook {
            hook(key);
        }
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectStream> {
        self.downloads.lock().unwrap().push(key.to_string());
        if self.unreadable.lock().unwrap().iter().any(|k| k == key) {
            return Err(Error::not_found("get_object", format!("{bucket}/{key}")));
        }
        let data = self
            .object(bucket, key)
            .ok_or_else(|| Error::not_found("get_object", format!("{bucket}/{key}")))?;
        Ok(ObjectStream {
            size: data.len() as u64,
            reader: Box::pin(std::io::Cursor::new(data)),
        })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        let data = self
            .object(bucket, key)
            .ok_or_else(|| Error::not_found("stat_object", format!("{bucket}/{key}")))?;
        Ok(ObjectMeta {
            key: key.to_string(),
            size: data.len() as i64,
            last_modified: None,
            etag: None,
            content_type: None,
        })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::not_found("remove_object", format!("bucket {bucket}")))?;
        objects.remove(key);
        Ok(())
    }

    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        let mut buckets = self.buckets.lock().unwrap();
        if buckets.contains_key(bucket) {
            return Err(Error::Conflict(format!("bucket {bucket} already exists")));
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.has_bucket(bucket))
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        let mut buckets = self.buckets.lock().unwrap();
        match buckets.get(bucket) {
            None => Err(Error::not_found("remove_bucket", format!("bucket {bucket}"))),
            Some(objects) if !objects.is_empty() => {
                Err(Error::Conflict(format!("bucket {bucket} is not empty")))
            }
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        Ok(format!(
            "http://memory.local/{bucket}/{key}?expires={}",
            ttl.as_secs()
        ))
    }
}

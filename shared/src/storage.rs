use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("S3 HeadObject error: {0}")]
    Head(String),

    #[error("S3 GetObject error: {0}")]
    Get(String),

    #[error("S3 PutObject error: {0}")]
    Put(String),
}

/// Blob storage the pipeline reads sources from and writes derivatives to.
///
/// `exists` reports a missing object as `Ok(false)`; any `Err` it returns is a
/// real failure and must not be read as "absent".
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;
}

pub struct S3Store {
    client: s3::Client,
}

impl S3Store {
    pub fn new(client: s3::Client) -> Self {
        S3Store { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::Head(err.to_string()))
                }
            }
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let cmd_output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                if err.is_no_such_key() {
                    StorageError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Get(err.to_string())
                }
            })?;

        let data = cmd_output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Get(e.to_string()))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Put(e.into_service_error().to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{ObjectStore, StorageError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store that records every call made against it.
    #[derive(Default)]
    pub struct MemoryStore {
        objects: Mutex<HashMap<(String, String), Vec<u8>>>,
        gets: Mutex<Vec<String>>,
        puts: Mutex<Vec<(String, String)>>,
        fail_exists: bool,
        fail_get: bool,
        fail_put_on: Option<String>,
    }

    impl MemoryStore {
        pub fn with_object(bucket: &str, key: &str, body: Vec<u8>) -> Self {
            let store = MemoryStore::default();
            store.insert(bucket, key, body);
            store
        }

        /// Every existence check fails as if access were denied.
        pub fn failing_exists(mut self) -> Self {
            self.fail_exists = true;
            self
        }

        pub fn failing_get(mut self) -> Self {
            self.fail_get = true;
            self
        }

        /// Uploads whose key contains `pattern` fail.
        pub fn failing_put_on(mut self, pattern: &str) -> Self {
            self.fail_put_on = Some(pattern.to_string());
            self
        }

        pub fn insert(&self, bucket: &str, key: &str, body: Vec<u8>) {
            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), body);
        }

        pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
        }

        pub fn get_count(&self) -> usize {
            self.gets.lock().unwrap().len()
        }

        /// Keys written so far, in call order, with their content type.
        pub fn puts(&self) -> Vec<(String, String)> {
            self.puts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
            if self.fail_exists {
                return Err(StorageError::Head("403 Forbidden".to_string()));
            }
            Ok(self.object(bucket, key).is_some())
        }

        async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
            self.gets.lock().unwrap().push(key.to_string());
            if self.fail_get {
                return Err(StorageError::Get("access denied".to_string()));
            }
            self.object(bucket, key).ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
        }

        async fn put(
            &self,
            bucket: &str,
            key: &str,
            body: Vec<u8>,
            content_type: &str,
        ) -> Result<(), StorageError> {
            if let Some(pattern) = &self.fail_put_on {
                if key.contains(pattern.as_str()) {
                    return Err(StorageError::Put("slow down".to_string()));
                }
            }
            self.puts
                .lock()
                .unwrap()
                .push((key.to_string(), content_type.to_string()));
            self.insert(bucket, key, body);
            Ok(())
        }
    }
}

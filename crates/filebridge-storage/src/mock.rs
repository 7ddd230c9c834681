// Filebridge - Unified File Storage
// Copyright (C) 2025 Filebridge Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! In-memory storage platform
//!
//! [`MemoryPlatform`] keeps objects in an `Arc<RwLock<HashMap>>` and supports
//! every optional capability (ACLs, metadata, presigned URLs), which makes it
//! the reference adapter for tests. It also counts calls and can inject write
//! and delete faults, so rollback behaviour can be observed from outside.
//!
//! # Examples
//!
//! ```rust,no_run
//! use filebridge_storage::{FileStorageService, mock::MemoryPlatform};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> filebridge_storage::StorageResult<()> {
//! let memory = MemoryPlatform::new("memory-1");
//! let service = FileStorageService::builder()
//!     .platform(Arc::new(memory.clone()))
//!     .default_platform("memory-1")
//!     .build();
//!
//! let info = service.of_bytes(b"hello".to_vec()).name("a.txt").upload().await?;
//! assert_eq!(memory.calls().saves, 1);
//! assert!(memory.object(&info.file_key()).await.is_some());
//! # Ok(())
//! # }
//! ```

use crate::acl::{AclResolver, AclValue, PredefinedAcl, ResolvedAcl};
use crate::error::{StorageError, StorageResult};
use crate::file_info::FileInfo;
use crate::platform::{join_url, main_key, th_key, FileStorage, SavePayload, WrittenKeys};
use crate::progress::ProgressReader;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use filebridge_config::MemoryPlatformConfig;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// One stored object
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
    pub metadata: BTreeMap<String, String>,
    pub user_metadata: BTreeMap<String, String>,
    pub acl: Option<ResolvedAcl>,
}

/// Snapshot of the adapter call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCalls {
    pub saves: usize,
    pub deletes: usize,
    pub exists: usize,
    pub downloads: usize,
}

#[derive(Default)]
struct Counters {
    saves: AtomicUsize,
    deletes: AtomicUsize,
    exists: AtomicUsize,
    downloads: AtomicUsize,
}

#[derive(Default)]
struct Faults {
    main_writes: AtomicBool,
    thumbnail_writes: AtomicBool,
    deletes: AtomicBool,
}

/// In-memory platform adapter
///
/// Clones share the same store, counters and fault switches.
#[derive(Clone)]
pub struct MemoryPlatform {
    platform: String,
    domain: String,
    base_path: String,
    signing_secret: String,
    acl: AclResolver,
    store: Arc<RwLock<HashMap<String, StoredObject>>>,
    counters: Arc<Counters>,
    faults: Arc<Faults>,
}

impl MemoryPlatform {
    /// Create an empty platform with the default domain and no base path
    pub fn new(platform: impl Into<String>) -> Self {
        let defaults = MemoryPlatformConfig::default();
        MemoryPlatform {
            platform: platform.into(),
            domain: defaults.domain,
            base_path: defaults.base_path,
            signing_secret: defaults.signing_secret,
            acl: AclResolver::new(&PredefinedAcl::ALL, true),
            store: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            faults: Arc::new(Faults::default()),
        }
    }

    pub fn from_config(config: &MemoryPlatformConfig) -> Self {
        Self::new(config.platform.clone())
            .with_domain(config.domain.clone())
            .with_base_path(config.base_path.clone())
            .with_default_acl(config.default_acl.clone())
            .with_signing_secret(config.signing_secret.clone())
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// ACL applied when an upload specifies none
    pub fn with_default_acl(mut self, default_acl: Option<String>) -> Self {
        self.acl = self.acl.with_default_acl(default_acl);
        self
    }

    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = secret.into();
        self
    }

    /// Make the main object write fail without storing anything
    pub fn fail_main_writes(&self, fail: bool) {
        self.faults.main_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the thumbnail write fail after the main object was stored
    pub fn fail_thumbnail_writes(&self, fail: bool) {
        self.faults.thumbnail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every delete fail
    pub fn fail_deletes(&self, fail: bool) {
        self.faults.deletes.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> MemoryCalls {
        MemoryCalls {
            saves: self.counters.saves.load(Ordering::SeqCst),
            deletes: self.counters.deletes.load(Ordering::SeqCst),
            exists: self.counters.exists.load(Ordering::SeqCst),
            downloads: self.counters.downloads.load(Ordering::SeqCst),
        }
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.store.read().await.get(key).cloned()
    }

    /// All stored keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.store.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    /// Signature carried by presigned URLs for `key` expiring at `expires`
    pub fn signature(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_secret.as_bytes());
        hasher.update(key.as_bytes());
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn remove(&self, key: String) -> StorageResult<()> {
        if self.faults.deletes.load(Ordering::SeqCst) {
            return Err(StorageError::other(anyhow::anyhow!(
                "injected delete failure for {}",
                key
            )));
        }
        self.store.write().await.remove(&key);
        Ok(())
    }

    async fn write_main(
        &self,
        key: &str,
        info: &FileInfo,
        payload: &mut SavePayload,
        acl: Option<ResolvedAcl>,
    ) -> StorageResult<u64> {
        let content = std::mem::replace(&mut payload.content, Box::new(tokio::io::empty()));
        let mut reader = ProgressReader::new(content, payload.progress.take(), payload.size);

        let mut data = Vec::new();
        let read = reader.read_to_end(&mut data).await;
        reader.finish();
        read.map_err(|e| StorageError::remote_write(&self.platform, &info.filename, e))?;

        if self.faults.main_writes.load(Ordering::SeqCst) {
            return Err(StorageError::remote_write(
                &self.platform,
                &info.filename,
                anyhow::anyhow!("injected failure writing {}", key),
            ));
        }

        let size = data.len() as u64;
        self.put(key, Bytes::from(data), info.content_type.clone(), info, acl)
            .await;
        Ok(size)
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: String,
        info: &FileInfo,
        acl: Option<ResolvedAcl>,
    ) {
        let object = StoredObject {
            data,
            content_type,
            metadata: info.metadata.clone(),
            user_metadata: info.user_metadata.clone(),
            acl,
        };
        self.store.write().await.insert(key.to_string(), object);
    }

    async fn put_thumbnail(
        &self,
        key: &str,
        data: Bytes,
        info: &FileInfo,
        acl: Option<ResolvedAcl>,
    ) -> StorageResult<u64> {
        let th = info.thumbnail.clone().unwrap_or_default();
        if self.faults.thumbnail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::remote_write(
                &self.platform,
                &th.filename,
                anyhow::anyhow!("injected failure writing {}", key),
            ));
        }

        let size = data.len() as u64;
        let object = StoredObject {
            data,
            content_type: th.content_type,
            metadata: th.metadata,
            user_metadata: th.user_metadata,
            acl,
        };
        self.store.write().await.insert(key.to_string(), object);
        Ok(size)
    }

    async fn read_object(&self, key: &str) -> StorageResult<Bytes> {
        self.counters.downloads.fetch_add(1, Ordering::SeqCst);
        self.store
            .read()
            .await
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| {
                StorageError::remote_read(&self.platform, key, anyhow::anyhow!("object not found"))
            })
    }

    async fn apply_acl(&self, key: &str, acl: &AclValue) -> StorageResult<bool> {
        let Some(resolved) = self.acl.resolve(Some(acl))? else {
            return Ok(false);
        };
        match self.store.write().await.get_mut(key) {
            Some(object) => {
                object.acl = Some(resolved);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn presign(&self, key: &str, expiration: DateTime<Utc>) -> StorageResult<Option<String>> {
        if expiration <= Utc::now() {
            return Err(StorageError::invalid_argument(format!(
                "presigned URL expiration {} is not in the future",
                expiration
            )));
        }
        let expires = expiration.timestamp();
        Ok(Some(format!(
            "{}?expires={}&signature={}",
            join_url(&self.domain, key),
            expires,
            self.signature(key, expires)
        )))
    }
}

impl fmt::Debug for MemoryPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPlatform")
            .field("platform", &self.platform)
            .field("domain", &self.domain)
            .field("base_path", &self.base_path)
            .field("default_acl", &self.acl.default_acl())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FileStorage for MemoryPlatform {
    fn platform(&self) -> &str {
        &self.platform
    }

    #[instrument(skip_all, fields(platform = %self.platform, filename = %info.filename))]
    async fn save(&self, info: &mut FileInfo, mut payload: SavePayload) -> StorageResult<bool> {
        self.counters.saves.fetch_add(1, Ordering::SeqCst);
        info.base_path = self.base_path.clone();

        let key = main_key(info)?;
        let acl = self.acl.resolve(info.file_acl.as_ref())?;
        let thumbnail = match payload.thumbnail.take() {
            Some(data) => {
                let th_acl = self.acl.resolve(info.th_file_acl())?;
                Some((th_key(info)?, data, th_acl))
            }
            None => None,
        };

        let mut written = WrittenKeys::new(&self.platform);

        let size = self.write_main(&key, info, &mut payload, acl).await?;
        written.record(key.clone());
        info.size = size;
        info.url = join_url(&self.domain, &key);

        if let Some((th_key, data, th_acl)) = thumbnail {
            match self.put_thumbnail(&th_key, data, info, th_acl).await {
                Ok(th_size) => {
                    written.record(th_key.clone());
                    if let Some(th) = info.thumbnail.as_mut() {
                        th.size = th_size;
                        th.url = join_url(&self.domain, &th_key);
                    }
                }
                Err(e) => {
                    written.rollback(|k| self.remove(k)).await;
                    info.url.clear();
                    return Err(e);
                }
            }
        }

        debug!(key = %key, size, "Stored object in memory");
        Ok(true)
    }

    async fn delete(&self, info: &FileInfo) -> StorageResult<bool> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        if info.has_thumbnail() {
            self.remove(th_key(info)?).await?;
        }
        self.remove(main_key(info)?).await?;
        Ok(true)
    }

    async fn exists(&self, info: &FileInfo) -> StorageResult<bool> {
        self.counters.exists.fetch_add(1, Ordering::SeqCst);
        let key = main_key(info)?;
        Ok(self.store.read().await.contains_key(&key))
    }

    async fn download(
        &self,
        info: &FileInfo,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<u64> {
        let key = main_key(info)?;
        let data = self.read_object(&key).await?;
        sink.write_all(&data).await?;
        Ok(data.len() as u64)
    }

    async fn download_th(
        &self,
        info: &FileInfo,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<u64> {
        let key = th_key(info)?;
        let data = self.read_object(&key).await?;
        sink.write_all(&data).await?;
        Ok(data.len() as u64)
    }

    fn supports_acl(&self) -> bool {
        true
    }

    fn supports_presigned_url(&self) -> bool {
        true
    }

    fn supports_metadata(&self) -> bool {
        true
    }

    async fn set_file_acl(&self, info: &FileInfo, acl: &AclValue) -> StorageResult<bool> {
        self.apply_acl(&main_key(info)?, acl).await
    }

    async fn set_th_file_acl(&self, info: &FileInfo, acl: &AclValue) -> StorageResult<bool> {
        self.apply_acl(&th_key(info)?, acl).await
    }

    async fn generate_presigned_url(
        &self,
        info: &FileInfo,
        expiration: DateTime<Utc>,
    ) -> StorageResult<Option<String>> {
        self.presign(&main_key(info)?, expiration)
    }

    async fn generate_th_presigned_url(
        &self,
        info: &FileInfo,
        expiration: DateTime<Utc>,
    ) -> StorageResult<Option<String>> {
        self.presign(&th_key(info)?, expiration)
    }
}

/// Reader that always fails; stands in for a source that drops mid-transfer
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingReader;

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "source dropped",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_info::ThumbnailInfo;
    use chrono::Duration;
    use std::io::Cursor;

    fn record(filename: &str) -> FileInfo {
        let mut info = FileInfo::new("memory-1");
        info.path = "t/".to_string();
        info.filename = filename.to_string();
        info.content_type = "text/plain".to_string();
        info
    }

    fn payload(data: &[u8]) -> SavePayload {
        SavePayload::new(Box::new(Cursor::new(data.to_vec()))).with_size(Some(data.len() as u64))
    }

    fn with_thumbnail(mut info: FileInfo) -> FileInfo {
        info.thumbnail = Some(ThumbnailInfo {
            filename: format!("{}.min.jpg", info.filename),
            content_type: "image/jpeg".to_string(),
            ..Default::default()
        });
        info
    }

    #[tokio::test]
    async fn test_save_fills_url_and_size() {
        let storage = MemoryPlatform::new("memory-1").with_base_path("base/");
        let mut info = record("a.txt");

        assert!(storage.save(&mut info, payload(b"hello")).await.unwrap());
        assert_eq!(info.base_path, "base/");
        assert_eq!(info.url, "memory://base/t/a.txt");
        assert_eq!(info.size, 5);
        assert_eq!(storage.keys().await, vec!["base/t/a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_thumbnail_written_after_main() {
        let storage = MemoryPlatform::new("memory-1");
        let mut info = with_thumbnail(record("a.png"));
        let payload = payload(b"main").with_thumbnail(Some(Bytes::from_static(b"thumb")));

        storage.save(&mut info, payload).await.unwrap();
        assert_eq!(info.th_url(), Some("memory://t/a.png.min.jpg"));
        assert_eq!(info.th_size(), Some(5));

        let th = storage.object("t/a.png.min.jpg").await.unwrap();
        assert_eq!(th.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_thumbnail_failure_rolls_back_main() {
        let storage = MemoryPlatform::new("memory-1");
        storage.fail_thumbnail_writes(true);
        let mut info = with_thumbnail(record("a.png"));
        let payload = payload(b"main").with_thumbnail(Some(Bytes::from_static(b"thumb")));

        let err = storage.save(&mut info, payload).await.unwrap_err();
        assert!(err.is_remote_write_failure());
        assert!(storage.is_empty().await);
        assert!(!storage.exists(&info).await.unwrap());
        assert!(info.url.is_empty());
    }

    #[tokio::test]
    async fn test_main_failure_stores_nothing() {
        let storage = MemoryPlatform::new("memory-1");
        storage.fail_main_writes(true);
        let mut info = record("a.txt");

        let err = storage.save(&mut info, payload(b"0123456789")).await.unwrap_err();
        assert!(err.is_remote_write_failure());
        assert!(storage.is_empty().await);
        assert_eq!(storage.calls().deletes, 0);
    }

    #[tokio::test]
    async fn test_failed_overwrite_keeps_previous_object() {
        let storage = MemoryPlatform::new("memory-1");
        let mut first = record("keep.txt");
        storage.save(&mut first, payload(b"precious")).await.unwrap();

        let mut second = record("keep.txt");
        let dropping = Cursor::new(vec![1u8; 1024]).chain(FailingReader);
        let err = storage
            .save(&mut second, SavePayload::new(Box::new(dropping)))
            .await
            .unwrap_err();
        assert!(err.is_remote_write_failure());

        let kept = storage.object("t/keep.txt").await.unwrap();
        assert_eq!(&kept.data[..], b"precious");

        storage.fail_main_writes(true);
        let mut third = record("keep.txt");
        assert!(storage.save(&mut third, payload(b"other")).await.is_err());
        assert!(storage.exists(&first).await.unwrap());
    }

    #[tokio::test]
    async fn test_rollback_failure_keeps_original_error() {
        let storage = MemoryPlatform::new("memory-1");
        storage.fail_thumbnail_writes(true);
        storage.fail_deletes(true);
        let mut info = with_thumbnail(record("a.png"));
        let payload = payload(b"main").with_thumbnail(Some(Bytes::from_static(b"thumb")));

        let err = storage.save(&mut info, payload).await.unwrap_err();
        assert!(err.is_remote_write_failure());
        assert_eq!(storage.keys().await, vec!["t/a.png".to_string()]);
    }

    #[tokio::test]
    async fn test_source_read_error_is_write_failure() {
        let storage = MemoryPlatform::new("memory-1");
        let mut info = record("a.txt");
        let payload = SavePayload::new(Box::new(FailingReader));

        let err = storage.save(&mut info, payload).await.unwrap_err();
        assert!(err.is_remote_write_failure());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let storage = MemoryPlatform::new("memory-1");
        let mut info = with_thumbnail(record("a.png"));
        let payload = payload(b"main").with_thumbnail(Some(Bytes::from_static(b"thumb")));
        storage.save(&mut info, payload).await.unwrap();

        assert!(storage.delete(&info).await.unwrap());
        assert!(storage.delete(&info).await.unwrap());
        assert!(storage.is_empty().await);
        assert_eq!(storage.calls().deletes, 2);
    }

    #[tokio::test]
    async fn test_download_th_without_thumbnail() {
        let storage = MemoryPlatform::new("memory-1");
        let mut info = record("a.txt");
        storage.save(&mut info, payload(b"abc")).await.unwrap();

        let mut sink = Vec::new();
        assert_eq!(storage.download(&info, &mut sink).await.unwrap(), 3);
        assert_eq!(sink, b"abc");

        let err = storage.download_th(&info, &mut Vec::<u8>::new()).await.unwrap_err();
        assert!(err.is_thumbnail_not_found());
    }

    #[tokio::test]
    async fn test_acl_resolution_on_save() {
        let storage = MemoryPlatform::new("memory-1").with_default_acl(Some("private".to_string()));

        let mut info = record("a.txt");
        info.file_acl = Some("public-read".into());
        storage.save(&mut info, payload(b"x")).await.unwrap();
        let object = storage.object("t/a.txt").await.unwrap();
        assert_eq!(object.acl, Some(ResolvedAcl::Predefined(PredefinedAcl::PublicRead)));

        let mut info = record("b.txt");
        storage.save(&mut info, payload(b"x")).await.unwrap();
        let object = storage.object("t/b.txt").await.unwrap();
        assert_eq!(object.acl, Some(ResolvedAcl::Predefined(PredefinedAcl::Private)));
    }

    #[tokio::test]
    async fn test_unsupported_acl_writes_nothing() {
        let storage = MemoryPlatform::new("memory-1");
        let mut info = record("a.txt");
        info.file_acl = Some(AclValue::Other(serde_json::json!(42)));

        let err = storage.save(&mut info, payload(b"x")).await.unwrap_err();
        assert!(err.is_unsupported_acl_value());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_file_acl() {
        let storage = MemoryPlatform::new("memory-1");
        let mut info = record("a.txt");
        storage.save(&mut info, payload(b"x")).await.unwrap();

        assert!(storage.set_file_acl(&info, &"public-read".into()).await.unwrap());
        assert!(!storage.set_file_acl(&info, &"bogus-acl".into()).await.unwrap());
        assert!(storage
            .set_th_file_acl(&info, &"public-read".into())
            .await
            .unwrap_err()
            .is_thumbnail_not_found());
    }

    #[tokio::test]
    async fn test_presigned_url() {
        let storage = MemoryPlatform::new("memory-1").with_signing_secret("s3cr3t");
        let mut info = record("a.txt");
        storage.save(&mut info, payload(b"x")).await.unwrap();

        let expiration = Utc::now() + Duration::minutes(10);
        let url = storage
            .generate_presigned_url(&info, expiration)
            .await
            .unwrap()
            .unwrap();
        let expected = storage.signature("t/a.txt", expiration.timestamp());
        assert!(url.starts_with("memory://t/a.txt?expires="));
        assert!(url.ends_with(&expected));

        let past = Utc::now() - Duration::minutes(1);
        assert!(storage.generate_presigned_url(&info, past).await.is_err());
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let storage = MemoryPlatform::new("memory-1");
        let clone = storage.clone();
        let mut info = record("a.txt");
        storage.save(&mut info, payload(b"x")).await.unwrap();

        assert!(clone.exists(&info).await.unwrap());
        assert_eq!(clone.calls().saves, 1);
        assert_eq!(clone.calls().exists, 1);
    }

    #[tokio::test]
    async fn test_debug_impl() {
        let storage = MemoryPlatform::new("memory-1");
        let debug = format!("{:?}", storage);
        assert!(debug.contains("MemoryPlatform"));
        assert!(debug.contains("memory-1"));
    }
}

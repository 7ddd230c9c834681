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

//! The platform adapter contract
//!
//! Every backend implements [`FileStorage`]. The contract is uniform:
//!
//! - `save` writes the main object, then the thumbnail (if any), and fills in
//!   `url`/`size` and the thumbnail URL. If either write fails, whatever was
//!   already attempted is deleted again before the error propagates.
//! - `delete` removes the thumbnail first, then the main object. Deleting a
//!   missing object succeeds.
//! - `exists` only looks at the main object.
//! - Capability-gated operations (ACL, presigned URLs) default to no-ops
//!   returning `false` / `None`.
//!
//! Object keys are always `base_path + path + filename`, see
//! [`FileInfo::file_key`].

use crate::acl::AclValue;
use crate::error::{StorageError, StorageResult};
use crate::file_info::FileInfo;
use crate::progress::SharedProgressListener;
use crate::wrapper::BoxedReader;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt::{self, Debug};
use std::future::Future;
use tokio::io::AsyncWrite;
use tracing::{debug, warn};

/// Everything an adapter needs to write one upload
pub struct SavePayload {
    /// Main object content, read exactly once
    pub content: BoxedReader,
    /// Exact content length, when known up front
    pub size: Option<u64>,
    /// Encoded thumbnail, present only if one was generated
    pub thumbnail: Option<Bytes>,
    /// Listener observing the main object transfer
    pub progress: Option<SharedProgressListener>,
}

impl SavePayload {
    pub fn new(content: BoxedReader) -> Self {
        SavePayload {
            content,
            size: None,
            thumbnail: None,
            progress: None,
        }
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<Bytes>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn with_progress(mut self, progress: Option<SharedProgressListener>) -> Self {
        self.progress = progress;
        self
    }
}

impl Debug for SavePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavePayload")
            .field("size", &self.size)
            .field("thumbnail_len", &self.thumbnail.as_ref().map(Bytes::len))
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

/// Storage platform adapter
///
/// Implementations must be `Send + Sync + Debug`; one instance serves
/// concurrent calls for different records.
///
/// # Examples
///
/// ```rust,no_run
/// use filebridge_storage::{FileInfo, FileStorage, SavePayload, mock::MemoryPlatform};
///
/// # #[tokio::main]
/// # async fn main() -> filebridge_storage::StorageResult<()> {
/// let storage = MemoryPlatform::new("memory-1");
///
/// let mut info = FileInfo::new("memory-1");
/// info.path = "docs/".to_string();
/// info.filename = "a.txt".to_string();
///
/// let payload = SavePayload::new(Box::new(std::io::Cursor::new(b"hello".to_vec())));
/// storage.save(&mut info, payload).await?;
/// assert!(storage.exists(&info).await?);
///
/// storage.delete(&info).await?;
/// storage.delete(&info).await?; // idempotent
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait FileStorage: Send + Sync + Debug {
    /// Identifier this adapter is registered under
    fn platform(&self) -> &str;

    /// Write the main object and optional thumbnail
    ///
    /// Fills `info.url`, `info.size` and, when a thumbnail is written,
    /// `info.thumbnail.url`/`size`. Returns `Ok(false)` only when the backend
    /// refused the write without raising an error.
    ///
    /// # Errors
    ///
    /// [`StorageError::RemoteWriteFailure`] if a write fails. Objects this
    /// call already stored are deleted first; an object that existed under
    /// the same key before the call is left untouched when the write of
    /// that key fails.
    ///
    /// The payload stream is consumed during the write, so a source that
    /// errors part way through (a dropped connection, a failing reader) is
    /// also reported as `RemoteWriteFailure`, carrying the read error as its
    /// source. [`StorageError::SourceUnavailable`] is raised earlier, while
    /// the wrapper is prepared, for sources that cannot be opened or sniffed.
    async fn save(&self, info: &mut FileInfo, payload: SavePayload) -> StorageResult<bool>;

    /// Delete the thumbnail (if any), then the main object
    async fn delete(&self, info: &FileInfo) -> StorageResult<bool>;

    /// Whether the main object exists
    async fn exists(&self, info: &FileInfo) -> StorageResult<bool>;

    /// Stream the main object into `sink`, returning the bytes written
    async fn download(
        &self,
        info: &FileInfo,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<u64>;

    /// Stream the thumbnail into `sink`
    ///
    /// # Errors
    ///
    /// [`StorageError::ThumbnailNotFound`] if the record has no thumbnail.
    async fn download_th(
        &self,
        info: &FileInfo,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<u64>;

    fn supports_acl(&self) -> bool {
        false
    }

    fn supports_presigned_url(&self) -> bool {
        false
    }

    fn supports_metadata(&self) -> bool {
        false
    }

    /// Apply an ACL to the main object
    ///
    /// Returns `Ok(false)` when unsupported or when the value resolves to no
    /// usable ACL.
    async fn set_file_acl(&self, _info: &FileInfo, _acl: &AclValue) -> StorageResult<bool> {
        Ok(false)
    }

    /// Apply an ACL to the thumbnail
    async fn set_th_file_acl(&self, _info: &FileInfo, _acl: &AclValue) -> StorageResult<bool> {
        Ok(false)
    }

    /// Time-bounded URL for the main object, `None` when unsupported
    async fn generate_presigned_url(
        &self,
        _info: &FileInfo,
        _expiration: DateTime<Utc>,
    ) -> StorageResult<Option<String>> {
        Ok(None)
    }

    /// Time-bounded URL for the thumbnail, `None` when unsupported
    async fn generate_th_presigned_url(
        &self,
        _info: &FileInfo,
        _expiration: DateTime<Utc>,
    ) -> StorageResult<Option<String>> {
        Ok(None)
    }

    /// Release the backend client
    async fn close(&self) {}
}

/// Keys durably written during one `save`
///
/// A key is recorded only once its write has landed. A write that fails part
/// way cleans up after itself (temporary file, aborted multipart upload) and
/// never reaches the ledger, so an object already stored under the same key
/// survives the failed call.
#[derive(Debug)]
pub struct WrittenKeys<'a> {
    platform: &'a str,
    keys: Vec<String>,
}

impl<'a> WrittenKeys<'a> {
    pub fn new(platform: &'a str) -> Self {
        WrittenKeys {
            platform,
            keys: Vec::new(),
        }
    }

    pub fn record(&mut self, key: impl Into<String>) {
        self.keys.push(key.into());
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Delete every recorded key in reverse order
    ///
    /// Failures are logged and swallowed; they never replace the error that
    /// triggered the rollback.
    pub async fn rollback<F, Fut>(self, mut delete: F)
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = StorageResult<()>>,
    {
        for key in self.keys.into_iter().rev() {
            match delete(key.clone()).await {
                Ok(()) => debug!(platform = self.platform, key = %key, "Rolled back partial write"),
                Err(e) => warn!(
                    platform = self.platform,
                    key = %key,
                    error = %e,
                    "Rollback failed, object may be orphaned"
                ),
            }
        }
    }
}

/// Reject keys that are empty, absolute or escape their root
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_key("key cannot be empty"));
    }
    if key.starts_with('/') {
        return Err(StorageError::invalid_key(format!("key must be relative: {}", key)));
    }
    if key.contains('\\') {
        return Err(StorageError::invalid_key(format!("key contains a backslash: {}", key)));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::invalid_key(format!("key escapes its root: {}", key)));
    }
    Ok(())
}

/// Main object key of a record, validated
pub fn main_key(info: &FileInfo) -> StorageResult<String> {
    let key = info.file_key();
    validate_key(&key)?;
    Ok(key)
}

/// Thumbnail key of a record, validated
///
/// # Errors
///
/// [`StorageError::ThumbnailNotFound`] if the record carries no thumbnail.
pub fn th_key(info: &FileInfo) -> StorageResult<String> {
    let key = info
        .th_file_key()
        .ok_or_else(|| StorageError::thumbnail_not_found(info.file_key()))?;
    validate_key(&key)?;
    Ok(key)
}

/// Join a domain and an object key into an addressable URL
pub fn join_url(domain: &str, key: &str) -> String {
    if domain.is_empty() || domain.ends_with('/') {
        format!("{}{}", domain, key)
    } else {
        format!("{}/{}", domain, key)
    }
}

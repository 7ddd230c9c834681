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

//! Local filesystem storage platform
//!
//! Objects live at `root/<base_path><path><filename>`, so the on-disk layout
//! mirrors the canonical key:
//!
//! ```text
//! root/
//!   uploads/
//!     avatars/
//!       3f2a...9c.png
//!       3f2a...9c.png.min.jpg
//! ```
//!
//! Writes go to a hidden temporary file in the target directory and are
//! renamed into place, so a reader never observes a partial object. Keys that
//! are absolute or contain `..` are rejected before touching the disk.
//!
//! The local platform has no ACL, metadata or presigned URL capability.
//!
//! # Examples
//!
//! ```rust,no_run
//! use filebridge_storage::{FileInfo, FileStorage, SavePayload, local::LocalPlatform};
//!
//! #[tokio::main]
//! async fn main() -> filebridge_storage::StorageResult<()> {
//!     let storage = LocalPlatform::new("local-1", "./data").await?;
//!
//!     let mut info = FileInfo::new("local-1");
//!     info.filename = "hello.txt".to_string();
//!     let payload = SavePayload::new(Box::new(std::io::Cursor::new(b"hi".to_vec())));
//!     storage.save(&mut info, payload).await?;
//!
//!     assert!(storage.exists(&info).await?);
//!     storage.delete(&info).await?;
//!     Ok(())
//! }
//! ```

use crate::error::{StorageError, StorageResult};
use crate::file_info::FileInfo;
use crate::platform::{join_url, main_key, th_key, FileStorage, SavePayload, WrittenKeys};
use crate::progress::ProgressReader;
use anyhow::Context;
use async_trait::async_trait;
use filebridge_config::LocalPlatformConfig;
use std::fmt;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

/// Local filesystem platform adapter
///
/// `Send + Sync`; the filesystem provides the synchronization between
/// concurrent calls for different keys.
#[derive(Clone)]
pub struct LocalPlatform {
    platform: String,
    root: PathBuf,
    domain: String,
    base_path: String,
}

impl LocalPlatform {
    /// Create a platform rooted at `root`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Fails if `root` exists but is not a directory, or cannot be created.
    pub async fn new<P: AsRef<Path>>(platform: impl Into<String>, root: P) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();

        match fs::metadata(&root).await {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(StorageError::invalid_argument(format!(
                    "path exists but is not a directory: {}",
                    root.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(&root).await?,
            Err(e) => return Err(e.into()),
        }

        Ok(LocalPlatform {
            platform: platform.into(),
            root,
            domain: String::new(),
            base_path: String::new(),
        })
    }

    pub async fn from_config(config: &LocalPlatformConfig) -> StorageResult<Self> {
        Ok(Self::new(config.platform.clone(), &config.storage_path)
            .await?
            .with_domain(config.domain.clone())
            .with_base_path(config.base_path.clone()))
    }

    /// URL prefix for stored objects
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of a validated key
    pub fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Stream `reader` into `path` via a temporary sibling, then rename
    async fn write_atomic<R>(&self, path: &Path, reader: &mut R) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).await?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = parent.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()));

        let result = async {
            let mut file = fs::File::create(&temp_path).await?;
            let written = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, path).await?;
            Ok::<_, io::Error>(written)
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }

    async fn remove(&self, key: String) -> StorageResult<()> {
        match fs::remove_file(self.object_path(&key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn copy_to(
        &self,
        key: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<u64> {
        let mut file = fs::File::open(self.object_path(key))
            .await
            .with_context(|| format!("opening {}", key))
            .map_err(|e| StorageError::remote_read(&self.platform, key, e))?;
        tokio::io::copy(&mut file, sink)
            .await
            .with_context(|| format!("reading {}", key))
            .map_err(|e| StorageError::remote_read(&self.platform, key, e))
    }
}

impl fmt::Debug for LocalPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalPlatform")
            .field("platform", &self.platform)
            .field("root", &self.root)
            .field("domain", &self.domain)
            .field("base_path", &self.base_path)
            .finish()
    }
}

#[async_trait]
impl FileStorage for LocalPlatform {
    fn platform(&self) -> &str {
        &self.platform
    }

    #[instrument(skip_all, fields(platform = %self.platform, filename = %info.filename))]
    async fn save(&self, info: &mut FileInfo, mut payload: SavePayload) -> StorageResult<bool> {
        info.base_path = self.base_path.clone();
        let key = main_key(info)?;
        let thumbnail = match payload.thumbnail.take() {
            Some(data) => Some((th_key(info)?, data)),
            None => None,
        };

        let mut written = WrittenKeys::new(&self.platform);

        let mut reader = ProgressReader::new(payload.content, payload.progress, payload.size);
        let result = self
            .write_atomic(&self.object_path(&key), &mut reader)
            .await
            .with_context(|| format!("writing {}", key));
        reader.finish();
        let size =
            result.map_err(|e| StorageError::remote_write(&self.platform, &info.filename, e))?;
        written.record(key.clone());
        info.size = size;
        info.url = join_url(&self.domain, &key);

        if let Some((th_key, data)) = thumbnail {
            let mut cursor = Cursor::new(data);
            let result = self
                .write_atomic(&self.object_path(&th_key), &mut cursor)
                .await
                .with_context(|| format!("writing thumbnail {}", th_key));
            match result {
                Ok(th_size) => {
                    written.record(th_key.clone());
                    if let Some(th) = info.thumbnail.as_mut() {
                        th.size = th_size;
                        th.url = join_url(&self.domain, &th_key);
                    }
                }
                Err(e) => {
                    let filename = info.th_filename().unwrap_or_default().to_string();
                    written.rollback(|k| self.remove(k)).await;
                    info.url.clear();
                    return Err(StorageError::remote_write(&self.platform, filename, e));
                }
            }
        }

        debug!(key = %key, size, "Stored object on local disk");
        Ok(true)
    }

    async fn delete(&self, info: &FileInfo) -> StorageResult<bool> {
        if info.has_thumbnail() {
            self.remove(th_key(info)?).await?;
        }
        self.remove(main_key(info)?).await?;
        Ok(true)
    }

    async fn exists(&self, info: &FileInfo) -> StorageResult<bool> {
        let path = self.object_path(&main_key(info)?);
        Ok(fs::try_exists(&path).await?)
    }

    async fn download(
        &self,
        info: &FileInfo,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<u64> {
        self.copy_to(&main_key(info)?, sink).await
    }

    async fn download_th(
        &self,
        info: &FileInfo,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<u64> {
        self.copy_to(&th_key(info)?, sink).await
    }
}

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

//! Download builder returned by [`FileStorageService::download`](crate::FileStorageService::download)

use crate::error::StorageResult;
use crate::file_info::FileInfo;
use crate::platform::FileStorage;
use crate::progress::{ProgressListener, ProgressWriter, SharedProgressListener};
use bytes::Bytes;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Which object of a record to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadTarget {
    Main,
    Thumbnail,
}

/// Pending download of one object
#[must_use = "a download does nothing until a terminal method is awaited"]
pub struct Downloader<'a> {
    storage: Arc<dyn FileStorage>,
    info: &'a FileInfo,
    target: DownloadTarget,
    progress: Option<SharedProgressListener>,
}

impl<'a> Downloader<'a> {
    pub(crate) fn new(storage: Arc<dyn FileStorage>, info: &'a FileInfo, target: DownloadTarget) -> Self {
        Downloader {
            storage,
            info,
            target,
            progress: None,
        }
    }

    pub fn target(&self) -> DownloadTarget {
        self.target
    }

    pub fn progress_listener<L>(mut self, listener: L) -> Self
    where
        L: ProgressListener + 'static,
    {
        self.progress = Some(Arc::new(listener));
        self
    }

    /// Stream the object into `sink`, returning the bytes written
    pub async fn write_to(self, sink: &mut (dyn AsyncWrite + Send + Unpin)) -> StorageResult<u64> {
        let total = match self.target {
            DownloadTarget::Main => Some(self.info.size),
            DownloadTarget::Thumbnail => self.info.th_size(),
        };

        let mut writer = ProgressWriter::new(sink, self.progress, total);
        let written = match self.target {
            DownloadTarget::Main => self.storage.download(self.info, &mut writer).await?,
            DownloadTarget::Thumbnail => self.storage.download_th(self.info, &mut writer).await?,
        };
        writer.flush().await?;
        writer.finish();
        Ok(written)
    }

    /// Buffer the whole object
    pub async fn bytes(self) -> StorageResult<Bytes> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }

    /// Write the object to a local file, replacing it if present
    pub async fn to_file(self, path: impl AsRef<Path>) -> StorageResult<u64> {
        let mut file = fs::File::create(path.as_ref()).await?;
        let written = self.write_to(&mut file).await?;
        file.sync_all().await?;
        Ok(written)
    }
}

impl fmt::Debug for Downloader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("platform", &self.storage.platform())
            .field("key", &self.info.file_key())
            .field("target", &self.target)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

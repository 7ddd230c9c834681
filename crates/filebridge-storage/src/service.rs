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

//! The file storage service
//!
//! [`FileStorageService`] is the façade over all registered platforms. An
//! upload runs through a fixed sequence of states:
//!
//! ```text
//! IDLE -> PRETREATING -> DISPATCHING -> SUCCEEDED
//!              |              |
//!              +------+-------+
//!                     v
//!                   FAILED
//! ```
//!
//! PRETREATING resolves the platform, checks capabilities, normalizes the
//! source and generates the thumbnail; nothing is written yet. DISPATCHING is
//! the platform `save` (which rolls back its own partial writes) followed by
//! the recorder. Each transition is logged inside an `upload` span.
//!
//! Every operation on an existing record resolves its adapter from
//! `FileInfo::platform`, never from the current default.

use crate::acl::AclValue;
use crate::download::{DownloadTarget, Downloader};
use crate::error::{StorageError, StorageResult};
use crate::file_info::{FileInfo, ThumbnailInfo};
use crate::platform::{FileStorage, SavePayload};
use crate::pretreatment::UploadPretreatment;
use crate::recorder::{FileRecorder, NoopRecorder};
use crate::registry::PlatformRegistry;
use crate::wrapper::FileWrapper;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use filebridge_config::{DEFAULT_PLATFORM, DEFAULT_THUMBNAIL_SUFFIX};
use filebridge_media::{ThumbnailGenerator, ThumbnailSpec, OCTET_STREAM};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info, info_span, warn, Instrument};

/// Lifecycle of a single upload call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Pretreating,
    Dispatching,
    Succeeded,
    Failed,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Idle => "IDLE",
            UploadState::Pretreating => "PRETREATING",
            UploadState::Dispatching => "DISPATCHING",
            UploadState::Succeeded => "SUCCEEDED",
            UploadState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Succeeded | UploadState::Failed)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct StateTracker {
    state: UploadState,
}

impl StateTracker {
    fn new() -> Self {
        StateTracker {
            state: UploadState::Idle,
        }
    }

    fn advance(&mut self, next: UploadState) {
        debug!(from = %self.state, to = %next, "Upload state transition");
        self.state = next;
    }
}

/// Builder for [`FileStorageService`]
#[derive(Default)]
pub struct FileStorageServiceBuilder {
    platforms: Vec<Arc<dyn FileStorage>>,
    default_platform: Option<String>,
    recorder: Option<Arc<dyn FileRecorder>>,
    thumbnail_suffix: Option<String>,
    http: Option<reqwest::Client>,
}

impl FileStorageServiceBuilder {
    /// Platform used when an upload does not name one
    pub fn default_platform(mut self, platform: impl Into<String>) -> Self {
        self.default_platform = Some(platform.into());
        self
    }

    /// Register an adapter; later registrations of the same id win
    pub fn platform(mut self, storage: Arc<dyn FileStorage>) -> Self {
        self.platforms.push(storage);
        self
    }

    pub fn recorder(mut self, recorder: Arc<dyn FileRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Default thumbnail filename suffix (`.min.jpg` unless set)
    pub fn thumbnail_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.thumbnail_suffix = Some(suffix.into());
        self
    }

    /// HTTP client used to fetch URL sources
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn build(self) -> FileStorageService {
        let registry = PlatformRegistry::new();
        for storage in self.platforms {
            registry.register(storage);
        }

        FileStorageService {
            registry,
            default_platform: self
                .default_platform
                .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            recorder: self.recorder.unwrap_or_else(|| Arc::new(NoopRecorder)),
            thumbnail_suffix: self
                .thumbnail_suffix
                .unwrap_or_else(|| DEFAULT_THUMBNAIL_SUFFIX.to_string()),
            http: self.http.unwrap_or_default(),
            thumbnails: ThumbnailGenerator::new(),
        }
    }
}

impl fmt::Debug for FileStorageServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorageServiceBuilder")
            .field("platforms", &self.platforms.len())
            .field("default_platform", &self.default_platform)
            .field("thumbnail_suffix", &self.thumbnail_suffix)
            .finish_non_exhaustive()
    }
}

/// Façade over all registered storage platforms
pub struct FileStorageService {
    registry: PlatformRegistry,
    default_platform: String,
    recorder: Arc<dyn FileRecorder>,
    thumbnail_suffix: String,
    http: reqwest::Client,
    thumbnails: ThumbnailGenerator,
}

impl FileStorageService {
    pub fn builder() -> FileStorageServiceBuilder {
        FileStorageServiceBuilder::default()
    }

    /// Start an upload from any source
    pub fn of(&self, wrapper: FileWrapper) -> UploadPretreatment<'_> {
        UploadPretreatment::new(self, wrapper)
    }

    pub fn of_bytes(&self, data: impl Into<Bytes>) -> UploadPretreatment<'_> {
        self.of(FileWrapper::from_bytes(data))
    }

    pub fn of_path(&self, path: impl Into<PathBuf>) -> UploadPretreatment<'_> {
        self.of(FileWrapper::from_path(path))
    }

    pub fn of_url(&self, url: impl Into<String>) -> UploadPretreatment<'_> {
        self.of(FileWrapper::from_url(url))
    }

    pub fn of_reader<R>(&self, reader: R) -> UploadPretreatment<'_>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.of(FileWrapper::from_reader(reader))
    }

    /// Run an upload
    ///
    /// # Errors
    ///
    /// - [`StorageError::UnknownPlatform`] before anything else happens
    /// - [`StorageError::UnsupportedOperation`] when ACL or metadata is
    ///   requested from a platform without that capability
    /// - [`StorageError::SourceUnavailable`] when the source cannot be read
    /// - [`StorageError::Thumbnail`] when thumbnail generation fails
    /// - [`StorageError::RemoteWriteFailure`] after the platform rolled back
    /// - [`StorageError::RecordFailure`] after the stored objects were deleted
    pub async fn upload(&self, pre: UploadPretreatment<'_>) -> StorageResult<FileInfo> {
        let platform = pre
            .platform
            .clone()
            .unwrap_or_else(|| self.default_platform.clone());
        let span = info_span!("upload", platform = %platform, path = %pre.path);

        async move {
            let mut state = StateTracker::new();
            let result = self.run_upload(&platform, pre, &mut state).await;
            match &result {
                Ok(info) => {
                    state.advance(UploadState::Succeeded);
                    info!(url = %info.url, size = info.size, "Upload succeeded");
                }
                Err(e) => {
                    state.advance(UploadState::Failed);
                    warn!(error = %e, "Upload failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_upload(
        &self,
        platform: &str,
        pre: UploadPretreatment<'_>,
        state: &mut StateTracker,
    ) -> StorageResult<FileInfo> {
        state.advance(UploadState::Pretreating);
        let storage = self.storage(platform)?;

        // Thumbnail settings only count when a thumbnail will be written
        let wants_thumbnail = pre.thumbnail.is_some();
        if !wants_thumbnail
            && (pre.th_acl.is_some()
                || !pre.th_metadata.is_empty()
                || !pre.th_user_metadata.is_empty())
        {
            debug!("Ignoring thumbnail ACL and metadata, no thumbnail requested");
        }

        let has_acl = pre.acl.is_some() || (wants_thumbnail && pre.th_acl.is_some());
        if has_acl && !storage.supports_acl() {
            return Err(StorageError::unsupported_operation(platform, "acl"));
        }
        let has_metadata = !pre.metadata.is_empty()
            || !pre.user_metadata.is_empty()
            || (wants_thumbnail
                && !(pre.th_metadata.is_empty() && pre.th_user_metadata.is_empty()));
        if has_metadata && !storage.supports_metadata() {
            return Err(StorageError::unsupported_operation(platform, "metadata"));
        }

        let mut wrapper = pre.wrapper;
        if let Some(name) = pre.name {
            wrapper = wrapper.with_name(name);
        }
        wrapper.prepare(&self.http).await?;

        let original_filename = pre
            .original_filename
            .unwrap_or_else(|| wrapper.name().to_string());
        let ext = extension_of(&original_filename);
        let filename = pre
            .save_filename
            .unwrap_or_else(|| generate_filename(&ext));

        let mut info = FileInfo::new(platform);
        info.size = wrapper.size().unwrap_or_default();
        info.filename = filename.clone();
        info.original_filename = original_filename;
        info.ext = ext;
        info.path = pre.path;
        info.content_type = pre
            .content_type
            .or_else(|| wrapper.content_type().map(str::to_string))
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        info.object_id = pre.object_id;
        info.object_type = pre.object_type;
        info.attr = pre.attr;
        info.metadata = pre.metadata;
        info.user_metadata = pre.user_metadata;
        info.file_acl = pre.acl;

        let mut th_data = None;
        if let Some(spec) = pre.thumbnail {
            let suffix = pre
                .thumbnail_suffix
                .unwrap_or_else(|| self.thumbnail_suffix.clone());
            let spec = spec.with_suffix(&suffix);
            let original = wrapper.bytes().await?;
            let thumbnail = self.generate_thumbnail(original, spec).await?;

            let stem = pre.save_th_filename.unwrap_or(filename);
            info.thumbnail = Some(ThumbnailInfo {
                url: String::new(),
                filename: format!("{}{}", stem, suffix),
                size: thumbnail.len() as u64,
                content_type: thumbnail_content_type(&suffix),
                metadata: pre.th_metadata,
                user_metadata: pre.th_user_metadata,
                file_acl: pre.th_acl,
            });
            th_data = Some(thumbnail);
        }

        state.advance(UploadState::Dispatching);
        let size = wrapper.size();
        let payload = SavePayload::new(wrapper.into_reader()?)
            .with_size(size)
            .with_thumbnail(th_data)
            .with_progress(pre.progress);

        if !storage.save(&mut info, payload).await? {
            return Err(StorageError::remote_write(
                platform,
                &info.filename,
                anyhow::anyhow!("platform refused the write"),
            ));
        }

        match self.recorder.save(&mut info).await {
            Ok(true) => Ok(info),
            Ok(false) => {
                self.discard(storage.as_ref(), &info).await;
                Err(StorageError::RecordFailure(anyhow::anyhow!(
                    "recorder refused {}",
                    info.url
                )))
            }
            Err(e) => {
                self.discard(storage.as_ref(), &info).await;
                Err(StorageError::RecordFailure(e))
            }
        }
    }

    async fn generate_thumbnail(&self, original: Bytes, spec: ThumbnailSpec) -> StorageResult<Bytes> {
        let generator = self.thumbnails.clone();
        let thumbnail = tokio::task::spawn_blocking(move || generator.generate(&original, &spec))
            .await
            .map_err(|e| StorageError::other(anyhow::Error::new(e)))??;
        Ok(Bytes::from(thumbnail.data))
    }

    /// Best-effort removal of a stored upload that could not be recorded
    async fn discard(&self, storage: &dyn FileStorage, info: &FileInfo) {
        if let Err(e) = storage.delete(info).await {
            warn!(key = %info.file_key(), error = %e, "Failed to remove unrecorded upload");
        }
    }

    /// Delete a record's objects (thumbnail first) and forget the record
    pub async fn delete(&self, info: &FileInfo) -> StorageResult<bool> {
        let storage = self.storage(&info.platform)?;
        let deleted = storage.delete(info).await?;
        if !info.url.is_empty() {
            self.recorder
                .delete(&info.url)
                .await
                .map_err(StorageError::RecordFailure)?;
        }
        Ok(deleted)
    }

    /// Delete by URL; `Ok(false)` if the recorder does not know the URL
    pub async fn delete_by_url(&self, url: &str) -> StorageResult<bool> {
        match self.get_file_info_by_url(url).await? {
            Some(info) => self.delete(&info).await,
            None => Ok(false),
        }
    }

    pub async fn exists(&self, info: &FileInfo) -> StorageResult<bool> {
        self.storage(&info.platform)?.exists(info).await
    }

    pub async fn exists_by_url(&self, url: &str) -> StorageResult<bool> {
        match self.get_file_info_by_url(url).await? {
            Some(info) => self.exists(&info).await,
            None => Ok(false),
        }
    }

    pub async fn get_file_info_by_url(&self, url: &str) -> StorageResult<Option<FileInfo>> {
        self.recorder
            .get_by_url(url)
            .await
            .map_err(StorageError::RecordFailure)
    }

    /// Download the main object
    pub fn download<'a>(&self, info: &'a FileInfo) -> StorageResult<Downloader<'a>> {
        let storage = self.storage(&info.platform)?;
        Ok(Downloader::new(storage, info, DownloadTarget::Main))
    }

    /// Download the thumbnail
    ///
    /// # Errors
    ///
    /// [`StorageError::ThumbnailNotFound`] if the record has no thumbnail.
    pub fn download_th<'a>(&self, info: &'a FileInfo) -> StorageResult<Downloader<'a>> {
        let storage = self.storage(&info.platform)?;
        require_thumbnail(info)?;
        Ok(Downloader::new(storage, info, DownloadTarget::Thumbnail))
    }

    /// Change the main object's ACL; `Ok(false)` if unsupported or unresolved
    pub async fn set_file_acl(
        &self,
        info: &FileInfo,
        acl: impl Into<AclValue>,
    ) -> StorageResult<bool> {
        let storage = self.storage(&info.platform)?;
        if !storage.supports_acl() {
            return Ok(false);
        }
        storage.set_file_acl(info, &acl.into()).await
    }

    pub async fn set_th_file_acl(
        &self,
        info: &FileInfo,
        acl: impl Into<AclValue>,
    ) -> StorageResult<bool> {
        let storage = self.storage(&info.platform)?;
        require_thumbnail(info)?;
        if !storage.supports_acl() {
            return Ok(false);
        }
        storage.set_th_file_acl(info, &acl.into()).await
    }

    /// Time-bounded URL for the main object
    ///
    /// # Errors
    ///
    /// [`StorageError::UnsupportedOperation`] if the platform cannot presign.
    pub async fn generate_presigned_url(
        &self,
        info: &FileInfo,
        expiration: DateTime<Utc>,
    ) -> StorageResult<String> {
        let storage = self.storage(&info.platform)?;
        if !storage.supports_presigned_url() {
            return Err(StorageError::unsupported_operation(&info.platform, "presigned_url"));
        }
        storage
            .generate_presigned_url(info, expiration)
            .await?
            .ok_or_else(|| StorageError::unsupported_operation(&info.platform, "presigned_url"))
    }

    pub async fn generate_th_presigned_url(
        &self,
        info: &FileInfo,
        expiration: DateTime<Utc>,
    ) -> StorageResult<String> {
        let storage = self.storage(&info.platform)?;
        require_thumbnail(info)?;
        if !storage.supports_presigned_url() {
            return Err(StorageError::unsupported_operation(&info.platform, "presigned_url"));
        }
        storage
            .generate_th_presigned_url(info, expiration)
            .await?
            .ok_or_else(|| StorageError::unsupported_operation(&info.platform, "presigned_url"))
    }

    pub fn is_support_acl(&self, platform: &str) -> StorageResult<bool> {
        Ok(self.storage(platform)?.supports_acl())
    }

    pub fn is_support_presigned_url(&self, platform: &str) -> StorageResult<bool> {
        Ok(self.storage(platform)?.supports_presigned_url())
    }

    pub fn is_support_metadata(&self, platform: &str) -> StorageResult<bool> {
        Ok(self.storage(platform)?.supports_metadata())
    }

    /// Adapter for `platform`, or for the default platform when `None`
    pub fn get_file_storage(&self, platform: Option<&str>) -> StorageResult<Arc<dyn FileStorage>> {
        self.storage(platform.unwrap_or(&self.default_platform))
    }

    /// Register an adapter at runtime, returning the one it replaced
    pub fn add_platform(&self, storage: Arc<dyn FileStorage>) -> Option<Arc<dyn FileStorage>> {
        self.registry.register(storage)
    }

    pub fn remove_platform(&self, platform: &str) -> Option<Arc<dyn FileStorage>> {
        self.registry.remove(platform)
    }

    /// Registered platform identifiers, sorted
    pub fn platforms(&self) -> Vec<String> {
        self.registry.platforms()
    }

    pub fn default_platform(&self) -> &str {
        &self.default_platform
    }

    pub fn thumbnail_suffix(&self) -> &str {
        &self.thumbnail_suffix
    }

    /// Close every platform client; the service holds no platforms afterwards
    pub async fn close(&self) {
        self.registry.close_all().await;
    }

    fn storage(&self, platform: &str) -> StorageResult<Arc<dyn FileStorage>> {
        self.registry
            .get(platform)
            .ok_or_else(|| StorageError::unknown_platform(platform))
    }
}

impl fmt::Debug for FileStorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorageService")
            .field("platforms", &self.registry.platforms())
            .field("default_platform", &self.default_platform)
            .field("recorder", &self.recorder)
            .field("thumbnail_suffix", &self.thumbnail_suffix)
            .finish_non_exhaustive()
    }
}

fn require_thumbnail(info: &FileInfo) -> StorageResult<()> {
    if info.has_thumbnail() {
        Ok(())
    } else {
        Err(StorageError::thumbnail_not_found(info.file_key()))
    }
}

/// Extension without the dot, empty when there is none
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_string()
}

/// 32 hex characters, plus `.ext` when the original had an extension
fn generate_filename(ext: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    if ext.is_empty() {
        id
    } else {
        format!("{}.{}", id, ext)
    }
}

fn thumbnail_content_type(suffix: &str) -> String {
    filebridge_media::ThumbnailFormat::from_suffix(suffix)
        .content_type()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("photo.PNG"), "PNG");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(""), "");
        assert_eq!(extension_of(".hidden"), "");
    }

    #[test]
    fn test_generate_filename() {
        let name = generate_filename("txt");
        assert_eq!(name.len(), 32 + 4);
        assert!(name.ends_with(".txt"));
        assert!(name[..32].chars().all(|c| c.is_ascii_hexdigit()));

        let bare = generate_filename("");
        assert_eq!(bare.len(), 32);
        assert_ne!(generate_filename("txt"), generate_filename("txt"));
    }

    #[test]
    fn test_thumbnail_content_type() {
        assert_eq!(thumbnail_content_type(".min.jpg"), "image/jpeg");
        assert_eq!(thumbnail_content_type(".th.png"), "image/png");
    }

    #[test]
    fn test_upload_state_labels() {
        assert_eq!(UploadState::Pretreating.to_string(), "PRETREATING");
        assert!(UploadState::Failed.is_terminal());
        assert!(!UploadState::Dispatching.is_terminal());
    }

    #[test]
    fn test_builder_defaults() {
        let service = FileStorageService::builder().build();
        assert_eq!(service.default_platform(), DEFAULT_PLATFORM);
        assert_eq!(service.thumbnail_suffix(), ".min.jpg");
        assert!(service.platforms().is_empty());
        assert!(service.get_file_storage(None).unwrap_err().is_unknown_platform());
    }
}

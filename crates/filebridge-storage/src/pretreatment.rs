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

//! Upload pretreatment
//!
//! [`UploadPretreatment`] collects everything about one upload before any
//! I/O happens: target platform and path, naming, object linkage, attributes,
//! metadata, ACLs, thumbnail policy and progress listener. It is obtained
//! from [`FileStorageService::of`] and consumed by [`upload`](UploadPretreatment::upload).
//!
//! ```rust,no_run
//! # use filebridge_storage::FileStorageService;
//! # async fn example(service: &FileStorageService) -> filebridge_storage::StorageResult<()> {
//! let info = service
//!     .of_path("./photo.png")
//!     .path("avatars/")
//!     .object_id("42")
//!     .object_type("user")
//!     .put_attr("role", "admin")
//!     .acl("public-read")
//!     .thumbnail_size(120, 120)
//!     .upload()
//!     .await?;
//! println!("stored at {}", info.url);
//! # Ok(())
//! # }
//! ```

use crate::acl::AclValue;
use crate::error::StorageResult;
use crate::file_info::FileInfo;
use crate::progress::{ProgressListener, SharedProgressListener};
use crate::service::FileStorageService;
use crate::wrapper::FileWrapper;
use filebridge_media::ThumbnailSpec;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builder for one upload
#[must_use = "an upload does nothing until `upload()` is awaited"]
pub struct UploadPretreatment<'a> {
    pub(crate) service: &'a FileStorageService,
    pub(crate) wrapper: FileWrapper,
    pub(crate) platform: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) original_filename: Option<String>,
    pub(crate) path: String,
    pub(crate) save_filename: Option<String>,
    pub(crate) save_th_filename: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) object_id: Option<String>,
    pub(crate) object_type: Option<String>,
    pub(crate) attr: BTreeMap<String, Value>,
    pub(crate) metadata: BTreeMap<String, String>,
    pub(crate) user_metadata: BTreeMap<String, String>,
    pub(crate) th_metadata: BTreeMap<String, String>,
    pub(crate) th_user_metadata: BTreeMap<String, String>,
    pub(crate) acl: Option<AclValue>,
    pub(crate) th_acl: Option<AclValue>,
    pub(crate) thumbnail: Option<ThumbnailSpec>,
    pub(crate) thumbnail_suffix: Option<String>,
    pub(crate) progress: Option<SharedProgressListener>,
}

impl<'a> UploadPretreatment<'a> {
    pub(crate) fn new(service: &'a FileStorageService, wrapper: FileWrapper) -> Self {
        UploadPretreatment {
            service,
            wrapper,
            platform: None,
            name: None,
            original_filename: None,
            path: String::new(),
            save_filename: None,
            save_th_filename: None,
            content_type: None,
            object_id: None,
            object_type: None,
            attr: BTreeMap::new(),
            metadata: BTreeMap::new(),
            user_metadata: BTreeMap::new(),
            th_metadata: BTreeMap::new(),
            th_user_metadata: BTreeMap::new(),
            acl: None,
            th_acl: None,
            thumbnail: None,
            thumbnail_suffix: None,
            progress: None,
        }
    }

    /// Store on this platform instead of the service default
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Name of the source, used for type sniffing and as original filename
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn original_filename(mut self, original_filename: impl Into<String>) -> Self {
        self.original_filename = Some(original_filename.into());
        self
    }

    /// Key segment between the platform base path and the filename,
    /// e.g. `avatars/`
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Stored filename; a unique name is generated when unset
    pub fn save_filename(mut self, filename: impl Into<String>) -> Self {
        self.save_filename = Some(filename.into());
        self
    }

    /// Stem of the thumbnail filename (the suffix is still appended)
    pub fn save_th_filename(mut self, filename: impl Into<String>) -> Self {
        self.save_th_filename = Some(filename.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    /// Attach a free-form attribute to the record (never sent to the platform)
    pub fn put_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attr.insert(key.into(), value.into());
        self
    }

    pub fn put_attr_all<I, K, V>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.attr
            .extend(attrs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Platform-native metadata such as `Cache-Control`
    pub fn put_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn put_user_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_metadata.insert(key.into(), value.into());
        self
    }

    pub fn put_th_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.th_metadata.insert(key.into(), value.into());
        self
    }

    pub fn put_th_user_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.th_user_metadata.insert(key.into(), value.into());
        self
    }

    /// ACL of the main object
    pub fn acl(mut self, acl: impl Into<AclValue>) -> Self {
        self.acl = Some(acl.into());
        self
    }

    /// ACL of the thumbnail, resolved independently of the main object's
    pub fn th_acl(mut self, acl: impl Into<AclValue>) -> Self {
        self.th_acl = Some(acl.into());
        self
    }

    /// Generate a thumbnail with the default 200x200 box
    pub fn thumbnail(mut self) -> Self {
        self.thumbnail = Some(ThumbnailSpec::default());
        self
    }

    /// Generate a thumbnail fitting inside `width` x `height`
    pub fn thumbnail_size(mut self, width: u32, height: u32) -> Self {
        self.thumbnail = Some(ThumbnailSpec::new(width, height));
        self
    }

    /// Thumbnail filename suffix; its extension picks the encoding
    pub fn thumbnail_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.thumbnail_suffix = Some(suffix.into());
        self
    }

    /// Observe the main object transfer
    pub fn progress_listener<L>(mut self, listener: L) -> Self
    where
        L: ProgressListener + 'static,
    {
        self.progress = Some(Arc::new(listener));
        self
    }

    /// Observe the main object transfer with an already shared listener
    pub fn shared_progress_listener(mut self, listener: SharedProgressListener) -> Self {
        self.progress = Some(listener);
        self
    }

    /// Run the pipeline: normalize the source, generate the thumbnail,
    /// dispatch to the platform and record the result
    pub async fn upload(self) -> StorageResult<FileInfo> {
        let service = self.service;
        service.upload(self).await
    }
}

impl fmt::Debug for UploadPretreatment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadPretreatment")
            .field("wrapper", &self.wrapper)
            .field("platform", &self.platform)
            .field("path", &self.path)
            .field("save_filename", &self.save_filename)
            .field("object_id", &self.object_id)
            .field("object_type", &self.object_type)
            .field("acl", &self.acl)
            .field("th_acl", &self.th_acl)
            .field("thumbnail", &self.thumbnail)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

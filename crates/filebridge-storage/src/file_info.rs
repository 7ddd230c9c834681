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

//! The canonical record of a stored object

use crate::acl::AclValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Build the key shared by every platform: `base_path + path + filename`
pub fn canonical_key(base_path: &str, path: &str, filename: &str) -> String {
    let mut key = String::with_capacity(base_path.len() + path.len() + filename.len());
    key.push_str(base_path);
    key.push_str(path);
    key.push_str(filename);
    key
}

/// Thumbnail half of a [`FileInfo`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThumbnailInfo {
    /// Addressable URL, filled in by the platform on save
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    pub metadata: BTreeMap<String, String>,
    pub user_metadata: BTreeMap<String, String>,
    pub file_acl: Option<AclValue>,
}

/// Canonical record of a stored object
///
/// Built by the upload pipeline before any I/O, completed by the platform
/// during `save` (`url`, `size`, thumbnail URL) and treated as immutable
/// afterwards. `platform` decides which adapter serves every later
/// delete/exists/download call for this record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileInfo {
    /// Identifier assigned by a recorder, if any
    pub id: Option<String>,
    /// Addressable URL; non-empty once saved
    pub url: String,
    pub size: u64,
    pub filename: String,
    pub original_filename: String,
    pub base_path: String,
    pub path: String,
    /// Extension without the dot; empty if the original had none
    pub ext: String,
    pub content_type: String,
    pub platform: String,
    pub object_id: Option<String>,
    pub object_type: Option<String>,
    /// Platform-native metadata (standard headers such as `Cache-Control`)
    pub metadata: BTreeMap<String, String>,
    pub user_metadata: BTreeMap<String, String>,
    /// Free-form caller attributes, never sent to the platform
    pub attr: BTreeMap<String, Value>,
    pub file_acl: Option<AclValue>,
    pub create_time: DateTime<Utc>,
    pub thumbnail: Option<ThumbnailInfo>,
}

impl FileInfo {
    /// Empty record bound to `platform`, stamped with the current time
    pub fn new(platform: impl Into<String>) -> Self {
        FileInfo {
            platform: platform.into(),
            create_time: Utc::now(),
            ..Default::default()
        }
    }

    /// Key of the main object
    pub fn file_key(&self) -> String {
        canonical_key(&self.base_path, &self.path, &self.filename)
    }

    /// Key of the thumbnail object, if there is one
    pub fn th_file_key(&self) -> Option<String> {
        self.th_filename()
            .map(|th| canonical_key(&self.base_path, &self.path, th))
    }

    /// Whether the record was completed by a successful save
    pub fn is_stored(&self) -> bool {
        !self.url.is_empty()
    }

    pub fn has_thumbnail(&self) -> bool {
        self.th_filename().is_some()
    }

    pub fn th_filename(&self) -> Option<&str> {
        self.thumbnail
            .as_ref()
            .map(|th| th.filename.as_str())
            .filter(|name| !name.is_empty())
    }

    pub fn th_url(&self) -> Option<&str> {
        self.thumbnail
            .as_ref()
            .map(|th| th.url.as_str())
            .filter(|url| !url.is_empty())
    }

    pub fn th_size(&self) -> Option<u64> {
        self.thumbnail.as_ref().map(|th| th.size)
    }

    pub fn th_content_type(&self) -> Option<&str> {
        self.thumbnail.as_ref().map(|th| th.content_type.as_str())
    }

    pub fn th_file_acl(&self) -> Option<&AclValue> {
        self.thumbnail.as_ref().and_then(|th| th.file_acl.as_ref())
    }
}

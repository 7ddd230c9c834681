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

//! Persistence seam for upload records
//!
//! The service hands every successfully stored [`FileInfo`] to a
//! [`FileRecorder`] and consults it for the `*_by_url` operations. The
//! storage layer never persists records itself.

use crate::file_info::FileInfo;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use tokio::sync::RwLock;

/// Caller-supplied record store
#[async_trait]
pub trait FileRecorder: Send + Sync + Debug {
    /// Persist a stored record; may assign `info.id`
    async fn save(&self, info: &mut FileInfo) -> anyhow::Result<bool>;

    async fn get_by_url(&self, url: &str) -> anyhow::Result<Option<FileInfo>>;

    /// Forget the record for `url`; `Ok(false)` if there was none
    async fn delete(&self, url: &str) -> anyhow::Result<bool>;
}

/// Recorder that keeps nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

#[async_trait]
impl FileRecorder for NoopRecorder {
    async fn save(&self, _info: &mut FileInfo) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn get_by_url(&self, _url: &str) -> anyhow::Result<Option<FileInfo>> {
        Ok(None)
    }

    async fn delete(&self, _url: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}

/// In-memory recorder keyed by URL
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    records: RwLock<HashMap<String, FileInfo>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl FileRecorder for MemoryRecorder {
    async fn save(&self, info: &mut FileInfo) -> anyhow::Result<bool> {
        if info.url.is_empty() {
            anyhow::bail!("cannot record {} before it is stored", info.filename);
        }
        if info.id.is_none() {
            info.id = Some(uuid::Uuid::new_v4().simple().to_string());
        }
        self.records
            .write()
            .await
            .insert(info.url.clone(), info.clone());
        Ok(true)
    }

    async fn get_by_url(&self, url: &str) -> anyhow::Result<Option<FileInfo>> {
        Ok(self.records.read().await.get(url).cloned())
    }

    async fn delete(&self, url: &str) -> anyhow::Result<bool> {
        Ok(self.records.write().await.remove(url).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_recorder_round_trip() {
        let recorder = MemoryRecorder::new();
        let mut info = FileInfo::new("memory-1");
        info.url = "memory://a.txt".to_string();

        assert!(recorder.save(&mut info).await.unwrap());
        assert!(info.id.is_some());
        assert_eq!(recorder.get_by_url("memory://a.txt").await.unwrap(), Some(info));

        assert!(recorder.delete("memory://a.txt").await.unwrap());
        assert!(!recorder.delete("memory://a.txt").await.unwrap());
        assert!(recorder.is_empty().await);
    }

    #[tokio::test]
    async fn test_unsaved_record_rejected() {
        let recorder = MemoryRecorder::new();
        let mut info = FileInfo::new("memory-1");
        assert!(recorder.save(&mut info).await.is_err());
    }

    #[tokio::test]
    async fn test_noop_recorder() {
        let recorder = NoopRecorder;
        let mut info = FileInfo::new("memory-1");
        assert!(recorder.save(&mut info).await.unwrap());
        assert!(recorder.get_by_url("x").await.unwrap().is_none());
    }
}

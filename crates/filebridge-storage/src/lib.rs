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

//! Unified file storage for Filebridge
//!
//! One asynchronous API for storing uploads on any number of platforms:
//! - Local filesystem ([`local::LocalPlatform`])
//! - AWS S3 and S3-compatible services ([`s3::S3Platform`])
//! - In-memory ([`mock::MemoryPlatform`]), mainly for tests
//!
//! # Architecture
//!
//! - [`FileWrapper`] normalizes a source (bytes, path, URL, reader) into a
//!   single-pass byte stream with size, content type and original name.
//! - [`UploadPretreatment`] collects the upload parameters.
//! - [`FileStorageService`] resolves the platform, generates the thumbnail,
//!   dispatches to the [`FileStorage`] adapter and records the result.
//! - Adapters write the main object then the thumbnail, and delete whatever
//!   they already wrote if either write fails.
//!
//! Every object lives at `base_path + path + filename`, on every platform.
//!
//! # Examples
//!
//! ```no_run
//! use filebridge_storage::{FileStorageService, mock::MemoryPlatform};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> filebridge_storage::StorageResult<()> {
//!     let service = FileStorageService::builder()
//!         .platform(Arc::new(MemoryPlatform::new("memory-1")))
//!         .default_platform("memory-1")
//!         .build();
//!
//!     let info = service
//!         .of_bytes(b"hello".to_vec())
//!         .name("hello.txt")
//!         .path("greetings/")
//!         .upload()
//!         .await?;
//!
//!     let data = service.download(&info)?.bytes().await?;
//!     assert_eq!(&data[..], b"hello");
//!
//!     service.delete(&info).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult`]; the [`StorageError`] variants map
//! one-to-one onto the failure kinds callers need to tell apart
//! (unreadable source, unknown platform, rejected ACL, failed remote write,
//! missing thumbnail, unsupported capability).

pub mod acl;
pub mod download;
pub mod error;
pub mod factory;
pub mod file_info;
pub mod local;
pub mod mock;
pub mod platform;
pub mod pretreatment;
pub mod progress;
pub mod recorder;
pub mod registry;
pub mod s3;
pub mod service;
pub mod wrapper;

pub use acl::{AclGrant, AclPermission, AclResolver, AclValue, PredefinedAcl, ResolvedAcl};
pub use download::{DownloadTarget, Downloader};
pub use error::{StorageError, StorageResult};
pub use factory::{build_service, init_logging};
pub use file_info::{canonical_key, FileInfo, ThumbnailInfo};
pub use local::LocalPlatform;
pub use platform::{FileStorage, SavePayload, WrittenKeys};
pub use pretreatment::UploadPretreatment;
pub use progress::{ProgressListener, ProgressReader, ProgressWriter, SharedProgressListener};
pub use recorder::{FileRecorder, MemoryRecorder, NoopRecorder};
pub use registry::PlatformRegistry;
pub use s3::S3Platform;
pub use service::{FileStorageService, FileStorageServiceBuilder, UploadState};
pub use wrapper::{BoxedReader, FileWrapper};

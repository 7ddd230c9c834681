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

//! Storage error types and utilities
//!
//! Every failure surfaced by the upload pipeline, the service façade or a
//! platform adapter is one of the [`StorageError`] kinds below. Adapters use
//! `anyhow` internally to attach key and platform context, and convert at
//! the trait boundary.

use filebridge_media::MediaError;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The input stream, file or URL could not be read
    ///
    /// Raised before any remote write, so nothing needs rolling back.
    #[error("source unavailable: {location}")]
    SourceUnavailable {
        /// Path, URL or description of the source
        location: String,
        /// Underlying cause
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// An ACL value the resolver cannot interpret
    #[error("unsupported ACL value: {0}")]
    UnsupportedAclValue(String),

    /// No adapter is registered under the requested identifier
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    /// The backend failed while writing during `save`
    ///
    /// Partial writes have already been rolled back (best effort) when this
    /// error reaches the caller.
    #[error("upload failed: platform {platform}, filename {filename}")]
    RemoteWriteFailure {
        /// Platform identifier
        platform: String,
        /// Original filename of the upload
        filename: String,
        /// Underlying cause
        #[source]
        source: anyhow::Error,
    },

    /// A thumbnail operation was requested on a record without a thumbnail
    #[error("thumbnail not found: {0}")]
    ThumbnailNotFound(String),

    /// A capability-gated operation is not supported by the platform
    #[error("platform {platform} does not support {operation}")]
    UnsupportedOperation {
        /// Platform identifier
        platform: String,
        /// Operation name
        operation: &'static str,
    },

    /// The backend failed while reading an object
    #[error("download failed: platform {platform}, key {key}")]
    RemoteReadFailure {
        /// Platform identifier
        platform: String,
        /// Object key
        key: String,
        /// Underlying cause
        #[source]
        source: anyhow::Error,
    },

    /// The external file recorder rejected the record
    #[error("failed to record file info")]
    RecordFailure(#[source] anyhow::Error),

    /// Thumbnail generation failed
    #[error("thumbnail generation failed: {0}")]
    Thumbnail(#[from] MediaError),

    /// Invalid key format (empty, absolute, escaping the root, ...)
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid argument passed to an operation
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transparent error delegation for wrapped error types
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Create a SourceUnavailable error
    pub fn source_unavailable<S, E>(location: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        StorageError::SourceUnavailable {
            location: location.into(),
            source: source.into(),
        }
    }

    /// Create an UnsupportedAclValue error
    pub fn unsupported_acl<S: Into<String>>(value: S) -> Self {
        StorageError::UnsupportedAclValue(value.into())
    }

    /// Create an UnknownPlatform error
    pub fn unknown_platform<S: Into<String>>(platform: S) -> Self {
        StorageError::UnknownPlatform(platform.into())
    }

    /// Create a RemoteWriteFailure error
    pub fn remote_write<P, F, E>(platform: P, filename: F, source: E) -> Self
    where
        P: Into<String>,
        F: Into<String>,
        E: Into<anyhow::Error>,
    {
        StorageError::RemoteWriteFailure {
            platform: platform.into(),
            filename: filename.into(),
            source: source.into(),
        }
    }

    /// Create a RemoteReadFailure error
    pub fn remote_read<P, K, E>(platform: P, key: K, source: E) -> Self
    where
        P: Into<String>,
        K: Into<String>,
        E: Into<anyhow::Error>,
    {
        StorageError::RemoteReadFailure {
            platform: platform.into(),
            key: key.into(),
            source: source.into(),
        }
    }

    /// Create a ThumbnailNotFound error
    pub fn thumbnail_not_found<S: Into<String>>(context: S) -> Self {
        StorageError::ThumbnailNotFound(context.into())
    }

    /// Create an UnsupportedOperation error
    pub fn unsupported_operation<S: Into<String>>(platform: S, operation: &'static str) -> Self {
        StorageError::UnsupportedOperation {
            platform: platform.into(),
            operation,
        }
    }

    /// Create an InvalidKey error with context
    pub fn invalid_key<S: Into<String>>(msg: S) -> Self {
        StorageError::InvalidKey(msg.into())
    }

    /// Create an InvalidArgument error with context
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        StorageError::InvalidArgument(msg.into())
    }

    /// Create a generic error from any error type that can convert to anyhow::Error
    pub fn other<E: Into<anyhow::Error>>(error: E) -> Self {
        StorageError::Other(error.into())
    }

    /// Check if this is a SourceUnavailable error
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, StorageError::SourceUnavailable { .. })
    }

    /// Check if this is an UnsupportedAclValue error
    pub fn is_unsupported_acl_value(&self) -> bool {
        matches!(self, StorageError::UnsupportedAclValue(_))
    }

    /// Check if this is an UnknownPlatform error
    pub fn is_unknown_platform(&self) -> bool {
        matches!(self, StorageError::UnknownPlatform(_))
    }

    /// Check if this is a RemoteWriteFailure error
    pub fn is_remote_write_failure(&self) -> bool {
        matches!(self, StorageError::RemoteWriteFailure { .. })
    }

    /// Check if this is a ThumbnailNotFound error
    pub fn is_thumbnail_not_found(&self) -> bool {
        matches!(self, StorageError::ThumbnailNotFound(_))
    }

    /// Check if this is an UnsupportedOperation error
    pub fn is_unsupported_operation(&self) -> bool {
        matches!(self, StorageError::UnsupportedOperation { .. })
    }

    /// Check if this is an InvalidKey error
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, StorageError::InvalidKey(_))
    }
}

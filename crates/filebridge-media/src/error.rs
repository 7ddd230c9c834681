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

//! Error types for media processing operations

use thiserror::Error;

/// Media processing errors
#[derive(Debug, Error)]
pub enum MediaError {
    /// The payload could not be decoded as an image
    #[error("Image decoding error: {0}")]
    DecodeError(String),

    /// The thumbnail could not be encoded in the requested format
    #[error("Image encoding error: {0}")]
    EncodeError(String),

    /// Unsupported output format
    #[error("Unsupported media format: {0}")]
    UnsupportedFormat(String),

    /// Requested dimensions are unusable (zero width or height)
    #[error("Invalid thumbnail dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },
}

/// Result type for media operations
pub type Result<T> = std::result::Result<T, MediaError>;

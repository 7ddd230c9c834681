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

//! Media helpers for the filebridge upload pipeline
//!
//! This crate provides:
//! - Thumbnail generation that preserves aspect ratio
//! - Content-type detection from magic bytes and file extensions

pub mod error;
pub mod sniff;
pub mod thumbnail;

pub use error::{MediaError, Result};
pub use sniff::{detect_content_type, OCTET_STREAM, SNIFF_LEN};
pub use thumbnail::{Thumbnail, ThumbnailFormat, ThumbnailGenerator, ThumbnailSpec};

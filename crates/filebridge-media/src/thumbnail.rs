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

//! Thumbnail generation
//!
//! Decodes an uploaded image (format guessed from magic bytes), scales it to
//! fit inside the requested box while keeping the aspect ratio, and encodes
//! the result in the format implied by the thumbnail filename suffix.
//!
//! # Examples
//!
//! ```rust,no_run
//! use filebridge_media::{ThumbnailGenerator, ThumbnailSpec};
//!
//! # fn example(original: &[u8]) -> filebridge_media::Result<()> {
//! let generator = ThumbnailGenerator::new();
//! let spec = ThumbnailSpec::new(200, 200).with_suffix(".min.jpg");
//! let thumb = generator.generate(original, &spec)?;
//! assert_eq!(thumb.content_type, "image/jpeg");
//! # Ok(())
//! # }
//! ```

use crate::error::{MediaError, Result};
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, instrument};

/// Default bounding box for thumbnails
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 200;

/// Output formats a thumbnail can be encoded to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ThumbnailFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detect format from a thumbnail suffix such as `.min.jpg`
    ///
    /// Falls back to JPEG when the suffix carries no recognised extension.
    pub fn from_suffix(suffix: &str) -> Self {
        Path::new(suffix)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .unwrap_or(Self::Jpeg)
    }

    /// Convert to image crate format
    pub fn to_image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
            Self::WebP => ImageFormat::WebP,
        }
    }

    /// MIME type of the encoded thumbnail
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

/// Size and format policy for one thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailSpec {
    /// Maximum width in pixels
    pub width: u32,
    /// Maximum height in pixels
    pub height: u32,
    /// Output encoding
    pub format: ThumbnailFormat,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self::new(DEFAULT_THUMBNAIL_SIZE, DEFAULT_THUMBNAIL_SIZE)
    }
}

impl ThumbnailSpec {
    /// Create a JPEG spec fitting inside `width` x `height`
    pub fn new(width: u32, height: u32) -> Self {
        ThumbnailSpec {
            width,
            height,
            format: ThumbnailFormat::Jpeg,
        }
    }

    /// Derive the output format from a filename suffix
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.format = ThumbnailFormat::from_suffix(suffix);
        self
    }

    /// Set the output format explicitly
    pub fn with_format(mut self, format: ThumbnailFormat) -> Self {
        self.format = format;
        self
    }
}

/// An encoded thumbnail
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// Encoded image bytes
    pub data: Vec<u8>,
    /// MIME type matching `data`
    pub content_type: &'static str,
    /// Final width in pixels
    pub width: u32,
    /// Final height in pixels
    pub height: u32,
}

/// Stateless thumbnail generator
#[derive(Debug, Clone, Default)]
pub struct ThumbnailGenerator;

impl ThumbnailGenerator {
    /// Create a new generator
    pub fn new() -> Self {
        ThumbnailGenerator
    }

    /// Produce a thumbnail for `data` according to `spec`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `spec` has a zero dimension
    /// - `data` is not a decodable image
    /// - encoding in the requested format fails
    #[instrument(skip(self, data), fields(size = data.len(), width = spec.width, height = spec.height))]
    pub fn generate(&self, data: &[u8], spec: &ThumbnailSpec) -> Result<Thumbnail> {
        if spec.width == 0 || spec.height == 0 {
            return Err(MediaError::InvalidDimensions {
                width: spec.width,
                height: spec.height,
            });
        }

        let image = Self::decode(data)?;
        let scaled = image.thumbnail(spec.width, spec.height);
        let (width, height) = (scaled.width(), scaled.height());

        let data = Self::encode(scaled, spec.format)?;
        debug!(
            "Generated {:?} thumbnail {}x{} ({} bytes)",
            spec.format,
            width,
            height,
            data.len()
        );

        Ok(Thumbnail {
            data,
            content_type: spec.format.content_type(),
            width,
            height,
        })
    }

    fn decode(data: &[u8]) -> Result<DynamicImage> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| MediaError::DecodeError(format!("Failed to read image: {e}")))?;

        if reader.format().is_none() {
            return Err(MediaError::DecodeError(
                "Unrecognised image format".to_string(),
            ));
        }

        reader
            .decode()
            .map_err(|e| MediaError::DecodeError(format!("Failed to decode image: {e}")))
    }

    fn encode(image: DynamicImage, format: ThumbnailFormat) -> Result<Vec<u8>> {
        // JPEG has no alpha channel
        let image = match format {
            ThumbnailFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
            _ => image,
        };

        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), format.to_image_format())
            .map_err(|e| MediaError::EncodeError(format!("Failed to encode image: {e}")))?;
        Ok(buffer)
    }
}

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

//! Best-effort content-type detection
//!
//! Magic bytes win over the filename extension. Detection never fails: an
//! unrecognised payload is reported as `application/octet-stream`.

/// Fallback content type
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Number of leading bytes worth inspecting for magic numbers
pub const SNIFF_LEN: usize = 8192;

/// Detect the content type of a payload from its leading bytes and name
///
/// # Examples
///
/// ```
/// use filebridge_media::detect_content_type;
///
/// assert_eq!(detect_content_type(b"\x89PNG\r\n\x1a\n", None), "image/png");
/// assert_eq!(detect_content_type(b"hello", Some("notes.txt")), "text/plain");
/// assert_eq!(detect_content_type(b"", None), "application/octet-stream");
/// ```
pub fn detect_content_type(head: &[u8], filename: Option<&str>) -> String {
    if let Some(kind) = infer::get(head) {
        return kind.mime_type().to_string();
    }

    filename
        .and_then(|name| mime_guess::from_path(name).first())
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

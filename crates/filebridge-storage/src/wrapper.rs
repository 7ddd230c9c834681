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

//! Upload sources
//!
//! A [`FileWrapper`] is built from a byte buffer, a local path, a remote URL
//! or any async reader. Construction performs no I/O; [`FileWrapper::prepare`]
//! opens the source, settles its size (buffering sources of unknown length),
//! sniffs the content type and derives the original filename.
//!
//! Local files and URLs with a `Content-Length` are streamed rather than
//! buffered.

use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use filebridge_media::{detect_content_type, SNIFF_LEN};
use futures::TryStreamExt;
use std::fmt;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use tracing::debug;

/// Single-pass, type-erased byte source
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

enum Source {
    Bytes(Bytes),
    Path(PathBuf),
    Url(String),
    Reader(BoxedReader),
}

impl Source {
    fn kind(&self) -> &'static str {
        match self {
            Source::Bytes(_) => "bytes",
            Source::Path(_) => "path",
            Source::Url(_) => "url",
            Source::Reader(_) => "reader",
        }
    }
}

/// An upload source plus the attributes derived from it
pub struct FileWrapper {
    source: Source,
    name: Option<String>,
    content_type: Option<String>,
    size: Option<u64>,
    location: String,
    prepared: bool,
}

impl FileWrapper {
    fn with_source(source: Source, location: String) -> Self {
        FileWrapper {
            source,
            name: None,
            content_type: None,
            size: None,
            location,
            prepared: false,
        }
    }

    /// In-memory payload; size is known immediately
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mut wrapper = Self::with_source(Source::Bytes(Bytes::new()), "<bytes>".to_string());
        wrapper.size = Some(data.len() as u64);
        wrapper.source = Source::Bytes(data);
        wrapper
    }

    /// Local file; streamed directly, original filename from the path tail
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let location = path.display().to_string();
        let mut wrapper = Self::with_source(Source::Path(PathBuf::new()), location);
        wrapper.name = file_name_of(&path);
        wrapper.source = Source::Path(path);
        wrapper
    }

    /// Remote URL, fetched with an HTTP GET during [`prepare`](Self::prepare)
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::with_source(Source::Url(url.clone()), url)
    }

    /// Arbitrary reader; buffered during `prepare` unless a size is given
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::with_source(Source::Reader(Box::new(reader)), "<reader>".to_string())
    }

    /// Override the original filename
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the detected content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Declare the exact length of a reader source, so it can be streamed
    pub fn with_size(mut self, size: u64) -> Self {
        if matches!(self.source, Source::Reader(_)) {
            self.size = Some(size);
        }
        self
    }

    /// Original filename, empty when the source carries none
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Exact size, once known
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Content type, once known
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Open the source and settle size, content type and name
    ///
    /// Calling this more than once is a no-op.
    ///
    /// # Errors
    ///
    /// [`StorageError::SourceUnavailable`] if the file cannot be opened, the
    /// URL cannot be fetched or answers with an error status, or reading a
    /// reader source fails.
    pub async fn prepare(&mut self, http: &reqwest::Client) -> StorageResult<()> {
        if self.prepared {
            return Ok(());
        }

        let source = std::mem::replace(&mut self.source, Source::Bytes(Bytes::new()));
        debug!(kind = source.kind(), location = %self.location, "Preparing upload source");

        match source {
            Source::Bytes(data) => {
                self.sniff(&data);
                self.source = Source::Bytes(data);
            }
            Source::Path(path) => self.open_path(path).await?,
            Source::Url(url) => self.fetch_url(http, &url).await?,
            Source::Reader(reader) => match self.size {
                Some(_) => {
                    let reader = self.sniff_stream(reader).await?;
                    self.source = Source::Reader(reader);
                }
                None => {
                    let data = self.buffer(reader).await?;
                    self.sniff(&data);
                    self.size = Some(data.len() as u64);
                    self.source = Source::Bytes(data);
                }
            },
        }

        self.prepared = true;
        Ok(())
    }

    /// Full payload, buffering a streamed source once
    ///
    /// Used for thumbnail generation, which needs the whole image.
    pub async fn bytes(&mut self) -> StorageResult<Bytes> {
        if let Source::Bytes(data) = &self.source {
            return Ok(data.clone());
        }

        let source = std::mem::replace(&mut self.source, Source::Bytes(Bytes::new()));
        let data = match source {
            Source::Bytes(data) => data,
            Source::Reader(reader) => self.buffer(reader).await?,
            Source::Path(path) => fs::read(&path)
                .await
                .map(Bytes::from)
                .map_err(|e| StorageError::source_unavailable(path.display().to_string(), e))?,
            Source::Url(url) => {
                return Err(StorageError::invalid_argument(format!(
                    "source {} must be prepared before reading",
                    url
                )))
            }
        };

        self.source = Source::Bytes(data.clone());
        Ok(data)
    }

    /// Consume the wrapper, yielding its single-pass byte source
    pub fn into_reader(self) -> StorageResult<BoxedReader> {
        match self.source {
            Source::Bytes(data) => Ok(Box::new(Cursor::new(data))),
            Source::Reader(reader) => Ok(reader),
            Source::Path(_) | Source::Url(_) => Err(StorageError::invalid_argument(format!(
                "source {} must be prepared before reading",
                self.location
            ))),
        }
    }

    async fn open_path(&mut self, path: PathBuf) -> StorageResult<()> {
        let unavailable = |e: io::Error| StorageError::source_unavailable(path.display().to_string(), e);

        let metadata = fs::metadata(&path).await.map_err(unavailable)?;
        if !metadata.is_file() {
            return Err(unavailable(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        let file = fs::File::open(&path).await.map_err(unavailable)?;
        self.size = Some(metadata.len());
        let reader = self.sniff_stream(Box::new(file)).await?;
        self.source = Source::Reader(reader);
        Ok(())
    }

    async fn fetch_url(&mut self, http: &reqwest::Client, url: &str) -> StorageResult<()> {
        let unavailable = |e: reqwest::Error| StorageError::source_unavailable(url, e);

        let response = http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?;

        if self.name.is_none() {
            self.name = response
                .url()
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|tail| !tail.is_empty())
                .map(str::to_string);
        }

        if self.content_type.is_none() {
            self.content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(';').next())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && v != filebridge_media::OCTET_STREAM);
        }

        match response.content_length() {
            Some(length) => {
                debug!(url, length, "Streaming remote source");
                self.size = Some(length);
                let body = Box::pin(response.bytes_stream().map_err(io::Error::other));
                let reader = self.sniff_stream(Box::new(StreamReader::new(body))).await?;
                self.source = Source::Reader(reader);
            }
            None => {
                let data = response.bytes().await.map_err(unavailable)?;
                debug!(url, length = data.len(), "Buffered remote source of unknown length");
                self.sniff(&data);
                self.size = Some(data.len() as u64);
                self.source = Source::Bytes(data);
            }
        }

        Ok(())
    }

    async fn buffer(&self, mut reader: BoxedReader) -> StorageResult<Bytes> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .await
            .map_err(|e| StorageError::source_unavailable(self.location.clone(), e))?;
        Ok(Bytes::from(data))
    }

    /// Peek at the head of a stream for type detection, then put it back
    async fn sniff_stream(&mut self, mut reader: BoxedReader) -> StorageResult<BoxedReader> {
        if self.content_type.is_some() {
            return Ok(reader);
        }

        let mut head = Vec::with_capacity(SNIFF_LEN);
        (&mut reader)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .await
            .map_err(|e| StorageError::source_unavailable(self.location.clone(), e))?;

        self.sniff(&head);
        Ok(Box::new(Cursor::new(head).chain(reader)))
    }

    fn sniff(&mut self, head: &[u8]) {
        if self.content_type.is_none() {
            let head = &head[..head.len().min(SNIFF_LEN)];
            self.content_type = Some(detect_content_type(head, self.name.as_deref()));
        }
    }
}

impl fmt::Debug for FileWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWrapper")
            .field("source", &self.source.kind())
            .field("location", &self.location)
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .field("prepared", &self.prepared)
            .finish()
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

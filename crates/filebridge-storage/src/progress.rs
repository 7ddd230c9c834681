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

//! Progress observation for uploads and downloads
//!
//! [`ProgressReader`] wraps the source of an upload and [`ProgressWriter`]
//! wraps the sink of a download. Both report `start` when constructed,
//! `progress` after every chunk, and `finish` exactly once: at end of data,
//! on error, on explicit [`finish`](ProgressReader::finish), or on drop,
//! whichever comes first.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Observer of a byte transfer
///
/// `total` is `None` when the size is unknown (or not positive); listeners
/// must not divide by it in that case.
pub trait ProgressListener: Send + Sync {
    fn start(&self) {}

    fn progress(&self, transferred: u64, total: Option<u64>);

    fn finish(&self) {}
}

impl<F> ProgressListener for F
where
    F: Fn(u64, Option<u64>) + Send + Sync,
{
    fn progress(&self, transferred: u64, total: Option<u64>) {
        self(transferred, total)
    }
}

/// Shared, type-erased listener
pub type SharedProgressListener = Arc<dyn ProgressListener>;

/// Byte counter plus the once-only `finish` guard
struct Tracker {
    listener: Option<SharedProgressListener>,
    total: Option<u64>,
    transferred: u64,
    finished: bool,
}

impl Tracker {
    fn new(listener: Option<SharedProgressListener>, total: Option<u64>) -> Self {
        if let Some(listener) = &listener {
            listener.start();
        }
        Tracker {
            listener,
            total: total.filter(|t| *t > 0),
            transferred: 0,
            finished: false,
        }
    }

    fn advance(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.transferred += n as u64;
        if let Some(listener) = &self.listener {
            listener.progress(self.transferred, self.total);
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Some(listener) = &self.listener {
            listener.finish();
        }
    }
}

/// An [`AsyncRead`] that reports every chunk read
pub struct ProgressReader<R> {
    inner: R,
    tracker: Tracker,
}

impl<R> ProgressReader<R> {
    /// Wrap `inner`; calls `start` on the listener immediately
    pub fn new(inner: R, listener: Option<SharedProgressListener>, total: Option<u64>) -> Self {
        ProgressReader {
            inner,
            tracker: Tracker::new(listener, total),
        }
    }

    /// Bytes read so far
    pub fn transferred(&self) -> u64 {
        self.tracker.transferred
    }

    pub fn is_finished(&self) -> bool {
        self.tracker.finished
    }

    /// Close the stream for reporting purposes; later calls are no-ops
    pub fn finish(&mut self) {
        self.tracker.finish();
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let had_capacity = buf.remaining() > 0;

        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let n = buf.filled().len() - before;
                if n > 0 {
                    this.tracker.advance(n);
                } else if had_capacity {
                    // Zero bytes into a non-empty buffer is end of data
                    this.tracker.finish();
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => {
                this.tracker.finish();
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R> Drop for ProgressReader<R> {
    fn drop(&mut self) {
        self.tracker.finish();
    }
}

impl<R> fmt::Debug for ProgressReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReader")
            .field("transferred", &self.tracker.transferred)
            .field("total", &self.tracker.total)
            .field("finished", &self.tracker.finished)
            .finish()
    }
}

/// An [`AsyncWrite`] that reports every chunk written
pub struct ProgressWriter<W> {
    inner: W,
    tracker: Tracker,
}

impl<W> ProgressWriter<W> {
    /// Wrap `inner`; calls `start` on the listener immediately
    pub fn new(inner: W, listener: Option<SharedProgressListener>, total: Option<u64>) -> Self {
        ProgressWriter {
            inner,
            tracker: Tracker::new(listener, total),
        }
    }

    /// Bytes written so far
    pub fn transferred(&self) -> u64 {
        self.tracker.transferred
    }

    /// Close the stream for reporting purposes; later calls are no-ops
    pub fn finish(&mut self) {
        self.tracker.finish();
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ProgressWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.tracker.advance(n);
                Poll::Ready(Ok(n))
            }
            Poll::Ready(Err(e)) => {
                this.tracker.finish();
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_shutdown(cx);
        if result.is_ready() {
            this.tracker.finish();
        }
        result
    }
}

impl<W> Drop for ProgressWriter<W> {
    fn drop(&mut self) {
        self.tracker.finish();
    }
}

impl<W> fmt::Debug for ProgressWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressWriter")
            .field("transferred", &self.tracker.transferred)
            .field("total", &self.tracker.total)
            .field("finished", &self.tracker.finished)
            .finish()
    }
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Progress reporting and the byte-counting proxies that feed it.

use std::io::{self, Read};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Receives progress of one transfer phase at a time.
///
/// A phase is announced with [`Reporter::start`], followed by any number of
/// [`Reporter::advance`] calls and closed with [`Reporter::finish`].
pub trait Reporter: Send + Sync {
	fn start(&self, label: &str, total: u64);
	fn advance(&self, bytes: u64);
	fn finish(&self);
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopReporter;

impl Reporter for NopReporter {
	fn start(&self, _label: &str, _total: u64) {}
	fn advance(&self, _bytes: u64) {}
	fn finish(&self) {}
}

pub type SharedReporter = Arc<dyn Reporter>;

pub fn nop_reporter() -> SharedReporter {
	Arc::new(NopReporter)
}

/// Shared byte tally a proxy adds to as data flows through it.
#[derive(Debug, Default, Clone)]
pub struct ByteCount(Arc<AtomicU64>);

impl ByteCount {
	pub fn get(&self) -> u64 {
		self.0.load(Ordering::Relaxed)
	}

	fn add(&self, n: u64) {
		self.0.fetch_add(n, Ordering::Relaxed);
	}
}

pin_project! {
	/// Async reader that reports every byte read.
	pub struct ProgressReader<R> {
		#[pin]
		inner: R,
		reporter: SharedReporter,
		count: ByteCount,
	}
}

impl<R> ProgressReader<R> {
	pub fn new(inner: R, reporter: SharedReporter) -> Self {
		Self {
			inner,
			reporter,
			count: ByteCount::default(),
		}
	}

	pub fn count(&self) -> ByteCount {
		self.count.clone()
	}
}

impl<R: AsyncRead> AsyncRead for ProgressReader<R> {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		let this = self.project();
		let before = buf.filled().len();
		let res = this.inner.poll_read(cx, buf);
		if let Poll::Ready(Ok(())) = &res {
			let n = (buf.filled().len() - before) as u64;
			if n > 0 {
				this.count.add(n);
				this.reporter.advance(n);
			}
		}
		res
	}
}

pin_project! {
	/// Async writer that reports every byte accepted by the inner writer.
	pub struct ProgressWriter<W> {
		#[pin]
		inner: W,
		reporter: SharedReporter,
		count: ByteCount,
	}
}

impl<W> ProgressWriter<W> {
	pub fn new(inner: W, reporter: SharedReporter) -> Self {
		Self {
			inner,
			reporter,
			count: ByteCount::default(),
		}
	}

	pub fn count(&self) -> ByteCount {
		self.count.clone()
	}
}

impl<W: AsyncWrite> AsyncWrite for ProgressWriter<W> {
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<io::Result<usize>> {
		let this = self.project();
		let res = this.inner.poll_write(cx, buf);
		if let Poll::Ready(Ok(n)) = &res {
			if *n > 0 {
				this.count.add(*n as u64);
				this.reporter.advance(*n as u64);
			}
		}
		res
	}

	fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		self.project().inner.poll_flush(cx)
	}

	fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		self.project().inner.poll_shutdown(cx)
	}
}

/// Blocking counterpart of [`ProgressReader`], used while packing and
/// unpacking on the blocking pool.
pub struct SyncProgressReader<R> {
	inner: R,
	reporter: SharedReporter,
}

impl<R> SyncProgressReader<R> {
	pub fn new(inner: R, reporter: SharedReporter) -> Self {
		Self { inner, reporter }
	}
}

impl<R: Read> Read for SyncProgressReader<R> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let n = self.inner.read(buf)?;
		if n > 0 {
			self.reporter.advance(n as u64);
		}
		Ok(n)
	}
}

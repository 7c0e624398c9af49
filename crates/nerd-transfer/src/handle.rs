// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A claim on one dataset's objects.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use nerd_common_core::Ctx;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, instrument};

use crate::archiver::{Archiver, ObjectSink, ObjectSource};
use crate::error::TransferResult;
use crate::progress::{ProgressReader, ProgressWriter, SharedReporter};
use crate::store::Store;

/// Hooks a [`Handle`] calls after each operation fully succeeds.
#[async_trait]
pub trait Delegate: Send + Sync {
	async fn post_clean(&self, ctx: &Ctx) -> TransferResult<()>;
	async fn post_push(&self, ctx: &Ctx, total: u64) -> TransferResult<()>;
	async fn post_pull(&self, ctx: &Ctx) -> TransferResult<()>;
	async fn post_close(&self, ctx: &Ctx) -> TransferResult<()>;
}

/// Transfers for a single dataset.
///
/// Operations take `&mut self`, so at most one runs per handle at a time.
/// A failed operation leaves whatever objects it already wrote but never
/// reaches the delegate.
pub struct Handle {
	name: String,
	store: Arc<dyn Store>,
	archiver: Arc<dyn Archiver>,
	delegate: Box<dyn Delegate>,
}

impl std::fmt::Debug for Handle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Handle")
			.field("name", &self.name)
			.finish_non_exhaustive()
	}
}

impl Handle {
	pub fn new(
		name: impl Into<String>,
		store: Arc<dyn Store>,
		archiver: Arc<dyn Archiver>,
		delegate: Box<dyn Delegate>,
	) -> Self {
		Self {
			name: name.into(),
			store,
			archiver,
			delegate,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Delete every object the archiver may have written.
	#[instrument(skip(self, ctx, reporter), fields(dataset = %self.name))]
	pub async fn clear(&mut self, ctx: &Ctx, reporter: SharedReporter) -> TransferResult<()> {
		let keys = self.archiver.index();
		reporter.start("clearing", keys.len() as u64);
		for key in &keys {
			self.store.del(ctx, key).await?;
			reporter.advance(1);
		}
		reporter.finish();
		self.delegate.post_clean(ctx).await?;
		info!(objects = keys.len(), "cleared dataset");
		Ok(())
	}

	/// Archive `from` into the store. Returns the number of bytes uploaded.
	#[instrument(skip(self, ctx, reporter), fields(dataset = %self.name, from = %from.display()))]
	pub async fn push(&mut self, ctx: &Ctx, from: &Path, reporter: SharedReporter) -> TransferResult<u64> {
		let sink = StoreSink {
			store: self.store.as_ref(),
			reporter: reporter.clone(),
			total: AtomicU64::new(0),
		};
		self.archiver.archive(ctx, from, reporter, &sink).await?;
		let total = sink.total.load(Ordering::Relaxed);
		self.delegate.post_push(ctx, total).await?;
		info!(bytes = total, "pushed dataset");
		Ok(total)
	}

	/// Fetch the dataset and unpack it into `to`, which must be absent or empty.
	#[instrument(skip(self, ctx, reporter), fields(dataset = %self.name, to = %to.display()))]
	pub async fn pull(&mut self, ctx: &Ctx, to: &Path, reporter: SharedReporter) -> TransferResult<()> {
		let source = StoreSource {
			store: self.store.as_ref(),
			reporter: reporter.clone(),
		};
		self.archiver.unarchive(ctx, to, reporter, &source).await?;
		self.delegate.post_pull(ctx).await?;
		info!("pulled dataset");
		Ok(())
	}

	/// Release the handle.
	pub async fn close(self, ctx: &Ctx) -> TransferResult<()> {
		self.delegate.post_close(ctx).await
	}
}

/// Uploads archiver output, counting every byte that reaches the store.
struct StoreSink<'a> {
	store: &'a dyn Store,
	reporter: SharedReporter,
	total: AtomicU64,
}

#[async_trait]
impl ObjectSink for StoreSink<'_> {
	async fn put(
		&self,
		ctx: &Ctx,
		key: &str,
		src: &mut (dyn AsyncRead + Send + Unpin),
		size: u64,
	) -> TransferResult<()> {
		self.reporter.start("uploading", size);
		let mut tee = ProgressReader::new(src, self.reporter.clone());
		let count = tee.count();
		self.store.put(ctx, key, &mut tee, size).await?;
		self.reporter.finish();
		self.total.fetch_add(count.get(), Ordering::Relaxed);
		Ok(())
	}
}

/// Downloads objects for the archiver, sized up front by a head request.
struct StoreSource<'a> {
	store: &'a dyn Store,
	reporter: SharedReporter,
}

#[async_trait]
impl ObjectSource for StoreSource<'_> {
	async fn get(
		&self,
		ctx: &Ctx,
		key: &str,
		dst: &mut (dyn AsyncWrite + Send + Unpin),
	) -> TransferResult<u64> {
		let size = self.store.head(ctx, key).await?;
		self.reporter.start("downloading", size);
		let mut writer = ProgressWriter::new(dst, self.reporter.clone());
		let written = self.store.get(ctx, key, &mut writer).await?;
		self.reporter.finish();
		Ok(written)
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Packing directories into objects and back.

mod tar;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use nerd_common_core::Ctx;
use nerd_kube::{ArchiverOptions, ArchiverType};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{TransferError, TransferResult};
use crate::progress::SharedReporter;

pub use self::tar::{TarArchiver, ARCHIVE_OBJECT};

/// Receives the objects an archiver produces.
#[async_trait]
pub trait ObjectSink: Send + Sync {
	async fn put(
		&self,
		ctx: &Ctx,
		key: &str,
		src: &mut (dyn AsyncRead + Send + Unpin),
		size: u64,
	) -> TransferResult<()>;
}

/// Supplies the objects an archiver asks for.
#[async_trait]
pub trait ObjectSource: Send + Sync {
	async fn get(
		&self,
		ctx: &Ctx,
		key: &str,
		dst: &mut (dyn AsyncWrite + Send + Unpin),
	) -> TransferResult<u64>;
}

/// Owns the key layout of one dataset within a store.
#[async_trait]
pub trait Archiver: Send + Sync {
	/// Every key this archiver may have written for the dataset.
	fn index(&self) -> Vec<String>;

	/// Pack `path` and hand each resulting object to `sink`. Returns the
	/// total number of bytes produced.
	async fn archive(
		&self,
		ctx: &Ctx,
		path: &Path,
		reporter: SharedReporter,
		sink: &dyn ObjectSink,
	) -> TransferResult<u64>;

	/// Fetch objects from `source` and unpack them into `path`, which must
	/// not exist or be an empty directory.
	async fn unarchive(
		&self,
		ctx: &Ctx,
		path: &Path,
		reporter: SharedReporter,
		source: &dyn ObjectSource,
	) -> TransferResult<()>;
}

/// Instantiate the archiver described by `opts`.
pub fn open_archiver(opts: &ArchiverOptions) -> TransferResult<Arc<dyn Archiver>> {
	match &opts.archiver_type {
		ArchiverType::Tar => Ok(Arc::new(TarArchiver::new(&opts.tar_key_prefix)?)),
		ArchiverType::Other(name) => Err(TransferError::Unsupported {
			what: "archiver type",
			name: name.clone(),
		}),
	}
}

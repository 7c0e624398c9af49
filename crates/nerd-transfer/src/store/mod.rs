// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Object I/O against blob storage.

mod local;
mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use nerd_common_core::Ctx;
use nerd_kube::{StoreOptions, StoreType};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{TransferError, TransferResult};

pub use local::LocalStore;
pub use s3::{S3Store, MULTIPART_THRESHOLD};

/// Region used when none is configured; it resolves to the global endpoint.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Stateless object I/O. Calls on different keys may run concurrently.
///
/// Keys are relative to the store's own prefix.
#[async_trait]
pub trait Store: Send + Sync {
	/// Size of the object in bytes.
	async fn head(&self, ctx: &Ctx, key: &str) -> TransferResult<u64>;

	/// Stream the object into `dst`, returning the number of bytes written.
	async fn get(
		&self,
		ctx: &Ctx,
		key: &str,
		dst: &mut (dyn AsyncWrite + Send + Unpin),
	) -> TransferResult<u64>;

	/// Store exactly `size` bytes read from `src` under `key`.
	async fn put(
		&self,
		ctx: &Ctx,
		key: &str,
		src: &mut (dyn AsyncRead + Send + Unpin),
		size: u64,
	) -> TransferResult<()>;

	/// Remove the object. Removing an absent object succeeds.
	async fn del(&self, ctx: &Ctx, key: &str) -> TransferResult<()>;
}

/// Instantiate the store described by `opts`.
pub async fn open_store(opts: &StoreOptions) -> TransferResult<Arc<dyn Store>> {
	check_prefix(&opts.s3_prefix)?;
	match &opts.store_type {
		StoreType::S3 => Ok(Arc::new(S3Store::from_options(opts).await?)),
		StoreType::Local => Ok(Arc::new(LocalStore::from_options(opts)?)),
		StoreType::Other(name) => Err(TransferError::Unsupported {
			what: "store type",
			name: name.clone(),
		}),
	}
}

pub(crate) fn check_prefix(prefix: &str) -> TransferResult<()> {
	if prefix.is_empty() || prefix.ends_with('/') {
		Ok(())
	} else {
		Err(TransferError::Options {
			message: format!("prefix {prefix:?} must be empty or end with '/'"),
		})
	}
}

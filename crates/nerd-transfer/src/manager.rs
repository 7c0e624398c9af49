// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Creating, opening and removing datasets.

use std::sync::Arc;

use async_trait::async_trait;
use nerd_common_core::Ctx;
use nerd_kube::{ArchiverOptions, DatasetSpec, StoreOptions};
use rand::RngCore;
use tracing::{info, instrument};

use crate::archiver::{open_archiver, Archiver};
use crate::error::TransferResult;
use crate::handle::{Delegate, Handle};
use crate::progress::nop_reporter;
use crate::store::{open_store, Store};

/// Random bytes behind each dataset's key prefix.
pub const KEY_PREFIX_BYTES: usize = 16;

/// Where dataset records live.
#[async_trait]
pub trait DatasetRegistry: Send + Sync {
	/// Record a new dataset. An empty `name` asks for a generated one; the
	/// final name is returned.
	async fn create(&self, ctx: &Ctx, name: &str, spec: DatasetSpec) -> TransferResult<String>;
	async fn get(&self, ctx: &Ctx, name: &str) -> TransferResult<DatasetSpec>;
	async fn set_size(&self, ctx: &Ctx, name: &str, size: u64) -> TransferResult<()>;
	async fn delete(&self, ctx: &Ctx, name: &str) -> TransferResult<()>;
}

/// Writes transfer results back to the dataset record.
struct RegistryDelegate {
	registry: Arc<dyn DatasetRegistry>,
	name: String,
}

#[async_trait]
impl Delegate for RegistryDelegate {
	async fn post_clean(&self, ctx: &Ctx) -> TransferResult<()> {
		self.registry.set_size(ctx, &self.name, 0).await
	}

	async fn post_push(&self, ctx: &Ctx, total: u64) -> TransferResult<()> {
		self.registry.set_size(ctx, &self.name, total).await
	}

	async fn post_pull(&self, _ctx: &Ctx) -> TransferResult<()> {
		Ok(())
	}

	async fn post_close(&self, _ctx: &Ctx) -> TransferResult<()> {
		Ok(())
	}
}

/// Generates a fresh `hex/` key prefix.
pub fn generate_key_prefix() -> String {
	let mut bytes = [0u8; KEY_PREFIX_BYTES];
	rand::thread_rng().fill_bytes(&mut bytes);
	format!("{}/", hex::encode(bytes))
}

/// Hands out [`Handle`]s bound to dataset records. Nothing is cached.
#[derive(Clone)]
pub struct Manager {
	registry: Arc<dyn DatasetRegistry>,
}

impl Manager {
	pub fn new(registry: Arc<dyn DatasetRegistry>) -> Self {
		Self { registry }
	}

	/// Record a new, empty dataset under a fresh key prefix.
	#[instrument(skip(self, ctx, store_opts, archiver_opts), fields(dataset = %name))]
	pub async fn create(
		&self,
		ctx: &Ctx,
		name: &str,
		store_opts: StoreOptions,
		mut archiver_opts: ArchiverOptions,
	) -> TransferResult<Handle> {
		archiver_opts.tar_key_prefix = generate_key_prefix();
		let store = open_store(&store_opts).await?;
		let archiver = open_archiver(&archiver_opts)?;

		let spec = DatasetSpec {
			size: 0,
			store_options: store_opts,
			archiver_options: archiver_opts,
			..Default::default()
		};
		let created = self.registry.create(ctx, name, spec).await?;
		info!(created = %created, "created dataset");
		Ok(self.handle(created, store, archiver))
	}

	#[instrument(skip(self, ctx), fields(dataset = %name))]
	pub async fn open(&self, ctx: &Ctx, name: &str) -> TransferResult<Handle> {
		let spec = self.registry.get(ctx, name).await?;
		let store = open_store(&spec.store_options).await?;
		let archiver = open_archiver(&spec.archiver_options)?;
		Ok(self.handle(name.to_string(), store, archiver))
	}

	/// Purge the dataset's objects, then drop its record. If the purge
	/// fails the record stays so a later remove can retry.
	#[instrument(skip(self, ctx), fields(dataset = %name))]
	pub async fn remove(&self, ctx: &Ctx, name: &str) -> TransferResult<()> {
		let mut handle = self.open(ctx, name).await?;
		handle.clear(ctx, nop_reporter()).await?;
		handle.close(ctx).await?;
		self.registry.delete(ctx, name).await?;
		info!("removed dataset");
		Ok(())
	}

	/// Bytes recorded by the last successful push.
	pub async fn info(&self, ctx: &Ctx, name: &str) -> TransferResult<u64> {
		Ok(self.registry.get(ctx, name).await?.size)
	}

	fn handle(&self, name: String, store: Arc<dyn Store>, archiver: Arc<dyn Archiver>) -> Handle {
		let delegate = RegistryDelegate {
			registry: self.registry.clone(),
			name: name.clone(),
		};
		Handle::new(name, store, archiver, Box::new(delegate))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key_prefixes_are_hex_with_trailing_slash() {
		let prefix = generate_key_prefix();
		assert_eq!(prefix.len(), 2 * KEY_PREFIX_BYTES + 1);
		assert!(prefix.ends_with('/'));
		assert!(prefix[..32].chars().all(|c| c.is_ascii_hexdigit()));
		assert_ne!(prefix, generate_key_prefix());
	}

	#[test]
	fn generated_prefixes_open_a_tar_archiver() {
		let opts = ArchiverOptions {
			tar_key_prefix: generate_key_prefix(),
			..ArchiverOptions::tar()
		};
		assert_eq!(open_archiver(&opts).unwrap().index().len(), 1);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use nerd_common_core::Ctx;
use nerd_kube::StoreOptions;
use tokio::fs;
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::Store;
use crate::error::{TransferError, TransferResult};

/// Keeps objects as files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
	root: PathBuf,
	prefix: String,
}

impl LocalStore {
	pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
		Self {
			root: root.into(),
			prefix: prefix.into(),
		}
	}

	pub fn from_options(opts: &StoreOptions) -> TransferResult<Self> {
		if opts.local_root.is_empty() {
			return Err(TransferError::Options {
				message: "localRoot is required for the local store".to_string(),
			});
		}
		Ok(Self::new(&opts.local_root, opts.s3_prefix.clone()))
	}

	fn path(&self, key: &str) -> TransferResult<PathBuf> {
		let full = format!("{}{}", self.prefix, key);
		let relative = Path::new(&full);
		let escapes = relative
			.components()
			.any(|c| !matches!(c, Component::Normal(_)));
		if full.is_empty() || escapes {
			return Err(TransferError::Options {
				message: format!("key {full:?} is not a relative object path"),
			});
		}
		Ok(self.root.join(relative))
	}
}

fn missing_or(key: &str, context: &str, err: std::io::Error) -> TransferError {
	if err.kind() == std::io::ErrorKind::NotFound {
		TransferError::ObjectNotExists {
			key: key.to_string(),
		}
	} else {
		TransferError::io(format!("{context} {key:?}"), err)
	}
}

#[async_trait]
impl Store for LocalStore {
	async fn head(&self, ctx: &Ctx, key: &str) -> TransferResult<u64> {
		let path = self.path(key)?;
		let meta = ctx
			.run(fs::metadata(&path))
			.await?
			.map_err(|e| missing_or(key, "stat", e))?;
		if !meta.is_file() {
			return Err(TransferError::ObjectNotExists {
				key: key.to_string(),
			});
		}
		Ok(meta.len())
	}

	async fn get(
		&self,
		ctx: &Ctx,
		key: &str,
		dst: &mut (dyn AsyncWrite + Send + Unpin),
	) -> TransferResult<u64> {
		let path = self.path(key)?;
		let mut file = ctx
			.run(fs::File::open(&path))
			.await?
			.map_err(|e| missing_or(key, "open", e))?;
		let copied = ctx
			.run(async {
				let n = io::copy(&mut file, dst).await?;
				dst.flush().await?;
				Ok::<_, std::io::Error>(n)
			})
			.await?
			.map_err(|e| TransferError::io(format!("read {key:?}"), e))?;
		debug!(key, bytes = copied, "read local object");
		Ok(copied)
	}

	async fn put(
		&self,
		ctx: &Ctx,
		key: &str,
		src: &mut (dyn AsyncRead + Send + Unpin),
		size: u64,
	) -> TransferResult<()> {
		let path = self.path(key)?;
		let staging = path.with_extension("partial");
		let written = ctx
			.run(async {
				if let Some(parent) = path.parent() {
					fs::create_dir_all(parent).await?;
				}
				let mut file = fs::File::create(&staging).await?;
				let n = io::copy(&mut src.take(size), &mut file).await?;
				file.sync_all().await?;
				Ok::<_, std::io::Error>(n)
			})
			.await;

		let written = match written {
			Ok(Ok(n)) => n,
			Ok(Err(e)) => {
				let _ = fs::remove_file(&staging).await;
				return Err(TransferError::io(format!("write {key:?}"), e));
			}
			Err(interrupted) => {
				let _ = fs::remove_file(&staging).await;
				return Err(interrupted.into());
			}
		};
		if written != size {
			let _ = fs::remove_file(&staging).await;
			return Err(TransferError::io(
				format!("write {key:?}"),
				std::io::Error::new(
					std::io::ErrorKind::UnexpectedEof,
					format!("expected {size} bytes, got {written}"),
				),
			));
		}
		fs::rename(&staging, &path)
			.await
			.map_err(|e| TransferError::io(format!("commit {key:?}"), e))?;
		debug!(key, bytes = size, "wrote local object");
		Ok(())
	}

	async fn del(&self, ctx: &Ctx, key: &str) -> TransferResult<()> {
		let path = self.path(key)?;
		match ctx.run(fs::remove_file(&path)).await? {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(TransferError::io(format!("delete {key:?}"), e)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use nerd_common_core::{ErrorKind, Kinded};

	#[tokio::test]
	async fn put_get_head_del() {
		let dir = tempfile::tempdir().unwrap();
		let store = LocalStore::new(dir.path(), "pre/");
		let ctx = Ctx::background();

		let mut src: &[u8] = b"payload";
		store.put(&ctx, "abc/archive.tar", &mut src, 7).await.unwrap();
		assert!(dir.path().join("pre/abc/archive.tar").is_file());
		assert_eq!(store.head(&ctx, "abc/archive.tar").await.unwrap(), 7);

		let mut out = Vec::new();
		let n = store.get(&ctx, "abc/archive.tar", &mut out).await.unwrap();
		assert_eq!(n, 7);
		assert_eq!(out, b"payload");

		store.del(&ctx, "abc/archive.tar").await.unwrap();
		store.del(&ctx, "abc/archive.tar").await.unwrap();
		let err = store.head(&ctx, "abc/archive.tar").await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::ObjectNotExists);
	}

	#[tokio::test]
	async fn missing_objects_are_tagged() {
		let dir = tempfile::tempdir().unwrap();
		let store = LocalStore::new(dir.path(), "");
		let mut out = Vec::new();
		let err = store
			.get(&Ctx::background(), "nope", &mut out)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::ObjectNotExists);
	}

	#[tokio::test]
	async fn short_input_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let store = LocalStore::new(dir.path(), "");
		let mut src: &[u8] = b"abc";
		let err = store
			.put(&Ctx::background(), "k", &mut src, 10)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Io);
		assert!(!dir.path().join("k").exists());
	}

	#[test]
	fn keys_cannot_escape_root() {
		let store = LocalStore::new("/srv/objects", "");
		assert!(store.path("../etc/passwd").is_err());
		assert!(store.path("/abs").is_err());
		assert!(store.path("a/b").is_ok());
	}
}

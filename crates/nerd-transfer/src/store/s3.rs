// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! S3 and S3-compatible object storage.

use std::fmt;

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use nerd_common_core::Ctx;
use nerd_kube::StoreOptions;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::{Store, DEFAULT_REGION};
use crate::error::{TransferError, TransferResult};

/// Objects larger than this are sent as a multipart upload in parts of this size.
pub const MULTIPART_THRESHOLD: u64 = 8 * 1024 * 1024;

pub struct S3Store {
	client: Client,
	bucket: String,
	prefix: String,
}

impl fmt::Debug for S3Store {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("S3Store")
			.field("bucket", &self.bucket)
			.field("prefix", &self.prefix)
			.finish_non_exhaustive()
	}
}

impl S3Store {
	pub fn from_client(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
		Self {
			client,
			bucket: bucket.into(),
			prefix: prefix.into(),
		}
	}

	/// Build a client from dataset store options. Without an access key
	/// requests go out unsigned, which allows public buckets.
	pub async fn from_options(opts: &StoreOptions) -> TransferResult<Self> {
		if opts.s3_bucket.is_empty() {
			return Err(TransferError::Options {
				message: "s3Bucket is required for the s3 store".to_string(),
			});
		}
		let region = if opts.s3_aws_region.is_empty() {
			DEFAULT_REGION.to_string()
		} else {
			opts.s3_aws_region.clone()
		};

		let mut loader =
			aws_config::defaults(aws_config::BehaviorVersion::latest()).region(Region::new(region));
		loader = if opts.s3_access_key.is_empty() {
			loader.no_credentials()
		} else {
			let session_token = Some(opts.s3_session_token.clone()).filter(|t| !t.is_empty());
			loader.credentials_provider(Credentials::new(
				opts.s3_access_key.clone(),
				opts.s3_secret_key.clone(),
				session_token,
				None,
				"nerd-dataset",
			))
		};
		let sdk_config = loader.load().await;

		let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
		if !opts.s3_endpoint.is_empty() {
			builder = builder
				.endpoint_url(opts.s3_endpoint.clone())
				.force_path_style(true);
		}

		Ok(Self::from_client(
			Client::from_conf(builder.build()),
			&opts.s3_bucket,
			&opts.s3_prefix,
		))
	}

	fn key(&self, key: &str) -> String {
		format!("{}{}", self.prefix, key)
	}

	async fn put_single(
		&self,
		ctx: &Ctx,
		key: &str,
		src: &mut (dyn AsyncRead + Send + Unpin),
		size: u64,
	) -> TransferResult<()> {
		let body = read_exact(ctx, key, src, size).await?;
		ctx
			.run(
				self
					.client
					.put_object()
					.bucket(&self.bucket)
					.key(self.key(key))
					.content_length(size as i64)
					.body(ByteStream::from(body))
					.send(),
			)
			.await?
			.map_err(|e| sdk_error("put", key, e))?;
		Ok(())
	}

	async fn put_multipart(
		&self,
		ctx: &Ctx,
		key: &str,
		src: &mut (dyn AsyncRead + Send + Unpin),
		size: u64,
	) -> TransferResult<()> {
		let full_key = self.key(key);
		let created = ctx
			.run(
				self
					.client
					.create_multipart_upload()
					.bucket(&self.bucket)
					.key(&full_key)
					.send(),
			)
			.await?
			.map_err(|e| sdk_error("put", key, e))?;
		let upload_id = created
			.upload_id()
			.map(str::to_string)
			.ok_or_else(|| TransferError::Store {
				operation: "put",
				key: key.to_string(),
				source: "multipart upload created without an upload id".into(),
			})?;

		match self.upload_parts(ctx, key, &upload_id, src, size).await {
			Ok(()) => {
				debug!(key, upload_id, "completed multipart upload");
				Ok(())
			}
			Err(err) => {
				let abort = self
					.client
					.abort_multipart_upload()
					.bucket(&self.bucket)
					.key(&full_key)
					.upload_id(&upload_id)
					.send()
					.await;
				if let Err(e) = abort {
					warn!(key, upload_id, error = %e, "failed to abort multipart upload");
				}
				Err(err)
			}
		}
	}

	async fn upload_parts(
		&self,
		ctx: &Ctx,
		key: &str,
		upload_id: &str,
		src: &mut (dyn AsyncRead + Send + Unpin),
		size: u64,
	) -> TransferResult<()> {
		let full_key = self.key(key);
		let mut parts = Vec::new();
		let mut remaining = size;
		let mut part_number = 1i32;
		while remaining > 0 {
			let len = remaining.min(MULTIPART_THRESHOLD);
			let chunk = read_exact(ctx, key, src, len).await?;
			let uploaded = ctx
				.run(
					self
						.client
						.upload_part()
						.bucket(&self.bucket)
						.key(&full_key)
						.upload_id(upload_id)
						.part_number(part_number)
						.content_length(len as i64)
						.body(ByteStream::from(chunk))
						.send(),
				)
				.await?
				.map_err(|e| sdk_error("put", key, e))?;
			parts.push(
				CompletedPart::builder()
					.set_e_tag(uploaded.e_tag().map(str::to_string))
					.part_number(part_number)
					.build(),
			);
			remaining -= len;
			part_number += 1;
		}

		ctx
			.run(
				self
					.client
					.complete_multipart_upload()
					.bucket(&self.bucket)
					.key(&full_key)
					.upload_id(upload_id)
					.multipart_upload(
						CompletedMultipartUpload::builder()
							.set_parts(Some(parts))
							.build(),
					)
					.send(),
			)
			.await?
			.map_err(|e| sdk_error("put", key, e))?;
		Ok(())
	}
}

async fn read_exact(
	ctx: &Ctx,
	key: &str,
	src: &mut (dyn AsyncRead + Send + Unpin),
	len: u64,
) -> TransferResult<Vec<u8>> {
	let mut buf = vec![0u8; len as usize];
	ctx
		.run(src.read_exact(&mut buf))
		.await?
		.map_err(|e| TransferError::io(format!("read {key:?} for upload"), e))?;
	Ok(buf)
}

/// Wrap an SDK error, keeping transport failures apart from service errors.
fn sdk_error<E, R>(operation: &'static str, key: &str, err: SdkError<E, R>) -> TransferError
where
	E: std::error::Error + Send + Sync + 'static,
	R: fmt::Debug + Send + Sync + 'static,
{
	let transport = matches!(
		err,
		SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)
	);
	let source = DisplayErrorContext(&err).to_string().into();
	let key = key.to_string();
	if transport {
		TransferError::Network {
			operation,
			key,
			source,
		}
	} else {
		TransferError::Store {
			operation,
			key,
			source,
		}
	}
}

#[async_trait]
impl Store for S3Store {
	async fn head(&self, ctx: &Ctx, key: &str) -> TransferResult<u64> {
		let res = ctx
			.run(
				self
					.client
					.head_object()
					.bucket(&self.bucket)
					.key(self.key(key))
					.send(),
			)
			.await?;
		match res {
			Ok(out) => Ok(out.content_length().unwrap_or(0).max(0) as u64),
			Err(SdkError::ServiceError(e)) if e.err().is_not_found() => {
				Err(TransferError::ObjectNotExists {
					key: key.to_string(),
				})
			}
			Err(e) => Err(sdk_error("head", key, e)),
		}
	}

	async fn get(
		&self,
		ctx: &Ctx,
		key: &str,
		dst: &mut (dyn AsyncWrite + Send + Unpin),
	) -> TransferResult<u64> {
		let res = ctx
			.run(
				self
					.client
					.get_object()
					.bucket(&self.bucket)
					.key(self.key(key))
					.send(),
			)
			.await?;
		let mut body = match res {
			Ok(out) => out.body,
			Err(SdkError::ServiceError(e)) if e.err().is_no_such_key() => {
				return Err(TransferError::ObjectNotExists {
					key: key.to_string(),
				})
			}
			Err(e) => return Err(sdk_error("get", key, e)),
		};

		let mut written = 0u64;
		loop {
			let next = ctx.run(body.next()).await?;
			let Some(chunk) = next else {
				break;
			};
			let chunk = chunk.map_err(|e| TransferError::Network {
				operation: "get",
				key: key.to_string(),
				source: Box::new(e),
			})?;
			ctx
				.run(dst.write_all(&chunk))
				.await?
				.map_err(|e| TransferError::io(format!("write {key:?}"), e))?;
			written += chunk.len() as u64;
		}
		ctx
			.run(dst.flush())
			.await?
			.map_err(|e| TransferError::io(format!("write {key:?}"), e))?;
		debug!(key, bytes = written, "downloaded object");
		Ok(written)
	}

	async fn put(
		&self,
		ctx: &Ctx,
		key: &str,
		src: &mut (dyn AsyncRead + Send + Unpin),
		size: u64,
	) -> TransferResult<()> {
		if size > MULTIPART_THRESHOLD {
			self.put_multipart(ctx, key, src, size).await?;
		} else {
			self.put_single(ctx, key, src, size).await?;
		}
		debug!(key, bytes = size, "uploaded object");
		Ok(())
	}

	async fn del(&self, ctx: &Ctx, key: &str) -> TransferResult<()> {
		ctx
			.run(
				self
					.client
					.delete_object()
					.bucket(&self.bucket)
					.key(self.key(key))
					.send(),
			)
			.await?
			.map_err(|e| sdk_error("delete", key, e))?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use nerd_common_core::{ErrorKind, Kinded};

	#[tokio::test]
	async fn bucket_is_required() {
		let opts = StoreOptions::s3("");
		let err = S3Store::from_options(&opts).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Config);
	}

	#[tokio::test]
	async fn keys_carry_the_store_prefix() {
		let mut opts = StoreOptions::s3("b1");
		opts.s3_prefix = "team/".into();
		opts.s3_endpoint = "http://127.0.0.1:9000".into();
		let store = S3Store::from_options(&opts).await.unwrap();
		assert_eq!(store.key("00ff/archive.tar"), "team/00ff/archive.tar");
		assert!(format!("{store:?}").contains("b1"));
	}
}

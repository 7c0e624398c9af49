// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use nerd_kube::ArchiverOptions;
use nerd_transfer::{Reporter, SharedReporter};
use tracing::{info, instrument, warn};

use crate::app::App;

#[derive(Subcommand, Debug)]
pub enum DatasetAction {
	/// Record an empty dataset
	Create {
		/// Generated when omitted
		name: Option<String>,
		/// Keep objects in this directory instead of the S3 bucket
		#[arg(long, value_name = "DIR")]
		local_root: Option<PathBuf>,
	},
	/// Upload a directory as a new dataset
	Upload {
		path: PathBuf,
		/// Generated when omitted
		#[arg(long)]
		name: Option<String>,
		/// Keep objects in this directory instead of the S3 bucket
		#[arg(long, value_name = "DIR")]
		local_root: Option<PathBuf>,
		/// Upload deadline in seconds, 0 for none
		#[arg(long, value_name = "SECS")]
		transfer_timeout: Option<u64>,
	},
	/// Download a dataset into an empty or absent directory
	Download {
		name: String,
		path: PathBuf,
		/// Download deadline in seconds, 0 for none
		#[arg(long, value_name = "SECS")]
		transfer_timeout: Option<u64>,
	},
	/// List datasets, newest first
	List,
	/// Show one dataset
	Get { name: String },
	/// Delete a dataset and its stored objects
	Delete { name: String },
}

/// Logs phase boundaries; byte counts are summed per phase.
#[derive(Default)]
struct LogReporter {
	bytes: AtomicU64,
}

impl Reporter for LogReporter {
	fn start(&self, label: &str, total: u64) {
		self.bytes.store(0, Ordering::Relaxed);
		info!(label, total, "transfer started");
	}

	fn advance(&self, bytes: u64) {
		self.bytes.fetch_add(bytes, Ordering::Relaxed);
	}

	fn finish(&self) {
		info!(bytes = self.bytes.load(Ordering::Relaxed), "transfer finished");
	}
}

fn reporter() -> SharedReporter {
	Arc::new(LogReporter::default())
}

#[instrument(skip(app))]
pub async fn run(app: &App, action: DatasetAction) -> anyhow::Result<()> {
	let manager = app.kube.transfers();
	match action {
		DatasetAction::Create { name, local_root } => {
			let ctx = app.ctx();
			let handle = manager
				.create(
					&ctx,
					&name.unwrap_or_default(),
					app.store_options(local_root.as_deref()),
					ArchiverOptions::tar(),
				)
				.await?;
			let name = handle.name().to_string();
			handle.close(&ctx).await?;
			app.out.one(&app.kube.get_dataset(&ctx, &name).await?)
		}
		DatasetAction::Upload {
			path,
			name,
			local_root,
			transfer_timeout,
		} => {
			let mut handle = manager
				.create(
					&app.ctx(),
					&name.unwrap_or_default(),
					app.store_options(local_root.as_deref()),
					ArchiverOptions::tar(),
				)
				.await?;
			let name = handle.name().to_string();

			let tctx = app.transfer_ctx(transfer_timeout);
			if let Err(e) = handle.push(&tctx, &path, reporter()).await {
				warn!(dataset = %name, error = %e, "upload failed, removing dataset");
				if let Err(cleanup) = manager.remove(&app.transfer_ctx(transfer_timeout), &name).await {
					warn!(dataset = %name, error = %cleanup, "failed to remove dataset");
				}
				return Err(e).with_context(|| format!("failed to upload {}", path.display()));
			}
			handle.close(&tctx).await?;
			app.out.one(&app.kube.get_dataset(&app.ctx(), &name).await?)
		}
		DatasetAction::Download {
			name,
			path,
			transfer_timeout,
		} => {
			let mut handle = manager.open(&app.ctx(), &name).await?;
			let tctx = app.transfer_ctx(transfer_timeout);
			handle
				.pull(&tctx, &path, reporter())
				.await
				.with_context(|| format!("failed to download into {}", path.display()))?;
			handle.close(&tctx).await?;
			app.out.done("downloaded", "dataset", &name)
		}
		DatasetAction::List => app.out.list(&app.kube.list_datasets(&app.ctx()).await?),
		DatasetAction::Get { name } => app.out.one(&app.kube.get_dataset(&app.ctx(), &name).await?),
		DatasetAction::Delete { name } => {
			manager.remove(&app.transfer_ctx(None), &name).await?;
			app.out.done("deleted", "dataset", &name)
		}
	}
}

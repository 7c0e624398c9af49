// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Everything a command needs: the service handle, resolved config,
//! output and contexts.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use nerd_cli_config::{NerdConfig, TransferConfig};
use nerd_common_core::Ctx;
use nerd_kube::StoreOptions;
use nerd_svc::{Kube, KubeSettings};
use tracing::{debug, warn};

use crate::output::{Output, OutputFormat};

pub struct App {
	pub kube: Kube,
	pub config: NerdConfig,
	pub out: Output,
	root: Ctx,
}

impl App {
	pub async fn connect(config: NerdConfig, format: OutputFormat) -> anyhow::Result<Self> {
		let settings = KubeSettings {
			namespace: config.kube.namespace.clone(),
			kubeconfig: config.kube.kubeconfig.clone(),
			context: config.kube.context.clone(),
		};
		let kube = Kube::connect(&settings)
			.await
			.with_context(|| format!("failed to connect to namespace {}", settings.namespace))?;

		let root = Ctx::background();
		cancel_on_interrupt(root.clone());
		Ok(Self {
			kube,
			config,
			out: Output::new(format),
			root,
		})
	}

	/// Context for control-plane calls, bounded by `kube.timeout_secs`.
	pub fn ctx(&self) -> Ctx {
		self.root
			.child_with_timeout(Duration::from_secs(self.config.kube.timeout_secs))
	}

	/// Context for push and pull. `secs` overrides `transfer.timeout_secs`;
	/// zero means no deadline.
	pub fn transfer_ctx(&self, secs: Option<u64>) -> Ctx {
		match secs.unwrap_or(self.config.transfer.timeout_secs) {
			0 => self.root.child(),
			secs => self.root.child_with_timeout(Duration::from_secs(secs)),
		}
	}

	pub fn store_options(&self, local_root: Option<&Path>) -> StoreOptions {
		store_options(&self.config.transfer, local_root)
	}
}

fn cancel_on_interrupt(ctx: Ctx) {
	tokio::spawn(async move {
		match tokio::signal::ctrl_c().await {
			Ok(()) => {
				warn!("interrupted, cancelling");
				ctx.cancel();
			}
			Err(e) => debug!(error = %e, "no interrupt handler"),
		}
	});
}

/// Store options for a new dataset. A local root selects the directory
/// store; otherwise the configured S3 bucket and credentials are used.
pub fn store_options(transfer: &TransferConfig, local_root: Option<&Path>) -> StoreOptions {
	let mut opts = match local_root {
		Some(root) => StoreOptions::local(root.display().to_string()),
		None => {
			let mut opts = StoreOptions::s3(&transfer.bucket);
			opts.s3_aws_region = transfer.region.clone();
			opts.s3_endpoint = transfer.endpoint.clone().unwrap_or_default();
			opts.s3_access_key = transfer.access_key.clone();
			opts.s3_secret_key = transfer.secret_key.expose().clone();
			opts.s3_session_token = transfer.session_token.expose().clone();
			opts
		}
	};
	opts.s3_prefix = transfer.prefix.clone();
	opts
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Subcommand;
use nerd_svc::CreateFileSystemInput;
use tracing::instrument;

use crate::app::App;

#[derive(Subcommand, Debug)]
pub enum FsAction {
	/// Claim a shared filesystem
	Create {
		/// Generated when omitted
		name: Option<String>,
		/// Size as a Kubernetes quantity, e.g. 10Gi
		#[arg(long)]
		capacity: String,
	},
	/// List filesystems, newest first
	List,
	/// Show one filesystem
	Get { name: String },
	/// Delete a filesystem
	Delete { name: String },
	/// Show where the filesystem is served over WebDAV
	#[command(alias = "pv")]
	Webdav { name: String },
}

#[instrument(skip(app))]
pub async fn run(app: &App, action: FsAction) -> anyhow::Result<()> {
	let ctx = app.ctx();
	match action {
		FsAction::Create { name, capacity } => {
			let input = CreateFileSystemInput {
				name: name.unwrap_or_default(),
				capacity,
			};
			app.out.one(&app.kube.create_file_system(&ctx, &input).await?)
		}
		FsAction::List => app.out.list(&app.kube.list_file_systems(&ctx).await?),
		FsAction::Get { name } => app.out.one(&app.kube.get_file_system(&ctx, &name).await?),
		FsAction::Delete { name } => {
			app.kube.delete_file_system(&ctx, &name).await?;
			app.out.done("deleted", "filesystem", &name)
		}
		FsAction::Webdav { name } => {
			app.out.one(&app.kube.get_persistent_volume(&ctx, &name).await?)
		}
	}
}

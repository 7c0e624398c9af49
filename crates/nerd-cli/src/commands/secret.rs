// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Subcommand;
use nerd_common_core::SecretString;
use nerd_svc::{CreateSecretInput, UpdateSecretInput};
use tracing::instrument;

use crate::app::App;

#[derive(Subcommand)]
pub enum SecretAction {
	/// Store registry credentials for an image, e.g. quay.io/team/app
	Create {
		image: String,
		#[arg(long)]
		username: String,
		#[arg(long, env = "NERD_REGISTRY_PASSWORD", hide_env_values = true)]
		password: String,
	},
	/// Show one secret
	Get { name: String },
	/// List secrets, newest first
	List,
	/// Replace the credentials of a secret
	Update {
		name: String,
		#[arg(long)]
		username: String,
		#[arg(long, env = "NERD_REGISTRY_PASSWORD", hide_env_values = true)]
		password: String,
	},
	/// Delete a secret
	Delete { name: String },
}

impl std::fmt::Debug for SecretAction {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SecretAction::Create { image, username, .. } => f
				.debug_struct("Create")
				.field("image", image)
				.field("username", username)
				.finish_non_exhaustive(),
			SecretAction::Get { name } => f.debug_struct("Get").field("name", name).finish(),
			SecretAction::List => f.write_str("List"),
			SecretAction::Update { name, username, .. } => f
				.debug_struct("Update")
				.field("name", name)
				.field("username", username)
				.finish_non_exhaustive(),
			SecretAction::Delete { name } => f.debug_struct("Delete").field("name", name).finish(),
		}
	}
}

#[instrument(skip(app))]
pub async fn run(app: &App, action: SecretAction) -> anyhow::Result<()> {
	let ctx = app.ctx();
	match action {
		SecretAction::Create {
			image,
			username,
			password,
		} => {
			let input = CreateSecretInput {
				image,
				username,
				password: SecretString::from(password),
			};
			app.out.one(&app.kube.create_secret(&ctx, &input).await?)
		}
		SecretAction::Get { name } => app.out.one(&app.kube.get_secret(&ctx, &name).await?),
		SecretAction::List => app.out.list(&app.kube.list_secrets(&ctx).await?),
		SecretAction::Update {
			name,
			username,
			password,
		} => {
			let input = UpdateSecretInput {
				name,
				username,
				password: SecretString::from(password),
			};
			app.out.one(&app.kube.update_secret(&ctx, &input).await?)
		}
		SecretAction::Delete { name } => {
			app.kube.delete_secret(&ctx, &name).await?;
			app.out.done("deleted", "secret", &name)
		}
	}
}

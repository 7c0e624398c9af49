// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Subcommand;
use tracing::instrument;

use crate::app::App;

#[derive(Subcommand, Debug)]
pub enum QuotaAction {
	/// Show hard limits and current usage
	List,
}

#[instrument(skip(app))]
pub async fn run(app: &App, action: QuotaAction) -> anyhow::Result<()> {
	match action {
		QuotaAction::List => {
			let quotas = app.kube.list_quotas(&app.ctx()).await?;
			app.out.list(&quotas)
		}
	}
}

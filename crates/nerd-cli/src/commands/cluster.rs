// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Subcommand;
use nerd_svc::Compliance;
use serde_json::json;
use tracing::instrument;

use crate::app::App;

#[derive(Subcommand, Debug)]
pub enum ClusterAction {
	/// Report bootstrap objects missing from the cluster
	Check,
	/// Create the missing bootstrap objects
	Bootstrap,
}

#[instrument(skip(app))]
pub async fn run(app: &App, action: ClusterAction) -> anyhow::Result<()> {
	let ctx = app.ctx();
	let compliance = Compliance::new(app.config.compliance.manifest_urls.clone())?;
	match action {
		ClusterAction::Check => {
			let report = app.kube.is_nerd_compliant(&ctx, &compliance).await?;
			let text = if report.compliant {
				"cluster is ready for nerd\n".to_string()
			} else {
				let mut text = "cluster is missing:\n".to_string();
				for label in &report.missing {
					text.push_str(&format!("  {label}\n"));
				}
				text
			};
			app.out.text_or(&text, &report)
		}
		ClusterAction::Bootstrap => {
			let applied = app.kube.add_nerd_dependencies(&ctx, &compliance).await?;
			let text = if applied.is_empty() {
				"nothing to apply\n".to_string()
			} else {
				applied.iter().map(|l| format!("created {l}\n")).collect()
			};
			app.out.text_or(&text, &json!({ "applied": applied }))
		}
	}
}

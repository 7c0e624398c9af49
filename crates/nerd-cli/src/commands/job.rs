// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Subcommand;
use nerd_svc::{DatasetMount, FetchJobLogsInput, RunJobInput};
use tracing::{instrument, warn};

use crate::app::App;

#[derive(Subcommand, Debug)]
pub enum JobAction {
	/// Run a container image as a job
	Run {
		image: String,
		/// Arguments for the container, after `--`
		#[arg(last = true)]
		args: Vec<String>,
		/// Generated when omitted
		#[arg(long)]
		name: Option<String>,
		/// Environment variable (repeatable)
		#[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
		env: Vec<(String, String)>,
		/// Mount a dataset read by the job (repeatable)
		#[arg(long = "input-dataset", value_name = "DATASET:PATH", value_parser = parse_mount)]
		inputs: Vec<DatasetMount>,
		/// Mount a dataset written by the job (repeatable)
		#[arg(long = "output-dataset", value_name = "DATASET:PATH", value_parser = parse_mount)]
		outputs: Vec<DatasetMount>,
		/// Image pull secret
		#[arg(long)]
		secret: Option<String>,
		/// Retries before the job fails
		#[arg(long)]
		backoff_limit: Option<i32>,
	},
	/// List jobs, newest first
	List,
	/// Print the logs of a job's latest pod
	Logs {
		name: String,
		/// Only the last N lines
		#[arg(long, value_name = "N")]
		tail: Option<i64>,
	},
	/// Delete a job and its pods
	Delete { name: String },
}

fn parse_env(s: &str) -> Result<(String, String), String> {
	match s.split_once('=') {
		Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
		_ => Err(format!("expected KEY=VALUE, got {s:?}")),
	}
}

fn parse_mount(s: &str) -> Result<DatasetMount, String> {
	match s.split_once(':') {
		Some((dataset, path)) if !dataset.is_empty() && !path.is_empty() => Ok(DatasetMount {
			dataset: dataset.to_string(),
			path: path.to_string(),
		}),
		_ => Err(format!("expected DATASET:PATH, got {s:?}")),
	}
}

#[instrument(skip(app))]
pub async fn run(app: &App, action: JobAction) -> anyhow::Result<()> {
	let ctx = app.ctx();
	match action {
		JobAction::Run {
			image,
			args,
			name,
			env,
			inputs,
			outputs,
			secret,
			backoff_limit,
		} => {
			let input = RunJobInput {
				name: name.unwrap_or_default(),
				image,
				args,
				env: env.into_iter().collect(),
				inputs,
				outputs,
				secret,
				backoff_limit,
			};
			let name = app.kube.run_job(&ctx, &input).await?;
			app.out.done("started", "job", &name)
		}
		JobAction::List => app.out.list(&app.kube.list_jobs(&ctx).await?),
		JobAction::Logs { name, tail } => {
			let logs = app
				.kube
				.fetch_job_logs(&ctx, &FetchJobLogsInput { name, tail })
				.await?;
			if logs.truncated {
				warn!("log output truncated, use --tail to see the end");
			}
			app.out.text_or(&logs.data, &logs)
		}
		JobAction::Delete { name } => {
			app.kube.delete_job(&ctx, &name).await?;
			app.out.done("deleted", "job", &name)
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `nerd`: run jobs and manage datasets on a Kubernetes cluster.

mod app;
mod commands;
mod logging;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use nerd_cli_config::{load_config, CliOverrides, ConfigError, NerdConfig};
use nerd_common_core::{ErrorKind, Kinded, EXIT_SUCCESS, EXIT_USAGE};
use nerd_kube::KubeError;
use nerd_svc::SvcError;
use nerd_transfer::TransferError;
use tracing::error;

use crate::app::App;
use crate::commands::{
	ClusterAction, DatasetAction, FsAction, JobAction, QuotaAction, SecretAction,
};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
	name = "nerd",
	about = "Run jobs and manage datasets on Kubernetes",
	version
)]
struct Cli {
	/// Config file [default: $NERD_CONFIG, then ~/.nerd/config.toml]
	#[arg(long, global = true, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Namespace to operate in
	#[arg(short, long, global = true)]
	namespace: Option<String>,

	/// Kubeconfig file
	#[arg(long, global = true, value_name = "PATH")]
	kubeconfig: Option<PathBuf>,

	/// Kubeconfig context
	#[arg(long, global = true)]
	context: Option<String>,

	/// Deadline for cluster calls, in seconds
	#[arg(long, global = true, value_name = "SECS")]
	timeout: Option<u64>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, global = true, value_name = "LEVEL")]
	log_level: Option<String>,

	/// Log format (pretty, compact, json)
	#[arg(long, global = true, value_name = "FORMAT")]
	log_format: Option<String>,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	output: OutputFormat,

	#[command(subcommand)]
	command: Command,
}

impl Cli {
	fn overrides(&self) -> CliOverrides {
		CliOverrides {
			namespace: self.namespace.clone(),
			kubeconfig: self.kubeconfig.clone(),
			context: self.context.clone(),
			timeout_secs: self.timeout,
			log_level: self.log_level.clone(),
			log_format: self.log_format.clone(),
		}
	}
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Upload, download and inspect datasets
	Dataset {
		#[command(subcommand)]
		action: DatasetAction,
	},
	/// Run jobs and read their logs
	Job {
		#[command(subcommand)]
		action: JobAction,
	},
	/// Manage registry pull secrets
	Secret {
		#[command(subcommand)]
		action: SecretAction,
	},
	/// Manage network filesystems
	Fs {
		#[command(subcommand)]
		action: FsAction,
	},
	/// Show resource quotas
	Quota {
		#[command(subcommand)]
		action: QuotaAction,
	},
	/// Check or prepare the cluster
	Cluster {
		#[command(subcommand)]
		action: ClusterAction,
	},
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = match Cli::try_parse() {
		Ok(cli) => cli,
		Err(e) => {
			let _ = e.print();
			return ExitCode::from(if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS });
		}
	};

	let config = match load_config(cli.config.clone(), cli.overrides()) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("error: {e} [{}]", e.kind());
			return ExitCode::from(e.kind().exit_code());
		}
	};
	logging::init(&config.logging);

	match run(cli, config).await {
		Ok(()) => ExitCode::from(EXIT_SUCCESS),
		Err(err) => {
			let kind = error_kind(&err);
			error!(kind = %kind, error = %format!("{err:#}"), "command failed");
			eprintln!("error: {err} [{kind}]");
			ExitCode::from(kind.exit_code())
		}
	}
}

async fn run(cli: Cli, config: NerdConfig) -> anyhow::Result<()> {
	let app = App::connect(config, cli.output).await?;
	match cli.command {
		Command::Dataset { action } => commands::dataset::run(&app, action).await,
		Command::Job { action } => commands::job::run(&app, action).await,
		Command::Secret { action } => commands::secret::run(&app, action).await,
		Command::Fs { action } => commands::fs::run(&app, action).await,
		Command::Quota { action } => commands::quota::run(&app, action).await,
		Command::Cluster { action } => commands::cluster::run(&app, action).await,
	}
}

/// The tag of the first tagged error in the chain.
fn error_kind(err: &anyhow::Error) -> ErrorKind {
	for cause in err.chain() {
		if let Some(e) = cause.downcast_ref::<SvcError>() {
			return e.kind();
		}
		if let Some(e) = cause.downcast_ref::<TransferError>() {
			return e.kind();
		}
		if let Some(e) = cause.downcast_ref::<KubeError>() {
			return e.kind();
		}
		if let Some(e) = cause.downcast_ref::<ConfigError>() {
			return e.kind();
		}
	}
	ErrorKind::Internal
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::Context;
	use clap::CommandFactory;
	use nerd_common_core::EXIT_FAILURE;

	#[test]
	fn test_cli_definition_is_valid() {
		Cli::command().debug_assert();
	}

	#[test]
	fn test_global_flags_become_overrides() {
		let cli = Cli::try_parse_from([
			"nerd",
			"dataset",
			"list",
			"--namespace",
			"team",
			"--timeout",
			"30",
			"--log-level",
			"debug",
		])
		.unwrap();
		let o = cli.overrides();
		assert_eq!(o.namespace.as_deref(), Some("team"));
		assert_eq!(o.timeout_secs, Some(30));
		assert_eq!(o.log_level.as_deref(), Some("debug"));
		assert_eq!(o.log_format, None);
		assert_eq!(cli.output, OutputFormat::Text);
	}

	#[test]
	fn test_output_flag_parses_json() {
		let cli = Cli::try_parse_from(["nerd", "-o", "json", "job", "list"]).unwrap();
		assert_eq!(cli.output, OutputFormat::Json);
		assert!(matches!(
			cli.command,
			Command::Job {
				action: JobAction::List
			}
		));
	}

	#[test]
	fn test_unknown_subcommand_is_usage_error() {
		let err = Cli::try_parse_from(["nerd", "workload", "list"]).unwrap_err();
		assert!(err.use_stderr());
	}

	#[test]
	fn test_error_kind_survives_context() {
		let err = Err::<(), _>(SvcError::from(KubeError::NotExists {
			kind: "Dataset".into(),
			name: "d-x".into(),
		}))
		.context("fetching dataset")
		.unwrap_err();
		assert_eq!(error_kind(&err), ErrorKind::NotExists);
		assert_eq!(error_kind(&err).exit_code(), EXIT_FAILURE);
	}

	#[test]
	fn test_validation_maps_to_usage_exit() {
		let err = anyhow::Error::new(ConfigError::validation("namespace must not be empty"));
		assert_eq!(error_kind(&err), ErrorKind::Config);

		let err = anyhow::Error::new(SvcError::NoInput {
			what: "manifest urls",
		});
		assert_eq!(error_kind(&err).exit_code(), EXIT_USAGE);
	}

	#[test]
	fn test_untagged_errors_are_internal() {
		let err = anyhow::anyhow!("boom");
		assert_eq!(error_kind(&err), ErrorKind::Internal);
	}
}

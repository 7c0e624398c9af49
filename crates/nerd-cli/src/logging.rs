// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use nerd_cli_config::{LogFormat, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// Logs go to stderr so command output on stdout stays parseable.
pub fn init(config: &LoggingConfig) {
	let registry = tracing_subscriber::registry().with(filter(config));
	match config.format {
		LogFormat::Pretty => registry
			.with(fmt::layer().pretty().with_writer(std::io::stderr))
			.init(),
		LogFormat::Compact => registry
			.with(fmt::layer().compact().with_writer(std::io::stderr))
			.init(),
		LogFormat::Json => registry
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.init(),
	}
}

fn filter(config: &LoggingConfig) -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.filter_directive()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_configured_directive_parses() {
		for level in ["trace", "debug", "info", "warn", "error"] {
			let config = LoggingConfig {
				level: level.to_string(),
				format: LogFormat::Compact,
			};
			assert!(EnvFilter::try_new(config.filter_directive()).is_ok(), "{level}");
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Service error types.

use nerd_common_core::{ErrorKind, Interrupted, Kinded};
use nerd_kube::KubeError;
use nerd_transfer::TransferError;

pub type SvcResult<T> = Result<T, SvcError>;

/// Errors returned by service operations.
#[derive(Debug, thiserror::Error)]
pub enum SvcError {
	/// A required input was not supplied at all
	#[error("no input given for {what}")]
	NoInput { what: &'static str },

	/// Input failed a field constraint
	#[error("invalid {field}: {message}")]
	Validation { field: &'static str, message: String },

	/// The job exists but has nothing to read logs from
	#[error("no logs available for job {job:?}")]
	NoLogs { job: String },

	/// A bootstrap manifest could not be fetched
	#[error("failed to fetch manifest {url}: {source}")]
	Fetch {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	/// The HTTP client for manifest fetches could not be built
	#[error("failed to build http client: {source}")]
	HttpClient {
		#[source]
		source: reqwest::Error,
	},

	/// A bootstrap manifest could not be decoded
	#[error("malformed manifest {url}: {message}")]
	Manifest { url: String, message: String },

	/// A bootstrap manifest holds a kind nerd cannot apply
	#[error("manifest {url} has unsupported kind {kind:?}")]
	ManifestKind { url: String, kind: String },

	/// A stored object had an unexpected shape
	#[error("malformed {what}: {message}")]
	Decode { what: &'static str, message: String },

	#[error(transparent)]
	Interrupted(#[from] Interrupted),

	#[error(transparent)]
	Kube(#[from] KubeError),

	#[error(transparent)]
	Transfer(#[from] TransferError),
}

impl SvcError {
	pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
		SvcError::Validation {
			field,
			message: message.into(),
		}
	}
}

impl Kinded for SvcError {
	fn kind(&self) -> ErrorKind {
		match self {
			SvcError::NoInput { .. } => ErrorKind::NoInput,
			SvcError::Validation { .. } => ErrorKind::Validation,
			SvcError::NoLogs { .. } => ErrorKind::NoLogs,
			SvcError::Fetch { source, .. } if source.is_timeout() => ErrorKind::Deadline,
			SvcError::Fetch { .. } => ErrorKind::Network,
			SvcError::ManifestKind { .. } => ErrorKind::Unsupported,
			SvcError::HttpClient { .. } | SvcError::Manifest { .. } | SvcError::Decode { .. } => {
				ErrorKind::Internal
			}
			SvcError::Interrupted(i) => i.kind(),
			SvcError::Kube(e) => e.kind(),
			SvcError::Transfer(e) => e.kind(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wrapped_errors_keep_their_tag() {
		let err = SvcError::from(KubeError::AlreadyExists {
			kind: "Dataset".into(),
			name: "dup".into(),
		});
		assert_eq!(err.kind(), ErrorKind::AlreadyExists);
		assert_eq!(err.to_string(), "Dataset \"dup\" already exists");

		let err = SvcError::from(TransferError::ObjectNotExists { key: "k".into() });
		assert_eq!(err.kind(), ErrorKind::ObjectNotExists);
	}

	#[test]
	fn validation_exits_with_usage_code() {
		let err = SvcError::validation("image", "required");
		assert_eq!(err.kind().exit_code(), 254);
		assert_eq!(err.to_string(), "invalid image: required");
		assert_eq!(SvcError::NoLogs { job: "j".into() }.kind().exit_code(), 255);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use nerd_common_core::{ErrorKind, Interrupted, Kinded};
use nerd_kube::KubeError;
use thiserror::Error;

pub type TransferResult<T> = Result<T, TransferError>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum TransferError {
	#[error("object {key:?} does not exist")]
	ObjectNotExists { key: String },

	#[error("directory {} holds no data to archive", path.display())]
	EmptyDirectory { path: PathBuf },

	#[error("target {} exists and is not an empty directory", path.display())]
	NotEmpty { path: PathBuf },

	#[error("unsupported {what} {name:?}")]
	Unsupported { what: &'static str, name: String },

	#[error("invalid store options: {message}")]
	Options { message: String },

	#[error("invalid archiver options: {message}")]
	ArchiverOptions { message: String },

	#[error("{context}: {source}")]
	Io {
		context: String,
		#[source]
		source: std::io::Error,
	},

	#[error("malformed archive: {message}")]
	Archive { message: String },

	#[error("failed to reach object store during {operation} of {key:?}: {source}")]
	Network {
		operation: &'static str,
		key: String,
		#[source]
		source: BoxError,
	},

	#[error("object store {operation} of {key:?} failed: {source}")]
	Store {
		operation: &'static str,
		key: String,
		#[source]
		source: BoxError,
	},

	#[error(transparent)]
	Interrupted(#[from] Interrupted),

	#[error("dataset metadata: {0}")]
	Metadata(#[from] KubeError),

	#[error("background task failed: {0}")]
	Task(String),
}

impl TransferError {
	pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
		TransferError::Io {
			context: context.into(),
			source,
		}
	}
}

impl Kinded for TransferError {
	fn kind(&self) -> ErrorKind {
		match self {
			TransferError::ObjectNotExists { .. } => ErrorKind::ObjectNotExists,
			TransferError::EmptyDirectory { .. } => ErrorKind::EmptyDirectory,
			TransferError::NotEmpty { .. } => ErrorKind::NotEmpty,
			TransferError::Unsupported { .. } => ErrorKind::Unsupported,
			TransferError::Options { .. } | TransferError::ArchiverOptions { .. } => ErrorKind::Config,
			TransferError::Io { source, .. } => Kinded::kind(source),
			TransferError::Archive { .. } | TransferError::Store { .. } => ErrorKind::Io,
			TransferError::Network { .. } => ErrorKind::Network,
			TransferError::Interrupted(i) => i.kind(),
			TransferError::Metadata(e) => e.kind(),
			TransferError::Task(_) => ErrorKind::Internal,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn metadata_errors_keep_their_tag() {
		let err = TransferError::from(KubeError::NotExists {
			kind: "Dataset".into(),
			name: "ds1".into(),
		});
		assert_eq!(err.kind(), ErrorKind::NotExists);
		assert!(err.to_string().contains("ds1"));
	}

	#[test]
	fn io_errors_use_io_kind_mapping() {
		let err = TransferError::io(
			"reading archive",
			std::io::Error::new(std::io::ErrorKind::TimedOut, "slow disk"),
		);
		assert_eq!(err.kind(), ErrorKind::Deadline);

		let err = TransferError::io("reading archive", std::io::ErrorKind::PermissionDenied.into());
		assert_eq!(err.kind(), ErrorKind::Io);
	}

	#[test]
	fn cancellation_is_tagged() {
		assert_eq!(
			TransferError::from(Interrupted::Cancelled).kind(),
			ErrorKind::Cancelled
		);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error taxonomy shared across layers.
//!
//! Each crate keeps its own error enum but tags every variant with one
//! [`ErrorKind`]. Wrapping errors forward the kind of the error they wrap,
//! so the innermost tag survives any number of layers.

use std::fmt;

use serde::Serialize;

/// Process exit code for a successful command.
pub const EXIT_SUCCESS: u8 = 0;
/// Process exit code for validation and usage failures.
pub const EXIT_USAGE: u8 = 254;
/// Process exit code for every other failure.
pub const EXIT_FAILURE: u8 = 255;

/// The kind of failure, examinable by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
	/// Input failed its declared constraints.
	Validation,
	/// No input was supplied where one is required.
	NoInput,
	/// A deadline expired during a Kubernetes or HTTP call.
	Deadline,
	/// The context was cancelled by the caller.
	Cancelled,
	/// Transport failure reaching the cluster or object store.
	Network,
	/// Create on a name that is already taken.
	AlreadyExists,
	/// Read, update or delete on an absent name.
	NotExists,
	/// The target namespace is absent.
	NamespaceNotExists,
	/// The apiserver rejected `metadata.name`.
	InvalidName,
	/// Credentials lack permission.
	Unauthorized,
	/// The apiserver is temporarily refusing requests.
	ServiceUnavailable,
	/// Update-after-get conflict.
	RaceCondition,
	/// Blob storage has no object under the key.
	ObjectNotExists,
	/// Log fetch found no pods or containers.
	NoLogs,
	/// Archive source has no payload.
	EmptyDirectory,
	/// Unarchive target exists and is not empty.
	NotEmpty,
	/// Unknown store or archiver type.
	Unsupported,
	/// Local filesystem failure.
	Io,
	/// Invalid configuration.
	Config,
	/// Unclassified apiserver error.
	Kubernetes,
	/// Serialization and other programming errors.
	Internal,
}

impl ErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::Validation => "validation",
			ErrorKind::NoInput => "no-input",
			ErrorKind::Deadline => "deadline",
			ErrorKind::Cancelled => "cancelled",
			ErrorKind::Network => "network",
			ErrorKind::AlreadyExists => "already-exists",
			ErrorKind::NotExists => "not-exists",
			ErrorKind::NamespaceNotExists => "namespace-not-exists",
			ErrorKind::InvalidName => "invalid-name",
			ErrorKind::Unauthorized => "unauthorized",
			ErrorKind::ServiceUnavailable => "service-unavailable",
			ErrorKind::RaceCondition => "race-condition",
			ErrorKind::ObjectNotExists => "object-not-exists",
			ErrorKind::NoLogs => "no-logs",
			ErrorKind::EmptyDirectory => "empty-directory",
			ErrorKind::NotEmpty => "not-empty",
			ErrorKind::Unsupported => "unsupported",
			ErrorKind::Io => "io",
			ErrorKind::Config => "config",
			ErrorKind::Kubernetes => "kubernetes",
			ErrorKind::Internal => "internal",
		}
	}

	/// Exit code the CLI reports for an error of this kind.
	pub fn exit_code(&self) -> u8 {
		match self {
			ErrorKind::Validation | ErrorKind::NoInput => EXIT_USAGE,
			_ => EXIT_FAILURE,
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Implemented by every error type that carries a taxonomy tag.
pub trait Kinded {
	fn kind(&self) -> ErrorKind;

	fn is(&self, kind: ErrorKind) -> bool {
		self.kind() == kind
	}
}

impl Kinded for std::io::Error {
	fn kind(&self) -> ErrorKind {
		match std::io::Error::kind(self) {
			std::io::ErrorKind::TimedOut => ErrorKind::Deadline,
			std::io::ErrorKind::Interrupted => ErrorKind::Cancelled,
			_ => ErrorKind::Io,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn usage_kinds_exit_254() {
		assert_eq!(ErrorKind::Validation.exit_code(), 254);
		assert_eq!(ErrorKind::NoInput.exit_code(), 254);
	}

	#[test]
	fn other_kinds_exit_255() {
		for kind in [
			ErrorKind::Deadline,
			ErrorKind::NotExists,
			ErrorKind::Kubernetes,
			ErrorKind::ObjectNotExists,
		] {
			assert_eq!(kind.exit_code(), 255, "{kind}");
		}
	}

	#[test]
	fn serializes_kebab_case() {
		let json = serde_json::to_string(&ErrorKind::NamespaceNotExists).unwrap();
		assert_eq!(json, "\"namespace-not-exists\"");
		assert_eq!(ErrorKind::NamespaceNotExists.as_str(), "namespace-not-exists");
	}

	#[test]
	fn io_errors_are_tagged() {
		let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow disk");
		assert!(Kinded::is(&err, ErrorKind::Deadline));
		let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
		assert_eq!(Kinded::kind(&err), ErrorKind::Io);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::error::Error as StdError;

use nerd_common_core::{ErrorKind, Interrupted, Kinded};
use thiserror::Error;

/// Result type alias for Kubevisor operations.
pub type KubeResult<T> = Result<T, KubeError>;

/// Errors surfaced by the Kubevisor, one variant per taxonomy tag.
#[derive(Error, Debug)]
pub enum KubeError {
	#[error("{kind} {name:?} already exists")]
	AlreadyExists { kind: String, name: String },

	#[error("{kind} {name:?} does not exist")]
	NotExists { kind: String, name: String },

	#[error("namespace {namespace:?} does not exist")]
	NamespaceNotExists { namespace: String },

	#[error("invalid name {name:?} for {kind}: {message}")]
	InvalidName {
		kind: String,
		name: String,
		message: String,
	},

	#[error("not authorized: {message}")]
	Unauthorized { message: String },

	#[error("kubernetes api unavailable: {message}")]
	ServiceUnavailable { message: String },

	#[error("{kind} {name:?} was modified concurrently: {message}")]
	RaceCondition {
		kind: String,
		name: String,
		message: String,
	},

	#[error("kubernetes call timed out: {message}")]
	Timeout { message: String },

	#[error(transparent)]
	Interrupted(#[from] Interrupted),

	#[error("failed to reach kubernetes: {0}")]
	Network(#[source] kube::Error),

	#[error("kubernetes api error: {0}")]
	Api(#[source] kube::Error),

	#[error("kubernetes config: {message}")]
	Config { message: String },

	#[error("malformed {kind} object: {source}")]
	Serialization {
		kind: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("invalid quantity {input:?}: {reason}")]
	Quantity { input: String, reason: String },

	#[error("watch feed failed: {message}")]
	Feed { message: String },
}

impl Kinded for KubeError {
	fn kind(&self) -> ErrorKind {
		match self {
			KubeError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
			KubeError::NotExists { .. } => ErrorKind::NotExists,
			KubeError::NamespaceNotExists { .. } => ErrorKind::NamespaceNotExists,
			KubeError::InvalidName { .. } => ErrorKind::InvalidName,
			KubeError::Unauthorized { .. } => ErrorKind::Unauthorized,
			KubeError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
			KubeError::RaceCondition { .. } => ErrorKind::RaceCondition,
			KubeError::Timeout { .. } => ErrorKind::Deadline,
			KubeError::Interrupted(i) => i.kind(),
			KubeError::Network(_) => ErrorKind::Network,
			KubeError::Api(_) => ErrorKind::Kubernetes,
			KubeError::Config { .. } => ErrorKind::Config,
			KubeError::Serialization { .. } | KubeError::Feed { .. } => ErrorKind::Internal,
			KubeError::Quantity { .. } => ErrorKind::Validation,
		}
	}
}

/// The single tagger every apiserver call funnels through.
///
/// `kind` and `name` describe the object the call addressed and end up in
/// the resulting message.
pub(crate) fn classify(err: kube::Error, kind: &str, name: &str) -> KubeError {
	let api = match &err {
		kube::Error::Api(resp) => resp,
		_ if chain_has_timeout(&err) => {
			return KubeError::Timeout {
				message: err.to_string(),
			}
		}
		kube::Error::HyperError(_) | kube::Error::Service(_) => return KubeError::Network(err),
		_ => return KubeError::Api(err),
	};

	let message = api.message.clone();
	match (api.reason.as_str(), api.code) {
		("AlreadyExists", _) => KubeError::AlreadyExists {
			kind: kind.to_string(),
			name: name.to_string(),
		},
		("NotFound", _) | (_, 404) => match missing_namespace(&message) {
			Some(namespace) => KubeError::NamespaceNotExists { namespace },
			None => KubeError::NotExists {
				kind: kind.to_string(),
				name: name.to_string(),
			},
		},
		("Invalid", _) | (_, 422) if message.contains("metadata.name") => KubeError::InvalidName {
			kind: kind.to_string(),
			name: name.to_string(),
			message,
		},
		("Unauthorized", _) | ("Forbidden", _) | (_, 401) | (_, 403) => {
			KubeError::Unauthorized { message }
		}
		("ServiceUnavailable", _) | (_, 503) => KubeError::ServiceUnavailable { message },
		("Conflict", _) | (_, 409) => KubeError::RaceCondition {
			kind: kind.to_string(),
			name: name.to_string(),
			message,
		},
		("Timeout", _) | ("ServerTimeout", _) | (_, 504) => KubeError::Timeout { message },
		_ => KubeError::Api(err),
	}
}

/// Extracts the namespace from a `namespaces "x" not found` message.
fn missing_namespace(message: &str) -> Option<String> {
	let rest = message.strip_prefix("namespaces \"")?;
	let end = rest.find('"')?;
	Some(rest[..end].to_string())
}

fn chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
	let mut current: Option<&(dyn StdError + 'static)> = Some(err);
	while let Some(e) = current {
		if let Some(io) = e.downcast_ref::<std::io::Error>() {
			if io.kind() == std::io::ErrorKind::TimedOut {
				return true;
			}
		}
		let text = e.to_string();
		if text.contains("timed out") || text.contains("deadline has elapsed") {
			return true;
		}
		current = e.source();
	}
	false
}

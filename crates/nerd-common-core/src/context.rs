// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request context: deadline, cancellation and an optional trace id.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::kind::{ErrorKind, Kinded};

/// Why a context stopped a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
	#[error("context deadline exceeded")]
	Deadline,
	#[error("context cancelled")]
	Cancelled,
}

impl Kinded for Interrupted {
	fn kind(&self) -> ErrorKind {
		match self {
			Interrupted::Deadline => ErrorKind::Deadline,
			Interrupted::Cancelled => ErrorKind::Cancelled,
		}
	}
}

/// Threaded through every public operation that may suspend.
///
/// Cloning is cheap and clones share cancellation. Use [`Ctx::child`] to get
/// a context that can be cancelled without affecting its parent.
#[derive(Debug, Clone, Default)]
pub struct Ctx {
	token: CancellationToken,
	deadline: Option<Instant>,
	trace_id: Option<Arc<str>>,
}

impl Ctx {
	/// A context without deadline that is only cancelled explicitly.
	pub fn background() -> Self {
		Self::default()
	}

	/// A fresh context that expires after `timeout`.
	pub fn with_timeout(timeout: Duration) -> Self {
		Self {
			deadline: Some(Instant::now() + timeout),
			..Self::default()
		}
	}

	/// Derive a context cancelled together with `self`.
	pub fn child(&self) -> Self {
		Self {
			token: self.token.child_token(),
			deadline: self.deadline,
			trace_id: self.trace_id.clone(),
		}
	}

	/// Derive a child whose deadline is the earlier of the parent's and `timeout` from now.
	pub fn child_with_timeout(&self, timeout: Duration) -> Self {
		let candidate = Instant::now() + timeout;
		let deadline = match self.deadline {
			Some(existing) if existing < candidate => existing,
			_ => candidate,
		};
		Self {
			token: self.token.child_token(),
			deadline: Some(deadline),
			trace_id: self.trace_id.clone(),
		}
	}

	pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
		self.trace_id = Some(Arc::from(trace_id.into()));
		self
	}

	pub fn trace_id(&self) -> Option<&str> {
		self.trace_id.as_deref()
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Time left before the deadline, `None` when unbounded.
	pub fn remaining(&self) -> Option<Duration> {
		self
			.deadline
			.map(|d| d.saturating_duration_since(Instant::now()))
	}

	pub fn token(&self) -> &CancellationToken {
		&self.token
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Returns the interruption if the context is already done.
	pub fn err(&self) -> Option<Interrupted> {
		if self.token.is_cancelled() {
			return Some(Interrupted::Cancelled);
		}
		match self.deadline {
			Some(deadline) if Instant::now() >= deadline => Some(Interrupted::Deadline),
			_ => None,
		}
	}

	/// Resolves once the context is cancelled or its deadline passes.
	pub async fn done(&self) -> Interrupted {
		match self.deadline {
			Some(deadline) => {
				tokio::select! {
					_ = self.token.cancelled() => Interrupted::Cancelled,
					_ = tokio::time::sleep_until(deadline) => Interrupted::Deadline,
				}
			}
			None => {
				self.token.cancelled().await;
				Interrupted::Cancelled
			}
		}
	}

	/// Race `fut` against the context. The future is dropped when the
	/// context finishes first, which aborts in-flight HTTP requests.
	pub async fn run<F, T>(&self, fut: F) -> Result<T, Interrupted>
	where
		F: Future<Output = T>,
	{
		if let Some(reason) = self.err() {
			return Err(reason);
		}
		tokio::select! {
			biased;
			reason = self.done() => Err(reason),
			out = fut => Ok(out),
		}
	}
}

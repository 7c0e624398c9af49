// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Primitives shared by every nerd crate.
//!
//! - [`Ctx`]: deadline, cancellation and trace id threaded through every
//!   call that may suspend
//! - [`ErrorKind`]/[`Kinded`]: the error taxonomy callers branch on
//! - [`Secret<T>`]: a wrapper that keeps credentials out of logs

pub mod context;
pub mod kind;
pub mod secret;

pub use context::{Ctx, Interrupted};
pub use kind::{ErrorKind, Kinded, EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE};
pub use secret::{Secret, SecretString, REDACTED};

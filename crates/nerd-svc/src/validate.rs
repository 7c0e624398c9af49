// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Field constraints checked before any cluster call.

use crate::error::{SvcError, SvcResult};

/// Implemented by every operation input.
pub trait Validate {
	fn validate(&self) -> SvcResult<()>;
}

/// The value must be non-empty.
pub(crate) fn required(field: &'static str, value: &str) -> SvcResult<()> {
	if value.trim().is_empty() {
		return Err(SvcError::validation(field, "is required"));
	}
	Ok(())
}

/// The value may only hold printable ASCII. Empty values pass.
pub(crate) fn printascii(field: &'static str, value: &str) -> SvcResult<()> {
	match value.chars().find(|c| !(' '..='~').contains(c)) {
		Some(c) => Err(SvcError::validation(
			field,
			format!("contains non-printable or non-ASCII character {c:?}"),
		)),
		None => Ok(()),
	}
}

pub(crate) fn min(field: &'static str, value: i64, min: i64) -> SvcResult<()> {
	if value < min {
		return Err(SvcError::validation(field, format!("must be at least {min}")));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use nerd_common_core::{ErrorKind, Kinded};
	use proptest::prelude::*;

	#[test]
	fn required_rejects_blank() {
		assert!(required("image", "alpine").is_ok());
		assert_eq!(required("image", "  ").unwrap_err().kind(), ErrorKind::Validation);
	}

	#[test]
	fn printascii_rejects_control_and_unicode() {
		assert!(printascii("name", "").is_ok());
		assert!(printascii("name", "ds-1 ~").is_ok());
		assert!(printascii("name", "tab\there").is_err());
		assert!(printascii("name", "caf\u{e9}").is_err());
	}

	#[test]
	fn min_is_inclusive() {
		assert!(min("backoff_limit", 0, 0).is_ok());
		assert!(min("backoff_limit", -1, 0).is_err());
	}

	proptest! {
		#[test]
		fn printable_ascii_always_passes(s in "[ -~]{0,64}") {
			prop_assert!(printascii("name", &s).is_ok());
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kubernetes quantity syntax (`500m`, `1.5Gi`, `2e3`).

use crate::error::KubeError;

const MAX_DIGITS: usize = 36;
const MAX_POW10: i32 = 36;

/// Parse a quantity and return its value in milli-units, rounded away from zero.
pub fn parse_quantity(input: &str) -> Result<i64, KubeError> {
	let invalid = |reason: &str| KubeError::Quantity {
		input: input.to_string(),
		reason: reason.to_string(),
	};

	let (negative, rest) = match input.as_bytes().first() {
		Some(b'-') => (true, &input[1..]),
		Some(b'+') => (false, &input[1..]),
		Some(_) => (false, input),
		None => return Err(invalid("empty quantity")),
	};

	let number_len = rest
		.find(|c: char| !(c.is_ascii_digit() || c == '.'))
		.unwrap_or(rest.len());
	let (number, suffix) = rest.split_at(number_len);

	let (whole, fraction) = match number.split_once('.') {
		Some((w, f)) => (w, f),
		None => (number, ""),
	};
	if fraction.contains('.') {
		return Err(invalid("more than one decimal point"));
	}
	if whole.is_empty() && fraction.is_empty() {
		return Err(invalid("missing number"));
	}

	let digits = format!("{whole}{fraction}");
	let significant = digits.trim_start_matches('0');
	if significant.len() > MAX_DIGITS {
		return Err(invalid("too many digits"));
	}
	let mut mantissa: i128 = 0;
	for b in significant.bytes() {
		mantissa = mantissa * 10 + i128::from(b - b'0');
	}

	let (multiplier, exp10) = parse_suffix(suffix).ok_or_else(|| invalid("unknown suffix"))?;
	let fraction_len = i32::try_from(fraction.len()).map_err(|_| invalid("too many digits"))?;
	let pow10 = exp10
		.checked_add(3)
		.and_then(|p| p.checked_sub(fraction_len))
		.ok_or_else(|| invalid("exponent out of range"))?;

	let overflow = || invalid("value out of range");
	let value = mantissa.checked_mul(multiplier).ok_or_else(overflow)?;

	let milli = if value == 0 {
		0
	} else if pow10 >= 0 {
		if pow10 > MAX_POW10 {
			return Err(overflow());
		}
		value.checked_mul(10i128.pow(pow10 as u32)).ok_or_else(overflow)?
	} else if -pow10 > MAX_POW10 {
		1
	} else {
		let divisor = 10i128.pow((-pow10) as u32);
		let quotient = value / divisor;
		if value % divisor == 0 {
			quotient
		} else {
			quotient + 1
		}
	};

	let signed = if negative { -milli } else { milli };
	i64::try_from(signed).map_err(|_| overflow())
}

/// Returns the binary multiplier and decimal exponent for a suffix.
fn parse_suffix(suffix: &str) -> Option<(i128, i32)> {
	let binary = |power: u32| Some((1024i128.pow(power), 0));
	let decimal = |exp: i32| Some((1, exp));
	match suffix {
		"Ki" => binary(1),
		"Mi" => binary(2),
		"Gi" => binary(3),
		"Ti" => binary(4),
		"Pi" => binary(5),
		"Ei" => binary(6),
		"n" => decimal(-9),
		"u" => decimal(-6),
		"m" => decimal(-3),
		"" => decimal(0),
		"k" => decimal(3),
		"M" => decimal(6),
		"G" => decimal(9),
		"T" => decimal(12),
		"P" => decimal(15),
		"E" => decimal(18),
		_ => {
			let exponent = suffix
				.strip_prefix('e')
				.or_else(|| suffix.strip_prefix('E'))?;
			let digits = exponent
				.strip_prefix('-')
				.or_else(|| exponent.strip_prefix('+'))
				.unwrap_or(exponent);
			if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || digits.len() > 4 {
				return None;
			}
			exponent.parse::<i32>().ok().map(|e| (1, e))
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Plain text tables or JSON on stdout.

use std::io::Write;

use chrono::{DateTime, Utc};
use nerd_svc::{
	DatasetOutput, FileSystemOutput, JobView, QuotaOutput, SecretOutput, WebDavCoordinates,
};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	Text,
	Json,
}

/// A row in a text table.
pub trait Row {
	const HEADER: &'static [&'static str];
	fn cells(&self) -> Vec<String>;
}

pub struct Output {
	format: OutputFormat,
}

impl Output {
	pub fn new(format: OutputFormat) -> Self {
		Self { format }
	}

	pub fn list<T: Row + Serialize>(&self, items: &[T]) -> anyhow::Result<()> {
		match self.format {
			OutputFormat::Json => self.json(&items),
			OutputFormat::Text => {
				let rows: Vec<Vec<String>> = items.iter().map(T::cells).collect();
				write_stdout(&render_table(T::HEADER, &rows))
			}
		}
	}

	/// One item as `KEY: value` lines.
	pub fn one<T: Row + Serialize>(&self, item: &T) -> anyhow::Result<()> {
		match self.format {
			OutputFormat::Json => self.json(item),
			OutputFormat::Text => write_stdout(&render_fields(T::HEADER, &item.cells())),
		}
	}

	/// Report a finished action on a named resource.
	pub fn done(&self, action: &str, kind: &str, name: &str) -> anyhow::Result<()> {
		match self.format {
			OutputFormat::Json => self.json(&json!({ "action": action, "kind": kind, "name": name })),
			OutputFormat::Text => write_stdout(&format!("{action} {kind} {name}\n")),
		}
	}

	/// Raw text in text mode, `value` in JSON mode.
	pub fn text_or<T: Serialize>(&self, text: &str, value: &T) -> anyhow::Result<()> {
		match self.format {
			OutputFormat::Json => self.json(value),
			OutputFormat::Text => write_stdout(text),
		}
	}

	fn json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
		let mut s = serde_json::to_string_pretty(value)?;
		s.push('\n');
		write_stdout(&s)
	}
}

fn write_stdout(s: &str) -> anyhow::Result<()> {
	let mut stdout = std::io::stdout().lock();
	stdout.write_all(s.as_bytes())?;
	stdout.flush()?;
	Ok(())
}

pub fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
	let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
	for row in rows {
		for (w, cell) in widths.iter_mut().zip(row) {
			*w = (*w).max(cell.chars().count());
		}
	}

	let mut out = String::new();
	let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
	for row in std::iter::once(&header).chain(rows) {
		let line: Vec<String> = row
			.iter()
			.zip(&widths)
			.map(|(cell, &w)| format!("{cell:<w$}"))
			.collect();
		out.push_str(line.join("   ").trim_end());
		out.push('\n');
	}
	out
}

fn render_fields(header: &[&str], cells: &[String]) -> String {
	header
		.iter()
		.zip(cells)
		.map(|(h, c)| format!("{h}: {c}\n"))
		.collect()
}

fn age(t: &Option<DateTime<Utc>>) -> String {
	t.as_ref()
		.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
		.unwrap_or_else(|| "-".to_string())
}

fn or_dash(s: &str) -> String {
	if s.is_empty() {
		"-".to_string()
	} else {
		s.to_string()
	}
}

fn joined(items: &[String]) -> String {
	or_dash(&items.join(","))
}

/// Binary-prefixed byte count: `1.5Gi`, `512`.
pub fn format_bytes(n: u64) -> String {
	const UNITS: [&str; 6] = ["Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];
	if n < 1024 {
		return n.to_string();
	}
	let mut value = n as f64;
	let mut unit = "";
	for u in UNITS {
		if value < 1024.0 {
			break;
		}
		value /= 1024.0;
		unit = u;
	}
	if value.fract() == 0.0 {
		format!("{value:.0}{unit}")
	} else {
		format!("{value:.1}{unit}")
	}
}

fn cpu(milli: i64) -> String {
	if milli % 1000 == 0 {
		(milli / 1000).to_string()
	} else {
		format!("{milli}m")
	}
}

/// Quota memory is tracked in milli-bytes.
fn memory(milli: i64) -> String {
	format_bytes((milli / 1000).max(0) as u64)
}

impl Row for DatasetOutput {
	const HEADER: &'static [&'static str] =
		&["NAME", "CREATED", "SIZE", "INPUT FOR", "OUTPUT FROM", "STORE"];

	fn cells(&self) -> Vec<String> {
		vec![
			self.name.clone(),
			age(&self.created_at),
			format_bytes(self.size),
			joined(&self.input_for),
			joined(&self.output_from),
			self.store_type.clone(),
		]
	}
}

impl Row for JobView {
	const HEADER: &'static [&'static str] = &["NAME", "IMAGE", "CREATED", "PHASE", "DETAILS"];

	fn cells(&self) -> Vec<String> {
		let details = if let Some(reason) = &self.waiting_reason {
			reason.clone()
		} else if let Some(code) = self.details.exit_code.filter(|c| *c != 0) {
			format!("exit code {code}")
		} else if let Some(warning) = &self.details.last_warning {
			warning.clone()
		} else if self.details.unschedulable {
			"unschedulable".to_string()
		} else {
			"-".to_string()
		};
		let phase = match self.active_state {
			Some(state) => format!("{}/{state}", self.phase),
			None => self.phase.to_string(),
		};
		vec![
			self.name.clone(),
			self.image.clone(),
			age(&self.created_at),
			phase,
			details,
		]
	}
}

impl Row for SecretOutput {
	const HEADER: &'static [&'static str] =
		&["NAME", "REGISTRY", "PROJECT", "IMAGE", "USERNAME", "CREATED"];

	fn cells(&self) -> Vec<String> {
		vec![
			self.name.clone(),
			self.registry.clone(),
			or_dash(&self.project),
			self.image.clone(),
			self.username.clone(),
			age(&self.created_at),
		]
	}
}

impl Row for FileSystemOutput {
	const HEADER: &'static [&'static str] = &["NAME", "CAPACITY", "PHASE", "VOLUME", "CREATED"];

	fn cells(&self) -> Vec<String> {
		vec![
			self.name.clone(),
			or_dash(&self.capacity),
			or_dash(&self.phase),
			self.volume.clone().unwrap_or_else(|| "-".to_string()),
			age(&self.created_at),
		]
	}
}

impl Row for WebDavCoordinates {
	const HEADER: &'static [&'static str] = &["VOLUME", "HOST", "PORT", "PATH"];

	fn cells(&self) -> Vec<String> {
		vec![
			self.volume.clone(),
			or_dash(&self.host),
			self.port.to_string(),
			or_dash(&self.path),
		]
	}
}

impl Row for QuotaOutput {
	const HEADER: &'static [&'static str] =
		&["NAME", "REQUESTS CPU", "REQUESTS MEMORY", "LIMITS CPU", "LIMITS MEMORY"];

	fn cells(&self) -> Vec<String> {
		vec![
			self.name.clone(),
			format!("{}/{}", cpu(self.used.requests_cpu), cpu(self.hard.requests_cpu)),
			format!(
				"{}/{}",
				memory(self.used.requests_memory),
				memory(self.hard.requests_memory)
			),
			format!("{}/{}", cpu(self.used.limits_cpu), cpu(self.hard.limits_cpu)),
			format!(
				"{}/{}",
				memory(self.used.limits_memory),
				memory(self.hard.limits_memory)
			),
		]
	}
}

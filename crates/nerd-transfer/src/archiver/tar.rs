// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single-object tar layout: `<keyPrefix>archive.tar`.
//!
//! Symlinks and special files are skipped when packing and never created
//! when unpacking. Entries that would land outside the target directory
//! fail the whole extraction.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use nerd_common_core::Ctx;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{Archiver, ObjectSink, ObjectSource};
use crate::error::{TransferError, TransferResult};
use crate::progress::{SharedReporter, SyncProgressReader};

/// Object name below the key prefix.
pub const ARCHIVE_OBJECT: &str = "archive.tar";

#[derive(Debug, Clone)]
pub struct TarArchiver {
	key_prefix: String,
}

impl TarArchiver {
	pub fn new(key_prefix: &str) -> TransferResult<Self> {
		if !key_prefix.ends_with('/') {
			return Err(TransferError::ArchiverOptions {
				message: format!("tar key prefix {key_prefix:?} must end with '/'"),
			});
		}
		Ok(Self {
			key_prefix: key_prefix.to_string(),
		})
	}

	fn key(&self) -> String {
		format!("{}{}", self.key_prefix, ARCHIVE_OBJECT)
	}
}

#[async_trait]
impl Archiver for TarArchiver {
	fn index(&self) -> Vec<String> {
		vec![self.key()]
	}

	async fn archive(
		&self,
		ctx: &Ctx,
		path: &Path,
		reporter: SharedReporter,
		sink: &dyn ObjectSink,
	) -> TransferResult<u64> {
		let root = path.to_path_buf();
		let task_ctx = ctx.clone();
		let (file, size) = tokio::task::spawn_blocking(move || pack(&task_ctx, &root, reporter))
			.await
			.map_err(|e| TransferError::Task(e.to_string()))??;

		let mut file = tokio::fs::File::from_std(file);
		sink.put(ctx, &self.key(), &mut file, size).await?;
		info!(path = %path.display(), bytes = size, "archived directory");
		Ok(size)
	}

	async fn unarchive(
		&self,
		ctx: &Ctx,
		path: &Path,
		reporter: SharedReporter,
		source: &dyn ObjectSource,
	) -> TransferResult<()> {
		ensure_empty_target(path).await?;

		let staging = tokio::task::spawn_blocking(tempfile::tempfile)
			.await
			.map_err(|e| TransferError::Task(e.to_string()))?
			.map_err(|e| TransferError::io("create temporary archive", e))?;
		let mut staging = tokio::fs::File::from_std(staging);
		let size = source.get(ctx, &self.key(), &mut staging).await?;
		staging
			.flush()
			.await
			.map_err(|e| TransferError::io("write temporary archive", e))?;
		let staging = staging.into_std().await;

		let target = path.to_path_buf();
		let task_ctx = ctx.clone();
		tokio::task::spawn_blocking(move || unpack(&task_ctx, staging, &target, reporter, size))
			.await
			.map_err(|e| TransferError::Task(e.to_string()))??;
		info!(path = %path.display(), bytes = size, "unarchived dataset");
		Ok(())
	}
}

async fn ensure_empty_target(path: &Path) -> TransferResult<()> {
	let not_empty = || TransferError::NotEmpty {
		path: path.to_path_buf(),
	};
	match tokio::fs::metadata(path).await {
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(TransferError::io(format!("stat {}", path.display()), e)),
		Ok(meta) if !meta.is_dir() => Err(not_empty()),
		Ok(_) => {
			let mut entries = tokio::fs::read_dir(path)
				.await
				.map_err(|e| TransferError::io(format!("read {}", path.display()), e))?;
			match entries.next_entry().await {
				Ok(None) => Ok(()),
				Ok(Some(_)) => Err(not_empty()),
				Err(e) => Err(TransferError::io(format!("read {}", path.display()), e)),
			}
		}
	}
}

/// Fails reads once the context is done so blocking work stops promptly.
struct CtxReader<R> {
	inner: R,
	ctx: Ctx,
}

impl<R: Read> Read for CtxReader<R> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if let Some(reason) = self.ctx.err() {
			return Err(io::Error::new(io::ErrorKind::Other, reason));
		}
		self.inner.read(buf)
	}
}

/// Prefer the context's interruption over the I/O error it caused.
fn interrupted_or(ctx: &Ctx, context: impl Into<String>, err: io::Error) -> TransferError {
	match ctx.err() {
		Some(reason) => reason.into(),
		None => TransferError::io(context, err),
	}
}

/// Entry name with `/` separators, whatever the host uses.
fn archive_name(relative: &Path) -> String {
	relative
		.components()
		.filter_map(|c| match c {
			Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
			_ => None,
		})
		.collect::<Vec<_>>()
		.join("/")
}

fn pack(ctx: &Ctx, root: &Path, reporter: SharedReporter) -> TransferResult<(File, u64)> {
	let meta = fs::metadata(root).map_err(|e| TransferError::io(format!("stat {}", root.display()), e))?;
	if !meta.is_dir() {
		return Err(TransferError::io(
			format!("archive {}", root.display()),
			io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
		));
	}

	let walk_err = |e: walkdir::Error| TransferError::io(format!("walk {}", root.display()), e.into());

	let mut payload = 0u64;
	for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
		let entry = entry.map_err(walk_err)?;
		if entry.file_type().is_file() {
			payload += entry.metadata().map_err(walk_err)?.len();
		}
	}
	if payload == 0 {
		return Err(TransferError::EmptyDirectory {
			path: root.to_path_buf(),
		});
	}

	reporter.start("archiving", payload);
	let staging = tempfile::tempfile().map_err(|e| TransferError::io("create temporary archive", e))?;
	let mut builder = tar::Builder::new(staging);
	builder.follow_symlinks(false);

	for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
		if let Some(reason) = ctx.err() {
			return Err(reason.into());
		}
		let entry = entry.map_err(walk_err)?;
		let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
		let name = archive_name(relative);
		let file_type = entry.file_type();

		if file_type.is_dir() {
			builder
				.append_dir(&name, entry.path())
				.map_err(|e| interrupted_or(ctx, format!("archive {name}"), e))?;
		} else if file_type.is_file() {
			let meta = entry.metadata().map_err(walk_err)?;
			let mut header = tar::Header::new_gnu();
			header.set_metadata(&meta);
			header.set_size(meta.len());
			let file = File::open(entry.path())
				.map_err(|e| TransferError::io(format!("open {}", entry.path().display()), e))?;
			let reader = SyncProgressReader::new(
				CtxReader {
					inner: file,
					ctx: ctx.clone(),
				},
				reporter.clone(),
			);
			builder
				.append_data(&mut header, &name, reader)
				.map_err(|e| interrupted_or(ctx, format!("archive {name}"), e))?;
		} else {
			debug!(path = %entry.path().display(), "skipping symlink or special file");
		}
	}

	let mut staging = builder
		.into_inner()
		.map_err(|e| TransferError::io("finish archive", e))?;
	staging
		.flush()
		.map_err(|e| TransferError::io("finish archive", e))?;
	let size = staging
		.seek(SeekFrom::End(0))
		.and_then(|size| staging.seek(SeekFrom::Start(0)).map(|_| size))
		.map_err(|e| TransferError::io("rewind archive", e))?;
	reporter.finish();
	Ok((staging, size))
}

/// Resolve an entry path below `target`, rejecting anything that escapes it.
fn entry_destination(target: &Path, entry: &Path) -> TransferResult<Option<PathBuf>> {
	let mut dest = target.to_path_buf();
	let mut depth = 0;
	for component in entry.components() {
		match component {
			Component::Normal(part) => {
				dest.push(part);
				depth += 1;
			}
			Component::CurDir => {}
			_ => {
				return Err(TransferError::Archive {
					message: format!("entry {} escapes the target directory", entry.display()),
				})
			}
		}
	}
	Ok((depth > 0).then_some(dest))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
	Ok(())
}

fn create_new(path: &Path, mode: u32) -> io::Result<File> {
	let mut opts = OpenOptions::new();
	opts.write(true).create_new(true);
	#[cfg(unix)]
	{
		use std::os::unix::fs::OpenOptionsExt;
		opts.mode(mode & 0o777);
	}
	#[cfg(not(unix))]
	let _ = mode;
	opts.open(path)
}

fn unpack(
	ctx: &Ctx,
	mut staging: File,
	target: &Path,
	reporter: SharedReporter,
	size: u64,
) -> TransferResult<()> {
	staging
		.seek(SeekFrom::Start(0))
		.map_err(|e| TransferError::io("rewind archive", e))?;
	fs::create_dir_all(target).map_err(|e| TransferError::io(format!("create {}", target.display()), e))?;

	reporter.start("extracting", size);
	let reader = SyncProgressReader::new(
		CtxReader {
			inner: BufReader::new(staging),
			ctx: ctx.clone(),
		},
		reporter.clone(),
	);
	let mut archive = tar::Archive::new(reader);
	let mut dirs = Vec::new();

	let entries = archive
		.entries()
		.map_err(|e| interrupted_or(ctx, "read archive", e))?;
	for entry in entries {
		if let Some(reason) = ctx.err() {
			return Err(reason.into());
		}
		let mut entry = entry.map_err(|e| interrupted_or(ctx, "read archive", e))?;
		let relative = entry
			.path()
			.map_err(|e| interrupted_or(ctx, "read archive entry name", e))?
			.into_owned();
		let Some(dest) = entry_destination(target, &relative)? else {
			continue;
		};
		let mode = entry.header().mode().unwrap_or(0o644);

		match entry.header().entry_type() {
			tar::EntryType::Directory => {
				fs::create_dir_all(&dest)
					.map_err(|e| TransferError::io(format!("create {}", dest.display()), e))?;
				dirs.push((dest, mode));
			}
			tar::EntryType::Regular | tar::EntryType::Continuous => {
				if let Some(parent) = dest.parent() {
					fs::create_dir_all(parent)
						.map_err(|e| TransferError::io(format!("create {}", parent.display()), e))?;
				}
				let mut out = create_new(&dest, mode)
					.map_err(|e| TransferError::io(format!("create {}", dest.display()), e))?;
				io::copy(&mut entry, &mut out)
					.map_err(|e| interrupted_or(ctx, format!("extract {}", relative.display()), e))?;
				set_mode(&dest, mode)
					.map_err(|e| TransferError::io(format!("chmod {}", dest.display()), e))?;
			}
			other => {
				debug!(entry = %relative.display(), kind = ?other, "skipping non-regular entry");
			}
		}
	}

	// Deepest first so restrictive parent modes do not block children.
	dirs.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
	for (dir, mode) in dirs {
		set_mode(&dir, mode).map_err(|e| TransferError::io(format!("chmod {}", dir.display()), e))?;
	}
	reporter.finish();
	Ok(())
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Push, pull and removal through the manager against a local store.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nerd_common_core::{Ctx, ErrorKind, Kinded};
use nerd_kube::{ArchiverOptions, DatasetSpec, KubeError, StoreOptions, StoreType};
use nerd_transfer::{nop_reporter, DatasetRegistry, Manager, TransferResult};

#[derive(Default)]
struct MemoryRegistry {
	records: Mutex<HashMap<String, DatasetSpec>>,
}

fn missing(name: &str) -> KubeError {
	KubeError::NotExists {
		kind: "Dataset".into(),
		name: name.into(),
	}
}

#[async_trait]
impl DatasetRegistry for MemoryRegistry {
	async fn create(&self, _ctx: &Ctx, name: &str, spec: DatasetSpec) -> TransferResult<String> {
		let mut records = self.records.lock().unwrap();
		let name = if name.is_empty() {
			format!("gen{}", records.len())
		} else {
			name.to_string()
		};
		if records.contains_key(&name) {
			return Err(KubeError::AlreadyExists {
				kind: "Dataset".into(),
				name,
			}
			.into());
		}
		records.insert(name.clone(), spec);
		Ok(name)
	}

	async fn get(&self, _ctx: &Ctx, name: &str) -> TransferResult<DatasetSpec> {
		let records = self.records.lock().unwrap();
		Ok(records.get(name).cloned().ok_or_else(|| missing(name))?)
	}

	async fn set_size(&self, _ctx: &Ctx, name: &str, size: u64) -> TransferResult<()> {
		let mut records = self.records.lock().unwrap();
		let spec = records.get_mut(name).ok_or_else(|| missing(name))?;
		spec.size = size;
		Ok(())
	}

	async fn delete(&self, _ctx: &Ctx, name: &str) -> TransferResult<()> {
		let mut records = self.records.lock().unwrap();
		records.remove(name).map(|_| ()).ok_or_else(|| missing(name).into())
	}
}

struct Fixture {
	manager: Manager,
	registry: Arc<MemoryRegistry>,
	store_root: tempfile::TempDir,
	work: tempfile::TempDir,
}

impl Fixture {
	fn new() -> Self {
		let registry = Arc::new(MemoryRegistry::default());
		Self {
			manager: Manager::new(registry.clone()),
			registry,
			store_root: tempfile::tempdir().unwrap(),
			work: tempfile::tempdir().unwrap(),
		}
	}

	fn store_opts(&self) -> StoreOptions {
		let mut opts = StoreOptions::local(self.store_root.path().to_string_lossy());
		opts.s3_prefix = "datasets/".into();
		opts
	}

	/// `in/a/b.txt` holding "hello\n" and `in/c.txt` holding one byte.
	fn input(&self) -> std::path::PathBuf {
		let dir = self.work.path().join("in");
		fs::create_dir_all(dir.join("a")).unwrap();
		fs::write(dir.join("a/b.txt"), b"hello\n").unwrap();
		fs::write(dir.join("c.txt"), b"z").unwrap();
		dir
	}

	fn object_files(&self) -> usize {
		walk_files(self.store_root.path()).len()
	}
}

fn walk_files(root: &Path) -> Vec<(String, Vec<u8>)> {
	let mut files = Vec::new();
	let mut stack = vec![root.to_path_buf()];
	while let Some(dir) = stack.pop() {
		for entry in fs::read_dir(&dir).unwrap() {
			let entry = entry.unwrap();
			let path = entry.path();
			if entry.file_type().unwrap().is_dir() {
				stack.push(path);
			} else {
				let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
				files.push((rel, fs::read(&path).unwrap()));
			}
		}
	}
	files.sort();
	files
}

#[tokio::test]
async fn push_then_pull_restores_the_directory() {
	let fx = Fixture::new();
	let ctx = Ctx::background();
	let input = fx.input();

	let handle = fx
		.manager
		.create(&ctx, "ds1", fx.store_opts(), ArchiverOptions::tar())
		.await
		.unwrap();
	assert_eq!(handle.name(), "ds1");
	assert_eq!(fx.manager.info(&ctx, "ds1").await.unwrap(), 0);

	let mut handle = fx.manager.open(&ctx, "ds1").await.unwrap();
	let pushed = handle.push(&ctx, &input, nop_reporter()).await.unwrap();
	let size = fx.manager.info(&ctx, "ds1").await.unwrap();
	assert_eq!(size, pushed);
	assert!(size >= 7);

	let out = fx.work.path().join("out");
	handle.pull(&ctx, &out, nop_reporter()).await.unwrap();
	assert_eq!(walk_files(&input), walk_files(&out));
}

#[tokio::test]
async fn recorded_size_matches_stored_archive() {
	let fx = Fixture::new();
	let ctx = Ctx::background();
	let input = fx.input();

	let mut handle = fx
		.manager
		.create(&ctx, "ds1", fx.store_opts(), ArchiverOptions::tar())
		.await
		.unwrap();
	handle.push(&ctx, &input, nop_reporter()).await.unwrap();

	let spec = fx.registry.records.lock().unwrap().get("ds1").cloned().unwrap();
	let key = format!("datasets/{}archive.tar", spec.archiver_options.tar_key_prefix);
	let stored = fs::metadata(fx.store_root.path().join(key)).unwrap().len();
	assert_eq!(spec.size, stored);
}

#[tokio::test]
async fn key_prefixes_differ_per_dataset() {
	let fx = Fixture::new();
	let ctx = Ctx::background();
	for name in ["one", "two"] {
		fx.manager
			.create(&ctx, name, fx.store_opts(), ArchiverOptions::tar())
			.await
			.unwrap();
	}
	let records = fx.registry.records.lock().unwrap();
	let one = &records["one"].archiver_options.tar_key_prefix;
	let two = &records["two"].archiver_options.tar_key_prefix;
	assert_eq!(one.len(), 33);
	assert_ne!(one, two);
}

#[tokio::test]
async fn second_remove_reports_not_exists() {
	let fx = Fixture::new();
	let ctx = Ctx::background();
	let input = fx.input();
	let mut handle = fx
		.manager
		.create(&ctx, "ds1", fx.store_opts(), ArchiverOptions::tar())
		.await
		.unwrap();
	handle.push(&ctx, &input, nop_reporter()).await.unwrap();
	assert_eq!(fx.object_files(), 1);

	fx.manager.remove(&ctx, "ds1").await.unwrap();
	assert_eq!(fx.object_files(), 0);

	let err = fx.manager.remove(&ctx, "ds1").await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotExists);
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
	let fx = Fixture::new();
	let ctx = Ctx::background();
	fx.manager
		.create(&ctx, "dup", fx.store_opts(), ArchiverOptions::tar())
		.await
		.unwrap();
	let err = fx
		.manager
		.create(&ctx, "dup", fx.store_opts(), ArchiverOptions::tar())
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn unknown_store_type_fails_before_recording() {
	let fx = Fixture::new();
	let opts = StoreOptions {
		store_type: StoreType::Other("gcs".into()),
		..Default::default()
	};
	let err = fx
		.manager
		.create(&Ctx::background(), "ds1", opts, ArchiverOptions::tar())
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unsupported);
	assert!(fx.registry.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pull_into_populated_directory_is_refused() {
	let fx = Fixture::new();
	let ctx = Ctx::background();
	let input = fx.input();
	let mut handle = fx
		.manager
		.create(&ctx, "ds1", fx.store_opts(), ArchiverOptions::tar())
		.await
		.unwrap();
	handle.push(&ctx, &input, nop_reporter()).await.unwrap();

	let err = handle.pull(&ctx, &input, nop_reporter()).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotEmpty);
}

#[tokio::test]
async fn cancelled_push_leaves_size_untouched() {
	let fx = Fixture::new();
	let ctx = Ctx::background();
	let input = fx.input();
	let mut handle = fx
		.manager
		.create(&ctx, "ds1", fx.store_opts(), ArchiverOptions::tar())
		.await
		.unwrap();

	let cancelled = ctx.child();
	cancelled.cancel();
	let err = handle.push(&cancelled, &input, nop_reporter()).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Cancelled);
	assert_eq!(fx.manager.info(&ctx, "ds1").await.unwrap(), 0);
}

#[tokio::test]
async fn clear_resets_size() {
	let fx = Fixture::new();
	let ctx = Ctx::background();
	let input = fx.input();
	let mut handle = fx
		.manager
		.create(&ctx, "ds1", fx.store_opts(), ArchiverOptions::tar())
		.await
		.unwrap();
	handle.push(&ctx, &input, nop_reporter()).await.unwrap();
	handle.clear(&ctx, nop_reporter()).await.unwrap();

	assert_eq!(fx.manager.info(&ctx, "ds1").await.unwrap(), 0);
	let err = handle
		.pull(&ctx, &fx.work.path().join("out"), nop_reporter())
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::ObjectNotExists);
}

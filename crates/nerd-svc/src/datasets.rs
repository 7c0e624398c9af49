// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dataset records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nerd_common_core::Ctx;
use nerd_kube::{ArchiverOptions, Dataset, DatasetSpec, ListOptions, StoreOptions};
use nerd_transfer::{generate_key_prefix, DatasetRegistry, TransferResult};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::SvcResult;
use crate::kube::{created_at, name_of, Kube};
use crate::validate::{printascii, required, Validate};

#[derive(Debug, Clone, Default)]
pub struct CreateDatasetInput {
	/// Empty asks the apiserver to generate one.
	pub name: String,
	pub store_options: Option<StoreOptions>,
	pub archiver_options: Option<ArchiverOptions>,
}

impl Validate for CreateDatasetInput {
	fn validate(&self) -> SvcResult<()> {
		printascii("name", &self.name)?;
		if self.store_options.is_none() {
			required("store_options", "")?;
		}
		if self.archiver_options.is_none() {
			required("archiver_options", "")?;
		}
		Ok(())
	}
}

/// Partial update; `None` and empty fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct UpdateDatasetInput {
	pub name: String,
	pub size: Option<u64>,
	/// Appended to the recorded consumers.
	pub input_for: Vec<String>,
	/// Appended to the recorded producers.
	pub output_from: Vec<String>,
}

impl Validate for UpdateDatasetInput {
	fn validate(&self) -> SvcResult<()> {
		required("name", &self.name)?;
		printascii("name", &self.name)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOutput {
	pub name: String,
	pub created_at: Option<DateTime<Utc>>,
	pub size: u64,
	pub input_for: Vec<String>,
	pub output_from: Vec<String>,
	pub store_type: String,
	pub bucket: String,
	pub key_prefix: String,
}

impl From<Dataset> for DatasetOutput {
	fn from(ds: Dataset) -> Self {
		Self {
			name: name_of(&ds.metadata),
			created_at: created_at(&ds.metadata),
			size: ds.spec.size,
			store_type: ds.spec.store_options.store_type.to_string(),
			bucket: ds.spec.store_options.s3_bucket,
			key_prefix: ds.spec.archiver_options.tar_key_prefix,
			input_for: ds.spec.input_for,
			output_from: ds.spec.output_from,
		}
	}
}

impl Kube {
	/// Record a dataset under a fresh key prefix. Returns the stored record
	/// with its final name.
	#[instrument(skip(self, ctx, input), fields(dataset = %input.name))]
	pub async fn create_dataset(&self, ctx: &Ctx, input: &CreateDatasetInput) -> SvcResult<DatasetOutput> {
		input.validate()?;
		let mut archiver_options = input.archiver_options.clone().unwrap_or_default();
		archiver_options.tar_key_prefix = generate_key_prefix();
		let spec = DatasetSpec {
			store_options: input.store_options.clone().unwrap_or_default(),
			archiver_options,
			..Default::default()
		};
		let created = self.kv.create(ctx, Dataset::new("", spec), &input.name).await?;
		let out = DatasetOutput::from(created);
		info!(name = %out.name, "created dataset");
		Ok(out)
	}

	#[instrument(skip(self, ctx))]
	pub async fn get_dataset(&self, ctx: &Ctx, name: &str) -> SvcResult<DatasetOutput> {
		required("name", name)?;
		Ok(self.kv.get::<Dataset>(ctx, name).await?.into())
	}

	/// Drop the record only. Stored objects stay; use the transfer manager
	/// to purge them as well.
	#[instrument(skip(self, ctx))]
	pub async fn delete_dataset(&self, ctx: &Ctx, name: &str) -> SvcResult<()> {
		required("name", name)?;
		self.kv.delete::<Dataset>(ctx, name).await?;
		info!("deleted dataset");
		Ok(())
	}

	/// Newest first.
	#[instrument(skip(self, ctx))]
	pub async fn list_datasets(&self, ctx: &Ctx) -> SvcResult<Vec<DatasetOutput>> {
		let mut items: Vec<DatasetOutput> = self
			.kv
			.list::<Dataset>(ctx, &ListOptions::new())
			.await?
			.into_iter()
			.map(DatasetOutput::from)
			.collect();
		items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
		Ok(items)
	}

	#[instrument(skip(self, ctx, input), fields(dataset = %input.name))]
	pub async fn update_dataset(&self, ctx: &Ctx, input: &UpdateDatasetInput) -> SvcResult<DatasetOutput> {
		input.validate()?;
		let mut ds = self.kv.get::<Dataset>(ctx, &input.name).await?;
		if let Some(size) = input.size {
			ds.spec.size = size;
		}
		ds.spec.input_for.extend(input.input_for.iter().cloned());
		ds.spec.output_from.extend(input.output_from.iter().cloned());
		let updated = self.kv.update(ctx, ds, &input.name).await?;
		Ok(updated.into())
	}
}

#[async_trait]
impl DatasetRegistry for Kube {
	async fn create(&self, ctx: &Ctx, name: &str, spec: DatasetSpec) -> TransferResult<String> {
		let created = self.kv.create(ctx, Dataset::new("", spec), name).await?;
		Ok(name_of(&created.metadata))
	}

	async fn get(&self, ctx: &Ctx, name: &str) -> TransferResult<DatasetSpec> {
		Ok(self.kv.get::<Dataset>(ctx, name).await?.spec)
	}

	async fn set_size(&self, ctx: &Ctx, name: &str, size: u64) -> TransferResult<()> {
		let mut ds = self.kv.get::<Dataset>(ctx, name).await?;
		ds.spec.size = size;
		self.kv.update(ctx, ds, name).await?;
		Ok(())
	}

	async fn delete(&self, ctx: &Ctx, name: &str) -> TransferResult<()> {
		self.kv.delete::<Dataset>(ctx, name).await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use nerd_common_core::{ErrorKind, Kinded};

	#[test]
	fn create_requires_both_option_sets() {
		let input = CreateDatasetInput {
			name: "ds1".into(),
			store_options: Some(StoreOptions::s3("b1")),
			archiver_options: None,
		};
		let err = input.validate().unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Validation);
		assert!(err.to_string().contains("archiver_options"));

		let input = CreateDatasetInput {
			archiver_options: Some(ArchiverOptions::tar()),
			..input
		};
		assert!(input.validate().is_ok());
	}

	#[test]
	fn output_hides_credentials() {
		let mut spec = DatasetSpec::default();
		spec.store_options = StoreOptions::s3("b1");
		spec.store_options.s3_secret_key = "hunter2".into();
		let out = DatasetOutput::from(Dataset::new("ds1", spec));
		let json = serde_json::to_string(&out).unwrap();
		assert!(json.contains("\"bucket\":\"b1\""));
		assert!(!json.contains("hunter2"));
	}
}

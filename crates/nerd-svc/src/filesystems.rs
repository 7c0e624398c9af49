// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Network filesystems backed by persistent volume claims.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, VolumeResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use nerd_common_core::Ctx;
use nerd_kube::{parse_quantity, KubeError, ListOptions, PersistentVolume, PersistentVolumeClaim};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::SvcResult;
use crate::kube::{created_at, name_of, Kube};
use crate::validate::{printascii, required, Validate};

pub const WEBDAV_HOST_ANNOTATION: &str = "webdavHost";
pub const WEBDAV_PORT_ANNOTATION: &str = "webdavPort";
pub const WEBDAV_PATH_ANNOTATION: &str = "webdavPath";

const ACCESS_MODE: &str = "ReadWriteMany";

/// Storage class whose provisioner serves filesystems over WebDAV.
pub const STORAGE_CLASS: &str = "nerdalize";

const VOLUME_MODE: &str = "Filesystem";

#[derive(Debug, Clone, Default)]
pub struct CreateFileSystemInput {
	/// Empty asks the apiserver to generate one.
	pub name: String,
	/// Kubernetes quantity, e.g. `10Gi`.
	pub capacity: String,
}

impl Validate for CreateFileSystemInput {
	fn validate(&self) -> SvcResult<()> {
		printascii("name", &self.name)?;
		required("capacity", &self.capacity)?;
		parse_quantity(&self.capacity)?;
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSystemOutput {
	pub name: String,
	pub created_at: Option<DateTime<Utc>>,
	pub capacity: String,
	/// Claim phase: `Pending`, `Bound` or `Lost`.
	pub phase: String,
	pub volume: Option<String>,
}

/// Where a bound filesystem can be reached over WebDAV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebDavCoordinates {
	pub volume: String,
	pub host: String,
	/// 0 when the annotation is missing or not a number.
	pub port: u16,
	pub path: String,
}

impl From<PersistentVolumeClaim> for FileSystemOutput {
	fn from(pvc: PersistentVolumeClaim) -> Self {
		let spec = pvc.spec.unwrap_or_default();
		let capacity = spec
			.resources
			.and_then(|r| r.requests)
			.and_then(|mut r| r.remove("storage"))
			.map(|q| q.0)
			.unwrap_or_default();
		Self {
			name: name_of(&pvc.metadata),
			created_at: created_at(&pvc.metadata),
			capacity,
			phase: pvc.status.and_then(|s| s.phase).unwrap_or_default(),
			volume: spec.volume_name,
		}
	}
}

pub(crate) fn webdav_coordinates(pv: &PersistentVolume) -> WebDavCoordinates {
	let annotation = |key: &str| {
		pv.metadata
			.annotations
			.as_ref()
			.and_then(|a| a.get(key))
			.cloned()
			.unwrap_or_default()
	};
	WebDavCoordinates {
		volume: name_of(&pv.metadata),
		host: annotation(WEBDAV_HOST_ANNOTATION),
		port: annotation(WEBDAV_PORT_ANNOTATION).trim().parse().unwrap_or(0),
		path: annotation(WEBDAV_PATH_ANNOTATION),
	}
}

impl Kube {
	#[instrument(skip(self, ctx, input), fields(filesystem = %input.name, capacity = %input.capacity))]
	pub async fn create_file_system(
		&self,
		ctx: &Ctx,
		input: &CreateFileSystemInput,
	) -> SvcResult<FileSystemOutput> {
		input.validate()?;
		let pvc = PersistentVolumeClaim {
			spec: Some(PersistentVolumeClaimSpec {
				access_modes: Some(vec![ACCESS_MODE.to_string()]),
				storage_class_name: Some(STORAGE_CLASS.to_string()),
				volume_mode: Some(VOLUME_MODE.to_string()),
				resources: Some(VolumeResourceRequirements {
					requests: Some(BTreeMap::from([(
						"storage".to_string(),
						Quantity(input.capacity.clone()),
					)])),
					..Default::default()
				}),
				..Default::default()
			}),
			..Default::default()
		};
		let created = self.kv.create(ctx, pvc, &input.name).await?;
		let out = FileSystemOutput::from(created);
		info!(name = %out.name, "created filesystem");
		Ok(out)
	}

	#[instrument(skip(self, ctx))]
	pub async fn get_file_system(&self, ctx: &Ctx, name: &str) -> SvcResult<FileSystemOutput> {
		required("name", name)?;
		Ok(self.kv.get::<PersistentVolumeClaim>(ctx, name).await?.into())
	}

	#[instrument(skip(self, ctx))]
	pub async fn delete_file_system(&self, ctx: &Ctx, name: &str) -> SvcResult<()> {
		required("name", name)?;
		self.kv.delete::<PersistentVolumeClaim>(ctx, name).await?;
		info!("deleted filesystem");
		Ok(())
	}

	/// Newest first.
	#[instrument(skip(self, ctx))]
	pub async fn list_file_systems(&self, ctx: &Ctx) -> SvcResult<Vec<FileSystemOutput>> {
		let mut items: Vec<FileSystemOutput> = self
			.kv
			.list::<PersistentVolumeClaim>(ctx, &ListOptions::new())
			.await?
			.into_iter()
			.map(FileSystemOutput::from)
			.collect();
		items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
		Ok(items)
	}

	/// WebDAV coordinates of the volume bound to the filesystem `name`.
	#[instrument(skip(self, ctx))]
	pub async fn get_persistent_volume(&self, ctx: &Ctx, name: &str) -> SvcResult<WebDavCoordinates> {
		required("name", name)?;
		let pvc = self.kv.get::<PersistentVolumeClaim>(ctx, name).await?;
		let volume = pvc
			.spec
			.and_then(|s| s.volume_name)
			.filter(|v| !v.is_empty())
			.ok_or_else(|| KubeError::NotExists {
				kind: "PersistentVolume".to_string(),
				name: format!("bound to {name}"),
			})?;
		let pv = self.kv.get_cluster::<PersistentVolume>(ctx, &volume).await?;
		Ok(webdav_coordinates(&pv))
	}
}

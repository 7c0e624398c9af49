// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The `Dataset` custom resource.

use std::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DATASET_GROUP: &str = "stable.nerdalize.com";
pub const DATASET_PLURAL: &str = "datasets";

/// A named archive in object storage, tracked on the cluster.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
	group = "stable.nerdalize.com",
	version = "v1",
	kind = "Dataset",
	plural = "datasets",
	namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSpec {
	/// Bytes pushed by the last successful transfer.
	#[serde(default)]
	pub size: u64,
	/// Jobs that consumed this dataset, oldest first.
	#[serde(default)]
	pub input_for: Vec<String>,
	/// Jobs that produced this dataset, oldest first.
	#[serde(default)]
	pub output_from: Vec<String>,
	#[serde(default)]
	pub store_options: StoreOptions,
	#[serde(default)]
	pub archiver_options: ArchiverOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreType {
	#[default]
	S3,
	Local,
	Other(String),
}

impl StoreType {
	pub fn as_str(&self) -> &str {
		match self {
			StoreType::S3 => "s3",
			StoreType::Local => "local",
			StoreType::Other(s) => s,
		}
	}
}

impl From<String> for StoreType {
	fn from(value: String) -> Self {
		match value.as_str() {
			"s3" => StoreType::S3,
			"local" => StoreType::Local,
			_ => StoreType::Other(value),
		}
	}
}

impl fmt::Display for StoreType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Serialize for StoreType {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for StoreType {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(StoreType::from)
	}
}

/// Where a dataset's objects live. Credentials are stored in the clear on
/// the resource, as the flex-volume driver reads them from there.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreOptions {
	#[serde(rename = "type", default)]
	#[schemars(with = "String")]
	pub store_type: StoreType,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub s3_bucket: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub s3_prefix: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub s3_aws_region: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub s3_access_key: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub s3_secret_key: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub s3_session_token: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub s3_endpoint: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub local_root: String,
}

impl StoreOptions {
	pub fn s3(bucket: impl Into<String>) -> Self {
		Self {
			store_type: StoreType::S3,
			s3_bucket: bucket.into(),
			..Default::default()
		}
	}

	pub fn local(root: impl Into<String>) -> Self {
		Self {
			store_type: StoreType::Local,
			local_root: root.into(),
			..Default::default()
		}
	}
}

impl fmt::Debug for StoreOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let redact = |s: &String| if s.is_empty() { "" } else { "[REDACTED]" };
		f.debug_struct("StoreOptions")
			.field("type", &self.store_type)
			.field("s3_bucket", &self.s3_bucket)
			.field("s3_prefix", &self.s3_prefix)
			.field("s3_aws_region", &self.s3_aws_region)
			.field("s3_access_key", &self.s3_access_key)
			.field("s3_secret_key", &redact(&self.s3_secret_key))
			.field("s3_session_token", &redact(&self.s3_session_token))
			.field("s3_endpoint", &self.s3_endpoint)
			.field("local_root", &self.local_root)
			.finish()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArchiverType {
	#[default]
	Tar,
	Other(String),
}

impl ArchiverType {
	pub fn as_str(&self) -> &str {
		match self {
			ArchiverType::Tar => "tar",
			ArchiverType::Other(s) => s,
		}
	}
}

impl From<String> for ArchiverType {
	fn from(value: String) -> Self {
		match value.as_str() {
			"tar" => ArchiverType::Tar,
			_ => ArchiverType::Other(value),
		}
	}
}

impl fmt::Display for ArchiverType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Serialize for ArchiverType {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for ArchiverType {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(ArchiverType::from)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArchiverOptions {
	#[serde(rename = "type", default)]
	#[schemars(with = "String")]
	pub archiver_type: ArchiverType,
	/// Random hex plus `/`, assigned once when the dataset is created.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub tar_key_prefix: String,
}

impl ArchiverOptions {
	pub fn tar() -> Self {
		Self::default()
	}
}

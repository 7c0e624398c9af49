// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Service operations for nerd.
//!
//! Every operation hangs off [`Kube`], which owns a [`nerd_kube::Kubevisor`]
//! bound to one namespace. Operations share one shape:
//! - validate the input ([`Validate`]) before touching the cluster
//! - call the Kubevisor, which adds name prefixes and the tenancy label
//! - derive status where needed and return a plain output struct
//!
//! Errors are [`SvcError`]; their [`nerd_common_core::ErrorKind`] survives
//! every wrapping layer.

mod compliance;
mod datasets;
mod error;
mod filesystems;
mod jobs;
mod kube;
mod quotas;
mod secrets;
mod validate;

pub use compliance::{parse_manifests, Compliance, ComplianceReport, Manifest, FETCH_TIMEOUT};
pub use datasets::{CreateDatasetInput, DatasetOutput, UpdateDatasetInput};
pub use error::{SvcError, SvcResult};
pub use filesystems::{
	CreateFileSystemInput, FileSystemOutput, WebDavCoordinates, STORAGE_CLASS,
	WEBDAV_HOST_ANNOTATION, WEBDAV_PATH_ANNOTATION, WEBDAV_PORT_ANNOTATION,
};
pub use jobs::{
	derive_active_state, derive_phase, ActiveState, DatasetMount, FetchJobLogsInput, JobDetails,
	JobLogs, JobPhase, JobView, RunJobInput, DATASET_DRIVER, JOB_CONTAINER,
};
pub use kube::{Kube, KubeSettings};
pub use quotas::{QuotaAmounts, QuotaOutput, LIMITS_CPU, LIMITS_MEMORY, REQUESTS_CPU, REQUESTS_MEMORY};
pub use secrets::{
	CreateSecretInput, ImageRef, SecretOutput, UpdateSecretInput, DOCKER_CONFIG_KEY,
	DOCKER_CONFIG_TYPE, DOCKER_HUB, IMAGE_LABEL, PROJECT_LABEL, REGISTRY_LABEL,
};
pub use validate::Validate;

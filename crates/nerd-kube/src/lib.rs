// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Namespaced, prefix-managed facade over the Kubernetes API.
//!
//! This crate provides:
//! - [`K8sClient`]: an object-safe seam over the apiserver, with the
//!   production [`KubeClient`] and the in-memory [`MockK8sClient`]
//! - [`Kubevisor`]: typed CRUD that owns name prefixes, the `nerd-app=cli`
//!   tenancy label and error classification
//! - the [`Dataset`] custom resource and Kubernetes quantity parsing

mod client;
mod dataset;
mod error;
mod kube_client;
mod kubevisor;
mod mock;
mod quantity;
mod resource;
mod shards;

pub use client::{K8sClient, LogOptions};
pub use dataset::{
	ArchiverOptions, ArchiverType, Dataset, DatasetSpec, StoreOptions, StoreType, DATASET_GROUP,
	DATASET_PLURAL,
};
pub use error::{KubeError, KubeResult};
pub use kube_client::KubeClient;
pub use kubevisor::{Kubevisor, ListOptions, MAX_LOG_BYTES};
pub use mock::MockK8sClient;
pub use quantity::parse_quantity;
pub use resource::{
	generate_prefix, prefixed, unprefixed, Managed, GENERIC_PREFIX, MANAGED_LABEL, MANAGED_PREFIXES,
	MANAGED_VALUE,
};
pub use shards::{collect_job_shards, JobShards};

pub use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
pub use k8s_openapi::api::batch::v1::{Job, JobSpec, JobStatus};
pub use k8s_openapi::api::core::v1::{
	Event, PersistentVolume, PersistentVolumeClaim, Pod, ResourceQuota, Secret, ServiceAccount,
};
pub use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
pub use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

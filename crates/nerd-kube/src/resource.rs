// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kinds the Kubevisor manages and their naming discipline.

use std::fmt::Debug;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
	Event, PersistentVolume, PersistentVolumeClaim, Pod, ResourceQuota, Secret, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};

use crate::dataset::Dataset;

/// Label key for identifying resources managed by nerd.
pub const MANAGED_LABEL: &str = "nerd-app";

/// Label value for resources managed by nerd.
pub const MANAGED_VALUE: &str = "cli";

/// Used as `generateName` for kinds without a prefix of their own.
pub const GENERIC_PREFIX: &str = "x-";

/// Every prefix that may be stripped from a listed name.
pub const MANAGED_PREFIXES: [&str; 5] = ["j-", "d-", "s-", "fs-", GENERIC_PREFIX];

/// A typed resource the Kubevisor can create, read, list and delete.
pub trait Managed:
	Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
	/// Prepended to caller-supplied names on write, stripped on read.
	const PREFIX: &'static str;

	/// Cluster-scoped kinds ignore the Kubevisor's namespace.
	const CLUSTER_SCOPED: bool = false;
}

macro_rules! managed {
	($($ty:ty => $prefix:expr),* $(,)?) => {
		$(impl Managed for $ty {
			const PREFIX: &'static str = $prefix;
		})*
	};
}

macro_rules! cluster_managed {
	($($ty:ty),* $(,)?) => {
		$(impl Managed for $ty {
			const PREFIX: &'static str = "";
			const CLUSTER_SCOPED: bool = true;
		})*
	};
}

managed! {
	Job => "j-",
	Dataset => "d-",
	Secret => "s-",
	PersistentVolumeClaim => "fs-",
	Pod => "",
	Event => "",
	ResourceQuota => "",
	DaemonSet => "",
	Deployment => "",
	Role => "",
	RoleBinding => "",
	ServiceAccount => "",
}

cluster_managed! {
	PersistentVolume,
	CustomResourceDefinition,
	ClusterRole,
	ClusterRoleBinding,
}

/// Name as stored on the apiserver.
pub fn prefixed<K: Managed>(name: &str) -> String {
	format!("{}{}", K::PREFIX, name)
}

/// Name as shown to callers.
pub fn unprefixed<K: Managed>(name: &str) -> String {
	if K::PREFIX.is_empty() {
		return name.to_string();
	}
	name.strip_prefix(K::PREFIX).unwrap_or(name).to_string()
}

/// `generateName` used when the caller leaves the name empty.
pub fn generate_prefix<K: Managed>() -> &'static str {
	if K::PREFIX.is_empty() {
		GENERIC_PREFIX
	} else {
		K::PREFIX
	}
}

/// Human readable kind used in error messages.
pub(crate) fn kind_name<K: Managed>() -> String {
	K::kind(&()).into_owned()
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn prefixes_follow_kind() {
		assert_eq!(prefixed::<Job>("train"), "j-train");
		assert_eq!(prefixed::<Dataset>("ds1"), "d-ds1");
		assert_eq!(prefixed::<Secret>("quay"), "s-quay");
		assert_eq!(prefixed::<PersistentVolumeClaim>("home"), "fs-home");
		assert_eq!(prefixed::<Pod>("p"), "p");
	}

	#[test]
	fn caller_names_are_taken_verbatim() {
		assert_eq!(prefixed::<Job>("j-train"), "j-j-train");
		assert_eq!(unprefixed::<Job>("j-j-train"), "j-train");
	}

	#[test]
	fn unprefix_only_strips_own_prefix() {
		assert_eq!(unprefixed::<Job>("j-train"), "train");
		assert_eq!(unprefixed::<Job>("d-train"), "d-train");
		assert_eq!(unprefixed::<Pod>("j-train-abcde"), "j-train-abcde");
	}

	#[test]
	fn generated_names_fall_back_to_generic_prefix() {
		assert_eq!(generate_prefix::<Job>(), "j-");
		assert_eq!(generate_prefix::<ServiceAccount>(), GENERIC_PREFIX);
	}

	#[test]
	fn scope_flags() {
		assert!(ClusterRole::CLUSTER_SCOPED);
		assert!(PersistentVolume::CLUSTER_SCOPED);
		assert!(!Dataset::CLUSTER_SCOPED);
		assert!(!Job::CLUSTER_SCOPED);
	}

	#[test]
	fn kind_names() {
		assert_eq!(kind_name::<Dataset>(), "Dataset");
		assert_eq!(kind_name::<PersistentVolumeClaim>(), "PersistentVolumeClaim");
	}

	proptest! {
		#[test]
		fn prefix_round_trips(name in "[a-z0-9]([a-z0-9-]{0,30}[a-z0-9])?") {
			prop_assert_eq!(unprefixed::<Dataset>(&prefixed::<Dataset>(&name)), name.clone());
			prop_assert!(prefixed::<Secret>(&name).starts_with("s-"));
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory apiserver backing the test suites.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use kube::api::{ApiResource, DynamicObject, ListParams};
use kube::error::ErrorResponse;
use rand::seq::SliceRandom;
use serde_json::Value;

use crate::client::{K8sClient, LogOptions};
use crate::kubevisor::api_resource;
use crate::resource::Managed;

/// Alphabet the apiserver draws `generateName` suffixes from.
const SUFFIX_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
const SUFFIX_LEN: usize = 5;

type Key = (String, Option<String>, String);

#[derive(Default)]
struct MockState {
	objects: BTreeMap<Key, Value>,
	logs: HashMap<(String, String, String), String>,
	namespaces: Option<BTreeSet<String>>,
	failures: VecDeque<ErrorResponse>,
	revision: u64,
}

/// An apiserver stand-in that enforces name uniqueness, `generateName`,
/// DNS-1123 names, optimistic concurrency, label and field selectors.
#[derive(Default)]
pub struct MockK8sClient {
	state: Mutex<MockState>,
}

impl MockK8sClient {
	/// Every namespace is treated as existing.
	pub fn new() -> Self {
		Self::default()
	}

	/// Only the given namespaces exist; calls elsewhere fail like a real
	/// apiserver does for a missing namespace.
	pub fn with_namespaces<I, S>(namespaces: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mock = Self::default();
		mock.lock().namespaces = Some(namespaces.into_iter().map(Into::into).collect());
		mock
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Store `obj` as-is, bypassing prefixing and labeling. The object's
	/// own name and namespace are used.
	pub fn insert<K: Managed>(&self, obj: K) {
		let resource = api_resource::<K>();
		let Ok(mut value) = serde_json::to_value(&obj) else {
			return;
		};
		value["apiVersion"] = Value::String(resource.api_version.clone());
		value["kind"] = Value::String(resource.kind.clone());

		let mut state = self.lock();
		let name = str_at(&value, "metadata.name").unwrap_or_default();
		let namespace = str_at(&value, "metadata.namespace");
		state.stamp(&mut value, true);
		state.objects.insert((resource.plural, namespace, name), value);
	}

	/// Mutate a stored object in place. `name` is the stored, prefixed name.
	pub fn patch<K: Managed>(&self, namespace: Option<&str>, name: &str, f: impl FnOnce(&mut K)) -> bool {
		let resource = api_resource::<K>();
		let key = (resource.plural, namespace.map(str::to_string), name.to_string());
		let mut state = self.lock();
		let Some(value) = state.objects.get(&key).cloned() else {
			return false;
		};
		let Ok(mut obj) = serde_json::from_value::<K>(value) else {
			return false;
		};
		f(&mut obj);
		let Ok(mut value) = serde_json::to_value(&obj) else {
			return false;
		};
		state.stamp(&mut value, false);
		state.objects.insert(key, value);
		true
	}

	/// Read a stored object by its stored, prefixed name.
	pub fn fetch<K: Managed>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
		let resource = api_resource::<K>();
		let key = (resource.plural, namespace.map(str::to_string), name.to_string());
		let value = self.lock().objects.get(&key).cloned()?;
		serde_json::from_value(value).ok()
	}

	pub fn contains(&self, plural: &str, namespace: Option<&str>, name: &str) -> bool {
		let key = (
			plural.to_string(),
			namespace.map(str::to_string),
			name.to_string(),
		);
		self.lock().objects.contains_key(&key)
	}

	/// Number of stored objects of a resource plural, across namespaces.
	pub fn count(&self, plural: &str) -> usize {
		self
			.lock()
			.objects
			.keys()
			.filter(|(p, _, _)| p == plural)
			.count()
	}

	pub fn set_logs(&self, namespace: &str, pod: &str, container: &str, logs: impl Into<String>) {
		self.lock().logs.insert(
			(namespace.to_string(), pod.to_string(), container.to_string()),
			logs.into(),
		);
	}

	/// Make the next call fail with the given apiserver status.
	pub fn fail_next(&self, reason: &str, code: u16, message: &str) {
		self.lock().failures.push_back(ErrorResponse {
			status: "Failure".to_string(),
			message: message.to_string(),
			reason: reason.to_string(),
			code,
		});
	}
}

impl MockState {
	fn take_failure(&mut self) -> Result<(), kube::Error> {
		match self.failures.pop_front() {
			Some(resp) => Err(kube::Error::Api(resp)),
			None => Ok(()),
		}
	}

	fn check_namespace(&self, namespace: Option<&str>) -> Result<(), kube::Error> {
		match (namespace, &self.namespaces) {
			(Some(ns), Some(known)) if !known.contains(ns) => Err(status(
				"NotFound",
				404,
				format!("namespaces \"{ns}\" not found"),
			)),
			_ => Ok(()),
		}
	}

	/// Assign a new resourceVersion and, for new objects, server-side metadata.
	fn stamp(&mut self, value: &mut Value, fresh: bool) {
		self.revision += 1;
		let revision = self.revision;
		let meta = &mut value["metadata"];
		if !meta.is_object() {
			*meta = Value::Object(Default::default());
		}
		meta["resourceVersion"] = Value::String(revision.to_string());
		if fresh {
			if meta.get("creationTimestamp").map_or(true, Value::is_null) {
				meta["creationTimestamp"] = Value::String(created_at(revision).to_rfc3339());
			}
			if meta.get("uid").map_or(true, Value::is_null) {
				meta["uid"] = Value::String(format!("00000000-0000-0000-0000-{revision:012}"));
			}
		}
	}
}

fn created_at(revision: u64) -> DateTime<Utc> {
	let base = Utc
		.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
		.single()
		.unwrap_or_else(Utc::now);
	base + Duration::seconds(revision as i64)
}

fn status(reason: &str, code: u16, message: String) -> kube::Error {
	kube::Error::Api(ErrorResponse {
		status: "Failure".to_string(),
		message,
		reason: reason.to_string(),
		code,
	})
}

fn not_found(plural: &str, name: &str) -> kube::Error {
	status("NotFound", 404, format!("{plural} \"{name}\" not found"))
}

fn str_at(value: &Value, path: &str) -> Option<String> {
	let mut current = value;
	for part in path.split('.') {
		current = current.get(part)?;
	}
	match current {
		Value::String(s) => Some(s.clone()),
		Value::Null => None,
		other => Some(other.to_string()),
	}
}

fn random_suffix() -> String {
	let mut rng = rand::thread_rng();
	(0..SUFFIX_LEN)
		.filter_map(|_| SUFFIX_ALPHABET.choose(&mut rng).map(|b| *b as char))
		.collect()
}

/// Lowercase RFC 1123 subdomain.
fn is_dns1123_subdomain(name: &str) -> bool {
	if name.is_empty() || name.len() > 253 {
		return false;
	}
	name.split('.').all(|label| {
		let bytes = label.as_bytes();
		!bytes.is_empty()
			&& bytes
				.iter()
				.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
			&& bytes[0] != b'-'
			&& bytes[bytes.len() - 1] != b'-'
	})
}

fn labels_match(value: &Value, selector: &str) -> bool {
	let labels = value
		.get("metadata")
		.and_then(|m| m.get("labels"))
		.and_then(Value::as_object);
	let get = |key: &str| labels.and_then(|l| l.get(key)).and_then(Value::as_str);

	selector
		.split(',')
		.map(str::trim)
		.filter(|term| !term.is_empty())
		.all(|term| {
			if let Some((key, want)) = term.split_once("!=") {
				get(key.trim()) != Some(want.trim())
			} else if let Some((key, want)) = term.split_once("==").or_else(|| term.split_once('=')) {
				get(key.trim()) == Some(want.trim())
			} else if let Some(key) = term.strip_prefix('!') {
				get(key.trim()).is_none()
			} else {
				get(term).is_some()
			}
		})
}

fn fields_match(value: &Value, selector: &str) -> bool {
	selector
		.split(',')
		.map(str::trim)
		.filter(|term| !term.is_empty())
		.all(|term| {
			if let Some((path, want)) = term.split_once("!=") {
				str_at(value, path.trim()).as_deref() != Some(want.trim())
			} else if let Some((path, want)) = term.split_once("==").or_else(|| term.split_once('=')) {
				str_at(value, path.trim()).as_deref() == Some(want.trim())
			} else {
				false
			}
		})
}

fn to_value(obj: &DynamicObject) -> Result<Value, kube::Error> {
	serde_json::to_value(obj).map_err(kube::Error::SerdeError)
}

fn to_object(value: Value) -> Result<DynamicObject, kube::Error> {
	serde_json::from_value(value).map_err(kube::Error::SerdeError)
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn create(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		obj: DynamicObject,
	) -> Result<DynamicObject, kube::Error> {
		let mut state = self.lock();
		state.take_failure()?;
		state.check_namespace(namespace)?;

		let name = match (&obj.metadata.name, &obj.metadata.generate_name) {
			(Some(name), _) if !name.is_empty() => name.clone(),
			(_, Some(prefix)) if !prefix.is_empty() => format!("{prefix}{}", random_suffix()),
			_ => {
				return Err(status(
					"Invalid",
					422,
					format!(
						"{} \"\" is invalid: metadata.name: Required value: name or generateName is required",
						resource.kind
					),
				))
			}
		};
		if !is_dns1123_subdomain(&name) {
			return Err(status(
				"Invalid",
				422,
				format!(
					"{} \"{name}\" is invalid: metadata.name: Invalid value: \"{name}\": a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character",
					resource.kind
				),
			));
		}

		let key = (
			resource.plural.clone(),
			namespace.map(str::to_string),
			name.clone(),
		);
		if state.objects.contains_key(&key) {
			return Err(status(
				"AlreadyExists",
				409,
				format!("{} \"{name}\" already exists", resource.plural),
			));
		}

		let mut value = to_value(&obj)?;
		value["metadata"]["name"] = Value::String(name);
		if let Some(ns) = namespace {
			value["metadata"]["namespace"] = Value::String(ns.to_string());
		}
		state.stamp(&mut value, true);
		state.objects.insert(key, value.clone());
		to_object(value)
	}

	async fn get(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
	) -> Result<DynamicObject, kube::Error> {
		let mut state = self.lock();
		state.take_failure()?;
		state.check_namespace(namespace)?;
		let key = (
			resource.plural.clone(),
			namespace.map(str::to_string),
			name.to_string(),
		);
		match state.objects.get(&key) {
			Some(value) => to_object(value.clone()),
			None => Err(not_found(&resource.plural, name)),
		}
	}

	async fn replace(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
		obj: DynamicObject,
	) -> Result<DynamicObject, kube::Error> {
		let mut state = self.lock();
		state.take_failure()?;
		state.check_namespace(namespace)?;
		let key = (
			resource.plural.clone(),
			namespace.map(str::to_string),
			name.to_string(),
		);
		let Some(stored) = state.objects.get(&key).cloned() else {
			return Err(not_found(&resource.plural, name));
		};

		let stored_rv = str_at(&stored, "metadata.resourceVersion");
		if let Some(rv) = obj.metadata.resource_version.as_deref() {
			if stored_rv.as_deref() != Some(rv) {
				return Err(status(
					"Conflict",
					409,
					format!(
						"Operation cannot be fulfilled on {} \"{name}\": the object has been modified; please apply your changes to the latest version and try again",
						resource.plural
					),
				));
			}
		}

		let mut value = to_value(&obj)?;
		for field in ["creationTimestamp", "uid", "generateName"] {
			if let Some(v) = stored["metadata"].get(field) {
				value["metadata"][field] = v.clone();
			}
		}
		value["metadata"]["name"] = Value::String(name.to_string());
		state.stamp(&mut value, false);
		state.objects.insert(key, value.clone());
		to_object(value)
	}

	async fn delete(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
	) -> Result<(), kube::Error> {
		let mut state = self.lock();
		state.take_failure()?;
		state.check_namespace(namespace)?;
		let key = (
			resource.plural.clone(),
			namespace.map(str::to_string),
			name.to_string(),
		);
		if state.objects.remove(&key).is_none() {
			return Err(not_found(&resource.plural, name));
		}

		if resource.plural == "jobs" {
			let ns = namespace.map(str::to_string);
			state.objects.retain(|(plural, pod_ns, _), value| {
				!(plural == "pods"
					&& *pod_ns == ns && (labels_match(value, &format!("job-name={name}"))
					|| labels_match(value, &format!("batch.kubernetes.io/job-name={name}"))))
			});
		}
		Ok(())
	}

	async fn list(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		params: &ListParams,
	) -> Result<Vec<DynamicObject>, kube::Error> {
		let mut state = self.lock();
		state.take_failure()?;
		state.check_namespace(namespace)?;
		state
			.objects
			.iter()
			.filter(|((plural, ns, _), _)| {
				*plural == resource.plural && (namespace.is_none() || ns.as_deref() == namespace)
			})
			.filter(|(_, value)| {
				params
					.label_selector
					.as_deref()
					.map_or(true, |s| labels_match(value, s))
			})
			.filter(|(_, value)| {
				params
					.field_selector
					.as_deref()
					.map_or(true, |s| fields_match(value, s))
			})
			.map(|(_, value)| to_object(value.clone()))
			.collect()
	}

	async fn pod_logs(
		&self,
		namespace: &str,
		pod: &str,
		opts: &LogOptions,
	) -> Result<String, kube::Error> {
		let mut state = self.lock();
		state.take_failure()?;
		state.check_namespace(Some(namespace))?;
		let key = ("pods".to_string(), Some(namespace.to_string()), pod.to_string());
		if !state.objects.contains_key(&key) {
			return Err(not_found("pods", pod));
		}

		let logs = state
			.logs
			.get(&(namespace.to_string(), pod.to_string(), opts.container.clone()))
			.cloned()
			.unwrap_or_default();

		let mut out = match opts.tail_lines {
			Some(n) if n >= 0 => {
				let lines: Vec<&str> = logs.split_inclusive('\n').collect();
				let skip = lines.len().saturating_sub(n as usize);
				lines[skip..].concat()
			}
			_ => logs,
		};
		if let Some(limit) = opts.limit_bytes {
			let limit = usize::try_from(limit).unwrap_or(0);
			if out.len() > limit {
				let mut cut = limit;
				while !out.is_char_boundary(cut) {
					cut -= 1;
				}
				out.truncate(cut);
			}
		}
		Ok(out)
	}
}

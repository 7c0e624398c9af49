// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Running jobs and deriving their status.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{
	Container, ContainerStatus, EnvVar, FlexVolumeSource, LocalObjectReference, PodSpec,
	PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use nerd_common_core::{Ctx, ErrorKind, Kinded};
use nerd_kube::{
	prefixed, Dataset, Job, JobShards, JobSpec, JobStatus, ListOptions, LogOptions, Pod, Secret,
	MANAGED_LABEL, MANAGED_VALUE, MAX_LOG_BYTES,
};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::datasets::UpdateDatasetInput;
use crate::error::{SvcError, SvcResult};
use crate::kube::{created_at, name_of, time, Kube};
use crate::validate::{min, printascii, required, Validate};

/// Name of the single container every job pod runs.
pub const JOB_CONTAINER: &str = "main";

/// Flex-volume driver that mounts datasets at pod startup.
pub const DATASET_DRIVER: &str = "nerdalize.com/dataset";

/// A dataset mounted into the job container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetMount {
	pub dataset: String,
	/// Absolute path inside the container.
	pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunJobInput {
	/// Empty asks the apiserver to generate one.
	pub name: String,
	pub image: String,
	pub args: Vec<String>,
	pub env: BTreeMap<String, String>,
	pub inputs: Vec<DatasetMount>,
	pub outputs: Vec<DatasetMount>,
	/// Image pull secret, by its unprefixed name.
	pub secret: Option<String>,
	/// Retries before the job is marked failed; defaults to 0.
	pub backoff_limit: Option<i32>,
}

impl Validate for RunJobInput {
	fn validate(&self) -> SvcResult<()> {
		printascii("name", &self.name)?;
		required("image", &self.image)?;
		printascii("image", &self.image)?;
		if let Some(limit) = self.backoff_limit {
			min("backoff_limit", i64::from(limit), 0)?;
		}
		for mount in self.inputs.iter().chain(&self.outputs) {
			required("dataset", &mount.dataset)?;
			if !mount.path.starts_with('/') {
				return Err(SvcError::validation(
					"mount_path",
					format!("{:?} must be an absolute path", mount.path),
				));
			}
		}
		Ok(())
	}
}

#[derive(Debug, Clone, Default)]
pub struct FetchJobLogsInput {
	pub name: String,
	/// Only the last `tail` lines.
	pub tail: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobLogs {
	pub data: String,
	/// The log exceeded [`MAX_LOG_BYTES`] and was cut.
	pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
	Pending,
	Active,
	Completed,
	Failed,
	Deleting,
}

impl fmt::Display for JobPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			JobPhase::Pending => "Pending",
			JobPhase::Active => "Active",
			JobPhase::Completed => "Completed",
			JobPhase::Failed => "Failed",
			JobPhase::Deleting => "Deleting",
		})
	}
}

/// What the pod of an active job is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveState {
	Pending,
	Running,
	ErrImagePull,
}

impl fmt::Display for ActiveState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ActiveState::Pending => "Pending",
			ActiveState::Running => "Running",
			ActiveState::ErrImagePull => "ErrImagePull",
		})
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobDetails {
	/// Message of the most recent warning event on the job's pod.
	pub last_warning: Option<String>,
	pub unschedulable: bool,
	pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobView {
	pub name: String,
	pub image: String,
	pub created_at: Option<DateTime<Utc>>,
	pub active_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub failed_at: Option<DateTime<Utc>>,
	pub deleted_at: Option<DateTime<Utc>>,
	pub phase: JobPhase,
	/// Set only while the job is [`JobPhase::Active`].
	pub active_state: Option<ActiveState>,
	pub waiting_reason: Option<String>,
	pub details: JobDetails,
}

/// Deletion wins over every counter; then failed, succeeded, active.
pub fn derive_phase(deleted: bool, status: &JobStatus) -> JobPhase {
	let positive = |n: Option<i32>| n.unwrap_or(0) > 0;
	if deleted {
		JobPhase::Deleting
	} else if positive(status.failed) {
		JobPhase::Failed
	} else if positive(status.succeeded) {
		JobPhase::Completed
	} else if positive(status.active) {
		JobPhase::Active
	} else {
		JobPhase::Pending
	}
}

fn dataset_volume(name: String, dataset: &str, mode: &str) -> Volume {
	let options = BTreeMap::from([
		("dataset".to_string(), prefixed::<Dataset>(dataset)),
		("mode".to_string(), mode.to_string()),
	]);
	Volume {
		name,
		flex_volume: Some(FlexVolumeSource {
			driver: DATASET_DRIVER.to_string(),
			options: Some(options),
			..Default::default()
		}),
		..Default::default()
	}
}

pub(crate) fn build_job(input: &RunJobInput) -> Job {
	let mut volumes = Vec::new();
	let mut mounts = Vec::new();
	let sets = [("input", &input.inputs), ("output", &input.outputs)];
	for (mode, list) in sets {
		for (i, mount) in list.iter().enumerate() {
			let volume = format!("{mode}-{i}");
			volumes.push(dataset_volume(volume.clone(), &mount.dataset, mode));
			mounts.push(VolumeMount {
				name: volume,
				mount_path: mount.path.clone(),
				..Default::default()
			});
		}
	}

	let env: Vec<EnvVar> = input
		.env
		.iter()
		.map(|(name, value)| EnvVar {
			name: name.clone(),
			value: Some(value.clone()),
			..Default::default()
		})
		.collect();

	let container = Container {
		name: JOB_CONTAINER.to_string(),
		image: Some(input.image.clone()),
		args: (!input.args.is_empty()).then(|| input.args.clone()),
		env: (!env.is_empty()).then_some(env),
		volume_mounts: (!mounts.is_empty()).then_some(mounts),
		..Default::default()
	};

	let pull_secrets = input.secret.as_ref().map(|secret| {
		vec![LocalObjectReference {
			name: prefixed::<Secret>(secret),
		}]
	});

	Job {
		metadata: ObjectMeta::default(),
		spec: Some(JobSpec {
			backoff_limit: Some(input.backoff_limit.unwrap_or(0)),
			template: PodTemplateSpec {
				metadata: Some(ObjectMeta {
					labels: Some(BTreeMap::from([(
						MANAGED_LABEL.to_string(),
						MANAGED_VALUE.to_string(),
					)])),
					..Default::default()
				}),
				spec: Some(PodSpec {
					restart_policy: Some("Never".to_string()),
					containers: vec![container],
					volumes: (!volumes.is_empty()).then_some(volumes),
					image_pull_secrets: pull_secrets,
					..Default::default()
				}),
			},
			..Default::default()
		}),
		status: None,
	}
}

fn containers(job: &Job) -> &[Container] {
	job.spec
		.as_ref()
		.and_then(|s| s.template.spec.as_ref())
		.map(|s| s.containers.as_slice())
		.unwrap_or_default()
}

fn job_image(job: &Job) -> String {
	containers(job)
		.first()
		.and_then(|c| c.image.clone())
		.unwrap_or_default()
}

fn main_container(pod: &Pod) -> Option<&ContainerStatus> {
	let statuses = pod.status.as_ref()?.container_statuses.as_ref()?;
	statuses
		.iter()
		.find(|s| s.name == JOB_CONTAINER)
		.or_else(|| statuses.first())
}

/// Image pull failures win over the pod phase.
pub fn derive_active_state(pod: Option<&Pod>) -> ActiveState {
	let Some(pod) = pod else {
		return ActiveState::Pending;
	};
	let waiting = main_container(pod)
		.and_then(|c| c.state.as_ref())
		.and_then(|s| s.waiting.as_ref())
		.and_then(|w| w.reason.as_deref());
	if matches!(waiting, Some("ErrImagePull" | "ImagePullBackOff")) {
		return ActiveState::ErrImagePull;
	}
	match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
		Some("Running") => ActiveState::Running,
		_ => ActiveState::Pending,
	}
}

fn is_unschedulable(pod: &Pod) -> bool {
	pod.status
		.as_ref()
		.and_then(|s| s.conditions.as_ref())
		.is_some_and(|conditions| {
			conditions.iter().any(|c| {
				c.type_ == "PodScheduled"
					&& c.status == "False"
					&& c.reason.as_deref() == Some("Unschedulable")
			})
		})
}

pub(crate) fn job_view(job: &Job, shards: &JobShards) -> JobView {
	let name = name_of(&job.metadata);
	let status = job.status.clone().unwrap_or_default();
	let deleted_at = time(&job.metadata.deletion_timestamp);
	let failed_at = status
		.conditions
		.as_ref()
		.and_then(|conds| {
			conds
				.iter()
				.find(|c| c.type_ == "Failed" && c.status == "True")
		})
		.and_then(|c| time(&c.last_transition_time));

	let mut view = JobView {
		image: job_image(job),
		created_at: created_at(&job.metadata),
		active_at: time(&status.start_time),
		completed_at: time(&status.completion_time),
		failed_at,
		deleted_at,
		phase: derive_phase(deleted_at.is_some(), &status),
		active_state: None,
		waiting_reason: None,
		details: JobDetails::default(),
		name,
	};

	let latest = shards.latest_pod(&view.name);
	if view.phase == JobPhase::Active {
		view.active_state = Some(derive_active_state(latest));
	}
	if let Some(pod) = latest {
		if let Some(container) = main_container(pod) {
			let state = container.state.as_ref();
			view.waiting_reason = state
				.and_then(|s| s.waiting.as_ref())
				.and_then(|w| w.reason.clone());
			view.details.exit_code = state
				.and_then(|s| s.terminated.as_ref())
				.or_else(|| {
					container
						.last_state
						.as_ref()
						.and_then(|s| s.terminated.as_ref())
				})
				.map(|t| t.exit_code);
		}
		view.details.unschedulable = is_unschedulable(pod);
		let pod_name = name_of(&pod.metadata);
		view.details.last_warning = shards
			.events_for(&pod_name)
			.into_iter()
			.filter(|e| e.type_.as_deref() == Some("Warning"))
			.filter_map(|e| e.message.clone())
			.last();
	}
	view
}

/// Cut `data` to at most `max` bytes on a character boundary.
fn truncate_logs(mut data: String, max: usize) -> JobLogs {
	if data.len() <= max {
		return JobLogs {
			data,
			truncated: false,
		};
	}
	let mut cut = max;
	while !data.is_char_boundary(cut) {
		cut -= 1;
	}
	data.truncate(cut);
	JobLogs {
		data,
		truncated: true,
	}
}

impl Kube {
	/// Create a job running one container. Returns the job's name.
	#[instrument(skip(self, ctx, input), fields(job = %input.name, image = %input.image))]
	pub async fn run_job(&self, ctx: &Ctx, input: &RunJobInput) -> SvcResult<String> {
		input.validate()?;
		for mount in input.inputs.iter().chain(&input.outputs) {
			self.kv.get::<Dataset>(ctx, &mount.dataset).await?;
		}

		let created = self.kv.create(ctx, build_job(input), &input.name).await?;
		let name = name_of(&created.metadata);

		for mount in &input.inputs {
			let update = UpdateDatasetInput {
				name: mount.dataset.clone(),
				input_for: vec![name.clone()],
				..Default::default()
			};
			self.update_dataset(ctx, &update).await?;
		}
		for mount in &input.outputs {
			let update = UpdateDatasetInput {
				name: mount.dataset.clone(),
				output_from: vec![name.clone()],
				..Default::default()
			};
			self.update_dataset(ctx, &update).await?;
		}

		info!(name = %name, "started job");
		Ok(name)
	}

	/// Delete a job and, through background propagation, its pods. Listings
	/// may show the job for a short while afterwards.
	#[instrument(skip(self, ctx))]
	pub async fn delete_job(&self, ctx: &Ctx, name: &str) -> SvcResult<()> {
		required("name", name)?;
		self.kv.delete::<Job>(ctx, name).await?;
		info!("deleted job");
		Ok(())
	}

	/// Every managed job with status derived from its latest pod, newest first.
	#[instrument(skip(self, ctx))]
	pub async fn list_jobs(&self, ctx: &Ctx) -> SvcResult<Vec<JobView>> {
		let shards = self.kv.job_shards(ctx).await?;
		debug!(
			jobs = shards.jobs.len(),
			pods = shards.pods.len(),
			events = shards.events.len(),
			"collected job shards"
		);
		Ok(shards
			.jobs
			.iter()
			.filter(|job| {
				let single = containers(job).len() == 1;
				if !single {
					debug!(job = %name_of(&job.metadata), "skipping job without exactly one container");
				}
				single
			})
			.map(|job| job_view(job, &shards))
			.collect())
	}

	/// Logs of the job's most recent pod, capped at [`MAX_LOG_BYTES`].
	#[instrument(skip(self, ctx, input), fields(job = %input.name))]
	pub async fn fetch_job_logs(&self, ctx: &Ctx, input: &FetchJobLogsInput) -> SvcResult<JobLogs> {
		required("name", &input.name)?;
		if let Some(tail) = input.tail {
			min("tail", tail, 1)?;
		}
		self.kv.get::<Job>(ctx, &input.name).await?;

		let no_logs = || SvcError::NoLogs {
			job: input.name.clone(),
		};
		let selector = format!("job-name={}", prefixed::<Job>(&input.name));
		let pods = self.kv.list::<Pod>(ctx, &ListOptions::new().label(selector)).await?;
		let pod = pods
			.iter()
			.max_by(|a, b| {
				created_at(&a.metadata)
					.cmp(&created_at(&b.metadata))
					.then_with(|| a.metadata.name.cmp(&b.metadata.name))
			})
			.ok_or_else(no_logs)?;

		let opts = LogOptions {
			container: JOB_CONTAINER.to_string(),
			limit_bytes: Some(MAX_LOG_BYTES + 1),
			tail_lines: input.tail,
		};
		let data = match self.kv.pod_logs(ctx, &name_of(&pod.metadata), &opts).await {
			Ok(data) => data,
			Err(e) if e.kind() == ErrorKind::NotExists => return Err(no_logs()),
			Err(e) => return Err(e.into()),
		};
		Ok(truncate_logs(data, MAX_LOG_BYTES as usize))
	}
}

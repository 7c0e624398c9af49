// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-shot fan-in of jobs, their pods and pod events.

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use nerd_common_core::Ctx;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{KubeError, KubeResult};
use crate::kubevisor::{Kubevisor, ListOptions};
use crate::resource::prefixed;

/// Labels the job controller puts on the pods it creates.
const JOB_NAME_LABELS: [&str; 2] = ["batch.kubernetes.io/job-name", "job-name"];

/// A consistent snapshot of the state needed to derive job status.
#[derive(Debug, Clone, Default)]
pub struct JobShards {
	/// Newest first; names are unprefixed.
	pub jobs: Vec<Job>,
	/// Oldest first.
	pub pods: Vec<Pod>,
	/// Oldest first.
	pub events: Vec<Event>,
}

impl JobShards {
	/// Pods created for the job named `job` (unprefixed), oldest first.
	pub fn pods_for(&self, job: &str) -> Vec<&Pod> {
		let stored = prefixed::<Job>(job);
		self
			.pods
			.iter()
			.filter(|pod| {
				let labels = pod.metadata.labels.as_ref();
				JOB_NAME_LABELS
					.iter()
					.any(|key| labels.and_then(|l| l.get(*key)) == Some(&stored))
			})
			.collect()
	}

	/// The most recently created pod of a job.
	pub fn latest_pod(&self, job: &str) -> Option<&Pod> {
		self.pods_for(job).into_iter().last()
	}

	/// Events that concern the pod named `pod`, oldest first.
	pub fn events_for(&self, pod: &str) -> Vec<&Event> {
		self
			.events
			.iter()
			.filter(|e| e.involved_object.name.as_deref() == Some(pod))
			.collect()
	}
}

enum Shard {
	Jobs(Vec<Job>),
	Pods(Vec<Pod>),
	Events(Vec<Event>),
}

/// Run the job, pod and event feeds concurrently and fold them into one
/// deterministic view. Returns early when `ctx` finishes or a feed fails.
pub async fn collect_job_shards(kv: &Kubevisor, ctx: &Ctx) -> KubeResult<JobShards> {
	let (tx, mut rx) = mpsc::channel::<KubeResult<Shard>>(3);
	let mut feeds = JoinSet::new();

	{
		let (kv, ctx, tx) = (kv.clone(), ctx.clone(), tx.clone());
		feeds.spawn(async move {
			let res = kv.list::<Job>(&ctx, &ListOptions::new()).await.map(Shard::Jobs);
			let _ = tx.send(res).await;
		});
	}
	{
		let (kv, ctx, tx) = (kv.clone(), ctx.clone(), tx.clone());
		feeds.spawn(async move {
			let res = kv.list::<Pod>(&ctx, &ListOptions::new()).await.map(Shard::Pods);
			let _ = tx.send(res).await;
		});
	}
	{
		let (kv, ctx, tx) = (kv.clone(), ctx.clone(), tx);
		feeds.spawn(async move {
			let opts = ListOptions::new().field("involvedObject.kind=Pod");
			let res = kv.list_events(&ctx, &opts).await.map(Shard::Events);
			let _ = tx.send(res).await;
		});
	}

	let mut shards = JobShards::default();
	let mut pending = 3;
	while pending > 0 {
		let next = tokio::select! {
			reason = ctx.done() => {
				feeds.abort_all();
				return Err(KubeError::Interrupted(reason));
			}
			next = rx.recv() => next,
		};
		let shard = match next {
			Some(shard) => shard,
			None => {
				return Err(KubeError::Feed {
					message: "feed ended without a result".to_string(),
				})
			}
		};
		match shard {
			Ok(Shard::Jobs(jobs)) => shards.jobs = jobs,
			Ok(Shard::Pods(pods)) => shards.pods = pods,
			Ok(Shard::Events(events)) => shards.events = events,
			Err(e) => {
				feeds.abort_all();
				return Err(e);
			}
		}
		pending -= 1;
	}
	while feeds.join_next().await.is_some() {}

	shards.jobs.sort_by(|a, b| {
		created(&b.metadata.creation_timestamp)
			.cmp(&created(&a.metadata.creation_timestamp))
			.then_with(|| a.metadata.name.cmp(&b.metadata.name))
	});
	shards.pods.sort_by(|a, b| {
		created(&a.metadata.creation_timestamp)
			.cmp(&created(&b.metadata.creation_timestamp))
			.then_with(|| a.metadata.name.cmp(&b.metadata.name))
	});
	shards.events.sort_by(|a, b| {
		event_time(a)
			.cmp(&event_time(b))
			.then_with(|| a.metadata.name.cmp(&b.metadata.name))
	});

	debug!(
		jobs = shards.jobs.len(),
		pods = shards.pods.len(),
		events = shards.events.len(),
		"collected job shards"
	);
	Ok(shards)
}

fn created(ts: &Option<Time>) -> Option<chrono::DateTime<chrono::Utc>> {
	ts.as_ref().map(|t| t.0)
}

fn event_time(event: &Event) -> Option<chrono::DateTime<chrono::Utc>> {
	event
		.last_timestamp
		.as_ref()
		.or(event.first_timestamp.as_ref())
		.map(|t| t.0)
		.or_else(|| created(&event.metadata.creation_timestamp))
}

impl Kubevisor {
	/// See [`collect_job_shards`].
	pub async fn job_shards(&self, ctx: &Ctx) -> KubeResult<JobShards> {
		collect_job_shards(self, ctx).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::MockK8sClient;
	use k8s_openapi::api::core::v1::ObjectReference;
	use kube::api::ObjectMeta;
	use nerd_common_core::{ErrorKind, Kinded};
	use std::collections::BTreeMap;
	use std::sync::Arc;

	fn pod(name: &str, job: &str) -> Pod {
		Pod {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				namespace: Some("ns".to_string()),
				labels: Some(BTreeMap::from([
					("nerd-app".to_string(), "cli".to_string()),
					("job-name".to_string(), job.to_string()),
				])),
				..Default::default()
			},
			..Default::default()
		}
	}

	fn event(name: &str, pod: &str, message: &str) -> Event {
		Event {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				namespace: Some("ns".to_string()),
				..Default::default()
			},
			involved_object: ObjectReference {
				kind: Some("Pod".to_string()),
				name: Some(pod.to_string()),
				..Default::default()
			},
			message: Some(message.to_string()),
			..Default::default()
		}
	}

	#[tokio::test]
	async fn folds_all_three_feeds() {
		let mock = Arc::new(MockK8sClient::new());
		let kv = Kubevisor::new(mock.clone(), "ns");
		let ctx = Ctx::background();

		kv.create(&ctx, Job::default(), "a").await.unwrap();
		kv.create(&ctx, Job::default(), "b").await.unwrap();
		mock.insert(pod("j-a-111", "j-a"));
		mock.insert(pod("j-a-222", "j-a"));
		mock.insert(event("e1", "j-a-222", "Back-off pulling image"));

		let shards = kv.job_shards(&ctx).await.unwrap();
		let jobs: Vec<_> = shards.jobs.iter().filter_map(|j| j.metadata.name.clone()).collect();
		assert_eq!(jobs, vec!["b".to_string(), "a".to_string()]);
		assert_eq!(shards.pods_for("a").len(), 2);
		assert!(shards.pods_for("b").is_empty());
		assert_eq!(
			shards.latest_pod("a").and_then(|p| p.metadata.name.clone()),
			Some("j-a-222".to_string())
		);
		assert_eq!(shards.events_for("j-a-222").len(), 1);
	}

	#[tokio::test]
	async fn cancelled_context_aborts() {
		let mock = Arc::new(MockK8sClient::new());
		let kv = Kubevisor::new(mock, "ns");
		let ctx = Ctx::background();
		ctx.cancel();
		let err = kv.job_shards(&ctx).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Cancelled);
	}
}

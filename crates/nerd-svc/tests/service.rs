// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Service operations end to end against the in-memory apiserver.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{
	Container, ContainerState, ContainerStateWaiting, ContainerStatus, ObjectReference, PodSpec,
	PodStatus, PodTemplateSpec, ResourceQuotaStatus,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use nerd_common_core::{Ctx, ErrorKind, Kinded, SecretString};
use nerd_kube::{
	ArchiverOptions, Dataset, DatasetSpec, Event, Job, JobSpec, JobStatus, Kubevisor, MockK8sClient,
	PersistentVolume, PersistentVolumeClaim, Pod, ResourceQuota, Secret, StoreOptions,
	MANAGED_PREFIXES, MAX_LOG_BYTES,
};
use nerd_svc::{
	parse_manifests, ActiveState, CreateDatasetInput, CreateFileSystemInput, CreateSecretInput, DatasetMount,
	FetchJobLogsInput, JobPhase, Kube, RunJobInput, UpdateDatasetInput, UpdateSecretInput,
	DOCKER_HUB,
};
use nerd_transfer::nop_reporter;

const NAMESPACE: &str = "tenant";

fn setup() -> (Arc<MockK8sClient>, Kube) {
	let mock = Arc::new(MockK8sClient::with_namespaces([NAMESPACE, "kube-system"]));
	let kube = Kube::new(Kubevisor::new(mock.clone(), NAMESPACE));
	(mock, kube)
}

fn dataset_input(name: &str) -> CreateDatasetInput {
	CreateDatasetInput {
		name: name.to_string(),
		store_options: Some(StoreOptions::s3("b1")),
		archiver_options: Some(ArchiverOptions::tar()),
	}
}

fn labels(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
	Some(
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect(),
	)
}

fn meta(name: &str, labels_: &[(&str, &str)]) -> ObjectMeta {
	ObjectMeta {
		name: Some(name.to_string()),
		namespace: Some(NAMESPACE.to_string()),
		labels: labels(labels_),
		..Default::default()
	}
}

/// A pod as the job controller would create it for the stored job `job`.
fn job_pod(job: &str, pod: &str, waiting: Option<&str>) -> Pod {
	let state = waiting.map(|reason| ContainerState {
		waiting: Some(ContainerStateWaiting {
			reason: Some(reason.to_string()),
			..Default::default()
		}),
		..Default::default()
	});
	Pod {
		metadata: meta(pod, &[("nerd-app", "cli"), ("job-name", job)]),
		status: Some(PodStatus {
			container_statuses: Some(vec![ContainerStatus {
				name: "main".to_string(),
				state,
				..Default::default()
			}]),
			..Default::default()
		}),
		..Default::default()
	}
}

fn warning(name: &str, pod: &str, message: &str) -> Event {
	Event {
		metadata: meta(name, &[]),
		involved_object: ObjectReference {
			kind: Some("Pod".to_string()),
			name: Some(pod.to_string()),
			..Default::default()
		},
		type_: Some("Warning".to_string()),
		message: Some(message.to_string()),
		..Default::default()
	}
}

#[tokio::test]
async fn test_dataset_lifecycle() {
	let (_mock, kube) = setup();
	let ctx = Ctx::background();

	let created = kube.create_dataset(&ctx, &dataset_input("ds1")).await.unwrap();
	assert_eq!(created.name, "ds1");
	assert_eq!(created.bucket, "b1");

	let got = kube.get_dataset(&ctx, "ds1").await.unwrap();
	assert_eq!(got.size, 0);
	assert_eq!(got.name, "ds1");

	kube.delete_dataset(&ctx, "ds1").await.unwrap();
	let err = kube.get_dataset(&ctx, "ds1").await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotExists);
}

#[tokio::test]
async fn test_created_datasets_are_listed_newest_first() {
	let (_mock, kube) = setup();
	let ctx = Ctx::background();

	for name in ["first", "second", ""] {
		kube.create_dataset(&ctx, &dataset_input(name)).await.unwrap();
	}
	let listed = kube.list_datasets(&ctx).await.unwrap();
	assert_eq!(listed.len(), 3);
	assert_eq!(listed[1].name, "second");
	assert_eq!(listed[2].name, "first");

	for ds in &listed {
		let got = kube.get_dataset(&ctx, &ds.name).await.unwrap();
		assert_eq!(got.name, ds.name);
	}
}

#[tokio::test]
async fn test_invalid_dataset_name() {
	let (_mock, kube) = setup();
	let err = kube
		.create_dataset(&Ctx::background(), &dataset_input("bad-"))
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::InvalidName);
}

#[tokio::test]
async fn test_missing_options_fail_before_any_call() {
	let (mock, kube) = setup();
	let input = CreateDatasetInput {
		store_options: None,
		..dataset_input("ds1")
	};
	let err = kube.create_dataset(&Ctx::background(), &input).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Validation);
	assert_eq!(mock.count("datasets"), 0);
}

#[tokio::test]
async fn test_concurrent_duplicate_creates() {
	let (_mock, kube) = setup();
	let ctx = Ctx::background();

	let spawn = || {
		let (kube, ctx) = (kube.clone(), ctx.clone());
		tokio::spawn(async move { kube.create_dataset(&ctx, &dataset_input("dup")).await })
	};
	let (a, b) = (spawn(), spawn());
	let results = [a.await.unwrap(), b.await.unwrap()];

	let ok = results.iter().filter(|r| r.is_ok()).count();
	let exists = results
		.iter()
		.filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::AlreadyExists))
		.count();
	assert_eq!((ok, exists), (1, 1));
}

#[tokio::test]
async fn test_update_dataset_appends_lineage() {
	let (_mock, kube) = setup();
	let ctx = Ctx::background();
	kube.create_dataset(&ctx, &dataset_input("ds1")).await.unwrap();

	let update = |size, input_for: &[&str]| UpdateDatasetInput {
		name: "ds1".into(),
		size,
		input_for: input_for.iter().map(|s| s.to_string()).collect(),
		output_from: Vec::new(),
	};
	kube.update_dataset(&ctx, &update(Some(42), &["a"])).await.unwrap();
	let out = kube.update_dataset(&ctx, &update(None, &["b"])).await.unwrap();
	assert_eq!(out.size, 42);
	assert_eq!(out.input_for, vec!["a", "b"]);

	let out = kube.update_dataset(&ctx, &update(Some(0), &[])).await.unwrap();
	assert_eq!(out.size, 0);
}

#[tokio::test]
async fn test_secret_labels_follow_image_reference() {
	let (mock, kube) = setup();
	let ctx = Ctx::background();

	let quay = kube
		.create_secret(
			&ctx,
			&CreateSecretInput {
				image: "quay.io/acme/app".into(),
				username: "u".into(),
				password: SecretString::from("p"),
			},
		)
		.await
		.unwrap();
	assert!(mock.contains("secrets", Some(NAMESPACE), &format!("s-{}", quay.name)));
	assert_eq!(
		(quay.registry.as_str(), quay.project.as_str(), quay.image.as_str()),
		("quay.io", "acme", "app")
	);
	assert_eq!(quay.username, "u");

	let hub = kube
		.create_secret(
			&ctx,
			&CreateSecretInput {
				image: "nginx".into(),
				username: "u".into(),
				password: SecretString::from("p"),
			},
		)
		.await
		.unwrap();
	assert_eq!(
		(hub.registry.as_str(), hub.project.as_str(), hub.image.as_str()),
		(DOCKER_HUB, "", "nginx")
	);

	let stored: Secret = mock
		.fetch(Some(NAMESPACE), &format!("s-{}", hub.name))
		.unwrap();
	assert_eq!(stored.type_.as_deref(), Some("kubernetes.io/dockerconfigjson"));
	assert_eq!(kube.list_secrets(&ctx).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_secret_keeps_registry() {
	let (_mock, kube) = setup();
	let ctx = Ctx::background();
	let created = kube
		.create_secret(
			&ctx,
			&CreateSecretInput {
				image: "quay.io/acme/app".into(),
				username: "old".into(),
				password: SecretString::from("p"),
			},
		)
		.await
		.unwrap();

	let updated = kube
		.update_secret(
			&ctx,
			&UpdateSecretInput {
				name: created.name.clone(),
				username: "new".into(),
				password: SecretString::from("p2"),
			},
		)
		.await
		.unwrap();
	assert_eq!(updated.username, "new");
	assert_eq!(updated.registry, "quay.io");
	assert_eq!(kube.get_secret(&ctx, &created.name).await.unwrap().username, "new");

	kube.delete_secret(&ctx, &created.name).await.unwrap();
	assert!(kube.list_secrets(&ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_list_and_delete_job() {
	let (mock, kube) = setup();
	let ctx = Ctx::background();

	let name = kube
		.run_job(
			&ctx,
			&RunJobInput {
				image: "alpine".into(),
				..Default::default()
			},
		)
		.await
		.unwrap();
	assert!(mock.contains("jobs", Some(NAMESPACE), &format!("j-{name}")));

	let jobs = kube.list_jobs(&ctx).await.unwrap();
	assert_eq!(jobs.len(), 1);
	assert_eq!(jobs[0].name, name);
	assert_eq!(jobs[0].image, "alpine");
	assert_eq!(jobs[0].phase, JobPhase::Pending);

	kube.delete_job(&ctx, &name).await.unwrap();
	assert!(kube.list_jobs(&ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_job_records_dataset_lineage() {
	let (mock, kube) = setup();
	let ctx = Ctx::background();
	kube.create_dataset(&ctx, &dataset_input("in")).await.unwrap();
	kube.create_dataset(&ctx, &dataset_input("out")).await.unwrap();

	let input = RunJobInput {
		name: "train".into(),
		image: "alpine".into(),
		inputs: vec![DatasetMount {
			dataset: "in".into(),
			path: "/input".into(),
		}],
		outputs: vec![DatasetMount {
			dataset: "out".into(),
			path: "/output".into(),
		}],
		..Default::default()
	};
	kube.run_job(&ctx, &input).await.unwrap();

	assert_eq!(kube.get_dataset(&ctx, "in").await.unwrap().input_for, vec!["train"]);
	assert_eq!(kube.get_dataset(&ctx, "out").await.unwrap().output_from, vec!["train"]);

	let job: Job = mock.fetch(Some(NAMESPACE), "j-train").unwrap();
	let pod_spec = job.spec.unwrap().template.spec.unwrap();
	let volumes = pod_spec.volumes.unwrap();
	let options = volumes[0].flex_volume.as_ref().unwrap().options.as_ref().unwrap();
	assert_eq!(options["dataset"], "d-in");
	assert_eq!(options["mode"], "input");
}

#[tokio::test]
async fn test_job_with_missing_dataset_is_not_created() {
	let (mock, kube) = setup();
	let input = RunJobInput {
		image: "alpine".into(),
		inputs: vec![DatasetMount {
			dataset: "ghost".into(),
			path: "/input".into(),
		}],
		..Default::default()
	};
	let err = kube.run_job(&Ctx::background(), &input).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotExists);
	assert_eq!(mock.count("jobs"), 0);
}

#[tokio::test]
async fn test_phase_follows_job_status() {
	let (mock, kube) = setup();
	let ctx = Ctx::background();
	let run = |name: &str| RunJobInput {
		name: name.into(),
		image: "alpine".into(),
		..Default::default()
	};
	for name in ["done", "broken", "busy"] {
		kube.run_job(&ctx, &run(name)).await.unwrap();
	}

	let set = |name: &str, status: JobStatus| {
		assert!(mock.patch::<Job>(Some(NAMESPACE), &format!("j-{name}"), |job| {
			job.status = Some(status)
		}));
	};
	set(
		"done",
		JobStatus {
			succeeded: Some(1),
			..Default::default()
		},
	);
	set(
		"broken",
		JobStatus {
			succeeded: Some(1),
			failed: Some(1),
			active: Some(1),
			..Default::default()
		},
	);
	set(
		"busy",
		JobStatus {
			active: Some(1),
			..Default::default()
		},
	);

	let phases: BTreeMap<String, JobPhase> = kube
		.list_jobs(&ctx)
		.await
		.unwrap()
		.into_iter()
		.map(|j| (j.name, j.phase))
		.collect();
	assert_eq!(phases["done"], JobPhase::Completed);
	assert_eq!(phases["broken"], JobPhase::Failed);
	assert_eq!(phases["busy"], JobPhase::Active);
}

#[tokio::test]
async fn test_active_state_follows_latest_pod() {
	let (mock, kube) = setup();
	let ctx = Ctx::background();
	for name in ["starting", "running", "pulling"] {
		kube.run_job(
			&ctx,
			&RunJobInput {
				name: name.into(),
				image: "alpine".into(),
				..Default::default()
			},
		)
		.await
		.unwrap();
		assert!(mock.patch::<Job>(Some(NAMESPACE), &format!("j-{name}"), |job| {
			job.status = Some(JobStatus {
				active: Some(1),
				..Default::default()
			})
		}));
	}

	let mut running = job_pod("j-running", "j-running-1", None);
	if let Some(status) = running.status.as_mut() {
		status.phase = Some("Running".to_string());
	}
	mock.insert(running);
	mock.insert(job_pod("j-pulling", "j-pulling-1", Some("ImagePullBackOff")));

	let states: BTreeMap<String, Option<ActiveState>> = kube
		.list_jobs(&ctx)
		.await
		.unwrap()
		.into_iter()
		.map(|j| (j.name, j.active_state))
		.collect();
	assert_eq!(states["starting"], Some(ActiveState::Pending));
	assert_eq!(states["running"], Some(ActiveState::Running));
	assert_eq!(states["pulling"], Some(ActiveState::ErrImagePull));
}

#[tokio::test]
async fn test_jobs_without_one_container_are_skipped() {
	let (mock, kube) = setup();
	let ctx = Ctx::background();
	kube.run_job(
		&ctx,
		&RunJobInput {
			name: "single".into(),
			image: "alpine".into(),
			..Default::default()
		},
	)
	.await
	.unwrap();

	let container = |name: &str| Container {
		name: name.to_string(),
		image: Some("alpine".to_string()),
		..Default::default()
	};
	mock.insert(Job {
		metadata: meta("j-two", &[("nerd-app", "cli")]),
		spec: Some(JobSpec {
			template: PodTemplateSpec {
				spec: Some(PodSpec {
					containers: vec![container("main"), container("sidecar")],
					..Default::default()
				}),
				..Default::default()
			},
			..Default::default()
		}),
		..Default::default()
	});

	let names: Vec<String> = kube
		.list_jobs(&ctx)
		.await
		.unwrap()
		.into_iter()
		.map(|j| j.name)
		.collect();
	assert_eq!(names, ["single"]);
}

#[tokio::test]
async fn test_waiting_reason_comes_from_latest_pod() {
	let (mock, kube) = setup();
	let ctx = Ctx::background();
	kube.run_job(
		&ctx,
		&RunJobInput {
			name: "train".into(),
			image: "alpine".into(),
			..Default::default()
		},
	)
	.await
	.unwrap();

	mock.insert(job_pod("j-train", "j-train-old", Some("ErrImagePull")));
	mock.insert(job_pod("j-train", "j-train-new", Some("ImagePullBackOff")));
	mock.insert(warning("ev-1", "j-train-new", "Back-off pulling image"));
	mock.insert(warning("ev-2", "j-train-old", "unrelated"));

	let jobs = kube.list_jobs(&ctx).await.unwrap();
	assert_eq!(jobs[0].waiting_reason.as_deref(), Some("ImagePullBackOff"));
	assert_eq!(
		jobs[0].details.last_warning.as_deref(),
		Some("Back-off pulling image")
	);
}

#[tokio::test]
async fn test_unlabeled_resources_are_never_listed() {
	let (mock, kube) = setup();
	let ctx = Ctx::background();

	let mut ds = Dataset::new("d-foreign", DatasetSpec::default());
	ds.metadata.namespace = Some(NAMESPACE.to_string());
	mock.insert(ds);
	mock.insert(Job {
		metadata: meta("j-foreign", &[]),
		..Default::default()
	});
	mock.insert(Secret {
		metadata: meta("s-foreign", &[]),
		..Default::default()
	});
	mock.insert(PersistentVolumeClaim {
		metadata: meta("fs-foreign", &[]),
		..Default::default()
	});
	mock.insert(ResourceQuota {
		metadata: meta("foreign", &[]),
		..Default::default()
	});

	assert!(kube.list_datasets(&ctx).await.unwrap().is_empty());
	assert!(kube.list_jobs(&ctx).await.unwrap().is_empty());
	assert!(kube.list_secrets(&ctx).await.unwrap().is_empty());
	assert!(kube.list_file_systems(&ctx).await.unwrap().is_empty());
	assert!(kube.list_quotas(&ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listed_names_carry_no_prefix() {
	let (_mock, kube) = setup();
	let ctx = Ctx::background();

	kube.create_dataset(&ctx, &dataset_input("")).await.unwrap();
	kube.create_dataset(&ctx, &dataset_input("named")).await.unwrap();
	kube.run_job(
		&ctx,
		&RunJobInput {
			image: "alpine".into(),
			..Default::default()
		},
	)
	.await
	.unwrap();
	kube.create_file_system(
		&ctx,
		&CreateFileSystemInput {
			name: String::new(),
			capacity: "1Gi".into(),
		},
	)
	.await
	.unwrap();

	let mut names: Vec<String> = Vec::new();
	names.extend(kube.list_datasets(&ctx).await.unwrap().into_iter().map(|d| d.name));
	names.extend(kube.list_jobs(&ctx).await.unwrap().into_iter().map(|j| j.name));
	names.extend(kube.list_file_systems(&ctx).await.unwrap().into_iter().map(|f| f.name));
	assert_eq!(names.len(), 4);
	for name in names {
		assert!(
			!MANAGED_PREFIXES.iter().any(|p| name.starts_with(p)),
			"{name} carries a managed prefix"
		);
	}
}

#[tokio::test]
async fn test_fetch_job_logs_truncates() {
	let (mock, kube) = setup();
	let ctx = Ctx::background();
	kube.run_job(
		&ctx,
		&RunJobInput {
			name: "chatty".into(),
			image: "alpine".into(),
			..Default::default()
		},
	)
	.await
	.unwrap();
	mock.insert(job_pod("j-chatty", "j-chatty-1", None));

	mock.set_logs(NAMESPACE, "j-chatty-1", "main", "line 1\nline 2\n");
	let input = FetchJobLogsInput {
		name: "chatty".into(),
		tail: None,
	};
	let logs = kube.fetch_job_logs(&ctx, &input).await.unwrap();
	assert_eq!(logs.data, "line 1\nline 2\n");
	assert!(!logs.truncated);

	let tail = FetchJobLogsInput {
		tail: Some(1),
		..input.clone()
	};
	assert_eq!(kube.fetch_job_logs(&ctx, &tail).await.unwrap().data, "line 2\n");

	let max = MAX_LOG_BYTES as usize;
	mock.set_logs(NAMESPACE, "j-chatty-1", "main", "x".repeat(max + 10));
	let logs = kube.fetch_job_logs(&ctx, &input).await.unwrap();
	assert!(logs.truncated);
	assert_eq!(logs.data.len(), max);
}

#[tokio::test]
async fn test_logs_without_pod_is_no_logs() {
	let (_mock, kube) = setup();
	let ctx = Ctx::background();
	kube.run_job(
		&ctx,
		&RunJobInput {
			name: "quiet".into(),
			image: "alpine".into(),
			..Default::default()
		},
	)
	.await
	.unwrap();

	let input = FetchJobLogsInput {
		name: "quiet".into(),
		tail: None,
	};
	let err = kube.fetch_job_logs(&ctx, &input).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NoLogs);

	let missing = FetchJobLogsInput {
		name: "ghost".into(),
		tail: None,
	};
	let err = kube.fetch_job_logs(&ctx, &missing).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotExists);
}

#[tokio::test]
async fn test_file_system_and_webdav_coordinates() {
	let (mock, kube) = setup();
	let ctx = Ctx::background();

	let bad = CreateFileSystemInput {
		name: "home".into(),
		capacity: "lots".into(),
	};
	let err = kube.create_file_system(&ctx, &bad).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Validation);

	let fs = kube
		.create_file_system(
			&ctx,
			&CreateFileSystemInput {
				name: "home".into(),
				capacity: "10Gi".into(),
			},
		)
		.await
		.unwrap();
	assert_eq!(fs.name, "home");
	assert_eq!(fs.capacity, "10Gi");
	let claim = mock
		.fetch::<PersistentVolumeClaim>(Some(NAMESPACE), "fs-home")
		.and_then(|pvc| pvc.spec)
		.unwrap();
	assert_eq!(claim.storage_class_name.as_deref(), Some("nerdalize"));
	assert_eq!(claim.volume_mode.as_deref(), Some("Filesystem"));
	assert_eq!(claim.access_modes, Some(vec!["ReadWriteMany".to_string()]));

	let err = kube.get_persistent_volume(&ctx, "home").await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotExists);

	assert!(mock.patch::<PersistentVolumeClaim>(Some(NAMESPACE), "fs-home", |pvc| {
		if let Some(spec) = pvc.spec.as_mut() {
			spec.volume_name = Some("pv-home".to_string());
		}
	}));
	mock.insert(PersistentVolume {
		metadata: ObjectMeta {
			name: Some("pv-home".to_string()),
			annotations: labels(&[
				("webdavHost", "dav.example"),
				("webdavPort", "not-a-port"),
				("webdavPath", "/home"),
			]),
			..Default::default()
		},
		..Default::default()
	});

	let coords = kube.get_persistent_volume(&ctx, "home").await.unwrap();
	assert_eq!(coords.volume, "pv-home");
	assert_eq!(coords.host, "dav.example");
	assert_eq!(coords.port, 0);
	assert_eq!(coords.path, "/home");

	assert_eq!(kube.get_file_system(&ctx, "home").await.unwrap().volume.as_deref(), Some("pv-home"));
	kube.delete_file_system(&ctx, "home").await.unwrap();
	assert!(kube.list_file_systems(&ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_quotas_are_in_milli_units() {
	let (mock, kube) = setup();
	let amounts = |pairs: &[(&str, &str)]| {
		Some(
			pairs
				.iter()
				.map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
				.collect(),
		)
	};
	mock.insert(ResourceQuota {
		metadata: meta("compute", &[("nerd-app", "cli")]),
		status: Some(ResourceQuotaStatus {
			hard: amounts(&[("requests.cpu", "2"), ("limits.memory", "1Ki")]),
			used: amounts(&[("requests.cpu", "250m")]),
		}),
		..Default::default()
	});

	let quotas = kube.list_quotas(&Ctx::background()).await.unwrap();
	assert_eq!(quotas.len(), 1);
	assert_eq!(quotas[0].hard.requests_cpu, 2000);
	assert_eq!(quotas[0].hard.limits_memory, 1_024_000);
	assert_eq!(quotas[0].used.requests_cpu, 250);
}

const BOOTSTRAP: &str = r#"
apiVersion: v1
kind: ServiceAccount
metadata:
  name: flexvolume
  namespace: kube-system
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: flexvolume
rules:
  - apiGroups: ["stable.nerdalize.com"]
    resources: ["datasets"]
    verbs: ["get", "list"]
"#;

#[tokio::test]
async fn test_compliance_probe_and_apply() {
	let (mock, kube) = setup();
	let ctx = Ctx::background();
	let manifests = parse_manifests("https://example.test/bootstrap.yml", BOOTSTRAP).unwrap();

	let report = kube.probe_manifests(&ctx, &manifests).await.unwrap();
	assert!(!report.compliant);
	assert_eq!(
		report.missing,
		vec!["ServiceAccount/flexvolume", "ClusterRole/flexvolume"]
	);

	let applied = kube.apply_manifests(&ctx, manifests.clone()).await.unwrap();
	assert_eq!(applied.len(), 2);
	assert!(mock.contains("serviceaccounts", Some("kube-system"), "flexvolume"));
	assert!(mock.contains("clusterroles", None, "flexvolume"));

	let report = kube.probe_manifests(&ctx, &manifests).await.unwrap();
	assert!(report.compliant);
	assert!(report.missing.is_empty());

	assert!(kube.apply_manifests(&ctx, manifests).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transfers_update_the_dataset_record() {
	let (_mock, kube) = setup();
	let ctx = Ctx::background();
	let store_root = tempfile::tempdir().unwrap();
	let work = tempfile::tempdir().unwrap();
	let input = work.path().join("in");
	fs::create_dir_all(input.join("a")).unwrap();
	fs::write(input.join("a/b.txt"), b"hello\n").unwrap();
	fs::write(input.join("c.txt"), b"z").unwrap();

	let manager = kube.transfers();
	let store = StoreOptions::local(store_root.path().to_string_lossy());
	let mut handle = manager
		.create(&ctx, "ds1", store, ArchiverOptions::tar())
		.await
		.unwrap();
	let pushed = handle.push(&ctx, &input, nop_reporter()).await.unwrap();
	handle.close(&ctx).await.unwrap();

	let record = kube.get_dataset(&ctx, "ds1").await.unwrap();
	assert_eq!(record.size, pushed);
	assert!(record.size >= 7);
	assert_eq!(record.key_prefix.len(), 33);

	let output = work.path().join("out");
	let mut handle = manager.open(&ctx, "ds1").await.unwrap();
	handle.pull(&ctx, &output, nop_reporter()).await.unwrap();
	assert_eq!(fs::read(output.join("a/b.txt")).unwrap(), b"hello\n");
	assert_eq!(fs::read(output.join("c.txt")).unwrap(), b"z");

	manager.remove(&ctx, "ds1").await.unwrap();
	let err = manager.remove(&ctx, "ds1").await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotExists);
}

#[tokio::test]
async fn test_created_dataset_can_be_pushed() {
	let (_mock, kube) = setup();
	let ctx = Ctx::background();
	let store_root = tempfile::tempdir().unwrap();
	let work = tempfile::tempdir().unwrap();
	fs::write(work.path().join("data.txt"), b"payload").unwrap();

	let created = kube
		.create_dataset(
			&ctx,
			&CreateDatasetInput {
				name: "fresh".into(),
				store_options: Some(StoreOptions::local(store_root.path().to_string_lossy())),
				archiver_options: Some(ArchiverOptions::tar()),
			},
		)
		.await
		.unwrap();
	assert_eq!(created.key_prefix.len(), 33);
	assert!(created.key_prefix.ends_with('/'));

	let other = kube.create_dataset(&ctx, &dataset_input("other")).await.unwrap();
	assert_ne!(other.key_prefix, created.key_prefix);

	let mut handle = kube.transfers().open(&ctx, &created.name).await.unwrap();
	let pushed = handle.push(&ctx, work.path(), nop_reporter()).await.unwrap();
	handle.close(&ctx).await.unwrap();
	assert_eq!(kube.get_dataset(&ctx, "fresh").await.unwrap().size, pushed);
}

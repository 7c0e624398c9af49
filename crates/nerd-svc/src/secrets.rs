// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Docker registry credentials stored as pull secrets.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use k8s_openapi::ByteString;
use nerd_common_core::{Ctx, SecretString};
use nerd_kube::{ListOptions, Secret};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::error::{SvcError, SvcResult};
use crate::kube::{created_at, name_of, Kube};
use crate::validate::{printascii, required, Validate};

pub const DOCKER_HUB: &str = "index.docker.io";
pub const DOCKER_CONFIG_KEY: &str = ".dockerconfigjson";
pub const DOCKER_CONFIG_TYPE: &str = "kubernetes.io/dockerconfigjson";

pub const REGISTRY_LABEL: &str = "registry";
pub const PROJECT_LABEL: &str = "project";
pub const IMAGE_LABEL: &str = "image";

/// An image reference split the way pull secrets are labeled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
	pub registry: String,
	pub project: String,
	pub image: String,
}

impl ImageRef {
	/// `[registry/][project/]image[:tag][@digest]`. With two segments the
	/// first is a registry only if it contains a `.`; otherwise it is a
	/// Docker Hub project.
	pub fn parse(reference: &str) -> SvcResult<Self> {
		required("image", reference)?;
		let without_digest = reference.split('@').next().unwrap_or(reference);
		let malformed = || {
			SvcError::validation(
				"image",
				format!("{reference:?} is not of the form [registry/][project/]image"),
			)
		};
		let segments: Vec<&str> = without_digest.split('/').collect();
		if segments.iter().any(|s| s.is_empty()) {
			return Err(malformed());
		}

		let strip_tag = |s: &str| s.split(':').next().unwrap_or(s).to_string();
		let (registry, project, image) = match segments.as_slice() {
			[image] => (DOCKER_HUB.to_string(), String::new(), strip_tag(image)),
			[first, image] if first.contains('.') => {
				(first.to_string(), String::new(), strip_tag(image))
			}
			[project, image] => (DOCKER_HUB.to_string(), project.to_string(), strip_tag(image)),
			[registry, project, image] => (registry.to_string(), project.to_string(), strip_tag(image)),
			_ => return Err(malformed()),
		};
		Ok(Self {
			registry,
			project,
			image,
		})
	}

	fn labels(&self) -> BTreeMap<String, String> {
		BTreeMap::from([
			(REGISTRY_LABEL.to_string(), self.registry.clone()),
			(PROJECT_LABEL.to_string(), self.project.clone()),
			(IMAGE_LABEL.to_string(), self.image.clone()),
		])
	}
}

/// The `.dockerconfigjson` blob. Registries are listed both as
/// `https://<registry>/v1/` and bare, since runtimes differ in which
/// they look up. Each entry carries only `auth`.
pub(crate) fn docker_config(registry: &str, username: &str, password: &SecretString) -> Vec<u8> {
	let auth = STANDARD.encode(format!("{username}:{}", password.expose()));
	let entry = json!({ "auth": auth });
	let mut auths = serde_json::Map::new();
	auths.insert(format!("https://{registry}/v1/"), entry.clone());
	auths.insert(registry.to_string(), entry);
	json!({ "auths": auths }).to_string().into_bytes()
}

/// First username found in a `.dockerconfigjson` blob.
pub(crate) fn docker_username(blob: &[u8]) -> SvcResult<String> {
	let decode_err = |message: String| SvcError::Decode {
		what: "docker config",
		message,
	};
	let config: Value = serde_json::from_slice(blob).map_err(|e| decode_err(e.to_string()))?;
	let auths = config
		.get("auths")
		.and_then(Value::as_object)
		.ok_or_else(|| decode_err("missing auths".to_string()))?;
	for entry in auths.values() {
		if let Some(username) = entry.get("username").and_then(Value::as_str) {
			return Ok(username.to_string());
		}
		if let Some(auth) = entry.get("auth").and_then(Value::as_str) {
			let raw = STANDARD.decode(auth).map_err(|e| decode_err(e.to_string()))?;
			let pair = String::from_utf8_lossy(&raw);
			if let Some((username, _)) = pair.split_once(':') {
				return Ok(username.to_string());
			}
		}
	}
	Err(decode_err("no credentials".to_string()))
}

#[derive(Debug, Clone)]
pub struct CreateSecretInput {
	pub image: String,
	pub username: String,
	pub password: SecretString,
}

impl Validate for CreateSecretInput {
	fn validate(&self) -> SvcResult<()> {
		required("image", &self.image)?;
		printascii("image", &self.image)?;
		required("username", &self.username)?;
		printascii("username", &self.username)?;
		required("password", self.password.expose())
	}
}

#[derive(Debug, Clone)]
pub struct UpdateSecretInput {
	pub name: String,
	pub username: String,
	pub password: SecretString,
}

impl Validate for UpdateSecretInput {
	fn validate(&self) -> SvcResult<()> {
		required("name", &self.name)?;
		required("username", &self.username)?;
		printascii("username", &self.username)?;
		required("password", self.password.expose())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretOutput {
	pub name: String,
	pub created_at: Option<DateTime<Utc>>,
	pub registry: String,
	pub project: String,
	pub image: String,
	pub username: String,
}

fn label(secret: &Secret, key: &str) -> String {
	secret
		.metadata
		.labels
		.as_ref()
		.and_then(|l| l.get(key))
		.cloned()
		.unwrap_or_default()
}

fn secret_output(secret: &Secret) -> SvcResult<SecretOutput> {
	let username = match secret.data.as_ref().and_then(|d| d.get(DOCKER_CONFIG_KEY)) {
		Some(blob) => docker_username(&blob.0)?,
		None => String::new(),
	};
	Ok(SecretOutput {
		name: name_of(&secret.metadata),
		created_at: created_at(&secret.metadata),
		registry: label(secret, REGISTRY_LABEL),
		project: label(secret, PROJECT_LABEL),
		image: label(secret, IMAGE_LABEL),
		username,
	})
}

fn docker_secret(image: &ImageRef, username: &str, password: &SecretString) -> Secret {
	let mut secret = Secret {
		type_: Some(DOCKER_CONFIG_TYPE.to_string()),
		data: Some(BTreeMap::from([(
			DOCKER_CONFIG_KEY.to_string(),
			ByteString(docker_config(&image.registry, username, password)),
		)])),
		..Default::default()
	};
	secret.metadata.labels = Some(image.labels());
	secret
}

impl Kube {
	/// Store registry credentials for pulling `image`. The secret's name is
	/// always generated.
	#[instrument(skip(self, ctx, input), fields(image = %input.image))]
	pub async fn create_secret(&self, ctx: &Ctx, input: &CreateSecretInput) -> SvcResult<SecretOutput> {
		input.validate()?;
		let image = ImageRef::parse(&input.image)?;
		let secret = docker_secret(&image, &input.username, &input.password);
		let created = self.kv.create(ctx, secret, "").await?;
		let out = secret_output(&created)?;
		info!(name = %out.name, registry = %image.registry, "created pull secret");
		Ok(out)
	}

	#[instrument(skip(self, ctx))]
	pub async fn get_secret(&self, ctx: &Ctx, name: &str) -> SvcResult<SecretOutput> {
		required("name", name)?;
		secret_output(&self.kv.get::<Secret>(ctx, name).await?)
	}

	#[instrument(skip(self, ctx))]
	pub async fn delete_secret(&self, ctx: &Ctx, name: &str) -> SvcResult<()> {
		required("name", name)?;
		self.kv.delete::<Secret>(ctx, name).await?;
		info!("deleted pull secret");
		Ok(())
	}

	/// Newest first.
	#[instrument(skip(self, ctx))]
	pub async fn list_secrets(&self, ctx: &Ctx) -> SvcResult<Vec<SecretOutput>> {
		let secrets = self.kv.list::<Secret>(ctx, &ListOptions::new()).await?;
		let mut items = secrets.iter().map(secret_output).collect::<SvcResult<Vec<_>>>()?;
		items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
		Ok(items)
	}

	/// Replace the credentials, keeping the registry the secret was made for.
	#[instrument(skip(self, ctx, input), fields(name = %input.name))]
	pub async fn update_secret(&self, ctx: &Ctx, input: &UpdateSecretInput) -> SvcResult<SecretOutput> {
		input.validate()?;
		let mut secret = self.kv.get::<Secret>(ctx, &input.name).await?;
		let registry = label(&secret, REGISTRY_LABEL);
		if registry.is_empty() {
			return Err(SvcError::Decode {
				what: "pull secret",
				message: format!("secret {:?} has no {REGISTRY_LABEL} label", input.name),
			});
		}
		secret.data = Some(BTreeMap::from([(
			DOCKER_CONFIG_KEY.to_string(),
			ByteString(docker_config(&registry, &input.username, &input.password)),
		)]));
		let updated = self.kv.update(ctx, secret, &input.name).await?;
		info!("updated pull secret");
		secret_output(&updated)
	}
}

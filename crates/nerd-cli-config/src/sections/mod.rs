// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections, each as a mergeable layer and a resolved form.

mod compliance;
mod kube;
mod logging;
mod transfer;

pub use compliance::{ComplianceConfig, ComplianceConfigLayer, DEFAULT_MANIFEST_URLS};
pub use kube::{KubeConfig, KubeConfigLayer, DEFAULT_KUBE_TIMEOUT_SECS, DEFAULT_NAMESPACE};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer, DEFAULT_LOG_LEVEL, LOG_LEVELS};
pub use transfer::{TransferConfig, TransferConfigLayer, DEFAULT_REGION};

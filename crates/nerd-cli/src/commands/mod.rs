// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One module per resource; each exposes its subcommands and a `run`.

pub mod cluster;
pub mod dataset;
pub mod fs;
pub mod job;
pub mod quota;
pub mod secret;

pub use cluster::ClusterAction;
pub use dataset::DatasetAction;
pub use fs::FsAction;
pub use job::JobAction;
pub use quota::QuotaAction;
pub use secret::SecretAction;

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Moves dataset directories between the local filesystem and object storage.
//!
//! A [`Store`] does object I/O, an [`Archiver`] decides how a directory maps
//! onto objects, a [`Handle`] runs push/pull/clear for one dataset and the
//! [`Manager`] binds handles to dataset records through a [`DatasetRegistry`].

pub mod archiver;
mod error;
mod handle;
mod manager;
pub mod progress;
pub mod store;

pub use archiver::{open_archiver, Archiver, ObjectSink, ObjectSource, TarArchiver, ARCHIVE_OBJECT};
pub use error::{TransferError, TransferResult};
pub use handle::{Delegate, Handle};
pub use manager::{generate_key_prefix, DatasetRegistry, Manager, KEY_PREFIX_BYTES};
pub use progress::{nop_reporter, NopReporter, Reporter, SharedReporter};
pub use store::{open_store, LocalStore, S3Store, Store};

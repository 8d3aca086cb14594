// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared documents for the preferences engine (preferences, defaults,
//! process config) and the durable blob port the host persists through.
//! Framework-agnostic; used on both sides of the process boundary.

pub mod config;
pub mod document;
pub mod runtime;

pub use config::{BlobStore, DocumentService, StoreError};
pub use document::{DocumentError, Preferences, SectionValues, SEALED_PREFIX};
pub use runtime::Config;

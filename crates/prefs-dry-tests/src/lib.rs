// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for the preferences crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory blob store fake for testing without filesystem
//! - [`host`] - Recording fake of the host side of the session
//! - [`schema`] - Section and field builders

pub mod config;
pub mod host;
pub mod schema;

pub use config::InMemoryBlobStore;
pub use host::FakeHost;
pub use schema::{FieldBuilder, SectionBuilder};

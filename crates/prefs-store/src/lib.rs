// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical preference store owned by the host process.
//!
//! The store is the only writer of the canonical document. Every accepted
//! write is a whole-document replacement that is persisted before it becomes
//! visible; a failed validation or persistence leaves the previous document
//! in place.

pub mod seal;
pub mod store;

pub use seal::{SealError, SecretSealer, SEALED_PREFIX};
pub use store::{PreferenceStore, PreferenceStoreError, DEFAULTS_KEY, PREFERENCES_KEY, SCHEMA_KEY};

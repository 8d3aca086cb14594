// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Preferences window logic, independent of any widget toolkit.
//!
//! A [`Replica`] loads sections, the document and config from the host,
//! keeps a local copy that edits apply to immediately, and persists the
//! whole document through a [`DebouncedWriter`] once edits go quiet. Host
//! pushes replace the local copy in emission order.
//!
//! Rendering is left to the embedding toolkit: [`Replica::sidebar`] and
//! [`Replica::active_fields`] produce plain view models, and field kinds are
//! pluggable through [`FieldRegistry`].
#![forbid(unsafe_code)]

pub mod debounce;
pub mod fields;
pub mod icons;
pub mod replica;
pub mod state;

pub use debounce::{DebouncedWriter, SaveState};
pub use fields::{FieldError, FieldKind, FieldRegistry, FieldView, MapEditor, Widget};
pub use icons::{IconRegistry, FALLBACK_ICON};
pub use replica::{Replica, ReplicaError, SidebarItem};
pub use state::{reduce, reconcile, UiEffect, UiEvent, UiState};

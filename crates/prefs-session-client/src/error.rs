// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Errors for a single round trip across the process boundary.

use prefs_schema::SchemaError;
use prefs_session_proto::{wire::WireError, ErrorPayload};
use thiserror::Error;

/// A message round trip failed. The caller's state is never touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The connection is gone (reader or writer task ended).
    #[error("session closed")]
    Closed,
    /// No reply arrived within the request timeout.
    #[error("request `{0}` timed out")]
    Timeout(&'static str),
    /// Host answered with an error payload.
    #[error("host rejected request: {} ({})", .0.name, .0.message)]
    Host(ErrorPayload),
    /// Host answered with the wrong reply kind.
    #[error("unexpected reply `{got}` to `{request}`")]
    UnexpectedReply {
        /// Request op.
        request: &'static str,
        /// Reply op actually received.
        got: &'static str,
    },
    /// Host sent a schema this replica cannot accept.
    #[error("schema rejected: {0}")]
    Schema(#[from] SchemaError),
    /// Framing or codec failure.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// Transport I/O failure.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        ChannelError::Io(err.to_string())
    }
}

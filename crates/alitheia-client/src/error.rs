// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy of the client runtime.
//!
//! There is no automatic retry anywhere in this layer; recovery is the
//! caller's responsibility. A wire value that matches no local type is not
//! an error at all (it marshals to absent, see `alitheia-proto`).

use alitheia_proto::WireValue;
use thiserror::Error;

/// Failures surfaced by the client runtime.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A remote object could not be resolved at construction. Fatal to the
    /// constructing component; surfaced to the caller, never retried here.
    #[error("remote object `{name}` could not be resolved: {reason}")]
    Connection {
        /// Name of the remote object that failed to resolve.
        name: String,
        /// Transport-supplied reason.
        reason: String,
    },

    /// A remote invocation raised a service-side fault.
    #[error("remote call `{method}` failed: {reason}")]
    RemoteCall {
        /// Method that was invoked.
        method: String,
        /// Service-supplied fault description.
        reason: String,
    },

    /// A reply did not have the shape the protocol promises.
    #[error("unexpected reply from `{method}`: expected {expected}")]
    UnexpectedReply {
        /// Method that was invoked.
        method: String,
        /// Shape the caller expected.
        expected: &'static str,
    },

    /// An externally launched analysis program terminated abnormally. The
    /// operation aborts without persisting a result.
    #[error("analysis program `{program}` terminated abnormally")]
    Subprocess {
        /// The program that was launched.
        program: String,
    },

    /// A local I/O failure (temp files, checkout materialization).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub(crate) fn remote(method: &str, reason: impl Into<String>) -> Self {
        Self::RemoteCall {
            method: method.to_owned(),
            reason: reason.into(),
        }
    }
}

pub(crate) fn expect_int(method: &str, value: WireValue) -> Result<i64, ClientError> {
    value.as_int().ok_or(ClientError::UnexpectedReply {
        method: method.to_owned(),
        expected: "an integer",
    })
}

pub(crate) fn expect_str(method: &str, value: WireValue) -> Result<String, ClientError> {
    match value {
        WireValue::Str(s) => Ok(s),
        _ => Err(ClientError::UnexpectedReply {
            method: method.to_owned(),
            expected: "a string",
        }),
    }
}

pub(crate) fn expect_bool(method: &str, value: WireValue) -> Result<bool, ClientError> {
    value.as_bool().ok_or(ClientError::UnexpectedReply {
        method: method.to_owned(),
        expected: "a boolean",
    })
}

pub(crate) fn expect_list(method: &str, value: WireValue) -> Result<Vec<WireValue>, ClientError> {
    match value {
        WireValue::List(items) => Ok(items),
        _ => Err(ClientError::UnexpectedReply {
            method: method.to_owned(),
            expected: "a list",
        }),
    }
}

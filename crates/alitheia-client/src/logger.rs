// SPDX-License-Identifier: Apache-2.0
//! Best-effort facade over the remote logging service.
//!
//! Messages are tagged with a well-known channel name. Failing to resolve
//! the service at construction is an error. Failing to deliver a message
//! is not: delivery problems go to local diagnostics and the caller
//! continues.

use crate::error::ClientError;
use crate::orb::{Orb, RemoteObject};
use alitheia_proto::WireValue;
use std::sync::Arc;
use tracing::warn;

const LOGGER_OBJECT: &str = "Logger";

/// Well-known logging channels of the remote service.
pub mod channel {
    /// Root channel.
    pub const SQOOSS: &str = "sqooss";
    /// Database layer.
    pub const DATABASE: &str = "sqooss.database";
    /// File-data service.
    pub const FDS: &str = "sqooss.fds";
    /// Metric plug-ins.
    pub const METRIC: &str = "sqooss.metric";
    /// Job scheduling.
    pub const SCHEDULING: &str = "sqooss.scheduling";
}

/// Client for the remote logging service, bound to one channel.
#[derive(Clone)]
pub struct Logger {
    remote: Arc<dyn RemoteObject>,
    channel: String,
}

impl Logger {
    /// Connect to the remote logging service on `channel`.
    pub fn connect(orb: &dyn Orb, channel: &str) -> Result<Self, ClientError> {
        Ok(Self {
            remote: orb.resolve(LOGGER_OBJECT)?,
            channel: channel.to_owned(),
        })
    }

    /// Log at debug severity.
    pub fn debug(&self, message: &str) {
        self.send("debug", message);
    }

    /// Log at info severity.
    pub fn info(&self, message: &str) {
        self.send("info", message);
    }

    /// Log at warning severity.
    pub fn warn(&self, message: &str) {
        self.send("warn", message);
    }

    /// Log at error severity.
    pub fn error(&self, message: &str) {
        self.send("error", message);
    }

    fn send(&self, severity: &str, message: &str) {
        let args = [
            WireValue::from(self.channel.as_str()),
            WireValue::from(message),
        ];
        if let Err(error) = self.remote.call(severity, &args) {
            warn!(channel = %self.channel, %error, "remote log message dropped");
        }
    }
}

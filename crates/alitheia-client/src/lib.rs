// SPDX-License-Identifier: Apache-2.0
//! Client runtime for the Alitheia analysis service: typed access to the
//! remote job scheduler, object database, and file-data service over a
//! string-named-call transport.
//!
//! The transport itself is out of scope; it is consumed through the three
//! traits in [`orb`] (resolve a named remote object, export a local one,
//! one generic call primitive). Everything else builds on those:
//! [`Core`] registers local [`Metric`]/[`Job`] objects and drives the
//! remote scheduler, [`Database`] is the record CRUD and query facade,
//! [`Fds`] serves file content as lazy [`ContentStream`]s, and [`Logger`]
//! forwards messages to the service's logging channels best-effort.
//!
//! The [`testing`] module carries an in-process loopback transport and
//! fake services so all of the above can run without a live service.

pub mod core;
pub mod db;
pub mod error;
pub mod fds;
pub mod job;
pub mod logger;
pub mod metric;
pub mod orb;
pub mod stream;
pub mod testing;

pub use crate::core::Core;
pub use db::Database;
pub use error::ClientError;
pub use fds::{Checkout, Fds};
pub use job::{Job, JobHandle, JobState};
pub use logger::Logger;
pub use metric::{Metric, MetricHandle};
pub use orb::{Orb, RemoteObject, Servant};
pub use stream::{ContentFetcher, ContentStream};

// SPDX-License-Identifier: Apache-2.0
//! The transport seam.
//!
//! Connection establishment, framing, and request dispatch belong to the
//! transport; the runtime only needs three capabilities: resolving a named
//! remote object to a callable stub, publishing a local object under a
//! name, and a single generic invocation primitive every typed call is
//! built on. The transport may deliver inbound calls on threads the client
//! does not control; see `Core::run` for how user code is kept off those
//! threads.

use crate::error::ClientError;
use alitheia_proto::WireValue;
use std::sync::Arc;

/// A callable stub for a named remote object.
pub trait RemoteObject: Send + Sync {
    /// Invoke `method` with `args`, blocking until the reply arrives.
    fn call(&self, method: &str, args: &[WireValue]) -> Result<WireValue, ClientError>;
}

/// A local object published through the transport.
///
/// `dispatch` may be invoked from a transport thread at any time after
/// export; implementations must be safe to call concurrently with the
/// exporting thread.
pub trait Servant: Send + Sync {
    /// Handle an inbound call.
    fn dispatch(&self, method: &str, args: &[WireValue]) -> Result<WireValue, ClientError>;
}

/// The object broker the runtime is connected through.
pub trait Orb: Send + Sync {
    /// Resolve a named remote object.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connection`] if the object cannot be located.
    fn resolve(&self, name: &str) -> Result<Arc<dyn RemoteObject>, ClientError>;

    /// Publish a local object so remote calls can reach it by name.
    fn export(&self, name: &str, servant: Arc<dyn Servant>) -> Result<(), ClientError>;
}

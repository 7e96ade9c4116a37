//! Synchronous call façade.
//!
//! [`call`] is the single choke point through which every native operation
//! runs: validate the handle, invoke the entry point on the current thread,
//! surface the result. The async bridge dispatches this exact function on
//! its worker threads, which is what makes the sync and async variants of
//! an operation observably equivalent: same marshaling and error mapping,
//! differing only in which thread blocks.

use crate::error::Result;
use crate::handle::Handle;

/// Invokes a native operation against `handle`, blocking the calling
/// thread for the operation's full duration.
///
/// Fails fast with [`ClosedHandle`](crate::error::BridgeError::ClosedHandle)
/// before touching the native side when the handle (or any ancestor) has
/// been closed. Native status codes arrive already mapped into the crate
/// taxonomy by the `op` closure (see `impl From<NativeError> for
/// BridgeError`).
pub fn call<R>(handle: &Handle, op: impl FnOnce() -> Result<R>) -> Result<R> {
    handle.ensure_open()?;
    op()
}

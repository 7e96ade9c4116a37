//! Error types for the bridge layer.
//!
//! Every failure surfaced by this crate falls into one of four buckets:
//!
//! - [`BridgeError::ClosedHandle`]: an operation reached a released
//!   resource. Always fatal to that call, never retried.
//! - [`BridgeError::NativeOperation`]: the native collaborator reported
//!   failure. The status code and message are surfaced verbatim.
//! - [`BridgeError::Cancelled`]: the caller asked for the work item to
//!   stop, either before it started or cooperatively mid-run. Kept distinct
//!   from native failure so callers can branch on user intent.
//! - [`BridgeError::Marshaling`]: an argument or result could not be
//!   converted across the call boundary. Indicates a binding defect.
//!
//! Errors raised on a worker thread are never propagated on that thread;
//! they settle the corresponding [`WorkHandle`](crate::bridge::WorkHandle).

use crate::handle::HandleId;
use crate::native::{NativeError, CODE_INTERRUPTED};
use thiserror::Error;

/// Errors surfaced by the bridge and iteration layer.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Operation attempted on a handle that has been closed.
    #[error("operation on closed handle {0}")]
    ClosedHandle(HandleId),

    /// The native collaborator reported a failure.
    #[error("native operation failed (code {code}): {message}")]
    NativeOperation { code: i32, message: String },

    /// The work item was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Argument or result conversion across the call boundary failed.
    #[error("marshaling failure: {0}")]
    Marshaling(String),
}

impl BridgeError {
    /// Returns `true` for caller-initiated cancellation, as opposed to a
    /// genuine native failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BridgeError::Cancelled)
    }
}

impl From<NativeError> for BridgeError {
    /// Maps a native status into the taxonomy. The interrupt code is the
    /// one status that does not mean failure: it is how the native side
    /// acknowledges a cooperative abort, so it maps to [`Cancelled`].
    ///
    /// [`Cancelled`]: BridgeError::Cancelled
    fn from(err: NativeError) -> Self {
        if err.code == CODE_INTERRUPTED {
            BridgeError::Cancelled
        } else {
            BridgeError::NativeOperation {
                code: err.code,
                message: err.message,
            }
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeError;

    #[test]
    fn test_interrupted_maps_to_cancelled() {
        let err: BridgeError = NativeError::interrupted().into();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_failure_maps_to_native_operation() {
        let err: BridgeError = NativeError::failure("boom").into();
        match err {
            BridgeError::NativeOperation { message, .. } => assert_eq!(message, "boom"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}

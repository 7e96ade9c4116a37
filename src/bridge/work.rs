//! Work items and the caller-side handle to a submitted work item.

use crate::error::{BridgeError, Result};
use crate::handle::HandleId;
use crate::progress::{ProgressReceiver, ProgressTick};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

static WORK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_work_id() -> u64 {
    WORK_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// The gate a work item is executed through: `Ok` means "run the native
/// call now", `Err` carries the settlement for an item that never ran
/// (cancelled while queued, bridge shut down, handle already closed).
pub(crate) type Gate = std::result::Result<(), BridgeError>;

/// Type-erased deferred invocation. Settles its caller's future exactly
/// once, on whichever path consumes it.
pub(crate) type WorkFn = Box<dyn FnOnce(Gate) + Send>;

/// One deferred native call queued on the bridge.
pub(crate) struct WorkItem {
    pub lane: HandleId,
    pub id: u64,
    pub token: CancellationToken,
    pub run: WorkFn,
}

/// Future-like handle to a submitted work item.
///
/// Settles exactly once with the operation's result; progress ticks, if
/// any, are observable strictly before settlement via
/// [`progress`](Self::progress) or [`wait_with_progress`](Self::wait_with_progress).
///
/// # Example
///
/// ```ignore
/// let work = alg::checksum_image_async(&bridge, &band, None);
/// let sum = work.wait().await?;
/// ```
pub struct WorkHandle<R> {
    pub(crate) rx: oneshot::Receiver<Result<R>>,
    pub(crate) token: CancellationToken,
    pub(crate) progress: ProgressReceiver,
}

impl<R> WorkHandle<R> {
    /// Requests cancellation.
    ///
    /// A work item that has not started is dequeued and settles
    /// [`Cancelled`](BridgeError::Cancelled) without any native invocation.
    /// A started item is asked to stop at its next progress callback;
    /// cancellation past that point is best-effort, not instantaneous.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The progress tick stream for this work item.
    pub fn progress(&mut self) -> &mut ProgressReceiver {
        &mut self.progress
    }

    /// Waits for the work item to settle.
    pub async fn wait(self) -> Result<R> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Marshaling(
                "work item dropped without settling".into(),
            )),
        }
    }

    /// Waits for settlement while delivering progress ticks to `on_tick`
    /// on the calling context, in emission order. Returning
    /// `ControlFlow::Break` from the visitor cancels the work item, after
    /// which [`is_cancelled`](crate::progress::ProgressSink::is_cancelled)
    /// reads true on the worker side for the remainder of the run.
    ///
    /// Ticks that arrived before settlement are delivered before this
    /// returns.
    pub async fn wait_with_progress<F>(self, mut on_tick: F) -> Result<R>
    where
        F: FnMut(&ProgressTick) -> ControlFlow<()>,
    {
        let WorkHandle {
            mut rx,
            token,
            mut progress,
        } = self;
        loop {
            tokio::select! {
                settled = &mut rx => {
                    while let Some(tick) = progress.try_recv() {
                        let _ = on_tick(&tick);
                    }
                    return match settled {
                        Ok(result) => result,
                        Err(_) => Err(BridgeError::Marshaling(
                            "work item dropped without settling".into(),
                        )),
                    };
                }
                tick = progress.recv() => {
                    match tick {
                        Some(tick) => {
                            if on_tick(&tick).is_break() {
                                token.cancel();
                            }
                        }
                        // Sink gone: the native call has returned, only the
                        // settlement remains.
                        None => {
                            return match (&mut rx).await {
                                Ok(result) => result,
                                Err(_) => Err(BridgeError::Marshaling(
                                    "work item dropped without settling".into(),
                                )),
                            };
                        }
                    }
                }
            }
        }
    }
}

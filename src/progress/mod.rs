//! Progress/cancellation channel.
//!
//! Constructed per work item. The worker side holds a [`ProgressSink`] and
//! calls [`report`](ProgressSink::report) from whatever thread the native
//! algorithm runs on; the caller side consumes a [`ProgressReceiver`] from
//! its own context. The boundary is a message channel; caller code is
//! never invoked on the worker thread.
//!
//! Ticks carry a monotonically increasing sequence number and are received
//! in emission order. A work item whose native algorithm reports no
//! progress simply produces zero ticks, which is valid.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One progress report from a running native operation.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressTick {
    /// Position in the emission order of this work item, starting at 0.
    pub seq: u64,
    /// Completed fraction in `[0, 1]`.
    pub fraction: f64,
    /// Message supplied by the native algorithm, possibly empty.
    pub message: String,
}

struct SinkShared {
    tx: mpsc::UnboundedSender<ProgressTick>,
    seq: AtomicU64,
    cancel: CancellationToken,
}

/// Worker-side end of the channel, handed to the native progress callback.
#[derive(Clone)]
pub struct ProgressSink {
    shared: Arc<SinkShared>,
}

impl ProgressSink {
    /// Creates a linked sink/receiver pair. `cancel` is the work item's
    /// cancellation token; once it trips, `report` starts returning `false`.
    pub(crate) fn new(cancel: CancellationToken) -> (Self, ProgressReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            shared: Arc::new(SinkShared {
                tx,
                seq: AtomicU64::new(0),
                cancel,
            }),
        };
        (sink, ProgressReceiver { rx })
    }

    /// Emits a tick and returns whether the operation should continue.
    ///
    /// Safe to call from a worker thread while the caller drains the
    /// receiver concurrently. A closed receiver is not an error; the tick
    /// is simply dropped.
    pub fn report(&self, fraction: f64, message: &str) -> bool {
        let seq = self.shared.seq.fetch_add(1, Ordering::Relaxed);
        let _ = self.shared.tx.send(ProgressTick {
            seq,
            fraction: fraction.clamp(0.0, 1.0),
            message: message.to_string(),
        });
        !self.is_cancelled()
    }

    /// Whether the caller has requested cancellation of this work item.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

/// Caller-side end of the channel.
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressTick>,
}

impl ProgressReceiver {
    /// Waits for the next tick. `None` once the work item has settled and
    /// all ticks were drained.
    pub async fn recv(&mut self) -> Option<ProgressTick> {
        self.rx.recv().await
    }

    /// Returns an already-delivered tick without waiting.
    pub fn try_recv(&mut self) -> Option<ProgressTick> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ticks_arrive_in_emission_order() {
        let (sink, mut rx) = ProgressSink::new(CancellationToken::new());
        for i in 0..5 {
            assert!(sink.report(i as f64 / 5.0, "step"));
        }
        drop(sink);
        let mut seqs = Vec::new();
        while let Some(tick) = rx.recv().await {
            seqs.push(tick.seq);
        }
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_report_observes_cancellation() {
        let token = CancellationToken::new();
        let (sink, _rx) = ProgressSink::new(token.clone());
        assert!(sink.report(0.1, ""));
        token.cancel();
        assert!(!sink.report(0.2, ""));
        assert!(sink.is_cancelled());
    }

    #[tokio::test]
    async fn test_fraction_is_clamped() {
        let (sink, mut rx) = ProgressSink::new(CancellationToken::new());
        sink.report(1.5, "");
        sink.report(-0.5, "");
        assert_eq!(rx.recv().await.unwrap().fraction, 1.0);
        assert_eq!(rx.recv().await.unwrap().fraction, 0.0);
    }
}

//! Async execution bridge.
//!
//! The bridge accepts units of work (a closure over one native operation),
//! schedules them on a bounded worker pool, and settles a [`WorkHandle`]
//! on the submitting context when the worker completes. A dispatcher task
//! owns the scheduling state:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                            │
//! │  ┌──────────┐   ┌────────────────┐   ┌──────────────────┐   │
//! │  │ Submit   │──▶│ Per-handle     │──▶│ Worker pool      │   │
//! │  │ channel  │   │ FIFO lanes     │   │ (semaphore +     │   │
//! │  └──────────┘   └────────────────┘   │  spawn_blocking) │   │
//! │       ▲                ▲             └──────────────────┘   │
//! │       │                └──────── completion channel ◀───────│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Guarantees:
//! - work items targeting one handle execute strictly serialized, in
//!   submission order (the native object is not reentrant);
//! - items on distinct handles run in parallel up to the pool bound and
//!   settle in completion order, not submission order;
//! - an item cancelled before a worker picks it up settles `Cancelled`
//!   with zero native invocations.
//!
//! The unit of work a worker executes is [`facade::call`], the same entry
//! point the blocking public API uses, so both paths are observably
//! equivalent.
//!
//! # Example
//!
//! ```ignore
//! let bridge = Bridge::new(BridgeConfig::default());
//! let work = bridge.submit(dataset.handle(), move |sink| {
//!     sink.report(1.0, "done");
//!     Ok(42)
//! });
//! let value = work.wait().await?;
//! ```

mod work;

pub use work::WorkHandle;
pub(crate) use work::{next_work_id, WorkItem};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::facade;
use crate::handle::{Handle, HandleId};
use crate::progress::ProgressSink;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle for submitting work to the dispatcher. Cloneable; all clones
/// feed one dispatcher. The dispatcher drains and exits once every clone
/// is dropped or [`shutdown`](Bridge::shutdown) is called.
#[derive(Clone)]
pub struct Bridge {
    submit_tx: mpsc::UnboundedSender<WorkItem>,
    shutdown: CancellationToken,
}

impl Bridge {
    /// Creates a bridge and spawns its dispatcher on the current tokio
    /// runtime.
    pub fn new(config: BridgeConfig) -> Self {
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let dispatcher = Dispatcher {
            submit_rx,
            done_tx,
            done_rx,
            lanes: HashMap::new(),
            semaphore: Arc::new(Semaphore::new(config.workers.max(1))),
            shutdown: shutdown.clone(),
            in_flight: 0,
            intake_closed: false,
        };
        tokio::spawn(dispatcher.run());
        Self {
            submit_tx,
            shutdown,
        }
    }

    /// Submits one native operation against `handle`.
    ///
    /// `work` receives the work item's [`ProgressSink`]; operations without
    /// progress capability simply ignore it. The closure runs on a worker
    /// thread through the synchronous façade, so a closed handle fails the
    /// same way it would on the blocking path.
    pub fn submit<R, F>(&self, handle: &Handle, work: F) -> WorkHandle<R>
    where
        F: FnOnce(&ProgressSink) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let token = CancellationToken::new();
        let (sink, progress) = ProgressSink::new(token.clone());
        let (result_tx, result_rx) = oneshot::channel::<Result<R>>();

        let run_handle = handle.clone();
        let run_sink = sink.clone();
        let item = WorkItem {
            lane: handle.lane_id(),
            id: next_work_id(),
            token: token.clone(),
            run: Box::new(move |gate| {
                let result = match gate {
                    Ok(()) => facade::call(&run_handle, || work(&run_sink)),
                    Err(err) => Err(err),
                };
                let _ = result_tx.send(result);
            }),
        };

        // Fail fast before queueing; matches the façade's own check.
        if let Err(err) = handle.ensure_open() {
            (item.run)(Err(err));
        } else if let Err(mpsc::error::SendError(item)) = self.submit_tx.send(item) {
            (item.run)(Err(BridgeError::Cancelled));
        }

        WorkHandle {
            rx: result_rx,
            token,
            progress,
        }
    }

    /// Stops intake and settles all queued (not yet started) work items as
    /// `Cancelled`. In-flight native calls run to completion; blocking
    /// native code cannot be preempted.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Per-handle FIFO of pending work plus the in-flight marker.
struct Lane {
    busy: bool,
    queue: VecDeque<WorkItem>,
}

struct Dispatcher {
    submit_rx: mpsc::UnboundedReceiver<WorkItem>,
    done_tx: mpsc::UnboundedSender<HandleId>,
    done_rx: mpsc::UnboundedReceiver<HandleId>,
    lanes: HashMap<HandleId, Lane>,
    semaphore: Arc<Semaphore>,
    shutdown: CancellationToken,
    in_flight: usize,
    intake_closed: bool,
}

impl Dispatcher {
    async fn run(mut self) {
        debug!("bridge dispatcher started");
        loop {
            tokio::select! {
                Some(lane) = self.done_rx.recv() => self.on_complete(lane),
                item = self.submit_rx.recv(), if !self.intake_closed => match item {
                    Some(item) => self.on_submit(item),
                    None => self.intake_closed = true,
                },
                _ = self.shutdown.cancelled(), if !self.intake_closed => {
                    debug!("bridge shutdown requested");
                    self.intake_closed = true;
                    self.submit_rx.close();
                    self.drain_intake();
                    self.cancel_queued();
                }
            }
            if self.intake_closed && self.in_flight == 0 && self.lanes.is_empty() {
                break;
            }
        }
        debug!("bridge dispatcher stopped");
    }

    fn on_submit(&mut self, item: WorkItem) {
        let lane_id = item.lane;
        debug!(work = item.id, lane = %lane_id, "work item submitted");
        self.lanes
            .entry(lane_id)
            .or_insert_with(|| Lane {
                busy: false,
                queue: VecDeque::new(),
            })
            .queue
            .push_back(item);
        self.dispatch_lane(lane_id);
    }

    fn on_complete(&mut self, lane_id: HandleId) {
        self.in_flight -= 1;
        if let Some(lane) = self.lanes.get_mut(&lane_id) {
            lane.busy = false;
        }
        self.dispatch_lane(lane_id);
    }

    /// Starts the next runnable item on a lane, dropping queued items whose
    /// token already tripped. At most one item per lane is ever in flight.
    fn dispatch_lane(&mut self, lane_id: HandleId) {
        let Some(lane) = self.lanes.get_mut(&lane_id) else {
            return;
        };
        let mut next = None;
        if !lane.busy {
            while let Some(item) = lane.queue.pop_front() {
                if item.token.is_cancelled() {
                    debug!(work = item.id, "work item cancelled while queued");
                    (item.run)(Err(BridgeError::Cancelled));
                    continue;
                }
                lane.busy = true;
                next = Some(item);
                break;
            }
        }
        if !lane.busy && lane.queue.is_empty() {
            self.lanes.remove(&lane_id);
        }
        if let Some(item) = next {
            self.in_flight += 1;
            self.spawn_worker(item);
        }
    }

    /// Runs one work item: wait for a pool permit (or cancellation), then
    /// execute the blocking native call off the async runtime.
    fn spawn_worker(&self, item: WorkItem) {
        let semaphore = Arc::clone(&self.semaphore);
        let done_tx = self.done_tx.clone();
        let WorkItem {
            lane,
            id,
            token,
            run,
        } = item;
        tokio::spawn(async move {
            let permit = tokio::select! {
                _ = token.cancelled() => None,
                permit = semaphore.acquire_owned() => permit.ok(),
            };
            // The select is unbiased: a permit can win the race even when
            // the token tripped first, so re-check before running.
            match permit {
                None => {
                    debug!(work = id, "work item cancelled before start");
                    run(Err(BridgeError::Cancelled));
                }
                Some(_permit) if token.is_cancelled() => {
                    debug!(work = id, "work item cancelled before start");
                    run(Err(BridgeError::Cancelled));
                }
                Some(_permit) => {
                    debug!(work = id, "work item started");
                    if tokio::task::spawn_blocking(move || run(Ok(()))).await.is_err() {
                        warn!(work = id, "native work item panicked");
                    }
                }
            }
            let _ = done_tx.send(lane);
        });
    }

    /// Settles anything still buffered in the intake channel.
    fn drain_intake(&mut self) {
        while let Ok(item) = self.submit_rx.try_recv() {
            (item.run)(Err(BridgeError::Cancelled));
        }
    }

    /// Settles every queued (not in-flight) work item as `Cancelled`.
    fn cancel_queued(&mut self) {
        for lane in self.lanes.values_mut() {
            for item in lane.queue.drain(..) {
                debug!(work = item.id, "queued work item cancelled by shutdown");
                (item.run)(Err(BridgeError::Cancelled));
            }
        }
        self.lanes.retain(|_, lane| lane.busy);
    }
}

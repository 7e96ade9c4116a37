//! Handle registry: lifecycle tracking for wrappers around native resources.
//!
//! Every wrapper (dataset, band, layer, feature, field set) owns a
//! [`Handle`] registered here. A handle carries an open/closed latch and an
//! optional parent: child handles (a band of a dataset) become unusable the
//! moment any ancestor closes. Closing is idempotent, and the release hook
//! supplied at registration runs exactly once, on whichever path closes
//! first: explicit `close()`, wrapper drop, or registry finalization.
//!
//! The registry is process-global, mirroring how the native library tracks
//! its own object store; obtain it with [`registry()`].

use crate::error::{BridgeError, Result};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

/// Identifier of a registered handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleId({})", self.0)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

struct HandleEntry {
    id: HandleId,
    open: AtomicBool,
    parent: Option<Arc<HandleEntry>>,
    release: Mutex<Option<ReleaseFn>>,
}

impl HandleEntry {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
            && self.parent.as_ref().map_or(true, |p| p.is_open())
    }

    /// Flips the latch. Returns `true` on the one call that performed the
    /// transition; every later call is a no-op.
    fn close(&self) -> bool {
        if !self.open.swap(false, Ordering::AcqRel) {
            return false;
        }
        let release = self
            .release
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(release) = release {
            release();
        }
        true
    }

    fn root_id(&self) -> HandleId {
        match &self.parent {
            Some(parent) => parent.root_id(),
            None => self.id,
        }
    }
}

/// A registered handle. Cheap to clone; all clones share one latch.
#[derive(Clone)]
pub struct Handle {
    entry: Arc<HandleEntry>,
}

impl Handle {
    pub fn id(&self) -> HandleId {
        self.entry.id
    }

    /// Key for per-handle work serialization: the root of the parent chain,
    /// so operations against children of one native object share a lane.
    pub fn lane_id(&self) -> HandleId {
        self.entry.root_id()
    }

    /// True while this handle and every ancestor are open.
    pub fn is_open(&self) -> bool {
        self.entry.is_open()
    }

    /// Fails fast with [`BridgeError::ClosedHandle`] when closed.
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BridgeError::ClosedHandle(self.id()))
        }
    }

    /// Closes the handle, releasing the native resource exactly once.
    /// Idempotent: closing an already-closed handle is a no-op because
    /// explicit close is expected to race with scope-exit cleanup.
    pub fn close(&self) {
        if self.entry.close() {
            debug!(handle = %self.id(), "handle closed");
            registry().forget(self.id());
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id())
            .field("open", &self.is_open())
            .finish()
    }
}

/// Process-global registry of live handles.
pub struct HandleRegistry {
    entries: DashMap<u64, Arc<HandleEntry>>,
    next_id: AtomicU64,
}

impl HandleRegistry {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn insert(&self, parent: Option<Arc<HandleEntry>>, release: Option<ReleaseFn>) -> Handle {
        let id = HandleId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(HandleEntry {
            id,
            open: AtomicBool::new(true),
            parent,
            release: Mutex::new(release),
        });
        self.entries.insert(id.raw(), Arc::clone(&entry));
        Handle { entry }
    }

    /// Registers a new root handle with no release hook.
    pub fn register(&self) -> Handle {
        self.insert(None, None)
    }

    /// Registers a new root handle whose hook runs exactly once when the
    /// handle closes.
    pub fn register_with_release(&self, release: impl FnOnce() + Send + 'static) -> Handle {
        self.insert(None, Some(Box::new(release)))
    }

    /// Registers a handle subordinate to `parent`: it reads as closed
    /// whenever the parent is.
    pub fn register_child(&self, parent: &Handle) -> Handle {
        self.insert(Some(Arc::clone(&parent.entry)), None)
    }

    /// Open state by id; unknown ids read as closed.
    pub fn is_open(&self, id: HandleId) -> bool {
        self.entries
            .get(&id.raw())
            .map(|e| e.is_open())
            .unwrap_or(false)
    }

    /// Closes a handle by id. Idempotent, like [`Handle::close`].
    pub fn close(&self, id: HandleId) {
        if let Some(entry) = self.entries.get(&id.raw()).map(|e| Arc::clone(&e)) {
            if entry.close() {
                debug!(handle = %id, "handle closed via registry");
                self.forget(id);
            }
        }
    }

    /// Reclamation path: identical latch to [`close`](Self::close), invoked
    /// by wrapper drop glue.
    pub fn finalize(&self, id: HandleId) {
        self.close(id);
    }

    /// Number of handles still tracked.
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    fn forget(&self, id: HandleId) {
        self.entries.remove(&id.raw());
    }
}

/// The process-global handle registry.
pub fn registry() -> &'static HandleRegistry {
    static REGISTRY: OnceLock<HandleRegistry> = OnceLock::new();
    REGISTRY.get_or_init(HandleRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_close_is_idempotent_and_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let handle = registry().register_with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(handle.is_open());
        handle.close();
        handle.close();
        registry().close(handle.id());
        assert!(!handle.is_open());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ensure_open_fails_after_close() {
        let handle = registry().register();
        assert!(handle.ensure_open().is_ok());
        handle.close();
        match handle.ensure_open() {
            Err(BridgeError::ClosedHandle(id)) => assert_eq!(id, handle.id()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_child_closes_with_parent() {
        let parent = registry().register();
        let child = registry().register_child(&parent);
        let grandchild = registry().register_child(&child);
        assert!(grandchild.is_open());
        assert_eq!(grandchild.lane_id(), parent.id());
        parent.close();
        assert!(!child.is_open());
        assert!(!grandchild.is_open());
    }

    #[test]
    fn test_registry_reads_unknown_id_as_closed() {
        let handle = registry().register();
        assert!(registry().is_open(handle.id()));
        handle.close();
        assert!(!registry().is_open(handle.id()));
    }
}

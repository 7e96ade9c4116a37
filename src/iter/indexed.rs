//! Indexed collection sessions: 1-based position against a live count.

use crate::bridge::{Bridge, WorkHandle};
use crate::error::Result;
use futures::Stream;
use std::ops::ControlFlow;

/// A collection addressable by a 1-based index up to a re-readable count.
///
/// Native numbering starts at 1, not 0. `live_count` is deliberately not
/// cached by sessions: concurrent mutation of the collection is reflected,
/// not frozen.
pub trait IndexedCollection {
    type Item;

    /// Current element count, re-read from the native side.
    fn live_count(&self) -> Result<usize>;

    /// Fetches the element at a 1-based position.
    fn fetch(&self, index: usize) -> Result<Self::Item>;

    /// Async form of [`live_count`](Self::live_count), routed through the
    /// bridge.
    fn live_count_async(&self, bridge: &Bridge) -> WorkHandle<usize>;

    /// Async form of [`fetch`](Self::fetch), routed through the bridge.
    fn fetch_async(&self, bridge: &Bridge, index: usize) -> WorkHandle<Self::Item>;
}

/// Callback walk over an indexed collection.
///
/// Visits positions `1..=count` in order exactly once, passing the 1-based
/// position alongside each element. The count is read once at entry, as a
/// walk is a single bulk traversal. `ControlFlow::Break` from the visitor
/// stops the walk; later positions are never fetched.
pub fn for_each_indexed<C, F>(collection: &C, mut visitor: F) -> Result<()>
where
    C: IndexedCollection,
    F: FnMut(C::Item, usize) -> ControlFlow<()>,
{
    let count = collection.live_count()?;
    for index in 1..=count {
        let item = collection.fetch(index)?;
        if visitor(item, index).is_break() {
            break;
        }
    }
    Ok(())
}

/// Blocking pull session over an indexed collection.
///
/// Restartable by constructing a fresh session, which always begins at
/// position 1 regardless of what previous sessions consumed.
pub struct IndexedIter<C: IndexedCollection> {
    collection: C,
    position: usize,
    done: bool,
}

impl<C: IndexedCollection> IndexedIter<C> {
    pub fn new(collection: C) -> Self {
        Self {
            collection,
            position: 1,
            done: false,
        }
    }
}

impl<C: IndexedCollection> Iterator for IndexedIter<C> {
    type Item = Result<C::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let count = match self.collection.live_count() {
            Ok(count) => count,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        if self.position > count {
            self.done = true;
            return None;
        }
        let item = self.collection.fetch(self.position);
        self.position += 1;
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

/// Async pull session over an indexed collection.
///
/// Suspends at each step while the count and the element fetch round-trip
/// through the bridge; granularity is one fetch per step.
pub struct AsyncIndexedIter<C: IndexedCollection> {
    collection: C,
    bridge: Bridge,
    position: usize,
    done: bool,
}

impl<C: IndexedCollection> AsyncIndexedIter<C> {
    pub fn new(collection: C, bridge: Bridge) -> Self {
        Self {
            collection,
            bridge,
            position: 1,
            done: false,
        }
    }

    /// Fetches the next element, suspending until the bridge settles it.
    pub async fn next(&mut self) -> Option<Result<C::Item>> {
        if self.done {
            return None;
        }
        let count = match self.collection.live_count_async(&self.bridge).wait().await {
            Ok(count) => count,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        if self.position > count {
            self.done = true;
            return None;
        }
        let item = self
            .collection
            .fetch_async(&self.bridge, self.position)
            .wait()
            .await;
        self.position += 1;
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }

    /// Adapts the session into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<C::Item>>
    where
        C: Send + 'static,
        C::Item: Send + 'static,
    {
        futures::stream::unfold(self, |mut session| async move {
            session.next().await.map(|item| (item, session))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::handle::registry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Indexed collection over a shared growable vector of squares.
    #[derive(Clone)]
    struct Squares {
        count: Arc<AtomicUsize>,
        handle: crate::handle::Handle,
    }

    impl Squares {
        fn new(count: usize) -> Self {
            Self {
                count: Arc::new(AtomicUsize::new(count)),
                handle: registry().register(),
            }
        }
    }

    impl IndexedCollection for Squares {
        type Item = usize;

        fn live_count(&self) -> Result<usize> {
            Ok(self.count.load(Ordering::SeqCst))
        }

        fn fetch(&self, index: usize) -> Result<usize> {
            if index == 0 || index > self.count.load(Ordering::SeqCst) {
                return Err(BridgeError::Marshaling("index out of range".into()));
            }
            Ok(index * index)
        }

        fn live_count_async(&self, bridge: &Bridge) -> WorkHandle<usize> {
            let count = Arc::clone(&self.count);
            bridge.submit(&self.handle, move |_| Ok(count.load(Ordering::SeqCst)))
        }

        fn fetch_async(&self, bridge: &Bridge, index: usize) -> WorkHandle<usize> {
            bridge.submit(&self.handle, move |_| Ok(index * index))
        }
    }

    #[test]
    fn test_for_each_visits_in_order_with_one_based_index() {
        let collection = Squares::new(4);
        let mut seen = Vec::new();
        for_each_indexed(&collection, |item, index| {
            seen.push((item, index));
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(seen, vec![(1, 1), (4, 2), (9, 3), (16, 4)]);
    }

    #[test]
    fn test_for_each_early_stop_skips_rest() {
        let collection = Squares::new(10);
        let mut visited = 0;
        for_each_indexed(&collection, |_, index| {
            visited += 1;
            if index == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
        assert_eq!(visited, 3);
    }

    #[test]
    fn test_fresh_session_restarts_at_one() {
        let collection = Squares::new(3);
        let mut first = IndexedIter::new(collection.clone());
        first.next();
        first.next();
        let second: Vec<_> = IndexedIter::new(collection)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(second, vec![1, 4, 9]);
    }

    #[test]
    fn test_live_count_reread_sees_growth() {
        let collection = Squares::new(1);
        let mut session = IndexedIter::new(collection.clone());
        assert_eq!(session.next().unwrap().unwrap(), 1);
        collection.count.store(3, Ordering::SeqCst);
        assert_eq!(session.next().unwrap().unwrap(), 4);
        assert_eq!(session.next().unwrap().unwrap(), 9);
        assert!(session.next().is_none());
    }

    #[tokio::test]
    async fn test_async_session_matches_blocking() {
        let collection = Squares::new(5);
        let bridge = Bridge::new(crate::config::BridgeConfig::with_workers(2));
        let blocking: Vec<_> = IndexedIter::new(collection.clone())
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let mut session = AsyncIndexedIter::new(collection, bridge);
        let mut suspended = Vec::new();
        while let Some(item) = session.next().await {
            suspended.push(item.unwrap());
        }
        assert_eq!(blocking, suspended);
    }
}

//! Cursor-advance collection sessions: first/next over a single shared
//! position.

use crate::bridge::{Bridge, WorkHandle};
use crate::error::Result;
use futures::Stream;
use std::ops::ControlFlow;

/// A collection exposing only rewind-and-advance, no random access.
///
/// The position lives in the native collection, not the session: every
/// session on one collection instance shares it. `rewind` also rewinds it
/// for all other live sessions.
pub trait CursorCollection {
    type Item;

    /// Rewinds the shared cursor and returns the first element, or `None`
    /// when the collection is empty.
    fn rewind(&self) -> Result<Option<Self::Item>>;

    /// Advances the shared cursor, returning `None` once exhausted.
    fn advance(&self) -> Result<Option<Self::Item>>;

    /// Async form of [`rewind`](Self::rewind), routed through the bridge.
    fn rewind_async(&self, bridge: &Bridge) -> WorkHandle<Option<Self::Item>>;

    /// Async form of [`advance`](Self::advance), routed through the bridge.
    fn advance_async(&self, bridge: &Bridge) -> WorkHandle<Option<Self::Item>>;
}

/// Callback walk over a cursor-advance collection.
///
/// Rewinds, then visits elements in cursor order with a 0-based ordinal.
/// `ControlFlow::Break` stops the walk early.
pub fn for_each_cursor<C, F>(collection: &C, mut visitor: F) -> Result<()>
where
    C: CursorCollection,
    F: FnMut(C::Item, usize) -> ControlFlow<()>,
{
    let mut ordinal = 0;
    let mut current = collection.rewind()?;
    while let Some(item) = current {
        if visitor(item, ordinal).is_break() {
            return Ok(());
        }
        ordinal += 1;
        current = collection.advance()?;
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CursorState {
    BeforeFirst,
    OnElement,
    Exhausted,
}

/// Blocking pull session over a cursor-advance collection.
///
/// Not restartable: once exhausted it stays exhausted. Start a new session
/// to walk again; note that the new session's rewind moves the cursor
/// shared with any other live session.
pub struct CursorIter<C: CursorCollection> {
    collection: C,
    state: CursorState,
}

impl<C: CursorCollection> CursorIter<C> {
    pub fn new(collection: C) -> Self {
        Self {
            collection,
            state: CursorState::BeforeFirst,
        }
    }
}

impl<C: CursorCollection> Iterator for CursorIter<C> {
    type Item = Result<C::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let fetched = match self.state {
            CursorState::Exhausted => return None,
            CursorState::BeforeFirst => self.collection.rewind(),
            CursorState::OnElement => self.collection.advance(),
        };
        match fetched {
            Ok(Some(item)) => {
                self.state = CursorState::OnElement;
                Some(Ok(item))
            }
            Ok(None) => {
                self.state = CursorState::Exhausted;
                None
            }
            Err(err) => {
                self.state = CursorState::Exhausted;
                Some(Err(err))
            }
        }
    }
}

/// Async pull session over a cursor-advance collection. One fetch per
/// step, suspending while the bridge settles it.
pub struct AsyncCursorIter<C: CursorCollection> {
    collection: C,
    bridge: Bridge,
    state: CursorState,
}

impl<C: CursorCollection> AsyncCursorIter<C> {
    pub fn new(collection: C, bridge: Bridge) -> Self {
        Self {
            collection,
            bridge,
            state: CursorState::BeforeFirst,
        }
    }

    /// Fetches the next element, suspending until the bridge settles it.
    pub async fn next(&mut self) -> Option<Result<C::Item>> {
        let fetched = match self.state {
            CursorState::Exhausted => return None,
            CursorState::BeforeFirst => self.collection.rewind_async(&self.bridge).wait().await,
            CursorState::OnElement => self.collection.advance_async(&self.bridge).wait().await,
        };
        match fetched {
            Ok(Some(item)) => {
                self.state = CursorState::OnElement;
                Some(Ok(item))
            }
            Ok(None) => {
                self.state = CursorState::Exhausted;
                None
            }
            Err(err) => {
                self.state = CursorState::Exhausted;
                Some(Err(err))
            }
        }
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

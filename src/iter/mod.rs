//! Cursor iterators over the three paged collection shapes.
//!
//! The native collaborator exposes three distinct collection shapes, each
//! modeled as its own state machine, selected at construction time:
//!
//! - **Indexed** ([`IndexedCollection`]): addressable by a 1-based position
//!   up to a live, re-readable count. Raster bands. Restartable: a fresh
//!   session always begins at position 1.
//! - **Cursor-advance** ([`CursorCollection`]): first/next only, no random
//!   access, one shared position per collection instance. Layer features.
//!   Two live sessions on one layer interleave rather than iterate
//!   independently; this mirrors the native cursor and is documented
//!   behavior, not a defect.
//! - **Materialized-map**: the whole map is fetched in one call and then
//!   traversed locally; there is no persistent cursor and therefore no
//!   state machine here. Implemented directly on
//!   [`FeatureFields`](crate::vector::FeatureFields).
//!
//! Each shape offers a callback walk (`for_each`, early-stoppable via
//! [`ControlFlow::Break`]), a blocking pull iterator, and an async pull
//! form that suspends at each fetch by routing it through the
//! [`Bridge`](crate::bridge::Bridge), one fetch per step with no
//! read-ahead, so concurrent mutation visibility matches the blocking form
//! element-for-element.
//!
//! A fetch error terminates a sequence by yielding `Err` once, then the
//! iterator fuses; an error is never conflated with normal exhaustion.

mod cursor;
mod indexed;

pub use cursor::{for_each_cursor, AsyncCursorIter, CursorCollection, CursorIter};
pub use indexed::{for_each_indexed, AsyncIndexedIter, IndexedCollection, IndexedIter};

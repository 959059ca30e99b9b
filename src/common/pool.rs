//! A small recycling pool for boxed iteration cursors.
//!
//! Every container owns one pool. Starting an enumeration borrows a
//! cursor; dropping the iterator returns it, whether the walk finished or
//! broke early. The pool never holds more than [`MAX_POOLED_CURSORS`]
//! cursors, so leaked boxes cost one transient allocation each instead of
//! unbounded pool growth.

use smallvec::SmallVec;
use std::cell::RefCell;

pub(crate) const MAX_POOLED_CURSORS: usize = 8;

/// Walk state for a slot-array enumeration. Slots are visited in
/// decreasing index order; `tail_pending` marks the off-band sentinel
/// cell still to be emitted after slot 0.
#[derive(Default)]
pub(crate) struct Cursor {
    /// Number of slots not yet visited; the next slot examined is
    /// `next_slot - 1`.
    pub(crate) next_slot: usize,
    pub(crate) tail_pending: bool,
    /// Live elements not yet yielded, counting the pending tail.
    pub(crate) remaining: usize,
}

pub(crate) struct CursorPool {
    free: RefCell<SmallVec<[Box<Cursor>; MAX_POOLED_CURSORS]>>,
}

impl CursorPool {
    pub(crate) fn new() -> Self {
        Self {
            free: RefCell::new(SmallVec::new()),
        }
    }

    /// Takes a pooled cursor, or allocates one if the pool is empty, and
    /// initializes it for a fresh walk.
    pub(crate) fn borrow(&self, slots: usize, tail_pending: bool, remaining: usize) -> Box<Cursor> {
        let mut cursor = self
            .free
            .borrow_mut()
            .pop()
            .unwrap_or_else(Box::<Cursor>::default);
        cursor.next_slot = slots;
        cursor.tail_pending = tail_pending;
        cursor.remaining = remaining;
        cursor
    }

    /// Returns a cursor to the pool; drops it if the pool is full.
    pub(crate) fn recycle(&self, cursor: Box<Cursor>) {
        let mut free = self.free.borrow_mut();
        if free.len() < MAX_POOLED_CURSORS {
            free.push(cursor);
        }
    }

    pub(crate) fn free_count(&self) -> usize {
        self.free.borrow().len()
    }
}

//! Element identifier allocation.
//!
//! Every element gets its id from an explicit [`IdAllocator`]. Ids start at 1
//! and only ever grow; zero is never handed out, so a zero id on the wire is
//! always a client bug.
//!
//! Scope is chosen by whoever builds the page:
//!
//! ```text
//! PageBuilder::new()                  → private allocator, ids unique per template
//! PageBuilder::with_allocator(shared) → shared allocator, ids unique across templates
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::builder::BuildError;

/// Identifier of one element within a page.
pub type ElementId = u32;

/// Monotonic, lock-free element id source.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    /// First id handed out by a fresh allocator.
    pub const FIRST: ElementId = 1;

    /// Create an allocator starting at [`IdAllocator::FIRST`].
    pub fn new() -> Self {
        Self::starting_at(Self::FIRST)
    }

    /// Create an allocator whose first id is `first`.
    ///
    /// `first` of 0 is bumped to 1.
    pub fn starting_at(first: ElementId) -> Self {
        Self {
            next: AtomicU32::new(first.max(Self::FIRST)),
        }
    }

    /// Create an allocator meant to be shared by several builders.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Allocate the next id.
    ///
    /// Never wraps: once `u32::MAX` has been handed out every further call
    /// fails with [`BuildError::IdSpaceExhausted`].
    pub fn next(&self) -> Result<ElementId, BuildError> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                // 0 marks the exhausted state
                if current == 0 {
                    None
                } else {
                    Some(current.wrapping_add(1))
                }
            })
            .map_err(|_| BuildError::IdSpaceExhausted)
    }

    /// The id the next call to [`IdAllocator::next`] would return.
    pub fn peek(&self) -> Option<ElementId> {
        match self.next.load(Ordering::Relaxed) {
            0 => None,
            id => Some(id),
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

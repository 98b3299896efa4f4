//! This module contains the definition and implementation of [`Frame`] and [`FrameDirectory`],
//! which are the descriptors of the physical frames the memory manager is in charge of.
//!
//! A [`Frame`] holds the bookkeeping for one page-sized unit of physical memory: whether it is
//! free, which process and page occupy it, and the dirty, referenced and pin state that the
//! replacement algorithm consults.
//!
//! The [`FrameDirectory`] is the fixed array of every [`Frame`], indexed by [`FrameId`].

mod directory;

pub use directory::FrameDirectory;

use crate::{
    error::{MemoryError, Result},
    page::PageNumber,
    process::ProcessId,
};
use std::fmt::Display;

/// The index of a [`Frame`] in the [`FrameDirectory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId {
    /// Inner representation subject to change...
    inner: usize,
}

impl Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame {}", self.inner)
    }
}

impl FrameId {
    /// Creates a new `FrameId` from a `usize`.
    pub fn new(id: usize) -> Self {
        Self { inner: id }
    }

    /// Returns the `FrameId` as a `usize`.
    pub fn as_usize(self) -> usize {
        self.inner
    }
}

/// The descriptor of one physical frame.
///
/// A free frame has no owner, no resident page, and no pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Whether the frame is available for allocation.
    free: bool,

    /// The process whose page occupies this frame.
    owner: Option<ProcessId>,

    /// The logical page of [`Frame::owner`] held by this frame.
    resident_page: Option<PageNumber>,

    /// Whether the contents differ from the copy on the backing store.
    dirty: bool,

    /// The number of in-flight I/O operations that need this frame to stay put.
    pin_count: usize,

    /// The second-chance bit.
    referenced: bool,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            free: true,
            owner: None,
            resident_page: None,
            dirty: false,
            pin_count: 0,
            referenced: false,
        }
    }
}

impl Frame {
    /// Whether the frame is available for allocation.
    pub fn is_free(&self) -> bool {
        self.free
    }

    /// The process whose page occupies this frame, if any.
    pub fn owner(&self) -> Option<ProcessId> {
        self.owner
    }

    /// The page held by this frame, if any.
    pub fn resident_page(&self) -> Option<PageNumber> {
        self.resident_page
    }

    /// The owning process and page together, if the frame is occupied.
    pub fn occupant(&self) -> Option<(ProcessId, PageNumber)> {
        self.owner.zip(self.resident_page)
    }

    /// Whether the contents must be written back before the frame is reused.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The number of outstanding pins.
    pub fn pin_count(&self) -> usize {
        self.pin_count
    }

    /// Whether the frame is pinned and so must not be evicted.
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    /// Whether the frame has been referenced since the clock hand last passed it.
    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    /// Whether the replacement algorithm may take this frame right now.
    pub fn is_evictable(&self) -> bool {
        !self.referenced && self.pin_count == 0
    }

    /// Records a load or store to the frame.
    pub(crate) fn record_access(&mut self, store: bool) {
        self.referenced = true;
        if store {
            self.dirty = true;
        }
    }

    /// Marks the contents as modified.
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clears the second-chance bit.
    pub(crate) fn clear_referenced(&mut self) {
        self.referenced = false;
    }

    /// Sets the second-chance bit.
    pub(crate) fn set_referenced(&mut self) {
        self.referenced = true;
    }

    /// Adds a pin, returning the new pin count.
    pub(crate) fn pin(&mut self) -> usize {
        self.pin_count += 1;
        self.pin_count
    }

    /// Removes a pin, returning the new pin count.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UnpinWithoutPin`] if the frame is not pinned. The pin count is left
    /// at zero.
    pub(crate) fn unpin(&mut self, id: FrameId) -> Result<usize> {
        self.pin_count = self
            .pin_count
            .checked_sub(1)
            .ok_or(MemoryError::UnpinWithoutPin { frame: id })?;
        Ok(self.pin_count)
    }

    /// Hands the frame to `owner` for `page` while the page's data is read in.
    ///
    /// The frame is pinned once for the read. It holds no valid data yet, so it is clean and its
    /// second-chance bit is set for the incoming occupant.
    pub(crate) fn reserve(&mut self, owner: ProcessId, page: PageNumber) {
        self.free = false;
        self.owner = Some(owner);
        self.resident_page = Some(page);
        self.dirty = false;
        self.pin_count = 1;
        self.referenced = true;
    }

    /// Returns the frame to the free pool.
    pub(crate) fn release(&mut self) {
        *self = Self::default();
    }
}

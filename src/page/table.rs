//! The per-process page table.

use super::PageNumber;
use crate::{
    error::{MemoryError, Result},
    frame::FrameId,
    process::ProcessId,
};

/// One entry of a [`PageTable`].
///
/// An entry is resident exactly when the frame it names is owned by the table's process and holds
/// this entry's page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTableEntry {
    /// The frame holding the page, if the page is in memory.
    frame: Option<FrameId>,
}

impl PageTableEntry {
    /// Whether the page is currently in memory.
    pub fn is_resident(&self) -> bool {
        self.frame.is_some()
    }

    /// The frame backing the page, if it is resident.
    pub fn frame(&self) -> Option<FrameId> {
        self.frame
    }
}

/// A fixed-size mapping from a process's logical pages to physical frames.
#[derive(Debug, Clone)]
pub struct PageTable {
    /// The process this table belongs to.
    process: ProcessId,
    /// One entry per logical page.
    entries: Box<[PageTableEntry]>,
}

impl PageTable {
    /// Creates a table of `capacity` non-resident entries for `process`.
    pub fn new(process: ProcessId, capacity: usize) -> Self {
        Self {
            process,
            entries: vec![PageTableEntry::default(); capacity].into_boxed_slice(),
        }
    }

    /// The process that owns this table.
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// The number of entries, which is the number of pages the process may address.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Looks up the entry for `page`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidPage`] if `page` lies beyond the table.
    pub fn entry(&self, page: PageNumber) -> Result<PageTableEntry> {
        self.entries
            .get(page.as_usize())
            .copied()
            .ok_or(MemoryError::InvalidPage {
                process: self.process,
                page,
                capacity: self.capacity(),
            })
    }

    /// Marks `page` as resident in `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidPage`] if `page` lies beyond the table.
    pub(crate) fn map(&mut self, page: PageNumber, frame: FrameId) -> Result<()> {
        self.slot(page)?.frame = Some(frame);
        Ok(())
    }

    /// Marks `page` as no longer in memory.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidPage`] if `page` lies beyond the table.
    pub(crate) fn unmap(&mut self, page: PageNumber) -> Result<()> {
        self.slot(page)?.frame = None;
        Ok(())
    }

    /// Marks every page as no longer in memory.
    pub(crate) fn unmap_all(&mut self) {
        self.entries
            .iter_mut()
            .for_each(|entry| entry.frame = None);
    }

    /// Iterates over the resident pages and the frames that hold them.
    pub fn resident(&self) -> impl Iterator<Item = (PageNumber, FrameId)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(page, entry)| entry.frame.map(|frame| (PageNumber::new(page), frame)))
    }

    /// A helper function that retrieves a mutable entry or reports the out-of-range page.
    fn slot(&mut self, page: PageNumber) -> Result<&mut PageTableEntry> {
        let process = self.process;
        let capacity = self.capacity();
        self.entries
            .get_mut(page.as_usize())
            .ok_or(MemoryError::InvalidPage {
                process,
                page,
                capacity,
            })
    }
}

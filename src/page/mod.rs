//! Definitions and types related to logical pages and the per-process tables that map them.

mod table;

pub use table::{PageTable, PageTableEntry};

use std::fmt::Display;

/// The index of a logical page within one process's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageNumber {
    /// Inner representation subject to change...
    inner: usize,
}

impl Display for PageNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Page {}", self.inner)
    }
}

impl PageNumber {
    /// Creates a new `PageNumber` from a `usize`.
    pub fn new(page: usize) -> Self {
        Self { inner: page }
    }

    /// Returns the `PageNumber` as a `usize`, suitable for indexing a [`PageTable`].
    pub fn as_usize(self) -> usize {
        self.inner
    }

    /// Returns the page that contains the given logical address.
    pub fn containing(logical_address: usize, page_size: usize) -> Self {
        Self::new(logical_address / page_size)
    }
}

impl From<usize> for PageNumber {
    fn from(value: usize) -> Self {
        Self::new(value)
    }
}

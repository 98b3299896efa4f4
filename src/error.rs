//! Errors surfaced by the memory manager.

use crate::{frame::FrameId, page::PageNumber, process::ProcessId};
use std::collections::TryReserveError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, MemoryError>;

/// Failures of the memory manager.
///
/// A missing page is not an error: it is reported as [`Access::Faulted`](crate::mmu::Access) and
/// handled by fetching the page. Everything here is either a protection fault the kernel must act
/// on, or a defect in a collaborator.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The configuration cannot describe a usable memory.
    #[error("invalid memory configuration: {0}")]
    InvalidConfig(&'static str),

    /// Storage for the frame directory could not be obtained at startup.
    #[error("unable to allocate the frame directory")]
    DirectoryAllocation(#[from] TryReserveError),

    /// A logical address or page number lies past the end of the process's page table.
    #[error("{process} referenced {page}, beyond its page table of {capacity} entries")]
    InvalidPage {
        /// The offending process.
        process: ProcessId,
        /// The out-of-range page.
        page: PageNumber,
        /// The number of entries in the page table.
        capacity: usize,
    },

    /// The process has no page table attached.
    #[error("{0} has no page table")]
    UnknownProcess(ProcessId),

    /// A memory reference arrived while no page table was loaded.
    #[error("no page table is loaded in the page-table base register")]
    NoActiveProcess,

    /// A page expected to be in memory is not.
    #[error("{page} of {process} is not resident")]
    NotResident {
        /// The owning process.
        process: ProcessId,
        /// The non-resident page.
        page: PageNumber,
    },

    /// An unpin arrived for a frame with no outstanding pin.
    #[error("unpin of {frame} without a matching pin")]
    UnpinWithoutPin {
        /// The frame whose pin count is already zero.
        frame: FrameId,
    },

    /// Every replacement candidate is pinned, so no frame can be evicted.
    #[error("no evictable frame: all {candidates} allocated frames are pinned")]
    NoEvictableFrame {
        /// The number of frames that were scanned.
        candidates: usize,
    },

    /// A process was terminated while one of its frames was still pinned for I/O.
    #[error("{process} still holds pinned {frame}")]
    PinnedOnTermination {
        /// The terminating process.
        process: ProcessId,
        /// The first pinned frame found.
        frame: FrameId,
    },

    /// A fault for this page is already in flight.
    #[error("a fault for {page} of {process} is already in flight")]
    FaultInProgress {
        /// The faulting process.
        process: ProcessId,
        /// The page being fetched.
        page: PageNumber,
    },

    /// A fault was begun for a page that is already in memory.
    #[error("{page} of {process} is already resident")]
    AlreadyResident {
        /// The owning process.
        process: ProcessId,
        /// The resident page.
        page: PageNumber,
    },

    /// A completion arrived for a fault that is not pending.
    #[error("no pending fault for {page} of {process}")]
    UnknownFault {
        /// The process named by the token.
        process: ProcessId,
        /// The page named by the token.
        page: PageNumber,
    },

    /// An internal invariant does not hold.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

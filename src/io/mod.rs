//! The I/O request record and the kinds of memory traffic the manager observes.
//!
//! I/O requests are created and queued by the device driver. The memory manager only reads the
//! [`page`](IoRequest::page), [`action`](IoRequest::action) and [`process`](IoRequest::process)
//! fields so that it can pin the buffer page for the duration of the transfer.

use crate::{page::PageNumber, process::ProcessId};

/// The direction of a device transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoAction {
    /// Data moves from the device into memory.
    Read,
    /// Data moves from memory out to the device.
    Write,
}

/// The kind of a single memory reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefAction {
    /// The process reads from the address.
    Load,
    /// The process writes to the address.
    Store,
}

impl RefAction {
    /// Whether this reference modifies memory.
    pub fn is_store(self) -> bool {
        matches!(self, Self::Store)
    }
}

/// An I/O request block, owned by the device driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoRequest {
    /// The unique ID of this request.
    pub id: u64,
    /// The device servicing the request.
    pub device: usize,
    /// The direction of the transfer.
    pub action: IoAction,
    /// The block on the device involved in the transfer.
    pub block: u64,
    /// The buffer page in the issuing process's address space.
    pub page: PageNumber,
    /// The process that issued the request.
    pub process: ProcessId,
}

impl IoRequest {
    /// Creates a request with the given ID, transferring `page` of `process` in direction
    /// `action`. The device and block default to zero.
    pub fn new(id: u64, process: ProcessId, page: PageNumber, action: IoAction) -> Self {
        Self {
            id,
            device: 0,
            action,
            block: 0,
            page,
            process,
        }
    }

    /// Sets the device and block the request targets.
    pub fn on_device(mut self, device: usize, block: u64) -> Self {
        self.device = device;
        self.block = block;
        self
    }
}

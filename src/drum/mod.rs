//! The contract with the backing-store (drum) driver.
//!
//! The memory manager never moves page data itself. It hands a [`TransferRequest`] to a
//! [`BackingStore`], and the driver later reports completion through the interrupt dispatcher.
//! [`ChannelDrum`] is a [`BackingStore`] that forwards every request onto an `async_channel`, so
//! that a device task, synchronous or asynchronous, can service them.

use crate::{frame::FrameId, io::IoAction, page::PageNumber, process::ProcessId};
use async_channel::{Receiver, Sender};
use std::fmt::Display;

/// A request to move one page between the drum and a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferRequest {
    /// [`IoAction::Read`] fetches the page into the frame, [`IoAction::Write`] flushes it out.
    pub action: IoAction,
    /// The process whose page is transferred.
    pub process: ProcessId,
    /// The logical page transferred.
    pub page: PageNumber,
    /// The frame read into or written from.
    pub frame: FrameId,
}

impl Display for TransferRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let direction = match self.action {
            IoAction::Read => "into",
            IoAction::Write => "from",
        };
        write!(
            f,
            "{:?} {} of {} {} {}",
            self.action, self.page, self.process, direction, self.frame
        )
    }
}

/// The backing-store driver.
pub trait BackingStore {
    /// Starts a transfer. Completion is signaled through the interrupt dispatcher, not returned.
    fn issue_transfer(&mut self, request: TransferRequest);
}

/// A [`BackingStore`] that queues requests on an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelDrum {
    /// The producing side, used by the memory manager.
    tx: Sender<TransferRequest>,
}

impl ChannelDrum {
    /// Creates a drum and the receiving end the device task should service.
    pub fn new() -> (Self, Receiver<TransferRequest>) {
        let (tx, rx) = async_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl BackingStore for ChannelDrum {
    /// # Panics
    ///
    /// Panics if the device side of the channel has been dropped, since the simulation cannot make
    /// progress without its drum.
    fn issue_transfer(&mut self, request: TransferRequest) {
        self.tx
            .try_send(request)
            .expect("The drum device was shut down while memory was still in use");
    }
}


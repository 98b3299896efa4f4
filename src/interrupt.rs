//! The contract with the interrupt/trap dispatcher and the simulation clock.
//!
//! When an access finds its page missing, the memory manager raises an [`Interrupt`] with cause
//! [`InterruptCause::PageFault`] and returns. The dispatcher decides when the faulting process is
//! resumed, and drives the fault to completion through
//! [`MemoryManager::complete_fault`](crate::mmu::MemoryManager::complete_fault).

use crate::{io::IoRequest, page::PageNumber, process::ProcessId};
use async_channel::{Receiver, Sender};

/// The kinds of interrupts the simulated machine delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptCause {
    /// A process requested I/O.
    IoService,
    /// A device finished a transfer.
    DeviceInterrupt,
    /// A process referenced a page that is not in memory.
    PageFault,
    /// A process is being started.
    StartService,
    /// A process terminated itself.
    TerminateService,
    /// A process was killed.
    KillService,
    /// A process waits on an event.
    WaitService,
    /// A process signals an event.
    SignalService,
    /// The timer expired.
    TimerInterrupt,
}

/// The interrupt vector handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interrupt {
    /// Why the interrupt was raised.
    pub cause: InterruptCause,
    /// The process involved, such as the one that faulted.
    pub process: Option<ProcessId>,
    /// The page that caused a page fault.
    pub page: Option<PageNumber>,
    /// The device that raised a device interrupt.
    pub device: Option<usize>,
    /// The request involved in an I/O service call.
    pub request: Option<IoRequest>,
}

impl Interrupt {
    /// Creates the interrupt raised when `process` touches the non-resident `page`.
    pub fn page_fault(process: ProcessId, page: PageNumber) -> Self {
        Self {
            cause: InterruptCause::PageFault,
            process: Some(process),
            page: Some(page),
            device: None,
            request: None,
        }
    }
}

/// The interrupt/trap dispatcher.
pub trait InterruptDispatcher {
    /// Hands control to the dispatcher with the given interrupt vector.
    fn notify(&mut self, interrupt: Interrupt);
}

/// An [`InterruptDispatcher`] that queues interrupts on an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    /// The producing side, used by the memory manager.
    tx: Sender<Interrupt>,
}

impl ChannelDispatcher {
    /// Creates a dispatcher and the receiving end the kernel's trap handler should drain.
    pub fn new() -> (Self, Receiver<Interrupt>) {
        let (tx, rx) = async_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl InterruptDispatcher for ChannelDispatcher {
    /// # Panics
    ///
    /// Panics if the trap handler side of the channel has been dropped.
    fn notify(&mut self, interrupt: Interrupt) {
        self.tx
            .try_send(interrupt)
            .expect("The interrupt dispatcher was shut down while memory was still in use");
    }
}

/// The simulation clock.
///
/// The memory manager does not read the clock itself. Callers use it to charge the cost of the
/// transfers a fault issues, see [`PAGE_TRANSFER_COST`](crate::config::PAGE_TRANSFER_COST).
pub trait SimClock {
    /// The current logical time. Never decreases.
    fn current_time(&self) -> u64;
}

//! Shared setup for the integration tests.

#![allow(dead_code)]

use async_channel::Receiver;
use clock_vmm::{
    drum::{ChannelDrum, TransferRequest},
    interrupt::{ChannelDispatcher, Interrupt},
    MemoryConfig, MemoryManager,
};
use tracing::Level;

/// A memory manager wired to channel collaborators, and the receiving ends of those channels.
pub struct Harness {
    pub mm: MemoryManager,
    pub transfers: Receiver<TransferRequest>,
    pub interrupts: Receiver<Interrupt>,
}

impl Harness {
    /// Drains every transfer the manager has issued so far.
    pub fn drain_transfers(&self) -> Vec<TransferRequest> {
        std::iter::from_fn(|| self.transfers.try_recv().ok()).collect()
    }

    /// Drains every interrupt the manager has raised so far.
    pub fn drain_interrupts(&self) -> Vec<Interrupt> {
        std::iter::from_fn(|| self.interrupts.try_recv().ok()).collect()
    }
}

/// Installs a compact subscriber that writes through the test harness.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .without_time()
        .with_max_level(Level::TRACE)
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn harness(config: MemoryConfig) -> Harness {
    init_tracing();

    let (drum, transfers) = ChannelDrum::new();
    let (dispatcher, interrupts) = ChannelDispatcher::new();
    let mm = MemoryManager::new(config, drum, dispatcher).unwrap();

    Harness {
        mm,
        transfers,
        interrupts,
    }
}

/// Two frames of 512 bytes, with the default 16 pages per process.
pub fn tiny() -> MemoryConfig {
    MemoryConfig {
        frames: 2,
        max_pages: 16,
        page_size: 512,
    }
}

//! A demand-paging virtual memory manager for a simulated operating system kernel.
//!
//! Logical pages of many processes are mapped onto a small, fixed pool of physical frames. Missing
//! pages are fetched from a backing store (the drum), frames involved in in-flight I/O are pinned,
//! and frames are reclaimed with a second-chance (clock) replacement policy.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::missing_panics_doc)]
#![warn(clippy::missing_safety_doc)]

pub mod config;
pub mod drum;
pub mod error;
pub mod frame;
pub mod interrupt;
pub mod io;
pub mod mmu;
pub mod page;
pub mod process;
pub mod replacer;

pub use config::MemoryConfig;
pub use error::{MemoryError, Result};
pub use mmu::{Access, MemoryManager, MemoryStats, PendingFault};

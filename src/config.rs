//! Sizing of the simulated memory.

use crate::error::{MemoryError, Result};

/// The default number of physical frames.
pub const DEFAULT_FRAMES: usize = 32;

/// The default number of entries in a page table, which bounds a process's logical space.
pub const DEFAULT_MAX_PAGES: usize = 16;

/// The default size of a frame / logical page in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 512;

/// The simulated time charged for moving one page between the drum and memory.
pub const PAGE_TRANSFER_COST: u64 = 6;

/// The sizes of the frame directory and of every page table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    /// The number of physical frames.
    pub frames: usize,
    /// The number of entries in each process's page table.
    pub max_pages: usize,
    /// The size of a page in bytes. Must be a power of two.
    pub page_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            frames: DEFAULT_FRAMES,
            max_pages: DEFAULT_MAX_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MemoryConfig {
    /// Creates a configuration with the given number of frames and the default table and page
    /// sizes.
    pub fn with_frames(frames: usize) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    /// Checks that every size is usable.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if there are no frames, no pages per table, or if
    /// the page size is not a non-zero power of two.
    pub fn validate(&self) -> Result<()> {
        if self.frames == 0 {
            return Err(MemoryError::InvalidConfig("at least one frame is required"));
        }
        if self.max_pages == 0 {
            return Err(MemoryError::InvalidConfig(
                "page tables need at least one entry",
            ));
        }
        if !self.page_size.is_power_of_two() {
            return Err(MemoryError::InvalidConfig(
                "page size must be a non-zero power of two",
            ));
        }
        Ok(())
    }

    /// The number of addressable bytes in one process's logical space.
    pub fn logical_space(&self) -> usize {
        self.max_pages * self.page_size
    }
}

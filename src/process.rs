//! Identifiers for processes, which are owned by the process-management collaborator.

use std::fmt::Display;

/// A unique identifier for a simulated process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId {
    /// Inner representation subject to change...
    inner: u32,
}

impl Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Process {}", self.inner)
    }
}

impl ProcessId {
    /// Creates a new `ProcessId` from a `u32`.
    pub fn new(id: u32) -> Self {
        Self { inner: id }
    }

    /// Returns the `ProcessId` as a `u32`.
    pub fn as_u32(self) -> u32 {
        self.inner
    }
}

impl From<u32> for ProcessId {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

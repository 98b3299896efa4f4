//! The fixed table of frame descriptors.

use super::{Frame, FrameId};
use crate::error::Result;
use std::ops::{Index, IndexMut};

/// Every physical frame in the system, indexed by [`FrameId`].
#[derive(Debug, Clone)]
pub struct FrameDirectory {
    /// The descriptors. The length never changes after construction.
    frames: Vec<Frame>,
}

impl FrameDirectory {
    /// Creates a directory of `capacity` free, unreferenced frames.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DirectoryAllocation`](crate::error::MemoryError) if the storage for
    /// the descriptors cannot be obtained.
    pub fn new(capacity: usize) -> Result<Self> {
        let mut frames = Vec::new();
        frames.try_reserve_exact(capacity)?;
        frames.resize_with(capacity, Frame::default);

        Ok(Self { frames })
    }

    /// Returns every frame to the free, unreferenced state.
    pub fn reset(&mut self) {
        self.frames.iter_mut().for_each(Frame::release);
    }

    /// The number of frames.
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Finds the lowest-numbered frame that is free and unpinned.
    ///
    /// Returns `None` when every frame is in use, in which case a victim must be chosen by the
    /// replacement algorithm.
    pub fn allocate_free_frame(&self) -> Option<FrameId> {
        self.frames
            .iter()
            .position(|frame| frame.is_free() && !frame.is_pinned())
            .map(FrameId::new)
    }

    /// Looks up a frame, if `id` is in range.
    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.as_usize())
    }

    /// Iterates over every frame and its id.
    pub fn iter(&self) -> impl Iterator<Item = (FrameId, &Frame)> + '_ {
        self.frames
            .iter()
            .enumerate()
            .map(|(id, frame)| (FrameId::new(id), frame))
    }

    /// The number of frames that are free.
    pub fn free_count(&self) -> usize {
        self.frames.iter().filter(|frame| frame.is_free()).count()
    }
}

impl Index<FrameId> for FrameDirectory {
    type Output = Frame;

    fn index(&self, id: FrameId) -> &Self::Output {
        &self.frames[id.as_usize()]
    }
}

impl IndexMut<FrameId> for FrameDirectory {
    fn index_mut(&mut self, id: FrameId) -> &mut Self::Output {
        &mut self.frames[id.as_usize()]
    }
}

//! Frame replacement.
//!
//! A [`Replacer`] orders the allocated frames for reconsideration and picks the next one to evict.
//! The only policy provided is [`ClockQueue`], the second-chance algorithm.

use crate::{
    error::Result,
    frame::{FrameDirectory, FrameId},
};

mod clock;

pub use clock::ClockQueue;

/// An ordered collection of eviction candidates.
pub trait Replacer {
    /// Creates an empty replacer able to track `num_frames` frames.
    fn new(num_frames: usize) -> Self
    where
        Self: Sized;

    /// Adds a frame at the back of the scan order. Returns `false` if it was already present.
    fn insert(&mut self, id: FrameId) -> bool;

    /// Removes the frame at the front of the scan order.
    fn remove_head(&mut self) -> Option<FrameId>;

    /// The number of frames being tracked.
    fn len(&self) -> usize;

    /// Whether no frames are being tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every frame.
    fn clear(&mut self);

    /// The frames in scan order, front first.
    fn order(&self) -> Vec<FrameId>;

    /// Finds a frame to evict and removes it from the replacer.
    ///
    /// The frame returned is never pinned. Its second-chance bit is set in preparation for the
    /// page that will replace it.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NoEvictableFrame`] if every tracked frame is pinned, or if there
    /// are no tracked frames at all.
    fn select_victim(&mut self, frames: &mut FrameDirectory) -> Result<FrameId>;

    /// Removes every tracked frame for which `reclaim` returns `true`, keeping the relative order
    /// of the rest.
    ///
    /// Each frame is considered exactly once, in scan order.
    fn extract_where<F>(&mut self, mut reclaim: F) -> Vec<FrameId>
    where
        F: FnMut(FrameId) -> bool,
        Self: Sized,
    {
        let mut extracted = Vec::new();

        for _ in 0..self.len() {
            let Some(id) = self.remove_head() else {
                break;
            };

            if reclaim(id) {
                extracted.push(id);
            } else {
                self.insert(id);
            }
        }

        extracted
    }
}

//! The second-chance (clock) replacement queue.

use super::Replacer;
use crate::{
    error::{MemoryError, Result},
    frame::{FrameDirectory, FrameId},
};
use tracing::trace;

/// The neighbours of a queued frame in the ring.
#[derive(Debug, Clone, Copy)]
struct Link {
    /// The frame before this one. The head's predecessor is the tail.
    prev: FrameId,
    /// The frame after this one. The tail's successor is the head.
    next: FrameId,
}

/// A circular FIFO of frame ids, threaded through an arena indexed by [`FrameId`].
///
/// Since a frame can be queued at most once, the arena has one slot per frame and a slot holds a
/// [`Link`] exactly when that frame is queued. Both insertion at the tail and removal at the head
/// are O(1).
#[derive(Debug, Clone)]
pub struct ClockQueue {
    /// One slot per frame in the directory.
    links: Vec<Option<Link>>,
    /// The oldest queued frame, which the clock hand points at.
    head: Option<FrameId>,
    /// The number of queued frames.
    len: usize,
}

impl ClockQueue {
    /// Whether `id` is currently queued.
    pub fn contains(&self, id: FrameId) -> bool {
        matches!(self.links.get(id.as_usize()), Some(Some(_)))
    }

    /// The queued frame that was inserted last.
    fn tail(&self) -> Option<FrameId> {
        let head = self.head?;
        self.links[head.as_usize()].map(|link| link.prev)
    }

    /// A helper for rewriting one side of a queued frame's link.
    fn link_mut(&mut self, id: FrameId) -> &mut Link {
        self.links[id.as_usize()]
            .as_mut()
            .unwrap_or_else(|| unreachable!("{id} is threaded through the ring but has no link"))
    }
}

impl Replacer for ClockQueue {
    fn new(num_frames: usize) -> Self {
        Self {
            links: vec![None; num_frames],
            head: None,
            len: 0,
        }
    }

    fn insert(&mut self, id: FrameId) -> bool {
        if id.as_usize() >= self.links.len() || self.contains(id) {
            return false;
        }

        match (self.head, self.tail()) {
            (Some(head), Some(tail)) => {
                self.links[id.as_usize()] = Some(Link {
                    prev: tail,
                    next: head,
                });
                self.link_mut(tail).next = id;
                self.link_mut(head).prev = id;
            }
            _ => {
                self.links[id.as_usize()] = Some(Link { prev: id, next: id });
                self.head = Some(id);
            }
        }

        self.len += 1;
        true
    }

    fn remove_head(&mut self) -> Option<FrameId> {
        let head = self.head?;
        let link = self.links[head.as_usize()].take()?;

        if link.next == head {
            self.head = None;
        } else {
            self.link_mut(link.prev).next = link.next;
            self.link_mut(link.next).prev = link.prev;
            self.head = Some(link.next);
        }

        self.len -= 1;
        Some(head)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.links.iter_mut().for_each(|link| *link = None);
        self.head = None;
        self.len = 0;
    }

    fn order(&self) -> Vec<FrameId> {
        let mut order = Vec::with_capacity(self.len);
        let mut cursor = self.head;

        while let Some(id) = cursor {
            if order.len() == self.len {
                break;
            }
            order.push(id);
            cursor = self.links[id.as_usize()].map(|link| link.next);
        }

        order
    }

    /// Runs the second-chance scan.
    ///
    /// Frames at the head that are referenced or pinned lose their second-chance bit and move to
    /// the tail. The first frame that is neither is the victim. Two full rotations are enough: the
    /// first clears every bit, so the second finds any unpinned frame. If it does not, the queue
    /// is back in its original order and the scan fails instead of spinning.
    fn select_victim(&mut self, frames: &mut FrameDirectory) -> Result<FrameId> {
        let candidates = self.len;

        for _ in 0..2 * candidates {
            let Some(id) = self.remove_head() else {
                break;
            };

            let frame = &mut frames[id];
            if frame.is_evictable() {
                frame.set_referenced();
                trace!("{id} chosen as victim");
                return Ok(id);
            }

            frame.clear_referenced();
            self.insert(id);
        }

        Err(MemoryError::NoEvictableFrame { candidates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{page::PageNumber, process::ProcessId};

    fn ids(raw: &[usize]) -> Vec<FrameId> {
        raw.iter().copied().map(FrameId::new).collect()
    }

    fn occupied(num_frames: usize) -> (FrameDirectory, ClockQueue) {
        let mut frames = FrameDirectory::new(num_frames).unwrap();
        let mut queue = ClockQueue::new(num_frames);
        for i in 0..num_frames {
            let id = FrameId::new(i);
            frames[id].reserve(ProcessId::new(1), PageNumber::new(i));
            frames[id].unpin(id).unwrap();
            assert!(queue.insert(id));
        }
        (frames, queue)
    }

    #[test]
    fn test_ring_boundaries() {
        let mut queue = ClockQueue::new(4);
        assert!(queue.is_empty());
        assert_eq!(queue.remove_head(), None);

        assert!(queue.insert(FrameId::new(2)));
        assert_eq!(queue.order(), ids(&[2]));
        assert_eq!(queue.remove_head(), Some(FrameId::new(2)));
        assert!(queue.is_empty());
        assert_eq!(queue.order(), ids(&[]));

        for i in [3, 0, 1] {
            assert!(queue.insert(FrameId::new(i)));
        }
        assert_eq!(queue.order(), ids(&[3, 0, 1]));
        assert_eq!(queue.tail(), Some(FrameId::new(1)));

        assert_eq!(queue.remove_head(), Some(FrameId::new(3)));
        assert!(queue.insert(FrameId::new(3)));
        assert_eq!(queue.order(), ids(&[0, 1, 3]));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_duplicate_and_out_of_range_inserts() {
        let mut queue = ClockQueue::new(2);
        assert!(queue.insert(FrameId::new(0)));
        assert!(!queue.insert(FrameId::new(0)));
        assert!(!queue.insert(FrameId::new(2)));
        assert_eq!(queue.len(), 1);

        queue.clear();
        assert!(queue.is_empty());
        assert!(!queue.contains(FrameId::new(0)));
    }

    #[test]
    fn test_second_chance_order() {
        let (mut frames, mut queue) = occupied(3);

        // Everything is referenced, so the first pass clears all three bits and the head goes.
        let victim = queue.select_victim(&mut frames).unwrap();
        assert_eq!(victim, FrameId::new(0));
        assert!(frames[victim].is_referenced());
        assert_eq!(queue.order(), ids(&[1, 2]));
        assert!(!frames[FrameId::new(1)].is_referenced());
        assert!(!frames[FrameId::new(2)].is_referenced());

        // A referenced frame is passed over once.
        frames[FrameId::new(1)].record_access(false);
        let victim = queue.select_victim(&mut frames).unwrap();
        assert_eq!(victim, FrameId::new(2));
        assert_eq!(queue.order(), ids(&[1]));
        assert!(!frames[FrameId::new(1)].is_referenced());
    }

    #[test]
    fn test_pinned_frames_are_skipped() {
        let (mut frames, mut queue) = occupied(3);
        frames[FrameId::new(0)].pin();
        frames[FrameId::new(1)].pin();

        let victim = queue.select_victim(&mut frames).unwrap();
        assert_eq!(victim, FrameId::new(2));
        assert_eq!(queue.order(), ids(&[0, 1]));
        assert_eq!(frames[FrameId::new(0)].pin_count(), 1);
    }

    #[test]
    fn test_all_pinned_fails_and_keeps_order() {
        let (mut frames, mut queue) = occupied(3);
        for i in 0..3 {
            frames[FrameId::new(i)].pin();
        }

        let err = queue.select_victim(&mut frames).unwrap_err();
        assert!(matches!(err, MemoryError::NoEvictableFrame { candidates: 3 }));
        assert_eq!(queue.order(), ids(&[0, 1, 2]));

        let mut empty = ClockQueue::new(3);
        assert!(matches!(
            empty.select_victim(&mut frames),
            Err(MemoryError::NoEvictableFrame { candidates: 0 })
        ));
    }

    #[test]
    fn test_extract_where_keeps_relative_order() {
        let mut queue = ClockQueue::new(6);
        for i in [4, 1, 5, 0, 3] {
            queue.insert(FrameId::new(i));
        }

        let extracted = queue.extract_where(|id| id.as_usize() % 2 == 1);
        assert_eq!(extracted, ids(&[1, 5, 3]));
        assert_eq!(queue.order(), ids(&[4, 0]));
    }
}

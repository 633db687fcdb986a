//! Bounded FIFO for frames awaiting an open connection.
//!
//! While the connection is `Connecting` (or the writer is saturated), frames
//! land here instead of failing.  When the queue is full the **oldest**
//! frame is dropped, so sustained disconnection costs the head of the
//! recording, never unbounded memory.

use std::collections::VecDeque;

use crate::audio::AudioFrame;

// ---------------------------------------------------------------------------
// FrameQueue
// ---------------------------------------------------------------------------

/// Fixed-capacity frame FIFO with oldest-drop overflow.
pub struct FrameQueue {
    frames: VecDeque<AudioFrame>,
    capacity: usize,
    /// Total frames dropped since creation (for diagnostics).
    dropped: u64,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "FrameQueue capacity must be > 0");
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append a frame, evicting the oldest when full.
    pub fn push(&mut self, frame: AudioFrame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
            self.dropped += 1;
            if self.dropped % 64 == 1 {
                log::debug!("frame queue full; {} frame(s) dropped so far", self.dropped);
            }
        }
        self.frames.push_back(frame);
    }

    /// Remove and return all pending frames in arrival order.
    pub fn drain(&mut self) -> Vec<AudioFrame> {
        self.frames.drain(..).collect()
    }

    /// Discard all pending frames.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Number of frames currently pending.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` when no frames are pending.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Maximum number of pending frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total frames evicted by overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::FrameEncoder;

    /// A frame whose first sample encodes `tag` (recoverable for ordering
    /// assertions).
    fn tagged_frame(tag: i16) -> AudioFrame {
        let mut enc = FrameEncoder::new();
        let mut block = vec![0.0_f32; 512];
        block[0] = tag as f32 / 32_767.0;
        enc.push(&block).remove(0)
    }

    fn tag_of(frame: &AudioFrame) -> i16 {
        frame.samples()[0]
    }

    // ---- Basic push / drain ------------------------------------------------

    #[test]
    fn drains_in_arrival_order() {
        let mut q = FrameQueue::new(8);
        for tag in 1..=3 {
            q.push(tagged_frame(tag));
        }
        assert_eq!(q.len(), 3);

        let tags: Vec<i16> = q.drain().iter().map(tag_of).collect();
        assert_eq!(tags, vec![1, 2, 3]);
        assert!(q.is_empty());
    }

    #[test]
    fn drain_empty_returns_empty() {
        let mut q = FrameQueue::new(4);
        assert!(q.drain().is_empty());
    }

    // ---- Overflow ----------------------------------------------------------

    #[test]
    fn overflow_evicts_oldest_first() {
        let mut q = FrameQueue::new(3);
        for tag in 1..=5 {
            q.push(tagged_frame(tag));
        }

        assert_eq!(q.len(), 3);
        assert_eq!(q.dropped(), 2);
        let tags: Vec<i16> = q.drain().iter().map(tag_of).collect();
        assert_eq!(tags, vec![3, 4, 5]);
    }

    #[test]
    fn capacity_never_exceeded() {
        let mut q = FrameQueue::new(4);
        for tag in 0..100 {
            q.push(tagged_frame(tag % 128));
            assert!(q.len() <= 4);
        }
        assert_eq!(q.dropped(), 96);
    }

    // ---- Clear / reuse -----------------------------------------------------

    #[test]
    fn clear_discards_everything() {
        let mut q = FrameQueue::new(4);
        q.push(tagged_frame(7));
        q.clear();
        assert!(q.is_empty());

        // Usable again after clear.
        q.push(tagged_frame(9));
        assert_eq!(q.len(), 1);
        assert_eq!(tag_of(&q.drain()[0]), 9);
    }

    #[test]
    fn capacity_reported() {
        let q = FrameQueue::new(64);
        assert_eq!(q.capacity(), 64);
    }

    // ---- Panic guard -------------------------------------------------------

    #[test]
    #[should_panic(expected = "FrameQueue capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ = FrameQueue::new(0);
    }
}

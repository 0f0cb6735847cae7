//! Rolling history of recent radar frames.
//!
//! ## Invariants
//!
//! - All cached frames share a compatible geometry. A frame whose geometry
//!   is incompatible with the newest cached frame clears the history first.
//! - No two cached frames share a generation timestamp. A frame with the
//!   same timestamp as the newest cached frame is dropped.
//! - At most `capacity` frames are held; the oldest is evicted first.

use std::collections::VecDeque;

use wx_common::Frame;

/// Default number of frames kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 4;

/// Order in which [`HistoryCache::snapshot`] presents frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOrder {
    NewestFirst,
    OldestFirst,
}

/// Result of [`HistoryCache::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Frame added alongside the existing history
    Inserted { evicted: bool },
    /// Geometry changed: history cleared, then the frame was added
    Reset { discarded: usize },
    /// Same generation time as the newest frame; cache unchanged
    Duplicate,
}

impl PushOutcome {
    /// Whether the cache content changed and a new document should be sent.
    pub fn is_stored(&self) -> bool {
        !matches!(self, PushOutcome::Duplicate)
    }
}

/// Fixed-capacity frame history.
#[derive(Debug)]
pub struct HistoryCache {
    /// Oldest at the front, newest at the back
    frames: VecDeque<Frame>,
    capacity: usize,
    order: HistoryOrder,
}

impl HistoryCache {
    /// Create an empty history. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize, order: HistoryOrder) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity + 1),
            capacity,
            order,
        }
    }

    pub fn push(&mut self, frame: Frame) -> PushOutcome {
        let mut discarded = None;

        if let Some(newest) = self.frames.back() {
            if !newest.geometry.is_compatible_with(&frame.geometry) {
                discarded = Some(self.frames.len());
                self.frames.clear();
            } else if newest.generated_at_ms == frame.generated_at_ms {
                return PushOutcome::Duplicate;
            }
        }

        self.frames.push_back(frame);
        let mut evicted = false;
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
            evicted = true;
        }

        match discarded {
            Some(discarded) => PushOutcome::Reset { discarded },
            None => PushOutcome::Inserted { evicted },
        }
    }

    /// Ordered view of the cached frames for encoding.
    pub fn snapshot(&self) -> HistorySnapshot<'_> {
        let frames = match self.order {
            HistoryOrder::OldestFirst => self.frames.iter().collect(),
            HistoryOrder::NewestFirst => self.frames.iter().rev().collect(),
        };
        HistorySnapshot {
            frames,
            order: self.order,
        }
    }

    pub fn newest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn order(&self) -> HistoryOrder {
        self.order
    }
}

/// Borrowed, ordered view of a [`HistoryCache`].
#[derive(Debug, Clone)]
pub struct HistorySnapshot<'a> {
    frames: Vec<&'a Frame>,
    order: HistoryOrder,
}

impl<'a> HistorySnapshot<'a> {
    /// Build a snapshot from frames already in `order`.
    pub fn from_frames(frames: Vec<&'a Frame>, order: HistoryOrder) -> Self {
        Self { frames, order }
    }

    pub fn frames(&self) -> &[&'a Frame] {
        &self.frames
    }

    pub fn order(&self) -> HistoryOrder {
        self.order
    }

    pub fn newest(&self) -> Option<&'a Frame> {
        match self.order {
            HistoryOrder::NewestFirst => self.frames.first().copied(),
            HistoryOrder::OldestFirst => self.frames.last().copied(),
        }
    }

    /// Highest level across every frame.
    pub fn max_level(&self) -> u8 {
        self.frames
            .iter()
            .map(|f| f.stats.max_level)
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

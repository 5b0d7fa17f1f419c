//! Bounded pending-frame queue backed by a preallocated slot arena

use crate::error::{BridgeError, Result};
use std::collections::VecDeque;

/// Fixed-capacity FIFO of PCM frames awaiting a playback buffer
///
/// All frame storage is reserved up front as one contiguous arena of
/// `limit` slots, each `frame_len` samples wide. Queued frames are slot
/// indices; pushing copies into a free slot, popping copies out and returns
/// the slot to the free list.
///
/// When the queue already holds `limit` frames, a push discards every queued
/// frame before accepting the new one.
pub struct FramePool {
    storage: Box<[i16]>,
    /// Valid sample count per slot
    lens: Box<[usize]>,
    frame_len: usize,
    limit: usize,
    free: Vec<usize>,
    queue: VecDeque<usize>,
}

/// Result of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    /// Frames discarded to make room (0 unless the queue was full)
    pub flushed: usize,
}

impl FramePool {
    /// Reserve storage for `limit` frames of `frame_len` samples
    pub fn new(limit: usize, frame_len: usize) -> Result<Self> {
        if limit == 0 {
            return Err(BridgeError::InvalidConfig(
                "pending queue limit must be at least 1".to_string(),
            ));
        }

        let total = limit.checked_mul(frame_len).ok_or(BridgeError::Allocation {
            bytes: usize::MAX,
        })?;
        let storage = alloc_zeroed(total)?;

        let mut free = Vec::with_capacity(limit);
        // Lowest index on top so slots are handed out in order
        free.extend((0..limit).rev());

        Ok(Self {
            storage,
            lens: vec![0; limit].into_boxed_slice(),
            frame_len,
            limit,
            free,
            queue: VecDeque::with_capacity(limit),
        })
    }

    /// Get the queue bound
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Get the slot width in samples
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Number of queued frames
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if no frames are queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Copy a frame into the queue, flushing everything first if full
    ///
    /// `payload` must not exceed `frame_len` samples.
    pub fn push(&mut self, payload: &[i16]) -> Result<PushOutcome> {
        if payload.len() > self.frame_len {
            return Err(BridgeError::FrameSize {
                len: payload.len(),
                capacity: self.frame_len,
                channels: 0,
            });
        }

        let flushed = if self.queue.len() >= self.limit {
            self.flush()
        } else {
            0
        };

        // At most limit - 1 slots are in use here, so one is always free
        let slot = self.free.pop().ok_or(BridgeError::Allocation {
            bytes: self.frame_len * std::mem::size_of::<i16>(),
        })?;

        let start = slot * self.frame_len;
        self.storage[start..start + payload.len()].copy_from_slice(payload);
        self.lens[slot] = payload.len();
        self.queue.push_back(slot);

        Ok(PushOutcome { flushed })
    }

    /// Copy the oldest frame into `dest` and release its slot
    ///
    /// Samples of `dest` past the frame's length are zeroed. Returns the
    /// frame length, or `None` if the queue is empty.
    pub fn pop_into(&mut self, dest: &mut [i16]) -> Option<usize> {
        let slot = self.queue.pop_front()?;
        let len = self.lens[slot].min(dest.len());
        let start = slot * self.frame_len;

        dest[..len].copy_from_slice(&self.storage[start..start + len]);
        dest[len..].fill(0);

        self.lens[slot] = 0;
        self.free.push(slot);
        Some(len)
    }

    /// Discard every queued frame, returning how many were dropped
    pub fn flush(&mut self) -> usize {
        let dropped = self.queue.len();
        for slot in self.queue.drain(..) {
            self.lens[slot] = 0;
            self.free.push(slot);
        }
        dropped
    }
}

/// Zeroed sample storage, surfacing allocation failure as an error
pub(crate) fn alloc_zeroed(len: usize) -> Result<Box<[i16]>> {
    let mut storage: Vec<i16> = Vec::new();
    storage
        .try_reserve_exact(len)
        .map_err(|_| BridgeError::Allocation {
            bytes: len.saturating_mul(std::mem::size_of::<i16>()),
        })?;
    storage.resize(len, 0);
    Ok(storage.into_boxed_slice())
}

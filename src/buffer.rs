//! Fixed-capacity circular FIFO for telemetry samples.
//!
//! `head` is the slot of the oldest live element and `tail` the next write
//! slot. Pushing into a full buffer evicts the element at `head`; popping an
//! empty buffer hands back the sentinel. Neither operation can fail.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, FrameResult};

/// Fill level, derived solely from `count` vs capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferState {
    Empty,
    Partial,
    Full,
}

/// Generic circular buffer keeping the most recent `capacity` values.
///
/// # Example
///
/// ```
/// use vehicle_frame_rs::buffer::BoundedSampleBuffer;
///
/// let mut fifo = BoundedSampleBuffer::new(3, -1);
/// for i in 0..5 {
///     fifo.push(i);
/// }
/// assert_eq!(fifo.snapshot(), vec![2, 3, 4]);
/// assert_eq!(fifo.pop(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct BoundedSampleBuffer<T> {
    data: Vec<T>,
    head: usize,
    tail: usize,
    max: usize,
    count: usize,
    sentinel: T,
}

impl<T: Clone> BoundedSampleBuffer<T> {
    /// Capacity is clamped to at least one slot.
    pub fn new(capacity: usize, sentinel: T) -> Self {
        let max = capacity.max(1);
        Self {
            data: Vec::with_capacity(max),
            head: 0,
            tail: 0,
            max,
            count: 0,
            sentinel,
        }
    }

    /// O(1). Evicts the oldest element when full.
    pub fn push(&mut self, value: T) {
        // Slots are allocated lazily; until the first wrap `tail == data.len()`
        if self.data.len() < self.max {
            self.data.push(value);
        } else {
            self.data[self.tail] = value;
        }

        if self.count == self.max {
            self.head = (self.head + 1) % self.max;
        } else {
            self.count += 1;
        }
        self.tail = (self.tail + 1) % self.max;
    }

    /// O(1). Oldest element, or the sentinel when empty.
    pub fn pop(&mut self) -> T {
        if self.count == 0 {
            return self.sentinel.clone();
        }

        let value = self.data[self.head].clone();
        self.head = (self.head + 1) % self.max;
        self.count -= 1;
        value
    }

    /// Live elements, oldest first, without touching the buffer
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Most recently pushed element
    pub fn latest(&self) -> Option<&T> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.tail + self.max - 1) % self.max;
        self.data.get(idx)
    }
}

impl<T> BoundedSampleBuffer<T> {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.max
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.max
    }

    pub fn sentinel(&self) -> &T {
        &self.sentinel
    }

    pub fn state(&self) -> BufferState {
        if self.count == 0 {
            BufferState::Empty
        } else if self.count == self.max {
            BufferState::Full
        } else {
            BufferState::Partial
        }
    }

    /// Drop every live element; allocated slots are reused.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
        self.data.clear();
    }

    /// Indexed traversal from `head` for `count` elements
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.count).map(move |i| &self.data[(self.head + i) % self.max])
    }
}

/// Lock-guarded handle for a buffer written by the sampler tick and read by
/// other tasks. Every call takes the one mutex for its O(1) critical section.
#[derive(Debug)]
pub struct SharedSampleBuffer<T> {
    inner: Arc<Mutex<BoundedSampleBuffer<T>>>,
}

impl<T> Clone for SharedSampleBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> SharedSampleBuffer<T> {
    pub fn new(capacity: usize, sentinel: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BoundedSampleBuffer::new(capacity, sentinel))),
        }
    }

    fn lock(&self) -> FrameResult<MutexGuard<'_, BoundedSampleBuffer<T>>> {
        self.inner
            .lock()
            .map_err(|_| FrameError::LockPoisoned("Failed to acquire sample buffer lock".to_string()))
    }

    pub fn push(&self, value: T) -> FrameResult<()> {
        self.lock()?.push(value);
        Ok(())
    }

    pub fn pop(&self) -> FrameResult<T> {
        Ok(self.lock()?.pop())
    }

    pub fn snapshot(&self) -> FrameResult<Vec<T>> {
        Ok(self.lock()?.snapshot())
    }

    pub fn latest(&self) -> FrameResult<Option<T>> {
        Ok(self.lock()?.latest().cloned())
    }

    pub fn len(&self) -> FrameResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> FrameResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    pub fn capacity(&self) -> FrameResult<usize> {
        Ok(self.lock()?.capacity())
    }

    pub fn state(&self) -> FrameResult<BufferState> {
        Ok(self.lock()?.state())
    }

    /// Snapshot and fill state taken under the same lock
    pub fn snapshot_with_state(&self) -> FrameResult<(Vec<T>, BufferState)> {
        let buffer = self.lock()?;
        Ok((buffer.snapshot(), buffer.state()))
    }

    pub fn clear(&self) -> FrameResult<()> {
        self.lock()?.clear();
        Ok(())
    }
}

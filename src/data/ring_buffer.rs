//! Fixed-capacity ring buffer for per-metric telemetry history.
//!
//! Each tracked entity keeps one of these per charted metric. Writes happen at tick
//! rate (often >10 Hz per entity), reads happen at UI refresh rate, so the buffer is
//! shaped for O(1) pushes and O(capacity) materialization.
//!
//! # Memory Layout
//! ```text
//! storage: [v5 v6 v7 v3 v4]      capacity = 5, count = 5
//!                    ^ head      next write lands here, oldest value lives here
//!
//! to_vec() = storage[head..] ++ storage[..head] = [v3 v4 v5 v6 v7]
//! ```
//!
//! The backing storage is allocated once in [`RingBuffer::new`]. `push` overwrites the
//! oldest slot once full and `clear` only resets the cursors, so the allocation is
//! reused across simulation restarts.

/// Fixed-capacity circular buffer.
///
/// `push` and `clear` are the only mutators. Reads never touch the cursors, which is
/// what allows any number of read-only consumers next to the single writer.
#[derive(Debug, Clone)]
pub struct RingBuffer<T = f64> {
    /// Backing storage, always `capacity` slots long
    storage: Box<[T]>,

    /// Slot the next push writes to
    head: usize,

    /// Number of valid values, capped at `capacity`
    count: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a ring buffer holding at most `capacity` values.
    ///
    /// A zero capacity is bumped to one so that `push` never has to special-case an
    /// empty backing store.
    ///
    /// # Example
    /// ```
    /// use rocket_telemetry::data::ring_buffer::RingBuffer;
    ///
    /// let mut rb = RingBuffer::new(3);
    /// for v in [1.0, 2.0, 3.0, 4.0] {
    ///     rb.push(v);
    /// }
    /// assert_eq!(rb.to_vec(), vec![2.0, 3.0, 4.0]);
    /// ```
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            storage: vec![T::default(); capacity].into_boxed_slice(),
            head: 0,
            count: 0,
        }
    }

    /// Append a value, silently evicting the oldest one once the buffer is full.
    pub fn push(&mut self, value: T) {
        self.storage[self.head] = value;
        self.head = (self.head + 1) % self.storage.len();
        if self.count < self.storage.len() {
            self.count += 1;
        }
    }

    /// Copy the stored values out, oldest first.
    ///
    /// Before the first wrap the values are a prefix of the storage. After it, the
    /// oldest value sits at `head`, so the tail segment is followed by the head segment.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        if self.count < self.storage.len() {
            return self.storage[..self.count].to_vec();
        }

        let mut out = Vec::with_capacity(self.count);
        out.extend_from_slice(&self.storage[self.head..]);
        out.extend_from_slice(&self.storage[..self.head]);
        out
    }

    /// Most recently pushed value, if any.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.storage.len();
        Some(self.storage[(self.head + capacity - 1) % capacity])
    }

    /// Forget every stored value without releasing the backing storage.
    pub fn clear(&mut self) {
        self.count = 0;
        self.head = 0;
    }

    /// Number of values currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if nothing has been pushed since creation or the last clear.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Maximum number of values retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_fill_keeps_push_order() {
        let mut rb = RingBuffer::new(4);
        rb.push(1.0);
        rb.push(2.0);

        assert_eq!(rb.len(), 2);
        assert_eq!(rb.to_vec(), vec![1.0, 2.0]);
        assert_eq!(rb.latest(), Some(2.0));
    }

    #[test]
    fn test_wrap_returns_last_capacity_values() {
        let mut rb = RingBuffer::new(3);
        for v in 1..=7 {
            rb.push(f64::from(v));
        }

        assert_eq!(rb.len(), 3);
        assert_eq!(rb.to_vec(), vec![5.0, 6.0, 7.0]);
        assert_eq!(rb.latest(), Some(7.0));
    }

    #[test]
    fn test_exact_fill_has_no_rotation() {
        let mut rb = RingBuffer::new(3);
        for v in [10.0, 20.0, 30.0] {
            rb.push(v);
        }
        assert_eq!(rb.to_vec(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_to_vec_does_not_mutate() {
        let mut rb = RingBuffer::new(2);
        rb.push(1.0);
        rb.push(2.0);
        rb.push(3.0);

        let first = rb.to_vec();
        let second = rb.to_vec();
        assert_eq!(first, second);
        assert_eq!(rb.len(), 2);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut rb = RingBuffer::new(5);
        for v in 0..8 {
            rb.push(f64::from(v));
        }
        rb.clear();

        assert!(rb.is_empty());
        assert!(rb.to_vec().is_empty());
        assert_eq!(rb.latest(), None);
        assert_eq!(rb.capacity(), 5);

        rb.push(42.0);
        assert_eq!(rb.to_vec(), vec![42.0]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut rb: RingBuffer<u32> = RingBuffer::new(0);
        rb.push(1);
        rb.push(2);
        assert_eq!(rb.capacity(), 1);
        assert_eq!(rb.to_vec(), vec![2]);
    }
}

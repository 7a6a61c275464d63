//! Bounded FIFO channels shared between the decode producer and consumers.
//!
//! The rest of the crate uses [`BoundedChannel`] as the wire between stages:
//! - decode thread → video channel → render loop
//! - decode thread → audio channel → audio callback
//!
//! The API makes shutdown deterministic (`close()` + draining semantics) and
//! seek cheap (`purge()` discards buffered media without touching the open
//! state), while keeping both consumers free of busy-waiting.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Thread-safe bounded FIFO for decoded media units.
///
/// ## Design
/// - **Bounded** by `capacity` to cap end-to-end latency, not byte volume.
/// - Blocking `push`/`pop` via a single [`Condvar`] used as a general
///   "state changed" signal.
/// - The `open` flag lives *under the same mutex* as the queue to avoid
///   close/push races beyond the documented single-item tolerance.
///
/// ## Shutdown policy
/// `push` on a closed channel silently drops the item and is not an error:
/// when the producer loses a race with `close()`, at most one in-flight unit
/// disappears.
pub struct BoundedChannel<T> {
    inner: Mutex<Inner<T>>,
    cv: Condvar,
    capacity: usize,
}

struct Inner<T> {
    queue: VecDeque<T>,
    open: bool,
}

impl<T> BoundedChannel<T> {
    /// Create a new bounded channel.
    ///
    /// ## Panics
    /// Panics if `capacity` is zero; a zero-capacity channel could never
    /// accept an item.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "channel capacity must be positive");
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                open: true,
            }),
            cv: Condvar::new(),
            capacity,
        }
    }

    /// Maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current buffered item count (best-effort snapshot).
    ///
    /// Advisory only: the value can change immediately after the call
    /// returns, so it must never drive a correctness decision.
    pub fn len(&self) -> usize {
        let g = self.inner.lock().unwrap();
        g.queue.len()
    }

    /// Whether the channel is currently empty (best-effort snapshot).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the channel has been closed by its producer.
    ///
    /// Closed channels may still hold buffered items until drained.
    pub fn is_closed(&self) -> bool {
        let g = self.inner.lock().unwrap();
        !g.open
    }

    /// Append an item to the tail, blocking while the channel is full.
    ///
    /// - Blocks until capacity is available or the channel is closed.
    /// - If the channel is (or becomes) closed, the item is dropped silently
    ///   and the call returns; see the shutdown policy above.
    ///
    /// Items are observed by `pop` in submission order.
    pub fn push(&self, item: T) {
        let mut g = self.inner.lock().unwrap();
        while g.queue.len() >= self.capacity && g.open {
            g = self.cv.wait(g).unwrap();
        }
        if !g.open {
            return;
        }
        g.queue.push_back(item);
        drop(g);
        self.cv.notify_all();
    }

    /// Remove and return the head item, blocking while the channel is empty
    /// and still open.
    ///
    /// Returns `None` only once the channel is closed *and* fully drained;
    /// every later call returns `None` immediately (EOF is sticky).
    pub fn pop(&self) -> Option<T> {
        let mut g = self.inner.lock().unwrap();
        while g.queue.is_empty() && g.open {
            g = self.cv.wait(g).unwrap();
        }
        let item = g.queue.pop_front();
        if item.is_some() {
            drop(g);
            self.cv.notify_all();
        }
        item
    }

    /// Remove and return the head item without blocking.
    ///
    /// Returns `None` when the channel is currently empty, open or not.
    pub fn try_pop(&self) -> Option<T> {
        let mut g = self.inner.lock().unwrap();
        let item = g.queue.pop_front();
        if item.is_some() {
            drop(g);
            self.cv.notify_all();
        }
        item
    }

    /// Mark the channel closed and wake all waiters.
    ///
    /// Buffered items still drain via `pop`; EOF is reported only once the
    /// queue empties. Idempotent.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.open = false;
        drop(g);
        self.cv.notify_all();
    }

    /// Discard all buffered items immediately, regardless of open state.
    ///
    /// Used by seek/stop to drop stale media. Does not alter the open state;
    /// producers blocked on a full queue resume. A `push` racing this call
    /// may land one item after the purge; seeks tolerate that single item.
    pub fn purge(&self) {
        let mut g = self.inner.lock().unwrap();
        let discarded = g.queue.len();
        g.queue.clear();
        drop(g);
        if discarded > 0 {
            tracing::debug!(discarded, "channel purged");
        }
        self.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order_preserved_without_interleaved_reads() {
        let ch = BoundedChannel::new(8);
        for i in 0..8 {
            ch.push(i);
        }
        for i in 0..8 {
            assert_eq!(ch.pop(), Some(i));
        }
    }

    #[test]
    fn push_blocks_on_full_channel_until_consumer_makes_room() {
        let ch = Arc::new(BoundedChannel::new(2));
        ch.push(1);
        ch.push(2);

        let ch_push = ch.clone();
        let barrier = Arc::new(Barrier::new(2));
        let start = barrier.clone();
        let handle = thread::spawn(move || {
            start.wait();
            // Blocks until the delayed pop below frees a slot.
            ch_push.push(3);
        });

        barrier.wait();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(ch.len(), 2);
        assert_eq!(ch.pop(), Some(1));
        handle.join().unwrap();

        assert_eq!(ch.pop(), Some(2));
        assert_eq!(ch.pop(), Some(3));
        assert!(ch.len() <= ch.capacity());
    }

    #[test]
    fn pop_returns_none_immediately_after_close_on_empty() {
        let ch: BoundedChannel<u32> = BoundedChannel::new(4);
        ch.close();
        assert_eq!(ch.pop(), None);
        // EOF is sticky.
        assert_eq!(ch.pop(), None);
        assert!(ch.is_closed());
    }

    #[test]
    fn close_drains_buffered_items_then_reports_eof() {
        let ch = BoundedChannel::new(4);
        ch.push("a");
        ch.push("b");
        ch.push("c");
        ch.close();

        assert_eq!(ch.pop(), Some("a"));
        assert_eq!(ch.pop(), Some("b"));
        assert_eq!(ch.pop(), Some("c"));
        assert_eq!(ch.pop(), None);
    }

    #[test]
    fn push_after_close_is_dropped_silently() {
        let ch = BoundedChannel::new(4);
        ch.close();
        ch.push(42);
        assert_eq!(ch.len(), 0);
        assert_eq!(ch.pop(), None);
    }

    #[test]
    fn purge_leaves_channel_empty_whether_full_or_not() {
        let ch: BoundedChannel<u32> = BoundedChannel::new(2);
        ch.purge();
        assert_eq!(ch.len(), 0);

        ch.push(1);
        ch.push(2);
        ch.purge();
        assert_eq!(ch.len(), 0);
        assert!(!ch.is_closed());

        // The channel stays usable after a purge.
        ch.push(3);
        assert_eq!(ch.pop(), Some(3));
    }

    #[test]
    fn purge_unblocks_a_producer_stuck_on_full_queue() {
        let ch = Arc::new(BoundedChannel::new(1));
        ch.push(1);

        let ch_push = ch.clone();
        let handle = thread::spawn(move || {
            ch_push.push(2);
        });

        thread::sleep(Duration::from_millis(20));
        ch.purge();
        handle.join().unwrap();
        assert!(ch.len() <= 1);
    }

    #[test]
    fn try_pop_never_blocks() {
        let ch: BoundedChannel<u32> = BoundedChannel::new(2);
        assert_eq!(ch.try_pop(), None);
        ch.push(7);
        assert_eq!(ch.try_pop(), Some(7));
        ch.close();
        assert_eq!(ch.try_pop(), None);
    }

    #[test]
    fn concurrent_writers_never_lose_or_duplicate_items() {
        const WRITERS: u64 = 4;
        const PER_WRITER: u64 = 250;

        let ch = Arc::new(BoundedChannel::new(8));
        let mut handles = Vec::new();
        for w in 0..WRITERS {
            let ch = ch.clone();
            handles.push(thread::spawn(move || {
                for i in 0..PER_WRITER {
                    ch.push(w * PER_WRITER + i);
                }
            }));
        }

        let ch_read = ch.clone();
        let reader = thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(v) = ch_read.pop() {
                assert!(ch_read.len() <= ch_read.capacity());
                seen.push(v);
            }
            seen
        });

        for h in handles {
            h.join().unwrap();
        }
        ch.close();

        let mut seen = reader.join().unwrap();
        seen.sort_unstable();
        let expected: Vec<u64> = (0..WRITERS * PER_WRITER).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn per_writer_order_is_preserved_under_concurrency() {
        let ch = Arc::new(BoundedChannel::new(4));
        let ch_push = ch.clone();
        let handle = thread::spawn(move || {
            for i in 0..100u32 {
                ch_push.push(i);
            }
            ch_push.close();
        });

        let mut last = None;
        while let Some(v) = ch.pop() {
            if let Some(prev) = last {
                assert!(v > prev, "items reordered: {prev} then {v}");
            }
            last = Some(v);
        }
        assert_eq!(last, Some(99));
        handle.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn zero_capacity_is_rejected() {
        let _ = BoundedChannel::<u32>::new(0);
    }
}

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// FIFO with a hard capacity. Pushing into a full queue evicts the oldest item.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: AtomicUsize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity: AtomicUsize::new(capacity),
        }
    }

    /// Returns the evicted item when the queue was full.
    pub fn push(&self, item: T) -> Option<T> {
        let capacity = self.capacity();
        let mut items = self.items.lock();

        let evicted = if items.len() >= capacity {
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        evicted
    }

    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Takes everything currently queued, oldest first.
    pub fn drain(&self) -> VecDeque<T> {
        std::mem::take(&mut *self.items.lock())
    }

    /// Returns how many items were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.len();
        items.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Shrinking below the current length evicts the oldest items; returns how many.
    pub fn set_capacity(&self, capacity: usize) -> usize {
        let capacity = capacity.max(1);
        self.capacity.store(capacity, Ordering::Relaxed);

        let mut items = self.items.lock();
        let excess = items.len().saturating_sub(capacity);
        items.drain(..excess);
        excess
    }
}

/// Level-triggered wake signal shared by all producers and the consumer.
#[derive(Debug, Default)]
pub struct Wakeup {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl Wakeup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.cond.notify_all();
    }

    /// Blocks until notified or `timeout` elapses. Returns whether a signal was consumed.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.wait_unless(timeout, || false)
    }

    /// Like [`wait`](Self::wait), but also returns as soon as `cancelled` holds
    /// after a wake. `cancelled` is checked under the signal lock, so a flag set
    /// before `notify` is never missed.
    pub fn wait_unless(&self, timeout: Duration, cancelled: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();

        while !*pending && !cancelled() {
            if self.cond.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }

        std::mem::replace(&mut *pending, false)
    }
}

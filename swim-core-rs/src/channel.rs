//! Bounded, drop-oldest event channel.
//!
//! Offering never blocks: when the buffer is full the oldest unread item is
//! evicted to make room. Receivers compete for items, so every item is
//! delivered to at most one reader across all cloned receivers. Receiving
//! waits until an item is available or the channel is closed; dropping the
//! `recv` future abandons the wait without consuming anything.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    /// Items evicted since creation
    dropped: AtomicU64,
    closed: AtomicBool,
    notify: Notify,
}

/// Producer side of a bounded drop-oldest channel.
///
/// Dropping the channel closes it; receivers drain what is left and then
/// observe the close.
pub struct EventChannel<T> {
    shared: Arc<Shared<T>>,
}

/// Consumer handle onto an [`EventChannel`]
pub struct EventReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> EventChannel<T> {
    /// Create a channel holding at most `capacity` unread items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                dropped: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Enqueue an item, evicting the oldest unread one if full.
    /// Returns true if an item was evicted.
    pub fn offer(&self, item: T) -> bool {
        let evicted = {
            let mut queue = self.shared.queue.lock();
            let evicted = if queue.len() >= self.shared.capacity {
                queue.pop_front();
                true
            } else {
                false
            };
            queue.push_back(item);
            evicted
        };

        if evicted {
            let total = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            trace!(
                capacity = self.shared.capacity,
                dropped = total,
                "channel full, dropped oldest"
            );
        }

        self.shared.notify.notify_one();
        evicted
    }

    /// Create a receiver handle
    pub fn receiver(&self) -> EventReceiver<T> {
        EventReceiver {
            shared: self.shared.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of items evicted since creation
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Drop for EventChannel<T> {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_waiters();
    }
}

impl<T> EventReceiver<T> {
    /// Wait for the next item.
    ///
    /// Returns `None` once the channel is closed and fully drained.
    pub async fn recv(&self) -> Option<T> {
        loop {
            // Register before checking so a concurrent offer or close is not missed
            let notified = self.shared.notify.notified();

            if let Some(item) = self.try_recv() {
                return Some(item);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }

            notified.await;
        }
    }

    /// Take the next item if one is buffered
    pub fn try_recv(&self) -> Option<T> {
        self.shared.queue.lock().pop_front()
    }

    /// Take every buffered item, oldest first
    pub fn drain(&self) -> Vec<T> {
        self.shared.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of items evicted since creation
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl<T> Clone for EventReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

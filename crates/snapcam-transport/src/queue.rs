use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::trace;

use crate::traits::ascii_preview;

struct Shared {
    items: Mutex<VecDeque<Bytes>>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Bytes>> {
        // A panicking producer cannot leave the deque half-modified.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, payload: Bytes) {
        let mut items = self.lock();
        trace!(
            depth = items.len(),
            payload = %ascii_preview(&payload),
            "enqueue notification"
        );
        items.push_back(payload);
        drop(items);
        self.ready.notify_all();
    }
}

/// FIFO of notification payloads not yet consumed by a command.
///
/// The BLE notification callback is the only producer (through a
/// [`NotificationSender`]); the command session is the only consumer. Growth is
/// unbounded: the session clears the queue before every attempt.
pub struct NotificationQueue {
    shared: Arc<Shared>,
}

/// Producer handle for a [`NotificationQueue`].
///
/// Cheap to clone and `Send + Sync`, so it can be moved into whatever callback
/// the BLE stack invokes per notification.
#[derive(Clone)]
pub struct NotificationSender {
    shared: Arc<Shared>,
}

impl NotificationSender {
    /// Append one notification payload and wake any waiter.
    pub fn push(&self, payload: impl Into<Bytes>) {
        self.shared.push(payload.into());
    }
}

impl std::fmt::Debug for NotificationSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSender").finish_non_exhaustive()
    }
}

impl NotificationQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                items: Mutex::new(VecDeque::new()),
                ready: Condvar::new(),
            }),
        }
    }

    /// Producer handle to hand to the notification callback.
    pub fn sender(&self) -> NotificationSender {
        NotificationSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Append directly, same as [`NotificationSender::push`].
    pub fn push(&self, payload: impl Into<Bytes>) {
        self.shared.push(payload.into());
    }

    /// Pop the head, blocking until one arrives or `timeout` elapses.
    ///
    /// Returns `None` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Bytes> {
        let deadline = Instant::now() + timeout;
        let mut items = self.shared.lock();
        loop {
            if let Some(payload) = items.pop_front() {
                return Some(payload);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let (guard, _) = self
                .shared
                .ready
                .wait_timeout(items, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            items = guard;
        }
    }

    /// Pop the head without blocking.
    pub fn try_recv(&self) -> Option<Bytes> {
        self.shared.lock().pop_front()
    }

    /// Discard everything queued. Returns the number of dropped payloads.
    pub fn clear(&self) -> usize {
        let mut items = self.shared.lock();
        let dropped = items.len();
        items.clear();
        dropped
    }

    /// Number of payloads waiting.
    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    /// True when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn fifo_order_preserved() {
        let queue = NotificationQueue::new();
        queue.push(Bytes::from_static(b"one"));
        queue.push(b"two".to_vec());
        queue.sender().push(Bytes::from_static(b"three"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_recv().unwrap().as_ref(), b"one");
        assert_eq!(queue.try_recv().unwrap().as_ref(), b"two");
        assert_eq!(queue.try_recv().unwrap().as_ref(), b"three");
        assert!(queue.try_recv().is_none());
    }

    #[test]
    fn recv_timeout_expires_on_empty_queue() {
        let queue = NotificationQueue::new();
        let start = Instant::now();
        assert!(queue.recv_timeout(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn recv_returns_immediately_when_queued() {
        let queue = NotificationQueue::new();
        queue.push(Bytes::from_static(b"ready"));
        let payload = queue.recv_timeout(Duration::ZERO).unwrap();
        assert_eq!(payload.as_ref(), b"ready");
    }

    #[test]
    fn producer_thread_wakes_consumer() {
        let queue = NotificationQueue::new();
        let sender = queue.sender();

        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sender.push(Bytes::from_static(b"{\"ret\":1}"));
        });

        let payload = queue
            .recv_timeout(Duration::from_secs(5))
            .expect("producer should deliver before timeout");
        assert_eq!(payload.as_ref(), b"{\"ret\":1}");
        producer.join().unwrap();
    }

    #[test]
    fn concurrent_producer_keeps_order() {
        let queue = NotificationQueue::new();
        let sender = queue.sender();

        let producer = thread::spawn(move || {
            for i in 0..64u32 {
                sender.push(format!("n-{i}").into_bytes());
            }
        });

        for i in 0..64u32 {
            let payload = queue.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(payload.as_ref(), format!("n-{i}").as_bytes());
        }
        producer.join().unwrap();
    }

    #[test]
    fn clear_reports_dropped_count() {
        let queue = NotificationQueue::new();
        assert_eq!(queue.clear(), 0);
        queue.push(Bytes::from_static(b"stale-1"));
        queue.push(Bytes::from_static(b"stale-2"));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn debug_shows_depth() {
        let queue = NotificationQueue::new();
        queue.push(Bytes::from_static(b"x"));
        assert_eq!(format!("{queue:?}"), "NotificationQueue { len: 1 }");
    }
}

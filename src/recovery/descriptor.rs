//! Recovery Descriptors
//!
//! [`RecoveryDescriptor`] is the contract the session consumes;
//! [`RetransmitBuffer`] is the in-crate bounded implementation used by the
//! demo binary and tests.

use crate::session::WriteHandle;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Bounded tracker of unacknowledged in-flight writes.
///
/// Implementations must be thread-safe: `record` is invoked by the owning
/// worker while producers may be querying `outstanding` concurrently.
pub trait RecoveryDescriptor: Send + Sync {
    /// Retains `handle` as sent-but-unacknowledged.
    ///
    /// Returns `false` when the bounded set is full; the session reacts by
    /// closing so the reconnect path can retransmit.
    fn record(&self, handle: Arc<WriteHandle>) -> bool;

    /// Maximum number of unacknowledged handles retained.
    fn capacity(&self) -> usize;

    /// The retained handles in their original send order.
    fn outstanding(&self) -> Vec<Arc<WriteHandle>>;

    /// Invoked when the tracked connection is (re-)established.
    fn on_connection_established(&self);
}

/// An in-memory bounded recovery descriptor.
///
/// Handles are retained in send order; [`RetransmitBuffer::acknowledge`]
/// releases the oldest `n` once the remote side confirms receipt.
#[derive(Debug)]
pub struct RetransmitBuffer {
    capacity: usize,
    retained: Mutex<VecDeque<Arc<WriteHandle>>>,
    /// Total handles acknowledged over the tracker's lifetime.
    acked: AtomicU64,
    /// Times the connection-established callback fired.
    established: AtomicU64,
}

impl RetransmitBuffer {
    /// Creates a tracker retaining at most `capacity` handles.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            retained: Mutex::new(VecDeque::with_capacity(capacity)),
            acked: AtomicU64::new(0),
            established: AtomicU64::new(0),
        }
    }

    /// Releases the `count` oldest retained handles; returns how many were
    /// actually released.
    pub fn acknowledge(&self, count: usize) -> usize {
        let mut retained = self.retained.lock().unwrap();
        let released = count.min(retained.len());
        for _ in 0..released {
            retained.pop_front();
        }
        drop(retained);

        if released > 0 {
            self.acked.fetch_add(released as u64, Ordering::Relaxed);
            trace!(released = released, "acknowledged in-flight writes");
        }
        released
    }

    /// Number of handles currently retained.
    pub fn len(&self) -> usize {
        self.retained.lock().unwrap().len()
    }

    /// Returns `true` when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total handles acknowledged over the tracker's lifetime.
    pub fn acked_count(&self) -> u64 {
        self.acked.load(Ordering::Relaxed)
    }

    /// Times the connection-established callback fired.
    pub fn established_count(&self) -> u64 {
        self.established.load(Ordering::Relaxed)
    }
}

impl RecoveryDescriptor for RetransmitBuffer {
    fn record(&self, handle: Arc<WriteHandle>) -> bool {
        let mut retained = self.retained.lock().unwrap();
        if retained.len() >= self.capacity {
            return false;
        }
        retained.push_back(handle);
        true
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn outstanding(&self) -> Vec<Arc<WriteHandle>> {
        self.retained.lock().unwrap().iter().cloned().collect()
    }

    fn on_connection_established(&self) {
        self.established.fetch_add(1, Ordering::Relaxed);
        debug!(retained = self.len(), "recovery tracker notified of established connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(payload: &'static str) -> Arc<WriteHandle> {
        Arc::new(WriteHandle::new(payload))
    }

    #[test]
    fn test_record_until_capacity() {
        let buffer = RetransmitBuffer::new(2);
        assert!(buffer.record(handle("a")));
        assert!(buffer.record(handle("b")));
        assert!(!buffer.record(handle("c")));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_acknowledge_releases_oldest() {
        let buffer = RetransmitBuffer::new(4);
        let a = handle("a");
        let b = handle("b");
        let c = handle("c");
        buffer.record(Arc::clone(&a));
        buffer.record(Arc::clone(&b));
        buffer.record(Arc::clone(&c));

        assert_eq!(buffer.acknowledge(2), 2);
        assert_eq!(buffer.acked_count(), 2);

        let outstanding = buffer.outstanding();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].id(), c.id());

        // Space freed: recording succeeds again
        assert!(buffer.record(handle("d")));
    }

    #[test]
    fn test_acknowledge_clamped_to_retained() {
        let buffer = RetransmitBuffer::new(4);
        buffer.record(handle("a"));
        assert_eq!(buffer.acknowledge(10), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_outstanding_preserves_send_order() {
        let buffer = RetransmitBuffer::new(4);
        let handles: Vec<_> = (0..4).map(|_| handle("x")).collect();
        for h in &handles {
            buffer.record(Arc::clone(h));
        }

        let outstanding = buffer.outstanding();
        let ids: Vec<_> = outstanding.iter().map(|h| h.id()).collect();
        let expected: Vec<_> = handles.iter().map(|h| h.id()).collect();
        assert_eq!(ids, expected);
    }
}

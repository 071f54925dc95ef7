//! Pending-Write Handles
//!
//! A [`WriteHandle`] is the opaque token a producer enqueues and a worker
//! later consumes. Handles are shared (`Arc`) between the write queue and
//! recovery tracking: the same handle that leaves the queue is retained by
//! the outbound recovery descriptor until acknowledged, and re-enters the
//! queue verbatim on `resend` after a reconnect.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Global handle id source.
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque pending-write token.
///
/// The `message_thread` flag records the classification of the producer that
/// enqueued the handle; it decides whether dequeuing the handle returns a
/// permit to the session's pool.
#[derive(Debug)]
pub struct WriteHandle {
    /// Unique id, assigned at construction.
    id: u64,

    /// The bytes this write will put on the wire.
    payload: Bytes,

    /// `true` if the handle was enqueued from a message-processing thread
    /// (or through the priority path) and therefore holds no permit.
    message_thread: AtomicBool,
}

impl WriteHandle {
    /// Creates a handle for `payload`.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            payload: payload.into(),
            message_thread: AtomicBool::new(false),
        }
    }

    /// The handle's unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The payload this write carries.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` for an empty payload.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Returns the producer classification stamped at enqueue time.
    pub fn message_thread(&self) -> bool {
        self.message_thread.load(Ordering::Relaxed)
    }

    /// Stamps the producer classification. Set once, on enqueue.
    pub(crate) fn set_message_thread(&self, value: bool) {
        self.message_thread.store(value, Ordering::Relaxed);
    }
}

impl PartialEq for WriteHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WriteHandle {}

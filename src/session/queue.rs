//! Per-Session Write Queue
//!
//! A double-ended queue of pending write handles with an independent atomic
//! size counter. Multi-producer enqueue is safe from any thread; dequeue is
//! the owning worker's alone.
//!
//! ## Why a Separate Counter?
//!
//! `offer` must return a distinct queue size to each concurrent caller: when
//! the queue is empty and two producers enqueue at once, exactly one of them
//! must observe size 1; that caller is the one responsible for asking the
//! reactor to register write-interest. A `len()` read after the push cannot
//! guarantee that, so the counter is bumped on the same locked operation
//! that mutates the deque.

use crate::session::WriteHandle;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::error;

/// Concurrent deque of pending writes plus its size counter.
#[derive(Debug, Default)]
pub struct WriteQueue {
    handles: Mutex<VecDeque<Arc<WriteHandle>>>,
    size: AtomicUsize,
}

impl WriteQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handle at the tail and returns the new queue size.
    pub fn offer(&self, handle: Arc<WriteHandle>) -> usize {
        let mut handles = self.handles.lock().unwrap();
        handles.push_back(handle);
        self.size.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Inserts a handle at the head and returns the new queue size.
    ///
    /// Head insertion is the priority path: the handle is transmitted before
    /// every ordinary write already queued.
    pub fn offer_first(&self, handle: Arc<WriteHandle>) -> usize {
        let mut handles = self.handles.lock().unwrap();
        handles.push_front(handle);
        self.size.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Removes and returns the head handle, if any.
    pub fn poll(&self) -> Option<Arc<WriteHandle>> {
        let mut handles = self.handles.lock().unwrap();
        let head = handles.pop_front();
        if head.is_some() {
            self.size.fetch_sub(1, Ordering::SeqCst);
        }
        head
    }

    /// Removes the last occurrence of `handle`, searching from the tail.
    ///
    /// Returns `true` if a matching handle was removed.
    pub fn remove_last_occurrence(&self, handle: &WriteHandle) -> bool {
        let mut handles = self.handles.lock().unwrap();
        let pos = handles.iter().rposition(|queued| queued.as_ref() == handle);
        match pos {
            Some(idx) => {
                let _ = handles.remove(idx);
                self.size.fetch_sub(1, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Repopulates an empty queue with `handles` in their original order.
    ///
    /// Returns `None` without touching the queue when it is not empty. The
    /// size counter is reset with a compare-and-set from zero; a failed swap
    /// means a producer raced a caller that promised a quiesced session.
    pub fn refill(&self, replay: Vec<Arc<WriteHandle>>) -> Option<usize> {
        let mut handles = self.handles.lock().unwrap();
        if !handles.is_empty() {
            return None;
        }
        let count = replay.len();
        handles.extend(replay);

        let reset = self
            .size
            .compare_exchange(0, count, Ordering::SeqCst, Ordering::SeqCst);
        if reset.is_err() {
            debug_assert!(false, "write queue counter desynced during refill");
            error!(
                expected = 0,
                found = self.size.load(Ordering::SeqCst),
                "write queue counter desynced during refill"
            );
        }
        Some(count)
    }

    /// Current queue size as tracked by the counter.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Returns `true` when no handles are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

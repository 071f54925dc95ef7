//! Run-Queue Worker
//!
//! A [`Worker`] backed by a mutex-guarded deque. The reactor thread that
//! owns the worker drains it with [`RunQueueWorker::take`] (non-blocking) or
//! [`RunQueueWorker::take_timeout`] (parked until work arrives); any thread
//! may enqueue through the [`Worker`] trait.

use crate::worker::{SessionId, Worker, WorkerOp};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use tracing::trace;

/// A worker whose run loop is an in-memory deque.
#[derive(Debug)]
pub struct RunQueueWorker {
    name: String,
    queue: Mutex<VecDeque<WorkerOp>>,
    cond: Condvar,
}

impl RunQueueWorker {
    /// Creates a named worker with an empty run queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
        }
    }

    /// Pops the next operation, or `None` when the run queue is empty.
    pub fn take(&self) -> Option<WorkerOp> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Pops the next operation, waiting up to `timeout` for one to arrive.
    pub fn take_timeout(&self, timeout: Duration) -> Option<WorkerOp> {
        let mut queue = self.queue.lock().unwrap();
        if queue.is_empty() {
            let (guard, _) = self.cond.wait_timeout(queue, timeout).unwrap();
            queue = guard;
        }
        queue.pop_front()
    }

    /// Number of operations waiting in the run queue.
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Returns `true` if the run queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    /// Drains every queued operation, preserving order.
    pub fn drain(&self) -> Vec<WorkerOp> {
        self.queue.lock().unwrap().drain(..).collect()
    }
}

impl Worker for RunQueueWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn offer(&self, op: WorkerOp) {
        let mut queue = self.queue.lock().unwrap();
        queue.push_back(op);
        drop(queue);
        self.cond.notify_one();
    }

    fn offer_batch(&self, ops: Vec<WorkerOp>) {
        if ops.is_empty() {
            return;
        }
        let mut queue = self.queue.lock().unwrap();
        trace!(worker = %self.name, batch = ops.len(), "batch offered");
        queue.extend(ops);
        drop(queue);
        self.cond.notify_one();
    }

    fn extract_session_ops(&self, session_id: SessionId) -> Vec<WorkerOp> {
        let mut queue = self.queue.lock().unwrap();
        let mut kept = VecDeque::with_capacity(queue.len());
        let mut extracted = Vec::new();
        for op in queue.drain(..) {
            if op.session_id == session_id {
                extracted.push(op);
            } else {
                kept.push_back(op);
            }
        }
        *queue = kept;
        extracted
    }
}

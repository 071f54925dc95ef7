//! Selector-Bound Session
//!
//! A [`Session`] binds one logical connection to the reactor worker that
//! currently owns it. It carries the pending-write queue, the per-connection
//! read/write buffers, optional recovery descriptors for reliable
//! retransmission, and the affinity state used to migrate the connection
//! between workers without losing in-flight operations.
//!
//! ## Control Flow
//!
//! ```text
//! producer thread             session                    owning worker
//! ───────────────             ───────                    ─────────────
//! send(handle) ──────────────> permit? ──> [write queue] ──> poll_outbound()
//!                                                │               │
//!                                                │               ▼
//!                                                │        record with outbound
//!                                                │        recovery descriptor
//!                                                │               │
//!                                                │          false = overflow
//!                                                │               ▼
//!                                                └────────── close()
//! ```
//!
//! ## Ownership and Migration
//!
//! A session has at most one owning worker. `Unassigned` is valid only
//! transiently, between [`Session::begin_migration`] and
//! [`Session::complete_migration`]. While unassigned, worker-directed
//! operations accumulate in a pending buffer and are flushed to the next
//! owner in arrival order, delivered to exactly one worker and never split.
//!
//! All mutations of {owner, pending buffer} serialize under one mutex. The
//! [`Worker`] contract forbids blocking or re-entering the session from
//! `offer`/`offer_batch`/`extract_session_ops`, so holding that mutex across
//! those calls is safe and is what keeps delivery ordered.

use crate::backpressure::{in_message_scope, PermitPool};
use crate::recovery::RecoveryDescriptor;
use crate::session::{WriteHandle, WriteQueue};
use crate::worker::{same_worker, SessionId, Worker, WorkerOp};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, warn};

/// Initial capacity of the per-session write buffer.
const WRITE_BUFFER_SIZE: usize = 32 * 1024;

/// Initial capacity of the per-session read buffer.
const READ_BUFFER_SIZE: usize = 32 * 1024;

/// Global session id source.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Errors surfaced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `resend` was called while writes were still queued.
    #[error("resend requires an empty write queue ({queued} handles still queued)")]
    ResendNonEmpty {
        /// Handles resident in the queue at the time of the call.
        queued: usize,
    },

    /// Inbound recovery tracking attached to a session that was accepted.
    #[error("inbound recovery tracking is only valid for initiated connections")]
    InboundRecoveryOnAccepted,
}

/// Which worker, if any, currently owns the session.
#[derive(Clone)]
enum Owner {
    /// No owner; valid only mid-migration.
    Unassigned,
    /// Owned by one reactor worker.
    Assigned(Arc<dyn Worker>),
}

/// Owner plus the operations buffered while unassigned. Guarded by a single
/// mutex so "observe owner, act on it" is atomic against migrations.
struct Affinity {
    owner: Owner,
    pending: Vec<WorkerOp>,
}

/// Per-session operation counters.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Writes enqueued through the ordinary path.
    pub sends: AtomicU64,
    /// Writes enqueued through the priority path.
    pub priority_sends: AtomicU64,
    /// Handles dequeued for transmission.
    pub polls: AtomicU64,
    /// Completed worker migrations.
    pub migrations: AtomicU64,
}

impl SessionStats {
    fn record_send(&self) {
        self.sends.fetch_add(1, Ordering::Relaxed);
    }

    fn record_priority_send(&self) {
        self.priority_sends.fetch_add(1, Ordering::Relaxed);
    }

    fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    fn record_migration(&self) {
        self.migrations.fetch_add(1, Ordering::Relaxed);
    }
}

/// A per-connection session bound to a reactor worker.
///
/// # Thread Safety
///
/// Designed to be wrapped in an `Arc` and shared between arbitrary producer
/// threads and the reactor. `send`/`send_priority` are multi-producer safe;
/// `poll_outbound` belongs to the single owning worker; `resend` requires a
/// quiesced session (freshly reconnected, not yet exposed to producers).
pub struct Session {
    /// Unique session id.
    id: SessionId,

    /// Local socket address.
    local_addr: SocketAddr,

    /// Remote socket address.
    remote_addr: SocketAddr,

    /// `true` if the connection arrived through accept, `false` if this
    /// side initiated it.
    accepted: bool,

    /// Outbound staging buffer, used by the owning worker.
    write_buf: Mutex<BytesMut>,

    /// Inbound staging buffer, used by the owning worker.
    read_buf: Mutex<BytesMut>,

    /// Pending writes plus the independent size counter.
    queue: WriteQueue,

    /// Send-permit pool; `None` disables backpressure.
    permits: Option<PermitPool>,

    /// Current owner and the operations buffered while unassigned.
    affinity: Mutex<Affinity>,

    /// Tracker for received-but-unacknowledged traffic.
    in_recovery: RwLock<Option<Arc<dyn RecoveryDescriptor>>>,

    /// Tracker for sent-but-unacknowledged traffic.
    out_recovery: RwLock<Option<Arc<dyn RecoveryDescriptor>>>,

    /// Set once by `close`.
    closed: AtomicBool,

    /// Operation counters.
    stats: SessionStats,
}

impl Session {
    /// Creates a session owned by `worker`.
    ///
    /// A `send_queue_limit` of zero disables backpressure entirely;
    /// otherwise ordinary producers may hold at most that many writes in
    /// flight.
    pub fn new(
        worker: Arc<dyn Worker>,
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        accepted: bool,
        send_queue_limit: usize,
    ) -> Self {
        let id = SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));

        debug!(
            session = %id,
            local = %local_addr,
            remote = %remote_addr,
            accepted = accepted,
            queue_limit = send_queue_limit,
            "session created"
        );

        Self {
            id,
            local_addr,
            remote_addr,
            accepted,
            write_buf: Mutex::new(BytesMut::with_capacity(WRITE_BUFFER_SIZE)),
            read_buf: Mutex::new(BytesMut::with_capacity(READ_BUFFER_SIZE)),
            queue: WriteQueue::new(),
            permits: (send_queue_limit > 0).then(|| PermitPool::new(send_queue_limit)),
            affinity: Mutex::new(Affinity {
                owner: Owner::Assigned(worker),
                pending: Vec::new(),
            }),
            in_recovery: RwLock::new(None),
            out_recovery: RwLock::new(None),
            closed: AtomicBool::new(false),
            stats: SessionStats::default(),
        }
    }

    /// The session's unique id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Local socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Remote socket address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// `true` if the connection arrived through accept.
    pub fn accepted(&self) -> bool {
        self.accepted
    }

    /// Exclusive access to the outbound staging buffer.
    pub fn write_buf(&self) -> MutexGuard<'_, BytesMut> {
        self.write_buf.lock().unwrap()
    }

    /// Exclusive access to the inbound staging buffer.
    pub fn read_buf(&self) -> MutexGuard<'_, BytesMut> {
        self.read_buf.lock().unwrap()
    }

    /// Per-session operation counters.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Permits currently available, or `None` when backpressure is disabled.
    pub fn available_permits(&self) -> Option<usize> {
        self.permits.as_ref().map(|pool| pool.available())
    }

    // ── Write queue ────────────────────────────────────────────────────

    /// Enqueues an ordinary write and returns the new queue size.
    ///
    /// Non-message threads block here until a permit is available (or the
    /// session closes). The returned size lets the caller decide whether to
    /// register write-interest: exactly one concurrent caller observes 1.
    pub fn send(&self, handle: Arc<WriteHandle>) -> usize {
        let msg_thread = in_message_scope();

        if !msg_thread {
            if let Some(pool) = &self.permits {
                pool.acquire();
            }
        }

        handle.set_message_thread(msg_thread);
        self.stats.record_send();
        self.queue.offer(handle)
    }

    /// Enqueues a control write at the head of the queue, bypassing the
    /// permit pool, and returns the new queue size.
    ///
    /// Used for administrative traffic such as handshake bytes that must go
    /// out before any ordinary write already queued.
    pub fn send_priority(&self, handle: Arc<WriteHandle>) -> usize {
        // Marked as message-thread so no permit is released on dequeue.
        handle.set_message_thread(true);
        self.stats.record_priority_send();
        self.queue.offer_first(handle)
    }

    /// Dequeues the head write for transmission. Owning worker only.
    ///
    /// Releases the handle's permit when it held one, then records the
    /// handle with the outbound recovery descriptor. A `false` from
    /// `record` means the unacknowledged backlog is full: the session is
    /// closed so the reconnect path can retransmit, rather than letting the
    /// backlog grow without bound.
    pub fn poll_outbound(&self) -> Option<Arc<WriteHandle>> {
        let handle = self.queue.poll()?;
        self.stats.record_poll();

        if !handle.message_thread() {
            if let Some(pool) = &self.permits {
                pool.release();
            }
        }

        let out_recovery = self.out_recovery.read().unwrap().clone();
        if let Some(descriptor) = out_recovery {
            if !descriptor.record(Arc::clone(&handle)) {
                warn!(
                    session = %self.id,
                    remote = %self.remote_addr,
                    queue_limit = descriptor.capacity(),
                    "unacknowledged write backlog full, closing session to force reconnect"
                );
                self.close();
            }
        }

        Some(handle)
    }

    /// Removes a queued-but-never-transmitted write, searching from the
    /// tail. Only valid on a closed session, as part of unwinding its
    /// queue.
    pub fn remove_queued(&self, handle: &WriteHandle) -> bool {
        debug_assert!(
            self.is_closed(),
            "remove_queued is only valid on a closed session"
        );
        self.queue.remove_last_occurrence(handle)
    }

    /// Repopulates the queue after a reconnect with the recovery
    /// descriptor's retained handles, in their original send order.
    ///
    /// The queue must be empty and the session quiesced: no producer may
    /// race this call.
    pub fn resend(&self, handles: Vec<Arc<WriteHandle>>) -> Result<usize, SessionError> {
        let count = handles.len();
        match self.queue.refill(handles) {
            Some(size) => {
                debug!(session = %self.id, replayed = count, "write queue repopulated for resend");
                Ok(size)
            }
            None => Err(SessionError::ResendNonEmpty {
                queued: self.queue.len(),
            }),
        }
    }

    /// Number of writes queued and not yet dequeued for transmission.
    pub fn outstanding_count(&self) -> usize {
        self.queue.len()
    }

    // ── Worker affinity & migration ────────────────────────────────────

    /// The worker currently owning this session, or `None` mid-migration.
    pub fn current_worker(&self) -> Option<Arc<dyn Worker>> {
        match &self.affinity.lock().unwrap().owner {
            Owner::Assigned(worker) => Some(Arc::clone(worker)),
            Owner::Unassigned => None,
        }
    }

    /// Detaches the session from `expected`, reclaiming this session's
    /// operations already queued on it into the pending buffer.
    ///
    /// Returns `false` without side effects when `expected` is not the
    /// current owner: the caller's view is stale.
    pub fn begin_migration(&self, expected: &Arc<dyn Worker>) -> bool {
        let mut affinity = self.affinity.lock().unwrap();

        let current = match &affinity.owner {
            Owner::Assigned(worker) if same_worker(worker, expected) => Arc::clone(worker),
            _ => return false,
        };

        // Reclaim operations queued on the old owner so they are not run
        // against a soon-to-be-wrong context.
        let reclaimed = current.extract_session_ops(self.id);
        if !reclaimed.is_empty() {
            debug!(
                session = %self.id,
                worker = current.name(),
                reclaimed = reclaimed.len(),
                "reclaimed queued operations from departing worker"
            );
            affinity.pending.extend(reclaimed);
        }

        affinity.owner = Owner::Unassigned;
        true
    }

    /// Assigns `new_owner` and flushes the entire pending buffer to it as
    /// one ordered batch.
    ///
    /// Precondition: the session is unassigned (a prior `begin_migration`
    /// succeeded). Violating it is a programming error.
    pub fn complete_migration(&self, new_owner: Arc<dyn Worker>) {
        let mut affinity = self.affinity.lock().unwrap();

        if !matches!(affinity.owner, Owner::Unassigned) {
            debug_assert!(false, "complete_migration on a session that still has an owner");
            error!(
                session = %self.id,
                "complete_migration called while a worker is still assigned"
            );
            return;
        }

        let pending = std::mem::take(&mut affinity.pending);
        if !pending.is_empty() {
            new_owner.offer_batch(pending);
        }

        debug!(session = %self.id, worker = new_owner.name(), "migration complete");
        affinity.owner = Owner::Assigned(new_owner);
        self.stats.record_migration();
    }

    /// Forwards `op` to the current owner, or buffers it while unassigned.
    ///
    /// No operation is lost or reordered across a migration window: buffered
    /// operations reach the next owner, in arrival order, before anything
    /// forwarded after reassignment.
    pub fn enqueue_to_worker(&self, op: WorkerOp) {
        let mut affinity = self.affinity.lock().unwrap();
        match &affinity.owner {
            Owner::Assigned(worker) => worker.offer(op),
            Owner::Unassigned => affinity.pending.push(op),
        }
    }

    /// Delivers `op` to `expected` only if it is still the current owner.
    ///
    /// On failure the operation is handed back so the caller can re-resolve
    /// ownership and retry; a stale belief here is an expected race, not an
    /// error.
    pub fn try_handoff(&self, expected: &Arc<dyn Worker>, op: WorkerOp) -> Result<(), WorkerOp> {
        let affinity = self.affinity.lock().unwrap();
        match &affinity.owner {
            Owner::Assigned(worker) if same_worker(worker, expected) => {
                worker.offer(op);
                Ok(())
            }
            _ => Err(op),
        }
    }

    // ── Recovery tracking ──────────────────────────────────────────────

    /// Attaches the tracker for sent-but-unacknowledged writes. From this
    /// point every dequeued handle is recorded before being considered
    /// sent.
    pub fn attach_outbound_recovery(&self, descriptor: Arc<dyn RecoveryDescriptor>) {
        *self.out_recovery.write().unwrap() = Some(descriptor);
    }

    /// Tracker for sent-but-unacknowledged writes, if attached.
    pub fn outbound_recovery(&self) -> Option<Arc<dyn RecoveryDescriptor>> {
        self.out_recovery.read().unwrap().clone()
    }

    /// Attaches the tracker for received-but-unacknowledged traffic.
    ///
    /// Only the connection initiator may track inbound recovery; the first
    /// attach fires the descriptor's connection-established callback.
    pub fn attach_inbound_recovery(
        &self,
        descriptor: Arc<dyn RecoveryDescriptor>,
    ) -> Result<(), SessionError> {
        if self.accepted {
            return Err(SessionError::InboundRecoveryOnAccepted);
        }

        let mut slot = self.in_recovery.write().unwrap();
        if slot.is_none() {
            descriptor.on_connection_established();
        }
        *slot = Some(descriptor);
        Ok(())
    }

    /// Tracker for received-but-unacknowledged traffic, if attached.
    pub fn inbound_recovery(&self) -> Option<Arc<dyn RecoveryDescriptor>> {
        self.in_recovery.read().unwrap().clone()
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    /// `true` once the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the session: wakes every permit waiter, current and future,
    /// and detaches recovery tracking. Idempotent; returns `true` only for
    /// the call that performed the transition.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }

        if let Some(pool) = &self.permits {
            pool.close();
        }

        *self.in_recovery.write().unwrap() = None;
        *self.out_recovery.write().unwrap() = None;

        info!(
            session = %self.id,
            remote = %self.remote_addr,
            queued = self.queue.len(),
            "session closed"
        );
        true
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .field("accepted", &self.accepted)
            .field("queued", &self.queue.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backpressure::MessageScope;
    use crate::recovery::RetransmitBuffer;
    use crate::worker::{RunQueueWorker, SessionOp};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    fn session_on(worker: &Arc<RunQueueWorker>, limit: usize) -> Session {
        let worker: Arc<dyn Worker> = Arc::clone(worker) as Arc<dyn Worker>;
        Session::new(worker, addr(4000), addr(5000), true, limit)
    }

    fn initiated_session_on(worker: &Arc<RunQueueWorker>, limit: usize) -> Session {
        let worker: Arc<dyn Worker> = Arc::clone(worker) as Arc<dyn Worker>;
        Session::new(worker, addr(4000), addr(5000), false, limit)
    }

    fn handle(payload: &'static str) -> Arc<WriteHandle> {
        Arc::new(WriteHandle::new(payload))
    }

    #[test]
    fn test_send_poll_size_accounting() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = session_on(&worker, 0);

        for i in 0..5 {
            assert_eq!(session.send(handle("x")), i + 1);
        }
        for _ in 0..3 {
            assert!(session.poll_outbound().is_some());
        }

        // N sends minus M polls
        assert_eq!(session.outstanding_count(), 2);
    }

    #[test]
    fn test_priority_dequeued_first() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = session_on(&worker, 0);

        let h1 = handle("h1");
        let h2 = handle("h2");
        let h0 = handle("handshake");

        session.send(Arc::clone(&h1));
        session.send(Arc::clone(&h2));
        session.send_priority(Arc::clone(&h0));

        assert_eq!(session.poll_outbound().unwrap().id(), h0.id());
        assert_eq!(session.poll_outbound().unwrap().id(), h1.id());
        assert_eq!(session.poll_outbound().unwrap().id(), h2.id());
    }

    #[test]
    fn test_backpressure_blocks_until_poll() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = Arc::new(session_on(&worker, 2));

        session.send(handle("h1"));
        session.send(handle("h2"));

        let (tx, rx) = mpsc::channel();
        let session2 = Arc::clone(&session);
        let producer = thread::spawn(move || {
            session2.send(handle("h3"));
            tx.send(()).unwrap();
        });

        // Third send must be blocked on the permit pool
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        session.poll_outbound().unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
        producer.join().unwrap();

        assert_eq!(session.outstanding_count(), 2);
    }

    #[test]
    fn test_message_scope_bypasses_pool() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = session_on(&worker, 1);

        let _scope = MessageScope::enter();
        // Would deadlock against the pool bound without the exemption
        session.send(handle("reply1"));
        session.send(handle("reply2"));
        assert_eq!(session.outstanding_count(), 2);
        assert_eq!(session.available_permits(), Some(1));
    }

    #[test]
    fn test_priority_send_bypasses_pool() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = session_on(&worker, 1);

        session.send(handle("data"));
        assert_eq!(session.available_permits(), Some(0));

        session.send_priority(handle("handshake"));
        assert_eq!(session.outstanding_count(), 2);

        // Dequeuing the priority handle must not mint a permit
        session.poll_outbound().unwrap();
        assert_eq!(session.available_permits(), Some(0));

        // Dequeuing the ordinary handle returns its permit
        session.poll_outbound().unwrap();
        assert_eq!(session.available_permits(), Some(1));
    }

    #[test]
    fn test_migration_delivers_pending_in_order() {
        let worker_a = Arc::new(RunQueueWorker::new("worker-a"));
        let worker_b = Arc::new(RunQueueWorker::new("worker-b"));
        let session = session_on(&worker_a, 0);

        let a_dyn: Arc<dyn Worker> = Arc::clone(&worker_a) as Arc<dyn Worker>;
        assert!(session.begin_migration(&a_dyn));
        assert!(session.current_worker().is_none());

        session.enqueue_to_worker(WorkerOp::new(session.id(), SessionOp::PauseReads));
        session.enqueue_to_worker(WorkerOp::new(session.id(), SessionOp::RegisterWrite));

        session.complete_migration(Arc::clone(&worker_b) as Arc<dyn Worker>);

        // Exactly the buffered ops, in order, on the new owner only
        assert!(worker_a.is_empty());
        let ops: Vec<_> = worker_b.drain().into_iter().map(|o| o.op).collect();
        assert_eq!(ops, vec![SessionOp::PauseReads, SessionOp::RegisterWrite]);
        assert!(session.current_worker().is_some());
    }

    #[test]
    fn test_begin_migration_stale_owner_is_noop() {
        let worker_a = Arc::new(RunQueueWorker::new("worker-a"));
        let worker_b = Arc::new(RunQueueWorker::new("worker-b"));
        let session = session_on(&worker_a, 0);

        let b_dyn: Arc<dyn Worker> = Arc::clone(&worker_b) as Arc<dyn Worker>;
        assert!(!session.begin_migration(&b_dyn));
        assert!(session.current_worker().is_some());
    }

    #[test]
    fn test_migration_reclaims_queued_ops() {
        let worker_a = Arc::new(RunQueueWorker::new("worker-a"));
        let worker_b = Arc::new(RunQueueWorker::new("worker-b"));
        let session = session_on(&worker_a, 0);

        // Queued on the old owner before migration starts
        session.enqueue_to_worker(WorkerOp::new(session.id(), SessionOp::PauseReads));
        assert_eq!(worker_a.len(), 1);

        let a_dyn: Arc<dyn Worker> = Arc::clone(&worker_a) as Arc<dyn Worker>;
        assert!(session.begin_migration(&a_dyn));

        // Reclaimed: the old owner must not run it
        assert!(worker_a.is_empty());

        session.enqueue_to_worker(WorkerOp::new(session.id(), SessionOp::ResumeReads));
        session.complete_migration(Arc::clone(&worker_b) as Arc<dyn Worker>);

        let ops: Vec<_> = worker_b.drain().into_iter().map(|o| o.op).collect();
        assert_eq!(ops, vec![SessionOp::PauseReads, SessionOp::ResumeReads]);
    }

    #[test]
    fn test_try_handoff_stale_owner_returns_op() {
        let worker_a = Arc::new(RunQueueWorker::new("worker-a"));
        let worker_b = Arc::new(RunQueueWorker::new("worker-b"));
        let session = session_on(&worker_a, 0);

        let a_dyn: Arc<dyn Worker> = Arc::clone(&worker_a) as Arc<dyn Worker>;
        let b_dyn: Arc<dyn Worker> = Arc::clone(&worker_b) as Arc<dyn Worker>;

        let op = WorkerOp::new(session.id(), SessionOp::RegisterWrite);
        assert!(session.try_handoff(&a_dyn, op).is_ok());
        assert_eq!(worker_a.len(), 1);

        // Stale belief: op comes back for retry
        let op = WorkerOp::new(session.id(), SessionOp::Close);
        let returned = session.try_handoff(&b_dyn, op).unwrap_err();
        assert_eq!(returned.op, SessionOp::Close);
        assert!(worker_b.is_empty());
    }

    #[test]
    fn test_recovery_overflow_closes_session() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = session_on(&worker, 0);
        let recovery = Arc::new(RetransmitBuffer::new(3));
        session.attach_outbound_recovery(Arc::clone(&recovery) as Arc<dyn RecoveryDescriptor>);

        for _ in 0..4 {
            session.send(handle("x"));
        }

        // Three records succeed, the fourth overflows and closes
        for _ in 0..3 {
            session.poll_outbound().unwrap();
            assert!(!session.is_closed());
        }
        session.poll_outbound().unwrap();
        assert!(session.is_closed());
        assert_eq!(recovery.len(), 3);

        // Reconnect path: replay the retained set into the (now empty) queue
        let session2 = session_on(&worker, 0);
        assert_eq!(session2.resend(recovery.outstanding()).unwrap(), 3);
        assert_eq!(session2.outstanding_count(), 3);
    }

    #[test]
    fn test_resend_on_nonempty_queue_fails() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = session_on(&worker, 0);
        session.send(handle("resident"));

        let err = session.resend(vec![handle("replay")]).unwrap_err();
        assert!(matches!(err, SessionError::ResendNonEmpty { queued: 1 }));
    }

    #[test]
    fn test_inbound_recovery_rejected_on_accepted_session() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = session_on(&worker, 0);
        let recovery = Arc::new(RetransmitBuffer::new(8));

        let err = session
            .attach_inbound_recovery(recovery as Arc<dyn RecoveryDescriptor>)
            .unwrap_err();
        assert!(matches!(err, SessionError::InboundRecoveryOnAccepted));
    }

    #[test]
    fn test_inbound_attach_fires_established_once() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = initiated_session_on(&worker, 0);
        let recovery = Arc::new(RetransmitBuffer::new(8));

        session
            .attach_inbound_recovery(Arc::clone(&recovery) as Arc<dyn RecoveryDescriptor>)
            .unwrap();
        session
            .attach_inbound_recovery(Arc::clone(&recovery) as Arc<dyn RecoveryDescriptor>)
            .unwrap();

        assert_eq!(recovery.established_count(), 1);
    }

    #[test]
    fn test_close_releases_blocked_producers() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = Arc::new(session_on(&worker, 1));
        session.send(handle("h1"));

        let session2 = Arc::clone(&session);
        let producer = thread::spawn(move || {
            // Blocked on the exhausted pool until close invalidates it
            session2.send(handle("h2"));
        });

        thread::sleep(Duration::from_millis(50));
        assert!(session.close());
        producer.join().unwrap();
    }

    #[test]
    fn test_double_close_is_idempotent() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = session_on(&worker, 2);
        let recovery = Arc::new(RetransmitBuffer::new(8));
        session.attach_outbound_recovery(recovery as Arc<dyn RecoveryDescriptor>);

        assert!(session.close());
        assert!(!session.close());
        assert!(session.is_closed());
        assert!(session.outbound_recovery().is_none());
    }

    #[test]
    fn test_remove_queued_after_close() {
        let worker = Arc::new(RunQueueWorker::new("w0"));
        let session = session_on(&worker, 0);
        let stuck = handle("never-sent");
        session.send(Arc::clone(&stuck));
        session.close();

        assert!(session.remove_queued(&stuck));
        assert!(!session.remove_queued(&stuck));
        assert_eq!(session.outstanding_count(), 0);
    }
}

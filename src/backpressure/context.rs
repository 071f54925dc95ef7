//! Message-Thread Classification
//!
//! A per-thread marker that records whether the current thread is executing
//! inbound-message handling. The marker can only be set by holding a
//! [`MessageScope`] guard, so callers declare their context explicitly
//! instead of flipping an ambient flag by hand.
//!
//! Scopes nest: a handler that synchronously invokes another handler stays
//! classified until the outermost guard drops.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    /// Nesting depth of message scopes on this thread.
    static SCOPE_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// RAII guard marking the current thread as a message-processing thread.
///
/// While at least one guard is alive on a thread, [`in_message_scope`]
/// returns `true` and sends from that thread bypass the session's permit
/// pool.
///
/// # Example
///
/// ```
/// use wireflow::backpressure::{in_message_scope, MessageScope};
///
/// assert!(!in_message_scope());
/// {
///     let _scope = MessageScope::enter();
///     assert!(in_message_scope());
/// }
/// assert!(!in_message_scope());
/// ```
#[derive(Debug)]
pub struct MessageScope {
    // Not Send: the guard must drop on the thread that entered it.
    _not_send: PhantomData<*const ()>,
}

impl MessageScope {
    /// Enters a message scope on the current thread.
    pub fn enter() -> Self {
        SCOPE_DEPTH.with(|d| d.set(d.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for MessageScope {
    fn drop(&mut self) {
        SCOPE_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Returns `true` if the current thread is inside a message scope.
pub fn in_message_scope() -> bool {
    SCOPE_DEPTH.with(|d| d.get() > 0)
}

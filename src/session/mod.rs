//! Session Module
//!
//! The per-connection session: a write queue with flow control, read/write
//! staging buffers, worker affinity with a loss-free migration protocol,
//! and hooks for acknowledgement-based recovery tracking.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         Session                            │
//! │                                                            │
//! │  send ──┐                                                  │
//! │         ▼                                                  │
//! │  ┌────────────┐   ┌─────────────────┐   ┌───────────────┐  │
//! │  │ PermitPool │──>│   WriteQueue    │──>│ poll_outbound │  │
//! │  └────────────┘   │ (deque+counter) │   └───────┬───────┘  │
//! │                   └─────────────────┘           │          │
//! │  ┌──────────────────────┐             ┌─────────▼───────┐  │
//! │  │ affinity:            │             │ outbound        │  │
//! │  │  owner + pending ops │             │ recovery record │  │
//! │  └──────────────────────┘             └─────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod endpoint;
pub mod handle;
pub mod queue;

// Re-export commonly used types
pub use endpoint::{Session, SessionError, SessionStats};
pub use handle::WriteHandle;
pub use queue::WriteQueue;

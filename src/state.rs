//! Lifecycle states for a queue manager.
//!
//! A manager moves through `Disconnected → Connecting → Declared →
//! Ready` as the transport comes up and the queue declaration is
//! acknowledged. `Closed` is terminal and reachable from everywhere,
//! so teardown hooks can always fire.

/// Connection lifecycle of a single manager
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManagerState {
    /// No connection has been opened yet, or the transport dropped
    Disconnected,
    /// The AMQP connection and channel are being opened
    Connecting,
    /// The queue has been declared but confirms are not yet enabled
    Declared,
    /// The queue is declared and acknowledged; publishes go straight
    /// to the broker
    Ready,
    /// The manager was torn down. Terminal
    Closed,
}

impl ManagerState {
    /// True once the queue declaration has been acknowledged
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == ManagerState::Ready
    }

    /// True after `close_connection`
    #[must_use]
    pub fn is_closed(self) -> bool {
        self == ManagerState::Closed
    }

    /// Whether the machine may move from `self` to `next`.
    ///
    /// Failed connects and declares fall back to `Disconnected` so a
    /// later `connect` can retry. `Closed` only transitions to itself,
    /// which is what makes `close_connection` idempotent.
    pub(crate) fn may_advance(self, next: ManagerState) -> bool {
        use ManagerState::{Closed, Connecting, Declared, Disconnected, Ready};
        match (self, next) {
            (Closed, Closed) => true,
            (Closed, _) => false,
            (_, Closed) => true,
            (Disconnected, Connecting)
            | (Connecting, Declared)
            | (Declared, Ready)
            | (Connecting | Declared, Disconnected) => true,
            _ => false,
        }
    }
}

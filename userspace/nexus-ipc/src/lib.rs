// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Synchronous thread-addressed message rendezvous
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: Unit tests (host loopback, registry)
//!
//! PUBLIC API:
//!   - Rendezvous trait: a thread's own view of the transport (send / recv)
//!   - Pending trait: a received message that must be replied to exactly once
//!   - Addressable trait: handles that name a target thread
//!   - Wait enum: blocking behaviour of a receive
//!   - IpcError: transport error types
//!
//! DEPENDENCIES:
//!   - std::sync::mpsc + parking_lot: host loopback backend (`std` feature)
//!
//! A sender blocks in [`Rendezvous::send`] until the addressed thread receives the
//! message and replies with a single scalar. Ordering among concurrent senders is
//! owned by the backend; the loopback backend is FIFO per target.

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

use core::fmt;
use core::time::Duration;

/// Scalar exchanged as message payload, reply value and delegated-call parameter.
pub type Msg = isize;

/// Normal message exit code.
pub const MSG_OK: Msg = 0;
/// Returned when a bounded wait elapsed without a message.
pub const MSG_TIMEOUT: Msg = -1;
/// Returned when an exchange was reset or could not be carried out.
pub const MSG_RESET: Msg = -2;

/// Result type returned by IPC operations.
pub type Result<T> = core::result::Result<T, IpcError>;

/// Behaviour of a blocking call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Block until the operation completes.
    Blocking,
    /// Return immediately if no progress can be made.
    NonBlocking,
    /// Block until either the operation completes or the timeout expires.
    Timeout(Duration),
}

impl Wait {
    /// Returns `true` when the caller requested a non-blocking attempt.
    ///
    /// A zero timeout counts as non-blocking.
    pub const fn is_non_blocking(self) -> bool {
        match self {
            Self::NonBlocking => true,
            Self::Timeout(duration) => duration.is_zero(),
            Self::Blocking => false,
        }
    }

    /// Converts a [`Wait::Timeout`] variant into its [`Duration`].
    pub const fn timeout(self) -> Option<Duration> {
        match self {
            Self::Timeout(duration) => Some(duration),
            Self::Blocking | Self::NonBlocking => None,
        }
    }
}

/// Opaque identity of a thread reachable through the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(u32);

impl ThreadId {
    /// Wraps a raw identifier.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

/// Errors produced by the IPC runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IpcError {
    /// Operation could not progress without blocking.
    #[error("operation would block")]
    WouldBlock,
    /// The caller exceeded the requested timeout.
    #[error("operation timed out")]
    Timeout,
    /// The opposite endpoint disconnected.
    #[error("peer disconnected")]
    Disconnected,
}

/// Handle naming a thread that can be the target of [`Rendezvous::send`].
pub trait Addressable {
    /// Identity of the addressed thread.
    fn thread_id(&self) -> ThreadId;
}

/// A received message awaiting its reply.
///
/// Replying consumes the value, so a message can be answered at most once. Dropping it
/// unanswered releases the sender with [`IpcError::Disconnected`].
pub trait Pending {
    /// Payload carried by the message.
    type Payload;

    /// Identity of the thread blocked on this message.
    fn sender(&self) -> ThreadId;

    /// Borrows the payload for the duration of the exchange.
    fn payload(&self) -> &Self::Payload;

    /// Releases the sender with `reply`.
    fn reply(self, reply: Msg) -> Result<()>;
}

/// A thread's own view of the rendezvous transport.
pub trait Rendezvous {
    /// Payload type accepted by this transport.
    type Payload: Send;
    /// Handle type used to address other threads.
    type Target: Addressable;
    /// Received message type.
    type Pending: Pending<Payload = Self::Payload>;

    /// Identity of the thread owning this view.
    fn thread_id(&self) -> ThreadId;

    /// Sends `payload` to `target` and blocks until the target replies.
    fn send(&self, target: &Self::Target, payload: Self::Payload) -> Result<Msg>;

    /// Waits for the next message addressed to this thread.
    ///
    /// Returns [`IpcError::Timeout`] when a bounded wait elapses and
    /// [`IpcError::WouldBlock`] when a non-blocking attempt finds nothing queued.
    fn recv(&self, wait: Wait) -> Result<Self::Pending>;
}

#[cfg(feature = "std")]
mod host;
#[cfg(feature = "std")]
pub use host::{loopback_port, LoopbackPending, LoopbackPort, ThreadRef};

#[cfg(feature = "std")]
mod registry;
#[cfg(feature = "std")]
pub use registry::{RegistryError, ThreadRegistry};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_is_a_poll() {
        assert!(Wait::NonBlocking.is_non_blocking());
        assert!(Wait::Timeout(Duration::ZERO).is_non_blocking());
        assert!(!Wait::Timeout(Duration::from_millis(1)).is_non_blocking());
        assert!(!Wait::Blocking.is_non_blocking());
    }

    #[test]
    fn only_timeout_carries_a_duration() {
        assert_eq!(Wait::Timeout(Duration::from_secs(2)).timeout(), Some(Duration::from_secs(2)));
        assert_eq!(Wait::Blocking.timeout(), None);
        assert_eq!(Wait::NonBlocking.timeout(), None);
    }
}

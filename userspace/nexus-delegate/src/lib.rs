// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Synchronous cross-thread call delegation
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: Unit tests per module, integration tests (tests/), criterion bench
//!
//! PUBLIC API:
//!   - call_veneer(), call_direct0() .. call_direct4(): Run a function on another thread
//!   - dispatch(), dispatch_timeout(): Service one delegated call on the current thread
//!   - DelegateServer: Service loop with stop predicate and counters
//!   - CallArgs / CallRecord / Callee / Veneer: Call marshaling
//!   - DelegateConfig: Tick rate and default dispatch wait (TOML)
//!
//! DEPENDENCIES:
//!   - nexus-ipc: Thread-addressed send / receive / reply rendezvous
//!   - serde + toml: Configuration loading
//!   - log: Diagnostics
//!
//! A requesting thread packs a function of up to four scalars into a [`CallRecord`] and
//! sends it to a target thread, blocking until the reply. The target runs the record's
//! veneer from inside [`dispatch`], so the function executes with the target's stack and
//! ownership, and the scalar it returns travels back as the reply.
//!
//! ```no_run
//! use nexus_delegate::{call_direct2, dispatch, DelegateRegistry, Wait};
//!
//! fn add(a: isize, b: isize) -> isize {
//!     a + b
//! }
//!
//! let registry = DelegateRegistry::new();
//! let (driver, _handle) = registry
//!     .spawn("driver", |port| loop {
//!         if dispatch(&port, Wait::Blocking).is_err() {
//!             break;
//!         }
//!     })
//!     .unwrap();
//! let me = registry.register("app").unwrap();
//! assert_eq!(call_direct2(&me, &driver, add, 3, 4).unwrap(), 7);
//! ```
//!
//! A thread must never delegate to itself, and a target that stops dispatching leaves its
//! requesters blocked. Neither condition is detected.

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

#[cfg(not(feature = "messages"))]
compile_error!("nexus-delegate requires the `messages` feature (synchronous message transport)");

mod call;
mod config;
mod dispatch;
mod record;
mod server;
mod veneer;

use thiserror::Error;

pub use nexus_ipc::{IpcError, Msg, ThreadId, Wait, MSG_OK, MSG_RESET, MSG_TIMEOUT};

pub use call::{call_direct0, call_direct1, call_direct2, call_direct3, call_direct4, call_veneer};
pub use config::{ConfigError, DelegateConfig, DEFAULT_TICK_HZ};
pub use dispatch::{dispatch, dispatch_timeout, Dispatch};
pub use record::{
    CallArgs, CallRecord, Callee, DelegateFn0, DelegateFn1, DelegateFn2, DelegateFn3,
    DelegateFn4, ParamCursor, MAX_PARAMS,
};
pub use server::{DelegateServer, StatsSnapshot};
pub use veneer::{veneer0, veneer1, veneer2, veneer3, veneer4, Veneer, BUILTIN as BUILTIN_VENEERS};

/// Result alias used by delegation entry points.
pub type Result<T> = core::result::Result<T, DelegateError>;

/// Failures surfaced by delegated calls and dispatch.
///
/// Timeouts on the servicing side are not errors; see [`Dispatch::TimedOut`].
#[derive(Debug, Error)]
pub enum DelegateError {
    /// The rendezvous failed: target gone, or the exchange ended without a reply.
    #[error("transport error: {0}")]
    Transport(#[from] IpcError),
}

/// Servicing or requesting port on the host loopback transport.
pub type DelegatePort = nexus_ipc::LoopbackPort<CallRecord>;
/// Handle addressing a thread on the host loopback transport.
pub type DelegateTarget = nexus_ipc::ThreadRef<CallRecord>;
/// Registry of named threads on the host loopback transport.
pub type DelegateRegistry = nexus_ipc::ThreadRegistry<CallRecord>;

// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Servicing-side dispatch primitive
//! OWNERS: @runtime
//! STATUS: Functional
//! TEST_COVERAGE: Unit tests (mock rendezvous), integration tests (loopback)
//!
//! A thread becomes a delegation target by calling [`dispatch`] repeatedly. Each call
//! services at most one request: it receives the record, runs its veneer on the current
//! thread and replies with the result before returning. Which pending requester goes
//! first is decided by the transport.

use log::{debug, warn};
use nexus_ipc::{
    IpcError, Msg, Pending, Rendezvous, ThreadId, Wait, MSG_OK, MSG_RESET, MSG_TIMEOUT,
};

use crate::config::DelegateConfig;
use crate::record::CallRecord;
use crate::Result;

/// Outcome of a single [`dispatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// A request was received, executed and replied to.
    Serviced {
        /// Thread that was released by the reply.
        requester: ThreadId,
        /// Scalar returned by the callee and handed back to the requester.
        result: Msg,
    },
    /// A request was executed but its reply could not be delivered.
    Unanswered {
        /// Thread the reply was addressed to.
        requester: ThreadId,
        /// Scalar returned by the callee.
        result: Msg,
        /// Why the reply was not delivered.
        error: IpcError,
    },
    /// The wait ended without a request.
    TimedOut,
}

impl Dispatch {
    /// Returns `true` when a request was serviced.
    pub const fn is_serviced(&self) -> bool {
        matches!(self, Self::Serviced { .. })
    }

    /// Kernel message status: [`MSG_OK`] if serviced, [`MSG_RESET`] if the reply was
    /// lost, [`MSG_TIMEOUT`] if nothing arrived.
    pub const fn as_msg(&self) -> Msg {
        match self {
            Self::Serviced { .. } => MSG_OK,
            Self::Unanswered { .. } => MSG_RESET,
            Self::TimedOut => MSG_TIMEOUT,
        }
    }
}

/// Waits up to `wait` for one delegated call and services it on the current thread.
///
/// `Wait::NonBlocking` and a zero `Wait::Timeout` poll once. A timeout has no side
/// effects. A reply the transport refuses is reported as [`Dispatch::Unanswered`]; the
/// callee has run in that case. Errors are receive failures of the transport.
pub fn dispatch<R>(port: &R, wait: Wait) -> Result<Dispatch>
where
    R: Rendezvous<Payload = CallRecord>,
{
    let pending = match port.recv(wait) {
        Ok(pending) => pending,
        Err(IpcError::Timeout | IpcError::WouldBlock) => return Ok(Dispatch::TimedOut),
        Err(err) => return Err(err.into()),
    };
    let requester = pending.sender();
    let result = pending.payload().invoke();
    let me = port.thread_id();
    if let Err(error) = pending.reply(result) {
        warn!("delegate: {me} could not reply to {requester}: {error}");
        return Ok(Dispatch::Unanswered { requester, result, error });
    }
    debug!("delegate: {me} serviced {requester} result={result}");
    Ok(Dispatch::Serviced { requester, result })
}

/// [`dispatch`] with the wait configured in `config`.
pub fn dispatch_timeout<R>(port: &R, config: &DelegateConfig) -> Result<Dispatch>
where
    R: Rendezvous<Payload = CallRecord>,
{
    dispatch(port, config.dispatch_wait())
}

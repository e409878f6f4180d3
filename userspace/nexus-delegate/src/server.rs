// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Ready-made service loop around the dispatch primitive
//! OWNERS: @runtime
//!
//! PUBLIC API:
//!   - DelegateServer::new(port, wait) / from_config(port, config)
//!   - DelegateServer::serve_one(): One dispatch with counters updated
//!   - DelegateServer::run(keep_running): Dispatch until the predicate says stop
//!   - DelegateServer::stats(): Serviced / unanswered / timed-out counters
//!
//! The stop predicate is checked after every outcome, timeouts included, so a finite
//! wait bounds how long `run` takes to notice a stop request. A reply the transport
//! refuses only affects its own requester; the loop keeps servicing.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{error, info};
use nexus_ipc::{Rendezvous, Wait};

use crate::config::DelegateConfig;
use crate::dispatch::{dispatch, Dispatch};
use crate::record::CallRecord;
use crate::Result;

/// Counters reported by [`DelegateServer::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Requests executed and replied to.
    pub serviced: u64,
    /// Requests executed whose reply could not be delivered.
    pub unanswered: u64,
    /// Dispatches that ended without a request.
    pub timeouts: u64,
}

/// Servicing thread state: the port it receives on and the wait used per dispatch.
pub struct DelegateServer<R> {
    port: R,
    wait: Wait,
    serviced: AtomicU64,
    unanswered: AtomicU64,
    timeouts: AtomicU64,
}

impl<R> DelegateServer<R>
where
    R: Rendezvous<Payload = CallRecord>,
{
    /// Services `port`, waiting `wait` per dispatch.
    pub fn new(port: R, wait: Wait) -> Self {
        Self {
            port,
            wait,
            serviced: AtomicU64::new(0),
            unanswered: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    /// Services `port` with the wait configured in `config`.
    pub fn from_config(port: R, config: &DelegateConfig) -> Self {
        Self::new(port, config.dispatch_wait())
    }

    /// Wait applied to each dispatch.
    pub fn wait(&self) -> Wait {
        self.wait
    }

    /// Dispatches once and records the outcome.
    pub fn serve_one(&self) -> Result<Dispatch> {
        let outcome = dispatch(&self.port, self.wait)?;
        let counter = match outcome {
            Dispatch::Serviced { .. } => &self.serviced,
            Dispatch::Unanswered { .. } => &self.unanswered,
            Dispatch::TimedOut => &self.timeouts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(outcome)
    }

    /// Dispatches until `keep_running` returns `false` or receiving fails.
    pub fn run<F>(&self, mut keep_running: F) -> Result<StatsSnapshot>
    where
        F: FnMut() -> bool,
    {
        let me = self.port.thread_id();
        info!("delegate: {me} ready ({:?})", self.wait);
        loop {
            if let Err(err) = self.serve_one() {
                error!("delegate: {me} stopped on transport error: {err}");
                return Err(err);
            }
            if !keep_running() {
                break;
            }
        }
        let stats = self.stats();
        info!(
            "delegate: {me} stopped serviced={} unanswered={} timeouts={}",
            stats.serviced, stats.unanswered, stats.timeouts
        );
        Ok(stats)
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            serviced: self.serviced.load(Ordering::Relaxed),
            unanswered: self.unanswered.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

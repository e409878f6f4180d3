// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Named thread registry for the loopback rendezvous.
//!
//! Stands in for the scheduler's thread table on host builds: it assigns
//! [`ThreadId`]s, hands each registered thread its [`LoopbackPort`], and lets
//! other threads resolve a [`ThreadRef`] by name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::{self, JoinHandle};

use log::debug;
use parking_lot::Mutex;

use crate::{loopback_port, LoopbackPort, ThreadId, ThreadRef};

/// Errors produced by the thread registry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A thread with the provided name already exists.
    #[error("thread already registered")]
    Duplicate,
    /// The requested thread does not exist.
    #[error("thread not found")]
    NotFound,
    /// The OS refused to start the thread.
    #[error("failed to spawn thread: {0}")]
    Spawn(String),
}

/// Registry of threads reachable through the loopback rendezvous.
pub struct ThreadRegistry<P> {
    threads: Mutex<HashMap<String, ThreadRef<P>>>,
    next_id: AtomicU32,
}

impl<P> Default for ThreadRegistry<P> {
    fn default() -> Self {
        Self { threads: Mutex::new(HashMap::new()), next_id: AtomicU32::new(1) }
    }
}

impl<P> ThreadRegistry<P> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` and returns the port the named thread receives on.
    pub fn register(&self, name: &str) -> Result<LoopbackPort<P>, RegistryError> {
        let mut threads = self.threads.lock();
        if threads.contains_key(name) {
            return Err(RegistryError::Duplicate);
        }
        let id = ThreadId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let port = loopback_port(id, name);
        threads.insert(name.to_string(), port.thread_ref());
        debug!("registry: {name} registered as {id}");
        Ok(port)
    }

    /// Resolves the handle addressing the thread `name`.
    pub fn resolve(&self, name: &str) -> Result<ThreadRef<P>, RegistryError> {
        self.threads.lock().get(name).cloned().ok_or(RegistryError::NotFound)
    }

    /// Forgets `name`. Handles resolved earlier stay valid for as long as the port lives.
    pub fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        self.threads.lock().remove(name).map(|_| ()).ok_or(RegistryError::NotFound)
    }

    /// Number of registered threads.
    pub fn len(&self) -> usize {
        self.threads.lock().len()
    }

    /// Returns `true` when no thread is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P: Send + 'static> ThreadRegistry<P> {
    /// Registers `name` and runs `body` on a new OS thread of the same name, handing it
    /// the registered port.
    pub fn spawn<F, R>(
        &self,
        name: &str,
        body: F,
    ) -> Result<(ThreadRef<P>, JoinHandle<R>), RegistryError>
    where
        F: FnOnce(LoopbackPort<P>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let port = self.register(name)?;
        let target = port.thread_ref();
        match thread::Builder::new().name(name.to_string()).spawn(move || body(port)) {
            Ok(handle) => Ok((target, handle)),
            Err(err) => {
                let _ = self.unregister(name);
                Err(RegistryError::Spawn(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Addressable, Pending, Rendezvous, Wait};
    use proptest::prelude::*;

    #[test]
    fn register_and_resolve_roundtrip() {
        let registry: ThreadRegistry<u8> = ThreadRegistry::new();
        let port = registry.register("driver").expect("register succeeds");
        let resolved = registry.resolve("driver").expect("resolve succeeds");
        assert_eq!(resolved.thread_id(), port.thread_id());
        assert_eq!(resolved.name(), "driver");
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry: ThreadRegistry<u8> = ThreadRegistry::new();
        let _port = registry.register("driver").expect("initial register");
        let err = registry.register("driver").expect_err("duplicate rejected");
        assert_eq!(err, RegistryError::Duplicate);
    }

    #[test]
    fn unknown_thread_not_found() {
        let registry: ThreadRegistry<u8> = ThreadRegistry::new();
        assert_eq!(registry.resolve("nobody").unwrap_err(), RegistryError::NotFound);
        assert_eq!(registry.unregister("nobody").unwrap_err(), RegistryError::NotFound);
    }

    #[test]
    fn spawned_thread_serves_its_port() {
        let registry: ThreadRegistry<u8> = ThreadRegistry::new();
        let (target, handle) = registry
            .spawn("echo", |port| {
                let pending = port.recv(Wait::Blocking).expect("message");
                let name = std::thread::current().name().map(str::to_owned);
                let value = *pending.payload();
                pending.reply(value as isize * 2).expect("reply");
                name
            })
            .expect("spawn");

        let client = registry.register("client").expect("client port");
        assert_eq!(client.send(&target, 21), Ok(42));
        assert_eq!(handle.join().unwrap().as_deref(), Some("echo"));
    }

    proptest! {
        #[test]
        fn ids_are_unique(names in proptest::collection::hash_set("[a-z]{1,8}", 1..12)) {
            let registry: ThreadRegistry<u8> = ThreadRegistry::new();
            let mut ids = std::collections::HashSet::new();
            for name in &names {
                let port = registry.register(name).unwrap();
                prop_assert!(ids.insert(port.thread_id()));
            }
            prop_assert_eq!(registry.len(), names.len());
        }
    }
}

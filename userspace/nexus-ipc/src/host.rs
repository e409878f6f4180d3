// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: In-process rendezvous emulation for host-based testing
//!
//! OWNERS: @runtime
//!
//! PUBLIC API:
//!   - loopback_port(): Create a port (identity + inbox) for one thread
//!   - struct LoopbackPort: Rendezvous implementation owned by the receiving thread
//!   - struct ThreadRef: Cloneable handle addressing a port's thread
//!   - struct LoopbackPending: Received message holding the sender's reply slot
//!
//! INVARIANTS:
//!   - Every send carries its own one-shot reply slot; replies cannot cross senders
//!   - A port keeps a handle to itself, so its inbox never reports disconnection while alive
//!   - Inbox order is FIFO
//!
//! ERROR CONDITIONS:
//!   - IpcError::Disconnected: target port dropped, or message dropped without reply
//!   - IpcError::WouldBlock: non-blocking receive found nothing queued
//!   - IpcError::Timeout: bounded receive elapsed
//!
//! DEPENDENCIES:
//!   - std::sync::mpsc: Channel-based communication
//!   - parking_lot::Mutex: Serialises receives on one inbox

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Addressable, IpcError, Msg, Pending, Rendezvous, Result, ThreadId, Wait};

struct Envelope<P> {
    sender: ThreadId,
    payload: P,
    reply_tx: SyncSender<Msg>,
}

/// Creates the port for the thread identified by `id`.
pub fn loopback_port<P>(id: ThreadId, name: &str) -> LoopbackPort<P> {
    let (inbox_tx, inbox_rx) = mpsc::channel::<Envelope<P>>();
    let this = ThreadRef { id, name: Arc::from(name), inbox_tx };
    LoopbackPort { this, inbox_rx: Mutex::new(inbox_rx) }
}

/// Handle addressing the thread that owns a [`LoopbackPort`].
pub struct ThreadRef<P> {
    id: ThreadId,
    name: Arc<str>,
    inbox_tx: Sender<Envelope<P>>,
}

impl<P> ThreadRef<P> {
    /// Human readable name of the addressed thread.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<P> Clone for ThreadRef<P> {
    fn clone(&self) -> Self {
        Self { id: self.id, name: Arc::clone(&self.name), inbox_tx: self.inbox_tx.clone() }
    }
}

impl<P> Addressable for ThreadRef<P> {
    fn thread_id(&self) -> ThreadId {
        self.id
    }
}

impl<P> fmt::Debug for ThreadRef<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadRef").field("id", &self.id).field("name", &self.name).finish()
    }
}

/// Rendezvous endpoint owned by a single thread.
pub struct LoopbackPort<P> {
    this: ThreadRef<P>,
    inbox_rx: Mutex<Receiver<Envelope<P>>>,
}

impl<P> LoopbackPort<P> {
    /// Returns a handle other threads can use to address this port.
    pub fn thread_ref(&self) -> ThreadRef<P> {
        self.this.clone()
    }

    /// Human readable name of the owning thread.
    pub fn name(&self) -> &str {
        self.this.name()
    }
}

impl<P> fmt::Debug for LoopbackPort<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackPort").field("this", &self.this).finish_non_exhaustive()
    }
}

impl<P: Send> Rendezvous for LoopbackPort<P> {
    type Payload = P;
    type Target = ThreadRef<P>;
    type Pending = LoopbackPending<P>;

    fn thread_id(&self) -> ThreadId {
        self.this.id
    }

    fn send(&self, target: &ThreadRef<P>, payload: P) -> Result<Msg> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        target
            .inbox_tx
            .send(Envelope { sender: self.this.id, payload, reply_tx })
            .map_err(|_| IpcError::Disconnected)?;
        reply_rx.recv().map_err(|_| IpcError::Disconnected)
    }

    fn recv(&self, wait: Wait) -> Result<LoopbackPending<P>> {
        let receiver = self.inbox_rx.lock();
        let envelope = if wait.is_non_blocking() {
            try_recv(&receiver)?
        } else if let Some(timeout) = wait.timeout() {
            receiver.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => IpcError::Timeout,
                RecvTimeoutError::Disconnected => IpcError::Disconnected,
            })?
        } else {
            receiver.recv().map_err(|_| IpcError::Disconnected)?
        };
        Ok(LoopbackPending { envelope })
    }
}

fn try_recv<P>(receiver: &Receiver<Envelope<P>>) -> Result<Envelope<P>> {
    receiver.try_recv().map_err(|err| match err {
        TryRecvError::Empty => IpcError::WouldBlock,
        TryRecvError::Disconnected => IpcError::Disconnected,
    })
}

/// Message received on a [`LoopbackPort`].
pub struct LoopbackPending<P> {
    envelope: Envelope<P>,
}

impl<P> Pending for LoopbackPending<P> {
    type Payload = P;

    fn sender(&self) -> ThreadId {
        self.envelope.sender
    }

    fn payload(&self) -> &P {
        &self.envelope.payload
    }

    fn reply(self, reply: Msg) -> Result<()> {
        self.envelope.reply_tx.send(reply).map_err(|_| IpcError::Disconnected)
    }
}

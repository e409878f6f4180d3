// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Requester-side entry points for delegated calls
//! OWNERS: @runtime
//!
//! PUBLIC API:
//!   - call_veneer(): Generic form, caller supplies the unpacking veneer
//!   - call_direct0() .. call_direct4(): Typed forms using the built-in veneers
//!
//! PRECONDITIONS:
//!   - `target` is live and eventually calls [`crate::dispatch`]; otherwise the caller
//!     blocks for as long as the transport keeps the exchange open
//!   - `target` is not the calling thread; a self-targeted call never completes
//!
//! ERROR CONDITIONS:
//!   - DelegateError::Transport: target endpoint gone, or request dropped without reply

use log::{trace, warn};
use nexus_ipc::{Addressable, Msg, Rendezvous};

use crate::record::{
    CallArgs, CallRecord, DelegateFn0, DelegateFn1, DelegateFn2, DelegateFn3, DelegateFn4,
};
use crate::veneer::Veneer;
use crate::Result;

/// Asks `target` to run `veneer` over `args` and blocks until it replies.
///
/// The record lives on the caller's stack and is moved into the transport for the
/// duration of the exchange. The returned scalar is whatever the veneer returned on
/// the servicing thread.
pub fn call_veneer<R>(port: &R, target: &R::Target, veneer: Veneer, args: CallArgs) -> Result<Msg>
where
    R: Rendezvous<Payload = CallRecord>,
{
    let me = port.thread_id();
    let to = target.thread_id();
    if cfg!(debug_assertions) && me == to {
        warn!("delegate: {me} is delegating to itself and will never be serviced");
    }
    trace!("delegate: {me} -> {to} arity={} params={}", args.arity(), args.param_count());
    let result = port.send(target, CallRecord::new(veneer, args))?;
    trace!("delegate: {me} <- {to} result={result}");
    Ok(result)
}

fn call_direct<R>(port: &R, target: &R::Target, args: CallArgs) -> Result<Msg>
where
    R: Rendezvous<Payload = CallRecord>,
{
    call_veneer(port, target, args.callee().veneer(), args)
}

/// Runs `func()` on `target`.
pub fn call_direct0<R>(port: &R, target: &R::Target, func: DelegateFn0) -> Result<Msg>
where
    R: Rendezvous<Payload = CallRecord>,
{
    call_direct(port, target, CallArgs::fn0(func))
}

/// Runs `func(p1)` on `target`.
pub fn call_direct1<R>(port: &R, target: &R::Target, func: DelegateFn1, p1: Msg) -> Result<Msg>
where
    R: Rendezvous<Payload = CallRecord>,
{
    call_direct(port, target, CallArgs::fn1(func, p1))
}

/// Runs `func(p1, p2)` on `target`.
pub fn call_direct2<R>(
    port: &R,
    target: &R::Target,
    func: DelegateFn2,
    p1: Msg,
    p2: Msg,
) -> Result<Msg>
where
    R: Rendezvous<Payload = CallRecord>,
{
    call_direct(port, target, CallArgs::fn2(func, p1, p2))
}

/// Runs `func(p1, p2, p3)` on `target`.
pub fn call_direct3<R>(
    port: &R,
    target: &R::Target,
    func: DelegateFn3,
    p1: Msg,
    p2: Msg,
    p3: Msg,
) -> Result<Msg>
where
    R: Rendezvous<Payload = CallRecord>,
{
    call_direct(port, target, CallArgs::fn3(func, p1, p2, p3))
}

/// Runs `func(p1, p2, p3, p4)` on `target`.
pub fn call_direct4<R>(
    port: &R,
    target: &R::Target,
    func: DelegateFn4,
    p1: Msg,
    p2: Msg,
    p3: Msg,
    p4: Msg,
) -> Result<Msg>
where
    R: Rendezvous<Payload = CallRecord>,
{
    call_direct(port, target, CallArgs::fn4(func, p1, p2, p3, p4))
}

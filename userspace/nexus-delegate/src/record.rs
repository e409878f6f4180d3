// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Call-record marshaling for delegated calls
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: Unit tests
//!
//! A call is packed into a fixed-size, `Copy` record on the caller's stack: the callee,
//! tagged with its arity, and up to [`MAX_PARAMS`] scalars in call order. The record is
//! moved into the transport for the duration of the call and read by the servicing
//! thread's veneer. Nothing here allocates.

use core::fmt;

use nexus_ipc::Msg;

use crate::veneer::{self, Veneer};

/// Largest number of scalar parameters a delegated call can carry.
pub const MAX_PARAMS: usize = 4;

/// Delegate function with no parameters.
pub type DelegateFn0 = fn() -> Msg;
/// Delegate function with one parameter.
pub type DelegateFn1 = fn(Msg) -> Msg;
/// Delegate function with two parameters.
pub type DelegateFn2 = fn(Msg, Msg) -> Msg;
/// Delegate function with three parameters.
pub type DelegateFn3 = fn(Msg, Msg, Msg) -> Msg;
/// Delegate function with four parameters.
pub type DelegateFn4 = fn(Msg, Msg, Msg, Msg) -> Msg;

/// Function to run on the servicing thread, tagged with its arity.
#[derive(Clone, Copy, Debug)]
pub enum Callee {
    /// `fn() -> Msg`
    Fn0(DelegateFn0),
    /// `fn(Msg) -> Msg`
    Fn1(DelegateFn1),
    /// `fn(Msg, Msg) -> Msg`
    Fn2(DelegateFn2),
    /// `fn(Msg, Msg, Msg) -> Msg`
    Fn3(DelegateFn3),
    /// `fn(Msg, Msg, Msg, Msg) -> Msg`
    Fn4(DelegateFn4),
}

impl Callee {
    /// Number of scalar parameters the callee takes.
    pub const fn arity(&self) -> usize {
        match self {
            Self::Fn0(_) => 0,
            Self::Fn1(_) => 1,
            Self::Fn2(_) => 2,
            Self::Fn3(_) => 3,
            Self::Fn4(_) => 4,
        }
    }

    /// Built-in veneer matching the callee's arity.
    pub fn veneer(&self) -> Veneer {
        veneer::BUILTIN[self.arity()]
    }
}

/// Variable part of a call record: the callee and its packed parameters.
#[derive(Clone, Copy)]
pub struct CallArgs {
    callee: Callee,
    params: [Msg; MAX_PARAMS],
    count: u8,
}

impl CallArgs {
    /// Packs a call with no parameters.
    pub const fn fn0(func: DelegateFn0) -> Self {
        Self { callee: Callee::Fn0(func), params: [0; MAX_PARAMS], count: 0 }
    }

    /// Packs a call with one parameter.
    pub const fn fn1(func: DelegateFn1, p1: Msg) -> Self {
        Self { callee: Callee::Fn1(func), params: [p1, 0, 0, 0], count: 1 }
    }

    /// Packs a call with two parameters.
    pub const fn fn2(func: DelegateFn2, p1: Msg, p2: Msg) -> Self {
        Self { callee: Callee::Fn2(func), params: [p1, p2, 0, 0], count: 2 }
    }

    /// Packs a call with three parameters.
    pub const fn fn3(func: DelegateFn3, p1: Msg, p2: Msg, p3: Msg) -> Self {
        Self { callee: Callee::Fn3(func), params: [p1, p2, p3, 0], count: 3 }
    }

    /// Packs a call with four parameters.
    pub const fn fn4(func: DelegateFn4, p1: Msg, p2: Msg, p3: Msg, p4: Msg) -> Self {
        Self { callee: Callee::Fn4(func), params: [p1, p2, p3, p4], count: 4 }
    }

    /// Packs `params` alongside `callee` without checking them against its arity.
    ///
    /// Intended for custom veneers that interpret the parameter list themselves.
    /// Returns `None` when more than [`MAX_PARAMS`] parameters are supplied.
    pub fn with_params(callee: Callee, params: &[Msg]) -> Option<Self> {
        if params.len() > MAX_PARAMS {
            return None;
        }
        let mut slots = [0; MAX_PARAMS];
        slots[..params.len()].copy_from_slice(params);
        Some(Self { callee, params: slots, count: params.len() as u8 })
    }

    /// The packed callee.
    pub const fn callee(&self) -> Callee {
        self.callee
    }

    /// Arity declared by the callee.
    pub const fn arity(&self) -> usize {
        self.callee.arity()
    }

    /// Number of packed parameters.
    pub const fn param_count(&self) -> usize {
        self.count as usize
    }

    /// Packed parameters in call order.
    pub fn params(&self) -> &[Msg] {
        &self.params[..self.param_count()]
    }

    /// Cursor yielding the packed parameters one by one, in call order.
    pub fn cursor(&self) -> ParamCursor<'_> {
        ParamCursor { params: self.params(), next: 0 }
    }
}

impl fmt::Debug for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallArgs")
            .field("arity", &self.arity())
            .field("params", &self.params())
            .finish()
    }
}

/// Sequential reader over a record's parameters.
#[derive(Clone, Debug)]
pub struct ParamCursor<'a> {
    params: &'a [Msg],
    next: usize,
}

impl ParamCursor<'_> {
    /// Parameters not yet consumed.
    pub fn remaining(&self) -> usize {
        self.params.len() - self.next
    }
}

impl Iterator for ParamCursor<'_> {
    type Item = Msg;

    fn next(&mut self) -> Option<Msg> {
        let value = self.params.get(self.next).copied()?;
        self.next += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl ExactSizeIterator for ParamCursor<'_> {}

/// Transport payload of a delegated call: the veneer to run and the arguments it unpacks.
#[derive(Clone, Copy)]
pub struct CallRecord {
    veneer: Veneer,
    args: CallArgs,
}

impl CallRecord {
    /// Couples `args` with the veneer that will unpack them.
    pub const fn new(veneer: Veneer, args: CallArgs) -> Self {
        Self { veneer, args }
    }

    /// Couples `args` with the built-in veneer matching the callee's arity.
    pub fn direct(args: CallArgs) -> Self {
        Self::new(args.callee().veneer(), args)
    }

    /// Packed arguments.
    pub const fn args(&self) -> &CallArgs {
        &self.args
    }

    /// Runs the veneer, and through it the callee, on the current thread.
    pub fn invoke(&self) -> Msg {
        (self.veneer)(&self.args)
    }
}

impl fmt::Debug for CallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallRecord").field("args", &self.args).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_of_two(a: Msg, _b: Msg) -> Msg {
        a
    }

    fn answer() -> Msg {
        42
    }

    #[test]
    fn typed_constructors_pack_in_order() {
        let args = CallArgs::fn4(|a, b, c, d| a + b + c + d, 1, 2, 3, 4);
        assert_eq!(args.arity(), 4);
        assert_eq!(args.param_count(), 4);
        assert_eq!(args.params(), &[1, 2, 3, 4]);
        assert_eq!(args.cursor().collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        let args = CallArgs::fn0(answer);
        assert!(args.params().is_empty());
        assert_eq!(args.cursor().next(), None);
    }

    #[test]
    fn cursor_tracks_remaining() {
        let args = CallArgs::fn3(|a, _, _| a, 7, 8, 9);
        let mut cursor = args.cursor();
        assert_eq!(cursor.len(), 3);
        assert_eq!(cursor.next(), Some(7));
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.next(), Some(8));
        assert_eq!(cursor.next(), Some(9));
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn with_params_rejects_overflow() {
        assert!(CallArgs::with_params(Callee::Fn0(answer), &[1, 2, 3, 4, 5]).is_none());
        let args = CallArgs::with_params(Callee::Fn2(first_of_two), &[5]).expect("fits");
        assert_eq!(args.arity(), 2);
        assert_eq!(args.param_count(), 1);
    }

    #[test]
    fn direct_record_invokes_callee() {
        let record = CallRecord::direct(CallArgs::fn2(first_of_two, -3, 9));
        assert_eq!(record.invoke(), -3);
        assert_eq!(CallRecord::direct(CallArgs::fn0(answer)).invoke(), 42);
    }
}

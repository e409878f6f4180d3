// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Argument-unpacking veneers.
//!
//! A veneer runs on the servicing thread: it reads the callee and its parameters out of
//! a [`CallArgs`] in packing order and invokes the callee. The five built-ins cover
//! arities 0 to 4. A built-in handed a record that does not match its arity invokes
//! nothing and returns [`MSG_RESET`].
//!
//! Custom veneers have the same [`Veneer`] shape and may interpret the record freely,
//! as long as they read parameters through [`CallArgs::cursor`] or [`CallArgs::params`].

use log::warn;
use nexus_ipc::{Msg, MSG_RESET};

use crate::record::{CallArgs, Callee};

/// Unpacks a call record and invokes its callee, returning the callee's result.
pub type Veneer = fn(&CallArgs) -> Msg;

/// Built-in veneers indexed by arity.
pub const BUILTIN: [Veneer; 5] = [veneer0, veneer1, veneer2, veneer3, veneer4];

/// Veneer for callees without parameters.
pub fn veneer0(args: &CallArgs) -> Msg {
    match (args.callee(), args.param_count()) {
        (Callee::Fn0(func), 0) => func(),
        _ => arity_mismatch(0, args),
    }
}

/// Veneer for callees with one parameter.
pub fn veneer1(args: &CallArgs) -> Msg {
    let Callee::Fn1(func) = args.callee() else {
        return arity_mismatch(1, args);
    };
    let mut params = args.cursor();
    match (params.next(), params.remaining()) {
        (Some(p1), 0) => func(p1),
        _ => arity_mismatch(1, args),
    }
}

/// Veneer for callees with two parameters.
pub fn veneer2(args: &CallArgs) -> Msg {
    let Callee::Fn2(func) = args.callee() else {
        return arity_mismatch(2, args);
    };
    let mut params = args.cursor();
    match (params.next(), params.next(), params.remaining()) {
        (Some(p1), Some(p2), 0) => func(p1, p2),
        _ => arity_mismatch(2, args),
    }
}

/// Veneer for callees with three parameters.
pub fn veneer3(args: &CallArgs) -> Msg {
    let Callee::Fn3(func) = args.callee() else {
        return arity_mismatch(3, args);
    };
    let mut params = args.cursor();
    match (params.next(), params.next(), params.next(), params.remaining()) {
        (Some(p1), Some(p2), Some(p3), 0) => func(p1, p2, p3),
        _ => arity_mismatch(3, args),
    }
}

/// Veneer for callees with four parameters.
pub fn veneer4(args: &CallArgs) -> Msg {
    let Callee::Fn4(func) = args.callee() else {
        return arity_mismatch(4, args);
    };
    let mut params = args.cursor();
    match (params.next(), params.next(), params.next(), params.next()) {
        (Some(p1), Some(p2), Some(p3), Some(p4)) => func(p1, p2, p3, p4),
        _ => arity_mismatch(4, args),
    }
}

#[cold]
fn arity_mismatch(expected: usize, args: &CallArgs) -> Msg {
    warn!(
        "delegate: veneer{expected} got callee of arity {} with {} params; call dropped",
        args.arity(),
        args.param_count()
    );
    MSG_RESET
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static INVOCATIONS: AtomicUsize = AtomicUsize::new(0);

    fn counted() -> Msg {
        INVOCATIONS.fetch_add(1, Ordering::SeqCst);
        1
    }

    // Positional weights make any reordering visible.
    fn weigh4(a: Msg, b: Msg, c: Msg, d: Msg) -> Msg {
        a * 1000 + b * 100 + c * 10 + d
    }

    #[test]
    fn builtins_invoke_with_ordered_params() {
        assert_eq!(veneer0(&CallArgs::fn0(|| 5)), 5);
        assert_eq!(veneer1(&CallArgs::fn1(|a| -a, 9)), -9);
        assert_eq!(veneer2(&CallArgs::fn2(|a, b| a - b, 10, 3)), 7);
        assert_eq!(veneer3(&CallArgs::fn3(|a, b, c| a * 100 + b * 10 + c, 1, 2, 3)), 123);
        assert_eq!(veneer4(&CallArgs::fn4(weigh4, 4, 3, 2, 1)), 4321);
    }

    #[test]
    fn builtin_table_is_indexed_by_arity() {
        let args = CallArgs::fn4(weigh4, 1, 2, 3, 4);
        assert_eq!(BUILTIN[args.arity()](&args), 1234);
        let args = CallArgs::fn1(|a| a + 1, 1);
        assert_eq!(args.callee().veneer()(&args), 2);
    }

    #[test]
    fn wrong_callee_variant_is_not_invoked() {
        let before = INVOCATIONS.load(Ordering::SeqCst);
        let args = CallArgs::fn0(counted);
        assert_eq!(veneer2(&args), MSG_RESET);
        assert_eq!(veneer4(&args), MSG_RESET);
        assert_eq!(INVOCATIONS.load(Ordering::SeqCst), before);
    }

    #[test]
    fn param_count_mismatch_is_rejected() {
        let short = CallArgs::with_params(Callee::Fn2(|a, b| a + b), &[1]).unwrap();
        assert_eq!(veneer2(&short), MSG_RESET);
        let long = CallArgs::with_params(Callee::Fn1(|a| a), &[1, 2]).unwrap();
        assert_eq!(veneer1(&long), MSG_RESET);
        let extra = CallArgs::with_params(Callee::Fn0(counted), &[1]).unwrap();
        assert_eq!(veneer0(&extra), MSG_RESET);
    }
}

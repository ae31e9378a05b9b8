//! `launch`, `protect` and `wait` across worker threads.

use std::time::Duration;

use pretty_assertions::assert_eq;
use sigh_eval::{DrainStatus, FaultCategory};
use sigh_ir::{BinaryOp, ProgramBuilder, Type};

use crate::common::{print, run, try_run_with, value};

fn wait_on(b: &mut ProgramBuilder, name: &str) {
    let target = b.reference(name);
    let call = b.call("wait", vec![target]);
    b.expr_stmt(call);
}

fn increment(b: &mut ProgramBuilder, name: &str) {
    let current = b.reference(name);
    let one = b.int(1);
    let next = b.binary(BinaryOp::Add, current, one);
    b.set(name, next);
}

/// `fun name(): Int { var i = 0; while i < times { body } return 1 }`
fn repeat_fun(
    b: &mut ProgramBuilder,
    name: &str,
    times: i64,
    body: impl FnOnce(&mut ProgramBuilder),
) {
    b.fun(name, &[], Type::Int, |b| {
        let zero = b.int(0);
        b.var("i", Type::Int, zero);
        let i = b.reference("i");
        let limit = b.int(times);
        let cond = b.binary(BinaryOp::Lt, i, limit);
        b.while_(cond, |b| {
            body(b);
            increment(b, "i");
        });
        let one = b.int(1);
        b.ret(Some(one));
    });
}

/// Four tasks each add 1000 to `counter`, optionally under `protect`; the
/// main program waits for all of them and returns the counter.
fn four_adders(protected: bool) -> i64 {
    value(|b| {
        let zero = b.int(0);
        b.var("counter", Type::Int, zero);
        repeat_fun(b, "add", 1000, |b| {
            if protected {
                b.protect(|b| increment(b, "counter"));
            } else {
                increment(b, "counter");
            }
        });
        for done in ["d0", "d1", "d2", "d3"] {
            b.launch_var(done, Type::Int, "add", vec![]);
        }
        for done in ["d0", "d1", "d2", "d3"] {
            wait_on(b, done);
        }
        let counter = b.reference("counter");
        b.ret(Some(counter));
    })
    .as_int()
    .unwrap()
}

#[test]
fn protect_serializes_updates() {
    assert_eq!(four_adders(true), 4000);
}

#[test]
fn unprotected_updates_may_be_lost() {
    let counter = four_adders(false);
    assert!((1..=4000).contains(&counter), "counter = {counter}");
}

#[test]
fn wait_observes_the_task_result() {
    // fun addUpTo(a: Int): Int { while a < 10000 { a = a + 1 } return a }
    let result = value(|b| {
        b.fun("addUpTo", &[("a", Type::Int)], Type::Int, |b| {
            let a = b.reference("a");
            let limit = b.int(10_000);
            let cond = b.binary(BinaryOp::Lt, a, limit);
            b.while_(cond, |b| increment(b, "a"));
            let a = b.reference("a");
            b.ret(Some(a));
        });
        let one = b.int(1);
        b.launch_var("total", Type::Int, "addUpTo", vec![one]);
        wait_on(b, "total");
        let total = b.reference("total");
        b.ret(Some(total));
    });
    assert_eq!(result.as_int(), Some(10_000));
}

#[test]
fn launch_var_is_absent_until_the_task_finishes() {
    // The task cannot finish before `go` is set, which happens after the
    // main program has read `result`.
    let outcome = run(|b| {
        let f = b.boolean(false);
        b.var("go", Type::Bool, f);
        b.fun("gated", &[], Type::Int, |b| {
            let go = b.reference("go");
            let stopped = b.not(go);
            b.while_(stopped, |_| {});
            let one = b.int(1);
            b.ret(Some(one));
        });
        b.launch_var("result", Type::Int, "gated", vec![]);
        let result = b.reference("result");
        b.var("early", Type::Int, result);
        let t = b.boolean(true);
        b.set("go", t);
        let early = b.reference("early");
        print(b, early);
        let early = b.reference("early");
        b.ret(Some(early));
    });
    assert_eq!(outcome.output, "null\n");
    assert!(outcome.report.value.is_void());
    assert!(outcome.report.drain.is_complete());
}

#[test]
fn waits_in_any_order() {
    let outcome = run(|b| {
        repeat_fun(b, "one", 500, |_| {});
        for name in ["a", "b", "c", "d"] {
            b.launch_var(name, Type::Int, "one", vec![]);
        }
        for name in ["d", "b", "c", "a"] {
            wait_on(b, name);
        }
        let mut text = b.string("");
        for name in ["a", "b", "c", "d"] {
            let part = b.reference(name);
            text = b.binary(BinaryOp::Add, text, part);
        }
        print(b, text);
    });
    assert_eq!(outcome.output, "1111\n");
}

#[test]
fn tasks_see_each_others_writes() {
    // One task spins until another sets the flag.
    let outcome = run(|b| {
        let f = b.boolean(false);
        b.var("ready", Type::Bool, f);
        b.fun("secondThread", &[], Type::Bool, |b| {
            let ready = b.reference("ready");
            let waiting = b.not(ready);
            b.while_(waiting, |_| {});
            let ready = b.reference("ready");
            b.ret(Some(ready));
        });
        b.fun("firstThread", &[], Type::Void, |b| {
            let t = b.boolean(true);
            b.set("ready", t);
        });
        b.launch_var("seen", Type::Bool, "secondThread", vec![]);
        b.launch("firstThread", vec![]);
        wait_on(b, "seen");
        let seen = b.reference("seen");
        print(b, seen);
    });
    assert_eq!(outcome.output, "true\n");
}

#[test]
fn nested_launches_are_drained() {
    let outcome = run(|b| {
        b.fun("inner", &[], Type::Void, |b| {
            let text = b.string("inner");
            print(b, text);
        });
        b.fun("outer", &[], Type::Void, |b| {
            b.launch("inner", vec![]);
            let text = b.string("outer");
            print(b, text);
        });
        b.launch("outer", vec![]);
    });
    let mut lines: Vec<&str> = outcome.output.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, ["inner", "outer"]);
    assert_eq!(outcome.report.drain, DrainStatus::Complete);
}

#[test]
fn printed_lines_never_interleave() {
    let outcome = run(|b| {
        repeat_fun(b, "chatter", 25, |b| {
            let text = b.string("a complete line");
            print(b, text);
        });
        for _ in 0..8 {
            b.launch("chatter", vec![]);
        }
    });
    let lines: Vec<&str> = outcome.output.lines().collect();
    assert_eq!(lines.len(), 200);
    assert!(lines.iter().all(|line| *line == "a complete line"));
}

#[test]
fn task_fault_does_not_abort_the_run() {
    let outcome = run(|b| {
        b.fun("bad", &[], Type::Void, |b| {
            let one = b.int(1);
            let zero = b.int(0);
            let div = b.binary(BinaryOp::Div, one, zero);
            b.var("x", Type::Int, div);
        });
        b.launch("bad", vec![]);
        let text = b.string("after");
        print(b, text);
    });
    assert_eq!(outcome.output, "after\n");
    assert_eq!(outcome.report.drain, DrainStatus::Complete);
    assert_eq!(outcome.report.task_failures.len(), 1);
    assert_eq!(
        outcome.report.task_failures[0].error.category(),
        FaultCategory::Arithmetic
    );
}

#[test]
fn return_inside_protect_releases_the_lock() {
    // fun enter(): Int { protect { hits = hits + 1; return hits } }
    let result = value(|b| {
        let zero = b.int(0);
        b.var("hits", Type::Int, zero);
        b.fun("enter", &[], Type::Int, |b| {
            b.protect(|b| {
                increment(b, "hits");
                let hits = b.reference("hits");
                b.ret(Some(hits));
            });
        });
        let call = b.call("enter", vec![]);
        b.expr_stmt(call);
        // A leaked lock would block the task forever.
        b.launch_var("second", Type::Int, "enter", vec![]);
        wait_on(b, "second");
        let second = b.reference("second");
        b.ret(Some(second));
    });
    assert_eq!(result.as_int(), Some(2));
}

#[test]
fn protect_is_reentrant() {
    // fun nest(n: Int): Int { protect { if n > 0 { return nest(n - 1) + 1 } } return 0 }
    let result = value(|b| {
        b.fun("nest", &[("n", Type::Int)], Type::Int, |b| {
            b.protect(|b| {
                let n = b.reference("n");
                let zero = b.int(0);
                let positive = b.binary(BinaryOp::Gt, n, zero);
                b.if_(positive, |b| {
                    let n = b.reference("n");
                    let one = b.int(1);
                    let smaller = b.binary(BinaryOp::Sub, n, one);
                    let rec = b.call("nest", vec![smaller]);
                    let one = b.int(1);
                    let sum = b.binary(BinaryOp::Add, rec, one);
                    b.ret(Some(sum));
                });
            });
            let zero = b.int(0);
            b.ret(Some(zero));
        });
        let five = b.int(5);
        b.launch_var("depth", Type::Int, "nest", vec![five]);
        wait_on(b, "depth");
        let depth = b.reference("depth");
        b.ret(Some(depth));
    });
    assert_eq!(result.as_int(), Some(5));
}

#[test]
fn drain_timeout_reports_stuck_tasks() {
    // `never` stays absent because its task faults, so `stuck` waits until
    // the run gives up on it.
    let (report, _) = try_run_with(
        |b| b.drain_timeout(Some(Duration::from_millis(50))),
        |b| {
            b.fun("boom", &[], Type::Int, |b| {
                let one = b.int(1);
                let zero = b.int(0);
                let div = b.binary(BinaryOp::Div, one, zero);
                b.ret(Some(div));
            });
            b.launch_var("never", Type::Int, "boom", vec![]);
            b.fun("stuck", &[], Type::Void, |b| wait_on(b, "never"));
            b.launch("stuck", vec![]);
        },
    );
    let report = report.unwrap();
    assert!(!report.drain.is_complete(), "{:?}", report.drain);
}

#[test]
fn task_printing_a_cyclic_struct_finishes() {
    let outcome = run(|b| {
        let link = Type::Struct(b.name("N"));
        b.structure("N", &[("next", link.clone())]);
        b.fun("loop_back", &[], Type::Void, |b| {
            let ctor = b.constructor("N");
            let null = b.null();
            let instance = b.call_with(ctor, vec![null]);
            b.var("n", link, instance);
            let n = b.reference("n");
            let next = b.field(n, "next");
            let n = b.reference("n");
            let assign = b.assign(next, n);
            b.expr_stmt(assign);
            let n = b.reference("n");
            print(b, n);
        });
        b.launch("loop_back", vec![]);
    });
    assert_eq!(outcome.output, "{next={...}}\n");
    assert!(outcome.report.task_failures.is_empty());
    assert_eq!(outcome.report.drain, DrainStatus::Complete);
}

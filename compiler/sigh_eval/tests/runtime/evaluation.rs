//! Sequential semantics.

use pretty_assertions::assert_eq;
use sigh_eval::Value;
use sigh_ir::{BinaryOp, Type};

use crate::common::{print, run, value};

#[test]
fn mixed_arithmetic() {
    // 2 * (4 - 1) * 4.0 / 6 % (2 + 1)
    let result = value(|b| {
        let two = b.int(2);
        let four = b.int(4);
        let one = b.int(1);
        let sub = b.binary(BinaryOp::Sub, four, one);
        let group = b.paren(sub);
        let mul = b.binary(BinaryOp::Mul, two, group);
        let four_f = b.float(4.0);
        let mul = b.binary(BinaryOp::Mul, mul, four_f);
        let six = b.int(6);
        let div = b.binary(BinaryOp::Div, mul, six);
        let two = b.int(2);
        let one = b.int(1);
        let add = b.binary(BinaryOp::Add, two, one);
        let group = b.paren(add);
        let rem = b.binary(BinaryOp::Rem, div, group);
        b.ret(Some(rem));
    });
    assert!(matches!(result, Value::Float(x) if (x - 1.0).abs() < f64::EPSILON));
}

#[test]
fn integer_arithmetic_stays_integral() {
    let result = value(|b| {
        let seven = b.int(-7);
        let two = b.int(2);
        let div = b.binary(BinaryOp::Div, seven, two);
        b.ret(Some(div));
    });
    assert_eq!(result.as_int(), Some(-3));
}

#[test]
fn string_concatenation() {
    let outcome = run(|b| {
        let a = b.string("a");
        let one = b.int(1);
        let left = b.binary(BinaryOp::Add, a, one);
        print(b, left);

        let one = b.int(1);
        let a = b.string("a");
        let right = b.binary(BinaryOp::Add, one, a);
        print(b, right);

        let null = b.null();
        b.var("str", Type::String, null);
        let s = b.reference("str");
        let one = b.int(1);
        let concat = b.binary(BinaryOp::Add, s, one);
        print(b, concat);
    });
    assert_eq!(outcome.output, "a1\n1a\nnull1\n");
}

#[test]
fn block_scopes_shadow_and_restore() {
    let outcome = run(|b| {
        let one = b.int(1);
        b.var("x", Type::Int, one);
        let x = b.reference("x");
        print(b, x);
        b.block(|b| {
            let two = b.int(2);
            b.var("x", Type::Int, two);
            let x = b.reference("x");
            print(b, x);
        });
        let x = b.reference("x");
        print(b, x);
    });
    assert_eq!(outcome.output, "1\n2\n1\n");
}

#[test]
fn assignment_reaches_the_declaring_frame() {
    let outcome = run(|b| {
        let zero = b.int(0);
        b.var("x", Type::Int, zero);
        b.block(|b| {
            b.block(|b| {
                let five = b.int(5);
                b.set("x", five);
            });
        });
        let x = b.reference("x");
        print(b, x);
        // An assignment evaluates to the assigned value.
        let target = b.reference("x");
        let six = b.int(6);
        let assign = b.assign(target, six);
        print(b, assign);
    });
    assert_eq!(outcome.output, "5\n6\n");
}

#[test]
fn float_bindings_widen_integers() {
    let outcome = run(|b| {
        let one = b.int(1);
        b.var("f", Type::Float, one);
        let f = b.reference("f");
        print(b, f);
        let two = b.int(2);
        b.set("f", two);
        let f = b.reference("f");
        print(b, f);
    });
    assert_eq!(outcome.output, "1.0\n2.0\n");
}

#[test]
fn logical_operators_short_circuit() {
    let outcome = run(|b| {
        let t = b.boolean(true);
        let text = b.string("evaluated");
        let side = b.call("print", vec![text]);
        let or = b.binary(BinaryOp::Or, t, side);
        print(b, or);

        let f = b.boolean(false);
        let text = b.string("evaluated");
        let side = b.call("print", vec![text]);
        let and = b.binary(BinaryOp::And, f, side);
        print(b, and);

        let f = b.boolean(false);
        let not = b.not(f);
        print(b, not);
    });
    assert_eq!(outcome.output, "true\nfalse\ntrue\n");
}

#[test]
fn equality_rules() {
    let outcome = run(|b| {
        // [1] == [1]
        let one = b.int(1);
        let left = b.array(vec![one]);
        let one = b.int(1);
        let right = b.array(vec![one]);
        let eq = b.binary(BinaryOp::Eq, left, right);
        print(b, eq);

        // var a = [1]; var c = a; a == c
        let one = b.int(1);
        let array = b.array(vec![one]);
        b.var("a", Type::array_of(Type::Int), array);
        let a = b.reference("a");
        b.var("c", Type::array_of(Type::Int), a);
        let a = b.reference("a");
        let c = b.reference("c");
        let eq = b.binary(BinaryOp::Eq, a, c);
        print(b, eq);

        // 1 == 1.0
        let one = b.int(1);
        let one_f = b.float(1.0);
        let eq = b.binary(BinaryOp::Eq, one, one_f);
        print(b, eq);

        // "ab" == "a" + "b"
        let ab = b.string("ab");
        let a = b.string("a");
        let bb = b.string("b");
        let concat = b.binary(BinaryOp::Add, a, bb);
        let eq = b.binary(BinaryOp::Eq, ab, concat);
        print(b, eq);

        // null == null
        let l = b.null();
        let r = b.null();
        let eq = b.binary(BinaryOp::Eq, l, r);
        print(b, eq);
    });
    assert_eq!(outcome.output, "false\ntrue\ntrue\ntrue\ntrue\n");
}

#[test]
fn arrays_are_shared_handles() {
    let outcome = run(|b| {
        let items = vec![b.int(1), b.int(2), b.int(3)];
        let array = b.array(items);
        b.var("a", Type::array_of(Type::Int), array);
        let a = b.reference("a");
        b.var("c", Type::array_of(Type::Int), a);

        let c = b.reference("c");
        let one = b.int(1);
        let slot = b.index(c, one);
        let nine = b.int(9);
        let assign = b.assign(slot, nine);
        b.expr_stmt(assign);

        let a = b.reference("a");
        print(b, a);
        let a = b.reference("a");
        let length = b.field(a, "length");
        print(b, length);
        let a = b.reference("a");
        let two = b.int(2);
        let last = b.index(a, two);
        print(b, last);
    });
    assert_eq!(outcome.output, "[1, 9, 3]\n3\n3\n");
}

#[test]
fn element_wise_and_matrix_operators() {
    let outcome = run(|b| {
        let left = vec![b.int(1), b.int(2), b.int(7)];
        let left = b.array(left);
        let right = vec![b.int(8), b.int(5), b.int(7)];
        let right = b.array(right);
        let product = b.binary(BinaryOp::Mul, left, right);
        print(b, product);

        let mut rows = Vec::new();
        for row in [[1, 2, 3], [4, 5, 6], [7, 8, 9]] {
            let cells = row.iter().map(|&n| b.int(n)).collect();
            rows.push(b.array(cells));
        }
        let matrix = b.array(rows);
        b.var(
            "m",
            Type::array_of(Type::array_of(Type::Int)),
            matrix,
        );
        let l = b.reference("m");
        let r = b.reference("m");
        let product = b.binary(BinaryOp::MatProduct, l, r);
        print(b, product);
    });
    assert_eq!(
        outcome.output,
        "[8, 10, 49]\n[[30.0, 36.0, 42.0], [66.0, 81.0, 96.0], [102.0, 126.0, 150.0]]\n"
    );
}

#[test]
fn structs_are_built_read_and_updated() {
    let outcome = run(|b| {
        b.structure("P", &[("x", Type::Int), ("y", Type::Float)]);
        let ctor = b.constructor("P");
        let args = vec![b.int(1), b.int(2)];
        let instance = b.call_with(ctor, args);
        let ty = Type::Struct(b.name("P"));
        b.var("p", ty, instance);

        let p = b.reference("p");
        print(b, p);

        let p = b.reference("p");
        let x = b.field(p, "x");
        let five = b.int(5);
        let assign = b.assign(x, five);
        b.expr_stmt(assign);

        let p = b.reference("p");
        let x = b.field(p, "x");
        print(b, x);
        let p = b.reference("p");
        print(b, p);
    });
    assert_eq!(outcome.output, "{x=1, y=2.0}\n5\n{x=5, y=2.0}\n");
}

#[test]
fn control_flow_and_recursion() {
    // fun fact(n: Int): Int { if n <= 1 { return 1 } return n * fact(n - 1) }
    let outcome = run(|b| {
        b.fun("fact", &[("n", Type::Int)], Type::Int, |b| {
            let n = b.reference("n");
            let one = b.int(1);
            let base = b.binary(BinaryOp::LtEq, n, one);
            b.if_(base, |b| {
                let one = b.int(1);
                b.ret(Some(one));
            });
            let n = b.reference("n");
            let n2 = b.reference("n");
            let one = b.int(1);
            let smaller = b.binary(BinaryOp::Sub, n2, one);
            let rec = b.call("fact", vec![smaller]);
            let product = b.binary(BinaryOp::Mul, n, rec);
            b.ret(Some(product));
        });

        // var i = 0; while i < 3 { if i == 1 { print("one") } else { print(i) } i = i + 1 }
        let zero = b.int(0);
        b.var("i", Type::Int, zero);
        let i = b.reference("i");
        let three = b.int(3);
        let cond = b.binary(BinaryOp::Lt, i, three);
        b.while_(cond, |b| {
            let i = b.reference("i");
            let one = b.int(1);
            let is_one = b.binary(BinaryOp::Eq, i, one);
            b.if_else(
                is_one,
                |b| {
                    let text = b.string("one");
                    print(b, text);
                },
                |b| {
                    let i = b.reference("i");
                    print(b, i);
                },
            );
            let i = b.reference("i");
            let one = b.int(1);
            let next = b.binary(BinaryOp::Add, i, one);
            b.set("i", next);
        });

        let ten = b.int(10);
        let call = b.call("fact", vec![ten]);
        b.ret(Some(call));
    });
    assert_eq!(outcome.output, "0\none\n2\n");
    assert_eq!(outcome.report.value.as_int(), Some(3_628_800));
}

#[test]
fn top_level_return_stops_the_program() {
    let outcome = run(|b| {
        let first = b.string("first");
        print(b, first);
        let seven = b.int(7);
        b.ret(Some(seven));
        let never = b.string("never");
        print(b, never);
    });
    assert_eq!(outcome.output, "first\n");
    assert_eq!(outcome.report.value.as_int(), Some(7));
}

#[test]
fn function_without_return_yields_absent() {
    let outcome = run(|b| {
        b.fun("nothing", &[], Type::Void, |_| {});
        let call = b.call("nothing", vec![]);
        print(b, call);
        let call = b.call("nothing", vec![]);
        b.ret(Some(call));
    });
    assert_eq!(outcome.output, "null\n");
    assert!(outcome.report.value.is_void());
}

#[test]
fn deep_recursion_does_not_overflow() {
    // fun down(n: Int): Int { if n == 0 { return 0 } return down(n - 1) }
    let result = value(|b| {
        b.fun("down", &[("n", Type::Int)], Type::Int, |b| {
            let n = b.reference("n");
            let zero = b.int(0);
            let done = b.binary(BinaryOp::Eq, n, zero);
            b.if_(done, |b| {
                let zero = b.int(0);
                b.ret(Some(zero));
            });
            let n = b.reference("n");
            let one = b.int(1);
            let smaller = b.binary(BinaryOp::Sub, n, one);
            let rec = b.call("down", vec![smaller]);
            b.ret(Some(rec));
        });
        let depth = b.int(5_000);
        let call = b.call("down", vec![depth]);
        b.ret(Some(call));
    });
    assert_eq!(result.as_int(), Some(0));
}

#[test]
fn float_rendering() {
    let outcome = run(|b| {
        for x in [1e10, 0.5, -0.0, 1e-4, 123.0] {
            let node = b.float(x);
            print(b, node);
        }
        let one = b.float(1.0);
        let zero = b.int(0);
        let inf = b.binary(BinaryOp::Div, one, zero);
        print(b, inf);
    });
    assert_eq!(
        outcome.output,
        "1.0E10\n0.5\n-0.0\n1.0E-4\n123.0\nInfinity\n"
    );
}

#[test]
fn array_operators_promote_by_static_leaf_type() {
    // [1.0, 2] + [1, 1] is typed Float[], so every leaf is a float.
    let outcome = run(|b| {
        let left = vec![b.float(1.0), b.int(2)];
        let left = b.array(left);
        let right = vec![b.int(1), b.int(1)];
        let right = b.array(right);
        let sum = b.binary(BinaryOp::Add, left, right);
        print(b, sum);
    });
    assert_eq!(outcome.output, "[2.0, 3.0]\n");
}

#[test]
fn self_referencing_struct_prints_placeholder() {
    // struct N { var next: N }; var n = $N(null); n.next = n; print(n)
    let outcome = run(|b| {
        let link = Type::Struct(b.name("N"));
        b.structure("N", &[("next", link.clone())]);
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
    assert_eq!(outcome.output, "{next={...}}\n");
}

//! Faults in the main program.

use pretty_assertions::assert_eq;
use sigh_eval::{EvalErrorKind, FaultCategory};
use sigh_ir::{BinaryOp, ProgramBuilder, Span, Type};

use crate::common::{fault, print, try_run_with};

fn int_array(b: &mut ProgramBuilder, values: &[i64]) -> sigh_ir::NodeId {
    let elements = values.iter().map(|&v| b.int(v)).collect();
    b.array(elements)
}

/// Build `return [1, 2][index]` and report its fault.
fn index_fault(index: i64) -> EvalErrorKind {
    fault(|b| {
        let array = int_array(b, &[1, 2]);
        let index = b.int(index);
        let access = b.index(array, index);
        b.ret(Some(access));
    })
    .kind
}

#[test]
fn field_of_null_struct() {
    let error = fault(|b| {
        b.structure("P", &[("x", Type::Int)]);
        let null = b.null();
        let ty = Type::Struct(b.name("P"));
        b.var("p", ty, null);
        let p = b.reference("p");
        let x = b.field(p, "x");
        b.ret(Some(x));
    });
    assert_eq!(
        error.kind,
        EvalErrorKind::NullDereference {
            context: "accessing field of null object"
        }
    );
}

#[test]
fn indexing_null_array() {
    let error = fault(|b| {
        let null = b.null();
        b.var("a", Type::array_of(Type::Int), null);
        let a = b.reference("a");
        let zero = b.int(0);
        let access = b.index(a, zero);
        b.ret(Some(access));
    });
    assert_eq!(error.category(), FaultCategory::NullDereference);
}

#[test]
fn calling_null_function() {
    let error = fault(|b| {
        let null = b.null();
        b.var("f", Type::Fun, null);
        let f = b.reference("f");
        let call = b.call_with(f, vec![]);
        b.expr_stmt(call);
    });
    assert_eq!(
        error.kind,
        EvalErrorKind::NullDereference {
            context: "calling a null function"
        }
    );
}

#[test]
fn index_faults() {
    assert_eq!(index_fault(-1), EvalErrorKind::NegativeIndex { index: -1 });
    assert_eq!(
        index_fault(2),
        EvalErrorKind::IndexOutOfBounds {
            index: 2,
            length: 2
        }
    );
    assert_eq!(
        index_fault(2_147_483_646),
        EvalErrorKind::IndexTooLarge {
            index: 2_147_483_646
        }
    );
}

#[test]
fn element_store_out_of_bounds() {
    let error = fault(|b| {
        let array = int_array(b, &[1, 2, 3]);
        b.var("a", Type::array_of(Type::Int), array);
        let a = b.reference("a");
        let five = b.int(5);
        let slot = b.index(a, five);
        let one = b.int(1);
        let assign = b.assign(slot, one);
        b.expr_stmt(assign);
    });
    assert_eq!(
        error.kind,
        EvalErrorKind::IndexOutOfBounds {
            index: 5,
            length: 3
        }
    );
}

#[test]
fn integer_division_by_zero() {
    for (op, expected) in [
        (BinaryOp::Div, EvalErrorKind::DivisionByZero),
        (BinaryOp::Rem, EvalErrorKind::ModuloByZero),
    ] {
        let error = fault(|b| {
            let one = b.int(1);
            let zero = b.int(0);
            let result = b.binary(op, one, zero);
            b.ret(Some(result));
        });
        assert_eq!(error.kind, expected);
        assert_eq!(error.category(), FaultCategory::Arithmetic);
    }
}

#[test]
fn array_shape_faults() {
    let error = fault(|b| {
        let left = int_array(b, &[1, 2]);
        let right = int_array(b, &[1]);
        let sum = b.binary(BinaryOp::Add, left, right);
        b.ret(Some(sum));
    });
    assert_eq!(error.kind, EvalErrorKind::LengthMismatch { left: 2, right: 1 });

    let error = fault(|b| {
        let rows = vec![int_array(b, &[1, 2, 3]), int_array(b, &[4, 5, 6])];
        let left = b.array(rows);
        let rows = vec![
            int_array(b, &[1, 2, 3]),
            int_array(b, &[4, 5, 6]),
            int_array(b, &[7, 8, 9]),
        ];
        let right = b.array(rows);
        let product = b.binary(BinaryOp::MatProduct, left, right);
        b.ret(Some(product));
    });
    assert_eq!(
        error.kind,
        EvalErrorKind::MatrixDimension {
            rows: 2,
            columns: 3
        }
    );
    assert_eq!(error.category(), FaultCategory::Shape);
}

#[test]
fn unknown_field() {
    let error = fault(|b| {
        let array = int_array(b, &[1]);
        let size = b.field(array, "size");
        b.ret(Some(size));
    });
    assert_eq!(
        error.kind,
        EvalErrorKind::UndefinedField {
            field: "size".to_owned()
        }
    );
}

#[test]
fn unsupported_builtin_carries_its_span() {
    let error = fault(|b| {
        b.builtin("sqrt", Type::Float);
        b.at(Span::new(3, 9));
        let four = b.float(4.0);
        let call = b.call("sqrt", vec![four]);
        b.ret(Some(call));
    });
    assert_eq!(
        error.kind,
        EvalErrorKind::UnsupportedBuiltin {
            name: "sqrt".to_owned()
        }
    );
    assert_eq!(error.span, Some(Span::new(3, 9)));
    assert!(error.to_string().starts_with(&error.message));
}

#[test]
fn fault_stops_the_main_program() {
    let (result, output) = try_run_with(
        |b| b,
        |b| {
            let text = b.string("before");
            print(b, text);
            let one = b.int(1);
            let zero = b.int(0);
            let div = b.binary(BinaryOp::Div, one, zero);
            b.expr_stmt(div);
            let text = b.string("after");
            print(b, text);
        },
    );
    assert_eq!(result.unwrap_err().kind, EvalErrorKind::DivisionByZero);
    assert_eq!(output, "before\n");
}

#[test]
fn fault_in_main_still_drains_tasks() {
    let (result, output) = try_run_with(
        |b| b,
        |b| {
            b.fun("late", &[], Type::Void, |b| {
                let zero = b.int(0);
                b.var("i", Type::Int, zero);
                let i = b.reference("i");
                let limit = b.int(2000);
                let cond = b.binary(BinaryOp::Lt, i, limit);
                b.while_(cond, |b| {
                    let i = b.reference("i");
                    let one = b.int(1);
                    let next = b.binary(BinaryOp::Add, i, one);
                    b.set("i", next);
                });
                let text = b.string("task");
                print(b, text);
            });
            b.launch("late", vec![]);
            let null = b.null();
            let x = b.field(null, "x");
            b.expr_stmt(x);
        },
    );
    assert_eq!(result.unwrap_err().category(), FaultCategory::NullDereference);
    assert_eq!(output, "task\n");
}

//! Binary operator semantics.
//!
//! Dispatch follows the operands' static types, as recorded by analysis:
//! - `+` with a `String` operand concatenates textual forms
//! - a `Float` operand promotes the operation to `f64`, else `Int` is `i64`
//! - two arrays under `* / + -` combine element-wise, recursing into nested
//!   arrays and promoting per leaf
//! - `==`/`!=` compare primitives by value and everything else by identity
//!
//! `&&`, `||` and `@` never reach [`evaluate_binary`]: the first two must
//! not evaluate their right operand eagerly, and the matrix product has
//! its own entry point, [`matrix_product`].

use sigh_ir::{BinaryOp, Program, Type};

use crate::errors::{
    division_by_zero, empty_array, invalid_binary_op, length_mismatch, matrix_dimension,
    modulo_by_zero, nesting_mismatch, null_dereference, type_mismatch, EvalError,
};
use crate::value::ArrayRef;
use crate::Value;

/// Apply a non-short-circuit binary operator to evaluated operands.
pub fn evaluate_binary(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    left_ty: &Type,
    right_ty: &Type,
    program: &Program,
) -> Result<Value, EvalError> {
    if op == BinaryOp::Add && (left_ty.is_string() || right_ty.is_string()) {
        let text = format!("{}{}", left.display(program), right.display(program));
        return Ok(Value::string(text));
    }

    let floating = left_ty.is_float() || right_ty.is_float();
    if floating || matches!(left_ty, Type::Int) {
        return numeric_op(op, floating, left, right);
    }

    if left_ty.is_array() && right_ty.is_array() && op.is_array_op() {
        let left = non_null_array(left)?;
        let right = non_null_array(right)?;
        let floating = left_ty.leaf().is_float() || right_ty.leaf().is_float();
        return array_op(op, floating, &left, &right);
    }

    match op {
        BinaryOp::Eq => Ok(Value::Bool(equals(left, right, left_ty))),
        BinaryOp::NotEq => Ok(Value::Bool(!equals(left, right, left_ty))),
        _ => Err(invalid_binary_op(op.as_symbol(), left.type_name())),
    }
}

/// `==` for non-numeric operands.
fn equals(left: &Value, right: &Value, left_ty: &Type) -> bool {
    if left_ty.is_primitive() {
        left.primitive_eq(right)
    } else {
        left.same_reference(right)
    }
}

/// Scalar arithmetic and comparison.
pub fn numeric_op(
    op: BinaryOp,
    floating: bool,
    left: &Value,
    right: &Value,
) -> Result<Value, EvalError> {
    if floating {
        let l = left
            .as_f64()
            .ok_or_else(|| type_mismatch("number", left.type_name()))?;
        let r = right
            .as_f64()
            .ok_or_else(|| type_mismatch("number", right.type_name()))?;
        return float_op(op, l, r);
    }
    let l = left
        .as_int()
        .ok_or_else(|| type_mismatch("Int", left.type_name()))?;
    let r = right
        .as_int()
        .ok_or_else(|| type_mismatch("Int", right.type_name()))?;
    int_op(op, l, r)
}

#[allow(
    clippy::float_cmp,
    reason = "language equality on floats is exact IEEE comparison"
)]
fn float_op(op: BinaryOp, l: f64, r: f64) -> Result<Value, EvalError> {
    Ok(match op {
        BinaryOp::Mul => Value::Float(l * r),
        BinaryOp::Div => Value::Float(l / r),
        BinaryOp::Rem => Value::Float(l % r),
        BinaryOp::Add => Value::Float(l + r),
        BinaryOp::Sub => Value::Float(l - r),
        BinaryOp::Gt => Value::Bool(l > r),
        BinaryOp::Lt => Value::Bool(l < r),
        BinaryOp::GtEq => Value::Bool(l >= r),
        BinaryOp::LtEq => Value::Bool(l <= r),
        BinaryOp::Eq => Value::Bool(l == r),
        BinaryOp::NotEq => Value::Bool(l != r),
        BinaryOp::And | BinaryOp::Or | BinaryOp::MatProduct => {
            return Err(invalid_binary_op(op.as_symbol(), "Float"))
        }
    })
}

/// Integer arithmetic wraps on overflow; division and remainder truncate
/// toward zero and fault on a zero divisor.
fn int_op(op: BinaryOp, l: i64, r: i64) -> Result<Value, EvalError> {
    Ok(match op {
        BinaryOp::Mul => Value::Int(l.wrapping_mul(r)),
        BinaryOp::Div => Value::Int(checked_div(l, r)?),
        BinaryOp::Rem => Value::Int(checked_rem(l, r)?),
        BinaryOp::Add => Value::Int(l.wrapping_add(r)),
        BinaryOp::Sub => Value::Int(l.wrapping_sub(r)),
        BinaryOp::Gt => Value::Bool(l > r),
        BinaryOp::Lt => Value::Bool(l < r),
        BinaryOp::GtEq => Value::Bool(l >= r),
        BinaryOp::LtEq => Value::Bool(l <= r),
        BinaryOp::Eq => Value::Bool(l == r),
        BinaryOp::NotEq => Value::Bool(l != r),
        BinaryOp::And | BinaryOp::Or | BinaryOp::MatProduct => {
            return Err(invalid_binary_op(op.as_symbol(), "Int"))
        }
    })
}

#[inline]
fn checked_div(l: i64, r: i64) -> Result<i64, EvalError> {
    if r == 0 {
        return Err(division_by_zero());
    }
    Ok(l.wrapping_div(r))
}

#[inline]
fn checked_rem(l: i64, r: i64) -> Result<i64, EvalError> {
    if r == 0 {
        return Err(modulo_by_zero());
    }
    Ok(l.wrapping_rem(r))
}

/// Unwrap an array operand, faulting on `null`.
pub fn non_null_array(value: &Value) -> Result<ArrayRef, EvalError> {
    match value {
        Value::Array(array) => Ok(array.clone()),
        Value::Null => Err(null_dereference("indexing null array")),
        other => Err(type_mismatch("array", other.type_name())),
    }
}

/// Element-wise `* / + -` over two arrays of identical shape.
///
/// `floating` is set when either operand's static leaf type is `Float`; it
/// promotes every leaf, so the result matches its `Float` array type.
/// Operands are snapshotted first, so no array lock is held while the
/// result is computed.
pub fn array_op(
    op: BinaryOp,
    floating: bool,
    left: &ArrayRef,
    right: &ArrayRef,
) -> Result<Value, EvalError> {
    let left = left.snapshot();
    let right = right.snapshot();
    if left.len() != right.len() {
        return Err(length_mismatch(left.len(), right.len()));
    }
    if left.is_empty() {
        return Err(empty_array());
    }

    let mut result = Vec::with_capacity(left.len());
    for (l, r) in left.iter().zip(&right) {
        let element = match (l, r) {
            (Value::Array(l), Value::Array(r)) => array_op(op, floating, l, r)?,
            (Value::Array(_), _) | (_, Value::Array(_)) => return Err(nesting_mismatch()),
            (Value::Null, _) | (_, Value::Null) => {
                return Err(null_dereference("indexing null array"))
            }
            _ => {
                let floating =
                    floating || matches!(l, Value::Float(_)) || matches!(r, Value::Float(_));
                numeric_op(op, floating, l, r)?
            }
        };
        result.push(element);
    }
    Ok(Value::array(result))
}

/// `left @ right`: row-by-column product of two matrices, as floats.
///
/// The operands are compatible when the left operand's row count equals
/// the length of the right operand's first row. Each cell sums over the
/// right operand's rows.
pub fn matrix_product(left: &Value, right: &Value) -> Result<Value, EvalError> {
    let left = rows_of(left)?;
    let right = rows_of(right)?;
    let (Some(first_left), Some(first_right)) = (left.first(), right.first()) else {
        return Err(empty_array());
    };
    if first_left.is_empty() {
        return Err(empty_array());
    }
    let columns = first_right.len();
    if left.len() != columns {
        return Err(matrix_dimension(left.len(), columns));
    }

    let mut result = Vec::with_capacity(left.len());
    for row in &left {
        if row.len() < right.len() {
            return Err(length_mismatch(row.len(), right.len()));
        }
        let mut cells = Vec::with_capacity(columns);
        for column in 0..columns {
            let mut cell = 0.0;
            for (i, right_row) in right.iter().enumerate() {
                let r = right_row
                    .get(column)
                    .ok_or_else(|| length_mismatch(right_row.len(), columns))?;
                cell += leaf_f64(&row[i])? * leaf_f64(r)?;
            }
            cells.push(Value::Float(cell));
        }
        result.push(Value::array(cells));
    }
    Ok(Value::array(result))
}

/// Snapshot a two-dimensional array as rows of element handles.
fn rows_of(value: &Value) -> Result<Vec<Vec<Value>>, EvalError> {
    non_null_array(value)?
        .snapshot()
        .iter()
        .map(|row| non_null_array(row).map(|row| row.snapshot()))
        .collect()
}

fn leaf_f64(value: &Value) -> Result<f64, EvalError> {
    value
        .as_f64()
        .ok_or_else(|| type_mismatch("number", value.type_name()))
}

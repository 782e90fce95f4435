//! Arithmetic, comparison and unary operator rules.

use std::cmp::Ordering;
use std::rc::Rc;

use super::error::InterpreterError;
use crate::ast::{BinaryOp, UnaryOp};
use crate::diagnostic::Span;
use crate::value::Value;

pub fn eval_binary_op(left: &Value, op: BinaryOp, right: &Value, span: Span) -> Result<Value, InterpreterError> {
    match op {
        BinaryOp::Eq => values_equal(left, right, op, span).map(Value::Bool),
        BinaryOp::NotEq => values_equal(left, right, op, span).map(|equal| Value::Bool(!equal)),
        BinaryOp::Greater | BinaryOp::Less | BinaryOp::GreaterEq | BinaryOp::LessEq => {
            let ordering = compare(left, op, right, span)?;
            let result = match op {
                BinaryOp::Greater => ordering == Ordering::Greater,
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::GreaterEq => ordering != Ordering::Less,
                _ => ordering != Ordering::Greater,
            };
            Ok(Value::Bool(result))
        }
        _ => arithmetic(left, op, right, span),
    }
}

fn mismatch(left: &Value, op: BinaryOp, right: &Value, span: Span) -> InterpreterError {
    InterpreterError::operand_mismatch_at(op.symbol(), &left.type_name(), &right.type_name(), span)
}

fn arithmetic(left: &Value, op: BinaryOp, right: &Value, span: Span) -> Result<Value, InterpreterError> {
    match (left, right) {
        (Value::Int(left_int), Value::Int(right_int)) => int_arithmetic(*left_int, op, *right_int, span),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (left_num, right_num) = (as_float(left), as_float(right));
            float_arithmetic(left_num, op, right_num, span)
        }
        (Value::String(left_str), Value::String(right_str)) if op == BinaryOp::Add => {
            let mut combined = String::with_capacity(left_str.len() + right_str.len());
            combined.push_str(left_str);
            combined.push_str(right_str);
            Ok(Value::String(Rc::from(combined)))
        }
        _ => Err(mismatch(left, op, right, span)),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        _ => f64::NAN,
    }
}

fn int_arithmetic(left: i64, op: BinaryOp, right: i64, span: Span) -> Result<Value, InterpreterError> {
    let result = match op {
        BinaryOp::Add => left.checked_add(right),
        BinaryOp::Sub => left.checked_sub(right),
        BinaryOp::Mul => left.checked_mul(right),
        BinaryOp::Div | BinaryOp::Mod if right == 0 => {
            return Err(InterpreterError::division_by_zero_at(span));
        }
        BinaryOp::Div => left.checked_div(right),
        BinaryOp::Mod => left.checked_rem(right),
        BinaryOp::Pow if right < 0 => return Ok(Value::Float((left as f64).powf(right as f64))),
        BinaryOp::Pow => u32::try_from(right).ok().and_then(|exp| left.checked_pow(exp)),
        _ => None,
    };
    result
        .map(Value::Int)
        .ok_or_else(|| InterpreterError::overflow_at(op.symbol(), span))
}

fn float_arithmetic(left: f64, op: BinaryOp, right: f64, span: Span) -> Result<Value, InterpreterError> {
    let result = match op {
        BinaryOp::Add => left + right,
        BinaryOp::Sub => left - right,
        BinaryOp::Mul => left * right,
        BinaryOp::Div | BinaryOp::Mod if right == 0.0 => {
            return Err(InterpreterError::division_by_zero_at(span));
        }
        BinaryOp::Div => left / right,
        BinaryOp::Mod => left % right,
        BinaryOp::Pow => left.powf(right),
        _ => return Err(InterpreterError::operand_mismatch_at(op.symbol(), "Float", "Float", span)),
    };
    Ok(Value::Float(result))
}

fn compare(left: &Value, op: BinaryOp, right: &Value, span: Span) -> Result<Ordering, InterpreterError> {
    match (left, right) {
        (Value::Int(left_int), Value::Int(right_int)) => Ok(left_int.cmp(right_int)),
        // NaN has no ordering.
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => as_float(left)
            .partial_cmp(&as_float(right))
            .ok_or_else(|| mismatch(left, op, right, span)),
        (Value::String(left_str), Value::String(right_str)) => Ok(left_str.cmp(right_str)),
        _ => Err(mismatch(left, op, right, span)),
    }
}

/// `==` semantics: numbers across Int/Float, strings, bools, `null` against
/// anything, and reference values of the same kind by identity.
fn values_equal(left: &Value, right: &Value, op: BinaryOp, span: Span) -> Result<bool, InterpreterError> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(matches!((left, right), (Value::Null, Value::Null))),
        (Value::Int(left_int), Value::Int(right_int)) => Ok(left_int == right_int),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => Ok(as_float(left) == as_float(right)),
        (Value::String(left_str), Value::String(right_str)) => Ok(left_str == right_str),
        (Value::Bool(left_bool), Value::Bool(right_bool)) => Ok(left_bool == right_bool),
        (Value::Array(_), Value::Array(_))
        | (Value::Instance(_), Value::Instance(_))
        | (Value::Function(_), Value::Function(_))
        | (Value::Class(_), Value::Class(_))
        | (Value::Struct(_), Value::Struct(_)) => Ok(left == right),
        _ => Err(mismatch(left, op, right, span)),
    }
}

pub fn eval_unary_op(op: UnaryOp, value: &Value, span: Span) -> Result<Value, InterpreterError> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| InterpreterError::overflow_at(op.symbol(), span)),
        (UnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        _ => Err(InterpreterError::type_mismatch_at(
            format!("'{}' operation", op.symbol()),
            value.type_name(),
            span,
        )),
    }
}

//! Scalar operator semantics, shared by the interpreter and constant folding
//! so that folded and executed results agree.

use core::cmp::Ordering;

use quill_values::{Number, Value};

use crate::bytecode::{BinaryOpcode, UnaryOpcode};

use super::RuntimeError;

/// Applies `op` to two numbers. Mixed operands are promoted to float; integer
/// arithmetic wraps.
pub fn numeric_binary(op: BinaryOpcode, a: Number, b: Number) -> Result<Value, RuntimeError> {
    use BinaryOpcode::*;
    let (a, b) = Number::unify(a, b);
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Ok(match op {
            Add => Value::Int(x.wrapping_add(y)),
            Sub => Value::Int(x.wrapping_sub(y)),
            Mul => Value::Int(x.wrapping_mul(y)),
            Div | Mod if y == 0 => return Err(RuntimeError::DivisionByZero),
            Div => Value::Int(x.wrapping_div(y)),
            Mod => Value::Int(x.wrapping_rem(y)),
            _ => Value::Bool(compare(op, x.cmp(&y))),
        }),
        (x, y) => {
            let (x, y) = (x.to_float(), y.to_float());
            Ok(match op {
                Add => Value::Float(x + y),
                Sub => Value::Float(x - y),
                Mul => Value::Float(x * y),
                Div | Mod if y == 0.0 => return Err(RuntimeError::DivisionByZero),
                Div => Value::Float(x / y),
                Mod => Value::Float(x % y),
                Eq => Value::Bool(x == y),
                Ne => Value::Bool(x != y),
                _ => match x.partial_cmp(&y) {
                    Some(ordering) => Value::Bool(compare(op, ordering)),
                    // NaN is unordered
                    None => Value::Bool(false),
                },
            })
        }
    }
}

/// Evaluates a comparison opcode against an ordering.
pub fn compare(op: BinaryOpcode, ordering: Ordering) -> bool {
    match op {
        BinaryOpcode::Eq => ordering == Ordering::Equal,
        BinaryOpcode::Ne => ordering != Ordering::Equal,
        BinaryOpcode::Lt => ordering == Ordering::Less,
        BinaryOpcode::Le => ordering != Ordering::Greater,
        BinaryOpcode::Gt => ordering == Ordering::Greater,
        BinaryOpcode::Ge => ordering != Ordering::Less,
        _ => false,
    }
}

/// Applies `op` to two strings: `+` concatenates, comparisons are
/// lexicographic.
pub fn string_binary(op: BinaryOpcode, a: &str, b: &str) -> Result<StringResult, RuntimeError> {
    match op {
        BinaryOpcode::Add => {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Ok(StringResult::Concat(out))
        }
        op if op.is_arithmetic() => Err(RuntimeError::InvalidOperation {
            op: op.mnemonic(),
            left: "string",
            right: "string",
        }),
        op => Ok(StringResult::Bool(compare(op, a.cmp(b)))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StringResult {
    Concat(String),
    Bool(bool),
}

/// Applies a unary opcode to a scalar.
pub fn unary(op: UnaryOpcode, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnaryOpcode::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnaryOpcode::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOpcode::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOpcode::Neg, other) => Err(RuntimeError::InvalidOperation {
            op: "neg",
            left: other.type_name(),
            right: "nothing",
        }),
        (UnaryOpcode::Not, other) => Err(RuntimeError::InvalidOperation {
            op: "not",
            left: other.type_name(),
            right: "nothing",
        }),
    }
}

/// The error for a binary opcode applied to operands it does not support.
pub fn unsupported(op: BinaryOpcode, a: &Value, b: &Value) -> RuntimeError {
    if op.is_arithmetic() {
        RuntimeError::InvalidOperation {
            op: op.mnemonic(),
            left: a.type_name(),
            right: b.type_name(),
        }
    } else {
        RuntimeError::InvalidComparison {
            left: a.type_name(),
            right: b.type_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mixed_operands_promote_to_float() {
        assert_eq!(
            numeric_binary(BinaryOpcode::Add, Number::Int(1), Number::Float(0.5)),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            numeric_binary(BinaryOpcode::Lt, Number::Float(1.5), Number::Int(2)),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(
            numeric_binary(BinaryOpcode::Add, Number::Int(i64::MAX), Number::Int(1)),
            Ok(Value::Int(i64::MIN))
        );
        assert_eq!(
            numeric_binary(BinaryOpcode::Div, Number::Int(7), Number::Int(2)),
            Ok(Value::Int(3))
        );
    }

    #[test]
    fn division_by_zero_fails_for_ints_and_floats() {
        assert_eq!(
            numeric_binary(BinaryOpcode::Div, Number::Int(1), Number::Int(0)),
            Err(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            numeric_binary(BinaryOpcode::Mod, Number::Float(1.0), Number::Float(0.0)),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn strings_concatenate_and_compare() {
        assert_eq!(
            string_binary(BinaryOpcode::Add, "ab", "cd"),
            Ok(StringResult::Concat("abcd".to_owned()))
        );
        assert_eq!(
            string_binary(BinaryOpcode::Lt, "ab", "b"),
            Ok(StringResult::Bool(true))
        );
        assert!(string_binary(BinaryOpcode::Mul, "a", "b").is_err());
    }

    #[test]
    fn unary_rejects_wrong_kinds() {
        assert_eq!(unary(UnaryOpcode::Neg, Value::Int(3)), Ok(Value::Int(-3)));
        assert_eq!(unary(UnaryOpcode::Not, Value::Bool(true)), Ok(Value::Bool(false)));
        assert!(unary(UnaryOpcode::Not, Value::Int(1)).is_err());
    }
}

use core::fmt;

/// A numeric payload extracted from a [`Value`](crate::Value).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn to_int(self) -> i64 {
        match self {
            Number::Int(i) => i,
            // `as` truncates toward zero and saturates; NaN becomes 0.
            Number::Float(f) => f as i64,
        }
    }

    pub fn to_float(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(self, Number::Int(_))
    }

    /// Brings two operands to a common representation: both stay integers
    /// when both are integers, otherwise both become floats.
    pub fn unify(a: Number, b: Number) -> (Number, Number) {
        match (a, b) {
            (Number::Int(_), Number::Int(_)) => (a, b),
            _ => (Number::Float(a.to_float()), Number::Float(b.to_float())),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 => {
                write!(f, "{:.1}", x)
            }
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

use std::cmp::Ordering;
use std::fmt;

use crate::ast::{BinOp, UnaryOp};

/// Longest string a `*` repeat may build.
const MAX_STRING_LEN: usize = 1 << 30;

/// A runtime value of the reference interpreters.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Str(_) => None,
        }
    }

    pub fn to_int(&self) -> Result<Value, String> {
        match self {
            Value::Int(v) => Ok(Value::Int(*v)),
            Value::Float(v) => Ok(Value::Int(*v as i64)),
            Value::Str(s) => s
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| format!("cannot convert '{}' to int", s)),
        }
    }

    pub fn to_float(&self) -> Result<Value, String> {
        match self {
            Value::Int(v) => Ok(Value::Float(*v as f64)),
            Value::Float(v) => Ok(Value::Float(*v)),
            Value::Str(s) => s
                .trim()
                .parse()
                .map(Value::Float)
                .map_err(|_| format!("cannot convert '{}' to float", s)),
        }
    }

    pub fn unary(op: UnaryOp, value: &Value) -> Result<Value, String> {
        match (op, value) {
            (UnaryOp::Neg, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
            (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
            (UnaryOp::Pos, v @ (Value::Int(_) | Value::Float(_))) => Ok(v.clone()),
            (_, v) => Err(format!("cannot apply {} to {}", op.mnemonic(), v.kind())),
        }
    }

    pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
        let mismatch = || {
            format!(
                "cannot apply {} to {} and {}",
                op.mnemonic(),
                lhs.kind(),
                rhs.kind()
            )
        };

        if op.is_comparison() {
            return compare(op, lhs, rhs).ok_or_else(mismatch);
        }

        match op {
            BinOp::Concat => Ok(Value::Str(format!("{}{}", lhs, rhs))),
            BinOp::Repeat => match (lhs, rhs) {
                (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) if *n >= 0 => {
                    let fits = usize::try_from(*n)
                        .ok()
                        .and_then(|count| s.len().checked_mul(count).map(|len| (count, len)));
                    match fits {
                        Some((count, len)) if len <= MAX_STRING_LEN => {
                            Ok(Value::Str(s.repeat(count)))
                        }
                        _ => Err(format!("repeat count {} is too large", n)),
                    }
                }
                _ => Err(mismatch()),
            },
            BinOp::Add => match (lhs, rhs) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
                _ => arith(op, lhs, rhs).ok_or_else(mismatch)?,
            },
            _ => arith(op, lhs, rhs).ok_or_else(mismatch)?,
        }
    }
}

/// Numeric arithmetic. `None` when an operand is not a number.
fn arith(op: BinOp, lhs: &Value, rhs: &Value) -> Option<Result<Value, String>> {
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        let (a, b) = (*a, *b);
        return Some(match op {
            BinOp::Add => Ok(Value::Int(a.wrapping_add(b))),
            BinOp::Sub => Ok(Value::Int(a.wrapping_sub(b))),
            BinOp::Mul => Ok(Value::Int(a.wrapping_mul(b))),
            BinOp::Div | BinOp::Mod if b == 0 => Err("division by zero".to_string()),
            BinOp::Div => Ok(Value::Int(a.wrapping_div(b))),
            BinOp::Mod => Ok(Value::Int(a.wrapping_rem(b))),
            BinOp::Pow if b >= 0 => match u32::try_from(b) {
                Ok(exp) => Ok(Value::Int(a.wrapping_pow(exp))),
                Err(_) => Err(format!("exponent {} is too large", b)),
            },
            BinOp::Pow => Ok(Value::Float((a as f64).powf(b as f64))),
            _ => return None,
        });
    }

    let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
    let v = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => a % b,
        BinOp::Pow => a.powf(b),
        _ => return None,
    };
    Some(Ok(Value::Float(v)))
}

fn compare(op: BinOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Str(_), _) | (_, Value::Str(_)) => None,
        _ => lhs.as_f64()?.partial_cmp(&rhs.as_f64()?),
    };
    let result = match (op, ordering) {
        (BinOp::Eq, ord) => ord == Some(Ordering::Equal),
        (BinOp::Ne, ord) => ord != Some(Ordering::Equal),
        (_, None) if matches!((lhs, rhs), (Value::Str(_), _) | (_, Value::Str(_))) => {
            return None
        }
        (_, None) => false,
        (BinOp::Lt, Some(o)) => o == Ordering::Less,
        (BinOp::Le, Some(o)) => o != Ordering::Greater,
        (BinOp::Gt, Some(o)) => o == Ordering::Greater,
        (BinOp::Ge, Some(o)) => o != Ordering::Less,
        _ => return None,
    };
    Some(Value::Int(result as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: BinOp, a: Value, b: Value) -> Result<Value, String> {
        Value::binary(op, &a, &b)
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(bin(BinOp::Add, Value::Int(2), Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(bin(BinOp::Div, Value::Int(-7), Value::Int(2)), Ok(Value::Int(-3)));
        assert_eq!(bin(BinOp::Mod, Value::Int(7), Value::Int(3)), Ok(Value::Int(1)));
        assert_eq!(bin(BinOp::Pow, Value::Int(2), Value::Int(10)), Ok(Value::Int(1024)));
        assert_eq!(bin(BinOp::Pow, Value::Int(2), Value::Int(-1)), Ok(Value::Float(0.5)));
        assert!(bin(BinOp::Div, Value::Int(1), Value::Int(0)).is_err());
    }

    #[test]
    fn test_mixed_promotes_to_float() {
        assert_eq!(
            bin(BinOp::Mul, Value::Int(2), Value::Float(1.5)),
            Ok(Value::Float(3.0))
        );
        assert_eq!(
            bin(BinOp::Lt, Value::Int(1), Value::Float(1.5)),
            Ok(Value::Int(1))
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            bin(BinOp::Concat, Value::Str("n=".into()), Value::Int(4)),
            Ok(Value::Str("n=4".into()))
        );
        assert_eq!(
            bin(BinOp::Repeat, Value::Str("ab".into()), Value::Int(3)),
            Ok(Value::Str("ababab".into()))
        );
        assert_eq!(
            bin(BinOp::Eq, Value::Str("a".into()), Value::Int(1)),
            Ok(Value::Int(0))
        );
        assert!(bin(BinOp::Lt, Value::Str("a".into()), Value::Int(1)).is_err());
        assert!(bin(BinOp::Sub, Value::Str("a".into()), Value::Int(1)).is_err());
    }

    #[test]
    fn test_oversized_repeat_is_an_error() {
        let err = bin(BinOp::Repeat, Value::Str("ab".into()), Value::Int(i64::MAX)).unwrap_err();
        assert_eq!(err, format!("repeat count {} is too large", i64::MAX));
        assert!(bin(BinOp::Repeat, Value::Int(1 << 40), Value::Str("x".into())).is_err());
        assert_eq!(
            bin(BinOp::Repeat, Value::Str(String::new()), Value::Int(i64::MAX)),
            Ok(Value::Str(String::new()))
        );
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::Str(" 42 ".into()).to_int(), Ok(Value::Int(42)));
        assert_eq!(Value::Float(2.9).to_int(), Ok(Value::Int(2)));
        assert_eq!(Value::Int(3).to_float(), Ok(Value::Float(3.0)));
        assert!(Value::Str("x".into()).to_float().is_err());
        assert_eq!(Value::Float(2.0).to_string(), "2");
    }
}

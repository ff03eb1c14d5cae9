//! Builtin operator evaluation over values.
//!
//! Integer arithmetic is checked and fails on overflow, except for the `_m`
//! (modular) and `_s` (saturating) variants. Real arithmetic may produce
//! infinities and NaNs silently.

use crate::runtime::error::{ErrorKind, RuntimeError};
use crate::value::{ByteString, Compare, Value};

/// Operator selector carried in the packed `uparam` of an AVMC record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Operator {
    // unary
    Pos = 0,
    Neg,
    Notb,
    Notl,
    Countof,
    Typeof,
    Sqrt,
    Isnan,
    Isinf,
    Abs,
    Sign,
    Round,
    Floor,
    Ceil,
    Trunc,
    Iround,
    Ifloor,
    Iceil,
    Itrunc,
    Lzcnt,
    Tzcnt,
    Popcnt,
    Inc,
    Dec,
    Unset,
    Head,
    Tail,
    Random,
    // binary
    Assign,
    Index,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpGt,
    CmpLte,
    CmpGte,
    Cmp3way,
    CmpUn,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Andb,
    Orb,
    Xorb,
    Addm,
    Subm,
    Mulm,
    Adds,
    Subs,
    Muls,
    Sll,
    Srl,
    Sla,
    Sra,
    // ternary
    Fma,
}

impl Operator {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        use Operator::*;
        const TABLE: &[Operator] = &[
            Pos, Neg, Notb, Notl, Countof, Typeof, Sqrt, Isnan, Isinf, Abs, Sign, Round, Floor,
            Ceil, Trunc, Iround, Ifloor, Iceil, Itrunc, Lzcnt, Tzcnt, Popcnt, Inc, Dec, Unset,
            Head, Tail, Random, Assign, Index, CmpEq, CmpNe, CmpLt, CmpGt, CmpLte, CmpGte, Cmp3way,
            CmpUn, Add, Sub, Mul, Div, Mod, Andb, Orb, Xorb, Addm, Subm, Mulm, Adds, Subs, Muls,
            Sll, Srl, Sla, Sra, Fma,
        ];
        TABLE.get(raw as usize).copied()
    }
}

fn overflow(op: &str, detail: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::native(
        ErrorKind::ArithmeticOverflow,
        format!("integer {op} overflow ({detail})"),
    )
}

fn not_applicable(op: &str, value: &Value) -> RuntimeError {
    RuntimeError::native(
        ErrorKind::TypeMismatch,
        format!("`{op}` not applicable (operand was of type `{}`)", value.type_name()),
    )
}

fn not_applicable2(op: &str, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::native(
        ErrorKind::TypeMismatch,
        format!(
            "`{op}` not applicable (operands were of types `{}` and `{}`)",
            lhs.type_name(),
            rhs.type_name()
        ),
    )
}

/// Duplicate a sequence in place, using binary exponential doubling. The
/// result length is bounded by the platform pointer range.
pub fn duplicate_sequence<T: Clone>(items: &mut Vec<T>, count: i64) -> Result<(), RuntimeError> {
    if count < 0 {
        return Err(RuntimeError::native(
            ErrorKind::TypeMismatch,
            format!("negative duplication count (value was `{count}`)"),
        ));
    }
    if count == 0 {
        items.clear();
        return Ok(());
    }
    if items.is_empty() || count == 1 {
        return Ok(());
    }
    let total = (items.len() as i64)
        .checked_mul(count)
        .filter(|total| *total <= isize::MAX as i64)
        .ok_or_else(|| overflow("duplication", format!("{} * {count}", items.len())))?
        as usize;
    while items.len() < total {
        let take = usize::min(total - items.len(), items.len());
        items.extend_from_within(..take);
    }
    Ok(())
}

fn real_to_integer(op: &str, real: f64) -> Result<i64, RuntimeError> {
    // 2^63 is exactly representable; anything in [-2^63, 2^63) fits.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if !real.is_finite() || !(-LIMIT..LIMIT).contains(&real) {
        return Err(overflow(op, format!("value was `{real}`")));
    }
    Ok(real as i64)
}

fn shift_count(rhs: &Value) -> Result<u32, RuntimeError> {
    let count = rhs.as_integer()?;
    if count < 0 {
        return Err(RuntimeError::native(
            ErrorKind::TypeMismatch,
            format!("negative shift count (value was `{count}`)"),
        ));
    }
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

pub fn apply_unary(op: Operator, value: Value) -> Result<Value, RuntimeError> {
    match op {
        Operator::Pos => Ok(value),
        Operator::Neg => match value {
            Value::Integer(i) => i
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(|| overflow("negation", format!("operand was `{i}`"))),
            Value::Real(r) => Ok(Value::Real(-r)),
            other => Err(not_applicable("neg", &other)),
        },
        Operator::Notb => match value {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            Value::Integer(i) => Ok(Value::Integer(!i)),
            Value::String(s) => Ok(Value::String(s.iter().map(|b| !b).collect())),
            other => Err(not_applicable("notb", &other)),
        },
        Operator::Notl => Ok(Value::Boolean(!value.test())),
        Operator::Countof => match value {
            Value::Null => Ok(Value::Integer(0)),
            Value::String(s) => Ok(Value::Integer(s.len() as i64)),
            Value::Array(a) => Ok(Value::Integer(a.len() as i64)),
            Value::Object(o) => Ok(Value::Integer(o.len() as i64)),
            other => Err(not_applicable("countof", &other)),
        },
        Operator::Typeof => Ok(Value::string(value.type_name())),
        Operator::Sqrt => Ok(Value::Real(value.as_real()?.sqrt())),
        Operator::Isnan => match value {
            Value::Integer(_) => Ok(Value::Boolean(false)),
            Value::Real(r) => Ok(Value::Boolean(r.is_nan())),
            other => Err(not_applicable("isnan", &other)),
        },
        Operator::Isinf => match value {
            Value::Integer(_) => Ok(Value::Boolean(false)),
            Value::Real(r) => Ok(Value::Boolean(r.is_infinite())),
            other => Err(not_applicable("isinf", &other)),
        },
        Operator::Abs => match value {
            Value::Integer(i) => i
                .checked_abs()
                .map(Value::Integer)
                .ok_or_else(|| overflow("absolute value", format!("operand was `{i}`"))),
            Value::Real(r) => Ok(Value::Real(r.abs())),
            other => Err(not_applicable("abs", &other)),
        },
        Operator::Sign => match value {
            Value::Integer(i) => Ok(Value::Integer(i.signum())),
            Value::Real(r) => Ok(Value::Real(r.signum())),
            other => Err(not_applicable("sign", &other)),
        },
        Operator::Round => round_real(value, f64::round, "round"),
        Operator::Floor => round_real(value, f64::floor, "floor"),
        Operator::Ceil => round_real(value, f64::ceil, "ceil"),
        Operator::Trunc => round_real(value, f64::trunc, "trunc"),
        Operator::Iround => round_integer(value, f64::round, "iround"),
        Operator::Ifloor => round_integer(value, f64::floor, "ifloor"),
        Operator::Iceil => round_integer(value, f64::ceil, "iceil"),
        Operator::Itrunc => round_integer(value, f64::trunc, "itrunc"),
        Operator::Lzcnt => Ok(Value::Integer(
            (value.as_integer()? as u64).leading_zeros() as i64
        )),
        Operator::Tzcnt => Ok(Value::Integer(
            (value.as_integer()? as u64).trailing_zeros() as i64,
        )),
        Operator::Popcnt => Ok(Value::Integer(
            (value.as_integer()? as u64).count_ones() as i64
        )),
        _ => Err(RuntimeError::native(
            ErrorKind::TypeMismatch,
            format!("`{op:?}` is not a pure unary operator"),
        )),
    }
}

fn round_real(value: Value, f: fn(f64) -> f64, op: &str) -> Result<Value, RuntimeError> {
    match value {
        Value::Integer(i) => Ok(Value::Integer(i)),
        Value::Real(r) => Ok(Value::Real(f(r))),
        other => Err(not_applicable(op, &other)),
    }
}

fn round_integer(value: Value, f: fn(f64) -> f64, op: &str) -> Result<Value, RuntimeError> {
    match value {
        Value::Integer(i) => Ok(Value::Integer(i)),
        Value::Real(r) => Ok(Value::Integer(real_to_integer(op, f(r))?)),
        other => Err(not_applicable(op, &other)),
    }
}

pub fn apply_binary(op: Operator, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match op {
        Operator::CmpEq => Ok(Value::Boolean(lhs.compare(&rhs) == Compare::Equal)),
        Operator::CmpNe => Ok(Value::Boolean(lhs.compare(&rhs) != Compare::Equal)),
        Operator::CmpLt => ordered_compare(&lhs, &rhs, "<", |c| c == Compare::Less),
        Operator::CmpGt => ordered_compare(&lhs, &rhs, ">", |c| c == Compare::Greater),
        Operator::CmpLte => ordered_compare(&lhs, &rhs, "<=", |c| c != Compare::Greater),
        Operator::CmpGte => ordered_compare(&lhs, &rhs, ">=", |c| c != Compare::Less),
        Operator::Cmp3way => Ok(match lhs.compare(&rhs) {
            Compare::Less => Value::Integer(-1),
            Compare::Equal => Value::Integer(0),
            Compare::Greater => Value::Integer(1),
            Compare::Unordered => Value::string("[unordered]"),
        }),
        Operator::CmpUn => Ok(Value::Boolean(lhs.compare(&rhs) == Compare::Unordered)),
        Operator::Add => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_add(b)
                .map(Value::Integer)
                .ok_or_else(|| overflow("addition", format!("operands were `{a}` and `{b}`"))),
            (a, b) if a.is_real() && b.is_real() => Ok(Value::Real(a.as_real()? + b.as_real()?)),
            (Value::String(mut a), Value::String(b)) => {
                a.extend_from_slice(&b);
                Ok(Value::String(a))
            }
            (a, b) => Err(not_applicable2("add", &a, &b)),
        },
        Operator::Sub => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_sub(b)
                .map(Value::Integer)
                .ok_or_else(|| overflow("subtraction", format!("operands were `{a}` and `{b}`"))),
            (a, b) if a.is_real() && b.is_real() => Ok(Value::Real(a.as_real()? - b.as_real()?)),
            (a, b) => Err(not_applicable2("sub", &a, &b)),
        },
        Operator::Mul => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_mul(b)
                .map(Value::Integer)
                .ok_or_else(|| overflow("multiplication", format!("operands were `{a}` and `{b}`"))),
            (a, b) if a.is_real() && b.is_real() => Ok(Value::Real(a.as_real()? * b.as_real()?)),
            (Value::String(mut s), Value::Integer(n)) | (Value::Integer(n), Value::String(mut s)) => {
                duplicate_sequence(&mut s, n)?;
                Ok(Value::String(s))
            }
            (Value::Array(mut a), Value::Integer(n)) | (Value::Integer(n), Value::Array(mut a)) => {
                duplicate_sequence(&mut a, n)?;
                Ok(Value::Array(a))
            }
            (a, b) => Err(not_applicable2("mul", &a, &b)),
        },
        Operator::Div => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => {
                if b == 0 {
                    return Err(RuntimeError::native(
                        ErrorKind::DivisionByZero,
                        format!("integer division by zero (operand was `{a}`)"),
                    ));
                }
                a.checked_div(b)
                    .map(Value::Integer)
                    .ok_or_else(|| overflow("division", format!("operands were `{a}` and `{b}`")))
            }
            (a, b) if a.is_real() && b.is_real() => Ok(Value::Real(a.as_real()? / b.as_real()?)),
            (a, b) => Err(not_applicable2("div", &a, &b)),
        },
        Operator::Mod => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => {
                if b == 0 {
                    return Err(RuntimeError::native(
                        ErrorKind::DivisionByZero,
                        format!("integer remainder by zero (operand was `{a}`)"),
                    ));
                }
                a.checked_rem(b)
                    .map(Value::Integer)
                    .ok_or_else(|| overflow("remainder", format!("operands were `{a}` and `{b}`")))
            }
            (a, b) if a.is_real() && b.is_real() => Ok(Value::Real(a.as_real()? % b.as_real()?)),
            (a, b) => Err(not_applicable2("mod", &a, &b)),
        },
        Operator::Addm => Ok(Value::Integer(lhs.as_integer()?.wrapping_add(rhs.as_integer()?))),
        Operator::Subm => Ok(Value::Integer(lhs.as_integer()?.wrapping_sub(rhs.as_integer()?))),
        Operator::Mulm => Ok(Value::Integer(lhs.as_integer()?.wrapping_mul(rhs.as_integer()?))),
        Operator::Adds => Ok(Value::Integer(lhs.as_integer()?.saturating_add(rhs.as_integer()?))),
        Operator::Subs => Ok(Value::Integer(lhs.as_integer()?.saturating_sub(rhs.as_integer()?))),
        Operator::Muls => Ok(Value::Integer(lhs.as_integer()?.saturating_mul(rhs.as_integer()?))),
        Operator::Andb => match (lhs, rhs) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a & b)),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a & b)),
            (Value::String(a), Value::String(b)) => {
                // Lengths align by truncation.
                Ok(Value::String(
                    a.iter().zip(b.iter()).map(|(x, y)| x & y).collect(),
                ))
            }
            (a, b) => Err(not_applicable2("andb", &a, &b)),
        },
        Operator::Orb => bytewise_padded(lhs, rhs, "orb", |x, y| x | y),
        Operator::Xorb => bytewise_padded(lhs, rhs, "xorb", |x, y| x ^ y),
        Operator::Sll => match lhs {
            Value::Integer(v) => {
                let n = shift_count(&rhs)?;
                Ok(Value::Integer(if n >= 64 { 0 } else { ((v as u64) << n) as i64 }))
            }
            Value::String(s) => Ok(Value::String(shift_bytes_left(s, shift_count(&rhs)?))),
            other => Err(not_applicable("sll", &other)),
        },
        Operator::Srl => match lhs {
            Value::Integer(v) => {
                let n = shift_count(&rhs)?;
                Ok(Value::Integer(if n >= 64 { 0 } else { ((v as u64) >> n) as i64 }))
            }
            Value::String(s) => Ok(Value::String(shift_bytes_right(s, shift_count(&rhs)?))),
            other => Err(not_applicable("srl", &other)),
        },
        Operator::Sla => match lhs {
            Value::Integer(v) => {
                let n = shift_count(&rhs)?;
                if v == 0 {
                    return Ok(Value::Integer(0));
                }
                if n >= 64 {
                    return Err(overflow("left shift", format!("operands were `{v}` and `{n}`")));
                }
                let wide = (v as i128) << n;
                i64::try_from(wide)
                    .map(Value::Integer)
                    .map_err(|_| overflow("left shift", format!("operands were `{v}` and `{n}`")))
            }
            Value::String(mut s) => {
                // Arithmetic shifts change the length.
                let n = shift_count(&rhs)? as usize;
                s.extend(std::iter::repeat(0u8).take(n));
                Ok(Value::String(s))
            }
            other => Err(not_applicable("sla", &other)),
        },
        Operator::Sra => match lhs {
            Value::Integer(v) => {
                let n = shift_count(&rhs)?;
                Ok(Value::Integer(if n >= 64 { v >> 63 } else { v >> n }))
            }
            Value::String(mut s) => {
                let n = shift_count(&rhs)? as usize;
                s.truncate(s.len().saturating_sub(n));
                Ok(Value::String(s))
            }
            other => Err(not_applicable("sra", &other)),
        },
        _ => Err(RuntimeError::native(
            ErrorKind::TypeMismatch,
            format!("`{op:?}` is not a pure binary operator"),
        )),
    }
}

pub fn apply_fma(x: Value, y: Value, z: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Real(x.as_real()?.mul_add(y.as_real()?, z.as_real()?)))
}

fn ordered_compare(
    lhs: &Value,
    rhs: &Value,
    op: &str,
    accept: fn(Compare) -> bool,
) -> Result<Value, RuntimeError> {
    match lhs.compare(rhs) {
        Compare::Unordered => Err(RuntimeError::native(
            ErrorKind::TypeMismatch,
            format!(
                "values not comparable with `{op}` (operands were of types `{}` and `{}`)",
                lhs.type_name(),
                rhs.type_name()
            ),
        )),
        ordered => Ok(Value::Boolean(accept(ordered))),
    }
}

fn bytewise_padded(
    lhs: Value,
    rhs: Value,
    op: &str,
    f: fn(u8, u8) -> u8,
) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(f(a as u8, b as u8) != 0)),
        (Value::Integer(a), Value::Integer(b)) => {
            let bytes_a = a.to_le_bytes();
            let bytes_b = b.to_le_bytes();
            let mut out = [0u8; 8];
            for k in 0..8 {
                out[k] = f(bytes_a[k], bytes_b[k]);
            }
            Ok(Value::Integer(i64::from_le_bytes(out)))
        }
        (Value::String(a), Value::String(b)) => {
            // Lengths align by zero padding.
            let (longer, shorter) = if a.len() >= b.len() { (a, b) } else { (b, a) };
            let mut out: ByteString = longer;
            for (k, byte) in shorter.iter().enumerate() {
                out[k] = f(out[k], *byte);
            }
            Ok(Value::String(out))
        }
        (a, b) => Err(not_applicable2(op, &a, &b)),
    }
}

fn shift_bytes_left(mut bytes: ByteString, count: u32) -> ByteString {
    let n = usize::min(count as usize, bytes.len());
    bytes.drain(..n);
    bytes.extend(std::iter::repeat(0u8).take(n));
    bytes
}

fn shift_bytes_right(mut bytes: ByteString, count: u32) -> ByteString {
    let n = usize::min(count as usize, bytes.len());
    bytes.truncate(bytes.len() - n);
    bytes.splice(..0, std::iter::repeat(0u8).take(n));
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::error::ErrorKind;

    #[test]
    fn checked_addition_overflows_loudly() {
        let err = apply_binary(Operator::Add, Value::Integer(i64::MAX), Value::Integer(1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArithmeticOverflow);
    }

    #[test]
    fn modular_and_saturating_variants_never_fail() {
        assert_eq!(
            apply_binary(Operator::Addm, Value::Integer(i64::MAX), Value::Integer(1)).unwrap(),
            Value::Integer(i64::MIN)
        );
        assert_eq!(
            apply_binary(Operator::Adds, Value::Integer(i64::MAX), Value::Integer(1)).unwrap(),
            Value::Integer(i64::MAX)
        );
        assert_eq!(
            apply_binary(Operator::Muls, Value::Integer(i64::MIN), Value::Integer(2)).unwrap(),
            Value::Integer(i64::MIN)
        );
    }

    #[test]
    fn division_edge_cases_fail() {
        assert_eq!(
            apply_binary(Operator::Div, Value::Integer(1), Value::Integer(0))
                .unwrap_err()
                .kind(),
            ErrorKind::DivisionByZero
        );
        assert_eq!(
            apply_binary(Operator::Div, Value::Integer(i64::MIN), Value::Integer(-1))
                .unwrap_err()
                .kind(),
            ErrorKind::ArithmeticOverflow
        );
    }

    #[test]
    fn real_arithmetic_is_silent() {
        assert_eq!(
            apply_binary(Operator::Div, Value::Real(1.0), Value::Real(0.0)).unwrap(),
            Value::Real(f64::INFINITY)
        );
        let nan = apply_binary(Operator::Div, Value::Real(0.0), Value::Real(0.0)).unwrap();
        assert_eq!(apply_unary(Operator::Isnan, nan).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn string_duplication_uses_doubling() {
        assert_eq!(
            apply_binary(Operator::Mul, Value::string("ab"), Value::Integer(3)).unwrap(),
            Value::string("ababab")
        );
        assert_eq!(
            apply_binary(Operator::Mul, Value::Integer(0), Value::string("ab")).unwrap(),
            Value::string("")
        );
        assert!(
            apply_binary(Operator::Mul, Value::string("ab"), Value::Integer(-1)).is_err()
        );
    }

    #[test]
    fn bitwise_on_strings_aligns_lengths() {
        let a = Value::String(vec![0xff, 0x0f]);
        let b = Value::String(vec![0xf0, 0xff, 0xaa]);
        assert_eq!(
            apply_binary(Operator::Andb, a.clone(), b.clone()).unwrap(),
            Value::String(vec![0xf0, 0x0f])
        );
        assert_eq!(
            apply_binary(Operator::Orb, a.clone(), b.clone()).unwrap(),
            Value::String(vec![0xff, 0xff, 0xaa])
        );
        assert_eq!(
            apply_binary(Operator::Xorb, a, b).unwrap(),
            Value::String(vec![0x0f, 0xf0, 0xaa])
        );
    }

    #[test]
    fn shifts_behave_per_kind() {
        assert_eq!(
            apply_binary(Operator::Sll, Value::Integer(1), Value::Integer(70)).unwrap(),
            Value::Integer(0)
        );
        assert_eq!(
            apply_binary(Operator::Srl, Value::Integer(-1), Value::Integer(63)).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            apply_binary(Operator::Sra, Value::Integer(-8), Value::Integer(2)).unwrap(),
            Value::Integer(-2)
        );
        assert_eq!(
            apply_binary(Operator::Sla, Value::Integer(1), Value::Integer(62))
                .unwrap(),
            Value::Integer(1 << 62)
        );
        assert_eq!(
            apply_binary(Operator::Sla, Value::Integer(1), Value::Integer(63))
                .unwrap_err()
                .kind(),
            ErrorKind::ArithmeticOverflow
        );
        assert!(apply_binary(Operator::Sll, Value::Integer(1), Value::Integer(-1)).is_err());
    }

    #[test]
    fn cmp3way_yields_sentinel_when_unordered() {
        assert_eq!(
            apply_binary(Operator::Cmp3way, Value::Integer(1), Value::Integer(2)).unwrap(),
            Value::Integer(-1)
        );
        assert_eq!(
            apply_binary(Operator::Cmp3way, Value::Integer(1), Value::string("x")).unwrap(),
            Value::string("[unordered]")
        );
    }

    #[test]
    fn countof_follows_the_algebra() {
        assert_eq!(apply_unary(Operator::Countof, Value::Null).unwrap(), Value::Integer(0));
        assert_eq!(
            apply_unary(Operator::Countof, Value::Object(Default::default())).unwrap(),
            Value::Integer(0)
        );
        let arr = Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        assert_eq!(apply_unary(Operator::Countof, arr).unwrap(), Value::Integer(3));
    }

    #[test]
    fn integer_rounding_checks_range() {
        assert_eq!(
            apply_unary(Operator::Iround, Value::Real(2.5)).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            apply_unary(Operator::Itrunc, Value::Real(-2.9)).unwrap(),
            Value::Integer(-2)
        );
        assert!(apply_unary(Operator::Iround, Value::Real(1e300)).is_err());
        assert!(apply_unary(Operator::Iround, Value::Real(f64::NAN)).is_err());
    }

    #[test]
    fn sqrt_of_negative_integer_goes_through_real() {
        let out = apply_unary(Operator::Sqrt, Value::Integer(-1)).unwrap();
        assert_eq!(apply_unary(Operator::Isnan, out).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn bit_counting() {
        assert_eq!(apply_unary(Operator::Lzcnt, Value::Integer(0)).unwrap(), Value::Integer(64));
        assert_eq!(apply_unary(Operator::Tzcnt, Value::Integer(8)).unwrap(), Value::Integer(3));
        assert_eq!(apply_unary(Operator::Popcnt, Value::Integer(-1)).unwrap(), Value::Integer(64));
    }
}

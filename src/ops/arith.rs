use crate::error::{CompileError, LookupError};
use crate::ops::{value_kind, LookupArgs, LookupSpec};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use serde_json::{Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl ArithOp {
    pub fn parse(symbol: &str) -> Result<Self, CompileError> {
        match symbol {
            "+" => Ok(Self::Add),
            "-" => Ok(Self::Sub),
            "*" => Ok(Self::Mul),
            "/" => Ok(Self::Div),
            "//" => Ok(Self::FloorDiv),
            "%" => Ok(Self::Mod),
            "^" => Ok(Self::Pow),
            other => Err(CompileError::UnknownOperator {
                op: other.to_string(),
            }),
        }
    }

    #[inline]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "^",
        }
    }
}

/// `op(node, operand)`, or `op(operand, node)` when reversed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArithmeticLookup {
    op: ArithOp,
    operand: String,
    reverse: bool,
}

impl ArithmeticLookup {
    pub fn new(op: ArithOp, operand: impl Into<String>, reverse: bool) -> Result<Self, CompileError> {
        let operand = operand.into();
        if !operand.trim().parse::<f64>().is_ok_and(f64::is_finite) {
            return Err(CompileError::InvalidArguments {
                lookup: "arith".to_string(),
                reason: format!("operand `{operand}` is not a number"),
            });
        }
        Ok(Self {
            op,
            operand,
            reverse,
        })
    }

    pub(crate) fn from_args(args: &LookupArgs) -> Result<LookupSpec, CompileError> {
        let invalid = |reason: String| CompileError::InvalidArguments {
            lookup: "arith".to_string(),
            reason,
        };
        if let Some(unknown) = args
            .named
            .keys()
            .find(|k| !matches!(k.as_str(), "op" | "operand" | "reverse"))
        {
            return Err(invalid(format!("unknown argument `{unknown}`")));
        }
        if args.positional.len() > 3 {
            return Err(invalid(format!(
                "expected at most 3 positional arguments, got {}",
                args.positional.len()
            )));
        }
        let op = pick_arg(args, 0, "op")
            .map_err(&invalid)?
            .ok_or_else(|| invalid("missing operator".to_string()))?;
        let operand = pick_arg(args, 1, "operand")
            .map_err(&invalid)?
            .ok_or_else(|| invalid("missing operand".to_string()))?;
        let reverse = match pick_arg(args, 2, "reverse").map_err(&invalid)? {
            Some(flag) => parse_flag(flag)
                .ok_or_else(|| invalid(format!("`{flag}` is not a valid reverse flag")))?,
            None => false,
        };
        Ok(LookupSpec::Arithmetic(Self::new(
            ArithOp::parse(op)?,
            operand,
            reverse,
        )?))
    }

    #[inline]
    pub const fn op(&self) -> ArithOp {
        self.op
    }

    #[inline]
    pub const fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn evaluate(&self, node: &Value) -> Result<Value, LookupError> {
        let Value::Number(n) = node else {
            return Err(LookupError::TypeMismatch {
                lookup: "arith",
                found: value_kind(node),
            });
        };
        let value = Numeric::from_number(n).ok_or_else(|| self.fail("unrepresentable number"))?;
        let operand = self.operand_like(value)?;
        let (lhs, rhs) = if self.reverse {
            (operand, value)
        } else {
            (value, operand)
        };
        let result = match (lhs, rhs) {
            (Numeric::Int(a), Numeric::Int(b)) => self.apply_int(a, b)?,
            (Numeric::Decimal(a), Numeric::Decimal(b)) => self.apply_decimal(a, b)?,
            (Numeric::Float(a), Numeric::Float(b)) => Numeric::Float(self.apply_float(a, b)?),
            _ => return Err(self.fail("mixed numeric kinds")),
        };
        result.into_value().ok_or_else(|| self.fail("result is not finite"))
    }

    /// Parses the operand into the numeric kind of `value`.
    fn operand_like(&self, value: Numeric) -> Result<Numeric, LookupError> {
        let text = self.operand.trim();
        match value {
            Numeric::Int(_) => text.parse::<i64>().map(Numeric::Int).map_err(|_| {
                LookupError::Conversion {
                    target: "int",
                    value: format!("\"{}\"", self.operand),
                }
            }),
            Numeric::Decimal(_) => Decimal::from_str_exact(text)
                .or_else(|_| Decimal::from_scientific(text))
                .map(Numeric::Decimal)
                .map_err(|_| LookupError::Conversion {
                    target: "decimal",
                    value: format!("\"{}\"", self.operand),
                }),
            Numeric::Float(_) => text.parse::<f64>().map(Numeric::Float).map_err(|_| {
                LookupError::Conversion {
                    target: "float",
                    value: format!("\"{}\"", self.operand),
                }
            }),
        }
    }

    fn apply_int(&self, a: i64, b: i64) -> Result<Numeric, LookupError> {
        let overflow = || self.fail("integer overflow");
        match self.op {
            ArithOp::Add => a.checked_add(b).map(Numeric::Int).ok_or_else(overflow),
            ArithOp::Sub => a.checked_sub(b).map(Numeric::Int).ok_or_else(overflow),
            ArithOp::Mul => a.checked_mul(b).map(Numeric::Int).ok_or_else(overflow),
            ArithOp::Div => {
                self.check_divisor(b == 0)?;
                Ok(Numeric::Float(a as f64 / b as f64))
            }
            ArithOp::FloorDiv => {
                self.check_divisor(b == 0)?;
                floor_div(a, b).map(Numeric::Int).ok_or_else(overflow)
            }
            ArithOp::Mod => {
                self.check_divisor(b == 0)?;
                floor_mod(a, b).map(Numeric::Int).ok_or_else(overflow)
            }
            ArithOp::Pow => match u32::try_from(b) {
                Ok(exp) => a.checked_pow(exp).map(Numeric::Int).ok_or_else(overflow),
                Err(_) if b < 0 => Ok(Numeric::Float((a as f64).powf(b as f64))),
                Err(_) => match a {
                    0 | 1 => Ok(Numeric::Int(a)),
                    -1 if b % 2 == 0 => Ok(Numeric::Int(1)),
                    -1 => Ok(Numeric::Int(-1)),
                    _ => Err(overflow()),
                },
            },
        }
    }

    fn apply_decimal(&self, a: Decimal, b: Decimal) -> Result<Numeric, LookupError> {
        let overflow = || self.fail("decimal overflow");
        match self.op {
            ArithOp::Add => a.checked_add(b).map(Numeric::Decimal).ok_or_else(overflow),
            ArithOp::Sub => a.checked_sub(b).map(Numeric::Decimal).ok_or_else(overflow),
            ArithOp::Mul => a.checked_mul(b).map(Numeric::Decimal).ok_or_else(overflow),
            ArithOp::Div => {
                self.check_divisor(b.is_zero())?;
                a.checked_div(b).map(Numeric::Decimal).ok_or_else(overflow)
            }
            ArithOp::FloorDiv => {
                self.check_divisor(b.is_zero())?;
                let r = floor_mod_decimal(a, b).ok_or_else(overflow)?;
                a.checked_sub(r)
                    .and_then(|whole| whole.checked_div(b))
                    .map(Numeric::Decimal)
                    .ok_or_else(overflow)
            }
            ArithOp::Mod => {
                self.check_divisor(b.is_zero())?;
                floor_mod_decimal(a, b).map(Numeric::Decimal).ok_or_else(overflow)
            }
            ArithOp::Pow => match b.fract().is_zero().then(|| b.to_i64()).flatten() {
                Some(exp) => a.checked_powi(exp).map(Numeric::Decimal).ok_or_else(overflow),
                // fractional exponents have no exact decimal result
                None => {
                    let (a, b) = a.to_f64().zip(b.to_f64()).ok_or_else(overflow)?;
                    Ok(Numeric::Float(a.powf(b)))
                }
            },
        }
    }

    fn apply_float(&self, a: f64, b: f64) -> Result<f64, LookupError> {
        match self.op {
            ArithOp::Add => Ok(a + b),
            ArithOp::Sub => Ok(a - b),
            ArithOp::Mul => Ok(a * b),
            ArithOp::Div => {
                self.check_divisor(b == 0.0)?;
                Ok(a / b)
            }
            ArithOp::FloorDiv => {
                self.check_divisor(b == 0.0)?;
                Ok((a / b).floor())
            }
            ArithOp::Mod => {
                self.check_divisor(b == 0.0)?;
                Ok(a - b * (a / b).floor())
            }
            ArithOp::Pow => Ok(a.powf(b)),
        }
    }

    #[inline]
    fn check_divisor(&self, is_zero: bool) -> Result<(), LookupError> {
        if is_zero {
            Err(self.fail("division by zero"))
        } else {
            Ok(())
        }
    }

    fn fail(&self, reason: &str) -> LookupError {
        LookupError::Arithmetic {
            op: self.op.symbol(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Numeric {
    Int(i64),
    /// Non-integer written in plain decimal notation; computed exactly.
    Decimal(Decimal),
    /// Exponent notation or more digits than a decimal holds.
    Float(f64),
}

impl Numeric {
    fn from_number(n: &Number) -> Option<Self> {
        if let Some(v) = n.as_i64() {
            return Some(Self::Int(v));
        }
        match Decimal::from_str_exact(&n.to_string()) {
            Ok(v) => Some(Self::Decimal(v)),
            Err(_) => n.as_f64().map(Self::Float),
        }
    }

    fn into_value(self) -> Option<Value> {
        match self {
            Self::Int(v) => Some(Value::from(v)),
            Self::Decimal(v) => decimal_number(v).map(Value::Number),
            Self::Float(v) => Number::from_f64(v).map(Value::Number),
        }
    }
}

/// Shortest exact text of `value`, keeping a fractional digit so the result
/// stays a decimal for the next step.
fn decimal_number(value: Decimal) -> Option<Number> {
    let mut text = value.normalize().to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    serde_json::from_str(&text).ok()
}

/// Quotient rounded toward negative infinity.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Remainder carrying the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        r.checked_add(b)
    } else {
        Some(r)
    }
}

fn floor_mod_decimal(a: Decimal, b: Decimal) -> Option<Decimal> {
    let r = a.checked_rem(b)?;
    if !r.is_zero() && (r.is_sign_negative() != b.is_sign_negative()) {
        r.checked_add(b)
    } else {
        Some(r)
    }
}

/// Argument given either at `idx` or as `name=...`, but not both.
fn pick_arg<'a>(args: &'a LookupArgs, idx: usize, name: &str) -> Result<Option<&'a str>, String> {
    match (args.positional.get(idx), args.named.get(name)) {
        (Some(_), Some(_)) => Err(format!("`{name}` given twice")),
        (Some(v), None) | (None, Some(v)) => Ok(Some(v.as_str())),
        (None, None) => Ok(None),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arith(op: &str, operand: &str, reverse: bool) -> ArithmeticLookup {
        ArithmeticLookup::new(ArithOp::parse(op).expect("known op"), operand, reverse)
            .expect("valid operand")
    }

    #[test]
    fn parses_positional_and_named_arguments() {
        let spec = ArithmeticLookup::from_args(&LookupArgs::positional(["-", "15", "true"]))
            .expect("positional args should compile");
        let LookupSpec::Arithmetic(lookup) = spec else {
            panic!("expected arithmetic lookup");
        };
        assert_eq!(lookup.op(), ArithOp::Sub);
        assert!(lookup.reverse());

        let named = LookupArgs::default()
            .with_named("op", "//")
            .with_named("operand", "2");
        let spec = ArithmeticLookup::from_args(&named).expect("named args should compile");
        assert_eq!(spec.kind(), "arith");
    }

    #[test]
    fn rejects_unsupported_operators_and_operands() {
        for op in ["&", "**"] {
            assert_eq!(
                ArithmeticLookup::from_args(&LookupArgs::positional([op, "1"]))
                    .expect_err("operator should be rejected"),
                CompileError::UnknownOperator { op: op.to_string() }
            );
        }
        assert!(matches!(
            ArithmeticLookup::from_args(&LookupArgs::positional(["+", "abc"])),
            Err(CompileError::InvalidArguments { .. })
        ));
        assert!(matches!(
            ArithmeticLookup::from_args(&LookupArgs::positional(["+"])),
            Err(CompileError::InvalidArguments { .. })
        ));
        assert!(matches!(
            ArithmeticLookup::from_args(&LookupArgs::positional(["+", "1", "maybe"])),
            Err(CompileError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn subtraction_and_reverse() {
        assert_eq!(arith("-", "10", false).evaluate(&json!(15)), Ok(json!(5)));
        assert_eq!(arith("-", "10", true).evaluate(&json!(15)), Ok(json!(-5)));
    }

    #[test]
    fn true_division_is_fractional_and_floor_division_integral() {
        assert_eq!(arith("/", "2", false).evaluate(&json!(5)), Ok(json!(2.5)));
        assert_eq!(arith("/", "2", false).evaluate(&json!(4)), Ok(json!(2.0)));
        assert_eq!(arith("//", "2", false).evaluate(&json!(5)), Ok(json!(2)));
        assert_eq!(arith("//", "2", false).evaluate(&json!(-5)), Ok(json!(-3)));
        assert_eq!(arith("//", "2", false).evaluate(&json!(5.5)), Ok(json!(2.0)));
    }

    #[test]
    fn modulo_and_power() {
        assert_eq!(arith("%", "3", false).evaluate(&json!(-7)), Ok(json!(2)));
        assert_eq!(arith("%", "-3", false).evaluate(&json!(7)), Ok(json!(-2)));
        assert_eq!(arith("^", "3", false).evaluate(&json!(2)), Ok(json!(8)));
        assert_eq!(arith("^", "-1", false).evaluate(&json!(2)), Ok(json!(0.5)));
        assert_eq!(arith("^", "2", true).evaluate(&json!(3)), Ok(json!(8)));
    }

    #[test]
    fn operand_follows_node_kind() {
        assert_eq!(arith("+", "1.5", false).evaluate(&json!(1.0)), Ok(json!(2.5)));
        assert_eq!(
            arith("+", "1.5", false).evaluate(&json!(1)),
            Err(LookupError::Conversion {
                target: "int",
                value: "\"1.5\"".to_string()
            })
        );
    }

    #[test]
    fn power_with_huge_exponent_keeps_exact_bases() {
        let huge = "5000000000";
        assert_eq!(arith("^", huge, false).evaluate(&json!(0)), Ok(json!(0)));
        assert_eq!(arith("^", huge, false).evaluate(&json!(1)), Ok(json!(1)));
        assert_eq!(arith("^", huge, false).evaluate(&json!(-1)), Ok(json!(1)));
        assert_eq!(arith("^", "5000000001", false).evaluate(&json!(-1)), Ok(json!(-1)));
        assert!(matches!(
            arith("^", huge, false).evaluate(&json!(2)),
            Err(LookupError::Arithmetic { op: "^", .. })
        ));
    }

    fn decimal(text: &str) -> Value {
        Value::Number(serde_json::from_str(text).expect("valid number text"))
    }

    #[test]
    fn plain_decimals_are_exact() {
        assert_eq!(arith("+", "0.2", false).evaluate(&decimal("0.1")), Ok(json!(0.3)));
        assert_eq!(arith("-", "0.1", false).evaluate(&decimal("0.3")), Ok(json!(0.2)));
        assert_eq!(arith("*", "3", false).evaluate(&decimal("1.1")), Ok(json!(3.3)));
        assert_eq!(
            arith("+", "0.01", false).evaluate(&decimal("12345678901234567.88")),
            Ok(decimal("12345678901234567.89"))
        );
        assert_eq!(arith("%", "3", false).evaluate(&decimal("-7.5")), Ok(json!(1.5)));
        assert_eq!(arith("//", "2", false).evaluate(&decimal("-5.5")), Ok(json!(-3.0)));
        assert_eq!(arith("^", "2", false).evaluate(&decimal("1.5")), Ok(json!(2.25)));
        let unparsable = ArithmeticLookup {
            op: ArithOp::Add,
            operand: "x1".to_string(),
            reverse: false,
        };
        assert_eq!(
            unparsable.operand_like(Numeric::Decimal(Decimal::ONE)),
            Err(LookupError::Conversion {
                target: "decimal",
                value: "\"x1\"".to_string()
            })
        );
    }

    #[test]
    fn exponent_notation_stays_float() {
        assert_eq!(arith("*", "2", false).evaluate(&decimal("1e2")), Ok(json!(200.0)));
    }

    #[test]
    fn evaluation_failures() {
        assert!(matches!(
            arith("/", "0", false).evaluate(&json!(1)),
            Err(LookupError::Arithmetic { op: "/", .. })
        ));
        assert!(matches!(
            arith("*", "2", false).evaluate(&json!(i64::MAX)),
            Err(LookupError::Arithmetic { op: "*", .. })
        ));
        assert!(matches!(
            arith("+", "1", false).evaluate(&json!("10")),
            Err(LookupError::TypeMismatch { found: "string", .. })
        ));
    }
}

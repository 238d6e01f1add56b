use crate::error::{CompileError, LookupError};
use crate::ops::{value_kind, LookupArgs, LookupSpec};
use serde_json::{Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastTarget {
    Int,
    Float,
    Decimal,
    Bool,
}

impl CastTarget {
    pub fn parse(name: &str) -> Result<Self, CompileError> {
        match name {
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "decimal" => Ok(Self::Decimal),
            "bool" => Ok(Self::Bool),
            other => Err(CompileError::UnknownType {
                name: other.to_string(),
            }),
        }
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Bool => "bool",
        }
    }
}

/// Converts a scalar node into an integer, float, decimal or boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsTypeLookup {
    target: CastTarget,
}

impl AsTypeLookup {
    pub const fn new(target: CastTarget) -> Self {
        Self { target }
    }

    pub(crate) fn from_args(args: &LookupArgs) -> Result<LookupSpec, CompileError> {
        match (args.positional.as_slice(), args.named.is_empty()) {
            ([name], true) => Ok(LookupSpec::AsType(Self::new(CastTarget::parse(name)?))),
            _ => Err(CompileError::InvalidArguments {
                lookup: "as_type".to_string(),
                reason: "expected exactly one type name".to_string(),
            }),
        }
    }

    #[inline]
    pub const fn target(&self) -> CastTarget {
        self.target
    }

    pub fn evaluate(&self, node: &Value) -> Result<Value, LookupError> {
        match self.target {
            CastTarget::Int => to_int(node),
            CastTarget::Float => to_float(node),
            CastTarget::Decimal => to_decimal(node),
            CastTarget::Bool => to_bool(node),
        }
        .ok_or_else(|| LookupError::Conversion {
            target: self.target.name(),
            value: describe(node),
        })
    }
}

fn to_int(node: &Value) -> Option<Value> {
    match node {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(Value::Number(n.clone())),
        Value::Number(n) => {
            let f = n.as_f64()?.trunc();
            // i64::MAX is not exactly representable; stay strictly below 2^63
            (f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64)
                .then(|| Value::from(f as i64))
        }
        Value::Bool(b) => Some(Value::from(i64::from(*b))),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn to_float(node: &Value) -> Option<Value> {
    let f = match node {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Number::from_f64(f).map(Value::Number)
}

/// Keeps every written digit. Numbers in exponent notation pass through as is.
fn to_decimal(node: &Value) -> Option<Value> {
    match node {
        Value::Number(n) => Some(Value::Number(
            decimal_literal(&n.to_string()).unwrap_or_else(|| n.clone()),
        )),
        Value::Bool(b) => decimal_literal(if *b { "1" } else { "0" }).map(Value::Number),
        Value::String(s) => decimal_literal(s.trim()).map(Value::Number),
        _ => None,
    }
}

fn to_bool(node: &Value) -> Option<Value> {
    match node {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::Number(n) => Some(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(Value::Bool(true)),
            "0" | "false" | "no" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// `[+-]digits[.digits]` as JSON number text with at least one fractional
/// digit, so arithmetic on it stays decimal.
fn decimal_literal(text: &str) -> Option<Number> {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }
    let int_part = match int_part.trim_start_matches('0') {
        "" => "0",
        digits => digits,
    };
    let frac_part = if frac_part.is_empty() { "0" } else { frac_part };
    serde_json::from_str(&format!("{sign}{int_part}.{frac_part}")).ok()
}

fn describe(node: &Value) -> String {
    match node {
        Value::String(s) => format!("\"{s}\""),
        Value::Array(_) | Value::Object(_) => value_kind(node).to_string(),
        other => other.to_string(),
    }
}

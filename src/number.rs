use std::fmt;

use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub, Signed, Zero};

use crate::error::{CalcError, Outcome};

/// How many significant figures a measured value carries.
///
/// `Exact` sorts above every count, so taking the minimum of two precisions
/// never lets an exact operand lower a measured result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precision {
    Significant(u32),
    Exact,
}

/// A calculator value: either an exact rational or a measured float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Always in lowest terms with a positive denominator.
    Exact(Rational64),
    Measured { value: f64, precision: Precision },
}

impl Number {
    /// Builds an exact rational, reduced to lowest terms.
    pub fn exact(numerator: i64, denominator: i64) -> Outcome<Self> {
        if denominator == 0 {
            return Err(CalcError::DivisionByZero);
        }
        let (numerator, denominator) = if denominator < 0 {
            (
                numerator.checked_neg().ok_or(CalcError::Overflow)?,
                denominator.checked_neg().ok_or(CalcError::Overflow)?,
            )
        } else {
            (numerator, denominator)
        };
        Ok(Number::Exact(Rational64::new(numerator, denominator)))
    }

    pub fn integer(value: i64) -> Self {
        Number::Exact(Rational64::from_integer(value))
    }

    pub fn measured(value: f64, significant_figures: u32) -> Self {
        Number::Measured {
            value,
            precision: Precision::Significant(significant_figures),
        }
    }

    pub fn precision(&self) -> Precision {
        match self {
            Number::Exact(_) => Precision::Exact,
            Number::Measured { precision, .. } => *precision,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Exact(r) => *r.numer() as f64 / *r.denom() as f64,
            Number::Measured { value, .. } => *value,
        }
    }

    /// Whether the rendered text is itself an operation (`p/q` or `m*10^e`)
    /// and so binds like a product inside a larger expression.
    pub fn renders_as_product(&self) -> bool {
        match self {
            Number::Exact(r) => !r.is_integer(),
            Number::Measured {
                value,
                precision: Precision::Significant(digits),
            } => scientific_parts(*value, *digits).is_some(),
            Number::Measured { .. } => false,
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Number::Exact(r) => r.is_negative(),
            Number::Measured { value, .. } => value.is_sign_negative() && *value != 0.0,
        }
    }

    pub fn add(self, rhs: Number) -> Outcome<Number> {
        match (self, rhs) {
            (Number::Exact(a), Number::Exact(b)) => exact_result(a.checked_add(&b)),
            (a, b) => measured_op(a, b, "addition", |x, y| x + y),
        }
    }

    pub fn subtract(self, rhs: Number) -> Outcome<Number> {
        match (self, rhs) {
            (Number::Exact(a), Number::Exact(b)) => exact_result(a.checked_sub(&b)),
            (a, b) => measured_op(a, b, "subtraction", |x, y| x - y),
        }
    }

    pub fn multiply(self, rhs: Number) -> Outcome<Number> {
        match (self, rhs) {
            (Number::Exact(a), Number::Exact(b)) => exact_result(a.checked_mul(&b)),
            (a, b) => measured_op(a, b, "multiplication", |x, y| x * y),
        }
    }

    pub fn divide(self, rhs: Number) -> Outcome<Number> {
        if rhs.to_f64() == 0.0 {
            return Err(CalcError::DivisionByZero);
        }
        match (self, rhs) {
            (Number::Exact(a), Number::Exact(b)) => exact_result(a.checked_div(&b)),
            (a, b) => measured_op(a, b, "division", |x, y| x / y),
        }
    }

    /// Integer powers of exact values stay exact; everything else goes
    /// through floating point.
    pub fn pow(self, exponent: Number) -> Outcome<Number> {
        match (self, exponent) {
            (Number::Exact(base), Number::Exact(exp)) if exp.is_integer() => {
                exact_pow(base, *exp.numer())
            }
            (a, b) => measured_op(a, b, "power", f64::powf),
        }
    }

    pub fn negate(self) -> Outcome<Number> {
        match self {
            Number::Exact(r) => {
                let numer = r.numer().checked_neg().ok_or(CalcError::Overflow)?;
                Ok(Number::Exact(Rational64::new_raw(numer, *r.denom())))
            }
            Number::Measured { value, precision } => Ok(Number::Measured {
                value: -value,
                precision,
            }),
        }
    }

    pub fn ln(self) -> Outcome<Number> {
        self.logarithm(f64::ln)
    }

    pub fn lg(self) -> Outcome<Number> {
        self.logarithm(f64::log10)
    }

    fn logarithm(self, f: fn(f64) -> f64) -> Outcome<Number> {
        let x = self.to_f64();
        if x <= 0.0 {
            return Err(CalcError::Undefined {
                operation: "logarithm",
            });
        }
        checked_measured(f(x), self.precision(), "logarithm")
    }
}

fn exact_result(r: Option<Rational64>) -> Outcome<Number> {
    r.map(Number::Exact).ok_or(CalcError::Overflow)
}

fn exact_pow(base: Rational64, exponent: i64) -> Outcome<Number> {
    if exponent < 0 && base.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    let magnitude = usize::try_from(exponent.unsigned_abs()).map_err(|_| CalcError::Overflow)?;
    let raised = num_traits::checked_pow(base, magnitude).ok_or(CalcError::Overflow)?;
    if exponent < 0 {
        reciprocal(raised)
    } else {
        Ok(Number::Exact(raised))
    }
}

/// `1/r` for a non-zero `r`, keeping the denominator positive without
/// negating `i64::MIN`.
fn reciprocal(r: Rational64) -> Outcome<Number> {
    let (numer, denom) = (*r.numer(), *r.denom());
    let (numer, denom) = if numer < 0 {
        (
            numer.checked_neg().ok_or(CalcError::Overflow)?,
            denom.checked_neg().ok_or(CalcError::Overflow)?,
        )
    } else {
        (numer, denom)
    };
    Ok(Number::Exact(Rational64::new_raw(denom, numer)))
}

/// Mixed or measured arithmetic: exact operands join as measured values
/// with `Precision::Exact`, and the result keeps the smaller precision.
fn measured_op(
    a: Number,
    b: Number,
    operation: &'static str,
    f: impl FnOnce(f64, f64) -> f64,
) -> Outcome<Number> {
    let precision = a.precision().min(b.precision());
    checked_measured(f(a.to_f64(), b.to_f64()), precision, operation)
}

fn checked_measured(value: f64, precision: Precision, operation: &'static str) -> Outcome<Number> {
    if value.is_nan() {
        Err(CalcError::Undefined { operation })
    } else if value.is_infinite() {
        Err(CalcError::Overflow)
    } else {
        Ok(Number::Measured { value, precision })
    }
}

/// Formats `value` with exactly `digits` significant digits. Values that
/// positional notation can't show faithfully come out as `m*10^e`, which
/// reads back as the same measured value.
fn round_to_significant(value: f64, digits: u32) -> String {
    match scientific_parts(value, digits) {
        Some((mantissa, exponent)) => format!("{mantissa}*10^{exponent}"),
        None => {
            let digits = digits.max(1) as i32;
            let decimals = (digits - 1 - decimal_exponent(value, digits)).max(0) as usize;
            format!("{:.*}", decimals, value)
        }
    }
}

/// Mantissa and exponent, when positional notation would either show digits
/// that aren't significant or need more than four leading zeros.
fn scientific_parts(value: f64, digits: u32) -> Option<(String, i32)> {
    let digits = digits.max(1) as i32;
    let exponent = decimal_exponent(value, digits);
    if exponent >= -4 && exponent < digits {
        return None;
    }
    let scientific = format!("{:.*e}", (digits - 1) as usize, value);
    let (mantissa, _) = scientific.split_once('e')?;
    Some((mantissa.to_string(), exponent))
}

/// The exponent of `value` once rounded to `digits` significant digits.
fn decimal_exponent(value: f64, digits: i32) -> i32 {
    format!("{:.*e}", (digits - 1) as usize, value)
        .split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Exact(r) if r.is_integer() => write!(f, "{}", r.numer()),
            Number::Exact(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            Number::Measured {
                value,
                precision: Precision::Exact,
            } => write!(f, "{value}"),
            Number::Measured {
                value,
                precision: Precision::Significant(digits),
            } => f.write_str(&round_to_significant(*value, *digits)),
        }
    }
}

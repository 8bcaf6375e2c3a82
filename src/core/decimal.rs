//! Scale and rounding operations over [`rust_decimal::Decimal`].
//!
//! `Decimal` already carries an explicit scale (count of fractional digits).
//! This module adds the operations money arithmetic needs on top of it:
//! scale changes that refuse to silently lose digits, exact division
//! detection, and rounding to arbitrary intervals.

use crate::arithmetic::context;
use crate::error::{MoneyError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Largest scale representable by the 96-bit decimal mantissa.
pub const MAX_SCALE: u32 = 28;

/// How to resolve digits dropped by a scale reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundingMode {
    /// Away from zero.
    Up,
    /// Towards zero (truncation).
    Down,
    /// Towards positive infinity.
    Ceiling,
    /// Towards negative infinity.
    Floor,
    /// Nearest neighbour, ties away from zero.
    HalfUp,
    /// Nearest neighbour, ties towards zero.
    HalfDown,
    /// Nearest neighbour, ties to the even digit (banker's rounding).
    HalfEven,
    /// Asserts that no rounding is needed; fails when digits would be lost.
    Unnecessary,
}

impl RoundingMode {
    pub const ALL: [RoundingMode; 8] = [
        RoundingMode::Up,
        RoundingMode::Down,
        RoundingMode::Ceiling,
        RoundingMode::Floor,
        RoundingMode::HalfUp,
        RoundingMode::HalfDown,
        RoundingMode::HalfEven,
        RoundingMode::Unnecessary,
    ];

    /// The matching `rust_decimal` strategy, `None` for [`RoundingMode::Unnecessary`].
    pub fn strategy(self) -> Option<RoundingStrategy> {
        match self {
            RoundingMode::Up => Some(RoundingStrategy::AwayFromZero),
            RoundingMode::Down => Some(RoundingStrategy::ToZero),
            RoundingMode::Ceiling => Some(RoundingStrategy::ToPositiveInfinity),
            RoundingMode::Floor => Some(RoundingStrategy::ToNegativeInfinity),
            RoundingMode::HalfUp => Some(RoundingStrategy::MidpointAwayFromZero),
            RoundingMode::HalfDown => Some(RoundingStrategy::MidpointTowardZero),
            RoundingMode::HalfEven => Some(RoundingStrategy::MidpointNearestEven),
            RoundingMode::Unnecessary => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoundingMode::Up => "UP",
            RoundingMode::Down => "DOWN",
            RoundingMode::Ceiling => "CEILING",
            RoundingMode::Floor => "FLOOR",
            RoundingMode::HalfUp => "HALF_UP",
            RoundingMode::HalfDown => "HALF_DOWN",
            RoundingMode::HalfEven => "HALF_EVEN",
            RoundingMode::Unnecessary => "UNNECESSARY",
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        RoundingMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| format!("unknown rounding mode: {s}"))
    }
}

/// Sum of two values; the result keeps the larger operand scale.
pub fn add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or(MoneyError::Overflow { operation: "add" })
}

/// Difference of two values; the result keeps the larger operand scale.
pub fn subtract(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_sub(b)
        .ok_or(MoneyError::Overflow {
            operation: "subtract",
        })
}

/// Full-precision product (scale is the sum of operand scales).
pub fn multiply_exact(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b).ok_or(MoneyError::Overflow {
        operation: "multiply",
    })
}

/// Product brought back to the larger of the two operand scales.
///
/// Digits beyond that scale are resolved with `mode`, falling back to the
/// active rounding context and finally to [`RoundingMode::Unnecessary`].
pub fn multiply(a: Decimal, b: Decimal, mode: Option<RoundingMode>) -> Result<Decimal> {
    let target = a.scale().max(b.scale());
    let product = multiply_exact(a, b)?;
    set_scale(product, target, context::resolve_rounding(mode))
}

/// Numeric comparison, ignoring representation scale.
pub fn compare(a: Decimal, b: Decimal) -> Ordering {
    a.cmp(&b)
}

/// `true` when both values have the same numeric value and the same scale.
pub fn same_representation(a: Decimal, b: Decimal) -> bool {
    a == b && a.scale() == b.scale()
}

/// Change the scale of `value` to exactly `scale` digits.
///
/// Increasing the scale pads with zeros. Decreasing it drops digits using
/// `mode`; with [`RoundingMode::Unnecessary`] only zero digits may be dropped,
/// otherwise [`MoneyError::RoundingRequired`] is returned.
pub fn set_scale(value: Decimal, scale: u32, mode: RoundingMode) -> Result<Decimal> {
    if scale > MAX_SCALE {
        return Err(MoneyError::Overflow {
            operation: "set_scale",
        });
    }

    let mut result = if scale < value.scale() {
        match mode.strategy() {
            Some(strategy) => value.round_dp_with_strategy(scale, strategy),
            None => {
                let truncated = value.round_dp_with_strategy(scale, RoundingStrategy::ToZero);
                if truncated != value {
                    return Err(MoneyError::RoundingRequired { value, scale });
                }
                truncated
            }
        }
    } else {
        value
    };

    result.rescale(scale);
    if result.scale() != scale {
        // The mantissa could not hold the padded value.
        return Err(MoneyError::Overflow {
            operation: "set_scale",
        });
    }
    Ok(result)
}

/// Whether `dividend / divisor` has a finite decimal expansion.
///
/// After reducing the fraction of mantissas, the expansion terminates iff the
/// remaining denominator has no prime factors other than 2 and 5.
pub fn terminates(dividend: Decimal, divisor: Decimal) -> bool {
    let numerator = dividend.mantissa().unsigned_abs();
    let denominator = divisor.mantissa().unsigned_abs();
    if denominator == 0 {
        return false;
    }
    if numerator == 0 {
        return true;
    }

    let mut reduced = denominator / gcd(numerator, denominator);
    while reduced % 2 == 0 {
        reduced /= 2;
    }
    while reduced % 5 == 0 {
        reduced /= 5;
    }
    reduced == 1
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Exact quotient, or [`MoneyError::InexactDivision`] when it does not
/// terminate within [`MAX_SCALE`] digits.
pub fn divide_exact(dividend: Decimal, divisor: Decimal) -> Result<Decimal> {
    if divisor.is_zero() {
        return Err(MoneyError::DivisionByZero {
            operation: "divide",
        });
    }
    if !terminates(dividend, divisor) {
        return Err(MoneyError::InexactDivision { dividend, divisor });
    }
    let quotient = dividend
        .checked_div(divisor)
        .ok_or(MoneyError::Overflow {
            operation: "divide",
        })?;
    // Terminating but longer than 28 digits: rust_decimal rounded it.
    if quotient.checked_mul(divisor) != Some(dividend) {
        return Err(MoneyError::InexactDivision { dividend, divisor });
    }
    Ok(quotient)
}

/// Quotient at the given scale.
///
/// With [`RoundingMode::Unnecessary`] the quotient must terminate
/// ([`MoneyError::InexactDivision`]) and fit in `scale` digits
/// ([`MoneyError::RoundingRequired`]).
pub fn divide(
    dividend: Decimal,
    divisor: Decimal,
    scale: u32,
    mode: RoundingMode,
) -> Result<Decimal> {
    if divisor.is_zero() {
        return Err(MoneyError::DivisionByZero {
            operation: "divide",
        });
    }
    match mode {
        RoundingMode::Unnecessary => set_scale(divide_exact(dividend, divisor)?, scale, mode),
        _ => {
            let quotient = dividend
                .checked_div(divisor)
                .ok_or(MoneyError::Overflow {
                    operation: "divide",
                })?;
            let quotient = if terminates(dividend, divisor) {
                quotient
            } else {
                off_boundary(quotient, dividend, divisor, scale)
            };
            set_scale(quotient, scale, mode)
        }
    }
}

/// Move a 28-digit approximation of a non-terminating quotient off a
/// rounding boundary at `scale`.
///
/// Every mode decides on the `scale + 1` grid (grid points and midpoints).
/// A non-terminating quotient never sits on that grid, but its approximation
/// can. When it does, the exact remainder tells which side the true value
/// lies on and the approximation is nudged there by a sub-grid step.
fn off_boundary(quotient: Decimal, dividend: Decimal, divisor: Decimal, scale: u32) -> Decimal {
    if scale + 2 > MAX_SCALE || quotient.normalize().scale() > scale + 1 {
        return quotient;
    }
    let Some(product) = exact_product(quotient.normalize(), divisor) else {
        return quotient;
    };
    let above = match dividend.cmp(&product) {
        Ordering::Equal => return quotient,
        Ordering::Greater => divisor.is_sign_positive(),
        Ordering::Less => divisor.is_sign_negative(),
    };
    let step = Decimal::new(if above { 1 } else { -1 }, scale + 2);
    quotient.checked_add(step).unwrap_or(quotient)
}

/// Product of two values, or `None` when it does not fit a `Decimal` exactly.
fn exact_product(a: Decimal, b: Decimal) -> Option<Decimal> {
    let mut mantissa = a.mantissa().checked_mul(b.mantissa())?;
    let mut scale = a.scale() + b.scale();
    while scale > 0 && mantissa % 10 == 0 {
        mantissa /= 10;
        scale -= 1;
    }
    if scale > MAX_SCALE {
        return None;
    }
    Decimal::try_from_i128_with_scale(mantissa, scale).ok()
}

/// Round `value` to the nearest multiple of `interval` (e.g. `0.05`).
///
/// The result keeps the larger of the value and interval scales.
pub fn round_to_interval(value: Decimal, interval: Decimal, mode: RoundingMode) -> Result<Decimal> {
    if interval.is_zero() {
        return Err(MoneyError::DivisionByZero {
            operation: "round_to",
        });
    }
    let interval = interval.abs();
    let steps = divide(value, interval, 0, mode).map_err(|err| match err {
        MoneyError::InexactDivision { .. } => MoneyError::RoundingRequired {
            value,
            scale: interval.scale(),
        },
        other => other,
    })?;
    let rounded = multiply_exact(steps, interval)?;
    set_scale(
        rounded,
        value.scale().max(interval.scale()),
        RoundingMode::Unnecessary,
    )
}

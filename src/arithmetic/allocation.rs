use crate::core::money::Money;
use crate::error::{MoneyError, Result};
use rust_decimal::Decimal;

/// Split `money` into parts proportional to `ratios` without losing a unit.
///
/// Work happens on the amount's smallest units at its current scale. Every
/// share is first truncated toward zero; the units left over are then handed
/// out one at a time to shares with a non-zero ratio, in index order starting
/// at 0. The parts always sum to `money`, sign included.
///
/// Individual ratios may be zero or negative as long as their sum is
/// positive; a negative ratio yields a share of the opposite sign.
///
/// # Examples
///
/// ```
/// use coinage::arithmetic::allocation::allocate;
/// use coinage::core::currency::Currency;
/// use coinage::core::money::Money;
/// use rust_decimal_macros::dec;
///
/// let usd = Currency::new("USD", 2).unwrap();
/// let parts = allocate(&Money::new(usd, dec!(100)).unwrap(), &[dec!(1), dec!(1), dec!(1)]).unwrap();
///
/// let amounts: Vec<_> = parts.iter().map(|m| m.amount()).collect();
/// assert_eq!(amounts, vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
/// ```
pub fn allocate(money: &Money, ratios: &[Decimal]) -> Result<Vec<Money>> {
    if ratios.is_empty() {
        return Err(invalid("ratios must not be empty"));
    }

    let weights = integer_weights(ratios)?;
    let total: i128 = weights
        .iter()
        .try_fold(0i128, |acc, w| acc.checked_add(*w))
        .ok_or(MoneyError::Overflow {
            operation: "allocate",
        })?;
    if total <= 0 {
        return Err(invalid("ratios must have a positive sum"));
    }

    let units = money.minor_units();
    let scale = money.scale();

    let mut shares = weights
        .iter()
        .map(|w| {
            units
                .checked_mul(*w)
                .map(|product| product / total)
                .ok_or(MoneyError::Overflow {
                    operation: "allocate",
                })
        })
        .collect::<Result<Vec<i128>>>()?;

    let allocated: i128 = shares.iter().sum();
    let mut remainder = units - allocated;
    // Mixed-sign ratios can leave a remainder opposite in sign to `units`.
    let step = remainder.signum();
    let recipients: Vec<usize> = (0..weights.len()).filter(|&i| weights[i] != 0).collect();

    for &i in recipients.iter().cycle() {
        if remainder == 0 {
            break;
        }
        shares[i] += step;
        remainder -= step;
    }

    log::trace!(
        "allocated {} {} across {} shares",
        money.amount(),
        money.id(),
        shares.len()
    );

    shares
        .into_iter()
        .map(|share| {
            Decimal::try_from_i128_with_scale(share, scale)
                .map(|amount| money.with_amount(amount))
                .map_err(|_| MoneyError::Overflow {
                    operation: "allocate",
                })
        })
        .collect()
}

/// Split `money` into `n` near-equal parts; earlier parts receive the extra units.
pub fn distribute(money: &Money, n: usize) -> Result<Vec<Money>> {
    if n == 0 {
        return Err(invalid("cannot distribute into zero parts"));
    }
    allocate(money, &vec![Decimal::ONE; n])
}

/// Ratios brought to a common scale as integers, reduced by their gcd.
fn integer_weights(ratios: &[Decimal]) -> Result<Vec<i128>> {
    let scale = ratios.iter().map(Decimal::scale).max().unwrap_or(0);
    let weights = ratios
        .iter()
        .map(|r| {
            10i128
                .checked_pow(scale - r.scale())
                .and_then(|factor| r.mantissa().checked_mul(factor))
                .ok_or(MoneyError::Overflow {
                    operation: "allocate",
                })
        })
        .collect::<Result<Vec<i128>>>()?;

    let divisor = weights.iter().fold(0i128, |acc, w| gcd(acc, w.abs()));
    if divisor > 1 {
        Ok(weights.into_iter().map(|w| w / divisor).collect())
    } else {
        Ok(weights)
    }
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn invalid(reason: &str) -> MoneyError {
    MoneyError::InvalidAllocation {
        reason: reason.to_string(),
    }
}

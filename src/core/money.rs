use crate::arithmetic::context;
use crate::core::currency::{Currency, CurrencyId, Scale};
use crate::core::decimal::{self, RoundingMode};
use crate::error::{MoneyError, Result};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A currency-tagged decimal amount.
///
/// Money binds a snapshot of its [`Currency`]; later registry changes never
/// affect existing values. The amount's scale normally equals the currency's
/// nominal scale. When an operation produces a different scale (adding a
/// value that was rescaled, rounding to a finer interval), the carried
/// currency snapshot's scale is updated to match.
///
/// Arithmetic and ordering across different currency ids fail with
/// [`MoneyError::CurrencyMismatch`]; equality simply returns `false`.
///
/// # Examples
///
/// ```
/// use coinage::core::currency::Currency;
/// use coinage::core::money::Money;
/// use rust_decimal_macros::dec;
///
/// let pln = Currency::new("PLN", 2).unwrap();
/// let a = Money::new(pln.clone(), dec!(10.5)).unwrap();
/// let b = Money::new(pln, dec!(0.25)).unwrap();
///
/// let total = a.add(&b).unwrap();
/// assert_eq!(total.amount(), dec!(10.75));
/// assert_eq!(total.to_string(), "10.75 PLN");
/// ```
#[derive(Debug, Clone)]
pub struct Money {
    currency: Currency,
    amount: Decimal,
}

impl Money {
    /// Create money at the currency's nominal scale.
    ///
    /// Extra digits are resolved with the active rounding context; without
    /// one, they must be zeros. Auto-scaled currencies keep `amount` verbatim.
    pub fn new(currency: Currency, amount: Decimal) -> Result<Self> {
        Self::with_rounding(currency, amount, None)
    }

    /// Like [`Money::new`] with an explicit rounding mode.
    pub fn with_rounding(
        currency: Currency,
        amount: Decimal,
        mode: Option<RoundingMode>,
    ) -> Result<Self> {
        let amount = match currency.nominal_scale() {
            Some(scale) => decimal::set_scale(amount, scale, context::resolve_rounding(mode))?,
            None => amount,
        };
        Ok(Self { currency, amount })
    }

    /// Parse a plain decimal string (`"12.30"`, `"-0.5"`) into money.
    pub fn parse(currency: Currency, input: &str) -> Result<Self> {
        let amount = Decimal::from_str(input.trim()).map_err(|err| MoneyError::InvalidAmount {
            input: input.to_string(),
            reason: err.to_string(),
        })?;
        Self::new(currency, amount)
    }

    /// Zero at the currency's nominal scale (scale 0 when auto-scaled).
    pub fn zero(currency: Currency) -> Self {
        let mut amount = Decimal::ZERO;
        if let Some(scale) = currency.nominal_scale() {
            amount.rescale(scale);
        }
        Self { currency, amount }
    }

    /// Money from a count of smallest units, e.g. `1234` cents → `12.34`.
    pub fn of_minor(currency: Currency, units: i64) -> Result<Self> {
        let scale = currency.nominal_scale().ok_or_else(|| {
            MoneyError::invalid_spec(
                currency.id().as_str(),
                "auto-scaled currency has no smallest unit",
            )
        })?;
        Ok(Self {
            amount: Decimal::new(units, scale),
            currency,
        })
    }

    // --- Accessors ---

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn id(&self) -> &CurrencyId {
        self.currency.id()
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Scale of the amount.
    pub fn scale(&self) -> u32 {
        self.amount.scale()
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Integer part, truncated toward zero.
    pub fn major(&self) -> Decimal {
        self.amount.trunc()
    }

    /// Fractional part expressed in smallest units (`12.34` → `34`).
    pub fn minor(&self) -> Decimal {
        let mut fraction = self.amount - self.amount.trunc();
        fraction.set_sign_positive(self.amount.is_sign_positive() || fraction.is_zero());
        Decimal::from_i128_with_scale(fraction.mantissa(), 0)
    }

    /// Whole amount in smallest units of the current scale.
    pub fn minor_units(&self) -> i128 {
        self.amount.mantissa()
    }

    // --- Arithmetic ---

    pub fn negate(&self) -> Self {
        self.with_amount(-self.amount)
    }

    pub fn abs(&self) -> Self {
        self.with_amount(self.amount.abs())
    }

    /// Sum of two amounts in the same currency; scale is the larger of the two.
    pub fn add(&self, other: &Money) -> Result<Self> {
        self.ensure_same_currency("add", other)?;
        let sum = decimal::add(self.amount, other.amount)?;
        Ok(self.wider(other).with_amount(sum))
    }

    pub fn subtract(&self, other: &Money) -> Result<Self> {
        self.ensure_same_currency("subtract", other)?;
        let difference = decimal::subtract(self.amount, other.amount)?;
        Ok(self.wider(other).with_amount(difference))
    }

    /// Sum of many amounts, starting from zero in `currency`.
    pub fn sum<'a>(
        currency: &Currency,
        items: impl IntoIterator<Item = &'a Money>,
    ) -> Result<Self> {
        items
            .into_iter()
            .try_fold(Money::zero(currency.clone()), |acc, item| acc.add(item))
    }

    pub fn multiply(&self, factor: Decimal) -> Result<Self> {
        self.multiply_all_with([factor], None)
    }

    /// Multiply by a chain of factors.
    ///
    /// The product is brought back to the nominal scale once at the end,
    /// or after every factor when the context enables rescale-each-step.
    pub fn multiply_all(&self, factors: impl IntoIterator<Item = Decimal>) -> Result<Self> {
        self.multiply_all_with(factors, None)
    }

    pub fn multiply_all_with(
        &self,
        factors: impl IntoIterator<Item = Decimal>,
        mode: Option<RoundingMode>,
    ) -> Result<Self> {
        let mode = context::resolve_rounding(mode);
        let each_step = context::rescale_each_step();

        let mut acc = self.amount;
        for factor in factors {
            acc = decimal::multiply_exact(acc, factor)?;
            if each_step {
                acc = self.fit_nominal(acc, mode)?;
            }
        }
        Ok(self.with_amount(self.fit_nominal(acc, mode)?))
    }

    pub fn divide(&self, divisor: Decimal) -> Result<Self> {
        self.divide_all_with([divisor], None)
    }

    /// Divide by a chain of divisors; rescaling follows the same rules as
    /// [`Money::multiply_all`].
    ///
    /// A quotient that cannot be represented at the nominal scale without a
    /// rounding mode fails with [`MoneyError::RoundingRequired`].
    pub fn divide_all(&self, divisors: impl IntoIterator<Item = Decimal>) -> Result<Self> {
        self.divide_all_with(divisors, None)
    }

    pub fn divide_all_with(
        &self,
        divisors: impl IntoIterator<Item = Decimal>,
        mode: Option<RoundingMode>,
    ) -> Result<Self> {
        let mode = context::resolve_rounding(mode);
        let each_step = context::rescale_each_step();

        let divisors: Vec<Decimal> = divisors.into_iter().collect();
        let mut acc = self.amount;
        let mut exact = true;
        for (i, &divisor) in divisors.iter().enumerate() {
            if divisor.is_zero() {
                return Err(MoneyError::DivisionByZero {
                    operation: "divide",
                });
            }
            let terminates = decimal::terminates(acc, divisor);
            let last = i + 1 == divisors.len();
            acc = match (each_step || last, self.currency.nominal_scale()) {
                (true, Some(scale)) => decimal::divide(acc, divisor, scale, mode)
                    .map_err(|err| self.rounding_required(err, acc))?,
                _ if mode == RoundingMode::Unnecessary => decimal::divide_exact(acc, divisor)
                    .map_err(|err| self.rounding_required(err, acc))?,
                _ => acc.checked_div(divisor).ok_or(MoneyError::Overflow {
                    operation: "divide",
                })?,
            };
            exact &= terminates;
        }

        let amount = match self.currency.nominal_scale() {
            Some(scale) => decimal::set_scale(acc, scale, mode)?,
            None if exact => acc,
            None => decimal::set_scale(acc, self.amount.scale(), mode)?,
        };
        Ok(self.with_amount(amount))
    }

    /// Ratio of two amounts in the same currency; units cancel.
    ///
    /// Terminating ratios are exact. Otherwise a rounding mode must be
    /// resolvable and the quotient is kept at full precision.
    pub fn ratio(&self, other: &Money) -> Result<Decimal> {
        self.ensure_same_currency("divide", other)?;
        if other.amount.is_zero() {
            return Err(MoneyError::DivisionByZero {
                operation: "divide",
            });
        }
        if decimal::terminates(self.amount, other.amount) {
            return decimal::divide_exact(self.amount, other.amount);
        }
        match context::resolve_rounding(None) {
            RoundingMode::Unnecessary => Err(MoneyError::InexactDivision {
                dividend: self.amount,
                divisor: other.amount,
            }),
            _ => self
                .amount
                .checked_div(other.amount)
                .ok_or(MoneyError::Overflow {
                    operation: "divide",
                }),
        }
    }

    /// Convert into `target` using a caller-supplied rate
    /// (1 unit of this currency = `rate` units of `target`).
    pub fn convert(
        &self,
        target: &Currency,
        rate: Decimal,
        mode: Option<RoundingMode>,
    ) -> Result<Self> {
        if rate <= Decimal::ZERO {
            return Err(MoneyError::InvalidRate {
                from: self.id().clone(),
                to: target.id().clone(),
                rate,
            });
        }
        let converted = decimal::multiply_exact(self.amount, rate)?;
        Self::with_rounding(target.clone(), converted, mode)
    }

    // --- Scale and rounding ---

    /// Round the amount to `scale` digits but keep the current scale
    /// (`10.015` → `10.020` at scale 2, half-even).
    pub fn round(&self, scale: u32, mode: Option<RoundingMode>) -> Result<Self> {
        let rounded = decimal::set_scale(self.amount, scale, context::resolve_rounding(mode))?;
        let restored = decimal::set_scale(rounded, self.amount.scale(), RoundingMode::Unnecessary)?;
        Ok(self.with_amount(restored))
    }

    /// Change the scale of the amount (and of the carried currency snapshot).
    pub fn rescale(&self, scale: u32, mode: Option<RoundingMode>) -> Result<Self> {
        let amount = decimal::set_scale(self.amount, scale, context::resolve_rounding(mode))?;
        Ok(self.with_amount(amount))
    }

    /// Round to the nearest multiple of `interval`, e.g. `0.05`.
    pub fn round_to(&self, interval: Decimal, mode: Option<RoundingMode>) -> Result<Self> {
        let amount =
            decimal::round_to_interval(self.amount, interval, context::resolve_rounding(mode))?;
        Ok(self.with_amount(amount))
    }

    // --- Comparison ---

    /// Ordering of two amounts in the same currency.
    pub fn compare(&self, other: &Money) -> Result<Ordering> {
        self.ensure_same_currency("compare", other)?;
        Ok(decimal::compare(self.amount, other.amount))
    }

    pub fn is_greater_than(&self, other: &Money) -> Result<bool> {
        Ok(self.compare(other)? == Ordering::Greater)
    }

    pub fn is_less_than(&self, other: &Money) -> Result<bool> {
        Ok(self.compare(other)? == Ordering::Less)
    }

    pub fn min(&self, other: &Money) -> Result<Self> {
        Ok(match self.compare(other)? {
            Ordering::Greater => other.clone(),
            _ => self.clone(),
        })
    }

    pub fn max(&self, other: &Money) -> Result<Self> {
        Ok(match self.compare(other)? {
            Ordering::Less => other.clone(),
            _ => self.clone(),
        })
    }

    /// Same currency id, regardless of the snapshot's other fields.
    pub fn same_currency(&self, other: &Money) -> bool {
        self.id() == other.id()
    }

    // --- Internals ---

    pub(crate) fn ensure_same_currency(
        &self,
        operation: &'static str,
        other: &Money,
    ) -> Result<()> {
        if self.same_currency(other) {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch {
                operation,
                left: self.id().clone(),
                right: other.id().clone(),
            })
        }
    }

    /// The operand whose amount carries the larger scale.
    fn wider<'a>(&'a self, other: &'a Money) -> &'a Money {
        if other.amount.scale() > self.amount.scale() {
            other
        } else {
            self
        }
    }

    /// Same currency with a new amount; a fixed-scale snapshot follows the amount's scale.
    pub(crate) fn with_amount(&self, amount: Decimal) -> Self {
        let currency = match self.currency.scale() {
            Scale::Fixed(s) if s != amount.scale() => {
                self.currency.with_scale(Scale::Fixed(amount.scale()))
            }
            _ => self.currency.clone(),
        };
        Self { currency, amount }
    }

    fn fit_nominal(&self, value: Decimal, mode: RoundingMode) -> Result<Decimal> {
        match self.currency.nominal_scale() {
            Some(scale) => decimal::set_scale(value, scale, mode),
            None => Ok(value),
        }
    }

    fn rounding_required(&self, err: MoneyError, value: Decimal) -> MoneyError {
        match err {
            MoneyError::InexactDivision { .. } => MoneyError::RoundingRequired {
                value,
                scale: self
                    .currency
                    .nominal_scale()
                    .unwrap_or_else(|| self.amount.scale()),
            },
            other => other,
        }
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.same_currency(other) && self.amount == other.amount
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arithmetic::context::{with_rescale_each, with_rounding};
    use rust_decimal_macros::dec;

    fn pln() -> Currency {
        Currency::new("PLN", 2).unwrap()
    }

    fn money(amount: Decimal) -> Money {
        Money::new(pln(), amount).unwrap()
    }

    #[test]
    fn test_new_applies_nominal_scale() {
        let m = money(dec!(12.3));
        assert_eq!(m.scale(), 2);
        assert_eq!(m.to_string(), "12.30 PLN");
        assert!(matches!(
            Money::new(pln(), dec!(1.005)),
            Err(MoneyError::RoundingRequired { .. })
        ));
        let rounded = Money::with_rounding(pln(), dec!(1.005), Some(RoundingMode::HalfUp)).unwrap();
        assert_eq!(rounded.amount(), dec!(1.01));
    }

    #[test]
    fn test_auto_scaled_keeps_amount() {
        let xau = Currency::builder("XAU").auto_scaled().build().unwrap();
        let m = Money::new(xau, dec!(1.23456789)).unwrap();
        assert_eq!(m.scale(), 8);
        let doubled = m.multiply(dec!(2)).unwrap();
        assert_eq!(doubled.amount(), dec!(2.46913578));
    }

    #[test]
    fn test_add_mismatch() {
        let eur = Money::new(Currency::new("EUR", 2).unwrap(), dec!(1)).unwrap();
        let usd = Money::new(Currency::new("USD", 2).unwrap(), dec!(1)).unwrap();
        assert!(matches!(
            eur.add(&usd),
            Err(MoneyError::CurrencyMismatch {
                operation: "add",
                ..
            })
        ));
        assert!(eur != usd);
        assert!(eur.compare(&usd).is_err());
    }

    #[test]
    fn test_add_takes_larger_scale() {
        let a = money(dec!(1.25));
        let fine = money(dec!(0.5)).rescale(4, None).unwrap();
        let sum = a.add(&fine).unwrap();
        assert_eq!(sum.scale(), 4);
        assert_eq!(sum.currency().scale(), Scale::Fixed(4));
        assert_eq!(sum.amount(), dec!(1.75));
    }

    #[test]
    fn test_equality_ignores_representation() {
        assert_eq!(money(dec!(1)), money(dec!(1.00)));
        let wide = money(dec!(1)).rescale(4, None).unwrap();
        assert_eq!(money(dec!(1)), wide);
    }

    #[test]
    fn test_divide_requires_rounding() {
        let m = money(dec!(100));
        assert!(matches!(
            m.divide(dec!(3)),
            Err(MoneyError::RoundingRequired { .. })
        ));
        let third = with_rounding(RoundingMode::HalfUp, || m.divide(dec!(3))).unwrap();
        assert_eq!(third.amount(), dec!(33.33));
        assert_eq!(m.divide(dec!(4)).unwrap().amount(), dec!(25.00));
    }

    #[test]
    fn test_divide_rounds_up_past_decimal_precision() {
        let m = money(dec!(1000000000.00));
        let divisor = dec!(0.9999999999999999999999999999);
        let up = m.divide_all_with([divisor], Some(RoundingMode::Up)).unwrap();
        assert_eq!(up.amount(), dec!(1000000000.01));
        let floor = m.divide_all_with([divisor], Some(RoundingMode::Floor)).unwrap();
        assert_eq!(floor.amount(), dec!(1000000000.00));
    }

    #[test]
    fn test_divide_by_zero() {
        assert!(matches!(
            money(dec!(1)).divide(Decimal::ZERO),
            Err(MoneyError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_rescale_each_step_changes_result() {
        let m = money(dec!(10.00));
        let factors = [dec!(0.3335), dec!(3)];

        let once = with_rounding(RoundingMode::HalfUp, || m.multiply_all(factors)).unwrap();
        // 10 * 0.3335 * 3 = 10.005
        assert_eq!(once.amount(), dec!(10.01));

        let each = with_rounding(RoundingMode::HalfUp, || {
            with_rescale_each(true, || m.multiply_all(factors))
        })
        .unwrap();
        // 10 * 0.3335 = 3.335 → 3.34, * 3 = 10.02
        assert_eq!(each.amount(), dec!(10.02));

        let divisors = [dec!(6), dec!(0.5)];
        let once = with_rounding(RoundingMode::HalfUp, || m.divide_all(divisors)).unwrap();
        // 10 / 6 / 0.5 = 3.333..
        assert_eq!(once.amount(), dec!(3.33));
        let each = with_rounding(RoundingMode::HalfUp, || {
            with_rescale_each(true, || m.divide_all(divisors))
        })
        .unwrap();
        // 10 / 6 = 1.67, / 0.5 = 3.34
        assert_eq!(each.amount(), dec!(3.34));

        let up_once = m
            .divide_all_with([dec!(3), dec!(0.5)], Some(RoundingMode::Up))
            .unwrap();
        // 10 / 3 / 0.5 = 6.666.. → 6.67
        assert_eq!(up_once.amount(), dec!(6.67));
        let up_each = with_rescale_each(true, || {
            m.divide_all_with([dec!(3), dec!(0.5)], Some(RoundingMode::Up))
        })
        .unwrap();
        // 10 / 3 = 3.34 (up), / 0.5 = 6.68
        assert_eq!(up_each.amount(), dec!(6.68));
    }

    #[test]
    fn test_ratio() {
        let a = money(dec!(100));
        let b = money(dec!(8));
        assert_eq!(a.ratio(&b).unwrap(), dec!(12.5));
        assert!(matches!(
            a.ratio(&money(dec!(3))),
            Err(MoneyError::InexactDivision { .. })
        ));
    }

    #[test]
    fn test_round_keeps_scale() {
        let m = Money::new(Currency::new("BHD", 3).unwrap(), dec!(10.005)).unwrap();
        let r = m.round(2, Some(RoundingMode::HalfEven)).unwrap();
        assert_eq!(r.amount(), dec!(10.00));
        assert_eq!(r.scale(), 3);

        let m = Money::new(Currency::new("BHD", 3).unwrap(), dec!(10.015)).unwrap();
        let r = m.round(2, Some(RoundingMode::HalfEven)).unwrap();
        assert_eq!(r.amount(), dec!(10.02));
    }

    #[test]
    fn test_round_to_interval() {
        let chf = Currency::new("CHF", 2).unwrap();
        let m = Money::new(chf, dec!(3.57)).unwrap();
        let r = m.round_to(dec!(0.05), Some(RoundingMode::HalfUp)).unwrap();
        assert_eq!(r.amount(), dec!(3.55));
        assert_eq!(r.scale(), 2);
    }

    #[test]
    fn test_major_minor() {
        let m = money(dec!(-12.34));
        assert_eq!(m.major(), dec!(-12));
        assert_eq!(m.minor(), dec!(-34));
        assert_eq!(m.minor_units(), -1234);
        assert_eq!(Money::of_minor(pln(), 1234).unwrap().amount(), dec!(12.34));
    }

    #[test]
    fn test_convert() {
        let eur = Currency::new("EUR", 2).unwrap();
        let m = money(dec!(100));
        let converted = m
            .convert(&eur, dec!(0.2345), Some(RoundingMode::HalfEven))
            .unwrap();
        assert_eq!(converted.amount(), dec!(23.45));
        assert_eq!(converted.id().as_str(), "EUR");
        assert!(matches!(
            m.convert(&eur, dec!(-1), None),
            Err(MoneyError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_min_max_and_sum() {
        let a = money(dec!(1));
        let b = money(dec!(2));
        assert_eq!(a.max(&b).unwrap(), b);
        assert_eq!(a.min(&b).unwrap(), a);
        assert!(b.is_greater_than(&a).unwrap());
        assert_eq!(Money::sum(&pln(), [&a, &b]).unwrap().amount(), dec!(3.00));
    }

    #[test]
    fn test_parse() {
        assert_eq!(Money::parse(pln(), " 12.3 ").unwrap().amount(), dec!(12.30));
        assert!(matches!(
            Money::parse(pln(), "twelve"),
            Err(MoneyError::InvalidAmount { .. })
        ));
    }
}

use crate::core::decimal::MAX_SCALE;
use crate::error::{MoneyError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scale sentinel meaning "auto-scaled" in seed and export data.
pub const AUTO_SCALE: i64 = -1;

/// Numeric-code sentinel meaning "no numeric code" in seed and export data.
pub const NO_NUMERIC: i64 = -1;

/// Domain tag of current ISO 4217 currencies.
pub const ISO_4217: &str = "ISO-4217";

/// Domain tag of retired ISO 4217 currencies.
pub const ISO_4217_LEGACY: &str = "ISO-4217-LEGACY";

/// Domain tag of crypto currencies.
pub const CRYPTO: &str = "CRYPTO";

/// Namespace that legacy ISO currencies are moved into.
pub const LEGACY_NAMESPACE: &str = "iso-4217-legacy";

/// Currency identifier, optionally namespaced (`PLN`, `crypto/ETH`).
///
/// Identifiers are normalized on construction: surrounding whitespace is
/// trimmed, the namespace is lower-cased and the code is upper-cased.
///
/// # Examples
///
/// ```
/// use coinage::core::currency::CurrencyId;
///
/// let eth = CurrencyId::new(" Crypto/eth ");
/// assert_eq!(eth.as_str(), "crypto/ETH");
/// assert_eq!(eth.namespace(), Some("crypto"));
/// assert_eq!(eth.code(), "ETH");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyId(String);

impl CurrencyId {
    pub fn new(id: impl AsRef<str>) -> Self {
        let id = id.as_ref().trim();
        match id.split_once('/') {
            Some((ns, code)) => Self(format!(
                "{}/{}",
                ns.trim().to_lowercase(),
                code.trim().to_uppercase()
            )),
            None => Self(id.to_uppercase()),
        }
    }

    /// Build a namespaced identifier from its parts.
    pub fn namespaced(namespace: &str, code: &str) -> Self {
        Self::new(format!("{namespace}/{code}"))
    }

    /// Parse and validate an identifier.
    pub fn parse(id: &str) -> Result<Self> {
        let candidate = Self::new(id);
        candidate.validate()?;
        Ok(candidate)
    }

    fn validate(&self) -> Result<()> {
        let raw = self.0.as_str();
        if raw.is_empty() {
            return Err(MoneyError::invalid_spec(raw, "identifier must not be empty"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(MoneyError::invalid_spec(
                raw,
                "identifier must not contain whitespace",
            ));
        }
        if raw.matches('/').count() > 1 {
            return Err(MoneyError::invalid_spec(
                raw,
                "identifier may contain at most one namespace separator",
            ));
        }
        if let Some((ns, code)) = raw.split_once('/') {
            if ns.is_empty() || code.is_empty() {
                return Err(MoneyError::invalid_spec(
                    raw,
                    "namespace and code must both be non-empty",
                ));
            }
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The namespace part, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once('/').map(|(ns, _)| ns)
    }

    /// The code part (the whole id when not namespaced).
    pub fn code(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(_, code)| code)
    }

    pub fn is_namespaced(&self) -> bool {
        self.namespace().is_some()
    }

    /// The same code without a namespace.
    pub fn bare(&self) -> Self {
        Self(self.code().to_string())
    }
}

impl fmt::Display for CurrencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Classification tag used by the kind, domain and trait hierarchies.
///
/// Tags are compared verbatim; `ISO-4217`, `FIAT` and `token/erc20` are all
/// valid tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// ISO 3166 country code, upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CountryCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Nominal scale of a currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Scale {
    /// Fixed number of fractional digits.
    Fixed(u32),
    /// The amount's own scale is used verbatim.
    Auto,
}

impl Scale {
    pub fn fixed(self) -> Option<u32> {
        match self {
            Scale::Fixed(s) => Some(s),
            Scale::Auto => None,
        }
    }

    pub fn is_auto(self) -> bool {
        matches!(self, Scale::Auto)
    }
}

impl TryFrom<i64> for Scale {
    type Error = String;

    fn try_from(raw: i64) -> std::result::Result<Self, Self::Error> {
        match raw {
            AUTO_SCALE => Ok(Scale::Auto),
            s if (0..=MAX_SCALE as i64).contains(&s) => Ok(Scale::Fixed(s as u32)),
            s => Err(format!(
                "scale must be between 0 and {MAX_SCALE} or {AUTO_SCALE} (auto), got {s}"
            )),
        }
    }
}

impl From<Scale> for i64 {
    fn from(scale: Scale) -> Self {
        match scale {
            Scale::Fixed(s) => s as i64,
            Scale::Auto => AUTO_SCALE,
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scale::Fixed(s) => write!(f, "{s}"),
            Scale::Auto => f.write_str("auto"),
        }
    }
}

/// Immutable descriptor of a monetary unit.
///
/// Two currencies with the same [`CurrencyId`] are the same currency; other
/// fields describe a particular version of it. Setters are copy-on-write.
///
/// # Examples
///
/// ```
/// use coinage::core::currency::{Currency, Scale};
///
/// let pln = Currency::builder("PLN")
///     .numeric(985)
///     .scale(2)
///     .kind("FIAT")
///     .domain("ISO-4217")
///     .build()
///     .unwrap();
///
/// assert_eq!(pln.scale(), Scale::Fixed(2));
/// assert_eq!(pln.weight(), 0);
/// assert!(!pln.is_weight_explicit());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Currency {
    id: CurrencyId,
    numeric: Option<u32>,
    scale: Scale,
    kind: Option<Tag>,
    domain: Option<Tag>,
    weight: i32,
    weight_explicit: bool,
}

impl Currency {
    /// Start building a currency; validation happens in [`CurrencyBuilder::build`].
    pub fn builder(id: impl AsRef<str>) -> CurrencyBuilder {
        CurrencyBuilder::new(id)
    }

    /// A currency with just an id and a fixed scale.
    pub fn new(id: impl AsRef<str>, scale: u32) -> Result<Self> {
        Self::builder(id).scale(scale as i64).build()
    }

    // --- Accessors ---

    pub fn id(&self) -> &CurrencyId {
        &self.id
    }

    pub fn code(&self) -> &str {
        self.id.code()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.id.namespace()
    }

    pub fn numeric(&self) -> Option<u32> {
        self.numeric
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// The fixed scale, `None` when auto-scaled.
    pub fn nominal_scale(&self) -> Option<u32> {
        self.scale.fixed()
    }

    pub fn is_auto_scaled(&self) -> bool {
        self.scale.is_auto()
    }

    pub fn kind(&self) -> Option<&Tag> {
        self.kind.as_ref()
    }

    pub fn domain(&self) -> Option<&Tag> {
        self.domain.as_ref()
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    /// Whether the weight was set deliberately rather than defaulted.
    pub fn is_weight_explicit(&self) -> bool {
        self.weight_explicit
    }

    /// One smallest unit of this currency (`0.01` for scale 2).
    /// `None` for auto-scaled currencies.
    pub fn unit(&self) -> Option<Decimal> {
        self.nominal_scale().map(|s| Decimal::new(1, s))
    }

    // --- Copy-on-write setters ---

    pub fn with_id(&self, id: CurrencyId) -> Self {
        Self { id, ..self.clone() }
    }

    pub fn with_numeric(&self, numeric: Option<u32>) -> Self {
        Self {
            numeric,
            ..self.clone()
        }
    }

    pub fn with_scale(&self, scale: Scale) -> Self {
        Self {
            scale,
            ..self.clone()
        }
    }

    pub fn with_kind(&self, kind: Option<Tag>) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    pub fn with_domain(&self, domain: Option<Tag>) -> Self {
        Self {
            domain,
            ..self.clone()
        }
    }

    /// Set the weight explicitly (also when it is 0).
    pub fn with_weight(&self, weight: i32) -> Self {
        Self {
            weight,
            weight_explicit: true,
            ..self.clone()
        }
    }

    /// Set the weight without marking it explicit.
    pub fn with_implicit_weight(&self, weight: i32) -> Self {
        Self {
            weight,
            weight_explicit: false,
            ..self.clone()
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Validating builder for [`Currency`].
///
/// Numeric code and scale accept the `-1` sentinels ([`NO_NUMERIC`],
/// [`AUTO_SCALE`]) used by seed data.
#[derive(Debug, Clone)]
pub struct CurrencyBuilder {
    id: String,
    numeric: i64,
    scale: i64,
    kind: Option<String>,
    domain: Option<String>,
    weight: Option<i64>,
}

impl CurrencyBuilder {
    fn new(id: impl AsRef<str>) -> Self {
        Self {
            id: id.as_ref().to_string(),
            numeric: NO_NUMERIC,
            scale: AUTO_SCALE,
            kind: None,
            domain: None,
            weight: None,
        }
    }

    pub fn numeric(mut self, numeric: i64) -> Self {
        self.numeric = numeric;
        self
    }

    pub fn scale(mut self, scale: i64) -> Self {
        self.scale = scale;
        self
    }

    pub fn auto_scaled(mut self) -> Self {
        self.scale = AUTO_SCALE;
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Explicit weight; omitting it leaves an implicit weight of 0.
    pub fn weight(mut self, weight: i64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn build(self) -> Result<Currency> {
        let id = CurrencyId::parse(&self.id)?;

        let numeric = match self.numeric {
            NO_NUMERIC => None,
            n => Some(u32::try_from(n).map_err(|_| {
                MoneyError::invalid_spec(
                    id.as_str(),
                    format!("numeric code must be non-negative or {NO_NUMERIC}, got {n}"),
                )
            })?),
        };

        let scale = Scale::try_from(self.scale)
            .map_err(|reason| MoneyError::invalid_spec(id.as_str(), reason))?;

        let weight = match self.weight {
            Some(w) => Some(i32::try_from(w).map_err(|_| {
                MoneyError::invalid_spec(id.as_str(), format!("weight out of range: {w}"))
            })?),
            None => None,
        };

        let kind = non_blank_tag(self.kind);
        let domain = non_blank_tag(self.domain)
            .or_else(|| id.namespace().map(|ns| Tag::new(ns.to_uppercase())));

        Ok(Currency {
            id,
            numeric,
            scale,
            kind,
            domain,
            weight: weight.unwrap_or(0),
            weight_explicit: weight.is_some(),
        })
    }
}

fn non_blank_tag(raw: Option<String>) -> Option<Tag> {
    raw.map(Tag::new).filter(|t| !t.as_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_id_normalization() {
        assert_eq!(CurrencyId::new(" pln ").as_str(), "PLN");
        assert_eq!(CurrencyId::new("Crypto/usdt").as_str(), "crypto/USDT");
        assert_eq!(CurrencyId::new("crypto/ETH").code(), "ETH");
        assert_eq!(CurrencyId::new("PLN").namespace(), None);
        assert_eq!(CurrencyId::new("crypto/ETH").bare(), CurrencyId::new("ETH"));
    }

    #[test]
    fn test_currency_id_validation() {
        assert!(CurrencyId::parse("").is_err());
        assert!(CurrencyId::parse("a/b/c").is_err());
        assert!(CurrencyId::parse("/ETH").is_err());
        assert!(CurrencyId::parse("crypto/").is_err());
        assert!(CurrencyId::parse("US D").is_err());
        assert!(CurrencyId::parse("crypto/ETH").is_ok());
    }

    #[test]
    fn test_builder_defaults() {
        let c = Currency::builder("XAU").build().unwrap();
        assert_eq!(c.scale(), Scale::Auto);
        assert_eq!(c.numeric(), None);
        assert_eq!(c.weight(), 0);
        assert!(!c.is_weight_explicit());
        assert_eq!(c.domain(), None);
        assert_eq!(c.unit(), None);
    }

    #[test]
    fn test_domain_from_namespace() {
        let eth = Currency::builder("crypto/ETH").scale(18).build().unwrap();
        assert_eq!(eth.domain(), Some(&Tag::new("CRYPTO")));

        let explicit = Currency::builder("crypto/ETH")
            .domain("CUSTOM")
            .build()
            .unwrap();
        assert_eq!(explicit.domain(), Some(&Tag::new("CUSTOM")));
    }

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            Currency::builder("PLN").scale(-2).build(),
            Err(MoneyError::InvalidCurrencySpec { .. })
        ));
        assert!(Currency::builder("PLN").scale(29).build().is_err());
        assert!(Currency::builder("PLN").numeric(-5).build().is_err());
        assert!(Currency::builder("PLN").weight(i64::MAX).build().is_err());
        assert!(Currency::builder("PLN").numeric(0).build().is_ok());
    }

    #[test]
    fn test_explicit_zero_weight() {
        let c = Currency::builder("PLN").weight(0).build().unwrap();
        assert_eq!(c.weight(), 0);
        assert!(c.is_weight_explicit());
    }

    #[test]
    fn test_copy_on_write() {
        let pln = Currency::new("PLN", 2).unwrap();
        let heavy = pln.with_weight(10);
        assert_eq!(pln.weight(), 0);
        assert_eq!(heavy.weight(), 10);
        assert_eq!(heavy.id(), pln.id());
        assert_ne!(heavy, pln);

        let rescaled = pln.with_scale(Scale::Fixed(4));
        assert_eq!(rescaled.unit(), Some(dec!(0.0001)));
        assert_eq!(pln.unit(), Some(dec!(0.01)));
    }

    #[test]
    fn test_scale_sentinel_conversion() {
        assert_eq!(Scale::try_from(-1).unwrap(), Scale::Auto);
        assert_eq!(Scale::try_from(8).unwrap(), Scale::Fixed(8));
        assert!(Scale::try_from(-7).is_err());
        assert_eq!(i64::from(Scale::Auto), AUTO_SCALE);
    }
}

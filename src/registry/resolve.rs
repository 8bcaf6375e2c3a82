use super::store::{Properties, Registry, DEFAULT_LOCALE};
use crate::core::currency::{
    CountryCode, Currency, CurrencyId, Tag, CRYPTO, ISO_4217, ISO_4217_LEGACY,
};
use crate::error::{MoneyError, Result};
use std::cmp::Reverse;
use std::fmt;

/// Kind tag of government-issued currencies.
pub const KIND_FIAT: &str = "FIAT";

/// Kind tag of ISO funds codes (`USN`, `CLF`, ...).
pub const KIND_FUNDS: &str = "FUNDS";

/// Kind tag of stablecoins.
pub const KIND_STABLECOIN: &str = "STABLECOIN";

/// Trait tag marking a value-stable currency.
pub const TRAIT_STABLE: &str = "stable";

/// Anything a currency can be looked up by.
///
/// Strings convert into [`CurrencyRef::Id`]; resolving a bare id that is not
/// registered falls back to a code lookup across namespaces.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrencyRef {
    Id(CurrencyId),
    /// Bare code shared by any number of namespaced currencies.
    Code(String),
    Numeric(u32),
    Country(CountryCode),
    /// A currency value; resolves to itself.
    Direct(Currency),
}

impl fmt::Display for CurrencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrencyRef::Id(id) => write!(f, "{id}"),
            CurrencyRef::Code(code) => write!(f, "code {code}"),
            CurrencyRef::Numeric(n) => write!(f, "numeric {n:03}"),
            CurrencyRef::Country(c) => write!(f, "country {c}"),
            CurrencyRef::Direct(c) => write!(f, "{}", c.id()),
        }
    }
}

impl From<&str> for CurrencyRef {
    fn from(s: &str) -> Self {
        CurrencyRef::Id(CurrencyId::new(s))
    }
}

impl From<CurrencyId> for CurrencyRef {
    fn from(id: CurrencyId) -> Self {
        CurrencyRef::Id(id)
    }
}

impl From<&CurrencyId> for CurrencyRef {
    fn from(id: &CurrencyId) -> Self {
        CurrencyRef::Id(id.clone())
    }
}

impl From<u32> for CurrencyRef {
    fn from(numeric: u32) -> Self {
        CurrencyRef::Numeric(numeric)
    }
}

impl From<CountryCode> for CurrencyRef {
    fn from(country: CountryCode) -> Self {
        CurrencyRef::Country(country)
    }
}

impl From<Currency> for CurrencyRef {
    fn from(currency: Currency) -> Self {
        CurrencyRef::Direct(currency)
    }
}

impl From<&Currency> for CurrencyRef {
    fn from(currency: &Currency) -> Self {
        CurrencyRef::Direct(currency.clone())
    }
}

impl Registry {
    /// Resolve a reference to a single currency.
    ///
    /// Ids hit the table directly. Codes, numeric codes and countries pick
    /// the candidate with the highest weight, then the one registered first.
    ///
    /// # Examples
    ///
    /// ```
    /// use coinage::core::currency::Currency;
    /// use coinage::registry::Registry;
    ///
    /// let registry = Registry::new()
    ///     .register(Currency::builder("USDT").scale(2).build().unwrap())
    ///     .register(Currency::builder("crypto/USDT").scale(6).weight(10).build().unwrap());
    ///
    /// assert_eq!(registry.resolve("USDT").unwrap().id().as_str(), "USDT");
    /// assert_eq!(registry.resolve("crypto/usdt").unwrap().nominal_scale(), Some(6));
    ///
    /// let by_code = coinage::registry::CurrencyRef::Code("USDT".into());
    /// assert_eq!(registry.resolve(by_code).unwrap().id().as_str(), "crypto/USDT");
    /// ```
    pub fn resolve(&self, reference: impl Into<CurrencyRef>) -> Result<Currency> {
        let reference = reference.into();
        self.find(&reference)
            .cloned()
            .ok_or_else(|| MoneyError::not_found(&reference))
    }

    /// Like [`Registry::resolve`] but returns `None` instead of an error.
    pub fn find<'a>(&'a self, reference: &'a CurrencyRef) -> Option<&'a Currency> {
        match reference {
            CurrencyRef::Id(id) => self.get(id).or_else(|| {
                if id.is_namespaced() {
                    None
                } else {
                    self.by_code(id.code())
                }
            }),
            CurrencyRef::Code(code) => self.by_code(code),
            CurrencyRef::Numeric(n) => self.by_numeric(*n),
            CurrencyRef::Country(c) => self.by_country(c),
            CurrencyRef::Direct(c) => Some(c),
        }
    }

    /// Every currency matching a reference, best candidate first.
    pub fn candidates<'a>(&'a self, reference: &'a CurrencyRef) -> Vec<&'a Currency> {
        match reference {
            CurrencyRef::Id(id) => self.get(id).into_iter().collect(),
            CurrencyRef::Code(code) => self.code_candidates(code),
            CurrencyRef::Numeric(n) => self.numeric_candidates(*n),
            CurrencyRef::Country(c) => self.country_candidates(c),
            CurrencyRef::Direct(c) => vec![c],
        }
    }

    pub fn by_code(&self, code: &str) -> Option<&Currency> {
        self.code_candidates(code).into_iter().next()
    }

    pub fn by_numeric(&self, numeric: u32) -> Option<&Currency> {
        self.numeric_candidates(numeric).into_iter().next()
    }

    pub fn by_country(&self, country: &CountryCode) -> Option<&Currency> {
        self.country_candidates(country).into_iter().next()
    }

    fn code_candidates(&self, code: &str) -> Vec<&Currency> {
        let code = code.trim().to_uppercase();
        self.ranked(self.currencies().filter(|c| c.code() == code))
    }

    fn numeric_candidates(&self, numeric: u32) -> Vec<&Currency> {
        self.ranked(self.currencies().filter(|c| c.numeric() == Some(numeric)))
    }

    fn country_candidates(&self, country: &CountryCode) -> Vec<&Currency> {
        self.ranked(
            self.countries
                .get(country)
                .into_iter()
                .flatten()
                .filter_map(|id| self.get(id)),
        )
    }

    /// Currencies whose domain is `domain` or derives from it, ordered by id.
    pub fn of_domain(&self, domain: impl Into<Tag>) -> Vec<&Currency> {
        let domain = domain.into();
        self.currencies()
            .filter(|c| self.is_domain(c, &domain))
            .collect()
    }

    /// Currencies whose kind is `kind` or derives from it, ordered by id.
    pub fn of_kind(&self, kind: impl Into<Tag>) -> Vec<&Currency> {
        let kind = kind.into();
        self.currencies().filter(|c| self.is_kind(c, &kind)).collect()
    }

    /// Currencies carrying `tag` or a trait derived from it, ordered by id.
    pub fn of_trait(&self, tag: impl Into<Tag>) -> Vec<&Currency> {
        let tag = tag.into();
        self.currencies().filter(|c| self.has_trait(c, &tag)).collect()
    }

    // --- Predicates ---

    pub fn is_kind(&self, currency: &Currency, kind: &Tag) -> bool {
        currency
            .kind()
            .is_some_and(|k| self.hierarchies.kind.isa(k, kind))
    }

    pub fn is_domain(&self, currency: &Currency, domain: &Tag) -> bool {
        currency
            .domain()
            .is_some_and(|d| self.hierarchies.domain.isa(d, domain))
    }

    pub fn has_trait(&self, currency: &Currency, tag: &Tag) -> bool {
        self.traits
            .get(currency.id())
            .is_some_and(|tags| tags.iter().any(|t| self.hierarchies.traits.isa(t, tag)))
    }

    /// Retired ISO 4217 currency.
    pub fn is_legacy(&self, currency: &Currency) -> bool {
        self.is_domain(currency, &Tag::new(ISO_4217_LEGACY))
    }

    /// Current ISO 4217 currency.
    pub fn is_iso(&self, currency: &Currency) -> bool {
        self.is_domain(currency, &Tag::new(ISO_4217)) && !self.is_legacy(currency)
    }

    pub fn is_crypto(&self, currency: &Currency) -> bool {
        let crypto = Tag::new(CRYPTO);
        self.is_domain(currency, &crypto) || self.is_kind(currency, &crypto)
    }

    pub fn is_fiat(&self, currency: &Currency) -> bool {
        self.is_kind(currency, &Tag::new(KIND_FIAT))
    }

    pub fn is_funds(&self, currency: &Currency) -> bool {
        self.is_kind(currency, &Tag::new(KIND_FUNDS))
    }

    /// Stablecoin by kind, or any currency tagged with the `stable` trait.
    pub fn is_stable(&self, currency: &Currency) -> bool {
        self.is_kind(currency, &Tag::new(KIND_STABLECOIN))
            || self.has_trait(currency, &Tag::new(TRAIT_STABLE))
    }

    // --- Localized data ---

    /// Properties for `locale`, falling back from `pl_PL` to `pl` to `*`.
    pub fn localized(&self, id: &CurrencyId, locale: &str) -> Option<&Properties> {
        let entries = self.localized.get(id)?;
        locale_chain(locale)
            .into_iter()
            .find_map(|candidate| entries.get(&candidate))
    }

    /// A single property with per-key locale fallback.
    pub fn localized_property(&self, id: &CurrencyId, locale: &str, key: &str) -> Option<&str> {
        let entries = self.localized.get(id)?;
        locale_chain(locale)
            .into_iter()
            .filter_map(|candidate| entries.get(&candidate))
            .find_map(|props| props.get(key))
            .map(String::as_str)
    }

    /// Candidates sorted by rank.
    fn ranked<'a>(&'a self, found: impl Iterator<Item = &'a Currency>) -> Vec<&'a Currency> {
        let mut found: Vec<&Currency> = found.collect();
        found.sort_by_key(|c| self.rank(c));
        found
    }

    /// Sort key: higher weight first, then earlier registration.
    fn rank(&self, currency: &Currency) -> (Reverse<i32>, u64) {
        (Reverse(currency.weight()), self.sequence_of(currency.id()))
    }
}

/// Locales to try, most specific first.
fn locale_chain(locale: &str) -> Vec<String> {
    let locale = locale.trim();
    let mut chain = Vec::with_capacity(3);
    if !locale.is_empty() && locale != DEFAULT_LOCALE {
        chain.push(locale.to_string());
        if let Some((language, _)) = locale.split_once(['_', '-']) {
            chain.push(language.to_string());
        }
    }
    chain.push(DEFAULT_LOCALE.to_string());
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CurrencyId {
        CurrencyId::new(s)
    }

    fn currency(code: &str, numeric: i64, weight: Option<i64>) -> Currency {
        let builder = Currency::builder(code).numeric(numeric).scale(2);
        match weight {
            Some(w) => builder.weight(w).build().unwrap(),
            None => builder.build().unwrap(),
        }
    }

    #[test]
    fn test_highest_weight_wins() {
        let r = Registry::new()
            .register(currency("XYZ", 999, None))
            .register(currency("custom/XYZ", 999, Some(5)));

        assert_eq!(r.by_numeric(999).unwrap().id(), &id("custom/XYZ"));
        assert_eq!(r.by_code("xyz").unwrap().id(), &id("custom/XYZ"));
        // Exact id still wins for a bare id lookup.
        assert_eq!(r.resolve("XYZ").unwrap().id(), &id("XYZ"));
    }

    #[test]
    fn test_equal_weight_first_registered_wins() {
        let r = Registry::new()
            .register(currency("b/XYZ", 999, None))
            .register(currency("a/XYZ", 999, None));
        assert_eq!(r.by_numeric(999).unwrap().id(), &id("b/XYZ"));

        let ranked: Vec<_> = r
            .candidates(&CurrencyRef::Numeric(999))
            .iter()
            .map(|c| c.id().to_string())
            .collect();
        assert_eq!(ranked, vec!["b/XYZ", "a/XYZ"]);
    }

    #[test]
    fn test_country_resolution() {
        let r = Registry::new()
            .register(currency("PLN", 985, None))
            .register(currency("iso-4217-legacy/PLZ", 616, Some(-100)))
            .add_countries(&id("PLN"), ["PL"])
            .unwrap()
            .add_countries(&id("iso-4217-legacy/PLZ"), ["PL"])
            .unwrap();
        let found = r.resolve(CountryCode::new("pl")).unwrap();
        assert_eq!(found.id(), &id("PLN"));
    }

    #[test]
    fn test_not_found() {
        let err = Registry::new().resolve("crypto/NOPE").unwrap_err();
        assert_eq!(
            err,
            MoneyError::CurrencyNotFound {
                lookup: "crypto/NOPE".to_string()
            }
        );
        assert!(Registry::new().resolve(978u32).is_err());
    }

    #[test]
    fn test_direct_reference() {
        let adhoc = currency("custom/ABC", -1, None);
        let r = Registry::new();
        assert_eq!(r.resolve(&adhoc).unwrap(), adhoc);
    }

    #[test]
    fn test_listing_is_transitive() {
        let r = Registry::new()
            .register(Currency::builder("crypto/USDT").kind("STABLECOIN").build().unwrap())
            .register(Currency::builder("crypto/ETH").kind("CRYPTO").build().unwrap())
            .register(Currency::builder("PLN").kind("FIAT").domain("ISO-4217").build().unwrap())
            .derive_kind("STABLECOIN", "CRYPTO")
            .unwrap();

        let crypto: Vec<_> = r.of_kind("CRYPTO").iter().map(|c| c.id().to_string()).collect();
        assert_eq!(crypto, vec!["crypto/ETH", "crypto/USDT"]);
        assert_eq!(r.of_domain("CRYPTO").len(), 2);
        assert_eq!(r.of_domain("ISO-4217").len(), 1);

        let usdt = r.resolve("crypto/USDT").unwrap();
        assert!(r.is_stable(&usdt));
        assert!(r.is_crypto(&usdt));
        assert!(!r.is_fiat(&usdt));
    }

    #[test]
    fn test_trait_listing() {
        let r = Registry::new()
            .register(Currency::builder("crypto/USDC").build().unwrap())
            .add_traits(&id("crypto/USDC"), ["token/erc20"])
            .unwrap()
            .derive_trait("token/erc20", "token")
            .unwrap();
        assert_eq!(r.of_trait("token").len(), 1);
        assert!(r.of_trait("stable").is_empty());
    }

    #[test]
    fn test_legacy_is_not_iso() {
        let r = Registry::new()
            .register(Currency::builder("iso-4217-legacy/DEM").build().unwrap())
            .register(Currency::builder("EUR").domain("ISO-4217").build().unwrap())
            .derive_domain("ISO-4217-LEGACY", "ISO-4217")
            .unwrap();
        let dem = r.resolve("iso-4217-legacy/DEM").unwrap();
        assert!(r.is_legacy(&dem));
        assert!(!r.is_iso(&dem));
        assert!(r.is_iso(&r.resolve("EUR").unwrap()));
    }

    #[test]
    fn test_localized_fallback() {
        let props = |name: &str| Properties::from([("name".to_string(), name.to_string())]);
        let r = Registry::new()
            .register(Currency::new("PLN", 2).unwrap())
            .set_localized(&id("PLN"), "*", props("Polish zloty"))
            .unwrap()
            .set_localized(&id("PLN"), "pl", props("złoty polski"))
            .unwrap();

        let pln = id("PLN");
        assert_eq!(r.localized_property(&pln, "pl_PL", "name"), Some("złoty polski"));
        assert_eq!(r.localized_property(&pln, "en_US", "name"), Some("Polish zloty"));
        assert_eq!(r.localized_property(&pln, "pl", "symbol"), None);
        assert!(r.localized(&pln, "de").is_some());
        assert!(r.localized(&id("EUR"), "de").is_none());
    }
}

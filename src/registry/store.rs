use crate::core::currency::{CountryCode, Currency, CurrencyId, Tag};
use crate::error::{MoneyError, Result};
use crate::graph::hierarchy::{Hierarchies, Hierarchy};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Localized properties of one currency in one locale (`name`, `symbol`, ...).
pub type Properties = BTreeMap<String, String>;

/// Locale key used when no better locale matches.
pub const DEFAULT_LOCALE: &str = "*";

/// An immutable snapshot of known currencies and their classification.
///
/// Every mutator returns a new `Registry`; the receiver is never changed, so
/// a snapshot can be shared freely across threads. Tables are ordered maps,
/// which keeps iteration, export and tie-breaking deterministic.
///
/// The weight stored on each [`Currency`] is its effective weight. The
/// `weights` table only holds weights that were set explicitly (including
/// an explicit 0).
///
/// # Examples
///
/// ```
/// use coinage::core::currency::Currency;
/// use coinage::registry::Registry;
///
/// let registry = Registry::new()
///     .register(Currency::new("PLN", 2).unwrap())
///     .set_weight(&"PLN".into(), 5)
///     .unwrap();
///
/// assert_eq!(registry.len(), 1);
/// assert_eq!(registry.weight_of(&"PLN".into()), Some(5));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    pub(super) currencies: BTreeMap<CurrencyId, Currency>,
    pub(super) countries: BTreeMap<CountryCode, BTreeSet<CurrencyId>>,
    pub(super) weights: BTreeMap<CurrencyId, i32>,
    pub(super) traits: BTreeMap<CurrencyId, BTreeSet<Tag>>,
    pub(super) localized: BTreeMap<CurrencyId, BTreeMap<String, Properties>>,
    pub(super) hierarchies: Hierarchies,
    pub(super) ext: BTreeMap<String, serde_json::Value>,
    pub(super) order: BTreeMap<CurrencyId, u64>,
    pub(super) next_seq: u64,
}

impl Registry {
    /// An empty registry with empty hierarchies.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Accessors ---

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }

    pub fn contains(&self, id: &CurrencyId) -> bool {
        self.currencies.contains_key(id)
    }

    /// Direct table hit by id.
    pub fn get(&self, id: &CurrencyId) -> Option<&Currency> {
        self.currencies.get(id)
    }

    /// All currencies ordered by id.
    pub fn currencies(&self) -> impl Iterator<Item = &Currency> {
        self.currencies.values()
    }

    /// All currencies in registration order.
    pub fn currencies_in_order(&self) -> Vec<&Currency> {
        let mut list: Vec<&Currency> = self.currencies.values().collect();
        list.sort_by_key(|c| self.sequence_of(c.id()));
        list
    }

    /// Registration sequence number; lower means registered earlier.
    pub fn sequence_of(&self, id: &CurrencyId) -> u64 {
        self.order.get(id).copied().unwrap_or(u64::MAX)
    }

    /// The explicitly set weight, if any.
    pub fn weight_of(&self, id: &CurrencyId) -> Option<i32> {
        self.weights.get(id).copied()
    }

    pub fn traits_of(&self, id: &CurrencyId) -> BTreeSet<Tag> {
        self.traits.get(id).cloned().unwrap_or_default()
    }

    pub fn countries_of(&self, id: &CurrencyId) -> BTreeSet<CountryCode> {
        self.countries
            .iter()
            .filter(|(_, ids)| ids.contains(id))
            .map(|(country, _)| country.clone())
            .collect()
    }

    /// Every locale entry of a currency.
    pub fn localized_of(&self, id: &CurrencyId) -> BTreeMap<String, Properties> {
        self.localized.get(id).cloned().unwrap_or_default()
    }

    pub fn hierarchies(&self) -> &Hierarchies {
        &self.hierarchies
    }

    pub fn ext(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.ext
    }

    // --- Mutators ---

    /// Insert or replace a currency.
    ///
    /// Replacing keeps the original registration sequence. The currency's
    /// weight becomes explicit exactly when the currency says so.
    pub fn register(&self, currency: Currency) -> Self {
        let mut next = self.clone();
        next.put(currency);
        next
    }

    /// Register a currency together with its countries and localized data.
    ///
    /// The given countries replace any the currency was mapped to before.
    pub fn register_with(
        &self,
        currency: Currency,
        countries: impl IntoIterator<Item = CountryCode>,
        localized: BTreeMap<String, Properties>,
    ) -> Self {
        let id = currency.id().clone();
        let mut next = self.register(currency);
        next.unlink_countries(&id);
        for country in countries {
            next.countries.entry(country).or_default().insert(id.clone());
        }
        if localized.is_empty() {
            next.localized.remove(&id);
        } else {
            next.localized.insert(id, localized);
        }
        next
    }

    /// Remove a currency with its weight, traits, localized data and countries.
    /// Unknown ids are ignored.
    pub fn unregister(&self, id: &CurrencyId) -> Self {
        if !self.contains(id) {
            return self.clone();
        }
        let mut next = self.clone();
        next.currencies.remove(id);
        next.weights.remove(id);
        next.traits.remove(id);
        next.localized.remove(id);
        next.order.remove(id);
        next.unlink_countries(id);
        debug!("unregistered currency {id}");
        next
    }

    /// Set an explicit weight.
    pub fn set_weight(&self, id: &CurrencyId, weight: i32) -> Result<Self> {
        let currency = self.require(id)?.with_weight(weight);
        debug!("set weight of {id} to {weight}");
        Ok(self.register(currency))
    }

    /// Drop the explicit weight; the currency falls back to weight 0.
    pub fn clear_weight(&self, id: &CurrencyId) -> Result<Self> {
        let currency = self.require(id)?.with_implicit_weight(0);
        debug!("cleared weight of {id}");
        Ok(self.register(currency))
    }

    pub fn add_traits(
        &self,
        id: &CurrencyId,
        tags: impl IntoIterator<Item = impl Into<Tag>>,
    ) -> Result<Self> {
        self.require(id)?;
        let mut next = self.clone();
        next.traits
            .entry(id.clone())
            .or_default()
            .extend(tags.into_iter().map(Into::into));
        Ok(next)
    }

    pub fn remove_traits(
        &self,
        id: &CurrencyId,
        tags: impl IntoIterator<Item = impl Into<Tag>>,
    ) -> Result<Self> {
        self.require(id)?;
        let mut next = self.clone();
        if let Some(set) = next.traits.get_mut(id) {
            for tag in tags {
                set.remove(&tag.into());
            }
            if set.is_empty() {
                next.traits.remove(id);
            }
        }
        Ok(next)
    }

    pub fn add_countries(
        &self,
        id: &CurrencyId,
        countries: impl IntoIterator<Item = impl Into<CountryCode>>,
    ) -> Result<Self> {
        self.require(id)?;
        let mut next = self.clone();
        for country in countries {
            next.countries
                .entry(country.into())
                .or_default()
                .insert(id.clone());
        }
        Ok(next)
    }

    pub fn remove_countries(
        &self,
        id: &CurrencyId,
        countries: impl IntoIterator<Item = impl Into<CountryCode>>,
    ) -> Result<Self> {
        self.require(id)?;
        let mut next = self.clone();
        for country in countries {
            let country = country.into();
            if let Some(ids) = next.countries.get_mut(&country) {
                ids.remove(id);
                if ids.is_empty() {
                    next.countries.remove(&country);
                }
            }
        }
        Ok(next)
    }

    /// Replace the properties of one locale (`"pl"`, `"en_US"`, or `"*"`).
    pub fn set_localized(
        &self,
        id: &CurrencyId,
        locale: &str,
        properties: Properties,
    ) -> Result<Self> {
        self.require(id)?;
        let mut next = self.clone();
        next.localized
            .entry(id.clone())
            .or_default()
            .insert(locale.trim().to_string(), properties);
        Ok(next)
    }

    pub fn derive_kind(&self, child: impl Into<Tag>, parent: impl Into<Tag>) -> Result<Self> {
        let kind = self.hierarchies.kind.derive(child, parent)?;
        Ok(self.with_hierarchy(|h| h.kind = kind))
    }

    pub fn derive_domain(&self, child: impl Into<Tag>, parent: impl Into<Tag>) -> Result<Self> {
        let domain = self.hierarchies.domain.derive(child, parent)?;
        Ok(self.with_hierarchy(|h| h.domain = domain))
    }

    pub fn derive_trait(&self, child: impl Into<Tag>, parent: impl Into<Tag>) -> Result<Self> {
        let traits = self.hierarchies.traits.derive(child, parent)?;
        Ok(self.with_hierarchy(|h| h.traits = traits))
    }

    /// Replace all three hierarchies at once.
    pub fn with_hierarchies(&self, hierarchies: Hierarchies) -> Self {
        self.with_hierarchy(|h| *h = hierarchies)
    }

    /// Store an opaque extension value.
    pub fn with_ext(&self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut next = self.clone();
        next.ext.insert(key.into(), value);
        next
    }

    // --- Internals shared with merge and seed loading ---

    pub(super) fn require(&self, id: &CurrencyId) -> Result<&Currency> {
        self.currencies
            .get(id)
            .ok_or_else(|| MoneyError::not_found(id))
    }

    /// In-place upsert keeping the weight table in step with the currency.
    pub(super) fn put(&mut self, currency: Currency) {
        let id = currency.id().clone();
        if currency.is_weight_explicit() {
            self.weights.insert(id.clone(), currency.weight());
        } else {
            self.weights.remove(&id);
        }
        if !self.order.contains_key(&id) {
            self.order.insert(id.clone(), self.next_seq);
            self.next_seq += 1;
            debug!("registered currency {id}");
        } else {
            debug!("replaced currency {id}");
        }
        self.currencies.insert(id, currency);
    }

    /// Move an entry and everything attached to it to a new id.
    pub(super) fn rename(&mut self, from: &CurrencyId, to: &CurrencyId) {
        let Some(currency) = self.currencies.remove(from) else {
            return;
        };
        self.currencies.insert(to.clone(), currency.with_id(to.clone()));

        if let Some(weight) = self.weights.remove(from) {
            self.weights.insert(to.clone(), weight);
        }
        if let Some(traits) = self.traits.remove(from) {
            self.traits.insert(to.clone(), traits);
        }
        if let Some(localized) = self.localized.remove(from) {
            self.localized.insert(to.clone(), localized);
        }
        if let Some(seq) = self.order.remove(from) {
            self.order.insert(to.clone(), seq);
        }
        for ids in self.countries.values_mut() {
            if ids.remove(from) {
                ids.insert(to.clone());
            }
        }
    }

    pub(super) fn unlink_countries(&mut self, id: &CurrencyId) {
        self.countries.retain(|_, ids| {
            ids.remove(id);
            !ids.is_empty()
        });
    }

    fn with_hierarchy(&self, update: impl FnOnce(&mut Hierarchies)) -> Self {
        let mut next = self.clone();
        update(&mut next.hierarchies);
        next
    }

    pub(super) fn hierarchy_edges(hierarchy: &Hierarchy) -> BTreeMap<String, Vec<String>> {
        hierarchy
            .parents()
            .iter()
            .map(|(child, parents)| {
                (
                    child.to_string(),
                    parents.iter().map(Tag::to_string).collect(),
                )
            })
            .collect()
    }
}

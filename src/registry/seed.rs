//! JSON seed data for registries.
//!
//! A seed lists currencies with their countries, traits and localized
//! properties, plus the three hierarchies as `child -> [parents]` maps.
//! [`Registry::export`] produces the same shape, so an export can be loaded
//! back as a seed.
//!
//! ```json
//! {
//!   "currencies": [
//!     { "id": "PLN", "numeric": 985, "scale": 2, "kind": "FIAT",
//!       "domain": "ISO-4217", "countries": ["PL"] }
//!   ],
//!   "hierarchies": { "domain": { "ISO-4217-LEGACY": ["ISO-4217"] } }
//! }
//! ```

use super::merge::{default_weight, is_legacy};
use super::store::{Properties, Registry};
use crate::core::currency::{CountryCode, Currency, CurrencyId, Tag, AUTO_SCALE, NO_NUMERIC};
use crate::error::Result;
use crate::graph::hierarchy::{Hierarchies, Hierarchy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const BUILTIN_SEED: &str = include_str!("../../resources/seed.json");

/// One currency row of a seed or export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRecord {
    pub id: String,
    #[serde(default = "no_numeric")]
    pub numeric: i64,
    #[serde(default = "auto_scale")]
    pub scale: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Present only for explicit weights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub localized: BTreeMap<String, Properties>,
}

fn no_numeric() -> i64 {
    NO_NUMERIC
}

fn auto_scale() -> i64 {
    AUTO_SCALE
}

/// Hierarchy edges as `child -> [parents]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyRecords {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kind: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub domain: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub traits: BTreeMap<String, Vec<String>>,
}

/// A complete registry as plain serializable tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySeed {
    #[serde(default)]
    pub currencies: Vec<CurrencyRecord>,
    #[serde(default)]
    pub hierarchies: HierarchyRecords,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ext: BTreeMap<String, serde_json::Value>,
}

/// Exports share the seed format.
pub type RegistryExport = RegistrySeed;

/// Parse seed JSON.
pub fn from_json(json: &str) -> Result<RegistrySeed> {
    Ok(serde_json::from_str(json)?)
}

/// The seed bundled with the crate.
pub fn builtin() -> Result<RegistrySeed> {
    from_json(BUILTIN_SEED)
}

impl RegistrySeed {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Registry {
    /// Build a registry from seed data.
    ///
    /// Currencies are registered in seed order. Legacy currencies without a
    /// weight get the default legacy weight.
    pub fn from_seed(seed: &RegistrySeed) -> Result<Self> {
        let mut registry = Registry::new().with_hierarchies(Hierarchies {
            kind: build_hierarchy("kind", &seed.hierarchies.kind)?,
            domain: build_hierarchy("domain", &seed.hierarchies.domain)?,
            traits: build_hierarchy("traits", &seed.hierarchies.traits)?,
        });

        for record in &seed.currencies {
            let currency = record.to_currency()?;
            let currency = if currency.is_weight_explicit() {
                currency
            } else {
                let legacy = is_legacy(registry.hierarchies(), &currency);
                currency.with_implicit_weight(default_weight(legacy, currency.weight()))
            };
            let id = currency.id().clone();
            registry = registry.register_with(
                currency,
                record.countries.iter().map(CountryCode::new),
                record.localized.clone(),
            );
            if !record.traits.is_empty() {
                registry = registry.add_traits(&id, record.traits.iter().map(String::as_str))?;
            }
        }

        registry.ext = seed.ext.clone();
        log::debug!("loaded {} currencies from seed", registry.len());
        Ok(registry)
    }

    /// Load a registry straight from seed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_seed(&from_json(json)?)
    }

    /// The registry with the bundled seed data.
    pub fn builtin() -> Result<Self> {
        Self::from_seed(&builtin()?)
    }

    /// Plain tables describing this registry, currencies in registration order.
    pub fn export(&self) -> RegistryExport {
        let currencies = self
            .currencies_in_order()
            .into_iter()
            .map(|c| CurrencyRecord::from_registry(self, c))
            .collect();

        RegistrySeed {
            currencies,
            hierarchies: HierarchyRecords {
                kind: Registry::hierarchy_edges(&self.hierarchies().kind),
                domain: Registry::hierarchy_edges(&self.hierarchies().domain),
                traits: Registry::hierarchy_edges(&self.hierarchies().traits),
            },
            ext: self.ext().clone(),
        }
    }
}

impl CurrencyRecord {
    fn to_currency(&self) -> Result<Currency> {
        let mut builder = Currency::builder(&self.id)
            .numeric(self.numeric)
            .scale(self.scale);
        if let Some(kind) = &self.kind {
            builder = builder.kind(kind.as_str());
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.as_str());
        }
        if let Some(weight) = self.weight {
            builder = builder.weight(weight);
        }
        builder.build()
    }

    fn from_registry(registry: &Registry, currency: &Currency) -> Self {
        let id: &CurrencyId = currency.id();
        Self {
            id: id.to_string(),
            numeric: currency.numeric().map_or(NO_NUMERIC, i64::from),
            scale: currency.scale().into(),
            kind: currency.kind().map(Tag::to_string),
            domain: currency.domain().map(Tag::to_string),
            weight: registry.weight_of(id).map(i64::from),
            countries: registry
                .countries_of(id)
                .iter()
                .map(CountryCode::to_string)
                .collect(),
            traits: registry.traits_of(id).iter().map(Tag::to_string).collect(),
            localized: registry.localized_of(id),
        }
    }
}

fn build_hierarchy(name: &str, edges: &BTreeMap<String, Vec<String>>) -> Result<Hierarchy> {
    let mut hierarchy = Hierarchy::new(name);
    for (child, parents) in edges {
        for parent in parents {
            hierarchy = hierarchy.derive(child.as_str(), parent.as_str())?;
        }
    }
    Ok(hierarchy)
}

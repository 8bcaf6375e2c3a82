//! Combining two registries.
//!
//! The destination is the base; source currencies are folded in one at a
//! time in their registration order. With ISO-like normalization enabled,
//! ISO currencies land under their bare code and retired ISO currencies under
//! the `iso-4217-legacy/` namespace. A destination entry under the bare code
//! is renamed into that namespace when a legacy source currency retires it,
//! and a legacy entry is moved out of the way when a current currency takes
//! over its code.

use super::store::{Properties, Registry};
use crate::core::currency::{
    Currency, CurrencyId, Tag, ISO_4217, ISO_4217_LEGACY, LEGACY_NAMESPACE,
};
use crate::error::{MoneyError, Result};
use crate::graph::hierarchy::Hierarchies;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

/// Weight given to legacy currencies that carry no weight of their own, so
/// they rank below current currencies sharing a code, numeric code or country.
pub const DEFAULT_LEGACY_WEIGHT: i32 = -100;

/// A field whose destination value survives a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreservedField {
    Numeric,
    Scale,
    Kind,
    /// Ignored for ISO-like currencies so they can move between ISO and legacy.
    Domain,
    Weight,
    Countries,
    Localized,
    Traits,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Log every added, updated and renamed currency.
    pub verbose: bool,
    pub preserve: BTreeSet<PreservedField>,
    /// Normalize ISO and legacy ISO ids (see module docs).
    pub iso_like: bool,
}

impl MergeOptions {
    pub fn iso_like() -> Self {
        Self {
            iso_like: true,
            ..Self::default()
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn preserve(mut self, fields: impl IntoIterator<Item = PreservedField>) -> Self {
        self.preserve.extend(fields);
        self
    }

    fn keeps(&self, field: PreservedField) -> bool {
        self.preserve.contains(&field)
    }
}

/// What a merge did to the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: Vec<CurrencyId>,
    /// Existing entries whose merged form differs from the destination's.
    pub updated: Vec<CurrencyId>,
    /// Entries moved to the legacy namespace, as `(from, to)`.
    pub renamed: Vec<(CurrencyId, CurrencyId)>,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.renamed.is_empty()
    }
}

/// Merge `src` into `dst`.
pub fn merge(dst: &Registry, src: &Registry, options: &MergeOptions) -> Result<Registry> {
    merge_with_report(dst, src, options).map(|(registry, _)| registry)
}

/// Merge `src` into `dst` and describe the changes.
///
/// # Examples
///
/// ```
/// use coinage::core::currency::Currency;
/// use coinage::registry::merge::{merge_with_report, MergeOptions};
/// use coinage::registry::Registry;
///
/// let dst = Registry::new().register(Currency::new("PLN", 2).unwrap());
/// let src = Registry::new()
///     .register(Currency::new("PLN", 2).unwrap())
///     .register(Currency::new("EUR", 2).unwrap());
///
/// let (merged, report) = merge_with_report(&dst, &src, &MergeOptions::default()).unwrap();
/// assert_eq!(merged.len(), 2);
/// assert_eq!(report.added.len(), 1);
/// assert!(report.updated.is_empty());
/// ```
pub fn merge_with_report(
    dst: &Registry,
    src: &Registry,
    options: &MergeOptions,
) -> Result<(Registry, MergeReport)> {
    let mut out = dst.with_hierarchies(dst.hierarchies().union(src.hierarchies())?);
    let mut report = MergeReport::default();

    for incoming in src.currencies_in_order() {
        merge_one(&mut out, src, incoming, options, &mut report)?;
    }

    for (key, value) in src.ext() {
        out.ext.insert(key.clone(), value.clone());
    }

    info!(
        "merged {} source currencies: {} added, {} updated, {} renamed",
        src.len(),
        report.added.len(),
        report.updated.len(),
        report.renamed.len()
    );
    Ok((out, report))
}

fn merge_one(
    out: &mut Registry,
    src: &Registry,
    incoming: &Currency,
    options: &MergeOptions,
    report: &mut MergeReport,
) -> Result<()> {
    let legacy = is_legacy(out.hierarchies(), incoming);
    let iso_like = options.iso_like && is_iso_like(out.hierarchies(), incoming);

    let target = if iso_like {
        let bare = incoming.id().bare();
        let legacy_id = CurrencyId::namespaced(LEGACY_NAMESPACE, bare.code());
        // The bare-code entry moves to the legacy namespace when the incoming
        // currency retires it, or when it is a legacy entry squatting on a code
        // a current currency is about to take.
        let retire = out
            .get(&bare)
            .is_some_and(|existing| legacy || is_legacy(out.hierarchies(), existing));
        if retire {
            if out.contains(&legacy_id) {
                return Err(MoneyError::MergeConflict {
                    id: bare.to_string(),
                    reason: format!("cannot rename {bare}: {legacy_id} already exists"),
                });
            }
            out.rename(&bare, &legacy_id);
            if options.verbose {
                info!("renamed currency {bare} to {legacy_id}");
            }
            report.renamed.push((bare.clone(), legacy_id.clone()));
        }
        if legacy {
            legacy_id
        } else {
            bare
        }
    } else {
        incoming.id().clone()
    };

    let existing = out.get(&target).cloned();
    let mut merged = incoming.with_id(target.clone());

    if let Some(current) = &existing {
        if options.keeps(PreservedField::Numeric) {
            merged = merged.with_numeric(current.numeric());
        }
        if options.keeps(PreservedField::Scale) {
            merged = merged.with_scale(current.scale());
        }
        if options.keeps(PreservedField::Kind) {
            merged = merged.with_kind(current.kind().cloned());
        }
        if options.keeps(PreservedField::Domain) && !iso_like {
            merged = merged.with_domain(current.domain().cloned());
        }
    }

    let (weight, explicit) = resolve_weight(
        out,
        src,
        incoming,
        existing.as_ref(),
        is_legacy(out.hierarchies(), &merged),
        options,
    );
    merged = if explicit {
        merged.with_weight(weight)
    } else {
        merged.with_implicit_weight(weight)
    };

    let countries = merge_sets(
        existing.as_ref().map(|_| out.countries_of(&target)),
        src.countries_of(incoming.id()),
        options.keeps(PreservedField::Countries),
    );
    let traits = merge_sets(
        existing.as_ref().map(|_| out.traits_of(&target)),
        src.traits_of(incoming.id()),
        options.keeps(PreservedField::Traits),
    );
    let localized = merge_localized(
        existing.as_ref().map(|_| out.localized_of(&target)),
        src.localized_of(incoming.id()),
        options.keeps(PreservedField::Localized),
    );

    let changed = match &existing {
        Some(current) => {
            *current != merged
                || out.countries_of(&target) != countries
                || out.traits_of(&target) != traits
                || out.localized_of(&target) != localized
        }
        None => true,
    };

    out.put(merged);
    out.unlink_countries(&target);
    for country in countries {
        out.countries.entry(country).or_default().insert(target.clone());
    }
    if traits.is_empty() {
        out.traits.remove(&target);
    } else {
        out.traits.insert(target.clone(), traits);
    }
    if localized.is_empty() {
        out.localized.remove(&target);
    } else {
        out.localized.insert(target.clone(), localized);
    }

    match existing {
        None => {
            if options.verbose {
                info!("added currency {target}");
            }
            report.added.push(target);
        }
        Some(_) if changed => {
            if options.verbose {
                info!("updated currency {target}");
            }
            report.updated.push(target);
        }
        Some(_) => debug!("currency {target} unchanged"),
    }
    Ok(())
}

/// Pick the weight of a merged currency and whether it is explicit.
///
/// Explicit table entries and non-zero legacy weights are candidates, source
/// first unless the destination's weight is preserved. Only table entries
/// stay explicit.
fn resolve_weight(
    dst: &Registry,
    src: &Registry,
    incoming: &Currency,
    existing: Option<&Currency>,
    legacy: bool,
    options: &MergeOptions,
) -> (i32, bool) {
    let src_choice = weight_choice(src, incoming, legacy);
    let dst_choice = existing.and_then(|current| {
        let current_legacy = is_legacy(dst.hierarchies(), current);
        weight_choice(dst, current, current_legacy)
    });

    let chosen = if options.keeps(PreservedField::Weight) {
        dst_choice.or(src_choice)
    } else {
        src_choice.or(dst_choice)
    };

    match chosen {
        Some(choice) => choice,
        None => (default_weight(legacy, 0), false),
    }
}

fn weight_choice(registry: &Registry, currency: &Currency, legacy: bool) -> Option<(i32, bool)> {
    match registry.weight_of(currency.id()) {
        Some(weight) => Some((weight, true)),
        None if legacy && currency.weight() != 0 => Some((currency.weight(), false)),
        None => None,
    }
}

/// Weight for a currency without an explicit one.
pub(super) fn default_weight(legacy: bool, weight: i32) -> i32 {
    if legacy && weight == 0 {
        DEFAULT_LEGACY_WEIGHT
    } else {
        weight
    }
}

pub(super) fn is_legacy(hierarchies: &Hierarchies, currency: &Currency) -> bool {
    currency
        .domain()
        .is_some_and(|d| hierarchies.domain.isa(d, &Tag::new(ISO_4217_LEGACY)))
}

fn is_iso_like(hierarchies: &Hierarchies, currency: &Currency) -> bool {
    is_legacy(hierarchies, currency)
        || currency
            .domain()
            .is_some_and(|d| hierarchies.domain.isa(d, &Tag::new(ISO_4217)))
}

fn merge_sets<T: Ord + Clone>(
    existing: Option<BTreeSet<T>>,
    incoming: BTreeSet<T>,
    preserve: bool,
) -> BTreeSet<T> {
    match existing {
        Some(current) if preserve => current,
        Some(mut current) => {
            current.extend(incoming);
            current
        }
        None => incoming,
    }
}

fn merge_localized(
    existing: Option<BTreeMap<String, Properties>>,
    incoming: BTreeMap<String, Properties>,
    preserve: bool,
) -> BTreeMap<String, Properties> {
    match existing {
        Some(current) if preserve => current,
        Some(mut current) => {
            for (locale, props) in incoming {
                current.entry(locale).or_default().extend(props);
            }
            current
        }
        None => incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::CountryCode;

    fn id(s: &str) -> CurrencyId {
        CurrencyId::new(s)
    }

    fn iso(code: &str, numeric: i64) -> Currency {
        Currency::builder(code)
            .numeric(numeric)
            .scale(2)
            .kind("FIAT")
            .domain(ISO_4217)
            .build()
            .unwrap()
    }

    fn legacy(code: &str, numeric: i64) -> Currency {
        Currency::builder(code)
            .numeric(numeric)
            .scale(2)
            .kind("FIAT")
            .domain(ISO_4217_LEGACY)
            .build()
            .unwrap()
    }

    fn with_domains(registry: Registry) -> Registry {
        registry.derive_domain(ISO_4217_LEGACY, ISO_4217).unwrap()
    }

    #[test]
    fn test_new_entries_are_added() {
        let dst = Registry::new().register(iso("PLN", 985));
        let src = Registry::new().register(iso("EUR", 978));
        let (merged, report) = merge_with_report(&dst, &src, &MergeOptions::default()).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(report.added, vec![id("EUR")]);
        assert!(merged.sequence_of(&id("PLN")) < merged.sequence_of(&id("EUR")));
    }

    #[test]
    fn test_source_fields_win_unless_preserved() {
        let dst = Registry::new().register(iso("PLN", 985));
        let src = Registry::new().register(iso("PLN", 985).with_numeric(Some(1)));

        let merged = merge(&dst, &src, &MergeOptions::default()).unwrap();
        assert_eq!(merged.get(&id("PLN")).unwrap().numeric(), Some(1));

        let options = MergeOptions::default().preserve([PreservedField::Numeric]);
        let merged = merge(&dst, &src, &options).unwrap();
        assert_eq!(merged.get(&id("PLN")).unwrap().numeric(), Some(985));
    }

    #[test]
    fn test_countries_union_and_preserve() {
        let dst = Registry::new()
            .register(iso("EUR", 978))
            .add_countries(&id("EUR"), ["DE"])
            .unwrap();
        let src = Registry::new()
            .register(iso("EUR", 978))
            .add_countries(&id("EUR"), ["FR"])
            .unwrap();

        let merged = merge(&dst, &src, &MergeOptions::default()).unwrap();
        assert_eq!(merged.countries_of(&id("EUR")).len(), 2);

        let options = MergeOptions::default().preserve([PreservedField::Countries]);
        let merged = merge(&dst, &src, &options).unwrap();
        assert_eq!(
            merged.countries_of(&id("EUR")),
            [CountryCode::new("DE")].into_iter().collect()
        );
    }

    #[test]
    fn test_localized_source_wins_per_key() {
        let props = |pairs: &[(&str, &str)]| -> Properties {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        let dst = Registry::new()
            .register(iso("PLN", 985))
            .set_localized(&id("PLN"), "*", props(&[("name", "Zloty"), ("symbol", "zl")]))
            .unwrap();
        let src = Registry::new()
            .register(iso("PLN", 985))
            .set_localized(&id("PLN"), "*", props(&[("symbol", "zł")]))
            .unwrap();

        let merged = merge(&dst, &src, &MergeOptions::default()).unwrap();
        let pln = id("PLN");
        assert_eq!(merged.localized_property(&pln, "*", "symbol"), Some("zł"));
        assert_eq!(merged.localized_property(&pln, "*", "name"), Some("Zloty"));
    }

    #[test]
    fn test_weight_explicitness() {
        let dst = Registry::new()
            .register(iso("PLN", 985))
            .set_weight(&id("PLN"), 4)
            .unwrap();
        let src = Registry::new().register(iso("PLN", 985));

        // Implicit source weight does not override an explicit destination weight.
        let merged = merge(&dst, &src, &MergeOptions::default()).unwrap();
        assert_eq!(merged.weight_of(&id("PLN")), Some(4));

        let src = src.set_weight(&id("PLN"), 0).unwrap();
        let merged = merge(&dst, &src, &MergeOptions::default()).unwrap();
        assert_eq!(merged.weight_of(&id("PLN")), Some(0));

        let options = MergeOptions::default().preserve([PreservedField::Weight]);
        let merged = merge(&dst, &src, &options).unwrap();
        assert_eq!(merged.weight_of(&id("PLN")), Some(4));
    }

    #[test]
    fn test_legacy_gets_default_weight() {
        let dst = with_domains(Registry::new());
        let src = Registry::new().register(legacy("DEM", 276));
        let merged = merge(&dst, &src, &MergeOptions::iso_like()).unwrap();

        let dem = merged.get(&id("iso-4217-legacy/DEM")).unwrap();
        assert_eq!(dem.weight(), DEFAULT_LEGACY_WEIGHT);
        assert_eq!(merged.weight_of(dem.id()), None);
    }

    #[test]
    fn test_current_currency_renames_legacy_entry() {
        let dst = with_domains(Registry::new())
            .register(legacy("HRK", 191))
            .add_countries(&id("HRK"), ["HR"])
            .unwrap();
        let src = Registry::new().register(iso("HRK", 191));

        let (merged, report) = merge_with_report(&dst, &src, &MergeOptions::iso_like()).unwrap();
        let moved = id("iso-4217-legacy/HRK");
        assert_eq!(report.renamed, vec![(id("HRK"), moved.clone())]);
        assert_eq!(report.added, vec![id("HRK")]);
        assert!(merged.countries_of(&moved).contains(&CountryCode::new("HR")));
        assert!(merged.is_iso(merged.get(&id("HRK")).unwrap()));
        assert!(merged.is_legacy(merged.get(&moved).unwrap()));
    }

    #[test]
    fn test_legacy_source_retires_current_entry() {
        let dst = with_domains(Registry::new())
            .register(iso("HRK", 191))
            .add_countries(&id("HRK"), ["HR"])
            .unwrap()
            .set_localized(
                &id("HRK"),
                "*",
                [("symbol".to_string(), "kn".to_string())].into_iter().collect(),
            )
            .unwrap();
        let src = Registry::new().register(legacy("HRK", 191));

        let (merged, report) = merge_with_report(&dst, &src, &MergeOptions::iso_like()).unwrap();
        let moved = id("iso-4217-legacy/HRK");
        assert_eq!(report.renamed, vec![(id("HRK"), moved.clone())]);
        assert_eq!(report.updated, vec![moved.clone()]);
        assert!(report.added.is_empty());

        assert!(!merged.contains(&id("HRK")));
        let hrk = merged.get(&moved).unwrap();
        assert!(merged.is_legacy(hrk));
        assert_eq!(hrk.weight(), DEFAULT_LEGACY_WEIGHT);
        assert!(merged.countries_of(&moved).contains(&CountryCode::new("HR")));
        assert_eq!(merged.localized_property(&moved, "*", "symbol"), Some("kn"));

        let (again, report) = merge_with_report(&merged, &src, &MergeOptions::iso_like()).unwrap();
        assert!(report.is_empty(), "unexpected changes: {report:?}");
        assert_eq!(again.currencies, merged.currencies);
    }

    #[test]
    fn test_retiring_into_occupied_legacy_id_conflicts() {
        let dst = with_domains(Registry::new())
            .register(iso("HRK", 191))
            .register(legacy("iso-4217-legacy/HRK", 191));
        let src = Registry::new().register(legacy("HRK", 191));
        let err = merge(&dst, &src, &MergeOptions::iso_like()).unwrap_err();
        assert!(matches!(err, MoneyError::MergeConflict { .. }));
    }

    #[test]
    fn test_rename_conflict() {
        let dst = with_domains(Registry::new())
            .register(legacy("HRK", 191))
            .register(legacy("iso-4217-legacy/HRK", 191));
        let src = Registry::new().register(iso("HRK", 191));
        let err = merge(&dst, &src, &MergeOptions::iso_like()).unwrap_err();
        assert!(matches!(err, MoneyError::MergeConflict { .. }));
    }

    #[test]
    fn test_domain_never_preserved_for_iso() {
        let misfiled = Currency::builder("iso-4217-legacy/VEF")
            .numeric(937)
            .scale(2)
            .domain(ISO_4217)
            .build()
            .unwrap();
        let dst = with_domains(Registry::new()).register(misfiled);
        let src = Registry::new().register(legacy("VEF", 937));
        let moved = id("iso-4217-legacy/VEF");

        let options = MergeOptions::iso_like().preserve([PreservedField::Domain]);
        let (merged, report) = merge_with_report(&dst, &src, &options).unwrap();
        assert_eq!(
            merged.get(&moved).unwrap().domain(),
            Some(&Tag::new(ISO_4217_LEGACY))
        );
        assert_eq!(report.updated, vec![moved.clone()]);

        let options = MergeOptions::default().preserve([PreservedField::Domain]);
        let src = Registry::new().register(legacy("iso-4217-legacy/VEF", 937));
        let merged = merge(&dst, &src, &options).unwrap();
        assert_eq!(merged.get(&moved).unwrap().domain(), Some(&Tag::new(ISO_4217)));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let dst = with_domains(Registry::new())
            .register(iso("PLN", 985))
            .register(legacy("HRK", 191));
        let src = Registry::new()
            .register(iso("HRK", 191))
            .register(iso("EUR", 978))
            .register(legacy("DEM", 276))
            .add_traits(&id("EUR"), ["fiat"])
            .unwrap();
        let options = MergeOptions::iso_like().verbose(true);

        let once = merge(&dst, &src, &options).unwrap();
        let (twice, report) = merge_with_report(&once, &src, &options).unwrap();
        assert_eq!(once.currencies, twice.currencies);
        assert!(report.is_empty(), "unexpected changes: {report:?}");
    }

    #[test]
    fn test_hierarchy_cycle_fails_merge() {
        let dst = Registry::new().derive_kind("A", "B").unwrap();
        let src = Registry::new().derive_kind("B", "A").unwrap();
        assert!(matches!(
            merge(&dst, &src, &MergeOptions::default()),
            Err(MoneyError::InvalidHierarchySpec { .. })
        ));
    }

    #[test]
    fn test_ext_source_precedence() {
        let dst = Registry::new().with_ext("source", serde_json::json!("dst"));
        let src = Registry::new().with_ext("source", serde_json::json!("src"));
        let merged = merge(&dst, &src, &MergeOptions::default()).unwrap();
        assert_eq!(merged.ext()["source"], serde_json::json!("src"));
    }
}

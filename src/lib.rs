//! # coinage
//!
//! Exact, currency-tagged money arithmetic backed by a currency registry.
//!
//! Amounts are `rust_decimal` values bound to an immutable [`Currency`]
//! snapshot. Currencies live in an immutable [`Registry`] that classifies
//! them through kind, domain and trait hierarchies, resolves ambiguous
//! codes by weight and merges data sets from several sources.
//!
//! ## Architecture
//!
//! - **core**: decimals and rounding modes, currencies, money
//! - **graph**: multi-parent classification hierarchies
//! - **arithmetic**: scoped rounding context, allocation
//! - **registry**: registry snapshots, resolution, merge, seed data, the default registry
//!
//! [`Currency`]: core::currency::Currency
//! [`Registry`]: registry::Registry

pub mod arithmetic;
pub mod core;
pub mod error;
pub mod graph;
pub mod registry;

pub use error::{MoneyError, Result};

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::arithmetic::allocation::{allocate, distribute};
    pub use crate::arithmetic::context::{
        with_context, with_rescale_each, with_rounding, ScaleContext,
    };
    pub use crate::core::currency::{CountryCode, Currency, CurrencyId, Scale, Tag};
    pub use crate::core::decimal::RoundingMode;
    pub use crate::core::money::Money;
    pub use crate::error::{MoneyError, Result};
    pub use crate::graph::hierarchy::Hierarchy;
    pub use crate::registry::{global, CurrencyRef, MergeOptions, Registry};
}

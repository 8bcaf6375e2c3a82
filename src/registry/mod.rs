//! Currency registry: immutable snapshots, resolution, merging and seed data.

pub mod global;
pub mod merge;
pub mod resolve;
pub mod seed;
pub mod store;

pub use merge::{merge, merge_with_report, MergeOptions, MergeReport, PreservedField};
pub use resolve::CurrencyRef;
pub use seed::{RegistryExport, RegistrySeed};
pub use store::{Properties, Registry};

//! Value types: decimals, currencies and money.

pub mod currency;
pub mod decimal;
pub mod money;

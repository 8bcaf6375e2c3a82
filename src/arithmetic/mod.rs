//! Rounding context and sum-preserving allocation.

pub mod allocation;
pub mod context;

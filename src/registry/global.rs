//! The process-wide default registry and per-thread overrides.
//!
//! Readers take an `Arc` snapshot and work on it without holding a lock, so
//! a concurrent [`replace_default`] never affects an operation in flight.
//! [`with_registry`] binds a registry for the dynamic extent of a closure on
//! the current thread only.

use super::resolve::CurrencyRef;
use super::store::Registry;
use crate::core::currency::Currency;
use crate::core::money::Money;
use crate::error::Result;
use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::sync::Arc;

static DEFAULT: Lazy<RwLock<Arc<Registry>>> = Lazy::new(|| RwLock::new(Arc::new(initial())));

thread_local! {
    static OVERRIDE: RefCell<Option<Arc<Registry>>> = const { RefCell::new(None) };
}

fn initial() -> Registry {
    match Registry::builtin() {
        Ok(registry) => {
            debug!("default registry initialized with {} currencies", registry.len());
            registry
        }
        Err(err) => {
            warn!("built-in seed failed to load, starting with an empty registry: {err}");
            Registry::new()
        }
    }
}

/// The registry in effect on this thread: the innermost override, else the default.
pub fn snapshot() -> Arc<Registry> {
    OVERRIDE
        .with(|cell| cell.borrow().clone())
        .unwrap_or_else(default_snapshot)
}

/// The process-wide default, ignoring overrides.
pub fn default_snapshot() -> Arc<Registry> {
    DEFAULT.read().clone()
}

/// Swap in a new default registry, returning the previous one.
pub fn replace_default(registry: Registry) -> Arc<Registry> {
    let previous = std::mem::replace(&mut *DEFAULT.write(), Arc::new(registry));
    debug!("default registry replaced");
    previous
}

/// Atomically derive a new default from the current one.
///
/// The default is left unchanged when `update` fails.
pub fn update_default(update: impl FnOnce(&Registry) -> Result<Registry>) -> Result<Arc<Registry>> {
    let mut guard = DEFAULT.write();
    let next = Arc::new(update(&guard)?);
    *guard = Arc::clone(&next);
    debug!("default registry updated");
    Ok(next)
}

struct Restore(Option<Arc<Registry>>);

impl Drop for Restore {
    fn drop(&mut self) {
        let previous = self.0.take();
        OVERRIDE.with(|cell| *cell.borrow_mut() = previous);
    }
}

/// Run `f` with `registry` in effect on this thread.
pub fn with_registry<T>(registry: impl Into<Arc<Registry>>, f: impl FnOnce() -> T) -> T {
    let previous = OVERRIDE.with(|cell| cell.borrow_mut().replace(registry.into()));
    let _restore = Restore(previous);
    f()
}

/// Resolve against the registry in effect.
pub fn currency(reference: impl Into<CurrencyRef>) -> Result<Currency> {
    snapshot().resolve(reference)
}

/// Money in a currency resolved against the registry in effect.
///
/// # Examples
///
/// ```
/// use coinage::registry::global;
/// use rust_decimal_macros::dec;
///
/// let price = global::money("PLN", dec!(19.9)).unwrap();
/// assert_eq!(price.to_string(), "19.90 PLN");
/// ```
pub fn money(reference: impl Into<CurrencyRef>, amount: Decimal) -> Result<Money> {
    Money::new(currency(reference)?, amount)
}

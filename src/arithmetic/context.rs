//! Scoped rounding configuration.
//!
//! Money arithmetic consults the innermost active [`ScaleContext`] when a
//! caller did not pass a rounding mode explicitly. Contexts are installed for
//! the dynamic extent of a closure and live in thread-local storage, so
//! concurrent callers never observe each other's settings. The enclosing
//! context is restored when the closure returns or unwinds.

use crate::core::decimal::RoundingMode;
use std::cell::Cell;

/// Rounding settings for a call chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaleContext {
    /// Mode used when an operation must drop digits and none was passed.
    pub rounding: Option<RoundingMode>,
    /// Rescale to the nominal scale after every step of a chained
    /// multiplication or division instead of once at the end.
    pub rescale_each: bool,
}

thread_local! {
    static ACTIVE: Cell<ScaleContext> = Cell::new(ScaleContext::default());
}

/// Restores the previous context on drop.
struct Restore(ScaleContext);

impl Drop for Restore {
    fn drop(&mut self) {
        ACTIVE.with(|cell| cell.set(self.0));
    }
}

/// The context active on this thread.
pub fn current() -> ScaleContext {
    ACTIVE.with(Cell::get)
}

/// Run `f` with `ctx` as the active context.
pub fn with_context<T>(ctx: ScaleContext, f: impl FnOnce() -> T) -> T {
    let previous = ACTIVE.with(|cell| cell.replace(ctx));
    let _restore = Restore(previous);
    f()
}

/// Run `f` with `mode` as the default rounding mode.
///
/// The rescale-each-step flag is inherited from the enclosing context.
pub fn with_rounding<T>(mode: RoundingMode, f: impl FnOnce() -> T) -> T {
    let ctx = ScaleContext {
        rounding: Some(mode),
        ..current()
    };
    with_context(ctx, f)
}

/// Run `f` with the rescale-each-step flag set to `enabled`.
///
/// The rounding mode is inherited from the enclosing context.
pub fn with_rescale_each<T>(enabled: bool, f: impl FnOnce() -> T) -> T {
    let ctx = ScaleContext {
        rescale_each: enabled,
        ..current()
    };
    with_context(ctx, f)
}

/// Rounding mode for an operation: the explicit argument, then the active
/// context, then [`RoundingMode::Unnecessary`].
pub fn resolve_rounding(explicit: Option<RoundingMode>) -> RoundingMode {
    explicit
        .or_else(|| current().rounding)
        .unwrap_or(RoundingMode::Unnecessary)
}

/// Whether chained operations rescale after every step.
pub fn rescale_each_step() -> bool {
    current().rescale_each
}

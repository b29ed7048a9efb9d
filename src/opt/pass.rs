// Copyright (c) 2017-2021 Fabian Schuiki

use crate::ir::prelude::*;
use rayon::prelude::*;
use std::{collections::BTreeSet, sync::Mutex};

/// An optimization pass.
///
/// The optimization infrastructure calls `run_on_module()`, which by default
/// runs the pass on every function of the module in turn, reusing the same
/// pass instance. Implementors must therefore leave no per-function state
/// behind after `run_on_unit()` returns.
pub trait Pass {
    /// The name under which the pass can be enabled or disabled.
    const NAME: &'static str;

    /// Run this pass on an entire module.
    fn run_on_module(&mut self, ctx: &PassContext, module: &mut Module) -> bool {
        let mut modified = false;
        for mut unit in module.units_mut() {
            modified |= self.run_on_unit(ctx, &mut unit);
        }
        modified
    }

    /// Run this pass on a single function.
    ///
    /// Returns true if the function was modified.
    fn run_on_unit(&mut self, ctx: &PassContext, unit: &mut UnitBuilder) -> bool;
}

/// Run a pass on all functions of a module in parallel.
///
/// Every rayon worker operates on its own clone of `pass`, such that no pass
/// state is ever shared between two functions being optimized concurrently.
pub fn run_parallel<P>(pass: &P, ctx: &PassContext, module: &mut Module) -> bool
where
    P: Pass + Clone + Send + Sync,
{
    module
        .par_units_mut()
        .map_init(|| pass.clone(), |pass, mut unit| pass.run_on_unit(ctx, &mut unit))
        .reduce(|| false, |a, b| a || b)
}

/// Cached analysis information a pass may render stale.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Invalidation {
    /// Information derived from the instructions of a function, such as use
    /// counts, value numbering, or instruction orderings.
    Instructions,
}

impl std::fmt::Display for Invalidation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Invalidation::Instructions => write!(f, "instructions"),
        }
    }
}

/// Additional context and configuration for optimizations.
///
/// Carries the set of disabled passes, and collects the invalidation
/// notifications passes emit after modifying a function. The context is shared
/// between threads when passes run in parallel.
#[derive(Debug, Default)]
pub struct PassContext {
    disabled: BTreeSet<String>,
    invalidations: Mutex<Vec<(UnitName, Invalidation)>>,
}

impl PassContext {
    /// Create a new context with all passes enabled.
    pub fn new() -> Self {
        Default::default()
    }

    /// Disable a pass by name.
    pub fn disable(&mut self, pass: impl Into<String>) {
        self.disabled.insert(pass.into());
    }

    /// Enable a previously disabled pass.
    pub fn enable(&mut self, pass: &str) {
        self.disabled.remove(pass);
    }

    /// Check whether a pass is enabled.
    pub fn is_enabled(&self, pass: &str) -> bool {
        !self.disabled.contains(pass)
    }

    /// Notify the host that cached analyses of a function are stale.
    pub fn invalidate(&self, unit: &UnitName, what: Invalidation) {
        debug!("Invalidating {} analyses of {}", what, unit);
        self.lock().push((unit.clone(), what));
    }

    /// Return a copy of the invalidations recorded so far.
    pub fn invalidations(&self) -> Vec<(UnitName, Invalidation)> {
        self.lock().clone()
    }

    /// Take the invalidations recorded so far, leaving none behind.
    pub fn take_invalidations(&self) -> Vec<(UnitName, Invalidation)> {
        std::mem::replace(&mut *self.lock(), Vec::new())
    }

    fn lock(&self) -> std::sync::MutexGuard<Vec<(UnitName, Invalidation)>> {
        // A panicking pass cannot leave the list half-updated, so the data
        // behind a poisoned lock is still valid.
        match self.invalidations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gates_and_invalidations() {
        let mut ctx = PassContext::new();
        assert!(ctx.is_enabled("dce"));
        ctx.disable("dce");
        assert!(!ctx.is_enabled("dce"));
        assert!(ctx.is_enabled("verify"));
        ctx.enable("dce");
        assert!(ctx.is_enabled("dce"));

        let name = UnitName::global("f");
        ctx.invalidate(&name, Invalidation::Instructions);
        assert_eq!(
            ctx.invalidations(),
            vec![(name.clone(), Invalidation::Instructions)]
        );
        assert_eq!(ctx.take_invalidations().len(), 1);
        assert!(ctx.invalidations().is_empty());
    }
}

//! Floating-point trap policy.
//!
//! Native code may run with floating-point exceptions trapped while embedded
//! interpreters expect IEEE semantics (`1/0` is `inf`). The policy is a
//! per-thread flag; foreign calls run under an [`FpeGuard`] that suspends
//! trapping and restores the previous policy on drop.
//!
//! Rust code never traps on floating-point exceptions, so the flag is
//! observable state only and no hardware register is touched.

use std::cell::Cell;

use crate::logging::targets;

thread_local! {
    static FPE_ENABLED: Cell<bool> = const { Cell::new(false) };
}

/// Whether floating-point trapping is enabled on this thread.
pub fn fpe_enabled() -> bool {
    FPE_ENABLED.with(Cell::get)
}

/// Set the policy of this thread and return the previous one.
pub fn enable_fpe(enabled: bool) -> bool {
    let previous = FPE_ENABLED.with(|flag| flag.replace(enabled));
    if previous != enabled {
        tracing::trace!(target: targets::INTERPRETER, enabled, "floating-point trap policy changed");
    }
    previous
}

/// Suspends floating-point trapping until dropped.
#[must_use = "trapping is restored as soon as the guard is dropped"]
pub struct FpeGuard {
    previous: bool,
}

impl FpeGuard {
    pub fn new() -> Self {
        Self {
            previous: enable_fpe(false),
        }
    }
}

impl Default for FpeGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FpeGuard {
    fn drop(&mut self) {
        enable_fpe(self.previous);
    }
}

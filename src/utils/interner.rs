//! Global string interner.
//!
//! Converts strings to compact integer [`Symbol`]s for cheap comparison and
//! hashing. Shader feature names and program cache names go through here so
//! that cache keys never hash full strings on the hot path.

use lasso::{Spur, ThreadedRodeo};
use std::sync::OnceLock;

static INTERNER: OnceLock<ThreadedRodeo> = OnceLock::new();

fn interner() -> &'static ThreadedRodeo {
    INTERNER.get_or_init(ThreadedRodeo::new)
}

/// A compact integer identifier for an interned string.
pub type Symbol = Spur;

/// Intern a string, returning its [`Symbol`].
///
/// Returns the existing symbol when the string is already interned.
#[inline]
pub fn intern(s: &str) -> Symbol {
    interner().get_or_intern(s)
}

/// Look up the [`Symbol`] of an already-interned string without allocating.
#[inline]
pub fn get(s: &str) -> Option<Symbol> {
    interner().get(s)
}

/// Resolve a [`Symbol`] back to its string.
#[inline]
pub fn resolve(sym: Symbol) -> &'static str {
    interner().resolve(&sym)
}

/// Pre-intern the feature names the shader generator emits every frame.
///
/// Called once at renderer start-up so the hot path only performs lookups.
pub fn preload_common_features() {
    let common = [
        "STRATA_ENABLE_SSM",
        "STRATA_ENABLE_SSAO",
        "STRATA_ENABLE_SSDO",
        "STRATA_ENABLE_CG_LIGHTING",
        "STRATA_ENABLE_IBL",
        "STRATA_ENABLE_LIGHT_PROBE",
        "STRATA_ENABLE_TEMPORAL_AA",
        "default",
        "fallback",
        "shadow_depth",
    ];

    for name in common {
        intern(name);
    }
}

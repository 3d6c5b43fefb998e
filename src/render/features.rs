//! Shader feature sets.
//!
//! An ordered list of named boolean toggles that parameterize shader
//! generation beyond the material key — layer-level switches like shadow
//! mapping, SSAO or IBL that hold for every material in a pass. Names are
//! interned [`Symbol`]s kept sorted, so identical sets always hash
//! identically regardless of insertion order.

use crate::utils::interner::{self, Symbol};

#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    features: Vec<(Symbol, bool)>,
}

impl FeatureSet {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    /// Set a feature toggle, inserting or updating in sorted position.
    pub fn set(&mut self, name: &str, enabled: bool) {
        let sym = interner::intern(name);
        match self.features.binary_search_by_key(&sym, |&(k, _)| k) {
            Ok(idx) => self.features[idx].1 = enabled,
            Err(idx) => self.features.insert(idx, (sym, enabled)),
        }
    }

    /// Whether a feature is present *and* enabled.
    #[must_use]
    pub fn enabled(&self, name: &str) -> bool {
        interner::get(name).is_some_and(|sym| {
            self.features
                .binary_search_by_key(&sym, |&(k, _)| k)
                .is_ok_and(|idx| self.features[idx].1)
        })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        self.features
            .iter()
            .map(|&(sym, on)| (interner::resolve(sym), on))
    }

    /// Preprocessor-style preamble for enabled features, prepended to every
    /// generated stage.
    #[must_use]
    pub fn to_define_source(&self) -> String {
        let mut out = String::new();
        for (name, on) in self.iter() {
            if on {
                out.push_str("#define ");
                out.push_str(name);
                out.push_str(" 1\n");
            }
        }
        out
    }

    /// Content hash for cache keying.
    ///
    /// Hashes the resolved names in lexicographic order, not in symbol order,
    /// so the value is stable across processes (symbols depend on interning
    /// sequence) and usable in persisted cache keys.
    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        let mut entries: Vec<(&'static str, bool)> = self.iter().collect();
        entries.sort_unstable_by_key(|&(name, _)| name);
        let mut buf = Vec::with_capacity(entries.len() * 24);
        for (name, on) in entries {
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
            buf.push(u8::from(on));
        }
        xxhash_rust::xxh3::xxh3_64(&buf)
    }
}

impl PartialEq for FeatureSet {
    fn eq(&self, other: &Self) -> bool {
        self.features == other.features
    }
}

impl Eq for FeatureSet {}

impl From<&[(&str, bool)]> for FeatureSet {
    fn from(features: &[(&str, bool)]) -> Self {
        let mut set = Self::new();
        for &(name, on) in features {
            set.set(name, on);
        }
        set
    }
}

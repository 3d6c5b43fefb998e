//! Compiled Program Cache
//!
//! Maps `(pipeline name, material key, feature-set hash)` to a compiled
//! program handle. The lookup is a pure read; compilation only happens
//! through [`ShaderCache::compile_program`], which skips work when an entry
//! already exists, so re-preparing an unchanged layer never touches the
//! compiler.
//!
//! The cache can be persisted as a JSON snapshot of the generated sources.
//! Compiled binaries are device-specific, so loading replays the sources
//! through the current device; the snapshot carries a format version and the
//! device's backend tag, and either mismatching invalidates the whole file.

use std::io::{Read, Write};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::backend::{OptionalStages, ProgramHandle, RenderDevice};
use crate::errors::{Result, StrataError};
use crate::render::features::FeatureSet;
use crate::render::key::MaterialShaderKey;
use crate::utils::interner::{self, Symbol};

/// Bumped whenever the generated-source format changes shape.
pub const SHADER_CACHE_VERSION: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    name: Symbol,
    key: MaterialShaderKey,
    features_hash: u64,
}

struct CacheEntry {
    program: ProgramHandle,
    vertex_src: String,
    fragment_src: String,
    stages: OptionalStages,
    features: Vec<(String, bool)>,
}

/// Thread-safe program cache.
///
/// A single coarse lock: lookups are a hash probe, and compiles are rare
/// after warm-up, so contention is not a concern.
#[derive(Default)]
pub struct ShaderCache {
    entries: Mutex<FxHashMap<CacheKey, CacheEntry>>,
}

impl ShaderCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for(name: &str, key: MaterialShaderKey, features: &FeatureSet) -> CacheKey {
        CacheKey {
            name: interner::intern(name),
            key,
            features_hash: features.compute_hash(),
        }
    }

    /// Look up a compiled program. Never compiles.
    #[must_use]
    pub fn get_program(
        &self,
        name: &str,
        key: MaterialShaderKey,
        features: &FeatureSet,
    ) -> Option<ProgramHandle> {
        let cache_key = Self::key_for(name, key, features);
        self.entries.lock().get(&cache_key).map(|e| e.program)
    }

    /// Compile and insert a program, unless an entry already exists.
    ///
    /// On compile failure the diagnostics are logged and `None` is returned;
    /// nothing is inserted, so a later attempt with fixed sources can still
    /// succeed.
    pub fn compile_program(
        &self,
        device: &mut dyn RenderDevice,
        name: &str,
        key: MaterialShaderKey,
        features: &FeatureSet,
        vertex_src: &str,
        fragment_src: &str,
        stages: &OptionalStages,
    ) -> Option<ProgramHandle> {
        let cache_key = Self::key_for(name, key, features);

        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&cache_key) {
            return Some(entry.program);
        }

        match device.create_program(name, vertex_src, fragment_src, stages) {
            Ok(program) => {
                entries.insert(
                    cache_key,
                    CacheEntry {
                        program,
                        vertex_src: vertex_src.to_string(),
                        fragment_src: fragment_src.to_string(),
                        stages: stages.clone(),
                        features: features
                            .iter()
                            .map(|(n, on)| (n.to_string(), on))
                            .collect(),
                    },
                );
                Some(program)
            }
            Err(diag) => {
                log::warn!(
                    "Failed to compile program '{name}' (key: {key})\n\
                     vertex: {}\nfragment: {}\nlink: {}",
                    diag.vertex,
                    diag.fragment,
                    diag.link
                );
                None
            }
        }
    }

    /// Recompile unconditionally, replacing any existing entry.
    ///
    /// Used when sources changed under the same key, e.g. a custom material
    /// edited live. Keeps the old entry when the new sources fail to compile.
    pub fn force_compile_program(
        &self,
        device: &mut dyn RenderDevice,
        name: &str,
        key: MaterialShaderKey,
        features: &FeatureSet,
        vertex_src: &str,
        fragment_src: &str,
        stages: &OptionalStages,
    ) -> Option<ProgramHandle> {
        let cache_key = Self::key_for(name, key, features);

        match device.create_program(name, vertex_src, fragment_src, stages) {
            Ok(program) => {
                self.entries.lock().insert(
                    cache_key,
                    CacheEntry {
                        program,
                        vertex_src: vertex_src.to_string(),
                        fragment_src: fragment_src.to_string(),
                        stages: stages.clone(),
                        features: features
                            .iter()
                            .map(|(n, on)| (n.to_string(), on))
                            .collect(),
                    },
                );
                Some(program)
            }
            Err(diag) => {
                log::warn!(
                    "Failed to recompile program '{name}' (key: {key})\n\
                     vertex: {}\nfragment: {}\nlink: {}",
                    diag.vertex,
                    diag.fragment,
                    diag.link
                );
                self.entries.lock().get(&cache_key).map(|e| e.program)
            }
        }
    }

    #[must_use]
    pub fn program_count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    // ─── Persistence ─────────────────────────────────────────────────────────

    /// Write a snapshot of every cached program's sources.
    pub fn save_persistent(&self, device: &dyn RenderDevice, writer: impl Write) -> Result<()> {
        let entries = self.entries.lock();
        let snapshot = PersistedCache {
            version: SHADER_CACHE_VERSION,
            backend_tag: device.backend_tag().to_string(),
            entries: entries
                .iter()
                .map(|(k, e)| PersistedEntry {
                    name: interner::resolve(k.name).to_string(),
                    key_bits: k.key.bits(),
                    features: e.features.clone(),
                    vertex_src: e.vertex_src.clone(),
                    fragment_src: e.fragment_src.clone(),
                    tess_control: e.stages.tess_control.clone(),
                    tess_eval: e.stages.tess_eval.clone(),
                    geometry: e.stages.geometry.clone(),
                })
                .collect(),
        };
        serde_json::to_writer(writer, &snapshot)?;
        Ok(())
    }

    /// Load a snapshot, replaying each entry through `device`.
    ///
    /// A version or backend-tag mismatch invalidates the whole file and is
    /// returned as an error; callers treat it as a cold start. Entries that
    /// no longer compile are skipped with a warning. Returns the number of
    /// programs restored.
    pub fn load_persistent(
        &self,
        device: &mut dyn RenderDevice,
        reader: impl Read,
    ) -> Result<usize> {
        let snapshot: PersistedCache = serde_json::from_reader(reader)?;

        if snapshot.version != SHADER_CACHE_VERSION {
            return Err(StrataError::CacheVersionMismatch {
                found: snapshot.version,
                expected: SHADER_CACHE_VERSION,
            });
        }
        if snapshot.backend_tag != device.backend_tag() {
            return Err(StrataError::CacheBackendMismatch {
                found: snapshot.backend_tag,
                expected: device.backend_tag().to_string(),
            });
        }

        let mut restored = 0;
        for entry in snapshot.entries {
            let mut features = FeatureSet::new();
            for (name, on) in &entry.features {
                features.set(name, *on);
            }
            let key = MaterialShaderKey::from_bits(entry.key_bits);
            let stages = OptionalStages {
                tess_control: entry.tess_control,
                tess_eval: entry.tess_eval,
                geometry: entry.geometry,
            };
            if self
                .compile_program(
                    device,
                    &entry.name,
                    key,
                    &features,
                    &entry.vertex_src,
                    &entry.fragment_src,
                    &stages,
                )
                .is_some()
            {
                restored += 1;
            } else {
                log::warn!("Dropping stale cached program '{}'", entry.name);
            }
        }

        log::info!("Restored {restored} programs from the persisted shader cache");
        Ok(restored)
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedCache {
    version: u32,
    backend_tag: String,
    entries: Vec<PersistedEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    name: String,
    key_bits: u64,
    features: Vec<(String, bool)>,
    vertex_src: String,
    fragment_src: String,
    tess_control: Option<String>,
    tess_eval: Option<String>,
    geometry: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;

    #[test]
    fn compile_is_idempotent_per_key() {
        let cache = ShaderCache::new();
        let mut device = HeadlessDevice::new();
        let key = MaterialShaderKey::from_bits(0b101);
        let features = FeatureSet::new();
        let stages = OptionalStages::default();

        let a = cache.compile_program(&mut device, "default", key, &features, "v", "f", &stages);
        let b = cache.compile_program(&mut device, "default", key, &features, "v", "f", &stages);

        assert_eq!(a, b);
        assert_eq!(device.compiles_for("default"), 1);
    }

    #[test]
    fn distinct_keys_compile_separately() {
        let cache = ShaderCache::new();
        let mut device = HeadlessDevice::new();
        let features = FeatureSet::new();
        let stages = OptionalStages::default();

        let a = cache.compile_program(
            &mut device,
            "default",
            MaterialShaderKey::from_bits(1),
            &features,
            "v",
            "f",
            &stages,
        );
        let b = cache.compile_program(
            &mut device,
            "default",
            MaterialShaderKey::from_bits(2),
            &features,
            "v",
            "f",
            &stages,
        );

        assert_ne!(a, b);
        assert_eq!(device.compiles_for("default"), 2);
    }

    #[test]
    fn failed_compile_returns_none_and_caches_nothing() {
        let cache = ShaderCache::new();
        let mut device = HeadlessDevice::new();
        device.fail_source_containing = Some("bad_token".to_string());
        let key = MaterialShaderKey::default();
        let features = FeatureSet::new();
        let stages = OptionalStages::default();

        let result =
            cache.compile_program(&mut device, "custom", key, &features, "bad_token", "f", &stages);
        assert!(result.is_none());
        assert_eq!(cache.program_count(), 0);

        // A retry with fixed sources succeeds.
        device.fail_source_containing = None;
        let result =
            cache.compile_program(&mut device, "custom", key, &features, "v", "f", &stages);
        assert!(result.is_some());
    }

    #[test]
    fn force_compile_replaces_entry() {
        let cache = ShaderCache::new();
        let mut device = HeadlessDevice::new();
        let key = MaterialShaderKey::default();
        let features = FeatureSet::new();
        let stages = OptionalStages::default();

        let a = cache.compile_program(&mut device, "custom", key, &features, "v1", "f1", &stages);
        let b =
            cache.force_compile_program(&mut device, "custom", key, &features, "v2", "f2", &stages);

        assert_ne!(a, b);
        assert_eq!(cache.get_program("custom", key, &features), b);
        assert_eq!(device.compiles_for("custom"), 2);
    }

    #[test]
    fn persisted_cache_round_trips() {
        let cache = ShaderCache::new();
        let mut device = HeadlessDevice::new();
        let key = MaterialShaderKey::from_bits(0x42);
        let mut features = FeatureSet::new();
        features.set("STRATA_ENABLE_SSM", true);
        let stages = OptionalStages::default();

        cache.compile_program(&mut device, "default", key, &features, "v", "f", &stages);

        let mut buf = Vec::new();
        cache.save_persistent(&device, &mut buf).unwrap();

        let restored_cache = ShaderCache::new();
        let mut fresh_device = HeadlessDevice::new();
        let restored = restored_cache
            .load_persistent(&mut fresh_device, buf.as_slice())
            .unwrap();

        assert_eq!(restored, 1);
        assert!(restored_cache.get_program("default", key, &features).is_some());
    }

    #[test]
    fn persisted_cache_replays_optional_stages() {
        let cache = ShaderCache::new();
        let mut device = HeadlessDevice::new();
        let key = MaterialShaderKey::from_bits(0x7);
        let features = FeatureSet::new();
        let stages = OptionalStages {
            tess_control: Some("tc".to_string()),
            tess_eval: Some("te".to_string()),
            geometry: None,
        };

        cache.compile_program(&mut device, "default", key, &features, "v", "f", &stages);
        assert_eq!(device.compiles_with_stages, 1);

        let mut buf = Vec::new();
        cache.save_persistent(&device, &mut buf).unwrap();

        let restored_cache = ShaderCache::new();
        let mut fresh_device = HeadlessDevice::new();
        let restored = restored_cache
            .load_persistent(&mut fresh_device, buf.as_slice())
            .unwrap();

        assert_eq!(restored, 1);
        assert_eq!(fresh_device.compiles_with_stages, 1);
    }

    #[test]
    fn version_mismatch_invalidates_snapshot() {
        let snapshot = serde_json::json!({
            "version": SHADER_CACHE_VERSION - 1,
            "backend_tag": "headless-1",
            "entries": [],
        });
        let bytes = serde_json::to_vec(&snapshot).unwrap();

        let cache = ShaderCache::new();
        let mut device = HeadlessDevice::new();
        let err = cache.load_persistent(&mut device, bytes.as_slice()).unwrap_err();
        assert!(matches!(err, StrataError::CacheVersionMismatch { .. }));
    }

    #[test]
    fn backend_mismatch_invalidates_snapshot() {
        let snapshot = serde_json::json!({
            "version": SHADER_CACHE_VERSION,
            "backend_tag": "gl-4.6-nvidia",
            "entries": [],
        });
        let bytes = serde_json::to_vec(&snapshot).unwrap();

        let cache = ShaderCache::new();
        let mut device = HeadlessDevice::new();
        let err = cache.load_persistent(&mut device, bytes.as_slice()).unwrap_err();
        assert!(matches!(err, StrataError::CacheBackendMismatch { .. }));
    }
}

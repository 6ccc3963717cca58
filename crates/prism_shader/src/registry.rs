//! Variant registry
//!
//! Caches compiled shader variants keyed by their feature masks so
//! each mask combination is synthesized and compiled at most once.
//! Synthesis is deterministic, which is what makes the mask tuple a
//! sound cache key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::compiler::ShaderStage;
use crate::mask::{AttributeMask, StateMask};

/// Unique variant identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantId(u64);

impl VariantId {
    fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Cache key for one variant: the full input tuple of the
/// synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub state: StateMask,
    pub attributes: AttributeMask,
    pub compat: bool,
}

impl VariantKey {
    /// Human-readable name derived from the key, for logs and
    /// statistics.
    pub fn display_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if self.state.contains(StateMask::LIGHTING) {
            parts.push("lit");
        }
        if self.state.contains(StateMask::DIFFUSE_MAP) {
            parts.push("diffuse");
        }
        if self.state.contains(StateMask::NORMAL_MAP) {
            parts.push("nmap");
        }
        if self.attributes.contains(AttributeMask::COLOR) {
            parts.push("color");
        }
        if parts.is_empty() {
            parts.push("unshaded");
        }
        if self.compat {
            parts.push("compat");
        }
        parts.join("_")
    }
}

/// A registered, compiled variant
#[derive(Debug, Clone)]
pub struct VariantEntry {
    pub key: VariantKey,
    pub name: String,
    pub vertex_source: String,
    pub fragment_source: String,
    /// SPIR-V words per stage.
    pub binaries: HashMap<ShaderStage, Vec<u32>>,
}

impl VariantEntry {
    pub fn new(
        key: VariantKey,
        vertex_source: String,
        fragment_source: String,
        binaries: HashMap<ShaderStage, Vec<u32>>,
    ) -> Self {
        Self {
            key,
            name: key.display_name(),
            vertex_source,
            fragment_source,
            binaries,
        }
    }

    pub fn spirv(&self, stage: ShaderStage) -> Option<&[u32]> {
        self.binaries.get(&stage).map(Vec::as_slice)
    }

    fn source_bytes(&self) -> usize {
        self.vertex_source.len() + self.fragment_source.len()
    }

    fn binary_bytes(&self) -> usize {
        self.binaries.values().map(|words| words.len() * 4).sum()
    }
}

struct Slot {
    entry: VariantEntry,
    last_access: u64,
}

/// Registry of compiled variants
pub struct VariantRegistry {
    next_id: AtomicU64,
    access_clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    slots: RwLock<HashMap<VariantId, Slot>>,
    key_to_id: RwLock<HashMap<VariantKey, VariantId>>,
    /// Maximum cached variants (0 = unlimited)
    max_cached: usize,
}

impl VariantRegistry {
    pub fn new(max_cached: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            access_clock: AtomicU64::new(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            slots: RwLock::new(HashMap::new()),
            key_to_id: RwLock::new(HashMap::new()),
            max_cached,
        }
    }

    fn tick(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a compiled variant.
    ///
    /// If the key is already cached, the existing id is returned and
    /// the new entry is discarded.
    pub fn register(&self, entry: VariantEntry) -> VariantId {
        if let Some(id) = self.id_for_key(&entry.key) {
            return id;
        }

        if self.max_cached > 0 && self.slots.read().len() >= self.max_cached {
            self.evict_least_recent();
        }

        let id = VariantId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let key = entry.key;
        log::debug!("registered shader variant '{}' -> {:?}", entry.name, id);
        self.slots.write().insert(
            id,
            Slot {
                entry,
                last_access: self.tick(),
            },
        );
        self.key_to_id.write().insert(key, id);
        id
    }

    /// Look up a cached variant id by key. Counts toward hit/miss
    /// statistics.
    pub fn id_for_key(&self, key: &VariantKey) -> Option<VariantId> {
        let found = self.key_to_id.read().get(key).copied();
        match found {
            Some(id) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(id)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn get(&self, id: VariantId) -> Option<VariantEntry> {
        let mut slots = self.slots.write();
        let tick = self.tick();
        let slot = slots.get_mut(&id)?;
        slot.last_access = tick;
        Some(slot.entry.clone())
    }

    pub fn get_by_key(&self, key: &VariantKey) -> Option<VariantEntry> {
        let id = self.id_for_key(key)?;
        self.get(id)
    }

    pub fn contains(&self, id: VariantId) -> bool {
        self.slots.read().contains_key(&id)
    }

    pub fn remove(&self, id: VariantId) -> Option<VariantEntry> {
        let slot = self.slots.write().remove(&id)?;
        self.key_to_id.write().remove(&slot.entry.key);
        Some(slot.entry)
    }

    pub fn count(&self) -> usize {
        self.slots.read().len()
    }

    fn evict_least_recent(&self) {
        let mut slots = self.slots.write();
        let oldest = slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_access)
            .map(|(id, _)| *id);
        if let Some(id) = oldest {
            if let Some(slot) = slots.remove(&id) {
                self.key_to_id.write().remove(&slot.entry.key);
                log::debug!("evicted shader variant '{}'", slot.entry.name);
            }
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let slots = self.slots.read();
        RegistryStats {
            variants: slots.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            source_bytes: slots.values().map(|s| s.entry.source_bytes()).sum(),
            binary_bytes: slots.values().map(|s| s.entry.binary_bytes()).sum(),
            max_cached: self.max_cached,
        }
    }
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Registry statistics
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub variants: usize,
    pub hits: u64,
    pub misses: u64,
    pub source_bytes: usize,
    pub binary_bytes: usize,
    pub max_cached: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(state: StateMask, attributes: AttributeMask) -> VariantKey {
        VariantKey {
            state,
            attributes,
            compat: false,
        }
    }

    fn entry(k: VariantKey) -> VariantEntry {
        VariantEntry::new(k, "// vs".into(), "// fs".into(), HashMap::new())
    }

    #[test]
    fn test_register_and_get() {
        let registry = VariantRegistry::new(8);
        let k = key(StateMask::LIGHTING, AttributeMask::VERTEX | AttributeMask::NORMAL);
        let id = registry.register(entry(k));

        assert!(registry.contains(id));
        let fetched = registry.get(id).unwrap();
        assert_eq!(fetched.key, k);
        assert_eq!(fetched.name, "lit");
    }

    #[test]
    fn test_same_key_returns_same_id() {
        let registry = VariantRegistry::new(8);
        let k = key(StateMask::DIFFUSE_MAP, AttributeMask::VERTEX | AttributeMask::TEXCOORD0);
        let first = registry.register(entry(k));
        let second = registry.register(entry(k));
        assert_eq!(first, second);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_compat_is_part_of_the_key() {
        let registry = VariantRegistry::new(8);
        let modern = key(StateMask::LIGHTING, AttributeMask::VERTEX | AttributeMask::NORMAL);
        let compat = VariantKey {
            compat: true,
            ..modern
        };
        let a = registry.register(entry(modern));
        let b = registry.register(entry(compat));
        assert_ne!(a, b);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_eviction_drops_least_recent() {
        let registry = VariantRegistry::new(2);
        let first = registry.register(entry(key(StateMask::empty(), AttributeMask::VERTEX)));
        let second = registry.register(entry(key(
            StateMask::LIGHTING,
            AttributeMask::VERTEX | AttributeMask::NORMAL,
        )));

        // Touch the first so the second becomes the eviction victim.
        registry.get(first);

        let third = registry.register(entry(key(
            StateMask::DIFFUSE_MAP,
            AttributeMask::VERTEX | AttributeMask::TEXCOORD0,
        )));

        assert_eq!(registry.count(), 2);
        assert!(registry.contains(first));
        assert!(!registry.contains(second));
        assert!(registry.contains(third));
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let registry = VariantRegistry::new(8);
        let k = key(StateMask::empty(), AttributeMask::VERTEX);
        assert!(registry.id_for_key(&k).is_none());
        registry.register(entry(k));
        assert!(registry.id_for_key(&k).is_some());

        let stats = registry.stats();
        assert_eq!(stats.variants, 1);
        assert_eq!(stats.hits, 1);
        // register() probes the key once more before inserting.
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_display_names() {
        let unshaded = key(StateMask::empty(), AttributeMask::VERTEX);
        assert_eq!(unshaded.display_name(), "unshaded");

        let full = VariantKey {
            state: StateMask::LIGHTING | StateMask::DIFFUSE_MAP | StateMask::NORMAL_MAP,
            attributes: AttributeMask::VERTEX | AttributeMask::COLOR,
            compat: true,
        };
        assert_eq!(full.display_name(), "lit_diffuse_nmap_color_compat");
    }
}

//! In-memory cache of the current signing key per (tenant, algorithm).

use keyline_core::VirtualServerId;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::algorithm::KeyAlgorithm;
use crate::pair::KeyPair;

fn cache_key(virtual_server: VirtualServerId, algorithm: KeyAlgorithm) -> String {
    format!("{virtual_server}:{algorithm}")
}

/// Cache for current signing keys. Lookups on the token path avoid the
/// backing store entirely; rotation invalidates per tenant.
#[derive(Default)]
pub struct KeyCache {
    entries: RwLock<HashMap<String, KeyPair>>,
}

impl KeyCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached current key, if any.
    #[must_use]
    pub fn get(&self, virtual_server: VirtualServerId, algorithm: KeyAlgorithm) -> Option<KeyPair> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&cache_key(virtual_server, algorithm)).cloned()
    }

    /// Cache `pair` as the current key for its tenant and algorithm.
    pub fn put(&self, virtual_server: VirtualServerId, pair: KeyPair) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(cache_key(virtual_server, pair.algorithm), pair);
    }

    /// Drop every cached key of a tenant.
    pub fn invalidate(&self, virtual_server: VirtualServerId) {
        let prefix = format!("{virtual_server}:");
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|key, _| !key.starts_with(&prefix));
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{EdDsaStrategy, KeyStrategy};
    use chrono::Utc;

    #[test]
    fn put_get_invalidate() {
        let cache = KeyCache::new();
        let vs_a = VirtualServerId::new();
        let vs_b = VirtualServerId::new();
        let pair = EdDsaStrategy.generate(Utc::now()).unwrap();

        cache.put(vs_a, pair.clone());
        cache.put(vs_b, pair.clone());
        assert_eq!(cache.get(vs_a, KeyAlgorithm::EdDsa), Some(pair.clone()));
        assert_eq!(cache.get(vs_a, KeyAlgorithm::Rs256), None);

        cache.invalidate(vs_a);
        assert_eq!(cache.get(vs_a, KeyAlgorithm::EdDsa), None);
        assert_eq!(cache.get(vs_b, KeyAlgorithm::EdDsa), Some(pair));
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! In-memory device cache keyed by endpoint reference address.
//!
//! Records are replace-or-insert only: an upsert with a metadata version
//! not strictly greater than the stored one is discarded, so the cache
//! always holds the newest record seen regardless of arrival order.

use std::collections::HashMap;

use tracing::debug;

use super::TargetService;

#[derive(Debug, Default)]
pub struct DeviceCache {
    targets: HashMap<String, TargetService>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, endpoint: &str) -> Option<&TargetService> {
        self.targets.get(endpoint)
    }

    /// Store `target` if it is new or strictly newer than the cached record.
    /// Returns true when the cache changed.
    pub fn upsert(&mut self, target: TargetService) -> bool {
        match self.targets.get(&target.endpoint) {
            Some(existing) if existing.metadata_version >= target.metadata_version => {
                debug!(
                    endpoint = %target.endpoint,
                    stored = existing.metadata_version,
                    offered = target.metadata_version,
                    "stale upsert discarded"
                );
                false
            }
            _ => {
                self.targets.insert(target.endpoint.clone(), target);
                true
            }
        }
    }

    /// Drop a record, e.g. on a Bye announcement. Idempotent.
    pub fn remove(&mut self, endpoint: &str) -> bool {
        self.targets.remove(endpoint).is_some()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetService> {
        self.targets.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(endpoint: &str, version: u64) -> TargetService {
        TargetService {
            endpoint: endpoint.into(),
            xaddrs: vec![format!("http://10.0.0.9:8018/{}", version)],
            types: vec![],
            scopes: vec![],
            metadata_version: version,
        }
    }

    #[test]
    fn test_strictly_greater_version_wins() {
        let mut cache = DeviceCache::new();
        assert!(cache.upsert(target("urn:uuid:1234", 1)));
        // same version does not replace
        assert!(!cache.upsert(target("urn:uuid:1234", 1)));
        // lower version does not replace
        assert!(!cache.upsert(target("urn:uuid:1234", 0)));
        assert!(cache.upsert(target("urn:uuid:1234", 2)));
        assert_eq!(cache.lookup("urn:uuid:1234").unwrap().metadata_version, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_max_version_wins_regardless_of_order() {
        let mut cache = DeviceCache::new();
        for v in [3u64, 1, 4, 2] {
            cache.upsert(target("urn:uuid:1234", v));
        }
        assert_eq!(cache.lookup("urn:uuid:1234").unwrap().metadata_version, 4);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut cache = DeviceCache::new();
        cache.upsert(target("urn:uuid:1234", 1));
        assert!(cache.remove("urn:uuid:1234"));
        assert!(!cache.remove("urn:uuid:1234"));
        assert!(cache.is_empty());
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Client-context registry.
//!
//! A `ScanAvailableEvent` only carries the opaque client context string the
//! subscriber chose at subscription time. This registry maps each context
//! back to the service endpoint, destination token and profile needed to run
//! the scan. Contexts are registered once, before the event server starts;
//! afterwards the registry is shared read-only behind an `Arc`.

use std::collections::HashMap;

use crate::config::ScanProfile;
use crate::error::{Error, Result};
use crate::transfer::HostedService;

/// Everything needed to act on a device-initiated scan for one context.
#[derive(Debug, Clone)]
pub struct ScanSlot {
    pub service: HostedService,
    pub destination_token: String,
    pub profile: ScanProfile,
}

#[derive(Debug, Default)]
pub struct ContextRegistry {
    slots: HashMap<String, ScanSlot>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a context. Each context may only be bound once.
    pub fn register(&mut self, client_context: &str, slot: ScanSlot) -> Result<()> {
        if self.slots.contains_key(client_context) {
            return Err(Error::Config(format!(
                "client context '{}' already registered",
                client_context
            )));
        }
        self.slots.insert(client_context.to_string(), slot);
        Ok(())
    }

    pub fn lookup(&self, client_context: &str) -> Option<ScanSlot> {
        self.slots.get(client_context).cloned()
    }

    pub fn contexts(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaperSize;

    fn slot(token: &str) -> ScanSlot {
        ScanSlot {
            service: HostedService {
                endpoint: "http://10.0.0.9:8018/scan".into(),
                ..Default::default()
            },
            destination_token: token.into(),
            profile: ScanProfile {
                id: "ctx-1".into(),
                name: "Desk".into(),
                paper_size: PaperSize::A4,
                color: None,
                resolution: 300,
                format: None,
                input_src: "Auto".into(),
                image_format: "jpeg".into(),
                quality: 85,
                target_folder: "/tmp/scans".into(),
                use_pdf: false,
            },
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ContextRegistry::new();
        registry.register("ctx-1", slot("tok-a")).unwrap();
        let found = registry.lookup("ctx-1").unwrap();
        assert_eq!(found.destination_token, "tok-a");
        assert!(registry.lookup("ctx-2").is_none());
    }

    #[test]
    fn test_context_is_write_once() {
        let mut registry = ContextRegistry::new();
        registry.register("ctx-1", slot("tok-a")).unwrap();
        let err = registry.register("ctx-1", slot("tok-b")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        // the original binding survives
        assert_eq!(registry.lookup("ctx-1").unwrap().destination_token, "tok-a");
    }
}

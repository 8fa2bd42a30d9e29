// Firewalld Sync - Zone Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Firewall zone model.

use serde::Serialize;

/// A firewall zone as last reported by the daemon.
///
/// Entries are replaced wholesale by every zone fetch and never patched
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Zone {
    pub name: String,
    /// Object path of the zone's permanent configuration.
    pub path: Option<String>,
    pub services: Vec<String>,
    pub interfaces: Vec<String>,
}

impl Zone {
    /// Create a new, empty zone.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Whether the zone currently permits the given service.
    pub fn has_service(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service)
    }

    pub fn has_interface(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }
}

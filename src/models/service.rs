// Firewalld Sync - Service Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Firewall service descriptor model.

use serde::Serialize;

use super::Port;

/// A predefined firewalld service, resolved from its settings.
///
/// The zones containing a service are not stored here; they are derived
/// from the zone map on request (see `FirewallState::zones_by_service`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Service {
    /// Daemon identifier, e.g. `ssh`.
    pub id: String,
    /// Short display name, e.g. `SSH`.
    pub name: String,
    pub description: String,
    pub ports: Vec<Port>,
}

impl Service {
    /// Create a new service.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// Display name, falling back to the id for services without a short name.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Get a summary of the ports used by this service.
    pub fn ports_summary(&self) -> String {
        if self.ports.is_empty() {
            return String::new();
        }

        let port_strs: Vec<String> = self.ports.iter()
            .take(3)
            .map(ToString::to_string)
            .collect();

        if self.ports.len() > 3 {
            format!("{} +{}", port_strs.join(", "), self.ports.len() - 3)
        } else {
            port_strs.join(", ")
        }
    }
}

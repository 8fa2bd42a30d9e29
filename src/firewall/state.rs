// Firewalld Sync - State Projection
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! The externally observable projection of firewalld's state.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::models::{Service, Zone};

/// Snapshot of the daemon state as seen by this client.
///
/// Only the state worker mutates it; everyone else receives copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirewallState {
    /// Whether the firewalld unit exists on this system.
    pub installed: bool,
    /// Whether firewalld currently owns its bus name.
    pub enabled: bool,
    /// Whether the caller lacks authorization for privileged actions.
    pub readonly: bool,
    /// Resolved service descriptors, keyed by service id.
    pub services: BTreeMap<String, Service>,
    /// Ids of services present in at least one zone.
    pub enabled_services: BTreeSet<String>,
    pub zones: BTreeMap<String, Zone>,
}

impl Default for FirewallState {
    fn default() -> Self {
        Self {
            installed: true,
            enabled: false,
            readonly: true,
            services: BTreeMap::new(),
            enabled_services: BTreeSet::new(),
            zones: BTreeMap::new(),
        }
    }
}

impl FirewallState {
    /// Zones currently containing `service`, in zone order.
    pub fn zones_by_service(&self, service: &str) -> Vec<&Zone> {
        self.zones
            .values()
            .filter(|zone| zone.has_service(service))
            .collect()
    }

    /// Union of every zone's service list.
    pub fn services_in_zones(&self) -> BTreeSet<String> {
        self.zones
            .values()
            .flat_map(|zone| zone.services.iter().cloned())
            .collect()
    }

    /// Descriptors of the enabled services. Ids whose descriptor is still
    /// being fetched are skipped.
    pub fn enabled_service_descriptors(&self) -> Vec<&Service> {
        self.enabled_services
            .iter()
            .filter_map(|id| self.services.get(id))
            .collect()
    }

    /// The subset of `available` that is not enabled in any zone yet.
    pub fn addable_services<'a>(&self, available: &'a [Service]) -> Vec<&'a Service> {
        available
            .iter()
            .filter(|service| !self.enabled_services.contains(&service.id))
            .collect()
    }

    /// Drop every cached entry and record the new connection state.
    pub(crate) fn reset(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.services.clear();
        self.enabled_services.clear();
        self.zones.clear();
    }

    /// Forget zones that are no longer listed by the daemon.
    pub(crate) fn retain_zones(&mut self, names: &[String]) {
        self.zones.retain(|name, _| names.contains(name));
    }

    pub(crate) fn replace_zone(&mut self, zone: Zone) {
        self.zones.insert(zone.name.clone(), zone);
    }

    pub(crate) fn insert_service(&mut self, service: Service) {
        self.services.insert(service.id.clone(), service);
    }

    pub(crate) fn enable_services<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.enabled_services.extend(ids);
    }

    pub(crate) fn disable_service(&mut self, id: &str) {
        self.enabled_services.remove(id);
    }

    /// Returns true when the flag actually flipped.
    pub(crate) fn set_installed(&mut self, installed: bool) -> bool {
        let changed = self.installed != installed;
        self.installed = installed;
        changed
    }
}

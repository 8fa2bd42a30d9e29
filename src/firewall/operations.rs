// Firewalld Sync - Mutating Operations
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Service and interface changes, applied live and then persisted.
//!
//! None of these touch the cached state; the daemon's notifications bring
//! the effect back in. Failures are logged and never rolled back, so the
//! live and permanent configuration can diverge after a partial failure.

use futures::future::join_all;
use tracing::{info, warn};

use super::error::Result;
use super::gateway::Gateway;
use super::refresh::Firewall;
use crate::models::Zone;

/// Name used in log lines for the daemon's default zone.
fn zone_label(zone: &str) -> &str {
    if zone.is_empty() {
        "<default>"
    } else {
        zone
    }
}

impl<G: Gateway> Firewall<G> {
    /// Add a predefined service to a zone, live and permanently.
    ///
    /// An absent zone name means the daemon's default zone. The permanent
    /// configuration object is `zone_path` when given, otherwise it is
    /// resolved from the zone name.
    pub async fn add_service(&self, service: &str, zone_path: Option<&str>, zone_name: Option<&str>) {
        let zone = zone_name.unwrap_or("");
        if let Err(e) = self.try_add_service(service, zone_path, zone).await {
            warn!("Failed to add service {} to zone {}: {}", service, zone_label(zone), e);
        }
    }

    async fn try_add_service(&self, service: &str, zone_path: Option<&str>, zone: &str) -> Result<()> {
        match self.gateway.add_service(zone, service, 0).await {
            Ok(()) => info!("Added service {} to zone {} (runtime)", service, zone_label(zone)),
            Err(e) if e.is_already_enabled() => {
                info!("Service {} already enabled in zone {}", service, zone_label(zone));
            }
            Err(e) => return Err(e),
        }

        let path = match zone_path {
            Some(path) => path.to_string(),
            None => self.zone_path(zone).await?,
        };

        match self.gateway.config_zone_add_service(&path, service).await {
            Ok(()) => info!("Added service {} to zone {} (permanent)", service, zone_label(zone)),
            Err(e) if e.is_already_enabled() => {
                info!("Service {} already in permanent config of zone {}", service, zone_label(zone));
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Add every service to every zone, or to the default zone when `zones`
    /// is empty. Each pair succeeds or fails on its own.
    pub async fn add_services(&self, services: &[String], zones: &[String]) {
        if zones.is_empty() {
            join_all(services.iter().map(|service| self.add_service(service, None, None))).await;
            return;
        }

        join_all(zones.iter().map(|zone| async move {
            let path = match self.gateway.get_zone_by_name(zone).await {
                Ok(path) => path,
                Err(e) => {
                    warn!("Failed to resolve config path of zone {}: {}", zone, e);
                    return;
                }
            };

            join_all(
                services
                    .iter()
                    .map(|service| self.add_service(service, Some(&path), Some(zone))),
            )
            .await;
        }))
        .await;
    }

    /// Remove a service from every zone that currently contains it.
    pub async fn remove_service(&self, service: &str) {
        let state = match self.store.snapshot().await {
            Ok(state) => state,
            Err(e) => {
                warn!("Failed to remove service {}: {}", service, e);
                return;
            }
        };

        let targets: Vec<(String, Option<String>)> = state
            .zones_by_service(service)
            .into_iter()
            .map(|zone| (zone.name.clone(), zone.path.clone()))
            .collect();

        join_all(targets.iter().map(|(zone, path)| async move {
            if let Err(e) = self.try_remove_service(service, zone, path.as_deref()).await {
                warn!("Failed to remove service {} from zone {}: {}", service, zone, e);
            }
        }))
        .await;
    }

    async fn try_remove_service(&self, service: &str, zone: &str, zone_path: Option<&str>) -> Result<()> {
        self.gateway.remove_service(zone, service).await?;
        info!("Removed service {} from zone {} (runtime)", service, zone);

        let path = match zone_path {
            Some(path) => path.to_string(),
            None => self.zone_path("").await?,
        };
        self.gateway.config_zone_remove_service(&path, service).await?;
        info!("Removed service {} from zone {} (permanent)", service, zone);
        Ok(())
    }

    /// Attach an interface to a zone, live first, then permanently.
    pub async fn add_interface_to_zone(&self, interface: &str, zone: &str, zone_path: Option<&str>) {
        if let Err(e) = self.try_add_interface(interface, zone, zone_path).await {
            warn!("Failed to add interface {} to zone {}: {}", interface, zone, e);
        }
    }

    async fn try_add_interface(&self, interface: &str, zone: &str, zone_path: Option<&str>) -> Result<()> {
        self.gateway.add_interface(zone, interface).await?;
        let path = match zone_path {
            Some(path) => path.to_string(),
            None => self.zone_path(zone).await?,
        };
        self.gateway.config_zone_add_interface(&path, interface).await?;
        info!("Added interface {} to zone {}", interface, zone);
        Ok(())
    }

    /// Detach an interface from a zone, live first, then permanently.
    pub async fn remove_interface_from_zone(&self, interface: &str, zone: &str, zone_path: Option<&str>) {
        if let Err(e) = self.try_remove_interface(interface, zone, zone_path).await {
            warn!("Failed to remove interface {} from zone {}: {}", interface, zone, e);
        }
    }

    async fn try_remove_interface(&self, interface: &str, zone: &str, zone_path: Option<&str>) -> Result<()> {
        self.gateway.remove_interface(zone, interface).await?;
        let path = match zone_path {
            Some(path) => path.to_string(),
            None => self.zone_path(zone).await?,
        };
        self.gateway.config_zone_remove_interface(&path, interface).await?;
        info!("Removed interface {} from zone {}", interface, zone);
        Ok(())
    }

    /// Make `selected` the zone's interface list: detach what is no longer
    /// selected, attach what is new.
    pub async fn set_zone_interfaces(&self, zone: &Zone, selected: &[String]) {
        let path = zone.path.as_deref();

        let removals = zone
            .interfaces
            .iter()
            .filter(|interface| !selected.contains(interface))
            .map(|interface| self.remove_interface_from_zone(interface, &zone.name, path));
        join_all(removals).await;

        let additions = selected
            .iter()
            .filter(|interface| !zone.has_interface(interface))
            .map(|interface| self.add_interface_to_zone(interface, &zone.name, path));
        join_all(additions).await;
    }

    /// Permanent configuration path of `zone`, or of the default zone when
    /// `zone` is empty.
    async fn zone_path(&self, zone: &str) -> Result<String> {
        let name = if zone.is_empty() {
            self.gateway.get_default_zone().await?
        } else {
            zone.to_string()
        };
        self.gateway.get_zone_by_name(&name).await
    }
}

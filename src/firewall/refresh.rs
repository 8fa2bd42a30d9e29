// Firewalld Sync - Refresh Orchestrator
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Re-derives the cached zone and service state from the daemon.
//!
//! Every trigger starts an independent branch; branches are neither
//! serialized nor cancelled, so the last write per zone entry wins.
//! Re-running a full refresh always converges to the daemon's state.
//! Failures are logged where they happen and stop only their branch,
//! keeping whatever was already written.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{FirewallError, Result};
use super::gateway::Gateway;
use super::signals::{DaemonEvent, FirewallSignal};
use super::store::Store;
use crate::models::{Service, Zone};

/// Refresh logic and mutating operations bound to one gateway.
pub struct Firewall<G> {
    pub(crate) gateway: Arc<G>,
    pub(crate) store: Store,
}

impl<G> Clone for Firewall<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            store: self.store.clone(),
        }
    }
}

impl<G: Gateway> Firewall<G> {
    pub fn new(gateway: Arc<G>, store: Store) -> Self {
        Self { gateway, store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// React to one daemon event.
    ///
    /// Immediate effects (connection reset, optimistic removal) are queued
    /// before this returns; the daemon round-trips run on the returned task.
    pub fn handle(&self, event: DaemonEvent) -> Option<JoinHandle<()>> {
        match event {
            DaemonEvent::Owner(owner) => self.on_owner_changed(owner),
            DaemonEvent::Signal(signal) => Some(self.on_signal(signal)),
        }
    }

    fn on_owner_changed(&self, owner: Option<String>) -> Option<JoinHandle<()>> {
        let enabled = owner.is_some();
        match &owner {
            Some(owner) => info!("firewalld is available as {}", owner),
            None => info!("firewalld went away"),
        }

        self.store.reset(enabled);
        if !enabled {
            self.store.emit_changed();
            return None;
        }

        let this = self.clone();
        Some(tokio::spawn(async move { this.load_all().await }))
    }

    fn on_signal(&self, signal: FirewallSignal) -> JoinHandle<()> {
        debug!("firewalld signal: {:?}", signal);
        let this = self.clone();

        match signal {
            FirewallSignal::ServiceAdded { service, .. } => {
                tokio::spawn(async move { this.service_added(&service).await })
            }
            FirewallSignal::ServiceRemoved { service, .. } => {
                self.store.disable_service(&service);
                tokio::spawn(async move {
                    if this.relist_zones(false).await.is_ok() {
                        this.store.emit_changed();
                    }
                })
            }
            FirewallSignal::InterfaceAdded { .. } | FirewallSignal::InterfaceRemoved { .. } => {
                tokio::spawn(async move {
                    let _ = this.relist_zones(true).await;
                })
            }
        }
    }

    /// Full load after the daemon appeared: every zone resolves its services
    /// and emits "changed" on its own as soon as it is done.
    async fn load_all(&self) {
        let Ok(names) = self.relist_zones(false).await else {
            return;
        };

        join_all(names.iter().map(|name| async move {
            if let Ok(ids) = self.resolve_zone_services(name).await {
                self.store.enable_services(ids);
                self.store.emit_changed();
            }
        }))
        .await;
    }

    /// Explicit invalidation: a full refresh that rebuilds the enabled
    /// service set wholesale and emits "changed" once, after every zone has
    /// settled. A zone whose services failed to resolve keeps the ids that
    /// were already enabled.
    pub async fn refresh(&self) {
        let Ok(names) = self.relist_zones(false).await else {
            return;
        };

        let resolved = join_all(names.iter().map(|name| async move {
            match self.resolve_zone_services(name).await {
                Ok(ids) => ids,
                Err(_) => self.enabled_in_zone(name).await,
            }
        }))
        .await;

        let enabled = resolved.into_iter().flatten().collect();
        self.store.replace_enabled_services(enabled);
        self.store.emit_changed();
    }

    /// Ids of the zone's services that are currently in the enabled set.
    async fn enabled_in_zone(&self, zone: &str) -> Vec<String> {
        let Ok(state) = self.store.snapshot().await else {
            return Vec::new();
        };
        state
            .zones
            .get(zone)
            .map(|z| {
                z.services
                    .iter()
                    .filter(|id| state.enabled_services.contains(*id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn service_added(&self, service: &str) {
        if self.relist_zones(false).await.is_err() {
            return;
        }

        let Ok(resolved) = self.resolve_services(&[service.to_string()], true).await else {
            return;
        };

        self.store
            .enable_services(resolved.into_iter().map(|s| s.id).collect());
        self.store.emit_changed();
    }

    /// List all zones and replace each zone's entry with a fresh fetch.
    ///
    /// Every zone fetch is allowed to settle; a single failure still fails
    /// the whole listing so its continuation does not run.
    pub(crate) async fn relist_zones(&self, emit_each_zone: bool) -> Result<Vec<String>> {
        let names = self
            .gateway
            .get_zones()
            .await
            .inspect_err(|e| warn!("Failed to list zones: {}", e))?;

        self.store.retain_zones(names.clone());

        let results = join_all(names.iter().map(|name| async move {
            let zone = self.fetch_zone(name).await?;
            self.store.replace_zone(zone);
            if emit_each_zone {
                self.store.emit_changed();
            }
            Ok::<(), FirewallError>(())
        }))
        .await;

        results.into_iter().collect::<Result<Vec<()>>>()?;
        Ok(names)
    }

    async fn fetch_zone(&self, name: &str) -> Result<Zone> {
        let (services, path, interfaces) = tokio::try_join!(
            self.gateway.get_zone_services(name),
            self.gateway.get_zone_by_name(name),
            self.gateway.get_zone_interfaces(name),
        )
        .inspect_err(|e| warn!("Failed to fetch zone {}: {}", name, e))?;

        Ok(Zone {
            name: name.to_string(),
            path: Some(path),
            services,
            interfaces,
        })
    }

    /// Resolve a zone's member services, returning their ids.
    async fn resolve_zone_services(&self, zone: &str) -> Result<Vec<String>> {
        let state = self.store.snapshot().await?;
        let Some(ids) = state.zones.get(zone).map(|z| z.services.clone()) else {
            return Ok(Vec::new());
        };

        let services = self.resolve_services(&ids, false).await?;
        Ok(services.into_iter().map(|s| s.id).collect())
    }

    /// Resolve service ids to descriptors.
    ///
    /// Cached descriptors are reused unless `force` is set; fetched ones
    /// are cached. All lookups settle even when one of them fails.
    pub(crate) async fn resolve_services(&self, ids: &[String], force: bool) -> Result<Vec<Service>> {
        let cached: BTreeMap<String, Service> = if force {
            BTreeMap::new()
        } else {
            self.store.snapshot().await?.services
        };

        let results = join_all(ids.iter().map(|id| {
            let hit = cached.get(id).cloned();
            async move {
                if let Some(service) = hit {
                    return Ok(service);
                }

                let service = self
                    .gateway
                    .get_service_settings(id)
                    .await
                    .inspect_err(|e| warn!("Failed to fetch settings of service {}: {}", id, e))?;
                self.store.insert_service(service.clone());
                Ok::<Service, FirewallError>(service)
            }
        }))
        .await;

        results.into_iter().collect()
    }

    /// Zone names known to the daemon.
    pub async fn available_zones(&self) -> Result<Vec<String>> {
        self.gateway
            .get_zones()
            .await
            .inspect_err(|e| warn!("Failed to list zones: {}", e))
    }

    /// Every predefined service, resolved through the descriptor cache.
    pub async fn available_services(&self) -> Result<Vec<Service>> {
        let ids = self
            .gateway
            .list_services()
            .await
            .inspect_err(|e| warn!("Failed to list services: {}", e))?;
        self.resolve_services(&ids, false).await
    }
}

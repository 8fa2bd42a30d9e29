// Firewalld Sync - In-memory Daemon
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! In-memory stand-in for firewalld used by the refresh and operation tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::error::{FirewallError, Result};
use super::gateway::Gateway;
use crate::models::{Port, Service};

const ZONE_PATH_PREFIX: &str = "/org/fedoraproject/FirewallD1/config/zone/";

#[derive(Debug, Default, Clone)]
struct FakeZone {
    services: Vec<String>,
    interfaces: Vec<String>,
    permanent_services: Vec<String>,
    permanent_interfaces: Vec<String>,
}

#[derive(Debug)]
struct Daemon {
    default_zone: String,
    zones: BTreeMap<String, FakeZone>,
    catalog: BTreeMap<String, Service>,
    failures: HashSet<String>,
    settings_fetches: HashMap<String, usize>,
    add_service_calls: usize,
}

pub struct FakeGateway {
    daemon: Mutex<Daemon>,
    listing_gate: Mutex<Option<Arc<Notify>>>,
}

fn catalog() -> BTreeMap<String, Service> {
    let entries: [(&str, &str, &[(&str, &str)]); 5] = [
        ("ssh", "SSH", &[("22", "tcp")]),
        ("http", "WWW (HTTP)", &[("80", "tcp")]),
        ("https", "WWW (HTTPS)", &[("443", "tcp")]),
        ("dhcpv6-client", "DHCPv6 Client", &[("546", "udp")]),
        ("samba", "Samba", &[("139", "tcp"), ("445", "tcp"), ("137", "udp"), ("138", "udp")]),
    ];

    entries
        .iter()
        .map(|(id, name, ports)| {
            let service = Service {
                id: id.to_string(),
                name: name.to_string(),
                description: format!("{} service", name),
                ports: ports.iter().map(|(p, proto)| Port::new(p, proto)).collect(),
            };
            (id.to_string(), service)
        })
        .collect()
}

fn rejected(method: &str, message: String) -> FirewallError {
    FirewallError::Rejected {
        method: method.to_string(),
        message,
    }
}

impl FakeGateway {
    pub fn new(default_zone: &str) -> Self {
        Self {
            daemon: Mutex::new(Daemon {
                default_zone: default_zone.to_string(),
                zones: BTreeMap::new(),
                catalog: catalog(),
                failures: HashSet::new(),
                settings_fetches: HashMap::new(),
                add_service_calls: 0,
            }),
            listing_gate: Mutex::new(None),
        }
    }

    /// Add a zone whose live and permanent configuration match.
    pub fn with_zone(self, name: &str, services: &[&str], interfaces: &[&str]) -> Self {
        let services: Vec<String> = services.iter().map(|s| s.to_string()).collect();
        let interfaces: Vec<String> = interfaces.iter().map(|s| s.to_string()).collect();
        self.daemon.lock().unwrap().zones.insert(
            name.to_string(),
            FakeZone {
                permanent_services: services.clone(),
                permanent_interfaces: interfaces.clone(),
                services,
                interfaces,
            },
        );
        self
    }

    /// Make the call identified by `key` (e.g. `addService:dmz:https`) fail.
    pub fn fail(&self, key: &str) {
        self.daemon.lock().unwrap().failures.insert(key.to_string());
    }

    /// Block the next `getZones` call until the returned gate is notified.
    pub fn hold_listing(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.listing_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn put_service(&self, zone: &str, service: &str) {
        let mut daemon = self.daemon.lock().unwrap();
        let entry = daemon.zones.entry(zone.to_string()).or_default();
        if !entry.services.iter().any(|s| s == service) {
            entry.services.push(service.to_string());
        }
    }

    pub fn drop_service(&self, zone: &str, service: &str) {
        if let Some(entry) = self.daemon.lock().unwrap().zones.get_mut(zone) {
            entry.services.retain(|s| s != service);
        }
    }

    pub fn put_interface(&self, zone: &str, interface: &str) {
        let mut daemon = self.daemon.lock().unwrap();
        let entry = daemon.zones.entry(zone.to_string()).or_default();
        entry.interfaces.push(interface.to_string());
    }

    pub fn delete_zone(&self, zone: &str) {
        self.daemon.lock().unwrap().zones.remove(zone);
    }

    pub fn rename_service(&self, service: &str, name: &str) {
        if let Some(entry) = self.daemon.lock().unwrap().catalog.get_mut(service) {
            entry.name = name.to_string();
        }
    }

    pub fn zone_services(&self, zone: &str) -> Vec<String> {
        self.zone(zone).services
    }

    pub fn permanent_services(&self, zone: &str) -> Vec<String> {
        self.zone(zone).permanent_services
    }

    pub fn zone_interfaces(&self, zone: &str) -> Vec<String> {
        self.zone(zone).interfaces
    }

    pub fn permanent_interfaces(&self, zone: &str) -> Vec<String> {
        self.zone(zone).permanent_interfaces
    }

    pub fn settings_fetches(&self, service: &str) -> usize {
        let daemon = self.daemon.lock().unwrap();
        daemon.settings_fetches.get(service).copied().unwrap_or(0)
    }

    pub fn add_service_calls(&self) -> usize {
        self.daemon.lock().unwrap().add_service_calls
    }

    fn zone(&self, zone: &str) -> FakeZone {
        let daemon = self.daemon.lock().unwrap();
        daemon.zones.get(zone).cloned().unwrap_or_default()
    }

    /// Run `f` against the named zone (empty name: default zone).
    fn with_live_zone<T>(
        &self,
        method: &str,
        zone: &str,
        subject: &str,
        f: impl FnOnce(&mut FakeZone) -> Result<T>,
    ) -> Result<T> {
        let mut daemon = self.daemon.lock().unwrap();
        let zone = if zone.is_empty() {
            daemon.default_zone.clone()
        } else {
            zone.to_string()
        };

        let key = if subject.is_empty() {
            format!("{}:{}", method, zone)
        } else {
            format!("{}:{}:{}", method, zone, subject)
        };
        if daemon.failures.contains(&key) {
            return Err(rejected(method, format!("injected failure for {}", key)));
        }

        match daemon.zones.get_mut(&zone) {
            Some(entry) => f(entry),
            None => Err(rejected(method, format!("INVALID_ZONE: {}", zone))),
        }
    }

    fn with_config_zone<T>(
        &self,
        method: &str,
        path: &str,
        subject: &str,
        f: impl FnOnce(&mut FakeZone) -> Result<T>,
    ) -> Result<T> {
        let zone = path
            .strip_prefix(ZONE_PATH_PREFIX)
            .ok_or_else(|| rejected(method, format!("INVALID_PATH: {}", path)))?;
        self.with_live_zone(&format!("config.{}", method), zone, subject, f)
    }
}

fn insert(list: &mut Vec<String>, item: &str) -> Result<()> {
    if list.iter().any(|i| i == item) {
        return Err(rejected("add", format!("ALREADY_ENABLED: {}", item)));
    }
    list.push(item.to_string());
    Ok(())
}

fn remove(list: &mut Vec<String>, item: &str) -> Result<()> {
    if !list.iter().any(|i| i == item) {
        return Err(rejected("remove", format!("NOT_ENABLED: {}", item)));
    }
    list.retain(|i| i != item);
    Ok(())
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn get_zones(&self) -> Result<Vec<String>> {
        let gate = self.listing_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let daemon = self.daemon.lock().unwrap();
        if daemon.failures.contains("getZones") {
            return Err(rejected("getZones", "injected failure".to_string()));
        }
        Ok(daemon.zones.keys().cloned().collect())
    }

    async fn get_zone_services(&self, zone: &str) -> Result<Vec<String>> {
        self.with_live_zone("getServices", zone, "", |z| Ok(z.services.clone()))
    }

    async fn get_zone_interfaces(&self, zone: &str) -> Result<Vec<String>> {
        self.with_live_zone("getInterfaces", zone, "", |z| Ok(z.interfaces.clone()))
    }

    async fn get_zone_by_name(&self, zone: &str) -> Result<String> {
        let path = format!("{}{}", ZONE_PATH_PREFIX, zone);
        self.with_live_zone("getZoneByName", zone, "", |_| Ok(path))
    }

    async fn get_default_zone(&self) -> Result<String> {
        Ok(self.daemon.lock().unwrap().default_zone.clone())
    }

    async fn list_services(&self) -> Result<Vec<String>> {
        Ok(self.daemon.lock().unwrap().catalog.keys().cloned().collect())
    }

    async fn get_service_settings(&self, service: &str) -> Result<Service> {
        let mut daemon = self.daemon.lock().unwrap();
        *daemon.settings_fetches.entry(service.to_string()).or_default() += 1;
        daemon
            .catalog
            .get(service)
            .cloned()
            .ok_or_else(|| rejected("getServiceSettings", format!("INVALID_SERVICE: {}", service)))
    }

    async fn add_service(&self, zone: &str, service: &str, _timeout: i32) -> Result<()> {
        self.daemon.lock().unwrap().add_service_calls += 1;
        self.with_live_zone("addService", zone, service, |z| insert(&mut z.services, service))
    }

    async fn remove_service(&self, zone: &str, service: &str) -> Result<()> {
        self.with_live_zone("removeService", zone, service, |z| remove(&mut z.services, service))
    }

    async fn add_interface(&self, zone: &str, interface: &str) -> Result<()> {
        self.with_live_zone("addInterface", zone, interface, |z| insert(&mut z.interfaces, interface))
    }

    async fn remove_interface(&self, zone: &str, interface: &str) -> Result<()> {
        self.with_live_zone("removeInterface", zone, interface, |z| remove(&mut z.interfaces, interface))
    }

    async fn config_zone_add_service(&self, path: &str, service: &str) -> Result<()> {
        self.with_config_zone("addService", path, service, |z| insert(&mut z.permanent_services, service))
    }

    async fn config_zone_remove_service(&self, path: &str, service: &str) -> Result<()> {
        self.with_config_zone("removeService", path, service, |z| remove(&mut z.permanent_services, service))
    }

    async fn config_zone_add_interface(&self, path: &str, interface: &str) -> Result<()> {
        self.with_config_zone("addInterface", path, interface, |z| insert(&mut z.permanent_interfaces, interface))
    }

    async fn config_zone_remove_interface(&self, path: &str, interface: &str) -> Result<()> {
        self.with_config_zone("removeInterface", path, interface, |z| {
            remove(&mut z.permanent_interfaces, interface)
        })
    }
}

// Firewalld Sync - RPC Gateway
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Typed request/response calls to firewalld.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use tracing::info;
use zbus::zvariant::{DynamicDeserialize, DynamicType, OwnedObjectPath};
use zbus::Connection;

use super::error::{FirewallError, Result};
use super::signals::{self, DaemonEvent};
use super::{interfaces, paths, BUS_NAME};
use crate::models::{Port, Service};

/// The firewalld calls this client relies on.
///
/// Zone-scoped calls take the zone name, with an empty name meaning the
/// daemon's default zone. `config_zone_*` calls act on the permanent
/// configuration object at `path`.
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    async fn get_zones(&self) -> Result<Vec<String>>;
    async fn get_zone_services(&self, zone: &str) -> Result<Vec<String>>;
    async fn get_zone_interfaces(&self, zone: &str) -> Result<Vec<String>>;
    /// Resolve a zone name to its permanent configuration object path.
    async fn get_zone_by_name(&self, zone: &str) -> Result<String>;
    async fn get_default_zone(&self) -> Result<String>;
    async fn list_services(&self) -> Result<Vec<String>>;
    async fn get_service_settings(&self, service: &str) -> Result<Service>;

    async fn add_service(&self, zone: &str, service: &str, timeout: i32) -> Result<()>;
    async fn remove_service(&self, zone: &str, service: &str) -> Result<()>;
    async fn add_interface(&self, zone: &str, interface: &str) -> Result<()>;
    async fn remove_interface(&self, zone: &str, interface: &str) -> Result<()>;

    async fn config_zone_add_service(&self, path: &str, service: &str) -> Result<()>;
    async fn config_zone_remove_service(&self, path: &str, service: &str) -> Result<()>;
    async fn config_zone_add_interface(&self, path: &str, interface: &str) -> Result<()>;
    async fn config_zone_remove_interface(&self, path: &str, interface: &str) -> Result<()>;
}

/// Reply of `getServiceSettings`:
/// (version, short, description, ports, modules, destinations, protocols, source ports).
type ServiceSettingsReply = (
    String,
    String,
    String,
    Vec<(String, String)>,
    Vec<String>,
    HashMap<String, String>,
    Vec<String>,
    Vec<(String, String)>,
);

/// Gateway backed by a system bus connection.
///
/// A fresh instance is created for every (re)connection; instances are
/// never revived.
pub struct DbusGateway {
    connection: Connection,
}

impl DbusGateway {
    /// Connect to the system bus and subscribe to firewalld's ownership
    /// and zone notifications.
    pub async fn connect(queue: usize) -> Result<(Self, BoxStream<'static, DaemonEvent>)> {
        info!("Connecting to firewalld...");

        let connection = Connection::system().await?;
        let events = signals::subscribe(&connection, queue).await?;

        info!("Subscribed to firewalld notifications");
        Ok((Self { connection }, events))
    }

    async fn call<B, R>(&self, path: &str, interface: &str, method: &str, body: &B) -> Result<R>
    where
        B: Serialize + DynamicType,
        R: for<'d> DynamicDeserialize<'d>,
    {
        let reply = self
            .connection
            .call_method(Some(BUS_NAME), path, Some(interface), method, body)
            .await
            .map_err(|e| rejected(method, e))?;

        let value = reply.body().deserialize()?;
        Ok(value)
    }

    async fn invoke<B>(&self, path: &str, interface: &str, method: &str, body: &B) -> Result<()>
    where
        B: Serialize + DynamicType,
    {
        self.connection
            .call_method(Some(BUS_NAME), path, Some(interface), method, body)
            .await
            .map_err(|e| rejected(method, e))?;
        Ok(())
    }
}

/// Turn daemon-side exceptions into `Rejected`, keep the rest as transport errors.
fn rejected(method: &str, err: zbus::Error) -> FirewallError {
    match err {
        zbus::Error::MethodError(name, detail, _) => FirewallError::Rejected {
            method: method.to_string(),
            message: detail.unwrap_or_else(|| name.to_string()),
        },
        other => FirewallError::Transport(other),
    }
}

fn service_from_settings(id: &str, settings: ServiceSettingsReply) -> Service {
    let (_, name, description, ports, ..) = settings;
    Service {
        id: id.to_string(),
        name,
        description,
        ports: ports
            .iter()
            .map(|(port, protocol)| Port::new(port, protocol))
            .collect(),
    }
}

#[async_trait]
impl Gateway for DbusGateway {
    async fn get_zones(&self) -> Result<Vec<String>> {
        self.call(paths::ROOT, interfaces::ZONE, "getZones", &()).await
    }

    async fn get_zone_services(&self, zone: &str) -> Result<Vec<String>> {
        self.call(paths::ROOT, interfaces::ZONE, "getServices", &(zone,)).await
    }

    async fn get_zone_interfaces(&self, zone: &str) -> Result<Vec<String>> {
        self.call(paths::ROOT, interfaces::ZONE, "getInterfaces", &(zone,)).await
    }

    async fn get_zone_by_name(&self, zone: &str) -> Result<String> {
        let path: OwnedObjectPath = self
            .call(paths::CONFIG, interfaces::CONFIG, "getZoneByName", &(zone,))
            .await?;
        Ok(path.to_string())
    }

    async fn get_default_zone(&self) -> Result<String> {
        self.call(paths::ROOT, interfaces::MAIN, "getDefaultZone", &()).await
    }

    async fn list_services(&self) -> Result<Vec<String>> {
        self.call(paths::ROOT, interfaces::MAIN, "listServices", &()).await
    }

    async fn get_service_settings(&self, service: &str) -> Result<Service> {
        let settings: ServiceSettingsReply = self
            .call(paths::ROOT, interfaces::MAIN, "getServiceSettings", &(service,))
            .await?;
        Ok(service_from_settings(service, settings))
    }

    async fn add_service(&self, zone: &str, service: &str, timeout: i32) -> Result<()> {
        self.invoke(paths::ROOT, interfaces::ZONE, "addService", &(zone, service, timeout)).await
    }

    async fn remove_service(&self, zone: &str, service: &str) -> Result<()> {
        self.invoke(paths::ROOT, interfaces::ZONE, "removeService", &(zone, service)).await
    }

    async fn add_interface(&self, zone: &str, interface: &str) -> Result<()> {
        self.invoke(paths::ROOT, interfaces::ZONE, "addInterface", &(zone, interface)).await
    }

    async fn remove_interface(&self, zone: &str, interface: &str) -> Result<()> {
        self.invoke(paths::ROOT, interfaces::ZONE, "removeInterface", &(zone, interface)).await
    }

    async fn config_zone_add_service(&self, path: &str, service: &str) -> Result<()> {
        self.invoke(path, interfaces::CONFIG_ZONE, "addService", &(service,)).await
    }

    async fn config_zone_remove_service(&self, path: &str, service: &str) -> Result<()> {
        self.invoke(path, interfaces::CONFIG_ZONE, "removeService", &(service,)).await
    }

    async fn config_zone_add_interface(&self, path: &str, interface: &str) -> Result<()> {
        self.invoke(path, interfaces::CONFIG_ZONE, "addInterface", &(interface,)).await
    }

    async fn config_zone_remove_interface(&self, path: &str, interface: &str) -> Result<()> {
        self.invoke(path, interfaces::CONFIG_ZONE, "removeInterface", &(interface,)).await
    }
}

// Firewalld Sync - Firewall Module
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Firewalld D-Bus client: a cached projection of zones and services kept
//! in sync with the daemon's notifications, plus mutating operations.

mod client;
mod error;
mod gateway;
mod lifecycle;
mod operations;
mod refresh;
mod signals;
mod state;
mod store;

#[cfg(test)]
mod fake;

pub use client::FirewallClient;
pub use error::{FirewallError, Result};
pub use gateway::{DbusGateway, Gateway};
pub use lifecycle::{disable_unit, enable_unit, watch_unit, Presence, PresenceAction};
pub use refresh::Firewall;
pub use signals::{DaemonEvent, FirewallSignal};
pub use state::FirewallState;
pub use store::Store;

/// D-Bus bus name for firewalld.
pub const BUS_NAME: &str = "org.fedoraproject.FirewallD1";

/// D-Bus object paths.
pub mod paths {
    pub const ROOT: &str = "/org/fedoraproject/FirewallD1";
    pub const CONFIG: &str = "/org/fedoraproject/FirewallD1/config";
}

/// D-Bus interface names.
pub mod interfaces {
    /// Main firewalld interface (getDefaultZone, listServices, getServiceSettings)
    pub const MAIN: &str = "org.fedoraproject.FirewallD1";
    /// Runtime zone operations and zone signals
    pub const ZONE: &str = "org.fedoraproject.FirewallD1.zone";
    pub const CONFIG: &str = "org.fedoraproject.FirewallD1.config";
    pub const CONFIG_ZONE: &str = "org.fedoraproject.FirewallD1.config.zone";
}

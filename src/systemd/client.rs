// Firewalld Sync - Systemd Client
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Unit status over D-Bus, unit lifecycle through `pkexec systemctl`.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use zbus::zvariant::{OwnedObjectPath, OwnedValue};
use zbus::Connection;

use crate::firewall::{FirewallError, Result};

const SYSTEMD_BUS: &str = "org.freedesktop.systemd1";
const SYSTEMD_PATH: &str = "/org/freedesktop/systemd1";
const MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";
const UNIT_INTERFACE: &str = "org.freedesktop.systemd1.Unit";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Run state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Running,
    Stopped,
    Failed,
    Unknown,
}

impl UnitState {
    /// Map a unit's `SubState` property.
    pub fn from_sub_state(s: &str) -> Self {
        match s {
            "running" => UnitState::Running,
            "exited" | "dead" | "inactive" => UnitState::Stopped,
            "failed" => UnitState::Failed,
            _ => UnitState::Unknown,
        }
    }
}

/// Whether a unit exists and what it is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitStatus {
    pub exists: bool,
    pub state: UnitState,
}

impl UnitStatus {
    pub fn is_running(&self) -> bool {
        self.state == UnitState::Running
    }
}

/// Lifecycle control of one service unit.
#[async_trait]
pub trait UnitControl: Send + Sync {
    async fn status(&self) -> Result<UnitStatus>;
    async fn enable(&self) -> Result<()>;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn disable(&self) -> Result<()>;
}

/// Client for one systemd unit.
pub struct SystemdClient {
    connection: Connection,
    unit: String,
}

impl SystemdClient {
    /// Connect to systemd on the system bus for the given unit.
    pub async fn connect(unit: &str) -> Result<Self> {
        info!("Connecting to systemd for {}...", unit);
        let connection = Connection::system().await?;
        Ok(Self {
            connection,
            unit: unit.to_string(),
        })
    }

    async fn unit_path(&self) -> Result<OwnedObjectPath> {
        let reply = match self.manager_call("GetUnit").await {
            Ok(reply) => reply,
            // Not loaded yet; LoadUnit also answers for units that do not exist.
            Err(_) => self.manager_call("LoadUnit").await?,
        };
        Ok(reply.body().deserialize()?)
    }

    async fn manager_call(&self, method: &str) -> Result<zbus::Message> {
        let reply = self
            .connection
            .call_method(
                Some(SYSTEMD_BUS),
                SYSTEMD_PATH,
                Some(MANAGER_INTERFACE),
                method,
                &(self.unit.as_str(),),
            )
            .await?;
        Ok(reply)
    }

    /// Get a string property from the unit.
    async fn get_unit_property(&self, unit_path: &OwnedObjectPath, property: &str) -> Result<String> {
        let value: OwnedValue = self
            .connection
            .call_method(
                Some(SYSTEMD_BUS),
                unit_path.as_ref(),
                Some(PROPERTIES_INTERFACE),
                "Get",
                &(UNIT_INTERFACE, property),
            )
            .await?
            .body()
            .deserialize()?;

        let s: String = value.try_into()?;
        Ok(s)
    }
}

#[async_trait]
impl UnitControl for SystemdClient {
    async fn status(&self) -> Result<UnitStatus> {
        let path = self.unit_path().await?;
        let load_state = self.get_unit_property(&path, "LoadState").await?;
        let sub_state = self.get_unit_property(&path, "SubState").await?;
        debug!("{}: LoadState={} SubState={}", self.unit, load_state, sub_state);

        Ok(UnitStatus {
            exists: load_state != "not-found",
            state: UnitState::from_sub_state(&sub_state),
        })
    }

    async fn enable(&self) -> Result<()> {
        run_systemctl_command("enable", &self.unit).await?;
        info!("Enabled unit: {}", self.unit);
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        run_systemctl_command("start", &self.unit).await?;
        info!("Started unit: {}", self.unit);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        run_systemctl_command("stop", &self.unit).await?;
        info!("Stopped unit: {}", self.unit);
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        run_systemctl_command("disable", &self.unit).await?;
        info!("Disabled unit: {}", self.unit);
        Ok(())
    }
}

/// Run a systemctl command with pkexec for authentication.
async fn run_systemctl_command(action: &str, unit: &str) -> Result<()> {
    let output = Command::new("pkexec")
        .args(["systemctl", action, unit])
        .output()
        .await
        .map_err(|e| FirewallError::Command {
            program: format!("pkexec systemctl {} {}", action, unit),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // 126: the authentication dialog was dismissed
        let message = if stderr.contains("dismissed") || stderr.contains("cancelled") || output.status.code() == Some(126) {
            "authentication cancelled".to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(FirewallError::Command {
            program: format!("systemctl {} {}", action, unit),
            message,
        });
    }

    Ok(())
}

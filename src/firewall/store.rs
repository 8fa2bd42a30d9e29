// Firewalld Sync - State Worker
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Single-owner holder of [`FirewallState`].
//!
//! All mutations travel through one command queue and are applied by one
//! task, in the order they were sent. Readers get copies, either on demand
//! through [`Store::snapshot`] or pushed with every "changed" notification.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::{FirewallError, Result};
use super::state::FirewallState;
use crate::models::{Service, Zone};

const CHANGED_CHANNEL_SIZE: usize = 64;

enum Command {
    Reset { enabled: bool },
    SetInstalled(bool),
    SetReadonly(bool),
    RetainZones(Vec<String>),
    ReplaceZone(Zone),
    InsertService(Service),
    EnableServices(Vec<String>),
    ReplaceEnabledServices(Vec<String>),
    DisableService(String),
    EmitChanged,
    Snapshot(oneshot::Sender<FirewallState>),
}

/// Cheaply cloneable handle to the state worker.
#[derive(Clone)]
pub struct Store {
    commands: mpsc::UnboundedSender<Command>,
    changed: broadcast::Sender<Arc<FirewallState>>,
}

impl Store {
    /// Spawn the worker task and return a handle to it.
    ///
    /// The worker exits once every handle has been dropped.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let (changed, _) = broadcast::channel(CHANGED_CHANNEL_SIZE);

        let worker = Worker {
            state: FirewallState::default(),
            commands: rx,
            changed: changed.clone(),
        };
        let handle = tokio::spawn(worker.run());

        (Self { commands, changed }, handle)
    }

    /// Receive one message per "changed" notification, carrying the state
    /// as it was when the notification fired.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FirewallState>> {
        self.changed.subscribe()
    }

    /// Copy of the state after every command sent so far has been applied.
    pub async fn snapshot(&self) -> Result<FirewallState> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(tx))
            .map_err(|_| FirewallError::StoreClosed)?;
        rx.await.map_err(|_| FirewallError::StoreClosed)
    }

    pub(crate) fn reset(&self, enabled: bool) {
        self.send(Command::Reset { enabled });
    }

    /// Emits "changed" only if the flag flips.
    pub(crate) fn set_installed(&self, installed: bool) {
        self.send(Command::SetInstalled(installed));
    }

    pub(crate) fn set_readonly(&self, readonly: bool) {
        self.send(Command::SetReadonly(readonly));
    }

    pub(crate) fn retain_zones(&self, names: Vec<String>) {
        self.send(Command::RetainZones(names));
    }

    pub(crate) fn replace_zone(&self, zone: Zone) {
        self.send(Command::ReplaceZone(zone));
    }

    pub(crate) fn insert_service(&self, service: Service) {
        self.send(Command::InsertService(service));
    }

    pub(crate) fn enable_services(&self, ids: Vec<String>) {
        self.send(Command::EnableServices(ids));
    }

    pub(crate) fn replace_enabled_services(&self, ids: Vec<String>) {
        self.send(Command::ReplaceEnabledServices(ids));
    }

    pub(crate) fn disable_service(&self, id: &str) {
        self.send(Command::DisableService(id.to_string()));
    }

    pub(crate) fn emit_changed(&self) {
        self.send(Command::EmitChanged);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("State worker has stopped, dropping update");
        }
    }
}

struct Worker {
    state: FirewallState,
    commands: mpsc::UnboundedReceiver<Command>,
    changed: broadcast::Sender<Arc<FirewallState>>,
}

impl Worker {
    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }
        debug!("State worker finished");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Reset { enabled } => self.state.reset(enabled),
            Command::SetInstalled(installed) => {
                if self.state.set_installed(installed) {
                    self.emit();
                }
            }
            Command::SetReadonly(readonly) => self.state.readonly = readonly,
            Command::RetainZones(names) => self.state.retain_zones(&names),
            Command::ReplaceZone(zone) => self.state.replace_zone(zone),
            Command::InsertService(service) => self.state.insert_service(service),
            Command::EnableServices(ids) => self.state.enable_services(ids),
            Command::ReplaceEnabledServices(ids) => {
                self.state.enabled_services.clear();
                self.state.enable_services(ids);
            }
            Command::DisableService(id) => self.state.disable_service(&id),
            Command::EmitChanged => self.emit(),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.state.clone());
            }
        }
    }

    fn emit(&self) {
        // No receivers is fine; the projection is still queryable.
        let _ = self.changed.send(Arc::new(self.state.clone()));
    }
}

// Firewalld Sync - Firewall Client
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Runtime wiring: the state worker, the D-Bus gateway with its event
//! stream, the presence watcher and the privilege check.

use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::stream::{BoxStream, StreamExt};
use futures::FutureExt;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{FirewallError, Result};
use super::gateway::{DbusGateway, Gateway};
use super::lifecycle::{self, Presence};
use super::refresh::Firewall;
use super::signals::DaemonEvent;
use super::state::FirewallState;
use super::store::Store;
use crate::config::Settings;
use crate::models::{Service, Zone};
use crate::polkit;
use crate::systemd::{SystemdClient, UnitControl, UnitStatus};

type EventStream = BoxStream<'static, DaemonEvent>;
type SharedFirewall<G> = Arc<RwLock<Option<Firewall<G>>>>;

/// Builds a fresh gateway together with its event stream.
type Connector<G> = Arc<dyn Fn() -> BoxFuture<'static, Result<(G, EventStream)>> + Send + Sync>;

fn dbus_connector(queue: usize) -> Connector<DbusGateway> {
    Arc::new(move || DbusGateway::connect(queue).boxed())
}

/// Client for firewalld, keeping a projection of its zones and services.
pub struct FirewallClient {
    store: Store,
    firewall: SharedFirewall<DbusGateway>,
    unit: Arc<dyn UnitControl>,
}

impl FirewallClient {
    /// Connect to the system bus and start tracking firewalld.
    ///
    /// Returns once the initial load has settled, so the projection already
    /// reflects the daemon (or its absence).
    pub async fn start(settings: &Settings) -> Result<Self> {
        let (store, _worker) = Store::spawn();
        let unit: Arc<dyn UnitControl> = Arc::new(SystemdClient::connect(settings.unit_name()).await?);
        let firewall: SharedFirewall<DbusGateway> = Arc::new(RwLock::new(None));
        let connect = dbus_connector(settings.signal_queue());

        spawn_privilege_check(store.clone(), settings.polkit_action().to_string());

        let mut events = match connect().await {
            Ok((gateway, events)) => {
                *firewall.write().await = Some(Firewall::new(Arc::new(gateway), store.clone()));
                Some(events)
            }
            Err(e) => {
                warn!("Failed to connect to firewalld: {}", e);
                store.reset(false);
                store.emit_changed();
                None
            }
        };

        // The stream opens with the current owner.
        if let Some(stream) = events.as_mut() {
            if let Some(event) = stream.next().await {
                if let Some(load) = dispatch(&firewall, event).await {
                    let _ = load.await;
                }
            }
        }

        let supervisor = Supervisor {
            store: store.clone(),
            firewall: Arc::clone(&firewall),
            events,
            statuses: lifecycle::watch_unit(Arc::clone(&unit), settings.unit_poll_interval()),
            presence: Presence::new(),
            connect,
        };
        tokio::spawn(supervisor.run());

        Ok(Self { store, firewall, unit })
    }

    /// Receive the projection after every change.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FirewallState>> {
        self.store.subscribe()
    }

    /// Current projection.
    pub async fn state(&self) -> Result<FirewallState> {
        self.store.snapshot().await
    }

    /// Enable and start the firewalld unit.
    pub async fn enable(&self) {
        info!("Enabling firewalld");
        lifecycle::enable_unit(self.unit.as_ref()).await;
    }

    /// Stop and disable the firewalld unit.
    pub async fn disable(&self) {
        info!("Disabling firewalld");
        lifecycle::disable_unit(self.unit.as_ref()).await;
    }

    pub async fn refresh(&self) -> Result<()> {
        self.connected().await?.refresh().await;
        Ok(())
    }

    pub async fn add_services(&self, services: &[String], zones: &[String]) -> Result<()> {
        self.connected().await?.add_services(services, zones).await;
        Ok(())
    }

    pub async fn remove_service(&self, service: &str) -> Result<()> {
        self.connected().await?.remove_service(service).await;
        Ok(())
    }

    /// Make `selected` the interface list of the named zone.
    pub async fn set_zone_interfaces(&self, zone: &str, selected: &[String]) -> Result<()> {
        let firewall = self.connected().await?;
        let state = self.store.snapshot().await?;
        let zone = state.zones.get(zone).cloned().unwrap_or_else(|| Zone::new(zone));
        firewall.set_zone_interfaces(&zone, selected).await;
        Ok(())
    }

    pub async fn available_zones(&self) -> Result<Vec<String>> {
        self.connected().await?.available_zones().await
    }

    pub async fn available_services(&self) -> Result<Vec<Service>> {
        self.connected().await?.available_services().await
    }

    /// Available services that are not enabled in any zone yet.
    pub async fn addable_services(&self) -> Result<Vec<Service>> {
        let available = self.available_services().await?;
        let state = self.store.snapshot().await?;
        Ok(state.addable_services(&available).into_iter().cloned().collect())
    }

    async fn connected(&self) -> Result<Firewall<DbusGateway>> {
        self.firewall
            .read()
            .await
            .clone()
            .ok_or(FirewallError::NotConnected)
    }
}

fn spawn_privilege_check(store: Store, action: String) {
    tokio::spawn(async move {
        match polkit::check_authorized(&action).await {
            Ok(true) => {
                store.set_readonly(false);
                store.emit_changed();
            }
            Ok(false) => info!("Not authorized for {}, staying read-only", action),
            Err(e) => warn!("Failed to check authorization: {}", e),
        }
    });
}

async fn dispatch<G: Gateway>(firewall: &SharedFirewall<G>, event: DaemonEvent) -> Option<JoinHandle<()>> {
    firewall.read().await.as_ref().and_then(|fw| fw.handle(event))
}

/// Feeds daemon events and unit status changes into the projection.
struct Supervisor<G> {
    store: Store,
    firewall: SharedFirewall<G>,
    events: Option<EventStream>,
    statuses: mpsc::Receiver<UnitStatus>,
    presence: Presence,
    connect: Connector<G>,
}

impl<G: Gateway> Supervisor<G> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                event = next_event(&mut self.events) => match event {
                    Some(event) => {
                        // Branches run detached; nothing waits on them.
                        let _ = dispatch(&self.firewall, event).await;
                    }
                    None => self.connection_lost().await,
                },
                status = self.statuses.recv() => match status {
                    Some(status) => self.unit_changed(status).await,
                    None => break,
                },
            }
        }
        debug!("Supervisor finished");
    }

    async fn connection_lost(&mut self) {
        warn!("Lost the system bus connection");
        self.events = None;
        *self.firewall.write().await = None;
        self.store.reset(false);
        self.store.emit_changed();
    }

    async fn unit_changed(&mut self, status: UnitStatus) {
        let enabled = match self.store.snapshot().await {
            Ok(state) => state.enabled,
            Err(_) => return,
        };

        let action = self.presence.observe(&status, enabled);
        if let Some(installed) = action.installed {
            info!("firewalld installed: {}", installed);
            self.store.set_installed(installed);
        }
        if action.reconnect {
            self.reconnect().await;
        }
    }

    /// Replace the gateway with a fresh one. The old connection may have
    /// missed an on-demand activation.
    async fn reconnect(&mut self) {
        info!("firewalld unit is running, reconnecting");
        match (self.connect)().await {
            Ok((gateway, events)) => {
                *self.firewall.write().await = Some(Firewall::new(Arc::new(gateway), self.store.clone()));
                self.events = Some(events);
            }
            Err(e) => warn!("Failed to reconnect to firewalld: {}", e),
        }
    }
}

/// Next event, or never when there is no stream.
async fn next_event(events: &mut Option<EventStream>) -> Option<DaemonEvent> {
    match events {
        Some(stream) => stream.next().await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::stream;

    use super::*;
    use crate::firewall::fake::FakeGateway;
    use crate::systemd::UnitState;

    fn running() -> UnitStatus {
        UnitStatus { exists: true, state: UnitState::Running }
    }

    /// A connector whose gateway reports an owner and then stays quiet.
    fn fake_connector(calls: Arc<AtomicUsize>) -> Connector<FakeGateway> {
        Arc::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let gateway = FakeGateway::new("public").with_zone("public", &["ssh"], &["eth0"]);
            let events = stream::once(future::ready(DaemonEvent::Owner(Some(":1.9".into()))))
                .chain(stream::pending())
                .boxed();
            future::ready(Ok::<_, FirewallError>((gateway, events))).boxed()
        })
    }

    fn supervisor(
        store: &Store,
        events: Option<EventStream>,
        connect: Connector<FakeGateway>,
    ) -> (Supervisor<FakeGateway>, SharedFirewall<FakeGateway>, mpsc::Sender<UnitStatus>) {
        let (status_tx, statuses) = mpsc::channel(8);
        let firewall: SharedFirewall<FakeGateway> = Arc::new(RwLock::new(None));
        let supervisor = Supervisor {
            store: store.clone(),
            firewall: Arc::clone(&firewall),
            events,
            statuses,
            presence: Presence::new(),
            connect,
        };
        (supervisor, firewall, status_tx)
    }

    async fn next_change(changed: &mut broadcast::Receiver<Arc<FirewallState>>) -> Arc<FirewallState> {
        tokio::time::timeout(Duration::from_secs(2), changed.recv())
            .await
            .expect("no change emitted")
            .unwrap()
    }

    #[tokio::test]
    async fn test_running_unit_without_owner_reconnects_and_loads() {
        let (store, _worker) = Store::spawn();
        let mut changed = store.subscribe();
        let calls = Arc::new(AtomicUsize::new(0));
        let (supervisor, firewall, status_tx) = supervisor(&store, None, fake_connector(Arc::clone(&calls)));
        tokio::spawn(supervisor.run());

        status_tx.send(running()).await.unwrap();
        let state = next_change(&mut changed).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(firewall.read().await.is_some());
        assert!(state.enabled);
        assert_eq!(state.zones["public"].services, vec!["ssh"]);
        assert!(state.enabled_services.contains("ssh"));
    }

    #[tokio::test]
    async fn test_running_unit_with_owner_keeps_gateway() {
        let (store, _worker) = Store::spawn();
        store.reset(true);
        let mut changed = store.subscribe();
        let calls = Arc::new(AtomicUsize::new(0));
        let (supervisor, _firewall, status_tx) = supervisor(&store, None, fake_connector(Arc::clone(&calls)));
        tokio::spawn(supervisor.run());

        status_tx.send(running()).await.unwrap();
        // Statuses are handled in order; this one announces itself.
        status_tx
            .send(UnitStatus { exists: false, state: UnitState::Unknown })
            .await
            .unwrap();
        next_change(&mut changed).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_unit_clears_installed() {
        let (store, _worker) = Store::spawn();
        store.reset(true);
        let mut changed = store.subscribe();
        let calls = Arc::new(AtomicUsize::new(0));
        let (supervisor, _firewall, status_tx) = supervisor(&store, None, fake_connector(calls));
        tokio::spawn(supervisor.run());

        status_tx
            .send(UnitStatus { exists: false, state: UnitState::Unknown })
            .await
            .unwrap();
        let state = next_change(&mut changed).await;

        assert!(!state.installed);
    }

    #[tokio::test]
    async fn test_lost_connection_resets_once() {
        let (store, _worker) = Store::spawn();
        let (event_tx, event_rx) = futures::channel::mpsc::unbounded::<DaemonEvent>();
        let calls = Arc::new(AtomicUsize::new(0));
        let (supervisor, firewall, _status_tx) =
            supervisor(&store, Some(event_rx.boxed()), fake_connector(Arc::clone(&calls)));

        let gateway = Arc::new(FakeGateway::new("public").with_zone("public", &["ssh"], &[]));
        let connected = Firewall::new(gateway, store.clone());
        if let Some(load) = connected.handle(DaemonEvent::Owner(Some(":1.4".into()))) {
            load.await.unwrap();
        }
        *firewall.write().await = Some(connected);

        let mut changed = store.subscribe();
        tokio::spawn(supervisor.run());
        drop(event_tx);

        let state = next_change(&mut changed).await;
        store.snapshot().await.unwrap();

        assert!(!state.enabled);
        assert!(state.zones.is_empty());
        assert!(state.enabled_services.is_empty());
        assert!(changed.try_recv().is_err());
        assert!(firewall.read().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

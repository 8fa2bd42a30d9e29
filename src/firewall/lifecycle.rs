// Firewalld Sync - Daemon Lifecycle
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Unit enable/disable and the daemon-presence watcher.
//!
//! D-Bus ownership only says whether firewalld is connected right now. A
//! unit that is installed but activated on demand has no owner until first
//! use, so the unit status is polled separately.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::systemd::{UnitControl, UnitStatus};

/// Enable the unit and start it. Both requests run concurrently and fail
/// independently.
pub async fn enable_unit(unit: &dyn UnitControl) {
    let (enabled, started) = tokio::join!(unit.enable(), unit.start());
    if let Err(e) = enabled {
        warn!("Failed to enable firewalld: {}", e);
    }
    if let Err(e) = started {
        warn!("Failed to start firewalld: {}", e);
    }
}

/// Stop the unit and disable it. Both requests run concurrently and fail
/// independently.
pub async fn disable_unit(unit: &dyn UnitControl) {
    let (stopped, disabled) = tokio::join!(unit.stop(), unit.disable());
    if let Err(e) = stopped {
        warn!("Failed to stop firewalld: {}", e);
    }
    if let Err(e) = disabled {
        warn!("Failed to disable firewalld: {}", e);
    }
}

/// What the caller should do after a unit status change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceAction {
    /// New value of the installed flag, when it changed.
    pub installed: Option<bool>,
    /// Build a fresh gateway: the unit runs but nothing owns the bus name.
    pub reconnect: bool,
}

/// Last seen unit existence.
#[derive(Debug, Default)]
pub struct Presence {
    installed: Option<bool>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one unit status into the presence, given whether a connection
    /// is currently owned.
    pub fn observe(&mut self, status: &UnitStatus, enabled: bool) -> PresenceAction {
        let installed = if self.installed == Some(status.exists) {
            None
        } else {
            self.installed = Some(status.exists);
            Some(status.exists)
        };

        PresenceAction {
            installed,
            reconnect: status.is_running() && !enabled,
        }
    }
}

/// Poll the unit status every `interval` and forward each change.
///
/// The first successful poll is always forwarded. The task stops once the
/// receiver is dropped.
pub fn watch_unit(unit: Arc<dyn UnitControl>, interval: Duration) -> mpsc::Receiver<UnitStatus> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        // A zero period is rejected by tokio.
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        let mut last: Option<UnitStatus> = None;
        let mut failing = false;

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }

            match unit.status().await {
                Ok(status) => {
                    failing = false;
                    if last == Some(status) {
                        continue;
                    }
                    debug!("Unit status changed: {:?}", status);
                    last = Some(status);
                    if tx.send(status).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    if !failing {
                        warn!("Failed to query unit status: {}", e);
                        failing = true;
                    }
                }
            }
        }
        debug!("Unit watcher finished");
    });

    rx
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::firewall::{FirewallError, Result};
    use crate::systemd::UnitState;

    struct FakeUnit {
        status: Mutex<UnitStatus>,
        calls: Mutex<Vec<&'static str>>,
        failures: HashSet<&'static str>,
    }

    impl FakeUnit {
        fn new(exists: bool, state: UnitState) -> Self {
            Self {
                status: Mutex::new(UnitStatus { exists, state }),
                calls: Mutex::new(Vec::new()),
                failures: HashSet::new(),
            }
        }

        fn failing(mut self, action: &'static str) -> Self {
            self.failures.insert(action);
            self
        }

        fn set(&self, exists: bool, state: UnitState) {
            *self.status.lock().unwrap() = UnitStatus { exists, state };
        }

        fn calls(&self) -> Vec<&'static str> {
            let mut calls = self.calls.lock().unwrap().clone();
            calls.sort();
            calls
        }

        fn record(&self, action: &'static str) -> Result<()> {
            self.calls.lock().unwrap().push(action);
            if self.failures.contains(action) {
                return Err(FirewallError::Command {
                    program: format!("systemctl {}", action),
                    message: "authentication cancelled".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UnitControl for FakeUnit {
        async fn status(&self) -> Result<UnitStatus> {
            Ok(*self.status.lock().unwrap())
        }

        async fn enable(&self) -> Result<()> {
            self.record("enable")
        }

        async fn start(&self) -> Result<()> {
            self.record("start")
        }

        async fn stop(&self) -> Result<()> {
            self.record("stop")
        }

        async fn disable(&self) -> Result<()> {
            self.record("disable")
        }
    }

    fn status(exists: bool, state: UnitState) -> UnitStatus {
        UnitStatus { exists, state }
    }

    #[tokio::test]
    async fn test_enable_runs_both_halves() {
        let unit = FakeUnit::new(true, UnitState::Stopped).failing("enable");
        enable_unit(&unit).await;
        assert_eq!(unit.calls(), vec!["enable", "start"]);
    }

    #[tokio::test]
    async fn test_disable_runs_both_halves() {
        let unit = FakeUnit::new(true, UnitState::Running).failing("stop");
        disable_unit(&unit).await;
        assert_eq!(unit.calls(), vec!["disable", "stop"]);
    }

    #[test]
    fn test_first_observation_reports_installed() {
        let mut presence = Presence::new();
        let action = presence.observe(&status(false, UnitState::Unknown), false);
        assert_eq!(action, PresenceAction { installed: Some(false), reconnect: false });

        let action = presence.observe(&status(false, UnitState::Unknown), false);
        assert_eq!(action, PresenceAction::default());
    }

    #[test]
    fn test_running_without_owner_reconnects() {
        let mut presence = Presence::new();
        presence.observe(&status(true, UnitState::Stopped), false);

        let action = presence.observe(&status(true, UnitState::Running), false);
        assert_eq!(action, PresenceAction { installed: None, reconnect: true });
    }

    #[test]
    fn test_running_with_owner_keeps_gateway() {
        let mut presence = Presence::new();
        presence.observe(&status(true, UnitState::Stopped), true);

        let action = presence.observe(&status(true, UnitState::Running), true);
        assert!(!action.reconnect);
    }

    #[tokio::test]
    async fn test_watch_forwards_only_changes() {
        let unit = Arc::new(FakeUnit::new(true, UnitState::Stopped));
        let mut rx = watch_unit(unit.clone(), Duration::from_millis(5));

        assert_eq!(rx.recv().await, Some(status(true, UnitState::Stopped)));
        let quiet = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(quiet.is_err());

        unit.set(true, UnitState::Running);
        assert_eq!(rx.recv().await, Some(status(true, UnitState::Running)));
    }
}

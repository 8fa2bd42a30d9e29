// Firewalld Sync - Configuration
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Client settings stored in a local JSON file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Systemd unit running firewalld.
    #[serde(default = "default_unit_name")]
    pub unit_name: String,
    /// How often the unit status is polled, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub unit_poll_interval_ms: u64,
    /// Polkit action checked to decide whether changes are allowed.
    #[serde(default = "default_polkit_action")]
    pub polkit_action: String,
    /// Queue depth of each D-Bus signal subscription.
    #[serde(default = "default_signal_queue")]
    pub signal_queue: usize,
}

fn default_unit_name() -> String { "firewalld.service".to_string() }
fn default_poll_interval() -> u64 { 1000 }
fn default_polkit_action() -> String { "org.fedoraproject.FirewallD1.all".to_string() }
fn default_signal_queue() -> usize { 64 }

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            unit_name: default_unit_name(),
            unit_poll_interval_ms: default_poll_interval(),
            polkit_action: default_polkit_action(),
            signal_queue: default_signal_queue(),
        }
    }
}

impl SyncSettings {
    /// Replace values that cannot be used with their defaults.
    fn validated(mut self) -> Self {
        if self.unit_poll_interval_ms == 0 {
            warn!("unit_poll_interval_ms must be positive, using {}", default_poll_interval());
            self.unit_poll_interval_ms = default_poll_interval();
        }
        if self.signal_queue == 0 {
            warn!("signal_queue must be positive, using {}", default_signal_queue());
            self.signal_queue = default_signal_queue();
        }
        self
    }
}

/// Settings manager that persists to a JSON file.
#[derive(Debug, Clone)]
pub struct Settings {
    settings: SyncSettings,
    path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Load settings from the user's configuration directory.
    pub fn new() -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("firewalld-sync")
            .join("settings.json");
        Self::load_from(path)
    }

    /// Load settings from `path`. A missing or unreadable file yields defaults.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = if path.exists() {
            read_settings(&path).validated()
        } else {
            SyncSettings::default()
        };

        Self { settings, path }
    }

    /// Save settings to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn values(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn unit_name(&self) -> &str {
        &self.settings.unit_name
    }

    pub fn unit_poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings.unit_poll_interval_ms)
    }

    pub fn polkit_action(&self) -> &str {
        &self.settings.polkit_action
    }

    pub fn signal_queue(&self) -> usize {
        self.settings.signal_queue
    }
}

fn read_settings(path: &Path) -> SyncSettings {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to parse settings: {}", e);
                SyncSettings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read settings: {}", e);
            SyncSettings::default()
        }
    }
}

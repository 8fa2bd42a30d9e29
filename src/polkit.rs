// Firewalld Sync - Privilege Check
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Polkit authorization check for firewalld's admin action.

use tokio::process::Command;
use tracing::{debug, info};

use crate::firewall::{FirewallError, Result};

/// Ask polkit whether this process may perform `action`, allowing an
/// authentication prompt. `Ok(false)` means denied or dismissed.
pub async fn check_authorized(action: &str) -> Result<bool> {
    let pid = std::process::id().to_string();
    let output = Command::new("pkcheck")
        .args(["--action-id", action, "--process", &pid, "--allow-user-interaction"])
        .output()
        .await
        .map_err(|e| FirewallError::Command {
            program: "pkcheck".to_string(),
            message: e.to_string(),
        })?;

    if output.status.success() {
        info!("Authorized for {}", action);
        Ok(true)
    } else {
        debug!(
            "pkcheck denied {} ({}): {}",
            action,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(false)
    }
}

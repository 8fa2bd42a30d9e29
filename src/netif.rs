// Firewalld Sync - Network Interfaces
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Names of the host's network interfaces, as reported by `ip -json link`.

use serde::Deserialize;
use tokio::process::Command;

use crate::firewall::{FirewallError, Result};

#[derive(Debug, Deserialize)]
struct Link {
    ifname: String,
}

/// List every network interface on the host.
pub async fn interface_names() -> Result<Vec<String>> {
    let output = Command::new("ip")
        .args(["-json", "link"])
        .output()
        .await
        .map_err(|e| command_error(e.to_string()))?;

    if !output.status.success() {
        return Err(command_error(String::from_utf8_lossy(&output.stderr).trim().to_string()));
    }

    parse_links(&output.stdout)
}

fn parse_links(json: &[u8]) -> Result<Vec<String>> {
    let links: Vec<Link> = serde_json::from_slice(json).map_err(|e| command_error(e.to_string()))?;
    Ok(links.into_iter().map(|link| link.ifname).collect())
}

fn command_error(message: String) -> FirewallError {
    FirewallError::Command {
        program: "ip -json link".to_string(),
        message,
    }
}

// Firewalld Sync - Errors
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Error type for daemon calls.
//!
//! Refresh and mutation paths never hand these to their callers; they are
//! logged where they occur and the failing branch stops.

use thiserror::Error;

/// Errors raised while talking to firewalld, systemd or helper commands.
#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("Not connected to firewalld")]
    NotConnected,

    #[error("D-Bus transport error: {0}")]
    Transport(#[from] zbus::Error),

    #[error("{method} rejected by daemon: {message}")]
    Rejected { method: String, message: String },

    #[error("Unexpected reply from daemon: {0}")]
    Decode(#[from] zbus::zvariant::Error),

    #[error("State worker has stopped")]
    StoreClosed,

    #[error("Failed to run {program}: {message}")]
    Command { program: String, message: String },
}

impl FirewallError {
    /// Whether firewalld reported the change as already in effect.
    pub fn is_already_enabled(&self) -> bool {
        match self {
            FirewallError::Transport(e) => e.to_string().contains("ALREADY_ENABLED"),
            FirewallError::Rejected { message, .. } => message.contains("ALREADY_ENABLED"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FirewallError>;

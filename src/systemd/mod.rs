// Firewalld Sync - Systemd Module
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Systemd access for the firewalld unit: presence, run state and lifecycle.

mod client;

pub use client::{SystemdClient, UnitControl, UnitState, UnitStatus};

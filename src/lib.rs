// Firewalld Sync - Library Root
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Firewalld Sync - a firewalld client that keeps a live, cached view of
//! zones and services in sync with the daemon over D-Bus.

pub mod config;
pub mod firewall;
pub mod models;
pub mod netif;
pub mod polkit;
pub mod systemd;

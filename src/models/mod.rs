// Firewalld Sync - Models
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Data models for firewalld entities.

mod port;
mod service;
mod zone;

pub use port::Port;
pub use service::Service;
pub use zone::Zone;

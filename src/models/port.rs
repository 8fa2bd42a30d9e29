// Firewalld Sync - Port Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Port/protocol pair of a service definition.

use std::fmt;

use serde::Serialize;

/// A port (or port range) and its protocol, e.g. `22/tcp` or `6000-6010/udp`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Port {
    pub port: String,
    pub protocol: String,
}

impl Port {
    pub fn new(port: &str, protocol: &str) -> Self {
        Self {
            port: port.to_string(),
            protocol: protocol.to_string(),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

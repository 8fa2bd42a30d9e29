// Firewalld Sync - Signal Subscriber
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Delivery of firewalld's ownership changes and zone notifications.
//!
//! No filtering or coalescing happens here; every notification is handed
//! on as one [`DaemonEvent`].

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, warn};
use zbus::message::Type as MessageType;
use zbus::{Connection, MatchRule, Message, MessageStream};

use super::error::Result;
use super::{interfaces, paths, BUS_NAME};

const DBUS_NAME: &str = "org.freedesktop.DBus";
const DBUS_PATH: &str = "/org/freedesktop/DBus";

/// Zone notifications this client reacts to.
pub const ZONE_SIGNALS: [&str; 4] = [
    "ServiceAdded",
    "ServiceRemoved",
    "InterfaceAdded",
    "InterfaceRemoved",
];

/// A zone notification emitted by firewalld.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirewallSignal {
    ServiceAdded { zone: String, service: String },
    ServiceRemoved { zone: String, service: String },
    InterfaceAdded { zone: String, interface: String },
    InterfaceRemoved { zone: String, interface: String },
}

impl FirewallSignal {
    /// Build a signal from its member name and its (zone, subject) arguments.
    pub fn from_parts(member: &str, zone: String, subject: String) -> Option<Self> {
        match member {
            "ServiceAdded" => Some(Self::ServiceAdded { zone, service: subject }),
            "ServiceRemoved" => Some(Self::ServiceRemoved { zone, service: subject }),
            "InterfaceAdded" => Some(Self::InterfaceAdded { zone, interface: subject }),
            "InterfaceRemoved" => Some(Self::InterfaceRemoved { zone, interface: subject }),
            _ => None,
        }
    }
}

/// Everything the refresh logic reacts to, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonEvent {
    /// The firewalld bus name gained (`Some`) or lost (`None`) its owner.
    Owner(Option<String>),
    Signal(FirewallSignal),
}

/// Subscribe to ownership changes and zone notifications.
///
/// The stream starts with the current owner, so a freshly created gateway
/// always triggers an initial load or reset.
pub async fn subscribe(connection: &Connection, queue: usize) -> Result<BoxStream<'static, DaemonEvent>> {
    let owner_rule = MatchRule::builder()
        .msg_type(MessageType::Signal)
        .sender(DBUS_NAME)?
        .path(DBUS_PATH)?
        .interface(DBUS_NAME)?
        .member("NameOwnerChanged")?
        .arg(0, BUS_NAME)?
        .build();

    let owner_changes = MessageStream::for_match_rule(owner_rule, connection, Some(queue))
        .await?
        .filter_map(|msg| future::ready(owner_from_message(msg)));

    let mut streams = vec![owner_changes.boxed()];

    for member in ZONE_SIGNALS {
        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .sender(BUS_NAME)?
            .path(paths::ROOT)?
            .interface(interfaces::ZONE)?
            .member(member)?
            .build();

        let signals = MessageStream::for_match_rule(rule, connection, Some(queue))
            .await?
            .filter_map(|msg| future::ready(signal_from_message(msg).map(DaemonEvent::Signal)));
        streams.push(signals.boxed());
    }

    // Match rules are in place before the owner is queried, so no
    // transition can fall between the two.
    let initial = current_owner(connection).await;

    Ok(stream::once(future::ready(DaemonEvent::Owner(initial)))
        .chain(stream::select_all(streams))
        .boxed())
}

async fn current_owner(connection: &Connection) -> Option<String> {
    let reply = connection
        .call_method(Some(DBUS_NAME), DBUS_PATH, Some(DBUS_NAME), "GetNameOwner", &(BUS_NAME,))
        .await;

    match reply {
        Ok(msg) => msg.body().deserialize::<String>().ok(),
        Err(e) => {
            debug!("firewalld has no owner: {}", e);
            None
        }
    }
}

fn owner_from_message(msg: zbus::Result<Message>) -> Option<DaemonEvent> {
    let msg = msg
        .map_err(|e| warn!("Failed to receive NameOwnerChanged: {}", e))
        .ok()?;

    let (_name, _old_owner, new_owner): (String, String, String) = msg
        .body()
        .deserialize()
        .map_err(|e| warn!("Malformed NameOwnerChanged: {}", e))
        .ok()?;

    Some(DaemonEvent::Owner(non_empty(new_owner)))
}

fn signal_from_message(msg: zbus::Result<Message>) -> Option<FirewallSignal> {
    let msg = msg
        .map_err(|e| warn!("Failed to receive firewalld signal: {}", e))
        .ok()?;

    let header = msg.header();
    let member = header.member()?.to_string();
    let body = msg.body();

    // ServiceAdded carries an extra timeout argument.
    let args = if member == "ServiceAdded" {
        body.deserialize::<(String, String, i32)>()
            .map(|(zone, service, _timeout)| (zone, service))
    } else {
        body.deserialize::<(String, String)>()
    };

    match args {
        Ok((zone, subject)) => FirewallSignal::from_parts(&member, zone, subject),
        Err(e) => {
            warn!("Malformed {} signal: {}", member, e);
            None
        }
    }
}

fn non_empty(owner: String) -> Option<String> {
    if owner.is_empty() {
        None
    } else {
        Some(owner)
    }
}

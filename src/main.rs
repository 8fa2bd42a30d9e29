// Firewalld Sync - Main Entry Point
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Firewalld Sync - command line front end for the firewalld client.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use firewalld_sync::config::Settings;
use firewalld_sync::firewall::{FirewallClient, FirewallState};
use firewalld_sync::netif;

#[derive(Parser, Debug)]
#[command(name = "firewalld-sync", version, about = "Inspect and edit firewalld zones and services")]
struct Cli {
    /// Settings file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the state as JSON on every change (default).
    Watch,
    /// List zones with their services and interfaces.
    Zones,
    /// List predefined services; `+` marks those that can still be added.
    Services,
    /// Enable and start firewalld.
    Enable,
    /// Stop and disable firewalld.
    Disable,
    /// Add services to zones, live and permanently.
    AddService {
        #[arg(required = true)]
        services: Vec<String>,
        /// Target zone; repeat for several. Defaults to the default zone.
        #[arg(long = "zone")]
        zones: Vec<String>,
    },
    /// Remove a service from every zone that has it.
    RemoveService { service: String },
    /// List the host's network interfaces.
    Interfaces,
    /// Replace the interfaces attached to a zone.
    SetInterfaces { zone: String, interfaces: Vec<String> },
    /// Show the effective settings.
    Config {
        /// Write them to the settings file.
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = match cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::new(),
    };

    match cli.command.unwrap_or(Command::Watch) {
        Command::Config { save } => {
            println!("{}", serde_json::to_string_pretty(settings.values())?);
            if save {
                settings.save()?;
                println!("Saved to {}", settings.path().display());
            }
        }
        Command::Interfaces => {
            for name in netif::interface_names().await? {
                println!("{}", name);
            }
        }
        command => {
            let client = FirewallClient::start(&settings)
                .await
                .context("Failed to start firewalld client")?;
            run(&client, command).await?;
        }
    }

    Ok(())
}

async fn run(client: &FirewallClient, command: Command) -> Result<()> {
    if matches!(command, Command::Watch) {
        return watch(client).await;
    }

    if !matches!(command, Command::Enable | Command::Disable) {
        client.refresh().await?;
    }

    match command {
        Command::Zones => {
            let state = client.state().await?;
            for zone in state.zones.values() {
                println!("{}", zone.name);
                println!("  services:   {}", zone.services.join(" "));
                println!("  interfaces: {}", zone.interfaces.join(" "));
            }
            println!();
            println!("Enabled services:");
            for service in state.enabled_service_descriptors() {
                println!("  {:<24} {}", service.display_name(), service.ports_summary());
            }
        }
        Command::Services => {
            let available = client.available_services().await?;
            let addable = client.addable_services().await?;
            for service in &available {
                let marker = if addable.iter().any(|s| s.id == service.id) { "+" } else { " " };
                println!(
                    "{} {:<24} {:<32} {}",
                    marker,
                    service.id,
                    service.display_name(),
                    service.ports_summary()
                );
            }
        }
        Command::Enable => client.enable().await,
        Command::Disable => client.disable().await,
        Command::AddService { services, zones } => client.add_services(&services, &zones).await?,
        Command::RemoveService { service } => client.remove_service(&service).await?,
        Command::SetInterfaces { zone, interfaces } => {
            if !client.available_zones().await?.contains(&zone) {
                anyhow::bail!("Unknown zone: {}", zone);
            }
            client.set_zone_interfaces(&zone, &interfaces).await?
        }
        Command::Watch | Command::Interfaces | Command::Config { .. } => {}
    }

    Ok(())
}

async fn watch(client: &FirewallClient) -> Result<()> {
    let mut changed = client.subscribe();
    print_state(&client.state().await?)?;

    loop {
        match changed.recv().await {
            Ok(state) => print_state(&state)?,
            Err(RecvError::Lagged(skipped)) => tracing::debug!("Skipped {} updates", skipped),
            Err(RecvError::Closed) => break,
        }
    }
    Ok(())
}

fn print_state(state: &FirewallState) -> Result<()> {
    println!("{}", serde_json::to_string(state)?);
    Ok(())
}

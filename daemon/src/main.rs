// This file is part of mindyd, an application to bring up and service the Mindy RTL design over PCIe.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// mindyd is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// mindyd is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

//! mindy daemon (mindyd) - System service controlling the Mindy PCIe FPGA card.
//!
//! The daemon brings the card up, keeps its interrupt engine running and exposes the RTL
//! blocks over DBus.
//!
//! # DBus Service
//!
//! - **Service Name**: `io.mindyd`
//! - **Status Interface**: `/io/mindyd/status` - Read-only operations
//! - **Control Interface**: `/io/mindyd/control` - Write operations
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (`trace`, `debug`, `info`, `warn`, `error`
//!   or `off`). Defaults to `info`
//! - `MINDYD_PCI_DEVICE` - `vendor:device` of the card. Defaults to `10ee:903f`
//! - `MINDYD_AXI_MAP` - `module=offset` list replacing the stock AXI map
//!
//! # Lifetime
//!
//! A failed bring-up at start is logged and the service still comes up, so the card can
//! be brought up later through the control interface. A teardown of the card (hot-reset,
//! removal) triggers one fresh bring-up. An interrupt engine failure ends the process with
//! an error, since interrupts may have been lost.

use log::{error, info, warn};
use mindyd::comm::dbus::{control_interface::ControlInterface, status_interface::StatusInterface};
use mindyd::config::{DaemonConfig, SysfsLayout};
use mindyd::supervisor::Supervisor;
use std::error::Error;
use std::sync::Arc;
use zbus::connection;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = DaemonConfig::from_env()?;
    info!("Controlling PCI device {}", config.pci_device);
    let (supervisor, mut events) = Supervisor::new(config, SysfsLayout::default());
    let supervisor = Arc::new(supervisor);

    let initial = supervisor.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || initial.bring_up()).await? {
        warn!("Initial bring-up failed, waiting for a bring_up call: {e}");
    }

    let status_interface = StatusInterface::new(supervisor.clone());
    let control_interface = ControlInterface::new(supervisor.clone());

    let _conn = connection::Builder::system()?
        .name("io.mindyd")?
        .serve_at("/io/mindyd/status", status_interface)?
        .serve_at("/io/mindyd/control", control_interface)?
        .build()
        .await?;

    info!("Started io.mindyd dbus service");

    while let Some(event) = events.recv().await {
        let handler = supervisor.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || handler.handle_event(event)).await? {
            error!("Interrupt engine failed, shutting down: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

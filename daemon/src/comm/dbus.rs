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

pub mod control_interface;
pub mod status_interface;

use crate::bring_up::Device;
use crate::error::MindyError;
use crate::rtl::RtlModule;
use crate::supervisor::Supervisor;
use std::sync::Arc;

/// Parse a module name received over DBus.
pub fn parse_module(name: &str) -> Result<RtlModule, MindyError> {
    name.parse::<RtlModule>().map_err(|_| {
        MindyError::Argument(format!(
            "'{name}' is not an RTL module, expected one of: {}",
            RtlModule::ALL.map(|m| m.as_str()).join(", ")
        ))
    })
}

/// Run `f` on the device on Tokio's blocking pool.
///
/// Register access is memory-mapped I/O on a PCIe device and may stall; it never runs on
/// the executor threads serving DBus.
pub async fn on_device<T, F>(supervisor: &Arc<Supervisor>, f: F) -> Result<T, MindyError>
where
    T: Send + 'static,
    F: FnOnce(&Device) -> Result<T, MindyError> + Send + 'static,
{
    let supervisor = supervisor.clone();
    tokio::task::spawn_blocking(move || supervisor.with_device(f))
        .await
        .map_err(|e| MindyError::Internal(format!("Register access task failed: {e}")))?
}

/// Run a blocking supervisor operation on Tokio's blocking pool.
pub async fn on_supervisor<T, F>(supervisor: &Arc<Supervisor>, f: F) -> Result<T, MindyError>
where
    T: Send + 'static,
    F: FnOnce(&Supervisor) -> Result<T, MindyError> + Send + 'static,
{
    let supervisor = supervisor.clone();
    tokio::task::spawn_blocking(move || f(&supervisor))
        .await
        .map_err(|e| MindyError::Internal(format!("Supervisor task failed: {e}")))?
}

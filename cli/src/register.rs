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

//! Raw register access and frame counter commands for the mindy CLI.
//!
//! Registers are addressed as an RTL module name plus a byte offset into that module,
//! e.g. `data_fetch 0x34`. 64-bit access covers the word at `offset` (high) and the one at
//! `offset + 4` (low).

use crate::set::connect_control;
use crate::status::connect_status;
use clap::Subcommand;

pub async fn read_handler(module: &str, offset: u32, wide: bool) -> Result<String, zbus::Error> {
    let proxy = connect_status().await?;
    let value = if wide {
        format!("0x{:016X}", proxy.read_register64(module, offset).await?)
    } else {
        format!("0x{:08X}", proxy.read_register32(module, offset).await?)
    };
    Ok(value)
}

pub async fn write_handler(
    module: &str,
    offset: u32,
    value: u64,
    wide: bool,
) -> Result<String, zbus::Error> {
    let proxy = connect_control().await?;
    if wide {
        proxy.write_register64(module, offset, value).await
    } else {
        let value = u32::try_from(value).map_err(|_| {
            zbus::Error::Failure(format!(
                "0x{value:X} does not fit in a 32-bit register, use --wide"
            ))
        })?;
        proxy.write_register32(module, offset, value).await
    }
}

#[derive(Subcommand, Debug)]
pub enum FrameCounterCommand {
    /// Print the counter of `phase`
    Get { phase: u32 },
    /// Add one to the counter of `phase` and print the new value
    Increment { phase: u32 },
    /// Zero the counters
    Clear,
    /// Print the bus address of the counter of `phase`
    Address { phase: u32 },
}

pub async fn frame_counter_handler(command: &FrameCounterCommand) -> Result<String, zbus::Error> {
    match *command {
        FrameCounterCommand::Get { phase } => {
            Ok(connect_status().await?.get_frame_counter(phase).await?.to_string())
        }
        FrameCounterCommand::Increment { phase } => Ok(connect_control()
            .await?
            .increment_frame_counter(phase)
            .await?
            .to_string()),
        FrameCounterCommand::Clear => connect_control().await?.clear_frame_counters().await,
        FrameCounterCommand::Address { phase } => Ok(format!(
            "0x{:X}",
            connect_status()
                .await?
                .get_frame_counter_pci_address(phase)
                .await?
        )),
    }
}


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

//! Status command implementation for the mindy CLI.
//!
//! Gathers the device state, RTL revision, link status and interrupt counters from the
//! daemon's status interface and prints them as one report. A device that is not up
//! still gets its state line; the hardware sections are left out.

use crate::proxies::status_proxy;
use zbus::Connection;

pub async fn connect_status() -> Result<status_proxy::StatusProxy<'static>, zbus::Error> {
    let connection = Connection::system().await?;
    status_proxy::StatusProxy::new(&connection).await
}

/// Render a channel bitmap as `up`/`down` per channel, lowest channel first.
pub fn channel_table(status: u32, channels: u32) -> String {
    (0..channels)
        .map(|channel| {
            let state = if status & (1 << channel) != 0 {
                "up"
            } else {
                "down"
            };
            format!("| qsfp{channel} | {state} |\n")
        })
        .collect()
}

/// Only the sources that have fired, as `| source | count |` rows.
pub fn interrupt_table(counts: &[u64]) -> String {
    counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count != 0)
        .map(|(source, count)| format!("| {source} | {count} |\n"))
        .collect()
}

async fn get_hardware_report(proxy: &status_proxy::StatusProxy<'_>) -> Result<String, zbus::Error> {
    let build = proxy.get_rtl_build().await?;
    let date = proxy.get_rtl_date().await?;
    let channels = proxy.get_channel_status().await?;
    let errors = proxy.get_error_status().await?;
    let counts = proxy.get_interrupt_counts().await?;
    Ok(format!(
        "\n---- RTL ----\n\
        build: {build}\n\
        date: {date}\n\
        error status: 0x{errors:08X}\n\
        \n---- CHANNELS ----\n\
        {}\
        \n---- INTERRUPTS ----\n\
        | source | count |\n\
        {}",
        channel_table(channels, 4),
        interrupt_table(&counts)
    ))
}

/// Main handler for the status command.
///
/// # Returns: `Result<String, zbus::Error>`
/// * `Ok(String)` - The report
/// * `Err(zbus::Error)` - The daemon could not be reached
pub async fn status_handler() -> Result<String, zbus::Error> {
    let proxy = connect_status().await?;
    let mut ret_string = format!("---- DEVICE ----\n{}\n", proxy.get_device_state().await?);
    match get_hardware_report(&proxy).await {
        Ok(report) => ret_string += &report,
        Err(zbus::Error::MethodError(_, Some(message), _)) => {
            ret_string += &format!("\n(no hardware status: {message})\n")
        }
        Err(e) => return Err(e),
    }
    Ok(ret_string)
}

pub async fn interrupts_handler(source: Option<u32>) -> Result<String, zbus::Error> {
    let proxy = connect_status().await?;
    match source {
        Some(source) => Ok(proxy.get_interrupt_count(source).await?.to_string()),
        None => Ok(format!(
            "| source | count |\n{}",
            interrupt_table(&proxy.get_interrupt_counts().await?)
        )),
    }
}

pub async fn buffers_handler() -> Result<String, zbus::Error> {
    connect_status().await?.get_buffer_configuration().await
}

pub async fn channel_handler(channel: u32) -> Result<String, zbus::Error> {
    connect_status().await?.check_channel(channel).await
}

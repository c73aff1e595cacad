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

//! Set command implementation for the mindy CLI.
//!
//! Writes one host or remote buffer setting through the daemon's control interface. The
//! daemon reports success with a message, which is printed as is.

use crate::proxies::control_proxy;
use clap::Subcommand;
use zbus::Connection;

pub async fn connect_control() -> Result<control_proxy::ControlProxy<'static>, zbus::Error> {
    let connection = Connection::system().await?;
    control_proxy::ControlProxy::new(&connection).await
}

/// Parse a number given in decimal or with a `0x` prefix in hexadecimal.
pub fn parse_number(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let result = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    result.map_err(|e| format!("'{s}' is not a number: {e}"))
}

pub fn parse_u32(s: &str) -> Result<u32, String> {
    let value = parse_number(s)?;
    u32::try_from(value).map_err(|_| format!("0x{value:X} does not fit in 32 bits"))
}

#[derive(Subcommand, Debug)]
pub enum Setting {
    /// Host buffer a frame of `phase`/`semiphase` is written to
    HostFrameAddr {
        phase: u32,
        semiphase: u32,
        #[arg(value_parser = parse_number)]
        address: u64,
    },
    /// Host buffer the metadata of `phase` is written to
    HostMetaAddr {
        phase: u32,
        #[arg(value_parser = parse_number)]
        address: u64,
    },
    HostFrameSize {
        #[arg(value_parser = parse_number)]
        size: u64,
    },
    HostMetaSize {
        #[arg(value_parser = parse_number)]
        size: u64,
    },
    HostAbmAddr {
        #[arg(value_parser = parse_number)]
        address: u64,
    },
    RemoteFrameAddr {
        #[arg(value_parser = parse_number)]
        address: u64,
    },
    RemoteFrameSize {
        #[arg(value_parser = parse_number)]
        size: u64,
    },
    RemoteMetaAddr {
        #[arg(value_parser = parse_number)]
        address: u64,
    },
    RemoteMetaSize {
        #[arg(value_parser = parse_number)]
        size: u64,
    },
    /// Bus address of the peer's frame counter
    RemoteFrameCounterAddr {
        #[arg(value_parser = parse_number)]
        address: u64,
    },
    FrameSize {
        #[arg(value_parser = parse_u32)]
        size: u32,
    },
    PacketSize {
        #[arg(value_parser = parse_u32)]
        size: u32,
    },
    PacketsPerGroup {
        #[arg(value_parser = parse_u32)]
        count: u32,
    },
}

/// Main handler for the set command.
///
/// # Returns: `Result<String, zbus::Error>`
/// * `Ok(String)` - Success message from the daemon
/// * `Err(zbus::Error)` - DBus communication error or a MindyError from the daemon
pub async fn set_handler(setting: &Setting) -> Result<String, zbus::Error> {
    let proxy = connect_control().await?;
    match *setting {
        Setting::HostFrameAddr {
            phase,
            semiphase,
            address,
        } => {
            proxy
                .set_host_frame_data_addr(phase, semiphase, address)
                .await
        }
        Setting::HostMetaAddr { phase, address } => {
            proxy.set_host_meta_data_addr(phase, address).await
        }
        Setting::HostFrameSize { size } => proxy.set_host_frame_data_size(size).await,
        Setting::HostMetaSize { size } => proxy.set_host_meta_data_size(size).await,
        Setting::HostAbmAddr { address } => proxy.set_host_abm_addr(address).await,
        Setting::RemoteFrameAddr { address } => proxy.set_remote_frame_data_addr(address).await,
        Setting::RemoteFrameSize { size } => proxy.set_remote_frame_data_size(size).await,
        Setting::RemoteMetaAddr { address } => proxy.set_remote_meta_data_addr(address).await,
        Setting::RemoteMetaSize { size } => proxy.set_remote_meta_data_size(size).await,
        Setting::RemoteFrameCounterAddr { address } => {
            proxy.set_remote_frame_counter_addr(address).await
        }
        Setting::FrameSize { size } => proxy.set_frame_size(size).await,
        Setting::PacketSize { size } => proxy.set_packet_size(size).await,
        Setting::PacketsPerGroup { count } => proxy.set_packets_per_group(count).await,
    }
}

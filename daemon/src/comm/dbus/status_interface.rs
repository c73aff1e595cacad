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

use crate::comm::dbus::{on_device, on_supervisor, parse_module};
use crate::supervisor::Supervisor;
use log::info;
use std::sync::Arc;
use zbus::{fdo, interface};

pub struct StatusInterface {
    supervisor: Arc<Supervisor>,
}

impl StatusInterface {
    pub fn new(supervisor: Arc<Supervisor>) -> StatusInterface {
        StatusInterface { supervisor }
    }
}

#[interface(name = "io.mindyd.status")]
impl StatusInterface {
    /// One line describing the device and its bring-up state, followed by where it was
    /// found when it is up.
    async fn get_device_state(&self) -> Result<String, fdo::Error> {
        info!("get_device_state called");
        let device_id = self.supervisor.device_id();
        let state = on_supervisor(&self.supervisor, |s| s.state()).await?;
        let location = on_device(&self.supervisor, |d| {
            let handle = d.handle();
            Ok(format!(
                "\nbus address: {}\nuio: uio{}\nBAR0: 0x{:X} (0x{:X} bytes)",
                handle.bdf(),
                handle.uio_index(),
                handle.bus_base(),
                handle.bar_size()
            ))
        })
        .await
        .unwrap_or_default();
        Ok(format!("{device_id}: {state}{location}"))
    }

    async fn get_rtl_build(&self) -> Result<String, fdo::Error> {
        info!("get_rtl_build called");
        Ok(on_device(&self.supervisor, |d| d.revision().build_string()).await?)
    }

    async fn get_rtl_date(&self) -> Result<String, fdo::Error> {
        info!("get_rtl_date called");
        Ok(on_device(&self.supervisor, |d| d.revision().date_string()).await?)
    }

    /// Bit N set = QSFP channel N has link.
    async fn get_channel_status(&self) -> Result<u32, fdo::Error> {
        info!("get_channel_status called");
        Ok(on_device(&self.supervisor, |d| d.status_manager().qsfp_status()).await?)
    }

    async fn get_error_status(&self) -> Result<u32, fdo::Error> {
        info!("get_error_status called");
        Ok(on_device(&self.supervisor, |d| d.status_manager().error_status()).await?)
    }

    async fn check_channel(&self, channel: u32) -> Result<String, fdo::Error> {
        info!("check_channel called with channel: {channel}");
        on_device(&self.supervisor, move |d| d.status_manager().check_channel(channel)).await?;
        Ok(format!("QSFP channel {channel} is up"))
    }

    async fn get_interrupt_count(&self, source: u32) -> Result<u64, fdo::Error> {
        info!("get_interrupt_count called with source: {source}");
        Ok(self.supervisor.interrupt_count(source as usize)?)
    }

    async fn get_interrupt_counts(&self) -> Result<Vec<u64>, fdo::Error> {
        info!("get_interrupt_counts called");
        Ok(self.supervisor.interrupt_counts())
    }

    async fn read_register32(&self, module: &str, offset: u32) -> Result<u32, fdo::Error> {
        info!("read_register32 called with module: {module} and offset: 0x{offset:X}");
        let module = parse_module(module)?;
        Ok(on_device(&self.supervisor, move |d| d.read_register32(module, offset)).await?)
    }

    async fn read_register64(&self, module: &str, offset: u32) -> Result<u64, fdo::Error> {
        info!("read_register64 called with module: {module} and offset: 0x{offset:X}");
        let module = parse_module(module)?;
        Ok(on_device(&self.supervisor, move |d| d.read_register64(module, offset)).await?)
    }

    async fn get_frame_counter(&self, phase: u32) -> Result<u32, fdo::Error> {
        info!("get_frame_counter called with phase: {phase}");
        Ok(on_device(&self.supervisor, move |d| d.frame_counters().get(phase)).await?)
    }

    /// Bus address of the frame counter of `phase`, for handing to a receiver.
    async fn get_frame_counter_pci_address(&self, phase: u32) -> Result<u64, fdo::Error> {
        info!("get_frame_counter_pci_address called with phase: {phase}");
        Ok(on_device(&self.supervisor, move |d| d.frame_counters().pci_address(phase)).await?)
    }

    /// Every host and remote buffer setting, one `name: value` per line.
    async fn get_buffer_configuration(&self) -> Result<String, fdo::Error> {
        info!("get_buffer_configuration called");
        Ok(on_device(&self.supervisor, |d| {
            let df = d.data_fetch();
            let shim = d.rdmx_shim();
            let mut lines = Vec::new();
            for phase in 0..2 {
                for semiphase in 0..2 {
                    lines.push(format!(
                        "host_frame_data_addr[{phase}][{semiphase}]: 0x{:X}",
                        df.host_frame_data_addr(phase, semiphase)?
                    ));
                }
            }
            for phase in 0..2 {
                lines.push(format!(
                    "host_meta_data_addr[{phase}]: 0x{:X}",
                    df.host_meta_data_addr(phase)?
                ));
            }
            lines.push(format!("host_frame_data_size: {}", df.host_frame_data_size()?));
            lines.push(format!("host_meta_data_size: {}", df.host_meta_data_size()?));
            lines.push(format!("host_abm_addr: 0x{:X}", df.host_abm_addr()?));
            lines.push(format!(
                "remote_frame_data_addr: 0x{:X}",
                shim.remote_frame_data_addr()?
            ));
            lines.push(format!(
                "remote_frame_data_size: {}",
                shim.remote_frame_data_size()?
            ));
            lines.push(format!(
                "remote_meta_data_addr: 0x{:X}",
                shim.remote_meta_data_addr()?
            ));
            lines.push(format!(
                "remote_meta_data_size: {}",
                shim.remote_meta_data_size()?
            ));
            lines.push(format!(
                "remote_frame_counter_addr: 0x{:X}",
                shim.remote_frame_counter_addr()?
            ));
            lines.push(format!("frame_size: {}", shim.frame_size()?));
            lines.push(format!("packet_size: {}", shim.packet_size()?));
            lines.push(format!("packets_per_group: {}", shim.packets_per_group()?));
            Ok(lines.join("\n"))
        })
        .await?)
    }
}

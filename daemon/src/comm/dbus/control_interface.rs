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
use tokio::sync::Mutex;
use zbus::{fdo, interface};

pub struct ControlInterface {
    supervisor: Arc<Supervisor>,
    /// Serialises writers so multi-register updates from different callers do not
    /// interleave.
    write_lock: Mutex<()>,
}

impl ControlInterface {
    pub fn new(supervisor: Arc<Supervisor>) -> ControlInterface {
        ControlInterface {
            supervisor,
            write_lock: Mutex::new(()),
        }
    }
}

#[interface(name = "io.mindyd.control")]
impl ControlInterface {
    /// Bring the device up again after a failed bring-up at start.
    async fn bring_up(&self) -> Result<String, fdo::Error> {
        info!("bring_up called");
        let _guard = self.write_lock.lock().await;
        on_supervisor(&self.supervisor, |s| s.bring_up()).await?;
        Ok(format!("{} is up", self.supervisor.device_id()))
    }

    async fn write_register32(
        &self,
        module: &str,
        offset: u32,
        value: u32,
    ) -> Result<String, fdo::Error> {
        info!(
            "write_register32 called with module: {module}, offset: 0x{offset:X} and value: 0x{value:X}"
        );
        let rtl_module = parse_module(module)?;
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.write_register32(rtl_module, offset, value)
        })
        .await?;
        Ok(format!("Wrote 0x{value:X} to {module} + 0x{offset:X}"))
    }

    async fn write_register64(
        &self,
        module: &str,
        offset: u32,
        value: u64,
    ) -> Result<String, fdo::Error> {
        info!(
            "write_register64 called with module: {module}, offset: 0x{offset:X} and value: 0x{value:X}"
        );
        let rtl_module = parse_module(module)?;
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.write_register64(rtl_module, offset, value)
        })
        .await?;
        Ok(format!("Wrote 0x{value:X} to {module} + 0x{offset:X}"))
    }

    async fn set_host_frame_data_addr(
        &self,
        phase: u32,
        semiphase: u32,
        address: u64,
    ) -> Result<String, fdo::Error> {
        info!(
            "set_host_frame_data_addr called with phase: {phase}, semiphase: {semiphase} and address: 0x{address:X}"
        );
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.data_fetch()
                .set_host_frame_data_addr(phase, semiphase, address)
        })
        .await?;
        Ok(format!(
            "Host frame buffer [{phase}][{semiphase}] set to 0x{address:X}"
        ))
    }

    async fn set_host_meta_data_addr(&self, phase: u32, address: u64) -> Result<String, fdo::Error> {
        info!("set_host_meta_data_addr called with phase: {phase} and address: 0x{address:X}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.data_fetch().set_host_meta_data_addr(phase, address)
        })
        .await?;
        Ok(format!("Host meta buffer [{phase}] set to 0x{address:X}"))
    }

    async fn set_host_frame_data_size(&self, size: u64) -> Result<String, fdo::Error> {
        info!("set_host_frame_data_size called with size: {size}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.data_fetch().set_host_frame_data_size(size)
        })
        .await?;
        Ok(format!("Host frame buffer size set to {size}"))
    }

    async fn set_host_meta_data_size(&self, size: u64) -> Result<String, fdo::Error> {
        info!("set_host_meta_data_size called with size: {size}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.data_fetch().set_host_meta_data_size(size)
        })
        .await?;
        Ok(format!("Host meta buffer size set to {size}"))
    }

    async fn set_host_abm_addr(&self, address: u64) -> Result<String, fdo::Error> {
        info!("set_host_abm_addr called with address: 0x{address:X}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.data_fetch().set_host_abm_addr(address)
        })
        .await?;
        Ok(format!("Host ABM address set to 0x{address:X}"))
    }

    async fn set_remote_frame_data_addr(&self, address: u64) -> Result<String, fdo::Error> {
        info!("set_remote_frame_data_addr called with address: 0x{address:X}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.rdmx_shim().set_remote_frame_data_addr(address)
        })
        .await?;
        Ok(format!("Remote frame buffer set to 0x{address:X}"))
    }

    async fn set_remote_frame_data_size(&self, size: u64) -> Result<String, fdo::Error> {
        info!("set_remote_frame_data_size called with size: {size}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.rdmx_shim().set_remote_frame_data_size(size)
        })
        .await?;
        Ok(format!("Remote frame buffer size set to {size}"))
    }

    async fn set_remote_meta_data_addr(&self, address: u64) -> Result<String, fdo::Error> {
        info!("set_remote_meta_data_addr called with address: 0x{address:X}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.rdmx_shim().set_remote_meta_data_addr(address)
        })
        .await?;
        Ok(format!("Remote meta buffer set to 0x{address:X}"))
    }

    async fn set_remote_meta_data_size(&self, size: u64) -> Result<String, fdo::Error> {
        info!("set_remote_meta_data_size called with size: {size}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.rdmx_shim().set_remote_meta_data_size(size)
        })
        .await?;
        Ok(format!("Remote meta buffer size set to {size}"))
    }

    async fn set_remote_frame_counter_addr(&self, address: u64) -> Result<String, fdo::Error> {
        info!("set_remote_frame_counter_addr called with address: 0x{address:X}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.rdmx_shim().set_remote_frame_counter_addr(address)
        })
        .await?;
        Ok(format!("Remote frame counter address set to 0x{address:X}"))
    }

    async fn set_frame_size(&self, size: u32) -> Result<String, fdo::Error> {
        info!("set_frame_size called with size: {size}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| d.rdmx_shim().set_frame_size(size)).await?;
        Ok(format!("Frame size set to {size}"))
    }

    async fn set_packet_size(&self, size: u32) -> Result<String, fdo::Error> {
        info!("set_packet_size called with size: {size}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| d.rdmx_shim().set_packet_size(size)).await?;
        Ok(format!("Packet size set to {size}"))
    }

    async fn set_packets_per_group(&self, count: u32) -> Result<String, fdo::Error> {
        info!("set_packets_per_group called with count: {count}");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, move |d| {
            d.rdmx_shim().set_packets_per_group(count)
        })
        .await?;
        Ok(format!("Packets per group set to {count}"))
    }

    async fn clear_frame_counters(&self) -> Result<String, fdo::Error> {
        info!("clear_frame_counters called");
        let _guard = self.write_lock.lock().await;
        on_device(&self.supervisor, |d| d.frame_counters().clear()).await?;
        Ok("Frame counters cleared".to_string())
    }

    /// Returns the new value of the counter.
    async fn increment_frame_counter(&self, phase: u32) -> Result<u32, fdo::Error> {
        info!("increment_frame_counter called with phase: {phase}");
        let _guard = self.write_lock.lock().await;
        Ok(on_device(&self.supervisor, move |d| d.frame_counters().increment(phase)).await?)
    }
}

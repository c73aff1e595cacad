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

use zbus::{Result, proxy};
#[proxy(
    default_service = "io.mindyd",
    interface = "io.mindyd.control",
    default_path = "/io/mindyd/control"
)]
pub trait Control {
    async fn bring_up(&self) -> Result<String>;
    async fn write_register32(&self, module: &str, offset: u32, value: u32) -> Result<String>;
    async fn write_register64(&self, module: &str, offset: u32, value: u64) -> Result<String>;

    async fn set_host_frame_data_addr(
        &self,
        phase: u32,
        semiphase: u32,
        address: u64,
    ) -> Result<String>;
    async fn set_host_meta_data_addr(&self, phase: u32, address: u64) -> Result<String>;
    async fn set_host_frame_data_size(&self, size: u64) -> Result<String>;
    async fn set_host_meta_data_size(&self, size: u64) -> Result<String>;
    async fn set_host_abm_addr(&self, address: u64) -> Result<String>;

    async fn set_remote_frame_data_addr(&self, address: u64) -> Result<String>;
    async fn set_remote_frame_data_size(&self, size: u64) -> Result<String>;
    async fn set_remote_meta_data_addr(&self, address: u64) -> Result<String>;
    async fn set_remote_meta_data_size(&self, size: u64) -> Result<String>;
    async fn set_remote_frame_counter_addr(&self, address: u64) -> Result<String>;

    async fn set_frame_size(&self, size: u32) -> Result<String>;
    async fn set_packet_size(&self, size: u32) -> Result<String>;
    async fn set_packets_per_group(&self, count: u32) -> Result<String>;

    async fn clear_frame_counters(&self) -> Result<String>;
    async fn increment_frame_counter(&self, phase: u32) -> Result<u32>;
}

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
    interface = "io.mindyd.status",
    default_path = "/io/mindyd/status"
)]
pub trait Status {
    async fn get_device_state(&self) -> Result<String>;
    async fn get_rtl_build(&self) -> Result<String>;
    async fn get_rtl_date(&self) -> Result<String>;
    async fn get_channel_status(&self) -> Result<u32>;
    async fn get_error_status(&self) -> Result<u32>;
    async fn check_channel(&self, channel: u32) -> Result<String>;
    async fn get_interrupt_count(&self, source: u32) -> Result<u64>;
    async fn get_interrupt_counts(&self) -> Result<Vec<u64>>;
    async fn read_register32(&self, module: &str, offset: u32) -> Result<u32>;
    async fn read_register64(&self, module: &str, offset: u32) -> Result<u64>;
    async fn get_frame_counter(&self, phase: u32) -> Result<u32>;
    async fn get_frame_counter_pci_address(&self, phase: u32) -> Result<u64>;
    async fn get_buffer_configuration(&self) -> Result<String>;
}

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

//! DBus proxy interfaces for the mindyd daemon.
//!
//! Generated with `zbus`'s `#[proxy]` macro; each trait mirrors one interface the daemon
//! serves.
//!
//! - [`control_proxy`] - Write operations (bring-up, register writes, buffer setup)
//! - [`status_proxy`] - Read-only operations (device state, registers, counters)
//!
//! # DBus Service Information
//!
//! - **Service Name**: `io.mindyd`
//! - **Control Interface**: `io.mindyd.control` at `/io/mindyd/control`
//! - **Status Interface**: `io.mindyd.status` at `/io/mindyd/status`

pub mod control_proxy;
pub mod status_proxy;

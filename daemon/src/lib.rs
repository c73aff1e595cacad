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

//! mindyd - control plane for the Mindy RTL design on a PCIe FPGA card.
//!
//! The library holds everything the daemon does short of the process itself:
//!
//! - [`register_port`]: 32 and 64-bit access to one RTL block's registers
//! - [`pci`] and [`uio`]: finding the card, mapping BAR0 and handing it to the UIO driver
//! - [`bring_up`]: the sequence from a PCI identifier to a [`bring_up::Device`]
//! - [`interrupts`]: the engine turning UIO notifications into per-source dispatch
//! - [`supervisor`]: ownership of the live device and its engine
//! - [`comm`]: the `io.mindyd` DBus service

pub mod bring_up;
pub mod comm;
pub mod config;
pub mod error;
pub mod interrupts;
pub mod pci;
pub mod register_port;
pub mod rtl;
pub mod supervisor;
pub mod system_io;
pub mod uio;

#[cfg(test)]
mod testing;

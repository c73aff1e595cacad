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

//! Host-side buffer configuration of the data fetch block.
//!
//! The design fetches frames from two ping-pong phases in host RAM, each split into two
//! semiphases, plus one meta-data buffer per phase. All addresses and sizes are 64-bit
//! registers.

use crate::error::MindyError;
use crate::register_port::RegisterPort;
use crate::rtl::phase_index;

/// Frame data buffer address, indexed by `[phase][semiphase]`.
const HOST_FRAME_ADDR: [[u32; 2]; 2] = [[0x04, 0x0C], [0x14, 0x1C]];
/// Meta data buffer address, indexed by phase.
const HOST_META_ADDR: [u32; 2] = [0x24, 0x2C];
const HOST_FRAME_BYTES: u32 = 0x34;
const HOST_META_BYTES: u32 = 0x3C;
const HOST_ABM_ADDR: u32 = 0x44;
/// Ends after the 64-bit ABM address.
pub const SPAN: u32 = 0x4C;

#[derive(Debug)]
pub struct DataFetch {
    port: RegisterPort,
}

impl DataFetch {
    pub fn new(port: RegisterPort) -> DataFetch {
        DataFetch { port }
    }

    pub fn port(&self) -> &RegisterPort {
        &self.port
    }

    fn frame_register(phase: u32, semiphase: u32) -> Result<u32, MindyError> {
        Ok(HOST_FRAME_ADDR[phase_index("phase", phase)?][phase_index("semiphase", semiphase)?])
    }

    pub fn set_host_frame_data_addr(
        &self,
        phase: u32,
        semiphase: u32,
        address: u64,
    ) -> Result<(), MindyError> {
        self.port
            .write64(Self::frame_register(phase, semiphase)?, address)
    }

    pub fn host_frame_data_addr(&self, phase: u32, semiphase: u32) -> Result<u64, MindyError> {
        self.port.read64(Self::frame_register(phase, semiphase)?)
    }

    pub fn set_host_meta_data_addr(&self, phase: u32, address: u64) -> Result<(), MindyError> {
        self.port
            .write64(HOST_META_ADDR[phase_index("phase", phase)?], address)
    }

    pub fn host_meta_data_addr(&self, phase: u32) -> Result<u64, MindyError> {
        self.port.read64(HOST_META_ADDR[phase_index("phase", phase)?])
    }

    /// Size of each host frame data buffer. Must be a multiple of half the frame size.
    pub fn set_host_frame_data_size(&self, size: u64) -> Result<(), MindyError> {
        self.port.write64(HOST_FRAME_BYTES, size)
    }

    pub fn host_frame_data_size(&self) -> Result<u64, MindyError> {
        self.port.read64(HOST_FRAME_BYTES)
    }

    /// Size of each host meta data buffer. Must be a multiple of 128.
    pub fn set_host_meta_data_size(&self, size: u64) -> Result<(), MindyError> {
        self.port.write64(HOST_META_BYTES, size)
    }

    pub fn host_meta_data_size(&self) -> Result<u64, MindyError> {
        self.port.read64(HOST_META_BYTES)
    }

    pub fn set_host_abm_addr(&self, address: u64) -> Result<(), MindyError> {
        self.port.write64(HOST_ABM_ADDR, address)
    }

    pub fn host_abm_addr(&self) -> Result<u64, MindyError> {
        self.port.read64(HOST_ABM_ADDR)
    }
}

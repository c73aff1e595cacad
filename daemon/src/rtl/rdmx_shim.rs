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

//! Receiver-side configuration of the RDMX shim.
//!
//! The shim pushes frames to a remote receiver over RDMX. It needs to know where the
//! receiver keeps its frame data, meta data and frame counter, and how frames are cut into
//! packets.

use crate::error::MindyError;
use crate::register_port::RegisterPort;

const REMOTE_FRAME_ADDR: u32 = 0x00;
const REMOTE_FRAME_SIZE: u32 = 0x08;
const REMOTE_META_ADDR: u32 = 0x10;
const REMOTE_META_SIZE: u32 = 0x18;
const REMOTE_COUNTER_ADDR: u32 = 0x20;
const FRAME_SIZE: u32 = 0x28;
const PACKET_SIZE: u32 = 0x2C;
const PACKETS_PER_GROUP: u32 = 0x30;
pub const SPAN: u32 = 0x34;

#[derive(Debug)]
pub struct RdmxShim {
    port: RegisterPort,
}

impl RdmxShim {
    pub fn new(port: RegisterPort) -> RdmxShim {
        RdmxShim { port }
    }

    pub fn port(&self) -> &RegisterPort {
        &self.port
    }

    pub fn set_remote_frame_data_addr(&self, address: u64) -> Result<(), MindyError> {
        self.port.write64(REMOTE_FRAME_ADDR, address)
    }

    pub fn remote_frame_data_addr(&self) -> Result<u64, MindyError> {
        self.port.read64(REMOTE_FRAME_ADDR)
    }

    pub fn set_remote_frame_data_size(&self, size: u64) -> Result<(), MindyError> {
        self.port.write64(REMOTE_FRAME_SIZE, size)
    }

    pub fn remote_frame_data_size(&self) -> Result<u64, MindyError> {
        self.port.read64(REMOTE_FRAME_SIZE)
    }

    pub fn set_remote_meta_data_addr(&self, address: u64) -> Result<(), MindyError> {
        self.port.write64(REMOTE_META_ADDR, address)
    }

    pub fn remote_meta_data_addr(&self) -> Result<u64, MindyError> {
        self.port.read64(REMOTE_META_ADDR)
    }

    pub fn set_remote_meta_data_size(&self, size: u64) -> Result<(), MindyError> {
        self.port.write64(REMOTE_META_SIZE, size)
    }

    pub fn remote_meta_data_size(&self) -> Result<u64, MindyError> {
        self.port.read64(REMOTE_META_SIZE)
    }

    pub fn set_remote_frame_counter_addr(&self, address: u64) -> Result<(), MindyError> {
        self.port.write64(REMOTE_COUNTER_ADDR, address)
    }

    pub fn remote_frame_counter_addr(&self) -> Result<u64, MindyError> {
        self.port.read64(REMOTE_COUNTER_ADDR)
    }

    /// Size of one frame (one phase) in bytes, typically 4 MiB. Must be a power of two
    /// and at least 4096.
    pub fn set_frame_size(&self, size: u32) -> Result<(), MindyError> {
        self.port.write32(FRAME_SIZE, size)
    }

    pub fn frame_size(&self) -> Result<u32, MindyError> {
        self.port.read32(FRAME_SIZE)
    }

    /// Payload size of an outgoing RDMX frame data packet.
    pub fn set_packet_size(&self, size: u32) -> Result<(), MindyError> {
        self.port.write32(PACKET_SIZE, size)
    }

    pub fn packet_size(&self) -> Result<u32, MindyError> {
        self.port.read32(PACKET_SIZE)
    }

    /// Number of packets in a ping-pong group.
    pub fn set_packets_per_group(&self, count: u32) -> Result<(), MindyError> {
        self.port.write32(PACKETS_PER_GROUP, count)
    }

    pub fn packets_per_group(&self) -> Result<u32, MindyError> {
        self.port.read32(PACKETS_PER_GROUP)
    }
}

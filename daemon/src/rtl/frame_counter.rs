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

//! The two local frame counters.
//!
//! Incrementing a counter tells the design that the host has filled the frame of that
//! phase; the design then ships frame data, meta data and the new counter value to the
//! receivers. Receivers learn where to find the counters through [`FrameCounters::pci_address`].

use crate::error::MindyError;
use crate::register_port::RegisterPort;
use crate::rtl::phase_index;
use log::debug;

/// FC0 and FC1
const COUNTERS: [u32; 2] = [0x04, 0x08];
pub const SPAN: u32 = 0x0C;

#[derive(Debug)]
pub struct FrameCounters {
    port: RegisterPort,
}

impl FrameCounters {
    pub fn new(port: RegisterPort) -> FrameCounters {
        FrameCounters { port }
    }

    pub fn port(&self) -> &RegisterPort {
        &self.port
    }

    /// Zero both counters and restart the design's frame sequencing.
    ///
    /// Writing FC0 is enough, the design clears FC1 along with it.
    pub fn clear(&self) -> Result<(), MindyError> {
        debug!("Clearing frame counters of {}", self.port.device());
        self.port.write32(COUNTERS[0], 0)
    }

    pub fn get(&self, phase: u32) -> Result<u32, MindyError> {
        self.port.read32(COUNTERS[phase_index("phase", phase)?])
    }

    /// Add one to the counter of `phase`, returning the new value.
    pub fn increment(&self, phase: u32) -> Result<u32, MindyError> {
        let register = COUNTERS[phase_index("phase", phase)?];
        let next = self.port.read32(register)?.wrapping_add(1);
        self.port.write32(register, next)?;
        Ok(next)
    }

    /// Bus address of the counter of `phase`, for peers that read it over PCIe.
    pub fn pci_address(&self, phase: u32) -> Result<u64, MindyError> {
        Ok(self.port.origin() + u64::from(COUNTERS[phase_index("phase", phase)?]))
    }
}

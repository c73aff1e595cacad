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

//! The interrupt aggregator.
//!
//! Up to 32 on-chip sources share the single PCI interrupt. Each pending source sets its bit
//! in `ACTIVE`; writing a bitmap to `CLEAR` acknowledges exactly those bits.

use crate::error::MindyError;
use crate::register_port::RegisterPort;

const ACTIVE: u32 = 0x00;
const CLEAR: u32 = 0x04;
pub const SPAN: u32 = 0x08;

/// Number of interrupt sources, one per bit of the active bitmap.
pub const INTERRUPT_SOURCES: usize = 32;

#[derive(Debug)]
pub struct IrqManager {
    port: RegisterPort,
}

impl IrqManager {
    pub fn new(port: RegisterPort) -> IrqManager {
        IrqManager { port }
    }

    pub fn device(&self) -> &str {
        self.port.device()
    }

    /// Bitmap of the sources that are currently pending.
    pub fn active(&self) -> Result<u32, MindyError> {
        self.port.read32(ACTIVE)
    }

    pub fn clear(&self, bitmap: u32) -> Result<(), MindyError> {
        self.port.write32(CLEAR, bitmap)
    }
}

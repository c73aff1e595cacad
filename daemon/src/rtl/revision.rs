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

//! The build-version block at the start of BAR0.
//!
//! `BUILD_MAJOR` doubles as the identity register: a device that has not finished
//! enumerating answers every read with all ones, which no real build number can be.

use crate::error::MindyError;
use crate::register_port::RegisterPort;

const BUILD_MAJOR: u32 = 0x00;
const BUILD_MINOR: u32 = 0x04;
const BUILD_REV: u32 = 0x08;
const BUILD_RC: u32 = 0x0C;
const BUILD_DATE: u32 = 0x10;
/// Bytes of register space the block occupies.
pub const SPAN: u32 = 0x14;

/// What every register reads as while a PCIe device is absent or still resetting.
pub const IDENTITY_SENTINEL: u32 = 0xFFFF_FFFF;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Format a build version as `major.minor.rev`, with `-rc-N` appended for release
/// candidates.
pub fn format_build(major: u32, minor: u32, rev: u32, rc: u32) -> String {
    let mut build = format!("{major}.{minor}.{rev:02}");
    if rc != 0 {
        build.push_str(&format!("-rc-{rc}"));
    }
    build
}

/// Decode a `BUILD_DATE` word (month in bits 31:24, day in 23:16, year in 15:0) as
/// `DD-Mon-YYYY`, or `N/A` when the month is out of range.
pub fn format_date(bits: u32) -> String {
    let month = (bits >> 24) & 0xFF;
    let day = (bits >> 16) & 0xFF;
    let year = bits & 0xFFFF;
    match month.checked_sub(1).and_then(|m| MONTHS.get(m as usize)) {
        Some(name) => format!("{day:02}-{name}-{year}"),
        None => "N/A".to_string(),
    }
}

#[derive(Debug)]
pub struct AxiRevision {
    port: RegisterPort,
}

impl AxiRevision {
    pub fn new(port: RegisterPort) -> AxiRevision {
        AxiRevision { port }
    }

    pub fn port(&self) -> &RegisterPort {
        &self.port
    }

    /// Read the identity register.
    pub fn build_major(&self) -> Result<u32, MindyError> {
        self.port.read32(BUILD_MAJOR)
    }

    /// The RTL build version, e.g. `1.4.07` or `2.0.01-rc-3`.
    pub fn build_string(&self) -> Result<String, MindyError> {
        Ok(format_build(
            self.port.read32(BUILD_MAJOR)?,
            self.port.read32(BUILD_MINOR)?,
            self.port.read32(BUILD_REV)?,
            self.port.read32(BUILD_RC)?,
        ))
    }

    /// The RTL build date, e.g. `02-Feb-2024`.
    pub fn date_string(&self) -> Result<String, MindyError> {
        Ok(format_date(self.port.read32(BUILD_DATE)?))
    }
}

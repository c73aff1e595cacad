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

//! The RTL blocks of the Mindy design and where they live inside BAR0.
//!
//! Each block is reached through its own [`RegisterPort`](crate::register_port::RegisterPort)
//! and wrapped in a small typed abstraction in one of the submodules. Which byte offset of
//! BAR0 a block starts at is recorded in a [`ModuleMap`]; the stock layout is
//! [`ModuleMap::mindy_default`] and it can be overridden through
//! [`AXI_MAP_ENV`](crate::config::AXI_MAP_ENV).

pub mod data_fetch;
pub mod frame_counter;
pub mod irq_manager;
pub mod rdmx_shim;
pub mod revision;
pub mod status_manager;

use crate::error::MindyError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One of the register blocks every Mindy build contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RtlModule {
    MasterRevision,
    FrameCounter,
    DataFetch,
    RdmxShim,
    StatusManager,
    IrqManager,
}

impl RtlModule {
    pub const ALL: [RtlModule; 6] = [
        RtlModule::MasterRevision,
        RtlModule::FrameCounter,
        RtlModule::DataFetch,
        RtlModule::RdmxShim,
        RtlModule::StatusManager,
        RtlModule::IrqManager,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RtlModule::MasterRevision => "master_revision",
            RtlModule::FrameCounter => "frame_counter",
            RtlModule::DataFetch => "data_fetch",
            RtlModule::RdmxShim => "rdmx_shim",
            RtlModule::StatusManager => "status_manager",
            RtlModule::IrqManager => "irq_manager",
        }
    }

    /// Bytes of BAR0 the block's registers cover, starting at its AXI offset.
    pub fn span(&self) -> u32 {
        match self {
            RtlModule::MasterRevision => revision::SPAN,
            RtlModule::FrameCounter => frame_counter::SPAN,
            RtlModule::DataFetch => data_fetch::SPAN,
            RtlModule::RdmxShim => rdmx_shim::SPAN,
            RtlModule::StatusManager => status_manager::SPAN,
            RtlModule::IrqManager => irq_manager::SPAN,
        }
    }
}

impl fmt::Display for RtlModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RtlModule {
    type Err = MindyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RtlModule::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| {
                MindyError::Configuration(format!(
                    "'{s}' is not an RTL module, expected one of: {}",
                    RtlModule::ALL.map(|m| m.as_str()).join(", ")
                ))
            })
    }
}

/// Validate a ping-pong `phase` (or `semiphase`) argument and return it as an index.
pub(crate) fn phase_index(name: &str, phase: u32) -> Result<usize, MindyError> {
    match phase {
        0 | 1 => Ok(phase as usize),
        _ => Err(MindyError::Argument(format!(
            "{name} must be 0 or 1, got {phase}"
        ))),
    }
}

/// Byte offset of each RTL block inside BAR0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMap {
    offsets: BTreeMap<RtlModule, u32>,
}

impl ModuleMap {
    pub fn new() -> ModuleMap {
        ModuleMap::default()
    }

    /// The AXI layout of released Mindy bitstreams.
    pub fn mindy_default() -> ModuleMap {
        ModuleMap::new()
            .with(RtlModule::MasterRevision, 0x0000)
            .with(RtlModule::FrameCounter, 0x1000)
            .with(RtlModule::DataFetch, 0x2000)
            .with(RtlModule::RdmxShim, 0x4000)
            .with(RtlModule::StatusManager, 0x5000)
            .with(RtlModule::IrqManager, 0x6000)
    }

    pub fn with(mut self, module: RtlModule, offset: u32) -> ModuleMap {
        self.offsets.insert(module, offset);
        self
    }

    pub fn without(mut self, module: RtlModule) -> ModuleMap {
        self.offsets.remove(&module);
        self
    }

    pub fn offset(&self, module: RtlModule) -> Option<u32> {
        self.offsets.get(&module).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RtlModule, u32)> + '_ {
        self.offsets.iter().map(|(m, o)| (*m, *o))
    }

    /// Check that every block of [`RtlModule::ALL`] has an offset.
    ///
    /// # Returns: `Result<(), MindyError>`
    /// * `Ok(())` - The map is complete
    /// * `Err(MindyError::Configuration)` - Names every module that is missing
    pub fn require_all(&self) -> Result<(), MindyError> {
        let missing: Vec<&str> = RtlModule::ALL
            .iter()
            .filter(|m| !self.offsets.contains_key(*m))
            .map(RtlModule::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MindyError::Configuration(format!(
                "No AXI offset configured for: {}",
                missing.join(", ")
            )))
        }
    }
}

impl FromStr for ModuleMap {
    type Err = MindyError;

    /// Parse `name=offset` entries separated by commas. Offsets are hex with a `0x`
    /// prefix, decimal otherwise.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut map = ModuleMap::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, offset_str) = entry.split_once('=').ok_or_else(|| {
                MindyError::Configuration(format!("AXI map entry '{entry}' is not name=offset"))
            })?;
            let module: RtlModule = name.parse()?;
            let offset_str = offset_str.trim();
            let offset = match offset_str
                .strip_prefix("0x")
                .or_else(|| offset_str.strip_prefix("0X"))
            {
                Some(hex) => u32::from_str_radix(hex, 16),
                None => offset_str.parse(),
            }
            .map_err(|_| {
                MindyError::Configuration(format!(
                    "AXI offset '{offset_str}' of {module} is not a number"
                ))
            })?;
            if offset % 4 != 0 {
                return Err(MindyError::Configuration(format!(
                    "AXI offset 0x{offset:X} of {module} is not 32-bit aligned"
                )));
            }
            if map.offsets.insert(module, offset).is_some() {
                return Err(MindyError::Configuration(format!(
                    "{module} appears more than once in the AXI map"
                )));
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod test_module_map {
    use super::{ModuleMap, RtlModule};
    use googletest::prelude::*;
    use rstest::*;

    #[gtest]
    fn default_map_is_complete() {
        assert_that!(ModuleMap::mindy_default().require_all(), ok(anything()));
        expect_that!(
            ModuleMap::mindy_default().offset(RtlModule::IrqManager),
            some(eq(0x6000u32))
        );
    }

    #[gtest]
    fn missing_module_is_named() {
        let map = ModuleMap::mindy_default().without(RtlModule::RdmxShim);
        expect_that!(
            map.require_all(),
            err(displays_as(all!(
                contains_substring("MindyError::Configuration"),
                contains_substring("rdmx_shim")
            )))
        );
    }

    #[gtest]
    fn parses_full_map() {
        let map: ModuleMap = "master_revision=0x0, frame_counter=0x1000,data_fetch=8192,\
            rdmx_shim=0x4000,status_manager=0x5000,irq_manager=0x6000"
            .parse()
            .unwrap();
        expect_that!(map, eq(&ModuleMap::mindy_default()));
    }

    #[gtest]
    #[rstest]
    #[case::unknown_name("master_revision=0x0,bogus=0x10", "bogus")]
    #[case::no_equals("master_revision", "not name=offset")]
    #[case::bad_number("frame_counter=0xZZ", "not a number")]
    #[case::unaligned("frame_counter=0x1002", "not 32-bit aligned")]
    #[case::duplicate("irq_manager=0x6000,irq_manager=0x7000", "more than once")]
    fn should_fail(#[case] input: &str, #[case] message: &str) {
        let result = input.parse::<ModuleMap>();
        expect_that!(
            result,
            err(displays_as(all!(
                contains_substring("MindyError::Configuration"),
                contains_substring(message)
            )))
        );
    }

    #[gtest]
    fn module_names_round_trip() {
        for module in RtlModule::ALL {
            expect_that!(module.as_str().parse::<RtlModule>(), ok(eq(&module)));
        }
    }
}

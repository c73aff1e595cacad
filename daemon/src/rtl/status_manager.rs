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

//! Link and error status of the design.

use crate::error::MindyError;
use crate::register_port::RegisterPort;

/// Bit N set = QSFP channel N has link.
const QSFP_STATUS: u32 = 0x00;
/// Non-zero = a latched error.
const ERROR_STATUS: u32 = 0x04;
pub const SPAN: u32 = 0x08;

#[derive(Debug)]
pub struct StatusManager {
    port: RegisterPort,
}

impl StatusManager {
    pub fn new(port: RegisterPort) -> StatusManager {
        StatusManager { port }
    }

    pub fn port(&self) -> &RegisterPort {
        &self.port
    }

    pub fn qsfp_status(&self) -> Result<u32, MindyError> {
        self.port.read32(QSFP_STATUS)
    }

    pub fn error_status(&self) -> Result<u32, MindyError> {
        self.port.read32(ERROR_STATUS)
    }

    pub fn channel_up(&self, channel: u32) -> Result<bool, MindyError> {
        if channel >= u32::BITS {
            return Err(MindyError::Argument(format!(
                "QSFP channel {channel} does not exist"
            )));
        }
        Ok(self.qsfp_status()? & (1 << channel) != 0)
    }

    /// Fail with [`MindyError::ChannelDown`] unless `channel` has link.
    pub fn check_channel(&self, channel: u32) -> Result<(), MindyError> {
        let status = self.qsfp_status()?;
        if channel < u32::BITS && status & (1 << channel) != 0 {
            Ok(())
        } else {
            Err(MindyError::ChannelDown {
                device: self.port.device().to_string(),
                channel,
                status,
            })
        }
    }
}

#[cfg(test)]
mod test_status_manager {
    use super::StatusManager;
    use crate::testing::{FakeBar, port_at};
    use googletest::prelude::*;
    use rstest::*;
    use std::sync::Arc;

    #[gtest]
    #[rstest]
    #[case::none_up(0b00, 0, false)]
    #[case::first_up(0b01, 0, true)]
    #[case::second_up(0b10, 1, true)]
    #[case::other_up(0b10, 0, false)]
    fn channel_bits(#[case] status: u32, #[case] channel: u32, #[case] up: bool) {
        let bar = Arc::new(FakeBar::new());
        bar.poke(0x5000, status);
        let sm = StatusManager::new(port_at(&bar, 0x5000));
        expect_that!(sm.channel_up(channel), ok(eq(&up)));
    }

    #[gtest]
    fn down_channel_reports_device_and_status() {
        let bar = Arc::new(FakeBar::new());
        bar.poke(0x5000, 0b01);
        let sm = StatusManager::new(port_at(&bar, 0x5000));
        expect_that!(sm.check_channel(0), ok(anything()));
        expect_that!(
            sm.check_channel(1),
            err(displays_as(all!(
                contains_substring("MindyError::ChannelDown"),
                contains_substring("10ee:903f"),
                contains_substring("0x1")
            )))
        );
    }
}

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

use log::error;
use std::path::PathBuf;
use zbus::fdo;

#[derive(Debug, thiserror::Error)]
pub enum MindyError {
    #[error("MindyError::Configuration: {0}")]
    Configuration(String),
    #[error("MindyError::DeviceNotFound: PCI device {device} not found")]
    DeviceNotFound { device: String },
    #[error("MindyError::MapFailed: Failed to map {path:?} of device {device}: {e}")]
    MapFailed {
        device: String,
        path: PathBuf,
        e: std::io::Error,
    },
    #[error(
        "MindyError::DeviceUnresponsive: Device {device} still reads 0x{value:08X} from its identity register after a hot-reset"
    )]
    DeviceUnresponsive { device: String, value: u32 },
    #[error("MindyError::UioRegistrationFailed: Cannot register {device} with {path:?}: {e}")]
    UioRegistrationFailed {
        device: String,
        path: PathBuf,
        e: std::io::Error,
    },
    #[error("MindyError::UioIndexNotFound: Can't find a UIO index for device {device} at {bdf}")]
    UioIndexNotFound { device: String, bdf: String },
    #[error("MindyError::InterruptChannelFault: Interrupt channel of device {device} failed: {reason}")]
    InterruptChannelFault { device: String, reason: String },
    #[error(
        "MindyError::StaleMapping: Register mapping of device {device} was invalidated by a hot-reset"
    )]
    StaleMapping { device: String },
    #[error("MindyError::NotReady: Device {device} is not brought up (state: {state})")]
    NotReady { device: String, state: String },
    #[error("MindyError::ChannelDown: QSFP channel {channel} of device {device} is down (0x{status:X})")]
    ChannelDown {
        device: String,
        channel: u32,
        status: u32,
    },
    #[error("MindyError::Argument: {0}")]
    Argument(String),
    #[error("MindyError::IORead: An IO error occurred when reading from {file:?}: {e}")]
    IORead { file: PathBuf, e: std::io::Error },
    #[error("MindyError::IOWrite: An IO error occurred when writing {data:?} to {file:?}: {e}")]
    IOWrite {
        data: String,
        file: PathBuf,
        e: std::io::Error,
    },
    #[error("MindyError::IOReadDir: An IO error occurred when reading directory {dir:?}: {e}")]
    IOReadDir { dir: PathBuf, e: std::io::Error },
    #[error("MindyError::Internal: An Internal error occurred: {0}")]
    Internal(String),
}

impl From<MindyError> for fdo::Error {
    fn from(err: MindyError) -> Self {
        error!("{err}");
        match err {
            MindyError::Argument(..) => fdo::Error::InvalidArgs(err.to_string()),
            MindyError::Configuration(..) => fdo::Error::InvalidArgs(err.to_string()),
            MindyError::IORead { .. } => fdo::Error::IOError(err.to_string()),
            MindyError::IOWrite { .. } => fdo::Error::IOError(err.to_string()),
            MindyError::IOReadDir { .. } => fdo::Error::IOError(err.to_string()),
            MindyError::MapFailed { .. } => fdo::Error::IOError(err.to_string()),
            _ => fdo::Error::Failed(err.to_string()),
        }
    }
}

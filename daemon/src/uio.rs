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

//! Registration with the Linux Userspace-I/O subsystem.
//!
//! Interrupts of the Mindy design reach userspace through the generic `uio_pci_generic`
//! driver. The driver is told about the device by writing its ids to `new_id`; once it
//! binds, a `uioN` class device appears whose sysfs link points back into the PCI tree:
//!
//! ```text
//! /sys/class/uio/uio3 -> ../../devices/pci0000:00/0000:00:01.0/0000:01:00.0/uio/uio3
//! ```
//!
//! The `N` of that entry is what the interrupt engine needs to open `/dev/uioN`.

use crate::config::{PciId, SysfsLayout, UIO_DRIVER_MODULE};
use crate::error::MindyError;
use crate::pci::{PciBackend, SysfsPci};
use crate::system_io::{fs_read_dir, fs_read_link};
use log::{debug, info, trace, warn};
use std::fs::OpenOptions;
use std::io::Write;
use std::process::Command;

/// Operations the bring-up sequencer needs from the UIO subsystem.
pub trait UioRegistrar: Send + Sync {
    /// Make sure a UIO driver owns `device` and return its UIO index.
    ///
    /// # Returns: `Result<u32, MindyError>`
    /// * `Ok(u32)` - The `N` of `/dev/uioN`
    /// * `Err(MindyError::DeviceNotFound)` - The device isn't on the bus
    /// * `Err(MindyError::UioRegistrationFailed)` - The driver's `new_id` file can't be opened
    /// * `Err(MindyError::UioIndexNotFound)` - No UIO device appeared for it
    fn initialize(&self, device: &PciId) -> Result<u32, MindyError>;
}

/// Return the number at the end of a name such as `uio12`.
pub(crate) fn trailing_index(name: &str) -> Option<u32> {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    name[name.len() - digits..].parse().ok()
}

/// [`UioRegistrar`] backed by sysfs and `uio_pci_generic`.
#[derive(Debug, Clone, Default)]
pub struct SysfsUio {
    layout: SysfsLayout,
}

impl SysfsUio {
    pub fn new(layout: SysfsLayout) -> SysfsUio {
        SysfsUio { layout }
    }

    /// Ask `uio_pci_generic` to claim devices with the ids of `device`.
    ///
    /// Writes `"<vendor> <device>\n"` to the driver's `new_id` file. The kernel rejects the
    /// write when the ids are already registered, which is the normal case on every
    /// bring-up after the first, so only failing to open the file is an error.
    ///
    /// # Returns: `Result<(), MindyError>`
    /// * `Ok(())` - The ids were written, or the driver already knew them
    /// * `Err(MindyError::UioRegistrationFailed)` - `new_id` can't be opened for writing
    pub fn register_device(&self, device: &PciId) -> Result<(), MindyError> {
        let path = &self.layout.uio_new_id_path;
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| MindyError::UioRegistrationFailed {
                device: device.to_string(),
                path: path.clone(),
                e,
            })?;
        let line = format!("{:04x} {:04x}\n", device.vendor, device.device);
        trace!("Writing {line:?} to {path:?}");
        if let Err(e) = file.write_all(line.as_bytes()) {
            debug!("{path:?} refused {line:?} ({e}), assuming {device} is already registered");
        }
        Ok(())
    }

    fn scan_for_index(&self, bdf: &str) -> Option<u32> {
        let search_key = format!("/{bdf}/uio/uio");
        let mut entries = match fs_read_dir(&self.layout.uio_class_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("{e}");
                return None;
            }
        };
        entries.sort();
        entries.into_iter().find_map(|entry| {
            let target = fs_read_link(&self.layout.uio_class_dir.join(&entry)).ok()?;
            if target.to_string_lossy().contains(&search_key) {
                trailing_index(&entry)
            } else {
                None
            }
        })
    }

    /// Find the UIO index of the device at bus address `bdf`.
    ///
    /// The driver binds asynchronously after [`register_device`](Self::register_device), so
    /// the class directory is scanned up to `uio_scan_attempts` times.
    ///
    /// # Returns: `Result<u32, MindyError>`
    /// * `Ok(u32)` - The trailing number of the matching `uioN` entry
    /// * `Err(MindyError::UioIndexNotFound)` - Nothing matched in any attempt
    pub fn find_index(&self, device: &PciId, bdf: &str) -> Result<u32, MindyError> {
        for attempt in 1..=self.layout.uio_scan_attempts.max(1) {
            if let Some(index) = self.scan_for_index(bdf) {
                info!("{device} at {bdf} is uio{index}");
                return Ok(index);
            }
            trace!("No UIO entry for {bdf} yet (attempt {attempt})");
            std::thread::sleep(self.layout.uio_scan_interval);
        }
        Err(MindyError::UioIndexNotFound {
            device: device.to_string(),
            bdf: bdf.to_string(),
        })
    }

    fn load_driver_module(&self) {
        if !self.layout.load_driver_module {
            return;
        }
        match Command::new("modprobe").arg(UIO_DRIVER_MODULE).status() {
            Ok(status) if status.success() => trace!("{UIO_DRIVER_MODULE} loaded"),
            Ok(status) => warn!("modprobe {UIO_DRIVER_MODULE} exited with {status}"),
            Err(e) => warn!("Failed to run modprobe {UIO_DRIVER_MODULE}: {e}"),
        }
    }
}

impl UioRegistrar for SysfsUio {
    fn initialize(&self, device: &PciId) -> Result<u32, MindyError> {
        let bdf = SysfsPci::new(self.layout.clone()).resolve(device)?;
        self.load_driver_module();
        self.register_device(device)?;
        self.find_index(device, &bdf)
    }
}

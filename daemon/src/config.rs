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

//! Locations of the kernel interfaces mindyd talks to, and the daemon's runtime settings.
//!
//! The path constants describe a stock Linux system. They are gathered into a
//! [`SysfsLayout`] which every sysfs-facing component takes by reference, so the same code
//! can run against a scratch directory tree in tests.

use crate::error::MindyError;
use crate::rtl::ModuleMap;
use log::{info, trace};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// The driver-decided location of PCI device objects. Typically `/sys/bus/pci/devices/`.
pub static PCI_DEVICES_DIR: &str = "/sys/bus/pci/devices/";

/// Writing "1" here makes the kernel re-enumerate every PCI bus.
pub static PCI_RESCAN_PATH: &str = "/sys/bus/pci/rescan";

/// The `new_id` control file of the generic UIO-over-PCI driver.
/// See [https://docs.kernel.org/driver-api/uio-howto.html](https://docs.kernel.org/driver-api/uio-howto.html)
pub static UIO_NEW_ID_PATH: &str = "/sys/bus/pci/drivers/uio_pci_generic/new_id";

/// The class directory holding one symlink per registered UIO device. Typically `/sys/class/uio/`.
pub static UIO_CLASS_DIR: &str = "/sys/class/uio/";

/// Where the `uioN` character devices appear.
pub static DEV_DIR: &str = "/dev/";

/// Kernel module providing the generic UIO-over-PCI driver.
pub static UIO_DRIVER_MODULE: &str = "uio_pci_generic";

/// Vendor and device ID of the Mindy design when nothing else is configured.
pub static DEFAULT_PCI_DEVICE: &str = "10ee:903f";

/// Environment variable overriding [`DEFAULT_PCI_DEVICE`].
pub static PCI_DEVICE_ENV: &str = "MINDYD_PCI_DEVICE";

/// Environment variable overriding the default AXI map, e.g.
/// `master_revision=0x0,irq_manager=0x6000,...`.
pub static AXI_MAP_ENV: &str = "MINDYD_AXI_MAP";

/// How long the PCI bus gets to re-enumerate after a hot-reset.
pub const HOT_RESET_SETTLE: Duration = Duration::from_secs(2);

/// How long the secondary bus reset bit is held asserted.
pub const HOT_RESET_HOLD: Duration = Duration::from_millis(100);

/// The UIO driver binds asynchronously after `new_id` is written.
pub const UIO_SCAN_ATTEMPTS: u32 = 10;
pub const UIO_SCAN_INTERVAL: Duration = Duration::from_millis(100);

/// All filesystem locations used for PCI and UIO work, plus the timing knobs that go with
/// them.
#[derive(Debug, Clone)]
pub struct SysfsLayout {
    pub pci_devices_dir: PathBuf,
    pub pci_rescan_path: PathBuf,
    pub uio_new_id_path: PathBuf,
    pub uio_class_dir: PathBuf,
    pub dev_dir: PathBuf,
    /// Whether `modprobe` should be run for [`UIO_DRIVER_MODULE`].
    pub load_driver_module: bool,
    pub hot_reset_settle: Duration,
    pub hot_reset_hold: Duration,
    pub uio_scan_attempts: u32,
    pub uio_scan_interval: Duration,
}

impl Default for SysfsLayout {
    fn default() -> Self {
        SysfsLayout {
            pci_devices_dir: PCI_DEVICES_DIR.into(),
            pci_rescan_path: PCI_RESCAN_PATH.into(),
            uio_new_id_path: UIO_NEW_ID_PATH.into(),
            uio_class_dir: UIO_CLASS_DIR.into(),
            dev_dir: DEV_DIR.into(),
            load_driver_module: true,
            hot_reset_settle: HOT_RESET_SETTLE,
            hot_reset_hold: HOT_RESET_HOLD,
            uio_scan_attempts: UIO_SCAN_ATTEMPTS,
            uio_scan_interval: UIO_SCAN_INTERVAL,
        }
    }
}

impl SysfsLayout {
    /// Mirror the system layout under `root`, without any waiting or module loading.
    ///
    /// `root` is expected to contain `sys/bus/pci/...`, `sys/class/uio/` and `dev/` the same
    /// way `/` does.
    pub fn rooted_at(root: &Path) -> Self {
        let rebase = |p: &str| root.join(p.trim_start_matches('/'));
        SysfsLayout {
            pci_devices_dir: rebase(PCI_DEVICES_DIR),
            pci_rescan_path: rebase(PCI_RESCAN_PATH),
            uio_new_id_path: rebase(UIO_NEW_ID_PATH),
            uio_class_dir: rebase(UIO_CLASS_DIR),
            dev_dir: rebase(DEV_DIR),
            load_driver_module: false,
            hot_reset_settle: Duration::ZERO,
            hot_reset_hold: Duration::ZERO,
            uio_scan_attempts: 1,
            uio_scan_interval: Duration::ZERO,
        }
    }

    pub fn pci_device_dir(&self, bdf: &str) -> PathBuf {
        self.pci_devices_dir.join(bdf)
    }

    pub fn uio_device_node(&self, uio_index: u32) -> PathBuf {
        self.dev_dir.join(format!("uio{uio_index}"))
    }

    /// PCI configuration space of the device behind a UIO index.
    pub fn uio_config_space(&self, uio_index: u32) -> PathBuf {
        self.uio_class_dir
            .join(format!("uio{uio_index}"))
            .join("device/config")
    }
}

/// A PCI `vendor:device` identifier such as `10ee:903f`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciId {
    pub vendor: u16,
    pub device: u16,
}

impl FromStr for PciId {
    type Err = MindyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            u16::from_str_radix(part.trim().trim_start_matches("0x"), 16).map_err(|_| {
                MindyError::Configuration(format!(
                    "'{s}' is not a valid PCI identifier, expected vendorID:deviceID in hex"
                ))
            })
        };
        match s.split_once(':') {
            Some((vendor, device)) => Ok(PciId {
                vendor: parse(vendor)?,
                device: parse(device)?,
            }),
            None => Err(MindyError::Configuration(format!(
                "'{s}' is not a valid PCI identifier, expected vendorID:deviceID in hex"
            ))),
        }
    }
}

impl fmt::Display for PciId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.device)
    }
}

/// Runtime settings of the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub pci_device: PciId,
    pub module_map: ModuleMap,
}

impl DaemonConfig {
    /// Build the configuration from [`PCI_DEVICE_ENV`] and [`AXI_MAP_ENV`], falling back to
    /// the stock Mindy values for anything unset.
    ///
    /// # Returns: `Result<DaemonConfig, MindyError>`
    /// * `Err(MindyError::Configuration)` - A variable is set but can't be parsed
    pub fn from_env() -> Result<DaemonConfig, MindyError> {
        let device_str =
            std::env::var(PCI_DEVICE_ENV).unwrap_or_else(|_| DEFAULT_PCI_DEVICE.to_string());
        trace!("Using PCI device string '{device_str}'");
        let pci_device = device_str.parse()?;

        let module_map = match std::env::var(AXI_MAP_ENV) {
            Ok(map) => {
                info!("Using AXI map from {AXI_MAP_ENV}: {map}");
                map.parse()?
            }
            Err(_) => ModuleMap::mindy_default(),
        };

        Ok(DaemonConfig {
            pci_device,
            module_map,
        })
    }
}

#[cfg(test)]
mod test_pci_id {
    use super::PciId;
    use crate::error::MindyError;
    use googletest::prelude::*;
    use rstest::*;

    #[gtest]
    #[rstest]
    #[case::lower("10ee:903f", 0x10ee, 0x903f)]
    #[case::upper("10EE:903F", 0x10ee, 0x903f)]
    #[case::prefixed("0x10ee:0x903f", 0x10ee, 0x903f)]
    fn should_parse(#[case] input: &str, #[case] vendor: u16, #[case] device: u16) {
        let result = input.parse::<PciId>();
        assert_that!(result, ok(eq(&PciId { vendor, device })));
    }

    #[gtest]
    #[rstest]
    #[case::no_colon("10ee903f")]
    #[case::not_hex("10ee:zzzz")]
    #[case::too_wide("10ee:1903f")]
    #[case::empty("")]
    fn should_fail(#[case] input: &str) {
        let result: std::result::Result<PciId, MindyError> = input.parse();
        assert_that!(
            result,
            err(displays_as(contains_substring("MindyError::Configuration")))
        );
    }

    #[test]
    fn displays_as_lspci_filter() {
        let id = PciId {
            vendor: 0x10ee,
            device: 0x903f,
        };
        assert_eq!(id.to_string(), "10ee:903f");
    }
}

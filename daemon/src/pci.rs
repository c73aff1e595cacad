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

//! PCI resource binding through sysfs.
//!
//! This module turns a `vendor:device` identifier into something registers can be read
//! from. Everything goes through the kernel's sysfs view of the PCI bus:
//!
//! ```text
//! /sys/bus/pci/devices/0000:01:00.0 -> ../../../devices/pci0000:00/0000:00:01.0/0000:01:00.0
//! ├── vendor        "0x10ee"
//! ├── device        "0x903f"
//! ├── resource      one "start end flags" line per BAR
//! ├── resource0     mmap-able BAR0
//! ├── remove        write "1" to detach the device
//! ├── reset         function level reset, used when there is no upstream bridge
//! └── config        PCI configuration space
//! ```
//!
//! The [`PciBackend`] trait is the seam the bring-up sequencer works against; [`SysfsPci`]
//! is the implementation for a real system.

use crate::config::{PciId, SysfsLayout};
use crate::error::MindyError;
use crate::register_port::RegisterBus;
use crate::system_io::{fs_read, fs_read_at, fs_read_dir, fs_read_link, fs_write, fs_write_at};
use log::{debug, info, trace, warn};
use std::fmt;
use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

/// `IORESOURCE_MEM` from `include/linux/ioport.h`.
const IORESOURCE_MEM: u64 = 0x0000_0200;

/// Only the first six lines of `resource` describe BARs.
const BAR_COUNT: usize = 6;

/// Offset of the 16-bit Bridge Control register in a type 1 configuration header.
const BRIDGE_CONTROL: u64 = 0x3E;

/// Secondary Bus Reset bit of the Bridge Control register.
const SECONDARY_BUS_RESET: u16 = 1 << 6;

/// One mapped memory BAR of a device.
pub struct BarRegion {
    /// BAR number, 0..=5
    pub index: usize,
    /// Userspace view of the BAR.
    pub bar: Arc<dyn RegisterBus>,
    /// Bus (physical) address the BAR is decoded at.
    pub bus_base: u64,
    pub size: usize,
}

impl fmt::Debug for BarRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BarRegion")
            .field("index", &self.index)
            .field("bus_base", &format_args!("0x{:X}", self.bus_base))
            .field("size", &format_args!("0x{:X}", self.size))
            .finish()
    }
}

/// Operations the bring-up sequencer needs from the PCI subsystem.
pub trait PciBackend: Send + Sync {
    /// Find the bus address (`domain:bus:slot.function`) of the first device matching
    /// `device`.
    ///
    /// # Returns: `Result<String, MindyError>`
    /// * `Ok(String)` - Bus address, e.g. "0000:01:00.0"
    /// * `Err(MindyError::DeviceNotFound)` - No device with that identifier is present
    fn resolve(&self, device: &PciId) -> Result<String, MindyError>;

    /// Map every populated memory BAR of the device at `bdf`.
    ///
    /// # Returns: `Result<Vec<BarRegion>, MindyError>`
    /// * `Ok(Vec<BarRegion>)` - One entry per memory BAR, in BAR order
    /// * `Err(MindyError::MapFailed)` - A BAR couldn't be mapped (usually missing privileges)
    fn map(&self, device: &PciId, bdf: &str) -> Result<Vec<BarRegion>, MindyError>;

    /// Reset the device at `bdf` and wait for it to be enumerated again.
    ///
    /// Every mapping and file descriptor obtained for the device before this call is
    /// invalid afterwards.
    fn hot_reset(&self, device: &PciId, bdf: &str) -> Result<(), MindyError>;
}

/// A BAR mapped into the process with `mmap`.
///
/// The mapping is exactly as large as the BAR. An access that doesn't fit inside it is a
/// programming error and panics instead of touching whatever is mapped next to it.
pub struct MappedBar {
    ptr: NonNull<u8>,
    size: usize,
}

// SAFETY: the mapping is owned by this struct for its whole lifetime and only accessed
// through volatile loads and stores of naturally aligned words.
unsafe impl Send for MappedBar {}
unsafe impl Sync for MappedBar {}

impl MappedBar {
    /// Map `size` bytes of the sysfs resource file at `path`, read/write and shared.
    ///
    /// # Returns: `Result<MappedBar, MindyError>`
    /// * `Ok(MappedBar)` - The mapping
    /// * `Err(MindyError::MapFailed)` - The file can't be opened or `mmap` failed
    pub fn map(device: &PciId, path: &Path, size: usize) -> Result<MappedBar, MindyError> {
        trace!("Mapping 0x{size:X} bytes of {path:?}");
        let map_failed = |e| MindyError::MapFailed {
            device: device.to_string(),
            path: path.into(),
            e,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(map_failed)?;

        // SAFETY: a fresh shared mapping of an open file, no existing memory is aliased.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(map_failed(std::io::Error::last_os_error()));
        }
        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| map_failed(std::io::Error::other("mmap returned a null mapping")))?;
        // The mapping stays valid after the file descriptor is closed.
        Ok(MappedBar { ptr, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn word(&self, offset: usize) -> *mut u32 {
        assert!(
            offset % 4 == 0 && offset + 4 <= self.size,
            "register offset 0x{offset:X} is outside the 0x{:X} byte BAR",
            self.size
        );
        // SAFETY: bounds and alignment checked above.
        unsafe { self.ptr.as_ptr().add(offset).cast::<u32>() }
    }
}

impl RegisterBus for MappedBar {
    fn read32(&self, offset: usize) -> u32 {
        // SAFETY: `word` only returns in-bounds, aligned pointers into the mapping.
        unsafe { std::ptr::read_volatile(self.word(offset)) }
    }

    fn write32(&self, offset: usize, value: u32) {
        // SAFETY: `word` only returns in-bounds, aligned pointers into the mapping.
        unsafe { std::ptr::write_volatile(self.word(offset), value) }
    }
}

impl Drop for MappedBar {
    fn drop(&mut self) {
        // SAFETY: unmapping exactly the region created in `map`.
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast(), self.size);
        }
    }
}

/// One line of a sysfs `resource` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResourceEntry {
    pub index: usize,
    pub start: u64,
    pub end: u64,
    pub flags: u64,
}

impl ResourceEntry {
    pub fn size(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_mappable_memory(&self) -> bool {
        self.flags & IORESOURCE_MEM != 0 && self.start != 0 && self.size() != 0
    }
}

fn parse_hex(s: &str) -> Option<u64> {
    u64::from_str_radix(s.trim().trim_start_matches("0x"), 16).ok()
}

/// Parse the BAR lines of a sysfs `resource` file. Lines that don't parse are skipped.
pub(crate) fn parse_resource_table(contents: &str) -> Vec<ResourceEntry> {
    contents
        .lines()
        .take(BAR_COUNT)
        .enumerate()
        .filter_map(|(index, line)| {
            let mut fields = line.split_whitespace().map(parse_hex);
            match (fields.next(), fields.next(), fields.next()) {
                (Some(Some(start)), Some(Some(end)), Some(Some(flags))) => Some(ResourceEntry {
                    index,
                    start,
                    end,
                    flags,
                }),
                _ => {
                    warn!("Skipping unparsable resource line {index}: '{line}'");
                    None
                }
            }
        })
        .collect()
}

/// Whether `name` has the `dddd:bb:dd.f` shape of a PCI function address.
fn looks_like_bdf(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 12
        && bytes[4] == b':'
        && bytes[7] == b':'
        && bytes[10] == b'.'
        && name
            .chars()
            .enumerate()
            .all(|(i, c)| matches!(i, 4 | 7 | 10) || c.is_ascii_hexdigit())
}

/// [`PciBackend`] backed by the sysfs PCI tree.
#[derive(Debug, Clone, Default)]
pub struct SysfsPci {
    layout: SysfsLayout,
}

impl SysfsPci {
    pub fn new(layout: SysfsLayout) -> SysfsPci {
        SysfsPci { layout }
    }

    fn read_id_attribute(&self, bdf: &str, attribute: &str) -> Result<u16, MindyError> {
        let path = self.layout.pci_device_dir(bdf).join(attribute);
        let contents = fs_read(&path)?;
        u16::from_str_radix(contents.trim().trim_start_matches("0x"), 16).map_err(|_| {
            MindyError::Internal(format!(
                "{path:?} contains '{}' which is not a 16-bit hex id",
                contents.trim()
            ))
        })
    }

    /// The bus address of the bridge directly above `bdf`, if there is one.
    ///
    /// A device's sysfs entry links into `/sys/devices/pciDDDD:BB/.../<bridge>/<bdf>`. When
    /// the parent component is a root bus (`pci0000:00`) the device has no bridge of its
    /// own to reset.
    fn upstream_bridge(&self, bdf: &str) -> Result<Option<String>, MindyError> {
        let target = fs_read_link(&self.layout.pci_device_dir(bdf))?;
        let parent = target
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned());
        trace!("{bdf} links to {target:?}, parent component {parent:?}");
        Ok(parent.filter(|p| looks_like_bdf(p)))
    }

    fn read_bridge_control(&self, config: &Path) -> Result<u16, MindyError> {
        let mut buf = [0u8; 2];
        fs_read_at(config, BRIDGE_CONTROL, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn write_bridge_control(&self, config: &Path, value: u16) -> Result<(), MindyError> {
        fs_write_at(config, BRIDGE_CONTROL, &value.to_le_bytes())
    }
}

impl PciBackend for SysfsPci {
    fn resolve(&self, device: &PciId) -> Result<String, MindyError> {
        let mut candidates = fs_read_dir(&self.layout.pci_devices_dir)?;
        // match lspci's ordering, lowest bus address first
        candidates.sort();
        for bdf in candidates {
            let vendor = self.read_id_attribute(&bdf, "vendor");
            let dev = self.read_id_attribute(&bdf, "device");
            match (vendor, dev) {
                (Ok(v), Ok(d)) if v == device.vendor && d == device.device => {
                    info!("Found {device} at {bdf}");
                    return Ok(bdf);
                }
                (Ok(_), Ok(_)) => {}
                (Err(e), _) | (_, Err(e)) => debug!("Skipping {bdf}: {e}"),
            }
        }
        Err(MindyError::DeviceNotFound {
            device: device.to_string(),
        })
    }

    fn map(&self, device: &PciId, bdf: &str) -> Result<Vec<BarRegion>, MindyError> {
        let device_dir = self.layout.pci_device_dir(bdf);
        let table = parse_resource_table(&fs_read(&device_dir.join("resource"))?);
        let mut regions = Vec::new();
        for entry in table.into_iter().filter(ResourceEntry::is_mappable_memory) {
            let size = usize::try_from(entry.size()).map_err(|_| MindyError::MapFailed {
                device: device.to_string(),
                path: device_dir.join(format!("resource{}", entry.index)),
                e: std::io::Error::other("BAR is larger than the address space"),
            })?;
            let path = device_dir.join(format!("resource{}", entry.index));
            let bar = MappedBar::map(device, &path, size)?;
            debug!(
                "Mapped BAR{} of {device} (bus 0x{:X}, 0x{size:X} bytes)",
                entry.index, entry.start
            );
            regions.push(BarRegion {
                index: entry.index,
                bar: Arc::new(bar),
                bus_base: entry.start,
                size,
            });
        }
        Ok(regions)
    }

    fn hot_reset(&self, device: &PciId, bdf: &str) -> Result<(), MindyError> {
        let device_dir = self.layout.pci_device_dir(bdf);
        match self.upstream_bridge(bdf)? {
            Some(bridge) => {
                info!("Hot-resetting {device} at {bdf} through bridge {bridge}");
                let config = self.layout.pci_device_dir(&bridge).join("config");
                fs_write(&device_dir.join("remove"), false, "1")?;
                let control = self.read_bridge_control(&config)?;
                self.write_bridge_control(&config, control | SECONDARY_BUS_RESET)?;
                std::thread::sleep(self.layout.hot_reset_hold);
                self.write_bridge_control(&config, control & !SECONDARY_BUS_RESET)?;
                std::thread::sleep(self.layout.hot_reset_hold);
                fs_write(&self.layout.pci_rescan_path, false, "1")?;
            }
            None => {
                warn!("{bdf} has no upstream bridge, falling back to a function level reset");
                fs_write(&device_dir.join("reset"), false, "1")?;
            }
        }
        // Wait for the bus to come back up fully enumerated
        std::thread::sleep(self.layout.hot_reset_settle);
        Ok(())
    }
}

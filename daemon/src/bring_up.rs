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

//! Getting from a PCI identifier to a [`Device`] with known-good registers.
//!
//! The sequence is:
//!
//! ```text
//! Unbound ──▶ Resolving ──▶ Mapped ──▶ IdentityChecked ──▶ Ready
//!    │            │            │              │
//!    └────────────┴────────────┴──────────────┴──────▶ Faulted
//! ```
//!
//! * **Unbound**: the [`ModuleMap`] is checked before any hardware is touched.
//! * **Resolving**: UIO is set up for the device and its bus address is looked up.
//! * **Mapped**: BAR0 is mapped and a [`DeviceHandle`] is recorded.
//! * **IdentityChecked**: the identity register reads as something other than
//!   [`IDENTITY_SENTINEL`]. A device that reads all ones gets exactly one hot-reset, after
//!   which UIO and the mapping are set up again and the register is read once more.
//! * **Ready**: every RTL block has its [`RegisterPort`].
//!
//! A failure anywhere leaves the sequencer in `Faulted`. It never retries on its own; the
//! caller decides whether to [`run`](BringUp::run) again.

use crate::config::{PciId, SysfsLayout};
use crate::error::MindyError;
use crate::pci::{PciBackend, SysfsPci};
use crate::register_port::{Lease, RegisterBus, RegisterPort};
use crate::rtl::data_fetch::DataFetch;
use crate::rtl::frame_counter::FrameCounters;
use crate::rtl::irq_manager::IrqManager;
use crate::rtl::rdmx_shim::RdmxShim;
use crate::rtl::revision::{AxiRevision, IDENTITY_SENTINEL};
use crate::rtl::status_manager::StatusManager;
use crate::rtl::{ModuleMap, RtlModule};
use crate::uio::{SysfsUio, UioRegistrar};
use log::{info, trace, warn};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpState {
    Unbound,
    Resolving,
    Mapped,
    IdentityChecked,
    Ready,
    Faulted,
}

impl fmt::Display for BringUpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BringUpState::Unbound => "unbound",
            BringUpState::Resolving => "resolving",
            BringUpState::Mapped => "mapped",
            BringUpState::IdentityChecked => "identity-checked",
            BringUpState::Ready => "ready",
            BringUpState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Everything bring-up learned about one device.
///
/// All ports cut from a handle share its [`Lease`]; [`invalidate`](DeviceHandle::invalidate)
/// revokes them at once.
pub struct DeviceHandle {
    userspace_base: Arc<dyn RegisterBus>,
    bus_base: u64,
    bar_size: usize,
    uio_index: u32,
    bdf: String,
    device: PciId,
    lease: Lease,
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("device", &self.device)
            .field("bdf", &self.bdf)
            .field("uio_index", &self.uio_index)
            .field("bus_base", &format_args!("0x{:X}", self.bus_base))
            .field("bar_size", &format_args!("0x{:X}", self.bar_size))
            .field("valid", &self.lease.is_valid())
            .finish()
    }
}

impl DeviceHandle {
    pub fn device(&self) -> PciId {
        self.device
    }

    pub fn bdf(&self) -> &str {
        &self.bdf
    }

    pub fn uio_index(&self) -> u32 {
        self.uio_index
    }

    /// Bus address of BAR0.
    pub fn bus_base(&self) -> u64 {
        self.bus_base
    }

    pub fn bar_size(&self) -> usize {
        self.bar_size
    }

    pub fn is_valid(&self) -> bool {
        self.lease.is_valid()
    }

    /// Mark the mapping as gone. Every port derived from this handle fails with
    /// [`MindyError::StaleMapping`] from now on.
    pub fn invalidate(&self) {
        if self.lease.is_valid() {
            info!("Invalidating register mappings of {}", self.device);
        }
        self.lease.revoke();
    }

    fn port(&self, offset: u32) -> RegisterPort {
        RegisterPort::new(
            self.userspace_base.clone(),
            offset as usize,
            self.bus_base + u64::from(offset),
            self.lease.clone(),
        )
    }
}

/// A brought-up Mindy device and its RTL blocks.
#[derive(Debug)]
pub struct Device {
    handle: DeviceHandle,
    revision: AxiRevision,
    frame_counters: FrameCounters,
    data_fetch: DataFetch,
    rdmx_shim: RdmxShim,
    status_manager: StatusManager,
    irq_manager: Option<IrqManager>,
}

impl Device {
    fn new(handle: DeviceHandle, map: &ModuleMap) -> Result<Device, MindyError> {
        let port = |module| Ok::<_, MindyError>(handle.port(required_offset(map, module)?));
        Ok(Device {
            revision: AxiRevision::new(port(RtlModule::MasterRevision)?),
            frame_counters: FrameCounters::new(port(RtlModule::FrameCounter)?),
            data_fetch: DataFetch::new(port(RtlModule::DataFetch)?),
            rdmx_shim: RdmxShim::new(port(RtlModule::RdmxShim)?),
            status_manager: StatusManager::new(port(RtlModule::StatusManager)?),
            irq_manager: Some(IrqManager::new(port(RtlModule::IrqManager)?)),
            handle,
        })
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    pub fn revision(&self) -> &AxiRevision {
        &self.revision
    }

    pub fn frame_counters(&self) -> &FrameCounters {
        &self.frame_counters
    }

    pub fn data_fetch(&self) -> &DataFetch {
        &self.data_fetch
    }

    pub fn rdmx_shim(&self) -> &RdmxShim {
        &self.rdmx_shim
    }

    pub fn status_manager(&self) -> &StatusManager {
        &self.status_manager
    }

    /// Hand the IRQ manager to its single user, the interrupt engine.
    pub fn take_irq_manager(&mut self) -> Option<IrqManager> {
        self.irq_manager.take()
    }

    /// The port of `module`, for raw register access.
    ///
    /// The IRQ manager is not available here: reading or clearing it behind the
    /// interrupt engine's back would lose interrupts.
    pub fn port(&self, module: RtlModule) -> Result<&RegisterPort, MindyError> {
        match module {
            RtlModule::MasterRevision => Ok(self.revision.port()),
            RtlModule::FrameCounter => Ok(self.frame_counters.port()),
            RtlModule::DataFetch => Ok(self.data_fetch.port()),
            RtlModule::RdmxShim => Ok(self.rdmx_shim.port()),
            RtlModule::StatusManager => Ok(self.status_manager.port()),
            RtlModule::IrqManager => Err(MindyError::Argument(format!(
                "{module} registers of {} are reserved for interrupt handling",
                self.handle.device
            ))),
        }
    }

    fn raw_port(
        &self,
        module: RtlModule,
        offset: u32,
        width: u64,
    ) -> Result<&RegisterPort, MindyError> {
        let port = self.port(module)?;
        if offset % 4 != 0 {
            return Err(MindyError::Argument(format!(
                "Register offset 0x{offset:X} is not 32-bit aligned"
            )));
        }
        if port.base() as u64 + u64::from(offset) + width > self.handle.bar_size as u64 {
            return Err(MindyError::Argument(format!(
                "Register offset 0x{offset:X} of {module} is outside BAR0 of {}",
                self.handle.device
            )));
        }
        Ok(port)
    }

    /// Read the 32-bit register at `offset` of `module`.
    pub fn read_register32(&self, module: RtlModule, offset: u32) -> Result<u32, MindyError> {
        self.raw_port(module, offset, 4)?.read32(offset)
    }

    /// Read the 64-bit register whose high word is at `offset` of `module`.
    pub fn read_register64(&self, module: RtlModule, offset: u32) -> Result<u64, MindyError> {
        self.raw_port(module, offset, 8)?.read64(offset)
    }

    pub fn write_register32(
        &self,
        module: RtlModule,
        offset: u32,
        value: u32,
    ) -> Result<(), MindyError> {
        self.raw_port(module, offset, 4)?.write32(offset, value)
    }

    pub fn write_register64(
        &self,
        module: RtlModule,
        offset: u32,
        value: u64,
    ) -> Result<(), MindyError> {
        self.raw_port(module, offset, 8)?.write64(offset, value)
    }

    pub fn invalidate(&self) {
        self.handle.invalidate();
    }
}

fn required_offset(map: &ModuleMap, module: RtlModule) -> Result<u32, MindyError> {
    map.offset(module).ok_or_else(|| {
        MindyError::Configuration(format!("No AXI offset configured for: {module}"))
    })
}

/// Drives a device through the bring-up states.
pub struct BringUp {
    pci: Box<dyn PciBackend>,
    uio: Box<dyn UioRegistrar>,
    state: BringUpState,
}

impl BringUp {
    pub fn new(pci: Box<dyn PciBackend>, uio: Box<dyn UioRegistrar>) -> BringUp {
        BringUp {
            pci,
            uio,
            state: BringUpState::Unbound,
        }
    }

    /// A sequencer working on the real sysfs (or a tree laid out like it).
    pub fn sysfs(layout: &SysfsLayout) -> BringUp {
        BringUp::new(
            Box::new(SysfsPci::new(layout.clone())),
            Box::new(SysfsUio::new(layout.clone())),
        )
    }

    pub fn state(&self) -> BringUpState {
        self.state
    }

    fn enter(&mut self, device: &PciId, state: BringUpState) {
        info!("{device}: {} -> {state}", self.state);
        self.state = state;
    }

    /// Bring `device` up with its RTL blocks at the offsets of `map`.
    ///
    /// # Returns: `Result<Device, MindyError>`
    /// * `Ok(Device)` - The device is `Ready`
    /// * `Err(MindyError::Configuration)` - `map` is incomplete or doesn't fit in BAR0
    /// * `Err(MindyError::DeviceUnresponsive)` - The identity register read all ones
    ///   before and after a hot-reset
    /// * `Err(..)` - Any PCI or UIO failure, see [`PciBackend`] and [`UioRegistrar`]
    pub fn run(&mut self, device: &PciId, map: &ModuleMap) -> Result<Device, MindyError> {
        self.state = BringUpState::Unbound;
        match self.sequence(device, map) {
            Ok(ready) => Ok(ready),
            Err(e) => {
                warn!("Bring-up of {device} failed in state {}: {e}", self.state);
                self.state = BringUpState::Faulted;
                Err(e)
            }
        }
    }

    fn sequence(&mut self, device: &PciId, map: &ModuleMap) -> Result<Device, MindyError> {
        map.require_all()?;

        self.enter(device, BringUpState::Resolving);
        let first = self.attach(device, map)?;
        self.enter(device, BringUpState::Mapped);

        let revision_offset = required_offset(map, RtlModule::MasterRevision)?;
        let identity = AxiRevision::new(first.port(revision_offset)).build_major()?;
        let handle = if identity == IDENTITY_SENTINEL {
            warn!(
                "{device} at {} reads 0x{identity:08X} from its identity register, hot-resetting",
                first.bdf
            );
            let bdf = first.bdf.clone();
            first.invalidate();
            // Unmap BAR0 before the function is removed from the bus.
            drop(first);
            self.pci.hot_reset(device, &bdf)?;

            let retry = self.attach(device, map)?;
            let identity = AxiRevision::new(retry.port(revision_offset)).build_major()?;
            if identity == IDENTITY_SENTINEL {
                retry.invalidate();
                return Err(MindyError::DeviceUnresponsive {
                    device: device.to_string(),
                    value: identity,
                });
            }
            retry
        } else {
            first
        };
        self.enter(device, BringUpState::IdentityChecked);

        let ready = Device::new(handle, map)?;
        self.enter(device, BringUpState::Ready);
        Ok(ready)
    }

    /// Set up UIO, find the device and map BAR0.
    fn attach(&self, device: &PciId, map: &ModuleMap) -> Result<DeviceHandle, MindyError> {
        let uio_index = self.uio.initialize(device)?;
        let bdf = self.pci.resolve(device)?;
        let bar0 = self
            .pci
            .map(device, &bdf)?
            .into_iter()
            .find(|region| region.index == 0)
            .ok_or_else(|| MindyError::MapFailed {
                device: device.to_string(),
                path: format!("{bdf}/resource0").into(),
                e: std::io::Error::other("the device has no memory BAR0"),
            })?;
        trace!("{device}: BAR0 is {bar0:?}");

        for (module, offset) in map.iter() {
            let end = offset as usize + module.span() as usize;
            if end > bar0.size {
                return Err(MindyError::Configuration(format!(
                    "{module} registers 0x{offset:X}..0x{end:X} do not fit in the 0x{:X} byte BAR0 of {device}",
                    bar0.size
                )));
            }
        }

        Ok(DeviceHandle {
            userspace_base: bar0.bar,
            bus_base: bar0.bus_base,
            bar_size: bar0.size,
            uio_index,
            bdf,
            device: *device,
            lease: Lease::new(&device.to_string()),
        })
    }
}
